//! Error code constants

/// Generation service error codes (0100-0199)
pub const ERR_START_HTTP: &str = "E-WIDGET-0100";
pub const ERR_START_DECODE: &str = "E-WIDGET-0101";
pub const ERR_POLL_HTTP: &str = "E-WIDGET-0110";
pub const ERR_POLL_DECODE: &str = "E-WIDGET-0111";
pub const ERR_POLL_MISMATCH: &str = "E-WIDGET-0112";

/// Compiler error codes (0200-0299)
pub const ERR_COMPILE_SYNTAX: &str = "E-WIDGET-0200";
pub const ERR_COMPILE_UNSUPPORTED: &str = "E-WIDGET-0201";
pub const ERR_COMPILE_TOO_LARGE: &str = "E-WIDGET-0202";
pub const ERR_COMPILE_PARSER: &str = "E-WIDGET-0203";

/// Capability resolution error codes (0300-0399)
pub const ERR_RESOLUTION_DENIED: &str = "E-WIDGET-0300";

/// Sandbox error codes (0400-0499)
pub const ERR_SANDBOX_CONTEXT: &str = "E-WIDGET-0400";
pub const ERR_SANDBOX_EVAL: &str = "E-WIDGET-0401";
pub const ERR_SANDBOX_RUNTIME: &str = "E-WIDGET-0402";
pub const ERR_SANDBOX_EXPORT: &str = "E-WIDGET-0403";
pub const ERR_SANDBOX_RENDER: &str = "E-WIDGET-0404";

/// CLI error codes (0600-0699)
pub const ERR_CLI_USAGE: &str = "E-WIDGET-0600";
pub const ERR_CLI_IO: &str = "E-WIDGET-0601";
