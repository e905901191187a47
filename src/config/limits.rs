//! Sandbox, compiler and polling limits

use std::time::Duration;

/// Polling.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10_000;

/// Compiler limits.
pub const MAX_SOURCE_BYTES: usize = 512 * 1024; // 512 KiB
pub const COMPILE_CACHE_CAPACITY: usize = 64;

/// Sandbox runtime limits.
pub const DEFAULT_LOOP_ITERATION_LIMIT: u64 = 5_000_000;
pub const DEFAULT_RECURSION_LIMIT: usize = 512;
/// Nested host elements per render. Each element adds two JSON levels, so
/// this stays under serde_json's recursion limit of 128.
pub const DEFAULT_MAX_RENDER_DEPTH: u32 = 60;

/// Export extracted from every generated module unless configured otherwise.
pub const DEFAULT_EXPORT_NAME: &str = "WidgetComponent";

/// Engine limits applied to every sandboxed context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SandboxLimits {
    pub loop_iteration_limit: u64,
    pub recursion_limit: usize,
    pub max_render_depth: u32,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            loop_iteration_limit: DEFAULT_LOOP_ITERATION_LIMIT,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            max_render_depth: DEFAULT_MAX_RENDER_DEPTH,
        }
    }
}

pub fn default_poll_interval() -> Duration {
    Duration::from_millis(DEFAULT_POLL_INTERVAL_MS)
}
