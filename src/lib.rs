pub mod cli;
pub mod compiler;
pub mod config;
pub mod dashboard;
pub mod job;
pub mod render;
pub mod resolver;
pub mod sandbox;

pub use compiler::{CompileError, CompiledModule, SourceCompiler};
pub use config::{HeadersMap, ServiceConfig};
pub use dashboard::Dashboard;
pub use job::{
    GeneratedWidget, GenerationJob, GenerationService, HttpGenerationService, JobOrchestrator,
    JobPhase, JobSnapshot, JobStatus, PollError, StartError,
};
pub use render::{RenderProps, WidgetRenderBoundary};
pub use resolver::{Capability, CapabilityResolver, ResolutionError};
pub use sandbox::{Diagnostic, DiagnosticKind, ExecutionOutcome, LoadedComponent, SandboxExecutor};

// Test support infrastructure (test_support/) is only compiled when running tests
// or when the test_support feature is enabled.
#[cfg(any(test, feature = "test_support"))]
pub mod test_support;
