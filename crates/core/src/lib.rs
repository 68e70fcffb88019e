pub mod config;
pub mod domain;
pub mod errors;

pub use domain::action::{ActionLogEntry, OrchestrationOutcome};
pub use domain::tool::{ParameterKind, ParameterSpec, ToolDescriptor};
pub use domain::transcript::{
    CorrelationId, Role, ToolInvocationRequest, ToolInvocationResult, Transcript, Turn,
};
pub use errors::{ApplicationError, DomainError, InterfaceError};
