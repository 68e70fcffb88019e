use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("transcript inconsistent: {0}")]
    TranscriptInconsistent(String),
    #[error("tool input rejected for `{tool}` ({reason_code}): {detail}")]
    ToolInputRejected { tool: String, reason_code: &'static str, detail: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("model call failed: {0}")]
    ModelCall(String),
    #[error("tool `{tool}` failed: {message}")]
    ToolExecution { tool: String, message: String },
    #[error("agent loop exceeded {limit} model calls without a final answer")]
    IterationLimitExceeded { limit: u32 },
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("{message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest { .. } => 400,
            Self::Internal { .. } => 500,
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. } | Self::Internal { correlation_id, .. } => {
                correlation_id
            }
        }
    }
}

impl ApplicationError {
    /// Short stable label for logs and CLI output.
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Domain(DomainError::TranscriptInconsistent(_)) => "transcript_inconsistent",
            Self::Domain(DomainError::ToolInputRejected { .. }) => "tool_input_rejected",
            Self::ModelCall(_) => "model_call",
            Self::ToolExecution { .. } => "tool_execution",
            Self::IterationLimitExceeded { .. } => "iteration_limit",
            Self::Configuration(_) => "configuration",
        }
    }

    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

// Every failure inside the agent loop is reported as an internal error carrying its
// display message, which the chat widget shows verbatim.
impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        Self::Internal { message: value.to_string(), correlation_id: "unassigned".to_owned() }
    }
}
