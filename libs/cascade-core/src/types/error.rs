use super::AttributeRef;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CascadeError {
    #[error("storage error: {0}")]
    Storage(String),
    #[error("script error: {0}")]
    Script(String),
    #[error("script timed out after {0:?}")]
    ScriptTimeout(Duration),
    #[error("invalid rule configuration: {0}")]
    InvalidRule(String),
    #[error("unknown resource kind `{0}`")]
    InvalidResourceKind(String),
    #[error("function {0} not found")]
    FunctionNotFound(AttributeRef),
    #[error("entity {0} not found")]
    EntityNotFound(String),
    #[error("more than {0} entities created in one cascade")]
    CreatedEntityLimit(usize),
    #[error("cascade too deep")]
    CascadeTooDeep,
    #[error("cascade cancelled")]
    Cancelled,
    #[error("json error")]
    Json(#[from] serde_json::Error),
}

impl CascadeError {
    pub fn storage<E: ToString>(err: E) -> Self {
        Self::Storage(err.to_string())
    }
}

pub type CascadeResult<T, E = CascadeError> = Result<T, E>;
