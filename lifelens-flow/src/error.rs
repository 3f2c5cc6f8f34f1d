use thiserror::Error;

/// Failure taxonomy for the workflow core.
///
/// Nothing here is fatal: a prediction failure leaves the workflow at
/// `ImageSelected` so the user can resubmit, and chat failures are absorbed
/// into the session as a synthetic bot message.
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// Transport failure or non-success HTTP status.
    #[error("network error: {0}")]
    Network(String),

    /// Response body is missing or mistypes a required field.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Input rejected locally, before any request was made.
    #[error("validation error: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, WorkflowError>;
