use thiserror::Error;

pub const SERVER_ERROR_FALLBACK: &str = "An error occurred while processing the feedback";

/// Local input problems. These never reach the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please enter some feedback text")]
    EmptyInput,
    #[error("Feedback must be at least 3 characters long")]
    TooShort,
    #[error("Feedback text must be 1000 characters or less")]
    TooLong,
}

/// Failures of the authoritative classification call. `Display` is the
/// message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionError {
    #[error("Network error. Please check your connection and try again.")]
    NetworkError,
    #[error("Request timed out. Please try again.")]
    TimeoutError,
    #[error("{}", .0.as_deref().unwrap_or(SERVER_ERROR_FALLBACK))]
    ServerError(Option<String>),
    #[error("An unexpected error occurred. Please try again.")]
    UnknownError,
}

impl SubmissionError {
    pub fn server(message: Option<String>) -> Self {
        SubmissionError::ServerError(message.filter(|m| !m.trim().is_empty()))
    }
}
