//! Error types for the board client

/// Result type alias for board client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to the lives API
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Network failure, timeout or undecodable body
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Invalid base URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Missing, invalid or expired credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The server refused the input
    #[error("Rejected: {0}")]
    Rejected(String),

    /// Any other non-success status
    #[error("API error {status}: {message}")]
    Status { status: u16, message: String },
}

impl Error {
    /// Whether the user should log in again
    pub fn is_auth(&self) -> bool {
        matches!(self, Error::Unauthorized(_))
    }

    /// Message fit for showing to a person
    pub fn user_message(&self) -> String {
        match self {
            Error::Unauthorized(_) => "Your session has expired. Please log in again.".to_string(),
            Error::Rejected(message) => message.clone(),
            Error::Transport(_) | Error::InvalidUrl(_) | Error::Status { .. } => {
                "Something went wrong. Please try again.".to_string()
            }
        }
    }
}
