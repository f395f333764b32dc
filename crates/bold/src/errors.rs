use thiserror::Error;

/// Failures of a chat round trip, as seen by the consumer.
///
/// The `Display` text is what ends up in front of the viewer, so in-band
/// errors render exactly as the backend phrased them.
#[derive(Error, Debug)]
pub enum AskError {
    #[error("{0}")]
    Http(#[from] reqwest::Error),

    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("{0}")]
    Stream(String),

    #[error("Failed to parse server response")]
    Parse(#[source] serde_json::Error),

    #[error("{0}")]
    Transport(String),
}

pub type AskResult<T> = Result<T, AskError>;

/// Failures talking to the video backend
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Missing API configuration")]
    MissingConfiguration,

    #[error("Invalid API configuration")]
    InvalidConfiguration,

    #[error("{status} {reason}\n{body}")]
    Upstream {
        status: u16,
        reason: String,
        body: String,
    },

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}
