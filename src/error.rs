use thiserror::Error;

/// Result type for streaming operations
pub type StreamResult<T> = Result<T, StreamError>;

/// Errors that can occur while running the streaming service
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Source already running")]
    AlreadyRunning,

    #[error("Source thread panicked")]
    SourcePanicked,
}
