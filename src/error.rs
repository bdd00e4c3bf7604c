//! Error types for payload delivery.

use thiserror::Error;

/// Failure of a render result to produce its body.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("render failed: {0}")]
    Failed(String),

    #[error("render I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure beneath the response abstraction.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("response head already sent")]
    HeadAlreadySent,

    #[error("response is not streaming")]
    NotStreaming,

    #[error("client disconnected")]
    Disconnected,

    #[error("stream aborted")]
    Aborted,
}

/// Error returned by the dispatcher. Both sources pass through unchanged.
#[derive(Debug, Error)]
pub enum SendError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

pub type SendResult<T> = Result<T, SendError>;
