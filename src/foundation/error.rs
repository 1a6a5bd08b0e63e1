/// Result type used across framecap.
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Errors raised while capturing or encoding frames.
#[derive(thiserror::Error, Debug)]
pub enum CaptureError {
    /// The encoder executable could not be located or probed.
    #[error("encoder unavailable: {0}")]
    Availability(String),

    /// A single frame could not be written while the encoder was still alive.
    #[error("pipe write error: {0}")]
    PipeWrite(String),

    /// The encoder process exited (or closed its input) before the session ended.
    #[error("encoder subprocess terminated: {0}")]
    SubprocessTerminated(String),

    /// No live session is registered under the name.
    #[error("capture '{0}' not found or disabled")]
    NotFound(String),

    /// The session disabled itself after a missing encoder.
    #[error("capture '{0}' is disabled")]
    Disabled(String),

    /// Invalid sizes, frame rates or frame lengths.
    #[error("validation error: {0}")]
    Validation(String),

    /// The render engine failed, or an internal invariant broke.
    #[error("engine error: {0}")]
    Engine(String),

    /// Invalid configuration or an unusable output directory.
    #[error("config error: {0}")]
    Config(String),

    /// Any other error, carried with its source chain.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CaptureError {
    /// Build a [`CaptureError::Availability`] value.
    pub fn availability(msg: impl Into<String>) -> Self {
        Self::Availability(msg.into())
    }

    /// Build a [`CaptureError::PipeWrite`] value.
    pub fn pipe_write(msg: impl Into<String>) -> Self {
        Self::PipeWrite(msg.into())
    }

    /// Build a [`CaptureError::SubprocessTerminated`] value.
    pub fn terminated(msg: impl Into<String>) -> Self {
        Self::SubprocessTerminated(msg.into())
    }

    /// Build a [`CaptureError::NotFound`] value.
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound(name.into())
    }

    /// Build a [`CaptureError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`CaptureError::Engine`] value.
    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }

    /// Build a [`CaptureError::Config`] value.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Errors after which the owning session must not keep its pipe open.
    pub fn is_fatal_to_session(&self) -> bool {
        matches!(self, Self::SubprocessTerminated(_))
    }
}
