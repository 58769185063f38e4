/// Result alias used across the crate.
pub type LapseResult<T> = Result<T, LapseError>;

/// Errors produced while assembling a time-lapse.
///
/// Every error is terminal for the assembly run that produced it; callers may retry with a new
/// [`crate::TimeLapseBuilder`].
#[derive(thiserror::Error, Debug)]
pub enum LapseError {
    /// A caller-side precondition was violated (empty input, bad settings, reused builder).
    #[error("validation error: {0}")]
    Validation(String),

    /// The writer could not be configured: unwritable output, unsupported codec, spawn failure.
    #[error("setup failed: {0}")]
    SetupFailed(String),

    /// A single frame could not be decoded, transformed or appended.
    #[error("frame {index} failed to encode: {message}")]
    FrameEncodeFailed {
        /// 0-based index of the failing frame in encode order.
        index: u64,
        /// Underlying failure.
        message: String,
    },

    /// Tilt compensation was requested for a frame captured without orientation metadata.
    #[error("frame {index} has no orientation metadata")]
    MissingOrientation {
        /// 0-based index of the frame in encode order.
        index: u64,
    },

    /// The encoder failed outside of any single frame (finalize, process exit).
    #[error("encoder error: {0}")]
    Encoder(String),

    /// The run was cancelled through its [`crate::CancelToken`].
    #[error("assembly cancelled")]
    Cancelled,

    /// Settings or manifest (de)serialization failed.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Any other failure, usually IO with context attached.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LapseError {
    /// Construct a [`LapseError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Construct a [`LapseError::SetupFailed`].
    pub fn setup(msg: impl Into<String>) -> Self {
        Self::SetupFailed(msg.into())
    }

    /// Construct a [`LapseError::FrameEncodeFailed`] for frame `index`.
    pub fn frame(index: u64, msg: impl Into<String>) -> Self {
        Self::FrameEncodeFailed {
            index,
            message: msg.into(),
        }
    }

    /// Construct a [`LapseError::Encoder`].
    pub fn encoder(msg: impl Into<String>) -> Self {
        Self::Encoder(msg.into())
    }

    /// Construct a [`LapseError::Serde`].
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Attribute this error to frame `index`.
    ///
    /// Errors that already name a frame are kept as-is; cancellation passes through untouched.
    pub fn at_frame(self, index: u64) -> Self {
        match self {
            Self::FrameEncodeFailed { .. } | Self::Cancelled => self,
            Self::MissingOrientation { index } => {
                Self::frame(index, "frame has no orientation metadata")
            }
            other => Self::frame(index, other.to_string()),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
