use thiserror::Error;

use crate::types::Timestamp;

/// Result type for lifecycle operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A failure reported by, or while talking to, the native capture library.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum NativeError {
    #[error("{0}")]
    Message(String),

    #[error("failed to load native library: {0}")]
    Library(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("native library is missing symbol `{0}`")]
    MissingSymbol(&'static str),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// A format identifier outside the closed [`PixelFormat`](crate::PixelFormat) set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown pixel format `{0}`")]
pub struct UnknownFormat(pub String);

/// A malformed format string such as `RGBA^640xabc`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed format string `{input}`: {reason}")]
pub struct FormatStringError {
    pub input: String,
    pub reason: &'static str,
}

/// Why a single poll failed. The session stays open after any of these.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FrameError {
    /// Frame metadata broke the protocol (no planes, bad channel count, bad JSON).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The native stream advanced between peek and pop; the frame is lost.
    #[error("popped frame {popped:?} does not match peeked frame {peeked:?}")]
    Desync {
        peeked: Timestamp,
        popped: Option<Timestamp>,
    },

    #[error(transparent)]
    UnknownFormat(#[from] UnknownFormat),

    #[error(transparent)]
    FormatString(#[from] FormatStringError),

    #[error("native call failed: {0}")]
    Native(#[from] NativeError),
}

/// Top-level crate error for enumeration, session creation and release.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("failed to create camera device `{name}`: {reason}")]
    DeviceCreationFailed { name: String, reason: String },

    #[error(transparent)]
    UnknownFormat(#[from] UnknownFormat),

    #[error(transparent)]
    FormatString(#[from] FormatStringError),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("native call failed: {0}")]
    Native(#[from] NativeError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<FrameError> for Error {
    fn from(e: FrameError) -> Self {
        match e {
            FrameError::Protocol(msg) => Self::Protocol(msg),
            FrameError::Desync { peeked, popped } => Self::Protocol(format!(
                "popped frame {popped:?} does not match peeked frame {peeked:?}"
            )),
            FrameError::UnknownFormat(e) => Self::UnknownFormat(e),
            FrameError::FormatString(e) => Self::FormatString(e),
            FrameError::Native(e) => Self::Native(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_errors_keep_their_kind_when_lifted() {
        let err: Error = FrameError::UnknownFormat(UnknownFormat("avc1".into())).into();
        assert!(matches!(err, Error::UnknownFormat(UnknownFormat(ref n)) if n == "avc1"));

        let err: Error = FrameError::Protocol("no planes".into()).into();
        assert_eq!(err.to_string(), "protocol error: no planes");
    }

    #[test]
    fn creation_failure_names_the_device() {
        let err = Error::DeviceCreationFailed {
            name: "cam0".into(),
            reason: "busy".into(),
        };
        assert_eq!(err.to_string(), "failed to create camera device `cam0`: busy");
    }
}
