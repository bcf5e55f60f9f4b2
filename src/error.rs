use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, TonicaError>;

/// Coarse classification used when a failure is reported as a single status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InputNotFound,
    DecodeError,
    InvalidConfig,
    NotFound,
    Io,
    Format,
}

#[derive(Debug, thiserror::Error)]
pub enum TonicaError {
    #[error("Input audio not found: {}", path.display())]
    InputNotFound { path: PathBuf },

    #[error("Failed to decode audio: {0}")]
    Decode(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Reference track not found: {}", path.display())]
    ReferenceNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Malformed reference JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed config: {0}")]
    Toml(#[from] toml::de::Error),
}

impl TonicaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TonicaError::InputNotFound { .. } => ErrorKind::InputNotFound,
            TonicaError::Decode(_) => ErrorKind::DecodeError,
            TonicaError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            TonicaError::ReferenceNotFound { .. } => ErrorKind::NotFound,
            TonicaError::Io(_) => ErrorKind::Io,
            TonicaError::Json(_) | TonicaError::Toml(_) => ErrorKind::Format,
        }
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        TonicaError::InvalidConfig(msg.into())
    }
}

impl From<symphonia::core::errors::Error> for TonicaError {
    fn from(err: symphonia::core::errors::Error) -> Self {
        match err {
            symphonia::core::errors::Error::IoError(e) => TonicaError::Io(e),
            other => TonicaError::Decode(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_status() {
        let err = TonicaError::InputNotFound { path: "a.mp3".into() };
        assert_eq!(err.kind(), ErrorKind::InputNotFound);
        assert!(err.to_string().contains("a.mp3"));

        assert_eq!(TonicaError::invalid("x").kind(), ErrorKind::InvalidConfig);
        assert_eq!(TonicaError::Decode("bad".into()).kind(), ErrorKind::DecodeError);
    }

    #[test]
    fn symphonia_decode_errors_become_decode_kind() {
        let err: TonicaError = symphonia::core::errors::Error::DecodeError("corrupt").into();
        assert_eq!(err.kind(), ErrorKind::DecodeError);
    }
}
