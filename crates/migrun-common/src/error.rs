use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(String),

    /// A migration's `up` statement was rejected by the database.
    #[error("{migration} - {message}")]
    Execution { migration: String, message: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse classification reported alongside a failed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Storage,
    Execution,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) | Error::Config(_) | Error::Serialization(_) => {
                ErrorKind::Validation
            }
            Error::Execution { .. } => ErrorKind::Execution,
            Error::Storage(_) | Error::Io(_) => ErrorKind::Storage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, ErrorKind};

    #[test]
    fn error_display_includes_context() {
        let e = Error::Validation("missing up".into());
        assert_eq!(e.to_string(), "validation error: missing up");

        let e = Error::Storage("disk full".into());
        assert_eq!(e.to_string(), "storage error: disk full");

        let e = Error::Config("bad yaml".into());
        assert_eq!(e.to_string(), "configuration error: bad yaml");
    }

    #[test]
    fn execution_error_is_prefixed_with_migration_name() {
        let e = Error::Execution {
            migration: "0002_add_users".into(),
            message: "near \"garbage\": syntax error".into(),
        };
        assert_eq!(
            e.to_string(),
            "0002_add_users - near \"garbage\": syntax error"
        );
        assert_eq!(e.kind(), ErrorKind::Execution);
    }

    #[test]
    fn kinds_follow_variants() {
        assert_eq!(Error::Validation("x".into()).kind(), ErrorKind::Validation);
        assert_eq!(Error::Config("x".into()).kind(), ErrorKind::Validation);
        assert_eq!(Error::Storage("x".into()).kind(), ErrorKind::Storage);
        let io = std::io::Error::other("broken pipe");
        assert_eq!(Error::from(io).kind(), ErrorKind::Storage);
    }
}
