//! Error kinds raised by the load pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while discovering, parsing or loading source files.
///
/// `Parse`, `Lookup` and `Write` abort only the file being processed.
/// `Discovery` and `Connection` stop the whole run.
#[derive(Debug, Error)]
pub enum EtlError {
    #[error("cannot walk {path}: {message}")]
    Discovery { path: PathBuf, message: String },

    #[error("{}: {message}", location(.path, .line))]
    Parse {
        path: PathBuf,
        line: Option<usize>,
        message: String,
    },

    #[error("song lookup failed: {0}")]
    Lookup(#[source] rusqlite::Error),

    #[error("write failed: {0}")]
    Write(#[source] rusqlite::Error),

    #[error("cannot open store at {path}: {message}")]
    Connection { path: PathBuf, message: String },
}

impl EtlError {
    pub fn parse(
        path: impl Into<PathBuf>,
        line: Option<usize>,
        message: impl Into<String>,
    ) -> Self {
        EtlError::Parse {
            path: path.into(),
            line,
            message: message.into(),
        }
    }

    /// Whether the run can move on to the next file after this error.
    pub fn is_per_file(&self) -> bool {
        matches!(
            self,
            EtlError::Parse { .. } | EtlError::Lookup(_) | EtlError::Write(_)
        )
    }
}

fn location(path: &std::path::Path, line: &Option<usize>) -> String {
    match line {
        Some(n) => format!("{}:{}", path.display(), n),
        None => path.display().to_string(),
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_mentions_line() {
        let err = EtlError::parse("/data/log.json", Some(3), "expected value");
        assert_eq!(err.to_string(), "/data/log.json:3: expected value");
        assert!(err.is_per_file());
    }

    #[test]
    fn test_discovery_is_fatal() {
        let err = EtlError::Discovery {
            path: PathBuf::from("/missing"),
            message: "not found".to_string(),
        };
        assert!(!err.is_per_file());
    }
}
