use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no .env file found{}", pattern_suffix(.pattern))]
    NoEnvFile { pattern: Option<String> },

    #[error("invalid glob pattern")]
    Pattern(#[from] glob::PatternError),

    #[error("I/O error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid UTF-8 input in {}: {source}", .path.display())]
    InvalidEncoding {
        path: PathBuf,
        #[source]
        source: std::str::Utf8Error,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error stops the whole run rather than a single file.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::NoEnvFile { .. } | Self::Pattern(_))
    }
}

fn pattern_suffix(pattern: &Option<String>) -> String {
    match pattern {
        Some(pattern) => format!(" matching `{pattern}`"),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_env_file_message_mentions_pattern() {
        let err = Error::NoEnvFile {
            pattern: Some("config/*.env".to_owned()),
        };
        assert_eq!(
            err.to_string(),
            "no .env file found matching `config/*.env`"
        );

        let err = Error::NoEnvFile { pattern: None };
        assert_eq!(err.to_string(), "no .env file found");
        assert!(err.is_fatal());
    }

    #[test]
    fn pattern_error_leaves_cause_to_source_chain() {
        let err = Error::from(glob::Pattern::new("[").expect_err("invalid pattern"));
        assert!(err.is_fatal());
        assert_eq!(err.to_string(), "invalid glob pattern");
        let source = std::error::Error::source(&err).expect("cause is chained");
        assert!(source.to_string().contains("invalid range pattern"));
    }

    #[test]
    fn io_error_is_per_file() {
        let err = Error::io(
            "missing.env",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(!err.is_fatal());
        assert_eq!(err.to_string(), "I/O error reading missing.env: gone");
    }
}
