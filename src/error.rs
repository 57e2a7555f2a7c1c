//! Error Types
//!
//! Errors that cross the library boundary. Malformed records and
//! declaration conflicts are not errors: they are reported as notices
//! and the offending entity is dropped.

use thiserror::Error;

/// Failures of the external corpus accessor.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The upstream query engine has not finished indexing yet.
    #[error("corpus source is not ready yet")]
    NotReady,

    /// The snapshot could not be read.
    #[error("failed to read corpus snapshot '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The snapshot could not be parsed.
    #[error("failed to parse corpus snapshot '{path}': {message}")]
    Parse { path: String, message: String },
}

/// Invalid or unreadable settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings file '{path}': {message}")]
    Parse { path: String, message: String },

    #[error("invalid setting '{key}': {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_ready_message() {
        assert_eq!(SourceError::NotReady.to_string(), "corpus source is not ready yet");
    }

    #[test]
    fn test_invalid_setting_message() {
        let err = ConfigError::Invalid {
            key: "rate_limit.min_rate",
            reason: "must not exceed max_rate".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid setting 'rate_limit.min_rate': must not exceed max_rate"
        );
    }
}
