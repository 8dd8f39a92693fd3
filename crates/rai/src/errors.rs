use thiserror::Error;

use crate::providers::base::Usage;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    /// A requested provider or model is missing, or the configuration is unusable
    #[error("Configuration error: {0}")]
    Config(String),

    /// The backend could not be reached or answered with something we can't decode
    #[error("{context}: {source}")]
    Transport {
        context: String,
        #[source]
        source: BoxError,
    },

    /// Tool arguments did not match the tool's declared input
    #[error("Invalid arguments for tool {tool}: {message}")]
    Schema { tool: String, message: String },

    /// The backend returned a content unit this adapter does not understand
    #[error("Unexpected content from backend: {0}")]
    Protocol(String),

    #[error("Tool loop did not finish within {0} rounds")]
    RoundLimitExceeded(usize),

    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Error::Config(message.into())
    }

    pub fn transport<C, E>(context: C, source: E) -> Self
    where
        C: Into<String>,
        E: Into<BoxError>,
    {
        Error::Transport {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn schema<T: Into<String>, M: std::fmt::Display>(tool: T, message: M) -> Self {
        Error::Schema {
            tool: tool.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// A failed agent run: the usage consumed before the failure plus its cause.
///
/// The conversation passed to the run still holds every message appended
/// before the failure.
#[derive(Error, Debug)]
#[error("{source}")]
pub struct AgentError {
    pub usage: Usage,
    pub rounds: usize,
    #[source]
    pub source: Error,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_transport_keeps_context_and_source() {
        let err = Error::transport("anthropic complete", "connection refused");
        assert_eq!(err.to_string(), "anthropic complete: connection refused");
        assert!(err.source().is_some());
    }

    #[test]
    fn test_agent_error_displays_cause() {
        let err = AgentError {
            usage: Usage::new(3, 4),
            rounds: 1,
            source: Error::schema("cat", "expected a JSON object"),
        };
        assert_eq!(
            err.to_string(),
            "Invalid arguments for tool cat: expected a JSON object"
        );
        assert!(matches!(err.source, Error::Schema { .. }));
    }
}
