//! Error types for the proxy.
//!
//! Upstream attempt failures are recovered inside the forwarder. Everything
//! else ends up as a [`ProxyError`] in the server loop.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Invalid configuration, including an unreadable or malformed blacklist.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read blacklist {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed blacklist line {line}: {content:?} (expected `domain::marker`)")]
    MalformedLine { line: usize, content: String },

    #[error("at least one upstream resolver is required")]
    NoUpstreams,

    #[error("retry attempts must be at least 1")]
    ZeroAttempts,
}

/// A DNS message that could not be decoded.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("message truncated at offset {0}")]
    Truncated(usize),

    #[error("message has no question")]
    NoQuestion,

    #[error("invalid label at offset {0}")]
    BadLabel(usize),

    #[error("compression pointer loop at offset {0}")]
    PointerLoop(usize),

    #[error("message is not a response")]
    NotAResponse,
}

/// A single upstream exchange that failed.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    #[error("bad reply: {0}")]
    Decode(#[from] DecodeError),

    #[error("reply id {got:#06x} does not match query id {expected:#06x}")]
    IdMismatch { expected: u16, got: u16 },
}

/// Every upstream in every round failed.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("all {attempts} upstream attempts failed")]
    Exhausted { attempts: usize },
}

/// Errors that reach the server loop.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("socket error: {0}")]
    Socket(#[from] io::Error),

    #[error("undecodable query: {0}")]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Upstream(#[from] ForwardError),
}

impl ProxyError {
    /// Whether the error concerns a single request only, so the session may
    /// drop that request and keep listening.
    pub fn is_request_scoped(&self) -> bool {
        matches!(self, ProxyError::Decode(_) | ProxyError::Upstream(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_scoped_errors() {
        assert!(ProxyError::from(DecodeError::NoQuestion).is_request_scoped());
        assert!(ProxyError::from(ForwardError::Exhausted { attempts: 6 }).is_request_scoped());
        assert!(!ProxyError::from(io::Error::from(io::ErrorKind::AddrInUse)).is_request_scoped());
        assert!(!ProxyError::from(ConfigError::NoUpstreams).is_request_scoped());
    }

    #[test]
    fn malformed_line_message_names_the_line() {
        let err = ConfigError::MalformedLine {
            line: 4,
            content: "a::b::c".to_string(),
        };

        assert!(err.to_string().contains("line 4"));
    }
}
