use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// What went wrong talking to a hosted collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamKind {
    Auth,
    RateLimited,
    Timeout,
    Status(u16),
    Transport,
    InvalidResponse,
}

impl fmt::Display for UpstreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auth => f.write_str("authentication failed"),
            Self::RateLimited => f.write_str("rate limited"),
            Self::Timeout => f.write_str("timed out"),
            Self::Status(code) => write!(f, "HTTP {}", code),
            Self::Transport => f.write_str("transport error"),
            Self::InvalidResponse => f.write_str("invalid response"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("{service} {kind}: {message}")]
    Upstream { service: String, kind: UpstreamKind, message: String },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self { Self::Io { path: path.into(), source } }

    pub fn config(msg: impl Into<String>) -> Self { Self::Configuration(msg.into()) }

    pub fn upstream(service: impl Into<String>, kind: UpstreamKind, message: impl Into<String>) -> Self {
        Self::Upstream { service: service.into(), kind, message: message.into() }
    }

    /// Map a non-success HTTP status from a hosted API onto the taxonomy.
    pub fn from_status(service: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        let kind = match status {
            401 | 403 => UpstreamKind::Auth,
            429 => UpstreamKind::RateLimited,
            408 | 504 => UpstreamKind::Timeout,
            code => UpstreamKind::Status(code),
        };
        Self::upstream(service, kind, body)
    }

    pub fn upstream_kind(&self) -> Option<UpstreamKind> {
        match self {
            Self::Upstream { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn is_upstream(&self) -> bool { matches!(self, Self::Upstream { .. }) }
}

pub type Result<T> = std::result::Result<T, Error>;
