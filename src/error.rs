use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CrawlError>;

/// Pipeline stage, used to label fatal errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Index,
    Enrich,
    Persist,
    Signatures,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Index => "index",
            Phase::Enrich => "enrich",
            Phase::Persist => "persist",
            Phase::Signatures => "signatures",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("failed to fetch {url}: {reason}")]
    Fetch {
        url: String,
        reason: String,
        /// Rate limit, server error or timeout; a retry may succeed.
        transient: bool,
    },

    #[error("failed to write sink '{name}': {source}")]
    Write {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize sink '{name}': {source}")]
    Serialize {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to read artifact '{name}': {reason}")]
    Read { name: String, reason: String },

    #[error("worker failed: {reason}")]
    Worker { reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{phase} phase aborted: {source}")]
    Phase {
        phase: Phase,
        #[source]
        source: Box<CrawlError>,
    },
}

impl CrawlError {
    /// Permanent fetch failure.
    pub fn fetch(url: &str, reason: impl fmt::Display) -> Self {
        CrawlError::Fetch {
            url: url.to_string(),
            reason: reason.to_string(),
            transient: false,
        }
    }

    /// Failure worth retrying (timeouts).
    pub fn fetch_transient(url: &str, reason: impl fmt::Display) -> Self {
        CrawlError::Fetch {
            url: url.to_string(),
            reason: reason.to_string(),
            transient: true,
        }
    }

    /// Non-2xx response; 429 and 5xx are transient.
    pub fn fetch_status(url: &str, status: u16) -> Self {
        CrawlError::Fetch {
            url: url.to_string(),
            reason: format!("HTTP {}", status),
            transient: status == 429 || (500..600).contains(&status),
        }
    }

    pub fn in_phase(self, phase: Phase) -> Self {
        match self {
            already @ CrawlError::Phase { .. } => already,
            other => CrawlError::Phase {
                phase,
                source: Box::new(other),
            },
        }
    }

    /// True for failures worth retrying: rate limits, server errors and timeouts.
    pub fn is_transient(&self) -> bool {
        matches!(self, CrawlError::Fetch { transient: true, .. })
    }
}
