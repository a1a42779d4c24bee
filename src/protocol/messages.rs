//! Request payloads and the decoded request type.

use serde::{Deserialize, Serialize};

use super::{kind, Envelope};
use crate::error::ProtocolError;
use crate::search::FuzzyMatch;

/// Default progress update frequency advertised by clients.
#[must_use]
pub const fn default_update_freq() -> f32 {
    10.0
}

/// Default number of search results.
#[must_use]
pub const fn default_max_results() -> usize {
    10
}

/// Payload of a `count` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountRequest {
    /// Directory to walk.
    pub dir: String,
    /// Requested progress frequency. Informational only; the walker samples
    /// on a fixed interval.
    #[serde(rename = "ufreq", default = "default_update_freq")]
    pub update_freq: f32,
}

/// Payload of an `index` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRequest {
    /// Directory to walk and index.
    pub dir: String,
    /// Requested progress frequency. Informational only.
    #[serde(rename = "ufreq", default = "default_update_freq")]
    pub update_freq: f32,
}

/// Payload of a `search` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Directory the client searched from. Logged, not used for filtering.
    #[serde(default)]
    pub dir: String,
    /// Filename (exact) or query string (fuzzy).
    pub search: String,
    /// Rank all indexed paths instead of matching filenames exactly.
    #[serde(default)]
    pub fuzzy: bool,
    /// Minimum fuzzy score to keep.
    #[serde(rename = "score", default)]
    pub min_score: i64,
    /// Maximum number of results, applied after ranking.
    #[serde(rename = "max", default = "default_max_results")]
    pub max_results: usize,
}

impl SearchRequest {
    /// Exact filename search with default limits.
    pub fn exact(filename: impl Into<String>) -> Self {
        Self {
            dir: String::new(),
            search: filename.into(),
            fuzzy: false,
            min_score: 0,
            max_results: default_max_results(),
        }
    }

    /// Fuzzy search with default limits.
    pub fn fuzzy(query: impl Into<String>) -> Self {
        Self {
            fuzzy: true,
            ..Self::exact(query)
        }
    }

    /// Override the result limit.
    #[must_use]
    pub const fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }
}

/// Body of a search response, written as a bare JSON array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SearchResults {
    /// Full paths whose filename matched exactly.
    Exact(Vec<String>),
    /// Ranked fuzzy matches.
    Fuzzy(Vec<FuzzyMatch>),
}

impl SearchResults {
    /// Number of results.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Exact(paths) => paths.len(),
            Self::Fuzzy(matches) => matches.len(),
        }
    }

    /// Whether there are no results.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A decoded client request.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Ping,
    Count(CountRequest),
    Index(IndexRequest),
    Search(SearchRequest),
    /// Shut the daemon down. The reason is the raw data string.
    Kill { reason: Option<String> },
    /// A type this server does not know.
    Unknown(String),
}

impl Request {
    /// Decode a request from its envelope.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Payload`] if the data does not match the type.
    pub fn from_envelope(envelope: &Envelope) -> Result<Self, ProtocolError> {
        Ok(match envelope.kind.as_str() {
            kind::PING => Self::Ping,
            kind::COUNT => Self::Count(envelope.payload()?),
            kind::INDEX => Self::Index(envelope.payload()?),
            kind::SEARCH => Self::Search(envelope.payload()?),
            kind::KILL => Self::Kill {
                reason: (!envelope.data.is_empty()).then(|| envelope.data.clone()),
            },
            other => Self::Unknown(other.to_string()),
        })
    }

    /// Parse and decode one request frame.
    ///
    /// # Errors
    ///
    /// Returns a [`ProtocolError`] if the frame or its payload is malformed.
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        Self::from_envelope(&Envelope::parse(line)?)
    }

    /// Encode this request as an envelope.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Encode`] if the payload cannot be serialized.
    pub fn to_envelope(&self) -> Result<Envelope, ProtocolError> {
        match self {
            Self::Ping => Ok(Envelope::bare(kind::PING)),
            Self::Count(req) => Envelope::with_payload(kind::COUNT, req),
            Self::Index(req) => Envelope::with_payload(kind::INDEX, req),
            Self::Search(req) => Envelope::with_payload(kind::SEARCH, req),
            Self::Kill { reason } => Ok(Envelope::new(
                kind::KILL,
                reason.clone().unwrap_or_default(),
            )),
            Self::Unknown(other) => Ok(Envelope::bare(other.clone())),
        }
    }

    /// Message type name of this request.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::Ping => kind::PING,
            Self::Count(_) => kind::COUNT,
            Self::Index(_) => kind::INDEX,
            Self::Search(_) => kind::SEARCH,
            Self::Kill { .. } => kind::KILL,
            Self::Unknown(other) => other.as_str(),
        }
    }
}
