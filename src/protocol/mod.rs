//! Wire protocol between clients and the daemon.
//!
//! Every frame is one line of JSON: an [`Envelope`] `{"type", "data"}` whose
//! `data` is itself a JSON-encoded payload for the message type. Search
//! responses are the exception: they are written as a bare JSON array.

mod messages;

pub use messages::{
    default_max_results, default_update_freq, CountRequest, IndexRequest, Request,
    SearchRequest, SearchResults,
};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Largest request frame the server accepts, in bytes.
pub const MAX_FRAME_LENGTH: usize = 1024 * 1024;

/// Message type names.
pub mod kind {
    pub const PING: &str = "ping";
    pub const PONG: &str = "pong";
    pub const COUNT: &str = "count";
    pub const INDEX: &str = "index";
    pub const SEARCH: &str = "search";
    pub const KILL: &str = "kill";
}

/// One protocol frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Message type, e.g. `count` or `index.progress`.
    #[serde(rename = "type")]
    pub kind: String,
    /// JSON-encoded payload, empty when the type carries none.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub data: String,
}

impl Envelope {
    /// Create an envelope with a raw data string.
    pub fn new(kind: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            data: data.into(),
        }
    }

    /// Create an envelope with no data.
    pub fn bare(kind: impl Into<String>) -> Self {
        Self::new(kind, String::new())
    }

    /// Create an envelope whose data is the JSON encoding of `payload`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Encode`] if the payload cannot be serialized.
    pub fn with_payload<T: Serialize>(
        kind: impl Into<String>,
        payload: &T,
    ) -> Result<Self, ProtocolError> {
        let data =
            serde_json::to_string(payload).map_err(|e| ProtocolError::Encode(e.to_string()))?;
        Ok(Self::new(kind, data))
    }

    /// `<op>.progress` frame carrying the running count.
    #[must_use]
    pub fn progress(op: &str, count: u64) -> Self {
        Self::new(format!("{op}.progress"), count.to_string())
    }

    /// `<op>.done` frame carrying the final count.
    #[must_use]
    pub fn done(op: &str, count: u64) -> Self {
        Self::new(format!("{op}.done"), count.to_string())
    }

    /// `<op>.error` frame carrying a message.
    #[must_use]
    pub fn error(op: &str, message: impl Into<String>) -> Self {
        Self::new(format!("{op}.error"), message)
    }

    /// Parse a frame. Trailing line terminators are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Malformed`] if the line is not an envelope.
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(line.trim_end_matches(['\r', '\n']))
            .map_err(|e| ProtocolError::Malformed(e.to_string()))
    }

    /// Decode the data field as a payload of type `T`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Payload`] if the data does not decode.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        serde_json::from_str(&self.data).map_err(|e| ProtocolError::payload(&self.kind, e))
    }

    /// Encode as a single frame, without the trailing newline.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Encode`] if serialization fails.
    pub fn to_frame(&self) -> Result<String, ProtocolError> {
        encode_frame(self)
    }

    /// Whether this frame is the `.progress` frame of `op`.
    #[must_use]
    pub fn is_progress_of(&self, op: &str) -> bool {
        self.kind.strip_prefix(op) == Some(".progress")
    }

    /// Whether this frame is the `.done` frame of `op`.
    #[must_use]
    pub fn is_done_of(&self, op: &str) -> bool {
        self.kind.strip_prefix(op) == Some(".done")
    }
}

/// Encode any value as one JSON frame, without the trailing newline.
///
/// # Errors
///
/// Returns [`ProtocolError::Encode`] if serialization fails.
pub fn encode_frame<T: Serialize + ?Sized>(value: &T) -> Result<String, ProtocolError> {
    serde_json::to_string(value).map_err(|e| ProtocolError::Encode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_envelope() {
        let env = Envelope::parse(r#"{"type":"count","data":"{\"dir\":\"/tmp\"}"}"#).unwrap();
        assert_eq!(env.kind, "count");
        assert_eq!(env.data, r#"{"dir":"/tmp"}"#);
    }

    #[test]
    fn test_parse_tolerates_line_terminators() {
        let env = Envelope::parse("{\"type\":\"ping\"}\r\n").unwrap();
        assert_eq!(env, Envelope::bare("ping"));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            Envelope::parse("not json"),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(Envelope::parse("").is_err());
        // data must be a string, not a nested object
        assert!(Envelope::parse(r#"{"type":"count","data":{"dir":"/"}}"#).is_err());
    }

    #[test]
    fn test_bare_frame_omits_data() {
        assert_eq!(Envelope::bare("pong").to_frame().unwrap(), r#"{"type":"pong"}"#);
    }

    #[test]
    fn test_progress_and_done_frames() {
        let progress = Envelope::progress("index", 42);
        assert_eq!(
            progress.to_frame().unwrap(),
            r#"{"type":"index.progress","data":"42"}"#
        );
        assert!(progress.is_progress_of("index"));
        assert!(!progress.is_progress_of("count"));

        let done = Envelope::done("count", 0);
        assert_eq!(done.kind, "count.done");
        assert!(done.is_done_of("count"));
        assert!(!done.is_progress_of("count"));
    }

    #[test]
    fn test_payload_decoding() {
        let env = Envelope::with_payload(
            kind::SEARCH,
            &SearchRequest {
                dir: "/".to_string(),
                search: "a.txt".to_string(),
                fuzzy: true,
                min_score: 5,
                max_results: 3,
            },
        )
        .unwrap();

        let req: SearchRequest = env.payload().unwrap();
        assert_eq!(req.search, "a.txt");
        assert!(req.fuzzy);
        assert_eq!(req.max_results, 3);
    }

    #[test]
    fn test_payload_error_names_the_kind() {
        let env = Envelope::new(kind::INDEX, "[]");
        let err = env.payload::<IndexRequest>().unwrap_err();
        assert!(err.to_string().starts_with("invalid index payload"));
    }
}
