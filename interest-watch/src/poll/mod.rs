//! Poll client.
//!
//! One request per tick, carrying the current watermark. The client only
//! detects; it never touches the watermark or the alert channels.

mod http;

pub use http::{HttpPollClient, PollClientConfig};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Poll failure. Both variants are non-fatal for the scheduler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PollError {
    /// Network failure, timeout or non-2xx status.
    #[error("poll transport error: {0}")]
    Transport(String),
    /// The response body was not a valid poll payload.
    #[error("poll decode error: {0}")]
    Decode(String),
}

/// Outcome of one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollResult {
    pub has_new: bool,
    pub latest_id: u64,
    pub new_count: u64,
}

/// Wire shape of the endpoint response. Every field is optional here so that
/// absence can be told apart from `false`/`0`.
#[derive(Debug, Deserialize)]
struct PollResponse {
    has_new: Option<bool>,
    last_id: Option<u64>,
    count: Option<u64>,
}

impl PollResult {
    /// Result for a server reporting nothing new.
    pub fn nothing_new() -> Self {
        Self {
            has_new: false,
            latest_id: 0,
            new_count: 0,
        }
    }

    /// Decode a response body.
    ///
    /// `has_new` is mandatory. When it is `true`, `last_id` and `count` are
    /// mandatory too; when it is `false` the server may omit them.
    pub fn decode(body: &[u8]) -> Result<Self, PollError> {
        let response: PollResponse = serde_json::from_slice(body)
            .map_err(|e| PollError::Decode(format!("invalid poll payload: {}", e)))?;

        let has_new = response
            .has_new
            .ok_or_else(|| PollError::Decode("missing field `has_new`".to_string()))?;

        if !has_new {
            return Ok(Self {
                has_new,
                latest_id: response.last_id.unwrap_or(0),
                new_count: response.count.unwrap_or(0),
            });
        }

        let latest_id = response
            .last_id
            .ok_or_else(|| PollError::Decode("missing field `last_id`".to_string()))?;
        let new_count = response
            .count
            .ok_or_else(|| PollError::Decode("missing field `count`".to_string()))?;

        Ok(Self {
            has_new,
            latest_id,
            new_count,
        })
    }

    /// Whether this result should escalate against `watermark`.
    ///
    /// Both conditions are required: a retried or cached response reporting
    /// `has_new` with a stale id must not alert again, and a larger id with
    /// `has_new == false` is not treated as new either.
    pub fn is_new_since(&self, watermark: u64) -> bool {
        self.has_new && self.latest_id > watermark
    }
}

/// Source of poll results.
#[async_trait]
pub trait PollClient: Send + Sync {
    /// Ask the endpoint for events newer than `watermark`.
    async fn poll(&self, watermark: u64) -> Result<PollResult, PollError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_new_events() {
        let result = PollResult::decode(br#"{"has_new": true, "last_id": 15, "count": 3}"#).unwrap();
        assert_eq!(
            result,
            PollResult {
                has_new: true,
                latest_id: 15,
                new_count: 3
            }
        );
    }

    #[test]
    fn test_decode_nothing_new_without_ids() {
        let result = PollResult::decode(br#"{"has_new": false}"#).unwrap();
        assert_eq!(result, PollResult::nothing_new());
        assert!(!result.is_new_since(0));
    }

    #[test]
    fn test_decode_missing_has_new_is_error() {
        let err = PollResult::decode(br#"{"last_id": 15, "count": 3}"#).unwrap_err();
        assert!(matches!(err, PollError::Decode(_)));
    }

    #[test]
    fn test_decode_has_new_without_id_is_error() {
        let err = PollResult::decode(br#"{"has_new": true, "count": 3}"#).unwrap_err();
        assert_eq!(err, PollError::Decode("missing field `last_id`".to_string()));

        let err = PollResult::decode(br#"{"has_new": true, "last_id": 3}"#).unwrap_err();
        assert_eq!(err, PollError::Decode("missing field `count`".to_string()));
    }

    #[test]
    fn test_decode_rejects_malformed_payloads() {
        let bodies: [&[u8]; 4] = [
            b"not json",
            br#"{"has_new": "yes", "last_id": 1, "count": 1}"#,
            br#"{"has_new": true, "last_id": -1, "count": 1}"#,
            br#"[1, 2, 3]"#,
        ];
        for body in bodies {
            assert!(matches!(PollResult::decode(body), Err(PollError::Decode(_))));
        }
    }

    #[test]
    fn test_is_new_requires_both_conditions() {
        let watermark = 10;
        let make = |has_new, latest_id| PollResult {
            has_new,
            latest_id,
            new_count: 1,
        };

        assert!(make(true, 11).is_new_since(watermark));
        assert!(!make(true, 10).is_new_since(watermark));
        assert!(!make(true, 9).is_new_since(watermark));
        assert!(!make(false, 20).is_new_since(watermark));
    }
}
