//! Decoding and encoding of opaque move payloads.

use derive_more::{Display, Error};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::instrument;

/// Converts between a move's semantic type and its opaque wire bytes.
///
/// Implementations must be pure and stateless: decoding the same bytes twice
/// yields equal values, and the codec is never applied to an already-decoded
/// value.
pub trait MoveCodec<M>: Send + Sync {
    /// Decodes the raw bytes of a move into its semantic type.
    fn decode(&self, bytes: &[u8]) -> Result<M, CodecError>;

    /// Encodes a move for submission to the backend.
    fn encode(&self, game_move: &M) -> Result<Vec<u8>, CodecError>;
}

/// Codec using JSON as the wire format.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonMoveCodec;

impl<M> MoveCodec<M> for JsonMoveCodec
where
    M: Serialize + DeserializeOwned,
{
    fn decode(&self, bytes: &[u8]) -> Result<M, CodecError> {
        serde_json::from_slice(bytes)
            .map_err(|e| CodecError::new(format!("Failed to decode move payload: {}", e)))
    }

    fn encode(&self, game_move: &M) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(game_move)
            .map_err(|e| CodecError::new(format!("Failed to encode move payload: {}", e)))
    }
}

/// Malformed-payload error with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("Codec error: {} at {}:{}", message, file, line)]
pub struct CodecError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl CodecError {
    /// Creates a new codec error with caller location tracking.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Placement {
        x: u8,
        y: u8,
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let codec = JsonMoveCodec;
        let placement = Placement { x: 2, y: 1 };
        let bytes = codec.encode(&placement).expect("Encode failed");
        let back: Placement = codec.decode(&bytes).expect("Decode failed");
        assert_eq!(back, placement);
    }

    #[test]
    fn test_decode_is_idempotent() {
        let codec = JsonMoveCodec;
        let bytes = codec.encode(&Placement { x: 0, y: 0 }).expect("Encode failed");
        let first: Placement = codec.decode(&bytes).expect("Decode failed");
        let second: Placement = codec.decode(&bytes).expect("Decode failed");
        assert_eq!(first, second);
    }

    #[test]
    fn test_decode_malformed_payload_fails() {
        let codec = JsonMoveCodec;
        let result: Result<Placement, _> = codec.decode(b"not json");
        assert!(result.is_err());
    }
}
