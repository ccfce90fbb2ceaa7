// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire format: 4-byte length prefix (big-endian) + JSON payload.
//!
//! Shared by the operator socket and the guest-facing listener alike —
//! see the crate-level doc comment for why there is one framing, not two.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Frames larger than this are refused outright rather than allocating
/// an attacker-controlled buffer size.
pub const MAX_FRAME_BYTES: u32 = 64 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("message of {0} bytes exceeds the {MAX_FRAME_BYTES} byte limit")]
    FrameTooLarge(u32),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serialize a value to its framed bytes: 4-byte BE length + JSON body.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, ProtocolError> {
    let body = serde_json::to_vec(value)?;
    if body.len() as u64 > MAX_FRAME_BYTES as u64 {
        return Err(ProtocolError::FrameTooLarge(body.len() as u32));
    }
    let mut framed = Vec::with_capacity(4 + body.len());
    framed.extend_from_slice(&(body.len() as u32).to_be_bytes());
    framed.extend_from_slice(&body);
    Ok(framed)
}

/// Parse a length-prefixed JSON body (without the 4-byte prefix).
pub fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(body)?)
}

/// Read one framed message from an async stream.
pub async fn read_message<T: DeserializeOwned, R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<T, ProtocolError> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_BYTES {
        return Err(ProtocolError::FrameTooLarge(len));
    }
    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body).await?;
    decode(&body)
}

/// Write one framed message to an async stream.
pub async fn write_message<T: Serialize, W: AsyncWrite + Unpin>(
    writer: &mut W,
    value: &T,
) -> Result<(), ProtocolError> {
    let framed = encode(value)?;
    writer.write_all(&framed).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Ping {
        n: u32,
    }

    #[tokio::test]
    async fn round_trips_through_an_in_memory_duplex() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        write_message(&mut a, &Ping { n: 7 }).await.unwrap();
        let got: Ping = read_message(&mut b).await.unwrap();
        assert_eq!(got, Ping { n: 7 });
    }

    #[test]
    fn encode_then_decode_matches_original() {
        let framed = encode(&Ping { n: 42 }).unwrap();
        let body = &framed[4..];
        let decoded: Ping = decode(body).unwrap();
        assert_eq!(decoded, Ping { n: 42 });
    }

    #[tokio::test]
    async fn oversized_length_prefix_is_rejected_before_allocating() {
        let (mut a, mut b) = tokio::io::duplex(16);
        let huge = (MAX_FRAME_BYTES + 1).to_be_bytes();
        a.write_all(&huge).await.unwrap();
        let result: Result<Ping, _> = read_message(&mut b).await;
        assert!(matches!(result, Err(ProtocolError::FrameTooLarge(_))));
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Labeled {
        n: u32,
        label: String,
    }

    proptest::proptest! {
        /// The 4-byte prefix always equals the JSON body's exact length,
        /// for any payload shape — not just the fixed-size `Ping` above.
        #[test]
        fn length_prefix_always_matches_body_len(n in proptest::prelude::any::<u32>(), label in ".{0,64}") {
            let framed = encode(&Labeled { n, label }).unwrap();
            let declared = u32::from_be_bytes(framed[..4].try_into().unwrap()) as usize;
            proptest::prop_assert_eq!(declared, framed.len() - 4);
        }

        /// Decoding the body of an arbitrary encoded payload always
        /// recovers the original value.
        #[test]
        fn decode_of_encode_recovers_original(n in proptest::prelude::any::<u32>(), label in ".{0,64}") {
            let original = Labeled { n, label };
            let framed = encode(&original).unwrap();
            let decoded: Labeled = decode(&framed[4..]).unwrap();
            proptest::prop_assert_eq!(decoded, original);
        }
    }
}
