//! Purpose: Feed an async axum request body into the strict decoder.
//! Exports: `read_json`.
//! Role: Bridges the streaming body to the synchronous `Read`-based decoder.
//! Invariants: Never buffers more than `limit_bytes + 1` bytes of a body.
//! Invariants: Stream failures (e.g. client disconnect) surface as `DecodeError::Unclassified`.

use axum::body::Body;
use bytes::BytesMut;
use serde::de::DeserializeOwned;
use tokio_stream::StreamExt;

use crate::json::parse::{DecodeError, decode};

pub async fn read_json<T: DeserializeOwned>(body: Body, limit_bytes: u64) -> Result<T, DecodeError> {
    // One byte past the ceiling is enough for the decoder to report the overflow.
    let cap = usize::try_from(limit_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(1);

    let mut buf = BytesMut::new();
    let mut stream = body.into_data_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|err| DecodeError::Unclassified {
            raw: err.to_string(),
        })?;
        let take = chunk.len().min(cap - buf.len());
        buf.extend_from_slice(&chunk[..take]);
        if buf.len() >= cap {
            break;
        }
    }

    decode(&buf[..], limit_bytes)
}
