// Chunked NDJSON streaming utilities
use axum::body::Body;
use axum::http::{header, Response, StatusCode};
use axum::response::IntoResponse;
use bytes::{BufMut, Bytes, BytesMut};
use futures::stream::Stream;
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// Create a chunked response emitting one JSON document per line
pub fn chunked_json_stream<S, T>(stream: S) -> Result<Response<Body>, StatusCode>
where
    S: Stream<Item = T> + Send + 'static,
    T: Serialize + Send + 'static,
{
    let byte_stream = stream.map(|msg| serialize_chunk(&msg));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, NDJSON_CONTENT_TYPE)
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(byte_stream))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Serialize a single message to a newline-terminated chunk
pub fn serialize_chunk<T: Serialize>(msg: &T) -> Result<Bytes, std::io::Error> {
    let json = serde_json::to_vec(msg).map_err(std::io::Error::other)?;
    let mut chunk = BytesMut::with_capacity(json.len() + 1);
    chunk.put_slice(&json);
    chunk.put_u8(b'\n');
    Ok(chunk.freeze())
}

/// Streams `initial` followed by every broadcast message until the sender
/// side closes or the client disconnects. Lagging clients skip ahead.
pub fn stream_from_broadcast<T>(initial: T, mut rx: broadcast::Receiver<T>) -> impl IntoResponse
where
    T: Serialize + Clone + Send + 'static,
{
    let stream = async_stream::stream! {
        yield initial;
        loop {
            match rx.recv().await {
                Ok(msg) => yield msg,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Stream client lagged, skipped {} updates", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    match chunked_json_stream(stream) {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_chunk_is_newline_terminated() {
        let chunk = serialize_chunk(&serde_json::json!({"value": 1})).unwrap();
        assert_eq!(&chunk[..], b"{\"value\":1}\n");
    }

    #[tokio::test]
    async fn test_broadcast_stream_starts_with_initial_and_ends_on_close() {
        let (tx, rx) = broadcast::channel::<u32>(4);

        let response = stream_from_broadcast(1, rx).into_response();
        tx.send(2).unwrap();
        tx.send(3).unwrap();
        drop(tx);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"1\n2\n3\n");
    }

    #[tokio::test]
    async fn test_lagging_client_skips_ahead() {
        let (tx, rx) = broadcast::channel::<u32>(2);
        for n in 10..15 {
            tx.send(n).unwrap();
        }
        drop(tx);

        let response = stream_from_broadcast(0, rx).into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"0\n13\n14\n");
    }
}
