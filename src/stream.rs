//! Framing for the statuses/filter live stream.
//!
//! The v1.1 filtered stream delivers newline-delimited JSON over a
//! long-lived chunked response, with blank keep-alive lines. A reader task
//! reassembles chunks into lines and hands decoded payloads to the caller
//! through a channel; transport failures while reading the body surface as
//! [`Error::Transport`] and end the stream.

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{Error, Result};

/// A live sequence of raw tweet payloads.
///
/// Yields `None` once the connection has ended, after any terminal error
/// has been delivered.
#[derive(Debug)]
pub struct StatusStream {
    rx: mpsc::Receiver<Result<Value>>,
}

impl StatusStream {
    pub(crate) fn new(rx: mpsc::Receiver<Result<Value>>) -> Self {
        Self { rx }
    }

    /// Receive the next raw payload, in delivery order.
    pub async fn next(&mut self) -> Option<Result<Value>> {
        self.rx.recv().await
    }

    /// Build a stream from pre-framed items. Test seam for callers that
    /// fake the API capability.
    pub fn from_items(items: Vec<Result<Value>>) -> Self {
        let (tx, rx) = mpsc::channel(items.len().max(1));
        for item in items {
            // capacity matches item count, send cannot fail
            let _ = tx.try_send(item);
        }
        Self::new(rx)
    }
}

/// Spawn a reader task over a streaming HTTP response body.
pub(crate) fn spawn_reader(response: reqwest::Response) -> StatusStream {
    let (tx, rx) = mpsc::channel(256);
    let body = response
        .bytes_stream()
        .map(|chunk| chunk.map_err(|e| Error::Transport(e.to_string())));

    tokio::spawn(async move {
        pump(body, tx).await;
    });

    StatusStream::new(rx)
}

/// Reassemble body chunks into JSON payloads and forward them on `tx`.
///
/// Returns when the body ends, a transport error occurs, or the receiver
/// is dropped.
async fn pump<S>(body: S, tx: mpsc::Sender<Result<Value>>)
where
    S: Stream<Item = std::result::Result<Bytes, Error>>,
{
    futures_util::pin_mut!(body);
    let mut buffer: Vec<u8> = Vec::new();

    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                let _ = tx.send(Err(e)).await;
                return;
            }
        };

        buffer.extend_from_slice(&chunk);

        while let Some(newline) = buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&line).trim().to_string();

            // Blank lines are keep-alive signals.
            if line.is_empty() {
                debug!("stream keep-alive");
                continue;
            }

            let item = serde_json::from_str::<Value>(&line).map_err(Error::from);
            if tx.send(item).await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    async fn collect(chunks: Vec<std::result::Result<Bytes, Error>>) -> Vec<Result<Value>> {
        let (tx, rx) = mpsc::channel(64);
        pump(stream::iter(chunks), tx).await;

        let mut stream = StatusStream::new(rx);
        let mut out = Vec::new();
        while let Some(item) = stream.next().await {
            out.push(item);
        }
        out
    }

    #[tokio::test]
    async fn payloads_split_across_chunks_are_reassembled() {
        let items = collect(vec![
            Ok(Bytes::from_static(b"{\"id\":1}\r\n{\"id\"")),
            Ok(Bytes::from_static(b":2}\r\n")),
        ])
        .await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap()["id"], 1);
        assert_eq!(items[1].as_ref().unwrap()["id"], 2);
    }

    #[tokio::test]
    async fn keep_alive_lines_are_skipped() {
        let items = collect(vec![
            Ok(Bytes::from_static(b"\r\n")),
            Ok(Bytes::from_static(b"\r\n{\"id\":3}\r\n\r\n")),
        ])
        .await;

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_ref().unwrap()["id"], 3);
    }

    #[tokio::test]
    async fn transport_error_ends_the_stream() {
        let items = collect(vec![
            Ok(Bytes::from_static(b"{\"id\":4}\r\n")),
            Err(Error::Transport("connection reset by peer".into())),
        ])
        .await;

        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(items[1], Err(Error::Transport(_))));
    }

    #[tokio::test]
    async fn malformed_line_surfaces_as_json_error() {
        let items = collect(vec![Ok(Bytes::from_static(b"not json\r\n"))]).await;

        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(Error::Json(_))));
    }

    #[tokio::test]
    async fn from_items_yields_in_order_then_ends() {
        let mut stream = StatusStream::from_items(vec![
            Ok(serde_json::json!({"id": 1})),
            Ok(serde_json::json!({"id": 2})),
        ]);

        assert_eq!(stream.next().await.unwrap().unwrap()["id"], 1);
        assert_eq!(stream.next().await.unwrap().unwrap()["id"], 2);
        assert!(stream.next().await.is_none());
    }
}
