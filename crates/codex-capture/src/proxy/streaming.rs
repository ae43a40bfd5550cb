//! Response body tee
//!
//! Wraps the upstream body stream so every chunk is forwarded to the client
//! unchanged and also appended to a local buffer. When the stream ends, errors
//! out, or is dropped because the client went away, the buffer is handed to a
//! [`BufferHandle`] together with whether the body arrived in full.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::Stream;
use tokio::sync::oneshot;

/// Body bytes observed by a [`TeeStream`]
#[derive(Debug, Clone)]
pub struct TeedBody {
    pub bytes: Vec<u8>,
    /// False if the stream errored or was dropped before its end
    pub complete: bool,
    pub finished_at: DateTime<Utc>,
}

/// Receives the buffered body once the tee is finished with it
pub struct BufferHandle {
    receiver: oneshot::Receiver<TeedBody>,
}

impl BufferHandle {
    /// Wait for the body. `None` only if the tee vanished without reporting,
    /// which does not happen in practice.
    pub async fn wait(self) -> Option<TeedBody> {
        self.receiver.await.ok()
    }
}

/// Stream wrapper that forwards chunks while keeping a copy
pub struct TeeStream<S> {
    inner: S,
    buffer: Vec<u8>,
    sender: Option<oneshot::Sender<TeedBody>>,
}

/// Tee `incoming`: forward the returned stream to the client, await the
/// handle for the captured copy.
pub fn tee<S, E>(incoming: S) -> (TeeStream<S>, BufferHandle)
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    let (sender, receiver) = oneshot::channel();
    let stream = TeeStream {
        inner: incoming,
        buffer: Vec::new(),
        sender: Some(sender),
    };
    (stream, BufferHandle { receiver })
}

impl<S> TeeStream<S> {
    fn finish(&mut self, complete: bool) {
        if let Some(sender) = self.sender.take() {
            let body = TeedBody {
                bytes: std::mem::take(&mut self.buffer),
                complete,
                finished_at: Utc::now(),
            };
            // Receiver gone means nobody wants the capture
            let _ = sender.send(body);
        }
    }
}

impl<S, E> Stream for TeeStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    type Item = Result<Bytes, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;

        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(bytes))) => {
                if this.sender.is_some() {
                    this.buffer.extend_from_slice(&bytes);
                }
                Poll::Ready(Some(Ok(bytes)))
            }
            Poll::Ready(Some(Err(e))) => {
                this.finish(false);
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.finish(true);
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<S> Drop for TeeStream<S> {
    fn drop(&mut self) {
        self.finish(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream::{self, StreamExt};

    #[tokio::test]
    async fn test_tee_forwards_and_buffers() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from("data: {\"a\":1}\n\n")),
            Ok(Bytes::from("data: {\"b\":2}\n\n")),
            Ok(Bytes::from("data: [DONE]\n\n")),
        ];
        let (mut client_stream, handle) = tee(stream::iter(chunks));

        let mut forwarded = Vec::new();
        while let Some(chunk) = client_stream.next().await {
            forwarded.extend_from_slice(&chunk.unwrap());
        }

        let body = handle.wait().await.unwrap();
        assert!(body.complete);
        assert_eq!(body.bytes, forwarded);
    }

    #[tokio::test]
    async fn test_tee_reports_error_as_incomplete() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from("partial")),
            Err(std::io::Error::other("reset")),
        ];
        let (mut client_stream, handle) = tee(stream::iter(chunks));

        assert!(client_stream.next().await.unwrap().is_ok());
        assert!(client_stream.next().await.unwrap().is_err());

        let body = handle.wait().await.unwrap();
        assert!(!body.complete);
        assert_eq!(body.bytes, b"partial");
    }

    #[tokio::test]
    async fn test_tee_drop_mid_stream_delivers_partial_body() {
        let (tx, rx) = tokio::sync::mpsc::channel::<Result<Bytes, std::io::Error>>(4);
        let (mut client_stream, handle) = tee(tokio_stream::wrappers::ReceiverStream::new(rx));

        tx.send(Ok(Bytes::from("data: {\"delta\":\"Hel\"}\n\n")))
            .await
            .unwrap();
        assert!(client_stream.next().await.is_some());

        // Client disconnects
        drop(client_stream);

        let body = handle.wait().await.unwrap();
        assert!(!body.complete);
        assert_eq!(body.bytes, b"data: {\"delta\":\"Hel\"}\n\n");
    }

    #[tokio::test]
    async fn test_tee_forwards_immediately() {
        let (tx, rx) = tokio::sync::mpsc::channel::<Result<Bytes, std::io::Error>>(4);
        let (mut client_stream, _handle) = tee(tokio_stream::wrappers::ReceiverStream::new(rx));

        tx.send(Ok(Bytes::from("chunk1"))).await.unwrap();
        assert_eq!(
            client_stream.next().await.unwrap().unwrap(),
            Bytes::from("chunk1")
        );

        tx.send(Ok(Bytes::from("chunk2"))).await.unwrap();
        assert_eq!(
            client_stream.next().await.unwrap().unwrap(),
            Bytes::from("chunk2")
        );

        drop(tx);
        assert!(client_stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_dropped_handle_does_not_disturb_stream() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![Ok(Bytes::from("x"))];
        let (client_stream, handle) = tee(stream::iter(chunks));
        drop(handle);

        let forwarded: Vec<_> = client_stream.collect().await;
        assert_eq!(forwarded.len(), 1);
    }
}
