//! Response transport module
//!
//! The byte-level layer beneath `ServerResponse`: a head is sent exactly once,
//! either together with a complete body or followed by streamed chunks.

use crate::error::TransportError;
use futures::channel::mpsc;
use futures::{future, stream, FutureExt, SinkExt, StreamExt};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::{Bytes, Frame};
use hyper::http::{HeaderMap, StatusCode};
use hyper::Response;
use std::convert::Infallible;
use std::future::Future;
use tokio::sync::oneshot;

/// Body type handed to hyper
pub type ResponseBody = UnsyncBoxBody<Bytes, TransportError>;

/// Number of frames buffered between a streaming render and the connection
const STREAM_BUFFER: usize = 16;

type FrameResult = Result<Frame<Bytes>, TransportError>;

/// Destination of a response head and body
pub trait Transport: Send {
    /// Send head and complete body, ending the response
    fn send_full(
        &mut self,
        status: StatusCode,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<(), TransportError>;

    /// Send the head of a response whose body follows in chunks
    fn start_stream(&mut self, status: StatusCode, headers: &HeaderMap)
        -> Result<(), TransportError>;

    fn send_chunk(
        &mut self,
        chunk: Bytes,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// End a streamed body cleanly
    fn finish_stream(&mut self) -> Result<(), TransportError>;

    /// End a streamed body so the peer sees a broken transfer
    fn abort_stream(&mut self);
}

/// Transport feeding a hyper `service_fn`
///
/// The head travels through a oneshot to the service future; streamed frames
/// go through a bounded channel that backs the response body.
pub struct HyperTransport {
    head: Option<oneshot::Sender<Response<ResponseBody>>>,
    body: Option<BodySender>,
}

/// Writing half of a streamed body
struct BodySender {
    frames: mpsc::Sender<FrameResult>,
    /// Out of band of `frames`, so an abort never waits on buffer space
    abort: oneshot::Sender<TransportError>,
}

impl HyperTransport {
    /// Create a transport and the receiver the service awaits for its response
    pub fn channel() -> (Self, oneshot::Receiver<Response<ResponseBody>>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                head: Some(tx),
                body: None,
            },
            rx,
        )
    }

    fn send_head(
        &mut self,
        status: StatusCode,
        headers: &HeaderMap,
        body: ResponseBody,
    ) -> Result<(), TransportError> {
        let tx = self.head.take().ok_or(TransportError::HeadAlreadySent)?;
        let mut response = Response::new(body);
        *response.status_mut() = status;
        response.headers_mut().clone_from(headers);
        tx.send(response).map_err(|_| TransportError::Disconnected)
    }
}

impl Transport for HyperTransport {
    fn send_full(
        &mut self,
        status: StatusCode,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<(), TransportError> {
        let body = Full::new(body)
            .map_err(|never: Infallible| match never {})
            .boxed_unsync();
        self.send_head(status, headers, body)
    }

    fn start_stream(
        &mut self,
        status: StatusCode,
        headers: &HeaderMap,
    ) -> Result<(), TransportError> {
        let (frames, frames_rx) = mpsc::channel(STREAM_BUFFER);
        let (abort, abort_rx) = oneshot::channel();

        // A dropped abort sender yields nothing; the body then ends with `frames`
        let aborted = abort_rx
            .into_stream()
            .filter_map(|sent| future::ready(sent.ok().map(Err)));
        let body = StreamBody::new(stream::select(frames_rx, aborted));

        self.send_head(status, headers, body.boxed_unsync())?;
        self.body = Some(BodySender { frames, abort });
        Ok(())
    }

    async fn send_chunk(&mut self, chunk: Bytes) -> Result<(), TransportError> {
        let body = self.body.as_mut().ok_or(TransportError::NotStreaming)?;
        body.frames
            .send(Ok(Frame::data(chunk)))
            .await
            .map_err(|_| TransportError::Disconnected)
    }

    fn finish_stream(&mut self) -> Result<(), TransportError> {
        // Dropping both senders ends the body
        self.body.take().map(drop).ok_or(TransportError::NotStreaming)
    }

    fn abort_stream(&mut self) {
        if let Some(body) = self.body.take() {
            // Receiver gone means the peer already left
            let _ = body.abort.send(TransportError::Aborted);
        }
    }
}

/// Transport that records the response in memory
///
/// Useful for embedding the dispatcher where no socket is involved, and as a
/// response double in tests.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    pub status: Option<StatusCode>,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    /// Number of heads the response tried to send
    pub heads_sent: usize,
    pub streamed: bool,
    pub finished: bool,
    pub aborted: bool,
    /// Simulate the peer going away after this many chunks
    pub disconnect_after: Option<usize>,
    chunks: usize,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn disconnecting_after(chunks: usize) -> Self {
        Self {
            disconnect_after: Some(chunks),
            ..Self::default()
        }
    }

    fn record_head(&mut self, status: StatusCode, headers: &HeaderMap) -> Result<(), TransportError> {
        self.heads_sent += 1;
        if self.heads_sent > 1 {
            return Err(TransportError::HeadAlreadySent);
        }
        self.status = Some(status);
        self.headers.clone_from(headers);
        Ok(())
    }
}

impl Transport for MemoryTransport {
    fn send_full(
        &mut self,
        status: StatusCode,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<(), TransportError> {
        self.record_head(status, headers)?;
        self.body.extend_from_slice(&body);
        self.finished = true;
        Ok(())
    }

    fn start_stream(
        &mut self,
        status: StatusCode,
        headers: &HeaderMap,
    ) -> Result<(), TransportError> {
        self.record_head(status, headers)?;
        self.streamed = true;
        Ok(())
    }

    async fn send_chunk(&mut self, chunk: Bytes) -> Result<(), TransportError> {
        if !self.streamed || self.finished {
            return Err(TransportError::NotStreaming);
        }
        if self.disconnect_after.is_some_and(|limit| self.chunks >= limit) {
            return Err(TransportError::Disconnected);
        }
        self.chunks += 1;
        self.body.extend_from_slice(&chunk);
        Ok(())
    }

    fn finish_stream(&mut self) -> Result<(), TransportError> {
        if !self.streamed {
            return Err(TransportError::NotStreaming);
        }
        self.finished = true;
        Ok(())
    }

    fn abort_stream(&mut self) {
        self.aborted = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::{HeaderValue, CONTENT_TYPE};

    fn text_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        headers
    }

    #[tokio::test]
    async fn test_full_response_reaches_service() {
        let (mut transport, head) = HyperTransport::channel();
        transport
            .send_full(StatusCode::OK, &text_headers(), Bytes::from_static(b"hi"))
            .unwrap();

        let response = head.await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain");
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, "hi");
    }

    #[tokio::test]
    async fn test_streamed_chunks_arrive_in_order() {
        let (mut transport, head) = HyperTransport::channel();
        transport.start_stream(StatusCode::OK, &text_headers()).unwrap();
        transport.send_chunk(Bytes::from_static(b"a")).await.unwrap();
        transport.send_chunk(Bytes::from_static(b"b")).await.unwrap();
        transport.finish_stream().unwrap();

        let body = head.await.unwrap().into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, "ab");
    }

    #[tokio::test]
    async fn test_abort_surfaces_body_error() {
        let (mut transport, head) = HyperTransport::channel();
        transport.start_stream(StatusCode::OK, &text_headers()).unwrap();
        transport.send_chunk(Bytes::from_static(b"a")).await.unwrap();
        transport.abort_stream();

        let result = head.await.unwrap().into_body().collect().await;
        assert!(matches!(result, Err(TransportError::Aborted)));
    }

    #[tokio::test]
    async fn test_abort_with_full_buffer_surfaces_body_error() {
        let (mut transport, head) = HyperTransport::channel();
        transport.start_stream(StatusCode::OK, &text_headers()).unwrap();

        // Nobody reads the body yet, so sends stop completing once the buffer is full
        let mut buffered = 0;
        while transport
            .send_chunk(Bytes::from_static(b"x"))
            .now_or_never()
            .is_some()
        {
            buffered += 1;
        }
        assert!(buffered >= STREAM_BUFFER);
        transport.abort_stream();

        let result = head.await.unwrap().into_body().collect().await;
        assert!(matches!(result, Err(TransportError::Aborted)));
    }

    #[tokio::test]
    async fn test_finish_with_full_buffer_ends_cleanly() {
        let (mut transport, head) = HyperTransport::channel();
        transport.start_stream(StatusCode::OK, &text_headers()).unwrap();
        for _ in 0..STREAM_BUFFER {
            transport.send_chunk(Bytes::from_static(b"x")).await.unwrap();
        }
        transport.finish_stream().unwrap();

        let body = head.await.unwrap().into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body.len(), STREAM_BUFFER);
    }

    #[test]
    fn test_second_head_rejected() {
        let (mut transport, _head) = HyperTransport::channel();
        transport
            .send_full(StatusCode::OK, &HeaderMap::new(), Bytes::new())
            .unwrap();
        let err = transport
            .send_full(StatusCode::OK, &HeaderMap::new(), Bytes::new())
            .unwrap_err();
        assert!(matches!(err, TransportError::HeadAlreadySent));
    }

    #[test]
    fn test_dropped_service_is_disconnect() {
        let (mut transport, head) = HyperTransport::channel();
        drop(head);
        let err = transport
            .send_full(StatusCode::OK, &HeaderMap::new(), Bytes::new())
            .unwrap_err();
        assert!(matches!(err, TransportError::Disconnected));
    }

    #[tokio::test]
    async fn test_memory_transport_disconnects() {
        let mut transport = MemoryTransport::disconnecting_after(1);
        transport.start_stream(StatusCode::OK, &HeaderMap::new()).unwrap();
        transport.send_chunk(Bytes::from_static(b"a")).await.unwrap();
        let err = transport.send_chunk(Bytes::from_static(b"b")).await.unwrap_err();
        assert!(matches!(err, TransportError::Disconnected));
        assert_eq!(transport.body, b"a");
    }
}
