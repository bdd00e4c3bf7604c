//! HTTP response module
//!
//! `ServerResponse` is the mutable response handle the dispatcher works on.
//! It tracks whether anything has gone out on the wire, so every terminating
//! write happens at most once and headers are frozen once the head is sent.
//! The free builders cover the few responses the server produces directly.

use crate::error::TransportError;
use crate::http::transport::{ResponseBody, Transport};
use crate::logger;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::{HeaderName, HeaderValue};
use hyper::http::{HeaderMap, StatusCode};
use hyper::Response;
use std::convert::Infallible;

/// Lifecycle of a single response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseState {
    /// Status and headers are still mutable
    NotSent,
    /// Head is out, body chunks are flowing
    Streaming,
    /// Terminal
    Sent,
}

/// Response handle over a `Transport`
pub struct ServerResponse<T> {
    status: StatusCode,
    headers: HeaderMap,
    state: ResponseState,
    bytes_sent: usize,
    transport: T,
}

impl<T: Transport> ServerResponse<T> {
    pub fn new(transport: T) -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            state: ResponseState::NotSent,
            bytes_sent: 0,
            transport,
        }
    }

    pub const fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        if self.is_sent() {
            logger::log_warning(&format!("Status {status} ignored, response head already sent"));
            return;
        }
        self.status = status;
    }

    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable headers. Changes after the head was sent never reach the wire.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Set a header, replacing any previous values
    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    pub const fn state(&self) -> ResponseState {
        self.state
    }

    /// True once the head has been handed to the transport
    pub fn is_sent(&self) -> bool {
        self.state != ResponseState::NotSent
    }

    /// Body bytes handed to the transport so far
    pub const fn bytes_sent(&self) -> usize {
        self.bytes_sent
    }

    pub const fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Send head and complete body, ending the response
    ///
    /// A no-op on a response that already ended.
    pub fn end(&mut self, body: Bytes) -> Result<(), TransportError> {
        match self.state {
            ResponseState::NotSent => {
                self.state = ResponseState::Sent;
                let len = body.len();
                self.transport.send_full(self.status, &self.headers, body)?;
                self.bytes_sent = len;
                Ok(())
            }
            ResponseState::Streaming => Err(TransportError::HeadAlreadySent),
            ResponseState::Sent => {
                logger::log_warning("Response already sent, ignoring end");
                Ok(())
            }
        }
    }

    /// End the response without a body
    pub fn end_empty(&mut self) -> Result<(), TransportError> {
        self.end(Bytes::new())
    }

    /// Write a body chunk, sending the head first if needed
    pub async fn write(&mut self, chunk: Bytes) -> Result<(), TransportError> {
        match self.state {
            ResponseState::NotSent => {
                self.state = ResponseState::Streaming;
                self.transport.start_stream(self.status, &self.headers)?;
            }
            ResponseState::Streaming => {}
            ResponseState::Sent => {
                logger::log_warning("Response already sent, dropping body chunk");
                return Ok(());
            }
        }

        if chunk.is_empty() {
            return Ok(());
        }
        let len = chunk.len();
        self.transport.send_chunk(chunk).await?;
        self.bytes_sent += len;
        Ok(())
    }

    /// Finish a streamed body. A response that never wrote ends empty.
    pub fn finish(&mut self) -> Result<(), TransportError> {
        match self.state {
            ResponseState::NotSent => self.end_empty(),
            ResponseState::Streaming => {
                self.state = ResponseState::Sent;
                self.transport.finish_stream()
            }
            ResponseState::Sent => Ok(()),
        }
    }

    /// Break off a streamed body
    pub fn abort(&mut self) {
        if self.state == ResponseState::Streaming {
            self.transport.abort_stream();
        }
        self.state = ResponseState::Sent;
    }
}

fn full_body(text: &'static str) -> ResponseBody {
    Full::new(Bytes::from_static(text.as_bytes()))
        .map_err(|never: Infallible| match never {})
        .boxed_unsync()
}

/// Build 405 Method Not Allowed response
pub fn build_405_response() -> Response<ResponseBody> {
    Response::builder()
        .status(405)
        .header("Content-Type", "text/plain")
        .header("Allow", "GET, HEAD")
        .body(full_body("405 Method Not Allowed"))
        .unwrap_or_else(|e| {
            log_build_error("405", &e);
            Response::new(full_body(""))
        })
}

/// Build 500 Internal Server Error response
pub fn build_500_response() -> Response<ResponseBody> {
    Response::builder()
        .status(500)
        .header("Content-Type", "text/plain")
        .body(full_body("500 Internal Server Error"))
        .unwrap_or_else(|e| {
            log_build_error("500", &e);
            Response::new(full_body(""))
        })
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    logger::log_error(&format!("Failed to build {status} response: {error}"));
}
