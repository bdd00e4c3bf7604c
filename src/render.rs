//! Render results
//!
//! A render result is either static (one payload, possibly still being
//! computed) or dynamic (a stream of chunks of unknown total size). It is
//! consumed exactly once by the dispatcher.

use crate::error::{RenderError, SendError};
use crate::http::{ServerResponse, Transport};
use futures::future::{self, BoxFuture};
use futures::stream::BoxStream;
use futures::{FutureExt, Stream, StreamExt};
use hyper::body::Bytes;
use std::fmt;
use std::future::Future;

type PayloadFuture = BoxFuture<'static, Result<Bytes, RenderError>>;
type ChunkStream = BoxStream<'static, Result<Bytes, RenderError>>;

enum Body {
    Static(PayloadFuture),
    Dynamic(ChunkStream),
}

/// Output of a page renderer
pub struct RenderResult {
    body: Body,
    content_type: Option<String>,
}

impl RenderResult {
    /// Static result with an already computed payload
    pub fn from_static(payload: impl Into<Bytes>) -> Self {
        Self::from_future(future::ready(Ok(payload.into())))
    }

    /// Static result whose payload is produced by `payload`
    pub fn from_future<F>(payload: F) -> Self
    where
        F: Future<Output = Result<Bytes, RenderError>> + Send + 'static,
    {
        Self {
            body: Body::Static(payload.boxed()),
            content_type: None,
        }
    }

    /// Dynamic result streamed chunk by chunk
    pub fn from_stream<S>(chunks: S) -> Self
    where
        S: Stream<Item = Result<Bytes, RenderError>> + Send + 'static,
    {
        Self {
            body: Body::Dynamic(chunks.boxed()),
            content_type: None,
        }
    }

    /// Declare the content type the payload should be served with
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub const fn is_dynamic(&self) -> bool {
        matches!(self.body, Body::Dynamic(_))
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Resolve a static payload; a dynamic body is returned unpolled
    pub async fn materialize(self) -> Result<RenderBody, RenderError> {
        match self.body {
            Body::Static(payload) => payload.await.map(RenderBody::Static),
            Body::Dynamic(chunks) => Ok(RenderBody::Dynamic(DynamicBody { chunks })),
        }
    }
}

impl fmt::Debug for RenderResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderResult")
            .field("dynamic", &self.is_dynamic())
            .field("content_type", &self.content_type)
            .finish()
    }
}

/// A render result after materialization
pub enum RenderBody {
    Static(Bytes),
    Dynamic(DynamicBody),
}

impl RenderBody {
    /// The materialized payload. `None` for streams; `Some` may be empty.
    pub const fn payload(&self) -> Option<&Bytes> {
        match self {
            Self::Static(payload) => Some(payload),
            Self::Dynamic(_) => None,
        }
    }
}

/// Chunk stream of a dynamic render result
pub struct DynamicBody {
    chunks: ChunkStream,
}

impl DynamicBody {
    /// Drain the stream into `res` and finish it
    ///
    /// A render or transport failure aborts the response and is returned
    /// as is.
    pub async fn pipe<T: Transport>(mut self, res: &mut ServerResponse<T>) -> Result<(), SendError> {
        while let Some(chunk) = self.chunks.next().await {
            let written = match chunk {
                Ok(chunk) => res.write(chunk).await.map_err(SendError::from),
                Err(e) => Err(SendError::from(e)),
            };
            if let Err(e) = written {
                res.abort();
                return Err(e);
            }
        }
        res.finish()?;
        Ok(())
    }
}
