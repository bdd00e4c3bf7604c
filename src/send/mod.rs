//! Render result delivery
//!
//! `PayloadSender::send` is the single entry point from a renderer to the
//! wire:
//! 1. an already sent response is left alone
//! 2. the render result is materialized (static payload) or kept as a stream
//! 3. static payloads get an `ETag` and may short-circuit with 304
//! 4. the header policy runs
//! 5. the body is written, streamed, or suppressed for `HEAD`

pub mod conditional;
pub mod headers;
pub mod revalidate;

pub use conditional::send_etag_response;
pub use headers::{apply_header_policy, HeaderPolicy};
pub use revalidate::{set_revalidate_headers, PayloadOptions, Revalidate};

use crate::error::SendResult;
use crate::http::{
    EtagGenerator, FreshnessCheck, HashEtag, RequestFreshness, ResponseKind, ServerResponse,
    Transport,
};
use crate::logger;
use crate::render::{RenderBody, RenderResult};
use hyper::{Method, Request};

/// Per-response delivery settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOptions {
    pub kind: ResponseKind,
    pub generate_etags: bool,
    pub powered_by_header: bool,
    pub payload: Option<PayloadOptions>,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            kind: ResponseKind::Html,
            generate_etags: true,
            powered_by_header: false,
            payload: None,
        }
    }
}

/// Delivers render results using a validator generator and freshness check
#[derive(Debug, Clone, Default)]
pub struct PayloadSender<G = HashEtag, F = RequestFreshness> {
    etags: G,
    freshness: F,
}

impl<G: EtagGenerator, F: FreshnessCheck> PayloadSender<G, F> {
    pub const fn new(etags: G, freshness: F) -> Self {
        Self { etags, freshness }
    }

    /// Send `result` as the response to `req`
    ///
    /// Render and transport failures are returned unchanged; nothing is
    /// retried.
    pub async fn send<B, T: Transport>(
        &self,
        req: &Request<B>,
        res: &mut ServerResponse<T>,
        result: RenderResult,
        options: &SendOptions,
    ) -> SendResult<()> {
        if res.is_sent() {
            logger::log_warning("Response already sent, skipping render result");
            return Ok(());
        }

        let declared_content_type = result.content_type().map(str::to_owned);
        let body = result.materialize().await?;

        if let Some(payload) = body.payload() {
            let etag = options
                .generate_etags
                .then(|| self.etags.generate(payload));
            if send_etag_response(req.headers(), res, etag.as_deref(), &self.freshness)? {
                return Ok(());
            }
        }

        apply_header_policy(
            res.headers_mut(),
            &HeaderPolicy {
                kind: options.kind,
                declared_content_type: declared_content_type.as_deref(),
                payload: body.payload(),
                powered_by_header: options.powered_by_header,
                options: options.payload.as_ref(),
            },
        );

        // HEAD never carries a body; a pending stream is dropped unpolled
        if *req.method() == Method::HEAD {
            res.end_empty()?;
            return Ok(());
        }

        match body {
            RenderBody::Static(payload) => res.end(payload)?,
            RenderBody::Dynamic(stream) => stream.pipe(res).await?,
        }
        Ok(())
    }
}

/// Send `result` with the default `ETag` generator and freshness check
pub async fn send_render_result<B, T: Transport>(
    req: &Request<B>,
    res: &mut ServerResponse<T>,
    result: RenderResult,
    options: &SendOptions,
) -> SendResult<()> {
    PayloadSender::<HashEtag, RequestFreshness>::default()
        .send(req, res, result, options)
        .await
}
