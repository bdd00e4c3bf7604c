//! Header policy for full (non-304) responses

use super::revalidate::{set_revalidate_headers, PayloadOptions};
use crate::http::ResponseKind;
use crate::logger;
use hyper::body::Bytes;
use hyper::header::{HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use hyper::http::HeaderMap;

pub const X_POWERED_BY: HeaderName = HeaderName::from_static("x-powered-by");
pub const POWERED_BY: &str = "render-relay";

/// Inputs of the header policy for one response
#[derive(Debug, Clone, Copy)]
pub struct HeaderPolicy<'a> {
    pub kind: ResponseKind,
    /// Content type declared by the render result
    pub declared_content_type: Option<&'a str>,
    /// Materialized payload; `None` for streams
    pub payload: Option<&'a Bytes>,
    pub powered_by_header: bool,
    pub options: Option<&'a PayloadOptions>,
}

/// Set powered-by, content-type, content-length and cache headers
///
/// Headers already present on the response are kept, except those owned by
/// the revalidation policy.
pub fn apply_header_policy(headers: &mut HeaderMap, policy: &HeaderPolicy<'_>) {
    if policy.powered_by_header && policy.kind == ResponseKind::Html {
        headers.insert(X_POWERED_BY, HeaderValue::from_static(POWERED_BY));
    }

    if !headers.contains_key(CONTENT_TYPE) {
        headers.insert(CONTENT_TYPE, resolve_content_type(policy));
    }

    if let Some(payload) = policy.payload {
        headers.insert(CONTENT_LENGTH, HeaderValue::from(payload.len()));
    }

    if let Some(options) = policy.options {
        set_revalidate_headers(headers, options);
    }
}

fn resolve_content_type(policy: &HeaderPolicy<'_>) -> HeaderValue {
    if let Some(declared) = policy.declared_content_type {
        match HeaderValue::from_str(declared) {
            Ok(value) => return value,
            Err(_) => logger::log_warning(&format!(
                "Ignoring invalid declared content type {declared:?}"
            )),
        }
    }
    HeaderValue::from_static(policy.kind.default_content_type())
}
