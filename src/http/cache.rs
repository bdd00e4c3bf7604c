//! HTTP cache validation module
//!
//! Provides `ETag` generation and conditional request (freshness) checks.

use hyper::header::{CACHE_CONTROL, IF_MODIFIED_SINCE, IF_NONE_MATCH};
use hyper::http::HeaderMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Produces a validator token for a materialized payload
pub trait EtagGenerator: Send + Sync {
    fn generate(&self, payload: &[u8]) -> String;
}

/// Decides whether the client's cached copy is still valid
pub trait FreshnessCheck: Send + Sync {
    /// `etag` is the validator the response would carry, if any
    fn is_fresh(&self, request_headers: &HeaderMap, etag: Option<&str>) -> bool;
}

/// `ETag` generator using fast hashing
///
/// Tokens look like `"<hash>-<len>"` (both hex), optionally with the weak
/// `W/` prefix.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashEtag {
    weak: bool,
}

impl HashEtag {
    pub const fn strong() -> Self {
        Self { weak: false }
    }

    pub const fn weak() -> Self {
        Self { weak: true }
    }
}

impl EtagGenerator for HashEtag {
    fn generate(&self, payload: &[u8]) -> String {
        let mut hasher = DefaultHasher::new();
        payload.hash(&mut hasher);
        let v = hasher.finish();
        let prefix = if self.weak { "W/" } else { "" };
        format!("{prefix}\"{v:x}-{:x}\"", payload.len())
    }
}

/// Freshness check driven by the request's conditional headers
///
/// - `Cache-Control: no-cache` on the request is never fresh
/// - `If-None-Match` supports lists, `*` and weak comparison
/// - `If-Modified-Since` is stale, since delivered payloads carry no
///   modification time
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestFreshness;

impl FreshnessCheck for RequestFreshness {
    fn is_fresh(&self, request_headers: &HeaderMap, etag: Option<&str>) -> bool {
        let if_none_match = header_str(request_headers, IF_NONE_MATCH.as_str());
        let has_modified_since = request_headers.contains_key(IF_MODIFIED_SINCE);

        // Unconditional request
        if if_none_match.is_none() && !has_modified_since {
            return false;
        }

        if header_str(request_headers, CACHE_CONTROL.as_str()).is_some_and(has_no_cache) {
            return false;
        }

        if let Some(client_etags) = if_none_match {
            if client_etags.trim() != "*" {
                let Some(etag) = etag else {
                    return false;
                };
                if !check_etag_match(Some(client_etags), etag) {
                    return false;
                }
            }
        }

        !has_modified_since
    }
}

/// Check if client's `If-None-Match` header matches the server's `ETag`
///
/// Supports:
/// - Single `ETag`: `"abc123"`
/// - Multiple `ETags`: `"abc123", "def456"`
/// - Wildcard: `*`, only as the whole header value
/// - Weak tags: `W/"abc123"` matches `"abc123"` and vice versa
pub fn check_etag_match(if_none_match: Option<&str>, etag: &str) -> bool {
    let etag = strip_weak(etag);
    if_none_match.is_some_and(|client_etag| {
        client_etag.trim() == "*"
            || client_etag
                .split(',')
                .map(str::trim)
                .any(|e| strip_weak(e) == etag)
    })
}

fn strip_weak(tag: &str) -> &str {
    tag.strip_prefix("W/").unwrap_or(tag)
}

fn has_no_cache(cache_control: &str) -> bool {
    cache_control
        .split(',')
        .any(|d| d.trim().eq_ignore_ascii_case("no-cache"))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
