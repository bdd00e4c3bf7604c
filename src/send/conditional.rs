//! Conditional GET handling

use crate::error::TransportError;
use crate::http::{FreshnessCheck, ServerResponse, Transport};
use crate::logger;
use hyper::header::{HeaderValue, ETAG};
use hyper::http::{HeaderMap, StatusCode};

/// Set the `ETag` header and answer 304 when the client copy is fresh
///
/// Returns `true` when a 304 was sent and delivery is complete. The `ETag`
/// is set before the freshness check: a 304 must carry the validator a 200
/// would have carried (RFC 7232 section 4.1). Without a validator the
/// response is never fresh.
pub fn send_etag_response<T: Transport>(
    request_headers: &HeaderMap,
    res: &mut ServerResponse<T>,
    etag: Option<&str>,
    freshness: &impl FreshnessCheck,
) -> Result<bool, TransportError> {
    let Some(etag) = etag else {
        return Ok(false);
    };

    match HeaderValue::from_str(etag) {
        Ok(value) => res.set_header(ETAG, value),
        Err(_) => logger::log_warning(&format!("Skipping unrepresentable ETag {etag:?}")),
    }

    if !freshness.is_fresh(request_headers, Some(etag)) {
        return Ok(false);
    }

    res.set_status(StatusCode::NOT_MODIFIED);
    res.end_empty()?;
    Ok(true)
}
