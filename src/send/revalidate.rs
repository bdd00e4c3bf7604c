//! Revalidation headers
//!
//! Translates a `PayloadOptions` policy into `Cache-Control` directives.

use hyper::header::{HeaderValue, CACHE_CONTROL};
use hyper::http::HeaderMap;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Directive for responses no shared cache may store
pub const PRIVATE_NO_CACHE: &str = "private, no-cache, no-store, max-age=0, must-revalidate";

/// Window used for payloads that never revalidate
pub const ONE_YEAR_SECS: u32 = 31_536_000;

/// When a stateless payload must be revalidated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Revalidate {
    /// Revalidate after this many seconds
    After(u32),
    /// Immutable until the next deploy
    Never,
}

/// Cache policy of a delivered payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PayloadOptions {
    /// Must not be stored by shared caches
    Private,
    /// Private and stateful, no fixed revalidation window
    PrivateStateful,
    PrivateStateless { revalidate: Revalidate },
}

/// Set `Cache-Control` on `headers` according to `options`
pub fn set_revalidate_headers(headers: &mut HeaderMap, options: &PayloadOptions) {
    match options {
        PayloadOptions::Private => {
            headers.insert(CACHE_CONTROL, HeaderValue::from_static(PRIVATE_NO_CACHE));
        }
        PayloadOptions::PrivateStateful => {
            // A policy set earlier on the response wins
            if !headers.contains_key(CACHE_CONTROL) {
                headers.insert(CACHE_CONTROL, HeaderValue::from_static(PRIVATE_NO_CACHE));
            }
        }
        PayloadOptions::PrivateStateless { revalidate } => {
            headers.insert(CACHE_CONTROL, stateless_directive(*revalidate));
        }
    }
}

fn stateless_directive(revalidate: Revalidate) -> HeaderValue {
    let window = match revalidate {
        Revalidate::After(0) => return HeaderValue::from_static(PRIVATE_NO_CACHE),
        Revalidate::After(secs) => secs,
        Revalidate::Never => ONE_YEAR_SECS,
    };
    HeaderValue::from_str(&format!("s-maxage={window}, stale-while-revalidate"))
        .unwrap_or_else(|_| HeaderValue::from_static(PRIVATE_NO_CACHE))
}

// On the wire `revalidate` is a number of seconds or `false`

impl Serialize for Revalidate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::After(secs) => serializer.serialize_u32(*secs),
            Self::Never => serializer.serialize_bool(false),
        }
    }
}

impl<'de> Deserialize<'de> for Revalidate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(RevalidateVisitor)
    }
}

struct RevalidateVisitor;

impl Visitor<'_> for RevalidateVisitor {
    type Value = Revalidate;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a non-negative number of seconds or `false`")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
        if v {
            Err(E::invalid_value(de::Unexpected::Bool(true), &self))
        } else {
            Ok(Revalidate::Never)
        }
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        u32::try_from(v)
            .map(Revalidate::After)
            .map_err(|_| E::invalid_value(de::Unexpected::Unsigned(v), &self))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        match u64::try_from(v) {
            Ok(secs) => self.visit_u64(secs),
            Err(_) => Err(E::invalid_value(de::Unexpected::Signed(v), &self)),
        }
    }
}
