//! HTTP protocol layer module
//!
//! Response handle, transports, cache validation and content types. Nothing
//! here knows about rendering; the `send` module builds on top of it.

pub mod cache;
pub mod mime;
pub mod response;
pub mod transport;

// Re-export commonly used types
pub use cache::{EtagGenerator, FreshnessCheck, HashEtag, RequestFreshness};
pub use mime::ResponseKind;
pub use response::{build_405_response, build_500_response, ResponseState, ServerResponse};
pub use transport::{HyperTransport, MemoryTransport, ResponseBody, Transport};
