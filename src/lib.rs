//! render-relay
//!
//! Final-mile delivery of rendered pages over HTTP: ETag/304 handling,
//! response header policy and dispatch of static or streamed bodies.

pub mod config;
pub mod error;
pub mod http;
pub mod logger;
pub mod render;
pub mod send;
pub mod server;

pub use error::{RenderError, SendError, SendResult, TransportError};
pub use render::RenderResult;
pub use send::{send_render_result, PayloadOptions, PayloadSender, Revalidate, SendOptions};
