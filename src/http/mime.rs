//! MIME type detection module
//!
//! Content-Type defaults per response kind, and per file extension for the
//! pages directory.

/// Content type of component (flight) streams
pub const COMPONENT_STREAM_CONTENT_TYPE: &str = "text/x-component";

/// What a rendered payload is, used when nothing declares a content type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseKind {
    #[default]
    Html,
    Json,
    ComponentStream,
}

impl ResponseKind {
    pub const fn default_content_type(self) -> &'static str {
        match self {
            Self::ComponentStream => COMPONENT_STREAM_CONTENT_TYPE,
            Self::Json => "application/json",
            Self::Html => "text/html; charset=utf-8",
        }
    }

    /// Kind of a page file, by extension
    pub fn from_extension(extension: Option<&str>) -> Self {
        match extension {
            Some("json") => Self::Json,
            Some("rsc") => Self::ComponentStream,
            _ => Self::Html,
        }
    }
}

/// Get MIME Content-Type based on file extension
///
/// # Examples
/// ```
/// use render_relay::http::mime::get_content_type;
/// assert_eq!(get_content_type(Some("html")), Some("text/html; charset=utf-8"));
/// assert_eq!(get_content_type(Some("rsc")), None);
/// ```
pub fn get_content_type(extension: Option<&str>) -> Option<&'static str> {
    let content_type = match extension? {
        // Text
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css",
        "txt" | "md" => "text/plain; charset=utf-8",
        "xml" => "application/xml",

        // JavaScript/WASM
        "js" | "mjs" => "application/javascript",
        "json" => "application/json",
        "wasm" => "application/wasm",

        // Images
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "webp" => "image/webp",

        // Fonts
        "woff" => "font/woff",
        "woff2" => "font/woff2",

        "pdf" => "application/pdf",

        // Unknown: let the response kind decide
        _ => return None,
    };
    Some(content_type)
}
