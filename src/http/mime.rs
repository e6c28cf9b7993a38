//! MIME type detection based on file extensions.

use std::path::Path;

pub const PLAIN_TEXT_UTF8: &str = "text/plain;charset=utf-8";
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Guesses a content type from the extension of `path`.
///
/// Falls back to `application/octet-stream`.
///
/// # Example
///
/// ```
/// # use tether::http::mime::from_path;
/// assert_eq!(from_path("site/index.html"), "text/html;charset=utf-8");
/// assert_eq!(from_path("blob"), "application/octet-stream");
/// ```
pub fn from_path(path: impl AsRef<Path>) -> &'static str {
    let ext = path
        .as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("html") | Some("htm") => "text/html;charset=utf-8",
        Some("css") => "text/css;charset=utf-8",
        Some("js") | Some("mjs") => "text/javascript;charset=utf-8",
        Some("json") => "application/json",
        Some("txt") => PLAIN_TEXT_UTF8,
        Some("xml") => "application/xml",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("ico") => "image/x-icon",
        Some("webp") => "image/webp",
        Some("wasm") => "application/wasm",
        Some("pdf") => "application/pdf",
        _ => OCTET_STREAM,
    }
}
