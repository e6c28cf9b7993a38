use std::borrow::Cow;
use std::fmt;

/// An HTTP response status: numeric code plus reason phrase.
///
/// Common statuses are available as associated constants:
/// - `OK` (200): Request successful
/// - `NO_CONTENT` (204): Successful request with no content
/// - `BAD_REQUEST` (400): Malformed request
/// - `NOT_FOUND` (404): Resource not found
/// - `PAYLOAD_TOO_LARGE` (413): Request body exceeds the configured limit
/// - `INTERNAL_SERVER_ERROR` (500): Server error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    code: u16,
    reason: Cow<'static, str>,
}

impl Status {
    pub const OK: Status = Status::known(200, "OK");
    pub const CREATED: Status = Status::known(201, "Created");
    pub const NO_CONTENT: Status = Status::known(204, "No Content");
    pub const FOUND: Status = Status::known(302, "Found");
    pub const SEE_OTHER: Status = Status::known(303, "See Other");
    pub const NOT_MODIFIED: Status = Status::known(304, "Not Modified");
    pub const BAD_REQUEST: Status = Status::known(400, "Bad Request");
    pub const UNAUTHORIZED: Status = Status::known(401, "Unauthorized");
    pub const FORBIDDEN: Status = Status::known(403, "Forbidden");
    pub const NOT_FOUND: Status = Status::known(404, "Not Found");
    pub const METHOD_NOT_ALLOWED: Status = Status::known(405, "Method Not Allowed");
    pub const PAYLOAD_TOO_LARGE: Status = Status::known(413, "Payload Too Large");
    pub const INTERNAL_SERVER_ERROR: Status = Status::known(500, "Internal Server Error");
    pub const SERVICE_UNAVAILABLE: Status = Status::known(503, "Service Unavailable");

    const fn known(code: u16, reason: &'static str) -> Self {
        Self {
            code,
            reason: Cow::Borrowed(reason),
        }
    }

    /// Builds a status from a numeric code, using the standard reason phrase.
    ///
    /// Unknown codes get a reason derived from their class.
    ///
    /// # Example
    ///
    /// ```
    /// # use tether::http::status::Status;
    /// assert_eq!(Status::from_code(404), Status::NOT_FOUND);
    /// assert_eq!(Status::from_code(299).reason_phrase(), "Success");
    /// ```
    pub fn from_code(code: u16) -> Self {
        Self {
            code,
            reason: Cow::Borrowed(standard_reason(code)),
        }
    }

    /// Builds a status with a custom reason phrase.
    pub fn with_reason(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: Cow::Owned(reason.into()),
        }
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn reason_phrase(&self) -> &str {
        &self.reason
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::OK
    }
}

impl From<u16> for Status {
    fn from(code: u16) -> Self {
        Status::from_code(code)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.reason)
    }
}

fn standard_reason(code: u16) -> &'static str {
    match code {
        100 => "Continue",
        101 => "Switching Protocols",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        206 => "Partial Content",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        406 => "Not Acceptable",
        408 => "Request Timeout",
        409 => "Conflict",
        410 => "Gone",
        411 => "Length Required",
        413 => "Payload Too Large",
        415 => "Unsupported Media Type",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        100..=199 => "Informational",
        200..=299 => "Success",
        300..=399 => "Redirection",
        400..=499 => "Client Error",
        _ => "Server Error",
    }
}
