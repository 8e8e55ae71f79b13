//! HTTP/1.1 response builder and wire serialization.

use bytes::{BufMut, BytesMut};

use super::headers::names;
use super::{Headers, StatusCode};

pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
pub const APPLICATION_JSON: &str = "application/json";

/// An HTTP/1.1 response, ready to be serialized and sent.
///
/// # Examples
///
/// ```
/// use gestures::http::{Response, StatusCode};
///
/// let response = Response::new(StatusCode::Created)
///     .header("Location", "http://localhost/api/gestures/hello");
///
/// let bytes = response.into_bytes();
/// let text = std::str::from_utf8(&bytes).unwrap();
/// assert!(text.starts_with("HTTP/1.1 201 Created\r\n"));
/// assert!(text.contains("Location: http://localhost/api/gestures/hello\r\n"));
/// assert!(text.contains("Content-Length: 0\r\n"));
/// ```
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Vec<u8>,
    keep_alive: bool,
}

impl Response {
    /// Creates a response with the given status and an empty body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Vec::new(),
            keep_alive: true,
        }
    }

    /// Shorthand for a `text/plain` response.
    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        Self::new(status)
            .header(names::CONTENT_TYPE, TEXT_PLAIN)
            .body(body)
    }

    /// Appends a header. Repeated names are additive.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Appends a header in place, for middleware that decorates a response
    /// produced downstream.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name, value);
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into().into_bytes();
        self
    }

    #[must_use]
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body_bytes(&self) -> &[u8] {
        &self.body
    }

    /// The body as text, with invalid UTF-8 replaced.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Serializes the response in HTTP/1.1 wire format.
    ///
    /// Adds `Content-Type: text/plain` to non-empty bodies without one,
    /// `Connection`, and `Content-Length`. Statuses that forbid a body
    /// (204) are written with neither a body nor a `Content-Length`.
    pub fn into_bytes(mut self) -> BytesMut {
        if self.status.forbids_body() {
            self.body.clear();
        }

        let content_length = self.body.len();

        if !self.body.is_empty() && !self.headers.contains(names::CONTENT_TYPE) {
            self.headers.insert(names::CONTENT_TYPE, TEXT_PLAIN);
        }

        let connection = if self.keep_alive { "keep-alive" } else { "close" };
        self.headers.set(names::CONNECTION, connection);

        let estimated_size = 128 + self.headers.len() * 64 + content_length;
        let mut buf = BytesMut::with_capacity(estimated_size);

        buf.put(
            format!(
                "HTTP/1.1 {} {}\r\n",
                self.status.as_u16(),
                self.status.canonical_reason()
            )
            .as_bytes(),
        );

        buf.put(self.headers.to_string().as_bytes());

        if !self.status.forbids_body() {
            buf.put(format!("{}: {content_length}\r\n", names::CONTENT_LENGTH).as_bytes());
        }

        buf.put(&b"\r\n"[..]);
        buf.put(self.body.as_slice());

        buf
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new(StatusCode::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_string(bytes: BytesMut) -> String {
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn text_response_sets_type_and_length() {
        let r = Response::text(StatusCode::Ok, "howdy");
        let s = to_string(r.into_bytes());
        assert!(s.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(s.contains("Content-Type: text/plain; charset=utf-8\r\n"));
        assert!(s.contains("Content-Length: 5\r\n"));
        assert!(s.ends_with("\r\n\r\nhowdy"));
    }

    #[test]
    fn explicit_content_type_is_kept() {
        let r = Response::new(StatusCode::Ok)
            .header("Content-Type", APPLICATION_JSON)
            .body("[]");
        let s = to_string(r.into_bytes());
        assert!(s.contains("Content-Type: application/json\r\n"));
        assert!(!s.contains("text/plain"));
    }

    #[test]
    fn no_content_has_no_body_or_length() {
        let r = Response::new(StatusCode::NoContent).body("ignored");
        let s = to_string(r.into_bytes());
        assert!(s.starts_with("HTTP/1.1 204 No Content\r\n"));
        assert!(!s.contains("Content-Length"));
        assert!(!s.contains("Content-Type"));
        assert!(s.ends_with("\r\n\r\n"));
    }

    #[test]
    fn connection_close() {
        let r = Response::new(StatusCode::BadRequest).keep_alive(false);
        let s = to_string(r.into_bytes());
        assert!(s.contains("Connection: close\r\n"));
        assert!(!s.contains("keep-alive"));
    }

    #[test]
    fn accessors_expose_built_state() {
        let r = Response::text(StatusCode::NotFound, "gesture type [x] not found")
            .header("X-Extra", "1");
        assert_eq!(r.status(), StatusCode::NotFound);
        assert_eq!(r.headers().get("x-extra"), Some("1"));
        assert_eq!(r.body_text(), "gesture type [x] not found");
    }
}
