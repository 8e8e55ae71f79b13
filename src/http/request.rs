//! HTTP/1.1 request parsing using the [`httparse`] crate.

use std::borrow::Cow;
use std::collections::HashMap;

use bytes::Bytes;
use percent_encoding::percent_decode_str;
use thiserror::Error;

use super::headers::names;
use super::{Headers, Method, StatusCode};

/// Largest request (head plus body) accepted on a connection (8 MiB).
pub const MAX_REQUEST_SIZE: usize = 8 * 1024 * 1024;

/// Errors that can occur while parsing an HTTP/1.1 request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request is incomplete, more data needed")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid Content-Length header: {value:?}")]
    InvalidContentLength { value: String },

    #[error("declared body of {length} bytes exceeds the {max} byte request limit", max = MAX_REQUEST_SIZE)]
    TooLarge { length: usize },

    #[error("unsupported Transfer-Encoding: {value:?}")]
    UnsupportedTransferEncoding { value: String },
}

impl RequestError {
    /// The status the transport answers with before closing the connection.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::TooLarge { .. } => StatusCode::PayloadTooLarge,
            Self::UnsupportedTransferEncoding { .. } => StatusCode::NotImplemented,
            _ => StatusCode::BadRequest,
        }
    }
}

/// A fully parsed HTTP/1.1 request, body included.
///
/// # Examples
///
/// ```
/// use gestures::http::request::Request;
///
/// let raw = b"PUT /api/gestures/hello?target=jim HTTP/1.1\r\nHost: localhost\r\nContent-Length: 2\r\n\r\nhi";
/// let (request, consumed) = Request::parse(raw).unwrap();
///
/// assert_eq!(consumed, raw.len());
/// assert_eq!(request.method().as_str(), "PUT");
/// assert_eq!(request.path(), "/api/gestures/hello");
/// assert_eq!(request.query_param("target"), Some("jim"));
/// assert_eq!(&request.body()[..], b"hi");
/// ```
#[derive(Debug)]
pub struct Request {
    method: Method,
    path: String,
    /// HTTP minor version: 0 for HTTP/1.0, 1 for HTTP/1.1.
    version: u8,
    headers: Headers,
    query: Option<String>,
    body: Bytes,
    params: HashMap<String, String>,
}

impl Request {
    const MAX_HEADERS: usize = 64;

    /// Parses one request from the front of `buf`.
    ///
    /// Returns the request and the total number of bytes it occupies in `buf`
    /// (head plus `Content-Length` body bytes), so the caller can drop exactly
    /// that much from its read buffer.
    ///
    /// # Errors
    ///
    /// - [`RequestError::Incomplete`] if either the head or the body has not
    ///   fully arrived yet.
    /// - [`RequestError::Parse`] / [`RequestError::MissingField`] for malformed heads.
    /// - [`RequestError::InvalidContentLength`] if `Content-Length` is not a number.
    /// - [`RequestError::TooLarge`] as soon as the declared body would push the
    ///   request past [`MAX_REQUEST_SIZE`], without waiting for the bytes.
    /// - [`RequestError::UnsupportedTransferEncoding`] for any `Transfer-Encoding`;
    ///   only `Content-Length` framing is understood.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), RequestError> {
        let mut headers = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut raw_req = httparse::Request::new(&mut headers);

        let body_offset = match raw_req.parse(buf)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Err(RequestError::Incomplete),
        };

        let method: Method = match raw_req
            .method
            .ok_or(RequestError::MissingField { field: "method" })?
            .parse()
        {
            Ok(method) => method,
            Err(never) => match never {},
        };

        let raw_path = raw_req
            .path
            .ok_or(RequestError::MissingField { field: "path" })?;

        let (path, query) = match raw_path.split_once('?') {
            Some((path, query)) => (path.to_owned(), Some(query.to_owned())),
            None => (raw_path.to_owned(), None),
        };

        let version = raw_req
            .version
            .ok_or(RequestError::MissingField { field: "version" })?;

        let mut header_map = Headers::with_capacity(raw_req.headers.len());
        for header in raw_req.headers.iter() {
            if let Ok(value) = std::str::from_utf8(header.value) {
                header_map.insert(header.name, value);
            }
        }

        if let Some(value) = header_map.get(names::TRANSFER_ENCODING) {
            return Err(RequestError::UnsupportedTransferEncoding {
                value: value.to_owned(),
            });
        }

        let content_length = match header_map.get(names::CONTENT_LENGTH) {
            Some(value) => value
                .trim()
                .parse::<usize>()
                .map_err(|_| RequestError::InvalidContentLength {
                    value: value.to_owned(),
                })?,
            None => 0,
        };

        let total = body_offset
            .checked_add(content_length)
            .filter(|total| *total <= MAX_REQUEST_SIZE)
            .ok_or(RequestError::TooLarge {
                length: content_length,
            })?;
        if buf.len() < total {
            return Err(RequestError::Incomplete);
        }

        let params = query.as_deref().map(parse_query_string).unwrap_or_default();
        let body = Bytes::copy_from_slice(&buf[body_offset..total]);

        Ok((
            Self {
                method,
                path,
                version,
                headers: header_map,
                query,
                body,
                params,
            },
            total,
        ))
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The request path without the query string, still percent-encoded.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// HTTP minor version number (0 = HTTP/1.0, 1 = HTTP/1.1).
    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// The raw query string (without the leading `?`), if any.
    pub fn query_string(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// A decoded query parameter. A key given without `=` maps to `""`.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// HTTP/1.1 defaults to keep-alive, HTTP/1.0 to close, unless
    /// `Connection` says otherwise.
    pub fn is_keep_alive(&self) -> bool {
        match self.headers.get(names::CONNECTION) {
            Some(conn) => conn.eq_ignore_ascii_case("keep-alive"),
            None => self.version == 1,
        }
    }
}

/// Decodes a single URL component: `%XX` escapes become bytes, invalid UTF-8
/// is replaced with U+FFFD.
pub fn decode_component(raw: &str) -> Cow<'_, str> {
    percent_decode_str(raw).decode_utf8_lossy()
}

/// Parses `key=value&key2=value2`, decoding `+` as a space and `%XX` escapes.
/// The first occurrence of a repeated key wins.
fn parse_query_string(query: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for pair in query.split('&').filter(|pair| !pair.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode_component(&key.replace('+', " ")).into_owned();
        let value = decode_component(&value.replace('+', " ")).into_owned();
        params.entry(key).or_insert(value);
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_get() {
        let raw = b"GET /api/gestures/all HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let (req, consumed) = Request::parse(raw).unwrap();
        assert_eq!(req.method(), &Method::Get);
        assert_eq!(req.path(), "/api/gestures/all");
        assert_eq!(req.version(), 1);
        assert_eq!(req.headers().get("host"), Some("localhost"));
        assert!(req.body().is_empty());
        assert_eq!(consumed, raw.len());
    }

    #[test]
    fn query_values_are_decoded() {
        let raw = b"GET /api/gestures/hello?target=jim+bob&x=%C3%A9t%C3%A9 HTTP/1.1\r\n\r\n";
        let (req, _) = Request::parse(raw).unwrap();
        assert_eq!(req.query_string(), Some("target=jim+bob&x=%C3%A9t%C3%A9"));
        assert_eq!(req.query_param("target"), Some("jim bob"));
        assert_eq!(req.query_param("x"), Some("été"));
    }

    #[test]
    fn bare_query_key_is_present_and_empty() {
        let raw = b"GET /api/gestures/hello?target HTTP/1.1\r\n\r\n";
        let (req, _) = Request::parse(raw).unwrap();
        assert_eq!(req.query_param("target"), Some(""));
        assert_eq!(req.query_param("other"), None);
    }

    #[test]
    fn incomplete_head() {
        let raw = b"GET / HTTP/1.1\r\nHost:";
        assert!(matches!(Request::parse(raw), Err(RequestError::Incomplete)));
    }

    #[test]
    fn incomplete_body_waits_for_more() {
        let raw = b"PUT /api/gestures/hello HTTP/1.1\r\nContent-Length: 5\r\n\r\nhel";
        assert!(matches!(Request::parse(raw), Err(RequestError::Incomplete)));
    }

    #[test]
    fn body_is_bounded_by_content_length() {
        let raw = b"POST /api/gestures/hello HTTP/1.1\r\nContent-Length: 2\r\n\r\nhiGET / HTTP/1.1\r\n\r\n";
        let (req, consumed) = Request::parse(raw).unwrap();
        assert_eq!(&req.body()[..], b"hi");
        assert_eq!(&raw[consumed..], b"GET / HTTP/1.1\r\n\r\n");
    }

    #[test]
    fn bad_content_length_is_rejected() {
        let raw = b"PUT /x HTTP/1.1\r\nContent-Length: lots\r\n\r\n";
        assert!(matches!(
            Request::parse(raw),
            Err(RequestError::InvalidContentLength { .. })
        ));
    }

    #[test]
    fn oversized_content_length_is_rejected_before_the_body_arrives() {
        let raw = format!(
            "PUT /api/gestures/a HTTP/1.1\r\nContent-Length: {}\r\n\r\n",
            MAX_REQUEST_SIZE
        );
        let err = Request::parse(raw.as_bytes()).unwrap_err();
        assert!(matches!(err, RequestError::TooLarge { length } if length == MAX_REQUEST_SIZE));
        assert_eq!(err.status(), StatusCode::PayloadTooLarge);
    }

    #[test]
    fn content_length_near_usize_max_does_not_overflow() {
        let raw = format!(
            "PUT /api/gestures/a HTTP/1.1\r\nContent-Length: {}\r\n\r\n",
            usize::MAX
        );
        let err = Request::parse(raw.as_bytes()).unwrap_err();
        assert!(matches!(err, RequestError::TooLarge { length } if length == usize::MAX));
    }

    #[test]
    fn chunked_body_is_refused() {
        let raw = b"PUT /api/gestures/wave HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n2\r\nhi\r\n0\r\n\r\n";
        let err = Request::parse(raw).unwrap_err();
        assert!(matches!(
            &err,
            RequestError::UnsupportedTransferEncoding { value } if value == "chunked"
        ));
        assert_eq!(err.status(), StatusCode::NotImplemented);
    }

    #[test]
    fn malformed_heads_map_to_400() {
        let err = Request::parse(b"PUT /x HTTP/1.1\r\nContent-Length: -1\r\n\r\n").unwrap_err();
        assert_eq!(err.status(), StatusCode::BadRequest);
    }

    #[test]
    fn keep_alive_rules() {
        let (req, _) = Request::parse(b"GET / HTTP/1.1\r\n\r\n").unwrap();
        assert!(req.is_keep_alive());

        let (req, _) = Request::parse(b"GET / HTTP/1.1\r\nConnection: close\r\n\r\n").unwrap();
        assert!(!req.is_keep_alive());

        let (req, _) = Request::parse(b"GET / HTTP/1.0\r\n\r\n").unwrap();
        assert!(!req.is_keep_alive());
    }

    #[test]
    fn decode_component_handles_escapes() {
        assert_eq!(decode_component("thumbs%20up"), "thumbs up");
        assert_eq!(decode_component("plain"), "plain");
    }
}
