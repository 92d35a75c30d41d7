//! Parsing of the application's stdout stream.
//!
//! A responder writes a CGI-style document: header lines up to the first
//! blank line, then the body.
//!
//! ```text
//! Status: 404 Not Found\r\n
//! Content-type: text/html\r\n
//! \r\n
//! <body bytes>
//! ```

use bytes::Bytes;

use crate::error::{Error, Result};

/// Status line used when the application does not send a `Status:` header.
pub const DEFAULT_STATUS: &str = "200 OK";

/// Reason phrase appended to a bare status code.
const SYNTHETIC_REASON: &str = "FCGIApp";

/// Charset assumed when the content type does not name one.
pub const DEFAULT_CHARSET: &str = "iso-8859-1";

/// A parsed response document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Status line without the protocol prefix, e.g. `"200 OK"`.
    pub status: String,
    /// Header names are lowercased, names and values are trimmed.
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Response {
    /// Numeric status code from the status line.
    pub fn status_code(&self) -> Option<u16> {
        self.status.split_whitespace().next()?.parse().ok()
    }

    /// First header value with the given (case-insensitive) name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// The `charset` parameter of the content type.
    pub fn charset(&self) -> &str {
        self.header("content-type")
            .and_then(|content_type| {
                content_type.split(';').skip(1).find_map(|param| {
                    let (key, value) = param.split_once('=')?;
                    key.trim()
                        .eq_ignore_ascii_case("charset")
                        .then(|| value.trim().trim_matches('"'))
                })
            })
            .unwrap_or(DEFAULT_CHARSET)
    }
}

/// Split an application's stdout stream into status, headers and body.
///
/// A `Status:` header replaces the default status line and is not kept in
/// `headers`. If no line break is present the whole output is the body.
pub fn parse_response(output: Bytes) -> Result<Response> {
    let mut status = DEFAULT_STATUS.to_string();
    let mut headers = Vec::new();
    let mut pos = 0;

    while let Some(eol) = output[pos..].iter().position(|&b| b == b'\n') {
        let raw = String::from_utf8_lossy(&output[pos..pos + eol]);
        pos += eol + 1;

        let line = raw.trim();
        if line.is_empty() {
            break;
        }

        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| Error::MalformedResponse(line.to_string()))?;
        let name = name.trim().to_ascii_lowercase();
        let value = value.trim();

        if name == "status" {
            status = if value.contains(' ') {
                value.to_string()
            } else {
                format!("{value} {SYNTHETIC_REASON}")
            };
        } else {
            headers.push((name, value.to_string()));
        }
    }

    Ok(Response {
        status,
        headers,
        body: output.slice(pos..),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(name: &str, value: &str) -> (String, String) {
        (name.to_string(), value.to_string())
    }

    #[test]
    fn test_parse_with_status() {
        let out = Bytes::from_static(
            b"Status: 200 OK\r\nContent-type: text/plain;charset=UTF-8\r\n\r\npong",
        );
        let response = parse_response(out).unwrap();
        assert_eq!(response.status, "200 OK");
        assert_eq!(
            response.headers,
            vec![header("content-type", "text/plain;charset=UTF-8")]
        );
        assert_eq!(&response.body[..], b"pong");
    }

    #[test]
    fn test_parse_default_status() {
        let out = Bytes::from_static(b"Content-type: text/plain;charset=UTF-8\r\n\r\npong");
        let response = parse_response(out).unwrap();
        assert_eq!(response.status, "200 OK");
        assert_eq!(response.status_code(), Some(200));
        assert_eq!(&response.body[..], b"pong");
    }

    #[test]
    fn test_parse_status_without_reason() {
        let out = Bytes::from_static(
            b"Status: 999\r\nContent-type: text/plain;charset=UTF-8\r\n\r\npong",
        );
        let response = parse_response(out).unwrap();
        assert_eq!(response.status, "999 FCGIApp");
        assert_eq!(response.status_code(), Some(999));
        assert_eq!(
            response.headers,
            vec![header("content-type", "text/plain;charset=UTF-8")]
        );
    }

    #[test]
    fn test_parse_bare_line_feeds() {
        let out = Bytes::from_static(b"Status: 404 Not Found\nX-Powered-By: PHP\n\nmissing\r\nbody");
        let response = parse_response(out).unwrap();
        assert_eq!(response.status, "404 Not Found");
        assert_eq!(response.header("X-Powered-By"), Some("PHP"));
        assert_eq!(&response.body[..], b"missing\r\nbody");
    }

    #[test]
    fn test_parse_without_line_break() {
        let out = Bytes::from_static(b"just a body");
        let response = parse_response(out).unwrap();
        assert_eq!(response.status, DEFAULT_STATUS);
        assert!(response.headers.is_empty());
        assert_eq!(&response.body[..], b"just a body");
    }

    #[test]
    fn test_parse_empty_output() {
        let response = parse_response(Bytes::new()).unwrap();
        assert_eq!(response.status, DEFAULT_STATUS);
        assert!(response.body.is_empty());
    }

    #[test]
    fn test_value_keeps_colons() {
        let out = Bytes::from_static(b"Location: http://example.com:8080/\r\n\r\n");
        let response = parse_response(out).unwrap();
        assert_eq!(response.header("location"), Some("http://example.com:8080/"));
        assert!(response.body.is_empty());
    }

    #[test]
    fn test_malformed_header_line() {
        let out = Bytes::from_static(b"not a header\r\n\r\nbody");
        assert!(matches!(
            parse_response(out),
            Err(Error::MalformedResponse(line)) if line == "not a header"
        ));
    }

    #[test]
    fn test_charset() {
        let out = Bytes::from_static(b"Content-Type: text/html; charset=\"utf-8\"\r\n\r\n");
        assert_eq!(parse_response(out).unwrap().charset(), "utf-8");

        let out = Bytes::from_static(b"Content-Type: text/html\r\n\r\n");
        assert_eq!(parse_response(out).unwrap().charset(), DEFAULT_CHARSET);

        let out = Bytes::from_static(b"\r\nbody");
        assert_eq!(parse_response(out).unwrap().charset(), DEFAULT_CHARSET);
    }
}
