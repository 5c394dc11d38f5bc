//! Response parser: raw HTTP/1.x byte stream to `RawResponse`.
//!
//! # Design
//! The transport hands back the response exactly as it came off the wire:
//! status line, CRLF-separated headers, a blank line, then the body. When a
//! redirect (or a `100 Continue`) was followed, several header blocks precede
//! the body; only the last one describes the body and the earlier blocks are
//! dropped.
//!
//! Parsing never guesses. A stream without a header terminator, without a
//! status line, or with a header line lacking `:` is `MalformedResponse`.

use serde::de::DeserializeOwned;

use crate::error::ApiError;
use crate::http::Headers;

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Structured decomposition of one HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub message: String,
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl RawResponse {
    /// Parse a complete response byte stream.
    pub fn parse(raw: &[u8]) -> Result<Self, ApiError> {
        let (head, body) = last_header_block(raw)?;
        let head = std::str::from_utf8(head)
            .map_err(|_| ApiError::MalformedResponse("header block is not UTF-8".to_string()))?;

        let mut lines = head.split("\r\n");
        let status_line = lines.next().unwrap_or_default();
        let (status, message) = parse_status_line(status_line).ok_or_else(|| {
            ApiError::MalformedResponse(format!("no status line in {status_line:?}"))
        })?;

        let mut headers = Headers::new();
        for line in lines {
            if line.trim().is_empty() {
                continue;
            }
            let (name, value) = line.split_once(':').ok_or_else(|| {
                ApiError::MalformedResponse(format!("header line without ':': {line:?}"))
            })?;
            headers.insert(name.trim(), value.trim());
        }

        Ok(RawResponse {
            status,
            message,
            headers,
            body: body.to_vec(),
        })
    }

    /// Re-serialize as an HTTP/1.1 message. Parsing the result yields a
    /// response equal to `self`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.body.len() + 128);
        if self.message.is_empty() {
            out.extend_from_slice(format!("HTTP/1.1 {}\r\n", self.status).as_bytes());
        } else {
            out.extend_from_slice(format!("HTTP/1.1 {} {}\r\n", self.status, self.message).as_bytes());
        }
        for (name, value) in self.headers.iter() {
            out.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
        out
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// Body as UTF-8 text.
    pub fn text(&self) -> Result<&str, ApiError> {
        std::str::from_utf8(&self.body)
            .map_err(|e| ApiError::DeserializationError(format!("body is not UTF-8: {e}")))
    }

    /// Decode the body as JSON into `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_slice(&self.body).map_err(|e| ApiError::DeserializationError(e.to_string()))
    }
}

/// Split off the last header block and the body that follows it.
fn last_header_block(raw: &[u8]) -> Result<(&[u8], &[u8]), ApiError> {
    let mut split = find_slice(raw, HEADER_TERMINATOR).ok_or_else(|| {
        ApiError::MalformedResponse("no blank line between headers and body".to_string())
    })?;
    let mut head = &raw[..split];
    let mut body = &raw[split + HEADER_TERMINATOR.len()..];

    // A body that is itself a status line plus a terminated header block is
    // the next response in a redirect chain.
    while body.starts_with(b"HTTP/") {
        let Some(next) = find_slice(body, HEADER_TERMINATOR) else {
            break;
        };
        let first_line = body[..next].split(|b| *b == b'\r').next().unwrap_or_default();
        let is_status_line = std::str::from_utf8(first_line)
            .ok()
            .and_then(parse_status_line)
            .is_some();
        if !is_status_line {
            break;
        }
        split = next;
        head = &body[..split];
        body = &body[split + HEADER_TERMINATOR.len()..];
    }

    Ok((head, body))
}

/// Match `HTTP/<version> <code> <message>`. The message may be empty.
fn parse_status_line(line: &str) -> Option<(u16, String)> {
    let rest = line.strip_prefix("HTTP/")?;
    let (version, rest) = rest.split_once(' ')?;
    if version.is_empty() || !version.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    let rest = rest.trim_start();
    let (code, message) = match rest.split_once(' ') {
        Some((code, message)) => (code, message.trim()),
        None => (rest.trim_end(), ""),
    };
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let status = code.parse().ok()?;
    Some((status, message.to_string()))
}

fn find_slice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_json_response() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\r\n{\"a\":1}";
        let response = RawResponse::parse(raw).unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.message, "OK");
        assert_eq!(response.headers.get("Content-Type"), Some("application/json"));
        assert_eq!(response.body, b"{\"a\":1}");
    }

    #[test]
    fn header_names_and_values_are_trimmed() {
        let raw = b"HTTP/1.1 200 OK\r\n  X-Padded :   value with spaces  \r\n\r\n";
        let response = RawResponse::parse(raw).unwrap();
        assert_eq!(response.headers.get("x-padded"), Some("value with spaces"));
        assert!(response.body.is_empty());
    }

    #[test]
    fn header_value_keeps_colons_after_the_first() {
        let raw = b"HTTP/1.1 302 Found\r\nLocation: https://api.printnode.com:443/whoami\r\n\r\n";
        let response = RawResponse::parse(raw).unwrap();
        assert_eq!(
            response.headers.get("location"),
            Some("https://api.printnode.com:443/whoami")
        );
    }

    #[test]
    fn duplicate_headers_keep_last_value() {
        let raw = b"HTTP/1.1 200 OK\r\nX-Rate: 1\r\nx-rate: 2\r\n\r\n";
        let response = RawResponse::parse(raw).unwrap();
        assert_eq!(response.headers.len(), 1);
        assert_eq!(response.headers.get("X-Rate"), Some("2"));
    }

    #[test]
    fn redirect_chain_keeps_last_header_block() {
        let raw = b"HTTP/1.1 301 Moved Permanently\r\nLocation: /computers\r\n\r\n\
HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\r\n[]";
        let response = RawResponse::parse(raw).unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.message, "OK");
        assert!(response.headers.get("location").is_none());
        assert_eq!(response.body, b"[]");
    }

    #[test]
    fn continue_block_is_skipped() {
        let raw = b"HTTP/1.1 100 Continue\r\n\r\nHTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\n42";
        let response = RawResponse::parse(raw).unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, b"42");
    }

    #[test]
    fn body_may_contain_header_terminator() {
        let raw = b"HTTP/1.1 200 OK\r\n\r\nline one\r\n\r\nline two";
        let response = RawResponse::parse(raw).unwrap();
        assert_eq!(response.body, b"line one\r\n\r\nline two");
    }

    #[test]
    fn status_without_message_is_accepted() {
        let raw = b"HTTP/2 204\r\n\r\n";
        let response = RawResponse::parse(raw).unwrap();
        assert_eq!(response.status, 204);
        assert_eq!(response.message, "");
    }

    #[test]
    fn multi_word_message_is_kept() {
        let raw = b"HTTP/1.0 503 Service Unavailable\r\n\r\n";
        let response = RawResponse::parse(raw).unwrap();
        assert_eq!(response.status, 503);
        assert_eq!(response.message, "Service Unavailable");
    }

    #[test]
    fn missing_status_line_is_malformed() {
        let raw = b"Content-Type: application/json\r\n\r\n{}";
        let err = RawResponse::parse(raw).unwrap_err();
        assert!(matches!(err, ApiError::MalformedResponse(_)));
    }

    #[test]
    fn non_numeric_status_is_malformed() {
        let err = RawResponse::parse(b"HTTP/1.1 OK 200\r\n\r\n").unwrap_err();
        assert!(matches!(err, ApiError::MalformedResponse(_)));
    }

    #[test]
    fn missing_terminator_is_malformed() {
        let err = RawResponse::parse(b"HTTP/1.1 200 OK\r\nContent-Type: text/plain").unwrap_err();
        assert!(matches!(err, ApiError::MalformedResponse(_)));
    }

    #[test]
    fn header_without_colon_is_malformed() {
        let err = RawResponse::parse(b"HTTP/1.1 200 OK\r\nbogus\r\n\r\n").unwrap_err();
        assert!(matches!(err, ApiError::MalformedResponse(_)));
    }

    #[test]
    fn empty_stream_is_malformed() {
        let err = RawResponse::parse(b"").unwrap_err();
        assert!(matches!(err, ApiError::MalformedResponse(_)));
    }

    #[test]
    fn reserialized_response_parses_identically() {
        let raw = b"HTTP/1.1 404 Not Found\r\nContent-Type: application/json\r\nX-Request-Id: abc\r\n\r\n{\"message\":\"no\"}";
        let first = RawResponse::parse(raw).unwrap();
        let second = RawResponse::parse(&first.to_bytes()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn reserialized_empty_message_parses_identically() {
        let first = RawResponse::parse(b"HTTP/2 200\r\nA: b\r\n\r\n").unwrap();
        let second = RawResponse::parse(&first.to_bytes()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn json_helper_decodes_body() {
        let response = RawResponse::parse(b"HTTP/1.1 200 OK\r\n\r\n[1,2,3]").unwrap();
        let ids: Vec<u64> = response.json().unwrap();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(response.text().unwrap(), "[1,2,3]");
        assert!(response.is_ok());
    }

    #[test]
    fn json_helper_rejects_garbage() {
        let response = RawResponse::parse(b"HTTP/1.1 200 OK\r\n\r\nnot json").unwrap();
        let err = response.json::<serde_json::Value>().unwrap_err();
        assert!(matches!(err, ApiError::DeserializationError(_)));
    }
}
