//! Opening handshake validation, per spec §4.2.

use crate::error::Error;
use crate::utils::generate_websocket_accept_value;
use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use httparse::{Request, Status, EMPTY_HEADER};

const MAX_HEADERS: usize = 64;

#[derive(Debug)]
pub enum ParsedRequest {
    /// Not enough bytes buffered yet to parse a complete request line and headers.
    Incomplete,
    Complete {
        /// Bytes of `buf` the request consumed; anything past this belongs to the
        /// first WebSocket frame and must not be discarded.
        consumed: usize,
        sec_websocket_key: String,
    },
}

/// Parses and validates an opening HTTP request against RFC 6455 §4.2.1.
/// Validation order matches the order a client's request would fail against
/// a conformant server: method, version, Host, Upgrade, Connection, key,
/// version header.
pub fn parse_handshake(buf: &[u8]) -> Result<ParsedRequest, Error> {
    let mut headers = [EMPTY_HEADER; MAX_HEADERS];
    let mut request = Request::new(&mut headers);
    let consumed = match request.parse(buf)? {
        Status::Partial => return Ok(ParsedRequest::Incomplete),
        Status::Complete(n) => n,
    };

    if request.method != Some("GET") {
        return Err(Error::InvalidMethod);
    }
    // httparse's `version` is the digit after "HTTP/1.": 0 for HTTP/1.0, 1 for HTTP/1.1.
    if request.version != Some(1) {
        return Err(Error::UnsupportedHttpVersion);
    }

    let header = |name: &str| -> Option<&str> {
        request
            .headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .and_then(|h| std::str::from_utf8(h.value).ok())
    };

    if header("Host").is_none() {
        return Err(Error::MissingHost);
    }

    let upgrade = header("Upgrade").ok_or(Error::MissingUpgradeHeader)?;
    if !upgrade
        .split(',')
        .any(|token| token.trim().eq_ignore_ascii_case("websocket"))
    {
        return Err(Error::InvalidUpgradeHeader);
    }

    let connection = header("Connection").ok_or(Error::MissingConnectionHeader)?;
    if !connection
        .split(',')
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"))
    {
        return Err(Error::InvalidConnectionHeader);
    }

    let key = header("Sec-WebSocket-Key")
        .ok_or(Error::MissingSecWebSocketKey)?
        .trim();
    let decoded = BASE64_STANDARD
        .decode(key)
        .map_err(|_| Error::InvalidSecWebSocketKey)?;
    if decoded.len() != 16 {
        return Err(Error::InvalidSecWebSocketKey);
    }

    let version_header = header("Sec-WebSocket-Version").ok_or(Error::MissingSecWebSocketVersion)?;
    if !version_header.split(',').any(|token| token.trim() == "13") {
        return Err(Error::UnsupportedWebSocketVersion);
    }

    Ok(ParsedRequest::Complete {
        consumed,
        sec_websocket_key: key.to_string(),
    })
}

/// The 101 Switching Protocols response for a validated handshake.
pub fn success_response(sec_websocket_key: &str) -> Vec<u8> {
    let accept = generate_websocket_accept_value(sec_websocket_key);
    format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {accept}\r\n\
         \r\n"
    )
    .into_bytes()
}

/// The 400 response sent before closing the socket on a failed handshake.
/// A version mismatch additionally advertises the supported version, per
/// RFC 6455 §4.4.
pub fn failure_response(error: &Error) -> Vec<u8> {
    if matches!(error, Error::UnsupportedWebSocketVersion) {
        b"HTTP/1.1 400 Bad Request\r\nSec-WebSocket-Version: 13\r\n\r\n".to_vec()
    } else {
        b"HTTP/1.1 400 Bad Request\r\n\r\n".to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_REQUEST: &[u8] = b"GET /chat HTTP/1.1\r\n\
        Host: server.example.com\r\n\
        Upgrade: websocket\r\n\
        Connection: Upgrade\r\n\
        Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
        Sec-WebSocket-Version: 13\r\n\
        \r\n";

    #[test]
    fn sample_key_produces_the_known_accept_value() {
        match parse_handshake(SAMPLE_REQUEST).unwrap() {
            ParsedRequest::Complete { sec_websocket_key, consumed } => {
                assert_eq!(consumed, SAMPLE_REQUEST.len());
                let response = String::from_utf8(success_response(&sec_websocket_key)).unwrap();
                assert!(response.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo="));
            }
            ParsedRequest::Incomplete => panic!("expected a complete request"),
        }
    }

    #[test]
    fn partial_request_asks_for_more() {
        let cut = &SAMPLE_REQUEST[..SAMPLE_REQUEST.len() - 10];
        assert!(matches!(parse_handshake(cut).unwrap(), ParsedRequest::Incomplete));
    }

    #[test]
    fn missing_upgrade_header_is_rejected() {
        let request = b"GET / HTTP/1.1\r\nHost: x\r\nConnection: Upgrade\r\n\
            Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\nSec-WebSocket-Version: 13\r\n\r\n";
        assert!(matches!(parse_handshake(request).unwrap_err(), Error::MissingUpgradeHeader));
    }

    #[test]
    fn wrong_version_is_rejected_with_the_supported_version_advertised() {
        let request = b"GET / HTTP/1.1\r\nHost: x\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\
            Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\nSec-WebSocket-Version: 8\r\n\r\n";
        let err = parse_handshake(request).unwrap_err();
        assert!(matches!(err, Error::UnsupportedWebSocketVersion));
        let response = String::from_utf8(failure_response(&err)).unwrap();
        assert!(response.contains("Sec-WebSocket-Version: 13"));
    }

    #[test]
    fn non_get_method_is_rejected() {
        let request = b"POST / HTTP/1.1\r\nHost: x\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\
            Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\nSec-WebSocket-Version: 13\r\n\r\n";
        assert!(matches!(parse_handshake(request).unwrap_err(), Error::InvalidMethod));
    }
}
