use crate::frame::Frame;
use httparse::Error as HttpParseError;
use std::io;
use std::string::FromUtf8Error;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{source}")]
    IOError {
        #[from]
        source: io::Error,
    },

    #[error("{source}")]
    FromUtf8Error {
        #[from]
        source: FromUtf8Error,
    },

    #[error("{source}")]
    JsonError {
        #[from]
        source: serde_json::Error,
    },

    // Decoder-tagged protocol signals (spec §4.1)
    #[error("unknown opcode")]
    UnknownOpcode,

    #[error("close frame received")]
    CloseReceived(Frame),

    #[error("server-bound frame was not masked")]
    UnmaskedClientFrame,

    #[error("reserved bit of the 64-bit extended length was set")]
    LengthReservedBitsSet,

    #[error("control frame payload exceeds 125 bytes")]
    ControlFrameTooLarge,

    #[error("control frames must not be fragmented")]
    ControlFrameFragmented,

    // RSV1..3 nonzero; distinct from LengthReservedBitsSet, see DESIGN.md
    #[error("RSV1, RSV2 or RSV3 was set with no extension negotiated")]
    ReservedBitsSet,

    #[error("frame payload exceeds the maximum representable length")]
    PayloadTooLarge,

    #[error("message payload exceeds the maximum representable length")]
    MessageTooLarge,

    // Handshake errors (spec §4.2)
    #[error("HTTP request method must be GET")]
    InvalidMethod,

    #[error("HTTP version must be at least 1.1")]
    UnsupportedHttpVersion,

    #[error("Host header missing from the request")]
    MissingHost,

    #[error("Upgrade header missing from the request")]
    MissingUpgradeHeader,

    #[error("Upgrade header does not contain \"websocket\"")]
    InvalidUpgradeHeader,

    #[error("Connection header missing from the request")]
    MissingConnectionHeader,

    #[error("Connection header does not contain \"upgrade\"")]
    InvalidConnectionHeader,

    #[error("Sec-WebSocket-Key header missing from the request")]
    MissingSecWebSocketKey,

    #[error("Sec-WebSocket-Key does not decode to 16 bytes")]
    InvalidSecWebSocketKey,

    #[error("Sec-WebSocket-Version header missing from the request")]
    MissingSecWebSocketVersion,

    #[error("Sec-WebSocket-Version does not include version 13")]
    UnsupportedWebSocketVersion,

    #[error("{source}")]
    HttpParseError {
        #[from]
        source: HttpParseError,
    },

    // Client identifier generation
    #[error("exhausted retries generating a unique client id")]
    ClientIdExhausted,

    #[error("no client registered under the given id")]
    UnknownClientId,
}

/// Close status codes used by this implementation, per spec §6.
pub mod close_code {
    pub const NORMAL: u16 = 1000;
    pub const PROTOCOL_ERROR: u16 = 1002;
    pub const INVALID_UTF8: u16 = 1007;
    pub const MESSAGE_TOO_LARGE: u16 = 1009;
}

/// Maps a protocol error to the close status code the connection should
/// report to the peer before closing, per spec §6.
pub fn close_code_for(error: &Error) -> u16 {
    match error {
        Error::MessageTooLarge => close_code::MESSAGE_TOO_LARGE,
        _ => close_code::PROTOCOL_ERROR,
    }
}
