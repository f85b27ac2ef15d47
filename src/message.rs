//! The payload handed to `on_message`, per spec §3.

/// A reassembled, dispatch-ready message. Text is only decoded as `String`
/// when `ServerConfig::deliver_text_as_string` is set; otherwise text and
/// binary messages both arrive as raw bytes via `Message::Binary`.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Text(String),
    Binary(Vec<u8>),
}

impl Message {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Message::Text(text) => text.as_bytes(),
            Message::Binary(data) => data,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Message::Text(text) => text.into_bytes(),
            Message::Binary(data) => data,
        }
    }
}
