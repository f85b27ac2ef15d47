/// Embedder-facing configuration, per spec §6.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Size, in bytes, of the chunk read from a client socket at a time
    /// once past the handshake.
    pub receive_buffer_size: usize,
    /// Size, in bytes, of the buffer used for the single read of the
    /// opening HTTP request during the handshake.
    pub handshake_buffer_size: usize,
    /// When true, text messages are UTF-8 validated and delivered to
    /// `on_message` as a decoded `String`; when false, they're delivered
    /// as raw bytes alongside binary messages.
    pub deliver_text_as_string: bool,
    /// Upper bound on a fully reassembled message's size. Exceeding it
    /// closes the connection with status 1009.
    pub max_message_size: usize,
    /// Enables verbose per-frame and per-dispatch logging at `debug`/
    /// `trace` level.
    pub debug: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            receive_buffer_size: 2048,
            handshake_buffer_size: 8192,
            deliver_text_as_string: false,
            max_message_size: 64 << 20,
            debug: false,
        }
    }
}
