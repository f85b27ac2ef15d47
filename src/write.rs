//! Server-side frame writing. Outbound frames are always unmasked and, for
//! data messages larger than the configured frame size, split into a
//! fragmented sequence per RFC 6455 §5.4.

use crate::encoder::encode_frame;
use crate::error::Error;
use crate::frame::OpCode;
use tokio::io::{AsyncWriteExt, WriteHalf};
use tokio::net::TcpStream;

/// Frames written through a single `Writer` are serialized on the wire in
/// call order; wrap it in a mutex per connection so concurrent senders
/// (the supervisor's `broadcast`/`send_*` calls and the connection's own
/// pong replies) never interleave a frame's bytes.
pub struct Writer {
    write_half: WriteHalf<TcpStream>,
}

impl Writer {
    pub fn new(write_half: WriteHalf<TcpStream>) -> Self {
        Self { write_half }
    }

    pub async fn write_raw(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.write_half.write_all(bytes).await?;
        Ok(())
    }

    pub async fn write_frame(&mut self, fin: bool, opcode: OpCode, payload: &[u8]) -> Result<(), Error> {
        let encoded = encode_frame(fin, opcode, payload)?;
        self.write_half.write_all(&encoded).await?;
        Ok(())
    }

    /// Writes `payload` as a single frame, or as a fragmented sequence of
    /// frames of at most `max_frame_size` bytes each, if larger.
    pub async fn write_message(
        &mut self,
        opcode: OpCode,
        payload: &[u8],
        max_frame_size: usize,
    ) -> Result<(), Error> {
        if payload.len() <= max_frame_size {
            return self.write_frame(true, opcode, payload).await;
        }

        let mut chunks = payload.chunks(max_frame_size).peekable();
        let mut first = true;
        while let Some(chunk) = chunks.next() {
            let is_last = chunks.peek().is_none();
            let chunk_opcode = if first { opcode } else { OpCode::Continuation };
            self.write_frame(is_last, chunk_opcode, chunk).await?;
            first = false;
        }
        Ok(())
    }

    pub async fn write_close(&mut self, status: u16) -> Result<(), Error> {
        self.write_frame(true, OpCode::Close, &status.to_be_bytes()).await
    }

    pub async fn write_pong(&mut self, payload: &[u8]) -> Result<(), Error> {
        self.write_frame(true, OpCode::Pong, payload).await
    }
}
