//! The connected-client handle passed to handlers, per spec §3's data model.

use crate::error::Error;
use crate::frame::OpCode;
use crate::write::Writer;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

/// Outbound messages larger than this are split into a fragmented sequence
/// of frames rather than sent as one.
pub(crate) const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

pub struct Client {
    pub client_id: u64,
    pub remote_addr: SocketAddr,
    writer: Arc<Mutex<Writer>>,
    scratch: Mutex<HashMap<String, Value>>,
    close_requested: Notify,
    max_frame_size: usize,
}

impl Client {
    pub(crate) fn new(
        client_id: u64,
        remote_addr: SocketAddr,
        writer: Arc<Mutex<Writer>>,
        max_frame_size: usize,
    ) -> Self {
        Self {
            client_id,
            remote_addr,
            writer,
            scratch: Mutex::new(HashMap::new()),
            close_requested: Notify::new(),
            max_frame_size,
        }
    }

    pub async fn send_text(&self, text: impl Into<String>) -> Result<(), Error> {
        let text = text.into();
        self.writer
            .lock()
            .await
            .write_message(OpCode::Text, text.as_bytes(), self.max_frame_size)
            .await
    }

    pub async fn send_binary(&self, data: impl AsRef<[u8]>) -> Result<(), Error> {
        self.writer
            .lock()
            .await
            .write_message(OpCode::Binary, data.as_ref(), self.max_frame_size)
            .await
    }

    /// Serializes `value` and sends it as a text frame, the way a client-side
    /// JSON consumer expects.
    pub async fn send_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), Error> {
        let encoded = serde_json::to_vec(value)?;
        self.writer
            .lock()
            .await
            .write_message(OpCode::Text, &encoded, self.max_frame_size)
            .await
    }

    /// Arbitrary state a handler can stash against this client and read back
    /// on a later call, e.g. a username chosen in `on_open`.
    pub async fn set_data(&self, key: impl Into<String>, value: Value) {
        self.scratch.lock().await.insert(key.into(), value);
    }

    pub async fn get_data(&self, key: &str) -> Option<Value> {
        self.scratch.lock().await.get(key).cloned()
    }

    pub async fn remove_data(&self, key: &str) -> Option<Value> {
        self.scratch.lock().await.remove(key)
    }

    /// Asks the connection's read loop to close the socket with status 1000
    /// at its next opportunity.
    pub fn request_close(&self) {
        self.close_requested.notify_one();
    }

    pub(crate) fn close_requested(&self) -> &Notify {
        &self.close_requested
    }
}
