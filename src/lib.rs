//! An embeddable async WebSocket server implementing RFC 6455.
//!
//! A [`Server`] binds a port, accepts connections, performs the opening
//! handshake, and drives each connection's frame reassembly and
//! control-frame handling. Application code plugs in by registering
//! [`Handler`] callbacks (`on_open`, `on_close`, `on_message`, and an
//! optional background `loop`) and talking back to clients through the
//! [`Client`] handle each callback receives, or through `Server::send_*`
//! and `Server::broadcast` using a client id.
//!
//! ```no_run
//! use emberws::{Handler, Server, ServerConfig};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), emberws::Error> {
//! let server = Server::new("0.0.0.0", 9001, ServerConfig::default());
//! server
//!     .set_handler(Handler::OnMessage(Arc::new(|client, message| {
//!         Box::pin(async move {
//!             let _ = client.send_binary(message.into_bytes()).await;
//!         })
//!     })))
//!     .await;
//! server.start().await?;
//! # Ok(())
//! # }
//! ```

mod client;
pub mod config;
pub mod decoder;
pub mod dispatch;
mod encoder;
pub mod error;
pub mod frame;
pub mod handshake;
pub mod message;
mod read;
mod server;
mod utils;
mod write;

pub use client::Client;
pub use config::ServerConfig;
pub use dispatch::Handler;
pub use error::Error;
pub use frame::OpCode;
pub use message::Message;
pub use server::{BroadcastPayload, Server};
