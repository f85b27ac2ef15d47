//! The server supervisor: binds a listener, accepts connections, and owns
//! the client registry that `send_*`/`broadcast` read from, per spec §3
//! and §7. The registry itself is only ever mutated by the connection
//! tasks this supervisor spawns.

use crate::client::Client;
use crate::config::ServerConfig;
use crate::dispatch::{Handler, Handlers};
use crate::error::Error;
use crate::read::{handle_connection, Registry};
use rand::Rng;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, Notify, OnceCell};

const CLIENT_ID_RETRIES: usize = 1000;

/// A value that can be fanned out to every connected client with `broadcast`.
#[derive(Debug, Clone)]
pub enum BroadcastPayload {
    Text(String),
    Binary(Vec<u8>),
    Json(Value),
}

pub struct Server {
    host: String,
    port: u16,
    config: Arc<ServerConfig>,
    handlers: Mutex<Handlers>,
    running_handlers: OnceCell<Arc<Handlers>>,
    registry: Registry,
    shutdown: Notify,
    stopping: AtomicBool,
}

impl Server {
    pub fn new(host: impl Into<String>, port: u16, config: ServerConfig) -> Arc<Self> {
        Arc::new(Self {
            host: host.into(),
            port,
            config: Arc::new(config),
            handlers: Mutex::new(Handlers::default()),
            running_handlers: OnceCell::new(),
            registry: Arc::new(tokio::sync::RwLock::new(HashMap::new())),
            shutdown: Notify::new(),
            stopping: AtomicBool::new(false),
        })
    }

    /// Registers a handler. Must be called before `start`; handlers are
    /// snapshotted once accepting begins.
    pub async fn set_handler(&self, handler: Handler) {
        self.handlers.lock().await.set(handler);
    }

    pub async fn start(self: &Arc<Self>) -> Result<(), Error> {
        let listener = TcpListener::bind((self.host.as_str(), self.port)).await?;
        let handlers = Arc::new(std::mem::take(&mut *self.handlers.lock().await));
        let _ = self.running_handlers.set(handlers.clone());
        log::info!("listening on {}:{}", self.host, self.port);

        if let Some(loop_fn) = handlers.loop_handler() {
            let server = self.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = server.shutdown.notified() => {}
                    _ = loop_fn() => {}
                }
            });
        }

        let server = self.clone();
        tokio::spawn(async move {
            loop {
                if server.stopping.load(Ordering::SeqCst) {
                    break;
                }
                tokio::select! {
                    _ = server.shutdown.notified() => break,
                    accepted = listener.accept() => match accepted {
                        Ok((stream, _addr)) => server.spawn_connection(stream).await,
                        Err(err) => log::warn!("accept error: {err}"),
                    },
                }
            }
            if server.config.debug {
                log::debug!("stopped accepting connections");
            }
        });

        Ok(())
    }

    /// Signals the accept loop and any `loop` handler task to stop. Existing
    /// connections are left running; close them individually with
    /// `disconnect` if needed.
    pub fn stop(&self) {
        self.stopping.store(true, Ordering::SeqCst);
        self.shutdown.notify_waiters();
    }

    async fn spawn_connection(self: &Arc<Self>, stream: TcpStream) {
        let client_id = match self.allocate_client_id().await {
            Ok(id) => id,
            Err(err) => {
                log::warn!("could not allocate a client id: {err}");
                return;
            }
        };
        let handlers = match self.running_handlers.get() {
            Some(handlers) => handlers.clone(),
            None => return,
        };
        tokio::spawn(handle_connection(
            stream,
            client_id,
            self.config.clone(),
            handlers,
            self.registry.clone(),
        ));
    }

    async fn allocate_client_id(&self) -> Result<u64, Error> {
        for _ in 0..CLIENT_ID_RETRIES {
            let candidate: u64 = {
                let mut rng = rand::thread_rng();
                rng.random()
            };
            if candidate != 0 && !self.registry.read().await.contains_key(&candidate) {
                return Ok(candidate);
            }
        }
        Err(Error::ClientIdExhausted)
    }

    async fn client(&self, client_id: u64) -> Result<Arc<Client>, Error> {
        self.registry
            .read()
            .await
            .get(&client_id)
            .cloned()
            .ok_or(Error::UnknownClientId)
    }

    pub async fn send_text(&self, client_id: u64, text: impl Into<String>) -> Result<(), Error> {
        self.client(client_id).await?.send_text(text).await
    }

    pub async fn send_binary(&self, client_id: u64, data: impl AsRef<[u8]>) -> Result<(), Error> {
        self.client(client_id).await?.send_binary(data).await
    }

    pub async fn send_json<T: Serialize + ?Sized>(&self, client_id: u64, value: &T) -> Result<(), Error> {
        self.client(client_id).await?.send_json(value).await
    }

    /// Sends `payload` to every currently connected client, logging (but not
    /// failing on) individual send errors so one dead peer doesn't stop the
    /// rest from receiving it.
    pub async fn broadcast(&self, payload: &BroadcastPayload) {
        let clients: Vec<Arc<Client>> = self.registry.read().await.values().cloned().collect();
        for client in clients {
            let result = match payload {
                BroadcastPayload::Text(text) => client.send_text(text.as_str()).await,
                BroadcastPayload::Binary(data) => client.send_binary(data.as_slice()).await,
                BroadcastPayload::Json(value) => client.send_json(value).await,
            };
            if let Err(err) = result {
                log::warn!("broadcast to client {} failed: {err}", client.client_id);
            }
        }
    }

    pub async fn connected_clients(&self) -> Vec<u64> {
        self.registry.read().await.keys().copied().collect()
    }

    /// Asks a client's connection to close; a no-op if it's already gone.
    pub async fn disconnect(&self, client_id: u64) {
        if let Some(client) = self.registry.read().await.get(&client_id) {
            client.request_close();
        }
    }
}
