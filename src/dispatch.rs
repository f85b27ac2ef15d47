//! Typed event-handler registration, per spec §5. Where the system this
//! replaces looks a handler up by name at call time, the four event kinds
//! are distinct `Handler` variants here, so a wrong name or a value that
//! isn't callable can't reach runtime at all.

use crate::client::Client;
use crate::message::Message;
use futures::future::{BoxFuture, FutureExt};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

pub type OnOpenFn = Arc<dyn Fn(Arc<Client>) -> BoxFuture<'static, ()> + Send + Sync>;
pub type OnCloseFn = Arc<dyn Fn(Arc<Client>) -> BoxFuture<'static, ()> + Send + Sync>;
pub type OnMessageFn = Arc<dyn Fn(Arc<Client>, Message) -> BoxFuture<'static, ()> + Send + Sync>;
pub type LoopFn = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

pub enum Handler {
    OnOpen(OnOpenFn),
    OnClose(OnCloseFn),
    OnMessage(OnMessageFn),
    /// Runs once, concurrently with connection handling, for as long as the
    /// server is started; intended for periodic background work.
    Loop(LoopFn),
}

#[derive(Default)]
pub(crate) struct Handlers {
    on_open: Option<OnOpenFn>,
    on_close: Option<OnCloseFn>,
    on_message: Option<OnMessageFn>,
    loop_handler: Option<LoopFn>,
}

impl Handlers {
    pub(crate) fn set(&mut self, handler: Handler) {
        match handler {
            Handler::OnOpen(f) => self.on_open = Some(f),
            Handler::OnClose(f) => self.on_close = Some(f),
            Handler::OnMessage(f) => self.on_message = Some(f),
            Handler::Loop(f) => self.loop_handler = Some(f),
        }
    }

    pub(crate) async fn dispatch_on_open(&self, client: Arc<Client>) {
        if let Some(handler) = &self.on_open {
            guard(handler(client)).await;
        }
    }

    pub(crate) async fn dispatch_on_close(&self, client: Arc<Client>) {
        if let Some(handler) = &self.on_close {
            guard(handler(client)).await;
        }
    }

    pub(crate) async fn dispatch_on_message(&self, client: Arc<Client>, message: Message) {
        if let Some(handler) = &self.on_message {
            guard(handler(client, message)).await;
        }
    }

    pub(crate) fn loop_handler(&self) -> Option<LoopFn> {
        self.loop_handler.clone()
    }
}

/// Runs a handler future, logging and swallowing a panic rather than taking
/// the connection or supervisor task down with it.
async fn guard(fut: BoxFuture<'static, ()>) {
    if AssertUnwindSafe(fut).catch_unwind().await.is_err() {
        log::error!("event handler panicked");
    }
}
