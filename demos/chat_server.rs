use emberws::{BroadcastPayload, Handler, Server, ServerConfig};
use log::*;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    env_logger::init();

    let config = ServerConfig {
        deliver_text_as_string: true,
        ..ServerConfig::default()
    };
    let server = Server::new("127.0.0.1", 9003, config);

    let open_server = server.clone();
    server
        .set_handler(Handler::OnOpen(Arc::new(move |client| {
            let server = open_server.clone();
            Box::pin(async move {
                let line = format!("client {} joined", client.client_id);
                info!("{line}");
                server.broadcast(&BroadcastPayload::Text(line)).await;
            })
        })))
        .await;

    let close_server = server.clone();
    server
        .set_handler(Handler::OnClose(Arc::new(move |client| {
            let server = close_server.clone();
            Box::pin(async move {
                let line = format!("client {} left", client.client_id);
                info!("{line}");
                server.broadcast(&BroadcastPayload::Text(line)).await;
            })
        })))
        .await;

    let message_server = server.clone();
    server
        .set_handler(Handler::OnMessage(Arc::new(move |client, message| {
            let server = message_server.clone();
            Box::pin(async move {
                let text = match message {
                    emberws::Message::Text(text) => text,
                    emberws::Message::Binary(_) => {
                        warn!("dropping non-text chat message from client {}", client.client_id);
                        return;
                    }
                };
                let line = format!("{}: {}", client.client_id, text);
                server.broadcast(&BroadcastPayload::Text(line)).await;
            })
        })))
        .await;

    server.start().await.expect("failed to start server");
    info!("chat server on 127.0.0.1:9003");

    std::future::pending::<()>().await;
}
