use emberws::{Handler, Server, ServerConfig};
use log::*;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    env_logger::init();

    let server = Server::new("127.0.0.1", 9002, ServerConfig::default());

    server
        .set_handler(Handler::OnMessage(Arc::new(|client, message| {
            Box::pin(async move {
                if let Err(err) = client.send_binary(message.into_bytes()).await {
                    error!("failed to echo message back to client {}: {err}", client.client_id);
                }
            })
        })))
        .await;

    server.start().await.expect("failed to start server");
    info!("echoing on 127.0.0.1:9002");

    std::future::pending::<()>().await;
}
