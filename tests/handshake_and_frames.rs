//! End-to-end coverage of the handshake and the frame/fragmentation state
//! machine, driven with a hand-rolled client over a raw `TcpStream` since
//! this crate ships no client-role code.

use emberws::{Handler, Server, ServerConfig};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::sleep;

const UPGRADE_REQUEST: &str = "GET / HTTP/1.1\r\n\
    Host: localhost\r\n\
    Upgrade: websocket\r\n\
    Connection: Upgrade\r\n\
    Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
    Sec-WebSocket-Version: 13\r\n\
    \r\n";

async fn start_test_server(port: u16, config: ServerConfig) -> (Arc<Server>, Arc<AtomicU64>) {
    let server = Server::new("127.0.0.1", port, config);
    let close_count = Arc::new(AtomicU64::new(0));

    server
        .set_handler(Handler::OnMessage(Arc::new(|client, message| {
            Box::pin(async move {
                let _ = client.send_binary(message.into_bytes()).await;
            })
        })))
        .await;

    let counter = close_count.clone();
    server
        .set_handler(Handler::OnClose(Arc::new(move |_client| {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        })))
        .await;

    server.start().await.expect("server should start");
    sleep(Duration::from_millis(20)).await;
    (server, close_count)
}

async fn handshake(stream: &mut TcpStream) {
    stream.write_all(UPGRADE_REQUEST.as_bytes()).await.unwrap();
    let mut response = vec![0u8; 512];
    let n = stream.read(&mut response).await.unwrap();
    let response = String::from_utf8_lossy(&response[..n]);
    assert!(response.starts_with("HTTP/1.1 101"), "unexpected response: {response}");
    assert!(response.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo="));
}

fn masked_frame(fin: bool, opcode: u8, payload: &[u8]) -> Vec<u8> {
    let mask = [0x12, 0x34, 0x56, 0x78];
    let len = payload.len();
    let mut out = vec![(fin as u8) << 7 | opcode];
    if len <= 125 {
        out.push(0x80 | len as u8);
    } else if len <= 0xFFFF {
        out.push(0x80 | 126);
        out.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        out.push(0x80 | 127);
        out.extend_from_slice(&(len as u64).to_be_bytes());
    }
    out.extend_from_slice(&mask);
    out.extend(payload.iter().enumerate().map(|(i, b)| b ^ mask[i % 4]));
    out
}

async fn read_server_frame(stream: &mut TcpStream) -> (bool, u8, Vec<u8>) {
    let mut header = [0u8; 2];
    stream.read_exact(&mut header).await.unwrap();
    let fin = header[0] & 0x80 != 0;
    let opcode = header[0] & 0x0F;
    assert_eq!(header[1] & 0x80, 0, "server frames must not be masked");
    let mut len = (header[1] & 0x7F) as usize;
    if len == 126 {
        let mut ext = [0u8; 2];
        stream.read_exact(&mut ext).await.unwrap();
        len = u16::from_be_bytes(ext) as usize;
    } else if len == 127 {
        let mut ext = [0u8; 8];
        stream.read_exact(&mut ext).await.unwrap();
        len = u64::from_be_bytes(ext) as usize;
    }
    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).await.unwrap();
    (fin, opcode, payload)
}

#[tokio::test]
async fn valid_handshake_returns_the_expected_accept_key() {
    let (_server, _closes) = start_test_server(9101, ServerConfig::default()).await;
    let mut stream = TcpStream::connect("127.0.0.1:9101").await.unwrap();
    handshake(&mut stream).await;
}

#[tokio::test]
async fn masked_text_frame_round_trips_through_the_echo_handler() {
    let (_server, _closes) = start_test_server(9102, ServerConfig::default()).await;
    let mut stream = TcpStream::connect("127.0.0.1:9102").await.unwrap();
    handshake(&mut stream).await;

    stream.write_all(&masked_frame(true, 0x1, b"hello")).await.unwrap();
    let (fin, opcode, payload) = read_server_frame(&mut stream).await;
    assert!(fin);
    assert_eq!(opcode, 0x2, "delivered as Message::Binary since deliver_text_as_string is off");
    assert_eq!(payload, b"hello");
}

#[tokio::test]
async fn three_fragment_message_reassembles_before_dispatch() {
    let (_server, _closes) = start_test_server(9103, ServerConfig::default()).await;
    let mut stream = TcpStream::connect("127.0.0.1:9103").await.unwrap();
    handshake(&mut stream).await;

    stream.write_all(&masked_frame(false, 0x2, b"foo")).await.unwrap();
    stream.write_all(&masked_frame(false, 0x0, b"bar")).await.unwrap();
    stream.write_all(&masked_frame(true, 0x0, b"baz")).await.unwrap();

    let (fin, opcode, payload) = read_server_frame(&mut stream).await;
    assert!(fin);
    assert_eq!(opcode, 0x2);
    assert_eq!(payload, b"foobarbaz");
}

#[tokio::test]
async fn ping_mid_fragment_gets_an_immediate_pong_without_disturbing_reassembly() {
    let (_server, _closes) = start_test_server(9104, ServerConfig::default()).await;
    let mut stream = TcpStream::connect("127.0.0.1:9104").await.unwrap();
    handshake(&mut stream).await;

    stream.write_all(&masked_frame(false, 0x2, b"foo")).await.unwrap();
    stream.write_all(&masked_frame(true, 0x9, b"ping-payload")).await.unwrap();

    let (fin, opcode, payload) = read_server_frame(&mut stream).await;
    assert!(fin);
    assert_eq!(opcode, 0xA, "ping must be answered with a pong before the message completes");
    assert_eq!(payload, b"ping-payload");

    stream.write_all(&masked_frame(true, 0x0, b"bar")).await.unwrap();
    let (fin, opcode, payload) = read_server_frame(&mut stream).await;
    assert!(fin);
    assert_eq!(opcode, 0x2);
    assert_eq!(payload, b"foobar");
}

#[tokio::test]
async fn unmasked_client_frame_closes_the_connection_without_dispatching() {
    let (_server, _closes) = start_test_server(9105, ServerConfig::default()).await;
    let mut stream = TcpStream::connect("127.0.0.1:9105").await.unwrap();
    handshake(&mut stream).await;

    let frame = vec![0x81, 0x02, b'h', b'i']; // mask bit unset
    stream.write_all(&frame).await.unwrap();

    let (fin, opcode, payload) = read_server_frame(&mut stream).await;
    assert!(fin);
    assert_eq!(opcode, 0x8);
    assert_eq!(u16::from_be_bytes([payload[0], payload[1]]), 1002);
}

#[tokio::test]
async fn close_frame_is_echoed_and_on_close_fires_exactly_once() {
    let (_server, closes) = start_test_server(9106, ServerConfig::default()).await;
    let mut stream = TcpStream::connect("127.0.0.1:9106").await.unwrap();
    handshake(&mut stream).await;

    stream
        .write_all(&masked_frame(true, 0x8, &1000u16.to_be_bytes()))
        .await
        .unwrap();
    let (fin, opcode, payload) = read_server_frame(&mut stream).await;
    assert!(fin);
    assert_eq!(opcode, 0x8);
    assert_eq!(u16::from_be_bytes([payload[0], payload[1]]), 1000);

    sleep(Duration::from_millis(50)).await;
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}
