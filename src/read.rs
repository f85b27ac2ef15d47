//! Per-connection task: handshake, then the frame read loop and the
//! fragmentation/control-frame state machine, per spec §4.3.

use crate::client::{Client, DEFAULT_MAX_FRAME_SIZE};
use crate::config::ServerConfig;
use crate::decoder::{decode_frame, DecodeOutcome};
use crate::dispatch::Handlers;
use crate::error::{close_code, close_code_for, Error};
use crate::frame::OpCode;
use crate::handshake::{self, ParsedRequest};
use crate::message::Message;
use crate::write::Writer;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, RwLock};

pub(crate) type Registry = Arc<RwLock<HashMap<u64, Arc<Client>>>>;

/// Reassembly state for a fragmented data message in progress. Per RFC 6455
/// §5.4, only one such message can be in progress per connection at a time.
struct Reassembly {
    opcode: OpCode,
    payload: Vec<u8>,
}

pub(crate) async fn handle_connection(
    mut stream: TcpStream,
    client_id: u64,
    config: Arc<ServerConfig>,
    handlers: Arc<Handlers>,
    registry: Registry,
) {
    let remote_addr = match stream.peer_addr() {
        Ok(addr) => addr,
        Err(err) => {
            log::warn!("could not read peer address for client {client_id}: {err}");
            return;
        }
    };

    let (sec_websocket_key, mut pending) = match run_handshake(&mut stream, &config, remote_addr).await {
        Some(parts) => parts,
        None => return,
    };

    let response = handshake::success_response(&sec_websocket_key);
    if let Err(err) = stream.write_all(&response).await {
        log::warn!("failed writing handshake response to {remote_addr}: {err}");
        return;
    }
    if config.debug {
        log::debug!("client {client_id} ({remote_addr}) completed the handshake");
    }

    let (mut read_half, write_half) = tokio::io::split(stream);
    let writer = Arc::new(Mutex::new(Writer::new(write_half)));
    let client = Arc::new(Client::new(client_id, remote_addr, writer.clone(), DEFAULT_MAX_FRAME_SIZE));
    registry.write().await.insert(client_id, client.clone());

    handlers.dispatch_on_open(client.clone()).await;

    let mut read_buf = vec![0u8; config.receive_buffer_size];
    let mut reassembly: Option<Reassembly> = None;

    loop {
        let next = tokio::select! {
            _ = client.close_requested().notified() => {
                let _ = writer.lock().await.write_close(close_code::NORMAL).await;
                break;
            }
            next = next_frame(&mut read_half, &mut read_buf, &mut pending) => next,
        };

        let frame = match next {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(Error::CloseReceived(frame)) => {
                let status = frame
                    .payload
                    .get(0..2)
                    .map(|b| u16::from_be_bytes([b[0], b[1]]))
                    .unwrap_or(close_code::NORMAL);
                let _ = writer.lock().await.write_close(status).await;
                break;
            }
            Err(err) => {
                log::warn!("protocol error on client {client_id}: {err}");
                let _ = writer.lock().await.write_close(close_code_for(&err)).await;
                break;
            }
        };

        let outcome = match frame.opcode {
            OpCode::Ping => {
                if let Err(err) = writer.lock().await.write_pong(&frame.payload).await {
                    log::warn!("failed sending pong to client {client_id}: {err}");
                    break;
                }
                continue;
            }
            OpCode::Pong => continue,
            OpCode::Close => unreachable!("Close is reported through Error::CloseReceived"),
            OpCode::Text | OpCode::Binary if reassembly.is_some() => Err(close_code::PROTOCOL_ERROR),
            OpCode::Text | OpCode::Binary if frame.fin => {
                deliver(&config, &handlers, &client, frame.opcode, frame.payload).await
            }
            OpCode::Text | OpCode::Binary => {
                reassembly = Some(Reassembly { opcode: frame.opcode, payload: frame.payload });
                continue;
            }
            OpCode::Continuation => match reassembly.take() {
                None => Err(close_code::PROTOCOL_ERROR),
                Some(mut in_progress) => {
                    in_progress.payload.extend_from_slice(&frame.payload);
                    if in_progress.payload.len() > config.max_message_size {
                        Err(close_code::MESSAGE_TOO_LARGE)
                    } else if frame.fin {
                        deliver(&config, &handlers, &client, in_progress.opcode, in_progress.payload).await
                    } else {
                        reassembly = Some(in_progress);
                        continue;
                    }
                }
            },
        };

        if let Err(status) = outcome {
            let _ = writer.lock().await.write_close(status).await;
            break;
        }
    }

    registry.write().await.remove(&client_id);
    handlers.dispatch_on_close(client.clone()).await;
    if config.debug {
        log::debug!("client {client_id} disconnected");
    }
}

/// Reads and validates the opening handshake, returning the key and any
/// bytes read past the request line/headers — a pipelining client may have
/// sent its first WebSocket frame in the same TCP segment, and those bytes
/// belong to the read loop, not the trash.
async fn run_handshake(
    stream: &mut TcpStream,
    config: &ServerConfig,
    remote_addr: std::net::SocketAddr,
) -> Option<(String, Vec<u8>)> {
    let mut handshake_buf = vec![0u8; config.handshake_buffer_size];
    let mut filled = 0usize;

    loop {
        let n = match stream.read(&mut handshake_buf[filled..]).await {
            Ok(0) => return None,
            Ok(n) => n,
            Err(err) => {
                log::warn!("handshake read error from {remote_addr}: {err}");
                return None;
            }
        };
        filled += n;

        match handshake::parse_handshake(&handshake_buf[..filled]) {
            Ok(ParsedRequest::Incomplete) => {
                if filled == handshake_buf.len() {
                    log::warn!("handshake from {remote_addr} exceeded the configured buffer");
                    return None;
                }
            }
            Ok(ParsedRequest::Complete { consumed, sec_websocket_key }) => {
                let pending = handshake_buf[consumed..filled].to_vec();
                return Some((sec_websocket_key, pending));
            }
            Err(err) => {
                log::warn!("rejected handshake from {remote_addr}: {err}");
                let response = handshake::failure_response(&err);
                let _ = stream.write_all(&response).await;
                return None;
            }
        }
    }
}

/// Reads from the socket, feeding `pending`, until a full frame decodes off
/// its front or the peer closes the connection.
async fn next_frame(
    read_half: &mut tokio::io::ReadHalf<TcpStream>,
    read_buf: &mut [u8],
    pending: &mut Vec<u8>,
) -> Result<Option<crate::frame::Frame>, Error> {
    loop {
        match decode_frame(pending.as_slice())? {
            DecodeOutcome::Frame { frame, consumed } => {
                pending.drain(..consumed);
                return Ok(Some(frame));
            }
            DecodeOutcome::Incomplete => {
                let n = read_half.read(read_buf).await?;
                if n == 0 {
                    return Ok(None);
                }
                pending.extend_from_slice(&read_buf[..n]);
            }
        }
    }
}

/// Dispatches a fully reassembled message, validating UTF-8 first when
/// `deliver_text_as_string` requires it, and enforcing the message size cap
/// for the (common) case of a message that arrived in a single frame.
async fn deliver(
    config: &ServerConfig,
    handlers: &Handlers,
    client: &Arc<Client>,
    opcode: OpCode,
    payload: Vec<u8>,
) -> Result<(), u16> {
    if payload.len() > config.max_message_size {
        return Err(close_code::MESSAGE_TOO_LARGE);
    }

    let message = if opcode == OpCode::Text && config.deliver_text_as_string {
        match String::from_utf8(payload) {
            Ok(text) => Message::Text(text),
            Err(_) => return Err(close_code::INVALID_UTF8),
        }
    } else {
        Message::Binary(payload)
    };

    handlers.dispatch_on_message(client.clone(), message).await;
    Ok(())
}
