use crate::service::CommandService;
use crate::storage::FailureReply;
use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{error, info, warn};

pub async fn bind(host: &str, port: u16) -> Result<TcpListener> {
    TcpListener::bind((host, port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", host, port))
}

/// Accept connections until `shutdown` resolves. Each connection gets its own task.
pub async fn serve<F>(listener: TcpListener, service: Arc<CommandService>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    let local = listener.local_addr().context("Listener has no local address")?;
    info!(address = %local, "Aurex server is running");
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Server stopped by user");
                return Ok(());
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        let service = service.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, peer, service).await {
                                warn!(%peer, "Connection ended with error: {:#}", e);
                            }
                        });
                    }
                    Err(e) => error!("Failed to accept connection: {}", e),
                }
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    service: Arc<CommandService>,
) -> Result<()> {
    let ws = tokio_tungstenite::accept_async(stream)
        .await
        .context("WebSocket handshake failed")?;
    info!(%peer, "Client connected");
    let (mut sink, mut source) = ws.split();

    // Frames are handled one at a time, so replies go out in arrival order
    while let Some(frame) = source.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Binary(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) if is_disconnect(&e) => break,
            // The stream yields nothing after a read error
            Err(WsError::Utf8) => {
                warn!(%peer, "Received frame with invalid UTF-8");
                send_json(&mut sink, &FailureReply::new("Invalid UTF-8 in frame")).await?;
                break;
            }
            Err(e) => {
                error!(%peer, "Error receiving frame: {}", e);
                // Best effort; the socket may already be unusable
                let _ = send_json(&mut sink, &FailureReply::new(e.to_string())).await;
                break;
            }
        };

        if let Some(result) = service.handle(&text).await {
            send_json(&mut sink, &result).await?;
        }
    }

    info!(%peer, "Client disconnected");
    Ok(())
}

fn is_disconnect(e: &WsError) -> bool {
    matches!(
        e,
        WsError::ConnectionClosed
            | WsError::AlreadyClosed
            | WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake)
    )
}

async fn send_json<S, T>(sink: &mut S, value: &T) -> Result<()>
where
    S: futures_util::Sink<Message, Error = WsError> + Unpin,
    T: Serialize,
{
    let body = match serde_json::to_string(value) {
        Ok(body) => body,
        Err(e) => serde_json::to_string(&FailureReply::new(e.to_string()))
            .context("Failed to encode failure reply")?,
    };
    sink.send(Message::Text(body))
        .await
        .context("Failed to send reply")
}
