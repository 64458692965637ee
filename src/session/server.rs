//! TCP transport: line-delimited JSON, one task per connection.
//!
//! Each connection owns its own [`Session`]; nothing is shared between
//! connections. The per-connection loop suspends only on the next inbound
//! line, the AI cadence timer, and the outbound write.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::session::protocol::{parse_client_message, ErrorCode, ServerMessage};
use crate::session::state::Session;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7777,
        }
    }
}

/// Bind and accept connections forever.
///
/// `ready_tx`, when given, receives the bound address once the listener
/// is up (port 0 binds an ephemeral port; tests use this).
pub async fn run_server(
    config: ServerConfig,
    ready_tx: Option<oneshot::Sender<SocketAddr>>,
) -> Result<()> {
    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    let bound = listener.local_addr()?;
    info!(%bound, "session server listening");
    if let Some(tx) = ready_tx {
        let _ = tx.send(bound);
    }

    loop {
        let (socket, addr) = listener.accept().await?;
        info!(%addr, "client connected");
        tokio::spawn(async move {
            if let Err(err) = handle_connection(socket).await {
                warn!(%addr, %err, "connection error");
            }
            // Dropping the session cancels any cadence and discards all
            // per-connection state.
            info!(%addr, "client disconnected");
        });
    }
}

async fn handle_connection(socket: TcpStream) -> Result<()> {
    let (reader, mut writer) = socket.into_split();
    let mut lines = BufReader::new(reader).lines();
    let mut session = Session::new();

    loop {
        let cadence = session.cadence();
        let replies = tokio::select! {
            line = lines.next_line() => match line? {
                None => break,
                Some(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match parse_client_message(line) {
                        Ok(msg) => session.handle_message(msg),
                        Err(err) => {
                            warn!(%err, "unparseable message");
                            vec![ServerMessage::error(
                                ErrorCode::InvalidMessage,
                                format!("could not parse message: {err}"),
                            )]
                        }
                    }
                }
            },
            () = sleep_or_forever(cadence) => session.on_tick(),
        };

        for reply in &replies {
            let json = serde_json::to_string(reply)?;
            writer.write_all(json.as_bytes()).await?;
            writer.write_all(b"\n").await?;
        }
        if !replies.is_empty() {
            writer.flush().await?;
        }
    }

    Ok(())
}

/// Sleep for the cadence period, or park forever when no timer is active.
async fn sleep_or_forever(period: Option<Duration>) {
    match period {
        Some(period) => tokio::time::sleep(period).await,
        None => std::future::pending().await,
    }
}
