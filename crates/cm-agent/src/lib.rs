//! The executor: a single-connection TCP server that turns `Execute`
//! messages into backend calls and answers with acks.
//!
//! One connection is serviced at a time and requests are strictly
//! one-in-flight: a frame is read, dispatched to completion, and answered
//! before the next read. A second client that connects mid-presentation is
//! told `busy` and dropped. A disconnect returns the server to its accept
//! state; whatever action list was already dispatched runs to completion
//! and its ack is discarded with the connection.

use cm_automation::ActionBackend;
use cm_protocol::{AckStatus, FrameBuffer, Message, read_message, write_message};
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{Duration, timeout};
use tracing::{debug, info, warn};

/// How long a refused extra client gets to finish sending its first
/// message before the busy ack goes out.
const BUSY_READ_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("accept failed: {0}")]
    Accept(#[from] std::io::Error),
}

pub struct Agent<B: ActionBackend> {
    listener: TcpListener,
    backend: B,
}

impl<B: ActionBackend> Agent<B> {
    /// Binds `0.0.0.0:port` and wraps the backend.
    pub async fn bind(port: u16, backend: B) -> Result<Self, AgentError> {
        let addr = format!("0.0.0.0:{port}");
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| AgentError::Bind { addr, source })?;
        Ok(Self::from_listener(listener, backend))
    }

    /// Wraps an already-bound listener; tests bind `127.0.0.1:0`.
    pub fn from_listener(listener: TcpListener, backend: B) -> Self {
        Self { listener, backend }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept loop. Runs until the listener itself fails.
    pub async fn run(self) -> Result<(), AgentError> {
        let Self {
            listener,
            mut backend,
        } = self;
        if let Ok(addr) = listener.local_addr() {
            info!(target: "agent.server", %addr, "listening");
        }
        loop {
            let (stream, peer) = listener.accept().await?;
            info!(target: "agent.server", %peer, "client_connected");
            let end = serve_connection(&listener, &mut backend, stream).await;
            info!(target: "agent.server", %peer, end = end.as_str(), "client_finished");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionEnd {
    CleanEof,
    ReadFailed,
    ProtocolViolation,
    AckDropped,
}

impl ConnectionEnd {
    fn as_str(&self) -> &'static str {
        match self {
            ConnectionEnd::CleanEof => "clean_eof",
            ConnectionEnd::ReadFailed => "read_failed",
            ConnectionEnd::ProtocolViolation => "protocol_violation",
            ConnectionEnd::AckDropped => "ack_dropped",
        }
    }
}

/// Services one connection until it ends, refusing any extra client that
/// arrives while it is live.
async fn serve_connection<B: ActionBackend>(
    listener: &TcpListener,
    backend: &mut B,
    mut stream: TcpStream,
) -> ConnectionEnd {
    let mut frames = FrameBuffer::new();
    loop {
        tokio::select! {
            // The live client is serviced ahead of any newcomer, so a
            // disconnect is observed before the next accept.
            biased;
            inbound = read_message(&mut stream, &mut frames) => {
                let message = match inbound {
                    Ok(Some(message)) => message,
                    Ok(None) => return ConnectionEnd::CleanEof,
                    Err(err) => {
                        warn!(target: "agent.server", %err, "read_error");
                        return ConnectionEnd::ReadFailed;
                    }
                };
                let reply = match dispatch(backend, message).await {
                    Ok(reply) => reply,
                    Err(violation) => {
                        warn!(target: "agent.server", violation, "protocol_violation");
                        return ConnectionEnd::ProtocolViolation;
                    }
                };
                if let Err(err) = write_message(&mut stream, &reply).await {
                    // The client went away while we were working; the ack
                    // has nowhere to go.
                    debug!(target: "agent.server", %err, "ack_dropped");
                    return ConnectionEnd::AckDropped;
                }
            }
            extra = listener.accept() => {
                if let Ok((extra_stream, extra_peer)) = extra {
                    warn!(target: "agent.server", peer = %extra_peer, "busy_refused");
                    refuse_busy(extra_stream).await;
                }
            }
        }
    }
}

/// Handles one inbound message. `Ack` and `Pong` never legitimately flow
/// toward the executor; receiving one is a protocol violation.
async fn dispatch<B: ActionBackend>(
    backend: &mut B,
    message: Message,
) -> Result<Message, &'static str> {
    match message {
        Message::Execute {
            actions,
            typing_speed,
            typing_variance,
        } => {
            info!(
                target: "agent.dispatch",
                actions = actions.len(),
                typing_speed,
                typing_variance,
                "execute_begin"
            );
            let reply = match backend
                .execute(&actions, typing_speed, typing_variance)
                .await
            {
                Ok(()) => Message::Ack {
                    status: AckStatus::Ok,
                    message: None,
                },
                Err(err) => {
                    warn!(target: "agent.dispatch", %err, "execute_failed");
                    Message::Ack {
                        status: AckStatus::Error,
                        message: Some(err.to_string()),
                    }
                }
            };
            info!(target: "agent.dispatch", "execute_done");
            Ok(reply)
        }
        Message::Ping => Ok(Message::Pong),
        Message::Ack { .. } => Err("inbound ack"),
        Message::Pong => Err("inbound pong"),
    }
}

/// Reads the refused client's first message if it arrives promptly, then
/// answers `busy` and drops the connection.
async fn refuse_busy(mut stream: TcpStream) {
    let mut frames = FrameBuffer::new();
    let _ = timeout(BUSY_READ_GRACE, read_message(&mut stream, &mut frames)).await;
    let busy = Message::Ack {
        status: AckStatus::Error,
        message: Some("busy".to_string()),
    };
    if let Err(err) = write_message(&mut stream, &busy).await {
        debug!(target: "agent.server", %err, "busy_ack_dropped");
    }
}
