//! WebSocket subscription endpoint
//!
//! Every accepted connection becomes one hub subscriber. Broadcast messages
//! are forwarded as text frames; anything the client sends is logged and
//! otherwise ignored. The connection's subscription is removed when either
//! side closes.

use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::BroadcastHub;
use crate::errors::{ServerError, ServerResult};

/// Resolve `host:port` into a listen address
pub fn resolve_listen_addr(host: &str, port: u16) -> ServerResult<SocketAddr> {
    (host, port)
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(|| ServerError::InvalidAddress {
            address: format!("{}:{}", host, port),
        })
}

/// Accept loop attaching WebSocket clients to the hub
#[derive(Debug)]
pub struct SubscriptionServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    hub: Arc<BroadcastHub>,
}

impl SubscriptionServer {
    /// Bind the listening socket
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Bind` if the address is unavailable
    pub async fn bind(addr: SocketAddr, hub: Arc<BroadcastHub>) -> ServerResult<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener.local_addr().unwrap_or(addr);
        Ok(Self {
            listener,
            local_addr,
            hub,
        })
    }

    /// Address actually bound (useful when binding port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections until shutdown is signalled
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!("Subscription endpoint listening on ws://{}", self.local_addr);

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    debug!("Subscription endpoint received shutdown signal");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let hub = Arc::clone(&self.hub);
                        let shutdown = shutdown_rx.resubscribe();
                        tokio::spawn(handle_connection(stream, peer, hub, shutdown));
                    }
                    Err(e) => warn!(error = %e, "Failed to accept connection"),
                },
            }
        }

        info!("Subscription endpoint stopped");
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    hub: Arc<BroadcastHub>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            let e = ServerError::from(e);
            warn!(peer = %peer, error = %e, "Rejected connection");
            return;
        }
    };

    let (mut write, mut read) = ws_stream.split();
    let mut subscription = hub.subscribe();
    let subscriber = subscription.id();
    info!(peer = %peer, subscriber, "Subscriber connected");

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                let _ = write.send(Message::Close(None)).await;
                break;
            }
            outbound = subscription.recv() => match outbound {
                Some(text) => {
                    if let Err(e) = write.send(Message::Text(text)).await {
                        debug!(peer = %peer, error = %e, "Write to subscriber failed");
                        break;
                    }
                }
                None => break,
            },
            inbound = read.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    info!(peer = %peer, "Message from subscriber: {}", text);
                }
                Some(Ok(Message::Binary(data))) => {
                    debug!(peer = %peer, bytes = data.len(), "Binary message from subscriber ignored");
                }
                Some(Ok(Message::Close(_))) | None => break,
                // Ping/pong is answered by tungstenite itself
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(peer = %peer, error = %e, "Subscriber read error");
                    break;
                }
            },
        }
    }

    hub.unsubscribe(subscriber);
    info!(peer = %peer, subscriber, "Subscriber disconnected");
}
