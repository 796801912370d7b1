//! TCP transport
//!
//! Each message travels over its own connection: connect, write the JSON
//! payload, shut down the write half. The listener reads until EOF, decodes
//! and hands the message to an [`InboundHandler`]. Malformed payloads are
//! dropped without a reply and without a log entry.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use trust_gossip_core::identity::PeerIdentity;
use trust_gossip_core::message::GossipMessage;

use crate::protocol::{decode, encode, MAX_MESSAGE_SIZE};
use crate::traits::{GossipTransport, InboundHandler};
use crate::{Error, Result};

/// Default bound on connect + write, and on reading one inbound payload
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Back-off after a failed `accept` (e.g. file descriptor exhaustion)
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Outbound TCP transport
#[derive(Debug, Clone)]
pub struct TcpTransport {
    send_timeout: Duration,
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl TcpTransport {
    /// Create a transport whose sends are bounded by `send_timeout`
    pub fn new(send_timeout: Duration) -> Self {
        Self { send_timeout }
    }

    /// Bind `addr` and dispatch every inbound message to `handler`
    ///
    /// Returns once the socket is bound. The accept loop runs on its own
    /// task until the returned handle is shut down or dropped.
    pub async fn listen(
        addr: SocketAddr,
        handler: Arc<dyn InboundHandler>,
        read_timeout: Duration,
    ) -> Result<ListenerHandle> {
        let listener = TcpListener::bind(addr).await.map_err(|source| Error::Bind {
            addr: addr.to_string(),
            source,
        })?;
        let local_addr = listener.local_addr().map_err(|source| Error::Bind {
            addr: addr.to_string(),
            source,
        })?;
        debug!(%local_addr, "peer listener bound");

        let task = tokio::spawn(accept_loop(listener, handler, read_timeout));
        Ok(ListenerHandle {
            local_addr,
            task: Some(task),
        })
    }
}

#[async_trait::async_trait]
impl GossipTransport for TcpTransport {
    async fn send_to(&self, peer: &PeerIdentity, message: &GossipMessage) -> Result<()> {
        let payload = encode(message)?;
        let target = (peer.address.as_str(), peer.port);

        let attempt = async {
            let mut stream = TcpStream::connect(target).await?;
            stream.write_all(&payload).await?;
            stream.shutdown().await
        };

        match tokio::time::timeout(self.send_timeout, attempt).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => Err(Error::Delivery {
                peer: peer.key(),
                source,
            }),
            Err(_) => Err(Error::Timeout { peer: peer.key() }),
        }
    }
}

/// Handle to a running listener; dropping it stops the accept loop
#[derive(Debug)]
pub struct ListenerHandle {
    local_addr: SocketAddr,
    task: Option<JoinHandle<()>>,
}

impl ListenerHandle {
    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections
    pub fn shutdown(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    handler: Arc<dyn InboundHandler>,
    read_timeout: Duration,
) {
    loop {
        match listener.accept().await {
            Ok((stream, _remote)) => {
                let handler = Arc::clone(&handler);
                tokio::spawn(handle_connection(stream, handler, read_timeout));
            }
            Err(e) => {
                warn!(error = %e, "accept failed");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    handler: Arc<dyn InboundHandler>,
    read_timeout: Duration,
) {
    let mut buf = Vec::new();
    let mut limited = stream.take(MAX_MESSAGE_SIZE as u64 + 1);

    let read = tokio::time::timeout(read_timeout, limited.read_to_end(&mut buf)).await;
    if !matches!(read, Ok(Ok(_))) {
        return;
    }

    // No acknowledgement exists, so a bad payload is simply dropped.
    if let Ok(message) = decode(&buf) {
        handler.on_message(message).await;
    }
}
