//! Chat server implementation
//!
//! Owns the room registry and the listening socket. Each accepted connection
//! gets its own detached worker task; nothing a worker does can stop the
//! accept loop.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::connection::Connection;
use crate::error::ChatError;
use crate::handler::handle_connection;
use crate::registry::RoomRegistry;
use crate::types::ClientId;

/// Default server address
pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";

/// Default cap on simultaneously served connections
pub const DEFAULT_MAX_CONNECTIONS: usize = 1024;

/// Server settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on
    pub bind_addr: String,
    /// Workers allowed at once; further connections are turned away
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_ADDR.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

/// The chat server
pub struct Server {
    listener: TcpListener,
    registry: Arc<RoomRegistry>,
    /// One permit per running worker
    permits: Arc<Semaphore>,
}

impl Server {
    /// Bind the listening socket
    pub async fn bind(config: &ServerConfig) -> io::Result<Self> {
        let listener = TcpListener::bind(&config.bind_addr).await?;
        Ok(Self {
            listener,
            registry: Arc::new(RoomRegistry::new()),
            permits: Arc::new(Semaphore::new(config.max_connections)),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    /// Accept connections forever
    pub async fn run(self) {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Accept connections until `shutdown` resolves
    ///
    /// On shutdown, every receiver mailbox is closed so blocked receiver
    /// workers wind down on their own. Workers still running that join a
    /// room afterwards are released the same way.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);

        match self.local_addr() {
            Ok(addr) => info!("Chat server listening on {}", addr),
            Err(e) => warn!("Chat server listening on unknown address: {}", e),
        }

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, no longer accepting connections");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => self.spawn_worker(stream, peer).await,
                    Err(e) => error!("Failed to accept connection: {}", e),
                },
            }
        }

        self.registry.close_all();
        info!(
            "Chat server stopped ({} room(s))",
            self.registry.room_count()
        );
    }

    /// Start a worker for a fresh connection, or turn it away if none can run
    async fn spawn_worker(&self, stream: TcpStream, peer: SocketAddr) {
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not set TCP_NODELAY for {}: {}", peer, e);
        }
        let mut conn = Connection::new(stream);

        let permit = match Arc::clone(&self.permits).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!("Connection limit reached, turning away {}", peer);
                if let Err(e) = conn.send(&ChatError::ServerBusy.into()).await {
                    debug!("Could not notify {}: {}", peer, e);
                }
                conn.close().await;
                return;
            }
        };

        let client_id = ClientId::new();
        let registry = Arc::clone(&self.registry);
        let span = info_span!("client", id = %client_id, %peer);

        tokio::spawn(
            async move {
                let _permit = permit;
                info!("Connection accepted");
                match handle_connection(conn, client_id, registry).await {
                    Ok(()) => info!("Connection closed"),
                    Err(e) => warn!("Connection ended: {}", e),
                }
            }
            .instrument(span),
        );
    }
}
