use std::net::SocketAddr;
use std::time::Duration;

use dirlist_common::{Error, DEFAULT_PORT};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::session::{handle_connection, SessionConfig};

/// Pause after a failed accept so a persistent error (out of descriptors)
/// does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    pub idle_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: format!("0.0.0.0:{DEFAULT_PORT}"),
            idle_timeout: Some(Duration::from_secs(300)),
        }
    }
}

/// TCP front end. Connections are served one at a time, each to completion.
pub struct DirectoryServer {
    listener: TcpListener,
    session: SessionConfig,
}

impl DirectoryServer {
    pub async fn bind(config: &ServerConfig) -> Result<Self, Error> {
        let listener = TcpListener::bind(&config.bind)
            .await
            .map_err(|e| Error::io(&config.bind, e))?;
        Ok(DirectoryServer {
            listener,
            session: SessionConfig {
                idle_timeout: config.idle_timeout,
            },
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        self.listener
            .local_addr()
            .map_err(|e| Error::io("listener", e))
    }

    /// Accept a single connection and serve it. Failures inside the
    /// exchange are logged, not returned; only a failed accept is an error.
    pub async fn serve_one(&self) -> Result<(), Error> {
        info!("Waiting for connection...");
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(|e| Error::io("listener", e))?;
        info!("Connection established from {}", peer);

        match handle_connection(stream, &self.session).await {
            Ok(()) => info!("Connection from {} closed", peer),
            Err(e) => error!("Connection error from {}: {}", peer, e),
        }
        Ok(())
    }

    /// Serve connections until the process is stopped. A failed accept is
    /// logged and the listener keeps going.
    pub async fn run(&self) -> Result<(), Error> {
        info!("Directory server listening on {}", self.local_addr()?);
        loop {
            if let Err(e) = self.serve_one().await {
                error!("Failed to accept connection: {}", e);
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
}
