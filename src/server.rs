//! TCP listener for chat clients
//!
//! Accepts connections and gives each its own session. Sessions share only
//! the read-only catalog and launcher handles.

mod handler;
mod interpreter;

use crate::catalog::CatalogProvider;
use crate::player::PlaybackLauncher;
use crate::transport::TransportError;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use handler::handle_connection;

// Server result type using TransportError for structured error handling
type ServerResult<T> = std::result::Result<T, TransportError>;

pub struct IrcServer {
    inner: Arc<ServerInner>,
    listener: TcpListener,
}

impl IrcServer {
    pub async fn bind(
        listen_addr: &str,
        server_name: &str,
        catalog: Arc<dyn CatalogProvider>,
        launcher: Arc<dyn PlaybackLauncher>,
    ) -> ServerResult<Self> {
        let listener = TcpListener::bind(listen_addr).await.map_err(|e| {
            TransportError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to bind {}: {}", listen_addr, e),
            ))
        })?;

        let inner = Arc::new(ServerInner {
            server_name: server_name.to_string(),
            catalog,
            launcher,
        });

        Ok(Self { inner, listener })
    }

    pub fn local_addr(&self) -> ServerResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until Ctrl-C
    pub async fn run(&self) -> ServerResult<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Serve until `shutdown` completes
    pub async fn run_until<F>(&self, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()>,
    {
        log::info!(
            "{} listening on {}",
            self.inner.server_name,
            self.local_addr()?
        );

        tokio::select! {
            _ = shutdown => {
                log::info!("Shutdown signal received, stopping server...");
                Ok(())
            }
            result = self.accept_loop() => result,
        }
    }

    async fn accept_loop(&self) -> ServerResult<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, _)) => {
                    let inner = Arc::clone(&self.inner);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, inner).await {
                            log::warn!("Session ended with error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    log::error!("Failed to accept connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }
}

/// State shared by every session
struct ServerInner {
    server_name: String,
    catalog: Arc<dyn CatalogProvider>,
    launcher: Arc<dyn PlaybackLauncher>,
}
