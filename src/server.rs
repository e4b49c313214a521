//! HTTP transport hosting the live-update stream.

use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{lookup_host, TcpListener};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::broker::BrokerHandle;
use crate::error::TransportError;
use crate::handlers::{health_handler, updates_handler};

/// Shared state passed to every handler.
#[derive(Clone)]
pub struct ServerState {
    pub broker: BrokerHandle,
    pub token: CancellationToken,
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/process/updates", get(updates_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// A running transport.
pub struct ServerHandle {
    local_addr: SocketAddr,
    task: JoinHandle<Result<(), TransportError>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Waits for the server to finish its graceful shutdown, bounded by `timeout`.
    ///
    /// The shutdown itself is triggered by cancelling the token passed to
    /// [`start_server`]. Errors and timeouts are logged and returned.
    pub async fn drain(self, timeout: Duration) -> Result<(), TransportError> {
        let mut task = self.task;
        match tokio::time::timeout(timeout, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => {
                error!("Live server task failed: {}", join_err);
                Err(TransportError::Serve(std::io::Error::other(join_err.to_string())))
            }
            Err(_) => {
                warn!("Live server did not stop within {:?}, aborting", timeout);
                task.abort();
                Err(TransportError::ShutdownTimeout(timeout))
            }
        }
    }
}

/// Resolves `host` (`host:port`) to the first socket address.
pub async fn resolve_host(host: &str) -> Result<SocketAddr, TransportError> {
    let mut addrs = lookup_host(host).await.map_err(|e| TransportError::Resolve {
        host: host.to_string(),
        detail: e.to_string(),
    })?;
    addrs.next().ok_or_else(|| TransportError::Resolve {
        host: host.to_string(),
        detail: "no addresses found".into(),
    })
}

/// Binds the listener and starts serving in the background.
///
/// Bind failures are returned immediately. The server stops accepting
/// connections and ends open streams once `token` is cancelled.
#[instrument(skip(broker, token))]
pub async fn start_server(
    host: &str,
    broker: BrokerHandle,
    token: CancellationToken,
) -> Result<ServerHandle, TransportError> {
    let addr = resolve_host(host).await?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| TransportError::Bind {
            addr: addr.to_string(),
            source,
        })?;
    let local_addr = listener.local_addr().map_err(TransportError::Serve)?;
    info!("Live updates listening on http://{}/process/updates", local_addr);

    let app = router(ServerState {
        broker,
        token: token.clone(),
    });

    let task = tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(token.clone().cancelled_owned())
            .await;
        match result {
            Ok(()) => {
                debug!("Live server stopped");
                Ok(())
            }
            Err(e) => {
                error!("Live server error: {}", e);
                token.cancel();
                Err(TransportError::Serve(e))
            }
        }
    });

    Ok(ServerHandle { local_addr, task })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_localhost() {
        let addr = resolve_host("127.0.0.1:8089").await.unwrap();
        assert_eq!(addr.port(), 8089);
    }

    #[tokio::test]
    async fn test_resolve_rejects_missing_port() {
        assert!(matches!(
            resolve_host("localhost").await,
            Err(TransportError::Resolve { .. })
        ));
    }

    #[tokio::test]
    async fn test_bind_conflict_is_reported() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let host = taken.local_addr().unwrap().to_string();

        let token = CancellationToken::new();
        let (broker, _task) = crate::broker::LiveBroker::spawn(4, 4, token.clone());
        let result = start_server(&host, broker, token).await;
        assert!(matches!(result, Err(TransportError::Bind { .. })));
    }

    #[tokio::test]
    async fn test_cancel_stops_server_and_keeps_run_token() {
        let token = CancellationToken::new();
        let (broker, _task) = crate::broker::LiveBroker::spawn(4, 4, token.clone());
        let server = start_server("127.0.0.1:0", broker, token.clone())
            .await
            .unwrap();
        assert_ne!(server.local_addr().port(), 0);

        token.cancel();
        server.drain(Duration::from_secs(2)).await.unwrap();
        assert!(token.is_cancelled());
    }
}
