use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use hyper_util::server::graceful::GracefulShutdown;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::service::DispatchService;
use crate::dispatcher::Dispatcher;

/// Default request body limit: 10 MiB.
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// hyper listener for a built dispatcher.
///
/// Serves HTTP/1.1 and HTTP/2 on every accepted connection.
#[derive(Debug, Clone)]
pub struct HttpServer {
    dispatcher: Dispatcher,
    max_body_bytes: usize,
}

/// Handle to a running HTTP server
///
/// Provides methods for waiting until the server is ready, stopping it gracefully,
/// or joining the accept task.
#[derive(Debug)]
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl HttpServer {
    #[must_use]
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Requests with larger bodies are answered with 413.
    #[must_use]
    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    /// Bind `addr` and start accepting connections on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be resolved or bound.
    pub async fn start<A: ToSocketAddrs>(self, addr: A) -> io::Result<ServerHandle> {
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        let (tx, rx) = oneshot::channel();
        let service = DispatchService::new(self.dispatcher, self.max_body_bytes);

        info!(
            addr = %addr,
            max_body_bytes = self.max_body_bytes,
            "HTTP server listening"
        );
        let task = tokio::spawn(serve(listener, service, rx));
        Ok(ServerHandle {
            addr,
            shutdown: Some(tx),
            task,
        })
    }
}

impl ServerHandle {
    /// Address actually bound, useful after binding port 0.
    #[inline]
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Wait for the server to be ready to accept connections
    ///
    /// # Errors
    ///
    /// Returns `TimedOut` if the server doesn't accept a connection within ~250ms
    /// (50 attempts × 5ms).
    pub async fn wait_ready(&self) -> io::Result<()> {
        for _ in 0..50 {
            if TcpStream::connect(self.addr).await.is_ok() {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        Err(io::Error::new(io::ErrorKind::TimedOut, "server not ready"))
    }

    /// Stop accepting, drain in-flight connections, then return.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            error!(error = %e, "HTTP server task failed");
        }
    }

    /// Run until ctrl-c, then stop gracefully.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal handler cannot be installed.
    pub async fn shutdown_on_ctrl_c(self) -> io::Result<()> {
        tokio::signal::ctrl_c().await?;
        info!("Received shutdown signal, draining connections");
        self.stop().await;
        Ok(())
    }

    /// Wait for the accept task to finish without requesting a stop.
    ///
    /// # Errors
    ///
    /// Returns an error if the accept task panicked or was cancelled.
    pub async fn join(mut self) -> Result<(), tokio::task::JoinError> {
        // Dropping the sender would stop the server.
        let _keep = self.shutdown.take();
        (&mut self.task).await
    }
}

/// Accept loop: serve connections until `shutdown` fires.
async fn serve(listener: TcpListener, service: DispatchService, shutdown: oneshot::Receiver<()>) {
    let graceful = GracefulShutdown::new();
    let http = HttpConnBuilder::new(TokioExecutor::new());
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, peer_addr) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "Failed to accept connection");
                        continue;
                    }
                };

                let conn = http.serve_connection(TokioIo::new(stream), service.clone());
                let conn = graceful.watch(conn.into_owned());

                tokio::spawn(async move {
                    if let Err(e) = conn.await {
                        error!(peer_addr = %peer_addr, error = %e, "Connection error");
                    }
                });
            }

            _ = &mut shutdown => {
                info!("Shutting down HTTP server");
                break;
            }
        }
    }

    graceful.shutdown().await;
    info!("All connections drained");
}
