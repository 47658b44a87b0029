//! Resident coordinator: owns the loopback port and serves delegations.
//!
//! Successfully binding the port *is* residency: there is no lock file and
//! no PID check. The OS reclaims the port when the process exits, so a
//! later resident can bind again without any deregistration step.

use crate::dispatch::{Dispatcher, PopupSink, ResponseSink};
use crate::popup::PopupPresenter;
use crate::protocol::{self, ProtocolError, Request, Response};
use crate::session::TriggerSource;
use std::future::Future;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);
/// Pause after a failed `accept`, so persistent errors (EMFILE) don't spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Loopback address for a configured start port.
pub fn loopback(port: u16) -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, port))
}

#[derive(Debug, thiserror::Error)]
pub enum ResidentError {
    #[error("another resident already owns port {0}")]
    AlreadyRunning(u16),

    #[error("failed to bind {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },

    #[error("listener error: {0}")]
    Io(#[from] io::Error),
}

pub struct Resident {
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
    request_timeout: Duration,
}

impl Resident {
    /// Claims residency by binding `addr`.
    pub async fn bind(addr: SocketAddr, dispatcher: Arc<Dispatcher>) -> Result<Self, ResidentError> {
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            if e.kind() == io::ErrorKind::AddrInUse {
                ResidentError::AlreadyRunning(addr.port())
            } else {
                ResidentError::Bind { addr, source: e }
            }
        })?;
        log::info!("[RESIDENT] Bound {}; this process is the resident", listener.local_addr()?);

        Ok(Self {
            listener,
            dispatcher,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    /// Bound on reading a request and on writing its reply.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ResidentError> {
        Ok(self.listener.local_addr()?)
    }

    /// Dispatches a hotkey session for every trigger received on `triggers`.
    ///
    /// Each trigger runs in its own task so a rejected trigger gets its busy
    /// popup immediately instead of waiting behind the active session.
    pub fn spawn_hotkey_loop(
        &self,
        mut triggers: mpsc::Receiver<()>,
        popup: Arc<dyn PopupPresenter>,
    ) -> JoinHandle<()> {
        let dispatcher = Arc::clone(&self.dispatcher);
        tokio::spawn(async move {
            while triggers.recv().await.is_some() {
                log::info!("[RESIDENT] Hotkey trigger");
                let dispatcher = Arc::clone(&dispatcher);
                let sink = PopupSink::new(Arc::clone(&popup));
                tokio::spawn(async move {
                    dispatcher.trigger(TriggerSource::Hotkey, &sink).await;
                });
            }
            log::info!("[RESIDENT] Hotkey source closed");
        })
    }

    /// Accepts delegations forever.
    pub async fn serve(self) -> Result<(), ResidentError> {
        self.serve_until(std::future::pending::<()>()).await
    }

    /// Accepts delegations until `shutdown` completes.
    pub async fn serve_until<F>(self, shutdown: F) -> Result<(), ResidentError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    log::info!("[RESIDENT] Shutting down");
                    return Ok(());
                }
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            // Per-connection failures (e.g. reset before accept) are not fatal.
                            log::warn!("[RESIDENT] Accept failed: {}", e);
                            tokio::time::sleep(ACCEPT_BACKOFF).await;
                            continue;
                        }
                    };
                    let dispatcher = Arc::clone(&self.dispatcher);
                    let timeout = self.request_timeout;
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, dispatcher, timeout).await {
                            log::warn!("[RESIDENT] Delegation from {} failed: {}", peer, e);
                        }
                    });
                }
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    dispatcher: Arc<Dispatcher>,
    timeout: Duration,
) -> Result<(), ProtocolError> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let frame = tokio::time::timeout(timeout, protocol::read_frame(&mut reader))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "request read timed out"))??;

    let response = match Request::parse(&frame) {
        Ok(Request::RunOnce) => {
            log::info!("[RESIDENT] Delegated run-once request");
            let sink = ResponseSink::default();
            let outcome = dispatcher.trigger(TriggerSource::Delegated, &sink).await;
            sink.take().unwrap_or_else(|| Response::from_outcome(&outcome))
        }
        Err(e) => {
            log::warn!("[RESIDENT] Rejecting request: {}", e);
            Response::Error(e.to_string())
        }
    };

    let write = async {
        write_half.write_all(response.encode().as_bytes()).await?;
        write_half.shutdown().await
    };
    tokio::time::timeout(timeout, write)
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "reply write timed out"))??;

    log::debug!("[RESIDENT] Replied {:?}", response);
    Ok(())
}
