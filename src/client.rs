//! Delegation client: hands a run-once request to a live resident.
//!
//! Two kinds of "not SUCCESS" are kept apart on purpose:
//! - the resident answered `ERROR:<reason>`: it tried and failed cleanly,
//!   so the caller reports the failure and does **not** retry locally;
//! - the exchange itself broke (nothing listening, timeout, dropped
//!   connection, garbage frame): the caller falls back to standalone.

use crate::protocol::{self, ProtocolError, Request, Response};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(500);
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(120);

/// Result of a delegation attempt.
#[derive(Debug)]
pub enum Delegation {
    /// A resident handled the request. `Err` carries its explicit error reason.
    Delegated(Result<(), String>),
    /// No usable resident; run standalone instead.
    NotDelegated(TransportError),
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("no resident at {addr}: {source}")]
    Connect { addr: SocketAddr, source: io::Error },

    #[error("connecting to {0} timed out")]
    ConnectTimeout(SocketAddr),

    #[error("no response within {0:?}")]
    ResponseTimeout(Duration),

    #[error("request write failed: {0}")]
    Write(io::Error),

    #[error("bad response: {0}")]
    Protocol(#[from] ProtocolError),
}

pub struct DelegationClient {
    addr: SocketAddr,
    connect_timeout: Duration,
    response_timeout: Duration,
}

impl DelegationClient {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, connect: Duration, response: Duration) -> Self {
        self.connect_timeout = connect;
        self.response_timeout = response;
        self
    }

    /// Tries to delegate one run-once session to the resident.
    pub async fn try_run_once(&self) -> Delegation {
        match self.exchange(Request::RunOnce).await {
            Ok(Response::Success) => {
                log::info!("[CLIENT] Resident at {} completed the session", self.addr);
                Delegation::Delegated(Ok(()))
            }
            Ok(Response::Error(reason)) => {
                log::warn!("[CLIENT] Resident at {} reported: {}", self.addr, reason);
                Delegation::Delegated(Err(reason))
            }
            Err(e) => {
                log::info!("[CLIENT] Not delegated: {}", e);
                Delegation::NotDelegated(e)
            }
        }
    }

    async fn exchange(&self, request: Request) -> Result<Response, TransportError> {
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(self.addr))
            .await
            .map_err(|_| TransportError::ConnectTimeout(self.addr))?
            .map_err(|source| TransportError::Connect {
                addr: self.addr,
                source,
            })?;
        log::debug!("[CLIENT] Connected to resident at {}", self.addr);

        let (read_half, mut write_half) = stream.into_split();
        write_half
            .write_all(request.encode().as_bytes())
            .await
            .map_err(TransportError::Write)?;

        let mut reader = BufReader::new(read_half);
        let frame = tokio::time::timeout(self.response_timeout, protocol::read_frame(&mut reader))
            .await
            .map_err(|_| TransportError::ResponseTimeout(self.response_timeout))??;

        Ok(Response::parse(&frame)?)
    }
}
