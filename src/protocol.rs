//! Loopback delegation wire format.
//!
//! One request line, one response line, then the connection closes:
//!
//! ```text
//! client -> resident   RUN_ONCE\n
//! resident -> client   SUCCESS\n  |  ERROR:<reason>\n
//! ```

use crate::session::Outcome;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// Longest frame either side will read, newline included.
pub const MAX_FRAME_LEN: usize = 4096;

const RUN_ONCE: &str = "RUN_ONCE";
const SUCCESS: &str = "SUCCESS";
const ERROR_PREFIX: &str = "ERROR:";

pub const BUSY_REASON: &str = "busy";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    RunOnce,
}

impl Request {
    pub fn encode(&self) -> String {
        match self {
            Self::RunOnce => format!("{RUN_ONCE}\n"),
        }
    }

    pub fn parse(frame: &str) -> Result<Self, ProtocolError> {
        match frame {
            RUN_ONCE => Ok(Self::RunOnce),
            other => Err(ProtocolError::UnknownFrame(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Success,
    Error(String),
}

impl Response {
    pub fn busy() -> Self {
        Self::Error(BUSY_REASON.to_string())
    }

    pub fn from_outcome(outcome: &Outcome) -> Self {
        match outcome {
            Outcome::Success { .. } => Self::Success,
            Outcome::Busy => Self::busy(),
            other => Self::Error(other.to_string()),
        }
    }

    pub fn encode(&self) -> String {
        match self {
            Self::Success => format!("{SUCCESS}\n"),
            Self::Error(reason) => format!("{ERROR_PREFIX}{}\n", single_line(reason)),
        }
    }

    pub fn parse(frame: &str) -> Result<Self, ProtocolError> {
        if frame == SUCCESS {
            return Ok(Self::Success);
        }
        match frame.strip_prefix(ERROR_PREFIX) {
            Some(reason) => Ok(Self::Error(reason.to_string())),
            None => Err(ProtocolError::UnknownFrame(frame.to_string())),
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Error(reason) if reason == BUSY_REASON)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("connection closed before a frame arrived")]
    Closed,

    #[error("frame exceeds {MAX_FRAME_LEN} bytes")]
    TooLong,

    #[error("unknown frame: {0:?}")]
    UnknownFrame(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reads one newline-terminated frame, without the line ending.
///
/// A final frame cut short by the peer closing is accepted as-is; the
/// parsers reject it if it is incomplete.
pub async fn read_frame<R>(reader: &mut R) -> Result<String, ProtocolError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    let read = reader
        .take(MAX_FRAME_LEN as u64)
        .read_line(&mut line)
        .await?;

    if read == 0 {
        return Err(ProtocolError::Closed);
    }
    if !line.ends_with('\n') && read >= MAX_FRAME_LEN {
        return Err(ProtocolError::TooLong);
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn single_line(reason: &str) -> String {
    reason
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}
