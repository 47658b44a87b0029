//! Session data model: trigger sources, workflow states and outcomes.

use std::fmt;
use std::time::{Duration, Instant};

/// What started a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    Hotkey,
    Delegated,
    Standalone,
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Hotkey => "hotkey",
            Self::Delegated => "delegated",
            Self::Standalone => "standalone",
        })
    }
}

/// Workflow states. Sessions only ever move forward through these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    CountdownStarted,
    Capturing,
    Recognizing,
    WritingClipboard,
    Succeeded,
    OcrFailed,
    ClipboardFailed,
    /// Region selection was aborted before recognition started.
    Cancelled,
}

impl SessionState {
    fn rank(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::CountdownStarted => 1,
            Self::Capturing => 2,
            Self::Recognizing => 3,
            Self::WritingClipboard => 4,
            Self::Succeeded | Self::OcrFailed | Self::ClipboardFailed | Self::Cancelled => 5,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.rank() == 5
    }

    /// Whether `self → next` is an edge of the workflow graph.
    pub fn can_advance_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, CountdownStarted)
                | (CountdownStarted, Capturing)
                | (CountdownStarted, Cancelled)
                | (Capturing, Recognizing)
                | (Recognizing, WritingClipboard)
                | (Recognizing, OcrFailed)
                | (WritingClipboard, Succeeded)
                | (WritingClipboard, ClipboardFailed)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("illegal session transition {from:?} -> {to:?}")]
pub struct TransitionError {
    pub from: SessionState,
    pub to: SessionState,
}

/// One end-to-end execution of the capture → OCR → clipboard workflow.
#[derive(Debug)]
pub struct Session {
    source: TriggerSource,
    state: SessionState,
    started_at: Instant,
}

impl Session {
    pub fn new(source: TriggerSource) -> Self {
        Self {
            source,
            state: SessionState::Idle,
            started_at: Instant::now(),
        }
    }

    pub fn source(&self) -> TriggerSource {
        self.source
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Moves to `next`. Regressions, skips and moves out of a terminal
    /// state are rejected and leave the state unchanged.
    pub fn advance(&mut self, next: SessionState) -> Result<(), TransitionError> {
        if !self.state.can_advance_to(next) {
            return Err(TransitionError {
                from: self.state,
                to: next,
            });
        }
        debug_assert!(next.rank() > self.state.rank());
        log::debug!(
            "[WORKFLOW] {} session: {:?} -> {:?}",
            self.source,
            self.state,
            next
        );
        self.state = next;
        Ok(())
    }
}

/// Terminal result of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success { text_len: usize },
    OcrError(String),
    ClipboardError(String),
    Busy,
    Cancelled(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Process exit code for run-once callers: 0 on success, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        if self.is_success() {
            0
        } else {
            1
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success { text_len } => write!(f, "success ({text_len} chars)"),
            Self::OcrError(reason) => write!(f, "ocr: {reason}"),
            Self::ClipboardError(reason) => write!(f, "clipboard: {reason}"),
            Self::Busy => f.write_str("busy"),
            Self::Cancelled(reason) => write!(f, "cancelled: {reason}"),
        }
    }
}
