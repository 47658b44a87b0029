//! Trigger dispatch: busy gate → workflow → outcome sink.
//!
//! Hotkey, delegated and standalone triggers all go through
//! `Dispatcher::trigger`. They differ only in the `OutcomeSink` that hears
//! about the terminal outcome.

use crate::gate::BusyGate;
use crate::popup::PopupPresenter;
use crate::protocol::Response;
use crate::session::{Outcome, TriggerSource};
use crate::workflow::Workflow;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

/// Where a terminal outcome is delivered.
pub trait OutcomeSink: Send + Sync {
    fn report(&self, outcome: &Outcome);
}

/// Hotkey sessions: the workflow already drove the popup, so only a
/// rejected trigger needs a popup of its own.
pub struct PopupSink {
    popup: Arc<dyn PopupPresenter>,
}

impl PopupSink {
    pub fn new(popup: Arc<dyn PopupPresenter>) -> Self {
        Self { popup }
    }
}

impl OutcomeSink for PopupSink {
    fn report(&self, outcome: &Outcome) {
        if *outcome == Outcome::Busy {
            self.popup.show_busy();
        }
    }
}

/// Delegated sessions: the outcome becomes the wire response.
#[derive(Debug, Default)]
pub struct ResponseSink {
    response: Mutex<Option<Response>>,
}

impl ResponseSink {
    pub fn take(&self) -> Option<Response> {
        self.response
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take()
    }
}

impl OutcomeSink for ResponseSink {
    fn report(&self, outcome: &Outcome) {
        *self.response.lock().unwrap_or_else(|p| p.into_inner()) =
            Some(Response::from_outcome(outcome));
    }
}

/// Standalone sessions: the outcome becomes the process exit code.
#[derive(Debug)]
pub struct ExitCodeSink {
    code: AtomicU8,
}

impl ExitCodeSink {
    pub fn new() -> Self {
        // Non-zero until a success is reported.
        Self {
            code: AtomicU8::new(1),
        }
    }

    pub fn code(&self) -> u8 {
        self.code.load(Ordering::SeqCst)
    }
}

impl Default for ExitCodeSink {
    fn default() -> Self {
        Self::new()
    }
}

impl OutcomeSink for ExitCodeSink {
    fn report(&self, outcome: &Outcome) {
        self.code.store(outcome.exit_code(), Ordering::SeqCst);
    }
}

/// The single shared admission point for one process.
pub struct Dispatcher {
    gate: Arc<BusyGate>,
    workflow: Arc<Workflow>,
}

impl Dispatcher {
    pub fn new(gate: Arc<BusyGate>, workflow: Arc<Workflow>) -> Self {
        Self { gate, workflow }
    }

    pub fn gate(&self) -> &Arc<BusyGate> {
        &self.gate
    }

    /// Admits and runs one session, or reports `Busy` without waiting.
    ///
    /// The gate is released before the sink is told, so delivering the
    /// outcome (e.g. a network reply) never extends the busy window.
    pub async fn trigger(&self, source: TriggerSource, sink: &dyn OutcomeSink) -> Outcome {
        let outcome = match self.gate.try_admit() {
            Some(admission) => {
                let outcome = self.workflow.run(source, &admission).await;
                drop(admission);
                outcome
            }
            None => {
                log::warn!("[GATE] {} trigger rejected: session already active", source);
                Outcome::Busy
            }
        };
        sink.report(&outcome);
        outcome
    }
}
