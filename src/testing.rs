//! Scripted collaborators for exercising the workflow without a screen,
//! a model or a clipboard.
//!
//! Every fake records what it was asked to do into a shared `Recorder`,
//! stamped from one monotonically increasing sequence clock, so tests can
//! assert ordering across collaborators.
//!
//! ```
//! use snipcopy_lib::gate::BusyGate;
//! use snipcopy_lib::session::{Outcome, TriggerSource};
//! use snipcopy_lib::testing::Harness;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let harness = Harness::new().ocr_reply(Ok("hi".into()));
//! let gate = BusyGate::new();
//! let admission = gate.try_admit().unwrap();
//! let outcome = harness.workflow().run(TriggerSource::Hotkey, &admission).await;
//! assert_eq!(outcome, Outcome::Success { text_len: 2 });
//! # });
//! ```

use crate::capture::{Region, RegionSelector, SelectionError};
use crate::clipboard::{ClipboardError, ClipboardSink};
use crate::dispatch::Dispatcher;
use crate::gate::BusyGate;
use crate::ocr::{OcrError, OcrExecutor};
use crate::popup::PopupPresenter;
use crate::workflow::Workflow;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Countdown(u32),
    UpdateText(String),
    Close,
    ShowError(String),
    ShowBusy,
    Select,
    Recognize(Region),
    ClipboardWrite(String),
}

#[derive(Debug, Default)]
pub struct Recorder {
    clock: AtomicU64,
    events: Mutex<Vec<(u64, Event)>>,
}

impl Recorder {
    pub fn record(&self, event: Event) {
        let tick = self.clock.fetch_add(1, Ordering::SeqCst);
        self.lock().push((tick, event));
    }

    pub fn events(&self) -> Vec<Event> {
        self.lock().iter().map(|(_, e)| e.clone()).collect()
    }

    /// Sequence number of the first event matching `pred`.
    pub fn first_tick(&self, pred: impl Fn(&Event) -> bool) -> Option<u64> {
        self.lock()
            .iter()
            .find(|(_, e)| pred(e))
            .map(|(tick, _)| *tick)
    }

    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.lock().iter().filter(|(_, e)| pred(e)).count()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(u64, Event)>> {
        self.events.lock().unwrap_or_else(|p| p.into_inner())
    }
}

pub struct RecordingPopup {
    recorder: Arc<Recorder>,
}

impl PopupPresenter for RecordingPopup {
    fn start_countdown(&self, seconds: u32) {
        self.recorder.record(Event::Countdown(seconds));
    }

    fn update_text(&self, text: &str) {
        self.recorder.record(Event::UpdateText(text.to_string()));
    }

    fn close(&self) {
        self.recorder.record(Event::Close);
    }

    fn show_error(&self, message: &str) {
        self.recorder.record(Event::ShowError(message.to_string()));
    }

    fn show_busy(&self) {
        self.recorder.record(Event::ShowBusy);
    }
}

pub struct ScriptedSelector {
    result: Result<Region, SelectionError>,
    recorder: Arc<Recorder>,
}

#[async_trait]
impl RegionSelector for ScriptedSelector {
    async fn select(&self) -> Result<Region, SelectionError> {
        self.recorder.record(Event::Select);
        self.result.clone()
    }
}

pub struct ScriptedOcr {
    reply: Result<String, String>,
    delay: Duration,
    recorder: Arc<Recorder>,
}

#[async_trait]
impl OcrExecutor for ScriptedOcr {
    async fn recognize(&self, region: &Region) -> Result<String, OcrError> {
        self.recorder.record(Event::Recognize(*region));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.reply.clone().map_err(OcrError::Request)
    }
}

pub struct RecordingClipboard {
    failure: Option<String>,
    writes: Mutex<Vec<String>>,
    recorder: Arc<Recorder>,
}

impl RecordingClipboard {
    pub fn writes(&self) -> Vec<String> {
        self.writes
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}

impl ClipboardSink for RecordingClipboard {
    fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        self.recorder.record(Event::ClipboardWrite(text.to_string()));
        if let Some(reason) = &self.failure {
            return Err(ClipboardError::WriteFailed(reason.clone()));
        }
        self.writes
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(text.to_string());
        Ok(())
    }
}

/// Builder for a workflow wired entirely to scripted collaborators.
pub struct Harness {
    pub recorder: Arc<Recorder>,
    pub clipboard: Arc<RecordingClipboard>,
    selection: Result<Region, SelectionError>,
    ocr_reply: Result<String, String>,
    ocr_delay: Duration,
}

impl Harness {
    pub fn new() -> Self {
        let recorder = Arc::new(Recorder::default());
        Self {
            clipboard: Arc::new(RecordingClipboard {
                failure: None,
                writes: Mutex::new(Vec::new()),
                recorder: Arc::clone(&recorder),
            }),
            recorder,
            selection: Ok(Region {
                x: 0,
                y: 0,
                width: 100,
                height: 40,
            }),
            ocr_reply: Ok("recognized text".to_string()),
            ocr_delay: Duration::ZERO,
        }
    }

    pub fn selection(mut self, selection: Result<Region, SelectionError>) -> Self {
        self.selection = selection;
        self
    }

    /// `Err(reason)` makes recognition fail with that reason.
    pub fn ocr_reply(mut self, reply: Result<String, String>) -> Self {
        self.ocr_reply = reply;
        self
    }

    /// Keeps each session inside OCR for `delay`, holding the gate.
    pub fn ocr_delay(mut self, delay: Duration) -> Self {
        self.ocr_delay = delay;
        self
    }

    pub fn clipboard_failure(mut self, reason: &str) -> Self {
        self.clipboard = Arc::new(RecordingClipboard {
            failure: Some(reason.to_string()),
            writes: Mutex::new(Vec::new()),
            recorder: Arc::clone(&self.recorder),
        });
        self
    }

    pub fn popup(&self) -> Arc<RecordingPopup> {
        Arc::new(RecordingPopup {
            recorder: Arc::clone(&self.recorder),
        })
    }

    pub fn workflow(&self) -> Workflow {
        Workflow::new(
            Arc::new(ScriptedSelector {
                result: self.selection.clone(),
                recorder: Arc::clone(&self.recorder),
            }),
            Arc::new(ScriptedOcr {
                reply: self.ocr_reply.clone(),
                delay: self.ocr_delay,
                recorder: Arc::clone(&self.recorder),
            }),
            self.clipboard.clone(),
            self.popup(),
        )
        .with_countdown(0)
        .with_standalone_linger(Duration::from_millis(10))
    }

    pub fn dispatcher(&self, gate: Arc<BusyGate>) -> Dispatcher {
        Dispatcher::new(gate, Arc::new(self.workflow()))
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
