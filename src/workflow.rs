//! Workflow engine: one OCR session from countdown to clipboard.
//!
//! The same state machine runs for hotkey, delegated and standalone
//! triggers. Only the collaborators differ: who selects the region, who
//! performs capture/OCR, and who hears about the outcome (see `dispatch`).

use crate::capture::RegionSelector;
use crate::clipboard::{self, ClipboardSink};
use crate::gate::Admission;
use crate::ocr::{OcrError, OcrExecutor};
use crate::popup::{PopupPresenter, CLIPBOARD_ERROR_TEXT, SUCCESS_TEXT};
use crate::session::{Outcome, Session, SessionState, TriggerSource};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_COUNTDOWN_SECS: u32 = 3;
/// How long a standalone run keeps its success popup before closing it.
pub const DEFAULT_STANDALONE_LINGER: Duration = Duration::from_millis(1500);

pub struct Workflow {
    selector: Arc<dyn RegionSelector>,
    ocr: Arc<dyn OcrExecutor>,
    clipboard: Arc<dyn ClipboardSink>,
    popup: Arc<dyn PopupPresenter>,
    countdown_secs: u32,
    standalone_linger: Duration,
}

impl Workflow {
    pub fn new(
        selector: Arc<dyn RegionSelector>,
        ocr: Arc<dyn OcrExecutor>,
        clipboard: Arc<dyn ClipboardSink>,
        popup: Arc<dyn PopupPresenter>,
    ) -> Self {
        Self {
            selector,
            ocr,
            clipboard,
            popup,
            countdown_secs: DEFAULT_COUNTDOWN_SECS,
            standalone_linger: DEFAULT_STANDALONE_LINGER,
        }
    }

    pub fn with_countdown(mut self, seconds: u32) -> Self {
        self.countdown_secs = seconds;
        self
    }

    pub fn with_standalone_linger(mut self, linger: Duration) -> Self {
        self.standalone_linger = linger;
        self
    }

    pub fn popup(&self) -> &Arc<dyn PopupPresenter> {
        &self.popup
    }

    /// Runs one session to a terminal state.
    ///
    /// Requires an `Admission` from the busy gate; the caller keeps it alive
    /// for the duration of the call and drops it afterwards.
    pub async fn run(&self, source: TriggerSource, _admission: &Admission) -> Outcome {
        let mut session = Session::new(source);

        // Countdown first, before any capture work.
        self.step(&mut session, SessionState::CountdownStarted);
        self.popup.start_countdown(self.countdown_secs);

        let region = match self.selector.select().await {
            Ok(region) => region,
            Err(e) => {
                self.step(&mut session, SessionState::Cancelled);
                log::info!("[WORKFLOW] {} session cancelled: {}", source, e);
                self.popup.close();
                return Outcome::Cancelled(e.to_string());
            }
        };
        self.step(&mut session, SessionState::Capturing);
        log::debug!("[WORKFLOW] Region selected: {}", region);

        self.step(&mut session, SessionState::Recognizing);
        let text = match self.ocr.recognize(&region).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => return self.ocr_failed(&mut session, OcrError::NoText),
            Err(e) => return self.ocr_failed(&mut session, e),
        };

        self.step(&mut session, SessionState::WritingClipboard);
        let text_len = text.chars().count();
        if let Err(e) = clipboard::write_exclusive(Arc::clone(&self.clipboard), text).await {
            self.step(&mut session, SessionState::ClipboardFailed);
            log::error!("[WORKFLOW] {} session clipboard write failed: {}", source, e);
            self.popup.close();
            self.popup.show_error(CLIPBOARD_ERROR_TEXT);
            return Outcome::ClipboardError(e.to_string());
        }

        self.step(&mut session, SessionState::Succeeded);
        log::info!(
            "[WORKFLOW] {} session copied {} chars in {}ms",
            source,
            text_len,
            session.elapsed().as_millis()
        );
        self.popup.update_text(SUCCESS_TEXT);
        if source == TriggerSource::Standalone {
            // Resident presenters manage their own timeout; a one-shot
            // process has to close its popup before exiting.
            tokio::time::sleep(self.standalone_linger).await;
            self.popup.close();
        }

        Outcome::Success { text_len }
    }

    fn ocr_failed(&self, session: &mut Session, error: OcrError) -> Outcome {
        self.step(session, SessionState::OcrFailed);
        log::error!(
            "[WORKFLOW] {} session OCR failed after {}ms: {}",
            session.source(),
            session.elapsed().as_millis(),
            error
        );
        self.popup.close();
        Outcome::OcrError(error.to_string())
    }

    fn step(&self, session: &mut Session, next: SessionState) {
        if let Err(e) = session.advance(next) {
            log::error!("[WORKFLOW] {}", e);
        }
    }
}
