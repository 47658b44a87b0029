//! Popup presenter: the user-facing progress indicator for a session.
//!
//! Instructions are fire-and-forget: a presenter that cannot draw logs and
//! moves on, it never fails the session.

pub const SUCCESS_TEXT: &str = "Copied to clipboard";
pub const CLIPBOARD_ERROR_TEXT: &str = "Could not write to the clipboard";
pub const BUSY_TEXT: &str = "Busy: another capture is in progress";

pub trait PopupPresenter: Send + Sync {
    /// Show the countdown popup. Always the first instruction of a session.
    fn start_countdown(&self, seconds: u32);

    /// Replace the popup text, e.g. with a success indication.
    fn update_text(&self, text: &str);

    /// Close the countdown/result popup.
    fn close(&self);

    /// Show a separate error popup.
    fn show_error(&self, message: &str);

    /// Tell the user a trigger was rejected because a session is active.
    fn show_busy(&self) {
        self.show_error(BUSY_TEXT);
    }
}

/// The countdown runs alongside capture and OCR, not before them.
fn progress_line(seconds: u32) -> String {
    if seconds == 0 {
        "working...".to_string()
    } else {
        format!("working (up to {seconds}s)...")
    }
}

/// Presenter for terminals: writes popup instructions to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsolePresenter;

impl PopupPresenter for ConsolePresenter {
    fn start_countdown(&self, seconds: u32) {
        log::debug!("[POPUP] countdown {}s", seconds);
        eprintln!("snipcopy: {}", progress_line(seconds));
    }

    fn update_text(&self, text: &str) {
        log::debug!("[POPUP] text: {}", text);
        eprintln!("snipcopy: {text}");
    }

    fn close(&self) {
        log::debug!("[POPUP] close");
    }

    fn show_error(&self, message: &str) {
        log::debug!("[POPUP] error: {}", message);
        eprintln!("snipcopy: error: {message}");
    }
}
