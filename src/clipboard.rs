//! Clipboard sink and the process-wide clipboard write lock.
//!
//! Every clipboard write in this process goes through `write_exclusive`,
//! which holds `CLIPBOARD_LOCK` for the whole write. The lock is never
//! re-entrant and is released on every path, including a panicking sink.

use std::sync::{Arc, Mutex};
use std::time::Instant;

static CLIPBOARD_LOCK: Mutex<()> = Mutex::new(());

/// A single blocking "put this text on the clipboard" capability.
pub trait ClipboardSink: Send + Sync {
    fn write_text(&self, text: &str) -> Result<(), ClipboardError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ClipboardError {
    #[error("clipboard unavailable: {0}")]
    Unavailable(String),

    #[error("clipboard write failed: {0}")]
    WriteFailed(String),

    #[error("clipboard task failed: {0}")]
    Task(String),
}

/// Writes `text` through `sink` while holding the global clipboard lock.
///
/// Runs on the blocking pool; a second caller waits until the first write
/// has fully completed.
pub async fn write_exclusive(
    sink: Arc<dyn ClipboardSink>,
    text: String,
) -> Result<(), ClipboardError> {
    tokio::task::spawn_blocking(move || {
        let wait_start = Instant::now();
        // A panic inside an earlier write poisons the mutex; the guarded
        // data is `()`, so the lock itself is still sound.
        let _guard = CLIPBOARD_LOCK
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let waited_ms = wait_start.elapsed().as_millis();
        if waited_ms > 0 {
            log::debug!("[CLIPBOARD] Waited {}ms for write lock", waited_ms);
        }
        sink.write_text(&text)
    })
    .await
    .map_err(|e| ClipboardError::Task(e.to_string()))?
}

/// System clipboard via `arboard`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArboardClipboard;

impl ClipboardSink for ArboardClipboard {
    fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        let mut clipboard =
            arboard::Clipboard::new().map_err(|e| ClipboardError::Unavailable(e.to_string()))?;
        clipboard
            .set_text(text.to_owned())
            .map_err(|e| ClipboardError::WriteFailed(e.to_string()))?;
        log::info!("[CLIPBOARD] Wrote {} chars", text.chars().count());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    /// Records the bytes of each write one at a time, slowly, and counts
    /// writes that started while another was still in progress.
    #[derive(Default)]
    struct SlowClipboard {
        in_write: AtomicBool,
        overlaps: AtomicUsize,
        contents: Mutex<Vec<u8>>,
    }

    impl ClipboardSink for SlowClipboard {
        fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
            if self.in_write.swap(true, Ordering::SeqCst) {
                self.overlaps.fetch_add(1, Ordering::SeqCst);
            }
            for byte in text.bytes() {
                self.contents.lock().unwrap().push(byte);
                std::thread::sleep(Duration::from_millis(2));
            }
            self.in_write.store(false, Ordering::SeqCst);
            Ok(())
        }
    }

    struct PanickingClipboard;

    impl ClipboardSink for PanickingClipboard {
        fn write_text(&self, _text: &str) -> Result<(), ClipboardError> {
            panic!("clipboard exploded");
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writes_never_interleave() {
        let sink = Arc::new(SlowClipboard::default());

        let a = tokio::spawn(write_exclusive(sink.clone(), "aaaaaaaaaa".into()));
        let b = tokio::spawn(write_exclusive(sink.clone(), "bbbbbbbbbb".into()));
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        assert_eq!(sink.overlaps.load(Ordering::SeqCst), 0);
        let contents = String::from_utf8(sink.contents.lock().unwrap().clone()).unwrap();
        assert!(
            contents == "aaaaaaaaaabbbbbbbbbb" || contents == "bbbbbbbbbbaaaaaaaaaa",
            "interleaved write: {contents}"
        );
    }

    #[tokio::test]
    async fn panicking_sink_releases_the_lock() {
        let result = write_exclusive(Arc::new(PanickingClipboard), "x".into()).await;
        assert!(matches!(result, Err(ClipboardError::Task(_))));

        let sink = Arc::new(SlowClipboard::default());
        write_exclusive(sink.clone(), "ok".into()).await.unwrap();
        assert_eq!(&*sink.contents.lock().unwrap(), b"ok");
    }
}
