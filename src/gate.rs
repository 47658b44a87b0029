//! Busy gate: single-slot admission in front of the workflow.
//!
//! All entry points (hotkey callback, delegated requests, standalone runs)
//! ask the same gate before starting a session. There is no queue: a
//! rejected trigger is reported as busy straight away.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct BusyGate {
    active: AtomicBool,
}

impl BusyGate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Try to mark a session active. Never blocks.
    ///
    /// The returned `Admission` releases the gate when dropped, so every exit
    /// path of the session (including a panic) releases exactly once.
    pub fn try_admit(self: &Arc<Self>) -> Option<Admission> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        log::debug!("[GATE] admitted");
        Some(Admission {
            gate: Arc::clone(self),
        })
    }

    pub fn is_busy(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// Proof that the holder owns the gate's single slot.
#[derive(Debug)]
pub struct Admission {
    gate: Arc<BusyGate>,
}

impl Drop for Admission {
    fn drop(&mut self) {
        self.gate.active.store(false, Ordering::Release);
        log::debug!("[GATE] released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;

    #[test]
    fn second_admission_is_rejected_until_release() {
        let gate = BusyGate::new();
        let first = gate.try_admit().expect("idle gate admits");
        assert!(gate.is_busy());
        assert!(gate.try_admit().is_none());

        drop(first);
        assert!(!gate.is_busy());
        assert!(gate.try_admit().is_some());
    }

    #[test]
    fn racing_threads_get_exactly_one_admission() {
        let gate = BusyGate::new();
        let barrier = Arc::new(Barrier::new(16));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let gate = Arc::clone(&gate);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    // Hold the admission until every thread has tried.
                    let admission = gate.try_admit();
                    let admitted = admission.is_some();
                    barrier.wait();
                    admitted
                })
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&a| a)
            .count();
        assert_eq!(admitted, 1);
        assert!(!gate.is_busy());
    }

    #[test]
    fn panic_while_admitted_releases_the_gate() {
        let gate = BusyGate::new();
        let cloned = Arc::clone(&gate);
        let result = std::thread::spawn(move || {
            let _admission = cloned.try_admit().unwrap();
            panic!("session blew up");
        })
        .join();

        assert!(result.is_err());
        assert!(!gate.is_busy());
    }
}
