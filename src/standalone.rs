//! `--run-once` entry: delegate to a resident, or do the work in-process.

use crate::client::{Delegation, DelegationClient};
use crate::dispatch::{Dispatcher, ExitCodeSink};
use crate::gate::BusyGate;
use crate::session::{Outcome, TriggerSource};
use crate::workflow::Workflow;
use std::sync::Arc;

/// Which path a run-once invocation ended up taking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Delegated,
    Standalone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOnceReport {
    pub route: Route,
    pub exit_code: u8,
}

/// Runs one session in this process with its own gate.
pub async fn run_standalone(workflow: Arc<Workflow>) -> (Outcome, u8) {
    let dispatcher = Dispatcher::new(BusyGate::new(), workflow);
    let sink = ExitCodeSink::new();
    let outcome = dispatcher.trigger(TriggerSource::Standalone, &sink).await;
    (outcome, sink.code())
}

/// Delegates to the resident if one answers; otherwise runs standalone.
///
/// `build_workflow` is only called on the standalone path, so a run-once
/// that delegates never touches capture, OCR or clipboard setup itself.
pub async fn run_once<F, E>(client: &DelegationClient, build_workflow: F) -> RunOnceReport
where
    F: FnOnce() -> Result<Workflow, E>,
    E: std::fmt::Display,
{
    match client.try_run_once().await {
        Delegation::Delegated(Ok(())) => RunOnceReport {
            route: Route::Delegated,
            exit_code: 0,
        },
        Delegation::Delegated(Err(reason)) => {
            log::error!("[RUN_ONCE] Resident failed the session: {}", reason);
            eprintln!("snipcopy: resident reported an error: {reason}");
            RunOnceReport {
                route: Route::Delegated,
                exit_code: 1,
            }
        }
        Delegation::NotDelegated(transport) => {
            log::info!("[RUN_ONCE] Running standalone ({})", transport);
            let exit_code = match build_workflow() {
                Ok(workflow) => {
                    let (outcome, code) = run_standalone(Arc::new(workflow)).await;
                    log::info!("[RUN_ONCE] Standalone outcome: {}", outcome);
                    code
                }
                Err(e) => {
                    log::error!("[RUN_ONCE] Cannot run standalone: {}", e);
                    eprintln!("snipcopy: {e}");
                    1
                }
            };
            RunOnceReport {
                route: Route::Standalone,
                exit_code,
            }
        }
    }
}
