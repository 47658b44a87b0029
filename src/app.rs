//! Wires configuration to concrete collaborators and runs the chosen mode.

use crate::capture::{FixedRegion, ImageFileGrabber, RegionSelector, ScreenGrabber, WholeScreen};
use crate::client::DelegationClient;
use crate::clipboard::ArboardClipboard;
use crate::config::AppConfig;
use crate::dispatch::Dispatcher;
use crate::gate::BusyGate;
use crate::ocr::vision::VisionOcr;
use crate::ocr::{OcrError, ScreenOcr};
use crate::popup::{ConsolePresenter, PopupPresenter};
use crate::resident::{loopback, Resident, ResidentError};
use crate::standalone::{self, Route};
use crate::workflow::Workflow;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error(
        "no screen source: set SNIPCOPY_IMAGE / --image, or build with the `screen-capture` feature"
    )]
    NoScreenSource,

    #[error("OCR setup failed: {0}")]
    Ocr(#[from] OcrError),
}

fn screen_grabber(config: &AppConfig) -> Result<Arc<dyn ScreenGrabber>, SetupError> {
    if let Some(path) = &config.image {
        return Ok(Arc::new(ImageFileGrabber::new(path)));
    }
    #[cfg(feature = "screen-capture")]
    {
        Ok(Arc::new(crate::capture::XcapGrabber))
    }
    #[cfg(not(feature = "screen-capture"))]
    {
        Err(SetupError::NoScreenSource)
    }
}

/// Builds the production workflow for this configuration.
pub fn build_workflow(config: &AppConfig) -> Result<Workflow, SetupError> {
    let grabber = screen_grabber(config)?;
    let selector: Arc<dyn RegionSelector> = match config.region {
        Some(region) => Arc::new(FixedRegion(region)),
        None => Arc::new(WholeScreen::new(Arc::clone(&grabber))),
    };
    let vision = VisionOcr::new(
        config.api_key.clone(),
        config.ocr_model.clone(),
        config.ocr_timeout,
    )?;

    Ok(Workflow::new(
        selector,
        Arc::new(ScreenOcr::new(grabber, vision)),
        Arc::new(ArboardClipboard),
        Arc::new(ConsolePresenter),
    )
    .with_countdown(config.countdown_secs))
}

/// `--run-once`: delegate or run standalone. Returns the process exit code.
pub async fn run_once(config: &AppConfig) -> u8 {
    let client = DelegationClient::new(loopback(config.start_port))
        .with_timeouts(config.connect_timeout, config.response_timeout);

    let report = standalone::run_once(&client, || build_workflow(config)).await;
    log::info!(
        "[RUN_ONCE] Finished via {} with exit code {}",
        match report.route {
            Route::Delegated => "resident",
            Route::Standalone => "standalone",
        },
        report.exit_code
    );
    report.exit_code
}

/// Resident mode: claim the port, listen for the hotkey, serve delegations
/// until Ctrl-C. Returns the process exit code.
pub async fn run_resident(config: &AppConfig) -> u8 {
    let workflow = match build_workflow(config) {
        Ok(workflow) => Arc::new(workflow),
        Err(e) => {
            log::error!("[RESIDENT] {}", e);
            eprintln!("snipcopy: {e}");
            return 1;
        }
    };
    let popup: Arc<dyn PopupPresenter> = Arc::clone(workflow.popup());
    let dispatcher = Arc::new(Dispatcher::new(BusyGate::new(), workflow));

    let resident = match Resident::bind(loopback(config.start_port), dispatcher).await {
        Ok(resident) => resident.with_request_timeout(config.request_timeout),
        Err(ResidentError::AlreadyRunning(port)) => {
            log::error!("[RESIDENT] Another resident owns port {}", port);
            eprintln!("snipcopy: already running on port {port}; use --run-once to trigger it");
            return 1;
        }
        Err(e) => {
            log::error!("[RESIDENT] {}", e);
            eprintln!("snipcopy: {e}");
            return 1;
        }
    };

    let (triggers_tx, triggers_rx) = mpsc::channel(1);
    let _hotkeys = resident.spawn_hotkey_loop(triggers_rx, popup);
    start_keyboard_hook(config, triggers_tx);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("[RESIDENT] Ctrl-C handler unavailable: {}", e);
            std::future::pending::<()>().await;
        }
    };
    match resident.serve_until(shutdown).await {
        Ok(()) => 0,
        Err(e) => {
            log::error!("[RESIDENT] {}", e);
            1
        }
    }
}

#[cfg(feature = "hotkey-hook")]
fn start_keyboard_hook(config: &AppConfig, triggers: mpsc::Sender<()>) {
    let tracker = Arc::new(crate::hotkey::ComboTracker::new(config.hotkey.clone()));
    crate::hotkey::spawn_keyboard_hook(tracker, triggers);
}

#[cfg(not(feature = "hotkey-hook"))]
fn start_keyboard_hook(config: &AppConfig, triggers: mpsc::Sender<()>) {
    log::warn!(
        "[RESIDENT] Built without `hotkey-hook`; {} is inactive, trigger with --run-once",
        config.hotkey
    );
    drop(triggers);
}
