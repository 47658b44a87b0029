//! snipcopy: snip a screen region, OCR it, put the text on the clipboard.
//!
//! One long-lived *resident* owns the loopback start port and the hotkey;
//! short-lived `--run-once` invocations delegate to it over loopback, or run
//! the same workflow themselves when no resident answers. Every trigger goes
//! through one busy gate and one workflow state machine:
//! - Region selection, capture and cropping (capture/)
//! - Vision-model OCR (ocr/)
//! - Busy gate and dispatch (gate.rs, dispatch.rs)
//! - Workflow state machine (workflow.rs, session.rs)
//! - Resident, delegation client and wire format (resident.rs, client.rs, protocol.rs)

pub mod app;
pub mod capture;
pub mod cli;
pub mod client;
pub mod clipboard;
pub mod config;
pub mod dispatch;
pub mod gate;
pub mod hotkey;
pub mod ocr;
pub mod popup;
pub mod protocol;
pub mod resident;
pub mod session;
pub mod standalone;
#[doc(hidden)]
pub mod testing;
pub mod workflow;

use clap::Parser;
use cli::Cli;
use config::AppConfig;
use std::process::ExitCode;

/// Entry point. Parses the command line and runs the selected mode.
pub fn run() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            log::error!("[CONFIG] {}", e);
            eprintln!("snipcopy: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = config.apply_cli(&cli) {
        eprintln!("snipcopy: {e}");
        return ExitCode::FAILURE;
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("snipcopy: failed to start async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let code = runtime.block_on(async {
        if cli.run_once {
            app::run_once(&config).await
        } else {
            log::info!("snipcopy resident starting on port {}", config.start_port);
            app::run_resident(&config).await
        }
    });
    ExitCode::from(code)
}
