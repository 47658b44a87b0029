//! Command-line surface.

use crate::capture::Region;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Default)]
#[command(
    name = "snipcopy",
    version,
    about = "Snip a screen region, OCR it, and copy the text to the clipboard"
)]
pub struct Cli {
    /// Run a single capture: delegate to the resident if one is running,
    /// otherwise do it in this process. Without this flag, run as the
    /// resident and listen for the hotkey.
    #[arg(long)]
    pub run_once: bool,

    /// Loopback port that marks the resident (overrides SNIPCOPY_START_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Region to capture as `x,y,width,height` (default: whole screen)
    #[arg(long)]
    pub region: Option<Region>,

    /// Read the "screen" from this PNG instead of grabbing the monitor
    #[arg(long)]
    pub image: Option<PathBuf>,

    /// Hotkey combination for the resident, e.g. `Ctrl+Shift+O`
    #[arg(long)]
    pub hotkey: Option<String>,

    /// Countdown shown by the progress popup while the session runs, in seconds
    #[arg(long)]
    pub countdown: Option<u32>,
}
