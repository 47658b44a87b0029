//! Runtime configuration: `.env` files, environment variables, CLI flags.
//!
//! Precedence (highest first): CLI flags, process environment, `./.env`,
//! `<config dir>/snipcopy/.env`, built-in defaults. `dotenvy` never
//! overrides variables that are already set, which gives the file order.

use crate::capture::Region;
use crate::cli::Cli;
use crate::client::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_RESPONSE_TIMEOUT};
use crate::hotkey::{Hotkey, DEFAULT_HOTKEY};
use crate::ocr::vision::DEFAULT_MODEL;
use crate::resident::DEFAULT_REQUEST_TIMEOUT;
use crate::workflow::DEFAULT_COUNTDOWN_SECS;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_START_PORT: u16 = 47821;
pub const DEFAULT_OCR_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Residency lock and delegation target. Must match between resident
    /// and run-once callers.
    pub start_port: u16,
    pub hotkey: Hotkey,
    pub region: Option<Region>,
    pub image: Option<PathBuf>,
    pub countdown_secs: u32,
    pub connect_timeout: Duration,
    pub response_timeout: Duration,
    pub request_timeout: Duration,
    pub ocr_timeout: Duration,
    pub api_key: Option<String>,
    pub ocr_model: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var}: invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

impl AppConfig {
    /// Loads `.env` files, then reads the environment.
    pub fn load() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => log::debug!("[CONFIG] Loaded {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => log::warn!("[CONFIG] Ignoring ./.env: {}", e),
        }
        if let Some(path) = user_env_file() {
            if path.exists() {
                if let Err(e) = dotenvy::from_path(&path) {
                    log::warn!("[CONFIG] Ignoring {}: {}", path.display(), e);
                }
            }
        }
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds a config from any variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let hotkey_spec = get("SNIPCOPY_HOTKEY").unwrap_or_else(|| DEFAULT_HOTKEY.to_string());
        let hotkey = Hotkey::parse(&hotkey_spec).map_err(|e| ConfigError::Invalid {
            var: "SNIPCOPY_HOTKEY",
            value: hotkey_spec.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            start_port: parse_var(&get, "SNIPCOPY_START_PORT")?.unwrap_or(DEFAULT_START_PORT),
            hotkey,
            region: parse_var(&get, "SNIPCOPY_REGION")?,
            image: get("SNIPCOPY_IMAGE").map(PathBuf::from),
            countdown_secs: parse_var(&get, "SNIPCOPY_COUNTDOWN_SECS")?
                .unwrap_or(DEFAULT_COUNTDOWN_SECS),
            connect_timeout: parse_var(&get, "SNIPCOPY_CONNECT_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT),
            response_timeout: parse_var(&get, "SNIPCOPY_RESPONSE_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_RESPONSE_TIMEOUT),
            request_timeout: parse_var(&get, "SNIPCOPY_REQUEST_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            ocr_timeout: parse_var(&get, "SNIPCOPY_OCR_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_OCR_TIMEOUT),
            api_key: get("ANTHROPIC_API_KEY"),
            ocr_model: get("SNIPCOPY_OCR_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }

    /// Applies command-line overrides.
    pub fn apply_cli(&mut self, cli: &Cli) -> Result<(), ConfigError> {
        if let Some(port) = cli.port {
            self.start_port = port;
        }
        if let Some(region) = cli.region {
            self.region = Some(region);
        }
        if let Some(image) = &cli.image {
            self.image = Some(image.clone());
        }
        if let Some(seconds) = cli.countdown {
            self.countdown_secs = seconds;
        }
        if let Some(spec) = &cli.hotkey {
            self.hotkey = Hotkey::parse(spec).map_err(|e| ConfigError::Invalid {
                var: "--hotkey",
                value: spec.clone(),
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }
}

fn user_env_file() -> Option<PathBuf> {
    Some(dirs::config_dir()?.join("snipcopy").join(".env"))
}

fn parse_var<T, G>(get: &G, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    get(var)
        .map(|value| {
            value.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
                var,
                value: value.clone(),
                reason: e.to_string(),
            })
        })
        .transpose()
}
