//! Full-screen grabs: the infrastructure layer that talks to the OS.
//!
//! `XcapGrabber` reads the primary monitor through the `xcap` crate and is
//! only built with the `screen-capture` feature. `ImageFileGrabber` serves a
//! PNG from disk instead, which is what headless machines and tests use.

use image::DynamicImage;
use std::path::PathBuf;

/// Source of full-screen images. Calls block; run them off the async runtime.
pub trait ScreenGrabber: Send + Sync {
    /// Captures the whole screen. The caller crops to the selected region.
    fn grab(&self) -> Result<DynamicImage, CaptureError>;

    /// Width and height of what `grab` would return.
    fn bounds(&self) -> Result<(u32, u32), CaptureError>;
}

/// Serves a fixed image file as "the screen".
pub struct ImageFileGrabber {
    path: PathBuf,
}

impl ImageFileGrabber {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn file_error(&self, e: image::ImageError) -> CaptureError {
        CaptureError::ImageFile {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        }
    }
}

impl ScreenGrabber for ImageFileGrabber {
    fn grab(&self) -> Result<DynamicImage, CaptureError> {
        image::open(&self.path).map_err(|e| self.file_error(e))
    }

    fn bounds(&self) -> Result<(u32, u32), CaptureError> {
        image::image_dimensions(&self.path).map_err(|e| self.file_error(e))
    }
}

/// Grabs the primary monitor via `xcap`.
#[cfg(feature = "screen-capture")]
#[derive(Debug, Default, Clone, Copy)]
pub struct XcapGrabber;

#[cfg(feature = "screen-capture")]
impl XcapGrabber {
    fn primary_monitor() -> Result<xcap::Monitor, CaptureError> {
        let monitors = xcap::Monitor::all()
            .map_err(|e| CaptureError::MonitorEnumeration(e.to_string()))?;

        let mut fallback = None;
        for monitor in monitors {
            if monitor.is_primary().unwrap_or(false) {
                return Ok(monitor);
            }
            // No monitor reporting as primary: use the first one
            if fallback.is_none() {
                fallback = Some(monitor);
            }
        }
        fallback.ok_or(CaptureError::NoPrimaryMonitor)
    }
}

#[cfg(feature = "screen-capture")]
impl ScreenGrabber for XcapGrabber {
    fn grab(&self) -> Result<DynamicImage, CaptureError> {
        let start = std::time::Instant::now();
        let image = Self::primary_monitor()?
            .capture_image()
            .map_err(|e| CaptureError::CaptureFailed(e.to_string()))?;
        log::info!(
            "[CAPTURE] Primary monitor captured in {}ms",
            start.elapsed().as_millis()
        );
        Ok(DynamicImage::ImageRgba8(image))
    }

    fn bounds(&self) -> Result<(u32, u32), CaptureError> {
        let monitor = Self::primary_monitor()?;
        let width = monitor
            .width()
            .map_err(|e| CaptureError::CaptureFailed(e.to_string()))?;
        let height = monitor
            .height()
            .map_err(|e| CaptureError::CaptureFailed(e.to_string()))?;
        Ok((width, height))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Failed to enumerate monitors: {0}")]
    MonitorEnumeration(String),

    #[error("No primary monitor found")]
    NoPrimaryMonitor,

    #[error("Screen capture failed: {0}")]
    CaptureFailed(String),

    #[error("Could not read screen image {path}: {reason}")]
    ImageFile { path: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    #[test]
    fn image_file_grabber_reports_file_dimensions() {
        let path = std::env::temp_dir().join(format!("snipcopy-grab-{}.png", std::process::id()));
        DynamicImage::ImageRgba8(RgbaImage::new(64, 32))
            .save(&path)
            .unwrap();

        let grabber = ImageFileGrabber::new(&path);
        assert_eq!(grabber.bounds().unwrap(), (64, 32));
        assert_eq!(grabber.grab().unwrap().width(), 64);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn missing_image_file_is_a_capture_error() {
        let grabber = ImageFileGrabber::new("/definitely/not/here.png");
        assert!(matches!(grabber.grab(), Err(CaptureError::ImageFile { .. })));
    }
}
