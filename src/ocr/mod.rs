//! OCR domain: turns a selected region into text.
//!
//! The workflow only sees `OcrExecutor`. `ScreenOcr` is the production
//! implementation: grab the screen, crop to the region, ask a vision model.

pub mod vision;

use crate::capture::{crop_to_png_bytes, CaptureError, CropError, Region, ScreenGrabber};
use async_trait::async_trait;
use std::sync::Arc;
use vision::VisionOcr;

/// Capture + recognition for one region. Same contract whether it runs in a
/// run-once process or inside the resident.
#[async_trait]
pub trait OcrExecutor: Send + Sync {
    async fn recognize(&self, region: &Region) -> Result<String, OcrError>;
}

#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Crop(#[from] CropError),

    #[error("ANTHROPIC_API_KEY is not set")]
    MissingApiKey,

    #[error("OCR request failed: {0}")]
    Request(String),

    #[error("OCR API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("no text recognized")]
    NoText,

    #[error("capture task failed: {0}")]
    Task(String),
}

pub struct ScreenOcr {
    grabber: Arc<dyn ScreenGrabber>,
    vision: VisionOcr,
}

impl ScreenOcr {
    pub fn new(grabber: Arc<dyn ScreenGrabber>, vision: VisionOcr) -> Self {
        Self { grabber, vision }
    }
}

#[async_trait]
impl OcrExecutor for ScreenOcr {
    async fn recognize(&self, region: &Region) -> Result<String, OcrError> {
        let grabber = Arc::clone(&self.grabber);
        let region = *region;

        let png_bytes = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, OcrError> {
            let screenshot = grabber.grab()?;
            Ok(crop_to_png_bytes(&screenshot, &region)?)
        })
        .await
        .map_err(|e| OcrError::Task(e.to_string()))??;

        log::debug!("[OCR] Cropped {} to {} PNG bytes", region, png_bytes.len());
        self.vision.recognize_png(&png_bytes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::ImageFileGrabber;
    use std::time::Duration;

    fn vision() -> VisionOcr {
        VisionOcr::new(None, vision::DEFAULT_MODEL, Duration::from_secs(1)).unwrap()
    }

    #[tokio::test]
    async fn unreadable_screen_is_a_capture_error() {
        let ocr = ScreenOcr::new(Arc::new(ImageFileGrabber::new("/no/such/screen.png")), vision());
        let region = Region::new(0, 0, 10, 10).unwrap();
        assert!(matches!(
            ocr.recognize(&region).await,
            Err(OcrError::Capture(_))
        ));
    }

    #[tokio::test]
    async fn region_outside_screen_is_a_crop_error() {
        let path = std::env::temp_dir().join(format!("snipcopy-ocr-{}.png", std::process::id()));
        image::DynamicImage::new_rgba8(20, 20).save(&path).unwrap();

        let ocr = ScreenOcr::new(Arc::new(ImageFileGrabber::new(&path)), vision());
        let region = Region::new(10, 10, 50, 50).unwrap();
        let result = ocr.recognize(&region).await;
        std::fs::remove_file(&path).ok();

        assert!(matches!(result, Err(OcrError::Crop(CropError::OutOfBounds { .. }))));
    }
}
