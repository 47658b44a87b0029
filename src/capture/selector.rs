//! Region selection: where the session's `Region` comes from.
//!
//! The interactive overlay lives outside this crate; anything that can hand
//! back a rectangle (or report that the user gave up) implements
//! `RegionSelector`.

use super::region::Region;
use super::screenshot::ScreenGrabber;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait RegionSelector: Send + Sync {
    async fn select(&self) -> Result<Region, SelectionError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    /// The user aborted picking a region. Not a failure worth an error popup.
    #[error("region selection cancelled")]
    Cancelled,

    #[error("region selection failed: {0}")]
    Failed(String),
}

/// Always selects the same, pre-configured rectangle.
pub struct FixedRegion(pub Region);

#[async_trait]
impl RegionSelector for FixedRegion {
    async fn select(&self) -> Result<Region, SelectionError> {
        Ok(self.0)
    }
}

/// Selects the full bounds of the screen source.
pub struct WholeScreen {
    grabber: Arc<dyn ScreenGrabber>,
}

impl WholeScreen {
    pub fn new(grabber: Arc<dyn ScreenGrabber>) -> Self {
        Self { grabber }
    }
}

#[async_trait]
impl RegionSelector for WholeScreen {
    async fn select(&self) -> Result<Region, SelectionError> {
        let grabber = Arc::clone(&self.grabber);
        let (width, height) = tokio::task::spawn_blocking(move || grabber.bounds())
            .await
            .map_err(|e| SelectionError::Failed(e.to_string()))?
            .map_err(|e| SelectionError::Failed(e.to_string()))?;

        Region::new(0, 0, width, height).map_err(|e| SelectionError::Failed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CaptureError;
    use image::DynamicImage;

    struct Blank(u32, u32);

    impl ScreenGrabber for Blank {
        fn grab(&self) -> Result<DynamicImage, CaptureError> {
            Ok(DynamicImage::new_rgba8(self.0, self.1))
        }

        fn bounds(&self) -> Result<(u32, u32), CaptureError> {
            Ok((self.0, self.1))
        }
    }

    #[tokio::test]
    async fn whole_screen_covers_grabber_bounds() {
        let selector = WholeScreen::new(Arc::new(Blank(1920, 1080)));
        let region = selector.select().await.unwrap();
        assert_eq!(region, Region::new(0, 0, 1920, 1080).unwrap());
    }

    #[tokio::test]
    async fn empty_screen_fails_selection() {
        let selector = WholeScreen::new(Arc::new(Blank(0, 0)));
        assert!(matches!(
            selector.select().await,
            Err(SelectionError::Failed(_))
        ));
    }
}
