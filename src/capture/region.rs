//! Screen regions and pure cropping logic: functional core.
//!
//! This module has zero infrastructure dependencies.
//! It takes pixel data in, returns pixel data out.

use image::{DynamicImage, ImageFormat};
use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

/// A rectangle in screen coordinates, as produced by region selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    /// Builds a region, rejecting zero width or height.
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Result<Self, RegionParseError> {
        if width == 0 || height == 0 {
            return Err(RegionParseError::ZeroDimension);
        }
        Ok(Self {
            x,
            y,
            width,
            height,
        })
    }

    /// Parses `x,y,width,height` (whitespace around numbers is ignored).
    pub fn parse(spec: &str) -> Result<Self, RegionParseError> {
        let parts: Vec<&str> = spec.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(RegionParseError::WrongArity(parts.len()));
        }

        let mut values = [0u32; 4];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|_| RegionParseError::NotANumber(part.to_string()))?;
        }

        Self::new(values[0], values[1], values[2], values[3])
    }

    /// Whether the region lies fully inside an image of the given size.
    pub fn fits_within(&self, image_width: u32, image_height: u32) -> bool {
        let right = self.x.checked_add(self.width);
        let bottom = self.y.checked_add(self.height);
        matches!((right, bottom), (Some(r), Some(b)) if r <= image_width && b <= image_height)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} at {},{}", self.width, self.height, self.x, self.y)
    }
}

impl FromStr for Region {
    type Err = RegionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegionParseError {
    #[error("Region must be `x,y,width,height` (got {0} fields)")]
    WrongArity(usize),

    #[error("Region field `{0}` is not a non-negative integer")]
    NotANumber(String),

    #[error("Region has zero width or height")]
    ZeroDimension,
}

/// Crops a `DynamicImage` to `region` and returns PNG bytes.
///
/// This is a pure function with no side effects.
pub fn crop_to_png_bytes(image: &DynamicImage, region: &Region) -> Result<Vec<u8>, CropError> {
    if region.width == 0 || region.height == 0 {
        return Err(CropError::ZeroDimension);
    }

    let (img_width, img_height) = (image.width(), image.height());

    if !region.fits_within(img_width, img_height) {
        return Err(CropError::OutOfBounds {
            requested: *region,
            image_size: (img_width, img_height),
        });
    }

    let cropped = image.crop_imm(region.x, region.y, region.width, region.height);

    let mut png_bytes: Vec<u8> = Vec::new();
    cropped
        .write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)
        .map_err(|e| CropError::EncodingFailed(e.to_string()))?;

    Ok(png_bytes)
}

#[derive(Debug, thiserror::Error)]
pub enum CropError {
    #[error("Crop rectangle has zero width or height")]
    ZeroDimension,

    #[error(
        "Crop rectangle ({}) exceeds image bounds ({}x{})",
        requested, image_size.0, image_size.1
    )]
    OutOfBounds {
        requested: Region,
        image_size: (u32, u32),
    },

    #[error("PNG encoding failed: {0}")]
    EncodingFailed(String),
}
