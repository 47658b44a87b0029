//! Screen capture domain: public API.
//!
//! This module owns region selection, full-screen grabs and cropping.
//! External code should only use the items exported here.

mod region;
mod screenshot;
mod selector;

pub use region::{crop_to_png_bytes, CropError, Region, RegionParseError};
#[cfg(feature = "screen-capture")]
pub use screenshot::XcapGrabber;
pub use screenshot::{CaptureError, ImageFileGrabber, ScreenGrabber};
pub use selector::{FixedRegion, RegionSelector, SelectionError, WholeScreen};
