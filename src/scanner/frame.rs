use anyhow::Result;
use image::{DynamicImage, GrayImage, RgbaImage};

use crate::error::ArError;

/// Greyscale raster handed to the QR decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LumaFrame {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl LumaFrame {
    /// `pixels` must hold exactly `width * height` bytes.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        let expected = (width as usize).checked_mul(height as usize)?;
        if pixels.len() != expected || expected == 0 {
            return None;
        }
        Some(Self {
            width,
            height,
            pixels,
        })
    }

    /// A video frame drawn to an RGBA buffer, converted to luma.
    pub fn from_rgba(width: u32, height: u32, rgba: Vec<u8>) -> Option<Self> {
        let image = RgbaImage::from_raw(width, height, rgba)?;
        Some(Self::from_gray(DynamicImage::ImageRgba8(image).to_luma8()))
    }

    /// Decode an uploaded still image (PNG, JPEG, ...).
    pub fn from_image_bytes(bytes: &[u8]) -> Result<Self, ArError> {
        if bytes.is_empty() {
            return Err(ArError::InvalidImage {
                reason: "file is empty".into(),
            });
        }
        let image = image::load_from_memory(bytes).map_err(|err| ArError::InvalidImage {
            reason: err.to_string(),
        })?;
        Ok(Self::from_gray(image.to_luma8()))
    }

    fn from_gray(image: GrayImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            pixels: image.into_raw(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel(&self, x: u32, y: u32) -> u8 {
        self.pixels[(y as usize) * (self.width as usize) + x as usize]
    }

    /// Light-on-dark codes decode after inversion.
    pub fn inverted(&self) -> Self {
        Self {
            width: self.width,
            height: self.height,
            pixels: self.pixels.iter().map(|value| 255 - value).collect(),
        }
    }
}

/// Samples the current camera frame for the live scan loop.
///
/// `Ok(None)` means no frame is available yet (video still warming up).
pub trait FrameSource: Send + Sync {
    fn grab(&self) -> Result<Option<LumaFrame>>;
}
