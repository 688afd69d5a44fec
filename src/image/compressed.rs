//! Block-compressed image buffers.

use crate::errors::{KilnError, Result};
use crate::format::PixelFormat;

/// An owned block-compressed image for one mip level.
///
/// Move-only: the buffer has a single owner, transfers on move, and frees
/// on drop. There is deliberately no `Clone` — compressed payloads are
/// produced once, uploaded once, and dropped.
#[derive(Debug)]
pub struct CompressedImage {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Vec<u8>,
}

impl CompressedImage {
    /// Wraps a compressed payload, validating the byte length against the
    /// format's block math (dimensions rounded up to whole 4×4 blocks).
    pub fn new(format: PixelFormat, width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        if !format.is_compressed() {
            return Err(KilnError::InvalidImage(format!(
                "{format:?} is not a block-compressed format"
            )));
        }
        let expected = format.level_size(width, height);
        if data.len() != expected {
            return Err(KilnError::InvalidImage(format!(
                "{width}x{height} {format:?} level needs {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }
    #[must_use]
    pub fn format(&self) -> PixelFormat {
        self.format
    }
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_validates_block_size() {
        // 8x8 BC1: 4 blocks * 8 bytes
        assert!(CompressedImage::new(PixelFormat::Bc1Rgb, 8, 8, vec![0; 32]).is_ok());
        assert!(CompressedImage::new(PixelFormat::Bc1Rgb, 8, 8, vec![0; 31]).is_err());
        // Uncompressed formats are rejected outright.
        assert!(CompressedImage::new(PixelFormat::Rgba8Unorm, 8, 8, vec![0; 256]).is_err());
    }
}
