//! The block-compressor seam.
//!
//! Runtime compression is an external collaborator: a pure function from an
//! RGBA8 source image to a block-compressed payload. Which formats it can
//! produce is a property of the build — a format without a compiled-in
//! compressor must never survive negotiation, which is why the trait
//! advertises its format set up front.

use crate::format::PixelFormat;
use crate::image::{CompressedImage, SourceImage};

/// A stateless runtime block compressor.
///
/// `compress` is only ever called with a 4-channel RGBA8 [`SourceImage`]
/// whose width and height are multiples of 4, and with a `format` contained
/// in [`Self::supported_formats`]; the ingestion pipeline guarantees both.
pub trait BlockCompressor {
    /// The formats this build can compress to in real time.
    fn supported_formats(&self) -> &[PixelFormat];

    /// Compresses `image` to `format`. Returns `None` on failure.
    fn compress(&self, image: &SourceImage, format: PixelFormat) -> Option<CompressedImage>;
}

/// The empty compressor: no formats compiled in, so negotiation never
/// selects a compressed format.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCompressor;

impl BlockCompressor for NoCompressor {
    fn supported_formats(&self) -> &[PixelFormat] {
        &[]
    }

    fn compress(&self, _image: &SourceImage, _format: PixelFormat) -> Option<CompressedImage> {
        None
    }
}
