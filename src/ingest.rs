//! The texture ingestion pipeline.
//!
//! Takes exclusive ownership of a decoded [`SourceImage`] and turns it into
//! an uploaded GPU texture: channel adjustment by semantic, optional
//! downscale, mip planning, upload-format negotiation, then per-level
//! compress-and-upload. The source image is destructively consumed — every
//! mip level is produced by resizing it in place.

use log::{debug, error};
use smallvec::SmallVec;

use crate::backend::{CapabilityOracle, DeviceBackend, TextureHandle};
use crate::compress::BlockCompressor;
use crate::errors::{KilnError, Result};
use crate::format::{ColorSpace, FormatNegotiator, PixelFormat, TargetClass, TextureSemantic};
use crate::image::SourceImage;

/// Planned mip level count for a base size and semantic.
///
/// UI textures are never mip-mapped. Otherwise the chain stops two levels
/// early (`floor(log2(max(w,h))) - 2 + 1`), keeping the smallest generated
/// mip near the 4×4 compression block floor; once the largest dimension is
/// at or below 8px only the base level is used.
#[must_use]
pub fn mip_level_count(width: u32, height: u32, semantic: TextureSemantic) -> u32 {
    if semantic == TextureSemantic::UserInterface {
        return 1;
    }
    let largest = width.max(height).max(1);
    if largest <= 8 {
        return 1;
    }
    largest.ilog2() - 2 + 1
}

/// Orchestrates ingestion against one backend, negotiator and compressor.
pub struct TextureIngestionPipeline<'a> {
    backend: &'a dyn DeviceBackend,
    negotiator: &'a FormatNegotiator,
    compressor: &'a dyn BlockCompressor,
    target: TargetClass,
}

impl<'a> TextureIngestionPipeline<'a> {
    #[must_use]
    pub fn new(
        backend: &'a dyn DeviceBackend,
        negotiator: &'a FormatNegotiator,
        compressor: &'a dyn BlockCompressor,
        target: TargetClass,
    ) -> Self {
        Self {
            backend,
            negotiator,
            compressor,
            target,
        }
    }

    /// Ingests `image` as `name`, producing a fully uploaded texture.
    ///
    /// `max_size` optionally caps the base dimensions before mip planning.
    /// On any failure the partially built texture is released by drop; the
    /// error aborts this one texture, never the process.
    pub fn ingest(
        &self,
        mut image: SourceImage,
        semantic: TextureSemantic,
        name: &str,
        max_size: Option<(u32, u32)>,
    ) -> Result<Box<dyn TextureHandle>> {
        // 1. Channel adjustment by semantic.
        match semantic {
            TextureSemantic::SpecularMap => image.convert_to_luma(),
            TextureSemantic::AlphaMask if image.channels() > 1 => {
                if image.channels() != 4 {
                    return Err(KilnError::InvalidImage(format!(
                        "alpha mask '{name}' has {} channels; needs 1 or 4",
                        image.channels()
                    )));
                }
                image.extract_channel(3)?;
            }
            _ => {}
        }

        // 2. Optional downscale before any mip planning.
        if let Some((max_w, max_h)) = max_size {
            if image.width() > max_w || image.height() > max_h {
                image.resize(image.width().min(max_w), image.height().min(max_h));
            }
        }

        // 3. Plan the mip chain from the (possibly downscaled) base.
        let (base_w, base_h) = (image.width(), image.height());
        let mip_count = mip_level_count(base_w, base_h, semantic);
        let levels: SmallVec<[(u32, u32); 16]> = (0..mip_count)
            .map(|level| ((base_w >> level).max(1), (base_h >> level).max(1)))
            .collect();

        // 4. Upload-format selection. One format is used uniformly across
        // the entire chain, so every planned level must stay block-aligned
        // and the smallest must still be at least one 4×4 block.
        let mut format = self
            .negotiator
            .best_compression_for_image(self.target, &image, semantic);
        if let Some(compressed) = format {
            let chain_compressible = levels
                .iter()
                .all(|&(w, h)| w >= 4 && h >= 4 && w % 4 == 0 && h % 4 == 0);
            if !chain_compressible {
                debug!(
                    "'{name}': mip chain of {base_w}x{base_h} drops below the {:?} block floor; \
                     storing uncompressed",
                    compressed
                );
                format = None;
            }
        }

        // 5. Uncompressed fallback, with a single sRGB → Linear retry.
        let format = match format {
            Some(compressed) => compressed,
            None => self.negotiate_uncompressed(&mut image, name)?,
        };

        // 6. The texture is created once, with its final mip count; levels
        // are then each uploaded write-once.
        let mut texture = self
            .backend
            .create_texture(name, mip_count, base_w, base_h, format)?;

        // 7-8. Upload the base, then halve and re-upload for each level.
        for (level, &(level_w, level_h)) in levels.iter().enumerate() {
            if level > 0 {
                image.resize(level_w, level_h);
            }
            self.upload_level(texture.as_mut(), level as u32, &image, format, name)?;
        }

        Ok(texture)
    }

    /// Picks the closest supported uncompressed format and expands the
    /// image's channels to match it (monotonic, opaque alpha padding).
    fn negotiate_uncompressed(
        &self,
        image: &mut SourceImage,
        name: &str,
    ) -> Result<PixelFormat> {
        let oracle: &dyn CapabilityOracle = self.backend;
        let requested = image.colorspace();
        let mut chosen = self.negotiator.closest_supported_uncompressed_format(
            oracle,
            self.target,
            image.channels(),
            requested,
        );
        if chosen.is_none() && requested == ColorSpace::Srgb {
            chosen = self.negotiator.closest_supported_uncompressed_format(
                oracle,
                self.target,
                image.channels(),
                ColorSpace::Linear,
            );
        }

        let Some(format) = chosen else {
            // Exhausting every fallback means the capability table itself
            // is defective; give up on this texture only.
            error!(
                "'{name}': no uncompressed format supported at any channel count >= {}",
                image.channels()
            );
            return Err(KilnError::NoSupportedFormat {
                name: name.to_string(),
                channels: image.channels(),
                colorspace: ColorSpace::Linear,
            });
        };

        if format.channels() > image.channels() {
            image.expand_channels(format.channels());
        }
        Ok(format)
    }

    /// Uploads one level: raw bytes when the image already matches the
    /// upload format, otherwise through the block compressor (against a
    /// disposable RGBA8 duplicate when the source is not 4-channel).
    fn upload_level(
        &self,
        texture: &mut dyn TextureHandle,
        level: u32,
        image: &SourceImage,
        format: PixelFormat,
        name: &str,
    ) -> Result<()> {
        if !format.is_compressed() {
            return texture.upload(level, image.width(), image.height(), image.data());
        }

        let compressed = if image.channels() == 4 {
            self.compressor.compress(image, format)
        } else {
            let rgba = image.to_rgba8();
            self.compressor.compress(&rgba, format)
        };

        match compressed {
            Some(payload)
                if payload.format() == format
                    && payload.width() == image.width()
                    && payload.height() == image.height() =>
            {
                texture.upload(level, payload.width(), payload.height(), payload.data())
            }
            Some(_) | None => Err(KilnError::CompressionFailed {
                format,
                name: name.to_string(),
            }),
        }
    }
}
