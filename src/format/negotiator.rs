//! Pixel-format negotiation.
//!
//! Two concerns live here:
//!
//! 1. Finding the closest supported *uncompressed* format for a requested
//!    channel count and colorspace, walking the channel count up (never
//!    down) to the 4-channel ceiling.
//! 2. Selecting the best *runtime-compressed* format for a texture's
//!    semantic role, from a fixed quality-ordered candidate list filtered
//!    by what this build can compress and what the backend supports.
//!
//! The compression selection is precomputed once per [`TargetClass`] at
//! construction, so per-texture lookups are O(1). The table is owned by
//! whoever owns the backend context; backend re-initialization means
//! building a fresh negotiator.

use log::debug;
use smallvec::SmallVec;

use crate::backend::CapabilityOracle;
use crate::compress::BlockCompressor;
use crate::format::{ColorSpace, FormatUsage, PixelFormat, TargetClass, TextureSemantic};
use crate::image::SourceImage;

/// Quality-ordered runtime-compression candidates for RGBA game textures.
///
/// Overall quality ranking (of what a runtime compressor can produce):
/// ETC2-EAC > BC3 (DXT5).
const QUALITY_ORDER_RGBA: [PixelFormat; 2] = [PixelFormat::Etc2RgbaEac, PixelFormat::Bc3Rgba];

/// Quality-ordered runtime-compression candidates for RGB game textures.
/// ETC2 > BC1 (DXT1) > ETC1.
const QUALITY_ORDER_RGB: [PixelFormat; 3] =
    [PixelFormat::Etc2Rgb, PixelFormat::Bc1Rgb, PixelFormat::Etc1Rgb];

/// Capability-table-backed format negotiation.
///
/// Built once at backend initialization from the backend's
/// [`CapabilityOracle`] and the build's [`BlockCompressor`].
#[derive(Debug, Clone)]
pub struct FormatNegotiator {
    best_game_texture_rgba: [Option<PixelFormat>; TargetClass::COUNT],
    best_game_texture_rgb: [Option<PixelFormat>; TargetClass::COUNT],
}

impl FormatNegotiator {
    /// Precomputes the best available runtime-compression format per target
    /// class, for RGBA and RGB sources separately.
    ///
    /// A candidate is eligible only if a compressor for it is compiled into
    /// this build *and* the oracle reports it supported as a sampled image
    /// for the target class.
    #[must_use]
    pub fn new(oracle: &dyn CapabilityOracle, compressor: &dyn BlockCompressor) -> Self {
        let compiled: SmallVec<[PixelFormat; 5]> =
            compressor.supported_formats().iter().copied().collect();

        let pick = |target: TargetClass, candidates: &[PixelFormat]| -> Option<PixelFormat> {
            candidates
                .iter()
                .copied()
                .find(|format| {
                    compiled.contains(format)
                        && oracle.format_supported(target, *format, FormatUsage::SAMPLED_IMAGE)
                })
        };

        let mut best_rgba = [None; TargetClass::COUNT];
        let mut best_rgb = [None; TargetClass::COUNT];
        for target in TargetClass::all() {
            best_rgba[target.index()] = pick(target, &QUALITY_ORDER_RGBA);
            best_rgb[target.index()] = pick(target, &QUALITY_ORDER_RGB);
        }

        Self {
            best_game_texture_rgba: best_rgba,
            best_game_texture_rgb: best_rgb,
        }
    }

    /// A negotiator with no compression support at all (every lookup
    /// returns `None`). Useful before a backend exists.
    #[must_use]
    pub fn no_compression() -> Self {
        Self {
            best_game_texture_rgba: [None; TargetClass::COUNT],
            best_game_texture_rgb: [None; TargetClass::COUNT],
        }
    }

    /// Returns the closest supported uncompressed format at or above the
    /// requested channel count.
    ///
    /// Starting at `channels`, probes backend support; on failure the
    /// channel count is incremented (monotonically, never decreased) up to
    /// the 4-channel ceiling. Returns `None` only if even 4-channel RGBA is
    /// unsupported. Callers that asked for sRGB retry once in Linear before
    /// treating `None` as an error.
    #[must_use]
    pub fn closest_supported_uncompressed_format(
        &self,
        oracle: &dyn CapabilityOracle,
        target: TargetClass,
        channels: u8,
        colorspace: ColorSpace,
    ) -> Option<PixelFormat> {
        let mut probe = channels.max(1);
        while probe <= 4 {
            if let Some(format) = PixelFormat::uncompressed(probe, colorspace) {
                if oracle.format_supported(target, format, FormatUsage::SAMPLED_IMAGE) {
                    return Some(format);
                }
            }
            probe += 1;
        }
        None
    }

    /// Returns the best runtime-compressed format for the given semantic,
    /// or `None` when the texture should stay uncompressed.
    ///
    /// Absence of a compressed format is a legitimate outcome, not an error.
    #[must_use]
    pub fn best_runtime_compression_format(
        &self,
        target: TargetClass,
        semantic: TextureSemantic,
        has_alpha: bool,
    ) -> Option<PixelFormat> {
        match semantic {
            TextureSemantic::GameTexture => {
                if has_alpha {
                    self.best_game_texture_rgba[target.index()]
                } else {
                    self.best_game_texture_rgb[target.index()]
                }
            }
            // Runtime compression is deliberately not offered for the
            // remaining semantics in the current implementation:
            //   UserInterface — stored uncompressed
            //   AlphaMask     — stays a single-channel uncompressed texture
            //   NormalMap     — would need x,y packed into r,a first
            //   SpecularMap   — would need expansion to 4 channels first
            TextureSemantic::UserInterface
            | TextureSemantic::AlphaMask
            | TextureSemantic::NormalMap
            | TextureSemantic::SpecularMap => None,
        }
    }

    /// Image-aware variant of [`Self::best_runtime_compression_format`]:
    /// additionally requires an RGB or RGBA source and the image's width
    /// and height to be multiples of the 4-texel block dimension. Anything
    /// else is skipped entirely for that texture.
    #[must_use]
    pub fn best_compression_for_image(
        &self,
        target: TargetClass,
        image: &SourceImage,
        semantic: TextureSemantic,
    ) -> Option<PixelFormat> {
        if image.channels() < 3 {
            return None;
        }
        if image.width() % 4 != 0 || image.height() % 4 != 0 {
            debug!(
                "skipping runtime compression for {}x{} image (dimensions not a multiple of 4)",
                image.width(),
                image.height()
            );
            return None;
        }
        self.best_runtime_compression_format(target, semantic, image.has_alpha())
    }
}
