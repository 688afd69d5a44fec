//! Pixel formats and the vocabulary of texture negotiation.
//!
//! [`PixelFormat`] is a tag describing channel layout, bit depth and
//! compression scheme, with its derived block math. The surrounding enums
//! ([`ColorSpace`], [`TextureSemantic`], [`TargetClass`], [`FormatUsage`])
//! parameterize what the [`FormatNegotiator`] asks of a backend.

use bitflags::bitflags;

mod negotiator;

pub use negotiator::FormatNegotiator;

/// Colorspace of source pixel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorSpace {
    Srgb,
    Linear,
}

/// Semantic role of a texture; determines the allowed colorspace and the
/// runtime-compression candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSemantic {
    /// An RGB / RGBA texture, possibly stored in a compressed format.
    GameTexture,
    /// UI textures are never mip-mapped and never runtime-compressed.
    UserInterface,
    /// A single-channel texture containing alpha values.
    AlphaMask,
    /// A tangent-space normal map.
    NormalMap,
    /// A single-channel texture containing the specular / luma value.
    SpecularMap,
}

/// Render-target class a pixel format is negotiated for. Indexes the
/// capability table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetClass {
    Texture2d,
    Texture2dArray,
    DepthMap,
}

impl TargetClass {
    /// Number of target classes; the capability table is sized by this.
    pub const COUNT: usize = 3;

    #[must_use]
    pub fn index(self) -> usize {
        match self {
            TargetClass::Texture2d => 0,
            TargetClass::Texture2dArray => 1,
            TargetClass::DepthMap => 2,
        }
    }

    #[must_use]
    pub fn all() -> [TargetClass; Self::COUNT] {
        [
            TargetClass::Texture2d,
            TargetClass::Texture2dArray,
            TargetClass::DepthMap,
        ]
    }
}

bitflags! {
    /// How a format is intended to be used, as understood by the capability
    /// oracle.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FormatUsage: u32 {
        const SAMPLED_IMAGE            = 1 << 0;
        const STORAGE_IMAGE            = 1 << 1;
        const DEPTH_STENCIL_ATTACHMENT = 1 << 2;
    }
}

/// Pixel format tag: channel layout, bit depth and compression scheme.
///
/// Uncompressed formats are 8 bits per channel. Compressed formats operate
/// on 4×4 texel blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    // Uncompressed, linear
    R8Unorm,
    Rg8Unorm,
    Rgb8Unorm,
    Rgba8Unorm,
    // Uncompressed, sRGB-encoded
    R8UnormSrgb,
    Rg8UnormSrgb,
    Rgb8UnormSrgb,
    Rgba8UnormSrgb,
    // Block-compressed (4×4 blocks)
    Etc1Rgb,
    Etc2Rgb,
    Etc2RgbaEac,
    Bc1Rgb,
    Bc3Rgba,
}

impl PixelFormat {
    /// The uncompressed format for a channel count and colorspace.
    /// Returns `None` for channel counts outside `1..=4`.
    #[must_use]
    pub fn uncompressed(channels: u8, colorspace: ColorSpace) -> Option<PixelFormat> {
        let format = match (channels, colorspace) {
            (1, ColorSpace::Linear) => PixelFormat::R8Unorm,
            (2, ColorSpace::Linear) => PixelFormat::Rg8Unorm,
            (3, ColorSpace::Linear) => PixelFormat::Rgb8Unorm,
            (4, ColorSpace::Linear) => PixelFormat::Rgba8Unorm,
            (1, ColorSpace::Srgb) => PixelFormat::R8UnormSrgb,
            (2, ColorSpace::Srgb) => PixelFormat::Rg8UnormSrgb,
            (3, ColorSpace::Srgb) => PixelFormat::Rgb8UnormSrgb,
            (4, ColorSpace::Srgb) => PixelFormat::Rgba8UnormSrgb,
            _ => return None,
        };
        Some(format)
    }

    /// Number of color channels the format stores (compressed formats report
    /// the channel count they decode to).
    #[must_use]
    pub fn channels(self) -> u8 {
        match self {
            PixelFormat::R8Unorm | PixelFormat::R8UnormSrgb => 1,
            PixelFormat::Rg8Unorm | PixelFormat::Rg8UnormSrgb => 2,
            PixelFormat::Rgb8Unorm
            | PixelFormat::Rgb8UnormSrgb
            | PixelFormat::Etc1Rgb
            | PixelFormat::Etc2Rgb
            | PixelFormat::Bc1Rgb => 3,
            PixelFormat::Rgba8Unorm
            | PixelFormat::Rgba8UnormSrgb
            | PixelFormat::Etc2RgbaEac
            | PixelFormat::Bc3Rgba => 4,
        }
    }

    #[must_use]
    pub fn is_compressed(self) -> bool {
        matches!(
            self,
            PixelFormat::Etc1Rgb
                | PixelFormat::Etc2Rgb
                | PixelFormat::Etc2RgbaEac
                | PixelFormat::Bc1Rgb
                | PixelFormat::Bc3Rgba
        )
    }

    /// Block edge length in texels: 1 for uncompressed formats, 4 for
    /// block-compressed formats.
    #[must_use]
    pub fn block_dim(self) -> u32 {
        if self.is_compressed() { 4 } else { 1 }
    }

    /// Bytes per block: bytes per pixel for uncompressed formats, bytes per
    /// 4×4 block for compressed formats (ETC1 / ETC2-RGB / BC1: 8,
    /// ETC2-EAC / BC3: 16).
    #[must_use]
    pub fn bytes_per_block(self) -> usize {
        match self {
            PixelFormat::R8Unorm | PixelFormat::R8UnormSrgb => 1,
            PixelFormat::Rg8Unorm | PixelFormat::Rg8UnormSrgb => 2,
            PixelFormat::Rgb8Unorm | PixelFormat::Rgb8UnormSrgb => 3,
            PixelFormat::Rgba8Unorm | PixelFormat::Rgba8UnormSrgb => 4,
            PixelFormat::Etc1Rgb | PixelFormat::Etc2Rgb | PixelFormat::Bc1Rgb => 8,
            PixelFormat::Etc2RgbaEac | PixelFormat::Bc3Rgba => 16,
        }
    }

    /// Byte size of a single level with the given dimensions. Compressed
    /// dimensions are rounded up to whole blocks.
    #[must_use]
    pub fn level_size(self, width: u32, height: u32) -> usize {
        let block = self.block_dim();
        let blocks_w = width.div_ceil(block) as usize;
        let blocks_h = height.div_ceil(block) as usize;
        blocks_w * blocks_h * self.bytes_per_block()
    }

    #[must_use]
    pub fn colorspace(self) -> ColorSpace {
        match self {
            PixelFormat::R8UnormSrgb
            | PixelFormat::Rg8UnormSrgb
            | PixelFormat::Rgb8UnormSrgb
            | PixelFormat::Rgba8UnormSrgb => ColorSpace::Srgb,
            _ => ColorSpace::Linear,
        }
    }

    /// Whether the format stores an alpha channel.
    #[must_use]
    pub fn has_alpha(self) -> bool {
        self.channels() == 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncompressed_lookup_covers_all_channel_counts() {
        for channels in 1..=4u8 {
            for colorspace in [ColorSpace::Srgb, ColorSpace::Linear] {
                let format = PixelFormat::uncompressed(channels, colorspace).unwrap();
                assert_eq!(format.channels(), channels);
                assert_eq!(format.colorspace(), colorspace);
                assert!(!format.is_compressed());
            }
        }
        assert!(PixelFormat::uncompressed(0, ColorSpace::Linear).is_none());
        assert!(PixelFormat::uncompressed(5, ColorSpace::Linear).is_none());
    }

    #[test]
    fn compressed_block_math() {
        assert_eq!(PixelFormat::Bc1Rgb.level_size(16, 16), 16 * 16 / 2);
        assert_eq!(PixelFormat::Bc3Rgba.level_size(16, 16), 16 * 16);
        assert_eq!(PixelFormat::Etc2Rgb.level_size(4, 4), 8);
        assert_eq!(PixelFormat::Etc2RgbaEac.level_size(4, 4), 16);
        // Sub-block dimensions round up to one whole block.
        assert_eq!(PixelFormat::Bc3Rgba.level_size(2, 2), 16);
    }

    #[test]
    fn uncompressed_level_size_is_pixel_math() {
        assert_eq!(PixelFormat::Rgba8Unorm.level_size(130, 130), 130 * 130 * 4);
        assert_eq!(PixelFormat::Rgb8UnormSrgb.level_size(7, 3), 7 * 3 * 3);
        assert_eq!(PixelFormat::R8Unorm.level_size(1, 1), 1);
    }
}
