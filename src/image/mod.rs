//! CPU-side source images.
//!
//! [`SourceImage`] is the in-memory image the ingestion pipeline consumes.
//! It owns its pixel bytes and is mutated *in place* by channel expansion,
//! channel extraction and resize operations — the pipeline destroys the
//! image as it works through the mip chain, so an ingested image must not
//! be reused.

mod compressed;

pub use compressed::CompressedImage;

use crate::errors::{KilnError, Result};
use crate::format::ColorSpace;

/// An owned, mutable CPU-side image with 8 bits per channel.
#[derive(Debug)]
pub struct SourceImage {
    width: u32,
    height: u32,
    channels: u8,
    colorspace: ColorSpace,
    data: Vec<u8>,
}

impl SourceImage {
    /// Wraps raw interleaved 8-bit pixel data.
    ///
    /// Fails when the channel count is outside `1..=4`, a dimension is
    /// zero, or the byte length does not match `width * height * channels`.
    pub fn from_raw(
        width: u32,
        height: u32,
        channels: u8,
        colorspace: ColorSpace,
        data: Vec<u8>,
    ) -> Result<Self> {
        if !(1..=4).contains(&channels) {
            return Err(KilnError::InvalidImage(format!(
                "unsupported channel count {channels}"
            )));
        }
        if width == 0 || height == 0 {
            return Err(KilnError::InvalidImage(format!(
                "zero dimension: {width}x{height}"
            )));
        }
        let expected = width as usize * height as usize * channels as usize;
        if data.len() != expected {
            return Err(KilnError::InvalidImage(format!(
                "{width}x{height}x{channels} image needs {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            channels,
            colorspace,
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
    pub fn channels(&self) -> u8 {
        self.channels
    }
    #[must_use]
    pub fn colorspace(&self) -> ColorSpace {
        self.colorspace
    }
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Whether the image carries an alpha channel.
    #[must_use]
    pub fn has_alpha(&self) -> bool {
        self.channels == 4
    }

    /// Expands the image to `target` channels in place, padding new
    /// channels with opaque 255.
    ///
    /// Monotonic: a `target` at or below the current channel count is a
    /// no-op, so the operation is idempotent and the channel count only
    /// ever grows.
    pub fn expand_channels(&mut self, target: u8) {
        let target = target.min(4);
        if target <= self.channels {
            return;
        }
        let src_ch = self.channels as usize;
        let dst_ch = target as usize;
        let pixels = self.width as usize * self.height as usize;

        let mut expanded = vec![255u8; pixels * dst_ch];
        for (src, dst) in self
            .data
            .chunks_exact(src_ch)
            .zip(expanded.chunks_exact_mut(dst_ch))
        {
            dst[..src_ch].copy_from_slice(src);
        }

        self.data = expanded;
        self.channels = target;
    }

    /// Collapses the image to a single luma channel in place, using integer
    /// Rec.601 weights. Single-channel images are left untouched.
    pub fn convert_to_luma(&mut self) {
        if self.channels == 1 {
            return;
        }
        let src_ch = self.channels as usize;
        let pixels = self.width as usize * self.height as usize;

        let mut luma = Vec::with_capacity(pixels);
        for texel in self.data.chunks_exact(src_ch) {
            if src_ch >= 3 {
                let weighted = u32::from(texel[0]) * 77
                    + u32::from(texel[1]) * 150
                    + u32::from(texel[2]) * 29;
                luma.push((weighted >> 8) as u8);
            } else {
                luma.push(texel[0]);
            }
        }

        self.data = luma;
        self.channels = 1;
    }

    /// Extracts a single channel in place (e.g. channel 3 for the alpha of
    /// an RGBA image). Fails when the channel index is out of range.
    pub fn extract_channel(&mut self, channel: u8) -> Result<()> {
        if channel >= self.channels {
            return Err(KilnError::InvalidImage(format!(
                "cannot extract channel {channel} from a {}-channel image",
                self.channels
            )));
        }
        let src_ch = self.channels as usize;
        let offset = channel as usize;
        let extracted: Vec<u8> = self
            .data
            .chunks_exact(src_ch)
            .map(|texel| texel[offset])
            .collect();

        self.data = extracted;
        self.channels = 1;
        Ok(())
    }

    /// Resizes the image in place with an area-averaging box filter.
    ///
    /// Destructive: the previous pixel data is gone afterwards. Used both
    /// for the optional pre-mip downscale and for the per-level halving of
    /// the mip chain.
    pub fn resize(&mut self, new_width: u32, new_height: u32) {
        let new_width = new_width.max(1);
        let new_height = new_height.max(1);
        if new_width == self.width && new_height == self.height {
            return;
        }
        let ch = self.channels as usize;
        let (src_w, src_h) = (self.width as usize, self.height as usize);
        let (dst_w, dst_h) = (new_width as usize, new_height as usize);

        let mut resized = vec![0u8; dst_w * dst_h * ch];
        for dy in 0..dst_h {
            // Source row span covered by this destination row.
            let y0 = dy * src_h / dst_h;
            let y1 = (((dy + 1) * src_h).div_ceil(dst_h)).min(src_h).max(y0 + 1);
            for dx in 0..dst_w {
                let x0 = dx * src_w / dst_w;
                let x1 = (((dx + 1) * src_w).div_ceil(dst_w)).min(src_w).max(x0 + 1);
                let samples = ((y1 - y0) * (x1 - x0)) as u32;

                for c in 0..ch {
                    let mut sum = 0u32;
                    for sy in y0..y1 {
                        for sx in x0..x1 {
                            sum += u32::from(self.data[(sy * src_w + sx) * ch + c]);
                        }
                    }
                    resized[(dy * dst_w + dx) * ch + c] = (sum / samples) as u8;
                }
            }
        }

        self.data = resized;
        self.width = new_width;
        self.height = new_height;
    }

    /// Returns a disposable RGBA8 duplicate of this image, leaving the
    /// original untouched. Feeds the block compressor, which only accepts
    /// 4-channel input.
    #[must_use]
    pub fn to_rgba8(&self) -> SourceImage {
        let mut duplicate = SourceImage {
            width: self.width,
            height: self.height,
            channels: self.channels,
            colorspace: self.colorspace,
            data: self.data.clone(),
        };
        duplicate.expand_channels(4);
        duplicate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(width: u32, height: u32, channels: u8) -> SourceImage {
        let pixels = (width * height) as usize;
        let mut data = Vec::with_capacity(pixels * channels as usize);
        for i in 0..pixels {
            for c in 0..channels {
                data.push(((i as u8).wrapping_mul(31)).wrapping_add(c * 7));
            }
        }
        SourceImage::from_raw(width, height, channels, ColorSpace::Linear, data).unwrap()
    }

    #[test]
    fn from_raw_validates_length() {
        assert!(SourceImage::from_raw(2, 2, 3, ColorSpace::Srgb, vec![0; 12]).is_ok());
        assert!(SourceImage::from_raw(2, 2, 3, ColorSpace::Srgb, vec![0; 11]).is_err());
        assert!(SourceImage::from_raw(2, 2, 5, ColorSpace::Srgb, vec![0; 20]).is_err());
        assert!(SourceImage::from_raw(0, 2, 3, ColorSpace::Srgb, vec![]).is_err());
    }

    #[test]
    fn expand_channels_pads_opaque_and_is_monotonic() {
        let mut img =
            SourceImage::from_raw(1, 2, 3, ColorSpace::Srgb, vec![1, 2, 3, 4, 5, 6]).unwrap();
        img.expand_channels(4);
        assert_eq!(img.channels(), 4);
        assert_eq!(img.data(), &[1, 2, 3, 255, 4, 5, 6, 255]);

        // Idempotent, and never shrinks.
        img.expand_channels(4);
        img.expand_channels(2);
        assert_eq!(img.channels(), 4);
        assert_eq!(img.data(), &[1, 2, 3, 255, 4, 5, 6, 255]);
    }

    #[test]
    fn luma_uses_rec601_weights() {
        let mut img =
            SourceImage::from_raw(1, 1, 3, ColorSpace::Linear, vec![255, 0, 0]).unwrap();
        img.convert_to_luma();
        assert_eq!(img.channels(), 1);
        assert_eq!(img.data(), &[(255u32 * 77 >> 8) as u8]);

        let mut white =
            SourceImage::from_raw(1, 1, 4, ColorSpace::Linear, vec![255, 255, 255, 0]).unwrap();
        white.convert_to_luma();
        assert_eq!(white.data(), &[255]);
    }

    #[test]
    fn extract_channel_takes_alpha() {
        let mut img =
            SourceImage::from_raw(2, 1, 4, ColorSpace::Linear, vec![1, 2, 3, 9, 5, 6, 7, 8])
                .unwrap();
        img.extract_channel(3).unwrap();
        assert_eq!(img.channels(), 1);
        assert_eq!(img.data(), &[9, 8]);

        let mut rgb = checker(2, 2, 3);
        assert!(rgb.extract_channel(3).is_err());
    }

    #[test]
    fn resize_halves_with_box_filter() {
        let mut img = SourceImage::from_raw(
            2,
            2,
            1,
            ColorSpace::Linear,
            vec![0, 100, 100, 200],
        )
        .unwrap();
        img.resize(1, 1);
        assert_eq!((img.width(), img.height()), (1, 1));
        assert_eq!(img.data(), &[100]);
    }

    #[test]
    fn resize_clamps_to_one() {
        let mut img = checker(4, 4, 2);
        img.resize(0, 0);
        assert_eq!((img.width(), img.height()), (1, 1));
        assert_eq!(img.data().len(), 2);
    }

    #[test]
    fn to_rgba8_leaves_source_untouched() {
        let img = checker(2, 2, 3);
        let before = img.data().to_vec();
        let dup = img.to_rgba8();
        assert_eq!(dup.channels(), 4);
        assert_eq!(img.channels(), 3);
        assert_eq!(img.data(), &before[..]);
    }
}
