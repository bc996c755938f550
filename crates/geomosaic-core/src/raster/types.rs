//! Core raster types.

use image::{DynamicImage, ImageBuffer, LumaA, Rgba};
use serde::{Deserialize, Serialize};

/// Sample type of the input channels.
///
/// Pixel values are carried as `f32` internally; the channel type fixes the
/// representable range used for clamping, normalization and opacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    #[default]
    U8,
    U16,
    I16,
    /// Floating point, nominal range 0.0 to 1.0.
    F32,
}

impl ChannelType {
    pub fn min(self) -> f32 {
        match self {
            ChannelType::U8 | ChannelType::U16 | ChannelType::F32 => 0.0,
            ChannelType::I16 => i16::MIN as f32,
        }
    }

    pub fn max(self) -> f32 {
        match self {
            ChannelType::U8 => u8::MAX as f32,
            ChannelType::U16 => u16::MAX as f32,
            ChannelType::I16 => i16::MAX as f32,
            ChannelType::F32 => 1.0,
        }
    }

    /// Clamp a value into the representable range, rounding integer types.
    #[inline]
    pub fn clamp(self, value: f32) -> f32 {
        let v = value.clamp(self.min(), self.max());
        match self {
            ChannelType::F32 => v,
            _ => v.round(),
        }
    }

    /// Map `value` linearly from this type's range onto `target`'s.
    #[inline]
    pub fn rescale_to(self, value: f32, target: ChannelType) -> f32 {
        if target == self {
            return value;
        }
        let t = (value - self.min()) / (self.max() - self.min());
        target.clamp(target.min() + t * (target.max() - target.min()))
    }

    /// Alpha value of a fully opaque pixel.
    #[inline]
    pub fn opaque(self) -> f32 {
        self.max()
    }
}

/// A raster with one or three colour bands followed by an alpha band.
///
/// Alpha `0` is transparent and `channel.opaque()` is fully opaque.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Colour bands per pixel (1 grey, 3 RGB); alpha comes on top.
    pub bands: usize,
    /// Sample type of the source data.
    pub channel: ChannelType,
    /// Interleaved samples in row-major order, `bands + 1` per pixel.
    pub data: Vec<f32>,
}

impl Raster {
    /// Fully transparent raster.
    pub fn new(width: u32, height: u32, bands: usize, channel: ChannelType) -> Self {
        Self {
            width,
            height,
            bands,
            channel,
            data: vec![0.0; width as usize * height as usize * (bands + 1)],
        }
    }

    pub fn from_samples(
        width: u32,
        height: u32,
        bands: usize,
        channel: ChannelType,
        data: Vec<f32>,
    ) -> Self {
        debug_assert_eq!(
            data.len(),
            width as usize * height as usize * (bands + 1),
            "Sample buffer size mismatch"
        );
        Self {
            width,
            height,
            bands,
            channel,
            data,
        }
    }

    /// Samples per pixel, alpha included.
    #[inline]
    pub fn stride(&self) -> usize {
        self.bands + 1
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * self.stride()
    }

    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> &[f32] {
        let idx = self.index(x, y);
        &self.data[idx..idx + self.stride()]
    }

    #[inline]
    pub fn pixel_mut(&mut self, x: u32, y: u32) -> &mut [f32] {
        let idx = self.index(x, y);
        let stride = self.stride();
        &mut self.data[idx..idx + stride]
    }

    #[inline]
    pub fn alpha(&self, x: u32, y: u32) -> f32 {
        self.pixel(x, y)[self.bands]
    }

    /// Iterate over pixels as sample slices.
    pub fn pixels(&self) -> std::slice::ChunksExact<'_, f32> {
        self.data.chunks_exact(self.stride())
    }

    pub fn pixels_mut(&mut self) -> std::slice::ChunksExactMut<'_, f32> {
        let stride = self.stride();
        self.data.chunks_exact_mut(stride)
    }

    /// Rescale every sample from the current channel range to `target`.
    pub fn convert_channel(&self, target: ChannelType) -> Raster {
        if target == self.channel {
            return self.clone();
        }
        let bands = self.bands;
        let mut data = self.data.clone();
        for px in data.chunks_exact_mut(bands + 1) {
            for v in px[..bands].iter_mut() {
                *v = self.channel.rescale_to(*v, target);
            }
            px[bands] = target.clamp(px[bands] / self.channel.opaque() * target.opaque());
        }
        Raster::from_samples(self.width, self.height, bands, target, data)
    }

    /// Grey replicated into three bands. RGB rasters are returned unchanged.
    pub fn to_rgb(&self) -> Raster {
        if self.bands == 3 {
            return self.clone();
        }
        let bands = self.bands;
        let data = self
            .pixels()
            .flat_map(|px| [px[0], px[0], px[0], px[bands]])
            .collect();
        Raster::from_samples(self.width, self.height, 3, self.channel, data)
    }

    /// Convert a decoded image, adding an opaque alpha band when the image has none.
    pub fn from_dynamic_image(img: DynamicImage) -> Self {
        let (width, height) = (img.width(), img.height());
        let (bands, channel, data) = match img {
            DynamicImage::ImageLuma8(_) | DynamicImage::ImageLumaA8(_) => {
                let buf = img.into_luma_alpha8();
                (1, ChannelType::U8, buf.into_raw().into_iter().map(f32::from).collect())
            }
            DynamicImage::ImageLuma16(_) | DynamicImage::ImageLumaA16(_) => {
                let buf = img.into_luma_alpha16();
                (1, ChannelType::U16, buf.into_raw().into_iter().map(f32::from).collect())
            }
            DynamicImage::ImageRgb16(_) | DynamicImage::ImageRgba16(_) => {
                let buf = img.into_rgba16();
                (3, ChannelType::U16, buf.into_raw().into_iter().map(f32::from).collect())
            }
            DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => {
                let buf = img.into_rgba32f();
                (3, ChannelType::F32, buf.into_raw())
            }
            other => {
                let buf = other.into_rgba8();
                (3, ChannelType::U8, buf.into_raw().into_iter().map(f32::from).collect())
            }
        };
        Self::from_samples(width, height, bands, channel, data)
    }

    /// Convert to an encodable image.
    ///
    /// 8 and 16 bit channels keep their depth; signed 16 bit is shifted into
    /// the unsigned range and floating point is scaled to 8 bit.
    pub fn to_dynamic_image(&self) -> Option<DynamicImage> {
        let (w, h) = (self.width, self.height);
        match self.channel {
            ChannelType::U8 | ChannelType::F32 => {
                let scale = 255.0 / self.channel.max();
                let raw: Vec<u8> = self
                    .expanded_samples()
                    .map(|v| (v * scale).clamp(0.0, 255.0).round() as u8)
                    .collect();
                if self.bands == 1 {
                    ImageBuffer::<LumaA<u8>, _>::from_raw(w, h, raw)
                        .map(DynamicImage::ImageLumaA8)
                } else {
                    ImageBuffer::<Rgba<u8>, _>::from_raw(w, h, raw)
                        .map(DynamicImage::ImageRgba8)
                }
            }
            ChannelType::U16 | ChannelType::I16 => {
                let shift = -self.channel.min();
                let alpha_scale = u16::MAX as f32 / self.channel.opaque();
                let stride = self.bands_out() + 1;
                let raw: Vec<u16> = self
                    .expanded_samples()
                    .enumerate()
                    .map(|(i, v)| {
                        let v = if i % stride == stride - 1 {
                            v * alpha_scale
                        } else {
                            v + shift
                        };
                        v.clamp(0.0, u16::MAX as f32).round() as u16
                    })
                    .collect();
                if self.bands == 1 {
                    ImageBuffer::<LumaA<u16>, _>::from_raw(w, h, raw)
                        .map(DynamicImage::ImageLumaA16)
                } else {
                    ImageBuffer::<Rgba<u16>, _>::from_raw(w, h, raw)
                        .map(DynamicImage::ImageRgba16)
                }
            }
        }
    }

    fn bands_out(&self) -> usize {
        if self.bands == 1 {
            1
        } else {
            3
        }
    }

    /// Samples with 2-band colour padded out to RGB when needed.
    fn expanded_samples(&self) -> impl Iterator<Item = f32> + '_ {
        let bands = self.bands;
        self.pixels().flat_map(move |px| {
            let mut out = Vec::with_capacity(4);
            if bands == 1 {
                out.push(px[0]);
            } else {
                out.extend((0..3).map(|i| px[i.min(bands - 1)]));
            }
            out.push(px[bands]);
            out
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_ranges() {
        assert_eq!(ChannelType::U8.max(), 255.0);
        assert_eq!(ChannelType::U16.max(), 65535.0);
        assert_eq!(ChannelType::I16.min(), -32768.0);
        assert_eq!(ChannelType::F32.max(), 1.0);
    }

    #[test]
    fn test_channel_clamp_rounds_integers() {
        assert_eq!(ChannelType::U8.clamp(300.0), 255.0);
        assert_eq!(ChannelType::U8.clamp(12.6), 13.0);
        assert_eq!(ChannelType::F32.clamp(0.25), 0.25);
        assert_eq!(ChannelType::I16.clamp(-40000.0), -32768.0);
    }

    #[test]
    fn test_new_is_transparent() {
        let r = Raster::new(4, 3, 3, ChannelType::U8);
        assert_eq!(r.data.len(), 4 * 3 * 4);
        assert_eq!(r.alpha(3, 2), 0.0);
    }

    #[test]
    fn test_pixel_access() {
        let mut r = Raster::new(2, 2, 1, ChannelType::U8);
        r.pixel_mut(1, 1).copy_from_slice(&[42.0, 255.0]);
        assert_eq!(r.pixel(1, 1), &[42.0, 255.0]);
        assert_eq!(r.pixel(0, 1), &[0.0, 0.0]);
    }

    #[test]
    fn test_from_rgb_image_adds_alpha() {
        let img = image::RgbImage::from_raw(2, 1, vec![10, 20, 30, 40, 50, 60]).unwrap();
        let r = Raster::from_dynamic_image(DynamicImage::ImageRgb8(img));
        assert_eq!(r.bands, 3);
        assert_eq!(r.channel, ChannelType::U8);
        assert_eq!(r.pixel(1, 0), &[40.0, 50.0, 60.0, 255.0]);
    }

    #[test]
    fn test_from_gray16_image() {
        let img = image::ImageBuffer::<image::Luma<u16>, _>::from_raw(1, 1, vec![1000u16]).unwrap();
        let r = Raster::from_dynamic_image(DynamicImage::ImageLuma16(img));
        assert_eq!(r.bands, 1);
        assert_eq!(r.channel, ChannelType::U16);
        assert_eq!(r.pixel(0, 0), &[1000.0, 65535.0]);
    }

    #[test]
    fn test_to_dynamic_image_u8() {
        let r = Raster::from_samples(1, 1, 1, ChannelType::U8, vec![77.0, 255.0]);
        let img = r.to_dynamic_image().unwrap().into_luma_alpha8();
        assert_eq!(img.get_pixel(0, 0).0, [77, 255]);
    }

    #[test]
    fn test_to_dynamic_image_i16_shifts() {
        let r = Raster::from_samples(1, 1, 1, ChannelType::I16, vec![0.0, 32767.0]);
        let img = r.to_dynamic_image().unwrap().into_luma_alpha16();
        assert_eq!(img.get_pixel(0, 0).0, [32768, 65535]);
    }

    #[test]
    fn test_convert_channel() {
        let r = Raster::from_samples(1, 1, 1, ChannelType::U8, vec![255.0, 255.0]);
        let f = r.convert_channel(ChannelType::F32);
        assert_eq!(f.pixel(0, 0), &[1.0, 1.0]);
        let back = f.convert_channel(ChannelType::U16);
        assert_eq!(back.pixel(0, 0), &[65535.0, 65535.0]);
    }

    #[test]
    fn test_to_rgb_replicates_grey() {
        let r = Raster::from_samples(1, 1, 1, ChannelType::U8, vec![40.0, 200.0]);
        let rgb = r.to_rgb();
        assert_eq!(rgb.bands, 3);
        assert_eq!(rgb.pixel(0, 0), &[40.0, 40.0, 40.0, 200.0]);
    }
}
