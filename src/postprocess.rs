// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Depth map post-processing.
//!
//! The raw depth output is normalized to 8-bit, false-coloured with a
//! magma-like palette, scaled down to a fraction of the destination width,
//! converted to NV12 and copied into the top-left corner of the destination
//! frame.

use crate::{
    colormap::{self, Palette},
    error::{Error, Result},
    frame::{PixelFormat, VideoFrameMut},
    tensor::DepthView,
};
use dcv_color_primitives as dcp;
use fast_image_resize as fr;
use tracing::{instrument, trace};

/// Placement of the depth overlay in the destination frame.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct OverlayConfig {
    /// Overlay width as a fraction of the destination width.
    pub ratio: f32,
    /// Overlay width is rounded up to a multiple of this value.
    pub align: u32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            ratio: 0.3,
            align: 16,
        }
    }
}

impl OverlayConfig {
    /// Overlay size for a `src_width` x `src_height` depth map drawn into a
    /// frame `dst_width` pixels wide. The height keeps the depth map's aspect
    /// ratio and is rounded down to even for 4:2:0 chroma. The width is
    /// rounded up to even whatever the alignment.
    pub fn overlay_size(
        &self,
        src_width: usize,
        src_height: usize,
        dst_width: u32,
    ) -> (usize, usize) {
        let width = align_up((self.ratio * dst_width as f32) as u32, self.align) as usize;
        let width = (width + 1) & !1;
        if src_width == 0 {
            return (width, 0);
        }
        let height = (width as f32 / src_width as f32 * src_height as f32) as usize;
        (width, height & !1)
    }
}

pub const fn align_up(value: u32, align: u32) -> u32 {
    if align <= 1 {
        return value;
    }
    value.div_ceil(align) * align
}

/// Normalizes `src` to the full 8-bit range, `(v - min) / (max - min) * 255`
/// rounded to nearest.
///
/// A flat grid, where `max == min`, maps to all zeros. NaNs are skipped when
/// searching the range and quantize to zero.
pub fn normalize(src: &[f32], dst: &mut [u8]) {
    let (min, max) = src
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let range = max - min;

    if !(range > 0.0) || !range.is_finite() {
        dst.iter_mut().take(src.len()).for_each(|v| *v = 0);
        return;
    }

    for (out, &v) in dst.iter_mut().zip(src) {
        *out = ((v - min) / range * 255.0).round().clamp(0.0, 255.0) as u8;
    }
}

/// Bilinear resize of packed RGB with a reusable `resizer`.
pub fn resize_bilinear(
    resizer: &mut fr::Resizer,
    src: &[u8],
    src_width: usize,
    src_height: usize,
    dst: &mut [u8],
    dst_width: usize,
    dst_height: usize,
) -> Result<()> {
    let src = fr::images::ImageRef::new(
        src_width as u32,
        src_height as u32,
        src,
        fr::PixelType::U8x3,
    )?;
    let mut dst = fr::images::Image::from_slice_u8(
        dst_width as u32,
        dst_height as u32,
        dst,
        fr::PixelType::U8x3,
    )?;
    let options =
        fr::ResizeOptions::new().resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Bilinear));
    resizer.resize(&src, &mut dst, Some(&options))?;
    Ok(())
}

/// Converts packed RGB to NV12 with BT.601 video range.
///
/// `luma` receives `width * height` bytes and `chroma` receives `height / 2`
/// rows of `width` interleaved U,V bytes. `width` and `height` must be even.
pub fn rgb_to_nv12(
    rgb: &[u8],
    width: usize,
    height: usize,
    luma: &mut [u8],
    chroma: &mut [u8],
) -> Result<()> {
    let src_format = dcp::ImageFormat {
        pixel_format: dcp::PixelFormat::Rgb,
        color_space: dcp::ColorSpace::Rgb,
        num_planes: 1,
    };
    let dst_format = dcp::ImageFormat {
        pixel_format: dcp::PixelFormat::Nv12,
        color_space: dcp::ColorSpace::Bt601,
        num_planes: 2,
    };
    dcp::convert_image(
        width as u32,
        height as u32,
        &src_format,
        None,
        &[rgb],
        &dst_format,
        None,
        &mut [luma, chroma],
    )
    .map_err(Error::ColorConvert)
}

/// Copies an NV12 overlay into the top-left corner of an NV12 frame.
///
/// Rows are copied with the destination stride equal to the frame width and
/// the source stride equal to `width`. The copy is clipped to the frame and
/// nothing outside the overlay rectangle is written.
pub fn composite(
    luma: &[u8],
    chroma: &[u8],
    width: usize,
    height: usize,
    dst: &mut VideoFrameMut,
) -> Result<()> {
    let dst_width = dst.width() as usize;
    let dst_height = dst.height() as usize;
    let (dst_y, dst_uv) = dst.nv12_planes_mut()?;

    let copy_width = width.min(dst_width);
    for row in 0..height.min(dst_height) {
        dst_y[row * dst_width..row * dst_width + copy_width]
            .copy_from_slice(&luma[row * width..row * width + copy_width]);
    }
    for row in 0..(height / 2).min(dst_height / 2) {
        dst_uv[row * dst_width..row * dst_width + copy_width]
            .copy_from_slice(&chroma[row * width..row * width + copy_width]);
    }
    Ok(())
}

/// Turns depth outputs into NV12 overlays, reusing its scratch buffers from
/// frame to frame.
pub struct DepthRenderer {
    config: OverlayConfig,
    palette: Palette,
    resizer: fr::Resizer,
    intensity: Vec<u8>,
    color: Vec<u8>,
    resized: Vec<u8>,
    luma: Vec<u8>,
    chroma: Vec<u8>,
    overlay: (usize, usize),
}

impl DepthRenderer {
    pub fn new(config: OverlayConfig) -> Self {
        Self {
            config,
            palette: colormap::magma(),
            resizer: fr::Resizer::new(),
            intensity: Vec::new(),
            color: Vec::new(),
            resized: Vec::new(),
            luma: Vec::new(),
            chroma: Vec::new(),
            overlay: (0, 0),
        }
    }

    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    /// Width and height of the most recently rendered overlay.
    pub fn overlay_size(&self) -> (usize, usize) {
        self.overlay
    }

    /// Luma plane of the most recently rendered overlay.
    pub fn overlay_luma(&self) -> &[u8] {
        &self.luma
    }

    /// Interleaved chroma plane of the most recently rendered overlay.
    pub fn overlay_chroma(&self) -> &[u8] {
        &self.chroma
    }

    /// Renders `depth` into the top-left corner of `dst`, which must be NV12.
    #[instrument(skip_all)]
    pub fn render(&mut self, depth: DepthView, dst: &mut VideoFrameMut) -> Result<()> {
        if dst.format() != PixelFormat::Nv12 {
            return Err(Error::FrameFormat(dst.format()));
        }

        let (src_w, src_h) = (depth.width(), depth.height());
        self.intensity.resize(src_w * src_h, 0);
        normalize(depth.as_slice(), &mut self.intensity);

        self.color.resize(src_w * src_h * 3, 0);
        colormap::apply(&self.palette, &self.intensity, &mut self.color);

        let (width, height) = self.config.overlay_size(src_w, src_h, dst.width());
        self.overlay = (width, height);
        if width == 0 || height == 0 {
            return Ok(());
        }
        trace!("overlay {}x{} from depth {}x{}", width, height, src_w, src_h);

        self.resized.resize(width * height * 3, 0);
        resize_bilinear(
            &mut self.resizer,
            &self.color,
            src_w,
            src_h,
            &mut self.resized,
            width,
            height,
        )?;

        self.luma.resize(width * height, 0);
        self.chroma.resize(width * height / 2, 0);
        rgb_to_nv12(&self.resized, width, height, &mut self.luma, &mut self.chroma)?;

        composite(&self.luma, &self.chroma, width, height, dst)
    }
}

impl Default for DepthRenderer {
    fn default() -> Self {
        Self::new(OverlayConfig::default())
    }
}
