//! Frame-to-tensor preprocessing
//!
//! The selected plane is first converted into an RGB working image, which is
//! then resized into each network's first input tensor. Tensors receive raw
//! `0..=255` values in planar CHW order; normalization belongs to the backend
//! that was handed mean and scale at load time.

use crate::error::ResizeError;
use crate::tensor::Tensor;
use image::imageops::FilterType;
use image::RgbImage;
use npu_classify_common::{ImagePlane, PixelFormat};

/// Target geometry read from an input tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    /// Width and height of an input tensor (`shape[0]`, `shape[1]`)
    pub fn of_tensor(tensor: &dyn Tensor) -> Result<Self, ResizeError> {
        let width = u32::try_from(tensor.dim(0))
            .map_err(|_| ResizeError::ShapeMismatch(format!("{}: width overflow", tensor.name())))?;
        let height = u32::try_from(tensor.dim(1))
            .map_err(|_| ResizeError::ShapeMismatch(format!("{}: height overflow", tensor.name())))?;
        Ok(Self { width, height })
    }
}

/// Tensor resizer collaborator
pub trait FrameResizer: Send {
    /// Convert the selected plane into the RGB working image
    fn allocate(&mut self, plane: &ImagePlane) -> Result<RgbImage, ResizeError>;

    /// Resize the working image into `target`
    fn resize(
        &mut self,
        image: &RgbImage,
        target: &mut dyn Tensor,
        size: ImageSize,
    ) -> Result<(), ResizeError>;
}

/// Default resizer built on the `image` crate
#[derive(Debug, Clone, Copy)]
pub struct ImageResizer {
    filter: FilterType,
}

impl Default for ImageResizer {
    fn default() -> Self {
        Self {
            filter: FilterType::Triangle,
        }
    }
}

impl ImageResizer {
    pub fn new(filter: FilterType) -> Self {
        Self { filter }
    }
}

impl FrameResizer for ImageResizer {
    fn allocate(&mut self, plane: &ImagePlane) -> Result<RgbImage, ResizeError> {
        plane_to_rgb(plane)
    }

    fn resize(
        &mut self,
        image: &RgbImage,
        target: &mut dyn Tensor,
        size: ImageSize,
    ) -> Result<(), ResizeError> {
        if size.width == 0 || size.height == 0 {
            return Err(ResizeError::ShapeMismatch(format!(
                "{}: target size {}x{}",
                target.name(),
                size.width,
                size.height
            )));
        }

        let channels = target.shape().get(2).copied().unwrap_or(3);
        if channels != 3 {
            return Err(ResizeError::ShapeMismatch(format!(
                "{}: expected 3 channels, got {channels}",
                target.name()
            )));
        }

        let name = target.name().to_string();
        let data = target
            .data_mut()
            .ok_or_else(|| ResizeError::NoBuffer(name.clone()))?;

        let (w, h) = (size.width as usize, size.height as usize);
        let plane_len = w * h;
        if data.len() < plane_len * 3 {
            return Err(ResizeError::ShapeMismatch(format!(
                "{name}: buffer holds {} values, need {}",
                data.len(),
                plane_len * 3
            )));
        }

        let resized = if image.dimensions() == (size.width, size.height) {
            image.clone()
        } else {
            image::imageops::resize(image, size.width, size.height, self.filter)
        };

        for (x, y, pixel) in resized.enumerate_pixels() {
            let offset = y as usize * w + x as usize;
            data[offset] = f32::from(pixel[0]);
            data[plane_len + offset] = f32::from(pixel[1]);
            data[2 * plane_len + offset] = f32::from(pixel[2]);
        }

        Ok(())
    }
}

/// Convert a decoded plane into a packed RGB image
pub fn plane_to_rgb(plane: &ImagePlane) -> Result<RgbImage, ResizeError> {
    if !plane.is_usable() {
        return Err(ResizeError::InvalidPlane(format!(
            "empty plane {}x{}",
            plane.width, plane.height
        )));
    }

    let min_stride = plane.min_stride();
    if plane.stride < min_stride {
        return Err(ResizeError::InvalidPlane(format!(
            "stride {} below row size {min_stride}",
            plane.stride
        )));
    }
    if plane.data.len() < plane.required_len() {
        return Err(ResizeError::InvalidPlane(format!(
            "{:?} {}x{} needs {} bytes, got {}",
            plane.format,
            plane.width,
            plane.height,
            plane.required_len(),
            plane.data.len()
        )));
    }

    let (width, height) = (plane.width, plane.height);
    let stride = plane.stride;
    let data = &plane.data;

    let image = match plane.format {
        PixelFormat::Rgb24 => RgbImage::from_fn(width, height, |x, y| {
            let i = y as usize * stride + x as usize * 3;
            image::Rgb([data[i], data[i + 1], data[i + 2]])
        }),
        PixelFormat::Bgr24 => RgbImage::from_fn(width, height, |x, y| {
            let i = y as usize * stride + x as usize * 3;
            image::Rgb([data[i + 2], data[i + 1], data[i]])
        }),
        PixelFormat::Gray8 => RgbImage::from_fn(width, height, |x, y| {
            let v = data[y as usize * stride + x as usize];
            image::Rgb([v, v, v])
        }),
        PixelFormat::Nv12 => {
            let uv_base = stride * height as usize;
            RgbImage::from_fn(width, height, |x, y| {
                let luma = data[y as usize * stride + x as usize];
                let uv = uv_base + (y as usize / 2) * stride + (x as usize & !1);
                yuv_to_rgb(luma, data[uv], data[uv + 1])
            })
        }
    };

    Ok(image)
}

/// BT.601 limited-range conversion
#[inline]
fn yuv_to_rgb(y: u8, u: u8, v: u8) -> image::Rgb<u8> {
    let c = (f32::from(y) - 16.0) * 1.164;
    let d = f32::from(u) - 128.0;
    let e = f32::from(v) - 128.0;

    let r = c + 1.596 * e;
    let g = c - 0.392 * d - 0.813 * e;
    let b = c + 2.017 * d;

    image::Rgb([clamp_u8(r), clamp_u8(g), clamp_u8(b)])
}

#[inline]
fn clamp_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
