/// Common types shared by the classification core and its backends
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification errors
///
/// Lifecycle commands report these to the command caller; pipeline stages
/// report them per network and keep the dispatch loop alive.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClassifyError {
    #[error("Unknown network: {0}")]
    UnknownNetwork(String),

    #[error("Network already exists: {0}")]
    AlreadyExists(String),

    #[error("Failed to create network {model}: {reason}")]
    NetworkCreationFailed { model: String, reason: String },

    #[error("Network already loaded (unload it first): {0}")]
    AlreadyLoaded(String),

    #[error("Network {0} has no input or no output tensors bound")]
    Unbound(String),

    #[error("Failed to create {kind} tensor {name}: {reason}")]
    TensorCreationFailed {
        kind: TensorKind,
        name: String,
        reason: String,
    },

    #[error("Tensor not found: {0}")]
    TensorNotFound(String),

    #[error("Failed to load network {model}: {reason}")]
    LoadFailed { model: String, reason: String },

    #[error("Resize failed: {0}")]
    ResizeFailed(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Unsupported command: {0}")]
    UnsupportedCommand(String),

    #[error("Invalid classification: {0}")]
    InvalidClassification(String),
}

impl From<serde_json::Error> for ClassifyError {
    fn from(err: serde_json::Error) -> Self {
        ClassifyError::ParseError(err.to_string())
    }
}

/// Result type for classification operations
pub type Result<T> = std::result::Result<T, ClassifyError>;

/// Which side of a network a tensor is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TensorKind {
    Input,
    Output,
}

impl TensorKind {
    /// Name of the command document field carrying tensor names of this kind
    #[must_use]
    pub fn field_name(self) -> &'static str {
        match self {
            TensorKind::Input => "input_tensor",
            TensorKind::Output => "output_tensor",
        }
    }
}

impl std::fmt::Display for TensorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TensorKind::Input => write!(f, "input"),
            TensorKind::Output => write!(f, "output"),
        }
    }
}

/// Pixel layout of a decoded image plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    /// Packed 8-bit RGB
    Rgb24,
    /// Packed 8-bit BGR
    Bgr24,
    /// 8-bit luma only
    Gray8,
    /// Y plane followed by interleaved UV at half resolution
    Nv12,
}

impl PixelFormat {
    /// Bytes per pixel of the first (or only) plane
    #[must_use]
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb24 | PixelFormat::Bgr24 => 3,
            PixelFormat::Gray8 | PixelFormat::Nv12 => 1,
        }
    }
}

/// One resolution variant of a decoded video frame
#[derive(Debug, Clone)]
pub struct ImagePlane {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Bytes per row of the first plane
    pub stride: usize,
    /// Pixel layout
    pub format: PixelFormat,
    /// Raw pixel data (row-major)
    pub data: Vec<u8>,
}

impl ImagePlane {
    /// Create a tightly packed plane
    #[must_use]
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            stride: Self::packed_stride(width, format),
            format,
            data,
        }
    }

    /// Descriptor without pixel data, used for geometry-only frames
    #[must_use]
    pub fn empty(width: u32, height: u32, format: PixelFormat) -> Self {
        Self::new(width, height, format, Vec::new())
    }

    /// Smallest valid row size for this geometry
    ///
    /// NV12 rows hold whole UV pairs, so an odd width is padded to the next
    /// even byte count.
    #[must_use]
    pub fn min_stride(&self) -> usize {
        Self::packed_stride(self.width, self.format)
    }

    fn packed_stride(width: u32, format: PixelFormat) -> usize {
        match format {
            PixelFormat::Nv12 => width.div_ceil(2) as usize * 2,
            _ => width as usize * format.bytes_per_pixel(),
        }
    }

    /// A plane takes part in selection only when both dimensions are non-zero
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.width != 0 && self.height != 0
    }

    /// Number of bytes the pixel data must hold for this geometry
    #[must_use]
    pub fn required_len(&self) -> usize {
        let rows = self.height as usize;
        match self.format {
            PixelFormat::Nv12 => self.stride * (rows + rows.div_ceil(2)),
            _ => self.stride * rows,
        }
    }
}

type ReleaseHook = Box<dyn FnOnce() + Send>;

/// A decoded frame handed over by the frame-delivery collaborator
///
/// Planes are ordered as delivered. The release hook runs exactly once,
/// either through [`RawFrame::release`] or when the frame is dropped.
pub struct RawFrame {
    pts_ms: u64,
    planes: Vec<ImagePlane>,
    release: Option<ReleaseHook>,
}

impl RawFrame {
    /// Create a frame with a presentation timestamp in milliseconds since the epoch
    #[must_use]
    pub fn new(pts_ms: u64, planes: Vec<ImagePlane>) -> Self {
        Self {
            pts_ms,
            planes,
            release: None,
        }
    }

    /// Attach the hook that frees the frame's backing resource
    #[must_use]
    pub fn with_release<F>(mut self, hook: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.release = Some(Box::new(hook));
        self
    }

    #[must_use]
    pub fn pts_ms(&self) -> u64 {
        self.pts_ms
    }

    #[must_use]
    pub fn planes(&self) -> &[ImagePlane] {
        &self.planes
    }

    /// Free the backing resource now
    pub fn release(mut self) {
        self.run_release();
    }

    fn run_release(&mut self) {
        if let Some(hook) = self.release.take() {
            hook();
        }
    }
}

impl Drop for RawFrame {
    fn drop(&mut self) {
        self.run_release();
    }
}

impl std::fmt::Debug for RawFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawFrame")
            .field("pts_ms", &self.pts_ms)
            .field("planes", &self.planes.len())
            .field("has_release", &self.release.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_plane_usable() {
        assert!(ImagePlane::empty(1920, 1080, PixelFormat::Rgb24).is_usable());
        assert!(!ImagePlane::empty(0, 1080, PixelFormat::Rgb24).is_usable());
        assert!(!ImagePlane::empty(1920, 0, PixelFormat::Rgb24).is_usable());
    }

    #[test]
    fn test_required_len() {
        let rgb = ImagePlane::empty(4, 2, PixelFormat::Rgb24);
        assert_eq!(rgb.stride, 12);
        assert_eq!(rgb.required_len(), 24);

        let nv12 = ImagePlane::empty(4, 3, PixelFormat::Nv12);
        assert_eq!(nv12.required_len(), 4 * (3 + 2));

        let odd = ImagePlane::empty(5, 2, PixelFormat::Nv12);
        assert_eq!(odd.stride, 6);
        assert_eq!(odd.min_stride(), 6);
        assert_eq!(odd.required_len(), 6 * 3);
    }

    #[test]
    fn test_release_runs_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let hook_count = Arc::clone(&count);
        let frame = RawFrame::new(0, vec![]).with_release(move || {
            hook_count.fetch_add(1, Ordering::SeqCst);
        });

        frame.release();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_release_on_drop() {
        let count = Arc::new(AtomicUsize::new(0));
        let hook_count = Arc::clone(&count);
        {
            let _frame = RawFrame::new(0, vec![]).with_release(move || {
                hook_count.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_tensor_kind_display() {
        assert_eq!(TensorKind::Input.to_string(), "input");
        assert_eq!(TensorKind::Output.field_name(), "output_tensor");
    }
}
