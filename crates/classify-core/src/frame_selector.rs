//! Plane selection for multi-resolution frames

use npu_classify_common::ImagePlane;
use serde::{Deserialize, Serialize};

/// Ceilings applied when a frame carries more than one usable plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaneLimits {
    /// Exclusive width ceiling for multi-plane frames
    pub multi_plane_max_width: u32,
    /// Exclusive height ceiling for multi-plane frames
    pub multi_plane_max_height: u32,
    /// Inclusive ceiling on either dimension
    pub max_dimension: u32,
}

impl Default for PlaneLimits {
    fn default() -> Self {
        Self {
            multi_plane_max_width: 3840,
            multi_plane_max_height: 2160,
            max_dimension: 4096,
        }
    }
}

impl PlaneLimits {
    /// Whether a plane may be picked out of a multi-plane frame
    #[must_use]
    pub fn admits(&self, plane: &ImagePlane) -> bool {
        plane.width < self.multi_plane_max_width
            && plane.height < self.multi_plane_max_height
            && plane.width <= self.max_dimension
            && plane.height <= self.max_dimension
    }
}

/// Pick the plane to classify
///
/// A lone usable plane is taken as is. Otherwise the first usable plane the
/// limits admit wins, in delivery order. `None` means the frame is skipped.
#[must_use]
pub fn select_plane<'a>(planes: &'a [ImagePlane], limits: &PlaneLimits) -> Option<&'a ImagePlane> {
    let mut usable = planes.iter().filter(|p| p.is_usable());

    let first = usable.next()?;
    if usable.next().is_none() {
        return Some(first);
    }

    planes
        .iter()
        .filter(|p| p.is_usable())
        .find(|p| limits.admits(p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use npu_classify_common::PixelFormat;

    fn planes(dims: &[(u32, u32)]) -> Vec<ImagePlane> {
        dims.iter()
            .map(|&(w, h)| ImagePlane::empty(w, h, PixelFormat::Rgb24))
            .collect()
    }

    fn selected(dims: &[(u32, u32)]) -> Option<(u32, u32)> {
        let planes = planes(dims);
        select_plane(&planes, &PlaneLimits::default()).map(|p| (p.width, p.height))
    }

    #[test]
    fn test_first_admitted_plane_wins() {
        assert_eq!(
            selected(&[(1920, 1080), (3840, 2160), (4096, 4096)]),
            Some((1920, 1080))
        );
    }

    #[test]
    fn test_large_planes_are_skipped() {
        assert_eq!(
            selected(&[(3840, 2160), (1280, 720), (640, 360)]),
            Some((1280, 720))
        );
    }

    #[test]
    fn test_single_plane_is_unconditional() {
        assert_eq!(selected(&[(4097, 4097)]), Some((4097, 4097)));
    }

    #[test]
    fn test_single_usable_among_empty_planes() {
        assert_eq!(selected(&[(0, 0), (5000, 5000), (0, 720)]), Some((5000, 5000)));
    }

    #[test]
    fn test_no_admitted_plane_skips() {
        assert_eq!(selected(&[(3840, 2160), (4096, 4096)]), None);
    }

    #[test]
    fn test_empty_frame_skips() {
        assert_eq!(selected(&[]), None);
        assert_eq!(selected(&[(0, 0), (0, 0)]), None);
    }

    #[test]
    fn test_ceiling_edges() {
        let limits = PlaneLimits::default();
        assert!(limits.admits(&ImagePlane::empty(3839, 2159, PixelFormat::Rgb24)));
        assert!(!limits.admits(&ImagePlane::empty(3840, 2159, PixelFormat::Rgb24)));
        assert!(!limits.admits(&ImagePlane::empty(3839, 2160, PixelFormat::Rgb24)));

        let tight = PlaneLimits {
            multi_plane_max_width: 8000,
            multi_plane_max_height: 8000,
            max_dimension: 4096,
        };
        assert!(tight.admits(&ImagePlane::empty(4096, 4096, PixelFormat::Rgb24)));
        assert!(!tight.admits(&ImagePlane::empty(4097, 100, PixelFormat::Rgb24)));
    }
}
