// SPDX-License-Identifier: GPL-3.0-only

//! Region-of-interest mapping from the viewfinder overlay to video pixels

use super::types::VideoSize;
use crate::constants::capture::ROI_MIN_SIZE;
use std::sync::{Arc, RwLock};

/// A rectangle in screen (layout) units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ScreenRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    fn has_area(&self) -> bool {
        [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite())
            && self.width > 0.0
            && self.height > 0.0
    }

    /// A rectangle of `fraction` of this one's size, centered in it
    pub fn centered_fraction(&self, fraction: f64) -> Self {
        let width = self.width * fraction;
        let height = self.height * fraction;
        Self {
            x: self.x + (self.width - width) / 2.0,
            y: self.y + (self.height - height) / 2.0,
            width,
            height,
        }
    }
}

/// Where the video and the viewfinder overlay are displayed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportLayout {
    /// Displayed video rectangle
    pub video: ScreenRect,
    /// Viewfinder overlay rectangle
    pub overlay: ScreenRect,
}

/// Crop rectangle in native video pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionOfInterest {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl RegionOfInterest {
    /// Whether the region lies within `[0, width) × [0, height)`
    pub fn fits(&self, video: VideoSize) -> bool {
        self.x < video.width
            && self.y < video.height
            && self.x + self.width <= video.width
            && self.y + self.height <= video.height
    }
}

/// Outcome of a region-of-interest computation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Roi {
    Ready(RegionOfInterest),
    /// Video or layout not available yet; use the full frame this tick
    NotReady,
}

/// Read access to the current UI layout
pub trait LayoutProbe: Send + Sync {
    fn layout(&self) -> Option<ViewportLayout>;
}

/// Layout slot written by the UI on every draw and read by the poll loop
#[derive(Debug, Clone, Default)]
pub struct SharedLayout(Arc<RwLock<Option<ViewportLayout>>>);

impl SharedLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, layout: ViewportLayout) {
        if let Ok(mut slot) = self.0.write() {
            *slot = Some(layout);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut slot) = self.0.write() {
            *slot = None;
        }
    }
}

impl LayoutProbe for SharedLayout {
    fn layout(&self) -> Option<ViewportLayout> {
        self.0.read().ok().and_then(|slot| *slot)
    }
}

/// A probe with no layout (headless capture scans the full frame)
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLayout;

impl LayoutProbe for NoLayout {
    fn layout(&self) -> Option<ViewportLayout> {
        None
    }
}

/// Map the overlay rectangle into native video pixels
///
/// The mapping uses the native/displayed ratio on each axis, clips to the
/// video, and grows the result to at least 16×16 (shifting it back inside
/// the video if needed).
pub fn compute_region_of_interest(
    video: Option<VideoSize>,
    layout: Option<&ViewportLayout>,
) -> Roi {
    match (video, layout) {
        (Some(video), Some(layout)) => map_overlay(video, layout, ROI_MIN_SIZE),
        _ => Roi::NotReady,
    }
}

fn map_overlay(video: VideoSize, layout: &ViewportLayout, min_size: u32) -> Roi {
    if video.width < min_size || video.height < min_size {
        return Roi::NotReady;
    }
    if !layout.video.has_area() || !layout.overlay.has_area() {
        return Roi::NotReady;
    }

    let video_w = video.width as f64;
    let video_h = video.height as f64;
    let scale_x = video_w / layout.video.width;
    let scale_y = video_h / layout.video.height;

    let raw_left = (layout.overlay.x - layout.video.x) * scale_x;
    let raw_top = (layout.overlay.y - layout.video.y) * scale_y;
    let raw_right = raw_left + layout.overlay.width * scale_x;
    let raw_bottom = raw_top + layout.overlay.height * scale_y;

    let left = raw_left.clamp(0.0, video_w);
    let top = raw_top.clamp(0.0, video_h);
    let right = raw_right.clamp(0.0, video_w);
    let bottom = raw_bottom.clamp(0.0, video_h);

    let width = ((right - left).round() as u32).clamp(min_size, video.width);
    let height = ((bottom - top).round() as u32).clamp(min_size, video.height);
    let x = (left.floor() as u32).min(video.width - width);
    let y = (top.floor() as u32).min(video.height - height);

    Roi::Ready(RegionOfInterest {
        x,
        y,
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn size(width: u32, height: u32) -> VideoSize {
        VideoSize { width, height }
    }

    fn layout(video: ScreenRect, overlay: ScreenRect) -> ViewportLayout {
        ViewportLayout { video, overlay }
    }

    #[test]
    fn test_scales_overlay_into_native_pixels() {
        let layout = layout(
            ScreenRect::new(0.0, 0.0, 320.0, 240.0),
            ScreenRect::new(50.0, 50.0, 100.0, 100.0),
        );
        let roi = compute_region_of_interest(Some(size(640, 480)), Some(&layout));
        assert_eq!(
            roi,
            Roi::Ready(RegionOfInterest {
                x: 100,
                y: 100,
                width: 200,
                height: 200
            })
        );
    }

    #[test]
    fn test_offset_video_rect_is_subtracted() {
        let layout = layout(
            ScreenRect::new(10.0, 20.0, 640.0, 480.0),
            ScreenRect::new(110.0, 120.0, 64.0, 48.0),
        );
        let roi = compute_region_of_interest(Some(size(640, 480)), Some(&layout));
        assert_eq!(
            roi,
            Roi::Ready(RegionOfInterest {
                x: 100,
                y: 100,
                width: 64,
                height: 48
            })
        );
    }

    #[test]
    fn test_overlay_overhanging_video_is_clamped() {
        let layout = layout(
            ScreenRect::new(0.0, 0.0, 100.0, 100.0),
            ScreenRect::new(-20.0, 80.0, 200.0, 200.0),
        );
        let Roi::Ready(roi) = compute_region_of_interest(Some(size(100, 100)), Some(&layout))
        else {
            panic!("expected a region");
        };
        assert!(roi.fits(size(100, 100)));
        assert_eq!((roi.x, roi.width), (0, 100));
        assert_eq!((roi.y, roi.height), (80, 20));
    }

    #[test]
    fn test_tiny_overlay_grows_to_minimum() {
        let layout = layout(
            ScreenRect::new(0.0, 0.0, 640.0, 480.0),
            ScreenRect::new(636.0, 476.0, 2.0, 2.0),
        );
        let Roi::Ready(roi) = compute_region_of_interest(Some(size(640, 480)), Some(&layout))
        else {
            panic!("expected a region");
        };
        assert_eq!((roi.width, roi.height), (16, 16));
        assert_eq!((roi.x, roi.y), (624, 464));
    }

    #[test]
    fn test_not_ready_without_video_or_layout() {
        let layout = layout(
            ScreenRect::new(0.0, 0.0, 320.0, 240.0),
            ScreenRect::new(0.0, 0.0, 100.0, 100.0),
        );
        assert_eq!(compute_region_of_interest(None, Some(&layout)), Roi::NotReady);
        assert_eq!(compute_region_of_interest(Some(size(640, 480)), None), Roi::NotReady);
        assert_eq!(
            compute_region_of_interest(Some(size(0, 0)), Some(&layout)),
            Roi::NotReady
        );
        assert_eq!(
            compute_region_of_interest(Some(size(8, 480)), Some(&layout)),
            Roi::NotReady
        );
    }

    #[test]
    fn test_not_ready_before_layout_settles() {
        let collapsed = layout(
            ScreenRect::new(0.0, 0.0, 0.0, 0.0),
            ScreenRect::new(0.0, 0.0, 100.0, 100.0),
        );
        assert_eq!(
            compute_region_of_interest(Some(size(640, 480)), Some(&collapsed)),
            Roi::NotReady
        );

        let nan = layout(
            ScreenRect::new(0.0, 0.0, 320.0, 240.0),
            ScreenRect::new(f64::NAN, 0.0, 100.0, 100.0),
        );
        assert_eq!(
            compute_region_of_interest(Some(size(640, 480)), Some(&nan)),
            Roi::NotReady
        );
    }

    #[test]
    fn test_result_always_within_video_bounds() {
        let videos = [size(16, 16), size(17, 300), size(640, 480), size(1920, 1080)];
        let offsets = [-500.0, -3.5, 0.0, 7.25, 250.0, 5000.0];
        let extents = [0.5, 15.0, 99.9, 320.0, 10_000.0];

        for video in videos {
            for &ox in &offsets {
                for &oy in &offsets {
                    for &extent in &extents {
                        let layout = layout(
                            ScreenRect::new(12.0, 8.0, 333.0, 222.0),
                            ScreenRect::new(ox, oy, extent, extent * 0.75),
                        );
                        match compute_region_of_interest(Some(video), Some(&layout)) {
                            Roi::Ready(roi) => {
                                assert!(roi.fits(video), "{:?} outside {:?}", roi, video);
                                assert!(roi.width >= 16 && roi.height >= 16);
                            }
                            Roi::NotReady => panic!("layout {:?} should be usable", layout),
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_shared_layout_round_trip() {
        let shared = SharedLayout::new();
        assert!(shared.layout().is_none());
        let value = layout(
            ScreenRect::new(0.0, 0.0, 10.0, 10.0),
            ScreenRect::new(0.0, 0.0, 10.0, 10.0).centered_fraction(0.5),
        );
        shared.set(value);
        assert_eq!(shared.layout(), Some(value));
        shared.clear();
        assert!(shared.layout().is_none());
    }
}
