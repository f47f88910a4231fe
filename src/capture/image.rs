//! Captured photo type shown on the capture screen

use image::RgbaImage;

/// A captured still with both raw RGBA data and a display handle
#[derive(Clone, Debug)]
pub struct CapturedImage {
    pub rgba: RgbaImage,
    pub handle: cosmic::widget::image::Handle,
}

impl CapturedImage {
    /// Downscale a full camera frame so its longest side is at most
    /// `max_dimension`, the way a camera app hands back a thumbnail
    pub fn thumbnail(frame: RgbaImage, max_dimension: u32) -> Self {
        let (width, height) = thumbnail_size(frame.width(), frame.height(), max_dimension);
        let rgba = if (width, height) == frame.dimensions() {
            frame
        } else {
            log::debug!(
                "Downscaling {}x{} frame to {}x{} thumbnail",
                frame.width(),
                frame.height(),
                width,
                height
            );
            image::imageops::resize(&frame, width, height, image::imageops::FilterType::Triangle)
        };
        Self::new(rgba)
    }

    pub fn new(rgba: RgbaImage) -> Self {
        let handle = cosmic::widget::image::Handle::from_rgba(
            rgba.width(),
            rgba.height(),
            rgba.clone().into_vec(),
        );
        Self { rgba, handle }
    }

    pub fn width(&self) -> u32 {
        self.rgba.width()
    }

    pub fn height(&self) -> u32 {
        self.rgba.height()
    }
}

/// Aspect-preserving size that fits inside `max_dimension` on both sides
pub fn thumbnail_size(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max_dimension || longest == 0 {
        return (width, height);
    }
    let scale = max_dimension as f64 / longest as f64;
    let scaled = |side: u32| ((side as f64 * scale).round() as u32).max(1);
    (scaled(width), scaled(height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thumbnail_size_keeps_aspect() {
        assert_eq!(thumbnail_size(1920, 1080, 640), (640, 360));
        assert_eq!(thumbnail_size(1080, 1920, 640), (360, 640));
        assert_eq!(thumbnail_size(4000, 1, 640), (640, 1));
    }

    #[test]
    fn test_small_frames_are_untouched() {
        assert_eq!(thumbnail_size(320, 240, 640), (320, 240));
        assert_eq!(thumbnail_size(0, 0, 640), (0, 0));

        let captured = CapturedImage::thumbnail(RgbaImage::new(320, 240), 640);
        assert_eq!((captured.width(), captured.height()), (320, 240));
    }

    #[test]
    fn test_thumbnail_downscales_frame() {
        let captured = CapturedImage::thumbnail(RgbaImage::new(1280, 960), 160);
        assert_eq!((captured.width(), captured.height()), (160, 120));
    }
}
