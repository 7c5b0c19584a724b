//! Frame preparation before recognition
//!
//! Applies the rotation correction carried by the frame and optionally
//! upscales small captures so small text stays legible to the engines.

use image::{DynamicImage, RgbaImage};
use tracing::debug;

use crate::capture::{CapturedFrame, Rotation};

/// Convert a captured frame into an image, applying rotation correction
///
/// Returns `None` if the frame's buffer does not match its dimensions.
pub fn frame_to_image(frame: CapturedFrame) -> Option<DynamicImage> {
    let CapturedFrame {
        data,
        width,
        height,
        rotation,
        ..
    } = frame;

    let buffer = RgbaImage::from_raw(width, height, data)?;
    let img = DynamicImage::ImageRgba8(buffer);

    Some(match rotation {
        Rotation::None => img,
        Rotation::Cw90 => img.rotate90(),
        Rotation::Cw180 => img.rotate180(),
        Rotation::Cw270 => img.rotate270(),
    })
}

/// Upscale small captures for better recognition of small text
///
/// Engines work best with text at least 10-12 pixels tall; captures below
/// 100 pixels on their short side are scaled 4x, below 200 pixels 2x.
pub fn upscale_small(img: DynamicImage) -> DynamicImage {
    let min_dimension = img.width().min(img.height());
    let factor = if min_dimension < 100 {
        4
    } else if min_dimension < 200 {
        2
    } else {
        return img;
    };

    let new_width = img.width() * factor;
    let new_height = img.height() * factor;
    debug!(
        "Upscaling small capture {}x{} by {}x to {}x{}",
        img.width(),
        img.height(),
        factor,
        new_width,
        new_height
    );
    img.resize(new_width, new_height, image::imageops::FilterType::Lanczos3)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(width: u32, height: u32, rotation: Rotation) -> CapturedFrame {
        CapturedFrame::new(vec![0; (width * height * 4) as usize], width, height, rotation)
    }

    #[test]
    fn test_rotation_swaps_dimensions() {
        let img = frame_to_image(frame(2, 3, Rotation::Cw90)).unwrap();
        assert_eq!((img.width(), img.height()), (3, 2));

        let img = frame_to_image(frame(2, 3, Rotation::Cw180)).unwrap();
        assert_eq!((img.width(), img.height()), (2, 3));

        let img = frame_to_image(frame(2, 3, Rotation::Cw270)).unwrap();
        assert_eq!((img.width(), img.height()), (3, 2));
    }

    #[test]
    fn test_rejects_mismatched_buffer() {
        let bad = CapturedFrame::new(vec![0; 7], 2, 3, Rotation::None);
        assert!(frame_to_image(bad).is_none());
    }

    #[test]
    fn test_upscale_factors() {
        let img = frame_to_image(frame(50, 60, Rotation::None)).unwrap();
        let scaled = upscale_small(img);
        assert_eq!(scaled.width().min(scaled.height()), 200);

        let img = frame_to_image(frame(150, 300, Rotation::None)).unwrap();
        let scaled = upscale_small(img);
        assert_eq!(scaled.width(), 300);

        let img = frame_to_image(frame(640, 480, Rotation::None)).unwrap();
        let scaled = upscale_small(img);
        assert_eq!((scaled.width(), scaled.height()), (640, 480));
    }
}
