//! Captured frame handling
//!
//! Wraps one decoded screen capture as an immutable raster. A frame is
//! produced once per cycle, owned by that cycle and never mutated; everything
//! downstream (classification, candidate extraction) is a pure function of it.

use image::{GrayImage, ImageBuffer, RgbaImage};

use crate::config::{ColorBand, FracRegion};

/// Frame construction errors
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame buffer of {actual} bytes does not match {width}x{height} RGBA")]
    InvalidData {
        width: u32,
        height: u32,
        actual: usize,
    },
}

/// One captured frame of the target application's rendered output
#[derive(Debug, Clone)]
pub struct Frame {
    rgba: RgbaImage,
}

impl Frame {
    /// Wrap a decoded image
    pub fn new(rgba: RgbaImage) -> Self {
        Self { rgba }
    }

    /// Build a frame from raw RGBA bytes
    pub fn from_raw(width: u32, height: u32, data: &[u8]) -> Result<Self, FrameError> {
        let expected = (width as usize) * (height as usize) * 4;
        if data.len() != expected {
            return Err(FrameError::InvalidData {
                width,
                height,
                actual: data.len(),
            });
        }

        let rgba: RgbaImage = ImageBuffer::from_raw(width, height, data.to_vec()).ok_or(
            FrameError::InvalidData {
                width,
                height,
                actual: data.len(),
            },
        )?;

        Ok(Self { rgba })
    }

    pub fn width(&self) -> u32 {
        self.rgba.width()
    }

    pub fn height(&self) -> u32 {
        self.rgba.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.rgba.dimensions()
    }

    /// A zero-area frame carries no usable signal
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Geometric center in pixel coordinates
    pub fn center(&self) -> (u32, u32) {
        (self.width() / 2, self.height() / 2)
    }

    pub fn image(&self) -> &RgbaImage {
        &self.rgba
    }

    /// Grayscale view for edge detection and template matching
    pub fn to_luma(&self) -> GrayImage {
        image::imageops::grayscale(&self.rgba)
    }

    /// Binary mask of the pixels falling inside a color band (255 in-band,
    /// 0 outside)
    pub fn band_mask(&self, band: &ColorBand) -> GrayImage {
        let mut mask = GrayImage::new(self.width(), self.height());
        for (x, y, pixel) in self.rgba.enumerate_pixels() {
            let (h, s, v) = rgb_to_hsv(pixel[0], pixel[1], pixel[2]);
            if band.contains(h, s, v) {
                mask.put_pixel(x, y, image::Luma([255]));
            }
        }
        mask
    }

    /// Count the pixels inside a color band, optionally restricted to a
    /// fractional sub-region of the frame
    pub fn count_in_band(&self, band: &ColorBand, region: Option<&FracRegion>) -> u64 {
        let (x0, y0, x1, y1) = match region {
            Some(r) => r.resolve(self.width(), self.height()),
            None => (0, 0, self.width(), self.height()),
        };

        let mut count = 0u64;
        for y in y0..y1 {
            for x in x0..x1 {
                let pixel = self.rgba.get_pixel(x, y);
                let (h, s, v) = rgb_to_hsv(pixel[0], pixel[1], pixel[2]);
                if band.contains(h, s, v) {
                    count += 1;
                }
            }
        }
        count
    }
}

/// Convert an RGB triple to HSV, OpenCV convention: H in [0,180),
/// S and V in [0,255]
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = (max - min) as f32;

    let v = max;
    let s = if max == 0 {
        0
    } else {
        (255.0 * delta / max as f32).round() as u8
    };

    if delta == 0.0 {
        return (0, s, v);
    }

    let degrees = if max == r {
        60.0 * (((g as f32 - b as f32) / delta).rem_euclid(6.0))
    } else if max == g {
        60.0 * ((b as f32 - r as f32) / delta + 2.0)
    } else {
        60.0 * ((r as f32 - g as f32) / delta + 4.0)
    };

    let h = ((degrees / 2.0).round() as u16 % 180) as u8;
    (h, s, v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_from_raw_valid() {
        let data = vec![255u8; 10 * 10 * 4];
        let frame = Frame::from_raw(10, 10, &data).unwrap();
        assert_eq!(frame.dimensions(), (10, 10));
        assert!(!frame.is_empty());
    }

    #[test]
    fn test_from_raw_invalid_size() {
        let data = vec![255u8; 100];
        let result = Frame::from_raw(10, 10, &data);
        assert!(result.is_err());
    }

    #[test]
    fn test_hsv_primaries() {
        assert_eq!(rgb_to_hsv(255, 0, 0), (0, 255, 255));
        assert_eq!(rgb_to_hsv(0, 255, 0), (60, 255, 255));
        assert_eq!(rgb_to_hsv(0, 0, 255), (120, 255, 255));
    }

    #[test]
    fn test_hsv_gray_has_no_saturation() {
        let (h, s, v) = rgb_to_hsv(128, 128, 128);
        assert_eq!(h, 0);
        assert_eq!(s, 0);
        assert_eq!(v, 128);
    }

    #[test]
    fn test_band_mask_and_count() {
        let band = ColorBand::new("yellow", (20, 30), (100, 255), (100, 255));
        let mut img: RgbaImage = ImageBuffer::from_pixel(20, 20, Rgba([10, 10, 10, 255]));
        for y in 5..10 {
            for x in 5..15 {
                img.put_pixel(x, y, Rgba([220, 180, 30, 255]));
            }
        }
        let frame = Frame::new(img);

        assert_eq!(frame.count_in_band(&band, None), 50);

        let mask = frame.band_mask(&band);
        assert_eq!(mask.get_pixel(6, 6)[0], 255);
        assert_eq!(mask.get_pixel(0, 0)[0], 0);
    }

    #[test]
    fn test_count_in_band_region_restriction() {
        let band = ColorBand::new("yellow", (20, 30), (100, 255), (100, 255));
        // In-band pixels only in the top-left corner
        let mut img: RgbaImage = ImageBuffer::from_pixel(30, 30, Rgba([10, 10, 10, 255]));
        for y in 0..5 {
            for x in 0..5 {
                img.put_pixel(x, y, Rgba([220, 180, 30, 255]));
            }
        }
        let frame = Frame::new(img);

        assert_eq!(frame.count_in_band(&band, None), 25);
        let center = FracRegion::center_third();
        assert_eq!(frame.count_in_band(&band, Some(&center)), 0);
    }

    #[test]
    fn test_center() {
        let frame = Frame::new(ImageBuffer::from_pixel(100, 60, Rgba([0, 0, 0, 255])));
        assert_eq!(frame.center(), (50, 30));
    }
}
