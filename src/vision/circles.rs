//! Circular shape detection
//!
//! A bounded Hough-style voting transform over Canny edges. Each edge pixel
//! votes for candidate centers at every swept radius; vote maxima above a
//! threshold become circles, deduplicated by center distance. Used by the
//! classifier as a coarse "how many round platforms/buttons are on screen"
//! signal, not as a precise geometry extractor.

use image::GrayImage;
use imageproc::edges::canny;

use crate::config::CircleSettings;

/// One detected circular shape
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectedCircle {
    pub center: (u32, u32),
    pub radius: u32,
    pub votes: u32,
}

/// Circle detector over grayscale frames
#[derive(Debug, Clone)]
pub struct CircleDetector {
    settings: CircleSettings,
}

impl CircleDetector {
    pub fn new(settings: CircleSettings) -> Self {
        Self { settings }
    }

    /// Count circular shapes in a grayscale frame
    pub fn count(&self, gray: &GrayImage) -> u32 {
        self.detect(gray).len() as u32
    }

    /// Detect circular shapes, strongest vote first
    pub fn detect(&self, gray: &GrayImage) -> Vec<DetectedCircle> {
        let s = &self.settings;
        if !s.enabled || gray.width() == 0 || gray.height() == 0 {
            return Vec::new();
        }

        let edges = canny(gray, s.canny_low, s.canny_high);
        let edge_points: Vec<(u32, u32)> = edges
            .enumerate_pixels()
            .filter(|(_, _, p)| p[0] > 0)
            .map(|(x, y, _)| (x, y))
            .collect();
        if edge_points.is_empty() {
            return Vec::new();
        }

        let (width, height) = (gray.width() as i64, gray.height() as i64);
        let angles: Vec<(f32, f32)> = (0..s.angle_samples)
            .map(|i| {
                let theta = (i as f32) * std::f32::consts::TAU / (s.angle_samples as f32);
                (theta.cos(), theta.sin())
            })
            .collect();

        let mut accumulator = vec![0u16; (width * height) as usize];
        let mut peaks: Vec<DetectedCircle> = Vec::new();

        let mut radius = s.min_radius.max(1);
        while radius <= s.max_radius {
            accumulator.fill(0);
            let r = radius as f32;

            for &(ex, ey) in &edge_points {
                for &(cos_t, sin_t) in &angles {
                    let cx = (ex as f32 - r * cos_t).round() as i64;
                    let cy = (ey as f32 - r * sin_t).round() as i64;
                    if cx >= 0 && cx < width && cy >= 0 && cy < height {
                        let cell = &mut accumulator[(cy * width + cx) as usize];
                        *cell = cell.saturating_add(1);
                    }
                }
            }

            for (i, &votes) in accumulator.iter().enumerate() {
                if votes as u32 >= s.vote_threshold {
                    peaks.push(DetectedCircle {
                        center: ((i as i64 % width) as u32, (i as i64 / width) as u32),
                        radius,
                        votes: votes as u32,
                    });
                }
            }

            radius += s.radius_step.max(1);
        }

        suppress_nearby(peaks, s.min_center_distance)
    }
}

/// Keep only the strongest peak among those with nearby centers
fn suppress_nearby(mut peaks: Vec<DetectedCircle>, min_distance: f32) -> Vec<DetectedCircle> {
    peaks.sort_by(|a, b| b.votes.cmp(&a.votes));

    let mut kept: Vec<DetectedCircle> = Vec::new();
    for peak in peaks {
        let close = kept.iter().any(|k| {
            let dx = k.center.0 as f32 - peak.center.0 as f32;
            let dy = k.center.1 as f32 - peak.center.1 as f32;
            (dx * dx + dy * dy).sqrt() < min_distance
        });
        if !close {
            kept.push(peak);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use imageproc::drawing::draw_hollow_circle_mut;

    fn test_settings() -> CircleSettings {
        CircleSettings {
            enabled: true,
            canny_low: 50.0,
            canny_high: 100.0,
            min_radius: 28,
            max_radius: 32,
            radius_step: 2,
            angle_samples: 64,
            vote_threshold: 15,
            min_center_distance: 40.0,
        }
    }

    #[test]
    fn test_detects_drawn_circle() {
        let mut gray = GrayImage::new(200, 200);
        for r in 29..=31 {
            draw_hollow_circle_mut(&mut gray, (100, 100), r, Luma([255]));
        }

        let detector = CircleDetector::new(test_settings());
        let circles = detector.detect(&gray);
        assert_eq!(circles.len(), 1);

        let c = circles[0];
        assert!((c.center.0 as i32 - 100).abs() <= 5);
        assert!((c.center.1 as i32 - 100).abs() <= 5);
    }

    #[test]
    fn test_blank_frame_has_no_circles() {
        let gray = GrayImage::from_pixel(200, 200, Luma([90]));
        let detector = CircleDetector::new(test_settings());
        assert_eq!(detector.count(&gray), 0);
    }

    #[test]
    fn test_disabled_detector_returns_nothing() {
        let mut settings = test_settings();
        settings.enabled = false;

        let mut gray = GrayImage::new(200, 200);
        draw_hollow_circle_mut(&mut gray, (100, 100), 30, Luma([255]));

        let detector = CircleDetector::new(settings);
        assert_eq!(detector.count(&gray), 0);
    }
}
