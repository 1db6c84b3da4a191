//! Screen state classification
//!
//! Maps a frame to a coarse screen state by measuring color mass in tuned HSV
//! bands plus a circular-shape count, then walking an ordered rule table.
//! First matching rule wins; the tie-break is rule order, not score. The raw
//! feature counts are part of the result so behavior can be asserted without
//! re-deriving thresholds from images.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::circles::CircleDetector;
use super::frame::Frame;
use crate::config::{ClassifierSettings, FeatureProbe, StateRule};

/// Coarse classification of what the target application is showing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScreenState {
    /// Loading or splash screen; input has no effect
    Loading,
    /// Main lobby, the navigation target
    Lobby,
    /// No rule matched
    Unknown,
}

/// How strongly the matched rule is trusted
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// Raw feature measurements behind a classification
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureReport {
    /// Pixel count per probe name
    pub band_pixels: BTreeMap<String, u64>,
    /// Number of detected circular shapes
    pub circles: u32,
}

impl FeatureReport {
    /// Count for a probe name; missing probes count as zero
    pub fn count(&self, name: &str) -> u64 {
        self.band_pixels.get(name).copied().unwrap_or(0)
    }
}

/// Result of classifying one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub state: ScreenState,
    pub confidence: Confidence,
    pub report: FeatureReport,
}

impl Classification {
    fn unknown(report: FeatureReport) -> Self {
        Self {
            state: ScreenState::Unknown,
            confidence: Confidence::Low,
            report,
        }
    }
}

/// Rule-table screen state classifier
#[derive(Debug, Clone)]
pub struct ScreenClassifier {
    probes: Vec<FeatureProbe>,
    rules: Vec<StateRule>,
    circles: CircleDetector,
}

impl ScreenClassifier {
    pub fn new(settings: &ClassifierSettings) -> Self {
        Self {
            probes: settings.probes.clone(),
            rules: settings.rules.clone(),
            circles: CircleDetector::new(settings.circles.clone()),
        }
    }

    /// Classify a frame. Never fails: a degenerate frame classifies as
    /// `Unknown` with low confidence.
    pub fn classify(&self, frame: &Frame) -> Classification {
        if frame.is_empty() {
            return Classification::unknown(FeatureReport::default());
        }

        let report = self.measure(frame);

        for rule in &self.rules {
            if rule.matches(&report) {
                log::debug!(
                    "screen classified as {:?} ({:?}): {:?}",
                    rule.state,
                    rule.confidence,
                    report.band_pixels
                );
                return Classification {
                    state: rule.state,
                    confidence: rule.confidence,
                    report,
                };
            }
        }

        log::debug!("no classification rule matched: {:?}", report.band_pixels);
        Classification::unknown(report)
    }

    /// Compute the feature report for a frame
    pub fn measure(&self, frame: &Frame) -> FeatureReport {
        let mut band_pixels = BTreeMap::new();
        for probe in &self.probes {
            let count = frame.count_in_band(&probe.band, probe.region.as_ref());
            band_pixels.insert(probe.name.clone(), count);
        }

        let circles = self.circles.count(&frame.to_luma());

        FeatureReport {
            band_pixels,
            circles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClassifierSettings;
    use image::{ImageBuffer, Rgba, RgbaImage};

    fn classifier() -> ScreenClassifier {
        ScreenClassifier::new(&ClassifierSettings::default())
    }

    fn fill_rect(img: &mut RgbaImage, x0: u32, y0: u32, w: u32, h: u32, color: Rgba<u8>) {
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                img.put_pixel(x, y, color);
            }
        }
    }

    /// Purple background with a yellow progress strip
    fn loading_frame() -> Frame {
        // Purple: H=135, S=204, V=200
        let mut img: RgbaImage = ImageBuffer::from_pixel(400, 300, Rgba([120, 40, 200, 255]));
        // Yellow strip: H=24, S=220, V=220
        fill_rect(&mut img, 50, 250, 300, 30, Rgba([220, 180, 30, 255]));
        Frame::new(img)
    }

    /// Dark background with a large brown panel covering the center
    fn lobby_frame() -> Frame {
        let mut img: RgbaImage = ImageBuffer::from_pixel(400, 300, Rgba([10, 10, 10, 255]));
        // Brown: H=14, S=187, V=150
        fill_rect(&mut img, 100, 75, 200, 150, Rgba([150, 90, 40, 255]));
        Frame::new(img)
    }

    fn gray_frame() -> Frame {
        Frame::new(ImageBuffer::from_pixel(400, 300, Rgba([90, 90, 90, 255])))
    }

    #[test]
    fn test_loading_detection() {
        let result = classifier().classify(&loading_frame());
        assert_eq!(result.state, ScreenState::Loading);
        assert_eq!(result.confidence, Confidence::High);
        assert!(result.report.count("purple") > 50_000);
        assert!(result.report.count("yellow") > 5_000);
    }

    #[test]
    fn test_lobby_detection() {
        let result = classifier().classify(&lobby_frame());
        assert_eq!(result.state, ScreenState::Lobby);
        assert_eq!(result.confidence, Confidence::High);
        assert!(result.report.count("brown_center") > 5_000);
    }

    #[test]
    fn test_zero_signal_frame_is_unknown_low() {
        let result = classifier().classify(&gray_frame());
        assert_eq!(result.state, ScreenState::Unknown);
        assert_eq!(result.confidence, Confidence::Low);
        assert_eq!(result.report.count("brown"), 0);
        assert_eq!(result.report.count("purple"), 0);
        assert_eq!(result.report.circles, 0);
    }

    #[test]
    fn test_degenerate_frame_is_unknown_low() {
        let frame = Frame::new(RgbaImage::new(0, 0));
        let result = classifier().classify(&frame);
        assert_eq!(result.state, ScreenState::Unknown);
        assert_eq!(result.confidence, Confidence::Low);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let c = classifier();
        let first = c.classify(&loading_frame());
        let second = c.classify(&loading_frame());
        assert_eq!(first, second);
    }

    #[test]
    fn test_rule_order_breaks_ties() {
        // A frame satisfying both a lobby rule and the medium loading rule:
        // brown mass plus a purple background. The lobby rule sits higher in
        // the table, so it must win.
        let mut img: RgbaImage = ImageBuffer::from_pixel(400, 300, Rgba([120, 40, 200, 255]));
        fill_rect(&mut img, 100, 75, 200, 150, Rgba([150, 90, 40, 255]));
        let result = classifier().classify(&Frame::new(img));

        assert!(result.report.count("purple") > 30_000);
        assert!(result.report.count("brown") > 15_000);
        assert_eq!(result.state, ScreenState::Lobby);
    }

    #[test]
    fn test_confidence_ordering() {
        assert!(Confidence::Low < Confidence::Medium);
        assert!(Confidence::Medium < Confidence::High);
    }
}
