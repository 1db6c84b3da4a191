//! Pilot configuration
//!
//! Every tuned value lives here: color bands, classification rules, blob
//! filters, template thresholds, primary control regions and timings. The
//! defaults carry values calibrated against the target game; recalibrate per
//! target instead of editing the algorithm code.

use serde::{Deserialize, Serialize};

use crate::vision::classifier::{Confidence, FeatureReport, ScreenState};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PilotConfig {
    /// Screen state classification settings
    pub classifier: ClassifierSettings,
    /// Candidate location settings
    pub locator: LocatorSettings,
    /// Decision engine settings
    pub decision: DecisionSettings,
    /// Loop timing settings
    pub timings: TimingSettings,
    /// Actuator failure handling
    pub actuator: ActuatorSettings,
    /// Tap humanization settings
    pub humanize: HumanizeSettings,
}

impl PilotConfig {
    /// Preset that never taps blind: on a screen with no recognizable
    /// candidates the pilot waits for the next frame instead of tapping the
    /// screen center.
    pub fn conservative() -> Self {
        Self {
            decision: DecisionSettings {
                fallback: FallbackPolicy::Wait,
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

/// An inclusive HSV color band, OpenCV convention: H in [0,180), S and V in
/// [0,255]. A hue range with `hue.0 > hue.1` wraps around 180.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorBand {
    /// Tag attached to candidates segmented from this band
    pub tag: String,
    /// Inclusive hue range
    pub hue: (u8, u8),
    /// Inclusive saturation range
    pub sat: (u8, u8),
    /// Inclusive value range
    pub val: (u8, u8),
}

impl ColorBand {
    pub fn new(tag: &str, hue: (u8, u8), sat: (u8, u8), val: (u8, u8)) -> Self {
        Self {
            tag: tag.to_string(),
            hue,
            sat,
            val,
        }
    }

    /// Check whether an HSV triple falls inside the band
    pub fn contains(&self, h: u8, s: u8, v: u8) -> bool {
        let hue_ok = if self.hue.0 <= self.hue.1 {
            (self.hue.0..=self.hue.1).contains(&h)
        } else {
            // Wrapping range, e.g. reds straddling 180/0
            h >= self.hue.0 || h <= self.hue.1
        };
        hue_ok && (self.sat.0..=self.sat.1).contains(&s) && (self.val.0..=self.val.1).contains(&v)
    }
}

/// A sub-region expressed as fractions of the frame, half-open on both axes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FracRegion {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl FracRegion {
    /// The center third of the frame
    pub fn center_third() -> Self {
        Self {
            x0: 1.0 / 3.0,
            y0: 1.0 / 3.0,
            x1: 2.0 / 3.0,
            y1: 2.0 / 3.0,
        }
    }

    /// Resolve to pixel bounds `(x0, y0, x1, y1)` for a frame size
    pub fn resolve(&self, width: u32, height: u32) -> (u32, u32, u32, u32) {
        let w = width as f32;
        let h = height as f32;
        (
            (w * self.x0) as u32,
            (h * self.y0) as u32,
            ((w * self.x1) as u32).min(width),
            ((h * self.y1) as u32).min(height),
        )
    }
}

/// A named pixel-count measurement over one color band, optionally restricted
/// to a sub-region of the frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureProbe {
    /// Name the classification rules refer to
    pub name: String,
    /// Band to count pixels in
    pub band: ColorBand,
    /// Optional fractional sub-region; `None` means the whole frame
    pub region: Option<FracRegion>,
}

/// One row of the ordered classification table. Pixel minimums must be
/// strictly exceeded; the circle minimum is inclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRule {
    pub state: ScreenState,
    pub confidence: Confidence,
    /// `(probe name, count)` pairs; the probe's count must exceed the value
    pub min_pixels: Vec<(String, u64)>,
    /// Minimum number of detected circular shapes, if any
    pub min_circles: Option<u32>,
}

impl StateRule {
    /// Check the rule against a feature report
    pub fn matches(&self, report: &FeatureReport) -> bool {
        let pixels_ok = self
            .min_pixels
            .iter()
            .all(|(name, min)| report.count(name) > *min);
        let circles_ok = self.min_circles.is_none_or(|min| report.circles >= min);
        pixels_ok && circles_ok
    }
}

/// Circle-shape detection parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircleSettings {
    pub enabled: bool,
    pub canny_low: f32,
    pub canny_high: f32,
    pub min_radius: u32,
    pub max_radius: u32,
    pub radius_step: u32,
    /// Candidate-center samples per edge pixel and radius
    pub angle_samples: u32,
    /// Minimum accumulator votes for a center to count as a circle
    pub vote_threshold: u32,
    /// Centers closer than this collapse to the strongest one
    pub min_center_distance: f32,
}

impl Default for CircleSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            canny_low: 50.0,
            canny_high: 100.0,
            min_radius: 20,
            max_radius: 100,
            radius_step: 8,
            angle_samples: 64,
            vote_threshold: 20,
            min_center_distance: 50.0,
        }
    }
}

/// Screen state classification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierSettings {
    /// Feature probes, each producing one named count
    pub probes: Vec<FeatureProbe>,
    /// Ordered rule table; the first matching rule wins
    pub rules: Vec<StateRule>,
    /// Circle detection parameters
    pub circles: CircleSettings,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        let yellow = ColorBand::new("yellow", (20, 30), (100, 255), (100, 255));
        let purple = ColorBand::new("purple", (120, 150), (50, 255), (50, 255));
        let brown = ColorBand::new("brown", (10, 20), (100, 255), (50, 200));

        Self {
            probes: vec![
                FeatureProbe {
                    name: "yellow".to_string(),
                    band: yellow,
                    region: None,
                },
                FeatureProbe {
                    name: "purple".to_string(),
                    band: purple,
                    region: None,
                },
                FeatureProbe {
                    name: "brown".to_string(),
                    band: brown.clone(),
                    region: None,
                },
                FeatureProbe {
                    name: "brown_center".to_string(),
                    band: brown,
                    region: Some(FracRegion::center_third()),
                },
            ],
            rules: vec![
                StateRule {
                    state: ScreenState::Lobby,
                    confidence: Confidence::High,
                    min_pixels: vec![
                        ("brown_center".to_string(), 5_000),
                        ("brown".to_string(), 15_000),
                    ],
                    min_circles: None,
                },
                StateRule {
                    state: ScreenState::Loading,
                    confidence: Confidence::High,
                    min_pixels: vec![
                        ("yellow".to_string(), 5_000),
                        ("purple".to_string(), 50_000),
                    ],
                    min_circles: None,
                },
                StateRule {
                    state: ScreenState::Lobby,
                    confidence: Confidence::High,
                    min_pixels: vec![("brown".to_string(), 20_000)],
                    min_circles: Some(3),
                },
                StateRule {
                    state: ScreenState::Lobby,
                    confidence: Confidence::Medium,
                    min_pixels: vec![("brown".to_string(), 10_000)],
                    min_circles: None,
                },
                StateRule {
                    state: ScreenState::Loading,
                    confidence: Confidence::Medium,
                    min_pixels: vec![("purple".to_string(), 30_000)],
                    min_circles: None,
                },
            ],
            circles: CircleSettings::default(),
        }
    }
}

/// Area and aspect-ratio acceptance window for blob candidates.
/// Both windows are inclusive at both ends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlobFilter {
    pub min_area: f64,
    pub max_area: f64,
    pub min_aspect: f32,
    pub max_aspect: f32,
}

impl BlobFilter {
    /// Check a blob's enclosed area and bounding-box aspect ratio (w/h)
    pub fn accepts(&self, area: f64, aspect: f32) -> bool {
        area >= self.min_area
            && area <= self.max_area
            && aspect >= self.min_aspect
            && aspect <= self.max_aspect
    }
}

/// Canny edge-detection thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CannyThresholds {
    pub low: f32,
    pub high: f32,
}

/// Template matching settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemplateSettings {
    /// Minimum normalized correlation score for a match (inclusive)
    pub score_threshold: f32,
    /// Matches with centers closer than this collapse to the better one
    pub dedup_radius: f32,
}

/// Candidate location settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocatorSettings {
    /// Bands segmented by the color heuristic
    pub segment_bands: Vec<ColorBand>,
    /// Window applied to color-mask blobs
    pub color_filter: BlobFilter,
    /// Window applied to edge-contour blobs
    pub edge_filter: BlobFilter,
    /// Edge detection thresholds for the edge-contour mode
    pub edge_canny: CannyThresholds,
    /// Template matching settings
    pub template: TemplateSettings,
    /// Cap on blob candidates returned per call
    pub max_candidates: usize,
}

impl Default for LocatorSettings {
    fn default() -> Self {
        Self {
            segment_bands: vec![
                ColorBand::new("green", (40, 80), (50, 255), (50, 255)),
                ColorBand::new("yellow", (20, 30), (100, 255), (100, 255)),
                ColorBand::new("red", (0, 20), (50, 255), (50, 255)),
                ColorBand::new("blue", (100, 130), (50, 255), (50, 255)),
            ],
            color_filter: BlobFilter {
                min_area: 1_000.0,
                max_area: 50_000.0,
                min_aspect: 0.2,
                max_aspect: 5.0,
            },
            edge_filter: BlobFilter {
                min_area: 3_000.0,
                max_area: 100_000.0,
                min_aspect: 0.2,
                max_aspect: 5.0,
            },
            edge_canny: CannyThresholds {
                low: 30.0,
                high: 100.0,
            },
            template: TemplateSettings {
                score_threshold: 0.6,
                dedup_radius: 50.0,
            },
            max_candidates: 8,
        }
    }
}

/// An axis-aligned pixel rectangle, half-open on both axes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

/// A fixed control region registered for one screen state, expressed at the
/// reference resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimaryRegion {
    pub state: ScreenState,
    pub region: Region,
    /// Template matches below this score do not activate the region
    pub min_score: f32,
}

/// What to do when no tier produced an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FallbackPolicy {
    /// Tap the geometric center of the frame
    TapCenter,
    /// Do nothing this cycle
    Wait,
}

/// Decision engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionSettings {
    /// Color tags that short-circuit to a tap (go/confirm controls)
    pub privileged_tags: Vec<String>,
    /// Per-state primary control regions
    pub primary_regions: Vec<PrimaryRegion>,
    /// Behavior of the last tier
    pub fallback: FallbackPolicy,
    /// Resolution the primary regions are expressed at
    pub reference_resolution: (u32, u32),
}

impl Default for DecisionSettings {
    fn default() -> Self {
        Self {
            privileged_tags: vec!["green".to_string()],
            // The stage-entry control sits in the upper-center of the lobby
            primary_regions: vec![PrimaryRegion {
                state: ScreenState::Lobby,
                region: Region::new(384, 180, 512, 252),
                min_score: 0.8,
            }],
            fallback: FallbackPolicy::TapCenter,
            reference_resolution: (1280, 720),
        }
    }
}

/// Loop timing settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingSettings {
    /// Delay between poll attempts (ms)
    pub poll_interval_ms: u64,
    /// Maximum accumulated wait for a poll (ms)
    pub poll_max_wait_ms: u64,
    /// Delay between drive cycles (ms)
    pub cycle_interval_ms: u64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5_000,
            poll_max_wait_ms: 120_000,
            cycle_interval_ms: 8_000,
        }
    }
}

impl TimingSettings {
    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.poll_interval_ms)
    }

    pub fn poll_max_wait(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.poll_max_wait_ms)
    }

    pub fn cycle_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.cycle_interval_ms)
    }
}

/// Actuator failure handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActuatorSettings {
    /// Consecutive tap failures before the session halts as degraded
    pub max_consecutive_failures: u32,
}

impl Default for ActuatorSettings {
    fn default() -> Self {
        Self {
            max_consecutive_failures: 3,
        }
    }
}

/// Tap humanization settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HumanizeSettings {
    pub enabled: bool,
    /// Maximum tap-position jitter in pixels
    pub max_tap_offset: i32,
    /// Variance applied to the cycle interval, in percent
    pub delay_variance_percent: u32,
}

impl Default for HumanizeSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_tap_offset: 4,
            delay_variance_percent: 20,
        }
    }
}
