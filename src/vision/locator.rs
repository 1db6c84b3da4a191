//! Candidate region extraction
//!
//! Finds regions of a frame that look like interactive controls, three ways:
//! color-band segmentation with contour filtering, reference template
//! matching with non-maximum suppression, and plain edge contours for screens
//! with no color or template signal. Candidates are recomputed from scratch
//! every cycle and never persisted.

use image::GrayImage;
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::morphology::dilate;
use imageproc::point::Point;
use imageproc::template_matching::{match_template, MatchTemplateMethod};
use serde::{Deserialize, Serialize};

use super::frame::Frame;
use super::template::TemplateLibrary;
use crate::config::{BlobFilter, LocatorSettings};

/// How a candidate was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceMethod {
    ColorMask,
    TemplateMatch,
    EdgeContour,
}

/// Which extraction method to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocateMode {
    ColorHeuristic,
    TemplateMatch,
    EdgeContour,
}

/// A region hypothesized to be an interactive control
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Bounding-box centroid in frame coordinates
    pub center: (u32, u32),
    /// Bounding-box extent
    pub size: (u32, u32),
    /// Enclosed contour area (template matches use the template area)
    pub area: f64,
    pub source: SourceMethod,
    /// Normalized correlation score, template matches only
    pub score: Option<f32>,
    /// Segmentation band tag, color-mask candidates only
    pub color_tag: Option<String>,
}

/// Candidates from one frame, grouped by extraction method
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateSet {
    pub color: Vec<Candidate>,
    pub template: Vec<Candidate>,
    pub edge: Vec<Candidate>,
}

impl CandidateSet {
    pub fn is_empty(&self) -> bool {
        self.color.is_empty() && self.template.is_empty() && self.edge.is_empty()
    }

    pub fn counts(&self) -> (usize, usize, usize) {
        (self.color.len(), self.template.len(), self.edge.len())
    }
}

/// Candidate extractor over captured frames
#[derive(Debug, Clone)]
pub struct CandidateLocator {
    settings: LocatorSettings,
    templates: TemplateLibrary,
}

impl CandidateLocator {
    pub fn new(settings: LocatorSettings, templates: TemplateLibrary) -> Self {
        Self {
            settings,
            templates,
        }
    }

    /// Run one extraction method. No qualifying region is an empty list, not
    /// an error.
    pub fn locate(&self, frame: &Frame, mode: LocateMode) -> Vec<Candidate> {
        if frame.is_empty() {
            return Vec::new();
        }
        match mode {
            LocateMode::ColorHeuristic => self.color_candidates(frame),
            LocateMode::TemplateMatch => self.template_candidates(frame),
            LocateMode::EdgeContour => self.edge_candidates(frame),
        }
    }

    /// Run all three methods and group the results
    pub fn locate_all(&self, frame: &Frame) -> CandidateSet {
        CandidateSet {
            color: self.locate(frame, LocateMode::ColorHeuristic),
            template: self.locate(frame, LocateMode::TemplateMatch),
            edge: self.locate(frame, LocateMode::EdgeContour),
        }
    }

    fn color_candidates(&self, frame: &Frame) -> Vec<Candidate> {
        let mut candidates = Vec::new();
        for band in &self.settings.segment_bands {
            let mask = frame.band_mask(band);
            candidates.extend(contour_candidates(
                &mask,
                &self.settings.color_filter,
                SourceMethod::ColorMask,
                Some(band.tag.as_str()),
            ));
        }
        sort_by_area(&mut candidates);
        candidates.truncate(self.settings.max_candidates);
        candidates
    }

    fn edge_candidates(&self, frame: &Frame) -> Vec<Candidate> {
        let gray = frame.to_luma();
        let edges = canny(
            &gray,
            self.settings.edge_canny.low,
            self.settings.edge_canny.high,
        );
        // Thicken by one pixel so hairline gaps do not break the traced loop
        let closed = dilate(&edges, Norm::LInf, 1);
        let mut candidates = contour_candidates(
            &closed,
            &self.settings.edge_filter,
            SourceMethod::EdgeContour,
            None,
        );
        sort_by_area(&mut candidates);
        candidates.truncate(self.settings.max_candidates);
        candidates
    }

    fn template_candidates(&self, frame: &Frame) -> Vec<Candidate> {
        let gray = frame.to_luma();
        let threshold = self.settings.template.score_threshold;
        let mut raw: Vec<Candidate> = Vec::new();

        for template in self.templates.iter() {
            let (tw, th) = template.dimensions();
            if tw == 0 || th == 0 || tw > gray.width() || th > gray.height() {
                continue;
            }

            let scores = match_template(
                &gray,
                template.image(),
                MatchTemplateMethod::CrossCorrelationNormalized,
            );

            for (x, y, pixel) in scores.enumerate_pixels() {
                let score = pixel[0];
                // Flat regions can produce non-finite correlation values
                if score.is_finite() && score >= threshold {
                    raw.push(Candidate {
                        center: (x + tw / 2, y + th / 2),
                        size: (tw, th),
                        area: (tw as f64) * (th as f64),
                        source: SourceMethod::TemplateMatch,
                        score: Some(score),
                        color_tag: None,
                    });
                }
            }
        }

        sort_by_score(&mut raw);
        suppress_overlaps(raw, self.settings.template.dedup_radius)
    }
}

/// Extract filtered blob candidates from a binary mask. Only external
/// contours are considered; area is the enclosed polygon area of the traced
/// contour.
fn contour_candidates(
    mask: &GrayImage,
    filter: &BlobFilter,
    source: SourceMethod,
    tag: Option<&str>,
) -> Vec<Candidate> {
    let contours: Vec<Contour<i32>> = find_contours(mask);

    let mut candidates = Vec::new();
    for contour in &contours {
        if contour.border_type != BorderType::Outer || contour.points.is_empty() {
            continue;
        }

        let (min_x, min_y, max_x, max_y) = bounding_box(&contour.points);
        let width = (max_x - min_x + 1) as u32;
        let height = (max_y - min_y + 1) as u32;
        let aspect = width as f32 / height as f32;
        let area = polygon_area(&contour.points);

        if !filter.accepts(area, aspect) {
            continue;
        }

        candidates.push(Candidate {
            center: (
                (min_x as u32) + width / 2,
                (min_y as u32) + height / 2,
            ),
            size: (width, height),
            area,
            source,
            score: None,
            color_tag: tag.map(|t| t.to_string()),
        });
    }
    candidates
}

fn bounding_box(points: &[Point<i32>]) -> (i32, i32, i32, i32) {
    let mut min_x = i32::MAX;
    let mut min_y = i32::MAX;
    let mut max_x = i32::MIN;
    let mut max_y = i32::MIN;
    for p in points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    (min_x, min_y, max_x, max_y)
}

/// Shoelace area of a traced contour. For an axis-aligned filled `w x h`
/// rectangle this evaluates to `(w-1)*(h-1)`.
fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut sum = 0i64;
    for i in 0..points.len() {
        let a = points[i];
        let b = points[(i + 1) % points.len()];
        sum += (a.x as i64) * (b.y as i64) - (b.x as i64) * (a.y as i64);
    }
    (sum.abs() as f64) / 2.0
}

fn sort_by_area(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        b.area
            .partial_cmp(&a.area)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

fn sort_by_score(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Non-maximum suppression: candidates must arrive sorted by descending
/// score; any candidate whose center lies strictly within `radius` of an
/// already kept one is dropped.
fn suppress_overlaps(sorted: Vec<Candidate>, radius: f32) -> Vec<Candidate> {
    let mut kept: Vec<Candidate> = Vec::new();
    for candidate in sorted {
        let close = kept.iter().any(|k| {
            let dx = k.center.0 as f32 - candidate.center.0 as f32;
            let dy = k.center.1 as f32 - candidate.center.1 as f32;
            (dx * dx + dy * dy).sqrt() < radius
        });
        if !close {
            kept.push(candidate);
        }
    }
    kept
}
