//! gamepilot - heuristic screen automation for emulated Android games
//!
//! This library drives an opaque mobile game by repeatedly observing its
//! rendered output and issuing synthetic taps: classify the current screen
//! from a captured frame, locate candidate controls, pick exactly one action
//! from a fixed priority chain, and poll with bounded timeouts until a target
//! screen is reached.
//!
//! Device lifecycle, frame capture and tap delivery stay outside the crate,
//! behind the narrow traits in [`device`]. Everything tuned (color bands,
//! thresholds, control regions) is configuration in [`config`], not code.
//!
//! ## Anti-Detection
//!
//! The `stealth` module adds realistic variance to tap timing and positions
//! so the action stream is less obviously machine-generated.

pub mod config;
pub mod control;
pub mod decision;
pub mod device;
pub mod stealth;
pub mod vision;

use serde::{Deserialize, Serialize};

use crate::config::PilotConfig;
use crate::decision::{Decision, DecisionEngine};
use crate::vision::{
    CandidateLocator, CandidateSet, Classification, Frame, ScreenClassifier, TemplateLibrary,
};

/// A single pointer action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Tap at a pixel coordinate in the frame's space
    Tap { x: i32, y: i32 },
    /// Do nothing this cycle
    Wait,
}

/// Everything the pilot derived from one frame
#[derive(Debug, Clone)]
pub struct Observation {
    pub classification: Classification,
    pub candidates: CandidateSet,
    pub decision: Decision,
}

/// Per-frame perception and decision pipeline
///
/// A pure pipeline over frames: no candidate or state value survives past the
/// frame that produced it. The drive loops in [`control`] own the device I/O
/// and feed frames through this.
pub struct Pilot {
    classifier: ScreenClassifier,
    locator: CandidateLocator,
    engine: DecisionEngine,
}

impl Pilot {
    /// Build a pilot from configuration and a template library
    pub fn new(config: &PilotConfig, templates: TemplateLibrary) -> Self {
        Self {
            classifier: ScreenClassifier::new(&config.classifier),
            locator: CandidateLocator::new(config.locator.clone(), templates),
            engine: DecisionEngine::new(config.decision.clone()),
        }
    }

    /// Classify a frame and extract candidates without deciding
    pub fn observe(&self, frame: &Frame) -> (Classification, CandidateSet) {
        (
            self.classifier.classify(frame),
            self.locator.locate_all(frame),
        )
    }

    /// Run the full pipeline on one frame
    pub fn process_frame(&self, frame: &Frame) -> Observation {
        let classification = self.classifier.classify(frame);
        let candidates = self.locator.locate_all(frame);
        let decision = self
            .engine
            .decide(classification.state, frame.dimensions(), &candidates);

        Observation {
            classification,
            candidates,
            decision,
        }
    }

    pub fn classifier(&self) -> &ScreenClassifier {
        &self.classifier
    }

    pub fn locator(&self) -> &CandidateLocator {
        &self.locator
    }
}
