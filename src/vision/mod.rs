//! Vision and image processing module
//!
//! Turns captured frames into structured observations: a coarse screen state
//! classification and a list of candidate interactive regions. Everything in
//! here is a pure function of the frame it is given.

pub mod circles;
pub mod classifier;
pub mod frame;
pub mod locator;
pub mod template;

pub use classifier::{Classification, Confidence, FeatureReport, ScreenClassifier, ScreenState};
pub use frame::{Frame, FrameError};
pub use locator::{Candidate, CandidateLocator, CandidateSet, LocateMode, SourceMethod};
pub use template::{Template, TemplateError, TemplateLibrary};
