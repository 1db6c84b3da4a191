//! Configuration types for the pilot

pub mod settings;

pub use settings::{
    ActuatorSettings, BlobFilter, CannyThresholds, CircleSettings, ClassifierSettings, ColorBand,
    DecisionSettings, FallbackPolicy, FeatureProbe, FracRegion, HumanizeSettings, LocatorSettings,
    PilotConfig, PrimaryRegion, Region, StateRule, TemplateSettings, TimingSettings,
};
