//! Device I/O seams
//!
//! The pilot never talks to an emulator directly. Frame capture and pointer
//! delivery are narrow traits implemented by the embedding host (an ADB
//! bridge, a capture service, a test double); everything here treats them as
//! opaque, blocking calls that may fail.

use crate::config::Region;
use crate::vision::{Frame, FrameError};

/// Frame acquisition errors
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("frame capture failed: {0}")]
    Failed(String),
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Pointer delivery errors
#[derive(Debug, thiserror::Error)]
pub enum TapError {
    #[error("tap delivery failed: {0}")]
    Failed(String),
}

/// Supplies one frame of the target application's rendered output on demand
pub trait FrameSource {
    fn capture_frame(&mut self) -> Result<Frame, CaptureError>;
}

/// Delivers a synthetic tap at a pixel coordinate in the frame's space
pub trait ActionExecutor {
    fn tap(&mut self, x: i32, y: i32) -> Result<(), TapError>;
}

/// Maps coordinates between a reference resolution and the actual screen.
/// Configured control regions are expressed at the reference resolution so
/// one configuration works across emulator window sizes.
#[derive(Debug, Clone, Copy)]
pub struct ScreenScaler {
    ref_width: u32,
    ref_height: u32,
    screen_width: u32,
    screen_height: u32,
}

impl ScreenScaler {
    pub fn new(reference: (u32, u32), screen: (u32, u32)) -> Self {
        Self {
            ref_width: reference.0.max(1),
            ref_height: reference.1.max(1),
            screen_width: screen.0,
            screen_height: screen.1,
        }
    }

    /// Scale an X coordinate from reference to actual screen
    pub fn scale_x(&self, x: u32) -> u32 {
        ((x as u64) * (self.screen_width as u64) / (self.ref_width as u64)) as u32
    }

    /// Scale a Y coordinate from reference to actual screen
    pub fn scale_y(&self, y: u32) -> u32 {
        ((y as u64) * (self.screen_height as u64) / (self.ref_height as u64)) as u32
    }

    /// Scale a reference-resolution region to the actual screen
    pub fn scale_region(&self, region: &Region) -> Region {
        Region::new(
            self.scale_x(region.x),
            self.scale_y(region.y),
            self.scale_x(region.width),
            self.scale_y(region.height),
        )
    }
}
