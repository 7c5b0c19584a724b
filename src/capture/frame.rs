//! Frame data structures for captured still images

use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Rotation correction to apply to a frame before recognition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rotation {
    /// No correction needed
    #[default]
    None,
    /// Rotate 90 degrees clockwise
    Cw90,
    /// Rotate 180 degrees
    Cw180,
    /// Rotate 270 degrees clockwise
    Cw270,
}

impl Rotation {
    /// Parse a rotation from degrees; only the four right angles are valid
    pub fn from_degrees(degrees: u32) -> Option<Self> {
        match degrees % 360 {
            0 => Some(Rotation::None),
            90 => Some(Rotation::Cw90),
            180 => Some(Rotation::Cw180),
            270 => Some(Rotation::Cw270),
            _ => None,
        }
    }

    /// Rotation in degrees
    pub fn degrees(&self) -> u32 {
        match self {
            Rotation::None => 0,
            Rotation::Cw90 => 90,
            Rotation::Cw180 => 180,
            Rotation::Cw270 => 270,
        }
    }
}

/// A still frame captured from a camera source
///
/// The frame is handed to the recognition stage by value and consumed
/// exactly once.
#[derive(Debug)]
pub struct CapturedFrame {
    /// Raw RGBA pixel data
    pub data: Vec<u8>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Rotation correction reported by the source
    pub rotation: Rotation,
    /// Timestamp when the frame was captured
    pub timestamp: Instant,
}

impl CapturedFrame {
    /// Create a new captured frame
    pub fn new(data: Vec<u8>, width: u32, height: u32, rotation: Rotation) -> Self {
        Self {
            data,
            width,
            height,
            rotation,
            timestamp: Instant::now(),
        }
    }

    /// Get frame dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
