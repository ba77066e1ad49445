// THEORY:
// A `ColorProfile` names the colour of the ball being tracked and expands into
// the set of HSV boxes a pixel must fall into to count as "ball". It is chosen
// once per run and never changes while frames are processed.

use crate::core_modules::pixel::pixel::{Hsv, HUE_SCALE_MAX};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An inclusive box in HSV space (8-bit scale, hue 0..180).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsvRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl HsvRange {
    pub const fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    pub fn contains(&self, hsv: &Hsv) -> bool {
        let sample = [hsv.hue, hsv.saturation, hsv.value];
        sample
            .iter()
            .zip(self.lower.iter().zip(self.upper.iter()))
            .all(|(value, (low, high))| low <= value && value <= high)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.upper[0] > HUE_SCALE_MAX {
            return Err(ConfigError::invalid(
                "segmentation.custom_ranges",
                format!("hue upper bound {} exceeds {}", self.upper[0], HUE_SCALE_MAX),
            ));
        }
        if self.lower.iter().zip(self.upper.iter()).any(|(low, high)| low > high) {
            return Err(ConfigError::invalid(
                "segmentation.custom_ranges",
                format!("lower bound {:?} exceeds upper bound {:?}", self.lower, self.upper),
            ));
        }
        Ok(())
    }
}

/// Low saturation, high value across the whole hue circle.
const WHITE_RANGES: [HsvRange; 1] = [HsvRange::new([0, 0, 190], [180, 90, 255])];

/// Red straddles the hue wrap-around, so it needs both ends of the circle.
const RED_RANGES: [HsvRange; 2] = [
    HsvRange::new([0, 120, 70], [10, 255, 255]),
    HsvRange::new([170, 120, 70], [180, 255, 255]),
];

/// The ball colours the segmenter knows how to isolate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ColorProfile {
    #[default]
    White,
    Red,
}

impl ColorProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColorProfile::White => "white",
            ColorProfile::Red => "red",
        }
    }

    pub fn ranges(&self) -> &'static [HsvRange] {
        match self {
            ColorProfile::White => &WHITE_RANGES,
            ColorProfile::Red => &RED_RANGES,
        }
    }
}

impl fmt::Display for ColorProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColorProfile {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "white" => Ok(ColorProfile::White),
            "red" => Ok(ColorProfile::Red),
            other => Err(ConfigError::UnsupportedColorProfile(other.to_string())),
        }
    }
}

impl TryFrom<String> for ColorProfile {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ColorProfile> for String {
    fn from(profile: ColorProfile) -> Self {
        profile.as_str().to_string()
    }
}
