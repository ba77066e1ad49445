// THEORY:
// Every calibration constant the detector uses lives here, grouped by the
// stage that reads it. Defaults reproduce the tuned values for a fixed
// broadcast-style camera; a YAML file can override any subset of them, and
// anything it leaves out keeps its default.
//
// Validation runs once, before the first frame. A pipeline is never built
// from a config that has not passed `validate()`.

use crate::core_modules::color_profile::{ColorProfile, HsvRange};
use crate::core_modules::geometric_gate::{ExclusionBox, HorizontalLane, VerticalCrop};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Colour segmentation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Frames wider than this are downscaled to it before any analysis.
    pub resize_width: u32,
    /// Gaussian blur sigma; 0 disables smoothing.
    pub blur_sigma: f32,
    /// Side of the elliptical morphology element. Must be odd.
    pub kernel_size: u32,
    /// Tuned HSV boxes that replace the profile's built-in ranges when non-empty.
    pub custom_ranges: Vec<HsvRange>,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            resize_width: 960,
            blur_sigma: 1.1,
            kernel_size: 5,
            custom_ranges: Vec::new(),
        }
    }
}

/// Size and shape gates, in working-resolution pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateConfig {
    pub min_area: f64,
    pub max_area: f64,
    pub min_circularity: f64,
}

impl Default for CandidateConfig {
    fn default() -> Self {
        Self {
            min_area: 10.0,
            max_area: 8000.0,
            min_circularity: 0.3,
        }
    }
}

/// Region rules; `null` in YAML disables a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometricGateConfig {
    pub vertical_crop: Option<VerticalCrop>,
    pub horizontal_lane: Option<HorizontalLane>,
    pub exclusion_box: Option<ExclusionBox>,
}

impl Default for GeometricGateConfig {
    fn default() -> Self {
        Self {
            vertical_crop: Some(VerticalCrop::default()),
            horizontal_lane: Some(HorizontalLane::default()),
            exclusion_box: Some(ExclusionBox::default()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemporalGateConfig {
    /// Largest accepted distance, in original-frame pixels, from the last
    /// accepted position.
    pub max_jump: f64,
}

impl Default for TemporalGateConfig {
    fn default() -> Self {
        Self { max_jump: 150.0 }
    }
}

/// Backward extrapolation constants, in original-frame pixels per frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconstructionConfig {
    pub back_extend_frames: u64,
    pub vx: f64,
    pub vy: f64,
    pub curvature: f64,
}

impl Default for ReconstructionConfig {
    fn default() -> Self {
        Self {
            back_extend_frames: 10,
            vx: 8.0,
            vy: 17.0,
            curvature: 1.0,
        }
    }
}

/// The full configuration for one detection run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub color_profile: ColorProfile,
    pub segmentation: SegmentationConfig,
    pub candidates: CandidateConfig,
    pub geometric_gate: GeometricGateConfig,
    pub temporal_gate: TemporalGateConfig,
    pub reconstruction: ReconstructionConfig,
}

impl PipelineConfig {
    /// Reads and validates a YAML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// Parses and validates a YAML document. An empty document yields the defaults.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = if text.trim().is_empty() {
            PipelineConfig::default()
        } else {
            serde_yaml::from_str(text)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let segmentation = &self.segmentation;
        if segmentation.resize_width == 0 {
            return Err(ConfigError::invalid("segmentation.resize_width", "must be positive"));
        }
        if segmentation.kernel_size == 0 || segmentation.kernel_size % 2 == 0 {
            return Err(ConfigError::invalid(
                "segmentation.kernel_size",
                format!("must be odd and positive, got {}", segmentation.kernel_size),
            ));
        }
        if !segmentation.blur_sigma.is_finite() || segmentation.blur_sigma < 0.0 {
            return Err(ConfigError::invalid(
                "segmentation.blur_sigma",
                format!("must be a non-negative number, got {}", segmentation.blur_sigma),
            ));
        }
        for range in &segmentation.custom_ranges {
            range.validate()?;
        }

        let candidates = &self.candidates;
        if !candidates.min_area.is_finite() || !candidates.max_area.is_finite() || candidates.min_area < 0.0 {
            return Err(ConfigError::invalid("candidates.min_area", "areas must be finite and non-negative"));
        }
        if candidates.min_area > candidates.max_area {
            return Err(ConfigError::invalid(
                "candidates.max_area",
                format!("{} is smaller than min_area {}", candidates.max_area, candidates.min_area),
            ));
        }
        if !(0.0..=1.0).contains(&candidates.min_circularity) {
            return Err(ConfigError::invalid(
                "candidates.min_circularity",
                format!("must lie in [0, 1], got {}", candidates.min_circularity),
            ));
        }

        let gate = &self.geometric_gate;
        if let Some(crop) = gate.vertical_crop {
            check_fraction("geometric_gate.vertical_crop.max_y", crop.max_y)?;
        }
        if let Some(lane) = gate.horizontal_lane {
            check_interval("geometric_gate.horizontal_lane", lane.min_x, lane.max_x)?;
        }
        if let Some(zone) = gate.exclusion_box {
            check_interval("geometric_gate.exclusion_box.x", zone.min_x, zone.max_x)?;
            check_interval("geometric_gate.exclusion_box.y", zone.min_y, zone.max_y)?;
        }

        let max_jump = self.temporal_gate.max_jump;
        if !max_jump.is_finite() || max_jump <= 0.0 {
            return Err(ConfigError::invalid(
                "temporal_gate.max_jump",
                format!("must be a positive number, got {max_jump}"),
            ));
        }

        let reconstruction = &self.reconstruction;
        if ![reconstruction.vx, reconstruction.vy, reconstruction.curvature]
            .iter()
            .all(|value| value.is_finite())
        {
            return Err(ConfigError::invalid("reconstruction", "velocities and curvature must be finite"));
        }

        Ok(())
    }
}

fn check_fraction(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("fraction {value} outside [0, 1]")))
    }
}

fn check_interval(field: &'static str, min: f64, max: f64) -> Result<(), ConfigError> {
    check_fraction(field, min)?;
    check_fraction(field, max)?;
    if min > max {
        return Err(ConfigError::invalid(field, format!("min {min} exceeds max {max}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.color_profile, ColorProfile::White);
        assert_eq!(config.segmentation.resize_width, 960);
        assert_eq!(config.temporal_gate.max_jump, 150.0);
        assert_eq!(config.reconstruction.back_extend_frames, 10);
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let config = PipelineConfig::from_yaml_str(
            "color_profile: red\ntemporal_gate:\n  max_jump: 80.0\n",
        )
        .unwrap();
        assert_eq!(config.color_profile, ColorProfile::Red);
        assert_eq!(config.temporal_gate.max_jump, 80.0);
        assert_eq!(config.candidates, CandidateConfig::default());
    }

    #[test]
    fn empty_document_is_default() {
        assert_eq!(PipelineConfig::from_yaml_str("").unwrap(), PipelineConfig::default());
    }

    #[test]
    fn null_disables_a_region_rule() {
        let config = PipelineConfig::from_yaml_str("geometric_gate:\n  exclusion_box: null\n").unwrap();
        assert_eq!(config.geometric_gate.exclusion_box, None);
        assert!(config.geometric_gate.vertical_crop.is_some());
    }

    #[test]
    fn unknown_profile_is_rejected() {
        let error = PipelineConfig::from_yaml_str("color_profile: green\n").unwrap_err();
        assert!(error.to_string().contains("green"), "{error}");
    }

    #[test]
    fn even_kernel_is_rejected() {
        let mut config = PipelineConfig::default();
        config.segmentation.kernel_size = 4;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "segmentation.kernel_size", .. })
        ));
    }

    #[test]
    fn inverted_area_bounds_are_rejected() {
        let mut config = PipelineConfig::default();
        config.candidates.min_area = 500.0;
        config.candidates.max_area = 100.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn bad_fractions_are_rejected() {
        let mut config = PipelineConfig::default();
        config.geometric_gate.horizontal_lane = Some(HorizontalLane { min_x: 0.8, max_x: 0.2 });
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.geometric_gate.vertical_crop = Some(VerticalCrop { max_y: 1.5 });
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_positive_max_jump_is_rejected() {
        let mut config = PipelineConfig::default();
        config.temporal_gate.max_jump = 0.0;
        assert!(config.validate().is_err());
        config.temporal_gate.max_jump = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn yaml_round_trips_through_file() {
        let mut config = PipelineConfig::default();
        config.segmentation.custom_ranges.push(HsvRange::new([0, 0, 200], [180, 60, 255]));
        let yaml = config.to_yaml().unwrap();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        let loaded = PipelineConfig::load(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn missing_file_reports_path() {
        let error = PipelineConfig::load("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(error, ConfigError::Io { .. }));
    }
}
