use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::bone::{default_bones, Bone};
use crate::error::{BodyError, Result};
use crate::skeleton::{ConfidenceLevel, JointId};
use crate::transform::Transform;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub identification: IdentificationConfig,
    #[serde(default)]
    pub selection: SelectionConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub postures: PostureConfig,
    #[serde(default)]
    pub hands_proximity: HandsProximityConfig,
}

/// Single-camera identity tracker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentificationConfig {
    /// Both bone endpoints must reach this level for a sample to count.
    pub minimum_confidence_level_for_learning: ConfidenceLevel,
    pub bones_used_for_correspondence: Vec<Bone>,
    /// Length of the learning window.
    pub maximum_identification_time_ms: u64,
    /// Confirmed identities unseen for longer are evicted.
    pub maximum_lost_time_ms: u64,
    /// Maximum spread of bone length differences for two bodies to match.
    pub maximum_deviation_allowed: f64,
    /// Bones that must have been observed before a body can be learned.
    pub minimum_bones_for_identification: usize,
}

impl IdentificationConfig {
    pub fn maximum_identification_time(&self) -> Duration {
        Duration::from_millis(self.maximum_identification_time_ms)
    }

    pub fn maximum_lost_time(&self) -> Duration {
        Duration::from_millis(self.maximum_lost_time_ms)
    }
}

impl Default for IdentificationConfig {
    fn default() -> Self {
        Self {
            minimum_confidence_level_for_learning: ConfidenceLevel::Low,
            bones_used_for_correspondence: default_bones(),
            maximum_identification_time_ms: 500,
            maximum_lost_time_ms: 5 * 60 * 1000,
            maximum_deviation_allowed: 0.0025,
            minimum_bones_for_identification: 5,
        }
    }
}

/// Two-camera fusion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Fixed camera-2 to camera-1 transform. When unset, transforms come
    /// from the calibration stream.
    pub camera2_to_camera1: Option<Transform>,
    pub joint_used_for_correspondence: JointId,
    /// Nearest bodies farther apart than this (meters) are not paired.
    pub max_distance: f64,
    /// Pairs farther apart than this (meters) are never considered again.
    pub not_pairable_distance_threshold: f64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            camera2_to_camera1: None,
            joint_used_for_correspondence: JointId::Pelvis,
            max_distance: 0.8,
            not_pairable_distance_threshold: 8.0,
        }
    }
}

/// Calibration-by-bodies settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub number_of_joints_for_calibration: usize,
    pub number_of_joints_for_testing: usize,
    pub confidence_level_for_calibration: ConfidenceLevel,
    pub test_matrix_before_sending: bool,
    pub allowed_max_rmse: f64,
    pub minimum_sample_interval_ms: u64,
    pub storing_path: Option<String>,
}

impl CalibrationConfig {
    pub fn minimum_sample_interval(&self) -> Duration {
        Duration::from_millis(self.minimum_sample_interval_ms)
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            number_of_joints_for_calibration: 200,
            number_of_joints_for_testing: 100,
            confidence_level_for_calibration: ConfidenceLevel::High,
            test_matrix_before_sending: true,
            allowed_max_rmse: 0.5,
            minimum_sample_interval_ms: 5,
            storing_path: None,
        }
    }
}

/// Posture heuristics. Angles are in degrees.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PostureConfig {
    pub minimum_confidence_level: ConfidenceLevel,
    /// How far (meters) the closest points of the forearm lines may sit
    /// off the forearms for the arms to count as crossed.
    pub minimum_distance_threshold: f64,
    pub minimum_sitting_degrees: f64,
    pub maximum_standing_degrees: f64,
    pub maximum_pointing_degrees: f64,
}

impl Default for PostureConfig {
    fn default() -> Self {
        Self {
            minimum_confidence_level: ConfidenceLevel::Medium,
            minimum_distance_threshold: 0.1,
            minimum_sitting_degrees: 90.0,
            maximum_standing_degrees: 15.0,
            maximum_pointing_degrees: 25.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HandsProximityConfig {
    /// Hands must be seen strictly above this level.
    pub minimum_confidence_level: ConfidenceLevel,
    /// Hands closer than this (meters) touch.
    pub minimum_distance_threshold: f64,
}

impl Default for HandsProximityConfig {
    fn default() -> Self {
        Self {
            minimum_confidence_level: ConfidenceLevel::Low,
            minimum_distance_threshold: 0.1,
        }
    }
}

impl Config {
    /// Load from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        let cfg: Config = serde_json::from_str(&data)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let id = &self.identification;
        if !(id.maximum_deviation_allowed > 0.0) {
            return Err(BodyError::config("maximum_deviation_allowed must be positive"));
        }
        if id.bones_used_for_correspondence.is_empty() {
            return Err(BodyError::config("bones_used_for_correspondence is empty"));
        }
        if let Some(bone) = id.bones_used_for_correspondence.iter().find(|b| b.child == b.parent) {
            return Err(BodyError::config(format!("bone {:?} links a joint to itself", bone.child)));
        }

        let sel = &self.selection;
        if !(sel.max_distance > 0.0) {
            return Err(BodyError::config("max_distance must be positive"));
        }
        if !(sel.not_pairable_distance_threshold >= sel.max_distance) {
            return Err(BodyError::config(
                "not_pairable_distance_threshold must not be below max_distance",
            ));
        }

        let cal = &self.calibration;
        if cal.number_of_joints_for_calibration < 3 {
            return Err(BodyError::config("number_of_joints_for_calibration must be at least 3"));
        }
        if cal.test_matrix_before_sending && cal.number_of_joints_for_testing == 0 {
            return Err(BodyError::config("number_of_joints_for_testing must be positive"));
        }
        if !(cal.allowed_max_rmse > 0.0) {
            return Err(BodyError::config("allowed_max_rmse must be positive"));
        }

        let pos = &self.postures;
        let angles = [
            pos.minimum_sitting_degrees,
            pos.maximum_standing_degrees,
            pos.maximum_pointing_degrees,
        ];
        if angles.iter().any(|a| !(0.0..=180.0).contains(a)) {
            return Err(BodyError::config("posture angles must be within [0, 180] degrees"));
        }
        if !(pos.minimum_distance_threshold > 0.0) || !(self.hands_proximity.minimum_distance_threshold > 0.0) {
            return Err(BodyError::config("posture distance thresholds must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.identification.maximum_identification_time(), Duration::from_millis(500));
        assert_eq!(cfg.identification.maximum_lost_time(), Duration::from_secs(300));
        assert_eq!(cfg.selection.joint_used_for_correspondence, JointId::Pelvis);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "identification": { "maximum_lost_time_ms": 1000 }, "selection": { "max_distance": 0.5 } }"#;
        let cfg: Config = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.identification.maximum_lost_time_ms, 1000);
        assert_eq!(cfg.identification.minimum_bones_for_identification, 5);
        assert_eq!(cfg.selection.max_distance, 0.5);
        assert_eq!(cfg.selection.not_pairable_distance_threshold, 8.0);
        assert!(cfg.selection.camera2_to_camera1.is_none());
    }

    #[test]
    fn test_validate_rejects_bad_thresholds() {
        let mut cfg = Config::default();
        cfg.selection.not_pairable_distance_threshold = 0.1;
        assert!(matches!(cfg.validate(), Err(BodyError::InvalidConfig(_))));

        let mut cfg = Config::default();
        cfg.identification.maximum_deviation_allowed = f64::NAN;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.identification.bones_used_for_correspondence = vec![Bone::new(JointId::Neck, JointId::Neck)];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_posture_sections() {
        let json = r#"{ "postures": { "maximum_pointing_degrees": 30.0 }, "hands_proximity": { "minimum_confidence_level": "Medium" } }"#;
        let cfg: Config = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.postures.maximum_pointing_degrees, 30.0);
        assert_eq!(cfg.postures.minimum_sitting_degrees, 90.0);
        assert_eq!(cfg.hands_proximity.minimum_confidence_level, ConfidenceLevel::Medium);
        assert!(cfg.validate().is_ok());

        let mut cfg = Config::default();
        cfg.postures.minimum_sitting_degrees = 200.0;
        assert!(cfg.validate().is_err());
        let mut cfg = Config::default();
        cfg.hands_proximity.minimum_distance_threshold = 0.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_fixed_transform_from_json() {
        let json = r#"{ "selection": { "camera2_to_camera1": [[1,0,0,0.5],[0,1,0,0],[0,0,1,0],[0,0,0,1]] } }"#;
        let cfg: Config = serde_json::from_str(json).unwrap();
        let transform = cfg.selection.camera2_to_camera1.unwrap();
        let p = transform.apply(&nalgebra::Point3::new(0.0, 0.0, 0.0));
        assert_eq!(p.x, 0.5);
    }
}
