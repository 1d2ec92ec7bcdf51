//! Camera-2 to camera-1 calibration from a single person seen by both
//! cameras.
//!
//! Matching joints of the two skeletons are collected over time, a rigid
//! transform is fitted on them (Kabsch), and optionally checked against a
//! fresh set of joints before it is handed out.

use std::time::Duration;

use nalgebra::{Matrix3, Matrix4, Point3, Vector3};

use crate::config::CalibrationConfig;
use crate::error::{BodyError, Result};
use crate::skeleton::Skeleton;
use crate::transform::Transform;

/// Same joint seen by both cameras: (camera-1 position, camera-2 position).
pub type JointPair = (Point3<f64>, Point3<f64>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationState {
    /// Collecting joints for the estimation.
    Running,
    /// Collecting joints to check the estimated transform.
    Testing,
    /// A transform was accepted.
    Idle,
}

pub struct CalibrationByBodies {
    config: CalibrationConfig,
    state: CalibrationState,
    calibration_pairs: Vec<JointPair>,
    testing_pairs: Vec<JointPair>,
    candidate: Option<Transform>,
    last_sample: Option<Duration>,
}

impl CalibrationByBodies {
    pub fn new(config: CalibrationConfig) -> Self {
        let calibration_pairs = Vec::with_capacity(config.number_of_joints_for_calibration);
        Self {
            config,
            state: CalibrationState::Running,
            calibration_pairs,
            testing_pairs: Vec::new(),
            candidate: None,
            last_sample: None,
        }
    }

    pub fn state(&self) -> CalibrationState {
        self.state
    }

    /// Progress of the current phase as (collected, needed).
    pub fn progress(&self) -> (usize, usize) {
        match self.state {
            CalibrationState::Running => (self.calibration_pairs.len(), self.config.number_of_joints_for_calibration),
            CalibrationState::Testing => (self.testing_pairs.len(), self.config.number_of_joints_for_testing),
            CalibrationState::Idle => (0, 0),
        }
    }

    /// Drops everything collected and starts over.
    pub fn reset(&mut self) {
        self.state = CalibrationState::Running;
        self.calibration_pairs.clear();
        self.testing_pairs.clear();
        self.candidate = None;
        self.last_sample = None;
    }

    /// Feeds one pair of frames. Frames are only used when each camera sees
    /// exactly one body. Returns the transform once accepted.
    pub fn process(&mut self, camera1: &[Skeleton], camera2: &[Skeleton], now: Duration) -> Result<Option<Transform>> {
        if self.state == CalibrationState::Idle {
            return Ok(None);
        }
        let (body1, body2) = match (camera1, camera2) {
            ([body1], [body2]) => (body1, body2),
            _ => return Ok(None),
        };
        if let Some(last) = self.last_sample {
            if now.saturating_sub(last) < self.config.minimum_sample_interval() {
                return Ok(None);
            }
        }
        self.last_sample = Some(now);

        match self.state {
            CalibrationState::Running => {
                let needed = self.config.number_of_joints_for_calibration;
                collect_pairs(&mut self.calibration_pairs, needed, body1, body2, &self.config);
                log::debug!("calibration running: {}/{}", self.calibration_pairs.len(), needed);
                if self.calibration_pairs.len() < needed {
                    return Ok(None);
                }

                let estimated = estimate_rigid_transform(&self.calibration_pairs);
                self.calibration_pairs.clear();
                let transform = match estimated {
                    Ok(transform) => transform,
                    Err(e) => {
                        log::warn!("calibration failed, collecting again: {}", e);
                        return Ok(None);
                    }
                };

                if self.config.test_matrix_before_sending {
                    self.candidate = Some(transform);
                    self.state = CalibrationState::Testing;
                    Ok(None)
                } else {
                    self.accept(transform).map(Some)
                }
            }
            CalibrationState::Testing => {
                let needed = self.config.number_of_joints_for_testing;
                collect_pairs(&mut self.testing_pairs, needed, body1, body2, &self.config);
                log::debug!("calibration testing: {}/{}", self.testing_pairs.len(), needed);
                if self.testing_pairs.len() < needed {
                    return Ok(None);
                }

                let Some(candidate) = self.candidate.take() else {
                    self.reset();
                    return Ok(None);
                };
                let error = rmse(&candidate, &self.testing_pairs);
                self.testing_pairs.clear();
                if error < self.config.allowed_max_rmse {
                    log::info!("calibration accepted, rmse {:.4}", error);
                    self.accept(candidate).map(Some)
                } else {
                    log::warn!(
                        "calibration rejected, rmse {:.4} above {:.4}",
                        error,
                        self.config.allowed_max_rmse
                    );
                    self.state = CalibrationState::Running;
                    Ok(None)
                }
            }
            CalibrationState::Idle => Ok(None),
        }
    }

    fn accept(&mut self, transform: Transform) -> Result<Transform> {
        self.state = CalibrationState::Idle;
        if let Some(path) = &self.config.storing_path {
            transform.store(path)?;
            log::info!("calibration stored to {}", path);
        }
        Ok(transform)
    }
}

fn collect_pairs(
    pairs: &mut Vec<JointPair>,
    needed: usize,
    body1: &Skeleton,
    body2: &Skeleton,
    config: &CalibrationConfig,
) {
    let minimum = config.confidence_level_for_calibration;
    for (joint_id, joint1) in body1.joints() {
        if pairs.len() >= needed {
            break;
        }
        let joint2 = body2.joint(joint_id);
        if joint1.is_valid(minimum) && joint2.is_valid(minimum) {
            pairs.push((joint1.position, joint2.position));
        }
    }
}

/// Least-squares rigid transform mapping the camera-2 side of `pairs` onto
/// the camera-1 side.
pub fn estimate_rigid_transform(pairs: &[JointPair]) -> Result<Transform> {
    if pairs.len() < 3 {
        return Err(BodyError::transform(format!("need at least 3 joint pairs, got {}", pairs.len())));
    }

    let n = pairs.len() as f64;
    let centroid1 = pairs.iter().fold(Vector3::zeros(), |acc, (p1, _)| acc + p1.coords) / n;
    let centroid2 = pairs.iter().fold(Vector3::zeros(), |acc, (_, p2)| acc + p2.coords) / n;

    let covariance = pairs.iter().fold(Matrix3::zeros(), |acc, (p1, p2)| {
        acc + (p2.coords - centroid2) * (p1.coords - centroid1).transpose()
    });

    let svd = covariance.svd(true, true);
    if svd.singular_values.iter().filter(|s| **s > 1e-9).count() < 2 {
        return Err(BodyError::transform("joint positions are degenerate"));
    }
    let u = svd.u.ok_or_else(|| BodyError::transform("svd did not converge"))?;
    let v = svd.v_t.ok_or_else(|| BodyError::transform("svd did not converge"))?.transpose();

    // reflection guard
    let d = (v * u.transpose()).determinant().signum();
    let rotation = v * Matrix3::from_diagonal(&Vector3::new(1.0, 1.0, d)) * u.transpose();
    let translation = centroid1 - rotation * centroid2;

    let mut matrix = Matrix4::identity();
    matrix.fixed_view_mut::<3, 3>(0, 0).copy_from(&rotation);
    matrix.fixed_view_mut::<3, 1>(0, 3).copy_from(&translation);
    Ok(Transform::new(matrix))
}

/// Root mean square distance between camera-1 positions and transformed
/// camera-2 positions. NaN when `pairs` is empty.
pub fn rmse(transform: &Transform, pairs: &[JointPair]) -> f64 {
    if pairs.is_empty() {
        return f64::NAN;
    }
    let sum: f64 = pairs
        .iter()
        .map(|(p1, p2)| (transform.apply(p2) - p1).norm_squared())
        .sum();
    (sum / pairs.len() as f64).sqrt()
}
