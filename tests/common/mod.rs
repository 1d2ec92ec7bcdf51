#![allow(dead_code)]

use std::time::Duration;

use bodytrack::{ConfidenceLevel, Joint, JointId, SensorOrigin, Skeleton};
use nalgebra::{Point3, Vector3};

/// Standing pose in `JointId` order, pelvis at 1 m height.
const REST_POSE: [(f64, f64, f64); JointId::COUNT] = [
    (0.0, 1.0, 0.0),
    (0.0, 1.2, 0.0),
    (0.0, 1.4, 0.0),
    (0.0, 1.6, 0.0),
    (-0.05, 1.55, 0.0),
    (-0.2, 1.5, 0.0),
    (-0.25, 1.2, 0.0),
    (-0.28, 0.95, 0.0),
    (-0.29, 0.88, 0.0),
    (-0.3, 0.8, 0.0),
    (-0.26, 0.88, 0.03),
    (0.05, 1.55, 0.0),
    (0.2, 1.5, 0.0),
    (0.25, 1.2, 0.0),
    (0.28, 0.95, 0.0),
    (0.29, 0.88, 0.0),
    (0.3, 0.8, 0.0),
    (0.26, 0.88, 0.03),
    (-0.1, 0.95, 0.0),
    (-0.11, 0.5, 0.0),
    (-0.11, 0.08, 0.0),
    (-0.11, 0.02, 0.12),
    (0.1, 0.95, 0.0),
    (0.11, 0.5, 0.0),
    (0.11, 0.08, 0.0),
    (0.11, 0.02, 0.12),
    (0.0, 1.75, 0.0),
    (0.0, 1.75, 0.1),
    (-0.03, 1.78, 0.08),
    (-0.07, 1.76, 0.0),
    (0.03, 1.78, 0.08),
    (0.07, 1.76, 0.0),
];

pub fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

/// Fully confident person of body size `scale`, standing at `offset`.
pub fn person(id: u32, scale: f64, offset: Vector3<f64>) -> Skeleton {
    let mut joints = [Joint::default(); JointId::COUNT];
    for (joint, &(x, y, z)) in joints.iter_mut().zip(REST_POSE.iter()) {
        let position = Point3::new(x, y, z) * scale + offset;
        *joint = Joint::new(ConfidenceLevel::High, position);
    }
    Skeleton::new(SensorOrigin::Azure, id, joints)
}

pub fn person_at(id: u32, x: f64) -> Skeleton {
    person(id, 1.0, Vector3::new(x, 0.0, 0.0))
}
