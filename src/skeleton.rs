use std::collections::BTreeMap;

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use crate::error::{BodyError, Result};

/// Body tracking joints, in the order depth sensors report them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(usize)]
pub enum JointId {
    Pelvis = 0,
    SpineNavel,
    SpineChest,
    Neck,
    ClavicleLeft,
    ShoulderLeft,
    ElbowLeft,
    WristLeft,
    HandLeft,
    HandTipLeft,
    ThumbLeft,
    ClavicleRight,
    ShoulderRight,
    ElbowRight,
    WristRight,
    HandRight,
    HandTipRight,
    ThumbRight,
    HipLeft,
    KneeLeft,
    AnkleLeft,
    FootLeft,
    HipRight,
    KneeRight,
    AnkleRight,
    FootRight,
    Head,
    Nose,
    EyeLeft,
    EarLeft,
    EyeRight,
    EarRight,
}

impl JointId {
    pub const COUNT: usize = 32;

    pub const ALL: [JointId; JointId::COUNT] = [
        JointId::Pelvis,
        JointId::SpineNavel,
        JointId::SpineChest,
        JointId::Neck,
        JointId::ClavicleLeft,
        JointId::ShoulderLeft,
        JointId::ElbowLeft,
        JointId::WristLeft,
        JointId::HandLeft,
        JointId::HandTipLeft,
        JointId::ThumbLeft,
        JointId::ClavicleRight,
        JointId::ShoulderRight,
        JointId::ElbowRight,
        JointId::WristRight,
        JointId::HandRight,
        JointId::HandTipRight,
        JointId::ThumbRight,
        JointId::HipLeft,
        JointId::KneeLeft,
        JointId::AnkleLeft,
        JointId::FootLeft,
        JointId::HipRight,
        JointId::KneeRight,
        JointId::AnkleRight,
        JointId::FootRight,
        JointId::Head,
        JointId::Nose,
        JointId::EyeLeft,
        JointId::EarLeft,
        JointId::EyeRight,
        JointId::EarRight,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

/// Ordered joint confidence as reported by the body tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    #[default]
    None = 0,
    Low = 1,
    Medium = 2,
    High = 3,
}

impl ConfidenceLevel {
    /// Buckets a normalized detector score (0.0..=1.0).
    pub fn from_score(score: f32) -> Self {
        if score <= 0.0 {
            ConfidenceLevel::None
        } else if score < 0.33 {
            ConfidenceLevel::Low
        } else if score < 0.66 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::High
        }
    }

    pub fn weight(self) -> u32 {
        self as u32
    }
}

/// Device that produced a skeleton. Passed through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorOrigin {
    Nuitrack,
    Azure,
    TeslaSuit,
}

/// A single joint: confidence plus position in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Joint {
    pub confidence: ConfidenceLevel,
    pub position: Point3<f64>,
}

impl Joint {
    pub fn new(confidence: ConfidenceLevel, position: Point3<f64>) -> Self {
        Self { confidence, position }
    }

    pub fn is_valid(&self, minimum: ConfidenceLevel) -> bool {
        self.confidence >= minimum
    }
}

impl Default for Joint {
    fn default() -> Self {
        Self::new(ConfidenceLevel::None, Point3::origin())
    }
}

/// One per-frame body detection.
///
/// Every joint of [`JointId::ALL`] is always present, so lookups never fail.
/// Skeletons coming from a joint map go through [`Skeleton::from_joints`],
/// which rejects incomplete maps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SkeletonRecord", into = "SkeletonRecord")]
pub struct Skeleton {
    /// Camera-local or global identity. 0 is the "no identity" sentinel.
    pub id: u32,
    pub origin: SensorOrigin,
    joints: [Joint; JointId::COUNT],
}

impl Skeleton {
    pub fn new(origin: SensorOrigin, id: u32, joints: [Joint; JointId::COUNT]) -> Self {
        Self { id, origin, joints }
    }

    /// Builds a skeleton from a joint map, failing on the first missing joint.
    pub fn from_joints<I>(origin: SensorOrigin, id: u32, joints: I) -> Result<Self>
    where
        I: IntoIterator<Item = (JointId, Joint)>,
    {
        let mut slots: [Option<Joint>; JointId::COUNT] = [None; JointId::COUNT];
        for (joint_id, joint) in joints {
            slots[joint_id.index()] = Some(joint);
        }

        let mut out = [Joint::default(); JointId::COUNT];
        for joint_id in JointId::ALL {
            out[joint_id.index()] = slots[joint_id.index()].ok_or(BodyError::MissingJoint(joint_id))?;
        }
        Ok(Self::new(origin, id, out))
    }

    pub fn joint(&self, joint_id: JointId) -> &Joint {
        &self.joints[joint_id.index()]
    }

    pub fn joint_mut(&mut self, joint_id: JointId) -> &mut Joint {
        &mut self.joints[joint_id.index()]
    }

    pub fn position(&self, joint_id: JointId) -> Point3<f64> {
        self.joint(joint_id).position
    }

    pub fn joints(&self) -> impl Iterator<Item = (JointId, &Joint)> {
        JointId::ALL.iter().map(move |&j| (j, self.joint(j)))
    }

    pub fn joints_mut(&mut self) -> impl Iterator<Item = &mut Joint> {
        self.joints.iter_mut()
    }

    /// Sum of joint confidence weights, used to rank two views of one body.
    pub fn accumulated_confidence(&self) -> u32 {
        self.joints.iter().map(|j| j.confidence.weight()).sum()
    }

    /// Pelvis position, the reference point remembered for each identity.
    pub fn pelvis(&self) -> Point3<f64> {
        self.position(JointId::Pelvis)
    }
}

/// Serialized form of a skeleton: joints keyed by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SkeletonRecord {
    id: u32,
    origin: SensorOrigin,
    joints: BTreeMap<JointId, Joint>,
}

impl TryFrom<SkeletonRecord> for Skeleton {
    type Error = BodyError;

    fn try_from(record: SkeletonRecord) -> Result<Self> {
        Skeleton::from_joints(record.origin, record.id, record.joints)
    }
}

impl From<Skeleton> for SkeletonRecord {
    fn from(skeleton: Skeleton) -> Self {
        let joints = skeleton.joints().map(|(id, joint)| (id, *joint)).collect();
        SkeletonRecord {
            id: skeleton.id,
            origin: skeleton.origin,
            joints,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_joint_map() -> Vec<(JointId, Joint)> {
        JointId::ALL
            .iter()
            .map(|&j| (j, Joint::new(ConfidenceLevel::High, Point3::new(j.index() as f64, 0.0, 0.0))))
            .collect()
    }

    #[test]
    fn test_joint_index_roundtrip() {
        for (i, joint) in JointId::ALL.iter().enumerate() {
            assert_eq!(joint.index(), i);
            assert_eq!(JointId::from_index(i), Some(*joint));
        }
        assert_eq!(JointId::from_index(JointId::COUNT), None);
    }

    #[test]
    fn test_confidence_ordering() {
        assert!(ConfidenceLevel::None < ConfidenceLevel::Low);
        assert!(ConfidenceLevel::Low < ConfidenceLevel::Medium);
        assert!(ConfidenceLevel::Medium < ConfidenceLevel::High);
    }

    #[test]
    fn test_confidence_from_score() {
        assert_eq!(ConfidenceLevel::from_score(0.0), ConfidenceLevel::None);
        assert_eq!(ConfidenceLevel::from_score(0.1), ConfidenceLevel::Low);
        assert_eq!(ConfidenceLevel::from_score(0.5), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_score(0.9), ConfidenceLevel::High);
    }

    #[test]
    fn test_from_joints_complete() {
        let skeleton = Skeleton::from_joints(SensorOrigin::Azure, 4, full_joint_map()).unwrap();
        assert_eq!(skeleton.id, 4);
        assert_eq!(skeleton.position(JointId::Neck).x, JointId::Neck.index() as f64);
        assert_eq!(skeleton.accumulated_confidence(), 3 * JointId::COUNT as u32);
    }

    #[test]
    fn test_from_joints_missing_joint_fails() {
        let joints: Vec<_> = full_joint_map()
            .into_iter()
            .filter(|(j, _)| *j != JointId::Head)
            .collect();
        let err = Skeleton::from_joints(SensorOrigin::Azure, 1, joints).unwrap_err();
        assert!(matches!(err, BodyError::MissingJoint(JointId::Head)));
    }

    #[test]
    fn test_serde_rejects_incomplete_skeleton() {
        let json = r#"{"id":1,"origin":"Azure","joints":{"Pelvis":{"confidence":"High","position":[0.0,0.0,0.0]}}}"#;
        assert!(serde_json::from_str::<Skeleton>(json).is_err());
    }

    #[test]
    fn test_serde_keeps_joints() {
        let skeleton = Skeleton::from_joints(SensorOrigin::Nuitrack, 9, full_joint_map()).unwrap();
        let json = serde_json::to_string(&skeleton).unwrap();
        let back: Skeleton = serde_json::from_str(&json).unwrap();
        assert_eq!(back, skeleton);
    }
}
