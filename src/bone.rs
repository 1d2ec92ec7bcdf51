use serde::{Deserialize, Serialize};

use crate::skeleton::{ConfidenceLevel, JointId, Skeleton};
use crate::utils::euclidean;

/// A (child, parent) joint pair whose length is stable for a given person.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Bone {
    pub child: JointId,
    pub parent: JointId,
}

impl Bone {
    pub const fn new(child: JointId, parent: JointId) -> Self {
        Self { child, parent }
    }

    /// Live length of this bone, if both endpoints reach `minimum` confidence.
    pub fn length(&self, skeleton: &Skeleton, minimum: ConfidenceLevel) -> Option<f64> {
        let child = skeleton.joint(self.child);
        let parent = skeleton.joint(self.parent);
        if child.is_valid(minimum) && parent.is_valid(minimum) {
            Some(euclidean(&parent.position, &child.position))
        } else {
            None
        }
    }

    /// Length regardless of confidence.
    pub fn raw_length(&self, skeleton: &Skeleton) -> f64 {
        euclidean(&skeleton.position(self.parent), &skeleton.position(self.child))
    }
}

/// Torso, arms down to the wrists, legs down to the feet, and the head.
/// Hands and face joints are too noisy to be used as a signature.
pub fn default_bones() -> Vec<Bone> {
    use JointId::*;
    vec![
        Bone::new(SpineNavel, Pelvis),
        Bone::new(SpineChest, SpineNavel),
        Bone::new(Neck, SpineChest),
        Bone::new(ClavicleLeft, SpineChest),
        Bone::new(ShoulderLeft, ClavicleLeft),
        Bone::new(ElbowLeft, ShoulderLeft),
        Bone::new(WristLeft, ElbowLeft),
        Bone::new(ClavicleRight, SpineChest),
        Bone::new(ShoulderRight, ClavicleRight),
        Bone::new(ElbowRight, ShoulderRight),
        Bone::new(WristRight, ElbowRight),
        Bone::new(HipLeft, Pelvis),
        Bone::new(KneeLeft, HipLeft),
        Bone::new(AnkleLeft, KneeLeft),
        Bone::new(FootLeft, AnkleLeft),
        Bone::new(HipRight, Pelvis),
        Bone::new(KneeRight, HipRight),
        Bone::new(AnkleRight, KneeRight),
        Bone::new(FootRight, AnkleRight),
        Bone::new(Head, Neck),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::{Joint, SensorOrigin};
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    fn skeleton_with(confidence: ConfidenceLevel) -> Skeleton {
        let mut joints = [Joint::default(); JointId::COUNT];
        joints[JointId::Pelvis.index()] = Joint::new(confidence, Point3::new(0.0, 1.0, 2.0));
        joints[JointId::SpineNavel.index()] = Joint::new(confidence, Point3::new(0.0, 1.2, 2.0));
        Skeleton::new(SensorOrigin::Azure, 1, joints)
    }

    #[test]
    fn test_bone_length_confident() {
        let bone = Bone::new(JointId::SpineNavel, JointId::Pelvis);
        let length = bone.length(&skeleton_with(ConfidenceLevel::Medium), ConfidenceLevel::Low);
        assert_relative_eq!(length.unwrap(), 0.2, epsilon = 1e-12);
    }

    #[test]
    fn test_bone_length_requires_both_endpoints() {
        let bone = Bone::new(JointId::SpineNavel, JointId::Pelvis);
        let mut skeleton = skeleton_with(ConfidenceLevel::High);
        skeleton.joint_mut(JointId::SpineNavel).confidence = ConfidenceLevel::None;
        assert!(bone.length(&skeleton, ConfidenceLevel::Low).is_none());
        assert_relative_eq!(bone.raw_length(&skeleton), 0.2, epsilon = 1e-12);
    }

    #[test]
    fn test_default_bones_are_distinct() {
        let bones = default_bones();
        assert_eq!(bones.len(), 20);
        for bone in &bones {
            assert_ne!(bone.child, bone.parent);
        }
        let mut sorted = bones.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), bones.len());
    }
}
