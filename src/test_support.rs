//! Synthetic skeletons shared by unit tests.

use std::time::Duration;

use nalgebra::{Point3, Vector3};

use crate::skeleton::{ConfidenceLevel, Joint, JointId, SensorOrigin, Skeleton};

pub fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

/// Standing pose, pelvis at 1 m height, y up. Left side is -x.
fn rest_pose(joint: JointId) -> Point3<f64> {
    use JointId::*;
    let (x, y, z) = match joint {
        Pelvis => (0.0, 1.0, 0.0),
        SpineNavel => (0.0, 1.2, 0.0),
        SpineChest => (0.0, 1.4, 0.0),
        Neck => (0.0, 1.6, 0.0),
        ClavicleLeft => (-0.05, 1.55, 0.0),
        ShoulderLeft => (-0.2, 1.5, 0.0),
        ElbowLeft => (-0.25, 1.2, 0.0),
        WristLeft => (-0.28, 0.95, 0.0),
        HandLeft => (-0.29, 0.88, 0.0),
        HandTipLeft => (-0.3, 0.8, 0.0),
        ThumbLeft => (-0.26, 0.88, 0.03),
        ClavicleRight => (0.05, 1.55, 0.0),
        ShoulderRight => (0.2, 1.5, 0.0),
        ElbowRight => (0.25, 1.2, 0.0),
        WristRight => (0.28, 0.95, 0.0),
        HandRight => (0.29, 0.88, 0.0),
        HandTipRight => (0.3, 0.8, 0.0),
        ThumbRight => (0.26, 0.88, 0.03),
        HipLeft => (-0.1, 0.95, 0.0),
        KneeLeft => (-0.11, 0.5, 0.0),
        AnkleLeft => (-0.11, 0.08, 0.0),
        FootLeft => (-0.11, 0.02, 0.12),
        HipRight => (0.1, 0.95, 0.0),
        KneeRight => (0.11, 0.5, 0.0),
        AnkleRight => (0.11, 0.08, 0.0),
        FootRight => (0.11, 0.02, 0.12),
        Head => (0.0, 1.75, 0.0),
        Nose => (0.0, 1.75, 0.1),
        EyeLeft => (-0.03, 1.78, 0.08),
        EarLeft => (-0.07, 1.76, 0.0),
        EyeRight => (0.03, 1.78, 0.08),
        EarRight => (0.07, 1.76, 0.0),
    };
    Point3::new(x, y, z)
}

/// A fully confident skeleton whose every bone is `scale` times the rest
/// pose, translated by `offset`.
pub fn skeleton_at(id: u32, scale: f64, offset: Vector3<f64>) -> Skeleton {
    let mut joints = [Joint::default(); JointId::COUNT];
    for joint in JointId::ALL {
        let p = rest_pose(joint);
        joints[joint.index()] = Joint::new(ConfidenceLevel::High, Point3::from(p.coords * scale + offset));
    }
    Skeleton::new(SensorOrigin::Azure, id, joints)
}

pub fn standing_skeleton(id: u32, scale: f64) -> Skeleton {
    skeleton_at(id, scale, Vector3::zeros())
}
