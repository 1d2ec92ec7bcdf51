//! Posture and hand contact heuristics over fused skeletons.
//!
//! Everything here is joint-line geometry: angles between the directions
//! of two joint segments, and closest points between segments.

use std::collections::BTreeMap;

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::config::{HandsProximityConfig, PostureConfig};
use crate::skeleton::{ConfidenceLevel, JointId, Skeleton};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Posture {
    Standing,
    Sitting,
    PointingLeft,
    PointingRight,
    ArmsCrossed,
}

/// Which hands of two bodies are close, first body's hand first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HandsProximity {
    LeftLeft,
    LeftRight,
    RightLeft,
    RightRight,
}

/// Hands of `first` close to hands of `second`. `first == second` means
/// a body's own hands are together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandsContact {
    pub first: u32,
    pub second: u32,
    pub hands: Vec<HandsProximity>,
}

/// A joint segment, from `start` towards `end`.
#[derive(Debug, Clone, Copy)]
struct Segment {
    start: Point3<f64>,
    end: Point3<f64>,
}

impl Segment {
    fn between(skeleton: &Skeleton, start: JointId, end: JointId) -> Self {
        Self {
            start: skeleton.position(start),
            end: skeleton.position(end),
        }
    }

    fn direction(&self) -> Vector3<f64> {
        self.end - self.start
    }

    fn point_at(&self, t: f64) -> Point3<f64> {
        self.start + self.direction() * t
    }

    /// Angle between the two directions, in degrees within [0, 180].
    fn angle_to(&self, other: &Segment) -> f64 {
        self.direction().angle(&other.direction()).to_degrees()
    }

    /// Parameters of the closest points between the two infinite lines.
    /// None for parallel or degenerate lines.
    fn closest_on_lines(&self, other: &Segment) -> Option<(f64, f64)> {
        let d1 = self.direction();
        let d2 = other.direction();
        let r = self.start - other.start;
        let a = d1.dot(&d1);
        let e = d2.dot(&d2);
        let b = d1.dot(&d2);
        let c = d1.dot(&r);
        let f = d2.dot(&r);
        let denom = a * e - b * b;
        if a <= f64::EPSILON || e <= f64::EPSILON || denom.abs() <= f64::EPSILON * a * e {
            return None;
        }
        let s = (b * f - c * e) / denom;
        let t = (b * s + f) / e;
        Some((s, t))
    }

    /// Parameters of the closest points between the two segments.
    fn closest_on_segments(&self, other: &Segment) -> (f64, f64) {
        let d1 = self.direction();
        let d2 = other.direction();
        let r = self.start - other.start;
        let a = d1.dot(&d1);
        let e = d2.dot(&d2);
        let b = d1.dot(&d2);
        let c = d1.dot(&r);
        let f = d2.dot(&r);
        let denom = a * e - b * b;

        let mut s = if denom > f64::EPSILON * a * e {
            ((b * f - c * e) / denom).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let mut t = (b * s + f) / e;
        if t < 0.0 {
            t = 0.0;
            s = (-c / a).clamp(0.0, 1.0);
        } else if t > 1.0 {
            t = 1.0;
            s = ((b - c) / a).clamp(0.0, 1.0);
        }
        (s, t)
    }
}

fn all_valid(skeleton: &Skeleton, joints: &[JointId], minimum: ConfidenceLevel) -> bool {
    joints.iter().all(|&joint| skeleton.joint(joint).is_valid(minimum))
}

/// Detects standing, sitting, pointing and crossed arms.
#[derive(Debug, Clone, Default)]
pub struct BodyPosturesDetector {
    config: PostureConfig,
}

impl BodyPosturesDetector {
    pub fn new(config: PostureConfig) -> Self {
        Self { config }
    }

    /// Postures of every body showing at least one, keyed by body id.
    pub fn process(&self, bodies: &[Skeleton]) -> BTreeMap<u32, Vec<Posture>> {
        bodies
            .iter()
            .map(|body| (body.id, self.detect(body)))
            .filter(|(_, postures)| !postures.is_empty())
            .collect()
    }

    pub fn detect(&self, body: &Skeleton) -> Vec<Posture> {
        let mut postures = Vec::new();
        if self.arms_crossed(body) {
            postures.push(Posture::ArmsCrossed);
        }
        if self.pointing(body, JointId::WristLeft, JointId::ElbowLeft, JointId::ShoulderLeft) {
            postures.push(Posture::PointingLeft);
        }
        if self.pointing(body, JointId::WristRight, JointId::ElbowRight, JointId::ShoulderRight) {
            postures.push(Posture::PointingRight);
        }

        if !all_valid(body, &[JointId::Pelvis, JointId::Neck], self.config.minimum_confidence_level) {
            return postures;
        }
        let spine = Segment::between(body, JointId::Pelvis, JointId::Neck);
        if self.sitting(body, &spine) {
            postures.push(Posture::Sitting);
        }
        if self.standing(body, &spine) {
            postures.push(Posture::Standing);
        }
        postures
    }

    /// The forearms cross when the closest points of their lines lie on
    /// both forearms.
    fn arms_crossed(&self, body: &Skeleton) -> bool {
        use JointId::*;
        if !all_valid(
            body,
            &[WristLeft, ElbowLeft, WristRight, ElbowRight],
            self.config.minimum_confidence_level,
        ) {
            return false;
        }
        let left = Segment::between(body, WristLeft, ElbowLeft);
        let right = Segment::between(body, WristRight, ElbowRight);
        let Some((line_s, line_t)) = left.closest_on_lines(&right) else {
            return false;
        };
        let (seg_s, seg_t) = left.closest_on_segments(&right);

        let tolerance = self.config.minimum_distance_threshold;
        (left.point_at(line_s) - left.point_at(seg_s)).norm() < tolerance
            && (right.point_at(line_t) - right.point_at(seg_t)).norm() < tolerance
    }

    /// Both thighs are bent past the sitting angle against the spine.
    fn sitting(&self, body: &Skeleton, spine: &Segment) -> bool {
        use JointId::*;
        if !all_valid(body, &[KneeLeft, HipLeft, KneeRight, HipRight], self.config.minimum_confidence_level) {
            return false;
        }
        let left = Segment::between(body, KneeLeft, HipLeft);
        let right = Segment::between(body, KneeRight, HipRight);
        spine.angle_to(&left) > self.config.minimum_sitting_degrees
            && spine.angle_to(&right) > self.config.minimum_sitting_degrees
    }

    fn standing(&self, body: &Skeleton, spine: &Segment) -> bool {
        use JointId::*;
        if !all_valid(
            body,
            &[AnkleLeft, HipLeft, AnkleRight, HipRight],
            self.config.minimum_confidence_level,
        ) {
            return false;
        }
        let left = Segment::between(body, AnkleLeft, HipLeft);
        let right = Segment::between(body, AnkleRight, HipRight);
        spine.angle_to(&left) < self.config.maximum_standing_degrees
            && spine.angle_to(&right) < self.config.maximum_standing_degrees
    }

    /// A stretched arm: the forearm and the whole arm point the same way.
    fn pointing(&self, body: &Skeleton, wrist: JointId, elbow: JointId, shoulder: JointId) -> bool {
        if !all_valid(body, &[wrist, elbow, shoulder], self.config.minimum_confidence_level) {
            return false;
        }
        let forearm = Segment::between(body, wrist, elbow);
        let arm = Segment::between(body, wrist, shoulder);
        arm.angle_to(&forearm) < self.config.maximum_pointing_degrees
    }
}

/// Detects hands close to each other, within a body or between bodies.
#[derive(Debug, Clone, Default)]
pub struct HandsProximityDetector {
    config: HandsProximityConfig,
}

impl HandsProximityDetector {
    pub fn new(config: HandsProximityConfig) -> Self {
        Self { config }
    }

    /// Checks every ordered pair of bodies, each body with itself included.
    pub fn process(&self, bodies: &[Skeleton]) -> Vec<HandsContact> {
        bodies
            .iter()
            .flat_map(|first| bodies.iter().map(move |second| (first, second)))
            .filter_map(|(first, second)| self.detect(first, second))
            .collect()
    }

    /// Checks only the given (first, second) id pairs. Pairs naming an
    /// absent body are skipped.
    pub fn process_pairs(&self, bodies: &[Skeleton], pairs: &[(u32, u32)]) -> Vec<HandsContact> {
        let by_id: BTreeMap<u32, &Skeleton> = bodies.iter().map(|body| (body.id, body)).collect();
        pairs
            .iter()
            .filter_map(|(first, second)| Some((*by_id.get(first)?, *by_id.get(second)?)))
            .filter_map(|(first, second)| self.detect(first, second))
            .collect()
    }

    /// Contacts between the hands of two bodies, or None when no pair of
    /// hands is close. A body against itself only reports its left hand
    /// meeting its right hand.
    pub fn detect(&self, first: &Skeleton, second: &Skeleton) -> Option<HandsContact> {
        let (left1, right1) = self.hands(first)?;
        let (left2, right2) = self.hands(second)?;

        let close = |a: &Point3<f64>, b: &Point3<f64>| nalgebra::distance(a, b) <= self.config.minimum_distance_threshold;
        let mut hands = Vec::new();
        if first.id == second.id {
            if close(&left1, &right2) {
                hands.push(HandsProximity::LeftRight);
            }
        } else {
            let checks = [
                (HandsProximity::LeftLeft, &left1, &left2),
                (HandsProximity::LeftRight, &left1, &right2),
                (HandsProximity::RightLeft, &right1, &left2),
                (HandsProximity::RightRight, &right1, &right2),
            ];
            hands.extend(checks.into_iter().filter(|(_, a, b)| close(*a, *b)).map(|(kind, _, _)| kind));
        }

        (!hands.is_empty()).then(|| HandsContact {
            first: first.id,
            second: second.id,
            hands,
        })
    }

    /// Hand positions, when both hands are seen above the minimum level.
    fn hands(&self, body: &Skeleton) -> Option<(Point3<f64>, Point3<f64>)> {
        let left = body.joint(JointId::HandLeft);
        let right = body.joint(JointId::HandRight);
        let minimum = self.config.minimum_confidence_level;
        (left.confidence > minimum && right.confidence > minimum).then_some((left.position, right.position))
    }
}
