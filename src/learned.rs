use std::collections::BTreeMap;
use std::time::Duration;

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use crate::bone::Bone;
use crate::skeleton::{ConfidenceLevel, Skeleton};
use crate::utils::std_dev;

/// Confirmed identity with its learned bone length signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnedBody {
    pub id: u32,
    /// Representative length per bone. 0.0 means no usable signal.
    #[serde(with = "bone_map")]
    bones: BTreeMap<Bone, f64>,
    pub last_seen: Duration,
    pub last_position: Point3<f64>,
}

impl LearnedBody {
    pub fn new(id: u32, bones: BTreeMap<Bone, f64>) -> Self {
        Self {
            id,
            bones,
            last_seen: Duration::ZERO,
            last_position: Point3::origin(),
        }
    }

    pub fn bones(&self) -> &BTreeMap<Bone, f64> {
        &self.bones
    }

    pub fn bone(&self, bone: &Bone) -> f64 {
        self.bones.get(bone).copied().unwrap_or(0.0)
    }

    /// Records a sighting of this identity.
    pub fn touch(&mut self, now: Duration, skeleton: &Skeleton) {
        self.last_seen = now;
        self.last_position = skeleton.pelvis();
    }

    pub fn lost_for(&self, now: Duration) -> Duration {
        now.saturating_sub(self.last_seen)
    }

    /// Spread of the differences between the live bone lengths of `skeleton`
    /// and this profile, over bones with a learned signal whose endpoints
    /// reach `minimum`.
    pub fn live_deviation(&self, skeleton: &Skeleton, minimum: ConfidenceLevel) -> f64 {
        let diffs: Vec<f64> = self
            .bones
            .iter()
            .filter(|(_, &learned)| learned > 0.0)
            .filter_map(|(bone, &learned)| bone.length(skeleton, minimum).map(|live| (live - learned).abs()))
            .collect();
        std_dev(&diffs)
    }

    /// Whether a live skeleton still matches this profile.
    pub fn seems_the_same(&self, skeleton: &Skeleton, max_deviation: f64, minimum: ConfidenceLevel) -> bool {
        self.live_deviation(skeleton, minimum) < max_deviation
    }

    /// Spread of bone differences against another profile, over bones both
    /// profiles have a signal for. NaN when fewer than two bones overlap.
    pub fn process_difference(&self, other: &LearnedBody) -> f64 {
        let diffs: Vec<f64> = self
            .bones
            .iter()
            .filter(|(_, &mine)| mine > 0.0)
            .filter_map(|(bone, &mine)| {
                let theirs = other.bone(bone);
                (theirs > 0.0).then(|| (mine - theirs).abs())
            })
            .collect();
        std_dev(&diffs)
    }

    pub fn is_same_as(&self, other: &LearnedBody, max_deviation: f64) -> bool {
        self.process_difference(other) < max_deviation
    }

    /// Id of the candidate with the smallest profile difference, provided it
    /// does not exceed `max_deviation`.
    pub fn find_closest<'a, I>(&self, candidates: I, max_deviation: f64) -> Option<u32>
    where
        I: IntoIterator<Item = &'a LearnedBody>,
    {
        candidates
            .into_iter()
            .map(|candidate| (self.process_difference(candidate), candidate.id))
            .filter(|(difference, _)| !difference.is_nan())
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .filter(|(difference, _)| *difference <= max_deviation)
            .map(|(_, id)| id)
    }
}

mod bone_map {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serializer};

    use crate::bone::Bone;

    pub fn serialize<S: Serializer>(map: &BTreeMap<Bone, f64>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(map.iter())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BTreeMap<Bone, f64>, D::Error> {
        let pairs: Vec<(Bone, f64)> = Vec::deserialize(deserializer)?;
        Ok(pairs.into_iter().collect())
    }
}
