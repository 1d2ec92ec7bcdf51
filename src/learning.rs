use std::collections::BTreeMap;
use std::time::Duration;

use crate::bone::Bone;
use crate::learned::LearnedBody;
use crate::skeleton::{ConfidenceLevel, Skeleton};
use crate::utils::mean_std_dev;

/// Bone length samples collected for a camera-local id that has not been
/// confirmed yet.
#[derive(Debug, Clone)]
pub struct LearningBody {
    pub id: u32,
    pub creation_time: Duration,
    samples: BTreeMap<Bone, Vec<f64>>,
}

impl LearningBody {
    pub fn new(id: u32, creation_time: Duration, bones: &[Bone]) -> Self {
        let samples = bones.iter().map(|&bone| (bone, Vec::new())).collect();
        Self { id, creation_time, samples }
    }

    /// Appends one length per bone whose endpoints both reach `minimum`.
    pub fn add_sample(&mut self, skeleton: &Skeleton, minimum: ConfidenceLevel) {
        for (bone, lengths) in self.samples.iter_mut() {
            if let Some(length) = bone.length(skeleton, minimum) {
                lengths.push(length);
            }
        }
    }

    /// Number of bones with at least one sample.
    pub fn sampled_bones(&self) -> usize {
        self.samples.values().filter(|s| !s.is_empty()).count()
    }

    pub fn samples(&self, bone: &Bone) -> &[f64] {
        self.samples.get(bone).map(Vec::as_slice).unwrap_or(&[])
    }

    /// True while the learning window is open: either too little time has
    /// elapsed or too few bones have been observed.
    pub fn still_learning(&self, now: Duration, duration: Duration, minimum_bones: usize) -> bool {
        now.saturating_sub(self.creation_time) < duration || self.sampled_bones() < minimum_bones
    }

    /// Builds the learned profile. Bones whose samples spread more than
    /// `max_std_dev` (or have fewer than two samples) get 0.0, meaning "no
    /// signal".
    pub fn generate_learned_body(&self, max_std_dev: f64) -> LearnedBody {
        let bones = self
            .samples
            .iter()
            .map(|(&bone, lengths)| {
                let (mean, std) = mean_std_dev(lengths);
                let learned = if std < max_std_dev { mean } else { 0.0 };
                (bone, learned)
            })
            .collect();
        LearnedBody::new(self.id, bones)
    }
}
