use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::config::IdentificationConfig;
use crate::learned::LearnedBody;
use crate::learning::LearningBody;
use crate::skeleton::Skeleton;

/// Everything one frame produces.
#[derive(Debug, Clone, Default)]
pub struct IdentificationOutput {
    /// Skeletons carrying a confirmed identity. Always emitted, possibly empty.
    pub identified: Vec<Skeleton>,
    /// Identities confirmed during this frame. Empty means nothing to emit.
    pub learned: Vec<LearnedBody>,
    /// Identities evicted during this frame. Empty means nothing to emit.
    pub removed: Vec<u32>,
}

/// Gives stable identities to the skeletons of one camera.
///
/// Camera trackers reuse their local ids and lose bodies on occlusion. A
/// local id is only confirmed once its bone lengths have been learned; a
/// newly learned body is first compared against confirmed identities that
/// are not visible, so a person coming back under a different local id gets
/// the identity it had before.
///
/// Frames must be fed in non-decreasing timestamp order, one at a time.
pub struct BodiesIdentification {
    config: IdentificationConfig,
    /// Local id -> confirmed identity it stands for.
    correspondence: HashMap<u32, u32>,
    learned_bodies: HashMap<u32, LearnedBody>,
    learning_bodies: HashMap<u32, LearningBody>,
}

impl BodiesIdentification {
    pub fn new(config: IdentificationConfig) -> Self {
        Self {
            config,
            correspondence: HashMap::new(),
            learned_bodies: HashMap::new(),
            learning_bodies: HashMap::new(),
        }
    }

    pub fn config(&self) -> &IdentificationConfig {
        &self.config
    }

    pub fn learned_bodies(&self) -> &HashMap<u32, LearnedBody> {
        &self.learned_bodies
    }

    pub fn is_learning(&self, local_id: u32) -> bool {
        self.learning_bodies.contains_key(&local_id)
    }

    /// Confirmed identity a local id currently maps to, if any.
    pub fn identity_of(&self, local_id: u32) -> Option<u32> {
        match self.correspondence.get(&local_id) {
            Some(&global) => Some(global),
            None => self.learned_bodies.contains_key(&local_id).then_some(local_id),
        }
    }

    /// Process one frame of camera-local detections taken at `now`.
    pub fn process(&mut self, mut bodies: Vec<Skeleton>, now: Duration) -> IdentificationOutput {
        let frame_ids: Vec<u32> = bodies.iter().map(|b| b.id).collect();
        let mut removed = self.stale_ids(now);
        self.remove_ids(&removed);

        // Ids already accounted for this frame, global and local.
        let mut visible: HashSet<u32> = HashSet::new();
        let mut identified = vec![false; bodies.len()];
        let mut mismatched = Vec::new();

        for (i, body) in bodies.iter_mut().enumerate() {
            if let Some(&global) = self.correspondence.get(&body.id) {
                if let Some(profile) = self.learned_bodies.get_mut(&global) {
                    visible.insert(global);
                    visible.insert(body.id);
                    body.id = global;
                    profile.touch(now, body);
                    identified[i] = true;
                    continue;
                }
                // Removal always drops correspondences to the removed id.
                log::warn!("local id {} pointed to unknown identity {}", body.id, global);
                self.correspondence.remove(&body.id);
            } else if let Some(profile) = self.learned_bodies.get_mut(&body.id) {
                let recent = profile.lost_for(now) < self.config.maximum_lost_time();
                if recent
                    || profile.seems_the_same(
                        body,
                        self.config.maximum_deviation_allowed,
                        self.config.minimum_confidence_level_for_learning,
                    )
                {
                    profile.touch(now, body);
                    visible.insert(body.id);
                    identified[i] = true;
                } else {
                    log::debug!("identity {} no longer matches its profile", body.id);
                    mismatched.push(body.id);
                }
            }
        }

        if !mismatched.is_empty() {
            self.remove_ids(&mismatched);
            removed.extend(mismatched);
        }

        let mut learned = Vec::new();
        for (body, _) in bodies.iter().zip(&identified).filter(|(_, &done)| !done) {
            if let Some(profile) = self.process_learning_body(body, now, &mut visible) {
                learned.push(profile);
            }
        }
        self.learning_bodies.retain(|id, _| frame_ids.contains(id));

        self.check_correspondence_collision(&frame_ids);

        let identified = bodies
            .into_iter()
            .zip(identified)
            .filter_map(|(body, done)| done.then_some(body))
            .collect();

        IdentificationOutput {
            identified,
            learned,
            removed,
        }
    }

    /// Feeds a body that has no confirmed identity into its learning window.
    /// Returns the profile when it matures into a brand-new identity.
    fn process_learning_body(
        &mut self,
        body: &Skeleton,
        now: Duration,
        visible: &mut HashSet<u32>,
    ) -> Option<LearnedBody> {
        let bones = &self.config.bones_used_for_correspondence;
        let learning = self.learning_bodies.entry(body.id).or_insert_with(|| {
            log::debug!("start learning local id {}", body.id);
            LearningBody::new(body.id, now, bones)
        });

        if learning.still_learning(
            now,
            self.config.maximum_identification_time(),
            self.config.minimum_bones_for_identification,
        ) {
            learning.add_sample(body, self.config.minimum_confidence_level_for_learning);
            return None;
        }

        let learning = self.learning_bodies.remove(&body.id)?;
        let mut profile = learning.generate_learned_body(self.config.maximum_deviation_allowed);
        profile.touch(now, body);

        let hidden = self.learned_bodies.values().filter(|b| !visible.contains(&b.id));
        match profile.find_closest(hidden, self.config.maximum_deviation_allowed) {
            Some(global) => {
                log::debug!("local id {} recognized as identity {}", body.id, global);
                self.correspondence.insert(body.id, global);
                visible.insert(global);
                None
            }
            None => {
                log::info!("new identity {}", body.id);
                self.learned_bodies.insert(body.id, profile.clone());
                visible.insert(body.id);
                Some(profile)
            }
        }
    }

    fn stale_ids(&self, now: Duration) -> Vec<u32> {
        let max_lost = self.config.maximum_lost_time();
        let mut ids: Vec<u32> = self
            .learned_bodies
            .values()
            .filter(|b| b.lost_for(now) > max_lost)
            .map(|b| b.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    fn remove_ids(&mut self, ids: &[u32]) {
        for id in ids {
            self.learned_bodies.remove(id);
            self.correspondence.remove(id);
            self.correspondence.retain(|_, global| global != id);
        }
    }

    /// Drops a correspondence when the identity it points to is itself
    /// visible under its own id in this frame.
    fn check_correspondence_collision(&mut self, frame_ids: &[u32]) {
        let colliding: Vec<u32> = frame_ids
            .iter()
            .filter(|id| {
                self.correspondence
                    .get(id)
                    .is_some_and(|global| frame_ids.contains(global))
            })
            .copied()
            .collect();
        for id in colliding {
            log::debug!("local id {} collides with a visible identity", id);
            self.correspondence.remove(&id);
        }
    }
}
