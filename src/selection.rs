use std::collections::{BTreeMap, HashMap, HashSet};

use crate::config::SelectionConfig;
use crate::correspondence::{Camera, CorrespondenceMap, NotPairable, PairKey, PairState};
use crate::error::{BodyError, Result};
use crate::learned::LearnedBody;
use crate::skeleton::{ConfidenceLevel, Skeleton};
use crate::transform::Transform;
use crate::utils::{euclidean, nan_last_lt};

/// Result of one fused tick.
#[derive(Debug, Clone, Default)]
pub struct SelectionOutput {
    /// One skeleton per fused identity seen this tick, in camera-1 space,
    /// tagged with its fused id.
    pub bodies: Vec<Skeleton>,
    /// Fused ids dropped while reconciling this tick's pairs.
    pub removed: Vec<u32>,
}

/// Fuses the identified bodies of two cameras into one set of identities.
///
/// Each tick, camera-1 bodies are paired with their nearest camera-2 body
/// (reference joint distance after moving camera-2 into camera-1 space).
/// Pairs are reconciled against a persistent correspondence map, and when
/// two pairs claim the same body the learned bone lengths decide. For each
/// fused identity the better of the two views is emitted.
pub struct BodiesSelection {
    config: SelectionConfig,
    transform: Option<Transform>,
    map: CorrespondenceMap,
    not_pairable: NotPairable,
    camera1_learned: HashMap<u32, LearnedBody>,
    camera2_learned: HashMap<u32, LearnedBody>,
}

impl BodiesSelection {
    pub fn new(config: SelectionConfig) -> Self {
        let transform = config.camera2_to_camera1;
        Self {
            config,
            transform,
            map: CorrespondenceMap::new(),
            not_pairable: NotPairable::default(),
            camera1_learned: HashMap::new(),
            camera2_learned: HashMap::new(),
        }
    }

    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    /// Whether the transform was fixed by configuration, in which case no
    /// calibration stream needs to be joined.
    pub fn has_fixed_transform(&self) -> bool {
        self.config.camera2_to_camera1.is_some()
    }

    pub fn transform(&self) -> Option<&Transform> {
        self.transform.as_ref()
    }

    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = Some(transform);
    }

    pub fn correspondence(&self) -> &CorrespondenceMap {
        &self.map
    }

    pub fn not_pairable(&self) -> &NotPairable {
        &self.not_pairable
    }

    pub fn learned(&self, camera: Camera) -> &HashMap<u32, LearnedBody> {
        match camera {
            Camera::First => &self.camera1_learned,
            Camera::Second => &self.camera2_learned,
        }
    }

    fn learned_mut(&mut self, camera: Camera) -> &mut HashMap<u32, LearnedBody> {
        match camera {
            Camera::First => &mut self.camera1_learned,
            Camera::Second => &mut self.camera2_learned,
        }
    }

    /// Caches newly learned profiles of one camera. The newest profile of
    /// an id replaces any cached one.
    pub fn add_learned_bodies(&mut self, camera: Camera, bodies: Vec<LearnedBody>) {
        let cache = self.learned_mut(camera);
        for body in bodies {
            if let Some(previous) = cache.insert(body.id, body) {
                log::debug!("{:?} camera profile {} relearned", camera, previous.id);
            }
        }
    }

    /// Forgets local ids removed by one camera's tracker. Returns the fused
    /// ids that disappear with them.
    pub fn remove_bodies(&mut self, camera: Camera, ids: &[u32]) -> Vec<u32> {
        let mut removed = Vec::new();
        for &id in ids {
            self.learned_mut(camera).remove(&id);
            self.not_pairable.forget(camera, id);
            removed.extend(self.map.remove_local(camera, id));
        }
        if !removed.is_empty() {
            log::info!("{:?} camera removal drops fused ids {:?}", camera, removed);
        }
        removed
    }

    /// Process one pair of frames.
    pub fn process(&mut self, camera1: Vec<Skeleton>, camera2: Vec<Skeleton>) -> Result<SelectionOutput> {
        let frame1: BTreeMap<u32, Skeleton> = camera1.into_iter().map(|b| (b.id, b)).collect();
        let frame2: BTreeMap<u32, Skeleton> = camera2.into_iter().map(|b| (b.id, b)).collect();

        let proposals = self.compute_correspondence(&frame1, &frame2);
        let removed = self.update_correspondence(&proposals);
        let bodies = self.select_best_bodies(&frame1, &frame2)?;

        Ok(SelectionOutput { bodies, removed })
    }

    /// Proposes one pair per visible body: each camera-1 body with its
    /// nearest pairable camera-2 body when close enough, unmatched bodies
    /// with the 0 sentinel on the other side.
    pub fn compute_correspondence(
        &mut self,
        frame1: &BTreeMap<u32, Skeleton>,
        frame2: &BTreeMap<u32, Skeleton>,
    ) -> Vec<PairKey> {
        let Some(transform) = self.transform else {
            return Vec::new();
        };
        if frame1.is_empty() && frame2.is_empty() {
            return Vec::new();
        }

        let joint = self.config.joint_used_for_correspondence;
        let mut proposals = Vec::with_capacity(frame1.len() + frame2.len());
        let mut claimed = HashSet::new();

        // 0 is the "not seen" side of a pair, never a body
        for (&id1, body1) in frame1.range(1..) {
            let reference = body1.position(joint);
            let mut candidates: Vec<(f64, u32)> = frame2
                .range(1..)
                .filter(|&(&id2, _)| !self.not_pairable.contains(id1, id2))
                .map(|(&id2, body2)| (euclidean(&reference, &transform.apply(&body2.position(joint))), id2))
                .collect();
            candidates.sort_by(|a, b| a.0.total_cmp(&b.0));

            for &(distance, id2) in &candidates {
                if distance > self.config.not_pairable_distance_threshold && self.not_pairable.insert(id1, id2) {
                    log::debug!("({}, {}) not pairable, {:.2} m apart", id1, id2, distance);
                }
            }

            match candidates.first() {
                Some(&(distance, id2)) if distance < self.config.max_distance => {
                    proposals.push(PairKey::new(id1, id2));
                    claimed.insert(id2);
                }
                _ => proposals.push(PairKey::only_first(id1)),
            }
        }

        for &id2 in frame2.range(1..).map(|(id, _)| id) {
            if !claimed.contains(&id2) {
                proposals.push(PairKey::only_second(id2));
            }
        }
        proposals
    }

    /// Reconciles proposals with the persistent map. Returns the fused ids
    /// dropped on the way.
    pub fn update_correspondence(&mut self, proposals: &[PairKey]) -> Vec<u32> {
        let mut removed = Vec::new();
        for &key in proposals {
            match self.map.classify(&key) {
                PairState::AlreadyExist => {}
                PairState::GoodToInsert => {
                    self.map.insert_new(key);
                }
                PairState::Replace(existing) => {
                    log::debug!("{} completes {}", key, existing);
                    removed.extend(self.map.integrate(existing, key));
                }
                PairState::KeyAlreadyInserted(existing) => {
                    removed.extend(self.resolve_conflict(key, existing));
                }
            }
        }
        removed
    }

    /// The proposal and an existing two-sided pair share one id. That id is
    /// compared, by learned bone lengths, with the two candidates on the
    /// other side and the closer candidate keeps the pair. The loser stays
    /// mapped on its own so it is still emitted while visible.
    fn resolve_conflict(&mut self, proposed: PairKey, existing: PairKey) -> Vec<u32> {
        let (shared, other) = if proposed.camera1 == existing.camera1 {
            (Camera::First, Camera::Second)
        } else {
            (Camera::Second, Camera::First)
        };
        let wins = self.proposal_wins(proposed, existing, shared, other);

        if wins {
            // a body already mapped on its own brings its fused id along
            let source = match self.map.entry_of(other, proposed.side(other)) {
                Some(entry) if !entry.is_two_sided() => entry,
                _ => existing,
            };
            self.map.integrate(source, proposed)
        } else {
            let loser = match other {
                Camera::First => PairKey::only_first(proposed.camera1),
                Camera::Second => PairKey::only_second(proposed.camera2),
            };
            if self.map.classify(&loser) == PairState::GoodToInsert {
                self.map.insert_new(loser);
            }
            Vec::new()
        }
    }

    fn proposal_wins(&self, proposed: PairKey, existing: PairKey, shared: Camera, other: Camera) -> bool {
        let unique = self.learned(shared).get(&proposed.side(shared));
        let new_candidate = self.learned(other).get(&proposed.side(other));
        let old_candidate = self.learned(other).get(&existing.side(other));

        let (Some(unique), Some(new_candidate), Some(old_candidate)) = (unique, new_candidate, old_candidate) else {
            log::warn!("missing learned bodies to arbitrate {} against {}, keeping {}", proposed, existing, existing);
            return false;
        };

        let new_difference = unique.process_difference(new_candidate);
        let old_difference = unique.process_difference(old_candidate);
        log::debug!(
            "arbitrating {} ({:.5}) against {} ({:.5})",
            proposed,
            new_difference,
            existing,
            old_difference
        );
        nan_last_lt(new_difference, old_difference)
    }

    /// Emits one skeleton per mapped pair with at least one visible side.
    fn select_best_bodies(
        &self,
        frame1: &BTreeMap<u32, Skeleton>,
        frame2: &BTreeMap<u32, Skeleton>,
    ) -> Result<Vec<Skeleton>> {
        let mut bodies = Vec::new();
        for (key, &fused_id) in self.map.iter() {
            let body1 = frame1.get(&key.camera1).filter(|_| key.camera1 != 0);
            let body2 = frame2.get(&key.camera2).filter(|_| key.camera2 != 0);

            let mut selected = match (body1, body2) {
                (Some(body1), Some(body2)) => self.select_between(key, body1, body2),
                (Some(body1), None) => {
                    self.ensure_consistent(key)?;
                    body1.clone()
                }
                (None, Some(body2)) => {
                    self.ensure_consistent(key)?;
                    self.transform_body(body2)
                }
                (None, None) => continue,
            };
            selected.id = fused_id;
            bodies.push(selected);
        }
        Ok(bodies)
    }

    fn select_between(&self, key: &PairKey, body1: &Skeleton, body2: &Skeleton) -> Skeleton {
        let learned = (
            self.camera1_learned.get(&key.camera1),
            self.camera2_learned.get(&key.camera2),
        );
        if let (Some(learned1), Some(learned2)) = learned {
            let deviation1 = learned1.live_deviation(body1, ConfidenceLevel::None);
            let deviation2 = learned2.live_deviation(body2, ConfidenceLevel::None);
            if !(deviation1.is_nan() && deviation2.is_nan()) {
                return if nan_last_lt(deviation1, deviation2) {
                    body1.clone()
                } else {
                    self.transform_body(body2)
                };
            }
        }

        if body1.accumulated_confidence() >= body2.accumulated_confidence() {
            body1.clone()
        } else {
            self.transform_body(body2)
        }
    }

    /// A mapped key must classify as mapped; anything else means the map
    /// bookkeeping is broken.
    fn ensure_consistent(&self, key: &PairKey) -> Result<()> {
        match self.map.classify(key) {
            PairState::AlreadyExist | PairState::Replace(_) => Ok(()),
            PairState::KeyAlreadyInserted(_) | PairState::GoodToInsert => Err(BodyError::InconsistentCorrespondence {
                camera1: key.camera1,
                camera2: key.camera2,
            }),
        }
    }

    fn transform_body(&self, body: &Skeleton) -> Skeleton {
        match &self.transform {
            Some(transform) => transform.apply_skeleton(body),
            None => body.clone(),
        }
    }
}
