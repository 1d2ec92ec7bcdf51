use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Which of the two fused cameras a local id belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Camera {
    First,
    Second,
}

/// (camera-1 local id, camera-2 local id). Either side may be 0, meaning the
/// body is not seen by that camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey {
    pub camera1: u32,
    pub camera2: u32,
}

impl PairKey {
    pub const fn new(camera1: u32, camera2: u32) -> Self {
        Self { camera1, camera2 }
    }

    pub fn only_first(camera1: u32) -> Self {
        Self::new(camera1, 0)
    }

    pub fn only_second(camera2: u32) -> Self {
        Self::new(0, camera2)
    }

    pub fn is_two_sided(&self) -> bool {
        self.camera1 != 0 && self.camera2 != 0
    }

    pub fn side(&self, camera: Camera) -> u32 {
        match camera {
            Camera::First => self.camera1,
            Camera::Second => self.camera2,
        }
    }

    /// True when both keys hold the same non-sentinel id on at least one side.
    pub fn shares_id_with(&self, other: &PairKey) -> bool {
        (self.camera1 != 0 && self.camera1 == other.camera1) || (self.camera2 != 0 && self.camera2 == other.camera2)
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.camera1, self.camera2)
    }
}

/// How a proposed pair relates to the persistent map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairState {
    /// The pair, or a one-sided proposal already covered by a pair, is mapped.
    AlreadyExist,
    /// A two-sided proposal can complete this existing one-sided entry.
    Replace(PairKey),
    /// Both ids are known but owned by this other two-sided entry.
    KeyAlreadyInserted(PairKey),
    /// Nothing overlaps.
    GoodToInsert,
}

/// Persistent (camera-1, camera-2) -> fused id table.
#[derive(Debug, Clone)]
pub struct CorrespondenceMap {
    entries: BTreeMap<PairKey, u32>,
    next_id: u32,
}

impl Default for CorrespondenceMap {
    fn default() -> Self {
        Self::new()
    }
}

impl CorrespondenceMap {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_id: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &PairKey) -> Option<u32> {
        self.entries.get(key).copied()
    }

    pub fn contains(&self, key: &PairKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PairKey, &u32)> {
        self.entries.iter()
    }

    /// Classifies a proposed pair. Lookup order is deterministic: an exact or
    /// covering match first, then a conflicting two-sided entry, then a
    /// one-sided entry to complete.
    pub fn classify(&self, key: &PairKey) -> PairState {
        if self.entries.contains_key(key) {
            return PairState::AlreadyExist;
        }
        if key.camera1 == 0 && self.entries.keys().any(|k| k.camera2 == key.camera2) {
            return PairState::AlreadyExist;
        }
        if key.camera2 == 0 && self.entries.keys().any(|k| k.camera1 == key.camera1) {
            return PairState::AlreadyExist;
        }
        if !key.is_two_sided() {
            return PairState::GoodToInsert;
        }

        // A two-sided owner of either id wins over any one-sided entry: the
        // ownership has to be settled before anything is completed.
        let conflicting = self
            .entries
            .keys()
            .find(|k| k.is_two_sided() && k.shares_id_with(key));
        if let Some(existing) = conflicting {
            return PairState::KeyAlreadyInserted(*existing);
        }

        let one_sided = self.entries.keys().find(|k| {
            (k.camera1 == 0 && k.camera2 == key.camera2) || (k.camera2 == 0 && k.camera1 == key.camera1)
        });
        match one_sided {
            Some(existing) => PairState::Replace(*existing),
            None => PairState::GoodToInsert,
        }
    }

    /// The entry holding `local_id` on `camera`'s side, if any.
    pub fn entry_of(&self, camera: Camera, local_id: u32) -> Option<PairKey> {
        if local_id == 0 {
            return None;
        }
        self.entries.keys().find(|k| k.side(camera) == local_id).copied()
    }

    /// Allocates a fresh fused id for `key`.
    pub fn insert_new(&mut self, key: PairKey) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert(key, id);
        log::info!("fused id {} allocated for {}", id, key);
        id
    }

    /// Moves the fused id of `old` onto `new`. Every other entry claiming
    /// one of `new`'s ids is split: whatever id it has left stays mapped
    /// one-sided, keeping that entry's fused id. The rest of `old` itself
    /// gets a fresh fused id. Returns the fused ids left with no local id.
    ///
    /// When `old` is not mapped, `new` is inserted with a fresh id unless it
    /// is already mapped.
    pub fn integrate(&mut self, old: PairKey, new: PairKey) -> Vec<u32> {
        if old == new {
            return Vec::new();
        }

        let Some(id) = self.entries.remove(&old) else {
            if !self.entries.contains_key(&new) {
                self.insert_new(new);
            }
            return Vec::new();
        };
        let overlapping: Vec<(PairKey, u32)> = self
            .entries
            .iter()
            .filter(|(k, _)| k.shares_id_with(&new))
            .map(|(k, v)| (*k, *v))
            .collect();
        for (key, _) in &overlapping {
            self.entries.remove(key);
        }
        self.entries.insert(new, id);
        log::info!("fused id {} moved from {} to {}", id, old, new);

        if let Some(rest) = remainder(&old, &new) {
            self.insert_new(rest);
        }
        let mut removed = Vec::new();
        for (key, fused_id) in overlapping {
            match remainder(&key, &new) {
                Some(rest) => {
                    log::debug!("{} split to {}", key, rest);
                    self.entries.insert(rest, fused_id);
                }
                None => removed.push(fused_id),
            }
        }
        removed
    }

    /// Drops every entry holding `local_id` on `camera`'s side.
    pub fn remove_local(&mut self, camera: Camera, local_id: u32) -> Vec<u32> {
        if local_id == 0 {
            return Vec::new();
        }
        let keys: Vec<PairKey> = self
            .entries
            .keys()
            .filter(|k| k.side(camera) == local_id)
            .copied()
            .collect();
        keys.into_iter().filter_map(|k| self.entries.remove(&k)).collect()
    }
}

/// What is left of `key` once the ids of `taken` are claimed elsewhere.
fn remainder(key: &PairKey, taken: &PairKey) -> Option<PairKey> {
    let camera1 = if key.camera1 == taken.camera1 { 0 } else { key.camera1 };
    let camera2 = if key.camera2 == taken.camera2 { 0 } else { key.camera2 };
    (camera1 != 0 || camera2 != 0).then_some(PairKey::new(camera1, camera2))
}

/// Camera-1/camera-2 id pairs rejected for being too far apart.
///
/// Entries stay until one of the two ids is removed by its tracker.
#[derive(Debug, Clone, Default)]
pub struct NotPairable {
    by_first: HashMap<u32, HashSet<u32>>,
    by_second: HashMap<u32, HashSet<u32>>,
}

impl NotPairable {
    pub fn insert(&mut self, camera1: u32, camera2: u32) -> bool {
        self.by_second.entry(camera2).or_default().insert(camera1);
        self.by_first.entry(camera1).or_default().insert(camera2)
    }

    pub fn contains(&self, camera1: u32, camera2: u32) -> bool {
        self.by_first.get(&camera1).is_some_and(|set| set.contains(&camera2))
    }

    pub fn len(&self) -> usize {
        self.by_first.values().map(HashSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forgets every pair involving `local_id` on `camera`'s side.
    pub fn forget(&mut self, camera: Camera, local_id: u32) {
        let (own, other) = match camera {
            Camera::First => (&mut self.by_first, &mut self.by_second),
            Camera::Second => (&mut self.by_second, &mut self.by_first),
        };
        if let Some(partners) = own.remove(&local_id) {
            for partner in partners {
                if let Some(set) = other.get_mut(&partner) {
                    set.remove(&local_id);
                    if set.is_empty() {
                        other.remove(&partner);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map_with(keys: &[(u32, u32)]) -> CorrespondenceMap {
        let mut map = CorrespondenceMap::new();
        for &(a, b) in keys {
            map.insert_new(PairKey::new(a, b));
        }
        map
    }

    #[test]
    fn test_classify_empty_map() {
        let map = CorrespondenceMap::new();
        assert_eq!(map.classify(&PairKey::new(1, 2)), PairState::GoodToInsert);
        assert_eq!(map.classify(&PairKey::only_first(1)), PairState::GoodToInsert);
        assert_eq!(map.classify(&PairKey::only_second(2)), PairState::GoodToInsert);
    }

    #[test]
    fn test_classify_already_exist() {
        let map = map_with(&[(1, 2)]);
        assert_eq!(map.classify(&PairKey::new(1, 2)), PairState::AlreadyExist);
        // one-sided proposals covered by the two-sided pair
        assert_eq!(map.classify(&PairKey::only_first(1)), PairState::AlreadyExist);
        assert_eq!(map.classify(&PairKey::only_second(2)), PairState::AlreadyExist);
        assert_eq!(map.classify(&PairKey::only_first(3)), PairState::GoodToInsert);
    }

    #[test]
    fn test_classify_replace() {
        let map = map_with(&[(1, 0), (0, 5)]);
        assert_eq!(map.classify(&PairKey::new(1, 2)), PairState::Replace(PairKey::only_first(1)));
        assert_eq!(map.classify(&PairKey::new(3, 5)), PairState::Replace(PairKey::only_second(5)));
        assert_eq!(map.classify(&PairKey::new(1, 5)), PairState::Replace(PairKey::only_second(5)));
    }

    #[test]
    fn test_classify_key_already_inserted() {
        let map = map_with(&[(1, 2)]);
        assert_eq!(
            map.classify(&PairKey::new(1, 3)),
            PairState::KeyAlreadyInserted(PairKey::new(1, 2))
        );
        assert_eq!(
            map.classify(&PairKey::new(4, 2)),
            PairState::KeyAlreadyInserted(PairKey::new(1, 2))
        );
        assert_eq!(map.classify(&PairKey::new(4, 5)), PairState::GoodToInsert);
    }

    #[test]
    fn test_fused_ids_increase() {
        let mut map = CorrespondenceMap::new();
        assert_eq!(map.insert_new(PairKey::new(1, 2)), 1);
        assert_eq!(map.insert_new(PairKey::only_first(3)), 2);
        map.remove_local(Camera::First, 1);
        assert_eq!(map.insert_new(PairKey::new(1, 2)), 3);
    }

    #[test]
    fn test_integrate_moves_id_and_drops_orphans() {
        let mut map = map_with(&[(1, 0), (0, 2)]);
        let removed = map.integrate(PairKey::only_first(1), PairKey::new(1, 2));
        assert_eq!(removed, vec![2]);
        assert_eq!(map.get(&PairKey::new(1, 2)), Some(1));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_classify_conflict_before_completion() {
        // 2 is only seen by camera 1, but 5 already belongs to (1, 5)
        let map = map_with(&[(1, 5), (2, 0)]);
        assert_eq!(
            map.classify(&PairKey::new(2, 5)),
            PairState::KeyAlreadyInserted(PairKey::new(1, 5))
        );
        let map = map_with(&[(1, 5), (0, 6)]);
        assert_eq!(
            map.classify(&PairKey::new(1, 6)),
            PairState::KeyAlreadyInserted(PairKey::new(1, 5))
        );
    }

    #[test]
    fn test_integrate_splits_conflicting_two_sided_pairs() {
        let mut map = map_with(&[(1, 2), (4, 3)]);
        let removed = map.integrate(PairKey::new(1, 2), PairKey::new(1, 3));
        assert!(removed.is_empty());
        assert_eq!(map.get(&PairKey::new(1, 3)), Some(1));
        // 4 keeps its fused id, 2 gets a fresh one
        assert_eq!(map.get(&PairKey::only_first(4)), Some(2));
        assert_eq!(map.get(&PairKey::only_second(2)), Some(3));
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn test_integrate_one_sided_into_owned_pair() {
        let mut map = map_with(&[(1, 5), (2, 0)]);
        let removed = map.integrate(PairKey::only_first(2), PairKey::new(2, 5));
        assert!(removed.is_empty());
        assert_eq!(map.get(&PairKey::new(2, 5)), Some(2));
        assert_eq!(map.get(&PairKey::only_first(1)), Some(1));
        assert_eq!(map.entry_of(Camera::Second, 5), Some(PairKey::new(2, 5)));
        assert_eq!(map.entry_of(Camera::First, 0), None);
    }

    #[test]
    fn test_integrate_unmapped_old_is_noop_for_mapped_new() {
        let mut map = map_with(&[(1, 2)]);
        let removed = map.integrate(PairKey::new(1, 3), PairKey::new(1, 2));
        assert!(removed.is_empty());
        assert_eq!(map.get(&PairKey::new(1, 2)), Some(1));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_remove_local() {
        let mut map = map_with(&[(1, 2), (3, 0), (0, 4)]);
        assert_eq!(map.remove_local(Camera::Second, 2), vec![1]);
        assert_eq!(map.remove_local(Camera::Second, 4), vec![3]);
        assert_eq!(map.remove_local(Camera::First, 9), Vec::<u32>::new());
        assert_eq!(map.remove_local(Camera::First, 0), Vec::<u32>::new());
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_not_pairable_forget() {
        let mut memory = NotPairable::default();
        assert!(memory.insert(1, 2));
        assert!(!memory.insert(1, 2));
        memory.insert(1, 3);
        memory.insert(4, 2);
        assert!(memory.contains(1, 2));
        assert!(!memory.contains(2, 1));
        assert_eq!(memory.len(), 3);

        memory.forget(Camera::Second, 2);
        assert!(!memory.contains(1, 2));
        assert!(!memory.contains(4, 2));
        assert!(memory.contains(1, 3));

        memory.forget(Camera::First, 1);
        assert!(memory.is_empty());
    }
}
