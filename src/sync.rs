use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::correspondence::Camera;
use crate::error::Result;
use crate::learned::LearnedBody;
use crate::selection::{BodiesSelection, SelectionOutput};
use crate::skeleton::Skeleton;
use crate::transform::Transform;

/// Fusion state shared by the learned-body, removal and frame streams.
///
/// Every call holds the one lock for its whole update, so cache updates and
/// ticks never interleave.
#[derive(Clone)]
pub struct SharedSelection {
    inner: Arc<Mutex<BodiesSelection>>,
}

impl SharedSelection {
    pub fn new(selection: BodiesSelection) -> Self {
        Self {
            inner: Arc::new(Mutex::new(selection)),
        }
    }

    /// A panic in another holder leaves the state as it was at that point;
    /// it is still usable.
    pub fn lock(&self) -> MutexGuard<'_, BodiesSelection> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn on_learned_bodies(&self, camera: Camera, bodies: Vec<LearnedBody>) {
        if bodies.is_empty() {
            return;
        }
        self.lock().add_learned_bodies(camera, bodies);
    }

    pub fn on_removed_bodies(&self, camera: Camera, ids: &[u32]) -> Vec<u32> {
        if ids.is_empty() {
            return Vec::new();
        }
        self.lock().remove_bodies(camera, ids)
    }

    /// One fused tick. A calibration sample, when given, replaces the
    /// current transform first.
    pub fn on_frames(
        &self,
        camera1: Vec<Skeleton>,
        camera2: Vec<Skeleton>,
        transform: Option<Transform>,
    ) -> Result<SelectionOutput> {
        let mut selection = self.lock();
        if let Some(transform) = transform {
            selection.set_transform(transform);
        }
        selection.process(camera1, camera2)
    }
}

/// Frames paired for one fused tick.
#[derive(Debug, Clone)]
pub struct JoinedFrames {
    pub timestamp: Duration,
    pub camera1: Vec<Skeleton>,
    pub camera2: Vec<Skeleton>,
    pub transform: Option<Transform>,
}

/// Nearest-available join: camera-1 frames drive the ticks and are paired
/// with whatever camera-2 frame and calibration sample arrived last.
#[derive(Debug, Default)]
pub struct NearestJoin {
    camera2: Option<(Duration, Vec<Skeleton>)>,
    calibration: Option<(Duration, Transform)>,
}

impl NearestJoin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_camera2(&mut self, timestamp: Duration, bodies: Vec<Skeleton>) {
        self.camera2 = Some((timestamp, bodies));
    }

    pub fn push_calibration(&mut self, timestamp: Duration, transform: Transform) {
        self.calibration = Some((timestamp, transform));
    }

    /// Latest camera-2 frame timestamp, if any.
    pub fn camera2_timestamp(&self) -> Option<Duration> {
        self.camera2.as_ref().map(|(timestamp, _)| *timestamp)
    }

    /// Pairs a camera-1 frame. Nothing is produced before a camera-2 frame
    /// has been seen.
    pub fn join(&self, timestamp: Duration, camera1: Vec<Skeleton>) -> Option<JoinedFrames> {
        let (_, camera2) = self.camera2.as_ref()?;
        Some(JoinedFrames {
            timestamp,
            camera1,
            camera2: camera2.clone(),
            transform: self.calibration.as_ref().map(|(_, transform)| *transform),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bone::default_bones;
    use crate::config::SelectionConfig;
    use crate::correspondence::PairKey;
    use crate::test_support::{ms, skeleton_at};
    use nalgebra::Vector3;
    use std::collections::BTreeMap;
    use std::thread;

    fn profile(id: u32) -> LearnedBody {
        let bones: BTreeMap<_, _> = default_bones().into_iter().map(|b| (b, 0.3)).collect();
        LearnedBody::new(id, bones)
    }

    #[test]
    fn test_join_waits_for_camera2() {
        let mut join = NearestJoin::new();
        assert!(join.join(ms(0), vec![]).is_none());

        join.push_camera2(ms(5), vec![skeleton_at(3, 1.0, Vector3::zeros())]);
        join.push_camera2(ms(15), vec![]);
        let joined = join.join(ms(20), vec![skeleton_at(1, 1.0, Vector3::zeros())]).unwrap();
        assert!(joined.camera2.is_empty());
        assert_eq!(joined.camera1.len(), 1);
        assert!(joined.transform.is_none());
        assert_eq!(join.camera2_timestamp(), Some(ms(15)));

        join.push_calibration(ms(18), Transform::from_translation(0.0, 0.0, 1.0));
        assert!(join.join(ms(30), vec![]).unwrap().transform.is_some());
    }

    #[test]
    fn test_frames_set_transform() {
        let shared = SharedSelection::new(BodiesSelection::new(SelectionConfig::default()));
        let body = || vec![skeleton_at(1, 1.0, Vector3::zeros())];

        let out = shared.on_frames(body(), vec![], None).unwrap();
        assert!(out.bodies.is_empty());

        let out = shared.on_frames(body(), vec![], Some(Transform::identity())).unwrap();
        assert_eq!(out.bodies.len(), 1);
        assert!(shared.lock().correspondence().contains(&PairKey::only_first(1)));
    }

    #[test]
    fn test_concurrent_updates() {
        let shared = SharedSelection::new(BodiesSelection::new(SelectionConfig {
            camera2_to_camera1: Some(Transform::identity()),
            ..SelectionConfig::default()
        }));

        let handles: Vec<_> = [Camera::First, Camera::Second]
            .into_iter()
            .map(|camera| {
                let shared = shared.clone();
                thread::spawn(move || {
                    for id in 1..=50 {
                        shared.on_learned_bodies(camera, vec![profile(id)]);
                    }
                    shared.on_removed_bodies(camera, &[50]);
                })
            })
            .collect();

        let ticker = {
            let shared = shared.clone();
            thread::spawn(move || {
                for x in 0..20 {
                    let c1 = vec![skeleton_at(1, 1.0, Vector3::new(x as f64 * 0.01, 0.0, 0.0))];
                    let c2 = vec![skeleton_at(2, 1.0, Vector3::new(x as f64 * 0.01, 0.0, 0.0))];
                    let out = shared.on_frames(c1, c2, None).unwrap();
                    assert_eq!(out.bodies.len(), 1);
                }
            })
        };

        for handle in handles {
            handle.join().unwrap();
        }
        ticker.join().unwrap();

        let selection = shared.lock();
        assert_eq!(selection.learned(Camera::First).len(), 49);
        assert_eq!(selection.learned(Camera::Second).len(), 49);
        assert_eq!(selection.correspondence().len(), 1);
    }
}
