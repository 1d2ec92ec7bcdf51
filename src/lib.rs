pub mod bone;
pub mod calibration;
pub mod config;
pub mod correspondence;
pub mod error;
pub mod identification;
pub mod learned;
pub mod learning;
pub mod pipeline;
pub mod postures;
pub mod recording;
pub mod selection;
pub mod skeleton;
pub mod sync;
pub mod transform;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export main types
pub use crate::bone::Bone;
pub use crate::calibration::{CalibrationByBodies, CalibrationState};
pub use crate::config::Config;
pub use crate::correspondence::{Camera, CorrespondenceMap, PairKey, PairState};
pub use crate::error::{BodyError, Result};
pub use crate::identification::{BodiesIdentification, IdentificationOutput};
pub use crate::learned::LearnedBody;
pub use crate::learning::LearningBody;
pub use crate::pipeline::{FusionEvent, FusionPipeline};
pub use crate::postures::{BodyPosturesDetector, HandsContact, HandsProximity, HandsProximityDetector, Posture};
pub use crate::selection::{BodiesSelection, SelectionOutput};
pub use crate::skeleton::{ConfidenceLevel, Joint, JointId, SensorOrigin, Skeleton};
pub use crate::sync::{NearestJoin, SharedSelection};
pub use crate::transform::Transform;
