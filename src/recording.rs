//! JSON-lines recordings of two-camera sessions, as replayed by the
//! binaries.
//!
//! Each non-empty line is either a camera frame
//! `{"camera": 1, "timestamp_ms": 40, "bodies": [...]}` or a calibration
//! sample `{"calibration": [[...], ...], "timestamp_ms": 40}`.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::correspondence::Camera;
use crate::error::{BodyError, Result};
use crate::skeleton::Skeleton;
use crate::transform::Transform;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Record {
    Frame {
        camera: u8,
        timestamp_ms: u64,
        bodies: Vec<Skeleton>,
    },
    Calibration {
        calibration: Transform,
        timestamp_ms: u64,
    },
}

impl Record {
    pub fn timestamp(&self) -> Duration {
        match self {
            Record::Frame { timestamp_ms, .. } | Record::Calibration { timestamp_ms, .. } => {
                Duration::from_millis(*timestamp_ms)
            }
        }
    }
}

/// Maps the recording's 1-based camera number.
pub fn camera_from_number(number: u8) -> Result<Camera> {
    match number {
        1 => Ok(Camera::First),
        2 => Ok(Camera::Second),
        other => Err(BodyError::config(format!("unknown camera {}, expected 1 or 2", other))),
    }
}

pub fn parse_line(line: &str) -> Result<Record> {
    let record: Record = serde_json::from_str(line)?;
    if let Record::Frame { camera, .. } = &record {
        camera_from_number(*camera)?;
    }
    Ok(record)
}

pub fn read_recording<P: AsRef<Path>>(path: P) -> Result<Vec<Record>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(parse_line(&line)?);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::standing_skeleton;

    #[test]
    fn test_frame_line() {
        let body = serde_json::to_string(&standing_skeleton(4, 1.0)).unwrap();
        let line = format!(r#"{{"camera": 2, "timestamp_ms": 40, "bodies": [{}]}}"#, body);
        match parse_line(&line).unwrap() {
            Record::Frame { camera, timestamp_ms, bodies } => {
                assert_eq!(camera_from_number(camera).unwrap(), Camera::Second);
                assert_eq!(timestamp_ms, 40);
                assert_eq!(bodies[0].id, 4);
            }
            other => panic!("unexpected record {:?}", other),
        }
    }

    #[test]
    fn test_calibration_line() {
        let line = r#"{"calibration": [[1,0,0,2],[0,1,0,0],[0,0,1,0],[0,0,0,1]], "timestamp_ms": 7}"#;
        let record = parse_line(line).unwrap();
        assert_eq!(record.timestamp(), Duration::from_millis(7));
        assert!(matches!(record, Record::Calibration { .. }));
    }

    #[test]
    fn test_bad_camera() {
        let line = r#"{"camera": 3, "timestamp_ms": 0, "bodies": []}"#;
        assert!(matches!(parse_line(line), Err(BodyError::InvalidConfig(_))));
    }
}
