//! Error types for the body identification library

use thiserror::Error;

use crate::skeleton::JointId;

/// Result type alias for the body identification library
pub type Result<T> = std::result::Result<T, BodyError>;

/// Errors that can occur while identifying, fusing or calibrating bodies
#[derive(Error, Debug)]
pub enum BodyError {
    #[error("Skeleton is missing joint {0:?}")]
    MissingJoint(JointId),

    #[error("Correspondence map is inconsistent for pair ({camera1}, {camera2})")]
    InconsistentCorrespondence { camera1: u32, camera2: u32 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid transform: {0}")]
    InvalidTransform(String),

    #[error("Worker thread failed: {0}")]
    Worker(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BodyError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn transform<S: Into<String>>(msg: S) -> Self {
        Self::InvalidTransform(msg.into())
    }
}
