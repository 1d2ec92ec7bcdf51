use std::fs;
use std::path::Path;

use nalgebra::{Matrix4, Point3};
use serde::{Deserialize, Serialize};

use crate::error::{BodyError, Result};
use crate::skeleton::Skeleton;

/// Homogeneous 4x4 transform from camera-2 space into camera-1 space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[[f64; 4]; 4]", into = "[[f64; 4]; 4]")]
pub struct Transform {
    matrix: Matrix4<f64>,
}

impl Transform {
    pub fn new(matrix: Matrix4<f64>) -> Self {
        Self { matrix }
    }

    pub fn identity() -> Self {
        Self::new(Matrix4::identity())
    }

    pub fn from_translation(x: f64, y: f64, z: f64) -> Self {
        Self::new(Matrix4::new_translation(&nalgebra::Vector3::new(x, y, z)))
    }

    /// Builds from row-major rows, rejecting non-finite entries.
    pub fn from_rows(rows: [[f64; 4]; 4]) -> Result<Self> {
        if rows.iter().flatten().any(|v| !v.is_finite()) {
            return Err(BodyError::transform("matrix contains non-finite values"));
        }
        let matrix = Matrix4::from_fn(|r, c| rows[r][c]);
        Ok(Self::new(matrix))
    }

    pub fn rows(&self) -> [[f64; 4]; 4] {
        let mut rows = [[0.0; 4]; 4];
        for (r, row) in rows.iter_mut().enumerate() {
            for (c, value) in row.iter_mut().enumerate() {
                *value = self.matrix[(r, c)];
            }
        }
        rows
    }

    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.matrix
    }

    pub fn apply(&self, point: &Point3<f64>) -> Point3<f64> {
        self.matrix.transform_point(point)
    }

    /// Copy of `skeleton` with every joint moved into camera-1 space.
    /// Confidence, id and origin are kept.
    pub fn apply_skeleton(&self, skeleton: &Skeleton) -> Skeleton {
        let mut out = skeleton.clone();
        for joint in out.joints_mut() {
            joint.position = self.apply(&joint.position);
        }
        out
    }

    /// Writes the matrix as four lines of four space separated values.
    pub fn store<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let text: String = self
            .rows()
            .iter()
            .map(|row| {
                let line: Vec<String> = row.iter().map(|v| v.to_string()).collect();
                line.join(" ") + "\n"
            })
            .collect();
        fs::write(path, text)?;
        Ok(())
    }

    /// Reads a matrix written by [`Transform::store`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let values = text
            .split_whitespace()
            .map(|token| {
                token
                    .parse::<f64>()
                    .map_err(|e| BodyError::transform(format!("bad value {:?}: {}", token, e)))
            })
            .collect::<Result<Vec<f64>>>()?;
        if values.len() != 16 {
            return Err(BodyError::transform(format!("expected 16 values, found {}", values.len())));
        }
        let mut rows = [[0.0; 4]; 4];
        for (i, value) in values.into_iter().enumerate() {
            rows[i / 4][i % 4] = value;
        }
        Self::from_rows(rows)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl TryFrom<[[f64; 4]; 4]> for Transform {
    type Error = BodyError;

    fn try_from(rows: [[f64; 4]; 4]) -> Result<Self> {
        Transform::from_rows(rows)
    }
}

impl From<Transform> for [[f64; 4]; 4] {
    fn from(transform: Transform) -> Self {
        transform.rows()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::JointId;
    use crate::test_support::standing_skeleton;
    use approx::assert_relative_eq;

    #[test]
    fn test_identity_keeps_skeleton() {
        let skeleton = standing_skeleton(3, 1.0);
        let moved = Transform::identity().apply_skeleton(&skeleton);
        for (joint, original) in skeleton.joints() {
            let p = moved.position(joint);
            assert_relative_eq!(p.x, original.position.x, epsilon = 1e-12);
            assert_relative_eq!(p.y, original.position.y, epsilon = 1e-12);
            assert_relative_eq!(p.z, original.position.z, epsilon = 1e-12);
            assert_eq!(moved.joint(joint).confidence, original.confidence);
        }
        assert_eq!(moved.id, 3);
    }

    #[test]
    fn test_translation() {
        let transform = Transform::from_translation(1.0, -2.0, 0.5);
        let skeleton = standing_skeleton(1, 1.0);
        let moved = transform.apply_skeleton(&skeleton);
        let p = moved.position(JointId::Pelvis);
        assert_relative_eq!(p.x, 1.0);
        assert_relative_eq!(p.y, -1.0);
        assert_relative_eq!(p.z, 0.5);
    }

    #[test]
    fn test_rows_are_row_major() {
        let transform = Transform::from_rows([
            [1.0, 0.0, 0.0, 3.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ])
        .unwrap();
        assert_relative_eq!(transform.apply(&Point3::origin()).x, 3.0);
        assert_eq!(transform.rows()[0][3], 3.0);
    }

    #[test]
    fn test_parse_rejects_wrong_count() {
        assert!(Transform::parse("1 0 0\n0 1 0\n").is_err());
        assert!(Transform::parse("1 0 0 0 0 1 0 0 0 0 1 0 0 0 0 x").is_err());
    }

    #[test]
    fn test_store_and_load() {
        let path = std::env::temp_dir().join(format!("bodytrack-transform-{}.txt", std::process::id()));
        let transform = Transform::from_translation(0.25, 1.5, -3.0);
        transform.store(&path).unwrap();
        let loaded = Transform::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, transform);
    }
}
