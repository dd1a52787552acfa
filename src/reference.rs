//! Expected joint angles per yoga pose.

use crate::{error::Error, pose::BodyPart};
use serde::Deserialize;
use std::{collections::HashMap, fs, path::Path};
use tracing::{info, warn};

/// The angle fields every reference pose carries.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum JointCategory {
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
}

impl JointCategory {
    /// The category measured at `vertex`, if the reference table tracks one.
    pub fn from_vertex(vertex: BodyPart) -> Option<Self> {
        match vertex {
            BodyPart::LeftShoulder => Some(Self::LeftShoulder),
            BodyPart::RightShoulder => Some(Self::RightShoulder),
            BodyPart::LeftElbow => Some(Self::LeftElbow),
            BodyPart::RightElbow => Some(Self::RightElbow),
            BodyPart::LeftHip => Some(Self::LeftHip),
            BodyPart::RightHip => Some(Self::RightHip),
            BodyPart::LeftKnee => Some(Self::LeftKnee),
            BodyPart::RightKnee => Some(Self::RightKnee),
            _ => None,
        }
    }
}

/// Expected angles in whole degrees.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
pub struct BodyAngle {
    pub left_shoulder: i32,
    pub right_shoulder: i32,
    pub left_elbow: i32,
    pub right_elbow: i32,
    pub left_hip: i32,
    pub right_hip: i32,
    pub left_knee: i32,
    pub right_knee: i32,
}

impl BodyAngle {
    pub fn expected(&self, category: JointCategory) -> i32 {
        match category {
            JointCategory::LeftShoulder => self.left_shoulder,
            JointCategory::RightShoulder => self.right_shoulder,
            JointCategory::LeftElbow => self.left_elbow,
            JointCategory::RightElbow => self.right_elbow,
            JointCategory::LeftHip => self.left_hip,
            JointCategory::RightHip => self.right_hip,
            JointCategory::LeftKnee => self.left_knee,
            JointCategory::RightKnee => self.right_knee,
        }
    }
}

/// Canonical table key for a classifier label: spaces removed, first letter lower-cased.
pub fn canonical_pose_name(label: &str) -> String {
    let compact = label.replace(' ', "");
    let mut chars = compact.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => compact,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct ReferenceTable {
    poses: HashMap<String, BodyAngle>,
}

impl ReferenceTable {
    pub fn from_json_str(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(Error::ParseReferenceTable)
    }

    pub fn from_path<P>(path: P) -> Result<Self, Error>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .map_err(|e| Error::ReadReferenceTable(e, path.to_path_buf()))?;
        Self::from_json_str(&json)
    }

    /// Load the table, falling back to an empty one when the file is missing or invalid.
    pub fn load_or_empty<P>(path: P) -> Self
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        match Self::from_path(path) {
            Ok(table) => {
                info!(
                    message = "loaded reference pose table",
                    path = %path.display(),
                    poses = table.len()
                );
                table
            }
            Err(error) => {
                warn!(
                    message = "reference pose table unavailable, showing raw angles only",
                    path = %path.display(),
                    %error
                );
                Self::default()
            }
        }
    }

    /// Look up a pose by classifier label.
    pub fn get(&self, label: &str) -> Option<&BodyAngle> {
        self.poses.get(&canonical_pose_name(label))
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }
}
