use crate::error::Error;
use num_traits::{FromPrimitive, ToPrimitive};
use opencv::core::Point2f;

/// MoveNet body landmarks, in model output order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, num_derive::FromPrimitive, num_derive::ToPrimitive)]
pub enum BodyPart {
    Nose,
    LeftEye,
    RightEye,
    LeftEar,
    RightEar,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

impl BodyPart {
    pub fn idx(self) -> Result<usize, Error> {
        self.to_usize().ok_or(Error::BodyPartToUSize(self))
    }

    pub fn from_idx(index: usize) -> Result<Self, Error> {
        Self::from_usize(index).ok_or(Error::ConvertUSizeToBodyPart(index))
    }

    /// Lower snake case name, e.g. `left_elbow`.
    pub fn name(self) -> &'static str {
        use BodyPart::*;

        match self {
            Nose => "nose",
            LeftEye => "left_eye",
            RightEye => "right_eye",
            LeftEar => "left_ear",
            RightEar => "right_ear",
            LeftShoulder => "left_shoulder",
            RightShoulder => "right_shoulder",
            LeftElbow => "left_elbow",
            RightElbow => "right_elbow",
            LeftWrist => "left_wrist",
            RightWrist => "right_wrist",
            LeftHip => "left_hip",
            RightHip => "right_hip",
            LeftKnee => "left_knee",
            RightKnee => "right_knee",
            LeftAnkle => "left_ankle",
            RightAnkle => "right_ankle",
        }
    }

    /// Name for on-screen text, e.g. `Left elbow`.
    pub fn display_name(self) -> String {
        let spaced = self.name().replace('_', " ");
        let mut chars = spaced.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => spaced,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Keypoint {
    pub part: BodyPart,
    /// Position in frame pixels.
    pub point: Point2f,
    pub score: f32,
    /// Detection crop width over model input width.
    pub width_ratio: f32,
    /// Detection crop height over model input height.
    pub height_ratio: f32,
}

impl Keypoint {
    pub fn new(part: BodyPart, point: Point2f, score: f32) -> Self {
        Self {
            part,
            point,
            score,
            width_ratio: 1.0,
            height_ratio: 1.0,
        }
    }
}

pub const NUM_KEYPOINTS: usize = 17;
pub type Keypoints = [Keypoint; NUM_KEYPOINTS];

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Person {
    pub keypoints: Keypoints,
    pub score: f32,
}

impl Person {
    /// Build a person from keypoints in body part order. The person score is the mean
    /// keypoint score.
    pub fn from_keypoints(keypoints: Keypoints) -> Self {
        let score = keypoints.iter().map(|k| k.score).sum::<f32>() / NUM_KEYPOINTS as f32;
        Self { keypoints, score }
    }

    pub fn keypoint(&self, part: BodyPart) -> Result<&Keypoint, Error> {
        Ok(&self.keypoints[part.idx()?])
    }

    pub fn point(&self, part: BodyPart) -> Result<Point2f, Error> {
        self.keypoint(part).map(|k| k.point)
    }
}

/// Three body parts whose angle is measured at `vertex`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct JointTriple {
    pub first: BodyPart,
    pub vertex: BodyPart,
    pub last: BodyPart,
}

impl JointTriple {
    pub const fn new(first: BodyPart, vertex: BodyPart, last: BodyPart) -> Self {
        Self {
            first,
            vertex,
            last,
        }
    }
}

pub mod constants {
    use super::{
        BodyPart::{self, *},
        JointTriple,
    };

    /// Skeleton connections drawn between keypoints.
    pub const BODY_JOINTS: [(BodyPart, BodyPart); 18] = [
        (Nose, LeftEye),
        (Nose, RightEye),
        (LeftEye, LeftEar),
        (RightEye, RightEar),
        (Nose, LeftShoulder),
        (Nose, RightShoulder),
        (LeftShoulder, LeftElbow),
        (LeftElbow, LeftWrist),
        (RightShoulder, RightElbow),
        (RightElbow, RightWrist),
        (LeftShoulder, RightShoulder),
        (LeftShoulder, LeftHip),
        (RightShoulder, RightHip),
        (LeftHip, RightHip),
        (LeftHip, LeftKnee),
        (LeftKnee, LeftAnkle),
        (RightHip, RightKnee),
        (RightKnee, RightAnkle),
    ];

    /// Joint triples in evaluation order.
    pub const BODY_ANGLES: [JointTriple; 8] = [
        JointTriple::new(LeftShoulder, LeftElbow, LeftWrist),
        JointTriple::new(RightShoulder, RightElbow, RightWrist),
        JointTriple::new(LeftHip, LeftShoulder, LeftElbow),
        JointTriple::new(RightHip, RightShoulder, RightElbow),
        JointTriple::new(LeftShoulder, LeftHip, LeftKnee),
        JointTriple::new(RightShoulder, RightHip, RightKnee),
        JointTriple::new(LeftHip, LeftKnee, LeftAnkle),
        JointTriple::new(RightHip, RightKnee, RightAnkle),
    ];
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_round_trip_covers_every_part() {
        for i in 0..NUM_KEYPOINTS {
            assert_eq!(BodyPart::from_idx(i).unwrap().idx().unwrap(), i);
        }
        assert!(matches!(
            BodyPart::from_idx(NUM_KEYPOINTS),
            Err(Error::ConvertUSizeToBodyPart(17))
        ));
    }

    #[test]
    fn display_name_is_capitalized_with_spaces() {
        assert_eq!(BodyPart::LeftElbow.display_name(), "Left elbow");
        assert_eq!(BodyPart::Nose.display_name(), "Nose");
    }

    #[test]
    fn person_score_is_mean_keypoint_score() {
        let mut keypoints = test_utils::person_at_origin().keypoints;
        keypoints.iter_mut().take(8).for_each(|k| k.score = 0.0);
        let person = Person::from_keypoints(keypoints);
        assert_approx_eq::assert_approx_eq!(person.score, 9.0 / 17.0);
    }

    #[test]
    fn body_angle_vertices_are_distinct() {
        let vertices = constants::BODY_ANGLES
            .iter()
            .map(|t| t.vertex)
            .collect::<std::collections::HashSet<_>>();
        assert_eq!(vertices.len(), constants::BODY_ANGLES.len());
    }
}
