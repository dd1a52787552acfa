use crate::{
    error::Error,
    pose::{BodyPart, Keypoints},
};

/// Keypoints below this score are ignored when sizing the crop.
pub(crate) const MIN_CROP_KEYPOINT_SCORE: f32 = 0.2;
const TORSO_EXPANSION_RATIO: f32 = 1.9;
const BODY_EXPANSION_RATIO: f32 = 1.2;

/// Detection crop in coordinates normalized to the frame size. May extend past the frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CropRegion {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl CropRegion {
    /// The square centered on the frame whose side is the longer frame side.
    pub fn centered(frame_width: f32, frame_height: f32) -> Self {
        if frame_width > frame_height {
            let box_height = frame_width / frame_height;
            let top = (frame_height / 2.0 - frame_width / 2.0) / frame_height;
            Self {
                left: 0.0,
                top,
                right: 1.0,
                bottom: top + box_height,
            }
        } else {
            let box_width = frame_height / frame_width;
            let left = (frame_width / 2.0 - frame_height / 2.0) / frame_width;
            Self {
                left,
                top: 0.0,
                right: left + box_width,
                bottom: 1.0,
            }
        }
    }

    /// Crop for the next frame, sized from where the body was in this one.
    pub fn from_keypoints(
        keypoints: &Keypoints,
        frame_width: f32,
        frame_height: f32,
    ) -> Result<Self, Error> {
        if !torso_visible(keypoints)? {
            return Ok(Self::centered(frame_width, frame_height));
        }

        let left_hip = keypoints[BodyPart::LeftHip.idx()?].point;
        let right_hip = keypoints[BodyPart::RightHip.idx()?].point;
        let center_y = (left_hip.y + right_hip.y) / 2.0;
        let center_x = (left_hip.x + right_hip.x) / 2.0;

        let distances = BodyDistances::measure(keypoints, center_y, center_x)?;
        let mut crop_length_half = (distances.torso_x * TORSO_EXPANSION_RATIO)
            .max(distances.torso_y * TORSO_EXPANSION_RATIO)
            .max(distances.body_y * BODY_EXPANSION_RATIO)
            .max(distances.body_x * BODY_EXPANSION_RATIO);

        let farthest_edge = [
            center_x,
            frame_width - center_x,
            center_y,
            frame_height - center_y,
        ]
        .iter()
        .cloned()
        .fold(f32::MIN, f32::max);
        crop_length_half = crop_length_half.min(farthest_edge);

        if crop_length_half > frame_width.max(frame_height) / 2.0 {
            return Ok(Self::centered(frame_width, frame_height));
        }

        let crop_length = crop_length_half * 2.0;
        let corner_y = center_y - crop_length_half;
        let corner_x = center_x - crop_length_half;
        Ok(Self {
            left: corner_x / frame_width,
            top: corner_y / frame_height,
            right: (corner_x + crop_length) / frame_width,
            bottom: (corner_y + crop_length) / frame_height,
        })
    }
}

fn torso_visible(keypoints: &Keypoints) -> Result<bool, Error> {
    let visible = |part: BodyPart| -> Result<bool, Error> {
        Ok(keypoints[part.idx()?].score > MIN_CROP_KEYPOINT_SCORE)
    };
    Ok((visible(BodyPart::LeftHip)? || visible(BodyPart::RightHip)?)
        && (visible(BodyPart::LeftShoulder)? || visible(BodyPart::RightShoulder)?))
}

/// Largest distances from the hip center, over the torso joints and over every confident
/// keypoint.
#[derive(Debug, Default)]
struct BodyDistances {
    torso_y: f32,
    torso_x: f32,
    body_y: f32,
    body_x: f32,
}

impl BodyDistances {
    fn measure(keypoints: &Keypoints, center_y: f32, center_x: f32) -> Result<Self, Error> {
        const TORSO_JOINTS: [BodyPart; 4] = [
            BodyPart::LeftShoulder,
            BodyPart::RightShoulder,
            BodyPart::LeftHip,
            BodyPart::RightHip,
        ];

        let mut distances = Self::default();
        for part in TORSO_JOINTS.iter() {
            let point = keypoints[part.idx()?].point;
            distances.torso_y = distances.torso_y.max((center_y - point.y).abs());
            distances.torso_x = distances.torso_x.max((center_x - point.x).abs());
        }
        for keypoint in keypoints
            .iter()
            .filter(|k| k.score > MIN_CROP_KEYPOINT_SCORE)
        {
            distances.body_y = distances.body_y.max((center_y - keypoint.point.y).abs());
            distances.body_x = distances.body_x.max((center_x - keypoint.point.x).abs());
        }
        Ok(distances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::test_utils::plank_person;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn centered_landscape() {
        let region = CropRegion::centered(640.0, 480.0);
        assert_approx_eq!(region.left, 0.0);
        assert_approx_eq!(region.right, 1.0);
        // 640 px tall square centered on a 480 px frame
        assert_approx_eq!(region.top, -80.0 / 480.0);
        assert_approx_eq!(region.bottom - region.top, 640.0 / 480.0);
    }

    #[test]
    fn centered_portrait() {
        let region = CropRegion::centered(480.0, 640.0);
        assert_approx_eq!(region.top, 0.0);
        assert_approx_eq!(region.bottom, 1.0);
        assert_approx_eq!(region.left, -80.0 / 480.0);
        assert_approx_eq!(region.right - region.left, 640.0 / 480.0);
    }

    #[test]
    fn hidden_torso_falls_back_to_centered() {
        let mut keypoints = plank_person().keypoints;
        keypoints[BodyPart::LeftHip.idx().unwrap()].score = 0.1;
        keypoints[BodyPart::RightHip.idx().unwrap()].score = 0.1;
        assert_eq!(
            CropRegion::from_keypoints(&keypoints, 640.0, 480.0).unwrap(),
            CropRegion::centered(640.0, 480.0)
        );
    }

    #[test]
    fn visible_torso_centers_on_hips() {
        // hips at y = 200, center x = 150. The widest confident point is the wrist
        // 150 px away and the lowest is the ankle 200 px away, so the body term wins
        // at 200 * 1.2 = 240.
        let keypoints = plank_person().keypoints;
        let region = CropRegion::from_keypoints(&keypoints, 640.0, 640.0).unwrap();

        let half = 240.0;
        assert_approx_eq!(region.left * 640.0, 150.0 - half, 1e-3);
        assert_approx_eq!(region.top * 640.0, 200.0 - half, 1e-3);
        assert_approx_eq!(region.right * 640.0, 150.0 + half, 1e-3);
        assert_approx_eq!(region.bottom * 640.0, 200.0 + half, 1e-3);
    }

    #[test]
    fn oversized_crop_falls_back_to_centered() {
        // the half crop is capped at 200 px, which is more than half the frame
        let keypoints = plank_person().keypoints;
        assert_eq!(
            CropRegion::from_keypoints(&keypoints, 200.0, 200.0).unwrap(),
            CropRegion::centered(200.0, 200.0)
        );
    }
}
