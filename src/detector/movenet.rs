use super::{crop::CropRegion, ModelType, PoseDetector};
use crate::{
    config::ModelPaths,
    engine::{timed_run, DnnEngine, InferenceEngine, Timing},
    error::Error,
    pose::{BodyPart, Keypoint, Keypoints, Person, NUM_KEYPOINTS},
};
use ndarray::{s, Array4, ArrayView4};
use num_traits::ToPrimitive;
use opencv::{
    core::{self, Mat, Point2f, Rect, Scalar, Size, Vec3b},
    imgproc,
    prelude::*,
};
use std::time::Duration;
use tracing::{debug, instrument};

/// Values per keypoint in the output tensor: y, x, score.
const KEYPOINT_VALUES: usize = 3;

/// MoveNet single-pose detector with crop tracking between frames.
pub struct MoveNet {
    engine: Box<dyn InferenceEngine>,
    model_type: ModelType,
    crop_region: Option<CropRegion>,
    timing: Timing,
}

impl MoveNet {
    pub fn new(engine: Box<dyn InferenceEngine>, model_type: ModelType) -> Result<Self, Error> {
        let size = model_type.input_size();
        let expected_input = [1, size, size, 3];
        if engine.input_shape() != expected_input {
            return Err(Error::EngineInputShape {
                expected: expected_input.to_vec(),
                actual: engine.input_shape().to_vec(),
            });
        }
        let expected_output = NUM_KEYPOINTS * KEYPOINT_VALUES;
        if engine.output_len() != expected_output {
            return Err(Error::EngineOutputLength {
                expected: expected_output,
                actual: engine.output_len(),
            });
        }

        Ok(Self {
            engine,
            model_type,
            crop_region: None,
            timing: Default::default(),
        })
    }

    /// Load the model file for `model_type`.
    pub fn load(paths: &ModelPaths, model_type: ModelType) -> Result<Self, Error> {
        let size = model_type.input_size();
        let engine = DnnEngine::new(
            paths.detector(model_type),
            vec![1, size, size, 3],
            NUM_KEYPOINTS * KEYPOINT_VALUES,
        )?;
        Self::new(Box::new(engine), model_type)
    }

    pub fn model_type(&self) -> ModelType {
        self.model_type
    }
}

impl PoseDetector for MoveNet {
    #[instrument(name = "MoveNet::estimate_poses", skip(self, image), level = "debug")]
    fn estimate_poses(&mut self, image: &Mat) -> Result<Vec<Person>, Error> {
        if image.empty() {
            return Err(Error::EmptyImage);
        }
        let frame_width = image.cols().to_f32().ok_or(Error::ConvertToF32)?;
        let frame_height = image.rows().to_f32().ok_or(Error::ConvertToF32)?;
        let region = *self
            .crop_region
            .get_or_insert_with(|| CropRegion::centered(frame_width, frame_height));

        // an unusable region is dropped so the next frame starts from the centered crop
        let rect = match pixel_rect(&region, frame_width, frame_height) {
            Ok(rect) => rect,
            Err(error) => {
                self.crop_region = None;
                return Err(error);
            }
        };
        let detect_image = crop_with_padding(image, rect)?;

        let input_size = self.model_type.input_size();
        let input = to_input_tensor(&detect_image, input_size)?;
        let input = input.as_slice().ok_or(Error::NonContiguousTensor)?;
        let (output, timing) = timed_run(self.engine.as_mut(), input)?;
        self.timing = timing;
        debug!(message = "movenet inference", inference = ?timing.inference);

        let input_size = input_size.to_f32().ok_or(Error::ConvertToF32)?;
        let width_ratio = rect.width.to_f32().ok_or(Error::ConvertToF32)? / input_size;
        let height_ratio = rect.height.to_f32().ok_or(Error::ConvertToF32)? / input_size;
        let origin = Point2f::new(
            rect.x.to_f32().ok_or(Error::ConvertToF32)?,
            rect.y.to_f32().ok_or(Error::ConvertToF32)?,
        );

        let keypoints = decode_keypoints(&output, input_size, width_ratio, height_ratio, origin)?;
        self.crop_region = Some(CropRegion::from_keypoints(
            &keypoints,
            frame_width,
            frame_height,
        )?);

        Ok(vec![Person::from_keypoints(keypoints)])
    }

    fn last_inference_time(&self) -> Duration {
        self.timing.inference
    }

    fn close(self: Box<Self>) {
        debug!(message = "closing detector", model_type = %self.model_type);
        self.engine.close();
    }
}

/// The crop region in frame pixels.
fn pixel_rect(region: &CropRegion, frame_width: f32, frame_height: f32) -> Result<Rect, Error> {
    let to_i32 = |v: f32| v.round().to_i32().ok_or(Error::ConvertToI32);
    let left = to_i32(region.left * frame_width)?;
    let top = to_i32(region.top * frame_height)?;
    let right = to_i32(region.right * frame_width)?;
    let bottom = to_i32(region.bottom * frame_height)?;
    Ok(Rect::new(left, top, (right - left).max(1), (bottom - top).max(1)))
}

/// Copy `rect` out of `image`, filling the parts outside the frame with black.
fn crop_with_padding(image: &Mat, rect: Rect) -> Result<Mat, Error> {
    let x0 = rect.x.max(0).min(image.cols());
    let y0 = rect.y.max(0).min(image.rows());
    let x1 = (rect.x + rect.width).max(0).min(image.cols());
    let y1 = (rect.y + rect.height).max(0).min(image.rows());

    if x1 <= x0 || y1 <= y0 {
        return Mat::new_rows_cols_with_default(
            rect.height,
            rect.width,
            image.typ(),
            Scalar::all(0.0),
        )
        .map_err(Error::Crop);
    }

    let visible = Mat::roi(image, Rect::new(x0, y0, x1 - x0, y1 - y0))
        .and_then(|roi| roi.try_clone())
        .map_err(Error::Crop)?;
    let mut padded = Mat::default();
    core::copy_make_border(
        &visible,
        &mut padded,
        y0 - rect.y,
        rect.y + rect.height - y1,
        x0 - rect.x,
        rect.x + rect.width - x1,
        core::BORDER_CONSTANT,
        Scalar::all(0.0),
    )
    .map_err(Error::Crop)?;
    Ok(padded)
}

/// Resize an RGB image to the square model input and lay it out as `[1, size, size, 3]`.
fn to_input_tensor(image: &Mat, size: usize) -> Result<Array4<f32>, Error> {
    let side = size.to_i32().ok_or(Error::ConvertToI32)?;
    let mut resized = Mat::default();
    imgproc::resize(
        image,
        &mut resized,
        Size::new(side, side),
        0.0,
        0.0,
        imgproc::INTER_LINEAR,
    )
    .map_err(Error::Resize)?;

    let pixels = resized.data_typed::<Vec3b>().map_err(Error::ReadPixel)?;
    let values = pixels
        .iter()
        .flat_map(|pixel| pixel.0.iter().map(|&channel| f32::from(channel)))
        .collect::<Vec<_>>();
    Array4::from_shape_vec((1, size, size, 3), values).map_err(Error::ConstructArrayView)
}

/// Turn the `[1, 1, 17, 3]` (y, x, score) output into keypoints in frame pixels.
fn decode_keypoints(
    output: &[f32],
    input_size: f32,
    width_ratio: f32,
    height_ratio: f32,
    origin: Point2f,
) -> Result<Keypoints, Error> {
    let output = ArrayView4::from_shape((1, 1, NUM_KEYPOINTS, KEYPOINT_VALUES), output)
        .map_err(Error::ConstructArrayView)?;

    let mut keypoints = [Keypoint::new(BodyPart::Nose, Point2f::default(), 0.0); NUM_KEYPOINTS];
    for (i, row) in output.slice(s![0, 0, .., ..]).outer_iter().enumerate() {
        let x = row[1] * input_size * width_ratio + origin.x;
        let y = row[0] * input_size * height_ratio + origin.y;
        keypoints[i] = Keypoint {
            part: BodyPart::from_idx(i)?,
            point: Point2f::new(x, y),
            score: row[2],
            width_ratio,
            height_ratio,
        };
    }
    Ok(keypoints)
}
