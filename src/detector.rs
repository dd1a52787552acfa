use crate::{error::Error, pose::Person};
use opencv::core::Mat;
use std::{fmt, str::FromStr, time::Duration};

mod crop;
mod movenet;

pub use crop::CropRegion;
pub use movenet::MoveNet;

/// Image in, persons out.
pub trait PoseDetector: Send {
    /// Detect persons in an RGB frame. Keypoints are in frame pixel coordinates.
    fn estimate_poses(&mut self, image: &Mat) -> Result<Vec<Person>, Error>;

    /// Duration of the most recent forward pass.
    fn last_inference_time(&self) -> Duration;

    /// Release the underlying engine.
    fn close(self: Box<Self>);
}

/// Single-pose MoveNet variants.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ModelType {
    /// Higher accuracy, 256 px input.
    Thunder,
    /// Lower latency, 192 px input.
    Lightning,
}

impl ModelType {
    pub fn input_size(self) -> usize {
        match self {
            Self::Thunder => 256,
            Self::Lightning => 192,
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            Self::Thunder => "movenet_thunder.tflite",
            Self::Lightning => "movenet_lightning.tflite",
        }
    }
}

impl Default for ModelType {
    fn default() -> Self {
        Self::Thunder
    }
}

impl FromStr for ModelType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "thunder" => Ok(Self::Thunder),
            "lightning" => Ok(Self::Lightning),
            _ => Err(Error::ParseModelType(s.to_owned())),
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Thunder => write!(f, "thunder"),
            Self::Lightning => write!(f, "lightning"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_model_type() {
        assert_eq!("Thunder".parse::<ModelType>().unwrap(), ModelType::Thunder);
        assert_eq!("lightning".parse::<ModelType>().unwrap(), ModelType::Lightning);
        assert!(matches!(
            "blazepose".parse::<ModelType>(),
            Err(Error::ParseModelType(_))
        ));
    }

    #[test]
    fn lightning_is_smaller() {
        assert!(ModelType::Lightning.input_size() < ModelType::Thunder.input_size());
    }
}
