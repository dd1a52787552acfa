use crate::{error::Error, session::FrameSource};
use num_traits::ToPrimitive;
use opencv::{
    core::{self, Mat},
    imgproc,
    prelude::*,
    videoio::{
        self, VideoCapture, CAP_PROP_BUFFERSIZE, CAP_PROP_FRAME_HEIGHT, CAP_PROP_FRAME_WIDTH,
    },
};
use std::{fmt, str::FromStr};
use tracing::{debug, info};

/// A camera index or a video file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureTarget {
    Device(i32),
    File(String),
}

impl FromStr for CaptureTarget {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.parse()
            .map(Self::Device)
            .unwrap_or_else(|_| Self::File(s.to_owned())))
    }
}

impl CaptureTarget {
    /// Frames the driver may queue ahead of the reader. Cameras keep one so every read
    /// returns the newest frame. Files are read in order and keep the backend default.
    fn buffer_size(&self) -> Option<f64> {
        match self {
            Self::Device(_) => Some(1.0),
            Self::File(_) => None,
        }
    }
}

impl fmt::Display for CaptureTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Device(index) => write!(f, "device {}", index),
            Self::File(path) => write!(f, "{}", path),
        }
    }
}

/// Clockwise rotation applied to every frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Rotation {
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    fn code(self) -> i32 {
        match self {
            Self::Deg90 => core::ROTATE_90_CLOCKWISE,
            Self::Deg180 => core::ROTATE_180,
            Self::Deg270 => core::ROTATE_90_COUNTERCLOCKWISE,
        }
    }
}

impl FromStr for Rotation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "90" => Ok(Self::Deg90),
            "180" => Ok(Self::Deg180),
            "270" => Ok(Self::Deg270),
            _ => Err(Error::ParseRotation(s.to_owned())),
        }
    }
}

/// Frames from an OpenCV video capture, converted to RGB.
pub struct CaptureSource {
    target: CaptureTarget,
    width: Option<u32>,
    height: Option<u32>,
    rotation: Option<Rotation>,
    capture: Option<VideoCapture>,
    bgr: Mat,
}

impl CaptureSource {
    pub fn new(target: CaptureTarget) -> Self {
        Self {
            target,
            width: None,
            height: None,
            rotation: None,
            capture: None,
            bgr: Mat::default(),
        }
    }

    /// Requested capture size. The device may pick a different one.
    pub fn with_size(mut self, width: Option<u32>, height: Option<u32>) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_rotation(mut self, rotation: Option<Rotation>) -> Self {
        self.rotation = rotation;
        self
    }
}

impl FrameSource for CaptureSource {
    fn open(&mut self) -> Result<(), Error> {
        let target = self.target.to_string();
        let mut capture = match &self.target {
            CaptureTarget::Device(index) => VideoCapture::new(*index, videoio::CAP_ANY),
            CaptureTarget::File(path) => VideoCapture::from_file(path, videoio::CAP_ANY),
        }
        .map_err(|e| Error::OpenCapture(e, target.clone()))?;

        if !capture
            .is_opened()
            .map_err(|e| Error::OpenCapture(e, target.clone()))?
        {
            return Err(Error::CaptureNotOpened(target));
        }

        if let Some(frames) = self.target.buffer_size() {
            let applied = capture
                .set(CAP_PROP_BUFFERSIZE, frames)
                .map_err(|e| Error::OpenCapture(e, target.clone()))?;
            if !applied {
                debug!(message = "capture backend ignores buffer size", %target);
            }
        }

        if let Some(width) = self.width.map(f64::from) {
            capture
                .set(CAP_PROP_FRAME_WIDTH, width)
                .map_err(|e| Error::OpenCapture(e, target.clone()))?;
        }
        if let Some(height) = self.height.map(f64::from) {
            capture
                .set(CAP_PROP_FRAME_HEIGHT, height)
                .map_err(|e| Error::OpenCapture(e, target.clone()))?;
        }

        let width = capture
            .get(CAP_PROP_FRAME_WIDTH)
            .map_err(|e| Error::OpenCapture(e, target.clone()))?;
        let height = capture
            .get(CAP_PROP_FRAME_HEIGHT)
            .map_err(|e| Error::OpenCapture(e, target.clone()))?;
        info!(
            message = "opened video capture",
            %target,
            width = width.to_i64().unwrap_or_default(),
            height = height.to_i64().unwrap_or_default(),
            rotation = ?self.rotation
        );

        self.capture = Some(capture);
        Ok(())
    }

    fn latest_frame(&mut self) -> Result<Option<Mat>, Error> {
        let capture = self
            .capture
            .as_mut()
            .ok_or_else(|| Error::CaptureNotOpened(self.target.to_string()))?;
        if !capture.read(&mut self.bgr).map_err(Error::ReadFrame)? || self.bgr.empty() {
            return Ok(None);
        }

        let mut rgb = Mat::default();
        imgproc::cvt_color_def(&self.bgr, &mut rgb, imgproc::COLOR_BGR2RGB)
            .map_err(Error::ConvertColor)?;

        match self.rotation {
            Some(rotation) => {
                let mut rotated = Mat::default();
                core::rotate(&rgb, &mut rotated, rotation.code()).map_err(Error::RotateFrame)?;
                Ok(Some(rotated))
            }
            None => Ok(Some(rgb)),
        }
    }
}
