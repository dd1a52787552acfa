use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to convert body part variant to usize: {0:?}")]
    BodyPartToUSize(crate::pose::BodyPart),

    #[error("failed to convert usize value to body part: {0}")]
    ConvertUSizeToBodyPart(usize),

    #[error("failed to parse reference pose table")]
    ParseReferenceTable(#[source] serde_json::Error),

    #[error("failed to read reference pose table from {1:?}")]
    ReadReferenceTable(#[source] std::io::Error, PathBuf),

    #[error("failed to read labels from {1:?}")]
    ReadLabels(#[source] std::io::Error, PathBuf),

    #[error("expected engine input of {expected} values, got {actual}")]
    EngineInputLength { expected: usize, actual: usize },

    #[error("expected engine output of {expected} values, got {actual}")]
    EngineOutputLength { expected: usize, actual: usize },

    #[error("expected engine input shape {expected:?}, got {actual:?}")]
    EngineInputShape {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("got {labels} labels for a classifier with {outputs} outputs")]
    LabelCountMismatch { labels: usize, outputs: usize },

    #[error("failed to convert model path to str: {0:?}")]
    GetModelPathAsStr(PathBuf),

    #[error("failed to load model from {1:?}")]
    LoadModel(#[source] opencv::Error, PathBuf),

    #[error("failed to convert dim usize to i32")]
    ConvertDimToI32(#[source] std::num::TryFromIntError),

    #[error("failed to create input blob")]
    CreateBlob(#[source] opencv::Error),

    #[error("failed to run forward pass")]
    Forward(#[source] opencv::Error),

    #[error("failed to read forward pass output")]
    ReadOutput(#[source] opencv::Error),

    #[error("failed to crop image")]
    Crop(#[source] opencv::Error),

    #[error("failed to resize image")]
    Resize(#[source] opencv::Error),

    #[error("failed to pad image")]
    PadImage(#[source] opencv::Error),

    #[error("failed to read pixel")]
    ReadPixel(#[source] opencv::Error),

    #[error("failed to copy image")]
    CopyImage(#[source] opencv::Error),

    #[error("failed to draw line")]
    DrawLine(#[source] opencv::Error),

    #[error("failed to draw circle")]
    DrawCircle(#[source] opencv::Error),

    #[error("failed to put text")]
    PutText(#[source] opencv::Error),

    #[error("failed to convert Point2f to Point2i: {0:?}")]
    ConvertPoint2fToPoint2i(opencv::core::Point2f),

    #[error("got an empty image")]
    EmptyImage,

    #[error("failed to convert value to f32")]
    ConvertToF32,

    #[error("failed to convert value to i32")]
    ConvertToI32,

    #[error("tensor is not contiguous in memory")]
    NonContiguousTensor,

    #[error("failed to construct array view")]
    ConstructArrayView(#[source] ndarray::ShapeError),

    #[error("unknown model type: {0}, expected thunder or lightning")]
    ParseModelType(String),

    #[error("unknown rotation: {0}, expected 90, 180 or 270")]
    ParseRotation(String),

    #[error("failed to open video capture {1:?}")]
    OpenCapture(#[source] opencv::Error, String),

    #[error("video capture {0:?} is not opened")]
    CaptureNotOpened(String),

    #[error("failed to read frame")]
    ReadFrame(#[source] opencv::Error),

    #[error("failed to convert color")]
    ConvertColor(#[source] opencv::Error),

    #[error("failed to rotate frame")]
    RotateFrame(#[source] opencv::Error),

    #[error("frame sink disconnected")]
    SinkDisconnected,

    #[error("failed to spawn thread {1}")]
    SpawnThread(#[source] std::io::Error, &'static str),
}
