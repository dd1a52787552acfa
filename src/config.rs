use crate::{classifier, detector::ModelType};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

/// Persons scoring at or below this are not drawn.
pub const DEFAULT_MIN_PERSON_SCORE: f32 = 0.2;

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub min_person_score: f32,
    /// Whether a classifier is loaded next to the detector.
    pub classify: bool,
    pub model_type: ModelType,
    /// Length of one frame rate window.
    pub fps_period: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_person_score: DEFAULT_MIN_PERSON_SCORE,
            classify: false,
            model_type: ModelType::default(),
            fps_period: Duration::from_secs(1),
        }
    }
}

/// Model asset locations. Everything lives in one directory unless overridden.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPaths {
    model_dir: PathBuf,
    labels: Option<PathBuf>,
}

impl ModelPaths {
    pub fn new<P>(model_dir: P) -> Self
    where
        P: AsRef<Path>,
    {
        Self {
            model_dir: model_dir.as_ref().to_path_buf(),
            labels: None,
        }
    }

    pub fn with_labels(mut self, labels: Option<PathBuf>) -> Self {
        self.labels = labels;
        self
    }

    pub fn detector(&self, model_type: ModelType) -> PathBuf {
        self.model_dir.join(model_type.file_name())
    }

    pub fn classifier(&self) -> PathBuf {
        self.model_dir.join(classifier::MODEL_FILE_NAME)
    }

    pub fn labels(&self) -> PathBuf {
        self.labels
            .clone()
            .unwrap_or_else(|| self.model_dir.join(classifier::LABELS_FILE_NAME))
    }
}
