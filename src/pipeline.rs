use crate::{
    classifier::{top_label, PoseClassifier},
    config::PipelineConfig,
    detector::PoseDetector,
    error::Error,
    fps::FpsCounter,
    geometry::{analyze, PoseAnalysis},
    overlay::draw_body_keypoints,
    pose::Person,
    reference::ReferenceTable,
};
use opencv::{core::Mat, prelude::*};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, instrument};

/// Receives per-frame notifications. Calls happen on the processing thread.
pub trait PipelineListener: Send + Sync {
    fn on_fps(&self, fps: u32);

    /// Score of the first detected person and, when a classifier is loaded, its label
    /// scores in classifier output order.
    fn on_detected(&self, score: f32, labels: Option<&[(String, f32)]>);
}

/// Everything produced from one frame.
pub struct FrameOutput {
    /// The annotated copy of the input frame.
    pub image: Mat,
    pub fps: u32,
    /// Persons scoring above the minimum person score.
    pub persons: Vec<Person>,
    pub analysis: Option<PoseAnalysis>,
}

#[derive(Default)]
struct Models {
    detector: Option<Box<dyn PoseDetector>>,
    classifier: Option<PoseClassifier>,
}

/// Detection, classification, angle analysis and overlay for one frame at a time.
///
/// The detector and classifier can be replaced while frames are being processed. Both
/// live behind one lock, taken for the whole of detection and classification, so an
/// engine is never closed while it is running.
pub struct Pipeline {
    models: Mutex<Models>,
    table: Arc<ReferenceTable>,
    config: PipelineConfig,
    fps: Arc<FpsCounter>,
    listener: Option<Arc<dyn PipelineListener>>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, table: Arc<ReferenceTable>) -> Self {
        Self {
            models: Default::default(),
            table,
            config,
            fps: Default::default(),
            listener: None,
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn PipelineListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn fps_counter(&self) -> Arc<FpsCounter> {
        self.fps.clone()
    }

    fn lock_models(&self) -> MutexGuard<'_, Models> {
        self.models.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install `detector`, closing the previous one first. `None` only removes.
    pub fn set_detector(&self, detector: Option<Box<dyn PoseDetector>>) {
        let mut models = self.lock_models();
        if let Some(previous) = models.detector.take() {
            previous.close();
        }
        info!(message = "detector replaced", installed = detector.is_some());
        models.detector = detector;
    }

    /// Install `classifier`, closing the previous one first. `None` only removes.
    pub fn set_classifier(&self, classifier: Option<PoseClassifier>) {
        let mut models = self.lock_models();
        if let Some(previous) = models.classifier.take() {
            previous.close();
        }
        info!(message = "classifier replaced", installed = classifier.is_some());
        models.classifier = classifier;
    }

    /// Close and remove both models.
    pub fn close(&self) {
        let mut models = self.lock_models();
        if let Some(detector) = models.detector.take() {
            detector.close();
        }
        if let Some(classifier) = models.classifier.take() {
            classifier.close();
        }
        debug!(message = "pipeline models closed");
    }

    #[instrument(name = "Pipeline::process_frame", skip(self, image), level = "trace")]
    pub fn process_frame(&self, image: &Mat) -> Result<FrameOutput, Error> {
        let detection = {
            let mut guard = self.lock_models();
            let models = &mut *guard;
            match models.detector.as_mut() {
                Some(detector) => {
                    let persons = detector.estimate_poses(image)?;
                    let scores = match (persons.first(), models.classifier.as_mut()) {
                        (Some(person), Some(classifier)) => Some(classifier.classify(person)?),
                        _ => None,
                    };
                    Some((persons, scores))
                }
                None => None,
            }
        };

        self.fps.tick();
        let fps = self.fps.current();

        let (persons, scores) = match detection {
            Some(detection) => detection,
            None => {
                self.notify_fps(fps);
                return Ok(FrameOutput {
                    image: image.try_clone().map_err(Error::CopyImage)?,
                    fps,
                    persons: vec![],
                    analysis: None,
                });
            }
        };

        let min_score = self.config.min_person_score;
        let analysis = match persons.first() {
            Some(person) if person.score > min_score => {
                let label = scores.as_deref().map(top_label).unwrap_or_default();
                Some(analyze(person, &label, &self.table)?)
            }
            _ => None,
        };

        let visible = persons
            .iter()
            .filter(|person| person.score > min_score)
            .copied()
            .collect::<Vec<_>>();
        let annotated = draw_body_keypoints(image, &visible, analysis.as_ref())?;

        self.notify_fps(fps);
        if let (Some(person), Some(listener)) = (persons.first(), self.listener.as_ref()) {
            listener.on_detected(person.score, scores.as_deref());
        }

        Ok(FrameOutput {
            image: annotated,
            fps,
            persons: visible,
            analysis,
        })
    }

    fn notify_fps(&self, fps: u32) {
        if let Some(listener) = self.listener.as_ref() {
            listener.on_fps(fps);
        }
    }
}
