use crate::{
    config::ModelPaths,
    engine::{timed_run, DnnEngine, InferenceEngine},
    error::Error,
    pose::{Person, NUM_KEYPOINTS},
};
use ndarray::Array2;
use ordered_float::OrderedFloat;
use std::{cmp::Reverse, fs, path::Path};
use tracing::{debug, instrument};

pub const MODEL_FILE_NAME: &str = "pose_classifier.tflite";
pub const LABELS_FILE_NAME: &str = "labels.txt";

/// Pixel size keypoint coordinates are normalized against.
const REFERENCE_DIMENSION: f32 = 256.0;
const INPUT_LEN: usize = NUM_KEYPOINTS * 3;

/// Read one label per line. Line order matches the classifier output order.
pub fn load_labels<P>(path: P) -> Result<Vec<String>, Error>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let contents =
        fs::read_to_string(path).map_err(|e| Error::ReadLabels(e, path.to_path_buf()))?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect())
}

/// Keypoints in, one score per known pose label out.
pub struct PoseClassifier {
    engine: Box<dyn InferenceEngine>,
    labels: Vec<String>,
}

impl PoseClassifier {
    pub fn new(engine: Box<dyn InferenceEngine>, labels: Vec<String>) -> Result<Self, Error> {
        if engine.input_len() != INPUT_LEN {
            return Err(Error::EngineInputLength {
                expected: INPUT_LEN,
                actual: engine.input_len(),
            });
        }
        if engine.output_len() != labels.len() {
            return Err(Error::LabelCountMismatch {
                labels: labels.len(),
                outputs: engine.output_len(),
            });
        }
        Ok(Self { engine, labels })
    }

    /// Load the classifier model and its label list.
    pub fn load(paths: &ModelPaths) -> Result<Self, Error> {
        let labels = load_labels(paths.labels())?;
        let engine = DnnEngine::new(
            paths.classifier(),
            vec![1, INPUT_LEN],
            labels.len(),
        )?;
        Self::new(Box::new(engine), labels)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Score every label for `person`, in engine output order. Scores are not normalized.
    #[instrument(name = "PoseClassifier::classify", skip(self, person), level = "debug")]
    pub fn classify(&mut self, person: &Person) -> Result<Vec<(String, f32)>, Error> {
        let input = input_vector(person);
        let input = input.as_slice().ok_or(Error::NonContiguousTensor)?;
        let (output, timing) = timed_run(self.engine.as_mut(), input)?;
        debug!(message = "classifier inference", inference = ?timing.inference);

        Ok(self.labels.iter().cloned().zip(output).collect())
    }

    pub fn close(self) {
        debug!(message = "closing classifier", labels = self.labels.len());
        self.engine.close();
    }
}

/// Flatten keypoints into `[1, 51]` as (y, x, score) per body part, with coordinates
/// normalized by the reference dimension scaled by each keypoint's crop ratio.
fn input_vector(person: &Person) -> Array2<f32> {
    let mut input = Array2::<f32>::zeros((1, INPUT_LEN));
    for (i, keypoint) in person.keypoints.iter().enumerate() {
        input[[0, i * 3]] = keypoint.point.y / (REFERENCE_DIMENSION * keypoint.height_ratio);
        input[[0, i * 3 + 1]] = keypoint.point.x / (REFERENCE_DIMENSION * keypoint.width_ratio);
        input[[0, i * 3 + 2]] = keypoint.score;
    }
    input
}

/// Sort label scores from best to worst, keeping engine order among equal scores.
pub fn ranked(scores: &[(String, f32)]) -> Vec<(String, f32)> {
    let mut ranked = scores.to_vec();
    ranked.sort_by_key(|&(_, score)| Reverse(OrderedFloat(score)));
    ranked
}

/// The best label, or the empty string when there are no scores.
pub fn top_label(scores: &[(String, f32)]) -> String {
    ranked(scores)
        .into_iter()
        .next()
        .map(|(label, _)| label)
        .unwrap_or_default()
}

/// `label (score)` for the best label, or `empty`.
pub fn format_top_label(scores: Option<&[(String, f32)]>) -> String {
    match scores.and_then(|scores| ranked(scores).into_iter().next()) {
        Some((label, score)) => format!("{} ({:.2})", label, score),
        None => "empty".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{engine::test_utils::FakeEngine, pose::test_utils::plank_person};
    use assert_approx_eq::assert_approx_eq;
    use std::sync::atomic::Ordering;

    fn labels() -> Vec<String> {
        vec!["tree".to_owned(), "plank".to_owned(), "warrior two".to_owned()]
    }

    #[test]
    fn label_count_must_match_output() {
        let engine = FakeEngine::new(vec![1, INPUT_LEN], vec![0.0; 2]);
        assert!(matches!(
            PoseClassifier::new(Box::new(engine), labels()),
            Err(Error::LabelCountMismatch {
                labels: 3,
                outputs: 2
            })
        ));
    }

    #[test]
    fn input_is_normalized_y_x_score() {
        let engine = FakeEngine::new(vec![1, INPUT_LEN], vec![0.1, 0.7, 0.2]);
        let last_input = engine.last_input.clone();
        let mut classifier = PoseClassifier::new(Box::new(engine), labels()).unwrap();

        let mut person = plank_person();
        for keypoint in person.keypoints.iter_mut() {
            keypoint.width_ratio = 2.0;
            keypoint.height_ratio = 0.5;
        }
        classifier.classify(&person).unwrap();

        let input = last_input.lock().unwrap();
        assert_eq!(input.len(), INPUT_LEN);
        // left wrist sits at (0, 100), right ankle at (200, 400)
        let left_wrist = 9 * 3;
        assert_approx_eq!(input[left_wrist], 100.0 / 128.0);
        assert_approx_eq!(input[left_wrist + 1], 0.0);
        assert_approx_eq!(input[left_wrist + 2], 1.0);
        let right_ankle = 16 * 3;
        assert_approx_eq!(input[right_ankle], 400.0 / 128.0);
        assert_approx_eq!(input[right_ankle + 1], 200.0 / 512.0);
    }

    #[test]
    fn scores_keep_engine_order() {
        let engine = FakeEngine::new(vec![1, INPUT_LEN], vec![0.1, 0.7, 0.2]);
        let mut classifier = PoseClassifier::new(Box::new(engine), labels()).unwrap();
        let scores = classifier.classify(&plank_person()).unwrap();
        assert_eq!(
            scores,
            vec![
                ("tree".to_owned(), 0.1),
                ("plank".to_owned(), 0.7),
                ("warrior two".to_owned(), 0.2)
            ]
        );
        assert_eq!(top_label(&scores), "plank");
        assert_eq!(format_top_label(Some(scores.as_slice())), "plank (0.70)");
    }

    #[test]
    fn ranking_is_stable() {
        let scores = vec![
            ("a".to_owned(), 0.5),
            ("b".to_owned(), 0.9),
            ("c".to_owned(), 0.5),
        ];
        let order = ranked(&scores)
            .into_iter()
            .map(|(label, _)| label)
            .collect::<Vec<_>>();
        assert_eq!(order, vec!["b", "a", "c"]);
    }

    #[test]
    fn no_scores() {
        assert_eq!(top_label(&[]), "");
        assert_eq!(format_top_label(None), "empty");
        assert_eq!(format_top_label(Some(&[][..])), "empty");
    }

    #[test]
    fn close_releases_engine() {
        let engine = FakeEngine::new(vec![1, INPUT_LEN], vec![0.0; 3]);
        let closed = engine.closed.clone();
        let classifier = PoseClassifier::new(Box::new(engine), labels()).unwrap();
        classifier.close();
        assert!(closed.load(Ordering::SeqCst));
    }

    #[test]
    fn labels_skip_blank_lines() {
        let dir = std::env::temp_dir().join(format!("pose-coach-labels-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(LABELS_FILE_NAME);
        fs::write(&path, "tree\nplank\n\nwarrior two\n").unwrap();
        assert_eq!(load_labels(&path).unwrap(), labels());
        fs::remove_dir_all(&dir).unwrap();
    }
}
