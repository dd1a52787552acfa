use crate::error::Error;
use std::time::{Duration, Instant};

mod dnn;
pub use dnn::DnnEngine;

/// An opaque forward-pass engine with one input and one output tensor.
pub trait InferenceEngine: Send {
    /// Shape of the input tensor, e.g. `[1, 256, 256, 3]`.
    fn input_shape(&self) -> &[usize];

    /// Number of elements in the output tensor.
    fn output_len(&self) -> usize;

    /// Run one forward pass over a row-major input tensor.
    fn run(&mut self, input: &[f32]) -> Result<Vec<f32>, Error>;

    /// Release the underlying model.
    fn close(self: Box<Self>) {}

    fn input_len(&self) -> usize {
        self.input_shape().iter().product()
    }
}

#[derive(Debug, Copy, Clone, Default)]
pub struct Timing {
    pub inference: Duration,
}

/// Check tensor lengths around a forward pass and time it.
pub(crate) fn timed_run(
    engine: &mut dyn InferenceEngine,
    input: &[f32],
) -> Result<(Vec<f32>, Timing), Error> {
    let expected = engine.input_len();
    if input.len() != expected {
        return Err(Error::EngineInputLength {
            expected,
            actual: input.len(),
        });
    }

    let start_inference = Instant::now();
    let output = engine.run(input)?;
    let inference = start_inference.elapsed();

    let expected = engine.output_len();
    if output.len() != expected {
        return Err(Error::EngineOutputLength {
            expected,
            actual: output.len(),
        });
    }
    Ok((output, Timing { inference }))
}

#[cfg(test)]
pub(crate) mod test_utils {
    use super::*;
    use std::sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    };

    /// Engine returning a canned output and recording what it was fed.
    pub(crate) struct FakeEngine {
        pub(crate) input_shape: Vec<usize>,
        pub(crate) output: Vec<f32>,
        pub(crate) last_input: Arc<std::sync::Mutex<Vec<f32>>>,
        pub(crate) runs: Arc<AtomicUsize>,
        pub(crate) closed: Arc<AtomicBool>,
    }

    impl FakeEngine {
        pub(crate) fn new(input_shape: Vec<usize>, output: Vec<f32>) -> Self {
            Self {
                input_shape,
                output,
                last_input: Default::default(),
                runs: Default::default(),
                closed: Default::default(),
            }
        }
    }

    impl InferenceEngine for FakeEngine {
        fn input_shape(&self) -> &[usize] {
            &self.input_shape
        }

        fn output_len(&self) -> usize {
            self.output.len()
        }

        fn run(&mut self, input: &[f32]) -> Result<Vec<f32>, Error> {
            assert!(!self.closed.load(Ordering::SeqCst), "run after close");
            *self.last_input.lock().unwrap() = input.to_vec();
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(self.output.clone())
        }

        fn close(self: Box<Self>) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{test_utils::FakeEngine, *};

    #[test]
    fn rejects_wrong_input_length() {
        let mut engine = FakeEngine::new(vec![1, 4], vec![0.0; 2]);
        assert!(matches!(
            timed_run(&mut engine, &[0.0; 3]),
            Err(Error::EngineInputLength {
                expected: 4,
                actual: 3
            })
        ));
    }

    #[test]
    fn rejects_wrong_output_length() {
        struct Short;

        impl InferenceEngine for Short {
            fn input_shape(&self) -> &[usize] {
                &[2]
            }
            fn output_len(&self) -> usize {
                3
            }
            fn run(&mut self, _input: &[f32]) -> Result<Vec<f32>, Error> {
                Ok(vec![1.0])
            }
        }

        assert!(matches!(
            timed_run(&mut Short, &[0.0; 2]),
            Err(Error::EngineOutputLength {
                expected: 3,
                actual: 1
            })
        ));
    }

    #[test]
    fn passes_output_through() {
        let mut engine = FakeEngine::new(vec![1, 2], vec![0.25, 0.75]);
        let (output, _) = timed_run(&mut engine, &[1.0, 2.0]).unwrap();
        assert_eq!(output, vec![0.25, 0.75]);
        assert_eq!(*engine.last_input.lock().unwrap(), vec![1.0, 2.0]);
    }
}
