use crate::{
    error::Error,
    fps::FpsTimer,
    pipeline::{FrameOutput, Pipeline},
};
use crossbeam::channel::{Sender, TrySendError};
use opencv::core::Mat;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};
use tracing::{error, info, trace, warn};

/// Pause after a failed read before asking the source again.
const READ_RETRY_DELAY: Duration = Duration::from_millis(20);
/// The session ends after this many failed reads in a row.
const MAX_CONSECUTIVE_READ_FAILURES: u32 = 50;

/// Where frames come from.
pub trait FrameSource: Send {
    /// Acquire the device or file. Called once, before any frame is requested.
    fn open(&mut self) -> Result<(), Error>;

    /// The newest decoded RGB frame, or `None` at end of stream.
    fn latest_frame(&mut self) -> Result<Option<Mat>, Error>;
}

/// Where annotated frames go.
pub trait FrameSink: Send {
    fn show(&mut self, output: FrameOutput) -> Result<(), Error>;
}

/// Never blocks: a frame arriving while the channel is full is dropped.
impl FrameSink for Sender<FrameOutput> {
    fn show(&mut self, output: FrameOutput) -> Result<(), Error> {
        match self.try_send(output) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                trace!(message = "sink full, frame dropped");
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => Err(Error::SinkDisconnected),
        }
    }
}

/// A running capture: one thread pulling frames through the pipeline into a sink, plus the
/// frame rate timer.
pub struct Session {
    pipeline: Arc<Pipeline>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    fps_timer: Option<FpsTimer>,
}

impl Session {
    /// Open `source` and start processing. Nothing is started when opening fails.
    pub fn start<S, K>(pipeline: Arc<Pipeline>, mut source: S, mut sink: K) -> Result<Self, Error>
    where
        S: FrameSource + 'static,
        K: FrameSink + 'static,
    {
        source.open()?;

        let fps_timer = FpsTimer::start(pipeline.fps_counter(), pipeline.config().fps_period)?;
        let running = Arc::new(AtomicBool::new(true));

        let worker = {
            let pipeline = pipeline.clone();
            let running = running.clone();
            thread::Builder::new()
                .name("pose-session".to_owned())
                .spawn(move || {
                    let mut read_failures = 0;
                    while running.load(Ordering::SeqCst) {
                        let frame = match source.latest_frame() {
                            Ok(Some(frame)) => frame,
                            Ok(None) => {
                                info!(message = "end of stream");
                                break;
                            }
                            Err(error) => {
                                read_failures += 1;
                                error!(message = "failed to read frame", %error, read_failures);
                                if read_failures >= MAX_CONSECUTIVE_READ_FAILURES {
                                    error!(message = "giving up on frame source");
                                    break;
                                }
                                thread::sleep(READ_RETRY_DELAY);
                                continue;
                            }
                        };
                        read_failures = 0;

                        if let Err(error) = pipeline
                            .process_frame(&frame)
                            .and_then(|output| sink.show(output))
                        {
                            error!(message = "dropped frame", %error);
                            if let Error::SinkDisconnected = error {
                                break;
                            }
                        }
                    }
                    running.store(false, Ordering::SeqCst);
                })
        };

        let worker = match worker {
            Ok(worker) => worker,
            Err(e) => {
                fps_timer.stop();
                return Err(Error::SpawnThread(e, "pose-session"));
            }
        };

        info!(message = "session started");
        Ok(Self {
            pipeline,
            running,
            worker: Some(worker),
            fps_timer: Some(fps_timer),
        })
    }

    /// False once the stream ended or the session was asked to stop.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Flag that stops the session when cleared, e.g. from a signal handler.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.running.store(false, Ordering::SeqCst);

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!(message = "session thread panicked");
            }
        }

        self.pipeline.close();

        if let Some(fps_timer) = self.fps_timer.take() {
            fps_timer.stop();
            self.pipeline.fps_counter().reset();
            info!(message = "session closed");
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.worker.is_some() {
            warn!(message = "session dropped without close");
        }
        self.shutdown();
    }
}
