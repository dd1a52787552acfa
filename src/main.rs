use anyhow::{Context, Result};
use crossbeam::channel::{self, RecvTimeoutError};
use indicatif::{ProgressBar, ProgressStyle};
use pose_coach::{
    capture::{CaptureSource, CaptureTarget, Rotation},
    classifier::{format_top_label, PoseClassifier},
    config::{ModelPaths, PipelineConfig},
    detector::{ModelType, MoveNet},
    pipeline::{FrameOutput, Pipeline, PipelineListener},
    reference::ReferenceTable,
    session::Session,
};
use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
    time::Duration,
};
use structopt::StructOpt;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;

/// Reports frame rate and the current label on a spinner.
struct ProgressListener {
    bar: ProgressBar,
    fps: AtomicU32,
}

impl ProgressListener {
    fn new() -> Self {
        Self {
            bar: ProgressBar::new_spinner().with_style(
                ProgressStyle::default_spinner()
                    .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
                    .template("{prefix:.bold.dim} {spinner} {wide_msg}"),
            ),
            fps: AtomicU32::new(0),
        }
    }
}

impl PipelineListener for ProgressListener {
    fn on_fps(&self, fps: u32) {
        self.fps.store(fps, Ordering::SeqCst);
        self.bar.inc(1);
    }

    fn on_detected(&self, score: f32, labels: Option<&[(String, f32)]>) {
        self.bar.set_message(format!(
            "FPS: {}, person: {:.2}, pose: {}",
            self.fps.load(Ordering::SeqCst),
            score,
            format_top_label(labels)
        ));
    }
}

#[cfg(feature = "gui")]
fn show(output: &FrameOutput, surface: opencv::core::Size, delay_ms: i32) -> Result<bool> {
    use opencv::{core::Mat, imgproc};

    const Q_KEY: u8 = b'q';

    let presented = pose_coach::display::present(&output.image, surface)?;
    let mut bgr = Mat::default();
    imgproc::cvt_color_def(&presented, &mut bgr, imgproc::COLOR_RGB2BGR)
        .context("failed converting frame to BGR")?;
    opencv::highgui::imshow("pose coach", &bgr).context("failed showing frame")?;
    Ok(opencv::highgui::wait_key(delay_ms)? != i32::from(Q_KEY))
}

#[cfg(not(feature = "gui"))]
fn show(_output: &FrameOutput, _surface: opencv::core::Size, _delay_ms: i32) -> Result<bool> {
    Ok(true)
}

#[derive(structopt::StructOpt)]
struct Opt {
    /// Directory holding the MoveNet models, the pose classifier and its labels.
    #[structopt(required = true, parse(from_os_str))]
    model_dir: PathBuf,

    /// MoveNet variant: thunder or lightning.
    #[structopt(short, long, default_value = "thunder")]
    model_type: ModelType,

    /// Classify poses and grade joint angles against the reference table.
    #[structopt(short, long)]
    classify: bool,

    /// Label file, one label per line. Defaults to labels.txt in the model directory.
    #[structopt(long, parse(from_os_str))]
    labels: Option<PathBuf>,

    /// JSON table of expected joint angles per pose.
    #[structopt(short, long, default_value = "poses.json", parse(from_os_str))]
    reference_table: PathBuf,

    /// Camera index or video file.
    #[structopt(short, long, default_value = "0")]
    device: CaptureTarget,

    /// The width of the input frame.
    #[structopt(long)]
    frame_width: Option<u32>,

    /// The height of the input frame.
    #[structopt(long)]
    frame_height: Option<u32>,

    /// Clockwise frame rotation in degrees: 90, 180 or 270.
    #[structopt(long)]
    rotate: Option<Rotation>,

    /// Persons scoring at or below this are not drawn.
    #[structopt(short = "-t", long, default_value = "0.2")]
    min_person_score: f32,

    /// The width of the display surface.
    #[structopt(short, long, default_value = "480")]
    width: i32,

    /// The height of the display surface.
    #[structopt(short = "-H", long, default_value = "800")]
    height: i32,

    #[structopt(short = "-W", long, default_value = "1")]
    wait_key_ms: i32,

    #[structopt(short, long, default_value = "info", env = "RUST_LOG")]
    log_level: tracing_subscriber::filter::EnvFilter,

    #[structopt(short, long)]
    show_progress: bool,
}

fn main() -> Result<()> {
    let opt = Opt::from_args();

    tracing::subscriber::set_global_default(
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer())
            .with(opt.log_level),
    )?;

    let table = Arc::new(ReferenceTable::load_or_empty(&opt.reference_table));
    let config = PipelineConfig {
        min_person_score: opt.min_person_score,
        classify: opt.classify,
        model_type: opt.model_type,
        ..Default::default()
    };
    let paths = ModelPaths::new(&opt.model_dir).with_labels(opt.labels.clone());

    let listener = if opt.show_progress {
        Some(Arc::new(ProgressListener::new()))
    } else {
        None
    };

    let mut pipeline = Pipeline::new(config.clone(), table);
    if let Some(listener) = listener.as_ref() {
        pipeline = pipeline.with_listener(listener.clone());
    }
    let pipeline = Arc::new(pipeline);

    let detector =
        MoveNet::load(&paths, config.model_type).context("failed loading pose detector")?;
    pipeline.set_detector(Some(Box::new(detector)));
    if config.classify {
        let classifier = PoseClassifier::load(&paths).context("failed loading pose classifier")?;
        info!(message = "classifier ready", labels = classifier.labels().len());
        pipeline.set_classifier(Some(classifier));
    }

    let source = CaptureSource::new(opt.device.clone())
        .with_size(opt.frame_width, opt.frame_height)
        .with_rotation(opt.rotate);
    let (frames_tx, frames_rx) = channel::bounded::<FrameOutput>(2);
    let session =
        Session::start(pipeline, source, frames_tx).context("failed starting capture session")?;

    let running = session.running_flag();
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .context("failed setting Ctrl-C handler")?;

    let surface = opencv::core::Size::new(opt.width, opt.height);
    let shown = loop {
        if !session.is_running() {
            break Ok(());
        }
        match frames_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(output) => match show(&output, surface, opt.wait_key_ms) {
                Ok(true) => {}
                Ok(false) => break Ok(()),
                Err(e) => break Err(e),
            },
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break Ok(()),
        }
    };

    // a worker that outlives the loop sees a disconnected sink and stops
    drop(frames_rx);
    session.close();

    if let Some(listener) = listener {
        listener.bar.finish_and_clear();
    }
    shown
}
