use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use moodlens_core::{
    EmotionClassifier, FaceDetector, FrameSource, SessionAggregator, SessionStatus,
    SessionSummary,
};
use moodlens_hw::{Camera, CameraSource, ImageSequence};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "moodlens", about = "moodlens facial expression and emotion analysis CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one session in-process and print the summary as JSON
    Run {
        /// Frames to process
        #[arg(short, long, default_value_t = moodlens_core::session::DEFAULT_FRAMES_PER_SESSION)]
        frames: usize,
        /// V4L2 camera device
        #[arg(short, long, default_value = "/dev/video0")]
        camera: String,
        /// Read frames from a directory of images instead of the camera
        #[arg(short, long, conflicts_with = "camera")]
        images: Option<PathBuf>,
        /// Directory containing the ONNX models
        #[arg(short, long)]
        model_dir: Option<PathBuf>,
        /// Camera frames to discard before the session starts
        #[arg(long, default_value_t = 5)]
        warmup: usize,
    },
    /// Ask the daemon to run one session
    Session {
        /// Frames to process (0 = daemon default)
        #[arg(short, long, default_value_t = 0)]
        frames: u32,
    },
    /// Show daemon status
    Status,
    /// List V4L2 capture devices
    Devices,
}

#[zbus::proxy(
    interface = "org.moodlens.Daemon1",
    default_service = "org.moodlens.Daemon1",
    default_path = "/org/moodlens/Daemon1"
)]
trait Moodlens {
    async fn run_session(&self, frames: u32) -> zbus::Result<String>;
    async fn status(&self) -> zbus::Result<String>;
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            frames,
            camera,
            images,
            model_dir,
            warmup,
        } => {
            let model_dir = model_dir.unwrap_or_else(moodlens_core::default_model_dir);
            let summary = match images {
                Some(dir) => run_local(&model_dir, frames, &mut ImageSequence::new(dir))?,
                None => run_local(&model_dir, frames, &mut CameraSource::new(camera, warmup))?,
            };
            println!("{}", summary.to_json());
            if summary.status == SessionStatus::Failed {
                std::process::exit(1);
            }
        }
        Commands::Session { frames } => {
            let proxy = daemon().await?;
            let summary = proxy
                .run_session(frames)
                .await
                .context("RunSession call failed")?;
            println!("{summary}");
        }
        Commands::Status => {
            let proxy = daemon().await?;
            let status = proxy.status().await.context("Status call failed")?;
            println!("{status}");
        }
        Commands::Devices => {
            let devices = Camera::list_devices();
            if devices.is_empty() {
                println!("No V4L2 capture devices found");
            }
            for dev in devices {
                println!("{}  {} ({}, {})", dev.path, dev.name, dev.driver, dev.bus);
            }
        }
    }

    Ok(())
}

fn run_local<S: FrameSource>(
    model_dir: &std::path::Path,
    frames: usize,
    source: &mut S,
) -> Result<SessionSummary> {
    let scrfd_path = model_dir.join(moodlens_core::SCRFD_MODEL_FILE);
    let scrfd_path = scrfd_path.to_string_lossy();
    let detector = FaceDetector::load(&scrfd_path)
        .with_context(|| format!("failed to load landmark model {scrfd_path}"))?;

    let emotion_path = model_dir.join(moodlens_core::EMOTION_MODEL_FILE);
    let emotion = EmotionClassifier::load(&emotion_path.to_string_lossy());

    let mut aggregator = SessionAggregator::new(detector, emotion).with_frames_per_session(frames);
    tracing::info!(
        model_dir = %model_dir.display(),
        frames,
        emotion_available = aggregator.emotion_available(),
        "running local session"
    );
    Ok(aggregator.run(source))
}

async fn daemon() -> Result<MoodlensProxy<'static>> {
    let conn = zbus::Connection::session()
        .await
        .context("cannot connect to the session bus")?;
    let proxy = MoodlensProxy::new(&conn)
        .await
        .context("cannot reach moodlensd")?;
    tracing::debug!("connected to moodlensd");
    Ok(proxy)
}
