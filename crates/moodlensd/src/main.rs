use anyhow::{Context, Result};
use moodlens_core::{EmotionClassifier, FaceDetector, SessionAggregator};
use moodlens_hw::CameraSource;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod config;
mod dbus_interface;
mod engine;

const BUS_NAME: &str = "org.moodlens.Daemon1";
const OBJECT_PATH: &str = "/org/moodlens/Daemon1";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("moodlensd starting");

    let config = config::Config::load().context("failed to load configuration")?;
    tracing::info!(
        camera = %config.camera_device,
        model_dir = %config.model_dir.display(),
        frames = config.frames_per_session,
        "configuration loaded"
    );

    // Landmarks are required; a missing emotion model only degrades sessions.
    let scrfd_path = config.scrfd_model_path();
    let detector = FaceDetector::load(&scrfd_path)
        .with_context(|| format!("failed to load landmark model {scrfd_path}"))?;
    let emotion = EmotionClassifier::load(&config.emotion_model_path());

    let aggregator = SessionAggregator::new(detector, emotion)
        .with_frames_per_session(config.frames_per_session);

    let camera_device = config.camera_device.clone();
    let warmup_frames = config.warmup_frames;
    let engine = engine::spawn_engine(aggregator, move || {
        CameraSource::new(camera_device.clone(), warmup_frames)
    })?;

    let service = dbus_interface::MoodlensService {
        engine,
        camera_device: config.camera_device.clone(),
        frames_per_session: config.frames_per_session,
        session_timeout: Duration::from_secs(config.session_timeout_secs),
    };

    let _conn = zbus::connection::Builder::session()?
        .name(BUS_NAME)?
        .serve_at(OBJECT_PATH, service)?
        .build()
        .await
        .context("failed to register on the session bus")?;

    tracing::info!(bus = BUS_NAME, path = OBJECT_PATH, "moodlensd ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("moodlensd shutting down");

    Ok(())
}
