use crate::engine::EngineHandle;
use std::time::Duration;
use zbus::interface;

/// D-Bus interface for the moodlens session daemon.
///
/// Bus name: org.moodlens.Daemon1
/// Object path: /org/moodlens/Daemon1
pub struct MoodlensService {
    pub engine: EngineHandle,
    pub camera_device: String,
    pub frames_per_session: usize,
    pub session_timeout: Duration,
}

impl MoodlensService {
    fn frames_for(&self, requested: u32) -> usize {
        match requested {
            0 => self.frames_per_session,
            n => n as usize,
        }
    }
}

#[interface(name = "org.moodlens.Daemon1")]
impl MoodlensService {
    /// Run one analysis session and return its summary as JSON.
    ///
    /// `frames` of 0 selects the configured session length.
    async fn run_session(&self, frames: u32) -> zbus::fdo::Result<String> {
        let frames = self.frames_for(frames);
        tracing::info!(frames, "run_session requested");

        let summary = tokio::time::timeout(self.session_timeout, self.engine.run_session(frames))
            .await
            .map_err(|_| {
                tracing::warn!(timeout_secs = self.session_timeout.as_secs(), "session timed out");
                zbus::fdo::Error::Failed(format!(
                    "session timed out after {}s",
                    self.session_timeout.as_secs()
                ))
            })?
            .map_err(|e| {
                tracing::error!(error = %e, "engine error");
                zbus::fdo::Error::Failed(e.to_string())
            })?;

        Ok(summary.to_json())
    }

    /// Return daemon status information.
    async fn status(&self) -> zbus::fdo::Result<String> {
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "camera": self.camera_device,
            "emotion_model_available": self.engine.emotion_available(),
            "frames_per_session": self.frames_per_session,
            "session_timeout_secs": self.session_timeout.as_secs(),
        })
        .to_string())
    }
}
