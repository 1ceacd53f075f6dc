use moodlens_core::{
    EmotionProvider, FrameSource, LandmarkProvider, SessionAggregator, SessionSummary,
};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Messages sent from D-Bus handlers to the engine thread.
enum EngineRequest {
    RunSession {
        frames: usize,
        reply: oneshot::Sender<SessionSummary>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
    emotion_available: bool,
}

impl EngineHandle {
    /// Queue one session of `frames` frames and wait for its summary.
    /// Sessions run one at a time in request order.
    pub async fn run_session(&self, frames: usize) -> Result<SessionSummary, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::RunSession {
                frames,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    pub fn emotion_available(&self) -> bool {
        self.emotion_available
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// The aggregator (and the models inside it) lives on that thread for the
/// process lifetime. `make_source` builds a fresh frame source per session,
/// so the camera is only held while a session runs.
pub fn spawn_engine<L, E, S, F>(
    mut aggregator: SessionAggregator<L, E>,
    mut make_source: F,
) -> Result<EngineHandle, EngineError>
where
    L: LandmarkProvider + Send + 'static,
    E: EmotionProvider + Send + 'static,
    S: FrameSource,
    F: FnMut() -> S + Send + 'static,
{
    let emotion_available = aggregator.emotion_available();
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    std::thread::Builder::new()
        .name("moodlens-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::RunSession { frames, reply } => {
                        let mut source = make_source();
                        let summary = aggregator.run_frames(&mut source, frames);
                        if reply.send(summary).is_err() {
                            tracing::warn!("session finished after its caller gave up");
                        }
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })?;

    Ok(EngineHandle {
        tx,
        emotion_available,
    })
}
