//! moodlens-core — Facial expression and emotion analysis engine.
//!
//! Fuses landmark-based expression rules with an ONNX emotion classifier
//! per frame, and aggregates a bounded window of frames into a session
//! verdict. SCRFD supplies landmarks and FER+ supplies emotions, both via
//! ONNX Runtime on the CPU.

pub mod detector;
pub mod emotion;
pub mod expression;
pub mod frame;
pub mod fusion;
pub mod region;
pub mod session;
pub mod source;
pub mod tally;
pub mod types;

use std::path::PathBuf;

pub use detector::{DetectorError, FaceDetector, LandmarkProvider};
pub use emotion::{EmotionClassifier, EmotionError, EmotionProvider};
pub use expression::Expression;
pub use frame::{Frame, FrameError};
pub use fusion::FrameFusion;
pub use session::{SessionAggregator, SessionStatus, SessionSummary};
pub use source::FrameSource;
pub use types::{BoundingBox, Emotion, EmotionOutcome, FrameResult, Landmark, LandmarkSet, Topology};

/// SCRFD face detector with five-point keypoints.
pub const SCRFD_MODEL_FILE: &str = "det_10g.onnx";
/// FER+ eight-class emotion model.
pub const EMOTION_MODEL_FILE: &str = "emotion-ferplus-8.onnx";

/// Per-user model directory: `$XDG_DATA_HOME/moodlens/models`, falling back
/// to `~/.local/share/moodlens/models`.
pub fn default_model_dir() -> PathBuf {
    let base = std::env::var_os("XDG_DATA_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("/usr/share"));
    base.join("moodlens").join("models")
}
