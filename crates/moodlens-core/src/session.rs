//! Session aggregation: run fusion over a bounded window of frames and
//! reduce the results to one verdict.

use crate::detector::LandmarkProvider;
use crate::emotion::{EmotionError, EmotionProvider};
use crate::expression::Expression;
use crate::fusion::FrameFusion;
use crate::source::{FrameSource, OpenSource};
use crate::tally::LabelTally;
use crate::types::{timestamp, EmotionOutcome, FrameResult};
use serde::Serialize;

pub const DEFAULT_FRAMES_PER_SESSION: usize = 10;
pub const NO_FACE_MESSAGE: &str = "No face detected in video stream";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Completed,
    Failed,
}

/// Session-level verdict, serialized as the session trigger's response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub status: SessionStatus,
    pub frames_processed: usize,
    /// Frames with a detected face that processed without error.
    pub detections_found: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dominant_expression: Option<Expression>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression_confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dominant_emotion: Option<EmotionOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emotion_confidence: Option<f64>,
    /// Expression of every counted detection, in frame order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub expressions: Vec<Expression>,
    /// Emotion outcome of every counted detection, in frame order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub emotions: Vec<EmotionOutcome>,
    pub emotion_available: bool,
    /// Frames whose processing raised; not counted as detections.
    pub frame_errors: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set when the source failed mid-session; the summary covers the
    /// frames read before the failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capture_error: Option<String>,
    pub timestamp: String,
}

impl SessionSummary {
    /// Summary for a session whose frame source could not be opened.
    pub fn failed(error: impl Into<String>, emotion_available: bool) -> Self {
        Self {
            status: SessionStatus::Failed,
            frames_processed: 0,
            detections_found: 0,
            dominant_expression: None,
            expression_confidence: None,
            dominant_emotion: None,
            emotion_confidence: None,
            expressions: Vec::new(),
            emotions: Vec::new(),
            emotion_available,
            frame_errors: 0,
            message: None,
            error: Some(error.into()),
            capture_error: None,
            timestamp: timestamp(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| {
            serde_json::json!({
                "status": SessionStatus::Failed,
                "error": format!("serialization failed: {e}"),
                "timestamp": self.timestamp,
            })
            .to_string()
        })
    }
}

/// Counters gathered while the session loop runs.
#[derive(Debug, Default)]
pub struct SessionStats {
    pub frames_processed: usize,
    pub frame_errors: usize,
    pub capture_error: Option<String>,
}

/// Reduce the retained (face-detected, error-free) frame results of a
/// session to a summary.
pub fn summarize(
    retained: &[FrameResult],
    stats: SessionStats,
    emotion_available: bool,
) -> SessionSummary {
    let mut summary = SessionSummary {
        status: SessionStatus::Completed,
        frames_processed: stats.frames_processed,
        detections_found: retained.len(),
        dominant_expression: None,
        expression_confidence: None,
        dominant_emotion: None,
        emotion_confidence: None,
        expressions: Vec::new(),
        emotions: Vec::new(),
        emotion_available,
        frame_errors: stats.frame_errors,
        message: None,
        error: None,
        capture_error: stats.capture_error,
        timestamp: timestamp(),
    };

    if retained.is_empty() {
        summary.message = Some(NO_FACE_MESSAGE.to_string());
        return summary;
    }

    let expressions: LabelTally<Option<Expression>> =
        retained.iter().map(|r| r.expression).collect();
    let emotions: LabelTally<Option<EmotionOutcome>> =
        retained.iter().map(|r| r.emotion).collect();

    // Retained frames carry both labels, so the dominant entries are `Some`.
    summary.dominant_expression = expressions.dominant().and_then(|(label, _)| *label);
    summary.expression_confidence = Some(expressions.confidence(retained.len()));
    summary.dominant_emotion = emotions.dominant().and_then(|(label, _)| *label);
    summary.emotion_confidence = Some(emotions.confidence(retained.len()));
    summary.expressions = retained.iter().filter_map(|r| r.expression).collect();
    summary.emotions = retained.iter().filter_map(|r| r.emotion).collect();
    summary
}

/// Drives one session at a time over owned providers.
pub struct SessionAggregator<L, E> {
    fusion: FrameFusion<L, E>,
    frames_per_session: usize,
}

impl<L: LandmarkProvider, E: EmotionProvider> SessionAggregator<L, E> {
    /// Build an aggregator. A failed emotion-model load is not fatal: it is
    /// logged and the sessions report emotions as unavailable.
    pub fn new(landmarks: L, emotion: Result<E, EmotionError>) -> Self {
        let emotion = match emotion {
            Ok(provider) => Some(provider),
            Err(e) => {
                tracing::warn!(error = %e, "emotion model not available; continuing without emotions");
                None
            }
        };
        Self {
            fusion: FrameFusion::new(landmarks, emotion),
            frames_per_session: DEFAULT_FRAMES_PER_SESSION,
        }
    }

    pub fn with_frames_per_session(mut self, frames: usize) -> Self {
        self.frames_per_session = frames;
        self
    }

    pub fn frames_per_session(&self) -> usize {
        self.frames_per_session
    }

    pub fn emotion_available(&self) -> bool {
        self.fusion.emotion_available()
    }

    /// Run a session of the configured length.
    pub fn run<S: FrameSource>(&mut self, source: &mut S) -> SessionSummary {
        self.run_frames(source, self.frames_per_session)
    }

    /// Run a session of up to `frames` frames.
    ///
    /// The source is opened before the first frame and closed when the loop
    /// ends, however it ends. Only a failure to open is fatal.
    pub fn run_frames<S: FrameSource>(&mut self, source: &mut S, frames: usize) -> SessionSummary {
        let emotion_available = self.emotion_available();
        let mut open = match OpenSource::open(source) {
            Ok(open) => open,
            Err(e) => {
                tracing::warn!(error = %e, "cannot open frame source");
                return SessionSummary::failed(format!("cannot open frame source: {e}"), emotion_available);
            }
        };

        tracing::info!(frames, emotion_available, "session started");
        let mut stats = SessionStats::default();
        let mut retained = Vec::new();

        while stats.frames_processed < frames {
            let frame = match open.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    tracing::debug!(processed = stats.frames_processed, "frame source exhausted");
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, processed = stats.frames_processed, "frame capture failed; ending session");
                    stats.capture_error = Some(e.to_string());
                    break;
                }
            };

            let result = self.fusion.process(&frame);
            stats.frames_processed += 1;

            if result.error.is_some() {
                stats.frame_errors += 1;
            } else if result.face_detected {
                retained.push(result);
            }
        }
        drop(open);

        let summary = summarize(&retained, stats, emotion_available);
        tracing::info!(
            frames = summary.frames_processed,
            detections = summary.detections_found,
            errors = summary.frame_errors,
            expression = ?summary.dominant_expression,
            emotion = ?summary.dominant_emotion.map(|e| e.label()),
            "session completed"
        );
        summary
    }
}
