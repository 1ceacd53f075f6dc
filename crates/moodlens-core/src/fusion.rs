//! Per-frame fusion of landmark, expression and emotion results.
//!
//! Each frame goes through: landmarks → expression → face region → emotion.
//! Failures never escape a frame: a failing emotion model degrades to
//! [`EmotionOutcome::Failed`], anything else is recorded in
//! [`FrameResult::error`] next to whatever was computed before it.

use crate::detector::{DetectorError, LandmarkProvider};
use crate::emotion::EmotionProvider;
use crate::expression;
use crate::frame::{Frame, FrameError};
use crate::region;
use crate::types::{BoundingBox, EmotionOutcome, FrameResult};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FusionError {
    #[error("landmark detection failed: {0}")]
    Landmarks(#[from] DetectorError),
    #[error("{0}")]
    Frame(#[from] FrameError),
}

/// Runs the per-frame pipeline over an owned landmark provider and an
/// optional emotion provider.
pub struct FrameFusion<L, E> {
    landmarks: L,
    emotion: Option<E>,
}

impl<L: LandmarkProvider, E: EmotionProvider> FrameFusion<L, E> {
    /// `emotion` is `None` when the emotion model could not be loaded; every
    /// frame then reports [`EmotionOutcome::Unavailable`].
    pub fn new(landmarks: L, emotion: Option<E>) -> Self {
        Self { landmarks, emotion }
    }

    pub fn emotion_available(&self) -> bool {
        self.emotion.is_some()
    }

    /// Process one frame. Always yields exactly one result.
    pub fn process(&mut self, frame: &Frame) -> FrameResult {
        let mut result = FrameResult::new();
        if let Err(e) = self.fuse(frame, &mut result) {
            tracing::warn!(seq = frame.sequence, error = %e, "frame processing failed");
            result.error = Some(e.to_string());
        }
        tracing::debug!(
            seq = frame.sequence,
            face = result.face_detected,
            expression = result.expression_label(),
            emotion = ?result.emotion.map(|e| e.label()),
            "frame fused"
        );
        result
    }

    fn fuse(&mut self, frame: &Frame, result: &mut FrameResult) -> Result<(), FusionError> {
        let Some(landmarks) = self.landmarks.detect(frame)? else {
            result.emotion = (!self.emotion_available()).then_some(EmotionOutcome::Unavailable);
            return Ok(());
        };

        result.face_detected = true;
        result.expression = Some(expression::classify(&landmarks));

        let region = region::face_region(&landmarks, frame.width, frame.height);
        result.emotion = Some(self.attempt_emotion(frame, &region)?);
        Ok(())
    }

    fn attempt_emotion(
        &mut self,
        frame: &Frame,
        region: &BoundingBox,
    ) -> Result<EmotionOutcome, FusionError> {
        let Some(provider) = self.emotion.as_mut() else {
            return Ok(EmotionOutcome::Unavailable);
        };

        let image = frame.to_image()?;
        let Some(face) = region::crop(&image, region) else {
            tracing::debug!(seq = frame.sequence, ?region, "empty face region, skipping emotion");
            return Ok(EmotionOutcome::Unavailable);
        };

        match provider.classify(&face) {
            Ok(emotion) => Ok(EmotionOutcome::Labeled(emotion)),
            Err(e) => {
                tracing::warn!(seq = frame.sequence, error = %e, "emotion classification failed");
                Ok(EmotionOutcome::Failed)
            }
        }
    }
}
