//! FER+ emotion classifier via ONNX Runtime.
//!
//! Classifies a grayscale face crop into one of eight emotions using the
//! `emotion-ferplus-8` model (64x64 single-channel input, raw 0–255 values).

use crate::types::Emotion;
use image::imageops::{self, FilterType};
use image::GrayImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const FERPLUS_INPUT_SIZE: u32 = 64;

#[derive(Error, Debug)]
pub enum EmotionError {
    #[error("emotion model unavailable: {0}")]
    ModelUnavailable(String),
    #[error("classification failed: {0}")]
    ClassificationFailed(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Assigns an emotion to a cropped face.
pub trait EmotionProvider {
    fn classify(&mut self, face: &GrayImage) -> Result<Emotion, EmotionError>;
}

/// FER+-based emotion provider.
pub struct EmotionClassifier {
    session: Session,
}

impl EmotionClassifier {
    /// Load the FER+ ONNX model.
    ///
    /// Every failure is reported as [`EmotionError::ModelUnavailable`]: the
    /// caller runs without emotions rather than not at all.
    pub fn load(model_path: &str) -> Result<Self, EmotionError> {
        if !Path::new(model_path).exists() {
            return Err(EmotionError::ModelUnavailable(format!(
                "model file not found: {model_path}"
            )));
        }

        let session = build_session(model_path)
            .map_err(|e| EmotionError::ModelUnavailable(format!("{model_path}: {e}")))?;

        tracing::info!(
            path = model_path,
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded FER+ model"
        );

        Ok(Self { session })
    }

    /// Resize a face crop and lay it out as a 1x1x64x64 float tensor.
    fn preprocess(face: &GrayImage) -> Array4<f32> {
        let size = FERPLUS_INPUT_SIZE;
        let resized = imageops::resize(face, size, size, FilterType::Triangle);
        let mut tensor = Array4::<f32>::zeros((1, 1, size as usize, size as usize));
        for (x, y, pixel) in resized.enumerate_pixels() {
            tensor[[0, 0, y as usize, x as usize]] = pixel[0] as f32;
        }
        tensor
    }
}

impl EmotionProvider for EmotionClassifier {
    fn classify(&mut self, face: &GrayImage) -> Result<Emotion, EmotionError> {
        if face.width() == 0 || face.height() == 0 {
            return Err(EmotionError::ClassificationFailed("empty face crop".into()));
        }
        let input = Self::preprocess(face);
        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, scores) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EmotionError::InferenceFailed(format!("score extraction: {e}")))?;

        top_emotion(scores)
    }
}

fn build_session(model_path: &str) -> Result<Session, ort::Error> {
    Ok(Session::builder()?
        .with_intra_threads(1)?
        .commit_from_file(model_path)?)
}

/// Highest-scoring emotion; the earlier label wins a tie.
fn top_emotion(scores: &[f32]) -> Result<Emotion, EmotionError> {
    if scores.len() != Emotion::ALL.len() {
        return Err(EmotionError::ClassificationFailed(format!(
            "expected {} scores, got {}",
            Emotion::ALL.len(),
            scores.len()
        )));
    }

    let mut best: Option<(usize, f32)> = None;
    for (i, &score) in scores.iter().enumerate() {
        if score.is_nan() {
            continue;
        }
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((i, score));
        }
    }

    best.map(|(i, _)| Emotion::ALL[i])
        .ok_or_else(|| EmotionError::ClassificationFailed("all scores are NaN".into()))
}
