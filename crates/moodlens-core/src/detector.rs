//! SCRFD face detector via ONNX Runtime, used as the landmark provider.
//!
//! Decodes the 3-stride anchor-free SCRFD heads, suppresses overlaps with
//! NMS and turns the most confident face into a five-point [`LandmarkSet`].

use crate::frame::{Frame, FrameError};
use crate::types::{Landmark, LandmarkSet, Topology};
use image::imageops::{self, FilterType};
use image::GrayImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const SCRFD_INPUT_SIZE: usize = 640;
const SCRFD_MEAN: f32 = 127.5;
const SCRFD_STD: f32 = 128.0;
const SCRFD_CONFIDENCE_THRESHOLD: f32 = 0.5;
const SCRFD_NMS_THRESHOLD: f32 = 0.4;
const SCRFD_STRIDES: [usize; 3] = [8, 16, 32];
const SCRFD_ANCHORS_PER_CELL: usize = 2;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("frame: {0}")]
    Frame(#[from] FrameError),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Finds a face in a frame and describes it with landmarks.
pub trait LandmarkProvider {
    /// Landmarks of the most prominent face, or `None` if there is none.
    fn detect(&mut self, frame: &Frame) -> Result<Option<LandmarkSet>, DetectorError>;
}

/// One detected face in pixel coordinates.
#[derive(Debug, Clone)]
pub struct Detection {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// `[left_eye, right_eye, nose, left_mouth, right_mouth]`.
    pub keypoints: Option<[(f32, f32); 5]>,
}

impl Detection {
    /// Normalize into a landmark set for a `width` x `height` frame.
    ///
    /// The five keypoints come first, followed by the two box corners so the
    /// face region covers the whole detected face, not only the keypoints.
    pub fn to_landmarks(&self, width: u32, height: u32) -> Option<LandmarkSet> {
        if width == 0 || height == 0 {
            return None;
        }
        let norm = |x: f32, y: f32| {
            Landmark::new(
                (x / width as f32).clamp(0.0, 1.0),
                (y / height as f32).clamp(0.0, 1.0),
            )
        };

        let mut points = Vec::with_capacity(7);
        if let Some(kps) = &self.keypoints {
            points.extend(kps.iter().map(|&(x, y)| norm(x, y)));
        }
        points.push(norm(self.x, self.y));
        points.push(norm(self.x + self.width, self.y + self.height));

        let topology = if self.keypoints.is_some() {
            Topology::FivePoint
        } else {
            Topology::Unstructured
        };
        LandmarkSet::new(points, topology)
    }
}

/// Letterbox placement of the frame inside the square model input.
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

impl Letterbox {
    fn unmap(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

/// Output tensor indices for one stride: (score, bbox, kps).
type StrideOutputs = (usize, usize, usize);

/// SCRFD-based landmark provider.
pub struct FaceDetector {
    session: Session,
    stride_outputs: [StrideOutputs; 3],
}

impl FaceDetector {
    /// Load the SCRFD ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, DetectorError> {
        if !Path::new(model_path).exists() {
            return Err(DetectorError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)
            .map_err(ort::Error::from)?
            .commit_from_file(model_path)?;

        let output_names: Vec<String> =
            session.outputs().iter().map(|o| o.name().to_string()).collect();
        tracing::info!(path = model_path, outputs = ?output_names, "loaded SCRFD model");

        if output_names.len() < 9 {
            return Err(DetectorError::InferenceFailed(format!(
                "SCRFD model requires 9 outputs (3 strides x score/bbox/kps), got {}",
                output_names.len()
            )));
        }

        let stride_outputs = stride_outputs(&output_names);
        tracing::debug!(?stride_outputs, "SCRFD output tensor mapping");

        Ok(Self {
            session,
            stride_outputs,
        })
    }

    /// Detect faces, most confident first.
    pub fn detect_faces(&mut self, image: &GrayImage) -> Result<Vec<Detection>, DetectorError> {
        if image.width() == 0 || image.height() == 0 {
            return Ok(Vec::new());
        }
        let (input, letterbox) = preprocess(image);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut candidates = Vec::new();
        for (slot, &stride) in SCRFD_STRIDES.iter().enumerate() {
            let (score_idx, bbox_idx, kps_idx) = self.stride_outputs[slot];
            let extract = |idx: usize, what: &str| {
                outputs[idx]
                    .try_extract_tensor::<f32>()
                    .map(|(_, data)| data)
                    .map_err(|e| {
                        DetectorError::InferenceFailed(format!("{what} stride {stride}: {e}"))
                    })
            };
            let heads = StrideHeads {
                scores: extract(score_idx, "scores")?,
                boxes: extract(bbox_idx, "bboxes")?,
                keypoints: extract(kps_idx, "kps")?,
            };
            candidates.extend(heads.decode(stride, &letterbox, SCRFD_CONFIDENCE_THRESHOLD));
        }

        Ok(nms(candidates, SCRFD_NMS_THRESHOLD))
    }
}

impl LandmarkProvider for FaceDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Option<LandmarkSet>, DetectorError> {
        let image = frame.to_image()?;
        let faces = self.detect_faces(&image)?;
        let Some(best) = faces.first() else {
            return Ok(None);
        };
        tracing::debug!(
            seq = frame.sequence,
            faces = faces.len(),
            confidence = best.confidence,
            "face detected"
        );
        Ok(best.to_landmarks(frame.width, frame.height))
    }
}

/// Letterbox the frame into a NCHW tensor normalized for SCRFD.
///
/// Padding is filled with the mean, which normalizes to zero.
fn preprocess(image: &GrayImage) -> (Array4<f32>, Letterbox) {
    let (width, height) = image.dimensions();
    let size = SCRFD_INPUT_SIZE as f32;
    let scale = (size / width as f32).min(size / height as f32);

    let new_w = ((width as f32 * scale).round() as u32).clamp(1, SCRFD_INPUT_SIZE as u32);
    let new_h = ((height as f32 * scale).round() as u32).clamp(1, SCRFD_INPUT_SIZE as u32);
    let pad_x = (SCRFD_INPUT_SIZE as u32 - new_w) as f32 / 2.0;
    let pad_y = (SCRFD_INPUT_SIZE as u32 - new_h) as f32 / 2.0;

    let resized = imageops::resize(image, new_w, new_h, FilterType::Triangle);

    let mut tensor = Array4::<f32>::zeros((1, 3, SCRFD_INPUT_SIZE, SCRFD_INPUT_SIZE));
    let (x0, y0) = (pad_x.floor() as usize, pad_y.floor() as usize);
    for (x, y, pixel) in resized.enumerate_pixels() {
        let value = (pixel[0] as f32 - SCRFD_MEAN) / SCRFD_STD;
        let (tx, ty) = (x0 + x as usize, y0 + y as usize);
        // Grayscale replicated into all three channels
        for c in 0..3 {
            tensor[[0, c, ty, tx]] = value;
        }
    }

    (tensor, Letterbox { scale, pad_x, pad_y })
}

/// Map output tensors to stride slots.
///
/// Exports either name their heads `score_8`, `bbox_16`, `kps_32`, ... or use
/// opaque names in the standard order: scores 8/16/32, boxes 8/16/32,
/// keypoints 8/16/32.
fn stride_outputs(names: &[String]) -> [StrideOutputs; 3] {
    let find = |prefix: &str, stride: usize| {
        let target = format!("{prefix}_{stride}");
        names.iter().position(|n| *n == target)
    };

    let named: Option<Vec<StrideOutputs>> = SCRFD_STRIDES
        .iter()
        .map(|&stride| Some((find("score", stride)?, find("bbox", stride)?, find("kps", stride)?)))
        .collect();

    match named {
        Some(slots) => [slots[0], slots[1], slots[2]],
        None => {
            tracing::info!(?names, "SCRFD: output names not recognized, using positional mapping");
            [(0, 3, 6), (1, 4, 7), (2, 5, 8)]
        }
    }
}

/// Raw head outputs of one stride level.
struct StrideHeads<'a> {
    scores: &'a [f32],
    boxes: &'a [f32],
    keypoints: &'a [f32],
}

impl StrideHeads<'_> {
    fn decode(&self, stride: usize, letterbox: &Letterbox, threshold: f32) -> Vec<Detection> {
        let grid_w = SCRFD_INPUT_SIZE / stride;
        let grid_h = SCRFD_INPUT_SIZE / stride;
        let anchors = grid_w * grid_h * SCRFD_ANCHORS_PER_CELL;
        let s = stride as f32;

        let mut detections = Vec::new();
        for idx in 0..anchors.min(self.scores.len()) {
            let score = self.scores[idx];
            if !(score > threshold) {
                continue;
            }

            let cell = idx / SCRFD_ANCHORS_PER_CELL;
            let cx = (cell % grid_w) as f32 * s;
            let cy = (cell / grid_w) as f32 * s;

            let Some(d) = self.boxes.get(idx * 4..idx * 4 + 4) else {
                continue;
            };
            let (x1, y1) = letterbox.unmap(cx - d[0] * s, cy - d[1] * s);
            let (x2, y2) = letterbox.unmap(cx + d[2] * s, cy + d[3] * s);

            let keypoints = self.keypoints.get(idx * 10..idx * 10 + 10).map(|k| {
                std::array::from_fn(|i| letterbox.unmap(cx + k[i * 2] * s, cy + k[i * 2 + 1] * s))
            });

            detections.push(Detection {
                x: x1,
                y: y1,
                width: x2 - x1,
                height: y2 - y1,
                confidence: score,
                keypoints,
            });
        }
        detections
    }
}

/// Greedy non-maximum suppression; output is sorted by confidence.
fn nms(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<Detection> = Vec::new();
    for candidate in detections {
        if keep.iter().all(|k| iou(k, &candidate) <= iou_threshold) {
            keep.push(candidate);
        }
    }
    keep
}

fn iou(a: &Detection, b: &Detection) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.width).min(b.x + b.width);
    let y2 = (a.y + a.height).min(b.y + b.height);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = a.width * a.height + b.width * b.height - inter;
    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(x: f32, y: f32, w: f32, h: f32, confidence: f32) -> Detection {
        Detection { x, y, width: w, height: h, confidence, keypoints: None }
    }

    #[test]
    fn test_iou_identical() {
        let a = detection(0.0, 0.0, 100.0, 100.0, 1.0);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_partial() {
        let a = detection(0.0, 0.0, 10.0, 10.0, 1.0);
        let b = detection(5.0, 0.0, 10.0, 10.0, 1.0);
        assert!((iou(&a, &b) - 50.0 / 150.0).abs() < 1e-6);
        let c = detection(20.0, 20.0, 10.0, 10.0, 1.0);
        assert_eq!(iou(&a, &c), 0.0);
    }

    #[test]
    fn test_nms_keeps_best_of_overlapping() {
        let result = nms(
            vec![
                detection(5.0, 5.0, 100.0, 100.0, 0.8),
                detection(200.0, 200.0, 50.0, 50.0, 0.7),
                detection(0.0, 0.0, 100.0, 100.0, 0.9),
            ],
            0.4,
        );
        let confidences: Vec<f32> = result.iter().map(|d| d.confidence).collect();
        assert_eq!(confidences, vec![0.9, 0.7]);
    }

    #[test]
    fn test_stride_outputs_named_and_shuffled() {
        let names: Vec<String> = [
            "bbox_8", "kps_8", "score_8", "bbox_16", "kps_16", "score_16", "bbox_32", "kps_32",
            "score_32",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        assert_eq!(stride_outputs(&names), [(2, 0, 1), (5, 3, 4), (8, 6, 7)]);
    }

    #[test]
    fn test_stride_outputs_positional_fallback() {
        let names: Vec<String> = (0..9).map(|i: usize| i.to_string()).collect();
        assert_eq!(stride_outputs(&names), [(0, 3, 6), (1, 4, 7), (2, 5, 8)]);
    }

    #[test]
    fn test_preprocess_letterbox_geometry() {
        let image = GrayImage::from_pixel(320, 160, image::Luma([128]));
        let (tensor, letterbox) = preprocess(&image);
        assert_eq!(tensor.shape(), &[1, 3, SCRFD_INPUT_SIZE, SCRFD_INPUT_SIZE]);
        assert!((letterbox.scale - 2.0).abs() < 1e-6);
        assert_eq!(letterbox.pad_x, 0.0);
        assert_eq!(letterbox.pad_y, 160.0);
        // Padding rows normalize to zero, image rows to (128 - mean) / std
        assert_eq!(tensor[[0, 0, 0, 0]], 0.0);
        let inside = tensor[[0, 1, 320, 320]];
        assert!((inside - (128.0 - SCRFD_MEAN) / SCRFD_STD).abs() < 1e-6);
    }

    #[test]
    fn test_decode_maps_back_to_frame() {
        let letterbox = Letterbox { scale: 2.0, pad_x: 0.0, pad_y: 160.0 };
        let stride = 32;
        let cells = (SCRFD_INPUT_SIZE / stride).pow(2) * SCRFD_ANCHORS_PER_CELL;
        let mut scores = vec![0.0; cells];
        let mut boxes = vec![0.0; cells * 4];
        let keypoints = vec![0.0; cells * 10];

        // Anchor 42 → cell 21 → column 1, row 1 → centre (32, 32) in input space
        scores[42] = 0.9;
        boxes[42 * 4..42 * 4 + 4].copy_from_slice(&[0.5, 0.5, 0.5, 0.5]);

        let heads = StrideHeads { scores: &scores, boxes: &boxes, keypoints: &keypoints };
        let dets = heads.decode(stride, &letterbox, 0.5);
        assert_eq!(dets.len(), 1);
        let d = &dets[0];
        // Input box 16..48 on both axes, unmapped: x / 2, (y - 160) / 2
        assert!((d.x - 8.0).abs() < 1e-4);
        assert!((d.y - -72.0).abs() < 1e-4);
        assert!((d.width - 16.0).abs() < 1e-4);
        assert!(d.keypoints.is_some());
    }

    #[test]
    fn test_to_landmarks_five_point_with_corners() {
        let det = Detection {
            x: 100.0,
            y: 50.0,
            width: 200.0,
            height: 300.0,
            confidence: 0.9,
            keypoints: Some([
                (160.0, 150.0),
                (240.0, 150.0),
                (200.0, 200.0),
                (170.0, 260.0),
                (230.0, 260.0),
            ]),
        };
        let set = det.to_landmarks(400, 400).unwrap();
        assert_eq!(set.topology(), Topology::FivePoint);
        assert_eq!(set.len(), 7);
        assert_eq!(set.point(0), Landmark::new(0.4, 0.375));
        assert_eq!(set.point(5), Landmark::new(0.25, 0.125));
        assert_eq!(set.point(6), Landmark::new(0.75, 0.875));
    }

    #[test]
    fn test_to_landmarks_clamps_and_handles_missing_keypoints() {
        let det = detection(-50.0, -10.0, 500.0, 100.0, 0.8);
        let set = det.to_landmarks(200, 200).unwrap();
        assert_eq!(set.topology(), Topology::Unstructured);
        assert_eq!(set.point(0), Landmark::new(0.0, 0.0));
        assert_eq!(set.point(1), Landmark::new(1.0, 0.45));
        assert!(det.to_landmarks(0, 200).is_none());
    }
}
