use crate::expression::Expression;
use serde::{Serialize, Serializer};
use std::fmt;

/// Label reported in place of an expression when no face was found.
pub const FACE_NOT_DETECTED: &str = "Face Not Detected";
/// Label reported when the emotion model is absent for the session.
pub const EMOTION_UNAVAILABLE: &str = "Emotion model not available";
/// Label reported when the emotion model failed on a single frame.
pub const EMOTION_UNKNOWN: &str = "Unknown";

/// A facial landmark in normalized frame coordinates ([0, 1] on both axes).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Landmark) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn midpoint(&self, other: &Landmark) -> Landmark {
        Landmark::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// How the points of a [`LandmarkSet`] are indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Topology {
    /// `[left_eye, right_eye, nose, left_mouth, right_mouth, ..contour]`.
    /// Points past the fifth only widen the face region.
    FivePoint,
    /// MediaPipe face mesh indexing (468 points, 478 with irises).
    FaceMesh,
    /// No known indexing; usable for region extraction only.
    Unstructured,
}

/// Number of points a MediaPipe face mesh carries without irises.
pub const FACE_MESH_POINTS: usize = 468;

/// Non-empty set of landmarks for one face in one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    points: Vec<Landmark>,
    topology: Topology,
}

impl LandmarkSet {
    /// Build a landmark set. Returns `None` for an empty point list.
    ///
    /// A topology that the point count cannot satisfy is downgraded to
    /// [`Topology::Unstructured`].
    pub fn new(points: Vec<Landmark>, topology: Topology) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let topology = match topology {
            Topology::FivePoint if points.len() < 5 => Topology::Unstructured,
            Topology::FaceMesh if points.len() < FACE_MESH_POINTS => Topology::Unstructured,
            t => t,
        };
        Some(Self { points, topology })
    }

    pub fn points(&self) -> &[Landmark] {
        &self.points
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false: construction rejects empty sets.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<Landmark> {
        self.points.get(idx).copied()
    }

    /// Point at `idx`; panics out of range. Callers index only within their
    /// topology's bounds.
    pub(crate) fn point(&self, idx: usize) -> Landmark {
        self.points[idx]
    }
}

/// Pixel-space face region, clamped to the frame it was computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub x_min: u32,
    pub y_min: u32,
    pub x_max: u32,
    pub y_max: u32,
}

impl BoundingBox {
    pub fn width(&self) -> u32 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> u32 {
        self.y_max - self.y_min
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.area() == 0
    }
}

/// Emotion labels produced by the FER+ classifier, in model output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Emotion {
    Neutral,
    Happy,
    Surprised,
    Sad,
    Angry,
    Disgusted,
    Fearful,
    Contempt,
}

impl Emotion {
    pub const ALL: [Emotion; 8] = [
        Emotion::Neutral,
        Emotion::Happy,
        Emotion::Surprised,
        Emotion::Sad,
        Emotion::Angry,
        Emotion::Disgusted,
        Emotion::Fearful,
        Emotion::Contempt,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Emotion::Neutral => "Neutral",
            Emotion::Happy => "Happy",
            Emotion::Surprised => "Surprised",
            Emotion::Sad => "Sad",
            Emotion::Angry => "Angry",
            Emotion::Disgusted => "Disgusted",
            Emotion::Fearful => "Fearful",
            Emotion::Contempt => "Contempt",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of the emotion step for a frame with a detected face.
///
/// Serializes to the bare label, or to one of the sentinel strings
/// [`EMOTION_UNAVAILABLE`] / [`EMOTION_UNKNOWN`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmotionOutcome {
    /// No emotion model for this session, or nothing to crop.
    Unavailable,
    /// The model ran and failed for this frame.
    Failed,
    Labeled(Emotion),
}

impl EmotionOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            EmotionOutcome::Unavailable => EMOTION_UNAVAILABLE,
            EmotionOutcome::Failed => EMOTION_UNKNOWN,
            EmotionOutcome::Labeled(emotion) => emotion.label(),
        }
    }
}

impl fmt::Display for EmotionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for EmotionOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// Fused result for a single frame. Read-only outside this crate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameResult {
    pub(crate) face_detected: bool,
    /// `None` serializes as [`FACE_NOT_DETECTED`].
    #[serde(serialize_with = "serialize_expression")]
    pub(crate) expression: Option<Expression>,
    /// `None` (JSON null) when no face was found and an emotion model exists.
    pub(crate) emotion: Option<EmotionOutcome>,
    /// Set when an unexpected failure interrupted this frame.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) error: Option<String>,
    pub(crate) timestamp: String,
}

impl FrameResult {
    pub(crate) fn new() -> Self {
        Self {
            face_detected: false,
            expression: None,
            emotion: None,
            error: None,
            timestamp: timestamp(),
        }
    }

    pub fn face_detected(&self) -> bool {
        self.face_detected
    }

    pub fn expression(&self) -> Option<Expression> {
        self.expression
    }

    pub fn emotion(&self) -> Option<EmotionOutcome> {
        self.emotion
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// Expression label as reported, including the no-face sentinel.
    pub fn expression_label(&self) -> &'static str {
        self.expression.map_or(FACE_NOT_DETECTED, |e| e.label())
    }
}

fn serialize_expression<S: Serializer>(
    expression: &Option<Expression>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(expression.map_or(FACE_NOT_DETECTED, |e| e.label()))
}

/// Local wall-clock time in the format used by every report.
pub fn timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(n: usize) -> Vec<Landmark> {
        (0..n).map(|i| Landmark::new(i as f32 / n as f32, 0.5)).collect()
    }

    #[test]
    fn test_landmark_set_rejects_empty() {
        assert!(LandmarkSet::new(vec![], Topology::Unstructured).is_none());
    }

    #[test]
    fn test_landmark_set_downgrades_short_five_point() {
        let set = LandmarkSet::new(points(3), Topology::FivePoint).unwrap();
        assert_eq!(set.topology(), Topology::Unstructured);
    }

    #[test]
    fn test_landmark_set_downgrades_short_mesh() {
        let set = LandmarkSet::new(points(100), Topology::FaceMesh).unwrap();
        assert_eq!(set.topology(), Topology::Unstructured);

        let set = LandmarkSet::new(points(FACE_MESH_POINTS), Topology::FaceMesh).unwrap();
        assert_eq!(set.topology(), Topology::FaceMesh);
    }

    #[test]
    fn test_landmark_set_get_is_bounds_checked() {
        let set = LandmarkSet::new(points(5), Topology::FivePoint).unwrap();
        assert_eq!(set.get(4), Some(Landmark::new(0.8, 0.5)));
        assert_eq!(set.get(5), None);
        assert_eq!(set.get(usize::MAX), None);
    }

    #[test]
    fn test_bounding_box_area() {
        let bbox = BoundingBox { x_min: 10, y_min: 20, x_max: 50, y_max: 30 };
        assert_eq!(bbox.width(), 40);
        assert_eq!(bbox.height(), 10);
        assert_eq!(bbox.area(), 400);
        assert!(!bbox.is_empty());

        let flat = BoundingBox { x_min: 10, y_min: 20, x_max: 10, y_max: 30 };
        assert!(flat.is_empty());
    }

    #[test]
    fn test_emotion_outcome_labels() {
        assert_eq!(EmotionOutcome::Unavailable.label(), "Emotion model not available");
        assert_eq!(EmotionOutcome::Failed.label(), "Unknown");
        assert_eq!(EmotionOutcome::Labeled(Emotion::Happy).label(), "Happy");
    }

    #[test]
    fn test_frame_result_serializes_sentinels() {
        let result = FrameResult {
            face_detected: false,
            expression: None,
            emotion: None,
            error: None,
            timestamp: "2024-01-01 00:00:00".into(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["face_detected"], false);
        assert_eq!(json["expression"], "Face Not Detected");
        assert!(json["emotion"].is_null());
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_frame_result_serializes_labels() {
        let result = FrameResult {
            face_detected: true,
            expression: Some(Expression::Smiling),
            emotion: Some(EmotionOutcome::Failed),
            error: Some("boom".into()),
            timestamp: "2024-01-01 00:00:00".into(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["expression"], "Smiling");
        assert_eq!(json["emotion"], "Unknown");
        assert_eq!(json["error"], "boom");

        assert!(result.face_detected());
        assert_eq!(result.expression(), Some(Expression::Smiling));
        assert_eq!(result.emotion(), Some(EmotionOutcome::Failed));
        assert_eq!(result.error(), Some("boom"));
        assert_eq!(result.timestamp(), "2024-01-01 00:00:00");
    }

    #[test]
    fn test_timestamp_format() {
        let ts = timestamp();
        assert_eq!(ts.len(), "2024-01-01 00:00:00".len());
        assert_eq!(&ts[4..5], "-");
        assert_eq!(&ts[10..11], " ");
    }
}
