//! Geometric expression classifier.
//!
//! Maps a [`LandmarkSet`] to one [`Expression`] using ratios between landmark
//! distances. Every distance is divided by the inter-ocular distance, so the
//! rules do not depend on face size or distance to the camera.

use crate::types::{Landmark, LandmarkSet, Topology};
use serde::Serialize;
use std::fmt;

// --- Thresholds ---
/// Eye-line roll (degrees) above which the head counts as tilted.
const TILT_DEGREES: f32 = 15.0;
/// Horizontal nose offset from the eye midpoint, in inter-ocular units.
const TURN_RATIO: f32 = 0.35;
/// Five-point: mouth width over inter-ocular distance for a smile.
const SMILE_WIDTH_RATIO: f32 = 0.95;
/// Mesh: lift of the mouth corners above the lip centre, inter-ocular units.
const SMILE_LIFT_RATIO: f32 = 0.05;
/// Mesh: inner-lip gap over mouth width for an open mouth.
const MOUTH_OPEN_RATIO: f32 = 0.35;
/// Mesh: brow-to-upper-lid distance, inter-ocular units, for raised brows.
const BROW_RAISE_RATIO: f32 = 0.30;
/// Mesh: eye aspect ratio below which the eyes count as closed.
const EYES_CLOSED_EAR: f32 = 0.15;
/// Inter-ocular distances below this are degenerate.
const MIN_EYE_DISTANCE: f32 = 1e-4;

/// MediaPipe face mesh indices used by the rules.
mod mesh {
    pub const LEFT_EYE_OUTER: usize = 33;
    pub const LEFT_EYE_INNER: usize = 133;
    pub const LEFT_EYE_TOP: usize = 159;
    pub const LEFT_EYE_BOTTOM: usize = 145;
    pub const RIGHT_EYE_INNER: usize = 362;
    pub const RIGHT_EYE_OUTER: usize = 263;
    pub const RIGHT_EYE_TOP: usize = 386;
    pub const RIGHT_EYE_BOTTOM: usize = 374;
    pub const NOSE_TIP: usize = 4;
    pub const MOUTH_LEFT: usize = 61;
    pub const MOUTH_RIGHT: usize = 291;
    pub const UPPER_LIP_INNER: usize = 13;
    pub const LOWER_LIP_INNER: usize = 14;
    pub const LEFT_BROW_ARCH: usize = 105;
    pub const RIGHT_BROW_ARCH: usize = 334;
}

/// Discrete facial expression derived from landmark geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Expression {
    Neutral,
    Smiling,
    Surprised,
    #[serde(rename = "Mouth Open")]
    MouthOpen,
    #[serde(rename = "Eyes Closed")]
    EyesClosed,
    #[serde(rename = "Head Tilted")]
    HeadTilted,
    #[serde(rename = "Looking Left")]
    LookingLeft,
    #[serde(rename = "Looking Right")]
    LookingRight,
}

impl Expression {
    pub fn label(&self) -> &'static str {
        match self {
            Expression::Neutral => "Neutral",
            Expression::Smiling => "Smiling",
            Expression::Surprised => "Surprised",
            Expression::MouthOpen => "Mouth Open",
            Expression::EyesClosed => "Eyes Closed",
            Expression::HeadTilted => "Head Tilted",
            Expression::LookingLeft => "Looking Left",
            Expression::LookingRight => "Looking Right",
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The five anchor points shared by both structured topologies.
struct Anchors {
    left_eye: Landmark,
    right_eye: Landmark,
    nose: Landmark,
    mouth_left: Landmark,
    mouth_right: Landmark,
}

impl Anchors {
    fn from_landmarks(landmarks: &LandmarkSet) -> Option<Self> {
        match landmarks.topology() {
            Topology::FivePoint => Some(Self {
                left_eye: landmarks.point(0),
                right_eye: landmarks.point(1),
                nose: landmarks.point(2),
                mouth_left: landmarks.point(3),
                mouth_right: landmarks.point(4),
            }),
            Topology::FaceMesh => Some(Self {
                left_eye: landmarks
                    .point(mesh::LEFT_EYE_OUTER)
                    .midpoint(&landmarks.point(mesh::LEFT_EYE_INNER)),
                right_eye: landmarks
                    .point(mesh::RIGHT_EYE_INNER)
                    .midpoint(&landmarks.point(mesh::RIGHT_EYE_OUTER)),
                nose: landmarks.point(mesh::NOSE_TIP),
                mouth_left: landmarks.point(mesh::MOUTH_LEFT),
                mouth_right: landmarks.point(mesh::MOUTH_RIGHT),
            }),
            Topology::Unstructured => None,
        }
    }
}

/// Classify the expression of one face. Never fails.
pub fn classify(landmarks: &LandmarkSet) -> Expression {
    let Some(anchors) = Anchors::from_landmarks(landmarks) else {
        return Expression::Neutral;
    };

    let eye_distance = anchors.left_eye.distance(&anchors.right_eye);
    if !(eye_distance >= MIN_EYE_DISTANCE) {
        return Expression::Neutral;
    }

    if let Some(pose) = classify_pose(&anchors, eye_distance) {
        return pose;
    }

    match landmarks.topology() {
        Topology::FaceMesh => classify_mesh(landmarks, eye_distance),
        _ => {
            let mouth_width = anchors.mouth_left.distance(&anchors.mouth_right);
            if mouth_width / eye_distance > SMILE_WIDTH_RATIO {
                Expression::Smiling
            } else {
                Expression::Neutral
            }
        }
    }
}

/// Head roll and yaw, checked before any facial-feature rule.
fn classify_pose(anchors: &Anchors, eye_distance: f32) -> Option<Expression> {
    let dx = (anchors.right_eye.x - anchors.left_eye.x).abs();
    let dy = (anchors.right_eye.y - anchors.left_eye.y).abs();
    if dy.atan2(dx).to_degrees() > TILT_DEGREES {
        return Some(Expression::HeadTilted);
    }

    let eye_mid = anchors.left_eye.midpoint(&anchors.right_eye);
    let turn = (anchors.nose.x - eye_mid.x) / eye_distance;
    if turn < -TURN_RATIO {
        Some(Expression::LookingLeft)
    } else if turn > TURN_RATIO {
        Some(Expression::LookingRight)
    } else {
        None
    }
}

fn classify_mesh(landmarks: &LandmarkSet, eye_distance: f32) -> Expression {
    let p = |idx: usize| landmarks.point(idx);

    let mouth_width = p(mesh::MOUTH_LEFT).distance(&p(mesh::MOUTH_RIGHT));
    let lip_gap = p(mesh::UPPER_LIP_INNER).distance(&p(mesh::LOWER_LIP_INNER));
    let mouth_open = mouth_width > 0.0 && lip_gap / mouth_width > MOUTH_OPEN_RATIO;

    if mouth_open {
        let brow_lift = (p(mesh::LEFT_BROW_ARCH).distance(&p(mesh::LEFT_EYE_TOP))
            + p(mesh::RIGHT_BROW_ARCH).distance(&p(mesh::RIGHT_EYE_TOP)))
            / 2.0
            / eye_distance;
        return if brow_lift > BROW_RAISE_RATIO {
            Expression::Surprised
        } else {
            Expression::MouthOpen
        };
    }

    let ear = (eye_aspect_ratio(
        p(mesh::LEFT_EYE_TOP),
        p(mesh::LEFT_EYE_BOTTOM),
        p(mesh::LEFT_EYE_OUTER),
        p(mesh::LEFT_EYE_INNER),
    ) + eye_aspect_ratio(
        p(mesh::RIGHT_EYE_TOP),
        p(mesh::RIGHT_EYE_BOTTOM),
        p(mesh::RIGHT_EYE_INNER),
        p(mesh::RIGHT_EYE_OUTER),
    )) / 2.0;
    if ear < EYES_CLOSED_EAR {
        return Expression::EyesClosed;
    }

    // Image y grows downward: lifted corners have a smaller y.
    let lip_centre = p(mesh::UPPER_LIP_INNER).midpoint(&p(mesh::LOWER_LIP_INNER));
    let corner_y = (p(mesh::MOUTH_LEFT).y + p(mesh::MOUTH_RIGHT).y) / 2.0;
    if (lip_centre.y - corner_y) / eye_distance > SMILE_LIFT_RATIO {
        return Expression::Smiling;
    }

    Expression::Neutral
}

fn eye_aspect_ratio(top: Landmark, bottom: Landmark, corner_a: Landmark, corner_b: Landmark) -> f32 {
    let width = corner_a.distance(&corner_b);
    if width > 0.0 {
        top.distance(&bottom) / width
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FACE_MESH_POINTS;

    fn five_point(points: [(f32, f32); 5]) -> LandmarkSet {
        let points = points.iter().map(|&(x, y)| Landmark::new(x, y)).collect();
        LandmarkSet::new(points, Topology::FivePoint).unwrap()
    }

    const NEUTRAL_FACE: [(f32, f32); 5] = [
        (0.40, 0.40),
        (0.60, 0.40),
        (0.50, 0.50),
        (0.42, 0.60),
        (0.58, 0.60),
    ];

    /// A neutral mesh: eyes open, mouth closed and level, brows resting.
    fn mesh_points() -> Vec<Landmark> {
        let mut points = vec![Landmark::new(0.5, 0.5); FACE_MESH_POINTS];
        let mut set = |idx: usize, x: f32, y: f32| points[idx] = Landmark::new(x, y);
        set(mesh::LEFT_EYE_OUTER, 0.35, 0.40);
        set(mesh::LEFT_EYE_INNER, 0.45, 0.40);
        set(mesh::RIGHT_EYE_INNER, 0.55, 0.40);
        set(mesh::RIGHT_EYE_OUTER, 0.65, 0.40);
        set(mesh::LEFT_EYE_TOP, 0.40, 0.39);
        set(mesh::LEFT_EYE_BOTTOM, 0.40, 0.41);
        set(mesh::RIGHT_EYE_TOP, 0.60, 0.39);
        set(mesh::RIGHT_EYE_BOTTOM, 0.60, 0.41);
        set(mesh::LEFT_BROW_ARCH, 0.40, 0.35);
        set(mesh::RIGHT_BROW_ARCH, 0.60, 0.35);
        set(mesh::NOSE_TIP, 0.50, 0.50);
        set(mesh::MOUTH_LEFT, 0.42, 0.62);
        set(mesh::MOUTH_RIGHT, 0.58, 0.62);
        set(mesh::UPPER_LIP_INNER, 0.50, 0.61);
        set(mesh::LOWER_LIP_INNER, 0.50, 0.63);
        points
    }

    fn mesh(points: Vec<Landmark>) -> LandmarkSet {
        LandmarkSet::new(points, Topology::FaceMesh).unwrap()
    }

    #[test]
    fn test_five_point_neutral() {
        assert_eq!(classify(&five_point(NEUTRAL_FACE)), Expression::Neutral);
    }

    #[test]
    fn test_five_point_smiling() {
        let mut face = NEUTRAL_FACE;
        face[3] = (0.39, 0.60);
        face[4] = (0.61, 0.60);
        assert_eq!(classify(&five_point(face)), Expression::Smiling);
    }

    #[test]
    fn test_five_point_head_tilted() {
        let mut face = NEUTRAL_FACE;
        face[1] = (0.60, 0.48);
        assert_eq!(classify(&five_point(face)), Expression::HeadTilted);
    }

    #[test]
    fn test_five_point_looking_sideways() {
        let mut face = NEUTRAL_FACE;
        face[2] = (0.42, 0.50);
        assert_eq!(classify(&five_point(face)), Expression::LookingLeft);

        face[2] = (0.58, 0.50);
        assert_eq!(classify(&five_point(face)), Expression::LookingRight);
    }

    #[test]
    fn test_pose_takes_precedence_over_smile() {
        let mut face = NEUTRAL_FACE;
        face[1] = (0.60, 0.48);
        face[3] = (0.35, 0.60);
        face[4] = (0.65, 0.60);
        assert_eq!(classify(&five_point(face)), Expression::HeadTilted);
    }

    #[test]
    fn test_degenerate_geometry_is_neutral() {
        assert_eq!(classify(&five_point([(0.5, 0.5); 5])), Expression::Neutral);
        assert_eq!(
            classify(&five_point([(f32::NAN, 0.5); 5])),
            Expression::Neutral
        );
    }

    #[test]
    fn test_unstructured_is_neutral() {
        let set = LandmarkSet::new(vec![Landmark::new(0.3, 0.3)], Topology::Unstructured).unwrap();
        assert_eq!(classify(&set), Expression::Neutral);
    }

    #[test]
    fn test_mesh_neutral() {
        assert_eq!(classify(&mesh(mesh_points())), Expression::Neutral);
    }

    #[test]
    fn test_mesh_surprised_and_mouth_open() {
        let mut points = mesh_points();
        points[mesh::UPPER_LIP_INNER] = Landmark::new(0.50, 0.60);
        points[mesh::LOWER_LIP_INNER] = Landmark::new(0.50, 0.68);
        assert_eq!(classify(&mesh(points.clone())), Expression::MouthOpen);

        points[mesh::LEFT_BROW_ARCH] = Landmark::new(0.40, 0.31);
        points[mesh::RIGHT_BROW_ARCH] = Landmark::new(0.60, 0.31);
        assert_eq!(classify(&mesh(points)), Expression::Surprised);
    }

    #[test]
    fn test_mesh_eyes_closed() {
        let mut points = mesh_points();
        points[mesh::LEFT_EYE_TOP] = Landmark::new(0.40, 0.399);
        points[mesh::LEFT_EYE_BOTTOM] = Landmark::new(0.40, 0.401);
        points[mesh::RIGHT_EYE_TOP] = Landmark::new(0.60, 0.399);
        points[mesh::RIGHT_EYE_BOTTOM] = Landmark::new(0.60, 0.401);
        assert_eq!(classify(&mesh(points)), Expression::EyesClosed);
    }

    #[test]
    fn test_mesh_smiling() {
        let mut points = mesh_points();
        points[mesh::MOUTH_LEFT] = Landmark::new(0.42, 0.60);
        points[mesh::MOUTH_RIGHT] = Landmark::new(0.58, 0.60);
        assert_eq!(classify(&mesh(points)), Expression::Smiling);
    }

    #[test]
    fn test_labels_match_serialization() {
        for expression in [Expression::MouthOpen, Expression::LookingRight, Expression::Neutral] {
            let json = serde_json::to_value(expression).unwrap();
            assert_eq!(json, expression.label());
        }
    }
}
