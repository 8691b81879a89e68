use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum number of landmark points needed to read both eyes.
pub const MIN_LANDMARKS: usize = 3;

/// Landmark index of the right eye (detector convention).
const RIGHT_EYE: usize = 0;
/// Landmark index of the left eye (detector convention).
const LEFT_EYE: usize = 2;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LandmarkError {
    #[error("landmark set has {found} point(s); at least 3 are required to locate both eyes")]
    TooFew { found: usize },
    #[error("landmark {index} has a non-finite coordinate: {point:?}")]
    NonFinite { index: usize, point: Point },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BoxError {
    #[error("bounding box is inverted: bottom-right {bottom_right:?} lies above or left of top-left {top_left:?}")]
    Inverted { top_left: Point, bottom_right: Point },
}

/// A 2D point in frame pixel coordinates.
///
/// Serialized as a `[x, y]` pair, which is how detectors usually hand them out.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance_to(self, other: Point) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl From<[f64; 2]> for Point {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Point> for [f64; 2] {
    fn from(p: Point) -> Self {
        [p.x, p.y]
    }
}

/// Axis-aligned face rectangle. Bottom-right is never above or left of top-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[Point; 2]", into = "[Point; 2]")]
pub struct BoundingBox {
    top_left: Point,
    bottom_right: Point,
}

impl BoundingBox {
    pub fn new(top_left: Point, bottom_right: Point) -> Result<Self, BoxError> {
        if !(bottom_right.x >= top_left.x && bottom_right.y >= top_left.y) {
            return Err(BoxError::Inverted {
                top_left,
                bottom_right,
            });
        }
        Ok(Self {
            top_left,
            bottom_right,
        })
    }

    /// Construct without the ordering check. Callers guarantee the invariant.
    pub(crate) const fn from_corners_unchecked(top_left: Point, bottom_right: Point) -> Self {
        Self {
            top_left,
            bottom_right,
        }
    }

    pub fn top_left(&self) -> Point {
        self.top_left
    }

    pub fn bottom_right(&self) -> Point {
        self.bottom_right
    }

    pub fn width(&self) -> f64 {
        self.bottom_right.x - self.top_left.x
    }

    pub fn height(&self) -> f64 {
        self.bottom_right.y - self.top_left.y
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.top_left.x + self.bottom_right.x) / 2.0,
            (self.top_left.y + self.bottom_right.y) / 2.0,
        )
    }
}

impl TryFrom<[Point; 2]> for BoundingBox {
    type Error = BoxError;

    fn try_from([top_left, bottom_right]: [Point; 2]) -> Result<Self, Self::Error> {
        Self::new(top_left, bottom_right)
    }
}

impl From<BoundingBox> for [Point; 2] {
    fn from(b: BoundingBox) -> Self {
        [b.top_left, b.bottom_right]
    }
}

/// Ordered landmark points of one face, validated to contain both eyes.
///
/// Detectors report landmarks positionally: index 0 is the right eye and
/// index 2 the left eye. This wrapper is the only place those indices are
/// read, so the engine works with named eyes instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Point>", into = "Vec<Point>")]
pub struct Landmarks {
    points: Vec<Point>,
}

impl Landmarks {
    pub fn new(points: Vec<Point>) -> Result<Self, LandmarkError> {
        if points.len() < MIN_LANDMARKS {
            return Err(LandmarkError::TooFew {
                found: points.len(),
            });
        }
        if let Some((index, &point)) = points
            .iter()
            .enumerate()
            .find(|(_, p)| !(p.x.is_finite() && p.y.is_finite()))
        {
            return Err(LandmarkError::NonFinite { index, point });
        }
        Ok(Self { points })
    }

    pub fn right_eye(&self) -> Point {
        self.points[RIGHT_EYE]
    }

    pub fn left_eye(&self) -> Point {
        self.points[LEFT_EYE]
    }

    /// Absolute vertical distance between the two eye points.
    ///
    /// Collapses towards zero when the eye landmarks converge, which is what
    /// the blink heuristic looks for.
    pub fn eye_distance(&self) -> f64 {
        (self.right_eye().y - self.left_eye().y).abs()
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }
}

impl TryFrom<Vec<Point>> for Landmarks {
    type Error = LandmarkError;

    fn try_from(points: Vec<Point>) -> Result<Self, Self::Error> {
        Self::new(points)
    }
}

impl From<Landmarks> for Vec<Point> {
    fn from(l: Landmarks) -> Self {
        l.points
    }
}

/// One face reported by the detector for a single frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedFace {
    #[serde(rename = "box")]
    bounding_box: BoundingBox,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    landmarks: Option<Landmarks>,
}

impl DetectedFace {
    pub fn new(bounding_box: BoundingBox) -> Self {
        Self {
            bounding_box,
            landmarks: None,
        }
    }

    pub fn with_landmarks(mut self, landmarks: Landmarks) -> Self {
        self.landmarks = Some(landmarks);
        self
    }

    pub fn bounding_box(&self) -> &BoundingBox {
        &self.bounding_box
    }

    pub fn landmarks(&self) -> Option<&Landmarks> {
        self.landmarks.as_ref()
    }
}
