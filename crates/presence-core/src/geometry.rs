//! Render box geometry.
//!
//! The boxes produced here are purely cosmetic: they grow the detector's face
//! rectangle so the overlay frames the whole head, and carry the current
//! verdict as a colour. Nothing here feeds back into the liveness decision.

use serde::Serialize;

use crate::config::LivenessConfig;
use crate::types::{BoundingBox, DetectedFace, Point};

/// Overlay colour derived from the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BoxColor {
    Live,
    NotLive,
}

impl BoxColor {
    pub fn from_verdict(is_live: bool) -> Self {
        if is_live {
            Self::Live
        } else {
            Self::NotLive
        }
    }

    /// RGB triple for drawing: green when live, red otherwise.
    pub fn rgb(self) -> (u8, u8, u8) {
        match self {
            Self::Live => (0, 255, 0),
            Self::NotLive => (255, 0, 0),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::NotLive => "not-live",
        }
    }
}

/// A display rectangle for one detected face.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RenderBox {
    pub rect: BoundingBox,
    pub color: BoxColor,
}

impl RenderBox {
    pub fn is_live(&self) -> bool {
        self.color == BoxColor::Live
    }
}

/// Scale `bbox` about its centre by `scale`, then shift both corners down by
/// `y_offset`.
///
/// Corners are reordered after scaling, so a negative `scale` mirrors the box
/// instead of inverting it. `scale` and `y_offset` must be finite;
/// [`LivenessConfig::validate`] enforces this for configured values.
pub fn expand_box(bbox: &BoundingBox, scale: f64, y_offset: f64) -> BoundingBox {
    let center = bbox.center();
    let half_w = bbox.width() * scale / 2.0;
    let half_h = bbox.height() * scale / 2.0;

    let (x1, x2) = (center.x - half_w, center.x + half_w);
    let (y1, y2) = (center.y - half_h + y_offset, center.y + half_h + y_offset);

    BoundingBox::from_corners_unchecked(
        Point::new(x1.min(x2), y1.min(y2)),
        Point::new(x1.max(x2), y1.max(y2)),
    )
}

/// Build one render box per detection, all tagged with the same verdict.
///
/// Every face gets a box, including the ones the engine does not track.
pub fn render_boxes(
    detections: &[DetectedFace],
    config: &LivenessConfig,
    is_live: bool,
) -> Vec<RenderBox> {
    let color = BoxColor::from_verdict(is_live);
    detections
        .iter()
        .map(|face| RenderBox {
            rect: expand_box(face.bounding_box(), config.scale_factor, config.y_offset),
            color,
        })
        .collect()
}
