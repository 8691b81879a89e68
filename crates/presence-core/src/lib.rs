//! presence-core — Liveness decision engine.
//!
//! Consumes per-frame face detections (bounding box plus optional eye
//! landmarks) and maintains a live / not-live verdict from coarse head motion
//! and a blink-like drop in eye landmark distance. Detection, capture and
//! drawing are left to the caller.

pub mod config;
pub mod geometry;
pub mod liveness;
pub mod observer;
pub mod types;

pub use config::{ConfigError, LivenessConfig};
pub use geometry::{expand_box, render_boxes, BoxColor, RenderBox};
pub use liveness::{select_tracked, LivenessEngine, LivenessState, TickOutcome};
pub use observer::{LivenessEvent, LivenessObserver, TracingObserver};
pub use types::{BoundingBox, BoxError, DetectedFace, LandmarkError, Landmarks, Point};
