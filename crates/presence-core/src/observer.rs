//! Events emitted by the liveness engine and the hook that receives them.

use serde::Serialize;

use crate::liveness::LivenessState;

/// A signal observed during one tick.
///
/// Events are the only way the verdict changes; a tick that produces none
/// leaves `is_live` exactly as it was.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LivenessEvent {
    /// The frame had no faces; the state returns to rest.
    NoFace,
    /// A face appeared with no prior position to compare against.
    /// Informational only.
    FaceAcquired,
    /// The tracked top-left corner moved further than the movement threshold.
    MovementAboveThreshold { distance: f64 },
    /// The stillness counter is past the tolerated number of still ticks.
    StillnessExceeded { stillness_frames: u32 },
    /// The eye distance collapsed below the blink ratio of its previous value.
    BlinkDetected { eye_distance: f64, previous: f64 },
}

impl LivenessEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::NoFace => "no_face",
            Self::FaceAcquired => "face_acquired",
            Self::MovementAboveThreshold { .. } => "movement_above_threshold",
            Self::StillnessExceeded { .. } => "stillness_exceeded",
            Self::BlinkDetected { .. } => "blink_detected",
        }
    }
}

/// Diagnostics hook for the engine.
///
/// `on_event` sees the state after the event has been applied.
pub trait LivenessObserver {
    fn on_event(&mut self, event: &LivenessEvent, state: &LivenessState);

    /// Called for every tick whose tracked face carries landmarks, before the
    /// blink comparison. `previous` is 0 when no earlier measurement exists.
    fn on_eye_distance(&mut self, _current: f64, _previous: f64) {}
}

impl<F> LivenessObserver for F
where
    F: FnMut(&LivenessEvent, &LivenessState),
{
    fn on_event(&mut self, event: &LivenessEvent, state: &LivenessState) {
        self(event, state)
    }
}

/// Forwards engine events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl LivenessObserver for TracingObserver {
    fn on_event(&mut self, event: &LivenessEvent, state: &LivenessState) {
        match event {
            LivenessEvent::NoFace | LivenessEvent::FaceAcquired => {
                tracing::debug!(event = event.name(), "tracking changed");
            }
            LivenessEvent::MovementAboveThreshold { distance } => {
                tracing::debug!(distance, is_live = state.is_live, "movement above threshold");
            }
            LivenessEvent::StillnessExceeded { stillness_frames } => {
                tracing::debug!(stillness_frames, "stillness exceeded, verdict cleared");
            }
            LivenessEvent::BlinkDetected {
                eye_distance,
                previous,
            } => {
                tracing::debug!(eye_distance, previous, "blink detected");
            }
        }
    }

    fn on_eye_distance(&mut self, current: f64, previous: f64) {
        tracing::trace!(current, previous, "eye distance");
    }
}
