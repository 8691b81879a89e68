//! Liveness verdict from head motion and blink-like landmark changes.
//!
//! A printed photograph held still in front of the camera produces a face box
//! that barely moves and eye landmarks that never change spacing. A present
//! person shifts their head now and then and blinks. The engine watches both
//! signals across ticks and keeps a single boolean verdict:
//!
//! - movement of the tracked box above `movement_threshold` sets it live;
//! - a sudden drop in eye distance (below `blink_threshold` × the previous
//!   value) sets it live;
//! - more than `stillness_threshold` consecutive still ticks clear it;
//! - a tick without faces resets everything.
//!
//! Between those events the verdict is sticky.
//!
//! # Threat Coverage
//!
//! - **Blocks:** Printed photographs and static images held motionless.
//! - **Does not block:** A photo waved around, video replay, masks. This is a
//!   coarse presence heuristic, not an anti-spoofing system.

use serde::Serialize;

use crate::config::{ConfigError, LivenessConfig};
use crate::geometry::{render_boxes, RenderBox};
use crate::observer::{LivenessEvent, LivenessObserver};
use crate::types::{DetectedFace, Point};

/// Mutable tracking state for one video stream.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct LivenessState {
    /// Top-left corner of the tracked face on the previous tick, if any.
    pub previous_position: Option<Point>,
    /// Current verdict.
    pub is_live: bool,
    /// Consecutive ticks with movement at or below the threshold.
    pub stillness_frames: u32,
    /// Eye distance measured on the last tick with landmarks. 0 means unset.
    pub previous_eye_distance: f64,
}

impl LivenessState {
    /// Nothing tracked, not live, counters zeroed.
    pub const fn rest() -> Self {
        Self {
            previous_position: None,
            is_live: false,
            stillness_frames: 0,
            previous_eye_distance: 0.0,
        }
    }

    pub fn is_at_rest(&self) -> bool {
        *self == Self::rest()
    }

    /// Apply a verdict-changing event.
    fn apply(&mut self, event: &LivenessEvent) {
        match event {
            LivenessEvent::NoFace => *self = Self::rest(),
            LivenessEvent::FaceAcquired => {}
            LivenessEvent::MovementAboveThreshold { .. } | LivenessEvent::BlinkDetected { .. } => {
                self.is_live = true;
                self.stillness_frames = 0;
            }
            LivenessEvent::StillnessExceeded { .. } => self.is_live = false,
        }
    }
}

/// Result of one tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickOutcome {
    /// Verdict after every signal of this tick.
    pub is_live: bool,
    /// One box per input detection, in input order.
    pub render_boxes: Vec<RenderBox>,
    /// Events fired during the tick, in the order they were applied.
    pub events: Vec<LivenessEvent>,
}

/// Pick the face that drives tracking: the first one the detector reported.
///
/// Other faces in the frame still get render boxes but never influence the
/// verdict.
pub fn select_tracked(detections: &[DetectedFace]) -> Option<&DetectedFace> {
    detections.first()
}

/// Per-stream liveness state machine.
///
/// `update` takes `&mut self`, so a single engine cannot be driven by two
/// ticks at once. Ticks must arrive in frame order.
pub struct LivenessEngine {
    config: LivenessConfig,
    state: LivenessState,
    observer: Option<Box<dyn LivenessObserver + Send>>,
}

impl LivenessEngine {
    /// Build an engine at rest. Fails if `config` does not validate.
    pub fn new(config: LivenessConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::with_valid_config(config))
    }

    fn with_valid_config(config: LivenessConfig) -> Self {
        Self {
            config,
            state: LivenessState::rest(),
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: impl LivenessObserver + Send + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn config(&self) -> &LivenessConfig {
        &self.config
    }

    pub fn state(&self) -> &LivenessState {
        &self.state
    }

    pub fn is_live(&self) -> bool {
        self.state.is_live
    }

    /// Drop all tracking history.
    pub fn reset(&mut self) {
        self.state = LivenessState::rest();
    }

    /// Advance the state machine by one frame's detections.
    pub fn update(&mut self, detections: &[DetectedFace]) -> TickOutcome {
        let mut events = Vec::new();

        match select_tracked(detections) {
            None => self.emit(LivenessEvent::NoFace, &mut events),
            Some(face) => self.track(face, &mut events),
        }

        tracing::trace!(
            faces = detections.len(),
            is_live = self.state.is_live,
            stillness_frames = self.state.stillness_frames,
            "tick"
        );

        TickOutcome {
            is_live: self.state.is_live,
            render_boxes: render_boxes(detections, &self.config, self.state.is_live),
            events,
        }
    }

    fn track(&mut self, face: &DetectedFace, events: &mut Vec<LivenessEvent>) {
        let position = face.bounding_box().top_left();

        match self.state.previous_position {
            None => self.emit(LivenessEvent::FaceAcquired, events),
            Some(previous) => {
                let distance = previous.distance_to(position);
                if distance > self.config.movement_threshold {
                    self.emit(LivenessEvent::MovementAboveThreshold { distance }, events);
                } else {
                    self.state.stillness_frames = self.state.stillness_frames.saturating_add(1);
                    if self.state.stillness_frames > self.config.stillness_threshold {
                        let stillness_frames = self.state.stillness_frames;
                        self.emit(LivenessEvent::StillnessExceeded { stillness_frames }, events);
                    }
                }
            }
        }
        self.state.previous_position = Some(position);

        if let Some(landmarks) = face.landmarks() {
            let eye_distance = landmarks.eye_distance();
            let previous = self.state.previous_eye_distance;
            if let Some(observer) = self.observer.as_mut() {
                observer.on_eye_distance(eye_distance, previous);
            }

            // previous == 0 means no earlier measurement; skip the comparison
            if previous > 0.0 && eye_distance < previous * self.config.blink_threshold {
                self.emit(
                    LivenessEvent::BlinkDetected {
                        eye_distance,
                        previous,
                    },
                    events,
                );
            }
            self.state.previous_eye_distance = eye_distance;
        }
    }

    fn emit(&mut self, event: LivenessEvent, events: &mut Vec<LivenessEvent>) {
        self.state.apply(&event);
        if let Some(observer) = self.observer.as_mut() {
            observer.on_event(&event, &self.state);
        }
        events.push(event);
    }
}

impl Default for LivenessEngine {
    fn default() -> Self {
        Self::with_valid_config(LivenessConfig::default())
    }
}

impl std::fmt::Debug for LivenessEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LivenessEngine")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BoxColor;
    use crate::types::{BoundingBox, Landmarks};
    use std::sync::{Arc, Mutex};

    /// Helper: a 50×50 face whose top-left corner sits at (x, y), no landmarks.
    fn face_at(x: f64, y: f64) -> DetectedFace {
        DetectedFace::new(BoundingBox::new(Point::new(x, y), Point::new(x + 50.0, y + 50.0)).unwrap())
    }

    /// Helper: a face at (x, y) with eye landmarks `eye_distance` apart vertically.
    fn face_with_eyes(x: f64, y: f64, eye_distance: f64) -> DetectedFace {
        let landmarks = Landmarks::new(vec![
            Point::new(x + 10.0, y + 20.0),                // right eye
            Point::new(x + 25.0, y + 30.0),                // nose
            Point::new(x + 40.0, y + 20.0 + eye_distance), // left eye
        ])
        .unwrap();
        face_at(x, y).with_landmarks(landmarks)
    }

    /// Helper: engine that has just seen movement and is live with zero stillness.
    fn live_engine() -> LivenessEngine {
        let mut engine = LivenessEngine::default();
        engine.update(&[face_at(100.0, 100.0)]);
        let out = engine.update(&[face_at(120.0, 100.0)]);
        assert!(out.is_live);
        engine
    }

    #[test]
    fn test_starts_at_rest() {
        let engine = LivenessEngine::default();
        assert!(engine.state().is_at_rest());
        assert!(!engine.is_live());
    }

    #[test]
    fn test_empty_tick_resets_everything() {
        let mut engine = live_engine();
        engine.update(&[face_with_eyes(120.0, 100.0, 10.0)]);
        assert!(!engine.state().is_at_rest());

        let out = engine.update(&[]);
        assert!(!out.is_live);
        assert!(out.render_boxes.is_empty());
        assert_eq!(out.events, vec![LivenessEvent::NoFace]);
        assert_eq!(*engine.state(), LivenessState::rest());
    }

    #[test]
    fn test_first_sight_does_not_decide() {
        let mut engine = LivenessEngine::default();
        let out = engine.update(&[face_at(100.0, 100.0)]);
        assert!(!out.is_live);
        assert_eq!(out.events, vec![LivenessEvent::FaceAcquired]);
        assert_eq!(engine.state().previous_position, Some(Point::new(100.0, 100.0)));
        assert_eq!(engine.state().stillness_frames, 0);
    }

    #[test]
    fn test_first_sight_keeps_existing_verdict() {
        // A face after a tick with no prior position leaves the verdict alone,
        // even when it was live.
        let mut engine = live_engine();
        engine.state.previous_position = None;
        let out = engine.update(&[face_at(500.0, 500.0)]);
        assert!(out.is_live);
    }

    #[test]
    fn test_first_sight_after_reset_cannot_blink() {
        let mut engine = LivenessEngine::default();
        engine.update(&[face_with_eyes(100.0, 100.0, 10.0)]);
        engine.update(&[]);
        // Tiny eye distance would be a blink if the previous value had survived
        let out = engine.update(&[face_with_eyes(100.0, 100.0, 1.0)]);
        assert!(!out.is_live);
        assert_eq!(engine.state().previous_eye_distance, 1.0);
    }

    #[test]
    fn test_movement_sets_live() {
        let mut engine = LivenessEngine::default();
        engine.update(&[face_at(100.0, 100.0)]);
        let out = engine.update(&[face_at(120.0, 100.0)]);
        assert!(out.is_live);
        assert_eq!(engine.state().stillness_frames, 0);
        assert_eq!(
            out.events,
            vec![LivenessEvent::MovementAboveThreshold { distance: 20.0 }]
        );
    }

    #[test]
    fn test_movement_resets_stillness_counter() {
        let mut engine = live_engine();
        for _ in 0..10 {
            engine.update(&[face_at(120.0, 100.0)]);
        }
        assert_eq!(engine.state().stillness_frames, 10);
        engine.update(&[face_at(120.0, 130.0)]);
        assert_eq!(engine.state().stillness_frames, 0);
    }

    #[test]
    fn test_movement_at_threshold_is_still() {
        // Exactly 15 px is not "greater than" the threshold
        let mut engine = LivenessEngine::default();
        engine.update(&[face_at(100.0, 100.0)]);
        let out = engine.update(&[face_at(109.0, 112.0)]);
        assert!(!out.is_live);
        assert_eq!(engine.state().stillness_frames, 1);
    }

    #[test]
    fn test_diagonal_movement_uses_euclidean_distance() {
        // 11 px on each axis: neither axis exceeds 15, the diagonal does
        let mut engine = LivenessEngine::default();
        engine.update(&[face_at(0.0, 0.0)]);
        assert!(engine.update(&[face_at(11.0, 11.0)]).is_live);
    }

    #[test]
    fn test_verdict_is_sticky_below_stillness_threshold() {
        let mut engine = live_engine();
        for tick in 1..=30 {
            let out = engine.update(&[face_at(120.0, 100.0)]);
            assert!(out.is_live, "still tick {tick} should stay live");
            assert!(out.events.is_empty());
            assert_eq!(engine.state().stillness_frames, tick);
        }
    }

    #[test]
    fn test_stillness_clears_verdict() {
        let mut engine = live_engine();
        for _ in 0..30 {
            engine.update(&[face_at(120.0, 100.0)]);
        }
        let out = engine.update(&[face_at(120.0, 100.0)]);
        assert!(!out.is_live);
        assert_eq!(engine.state().stillness_frames, 31);
        assert_eq!(
            out.events,
            vec![LivenessEvent::StillnessExceeded { stillness_frames: 31 }]
        );

        // Keeps counting and stays not-live
        let out = engine.update(&[face_at(120.0, 100.0)]);
        assert!(!out.is_live);
        assert_eq!(engine.state().stillness_frames, 32);
    }

    #[test]
    fn test_small_jitter_counts_as_still() {
        let mut engine = live_engine();
        for i in 0..31 {
            let dx = if i % 2 == 0 { 3.0 } else { -3.0 };
            engine.update(&[face_at(120.0 + dx, 100.0)]);
        }
        assert!(!engine.is_live());
    }

    #[test]
    fn test_blink_sets_live() {
        let mut engine = LivenessEngine::default();
        engine.update(&[face_with_eyes(100.0, 100.0, 10.0)]);
        let out = engine.update(&[face_with_eyes(100.0, 100.0, 4.0)]);
        assert!(out.is_live);
        assert_eq!(engine.state().stillness_frames, 0);
        assert_eq!(
            out.events,
            vec![LivenessEvent::BlinkDetected {
                eye_distance: 4.0,
                previous: 10.0
            }]
        );
    }

    #[test]
    fn test_blink_overrides_stillness() {
        let mut engine = LivenessEngine::default();
        engine.update(&[face_with_eyes(100.0, 100.0, 10.0)]);
        engine.update(&[face_with_eyes(120.0, 100.0, 10.0)]);
        for _ in 0..31 {
            engine.update(&[face_with_eyes(120.0, 100.0, 10.0)]);
        }
        assert!(!engine.is_live());
        assert_eq!(engine.state().stillness_frames, 31);

        // Still box, collapsed eye distance: the stillness check fires first,
        // the blink then wins within the same tick
        let out = engine.update(&[face_with_eyes(120.0, 100.0, 3.0)]);
        assert!(out.is_live);
        assert_eq!(engine.state().stillness_frames, 0);
        assert_eq!(out.events.len(), 2);
        assert!(matches!(out.events[0], LivenessEvent::StillnessExceeded { stillness_frames: 32 }));
        assert!(matches!(out.events[1], LivenessEvent::BlinkDetected { .. }));
    }

    #[test]
    fn test_blink_ratio_boundary() {
        // 5.0 is exactly half of 10.0 and does not count
        let mut engine = LivenessEngine::default();
        engine.update(&[face_with_eyes(100.0, 100.0, 10.0)]);
        assert!(!engine.update(&[face_with_eyes(100.0, 100.0, 5.0)]).is_live);
    }

    #[test]
    fn test_eye_distance_always_recorded() {
        let mut engine = LivenessEngine::default();
        engine.update(&[face_with_eyes(100.0, 100.0, 10.0)]);
        assert_eq!(engine.state().previous_eye_distance, 10.0);
        engine.update(&[face_with_eyes(100.0, 100.0, 12.0)]);
        assert_eq!(engine.state().previous_eye_distance, 12.0);
        // Face without landmarks leaves it untouched
        engine.update(&[face_at(100.0, 100.0)]);
        assert_eq!(engine.state().previous_eye_distance, 12.0);
    }

    #[test]
    fn test_zero_eye_distance_disables_next_comparison() {
        let mut engine = LivenessEngine::default();
        engine.update(&[face_with_eyes(100.0, 100.0, 10.0)]);
        engine.update(&[face_with_eyes(100.0, 100.0, 0.0)]);
        assert!(engine.is_live());
        engine.reset();
        engine.update(&[face_with_eyes(100.0, 100.0, 0.0)]);
        // previous is the 0 sentinel again; nothing can count as a blink
        assert!(!engine.update(&[face_with_eyes(100.0, 100.0, 0.0)]).is_live);
    }

    #[test]
    fn test_movement_and_blink_same_tick() {
        let mut engine = LivenessEngine::default();
        engine.update(&[face_with_eyes(100.0, 100.0, 10.0)]);
        let out = engine.update(&[face_with_eyes(140.0, 100.0, 2.0)]);
        assert!(out.is_live);
        assert_eq!(out.events.len(), 2);
        assert_eq!(out.events[0].name(), "movement_above_threshold");
        assert_eq!(out.events[1].name(), "blink_detected");
    }

    #[test]
    fn test_only_first_face_is_tracked() {
        let mut engine = LivenessEngine::default();
        engine.update(&[face_at(100.0, 100.0), face_at(400.0, 400.0)]);
        // Second face jumps around, first stays put
        let out = engine.update(&[face_at(100.0, 100.0), face_at(10.0, 10.0)]);
        assert!(!out.is_live);
        assert_eq!(engine.state().previous_position, Some(Point::new(100.0, 100.0)));
        assert_eq!(engine.state().stillness_frames, 1);
    }

    #[test]
    fn test_every_face_gets_a_box_with_shared_verdict() {
        let mut engine = live_engine();
        let faces = [face_at(120.0, 100.0), face_at(300.0, 50.0), face_at(0.0, 0.0)];
        let out = engine.update(&faces);
        assert_eq!(out.render_boxes.len(), 3);
        assert!(out.render_boxes.iter().all(|b| b.color == BoxColor::Live));
    }

    #[test]
    fn test_render_box_tagged_with_post_tick_verdict() {
        let mut engine = LivenessEngine::default();
        engine.update(&[face_at(100.0, 100.0)]);
        let out = engine.update(&[face_at(200.0, 100.0)]);
        assert_eq!(out.render_boxes[0].color, BoxColor::Live);
    }

    #[test]
    fn test_reference_scenario() {
        let mut engine = LivenessEngine::default();

        let out = engine.update(&[face_at(100.0, 100.0)]);
        assert!(!out.is_live);
        assert_eq!(engine.state().previous_position, Some(Point::new(100.0, 100.0)));

        let out = engine.update(&[face_at(120.0, 100.0)]);
        assert!(out.is_live);
        assert_eq!(engine.state().stillness_frames, 0);

        for still_tick in 1..=31u32 {
            let out = engine.update(&[face_at(120.0, 100.0)]);
            assert_eq!(out.is_live, still_tick <= 30, "still tick {still_tick}");
        }
        assert!(!engine.is_live());
    }

    #[test]
    fn test_observer_sees_events_and_eye_distances() {
        #[derive(Default)]
        struct Recorder {
            events: Vec<(LivenessEvent, bool)>,
            eye_distances: Vec<(f64, f64)>,
        }

        struct Shared(Arc<Mutex<Recorder>>);

        impl LivenessObserver for Shared {
            fn on_event(&mut self, event: &LivenessEvent, state: &LivenessState) {
                self.0.lock().unwrap().events.push((*event, state.is_live));
            }

            fn on_eye_distance(&mut self, current: f64, previous: f64) {
                self.0.lock().unwrap().eye_distances.push((current, previous));
            }
        }

        let recorder = Arc::new(Mutex::new(Recorder::default()));
        let mut engine = LivenessEngine::default().with_observer(Shared(recorder.clone()));

        engine.update(&[face_with_eyes(100.0, 100.0, 10.0)]);
        engine.update(&[face_with_eyes(100.0, 100.0, 2.0)]);
        engine.update(&[]);

        let rec = recorder.lock().unwrap();
        assert_eq!(rec.eye_distances, vec![(10.0, 0.0), (2.0, 10.0)]);
        assert_eq!(
            rec.events,
            vec![
                (LivenessEvent::FaceAcquired, false),
                (
                    LivenessEvent::BlinkDetected {
                        eye_distance: 2.0,
                        previous: 10.0
                    },
                    true
                ),
                (LivenessEvent::NoFace, false),
            ]
        );
    }

    #[test]
    fn test_closure_observer() {
        let count = Arc::new(Mutex::new(0usize));
        let c = count.clone();
        let mut engine = LivenessEngine::default()
            .with_observer(move |_: &LivenessEvent, _: &LivenessState| *c.lock().unwrap() += 1);
        engine.update(&[face_at(0.0, 0.0)]);
        engine.update(&[face_at(50.0, 0.0)]);
        assert_eq!(*count.lock().unwrap(), 2);
    }

    #[test]
    fn test_rejects_invalid_config() {
        for scale_factor in [-1.0, 0.0, f64::NAN] {
            let config = LivenessConfig {
                scale_factor,
                ..Default::default()
            };
            let err = LivenessEngine::new(config).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { field: "scale_factor", .. }));
        }

        let config = LivenessConfig {
            blink_threshold: f64::NAN,
            ..Default::default()
        };
        assert!(LivenessEngine::new(config).is_err());
    }

    #[test]
    fn test_render_boxes_stay_ordered() {
        let mut engine = LivenessEngine::new(LivenessConfig::strict()).unwrap();
        let out = engine.update(&[face_at(0.0, 0.0), face_at(300.0, 10.0)]);
        for b in &out.render_boxes {
            assert!(b.rect.bottom_right().x >= b.rect.top_left().x);
            assert!(b.rect.bottom_right().y >= b.rect.top_left().y);
            assert!(b.rect.width() > 0.0);
        }
    }

    #[test]
    fn test_custom_thresholds() {
        let config = LivenessConfig {
            movement_threshold: 2.0,
            stillness_threshold: 2,
            ..Default::default()
        };
        let mut engine = LivenessEngine::new(config).unwrap();
        engine.update(&[face_at(0.0, 0.0)]);
        assert!(engine.update(&[face_at(3.0, 0.0)]).is_live);
        assert!(engine.update(&[face_at(3.0, 0.0)]).is_live);
        assert!(engine.update(&[face_at(3.0, 0.0)]).is_live);
        assert!(!engine.update(&[face_at(3.0, 0.0)]).is_live);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn arb_face() -> impl Strategy<Value = DetectedFace> {
            (
                0.0f64..1000.0,
                0.0f64..1000.0,
                1.0f64..300.0,
                proptest::option::of(0.0f64..40.0),
            )
                .prop_map(|(x, y, size, eyes)| {
                    let face = DetectedFace::new(
                        BoundingBox::new(Point::new(x, y), Point::new(x + size, y + size)).unwrap(),
                    );
                    match eyes {
                        Some(d) => face.with_landmarks(
                            Landmarks::new(vec![
                                Point::new(x, y + 10.0),
                                Point::new(x, y),
                                Point::new(x + 20.0, y + 10.0 + d),
                            ])
                            .unwrap(),
                        ),
                        None => face,
                    }
                })
        }

        fn arb_ticks() -> impl Strategy<Value = Vec<Vec<DetectedFace>>> {
            prop::collection::vec(prop::collection::vec(arb_face(), 0..4), 0..40)
        }

        proptest! {
            #[test]
            fn empty_tick_always_returns_to_rest(history in arb_ticks()) {
                let mut engine = LivenessEngine::default();
                for tick in &history {
                    engine.update(tick);
                }
                let out = engine.update(&[]);
                prop_assert!(!out.is_live);
                prop_assert!(out.render_boxes.is_empty());
                prop_assert!(engine.state().is_at_rest());
            }

            #[test]
            fn boxes_track_detection_count(history in arb_ticks()) {
                let mut engine = LivenessEngine::default();
                for tick in &history {
                    let out = engine.update(tick);
                    prop_assert_eq!(out.render_boxes.len(), tick.len());
                    prop_assert!(out.render_boxes.iter().all(|b| b.is_live() == out.is_live));
                    prop_assert_eq!(out.is_live, engine.is_live());
                }
            }

            #[test]
            fn verdict_only_changes_through_events(history in arb_ticks()) {
                let mut engine = LivenessEngine::default();
                for tick in &history {
                    let before = engine.is_live();
                    let out = engine.update(tick);
                    if out.events.iter().all(|e| *e == LivenessEvent::FaceAcquired) {
                        prop_assert_eq!(before, out.is_live);
                    }
                }
            }

            #[test]
            fn movement_always_sets_live(
                history in arb_ticks(),
                x in 0.0f64..1000.0,
                y in 0.0f64..1000.0,
            ) {
                let mut engine = LivenessEngine::default();
                for tick in &history {
                    engine.update(tick);
                }
                engine.update(&[face_at(x, y)]);
                let out = engine.update(&[face_at(x + 16.0, y)]);
                prop_assert!(out.is_live);
                prop_assert_eq!(engine.state().stillness_frames, 0);
            }
        }
    }
}
