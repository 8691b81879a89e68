use presence_core::{
    ConfigError, DetectedFace, LivenessConfig, LivenessEngine, LivenessState, TickOutcome, TracingObserver,
};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid engine configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Result of one tick, with the state it left behind.
#[derive(Debug, Clone)]
pub struct TickResult {
    pub outcome: TickOutcome,
    pub state: LivenessState,
}

/// Messages sent from the driving loop to the engine thread.
enum EngineRequest {
    Tick {
        detections: Vec<DetectedFace>,
        reply: oneshot::Sender<TickResult>,
    },
    Snapshot {
        reply: oneshot::Sender<LivenessState>,
    },
    Reset {
        reply: oneshot::Sender<()>,
    },
}

/// Clone-safe handle to the engine thread.
///
/// Requests are served one at a time in the order they were sent, so the
/// engine never sees two updates at once or ticks out of order.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Feed one frame's detections and wait for the verdict.
    pub async fn tick(&self, detections: Vec<DetectedFace>) -> Result<TickResult, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Tick {
                detections,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    /// Current tracking state.
    pub async fn snapshot(&self) -> Result<LivenessState, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Snapshot { reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    /// Return the engine to the rest state.
    pub async fn reset(&self) -> Result<(), EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Reset { reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }
}

/// Spawn the liveness engine on a dedicated OS thread.
///
/// The thread exits once every [`EngineHandle`] has been dropped.
pub fn spawn_engine(config: LivenessConfig, queue: usize) -> Result<EngineHandle, EngineError> {
    tracing::info!(
        movement_threshold = config.movement_threshold,
        stillness_threshold = config.stillness_threshold,
        blink_threshold = config.blink_threshold,
        queue,
        "starting liveness engine"
    );

    let mut engine = LivenessEngine::new(config)?.with_observer(TracingObserver);
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(queue.max(1));

    std::thread::Builder::new()
        .name("presence-engine".into())
        .spawn(move || {
            tracing::debug!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Tick { detections, reply } => {
                        let outcome = engine.update(&detections);
                        let _ = reply.send(TickResult {
                            outcome,
                            state: *engine.state(),
                        });
                    }
                    EngineRequest::Snapshot { reply } => {
                        let _ = reply.send(*engine.state());
                    }
                    EngineRequest::Reset { reply } => {
                        engine.reset();
                        tracing::debug!("engine reset");
                        let _ = reply.send(());
                    }
                }
            }
            tracing::debug!("engine thread exiting");
        })?;

    Ok(EngineHandle { tx })
}
