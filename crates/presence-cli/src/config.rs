use anyhow::{Context, Result};
use presence_core::LivenessConfig;
use std::path::{Path, PathBuf};

/// Default capacity of the tick queue in front of the engine thread.
const DEFAULT_TICK_QUEUE: usize = 4;

/// CLI configuration: defaults, then an optional TOML file, then `PRESENCE_*`
/// environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Engine tunables.
    pub liveness: LivenessConfig,
    /// File the tunables were read from, if any.
    pub source: Option<PathBuf>,
    /// Bounded queue length between the driving loop and the engine thread.
    pub tick_queue: usize,
}

impl Config {
    /// Load configuration for this process.
    ///
    /// `path` comes from `--config`; when absent `PRESENCE_CONFIG` is consulted.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    fn load_with(path: Option<&Path>, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let source = path
            .map(Path::to_path_buf)
            .or_else(|| lookup("PRESENCE_CONFIG").map(PathBuf::from));

        let mut liveness = match &source {
            Some(p) => LivenessConfig::load(p)
                .with_context(|| format!("failed to load config from {}", p.display()))?,
            None => LivenessConfig::default(),
        };

        liveness.movement_threshold =
            var_parsed(&lookup, "PRESENCE_MOVEMENT_THRESHOLD", liveness.movement_threshold);
        liveness.stillness_threshold =
            var_parsed(&lookup, "PRESENCE_STILLNESS_THRESHOLD", liveness.stillness_threshold);
        liveness.blink_threshold =
            var_parsed(&lookup, "PRESENCE_BLINK_THRESHOLD", liveness.blink_threshold);
        liveness.scale_factor = var_parsed(&lookup, "PRESENCE_SCALE_FACTOR", liveness.scale_factor);
        liveness.y_offset = var_parsed(&lookup, "PRESENCE_Y_OFFSET", liveness.y_offset);

        liveness
            .validate()
            .context("invalid liveness configuration")?;

        let tick_queue = var_parsed(&lookup, "PRESENCE_TICK_QUEUE", DEFAULT_TICK_QUEUE).max(1);

        Ok(Self {
            liveness,
            source,
            tick_queue,
        })
    }
}

/// Parse `key` if set and well-formed, otherwise keep `default`.
fn var_parsed<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
