//! `presence replay` — drive the engine from a recorded detection trace.
//!
//! A trace is JSON lines, one tick per line. Each line is either
//! `{"faces": [...]}` or a bare array of faces; a face is
//! `{"box": [[x1, y1], [x2, y2]], "landmarks": [[x, y], ...]}` with
//! `landmarks` optional. Blank lines and lines starting with `#` are skipped.

use anyhow::{Context, Result};
use presence_core::{DetectedFace, LivenessEvent, RenderBox};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::engine::EngineHandle;

#[derive(Deserialize)]
#[serde(untagged)]
enum TraceLine {
    Bare(Vec<DetectedFace>),
    Frame { faces: Vec<DetectedFace> },
}

impl TraceLine {
    fn into_faces(self) -> Vec<DetectedFace> {
        match self {
            Self::Bare(faces) | Self::Frame { faces } => faces,
        }
    }
}

/// Parse one trace line. `Ok(None)` for blank and comment lines.
fn parse_line(line: &str) -> Result<Option<Vec<DetectedFace>>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let parsed: TraceLine = serde_json::from_str(line)?;
    Ok(Some(parsed.into_faces()))
}

/// Per-tick report written in `--json` mode.
#[derive(Serialize)]
struct TickReport<'a> {
    tick: u64,
    is_live: bool,
    stillness_frames: u32,
    render_boxes: &'a [RenderBox],
    events: &'a [LivenessEvent],
}

/// Totals printed after a replay.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplaySummary {
    pub ticks: u64,
    pub live_ticks: u64,
    pub empty_ticks: u64,
}

/// Replay every tick from `reader` through `engine`, writing one line per tick.
pub async fn replay<R: BufRead, W: Write>(
    engine: &EngineHandle,
    reader: R,
    out: &mut W,
    json: bool,
) -> Result<ReplaySummary> {
    let mut summary = ReplaySummary::default();

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.with_context(|| format!("failed to read trace line {line_no}"))?;
        let Some(faces) =
            parse_line(&line).with_context(|| format!("invalid trace line {line_no}"))?
        else {
            continue;
        };

        if faces.is_empty() {
            summary.empty_ticks += 1;
        }
        summary.ticks += 1;

        let result = engine.tick(faces).await?;
        if result.outcome.is_live {
            summary.live_ticks += 1;
        }

        if json {
            let report = TickReport {
                tick: summary.ticks,
                is_live: result.outcome.is_live,
                stillness_frames: result.state.stillness_frames,
                render_boxes: &result.outcome.render_boxes,
                events: &result.outcome.events,
            };
            serde_json::to_writer(&mut *out, &report)?;
            writeln!(out)?;
        } else {
            write!(
                out,
                "tick {:>5}  {:<8}  stillness={:<4}",
                summary.ticks,
                if result.outcome.is_live { "live" } else { "not-live" },
                result.state.stillness_frames
            )?;
            for b in &result.outcome.render_boxes {
                let tl = b.rect.top_left();
                let br = b.rect.bottom_right();
                write!(
                    out,
                    "  [({:.1},{:.1})-({:.1},{:.1}) {}]",
                    tl.x,
                    tl.y,
                    br.x,
                    br.y,
                    b.color.as_str()
                )?;
            }
            writeln!(out)?;
        }
    }

    Ok(summary)
}

/// Run the replay command over one or more traces, or stdin when a path is `-`.
///
/// Each trace is its own session: the engine is reset before every trace
/// after the first.
pub async fn run(engine: &EngineHandle, paths: &[PathBuf], json: bool) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    for (i, path) in paths.iter().enumerate() {
        if i > 0 {
            engine.reset().await?;
        }

        let summary = if path.as_path() == Path::new("-") {
            replay(engine, io::stdin().lock(), &mut out, json).await?
        } else {
            let file = File::open(path)
                .with_context(|| format!("failed to open trace {}", path.display()))?;
            replay(engine, BufReader::new(file), &mut out, json).await?
        };
        out.flush()?;

        let last = engine.snapshot().await?;
        tracing::info!(
            trace = %path.display(),
            ticks = summary.ticks,
            live_ticks = summary.live_ticks,
            empty_ticks = summary.empty_ticks,
            final_is_live = last.is_live,
            "replay finished"
        );
        if !json {
            eprintln!(
                "{}: {} tick(s), {} live, {} without faces; final verdict {}",
                path.display(),
                summary.ticks,
                summary.live_ticks,
                summary.empty_ticks,
                if last.is_live { "live" } else { "not-live" }
            );
        }
    }

    Ok(())
}
