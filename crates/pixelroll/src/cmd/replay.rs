//! Offline replay of a recorded frame trace.
//!
//! The trace is driven through the same pipeline and engine the monitor uses,
//! on a simulated clock: the engine ticks on a fixed grid of
//! `poll_interval`, and a tick due at a frame's timestamp runs before that
//! frame is ingested.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use pixelroll::effects::HomeAssistantPayloadDispatcher;
use pixelroll_session::{
    log_ingest_error, DieStore, DispatchError, EffectDispatcher, FramePipeline, Outcome,
    SessionEngine, SessionPhase,
};
use pixelroll_transport::LinkId;
use serde::Deserialize;
use tracing::{debug, info};

use crate::cmd::decode::parse_hex;
use crate::cmd::ReplayArgs;
use crate::config::FileConfig;
use crate::exit::{io_error, session_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_outcomes, OutputFormat, ResolvedOutcome};

/// One line of a trace file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TraceRecord {
    at_ms: u64,
    link: u32,
    /// Frame bytes as hex.
    frame: String,
}

pub fn run(args: ReplayArgs, format: OutputFormat, config: &FileConfig) -> CliResult<i32> {
    let config = args.overrides.apply(config);
    let session_config = config.session_config();
    session_config
        .validate()
        .map_err(|err| session_error("invalid session config", err))?;

    let records = read_trace(&args.path)?;

    let mut lights = args.effects.then(|| {
        let dispatcher = HomeAssistantPayloadDispatcher::new(io::stdout(), config.entity_id());
        match config.restore_color_temp() {
            Some(temp) => dispatcher.with_restore(temp),
            None => dispatcher,
        }
    });
    let dispatcher = move |outcome: &Outcome| -> Result<(), DispatchError> {
        match lights.as_mut() {
            Some(lights) => lights.dispatch(outcome),
            None => Ok(()),
        }
    };

    let mut replay = Replay::new(SessionEngine::new(session_config, dispatcher));
    for record in &records {
        let bytes = parse_hex(&record.frame)?;
        replay.frame(record.at_ms, LinkId::new(record.link), &bytes);
    }
    replay.finish();

    info!(
        frames = records.len(),
        outcomes = replay.outcomes.len(),
        "replay finished"
    );
    print_outcomes(&replay.outcomes, format);
    Ok(SUCCESS)
}

fn read_trace(path: &Path) -> CliResult<Vec<TraceRecord>> {
    let file = File::open(path)
        .map_err(|err| io_error(&format!("failed to open {}", path.display()), err))?;

    let mut records: Vec<TraceRecord> = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line_no = index + 1;
        let line = line.map_err(|err| io_error("failed to read trace", err))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: TraceRecord = serde_json::from_str(&line).map_err(|err| {
            CliError::new(DATA_INVALID, format!("trace line {line_no}: {err}"))
        })?;
        if let Some(prev) = records.last() {
            if record.at_ms < prev.at_ms {
                return Err(CliError::new(
                    DATA_INVALID,
                    format!(
                        "trace line {line_no}: at_ms {} is earlier than {}",
                        record.at_ms, prev.at_ms
                    ),
                ));
            }
        }
        records.push(record);
    }
    Ok(records)
}

struct Replay<D> {
    pipeline: FramePipeline,
    engine: SessionEngine<D>,
    start: Instant,
    next_tick: Duration,
    outcomes: Vec<ResolvedOutcome>,
}

impl<D: EffectDispatcher> Replay<D> {
    fn new(engine: SessionEngine<D>) -> Self {
        Self {
            pipeline: FramePipeline::new(Arc::new(DieStore::new())),
            engine,
            start: Instant::now(),
            next_tick: Duration::ZERO,
            outcomes: Vec::new(),
        }
    }

    fn tick(&mut self) {
        let snapshot = self.pipeline.store().snapshot();
        if let Some(outcome) = self.engine.tick(self.start + self.next_tick, &snapshot) {
            self.outcomes.push(ResolvedOutcome {
                at_ms: u64::try_from(self.next_tick.as_millis()).unwrap_or(u64::MAX),
                outcome,
            });
        }
        self.next_tick += self.engine.config().poll_interval;
    }

    fn advance_to(&mut self, at: Duration) {
        while self.next_tick <= at {
            self.tick();
        }
    }

    fn frame(&mut self, at_ms: u64, link: LinkId, bytes: &[u8]) {
        let at = Duration::from_millis(at_ms);
        self.advance_to(at);
        match self.pipeline.ingest(link, bytes, self.start + at) {
            Ok(Some(event)) => {
                self.engine
                    .observe(event.device_id, event.transition, event.at)
            }
            Ok(None) => {}
            Err(err) => log_ingest_error(link, &err),
        }
    }

    /// Tick until no session is open and nothing is queued.
    fn finish(&mut self) {
        while self.engine.phase() != SessionPhase::Idle || !self.engine.queued().is_empty() {
            self.tick();
        }
        debug!(end_ms = self.next_tick.as_millis() as u64, "replay drained");
    }
}
