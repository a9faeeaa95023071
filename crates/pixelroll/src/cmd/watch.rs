use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use pixelroll::effects::HomeAssistantPayloadDispatcher;
use pixelroll_session::{
    DieStore, DispatchError, EffectDispatcher, Outcome, RollMonitor, SessionConfig,
};
use pixelroll_transport::{LinkId, LoopbackTransport};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cmd::decode::parse_hex;
use crate::cmd::WatchArgs;
use crate::config::FileConfig;
use crate::exit::{io_error, session_error, transport_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_outcome, OutputFormat, ResolvedOutcome};

pub fn run(args: WatchArgs, format: OutputFormat, config: &FileConfig) -> CliResult<i32> {
    let config = args.overrides.apply(config);
    let session_config = config.session_config();
    session_config
        .validate()
        .map_err(|err| session_error("invalid session config", err))?;

    let mut lights = args.effects.then(|| {
        let dispatcher = HomeAssistantPayloadDispatcher::new(std::io::stdout(), config.entity_id());
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

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("failed to start runtime", err))?;
    let result = runtime.block_on(watch(args, format, session_config, dispatcher));
    // Stdin reads park a blocking thread that never finishes on its own.
    runtime.shutdown_background();
    result
}

async fn watch<D>(
    args: WatchArgs,
    format: OutputFormat,
    config: SessionConfig,
    dispatcher: D,
) -> CliResult<i32>
where
    D: EffectDispatcher + Send + 'static,
{
    let transport = Arc::new(LoopbackTransport::new());
    let monitor = RollMonitor::spawn(
        config,
        Arc::new(DieStore::new()),
        dispatcher,
        Arc::clone(&transport),
    )
    .map_err(|err| session_error("failed to start monitor", err))?;
    monitor
        .attach(&*transport)
        .map_err(|err| session_error("failed to attach transport", err))?;

    let mut outcomes = monitor.outcomes();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let started = Instant::now();
    let mut printed = 0usize;
    let mut drain_until: Option<Instant> = None;

    let result = loop {
        tokio::select! {
            line = lines.next_line(), if drain_until.is_none() => match line {
                Ok(Some(line)) => {
                    if let Err(err) = feed(&transport, &line) {
                        warn!(error = %err, line = %line.trim(), "input line skipped");
                    }
                }
                Ok(None) => {
                    debug!("input closed, waiting for open sessions");
                    drain_until = Some(Instant::now() + drain_period(&config));
                }
                Err(err) => break Err(io_error("failed to read stdin", err)),
            },
            outcome = outcomes.recv() => match outcome {
                Ok(outcome) => {
                    let at_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                    print_outcome(&ResolvedOutcome { at_ms, outcome }, format);
                    printed = printed.saturating_add(1);
                    if args.count.is_some_and(|count| printed >= count) {
                        break Ok(SUCCESS);
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "outcomes dropped"),
                Err(RecvError::Closed) => break Ok(SUCCESS),
            },
            _ = tokio::time::sleep_until(drain_until.unwrap_or_else(Instant::now)), if drain_until.is_some() => {
                break Ok(SUCCESS);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break Ok(SUCCESS);
            }
        }
    };

    monitor.shutdown().await;
    result
}

/// Long enough for a session opened by the last frame, and one opened from
/// its queue, to resolve.
fn drain_period(config: &SessionConfig) -> Duration {
    (config.capture_window + config.settle_timeout + config.poll_interval) * 2
}

/// Deliver one `<link> <hex>` input line to the loopback transport.
fn feed(transport: &LoopbackTransport, line: &str) -> CliResult<()> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(());
    }
    let (link, frame) = line
        .split_once(char::is_whitespace)
        .ok_or_else(|| CliError::new(USAGE, "expected `<link> <hex>`"))?;
    let link: u32 = link
        .parse()
        .map_err(|err| CliError::new(USAGE, format!("invalid link '{link}': {err}")))?;
    let bytes = parse_hex(frame)?;

    let link = LinkId::new(link);
    transport.open_link_with_id(link);
    transport
        .deliver(link, Bytes::from(bytes))
        .map_err(|err| transport_error("deliver failed", err))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn feed_delivers_to_named_link() {
        let transport = LoopbackTransport::new();
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        pixelroll_transport::DieTransport::on_bytes_received(
            &transport,
            Box::new(move |link, bytes| sink.lock().unwrap().push((link, bytes))),
        )
        .unwrap();

        feed(&transport, "7 03 01 09").unwrap();
        feed(&transport, "   ").unwrap();
        feed(&transport, "# comment").unwrap();

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].0, LinkId::new(7));
        assert_eq!(received[0].1.as_ref(), &[3, 1, 9]);
    }

    #[test]
    fn feed_rejects_bad_lines() {
        let transport = LoopbackTransport::new();
        assert_eq!(feed(&transport, "030109").unwrap_err().code, USAGE);
        assert_eq!(feed(&transport, "x 030109").unwrap_err().code, USAGE);
    }

    #[test]
    fn drain_covers_a_queued_session() {
        let config = SessionConfig::default();
        assert_eq!(drain_period(&config), Duration::from_millis(10_700));
    }
}
