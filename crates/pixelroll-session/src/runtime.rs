//! Tokio driver for the frame pipeline and the session engine.
//!
//! Three tasks share one [`DieStore`]:
//! - frame processing: decode, store, detect; forwards roll events
//! - session loop: fixed-tick evaluation of the engine against snapshots,
//!   plus a wakeup at the active session's settle deadline
//! - outbound commands: each transport write runs on the blocking pool

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use parking_lot::Mutex;
use pixelroll_frame::{CommandWriter, OutboundCommand};
use pixelroll_transport::{DieTransport, LinkId};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::dispatch::EffectDispatcher;
use crate::engine::{RollSession, SessionEngine};
use crate::error::{Result, SessionError};
use crate::outcome::Outcome;
use crate::pipeline::{log_ingest_error, FramePipeline, RollEvent};
use crate::store::DieStore;

const INBOUND_CAPACITY: usize = 256;
const EVENT_CAPACITY: usize = 64;
const COMMAND_CAPACITY: usize = 32;
const OUTCOME_CAPACITY: usize = 16;

fn monotonic_now() -> Instant {
    tokio::time::Instant::now().into_std()
}

type CommandSender = mpsc::Sender<(LinkId, OutboundCommand)>;

/// Links that have an identity request in flight.
///
/// A link is marked only once its request is queued and unmarked again if
/// the request cannot be written, so a later frame retries it.
#[derive(Clone, Default)]
struct IdentityRequests {
    pending: Arc<Mutex<HashSet<LinkId>>>,
}

impl IdentityRequests {
    /// Queue a `WhoAreYou` for `link` unless one is already in flight.
    fn request(&self, link: LinkId, commands: &CommandSender) -> bool {
        let mut pending = self.pending.lock();
        if pending.contains(&link) {
            return false;
        }
        match commands.try_send((link, OutboundCommand::WhoAreYou)) {
            Ok(()) => {
                debug!(%link, "requesting identity");
                pending.insert(link);
                true
            }
            Err(err) => {
                warn!(%link, error = %err, "identity request not queued");
                false
            }
        }
    }

    fn forget(&self, link: LinkId) {
        self.pending.lock().remove(&link);
    }

    #[cfg(test)]
    fn is_pending(&self, link: LinkId) -> bool {
        self.pending.lock().contains(&link)
    }
}

/// Handle to a running roll monitor.
pub struct RollMonitor {
    inbound_tx: mpsc::Sender<(LinkId, Bytes)>,
    command_tx: mpsc::Sender<(LinkId, OutboundCommand)>,
    outcome_tx: broadcast::Sender<Outcome>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl RollMonitor {
    /// Start the monitor on the current tokio runtime.
    ///
    /// `outbound` carries commands to dice; the monitor asks a die to
    /// identify itself the first time a status frame arrives from an
    /// unidentified link.
    pub fn spawn<D, T>(
        config: SessionConfig,
        store: Arc<DieStore>,
        dispatcher: D,
        outbound: T,
    ) -> Result<Self>
    where
        D: EffectDispatcher + Send + 'static,
        T: DieTransport + 'static,
    {
        config.validate()?;

        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(EVENT_CAPACITY);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (outcome_tx, _) = broadcast::channel(OUTCOME_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let identity_requests = IdentityRequests::default();

        let frames = tokio::spawn(frame_task(
            FramePipeline::new(Arc::clone(&store)),
            inbound_rx,
            event_tx,
            command_tx.clone(),
            identity_requests.clone(),
            shutdown_rx.clone(),
        ));
        let session = tokio::spawn(session_task(
            SessionEngine::new(config, dispatcher),
            store,
            event_rx,
            outcome_tx.clone(),
            shutdown_rx,
        ));
        let commands = tokio::spawn(command_task(
            CommandWriter::new(outbound),
            command_rx,
            identity_requests,
        ));

        info!(
            capture_window_ms = config.capture_window.as_millis() as u64,
            settle_timeout_ms = config.settle_timeout.as_millis() as u64,
            poll_interval_ms = config.poll_interval.as_millis() as u64,
            "roll monitor started"
        );

        Ok(Self {
            inbound_tx,
            command_tx,
            outcome_tx,
            shutdown_tx,
            tasks: vec![frames, session, commands],
        })
    }

    /// Sender for raw frames received from dice.
    pub fn inbound(&self) -> mpsc::Sender<(LinkId, Bytes)> {
        self.inbound_tx.clone()
    }

    /// Route every frame a transport receives into this monitor.
    ///
    /// The callback never blocks the transport; frames are dropped with a
    /// warning when the inbound queue is full.
    pub fn attach<T: DieTransport + ?Sized>(&self, transport: &T) -> Result<()> {
        let inbound = self.inbound_tx.clone();
        transport.on_bytes_received(Box::new(move |link, bytes| {
            if let Err(err) = inbound.try_send((link, bytes)) {
                warn!(%link, error = %err, "inbound frame not queued");
            }
        }))?;
        Ok(())
    }

    /// Queue a command for a die.
    pub async fn send_command(&self, link: LinkId, command: OutboundCommand) -> Result<()> {
        self.command_tx
            .send((link, command))
            .await
            .map_err(|_| SessionError::MonitorClosed)
    }

    /// Subscribe to resolved outcomes.
    pub fn outcomes(&self) -> broadcast::Receiver<Outcome> {
        self.outcome_tx.subscribe()
    }

    /// Stop all tasks and wait for them to finish.
    pub async fn shutdown(self) {
        let Self {
            inbound_tx,
            command_tx,
            shutdown_tx,
            tasks,
            ..
        } = self;

        let _ = shutdown_tx.send(true);
        drop(inbound_tx);
        drop(command_tx);

        for task in tasks {
            if let Err(err) = task.await {
                warn!(error = %err, "roll monitor task failed");
            }
        }
        info!("roll monitor stopped");
    }
}

async fn frame_task(
    pipeline: FramePipeline,
    mut inbound: mpsc::Receiver<(LinkId, Bytes)>,
    events: mpsc::Sender<RollEvent>,
    commands: CommandSender,
    identity_requests: IdentityRequests,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            received = inbound.recv() => {
                let Some((link, bytes)) = received else {
                    break;
                };
                match pipeline.ingest(link, &bytes, monotonic_now()) {
                    Ok(Some(event)) => {
                        if events.send(event).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(err) => {
                        log_ingest_error(link, &err);
                        if matches!(err, SessionError::UnknownDevice { .. }) {
                            identity_requests.request(link, &commands);
                        }
                    }
                }
            }
        }
    }
}

async fn session_task<D: EffectDispatcher>(
    mut engine: SessionEngine<D>,
    store: Arc<DieStore>,
    mut events: mpsc::Receiver<RollEvent>,
    outcomes: broadcast::Sender<Outcome>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(engine.config().poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        // The tick grid is not aligned to the settle deadline, so wake for it
        // separately and resolve a timed-out session on time.
        let settle_deadline = engine
            .session()
            .and_then(RollSession::settle_deadline)
            .map(tokio::time::Instant::from_std);

        // Pending events are applied before any tick so a start decoded
        // before a deadline is never evaluated after it.
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            event = events.recv() => {
                let Some(event) = event else {
                    break;
                };
                engine.observe(event.device_id, event.transition, event.at);
            }
            _ = tokio::time::sleep_until(settle_deadline.unwrap_or_else(tokio::time::Instant::now)),
                if settle_deadline.is_some() =>
            {
                evaluate(&mut engine, &store, &outcomes);
            }
            _ = ticker.tick() => evaluate(&mut engine, &store, &outcomes),
        }
    }
}

fn evaluate<D: EffectDispatcher>(
    engine: &mut SessionEngine<D>,
    store: &DieStore,
    outcomes: &broadcast::Sender<Outcome>,
) {
    let snapshot = store.snapshot();
    if let Some(outcome) = engine.tick(monotonic_now(), &snapshot) {
        // No subscribers is fine.
        let _ = outcomes.send(outcome);
    }
}

async fn command_task<T: DieTransport + 'static>(
    writer: CommandWriter<T>,
    mut commands: mpsc::Receiver<(LinkId, OutboundCommand)>,
    identity_requests: IdentityRequests,
) {
    let writer = Arc::new(Mutex::new(writer));
    while let Some((link, command)) = commands.recv().await {
        let is_identity_request = matches!(command, OutboundCommand::WhoAreYou);
        let writer = Arc::clone(&writer);
        let sent = tokio::task::spawn_blocking(move || writer.lock().send(link, &command)).await;
        let failed = match sent {
            Ok(Ok(())) => false,
            Ok(Err(err)) => {
                warn!(%link, error = %err, "command send failed");
                true
            }
            Err(err) => {
                warn!(%link, error = %err, "command send task failed");
                true
            }
        };
        if failed && is_identity_request {
            identity_requests.forget(link);
        }
    }
}
