use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::detector::RollTransition;
use crate::dispatch::EffectDispatcher;
use crate::outcome::Outcome;
use crate::store::StoreSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    /// Rolling dice may still join.
    Capturing,
    /// Waiting for every participant to come to rest.
    Settling,
    Resolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Participant {
    pub device_id: u32,
    pub joined_at: Instant,
}

/// One coherent toss of one or more dice.
#[derive(Debug, Clone)]
pub struct RollSession {
    phase: SessionPhase,
    participants: Vec<Participant>,
    opened_at: Instant,
    capture_deadline: Instant,
    settle_deadline: Option<Instant>,
    resolution: Option<Outcome>,
}

impl RollSession {
    fn open(device_ids: impl IntoIterator<Item = u32>, at: Instant, config: &SessionConfig) -> Self {
        Self {
            phase: SessionPhase::Capturing,
            participants: device_ids
                .into_iter()
                .map(|device_id| Participant {
                    device_id,
                    joined_at: at,
                })
                .collect(),
            opened_at: at,
            capture_deadline: at + config.capture_window,
            settle_deadline: None,
            resolution: None,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Participants in join order.
    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn opened_at(&self) -> Instant {
        self.opened_at
    }

    pub fn capture_deadline(&self) -> Instant {
        self.capture_deadline
    }

    /// Set when the session enters [`SessionPhase::Settling`].
    pub fn settle_deadline(&self) -> Option<Instant> {
        self.settle_deadline
    }

    pub fn resolution(&self) -> Option<&Outcome> {
        self.resolution.as_ref()
    }

    fn contains(&self, device_id: u32) -> bool {
        self.participants.iter().any(|p| p.device_id == device_id)
    }

    fn all_settled(&self, snapshot: &StoreSnapshot) -> bool {
        self.participants.iter().all(|p| {
            snapshot.get(p.device_id).is_some_and(|die| {
                die.roll_tag.is_settled()
                    && die.last_settled_at.is_some_and(|at| at > p.joined_at)
            })
        })
    }

    fn build_outcome(&self, snapshot: &StoreSnapshot, timed_out: bool) -> Outcome {
        let mut degraded = timed_out;
        let mut low_confidence = false;
        let mut rolls = Vec::with_capacity(self.participants.len());

        for participant in &self.participants {
            match snapshot.get(participant.device_id) {
                Some(die) => {
                    low_confidence |= die.roll_tag.is_low_confidence();
                    rolls.push((participant.device_id, die.face_value()));
                }
                None => {
                    warn!(device_id = participant.device_id, "participant missing from store");
                    degraded = true;
                }
            }
        }

        Outcome::new(rolls, degraded, low_confidence)
    }
}

/// Groups rolls of several dice into sessions and resolves each one.
///
/// The engine performs no I/O apart from calling its dispatcher and never
/// reads the clock: every method takes the current time as a parameter, so
/// the same inputs always produce the same outcomes.
pub struct SessionEngine<D> {
    config: SessionConfig,
    dispatcher: D,
    session: Option<RollSession>,
    queued: Vec<u32>,
}

impl<D: EffectDispatcher> SessionEngine<D> {
    pub fn new(config: SessionConfig, dispatcher: D) -> Self {
        Self {
            config,
            dispatcher,
            session: None,
            queued: Vec::new(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn phase(&self) -> SessionPhase {
        self.session
            .as_ref()
            .map_or(SessionPhase::Idle, RollSession::phase)
    }

    /// The active session, if any.
    pub fn session(&self) -> Option<&RollSession> {
        self.session.as_ref()
    }

    /// Dice that started rolling too late for the active session.
    pub fn queued(&self) -> &[u32] {
        &self.queued
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut D {
        &mut self.dispatcher
    }

    /// Feed one roll transition reported for `device_id` at `at`.
    pub fn observe(&mut self, device_id: u32, transition: RollTransition, at: Instant) {
        match transition {
            RollTransition::None => {}
            RollTransition::Settled { confidence } => {
                debug!(device_id, ?confidence, phase = ?self.phase(), "die settled");
            }
            RollTransition::Started => self.on_started(device_id, at),
        }
    }

    fn on_started(&mut self, device_id: u32, at: Instant) {
        let Some(session) = self.session.as_mut() else {
            let session = RollSession::open([device_id], at, &self.config);
            info!(device_id, "roll session opened");
            self.session = Some(session);
            return;
        };

        // Membership follows the event time, not the phase: a start observed
        // after the capture window closed still joins if it happened inside it.
        if session.phase != SessionPhase::Resolved && at < session.capture_deadline {
            if !session.contains(device_id) {
                session.participants.push(Participant {
                    device_id,
                    joined_at: at,
                });
                debug!(
                    device_id,
                    participants = session.participants.len(),
                    "die joined roll session"
                );
            }
            return;
        }

        if !self.queued.contains(&device_id) {
            debug!(device_id, phase = ?session.phase, "roll queued for next session");
            self.queued.push(device_id);
        }
    }

    /// Advance the session clock.
    ///
    /// Returns the outcome when the active session resolves on this tick.
    pub fn tick(&mut self, now: Instant, snapshot: &StoreSnapshot) -> Option<Outcome> {
        let Some(session) = self.session.as_mut() else {
            self.drain_queue(now, snapshot);
            return None;
        };

        if session.phase == SessionPhase::Capturing {
            if now < session.capture_deadline {
                return None;
            }
            let settle_deadline = session.capture_deadline + self.config.settle_timeout;
            session.phase = SessionPhase::Settling;
            session.settle_deadline = Some(settle_deadline);
            debug!(
                participants = session.participants.len(),
                "capture window closed"
            );
        }

        let settled = session.all_settled(snapshot);
        let timed_out = session
            .settle_deadline
            .is_some_and(|deadline| now >= deadline);
        if !settled && !timed_out {
            return None;
        }

        let outcome = session.build_outcome(snapshot, !settled);
        session.phase = SessionPhase::Resolved;
        session.resolution = Some(outcome.clone());
        info!(
            total = outcome.total(),
            tier = %outcome.tier(),
            dice = outcome.participants().len(),
            degraded = outcome.degraded(),
            low_confidence = outcome.low_confidence(),
            "roll session resolved"
        );

        if let Err(err) = self.dispatcher.dispatch(&outcome) {
            warn!(error = %err, tier = %outcome.tier(), "effect dispatch failed");
        }
        self.session = None;
        Some(outcome)
    }

    fn drain_queue(&mut self, now: Instant, snapshot: &StoreSnapshot) {
        if self.queued.is_empty() {
            return;
        }

        let (still_rolling, stopped): (Vec<u32>, Vec<u32>) =
            self.queued.drain(..).partition(|device_id| {
                snapshot
                    .get(*device_id)
                    .is_some_and(|die| die.roll_tag.is_in_motion())
            });
        if !stopped.is_empty() {
            debug!(dropped = stopped.len(), "queued dice already at rest");
        }
        if still_rolling.is_empty() {
            return;
        }

        info!(dice = still_rolling.len(), "roll session opened from queue");
        self.session = Some(RollSession::open(still_rolling, now, &self.config));
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pixelroll_frame::{BatteryTag, RollTag};
    use pixelroll_transport::LinkId;

    use super::*;
    use crate::detector::Confidence;
    use crate::dispatch::{DispatchError, NoopDispatcher};
    use crate::outcome::ResultTier;
    use crate::store::DieState;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn die(
        device_id: u32,
        roll_tag: RollTag,
        face_index: u8,
        last_settled_at: Option<Instant>,
    ) -> DieState {
        DieState {
            device_id,
            link: LinkId::new(device_id),
            led_count: 20,
            design_code: 0,
            build_timestamp: 0,
            dataset_hash: 0,
            available_flash: 0,
            roll_tag,
            face_index,
            battery_level: 100,
            battery_tag: BatteryTag::Ok,
            last_updated: last_settled_at.unwrap_or_else(Instant::now),
            last_settled_at,
        }
    }

    fn engine() -> SessionEngine<NoopDispatcher> {
        SessionEngine::new(SessionConfig::default(), NoopDispatcher)
    }

    #[test]
    fn dice_started_within_window_share_a_session() {
        let t0 = Instant::now();
        let mut engine = engine();

        engine.observe(1, RollTransition::Started, t0);
        engine.observe(2, RollTransition::Started, t0 + ms(50));
        assert_eq!(engine.phase(), SessionPhase::Capturing);

        let rolling: StoreSnapshot = [
            die(1, RollTag::Rolling, 0, None),
            die(2, RollTag::Rolling, 0, None),
        ]
        .into_iter()
        .collect();
        assert!(engine.tick(t0 + ms(100), &rolling).is_none());

        engine.observe(3, RollTransition::Started, t0 + ms(400));
        assert_eq!(engine.queued(), &[3]);
        assert!(engine.tick(t0 + ms(400), &rolling).is_none());
        assert_eq!(engine.phase(), SessionPhase::Settling);

        let settled: StoreSnapshot = [
            die(1, RollTag::Rolled, 9, Some(t0 + ms(900))),
            die(2, RollTag::Rolled, 4, Some(t0 + ms(950))),
            die(3, RollTag::Rolling, 0, None),
        ]
        .into_iter()
        .collect();
        let first = engine.tick(t0 + ms(1000), &settled).unwrap();
        assert_eq!(first.participants(), &[1, 2]);
        assert_eq!(first.total(), 15);
        assert_eq!(first.tier(), ResultTier::High);
        assert!(!first.degraded());
        assert_eq!(engine.phase(), SessionPhase::Idle);

        // The queued die opens its own session on the next idle tick.
        assert!(engine.tick(t0 + ms(1050), &settled).is_none());
        let session = engine.session().unwrap();
        assert_eq!(session.phase(), SessionPhase::Capturing);
        assert_eq!(session.participants().len(), 1);
        assert_eq!(session.participants()[0].device_id, 3);
        assert_eq!(session.opened_at(), t0 + ms(1050));
        assert!(engine.queued().is_empty());
    }

    #[test]
    fn start_exactly_at_capture_deadline_is_queued() {
        let t0 = Instant::now();
        let mut engine = engine();
        engine.observe(1, RollTransition::Started, t0);
        engine.observe(2, RollTransition::Started, t0 + ms(300));

        assert_eq!(engine.session().unwrap().participants().len(), 1);
        assert_eq!(engine.queued(), &[2]);
    }

    #[test]
    fn start_stamped_inside_window_joins_after_capture_closed() {
        let t0 = Instant::now();
        let mut engine = engine();
        engine.observe(1, RollTransition::Started, t0);

        let rolling: StoreSnapshot = [
            die(1, RollTag::Rolling, 0, None),
            die(2, RollTag::Rolling, 0, None),
        ]
        .into_iter()
        .collect();
        assert!(engine.tick(t0 + ms(300), &rolling).is_none());
        assert_eq!(engine.phase(), SessionPhase::Settling);

        engine.observe(2, RollTransition::Started, t0 + ms(290));
        let session = engine.session().unwrap();
        assert_eq!(session.participants().len(), 2);
        assert_eq!(session.participants()[1].joined_at, t0 + ms(290));
        assert!(engine.queued().is_empty());

        let settled: StoreSnapshot = [
            die(1, RollTag::Rolled, 2, Some(t0 + ms(600))),
            die(2, RollTag::Rolling, 0, None),
        ]
        .into_iter()
        .collect();
        assert!(engine.tick(t0 + ms(650), &settled).is_none());
    }

    #[test]
    fn repeated_start_does_not_duplicate_participant() {
        let t0 = Instant::now();
        let mut engine = engine();
        engine.observe(1, RollTransition::Started, t0);
        engine.observe(1, RollTransition::Started, t0 + ms(10));
        assert_eq!(engine.session().unwrap().participants().len(), 1);
    }

    #[test]
    fn degraded_resolution_happens_exactly_at_settle_deadline() {
        let t0 = Instant::now();
        let mut engine = engine();
        engine.observe(1, RollTransition::Started, t0);

        let stuck: StoreSnapshot = [die(1, RollTag::Rolling, 6, None)].into_iter().collect();
        assert!(engine.tick(t0 + ms(300), &stuck).is_none());

        let deadline = engine.session().unwrap().settle_deadline().unwrap();
        assert_eq!(deadline, t0 + ms(300) + Duration::from_secs(5));

        assert!(engine.tick(deadline - ms(1), &stuck).is_none());
        assert_eq!(engine.phase(), SessionPhase::Settling);

        let outcome = engine.tick(deadline, &stuck).unwrap();
        assert!(outcome.degraded());
        assert_eq!(outcome.face_values(), &[7]);
        assert_eq!(engine.phase(), SessionPhase::Idle);
    }

    #[test]
    fn settle_before_joining_does_not_count() {
        let t0 = Instant::now();
        let mut engine = engine();
        engine.observe(1, RollTransition::Started, t0 + ms(10));

        // Rest reported before the die joined belongs to an earlier roll.
        let stale: StoreSnapshot = [die(1, RollTag::OnFace, 2, Some(t0))].into_iter().collect();
        assert!(engine.tick(t0 + ms(400), &stale).is_none());
        assert_eq!(engine.phase(), SessionPhase::Settling);
    }

    #[test]
    fn crooked_settle_is_low_confidence() {
        let t0 = Instant::now();
        let mut engine = engine();
        engine.observe(1, RollTransition::Started, t0);
        engine.observe(
            1,
            RollTransition::Settled {
                confidence: Confidence::Low,
            },
            t0 + ms(200),
        );

        let snapshot: StoreSnapshot = [die(1, RollTag::Crooked, 11, Some(t0 + ms(200)))]
            .into_iter()
            .collect();
        let outcome = engine.tick(t0 + ms(300), &snapshot).unwrap();
        assert!(outcome.low_confidence());
        assert!(!outcome.degraded());
        assert_eq!(outcome.total(), 12);
    }

    #[test]
    fn missing_participant_marks_outcome_degraded() {
        let t0 = Instant::now();
        let mut engine = engine();
        engine.observe(1, RollTransition::Started, t0);
        engine.observe(2, RollTransition::Started, t0 + ms(20));

        let snapshot: StoreSnapshot = [die(1, RollTag::Rolled, 4, Some(t0 + ms(100)))]
            .into_iter()
            .collect();
        let deadline = t0 + ms(300) + Duration::from_secs(5);
        let outcome = engine.tick(deadline, &snapshot).unwrap();
        assert!(outcome.degraded());
        assert_eq!(outcome.participants(), &[1]);
        assert_eq!(outcome.total(), 5);
    }

    #[test]
    fn queued_die_at_rest_is_dropped() {
        let t0 = Instant::now();
        let mut engine = engine();
        engine.observe(1, RollTransition::Started, t0);
        engine.observe(2, RollTransition::Started, t0 + ms(500));

        let snapshot: StoreSnapshot = [
            die(1, RollTag::Rolled, 0, Some(t0 + ms(600))),
            die(2, RollTag::Rolled, 0, Some(t0 + ms(700))),
        ]
        .into_iter()
        .collect();
        assert!(engine.tick(t0 + ms(800), &snapshot).is_some());
        assert!(engine.tick(t0 + ms(850), &snapshot).is_none());

        assert_eq!(engine.phase(), SessionPhase::Idle);
        assert!(engine.queued().is_empty());
    }

    #[test]
    fn dispatch_failure_still_returns_to_idle() {
        let t0 = Instant::now();
        let mut calls = 0;
        let dispatcher = |_: &Outcome| -> Result<(), DispatchError> {
            calls += 1;
            Err(DispatchError::Rejected("light offline".to_string()))
        };
        let mut engine = SessionEngine::new(SessionConfig::default(), dispatcher);
        engine.observe(1, RollTransition::Started, t0);

        let snapshot: StoreSnapshot = [die(1, RollTag::Rolled, 19, Some(t0 + ms(100)))]
            .into_iter()
            .collect();
        let outcome = engine.tick(t0 + ms(300), &snapshot).unwrap();
        assert_eq!(outcome.tier(), ResultTier::Critical);
        assert_eq!(engine.phase(), SessionPhase::Idle);

        drop(engine);
        assert_eq!(calls, 1);
    }

    #[test]
    fn settled_event_alone_does_not_open_session() {
        let mut engine = engine();
        engine.observe(
            1,
            RollTransition::Settled {
                confidence: Confidence::Confident,
            },
            Instant::now(),
        );
        assert_eq!(engine.phase(), SessionPhase::Idle);
        assert!(engine.queued().is_empty());
    }
}
