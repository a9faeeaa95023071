use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use pixelroll_frame::{BatteryTag, IdentityFrame, InboundFrame, RollTag};
use pixelroll_transport::LinkId;
use tracing::{debug, info};

use crate::error::{Result, SessionError};

/// Latest known state of one die.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DieState {
    pub device_id: u32,
    /// Link the die last identified itself on.
    pub link: LinkId,
    pub led_count: u8,
    pub design_code: u8,
    pub build_timestamp: u32,
    pub dataset_hash: u32,
    pub available_flash: u16,
    pub roll_tag: RollTag,
    pub face_index: u8,
    pub battery_level: u8,
    pub battery_tag: BatteryTag,
    /// Decode time of the most recent frame for this die.
    pub last_updated: Instant,
    /// When the die last came to rest. Never moves backwards.
    pub last_settled_at: Option<Instant>,
}

impl DieState {
    fn from_identity(link: LinkId, identity: &IdentityFrame, now: Instant) -> Self {
        Self {
            device_id: identity.device_id,
            link,
            led_count: identity.led_count,
            design_code: identity.design_code,
            build_timestamp: identity.build_timestamp,
            dataset_hash: identity.dataset_hash,
            available_flash: identity.available_flash,
            roll_tag: identity.roll_tag,
            face_index: identity.face_index,
            battery_level: identity.battery_level,
            battery_tag: identity.battery_tag,
            last_updated: now,
            last_settled_at: identity.roll_tag.is_settled().then_some(now),
        }
    }

    /// One-based face value.
    pub fn face_value(&self) -> u8 {
        self.face_index.wrapping_add(1)
    }

    pub fn battery_charging(&self) -> bool {
        self.battery_tag.is_charging()
    }

    fn apply_roll(&mut self, roll_tag: RollTag, face_index: u8, now: Instant) {
        if roll_tag.is_settled() && !self.roll_tag.is_settled() {
            self.last_settled_at = Some(match self.last_settled_at {
                Some(prev) => prev.max(now),
                None => now,
            });
        }
        self.roll_tag = roll_tag;
        self.face_index = face_index;
        self.last_updated = now;
    }

    fn apply_battery(&mut self, level: u8, tag: BatteryTag, now: Instant) {
        self.battery_level = level;
        self.battery_tag = tag;
        self.last_updated = now;
    }
}

/// Result of applying one frame to the store.
#[derive(Debug, Clone)]
pub struct StoreUpdate {
    pub device_id: u32,
    /// Record before the frame was applied; `None` for a newly discovered die.
    pub previous: Option<Arc<DieState>>,
    pub current: Arc<DieState>,
}

/// Point-in-time copy of every known die, ordered by device id.
///
/// Records are shared with the store, but later updates replace them
/// rather than mutate them, so a snapshot never changes.
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    dice: BTreeMap<u32, Arc<DieState>>,
}

impl StoreSnapshot {
    pub fn get(&self, device_id: u32) -> Option<&DieState> {
        self.dice.get(&device_id).map(Arc::as_ref)
    }

    pub fn len(&self) -> usize {
        self.dice.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dice.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DieState> {
        self.dice.values().map(Arc::as_ref)
    }
}

impl FromIterator<DieState> for StoreSnapshot {
    fn from_iter<I: IntoIterator<Item = DieState>>(iter: I) -> Self {
        Self {
            dice: iter
                .into_iter()
                .map(|die| (die.device_id, Arc::new(die)))
                .collect(),
        }
    }
}

#[derive(Default)]
struct StoreInner {
    dice: BTreeMap<u32, Arc<DieState>>,
    links: HashMap<LinkId, u32>,
}

/// Registry of discovered dice, keyed by device id.
///
/// Mutated only by decoded inbound frames. Each record is replaced
/// atomically, so concurrent readers see either the old or the new record.
///
/// One lock guards the whole map together with the link bindings, since an
/// identity frame can move a die between links in the same update. The
/// write lock is held only to swap an `Arc`, and a snapshot only clones the
/// `Arc`s, so neither side waits on the other for longer than that.
#[derive(Default)]
pub struct DieStore {
    inner: RwLock<StoreInner>,
}

impl DieStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one decoded frame received on `link`.
    ///
    /// Identity frames create the record (binding `link` to the device id)
    /// or refresh its dynamic fields. Roll state and battery frames carry no
    /// device id and update whichever die is bound to `link`; before that
    /// die has identified itself they fail with
    /// [`SessionError::UnknownDevice`] and change nothing.
    pub fn upsert_from_frame(
        &self,
        link: LinkId,
        frame: &InboundFrame,
        now: Instant,
    ) -> Result<Option<StoreUpdate>> {
        let mut inner = self.inner.write();

        let (device_id, previous, current) = match frame {
            InboundFrame::Identity(identity) => {
                let device_id = identity.device_id;
                let previous = inner.dice.get(&device_id).cloned();
                let current = match &previous {
                    Some(prev) => {
                        let mut next = DieState::clone(prev);
                        if next.link != link {
                            debug!(device_id, from = %next.link, to = %link, "die moved to new link");
                            inner.links.remove(&next.link);
                            next.link = link;
                        }
                        next.apply_roll(identity.roll_tag, identity.face_index, now);
                        next.apply_battery(identity.battery_level, identity.battery_tag, now);
                        next
                    }
                    None => {
                        info!(
                            device_id,
                            %link,
                            led_count = identity.led_count,
                            design_code = identity.design_code,
                            "die discovered"
                        );
                        DieState::from_identity(link, identity, now)
                    }
                };
                if let Some(stale) = inner.links.insert(link, device_id) {
                    if stale != device_id {
                        debug!(%link, stale, device_id, "link rebound to another die");
                    }
                }
                (device_id, previous, current)
            }
            InboundFrame::RollState(state) => {
                let prev = bound_record(&inner, link)?;
                let mut next = DieState::clone(&prev);
                next.apply_roll(state.roll_tag, state.face_index, now);
                (prev.device_id, Some(prev), next)
            }
            InboundFrame::Battery(battery) => {
                let prev = bound_record(&inner, link)?;
                let mut next = DieState::clone(&prev);
                next.apply_battery(battery.battery_level, battery.battery_tag, now);
                (prev.device_id, Some(prev), next)
            }
            InboundFrame::BlinkAck => return Ok(None),
        };

        let current = Arc::new(current);
        inner.dice.insert(device_id, Arc::clone(&current));
        Ok(Some(StoreUpdate {
            device_id,
            previous,
            current,
        }))
    }

    pub fn get(&self, device_id: u32) -> Option<Arc<DieState>> {
        self.inner.read().dice.get(&device_id).cloned()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            dice: self.inner.read().dice.clone(),
        }
    }

    /// Device id currently bound to `link`.
    pub fn device_for_link(&self, link: LinkId) -> Option<u32> {
        self.inner.read().links.get(&link).copied()
    }

    pub fn len(&self) -> usize {
        self.inner.read().dice.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().dice.is_empty()
    }
}

fn bound_record(inner: &StoreInner, link: LinkId) -> Result<Arc<DieState>> {
    inner
        .links
        .get(&link)
        .and_then(|device_id| inner.dice.get(device_id))
        .cloned()
        .ok_or(SessionError::UnknownDevice { link })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pixelroll_frame::{BatteryFrame, RollStateFrame};

    use super::*;

    fn identity(device_id: u32, roll_tag: RollTag, face_index: u8) -> InboundFrame {
        InboundFrame::Identity(IdentityFrame {
            led_count: 20,
            design_code: 1,
            reserved: 0,
            dataset_hash: 0xABCD,
            device_id,
            available_flash: 1024,
            build_timestamp: 1_650_000_000,
            roll_tag,
            face_index,
            battery_level: 90,
            battery_tag: BatteryTag::Ok,
        })
    }

    fn roll(roll_tag: RollTag, face_index: u8) -> InboundFrame {
        InboundFrame::RollState(RollStateFrame {
            roll_tag,
            face_index,
        })
    }

    #[test]
    fn identity_creates_record_and_binds_link() {
        let store = DieStore::new();
        let link = LinkId::new(1);
        let now = Instant::now();

        let update = store
            .upsert_from_frame(link, &identity(7, RollTag::OnFace, 3), now)
            .unwrap()
            .unwrap();

        assert_eq!(update.device_id, 7);
        assert!(update.previous.is_none());
        assert_eq!(update.current.face_value(), 4);
        assert_eq!(update.current.last_settled_at, Some(now));
        assert_eq!(store.device_for_link(link), Some(7));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn roll_state_before_identity_is_unknown_device() {
        let store = DieStore::new();
        let link = LinkId::new(4);

        let err = store
            .upsert_from_frame(link, &roll(RollTag::Rolling, 0), Instant::now())
            .unwrap_err();

        assert!(matches!(err, SessionError::UnknownDevice { link: l } if l == link));
        assert!(err.is_dropped_frame());
        assert!(store.is_empty());
    }

    #[test]
    fn battery_before_identity_is_unknown_device() {
        let store = DieStore::new();
        let frame = InboundFrame::Battery(BatteryFrame {
            battery_level: 50,
            battery_tag: BatteryTag::Charging,
        });
        assert!(store
            .upsert_from_frame(LinkId::new(1), &frame, Instant::now())
            .is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn blink_ack_changes_nothing() {
        let store = DieStore::new();
        let update = store
            .upsert_from_frame(LinkId::new(1), &InboundFrame::BlinkAck, Instant::now())
            .unwrap();
        assert!(update.is_none());
    }

    #[test]
    fn roll_state_routes_by_link() {
        let store = DieStore::new();
        let t0 = Instant::now();
        store
            .upsert_from_frame(LinkId::new(1), &identity(10, RollTag::OnFace, 0), t0)
            .unwrap();
        store
            .upsert_from_frame(LinkId::new(2), &identity(20, RollTag::OnFace, 0), t0)
            .unwrap();

        let t1 = t0 + Duration::from_millis(10);
        let update = store
            .upsert_from_frame(LinkId::new(2), &roll(RollTag::Rolling, 5), t1)
            .unwrap()
            .unwrap();

        assert_eq!(update.device_id, 20);
        assert_eq!(update.previous.unwrap().roll_tag, RollTag::OnFace);
        assert_eq!(store.get(20).unwrap().roll_tag, RollTag::Rolling);
        assert_eq!(store.get(10).unwrap().roll_tag, RollTag::OnFace);
    }

    #[test]
    fn static_descriptors_set_once() {
        let store = DieStore::new();
        let link = LinkId::new(1);
        let t0 = Instant::now();
        store
            .upsert_from_frame(link, &identity(3, RollTag::OnFace, 0), t0)
            .unwrap();

        let mut changed = identity(3, RollTag::OnFace, 8);
        if let InboundFrame::Identity(frame) = &mut changed {
            frame.led_count = 6;
            frame.battery_level = 12;
        }
        store
            .upsert_from_frame(link, &changed, t0 + Duration::from_secs(1))
            .unwrap();

        let die = store.get(3).unwrap();
        assert_eq!(die.led_count, 20);
        assert_eq!(die.face_index, 8);
        assert_eq!(die.battery_level, 12);
    }

    #[test]
    fn last_settled_at_only_moves_on_transition_into_rest() {
        let store = DieStore::new();
        let link = LinkId::new(1);
        let t0 = Instant::now();
        store
            .upsert_from_frame(link, &identity(1, RollTag::OnFace, 0), t0)
            .unwrap();

        let t1 = t0 + Duration::from_millis(100);
        store
            .upsert_from_frame(link, &roll(RollTag::Rolling, 2), t1)
            .unwrap();
        assert_eq!(store.get(1).unwrap().last_settled_at, Some(t0));

        let t2 = t0 + Duration::from_millis(200);
        store
            .upsert_from_frame(link, &roll(RollTag::Rolled, 9), t2)
            .unwrap();
        assert_eq!(store.get(1).unwrap().last_settled_at, Some(t2));

        // A repeated rest report is not a new settle.
        let t3 = t0 + Duration::from_millis(300);
        store
            .upsert_from_frame(link, &roll(RollTag::Rolled, 9), t3)
            .unwrap();
        let die = store.get(1).unwrap();
        assert_eq!(die.last_settled_at, Some(t2));
        assert_eq!(die.last_updated, t3);
    }

    #[test]
    fn snapshot_is_point_in_time() {
        let store = DieStore::new();
        let link = LinkId::new(1);
        let t0 = Instant::now();
        store
            .upsert_from_frame(link, &identity(1, RollTag::OnFace, 0), t0)
            .unwrap();

        let snapshot = store.snapshot();
        store
            .upsert_from_frame(link, &roll(RollTag::Rolling, 4), t0)
            .unwrap();

        assert_eq!(snapshot.get(1).unwrap().roll_tag, RollTag::OnFace);
        assert_eq!(store.snapshot().get(1).unwrap().roll_tag, RollTag::Rolling);
    }

    #[test]
    fn die_reconnecting_on_new_link_is_rebound() {
        let store = DieStore::new();
        let t0 = Instant::now();
        store
            .upsert_from_frame(LinkId::new(1), &identity(5, RollTag::OnFace, 0), t0)
            .unwrap();
        store
            .upsert_from_frame(LinkId::new(2), &identity(5, RollTag::OnFace, 0), t0)
            .unwrap();

        assert_eq!(store.device_for_link(LinkId::new(1)), None);
        assert_eq!(store.device_for_link(LinkId::new(2)), Some(5));
        assert_eq!(store.get(5).unwrap().link, LinkId::new(2));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn battery_updates_charging_flag() {
        let store = DieStore::new();
        let link = LinkId::new(1);
        let t0 = Instant::now();
        store
            .upsert_from_frame(link, &identity(1, RollTag::OnFace, 0), t0)
            .unwrap();
        store
            .upsert_from_frame(
                link,
                &InboundFrame::Battery(BatteryFrame {
                    battery_level: 33,
                    battery_tag: BatteryTag::Charging,
                }),
                t0,
            )
            .unwrap();

        let die = store.get(1).unwrap();
        assert_eq!(die.battery_level, 33);
        assert!(die.battery_charging());
    }
}
