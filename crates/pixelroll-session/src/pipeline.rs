use std::sync::Arc;
use std::time::Instant;

use pixelroll_frame::decode_frame;
use pixelroll_transport::LinkId;
use tracing::{debug, trace, warn};

use crate::detector::{classify, RollTransition};
use crate::error::{Result, SessionError};
use crate::store::DieStore;

/// A roll transition detected for one die.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollEvent {
    pub device_id: u32,
    pub transition: RollTransition,
    pub at: Instant,
}

/// Decode → store → detect, for one inbound frame at a time.
#[derive(Clone)]
pub struct FramePipeline {
    store: Arc<DieStore>,
}

impl FramePipeline {
    pub fn new(store: Arc<DieStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<DieStore> {
        &self.store
    }

    /// Process one frame received on `link` at `now`.
    ///
    /// Returns an event only for `Started` and `Settled` transitions. Errors
    /// concern this frame alone; see [`SessionError::is_dropped_frame`].
    pub fn ingest(&self, link: LinkId, bytes: &[u8], now: Instant) -> Result<Option<RollEvent>> {
        let frame = decode_frame(bytes)?;
        trace!(%link, message = frame.name(), "frame decoded");

        let Some(update) = self.store.upsert_from_frame(link, &frame, now)? else {
            return Ok(None);
        };

        match classify(update.previous.as_deref(), &update.current) {
            RollTransition::None => Ok(None),
            transition => Ok(Some(RollEvent {
                device_id: update.device_id,
                transition,
                at: now,
            })),
        }
    }
}

/// Log a per-frame error at the level its kind deserves.
pub fn log_ingest_error(link: LinkId, err: &SessionError) {
    if err.is_dropped_frame() {
        debug!(%link, error = %err, "frame dropped");
    } else {
        warn!(%link, error = %err, "frame processing failed");
    }
}
