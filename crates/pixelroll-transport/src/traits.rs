use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::Result;

/// Identifies one transport connection to one die.
///
/// A link is assigned by the transport when a die connects. Status frames
/// other than the identity frame carry no device id, so the link is how the
/// core attributes them to a die.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkId(u32);

impl LinkId {
    /// Wrap a raw link number.
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw link number.
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl From<u32> for LinkId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link-{}", self.0)
    }
}

/// Called once per inbound notification with the link it arrived on.
pub type InboundCallback = Box<dyn FnMut(LinkId, Bytes) + Send>;

/// The transport boundary consumed by the core.
///
/// Implementations wrap a concrete BLE stack. Every invocation of the
/// registered callback is treated as exactly one frame.
pub trait DieTransport: Send + Sync {
    /// Write a complete payload to the die behind `link`.
    ///
    /// May block on transport backpressure; callers must not invoke this from
    /// the frame-processing path.
    fn send_bytes(&self, link: LinkId, payload: &[u8]) -> Result<()>;

    /// Register the inbound callback. Called once at startup.
    fn on_bytes_received(&self, callback: InboundCallback) -> Result<()>;
}

impl<T: DieTransport + ?Sized> DieTransport for Arc<T> {
    fn send_bytes(&self, link: LinkId, payload: &[u8]) -> Result<()> {
        (**self).send_bytes(link, payload)
    }

    fn on_bytes_received(&self, callback: InboundCallback) -> Result<()> {
        (**self).on_bytes_received(callback)
    }
}
