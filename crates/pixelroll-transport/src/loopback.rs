use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::{Result, TransportError};
use crate::traits::{DieTransport, InboundCallback, LinkId};

#[derive(Debug, Default)]
struct LinkState {
    open: bool,
    sent: Vec<Bytes>,
}

/// In-memory transport.
///
/// Links are opened explicitly, inbound frames are injected with
/// [`LoopbackTransport::deliver`], and outbound payloads are recorded per link
/// so they can be inspected afterwards.
pub struct LoopbackTransport {
    links: Mutex<BTreeMap<LinkId, LinkState>>,
    callback: Mutex<Option<InboundCallback>>,
    next_link: AtomicU32,
}

impl LoopbackTransport {
    /// Create a transport with no links.
    pub fn new() -> Self {
        Self {
            links: Mutex::new(BTreeMap::new()),
            callback: Mutex::new(None),
            next_link: AtomicU32::new(1),
        }
    }

    /// Open a link with an auto-assigned id.
    pub fn open_link(&self) -> LinkId {
        loop {
            let link = LinkId::new(self.next_link.fetch_add(1, Ordering::Relaxed));
            let mut links = self.links.lock();
            if !links.contains_key(&link) {
                links.insert(
                    link,
                    LinkState {
                        open: true,
                        sent: Vec::new(),
                    },
                );
                debug!(%link, "loopback link opened");
                return link;
            }
        }
    }

    /// Open (or reopen) a link with an explicit id.
    pub fn open_link_with_id(&self, link: LinkId) {
        let mut links = self.links.lock();
        links.entry(link).or_default().open = true;
        debug!(%link, "loopback link opened");
    }

    /// Mark a link closed. Subsequent sends and deliveries fail.
    pub fn close_link(&self, link: LinkId) -> Result<()> {
        let mut links = self.links.lock();
        let state = links
            .get_mut(&link)
            .ok_or(TransportError::UnknownLink(link))?;
        state.open = false;
        debug!(%link, "loopback link closed");
        Ok(())
    }

    /// Inject one inbound frame as if the die had notified it.
    pub fn deliver(&self, link: LinkId, frame: impl Into<Bytes>) -> Result<()> {
        self.ensure_open(link)?;
        let frame = frame.into();
        trace!(%link, len = frame.len(), "loopback delivering frame");

        let mut callback = self.callback.lock();
        match callback.as_mut() {
            Some(cb) => {
                cb(link, frame);
                Ok(())
            }
            None => Err(TransportError::NoReceiver),
        }
    }

    /// Payloads sent to `link`, oldest first.
    pub fn sent(&self, link: LinkId) -> Vec<Bytes> {
        self.links
            .lock()
            .get(&link)
            .map(|state| state.sent.clone())
            .unwrap_or_default()
    }

    /// Drain and return payloads sent to `link`.
    pub fn take_sent(&self, link: LinkId) -> Vec<Bytes> {
        self.links
            .lock()
            .get_mut(&link)
            .map(|state| std::mem::take(&mut state.sent))
            .unwrap_or_default()
    }

    /// Links currently open.
    pub fn open_links(&self) -> Vec<LinkId> {
        self.links
            .lock()
            .iter()
            .filter(|(_, state)| state.open)
            .map(|(link, _)| *link)
            .collect()
    }

    fn ensure_open(&self, link: LinkId) -> Result<()> {
        match self.links.lock().get(&link) {
            Some(state) if state.open => Ok(()),
            Some(_) => Err(TransportError::Closed(link)),
            None => Err(TransportError::UnknownLink(link)),
        }
    }
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl DieTransport for LoopbackTransport {
    fn send_bytes(&self, link: LinkId, payload: &[u8]) -> Result<()> {
        let mut links = self.links.lock();
        let state = links
            .get_mut(&link)
            .ok_or(TransportError::UnknownLink(link))?;
        if !state.open {
            return Err(TransportError::Closed(link));
        }
        state.sent.push(Bytes::copy_from_slice(payload));
        trace!(%link, len = payload.len(), "loopback recorded outbound payload");
        Ok(())
    }

    fn on_bytes_received(&self, callback: InboundCallback) -> Result<()> {
        let mut slot = self.callback.lock();
        if slot.is_some() {
            return Err(TransportError::AlreadyRegistered);
        }
        *slot = Some(callback);
        Ok(())
    }
}

impl std::fmt::Debug for LoopbackTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackTransport")
            .field("links", &self.links.lock().len())
            .field("receiver", &self.callback.lock().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex as StdMutex};

    use super::*;

    #[test]
    fn deliver_invokes_registered_callback() {
        let transport = LoopbackTransport::new();
        let link = transport.open_link();

        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        transport
            .on_bytes_received(Box::new(move |link, bytes| {
                sink.lock().unwrap().push((link, bytes));
            }))
            .unwrap();

        transport.deliver(link, vec![3, 1, 9]).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, link);
        assert_eq!(seen[0].1.as_ref(), &[3, 1, 9]);
    }

    #[test]
    fn deliver_without_receiver_fails() {
        let transport = LoopbackTransport::new();
        let link = transport.open_link();
        let err = transport.deliver(link, vec![1]).unwrap_err();
        assert!(matches!(err, TransportError::NoReceiver));
    }

    #[test]
    fn second_registration_rejected() {
        let transport = LoopbackTransport::new();
        transport.on_bytes_received(Box::new(|_, _| {})).unwrap();
        let err = transport.on_bytes_received(Box::new(|_, _| {})).unwrap_err();
        assert!(matches!(err, TransportError::AlreadyRegistered));
    }

    #[test]
    fn send_records_payloads_in_order() {
        let transport = LoopbackTransport::new();
        let link = transport.open_link();

        transport.send_bytes(link, &[1]).unwrap();
        transport.send_bytes(link, &[29, 3]).unwrap();

        let sent = transport.take_sent(link);
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].as_ref(), &[1]);
        assert_eq!(sent[1].as_ref(), &[29, 3]);
        assert!(transport.sent(link).is_empty());
    }

    #[test]
    fn closed_link_rejects_send_and_deliver() {
        let transport = LoopbackTransport::new();
        transport.on_bytes_received(Box::new(|_, _| {})).unwrap();
        let link = transport.open_link();
        transport.close_link(link).unwrap();

        assert!(matches!(
            transport.send_bytes(link, &[1]),
            Err(TransportError::Closed(_))
        ));
        assert!(matches!(
            transport.deliver(link, vec![1]),
            Err(TransportError::Closed(_))
        ));
        assert!(transport.open_links().is_empty());
    }

    #[test]
    fn unknown_link_rejected() {
        let transport = LoopbackTransport::new();
        let err = transport.send_bytes(LinkId::new(42), &[1]).unwrap_err();
        assert!(matches!(err, TransportError::UnknownLink(link) if link.get() == 42));
    }

    #[test]
    fn explicit_ids_do_not_collide_with_auto_ids() {
        let transport = LoopbackTransport::new();
        transport.open_link_with_id(LinkId::new(1));
        let auto = transport.open_link();
        assert_ne!(auto, LinkId::new(1));
        assert_eq!(transport.open_links().len(), 2);
    }
}
