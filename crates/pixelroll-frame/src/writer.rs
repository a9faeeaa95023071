use bytes::BytesMut;
use pixelroll_transport::{DieTransport, LinkId};
use tracing::debug;

use crate::command::{encode_command, OutboundCommand};
use crate::error::Result;
use crate::message::message_name;

const INITIAL_BUFFER_CAPACITY: usize = 32;

/// Encodes commands and writes them to die links.
///
/// The encode buffer is reused across sends.
pub struct CommandWriter<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: DieTransport> CommandWriter<T> {
    /// Create a new command writer over a transport.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Encode and send a command to the die behind `link` (blocking).
    pub fn send(&mut self, link: LinkId, command: &OutboundCommand) -> Result<()> {
        self.buf.clear();
        encode_command(command, &mut self.buf);

        debug!(
            %link,
            message = message_name(command.message_type()),
            size = self.buf.len(),
            "sending command"
        );
        self.inner.send_bytes(link, &self.buf)?;
        Ok(())
    }

    /// Ask the die to identify itself.
    pub fn who_are_you(&mut self, link: LinkId) -> Result<()> {
        self.send(link, &OutboundCommand::WhoAreYou)
    }

    /// Borrow the underlying transport.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the writer and return the inner transport.
    pub fn into_inner(self) -> T {
        self.inner
    }
}
