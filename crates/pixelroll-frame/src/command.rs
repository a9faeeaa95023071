use std::time::Duration;

use bytes::{BufMut, BytesMut};

use crate::error::{FrameError, Result};
use crate::message;

/// Blink command size.
pub const BLINK_LEN: usize = 14;

/// Face mask selecting every face of a d20.
pub const ALL_FACES: u32 = 0x000F_FFFF;

/// An RGBA color.
///
/// Field order is the conventional R,G,B,A; the blink wire layout stores the
/// channels as B,G,R,A.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque color.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 0xFF)
    }
}

/// Blink request, already validated against the wire widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlinkCommand {
    pub count: u8,
    pub duration_ms: u16,
    pub color: Rgba,
    pub face_mask: u32,
    pub fade: u8,
    pub loop_count: u8,
}

/// Unvalidated blink inputs, as they come from configuration or a CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlinkParams {
    pub count: u32,
    pub duration: Duration,
    pub color: Rgba,
    pub face_mask: u32,
    pub fade: u32,
    pub loop_count: u32,
}

impl Default for BlinkParams {
    fn default() -> Self {
        Self {
            count: 3,
            duration: Duration::from_millis(1000),
            color: Rgba::rgb(0xFF, 0x00, 0xFF),
            face_mask: ALL_FACES,
            fade: 128,
            loop_count: 0,
        }
    }
}

impl TryFrom<BlinkParams> for BlinkCommand {
    type Error = FrameError;

    /// Out-of-range values are rejected, never clamped.
    fn try_from(params: BlinkParams) -> Result<Self> {
        let duration_ms = u64::try_from(params.duration.as_millis()).unwrap_or(u64::MAX);
        Ok(Self {
            count: narrow_u8("count", u64::from(params.count))?,
            duration_ms: narrow_u16("duration_ms", duration_ms)?,
            color: params.color,
            face_mask: params.face_mask,
            fade: narrow_u8("fade", u64::from(params.fade))?,
            loop_count: narrow_u8("loop_count", u64::from(params.loop_count))?,
        })
    }
}

fn narrow_u8(field: &'static str, value: u64) -> Result<u8> {
    u8::try_from(value).map_err(|_| FrameError::InvalidCommandField {
        field,
        value,
        max: u64::from(u8::MAX),
    })
}

fn narrow_u16(field: &'static str, value: u64) -> Result<u16> {
    u16::try_from(value).map_err(|_| FrameError::InvalidCommandField {
        field,
        value,
        max: u64::from(u16::MAX),
    })
}

/// A command sent to a die.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboundCommand {
    WhoAreYou,
    RequestRollState,
    RequestBatteryLevel,
    Blink(BlinkCommand),
}

impl OutboundCommand {
    /// Message type id of this command.
    pub fn message_type(&self) -> u8 {
        match self {
            Self::WhoAreYou => message::WHO_ARE_YOU,
            Self::RequestRollState => message::REQUEST_ROLL_STATE,
            Self::RequestBatteryLevel => message::REQUEST_BATTERY_LEVEL,
            Self::Blink(_) => message::BLINK,
        }
    }

    /// The encoded size of this command.
    pub fn wire_size(&self) -> usize {
        match self {
            Self::Blink(_) => BLINK_LEN,
            _ => 1,
        }
    }
}

/// Encode a command into the wire format.
///
/// Request commands are a single type byte. Blink layout:
/// ```text
/// ┌─────┬───────┬──────────┬───┬───┬───┬───┬───────────┬──────┬──────┐
/// │ tag │ count │ duration │ B │ G │ R │ A │ face mask │ fade │ loop │
/// │ 1B  │ 1B    │ 2B LE    │1B │1B │1B │1B │ 4B LE     │ 1B   │ 1B   │
/// └─────┴───────┴──────────┴───┴───┴───┴───┴───────────┴──────┴──────┘
/// ```
pub fn encode_command(command: &OutboundCommand, dst: &mut BytesMut) {
    dst.reserve(command.wire_size());
    dst.put_u8(command.message_type());

    if let OutboundCommand::Blink(blink) = command {
        dst.put_u8(blink.count);
        dst.put_u16_le(blink.duration_ms);
        dst.put_u8(blink.color.b);
        dst.put_u8(blink.color.g);
        dst.put_u8(blink.color.r);
        dst.put_u8(blink.color.a);
        dst.put_u32_le(blink.face_mask);
        dst.put_u8(blink.fade);
        dst.put_u8(blink.loop_count);
    }
}
