use bytes::{Buf, BufMut, BytesMut};

use crate::error::{MalformedFrame, Result};
use crate::message::{self, message_name};
use crate::tags::{BatteryTag, RollTag};

/// Identity frame size: tag (1) + descriptors (3) + hash (4) + id (4) +
/// flash (2) + build (4) + roll state (2) + battery (2) = 22 bytes.
pub const IDENTITY_LEN: usize = 22;

/// Roll state frame size: tag + roll tag + face index.
pub const ROLL_STATE_LEN: usize = 3;

/// Battery frame size: tag + level + battery tag.
pub const BATTERY_LEN: usize = 3;

/// Blink ack frame size: tag only.
pub const BLINK_ACK_LEN: usize = 1;

/// Answer to `WhoAreYou`: static descriptors plus the current dynamic state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityFrame {
    pub led_count: u8,
    pub design_code: u8,
    pub reserved: u8,
    pub dataset_hash: u32,
    pub device_id: u32,
    pub available_flash: u16,
    pub build_timestamp: u32,
    pub roll_tag: RollTag,
    pub face_index: u8,
    pub battery_level: u8,
    pub battery_tag: BatteryTag,
}

impl IdentityFrame {
    /// One-based face value. Derived, never transmitted.
    pub fn face_value(&self) -> u8 {
        self.face_index.wrapping_add(1)
    }

    /// Encode the frame in its wire layout.
    ///
    /// Dice never receive identity frames; this exists so recorded traces
    /// and tests can be produced from typed values.
    ///
    /// Wire format:
    /// ```text
    /// ┌─────┬─────┬────────┬─────┬──────────┬──────────┬───────┬──────────┬──────┬──────┬──────┬──────┐
    /// │ tag │ led │ design │ rsv │ dataset  │ deviceId │ flash │ build ts │ roll │ face │ batt │ batt │
    /// │ 1B  │ 1B  │ 1B     │ 1B  │ 4B LE    │ 4B LE    │ 2B LE │ 4B LE    │ 1B   │ 1B   │ lvl  │ tag  │
    /// └─────┴─────┴────────┴─────┴──────────┴──────────┴───────┴──────────┴──────┴──────┴──────┴──────┘
    /// ```
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(IDENTITY_LEN);
        dst.put_u8(message::I_AM_A_DIE);
        dst.put_u8(self.led_count);
        dst.put_u8(self.design_code);
        dst.put_u8(self.reserved);
        dst.put_u32_le(self.dataset_hash);
        dst.put_u32_le(self.device_id);
        dst.put_u16_le(self.available_flash);
        dst.put_u32_le(self.build_timestamp);
        dst.put_u8(self.roll_tag.as_wire());
        dst.put_u8(self.face_index);
        dst.put_u8(self.battery_level);
        dst.put_u8(self.battery_tag.as_wire());
    }
}

/// Roll state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollStateFrame {
    pub roll_tag: RollTag,
    pub face_index: u8,
}

impl RollStateFrame {
    /// One-based face value. Derived, never transmitted.
    pub fn face_value(&self) -> u8 {
        self.face_index.wrapping_add(1)
    }

    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(ROLL_STATE_LEN);
        dst.put_u8(message::ROLL_STATE);
        dst.put_u8(self.roll_tag.as_wire());
        dst.put_u8(self.face_index);
    }
}

/// Battery level notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatteryFrame {
    pub battery_level: u8,
    pub battery_tag: BatteryTag,
}

impl BatteryFrame {
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(BATTERY_LEN);
        dst.put_u8(message::BATTERY_LEVEL);
        dst.put_u8(self.battery_level);
        dst.put_u8(self.battery_tag.as_wire());
    }
}

/// A decoded frame received from a die.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundFrame {
    Identity(IdentityFrame),
    RollState(RollStateFrame),
    Battery(BatteryFrame),
    BlinkAck,
}

impl InboundFrame {
    /// Message type id of this frame.
    pub fn message_type(&self) -> u8 {
        match self {
            Self::Identity(_) => message::I_AM_A_DIE,
            Self::RollState(_) => message::ROLL_STATE,
            Self::Battery(_) => message::BATTERY_LEVEL,
            Self::BlinkAck => message::BLINK_ACK,
        }
    }

    pub fn name(&self) -> &'static str {
        message_name(self.message_type())
    }
}

/// Decode one inbound frame.
///
/// Bytes past the fixed layout are ignored; newer firmware appends fields.
pub fn decode_frame(src: &[u8]) -> Result<InboundFrame> {
    let Some(&tag) = src.first() else {
        return Err(MalformedFrame::Empty.into());
    };

    match tag {
        message::I_AM_A_DIE => {
            ensure_len(tag, src, IDENTITY_LEN)?;
            let mut buf = &src[1..IDENTITY_LEN];
            Ok(InboundFrame::Identity(IdentityFrame {
                led_count: buf.get_u8(),
                design_code: buf.get_u8(),
                reserved: buf.get_u8(),
                dataset_hash: buf.get_u32_le(),
                device_id: buf.get_u32_le(),
                available_flash: buf.get_u16_le(),
                build_timestamp: buf.get_u32_le(),
                roll_tag: RollTag::from_wire(buf.get_u8()),
                face_index: buf.get_u8(),
                battery_level: buf.get_u8(),
                battery_tag: BatteryTag::from_wire(buf.get_u8()),
            }))
        }
        message::ROLL_STATE => {
            ensure_len(tag, src, ROLL_STATE_LEN)?;
            Ok(InboundFrame::RollState(RollStateFrame {
                roll_tag: RollTag::from_wire(src[1]),
                face_index: src[2],
            }))
        }
        message::BATTERY_LEVEL => {
            ensure_len(tag, src, BATTERY_LEN)?;
            Ok(InboundFrame::Battery(BatteryFrame {
                battery_level: src[1],
                battery_tag: BatteryTag::from_wire(src[2]),
            }))
        }
        message::BLINK_ACK => Ok(InboundFrame::BlinkAck),
        other => Err(MalformedFrame::UnknownMessageType(other).into()),
    }
}

fn ensure_len(tag: u8, src: &[u8], min: usize) -> Result<()> {
    if src.len() < min {
        return Err(MalformedFrame::TooShort {
            message: message_name(tag),
            len: src.len(),
            min,
        }
        .into());
    }
    Ok(())
}
