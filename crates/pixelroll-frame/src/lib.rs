//! Fixed-layout binary codec for Pixel dice.
//!
//! Every frame exchanged with a die starts with a 1-byte message type and
//! carries a fixed little-endian layout:
//! - inbound: identity (`IAmADie`), roll state, battery level, blink ack
//! - outbound: `WhoAreYou`, roll-state / battery requests, blink
//!
//! BLE notifications are already message-aligned, so there is no length
//! prefix and no stream reassembly: one notification is one frame.

pub mod codec;
pub mod command;
pub mod error;
pub mod message;
pub mod tags;
pub mod writer;

pub use codec::{
    decode_frame, BatteryFrame, IdentityFrame, InboundFrame, RollStateFrame, BATTERY_LEN,
    BLINK_ACK_LEN, IDENTITY_LEN, ROLL_STATE_LEN,
};
pub use command::{encode_command, BlinkCommand, BlinkParams, OutboundCommand, Rgba, BLINK_LEN};
pub use error::{FrameError, MalformedFrame, Result};
pub use tags::{BatteryTag, RollTag};
pub use writer::CommandWriter;
