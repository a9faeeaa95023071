//! Message type ids.
//!
//! Byte 0 of every frame. Ids not listed here exist in the die firmware but
//! are not spoken by this crate.

/// Outbound: ask the die to identify itself.
pub const WHO_ARE_YOU: u8 = 1;

/// Inbound: identity answer to `WHO_ARE_YOU`.
pub const I_AM_A_DIE: u8 = 2;

/// Inbound: roll state change notification.
pub const ROLL_STATE: u8 = 3;

/// Outbound: ask for the current roll state.
pub const REQUEST_ROLL_STATE: u8 = 23;

/// Outbound: blink the die LEDs.
pub const BLINK: u8 = 29;

/// Inbound: blink acknowledgement.
pub const BLINK_ACK: u8 = 30;

/// Outbound: ask for the battery level.
pub const REQUEST_BATTERY_LEVEL: u8 = 33;

/// Inbound: battery level notification.
pub const BATTERY_LEVEL: u8 = 34;

/// Returns a human-readable name for a message type id.
pub fn message_name(id: u8) -> &'static str {
    match id {
        WHO_ARE_YOU => "WhoAreYou",
        I_AM_A_DIE => "IAmADie",
        ROLL_STATE => "RollState",
        REQUEST_ROLL_STATE => "RequestRollState",
        BLINK => "Blink",
        BLINK_ACK => "BlinkAck",
        REQUEST_BATTERY_LEVEL => "RequestBatteryLevel",
        BATTERY_LEVEL => "BatteryLevel",
        _ => "Unknown",
    }
}

/// Returns true if the id names a frame a die sends to us.
pub fn is_inbound(id: u8) -> bool {
    matches!(id, I_AM_A_DIE | ROLL_STATE | BLINK_ACK | BATTERY_LEVEL)
}
