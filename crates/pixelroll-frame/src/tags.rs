//! Firmware-reported roll and battery classifications.

use std::fmt;

/// Motion classification of a die at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RollTag {
    Unknown,
    /// Came to rest after a roll.
    Rolled,
    /// Picked up or shaken in hand.
    Handling,
    /// Tumbling.
    Rolling,
    /// Came to rest on an edge; the face reading is unreliable.
    Crooked,
    /// Resting on a face without having been rolled.
    OnFace,
}

impl RollTag {
    /// Decode a wire value. Unrecognized values map to `Unknown`.
    pub fn from_wire(value: u8) -> Self {
        match value {
            1 => Self::Rolled,
            2 => Self::Handling,
            3 => Self::Rolling,
            4 => Self::Crooked,
            5 => Self::OnFace,
            _ => Self::Unknown,
        }
    }

    pub fn as_wire(self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::Rolled => 1,
            Self::Handling => 2,
            Self::Rolling => 3,
            Self::Crooked => 4,
            Self::OnFace => 5,
        }
    }

    /// The die is tumbling. Being held in hand is not motion.
    pub fn is_in_motion(self) -> bool {
        matches!(self, Self::Rolling)
    }

    /// The die is at rest, including a crooked rest.
    pub fn is_settled(self) -> bool {
        matches!(self, Self::Rolled | Self::OnFace | Self::Crooked)
    }

    /// The die is at rest but the face reading should not be trusted.
    pub fn is_low_confidence(self) -> bool {
        matches!(self, Self::Crooked)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Rolled => "rolled",
            Self::Handling => "handling",
            Self::Rolling => "rolling",
            Self::Crooked => "crooked",
            Self::OnFace => "on_face",
        }
    }
}

impl fmt::Display for RollTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Battery / charger state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatteryTag {
    Ok,
    Low,
    Charging,
    Done,
    BadCharging,
    Error,
}

impl BatteryTag {
    /// Decode a wire value. Unrecognized values map to `Error`.
    pub fn from_wire(value: u8) -> Self {
        match value {
            0 => Self::Ok,
            1 => Self::Low,
            2 => Self::Charging,
            3 => Self::Done,
            4 => Self::BadCharging,
            _ => Self::Error,
        }
    }

    pub fn as_wire(self) -> u8 {
        match self {
            Self::Ok => 0,
            Self::Low => 1,
            Self::Charging => 2,
            Self::Done => 3,
            Self::BadCharging => 4,
            Self::Error => 5,
        }
    }

    pub fn is_charging(self) -> bool {
        matches!(self, Self::Charging)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Low => "low",
            Self::Charging => "charging",
            Self::Done => "done",
            Self::BadCharging => "bad_charging",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for BatteryTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
