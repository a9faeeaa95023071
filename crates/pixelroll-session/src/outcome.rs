use std::fmt;

use serde::Serialize;

/// Result tier of an aggregate roll total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultTier {
    Critical,
    High,
    Mid,
    Low,
    Minimal,
    Fumble,
}

impl ResultTier {
    pub fn classify(total: u32) -> Self {
        match total {
            20 => Self::Critical,
            t if t >= 15 => Self::High,
            t if t >= 10 => Self::Mid,
            t if t >= 5 => Self::Low,
            t if t > 1 => Self::Minimal,
            _ => Self::Fumble,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Mid => "mid",
            Self::Low => "low",
            Self::Minimal => "minimal",
            Self::Fumble => "fumble",
        }
    }
}

impl fmt::Display for ResultTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A resolved roll session.
///
/// `face_values[i]` was rolled by `participants[i]`, in join order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    total: u32,
    face_values: Vec<u8>,
    participants: Vec<u32>,
    tier: ResultTier,
    degraded: bool,
    low_confidence: bool,
}

impl Outcome {
    /// Build an outcome from `(device_id, face_value)` pairs in join order.
    pub fn new(
        rolls: impl IntoIterator<Item = (u32, u8)>,
        degraded: bool,
        low_confidence: bool,
    ) -> Self {
        let (participants, face_values): (Vec<u32>, Vec<u8>) = rolls.into_iter().unzip();
        let total = face_values.iter().map(|&v| u32::from(v)).sum();
        Self {
            total,
            face_values,
            participants,
            tier: ResultTier::classify(total),
            degraded,
            low_confidence,
        }
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn face_values(&self) -> &[u8] {
        &self.face_values
    }

    pub fn participants(&self) -> &[u32] {
        &self.participants
    }

    pub fn tier(&self) -> ResultTier {
        self.tier
    }

    /// Resolved by timeout rather than by every participant settling.
    pub fn degraded(&self) -> bool {
        self.degraded
    }

    /// At least one participant came to rest crooked.
    pub fn low_confidence(&self) -> bool {
        self.low_confidence
    }

    /// Largest single face value.
    pub fn highest(&self) -> Option<u8> {
        self.face_values.iter().copied().max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_thresholds() {
        assert_eq!(ResultTier::classify(20), ResultTier::Critical);
        assert_eq!(ResultTier::classify(19), ResultTier::High);
        assert_eq!(ResultTier::classify(15), ResultTier::High);
        assert_eq!(ResultTier::classify(14), ResultTier::Mid);
        assert_eq!(ResultTier::classify(10), ResultTier::Mid);
        assert_eq!(ResultTier::classify(5), ResultTier::Low);
        assert_eq!(ResultTier::classify(2), ResultTier::Minimal);
        assert_eq!(ResultTier::classify(1), ResultTier::Fumble);
        assert_eq!(ResultTier::classify(0), ResultTier::Fumble);
    }

    #[test]
    fn totals_above_twenty_are_high() {
        assert_eq!(ResultTier::classify(21), ResultTier::High);
        assert_eq!(ResultTier::classify(40), ResultTier::High);
    }

    #[test]
    fn outcome_totals_faces_in_join_order() {
        let outcome = Outcome::new([(0xA, 10), (0xB, 5)], false, false);
        assert_eq!(outcome.total(), 15);
        assert_eq!(outcome.tier(), ResultTier::High);
        assert_eq!(outcome.face_values(), &[10, 5]);
        assert_eq!(outcome.participants(), &[0xA, 0xB]);
        assert_eq!(outcome.highest(), Some(10));
    }

    #[test]
    fn empty_outcome_is_fumble() {
        let outcome = Outcome::new(Vec::<(u32, u8)>::new(), true, false);
        assert_eq!(outcome.total(), 0);
        assert_eq!(outcome.tier(), ResultTier::Fumble);
        assert_eq!(outcome.highest(), None);
    }

    #[test]
    fn outcome_serializes_tier_lowercase() {
        let outcome = Outcome::new([(1, 20)], false, true);
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["tier"], "critical");
        assert_eq!(json["total"], 20);
        assert_eq!(json["low_confidence"], true);
    }
}
