//! Per-die roll detection.
//!
//! A roll is detected from tag transitions between consecutive records of the
//! same die, never from individual frames: a die reports `Rolling` many times
//! while tumbling but starts and settles exactly once.

use pixelroll_frame::RollTag;

use crate::store::DieState;

/// How far a settled face reading can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    Confident,
    /// The die came to rest crooked.
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollTransition {
    None,
    /// The die went from rest into motion.
    Started,
    /// The die came to rest after moving.
    Settled { confidence: Confidence },
}

/// Compare a die's previous and current record.
///
/// A newly discovered die (no previous record) never transitions.
pub fn classify(previous: Option<&DieState>, current: &DieState) -> RollTransition {
    let Some(previous) = previous else {
        return RollTransition::None;
    };

    let was = previous.roll_tag;
    let now = current.roll_tag;

    // Picking a die up is not a roll; throwing it from the hand is.
    let was_still = was.is_settled() || was == RollTag::Handling;

    if was_still && now.is_in_motion() {
        RollTransition::Started
    } else if was.is_in_motion() && now.is_settled() {
        let confidence = if now.is_low_confidence() {
            Confidence::Low
        } else {
            Confidence::Confident
        };
        RollTransition::Settled { confidence }
    } else {
        RollTransition::None
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use pixelroll_frame::{BatteryTag, RollTag};
    use pixelroll_transport::LinkId;

    use super::*;

    fn die(roll_tag: RollTag) -> DieState {
        DieState {
            device_id: 1,
            link: LinkId::new(1),
            led_count: 20,
            design_code: 0,
            build_timestamp: 0,
            dataset_hash: 0,
            available_flash: 0,
            roll_tag,
            face_index: 0,
            battery_level: 100,
            battery_tag: BatteryTag::Ok,
            last_updated: Instant::now(),
            last_settled_at: None,
        }
    }

    #[test]
    fn one_start_and_one_settle_per_roll() {
        let sequence = [
            RollTag::OnFace,
            RollTag::Rolling,
            RollTag::Rolling,
            RollTag::Rolling,
            RollTag::Rolling,
            RollTag::Rolled,
        ];

        let mut starts = 0;
        let mut settles = 0;
        for pair in sequence.windows(2) {
            match classify(Some(&die(pair[0])), &die(pair[1])) {
                RollTransition::Started => starts += 1,
                RollTransition::Settled { .. } => settles += 1,
                RollTransition::None => {}
            }
        }
        assert_eq!(starts, 1);
        assert_eq!(settles, 1);
    }

    #[test]
    fn handling_alone_is_not_a_roll() {
        assert_eq!(
            classify(Some(&die(RollTag::OnFace)), &die(RollTag::Handling)),
            RollTransition::None
        );
        assert_eq!(
            classify(Some(&die(RollTag::Handling)), &die(RollTag::OnFace)),
            RollTransition::None
        );
    }

    #[test]
    fn throw_from_hand_starts_a_roll() {
        assert_eq!(
            classify(Some(&die(RollTag::Handling)), &die(RollTag::Rolling)),
            RollTransition::Started
        );
        assert_eq!(
            classify(Some(&die(RollTag::Rolling)), &die(RollTag::Handling)),
            RollTransition::None
        );
    }

    #[test]
    fn crooked_settle_is_low_confidence() {
        assert_eq!(
            classify(Some(&die(RollTag::Rolling)), &die(RollTag::Crooked)),
            RollTransition::Settled {
                confidence: Confidence::Low
            }
        );
        assert_eq!(
            classify(Some(&die(RollTag::Rolling)), &die(RollTag::Rolled)),
            RollTransition::Settled {
                confidence: Confidence::Confident
            }
        );
    }

    #[test]
    fn first_record_and_unknown_tags_do_not_transition() {
        assert_eq!(
            classify(None, &die(RollTag::Rolling)),
            RollTransition::None
        );
        assert_eq!(
            classify(Some(&die(RollTag::Unknown)), &die(RollTag::Rolling)),
            RollTransition::None
        );
        assert_eq!(
            classify(Some(&die(RollTag::Rolling)), &die(RollTag::Unknown)),
            RollTransition::None
        );
    }
}
