//! Steering mixer.
//!
//! Combines a drive speed and a turn command into left and right track speeds. A positive turn
//! is a right turn, so the left track is the outer one.

use crate::config::MOTOR_MAX_FWDSPEED;
use crate::error::{ConfigError, Result};

/// Selectable mixing algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TurnMode {
    /// Slow the inner track in proportion to speed
    Proportional,
    /// Add throttle with turn before slowing the inner track, so turns do not decelerate
    Boosted,
    /// Speed up the outer track and slow the inner by half the turn each
    Split,
}

impl TryFrom<u8> for TurnMode {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(TurnMode::Proportional),
            2 => Ok(TurnMode::Boosted),
            3 => Ok(TurnMode::Split),
            _ => Err(ConfigError::TurnMode(value)),
        }
    }
}

/// Mixes `drive_speed` and `turn` into `(left, right)` track speeds.
///
/// With no drive speed a turn command becomes a neutral turn, if allowed. In reverse both
/// outputs are negated together.
pub fn mix(drive_speed: i16, turn: i16, mode: TurnMode, neutral_turn_allowed: bool) -> (i16, i16) {
    let turn = turn.clamp(-MOTOR_MAX_FWDSPEED, MOTOR_MAX_FWDSPEED);

    if drive_speed == 0 {
        return if turn != 0 && neutral_turn_allowed {
            (turn, -turn)
        } else {
            (0, 0)
        };
    }

    let speed = drive_speed.saturating_abs().min(MOTOR_MAX_FWDSPEED);
    let amount = turn.abs();

    let (outer, inner) = match mode {
        TurnMode::Proportional => {
            let scaled = scale(amount, speed);
            (speed, (speed - scaled).max(0))
        }
        TurnMode::Boosted => {
            let boosted = (speed + scale(amount, speed)).min(MOTOR_MAX_FWDSPEED);
            let scaled = scale(amount, boosted);
            (boosted, (boosted - scaled).max(0))
        }
        TurnMode::Split => {
            let half = scale(amount, speed) / 2;
            (
                (speed + half).clamp(0, MOTOR_MAX_FWDSPEED),
                (speed - half).clamp(0, MOTOR_MAX_FWDSPEED),
            )
        }
    };

    let (left, right) = if turn >= 0 {
        (outer, inner)
    } else {
        (inner, outer)
    };

    if drive_speed < 0 {
        (-left, -right)
    } else {
        (left, right)
    }
}

/// Full-scale `amount` scaled to `speed`.
fn scale(amount: i16, speed: i16) -> i16 {
    (amount as i32 * speed as i32 / MOTOR_MAX_FWDSPEED as i32) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn straight_ahead_is_equal() {
        for mode in [TurnMode::Proportional, TurnMode::Boosted, TurnMode::Split] {
            assert_eq!(mix(150, 0, mode, true), (150, 150));
            assert_eq!(mix(-150, 0, mode, true), (-150, -150));
        }
        assert_eq!(mix(0, 0, TurnMode::Proportional, true), (0, 0));
    }

    #[test]
    fn proportional_slows_inner_track() {
        assert_eq!(mix(200, 128, TurnMode::Proportional, false), (200, 100));
        assert_eq!(mix(200, 255, TurnMode::Proportional, false), (200, 0));
    }

    #[test]
    fn proportional_is_symmetric() {
        for turn in [10, 77, 128, 255] {
            let (l, r) = mix(180, turn, TurnMode::Proportional, false);
            assert_eq!(mix(180, -turn, TurnMode::Proportional, false), (r, l));
        }
    }

    #[test]
    fn boosted_adds_throttle_first() {
        assert_eq!(mix(100, 128, TurnMode::Boosted, false), (150, 75));
        assert_eq!(mix(250, 255, TurnMode::Boosted, false), (255, 0));
    }

    #[test]
    fn split_spreads_turn_over_both_tracks() {
        assert_eq!(mix(100, 255, TurnMode::Split, false), (150, 50));
        assert_eq!(mix(200, -255, TurnMode::Split, false), (100, 255));
    }

    #[test]
    fn reverse_flips_both_sides() {
        assert_eq!(mix(-200, 128, TurnMode::Proportional, false), (-200, -100));
    }

    #[test]
    fn neutral_turn_only_when_allowed() {
        assert_eq!(mix(0, 80, TurnMode::Proportional, true), (80, -80));
        assert_eq!(mix(0, -80, TurnMode::Split, true), (-80, 80));
        assert_eq!(mix(0, 80, TurnMode::Proportional, false), (0, 0));
    }

    #[test]
    fn turn_mode_from_persisted_byte() {
        assert_eq!(TurnMode::try_from(2), Ok(TurnMode::Boosted));
        assert_eq!(TurnMode::try_from(0), Err(ConfigError::TurnMode(0)));
    }
}
