//! Acceleration and deceleration presets.
//!
//! A preset adjusts the ramp step and skip threshold chosen by the ramping engine for one
//! control cycle. New presets are new enum variants; the ramp algorithm itself never changes.

use crate::config::MOTOR_MAX_FWDSPEED;
use crate::error::{ConfigError, Result};

/// Step and skip threshold of one ramp channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RampParams {
    /// Magnitude added (or removed) per applied tick
    pub step: i16,
    /// Ticks between two applied steps
    pub skip: u8,
}

/// Speeds a preset may look at, as magnitudes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RampContext {
    pub commanded: i16,
    pub last: i16,
}

impl RampContext {
    fn jump(&self) -> i16 {
        (self.commanded - self.last).abs()
    }
}

/// Strategy interface for ramp presets.
pub trait RampPreset {
    fn apply(&self, params: RampParams, ctx: RampContext) -> RampParams;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AccelPreset {
    None,
    /// Double the step when the stick jumps by more than half scale
    LargeJumpBoost,
    /// Add a step while creeping, so the tracks break free quickly
    LowSpeedBoost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecelPreset {
    None,
    /// Double the step while above half speed
    HighSpeedBoost,
    /// Halve the ramp rate for the last tenth of the speed range
    LowSpeedGentle,
}

const HALF_SCALE: i16 = MOTOR_MAX_FWDSPEED / 2;
const LOW_SPEED: i16 = MOTOR_MAX_FWDSPEED / 10;

impl RampPreset for AccelPreset {
    fn apply(&self, params: RampParams, ctx: RampContext) -> RampParams {
        match self {
            AccelPreset::None => params,
            AccelPreset::LargeJumpBoost if ctx.jump() > HALF_SCALE => RampParams {
                step: params.step.saturating_mul(2),
                ..params
            },
            AccelPreset::LowSpeedBoost if ctx.last < LOW_SPEED => RampParams {
                step: params.step.saturating_add(1),
                ..params
            },
            _ => params,
        }
    }
}

impl RampPreset for DecelPreset {
    fn apply(&self, params: RampParams, ctx: RampContext) -> RampParams {
        match self {
            DecelPreset::None => params,
            DecelPreset::HighSpeedBoost if ctx.last > HALF_SCALE => RampParams {
                step: params.step.saturating_mul(2),
                ..params
            },
            DecelPreset::LowSpeedGentle if ctx.last < LOW_SPEED => RampParams {
                skip: params.skip.saturating_mul(2),
                ..params
            },
            _ => params,
        }
    }
}

impl TryFrom<u8> for AccelPreset {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(AccelPreset::None),
            1 => Ok(AccelPreset::LargeJumpBoost),
            2 => Ok(AccelPreset::LowSpeedBoost),
            _ => Err(ConfigError::RampPreset(value)),
        }
    }
}

impl TryFrom<u8> for DecelPreset {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(DecelPreset::None),
            1 => Ok(DecelPreset::HighSpeedBoost),
            2 => Ok(DecelPreset::LowSpeedGentle),
            _ => Err(ConfigError::RampPreset(value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: RampParams = RampParams { step: 2, skip: 4 };

    #[test]
    fn large_jump_doubles_step() {
        let ctx = RampContext { commanded: 250, last: 10 };
        assert_eq!(AccelPreset::LargeJumpBoost.apply(BASE, ctx).step, 4);

        let small = RampContext { commanded: 60, last: 10 };
        assert_eq!(AccelPreset::LargeJumpBoost.apply(BASE, small), BASE);
    }

    #[test]
    fn low_speed_boost_only_while_creeping() {
        let creeping = RampContext { commanded: 100, last: 5 };
        assert_eq!(AccelPreset::LowSpeedBoost.apply(BASE, creeping).step, 3);

        let rolling = RampContext { commanded: 200, last: 100 };
        assert_eq!(AccelPreset::LowSpeedBoost.apply(BASE, rolling), BASE);
    }

    #[test]
    fn decel_presets() {
        let fast = RampContext { commanded: 0, last: 200 };
        assert_eq!(DecelPreset::HighSpeedBoost.apply(BASE, fast).step, 4);
        assert_eq!(DecelPreset::LowSpeedGentle.apply(BASE, fast), BASE);

        let slow = RampContext { commanded: 0, last: 12 };
        assert_eq!(DecelPreset::LowSpeedGentle.apply(BASE, slow).skip, 8);
        assert_eq!(DecelPreset::None.apply(BASE, slow), BASE);
    }

    #[test]
    fn unknown_preset_id_is_an_error() {
        assert_eq!(AccelPreset::try_from(3), Err(ConfigError::RampPreset(3)));
        assert_eq!(DecelPreset::try_from(2), Ok(DecelPreset::LowSpeedGentle));
    }
}
