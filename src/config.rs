//! Configuration constants and persisted settings.
//!
//! All timing values live here so they are easy to find and tune. Settings structs are plain
//! `Copy` data; the firmware fills them from its persisted configuration at boot and hands them
//! to the drive and battle subsystems.

use embedded_time::duration::Milliseconds;
use embedded_time::rate::Hertz;

use crate::battle::ir::IrProtocol;
use crate::drive::preset::{AccelPreset, DecelPreset};
use crate::error::{ConfigError, Result};

// Motor speed range
/// Full forward speed
pub const MOTOR_MAX_FWDSPEED: i16 = 255;
/// Full reverse speed
pub const MOTOR_MAX_REVSPEED: i16 = -255;

// Ramping
/// Frequency of the periodic ramp interrupt
pub const RAMP_TICK_RATE: Hertz = Hertz(256);
/// Distance below full speed at which an opposing stick forces an immediate stop
pub const FULL_STOP_NEAR_LIMIT: i16 = 25;
/// Base step for acceleration ramps
pub const DEFAULT_ACCEL_STEP: i16 = 1;
/// Base step for deceleration ramps
pub const DEFAULT_DECEL_STEP: i16 = 1;
/// Base step for brake ramps, before the stick deflection is added
pub const DEFAULT_BRAKE_STEP: i16 = 1;

// Throttle (engine speed) ramping
/// Jumps in engine speed smaller than this pass straight through
pub const THROTTLE_JERK_THRESHOLD: i16 = 64;
/// Step used to smooth large engine speed jumps
pub const THROTTLE_ACCEL_STEP: i16 = 4;
/// Skip threshold used to smooth large engine speed jumps
pub const THROTTLE_ACCEL_SKIP: u8 = 1;
/// Engine speed decay step above half speed
pub const THROTTLE_DECEL_FAST_STEP: i16 = 2;
/// Engine speed decay step at or below half speed
pub const THROTTLE_DECEL_SLOW_STEP: i16 = 1;
/// Skip threshold for engine speed decay
pub const THROTTLE_DECEL_SKIP: u8 = 2;

// Track recoil
/// Default reverse kick as a percentage of full speed
pub const TRACK_RECOIL_KICKBACK_PERCENT: u8 = 40;
/// Default length of the simple track recoil kick
pub const TRACK_RECOIL_DURATION: Milliseconds<u32> = Milliseconds(200);
/// Ticks between two decay samples in legacy track recoil (1/32 s at 256 Hz)
pub const TRACK_RECOIL_SAMPLE_TICKS: i16 = 8;
/// Legacy track recoil never runs longer than this
pub const TRACK_RECOIL_LEGACY_MAX: Milliseconds<u32> = Milliseconds(4000);
/// Legacy track recoil ends once speed decays below this percentage of full scale
pub const TRACK_RECOIL_LEGACY_FLOOR_PERCENT: u8 = 12;
/// Allowed range of the legacy decay factor
pub const TRACK_RECOIL_FACTOR_MIN: f32 = 0.65;
pub const TRACK_RECOIL_FACTOR_MAX: f32 = 0.98;

// Cannon and machine gun
/// Recoil motor is force-stopped if the limit switch is not seen within this time
pub const RECOIL_WATCHDOG: Milliseconds<u32> = Milliseconds(5000);
/// Airsoft motor keeps running this long after the release edge so the shot clears the barrel
pub const AIRSOFT_STOP_DELAY: Milliseconds<u32> = Milliseconds(100);
/// Muzzle and aux flash on-time
pub const MUZZLE_FLASH: Milliseconds<u32> = Milliseconds(40);
/// Machine gun light toggle interval
pub const MG_BLINK_INTERVAL: Milliseconds<u32> = Milliseconds(50);
/// Machine gun IR repeat interval
pub const MG_IR_REPEAT: Milliseconds<u32> = Milliseconds(200);
/// Reload-complete blink on time, off time and count
pub const RELOAD_BLINK_ON: Milliseconds<u32> = Milliseconds(100);
pub const RELOAD_BLINK_OFF: Milliseconds<u32> = Milliseconds(100);
pub const RELOAD_BLINK_COUNT: u8 = 2;

// Damage
/// Window after a cannon hit in which repeats of the same transmission are ignored
pub const HIT_FILTER: Milliseconds<u32> = Milliseconds(1000);
/// Time a destroyed tank stays inoperative before it recovers
pub const DESTROYED_INOPERATIVE: Milliseconds<u32> = Milliseconds(15000);
/// Length of an uninterrupted repair
pub const REPAIR_DURATION: Milliseconds<u32> = Milliseconds(15000);
/// Damage added by a 2-shot kill code
pub const TWO_SHOT_DAMAGE: f32 = 50.0;
/// Damage within this distance of 0 or 100 snaps to the bound
pub const DAMAGE_EPSILON: f32 = 0.01;
/// Destroyed effect blink on time, off time and count
pub const DESTROYED_BLINK_ON: Milliseconds<u32> = Milliseconds(250);
pub const DESTROYED_BLINK_OFF: Milliseconds<u32> = Milliseconds(250);
pub const DESTROYED_BLINK_COUNT: u8 = 10;
/// Fade span used for the hit and repair light effects
pub const DAMAGE_FADE_SPAN: Milliseconds<u32> = Milliseconds(800);

/// Named bundle of combat timing and durability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WeightClass {
    Custom,
    Light,
    Medium,
    Heavy,
}

impl TryFrom<u8> for WeightClass {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(WeightClass::Custom),
            1 => Ok(WeightClass::Light),
            2 => Ok(WeightClass::Medium),
            3 => Ok(WeightClass::Heavy),
            _ => Err(ConfigError::WeightClass(value)),
        }
    }
}

/// Timing and durability values of a weight class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightClassSettings {
    pub reload_time: Milliseconds<u32>,
    pub recovery_time: Milliseconds<u32>,
    pub max_hits: u8,
    pub max_mg_hits: u8,
}

impl WeightClass {
    /// Table values for the class, or `None` for [`WeightClass::Custom`].
    pub fn table(self) -> Option<WeightClassSettings> {
        let (reload, recovery, hits, mg_hits) = match self {
            WeightClass::Custom => return None,
            WeightClass::Light => (3000, 10000, 4, 20),
            WeightClass::Medium => (5000, 12000, 6, 25),
            WeightClass::Heavy => (9000, 15000, 9, 30),
        };
        Some(WeightClassSettings {
            reload_time: Milliseconds(reload),
            recovery_time: Milliseconds(recovery),
            max_hits: hits,
            max_mg_hits: mg_hits,
        })
    }
}

/// How motor output is cut as damage accumulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DamageProfile {
    /// 50 % cut once damaged, 75 % past half damage, immobilized when destroyed
    Tamiya,
    /// Cut follows the damage percentage
    Linear,
}

impl TryFrom<u8> for DamageProfile {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(DamageProfile::Tamiya),
            1 => Ok(DamageProfile::Linear),
            _ => Err(ConfigError::DamageProfile(value)),
        }
    }
}

/// Battle configuration loaded once at boot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BattleSettings {
    pub weight_class: WeightClass,
    pub class_settings: WeightClassSettings,
    /// Protocol we fire with, also the first protocol we accept cannon hits on
    pub fire_protocol: Option<IrProtocol>,
    /// Second protocol we accept cannon hits on
    pub hit_protocol_2: Option<IrProtocol>,
    pub repair_protocol: Option<IrProtocol>,
    pub mg_protocol: Option<IrProtocol>,
    pub team: u8,
    pub accept_mg_damage: bool,
    pub damage_profile: DamageProfile,
    pub send_tank_id: bool,
    pub tank_id: u8,
    /// Repair vehicles fire repair codes instead of cannon shots
    pub repair_tank: bool,
}

impl BattleSettings {
    /// Builds settings for a weight class. `custom` is only used for [`WeightClass::Custom`],
    /// every other class takes its values from the class table.
    pub fn new(weight_class: WeightClass, custom: WeightClassSettings) -> Self {
        BattleSettings {
            weight_class,
            class_settings: weight_class.table().unwrap_or(custom),
            fire_protocol: Some(IrProtocol::Tamiya),
            hit_protocol_2: None,
            repair_protocol: None,
            mg_protocol: None,
            team: 0,
            accept_mg_damage: false,
            damage_profile: DamageProfile::Tamiya,
            send_tank_id: false,
            tank_id: 0,
            repair_tank: false,
        }
    }

    /// Checks values the core cannot clamp on its own.
    pub fn validate(&self) -> Result<()> {
        if self.class_settings.max_hits == 0 {
            return Err(ConfigError::ZeroHits { kind: "cannon" });
        }
        if self.accept_mg_damage && self.class_settings.max_mg_hits == 0 {
            return Err(ConfigError::ZeroHits { kind: "machine gun" });
        }
        if self.team > IrProtocol::MAX_TEAM {
            return Err(ConfigError::Team(self.team));
        }
        Ok(())
    }

    /// Damage added by one cannon hit.
    pub fn cannon_hit_damage(&self) -> f32 {
        100.0 / self.class_settings.max_hits.max(1) as f32
    }

    /// Damage added by one machine gun hit.
    pub fn mg_hit_damage(&self) -> f32 {
        100.0 / self.class_settings.max_mg_hits.max(1) as f32
    }

    /// Hit reception is only possible with at least one cannon protocol.
    pub fn ir_enabled(&self) -> bool {
        self.fire_protocol.is_some() || self.hit_protocol_2.is_some()
    }
}

impl Default for BattleSettings {
    fn default() -> Self {
        let medium = WeightClass::Medium.table();
        BattleSettings::new(
            WeightClass::Medium,
            medium.unwrap_or(WeightClassSettings {
                reload_time: Milliseconds(5000),
                recovery_time: Milliseconds(12000),
                max_hits: 6,
                max_mg_hits: 25,
            }),
        )
    }
}

/// Mechanism attached to the cannon barrel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Barrel {
    None,
    /// Airsoft unit; the limit switch falls when the shot releases
    Airsoft,
    /// Mechanical recoil unit; the limit switch rises when the barrel returns
    MechanicalRecoil,
}

impl TryFrom<u8> for Barrel {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Barrel::None),
            1 => Ok(Barrel::Airsoft),
            2 => Ok(Barrel::MechanicalRecoil),
            _ => Err(ConfigError::Barrel(value)),
        }
    }
}

/// Cannon effect configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CannonSettings {
    pub barrel: Barrel,
    pub recoil_servo: bool,
    /// Delay between starting a mechanical recoil unit and the sound/flash batch
    pub recoil_delay: Milliseconds<u32>,
    pub aux_flash: bool,
    pub reload_blink: bool,
    /// Request a track recoil kick each time the cannon effects run
    pub track_recoil: bool,
}

impl Default for CannonSettings {
    fn default() -> Self {
        CannonSettings {
            barrel: Barrel::None,
            recoil_servo: true,
            recoil_delay: Milliseconds(0),
            aux_flash: false,
            reload_blink: false,
            track_recoil: false,
        }
    }
}

/// One user-selectable acceleration/deceleration profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriveProfile {
    pub accel_enabled: bool,
    pub decel_enabled: bool,
    pub accel_preset: AccelPreset,
    pub decel_preset: DecelPreset,
    pub accel_skip: u8,
    pub decel_skip: u8,
}

impl DriveProfile {
    /// Builds a profile from persisted preset ids.
    pub fn from_raw(
        accel_enabled: bool,
        decel_enabled: bool,
        accel_preset: u8,
        decel_preset: u8,
        accel_skip: u8,
        decel_skip: u8,
    ) -> Result<Self> {
        Ok(DriveProfile {
            accel_enabled,
            decel_enabled,
            accel_preset: AccelPreset::try_from(accel_preset)?,
            decel_preset: DecelPreset::try_from(decel_preset)?,
            accel_skip,
            decel_skip,
        })
    }
}

impl Default for DriveProfile {
    fn default() -> Self {
        DriveProfile {
            accel_enabled: true,
            decel_enabled: true,
            accel_preset: AccelPreset::None,
            decel_preset: DecelPreset::None,
            accel_skip: 4,
            decel_skip: 2,
        }
    }
}

/// The two persisted drive profiles and which one is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriveProfiles {
    profiles: [DriveProfile; 2],
    active: usize,
}

impl DriveProfiles {
    pub fn new(first: DriveProfile, second: DriveProfile) -> Self {
        DriveProfiles {
            profiles: [first, second],
            active: 0,
        }
    }

    pub fn active(&self) -> DriveProfile {
        self.profiles[self.active]
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    /// Swaps to the other profile and returns it.
    pub fn toggle(&mut self) -> DriveProfile {
        self.active ^= 1;
        self.active()
    }
}

/// How track recoil is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TrackRecoilMode {
    /// Fixed reverse kick for a fixed time
    Simple,
    /// Exponentially decaying reverse kick sampled off the ramp tick
    Legacy,
}

impl TryFrom<u8> for TrackRecoilMode {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(TrackRecoilMode::Simple),
            1 => Ok(TrackRecoilMode::Legacy),
            _ => Err(ConfigError::TrackRecoilMode(value)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackRecoilSettings {
    pub mode: TrackRecoilMode,
    pub kickback_percent: u8,
    pub duration: Milliseconds<u32>,
    /// Legacy mode only: factor applied to the speed every sample
    pub decel_factor: f32,
}

impl TrackRecoilSettings {
    /// Kick magnitude in motor speed units.
    pub fn kickback_speed(&self) -> i16 {
        MOTOR_MAX_FWDSPEED * self.kickback_percent.min(100) as i16 / 100
    }

    /// Decay factor clamped to the usable range.
    pub fn clamped_factor(&self) -> f32 {
        self.decel_factor
            .clamp(TRACK_RECOIL_FACTOR_MIN, TRACK_RECOIL_FACTOR_MAX)
    }
}

impl Default for TrackRecoilSettings {
    fn default() -> Self {
        TrackRecoilSettings {
            mode: TrackRecoilMode::Simple,
            kickback_percent: TRACK_RECOIL_KICKBACK_PERCENT,
            duration: TRACK_RECOIL_DURATION,
            decel_factor: 0.85,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn medium_class_uses_table_values() {
        let settings = BattleSettings::new(
            WeightClass::Medium,
            WeightClassSettings {
                reload_time: Milliseconds(1),
                recovery_time: Milliseconds(1),
                max_hits: 1,
                max_mg_hits: 1,
            },
        );
        assert_eq!(settings.class_settings.reload_time, Milliseconds(5000u32));
        assert_eq!(settings.class_settings.recovery_time, Milliseconds(12000u32));
        assert_eq!(settings.class_settings.max_hits, 6);
    }

    #[test]
    fn custom_class_keeps_persisted_values() {
        let custom = WeightClassSettings {
            reload_time: Milliseconds(2500),
            recovery_time: Milliseconds(8000),
            max_hits: 3,
            max_mg_hits: 12,
        };
        let settings = BattleSettings::new(WeightClass::Custom, custom);
        assert_eq!(settings.class_settings, custom);
    }

    #[test]
    fn zero_hit_custom_class_is_rejected() {
        let settings = BattleSettings::new(
            WeightClass::Custom,
            WeightClassSettings {
                reload_time: Milliseconds(2500),
                recovery_time: Milliseconds(8000),
                max_hits: 0,
                max_mg_hits: 12,
            },
        );
        assert_eq!(
            settings.validate(),
            Err(ConfigError::ZeroHits { kind: "cannon" })
        );
    }

    #[test]
    fn unknown_bytes_are_reported() {
        assert_eq!(WeightClass::try_from(9), Err(ConfigError::WeightClass(9)));
        assert_eq!(Barrel::try_from(7), Err(ConfigError::Barrel(7)));
        assert_eq!(
            TrackRecoilMode::try_from(4),
            Err(ConfigError::TrackRecoilMode(4))
        );
    }

    #[test]
    fn profiles_toggle_between_two() {
        let slow = DriveProfile {
            accel_skip: 8,
            ..DriveProfile::default()
        };
        let mut profiles = DriveProfiles::new(DriveProfile::default(), slow);
        assert_eq!(profiles.active_index(), 0);
        assert_eq!(profiles.toggle(), slow);
        assert_eq!(profiles.active_index(), 1);
        profiles.toggle();
        assert_eq!(profiles.active_index(), 0);
    }

    #[test]
    fn kickback_and_factor_are_clamped() {
        let recoil = TrackRecoilSettings {
            kickback_percent: 150,
            decel_factor: 1.5,
            ..TrackRecoilSettings::default()
        };
        assert_eq!(recoil.kickback_speed(), MOTOR_MAX_FWDSPEED);
        assert_eq!(recoil.clamped_factor(), TRACK_RECOIL_FACTOR_MAX);
        assert_eq!(TrackRecoilSettings::default().kickback_speed(), 102);
    }
}
