//! Error types for decoding persisted configuration.
//!
//! The runtime core never fails: conflicting requests are ignored and out-of-range numbers are
//! clamped. These errors only surface when the firmware turns persisted bytes into settings at
//! boot, so it can report a corrupt or outdated configuration.

use thiserror::Error;

/// Result type alias for configuration decoding.
pub type Result<T> = core::result::Result<T, ConfigError>;

/// Errors raised while decoding persisted configuration.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Stored weight class byte is not a known class
    #[error("unknown weight class: {0}")]
    WeightClass(u8),

    /// Stored IR protocol byte is not a known protocol
    #[error("unknown IR protocol: {0}")]
    IrProtocol(u8),

    /// Stored damage profile byte is not a known profile
    #[error("unknown damage profile: {0}")]
    DamageProfile(u8),

    /// Stored turn mode is outside 1..=3
    #[error("unknown turn mode: {0}")]
    TurnMode(u8),

    /// Stored barrel type byte is not a known mechanism
    #[error("unknown barrel type: {0}")]
    Barrel(u8),

    /// Stored track recoil mode byte is not a known mode
    #[error("unknown track recoil mode: {0}")]
    TrackRecoilMode(u8),

    /// Stored ramp preset id has no preset behind it
    #[error("unknown ramp preset: {0}")]
    RampPreset(u8),

    /// Custom weight class with zero hits would make the tank invulnerable
    #[error("custom weight class needs at least one {kind} hit")]
    ZeroHits {
        /// Which hit counter was zero
        kind: &'static str,
    },

    /// Team id does not fit the team-aware protocols
    #[error("team id {0} out of range")]
    Team(u8),
}
