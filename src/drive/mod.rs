//! Drivetrain speed shaping.
//!
//! Per control loop the firmware classifies the sticks ([`mode`]), shapes drive and engine speed
//! ([`ramp`]) and splits the drive speed over both tracks ([`mixer`]). The periodic ramp
//! interrupt only touches [`ramp::RampTicker`].

pub mod mixer;
pub mod mode;
pub mod preset;
pub mod ramp;

pub use mixer::{mix, TurnMode};
pub use mode::{classify_brake, classify_mode, DriveMode, DriveModeTracker};
pub use preset::{AccelPreset, DecelPreset, RampPreset};
pub use ramp::{RampTicker, Ramping};
