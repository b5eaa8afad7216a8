//! Core of an RC battle tank controller.
//!
//! [`drive`] turns stick commands into ramped, mixed track speeds, and [`battle`] sequences the
//! cannon and machine gun and keeps score of hits, repairs and destruction. Hardware is reached
//! through the traits in [`rc_control`]; the firmware owns the peripherals, calls
//! [`drive::RampTicker::tick`] from a periodic interrupt and
//! [`battle::RecoilMechanism::on_limit_switch_interrupt`] from the limit switch pin interrupt,
//! and drives everything else from its main loop.

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod battle;
pub mod config;
pub mod drive;
pub mod error;
pub mod rc_control;
pub mod timer;

pub use error::{ConfigError, Result};
