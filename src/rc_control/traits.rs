//! Abstractions for the peripherals the drive and battle logic talk to.
//!
//! Wire protocols, sound card command sets and LED patterns live behind these traits; the core
//! only decides *when* something happens.

use embedded_time::duration::Milliseconds;

use crate::battle::ir::IrProtocol;

/// A drive or turret motor controller.
pub trait MotorDriver {
    /// Sets a signed speed in `MOTOR_MAX_REVSPEED..=MOTOR_MAX_FWDSPEED`.
    fn set_speed(&mut self, speed: i16);

    /// Stops the motor.
    fn stop(&mut self);

    /// Shrinks the usable forward and reverse range by `percent`. 100 immobilizes the motor.
    fn cut_speed_percent(&mut self, percent: u8);

    /// Undoes [`MotorDriver::cut_speed_percent`].
    fn restore_speed(&mut self);
}

/// Servo that throws the barrel back when the cannon fires.
pub trait RecoilServo {
    fn recoil(&mut self);
}

/// Sound card capabilities used by the battle logic.
pub trait SoundCard {
    fn cannon_fire(&mut self);
    fn cannon_hit(&mut self);
    fn destroyed(&mut self);
    fn machine_gun_start(&mut self);
    fn machine_gun_stop(&mut self);
    fn machine_gun_hit(&mut self);
    fn repair_start(&mut self);
    fn repair_stop(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FadeDirection {
    In,
    Out,
}

/// Light outputs and the blink/fade helper.
pub trait Lights {
    /// Blinks the effect lights `repeat` times.
    fn blink_pattern(&mut self, on: Milliseconds<u32>, off: Milliseconds<u32>, repeat: u8);

    /// Fades the effect lights over `span`, optionally starting with a short full-brightness blip.
    fn fade(&mut self, direction: FadeDirection, span: Milliseconds<u32>, with_blip: bool);

    /// Sets the running light brightness, 0 to 255.
    fn set_dim(&mut self, level: u8);

    fn muzzle_flash(&mut self, on: bool);

    fn aux_flash(&mut self, on: bool);

    fn machine_gun_light(&mut self, on: bool);
}

/// A successfully decoded IR code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DecodedSignal {
    /// Team carried in the payload, for team-aware protocols
    pub team: Option<u8>,
}

/// IR transmitter and receiver.
pub trait IrLink {
    /// Sends one code. Returns once the transmission finished.
    fn send(&mut self, protocol: IrProtocol, payload: Option<u8>);

    /// True when the receiver captured a complete signal.
    fn has_signal(&self) -> bool;

    /// Tries to decode the captured signal as `protocol` without consuming it.
    fn try_decode(&mut self, protocol: IrProtocol) -> Option<DecodedSignal>;

    /// Discards the captured signal and resumes listening.
    fn clear(&mut self);

    fn enable_receiver(&mut self);

    fn disable_receiver(&mut self);
}
