//! RC-style PWM ESC driven through an `embedded-hal` PWM channel.

use embedded_hal::PwmPin;
use embedded_time::duration::Microseconds;
use embedded_time::rate::Hertz;

use crate::config::{MOTOR_MAX_FWDSPEED, MOTOR_MAX_REVSPEED};
use crate::rc_control::traits::MotorDriver;

/// Pulse width that holds the ESC in neutral
const NEUTRAL_PULSE: Microseconds<u32> = Microseconds(1500);
/// Pulse width added or removed at full forward or reverse
const FULL_SCALE_PULSE: Microseconds<u32> = Microseconds(500);

/// Allows control over a standard servo-pulse ESC.
///
/// Damage speed cuts shrink the forward and reverse range symmetrically, so a cut ESC still
/// reaches its (reduced) maximum at full stick.
pub struct PwmEsc<'a> {
    chan: &'a mut dyn PwmPin<Duty = u16>,
    max_duty: u16,
    period: Microseconds<u32>,
    speed: i16,
    cut_percent: u8,
}

impl<'a> PwmEsc<'a> {
    /// Creates a new ESC on `pwm`, which must already run at `freq`.
    pub fn new(pwm: &'a mut dyn PwmPin<Duty = u16>, freq: impl Into<Hertz>) -> Self {
        let freq = freq.into();
        // Valid frequency range for servo-pulse ESCs
        debug_assert!((50u32..=200u32).contains(&freq.0));

        let mut esc = PwmEsc {
            max_duty: pwm.get_max_duty(),
            chan: pwm,
            period: Microseconds(1_000_000 / freq.0.max(1)),
            speed: 0,
            cut_percent: 0,
        };
        esc.chan.enable();
        esc.write();
        esc
    }

    /// Last speed requested, before the cut was applied.
    pub fn speed(&self) -> i16 {
        self.speed
    }

    pub fn cut_percent(&self) -> u8 {
        self.cut_percent
    }

    fn limits(&self) -> (i16, i16) {
        let keep = 100 - self.cut_percent as i32;
        (
            (MOTOR_MAX_REVSPEED as i32 * keep / 100) as i16,
            (MOTOR_MAX_FWDSPEED as i32 * keep / 100) as i16,
        )
    }

    fn write(&mut self) {
        let (min, max) = self.limits();
        let speed = self.speed.clamp(min, max) as i32;

        let pulse = NEUTRAL_PULSE.0 as i32 + speed * FULL_SCALE_PULSE.0 as i32 / MOTOR_MAX_FWDSPEED as i32;
        let duty = pulse as u32 * self.max_duty as u32 / self.period.0.max(1);
        self.chan.set_duty(duty.min(self.max_duty as u32) as u16);
    }
}

impl<'a> MotorDriver for PwmEsc<'a> {
    fn set_speed(&mut self, speed: i16) {
        self.speed = speed.clamp(MOTOR_MAX_REVSPEED, MOTOR_MAX_FWDSPEED);
        self.write();
    }

    fn stop(&mut self) {
        self.speed = 0;
        self.write();
    }

    fn cut_speed_percent(&mut self, percent: u8) {
        self.cut_percent = percent.min(100);
        self.write();
    }

    fn restore_speed(&mut self) {
        self.cut_percent = 0;
        self.write();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 50 Hz channel with one duty count per microsecond
    struct MockPwm {
        duty: u16,
        enabled: bool,
    }

    impl PwmPin for MockPwm {
        type Duty = u16;

        fn disable(&mut self) {
            self.enabled = false;
        }

        fn enable(&mut self) {
            self.enabled = true;
        }

        fn get_duty(&self) -> u16 {
            self.duty
        }

        fn get_max_duty(&self) -> u16 {
            20_000
        }

        fn set_duty(&mut self, duty: u16) {
            self.duty = duty;
        }
    }

    #[test]
    fn starts_in_neutral() {
        let mut pwm = MockPwm { duty: 0, enabled: false };
        let _esc = PwmEsc::new(&mut pwm, Hertz(50));
        assert!(pwm.enabled);
        assert_eq!(pwm.duty, 1500);
    }

    #[test]
    fn full_scale_pulses() {
        let mut pwm = MockPwm { duty: 0, enabled: false };
        let mut esc = PwmEsc::new(&mut pwm, Hertz(50));

        esc.set_speed(MOTOR_MAX_FWDSPEED);
        assert_eq!(esc.chan.get_duty(), 2000);
        esc.set_speed(MOTOR_MAX_REVSPEED);
        assert_eq!(esc.chan.get_duty(), 1000);
        esc.stop();
        assert_eq!(esc.chan.get_duty(), 1500);
    }

    #[test]
    fn cut_shrinks_both_directions() {
        let mut pwm = MockPwm { duty: 0, enabled: false };
        let mut esc = PwmEsc::new(&mut pwm, Hertz(50));

        esc.set_speed(MOTOR_MAX_FWDSPEED);
        esc.cut_speed_percent(50);
        // 127 of 255
        assert_eq!(esc.chan.get_duty(), 1749);
        esc.set_speed(MOTOR_MAX_REVSPEED);
        assert_eq!(esc.chan.get_duty(), 1251);

        esc.cut_speed_percent(100);
        assert_eq!(esc.chan.get_duty(), 1500);

        esc.restore_speed();
        assert_eq!(esc.chan.get_duty(), 1000);
        assert_eq!(esc.speed(), MOTOR_MAX_REVSPEED);
    }
}
