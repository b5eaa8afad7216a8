//! rc_control holds the interfaces to the tank's actuators and effect hardware, plus a PWM ESC
//! driver for standard RC speed controllers.
//!
//! The drive and battle logic only talk to the traits in [`traits`], so every board can bring its
//! own sound card, light controller and IR transceiver. Drive motors are set up like so:
//!
//! ``` no-test
//! let mut left = PwmEsc::new(&mut pwm_slices.pwm4.channel_a, 50.Hz());
//! tank.apply_speed_cut(&mut left);
//! left.set_speed(left_speed);
//! ```

pub mod esc;
pub mod traits;
pub use esc::PwmEsc;
pub use traits::{IrLink, Lights, MotorDriver, RecoilServo, SoundCard};
