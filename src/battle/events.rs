//! Delayed actions of the battle logic.
//!
//! Each variant is scheduled on the tank's [`SimpleTimer`](crate::timer::SimpleTimer) and
//! dispatched by [`Tank::update`](crate::battle::tank::Tank::update) once it comes due.

/// Timer events handled by the tank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TankEvent {
    /// Cannon may fire again
    ReloadComplete,
    /// Limit switch never seen, stop the recoil motor
    RecoilWatchdog,
    /// Recoil delay of a mechanical unit elapsed, run the cannon effects
    DeferredEffects,
    MuzzleFlashOff,
    AuxFlashOff,
    /// Airsoft shot has cleared the barrel
    AirsoftMotorStop,
    /// Toggle the machine gun light
    MgBlink,
    /// Send the machine gun code again
    MgIrRepeat,
    /// End of the window that collapses repeats of one cannon shot
    HitFilterEnd,
    /// Destroyed tank comes back to life
    Recover,
    /// Recovery invulnerability is over
    ReceptionRestore,
    /// Uninterrupted repair finished
    RepairComplete,
}
