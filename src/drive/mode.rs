//! Drive mode and brake classification.

/// What the drivetrain is doing this control cycle. Derived every loop, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriveMode {
    Stop,
    Forward,
    Reverse,
    NeutralTurn,
    TrackRecoil,
}

/// Classifies stick positions into the commanded drive mode.
pub fn classify_mode(throttle: i16, turn: i16, neutral_turn_allowed: bool) -> DriveMode {
    match throttle {
        t if t > 0 => DriveMode::Forward,
        t if t < 0 => DriveMode::Reverse,
        _ if turn != 0 && neutral_turn_allowed => DriveMode::NeutralTurn,
        _ => DriveMode::Stop,
    }
}

/// A direction reversal while moving is a brake request, not an instant change of direction.
pub fn classify_brake(previous: DriveMode, commanded: DriveMode) -> bool {
    matches!(
        (previous, commanded),
        (DriveMode::Forward, DriveMode::Reverse) | (DriveMode::Reverse, DriveMode::Forward)
    )
}

/// Tracks the actual drive mode.
///
/// The commanded mode follows the sticks, the actual mode follows the vehicle: it stays
/// `Forward`/`Reverse` while the tracks are still turning after the stick was released or
/// reversed, and only drops to `Stop` once the output speed reaches zero. The actual mode and
/// brake flag are what the ramping engine consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriveModeTracker {
    actual: DriveMode,
    brake: bool,
}

impl DriveModeTracker {
    pub const fn new() -> Self {
        DriveModeTracker {
            actual: DriveMode::Stop,
            brake: false,
        }
    }

    pub fn actual(&self) -> DriveMode {
        self.actual
    }

    pub fn braking(&self) -> bool {
        self.brake
    }

    /// Feeds one control cycle's commanded mode and the previous output speed.
    pub fn update(&mut self, commanded: DriveMode, last_speed: i16) -> (DriveMode, bool) {
        if self.actual == DriveMode::TrackRecoil {
            // Track recoil ends by itself; the caller leaves it with `end_track_recoil`
            return (self.actual, false);
        }

        if last_speed == 0 {
            self.actual = commanded;
            self.brake = false;
        } else {
            let moving = match self.actual {
                DriveMode::NeutralTurn => DriveMode::NeutralTurn,
                _ if last_speed > 0 => DriveMode::Forward,
                _ => DriveMode::Reverse,
            };
            self.brake = classify_brake(moving, commanded);
            // A neutral turn hands over immediately once a throttle direction is commanded
            self.actual = if moving == DriveMode::NeutralTurn && commanded != DriveMode::Stop {
                commanded
            } else {
                moving
            };
        }

        (self.actual, self.brake)
    }

    /// Switches to track recoil, e.g. after the cannon fired.
    pub fn start_track_recoil(&mut self) {
        self.actual = DriveMode::TrackRecoil;
        self.brake = false;
    }

    /// Leaves track recoil once the ramping engine reports it finished.
    pub fn end_track_recoil(&mut self) {
        if self.actual == DriveMode::TrackRecoil {
            self.actual = DriveMode::Stop;
        }
    }
}

impl Default for DriveModeTracker {
    fn default() -> Self {
        Self::new()
    }
}
