//! Acceleration and deceleration ramping.
//!
//! Ramping is split across two contexts:
//!
//! - [`RampTicker`] holds the state shared with the periodic ramp interrupt. Its
//!   [`tick`](RampTicker::tick) runs in the interrupt and advances both channels by their step
//!   every `skip_threshold` ticks.
//! - [`Ramping`] runs once per control loop in the foreground. It decides, for the drive and
//!   throttle channels, whether to ramp and how fast, updates the shared state inside a short
//!   critical section and derives the output speed.
//!
//! Ramped values are magnitudes; the sign is re-applied on the way out. The interrupt only needs
//! to run while at least one channel is ramping, see [`RampTicker::is_ticking`].

use core::cell::RefCell;

use critical_section::Mutex;
use embedded_time::duration::Milliseconds;
use num_traits::float::FloatCore;

use crate::config::{
    DriveProfile, TrackRecoilMode, TrackRecoilSettings, DEFAULT_ACCEL_STEP, DEFAULT_BRAKE_STEP,
    DEFAULT_DECEL_STEP, FULL_STOP_NEAR_LIMIT, MOTOR_MAX_FWDSPEED, MOTOR_MAX_REVSPEED,
    THROTTLE_ACCEL_SKIP, THROTTLE_ACCEL_STEP, THROTTLE_DECEL_FAST_STEP, THROTTLE_DECEL_SKIP,
    THROTTLE_DECEL_SLOW_STEP, THROTTLE_JERK_THRESHOLD, TRACK_RECOIL_LEGACY_FLOOR_PERCENT,
    TRACK_RECOIL_LEGACY_MAX, TRACK_RECOIL_SAMPLE_TICKS,
};
use crate::drive::mode::DriveMode;
use crate::drive::preset::{RampContext, RampParams, RampPreset};

/// One ramp channel as seen by the interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RampChannel {
    value: i16,
    target: i16,
    step: i16,
    skip_count: u8,
    skip_threshold: u8,
    enabled: bool,
}

impl RampChannel {
    const IDLE: RampChannel = RampChannel {
        value: 0,
        target: 0,
        step: 1,
        skip_count: 0,
        skip_threshold: 1,
        enabled: false,
    };

    /// Current ramped magnitude.
    pub fn value(&self) -> i16 {
        self.value
    }

    pub fn step(&self) -> i16 {
        self.step
    }

    pub fn skip_threshold(&self) -> u8 {
        self.skip_threshold
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    // Constant time, runs in the interrupt
    fn tick(&mut self) {
        if !self.enabled {
            return;
        }
        self.skip_count = self.skip_count.wrapping_add(1);
        if self.skip_count < self.skip_threshold {
            return;
        }
        self.skip_count = 0;

        let next = self.value.saturating_add(self.step);
        self.value = if self.step >= 0 {
            next.min(self.target)
        } else {
            next.max(self.target)
        };
    }

    /// Slaves the channel to `value` with ramping off.
    fn follow(&mut self, value: i16) {
        *self = RampChannel {
            value,
            target: value,
            ..RampChannel::IDLE
        };
    }

    fn ramp(&mut self, from: i16, target: i16, params: RampParams) {
        if !self.enabled {
            self.value = from;
            self.skip_count = 0;
        }
        self.enabled = true;
        self.target = target;
        self.step = params.step;
        self.skip_threshold = params.skip;

        // Start moving now instead of a full skip period later
        if target != 0 && self.value == 0 {
            self.value = params.step.abs().min(target);
        }
    }
}

struct Shared {
    drive: RampChannel,
    throttle: RampChannel,
    ticking: bool,
}

impl Shared {
    fn update_ticking(&mut self) {
        self.ticking = self.drive.enabled || self.throttle.enabled;
    }
}

/// Ramp state shared with the periodic interrupt.
///
/// Lives in a `static` next to the interrupt handler, which calls [`RampTicker::tick`] at
/// [`RAMP_TICK_RATE`](crate::config::RAMP_TICK_RATE).
pub struct RampTicker {
    shared: Mutex<RefCell<Shared>>,
}

impl RampTicker {
    pub const fn new() -> Self {
        RampTicker {
            shared: Mutex::new(RefCell::new(Shared {
                drive: RampChannel::IDLE,
                throttle: RampChannel::IDLE,
                ticking: false,
            })),
        }
    }

    /// Advances both channels by one tick. Call from the periodic interrupt.
    pub fn tick(&self) {
        critical_section::with(|cs| {
            let mut shared = self.shared.borrow_ref_mut(cs);
            if !shared.ticking {
                return;
            }
            shared.drive.tick();
            shared.throttle.tick();
        })
    }

    /// Whether the periodic interrupt needs to run. The firmware masks it while this is false.
    pub fn is_ticking(&self) -> bool {
        self.with(|shared| shared.ticking)
    }

    /// Snapshot of the drive channel.
    pub fn drive(&self) -> RampChannel {
        self.with(|shared| shared.drive)
    }

    /// Snapshot of the throttle channel.
    pub fn throttle(&self) -> RampChannel {
        self.with(|shared| shared.throttle)
    }

    fn with<R>(&self, f: impl FnOnce(&mut Shared) -> R) -> R {
        critical_section::with(|cs| f(&mut self.shared.borrow_ref_mut(cs)))
    }
}

impl Default for RampTicker {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Accel,
    Decel,
    Brake,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Plan {
    Direct(i16),
    Ramp {
        target: i16,
        params: RampParams,
        shape: Shape,
    },
}

#[derive(Debug, Clone, Copy)]
struct RecoilRun {
    started: Milliseconds<u32>,
    speed: i16,
}

/// Foreground half of the ramping engine.
pub struct Ramping<'a> {
    ticker: &'a RampTicker,
    profile: DriveProfile,
    recoil: TrackRecoilSettings,
    recoil_run: Option<RecoilRun>,
    recoil_finished: bool,
}

impl<'a> Ramping<'a> {
    pub fn new(ticker: &'a RampTicker, profile: DriveProfile, recoil: TrackRecoilSettings) -> Self {
        Ramping {
            ticker,
            profile,
            recoil,
            recoil_run: None,
            recoil_finished: false,
        }
    }

    /// Makes `profile` the live drive profile. Takes effect on the next speed computation.
    pub fn configure(&mut self, profile: DriveProfile) {
        debug!(
            "drive profile: accel {} skip {}, decel {} skip {}",
            profile.accel_enabled, profile.accel_skip, profile.decel_enabled, profile.decel_skip
        );
        self.profile = profile;
    }

    pub fn configure_track_recoil(&mut self, recoil: TrackRecoilSettings) {
        self.recoil = recoil;
    }

    pub fn profile(&self) -> DriveProfile {
        self.profile
    }

    /// True while a track recoil kick is being rendered.
    pub fn track_recoil_active(&self) -> bool {
        self.recoil_run.is_some()
    }

    /// True once the current track recoil finished; the caller should leave
    /// [`DriveMode::TrackRecoil`].
    pub fn track_recoil_finished(&self) -> bool {
        self.recoil_finished
    }

    /// Shapes the commanded drive speed into the speed sent to the drive motors.
    ///
    /// `mode` and `brake` are the actual drive mode and brake flag (see
    /// [`DriveModeTracker`](crate::drive::mode::DriveModeTracker)), `last` is the value this
    /// function returned on the previous loop and `now` is only used by track recoil.
    /// In a neutral turn, `commanded` is the signed turn command.
    pub fn compute_drive_speed(
        &mut self,
        commanded: i16,
        last: i16,
        mode: DriveMode,
        brake: bool,
        now: Milliseconds<u32>,
    ) -> i16 {
        if mode == DriveMode::TrackRecoil {
            return self.track_recoil(now);
        }
        self.recoil_run = None;
        self.recoil_finished = false;

        let neg = if brake {
            last < 0
        } else {
            match mode {
                DriveMode::Reverse => true,
                DriveMode::NeutralTurn => commanded < 0,
                _ => false,
            }
        };
        let limit = if neg {
            MOTOR_MAX_REVSPEED.saturating_abs()
        } else {
            MOTOR_MAX_FWDSPEED
        };
        let cmd = commanded.saturating_abs().min(limit);
        let prev = last.saturating_abs();
        let ctx = RampContext {
            commanded: cmd,
            last: prev,
        };

        let plan = if mode == DriveMode::Stop {
            Plan::Direct(0)
        } else if brake {
            // Stick pushed nearly all the way the other way: stop now
            if cmd > limit - FULL_STOP_NEAR_LIMIT || !self.profile.decel_enabled {
                Plan::Direct(0)
            } else {
                Plan::Ramp {
                    target: 0,
                    params: RampParams {
                        step: DEFAULT_BRAKE_STEP + (cmd >> 4),
                        skip: self.profile.decel_skip,
                    },
                    shape: Shape::Brake,
                }
            }
        } else if cmd > prev && self.profile.accel_enabled {
            let base = RampParams {
                step: DEFAULT_ACCEL_STEP,
                skip: self.profile.accel_skip,
            };
            Plan::Ramp {
                target: cmd,
                params: self.profile.accel_preset.apply(base, ctx),
                shape: Shape::Accel,
            }
        } else if cmd < prev && self.profile.decel_enabled && mode != DriveMode::NeutralTurn {
            let base = RampParams {
                step: DEFAULT_DECEL_STEP,
                skip: self.profile.decel_skip,
            };
            Plan::Ramp {
                target: cmd,
                params: self.profile.decel_preset.apply(base, ctx),
                shape: Shape::Decel,
            }
        } else {
            Plan::Direct(cmd)
        };

        let plan = clamp_plan(plan);
        let out = self.ticker.with(|shared| {
            let out = apply_plan(&mut shared.drive, plan, prev);
            shared.update_ticking();
            out
        });

        let out = match plan {
            Plan::Direct(_) => out,
            Plan::Ramp { shape: Shape::Accel, .. } => out.min(cmd).max(0),
            Plan::Ramp { shape: Shape::Decel, .. } => out.max(cmd).min(limit),
            Plan::Ramp { shape: Shape::Brake, .. } => out.max(0),
        };

        if neg {
            -out
        } else {
            out
        }
    }

    /// Shapes the virtual engine speed that drives sound and smoke.
    ///
    /// Unsigned: inputs are taken as magnitudes and the result is never negative. Engine speed
    /// always ramps down (braking included) and never drops below the physical drive speed;
    /// small increases pass through, large ones are lightly ramped.
    pub fn compute_throttle_speed(
        &mut self,
        commanded: i16,
        last: i16,
        drive_speed: i16,
        mode: DriveMode,
        brake: bool,
    ) -> i16 {
        let cmd = if brake {
            0
        } else {
            commanded.saturating_abs().min(MOTOR_MAX_FWDSPEED)
        };
        let prev = last.saturating_abs().min(MOTOR_MAX_FWDSPEED);
        let floor = if mode == DriveMode::TrackRecoil {
            0
        } else {
            drive_speed.saturating_abs()
        };

        let plan = if cmd < prev {
            let target = cmd.max(floor).min(prev);
            if target == prev {
                Plan::Direct(prev)
            } else {
                let step = if prev > MOTOR_MAX_FWDSPEED / 2 {
                    THROTTLE_DECEL_FAST_STEP
                } else {
                    THROTTLE_DECEL_SLOW_STEP
                };
                Plan::Ramp {
                    target,
                    params: RampParams {
                        step,
                        skip: THROTTLE_DECEL_SKIP,
                    },
                    shape: Shape::Decel,
                }
            }
        } else if cmd - prev > THROTTLE_JERK_THRESHOLD {
            Plan::Ramp {
                target: cmd,
                params: RampParams {
                    step: THROTTLE_ACCEL_STEP,
                    skip: THROTTLE_ACCEL_SKIP,
                },
                shape: Shape::Accel,
            }
        } else {
            Plan::Direct(cmd)
        };

        let plan = clamp_plan(plan);
        let out = self.ticker.with(|shared| {
            let out = apply_plan(&mut shared.throttle, plan, prev);
            shared.update_ticking();
            out
        });

        match plan {
            Plan::Direct(_) => out,
            Plan::Ramp {
                target,
                shape: Shape::Accel,
                ..
            } => out.min(target).max(0),
            Plan::Ramp { target, .. } => out.max(target).min(MOTOR_MAX_FWDSPEED),
        }
    }

    fn track_recoil(&mut self, now: Milliseconds<u32>) -> i16 {
        if self.recoil_finished {
            return 0;
        }

        let kick = self.recoil.kickback_speed();
        let Some(mut run) = self.recoil_run else {
            info!("track recoil start, kick {}", kick);
            self.recoil_run = Some(RecoilRun {
                started: now,
                speed: kick,
            });
            let mode = self.recoil.mode;
            self.ticker.with(|shared| {
                match mode {
                    TrackRecoilMode::Simple => shared.drive.follow(kick),
                    // The drive channel becomes a free running tick counter
                    TrackRecoilMode::Legacy => {
                        shared.drive = RampChannel {
                            value: 0,
                            target: i16::MAX,
                            step: 1,
                            skip_count: 0,
                            skip_threshold: 1,
                            enabled: true,
                        }
                    }
                }
                shared.update_ticking();
            });
            return -kick;
        };

        let elapsed = now.0.wrapping_sub(run.started.0);
        let done = match self.recoil.mode {
            TrackRecoilMode::Simple => elapsed >= self.recoil.duration.0,
            TrackRecoilMode::Legacy => {
                let samples = self.ticker.with(|shared| {
                    let samples = shared.drive.value / TRACK_RECOIL_SAMPLE_TICKS;
                    shared.drive.value -= samples * TRACK_RECOIL_SAMPLE_TICKS;
                    samples
                });
                let factor = self.recoil.clamped_factor();
                for _ in 0..samples {
                    run.speed = FloatCore::round(run.speed as f32 * factor) as i16;
                }
                self.recoil_run = Some(run);

                let floor = MOTOR_MAX_FWDSPEED * TRACK_RECOIL_LEGACY_FLOOR_PERCENT as i16 / 100;
                elapsed >= TRACK_RECOIL_LEGACY_MAX.0 || run.speed < floor
            }
        };

        if done {
            info!("track recoil done after {} ms", elapsed);
            self.recoil_run = None;
            self.recoil_finished = true;
            self.ticker.with(|shared| {
                shared.drive.follow(0);
                shared.update_ticking();
            });
            0
        } else {
            -run.speed
        }
    }
}

fn clamp_plan(plan: Plan) -> Plan {
    match plan {
        Plan::Ramp {
            target,
            params,
            shape,
        } => {
            let step = params.step.max(1);
            Plan::Ramp {
                target,
                params: RampParams {
                    step: if shape == Shape::Accel { step } else { -step },
                    skip: params.skip.max(1),
                },
                shape,
            }
        }
        direct => direct,
    }
}

fn apply_plan(channel: &mut RampChannel, plan: Plan, prev: i16) -> i16 {
    match plan {
        Plan::Direct(value) => {
            channel.follow(value);
            value
        }
        Plan::Ramp { target, params, .. } => {
            channel.ramp(prev, target, params);
            channel.value
        }
    }
}
