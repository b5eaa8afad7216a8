//! Cannon and machine gun sequencing plus hit reception.
//!
//! Everything here runs from the main loop. Delayed actions are [`TankEvent`]s on a
//! [`SimpleTimer`]; the only interrupt-driven input is the recoil limit switch, which arrives as
//! [`RecoilEvent`]s drained in [`Tank::update`].

use core::mem;

use embedded_time::duration::Milliseconds;

use crate::battle::damage::{speed_cut_percent, CombatState, HitOutcome, HitType};
use crate::battle::events::TankEvent;
use crate::battle::ir::IrProtocol;
use crate::battle::recoil::{Edge, RecoilActuator, RecoilEvent};
use crate::config::{
    Barrel, BattleSettings, CannonSettings, AIRSOFT_STOP_DELAY, DAMAGE_FADE_SPAN,
    DESTROYED_BLINK_COUNT, DESTROYED_BLINK_OFF, DESTROYED_BLINK_ON, DESTROYED_INOPERATIVE,
    HIT_FILTER, MG_BLINK_INTERVAL, MG_IR_REPEAT, MUZZLE_FLASH, RECOIL_WATCHDOG, RELOAD_BLINK_COUNT,
    RELOAD_BLINK_OFF, RELOAD_BLINK_ON, REPAIR_DURATION, TWO_SHOT_DAMAGE,
};
use crate::rc_control::traits::{FadeDirection, IrLink, Lights, MotorDriver, RecoilServo, SoundCard};
use crate::timer::{SimpleTimer, TimerId};

/// Pending timers never exceed this
const TIMER_SLOTS: usize = 16;

/// Where the cannon is in its fire cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CannonState {
    Idle,
    /// Mechanical barrel running, effects not played yet
    Barrel,
    Reloading,
}

/// Battle state of one tank.
///
/// `H` bundles the sound card, lights, IR link and recoil servo. The recoil unit is shared with
/// its pin interrupt, so it is borrowed rather than owned.
pub struct Tank<'r, H> {
    hw: H,
    settings: BattleSettings,
    cannon: CannonSettings,
    recoil: Option<&'r dyn RecoilActuator>,
    timer: SimpleTimer<TankEvent, TIMER_SLOTS>,
    combat: CombatState,
    cannon_state: CannonState,

    // Parts of the effects batch already done before it runs
    ir_sent: bool,
    servo_fired: bool,
    awaiting_switch: bool,

    watchdog: Option<TimerId>,
    deferred: Option<TimerId>,
    hit_filter: Option<TimerId>,
    recover: Option<TimerId>,
    reception_restore: Option<TimerId>,
    repair: Option<TimerId>,

    mg_firing: bool,
    mg_light: bool,
    mg_blink: Option<TimerId>,
    mg_ir: Option<TimerId>,

    track_recoil_request: bool,
}

impl<'r, H> Tank<'r, H>
where
    H: SoundCard + Lights + IrLink + RecoilServo,
{
    pub fn new(
        mut hw: H,
        settings: BattleSettings,
        cannon: CannonSettings,
        recoil: Option<&'r dyn RecoilActuator>,
    ) -> Self {
        if settings.ir_enabled() {
            hw.clear();
            hw.enable_receiver();
        } else {
            hw.disable_receiver();
        }

        Tank {
            hw,
            settings,
            cannon,
            recoil,
            timer: SimpleTimer::new(),
            combat: CombatState::new(),
            cannon_state: CannonState::Idle,
            ir_sent: false,
            servo_fired: false,
            awaiting_switch: false,
            watchdog: None,
            deferred: None,
            hit_filter: None,
            recover: None,
            reception_restore: None,
            repair: None,
            mg_firing: false,
            mg_light: false,
            mg_blink: None,
            mg_ir: None,
            track_recoil_request: false,
        }
    }

    pub fn settings(&self) -> &BattleSettings {
        &self.settings
    }

    pub fn combat(&self) -> &CombatState {
        &self.combat
    }

    pub fn cannon_state(&self) -> CannonState {
        self.cannon_state
    }

    pub fn is_invulnerable(&self) -> bool {
        self.combat.is_invulnerable()
    }

    pub fn is_machine_gun_firing(&self) -> bool {
        self.mg_firing
    }

    pub fn hardware(&self) -> &H {
        &self.hw
    }

    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hw
    }

    /// True once after each cannon shot that should kick the tracks back.
    pub fn take_track_recoil_request(&mut self) -> bool {
        mem::take(&mut self.track_recoil_request)
    }

    /// Current drive motor cut for the configured damage profile.
    pub fn speed_cut_percent(&self) -> u8 {
        speed_cut_percent(self.combat.damage_percent(), self.settings.damage_profile)
    }

    /// Pushes the current damage cut into a drive motor. Turret motors are never cut.
    pub fn apply_speed_cut(&self, motor: &mut impl MotorDriver) {
        match self.speed_cut_percent() {
            0 => motor.restore_speed(),
            percent => motor.cut_speed_percent(percent),
        }
    }

    /// Main loop hook: handles limit switch reports and due timers.
    pub fn update(&mut self, now: Milliseconds<u32>) {
        let due = self.timer.run(now);

        if let Some(recoil) = self.recoil {
            while let Some(event) = recoil.take_event() {
                self.on_recoil_event(event);
            }
        }

        for event in due {
            self.dispatch(event);
        }
    }

    fn dispatch(&mut self, event: TankEvent) {
        match event {
            TankEvent::ReloadComplete => {
                self.cannon_state = CannonState::Idle;
                if self.settings.repair_tank {
                    self.hw.repair_stop();
                }
                if self.cannon.reload_blink {
                    self.hw
                        .blink_pattern(RELOAD_BLINK_ON, RELOAD_BLINK_OFF, RELOAD_BLINK_COUNT);
                }
            }
            TankEvent::RecoilWatchdog => {
                if self.watchdog.take().is_none() {
                    return;
                }
                warn!("recoil limit switch not seen, stopping motor");
                if let Some(recoil) = self.recoil {
                    recoil.force_stop();
                }
                if mem::take(&mut self.awaiting_switch) {
                    self.run_cannon_effects();
                }
            }
            TankEvent::DeferredEffects => {
                if self.deferred.take().is_some() {
                    self.run_cannon_effects();
                }
            }
            TankEvent::MuzzleFlashOff => self.hw.muzzle_flash(false),
            TankEvent::AuxFlashOff => self.hw.aux_flash(false),
            TankEvent::AirsoftMotorStop => {
                if let Some(recoil) = self.recoil {
                    recoil.force_stop();
                }
            }
            TankEvent::MgBlink => {
                if self.mg_firing {
                    self.mg_light = !self.mg_light;
                    self.hw.machine_gun_light(self.mg_light);
                }
            }
            TankEvent::MgIrRepeat => {
                if let (true, Some(protocol)) = (self.mg_firing, self.settings.mg_protocol) {
                    self.transmit(protocol, self.payload(protocol));
                }
            }
            TankEvent::HitFilterEnd => {
                if self.hit_filter.take().is_some() {
                    self.restore_reception();
                }
            }
            TankEvent::Recover => {
                if self.recover.take().is_none() {
                    return;
                }
                info!("tank recovered");
                self.combat.recover();
                self.hw.set_dim(u8::MAX);
                self.reception_restore = self.timer.schedule_once(
                    self.settings.class_settings.recovery_time,
                    TankEvent::ReceptionRestore,
                );
                if self.reception_restore.is_none() {
                    self.restore_reception();
                }
            }
            TankEvent::ReceptionRestore => {
                if self.reception_restore.take().is_some() {
                    self.restore_reception();
                }
            }
            TankEvent::RepairComplete => {
                if self.repair.take().is_none() {
                    return;
                }
                if self.combat.complete_repair(self.settings.cannon_hit_damage()) {
                    info!("repair complete, damage {}", self.combat.damage_percent());
                    self.hw.repair_stop();
                }
            }
        }
    }

    fn on_recoil_event(&mut self, event: RecoilEvent) {
        if let Some(id) = self.watchdog.take() {
            self.timer.cancel(id);
        }

        if event.edge == Edge::Falling
            && self
                .timer
                .schedule_once(AIRSOFT_STOP_DELAY, TankEvent::AirsoftMotorStop)
                .is_none()
        {
            if let Some(recoil) = self.recoil {
                recoil.force_stop();
            }
        }

        if event.cannon_sequence && mem::take(&mut self.awaiting_switch) {
            self.run_cannon_effects();
        }
    }

    /// Fires the cannon, or the repair code on a repair tank.
    ///
    /// Ignored while repairing, destroyed, or before the last shot has reloaded. Returns whether
    /// the shot happened.
    pub fn fire(&mut self, now: Milliseconds<u32>) -> bool {
        self.timer.set_now(now);
        if self.combat.is_repairing()
            || self.combat.is_destroyed()
            || self.cannon_state != CannonState::Idle
        {
            return false;
        }

        if self.settings.repair_tank {
            info!("firing repair code");
            self.hw.repair_start();
            self.hw.fade(FadeDirection::In, DAMAGE_FADE_SPAN, false);
            let protocol = self.settings.repair_protocol.unwrap_or(IrProtocol::Repair);
            self.transmit(protocol, self.payload(protocol));
            self.start_reload();
            return true;
        }

        match (self.cannon.barrel, self.recoil) {
            (Barrel::Airsoft, Some(recoil)) => {
                recoil.start(Edge::Falling, true);
                self.cannon_state = CannonState::Barrel;
                // Invisible, so it can go out before the shot
                self.transmit_cannon();
                self.ir_sent = true;
                self.awaiting_switch = true;
                self.arm_watchdog();
            }
            (Barrel::MechanicalRecoil, Some(recoil)) => {
                recoil.start(Edge::Rising, false);
                if self.cannon.recoil_servo {
                    self.hw.recoil();
                    self.servo_fired = true;
                }
                self.arm_watchdog();

                if self.cannon.recoil_delay.0 > 0 {
                    self.deferred = self
                        .timer
                        .schedule_once(self.cannon.recoil_delay, TankEvent::DeferredEffects);
                }
                if self.deferred.is_some() {
                    self.cannon_state = CannonState::Barrel;
                } else {
                    self.run_cannon_effects();
                }
            }
            _ => self.run_cannon_effects(),
        }
        true
    }

    fn arm_watchdog(&mut self) {
        if let Some(id) = self.watchdog.take() {
            self.timer.cancel(id);
        }
        self.watchdog = self
            .timer
            .schedule_once(RECOIL_WATCHDOG, TankEvent::RecoilWatchdog);
    }

    /// Sound, flashes, IR and servo as one batch, then the reload.
    fn run_cannon_effects(&mut self) {
        info!("cannon fired");
        self.hw.cannon_fire();

        self.hw.muzzle_flash(true);
        self.timer
            .schedule_once(MUZZLE_FLASH, TankEvent::MuzzleFlashOff);
        if self.cannon.aux_flash {
            self.hw.aux_flash(true);
            self.timer.schedule_once(MUZZLE_FLASH, TankEvent::AuxFlashOff);
        }

        if !mem::take(&mut self.ir_sent) {
            self.transmit_cannon();
        }
        if !mem::take(&mut self.servo_fired) && self.cannon.recoil_servo {
            self.hw.recoil();
        }
        if self.cannon.track_recoil {
            self.track_recoil_request = true;
        }

        self.start_reload();
    }

    fn start_reload(&mut self) {
        let reload = self.settings.class_settings.reload_time;
        self.cannon_state = match self.timer.schedule_once(reload, TankEvent::ReloadComplete) {
            Some(_) => CannonState::Reloading,
            None => CannonState::Idle,
        };
    }

    fn transmit_cannon(&mut self) {
        let Some(protocol) = self.settings.fire_protocol else {
            return;
        };
        self.transmit(protocol, self.payload(protocol));
        if self.settings.send_tank_id {
            self.transmit(IrProtocol::TankId, Some(self.settings.tank_id));
        }
    }

    fn payload(&self, protocol: IrProtocol) -> Option<u8> {
        protocol.is_team_aware().then_some(self.settings.team)
    }

    /// Sends one code with reception suspended, so we never hit ourselves.
    fn transmit(&mut self, protocol: IrProtocol, payload: Option<u8>) {
        let receiving = self.receiver_on();
        if receiving {
            self.hw.disable_receiver();
        }
        self.hw.send(protocol, payload);
        if receiving {
            self.hw.clear();
            self.hw.enable_receiver();
        }
    }

    /// Starts the machine gun. Does nothing if it already runs.
    pub fn start_machine_gun(&mut self, now: Milliseconds<u32>) {
        self.timer.set_now(now);
        if self.mg_firing || self.combat.is_destroyed() {
            return;
        }
        self.mg_firing = true;

        self.hw.machine_gun_start();
        self.mg_light = true;
        self.hw.machine_gun_light(true);
        self.mg_blink = self
            .timer
            .schedule_repeating(MG_BLINK_INTERVAL, TankEvent::MgBlink);

        if let Some(protocol) = self.settings.mg_protocol {
            self.transmit(protocol, self.payload(protocol));
            self.mg_ir = self
                .timer
                .schedule_repeating(MG_IR_REPEAT, TankEvent::MgIrRepeat);
        }
    }

    /// Stops the machine gun. Does nothing if it is not running.
    pub fn stop_machine_gun(&mut self) {
        if !mem::take(&mut self.mg_firing) {
            return;
        }
        for id in [self.mg_blink.take(), self.mg_ir.take()].into_iter().flatten() {
            self.timer.cancel(id);
        }
        self.mg_light = false;
        self.hw.machine_gun_light(false);
        self.hw.machine_gun_stop();
    }

    fn receiver_on(&self) -> bool {
        self.settings.ir_enabled() && !self.combat.is_invulnerable()
    }

    fn restore_reception(&mut self) {
        self.combat.set_invulnerable(false);
        if self.settings.ir_enabled() {
            self.hw.clear();
            self.hw.enable_receiver();
        }
    }

    fn own_team(&self, protocol: IrProtocol, team: Option<u8>) -> bool {
        protocol.is_team_aware() && team == Some(self.settings.team)
    }

    /// Cannon protocols we accept, with the 1-shot/2-shot counterparts added.
    fn cannon_protocols(&self) -> heapless::Vec<IrProtocol, 4> {
        let mut list = heapless::Vec::new();
        let configured = [self.settings.fire_protocol, self.settings.hit_protocol_2];
        for protocol in configured.into_iter().flatten() {
            for candidate in [Some(protocol), protocol.shot_counterpart()]
                .into_iter()
                .flatten()
            {
                if !list.contains(&candidate) {
                    list.push(candidate).ok();
                }
            }
        }
        list
    }

    /// Checks the IR receiver for a hit and applies it.
    ///
    /// Returns `None` while invulnerable, when nothing was received, for codes from our own team,
    /// and for repair codes we cannot use right now. Any decoded or unknown signal is consumed.
    pub fn poll_for_hit(&mut self, now: Milliseconds<u32>) -> Option<HitType> {
        self.timer.set_now(now);
        if !self.receiver_on() || !self.hw.has_signal() {
            return None;
        }

        for protocol in self.cannon_protocols() {
            if let Some(signal) = self.hw.try_decode(protocol) {
                self.hw.clear();
                if self.own_team(protocol, signal.team) {
                    debug!("ignoring own team hit");
                    return None;
                }
                self.cannon_hit(protocol, signal.team);
                return Some(HitType::Cannon);
            }
        }

        if let Some(protocol) = self.settings.repair_protocol {
            if let Some(signal) = self.hw.try_decode(protocol) {
                self.hw.clear();
                if protocol.is_team_aware() && !self.own_team(protocol, signal.team) {
                    return None;
                }
                return self.start_repair().then_some(HitType::Repair);
            }
        }

        if let (true, Some(protocol)) = (self.settings.accept_mg_damage, self.settings.mg_protocol) {
            if let Some(signal) = self.hw.try_decode(protocol) {
                self.hw.clear();
                if self.own_team(protocol, signal.team) {
                    return None;
                }
                self.mg_hit(protocol, signal.team);
                return Some(HitType::MachineGun);
            }
        }

        self.hw.clear();
        None
    }

    fn cannon_hit(&mut self, protocol: IrProtocol, team: Option<u8>) {
        self.combat.set_invulnerable(true);
        self.hw.disable_receiver();
        self.cancel_repair();

        let amount = if protocol.is_two_shot() {
            TWO_SHOT_DAMAGE
        } else {
            self.settings.cannon_hit_damage()
        };

        match self.combat.take_cannon_hit(amount, protocol, team) {
            Some(HitOutcome::Destroyed) => self.destroyed(),
            Some(HitOutcome::Damaged) => {
                info!("cannon hit, damage {}", self.combat.damage_percent());
                self.hw.cannon_hit();
                self.hw.fade(FadeDirection::Out, DAMAGE_FADE_SPAN, true);
                self.hit_filter = self.timer.schedule_once(HIT_FILTER, TankEvent::HitFilterEnd);
                if self.hit_filter.is_none() {
                    self.restore_reception();
                }
            }
            None => {}
        }
    }

    fn mg_hit(&mut self, protocol: IrProtocol, team: Option<u8>) {
        self.cancel_repair();

        match self.combat.take_mg_hit(self.settings.mg_hit_damage(), protocol, team) {
            Some(HitOutcome::Destroyed) => {
                self.combat.set_invulnerable(true);
                self.hw.disable_receiver();
                self.destroyed();
            }
            Some(HitOutcome::Damaged) => {
                debug!("machine gun hit, damage {}", self.combat.damage_percent());
                self.hw.machine_gun_hit();
            }
            None => {}
        }
    }

    fn destroyed(&mut self) {
        warn!("tank destroyed");
        if let Some(id) = self.hit_filter.take() {
            self.timer.cancel(id);
        }
        self.stop_machine_gun();

        self.hw.destroyed();
        self.hw
            .blink_pattern(DESTROYED_BLINK_ON, DESTROYED_BLINK_OFF, DESTROYED_BLINK_COUNT);
        self.hw.set_dim(0);
        self.recover = self
            .timer
            .schedule_once(DESTROYED_INOPERATIVE, TankEvent::Recover);
    }

    fn start_repair(&mut self) -> bool {
        if !self.combat.start_repair() {
            return false;
        }
        info!("repair started");
        self.hw.repair_start();
        self.hw.fade(FadeDirection::In, DAMAGE_FADE_SPAN, false);
        self.repair = self
            .timer
            .schedule_once(REPAIR_DURATION, TankEvent::RepairComplete);
        if self.repair.is_none() {
            self.cancel_repair();
            return false;
        }
        true
    }

    fn cancel_repair(&mut self) {
        if let Some(id) = self.repair.take() {
            self.timer.cancel(id);
        }
        if self.combat.cancel_repair() {
            info!("repair interrupted");
            self.hw.repair_stop();
        }
    }
}
