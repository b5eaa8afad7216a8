//! Damage bookkeeping.

use num_traits::float::FloatCore;

use crate::battle::ir::IrProtocol;
use crate::config::{DamageProfile, DAMAGE_EPSILON};

/// What a received IR code turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HitType {
    Cannon,
    MachineGun,
    Repair,
}

/// Result of applying damage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HitOutcome {
    Damaged,
    /// This hit took the tank to 100 %
    Destroyed,
}

/// Health of the tank.
///
/// Damage only grows on hits and only shrinks on a completed repair. It always stays within
/// 0..=100 and the tank is destroyed exactly when it reaches 100.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CombatState {
    damage: f32,
    cannon_hits: u8,
    mg_hits: u8,
    invulnerable: bool,
    destroyed: bool,
    repairing: bool,
    last_hit_protocol: Option<IrProtocol>,
    last_hit_team: Option<u8>,
}

impl CombatState {
    pub const fn new() -> Self {
        CombatState {
            damage: 0.0,
            cannon_hits: 0,
            mg_hits: 0,
            invulnerable: false,
            destroyed: false,
            repairing: false,
            last_hit_protocol: None,
            last_hit_team: None,
        }
    }

    pub fn damage_percent(&self) -> f32 {
        self.damage
    }

    pub fn cannon_hits(&self) -> u8 {
        self.cannon_hits
    }

    pub fn mg_hits(&self) -> u8 {
        self.mg_hits
    }

    /// Destroyed tanks are always invulnerable.
    pub fn is_invulnerable(&self) -> bool {
        self.invulnerable || self.destroyed
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn is_repairing(&self) -> bool {
        self.repairing
    }

    pub fn is_damaged(&self) -> bool {
        self.damage > 0.0
    }

    /// Protocol and team of the last hit taken.
    pub fn last_hit(&self) -> Option<(IrProtocol, Option<u8>)> {
        self.last_hit_protocol.map(|p| (p, self.last_hit_team))
    }

    pub(crate) fn set_invulnerable(&mut self, invulnerable: bool) {
        self.invulnerable = invulnerable;
    }

    pub fn take_cannon_hit(
        &mut self,
        amount: f32,
        protocol: IrProtocol,
        team: Option<u8>,
    ) -> Option<HitOutcome> {
        let outcome = self.take_hit(amount, protocol, team)?;
        self.cannon_hits = self.cannon_hits.saturating_add(1);
        Some(outcome)
    }

    pub fn take_mg_hit(
        &mut self,
        amount: f32,
        protocol: IrProtocol,
        team: Option<u8>,
    ) -> Option<HitOutcome> {
        let outcome = self.take_hit(amount, protocol, team)?;
        self.mg_hits = self.mg_hits.saturating_add(1);
        Some(outcome)
    }

    /// Applies `amount` of damage. Returns `None` while destroyed.
    fn take_hit(&mut self, amount: f32, protocol: IrProtocol, team: Option<u8>) -> Option<HitOutcome> {
        if self.destroyed {
            return None;
        }

        self.last_hit_protocol = Some(protocol);
        self.last_hit_team = team;
        self.damage = snap(self.damage + amount.max(0.0));

        if self.damage >= 100.0 {
            self.destroyed = true;
            self.repairing = false;
            Some(HitOutcome::Destroyed)
        } else {
            Some(HitOutcome::Damaged)
        }
    }

    /// Starts a repair. Only a damaged, live tank that is not repairing already can start one.
    pub fn start_repair(&mut self) -> bool {
        if self.destroyed || self.repairing || !self.is_damaged() {
            return false;
        }
        self.repairing = true;
        true
    }

    /// Stops an ongoing repair without restoring anything. Returns true if one was running.
    pub fn cancel_repair(&mut self) -> bool {
        core::mem::replace(&mut self.repairing, false)
    }

    /// Finishes an uninterrupted repair, removing `amount` of damage.
    pub fn complete_repair(&mut self, amount: f32) -> bool {
        if !self.cancel_repair() {
            return false;
        }
        self.damage = snap(self.damage - amount.max(0.0));
        true
    }

    /// Back to full health after being destroyed. Stays invulnerable until reception is
    /// restored.
    pub fn recover(&mut self) {
        *self = CombatState {
            invulnerable: true,
            last_hit_protocol: self.last_hit_protocol,
            last_hit_team: self.last_hit_team,
            ..CombatState::new()
        };
    }
}

impl Default for CombatState {
    fn default() -> Self {
        Self::new()
    }
}

/// Clamps to 0..=100, snapping float noise onto the bounds.
fn snap(damage: f32) -> f32 {
    if damage >= 100.0 - DAMAGE_EPSILON {
        100.0
    } else if damage <= DAMAGE_EPSILON {
        0.0
    } else {
        damage
    }
}

/// Percentage the drive motors are cut at `damage` percent.
pub fn speed_cut_percent(damage: f32, profile: DamageProfile) -> u8 {
    let damage = snap(damage);
    match profile {
        DamageProfile::Tamiya => {
            if damage <= 0.0 {
                0
            } else if damage <= 50.0 {
                50
            } else if damage < 100.0 {
                75
            } else {
                100
            }
        }
        DamageProfile::Linear => damage.round() as u8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIXTH: f32 = 100.0 / 6.0;

    #[test]
    fn tamiya_tiers() {
        assert_eq!(speed_cut_percent(0.0, DamageProfile::Tamiya), 0);
        assert_eq!(speed_cut_percent(16.7, DamageProfile::Tamiya), 50);
        assert_eq!(speed_cut_percent(50.0, DamageProfile::Tamiya), 50);
        assert_eq!(speed_cut_percent(83.3, DamageProfile::Tamiya), 75);
        assert_eq!(speed_cut_percent(100.0, DamageProfile::Tamiya), 100);
    }

    #[test]
    fn linear_follows_damage() {
        assert_eq!(speed_cut_percent(0.0, DamageProfile::Linear), 0);
        assert_eq!(speed_cut_percent(33.4, DamageProfile::Linear), 33);
        assert_eq!(speed_cut_percent(99.999, DamageProfile::Linear), 100);
    }

    #[test]
    fn damage_is_clamped_and_destroys_once() {
        let mut state = CombatState::new();
        let mut destroyed = 0;
        for _ in 0..20 {
            if state.take_cannon_hit(SIXTH, IrProtocol::Tamiya, None) == Some(HitOutcome::Destroyed) {
                destroyed += 1;
            }
            assert!((0.0..=100.0).contains(&state.damage_percent()));
        }
        assert_eq!(destroyed, 1);
        assert_eq!(state.damage_percent(), 100.0);
        assert_eq!(state.cannon_hits(), 6);
        assert!(state.is_invulnerable());
    }

    #[test]
    fn six_sixths_reach_exactly_one_hundred() {
        let mut state = CombatState::new();
        for _ in 0..5 {
            assert_eq!(
                state.take_cannon_hit(SIXTH, IrProtocol::Tamiya, None),
                Some(HitOutcome::Damaged)
            );
        }
        assert_eq!(
            state.take_cannon_hit(SIXTH, IrProtocol::Tamiya, None),
            Some(HitOutcome::Destroyed)
        );
    }

    #[test]
    fn repair_needs_damage() {
        let mut state = CombatState::new();
        assert!(!state.start_repair());

        state.take_mg_hit(4.0, IrProtocol::MachineGun, Some(1));
        assert!(state.start_repair());
        assert!(!state.start_repair());
        assert!(state.complete_repair(SIXTH));
        assert_eq!(state.damage_percent(), 0.0);
        assert!(!state.complete_repair(SIXTH));
    }

    #[test]
    fn cancelled_repair_restores_nothing() {
        let mut state = CombatState::new();
        state.take_cannon_hit(SIXTH, IrProtocol::Tamiya, None);
        state.start_repair();
        assert!(state.cancel_repair());
        assert!(!state.cancel_repair());
        assert!(!state.complete_repair(SIXTH));
        assert!((state.damage_percent() - SIXTH).abs() < 0.001);
    }

    #[test]
    fn recover_resets_but_stays_invulnerable() {
        let mut state = CombatState::new();
        state.take_cannon_hit(100.0, IrProtocol::OpenPanzer, Some(2));
        state.recover();
        assert!(!state.is_destroyed());
        assert_eq!(state.damage_percent(), 0.0);
        assert_eq!(state.cannon_hits(), 0);
        assert!(state.is_invulnerable());
        assert_eq!(state.last_hit(), Some((IrProtocol::OpenPanzer, Some(2))));
    }
}
