//! Battle logic: cannon and machine gun sequencing, hit reception and damage.

pub mod damage;
pub mod events;
pub mod ir;
pub mod recoil;
pub mod tank;

pub use damage::{speed_cut_percent, CombatState, HitType};
pub use events::TankEvent;
pub use ir::IrProtocol;
pub use recoil::{RecoilActuator, RecoilMechanism, RecoilMotorState};
pub use tank::{CannonState, Tank};
