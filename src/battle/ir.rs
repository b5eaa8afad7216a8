//! IR battle protocols.
//!
//! Only identity and policy live here. Carrier, timing and bit encoding belong to the
//! [`IrLink`](crate::rc_control::traits::IrLink) implementation.

use crate::error::{ConfigError, Result};

/// IR battle codes the tank can send or accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IrProtocol {
    /// Tamiya cannon shot
    Tamiya,
    /// Tamiya code that destroys in two hits
    Tamiya2Shot,
    Taigen,
    HengLong,
    /// Cannon shot that carries the sender's team
    OpenPanzer,
    /// Repair code fired by repair vehicles, carries the team
    Repair,
    /// Machine gun burst, carries the team
    MachineGun,
    /// Broadcast of the firing tank's id, sent after a cannon shot
    TankId,
}

impl IrProtocol {
    /// Highest team id a team-aware payload can carry
    pub const MAX_TEAM: u8 = 3;

    /// Decodes a persisted protocol selection where 0 means "none".
    pub fn from_setting(value: u8) -> Result<Option<IrProtocol>> {
        match value {
            0 => Ok(None),
            v => IrProtocol::try_from(v).map(Some),
        }
    }

    /// True if the payload carries a team id.
    pub fn is_team_aware(self) -> bool {
        matches!(
            self,
            IrProtocol::OpenPanzer | IrProtocol::Repair | IrProtocol::MachineGun
        )
    }

    pub fn is_two_shot(self) -> bool {
        self == IrProtocol::Tamiya2Shot
    }

    /// The 1-shot/2-shot counterpart of a protocol. Transmitters often send both, so a receiver
    /// set up for one accepts the other too.
    pub fn shot_counterpart(self) -> Option<IrProtocol> {
        match self {
            IrProtocol::Tamiya => Some(IrProtocol::Tamiya2Shot),
            IrProtocol::Tamiya2Shot => Some(IrProtocol::Tamiya),
            _ => None,
        }
    }
}

impl TryFrom<u8> for IrProtocol {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(IrProtocol::Tamiya),
            2 => Ok(IrProtocol::Tamiya2Shot),
            3 => Ok(IrProtocol::Taigen),
            4 => Ok(IrProtocol::HengLong),
            5 => Ok(IrProtocol::OpenPanzer),
            6 => Ok(IrProtocol::Repair),
            7 => Ok(IrProtocol::MachineGun),
            8 => Ok(IrProtocol::TankId),
            _ => Err(ConfigError::IrProtocol(value)),
        }
    }
}
