//! Battle event log
//!
//! Structured record of everything that happened in a battle, one entry
//! per event with a display line. Dice land here verbatim so either
//! side can audit the rolls after the fact.

use serde::{Deserialize, Serialize};

use crate::core::types::{PlayerId, RegionId, Round, Side};
use crate::dice::DiceRoll;
use crate::unit::Unit;

use super::phases::CombatPhase;
use super::state::BattleOutcome;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleLogEntry {
    pub round: Round,
    pub event: BattleEvent,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BattleEvent {
    /// Opening manifest: the full rosters as the battle begins
    BattleStarted {
        region: RegionId,
        attackers: Vec<Unit>,
        defenders: Vec<Unit>,
    },
    PhaseStarted {
        phase: CombatPhase,
    },
    DiceRolled {
        side: Side,
        roll: DiceRoll,
    },
    CasualtiesSelected {
        side: Side,
        killed: usize,
        damaged: usize,
        auto: bool,
    },
    UnitsKilled {
        side: Side,
        count: usize,
    },
    NoncombatantsExcluded {
        count: usize,
    },
    RetreatOffered {
        side: Side,
        destinations: Vec<RegionId>,
    },
    Retreated {
        side: Side,
        destination: RegionId,
        count: usize,
    },
    Submerged {
        side: Side,
        count: usize,
    },
    InvalidRetreatIgnored {
        side: Side,
        destination: RegionId,
    },
    ControlTransferred {
        region: RegionId,
        new_owner: PlayerId,
    },
    BattleEnded {
        outcome: BattleOutcome,
        rounds: Round,
        attacker_value_lost: u32,
        defender_value_lost: u32,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BattleHistory {
    pub entries: Vec<BattleLogEntry>,
}

impl BattleHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, round: Round, event: BattleEvent, description: impl Into<String>) {
        self.entries.push(BattleLogEntry {
            round,
            event,
            description: description.into(),
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All dice rolled so far, in order, for fairness audit
    pub fn rolls(&self) -> impl Iterator<Item = &DiceRoll> {
        self.entries.iter().filter_map(|e| match &e.event {
            BattleEvent::DiceRolled { roll, .. } => Some(roll),
            _ => None,
        })
    }
}
