//! Participant interface
//!
//! One participant per side, human or automated, usually on the far end
//! of a network boundary. Every call here can fail with
//! `ConnectionLost`; blocking calls suspend the battle, non-blocking
//! ones are swallowed with a log by the engine.

mod auto;

pub use auto::AutoParticipant;

use serde::{Deserialize, Serialize};

use crate::battle::state::BattleOutcome;
use crate::core::error::Result;
use crate::core::types::{BattleId, RegionId, Round, Side, UnitId};
use crate::dice::DiceRoll;
use crate::unit::Unit;

/// A blocking request to pick casualties from a volley
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CasualtyQuery {
    pub battle: BattleId,
    pub region: RegionId,
    /// The side whose units are hit and who therefore chooses
    pub side: Side,
    /// Hits to assign, already capped at what the candidates can absorb
    pub hits: u32,
    pub candidates: Vec<Unit>,
    /// The exact dice rolled, never re-rolled for display
    pub roll: DiceRoll,
}

/// The chooser's answer: who dies and who absorbs a non-lethal hit
///
/// A killed unit consumes its remaining hit points; each damaged unit
/// consumes one hit and must survive it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CasualtyDecision {
    pub killed: Vec<UnitId>,
    pub damaged: Vec<UnitId>,
}

/// Notification of committed casualties, shown to both sides
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CasualtyNotice {
    pub battle: BattleId,
    pub region: RegionId,
    /// The side that took the casualties
    pub losing_side: Side,
    pub killed: Vec<Unit>,
    pub damaged: Vec<UnitId>,
    pub roll: DiceRoll,
}

/// What kind of withdrawal is being offered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetreatMode {
    /// The whole attacking force leaves
    Full,
    /// Amphibious assault: only the air pulls out, staying in place
    AirOnly,
    /// Submarines slip away or submerge
    Submarines,
}

/// A blocking offer to withdraw
///
/// `destinations` is the complete legal set. The battle region's own id
/// in the set means withdrawing in place (submerging, or air standing
/// down from an amphibious assault). Answering with anything outside
/// the set counts as declining.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetreatQuery {
    pub battle: BattleId,
    pub region: RegionId,
    pub side: Side,
    pub mode: RetreatMode,
    pub destinations: Vec<RegionId>,
}

/// Final report pushed to both sides when a battle resolves
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleReport {
    pub battle: BattleId,
    pub region: RegionId,
    pub outcome: BattleOutcome,
    pub rounds: Round,
    pub attacker_value_lost: u32,
    pub defender_value_lost: u32,
    pub attacker_survivors: usize,
    pub defender_survivors: usize,
}

/// One side's decision maker
pub trait Participant {
    fn name(&self) -> &str;

    /// Blocking: choose casualties for a volley that hit this side
    fn select_casualties(&mut self, query: &CasualtyQuery) -> Result<CasualtyDecision>;

    /// Blocking: answer a withdrawal offer with a destination from the
    /// offered set, or None to stay
    fn choose_retreat(&mut self, query: &RetreatQuery) -> Result<Option<RegionId>>;

    /// Blocking for the losing side, best-effort for the winner
    fn acknowledge_casualties(&mut self, notice: &CasualtyNotice) -> Result<()>;

    /// Best-effort: the battle is over
    fn battle_ended(&mut self, report: &BattleReport) -> Result<()>;
}
