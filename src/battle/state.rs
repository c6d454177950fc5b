//! The serializable battle aggregate
//!
//! Everything a suspended battle needs to resume lives here: the pools,
//! the continuation stack, the current round's phase list, and the
//! posted artifacts of an interrupted fire cycle. The dice generator is
//! deliberately absent; it belongs to the engine.

use serde::{Deserialize, Serialize};

use crate::core::error::{EngineError, Result};
use crate::core::types::{Alliances, BattleId, PlayerId, RegionId, Round, Side, UnitId};
use crate::dice::DiceRoll;
use crate::map::GameMap;
use crate::player::{CasualtyDecision, CasualtyNotice};
use crate::unit::Unit;

use super::dependents::DependentTracker;
use super::phases::CombatPhase;
use super::stack::ExecutionStack;

/// Lifecycle of a battle; transitions are monotonic and Resolved is
/// terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BattleStatus {
    #[default]
    NotStarted,
    InProgress,
    Resolved,
}

/// How a battle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BattleOutcome {
    AttackerVictory,
    DefenderVictory,
    AttackerWithdrew,
    Stalemate,
}

/// A casualty decision posted by the select step for the apply step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostedDecision {
    pub decision: CasualtyDecision,
    /// True when an override or fallback chose, not the participant
    pub auto: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Battle {
    pub id: BattleId,
    pub region: RegionId,
    pub water: bool,
    pub attacker: PlayerId,
    pub defender: PlayerId,
    pub status: BattleStatus,
    pub round: Round,
    pub amphibious: bool,
    /// Units that came ashore from transports this turn
    pub amphibious_units: Vec<UnitId>,

    pub attacking_units: Vec<Unit>,
    pub defending_units: Vec<Unit>,
    pub attacking_awaiting_death: Vec<Unit>,
    pub defending_awaiting_death: Vec<Unit>,
    /// Offshore support; fires in round 1, never joins the melee
    pub bombarding_units: Vec<Unit>,
    /// Sea zone the bombarding ships return to at resolution
    pub bombard_from: Option<RegionId>,
    pub excluded_attacking: Vec<Unit>,
    pub excluded_defending: Vec<Unit>,
    pub killed_attacking: Vec<Unit>,
    pub killed_defending: Vec<Unit>,
    pub withdrawn_attacking: Vec<Unit>,
    pub withdrawn_defending: Vec<Unit>,

    pub dependents: DependentTracker,
    pub stack: ExecutionStack,
    /// Phase list of the round currently executing
    pub current_phases: Vec<CombatPhase>,

    /// Posted by the roll step, consumed by the apply step
    pub pending_roll: Option<DiceRoll>,
    /// Posted by the select step, consumed by the apply step
    pub pending_decision: Option<PostedDecision>,
    /// Posted by the apply step until acknowledgements finish
    pub pending_notice: Option<CasualtyNotice>,

    pub outcome: Option<BattleOutcome>,
}

impl Battle {
    pub fn new(region: RegionId, water: bool, attacker: PlayerId, defender: PlayerId) -> Self {
        Self {
            id: BattleId::new(),
            region,
            water,
            attacker,
            defender,
            status: BattleStatus::NotStarted,
            round: 0,
            amphibious: false,
            amphibious_units: Vec::new(),
            attacking_units: Vec::new(),
            defending_units: Vec::new(),
            attacking_awaiting_death: Vec::new(),
            defending_awaiting_death: Vec::new(),
            bombarding_units: Vec::new(),
            bombard_from: None,
            excluded_attacking: Vec::new(),
            excluded_defending: Vec::new(),
            killed_attacking: Vec::new(),
            killed_defending: Vec::new(),
            withdrawn_attacking: Vec::new(),
            withdrawn_defending: Vec::new(),
            dependents: DependentTracker::new(),
            stack: ExecutionStack::new(),
            current_phases: Vec::new(),
            pending_roll: None,
            pending_decision: None,
            pending_notice: None,
            outcome: None,
        }
    }

    /// Builds a battle by draining the contested region's occupants and
    /// splitting them by allegiance to the attacker
    pub fn assemble(
        map: &mut GameMap,
        region: RegionId,
        attacker: PlayerId,
        defender: PlayerId,
        alliances: &Alliances,
    ) -> Result<Self> {
        let water = map
            .region(region)
            .map(|r| r.water)
            .ok_or(EngineError::RegionNotFound(region))?;
        let mut battle = Self::new(region, water, attacker, defender);
        for unit in map.drain_occupants(region) {
            if alliances.is_allied(unit.owner, attacker) {
                battle.attacking_units.push(unit);
            } else {
                battle.defending_units.push(unit);
            }
        }
        Ok(battle)
    }

    /// Attaches offshore bombardment support firing from `from`
    pub fn with_bombardment(&mut self, units: Vec<Unit>, from: RegionId) {
        self.bombarding_units.extend(units);
        self.bombard_from = Some(from);
    }

    /// Marks the battle amphibious, recording which units came ashore
    pub fn mark_amphibious(&mut self, landed: Vec<UnitId>) {
        self.amphibious = true;
        self.amphibious_units = landed;
    }

    pub fn add_attacker(&mut self, unit: Unit) {
        self.attacking_units.push(unit);
    }

    pub fn add_defender(&mut self, unit: Unit) {
        self.defending_units.push(unit);
    }

    pub fn player(&self, side: Side) -> PlayerId {
        match side {
            Side::Attacker => self.attacker,
            Side::Defender => self.defender,
        }
    }

    pub fn units(&self, side: Side) -> &Vec<Unit> {
        match side {
            Side::Attacker => &self.attacking_units,
            Side::Defender => &self.defending_units,
        }
    }

    pub fn units_mut(&mut self, side: Side) -> &mut Vec<Unit> {
        match side {
            Side::Attacker => &mut self.attacking_units,
            Side::Defender => &mut self.defending_units,
        }
    }

    pub fn awaiting_death(&self, side: Side) -> &Vec<Unit> {
        match side {
            Side::Attacker => &self.attacking_awaiting_death,
            Side::Defender => &self.defending_awaiting_death,
        }
    }

    pub fn awaiting_death_mut(&mut self, side: Side) -> &mut Vec<Unit> {
        match side {
            Side::Attacker => &mut self.attacking_awaiting_death,
            Side::Defender => &mut self.defending_awaiting_death,
        }
    }

    pub fn killed_mut(&mut self, side: Side) -> &mut Vec<Unit> {
        match side {
            Side::Attacker => &mut self.killed_attacking,
            Side::Defender => &mut self.killed_defending,
        }
    }

    pub fn killed(&self, side: Side) -> &Vec<Unit> {
        match side {
            Side::Attacker => &self.killed_attacking,
            Side::Defender => &self.killed_defending,
        }
    }

    pub fn withdrawn_mut(&mut self, side: Side) -> &mut Vec<Unit> {
        match side {
            Side::Attacker => &mut self.withdrawn_attacking,
            Side::Defender => &mut self.withdrawn_defending,
        }
    }

    pub fn withdrawn(&self, side: Side) -> &Vec<Unit> {
        match side {
            Side::Attacker => &self.withdrawn_attacking,
            Side::Defender => &self.withdrawn_defending,
        }
    }

    pub fn excluded_mut(&mut self, side: Side) -> &mut Vec<Unit> {
        match side {
            Side::Attacker => &mut self.excluded_attacking,
            Side::Defender => &mut self.excluded_defending,
        }
    }

    pub fn excluded(&self, side: Side) -> &Vec<Unit> {
        match side {
            Side::Attacker => &self.excluded_attacking,
            Side::Defender => &self.excluded_defending,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status == BattleStatus::Resolved
    }

    /// Destroyer presence counts the dying: a destroyer in the
    /// awaiting-death pool still negates sneak attacks this round
    pub fn has_destroyer(&self, side: Side) -> bool {
        self.units(side)
            .iter()
            .chain(self.awaiting_death(side).iter())
            .any(|u| u.unit_type.is_destroyer())
    }

    /// Looks a unit up in the side's active pool
    pub fn find_active(&self, side: Side, id: UnitId) -> Option<&Unit> {
        self.units(side).iter().find(|u| u.id == id)
    }

    /// Finds a unit in the side's active or awaiting-death pool
    pub fn find_live_mut(&mut self, side: Side, id: UnitId) -> Option<&mut Unit> {
        match side {
            Side::Attacker => self
                .attacking_units
                .iter_mut()
                .chain(self.attacking_awaiting_death.iter_mut())
                .find(|u| u.id == id),
            Side::Defender => self
                .defending_units
                .iter_mut()
                .chain(self.defending_awaiting_death.iter_mut())
                .find(|u| u.id == id),
        }
    }

    /// Removes the listed units from the side's active pool, keeping
    /// pool order
    pub fn take_from_active(&mut self, side: Side, ids: &[UnitId]) -> Vec<Unit> {
        let pool = self.units_mut(side);
        let mut taken = Vec::new();
        let mut kept = Vec::with_capacity(pool.len());
        for unit in pool.drain(..) {
            if ids.contains(&unit.id) {
                taken.push(unit);
            } else {
                kept.push(unit);
            }
        }
        *pool = kept;
        taken
    }

    /// Every unit a side ever committed, across all pools and records.
    /// Cargo is tracked separately by the dependent tracker.
    pub fn committed_count(&self, side: Side) -> usize {
        self.units(side).len()
            + self.awaiting_death(side).len()
            + self.excluded(side).len()
            + self.killed(side).len()
            + self.withdrawn(side).len()
    }
}
