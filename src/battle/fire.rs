//! Volley specification and strength rules
//!
//! A fire phase expands into a roll/select/apply frame triple around a
//! `FireSpec` snapshot. Firer and target id lists are snapshotted at
//! expansion and re-filtered against the live pools when each frame
//! runs, so units destroyed in between never roll or absorb hits.

use serde::{Deserialize, Serialize};

use crate::core::types::{Side, UnitId};
use crate::dice::DieRequest;
use crate::rules::Ruleset;
use crate::unit::Unit;

use super::stack::BattleStep;
use super::state::Battle;

/// Anti-air guns hit each plane on this value or less
pub const AA_HIT_AT: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FireKind {
    /// One die per attacking air unit, casualties removed immediately
    AntiAir,
    /// Offshore support at bombard strength
    Bombard,
    /// Submarine first strike, casualties removed immediately
    Sneak,
    /// Regular volley, casualties return fire
    Standard,
}

/// Snapshot of one volley
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FireSpec {
    pub firing_side: Side,
    pub kind: FireKind,
    pub firers: Vec<UnitId>,
    pub targets: Vec<UnitId>,
    pub return_fire: bool,
}

impl FireSpec {
    /// The side that takes the hits and chooses the casualties
    pub fn chooser(&self) -> Side {
        self.firing_side.opponent()
    }

    /// The three frames that resolve this volley, in run order
    pub fn steps(self) -> Vec<BattleStep> {
        vec![
            BattleStep::RollDice(self.clone()),
            BattleStep::SelectCasualties(self.clone()),
            BattleStep::ApplyCasualties(self),
        ]
    }
}

/// Effective strength of a unit firing for `side`.
///
/// Transports are the one ruleset-dependent case: no combat value under
/// the noncombat toggle, defense 1 without it.
pub fn combat_strength(unit: &Unit, side: Side, rules: &Ruleset) -> u8 {
    if unit.unit_type.is_transport() {
        if !rules.transports_noncombat && side == Side::Defender {
            return 1;
        }
        return 0;
    }
    unit.strength(side)
}

/// Firers from the spec that are still able to fire.
///
/// Sneak firers must still be in the active pool; a submarine that was
/// destroyed before its first strike has lost it. Regular firers shoot
/// from the awaiting-death pool too.
pub fn live_firers<'a>(battle: &'a Battle, spec: &FireSpec) -> Vec<&'a Unit> {
    let side = spec.firing_side;
    match spec.kind {
        FireKind::Bombard => battle
            .bombarding_units
            .iter()
            .filter(|u| spec.firers.contains(&u.id))
            .collect(),
        FireKind::Sneak | FireKind::AntiAir => battle
            .units(side)
            .iter()
            .filter(|u| spec.firers.contains(&u.id))
            .collect(),
        FireKind::Standard => battle
            .units(side)
            .iter()
            .chain(battle.awaiting_death(side).iter())
            .filter(|u| spec.firers.contains(&u.id))
            .collect(),
    }
}

/// Targets from the spec still standing in the enemy active pool
pub fn live_targets<'a>(battle: &'a Battle, spec: &FireSpec) -> Vec<&'a Unit> {
    battle
        .units(spec.chooser())
        .iter()
        .filter(|u| spec.targets.contains(&u.id))
        .collect()
}

/// Owned snapshots of the eligible casualties, for the query payload
pub fn casualty_candidates(battle: &Battle, spec: &FireSpec) -> Vec<Unit> {
    live_targets(battle, spec).into_iter().cloned().collect()
}

/// Builds the dice requests for this volley.
///
/// Anti-air fire rolls one die per targeted plane; everything else
/// rolls one die per firer with strength.
pub fn die_requests(battle: &Battle, spec: &FireSpec, rules: &Ruleset) -> Vec<DieRequest> {
    match spec.kind {
        FireKind::AntiAir => {
            if live_firers(battle, spec).is_empty() {
                return Vec::new();
            }
            live_targets(battle, spec)
                .into_iter()
                .map(|target| DieRequest {
                    unit_type: target.unit_type,
                    strength: AA_HIT_AT,
                })
                .collect()
        }
        FireKind::Bombard => live_firers(battle, spec)
            .into_iter()
            .map(|firer| DieRequest {
                unit_type: firer.unit_type,
                strength: firer.unit_type.stats().bombard.unwrap_or(0),
            })
            .collect(),
        FireKind::Sneak | FireKind::Standard => live_firers(battle, spec)
            .into_iter()
            .map(|firer| DieRequest {
                unit_type: firer.unit_type,
                strength: combat_strength(firer, spec.firing_side, rules),
            })
            .filter(|req| req.strength > 0)
            .collect(),
    }
}
