//! Combat phase resolution
//!
//! `phases_for_round` recomputes the phase list at the start of every
//! round from the current pools and the ruleset, so killing the last
//! anti-air gun, destroyer, or submarine changes later rounds' lists.

use serde::{Deserialize, Serialize};

use crate::core::types::Side;
use crate::rules::Ruleset;

use super::fire::combat_strength;
use super::state::Battle;

/// One phase of a combat round, in the order they run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombatPhase {
    /// Defender anti-air guns fire at attacking air, one die per plane
    AntiAirFire,
    /// Offshore naval support fires into the first round of an
    /// amphibious assault
    Bombardment,
    /// Infrastructure, and land units caught in a sea fight, are pulled
    /// out of the fighting pools
    RemoveNoncombatants,
    /// Submarine first strike; casualties never return fire
    SneakAttack(Side),
    /// The side's regular volley; casualties return fire before removal
    MainFire(Side),
    /// Both awaiting-death pools are emptied
    ClearCasualties,
    /// The side's submarines may submerge or slip away
    SubsWithdraw(Side),
    /// The attacker may pull the whole force out
    AttackerRetreat,
    /// Amphibious attackers may pull their air out, staying in place
    AirRetreat,
}

impl CombatPhase {
    /// True for phases that can inflict hits
    pub fn is_fire(&self) -> bool {
        matches!(
            self,
            CombatPhase::AntiAirFire
                | CombatPhase::Bombardment
                | CombatPhase::SneakAttack(_)
                | CombatPhase::MainFire(_)
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            CombatPhase::AntiAirFire => "anti-air fire",
            CombatPhase::Bombardment => "bombardment",
            CombatPhase::RemoveNoncombatants => "remove noncombatants",
            CombatPhase::SneakAttack(Side::Attacker) => "attacker sneak attack",
            CombatPhase::SneakAttack(Side::Defender) => "defender sneak attack",
            CombatPhase::MainFire(Side::Attacker) => "attacker fire",
            CombatPhase::MainFire(Side::Defender) => "defender fire",
            CombatPhase::ClearCasualties => "clear casualties",
            CombatPhase::SubsWithdraw(Side::Attacker) => "attacker submarine withdrawal",
            CombatPhase::SubsWithdraw(Side::Defender) => "defender submarine withdrawal",
            CombatPhase::AttackerRetreat => "attacker retreat",
            CombatPhase::AirRetreat => "air retreat",
        }
    }
}

/// Builds the phase list for the round the battle is about to fight
pub fn phases_for_round(battle: &Battle, rules: &Ruleset) -> Vec<CombatPhase> {
    let mut phases = Vec::new();

    let attacker_air = battle
        .units(Side::Attacker)
        .iter()
        .any(|u| u.unit_type.is_air());
    let defender_aa = battle
        .units(Side::Defender)
        .iter()
        .any(|u| u.unit_type.is_anti_air());
    if !battle.water && attacker_air && defender_aa {
        phases.push(CombatPhase::AntiAirFire);
    }

    if !battle.water && battle.round == 1 && !battle.bombarding_units.is_empty() {
        phases.push(CombatPhase::Bombardment);
    }

    let noncombatants_present = battle
        .units(Side::Attacker)
        .iter()
        .chain(battle.units(Side::Defender).iter())
        .any(|u| u.unit_type.is_noncombatant(battle.water));
    if noncombatants_present {
        phases.push(CombatPhase::RemoveNoncombatants);
    }

    let attacker_subs = battle
        .units(Side::Attacker)
        .iter()
        .any(|u| u.unit_type.is_submarine());
    let defender_subs = battle
        .units(Side::Defender)
        .iter()
        .any(|u| u.unit_type.is_submarine());

    let sneak_attacker = attacker_subs && !battle.has_destroyer(Side::Defender);
    let sneak_defender =
        rules.defender_sneak_attack && defender_subs && !battle.has_destroyer(Side::Attacker);
    if sneak_attacker {
        phases.push(CombatPhase::SneakAttack(Side::Attacker));
    }
    if sneak_defender {
        phases.push(CombatPhase::SneakAttack(Side::Defender));
    }

    if side_fires_in_main(battle, Side::Attacker, sneak_attacker, rules) {
        phases.push(CombatPhase::MainFire(Side::Attacker));
    }
    if side_fires_in_main(battle, Side::Defender, sneak_defender, rules) {
        phases.push(CombatPhase::MainFire(Side::Defender));
    }

    let any_fire = phases.iter().any(CombatPhase::is_fire);
    if any_fire
        || !battle.awaiting_death(Side::Attacker).is_empty()
        || !battle.awaiting_death(Side::Defender).is_empty()
    {
        phases.push(CombatPhase::ClearCasualties);
    }

    if battle.water {
        if attacker_subs && !battle.has_destroyer(Side::Defender) {
            phases.push(CombatPhase::SubsWithdraw(Side::Attacker));
        }
        if defender_subs && !battle.has_destroyer(Side::Attacker) {
            phases.push(CombatPhase::SubsWithdraw(Side::Defender));
        }
    }

    if battle.amphibious {
        if attacker_air {
            phases.push(CombatPhase::AirRetreat);
        }
    } else {
        phases.push(CombatPhase::AttackerRetreat);
    }

    phases
}

/// A side fires in its regular phase when anything in its active or
/// awaiting-death pool still has strength there. Submarines only count
/// in rounds where their sneak phase was negated.
fn side_fires_in_main(battle: &Battle, side: Side, sneak_scheduled: bool, rules: &Ruleset) -> bool {
    battle
        .units(side)
        .iter()
        .chain(battle.awaiting_death(side).iter())
        .filter(|u| !(sneak_scheduled && u.unit_type.is_submarine()))
        .any(|u| combat_strength(u, side, rules) > 0)
}
