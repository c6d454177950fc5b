//! Withdrawal legality and application
//!
//! Destinations are computed fresh at query time, never cached across a
//! suspension. Applying a withdrawal moves units (and their cargo) out
//! of the pools, onto the map, and into the withdrawn record in one
//! pass, emitting the change records as it goes.

use crate::change::{Change, ChangeSink};
use crate::core::types::{Alliances, RegionId, Side, UnitId};
use crate::map::GameMap;
use crate::rules::Ruleset;

use super::dependents::DependentBattleRegistry;
use super::state::Battle;

/// Where the whole attacking force may withdraw to
pub fn full_retreat_destinations(
    battle: &Battle,
    map: &GameMap,
    alliances: &Alliances,
) -> Vec<RegionId> {
    map.retreat_destinations(battle.region, battle.attacker, alliances, battle.water)
}

/// Where a side's submarines may go. The battle region itself leads the
/// list when submerging is allowed; answering with it means submerge in
/// place.
pub fn sub_withdrawal_destinations(
    battle: &Battle,
    map: &GameMap,
    alliances: &Alliances,
    rules: &Ruleset,
    side: Side,
) -> Vec<RegionId> {
    let mut destinations = Vec::new();
    if rules.submersible_subs {
        destinations.push(battle.region);
    }
    destinations.extend(map.retreat_destinations(
        battle.region,
        battle.player(side),
        alliances,
        true,
    ));
    destinations
}

/// Air pulling out of an amphibious assault stays in the region
pub fn air_retreat_destinations(battle: &Battle) -> Vec<RegionId> {
    vec![battle.region]
}

/// Relocates the whole attacking force and its cargo to `destination`.
/// Returns how many units left the pools.
pub fn apply_full_retreat(
    battle: &mut Battle,
    map: &mut GameMap,
    sink: &mut dyn ChangeSink,
    registry: &mut dyn DependentBattleRegistry,
    destination: RegionId,
) -> usize {
    let ids: Vec<UnitId> = battle.units(Side::Attacker).iter().map(|u| u.id).collect();
    withdraw_units(battle, map, sink, registry, Side::Attacker, &ids, destination, false)
}

/// Moves a side's submarines to `destination`, or submerges them in
/// place when the destination is the battle region. Returns the number
/// withdrawn and whether they submerged.
pub fn apply_sub_withdrawal(
    battle: &mut Battle,
    map: &mut GameMap,
    sink: &mut dyn ChangeSink,
    registry: &mut dyn DependentBattleRegistry,
    side: Side,
    destination: RegionId,
) -> (usize, bool) {
    let ids: Vec<UnitId> = battle
        .units(side)
        .iter()
        .filter(|u| u.unit_type.is_submarine())
        .map(|u| u.id)
        .collect();
    let submerged = destination == battle.region;
    let count = withdraw_units(battle, map, sink, registry, side, &ids, destination, submerged);
    (count, submerged)
}

/// Pulls the attacker's air out of an amphibious assault. The planes
/// stand down in place, recorded as a move with equal endpoints.
pub fn apply_air_retreat(
    battle: &mut Battle,
    map: &mut GameMap,
    sink: &mut dyn ChangeSink,
    registry: &mut dyn DependentBattleRegistry,
) -> usize {
    let ids: Vec<UnitId> = battle
        .units(Side::Attacker)
        .iter()
        .filter(|u| u.unit_type.is_air())
        .map(|u| u.id)
        .collect();
    let region = battle.region;
    withdraw_units(battle, map, sink, registry, Side::Attacker, &ids, region, false)
}

/// Shared withdrawal path. Cargo aboard a withdrawing carrier travels
/// with it; cargo already delivered returns to its drop point. One
/// record covers the carrier and everything riding on it.
fn withdraw_units(
    battle: &mut Battle,
    map: &mut GameMap,
    sink: &mut dyn ChangeSink,
    registry: &mut dyn DependentBattleRegistry,
    side: Side,
    ids: &[UnitId],
    destination: RegionId,
    submerge: bool,
) -> usize {
    let taken = battle.take_from_active(side, ids);
    if taken.is_empty() {
        return 0;
    }
    let count = taken.len();
    let origin = battle.region;

    let mut moving = Vec::with_capacity(taken.len());
    let mut moving_ids = Vec::with_capacity(taken.len());
    for unit in taken {
        if let Some(entry) = battle.dependents.remove_carrier(unit.id) {
            for carried in entry.cargo {
                match carried.delivered_to {
                    Some(drop_point) => {
                        sink.apply(Change::UnitsMoved {
                            from: origin,
                            to: drop_point,
                            units: vec![carried.unit.id],
                        });
                        registry.remove_dependents(&[carried.unit.id]);
                        map.place_units(drop_point, vec![carried.unit]);
                    }
                    None => {
                        moving_ids.push(carried.unit.id);
                        moving.push(carried.unit);
                    }
                }
            }
        }
        battle.withdrawn_mut(side).push(unit.clone());
        moving_ids.push(unit.id);
        moving.push(unit);
    }

    if submerge {
        sink.apply(Change::UnitsSubmerged {
            region: origin,
            units: moving_ids.clone(),
        });
    } else {
        sink.apply(Change::UnitsMoved {
            from: origin,
            to: destination,
            units: moving_ids.clone(),
        });
    }
    registry.remove_dependents(&moving_ids);
    map.place_units(destination, moving);

    count
}
