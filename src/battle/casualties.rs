//! Casualty selection
//!
//! Pure decision logic: the automatic selection, the by-lot draw for
//! anti-air fire, and validation of participant decisions. Committing
//! a decision to the pools is the engine's job.
//!
//! Hit accounting: a killed unit consumes its full remaining hit
//! points, each damaged entry consumes one hit, and a unit never
//! appears in both lists.

use crate::dice::DiceRoller;
use crate::player::CasualtyDecision;
use crate::unit::Unit;

/// Total hits the candidates can absorb before all dying
pub fn total_capacity(candidates: &[Unit]) -> u32 {
    candidates.iter().map(|u| u.remaining_hits() as u32).sum()
}

/// Everything dies; used when hits cover the whole group
pub fn select_all(candidates: &[Unit]) -> CasualtyDecision {
    CasualtyDecision {
        killed: candidates.iter().map(|u| u.id).collect(),
        damaged: Vec::new(),
    }
}

/// Default selection: absorb hits on multi-hit-point units first, then
/// kill cheapest-first
pub fn auto_select(candidates: &[Unit], hits: u32) -> CasualtyDecision {
    let mut budget = hits.min(total_capacity(candidates));
    let mut damaged = Vec::new();

    // Absorb pass: every non-lethal hit a unit can take is free
    let mut sim: Vec<u8> = candidates.iter().map(|u| u.remaining_hits()).collect();
    for (i, rem) in sim.iter_mut().enumerate() {
        while *rem > 1 && budget > 0 {
            *rem -= 1;
            budget -= 1;
            damaged.push(candidates[i].id);
        }
    }

    // Kill pass: cheapest first, converting tentative damage into a
    // kill where the same unit is chosen
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by_key(|&i| (candidates[i].unit_type.stats().cost, i));
    let mut killed = Vec::new();
    for &i in &order {
        if budget == 0 {
            break;
        }
        let id = candidates[i].id;
        let tentative = damaged.iter().filter(|&&d| d == id).count() as u32;
        let extra = candidates[i].remaining_hits() as u32 - tentative;
        if extra <= budget {
            damaged.retain(|&d| d != id);
            killed.push(id);
            budget -= extra;
        }
    }

    CasualtyDecision { killed, damaged }
}

/// Draws casualties by lot; used for anti-air fire under the random
/// casualties toggle. Candidates are planes, so a draw always kills.
pub fn random_selection(
    candidates: &[Unit],
    hits: u32,
    roller: &mut DiceRoller,
) -> CasualtyDecision {
    let drawn = roller.draw_lots(hits as usize, candidates.len());
    CasualtyDecision {
        killed: drawn.into_iter().map(|i| candidates[i].id).collect(),
        damaged: Vec::new(),
    }
}

/// Checks a participant's decision against the candidates and the
/// capped hit count
pub fn validate(candidates: &[Unit], hits: u32, decision: &CasualtyDecision) -> bool {
    let find = |id| candidates.iter().find(|u| u.id == id);

    let mut assigned: u32 = 0;
    for (i, &id) in decision.killed.iter().enumerate() {
        let Some(unit) = find(id) else {
            return false;
        };
        if decision.killed[..i].contains(&id) || decision.damaged.contains(&id) {
            return false;
        }
        assigned += unit.remaining_hits() as u32;
    }

    for &id in &decision.damaged {
        let Some(unit) = find(id) else {
            return false;
        };
        let occurrences = decision.damaged.iter().filter(|&&d| d == id).count() as u8;
        // A damaged unit must survive every hit assigned to it
        if occurrences >= unit.remaining_hits() {
            return false;
        }
    }
    assigned += decision.damaged.len() as u32;

    assigned == hits.min(total_capacity(candidates))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::PlayerId;
    use crate::unit::UnitType;

    fn fleet() -> Vec<Unit> {
        let owner = PlayerId(2);
        vec![
            Unit::new(UnitType::Battleship, owner),
            Unit::new(UnitType::Destroyer, owner),
            Unit::new(UnitType::Transport, owner),
        ]
    }

    #[test]
    fn test_capacity_counts_remaining_hits() {
        let mut units = fleet();
        assert_eq!(total_capacity(&units), 4);
        units[0].hits_taken = 1;
        assert_eq!(total_capacity(&units), 3);
    }

    #[test]
    fn test_auto_absorbs_before_killing() {
        let units = fleet();
        let decision = auto_select(&units, 1);
        assert!(decision.killed.is_empty());
        assert_eq!(decision.damaged, vec![units[0].id]);
    }

    #[test]
    fn test_auto_kills_cheapest_after_absorbing() {
        let units = fleet();
        let decision = auto_select(&units, 2);
        assert_eq!(decision.damaged, vec![units[0].id]);
        // Transport (7) is cheaper than destroyer (8)
        assert_eq!(decision.killed, vec![units[2].id]);
    }

    #[test]
    fn test_auto_converts_damage_to_kill() {
        let owner = PlayerId(2);
        let units = vec![Unit::new(UnitType::Battleship, owner)];
        let decision = auto_select(&units, 2);
        assert_eq!(decision.killed, vec![units[0].id]);
        assert!(decision.damaged.is_empty());
    }

    #[test]
    fn test_auto_overkill_takes_everything() {
        let units = fleet();
        let decision = auto_select(&units, 99);
        assert_eq!(decision.killed.len(), 3);
        assert!(decision.damaged.is_empty());
    }

    #[test]
    fn test_validate_accepts_exact_assignment() {
        let units = fleet();
        let decision = CasualtyDecision {
            killed: vec![units[1].id],
            damaged: vec![units[0].id],
        };
        assert!(validate(&units, 2, &decision));
    }

    #[test]
    fn test_validate_rejects_wrong_total() {
        let units = fleet();
        let decision = CasualtyDecision {
            killed: vec![units[1].id],
            damaged: Vec::new(),
        };
        assert!(!validate(&units, 2, &decision));
    }

    #[test]
    fn test_validate_rejects_unknown_unit() {
        let units = fleet();
        let decision = CasualtyDecision {
            killed: vec![Unit::new(UnitType::Submarine, PlayerId(2)).id],
            damaged: Vec::new(),
        };
        assert!(!validate(&units, 1, &decision));
    }

    #[test]
    fn test_validate_rejects_killed_and_damaged_overlap() {
        let units = fleet();
        let decision = CasualtyDecision {
            killed: vec![units[0].id],
            damaged: vec![units[0].id],
        };
        assert!(!validate(&units, 3, &decision));
    }

    #[test]
    fn test_validate_rejects_lethal_damage_entry() {
        let units = fleet();
        // Destroyer has one hit point; marking it damaged would be a kill
        let decision = CasualtyDecision {
            killed: Vec::new(),
            damaged: vec![units[1].id],
        };
        assert!(!validate(&units, 1, &decision));
    }

    #[test]
    fn test_random_selection_draws_exactly() {
        let owner = PlayerId(1);
        let planes: Vec<Unit> = (0..4).map(|_| Unit::new(UnitType::Fighter, owner)).collect();
        let mut roller = DiceRoller::seeded(11);
        let decision = random_selection(&planes, 2, &mut roller);
        assert_eq!(decision.killed.len(), 2);
        assert!(decision.damaged.is_empty());
        assert!(validate(&planes, 2, &decision));
    }
}
