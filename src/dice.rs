//! Shared dice source
//!
//! One seeded generator serves both sides of a battle, so the rolls a
//! casualty query shows are the rolls that were made. Every roll is
//! kept as an immutable record for history and fairness audit.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::unit::UnitType;

/// Sides on a combat die
pub const DIE_SIDES: u8 = 6;

/// One die asked for: which unit rolls it and the strength it hits at
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DieRequest {
    pub unit_type: UnitType,
    pub strength: u8,
}

/// An individual rolled die
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DieRoll {
    pub unit_type: UnitType,
    pub strength: u8,
    pub value: u8,
    pub hit: bool,
}

/// Immutable record of one volley's dice
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceRoll {
    pub dice: Vec<DieRoll>,
}

impl DiceRoll {
    pub fn hits(&self) -> u32 {
        self.dice.iter().filter(|d| d.hit).count() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.dice.is_empty()
    }
}

/// Seeded dice generator owned by the engine, never by battle state
#[derive(Debug)]
pub struct DiceRoller {
    rng: ChaCha8Rng,
}

impl DiceRoller {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: ChaCha8Rng::from_entropy(),
        }
    }

    /// Rolls one die per request, hit on value <= strength
    pub fn roll(&mut self, requests: &[DieRequest]) -> DiceRoll {
        let dice = requests
            .iter()
            .map(|req| {
                let value = self.rng.gen_range(1..=DIE_SIDES);
                DieRoll {
                    unit_type: req.unit_type,
                    strength: req.strength,
                    value,
                    hit: value <= req.strength,
                }
            })
            .collect();
        DiceRoll { dice }
    }

    /// Draws `count` distinct indices from `0..pool` by lot
    pub fn draw_lots(&mut self, count: usize, pool: usize) -> Vec<usize> {
        let mut remaining: Vec<usize> = (0..pool).collect();
        let mut drawn = Vec::with_capacity(count.min(pool));
        while drawn.len() < count && !remaining.is_empty() {
            let pick = self.rng.gen_range(0..remaining.len());
            drawn.push(remaining.swap_remove(pick));
        }
        drawn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn requests(strengths: &[u8]) -> Vec<DieRequest> {
        strengths
            .iter()
            .map(|&s| DieRequest {
                unit_type: UnitType::Infantry,
                strength: s,
            })
            .collect()
    }

    #[test]
    fn test_same_seed_same_rolls() {
        let reqs = requests(&[2, 3, 4, 1, 2]);
        let a = DiceRoller::seeded(99).roll(&reqs);
        let b = DiceRoller::seeded(99).roll(&reqs);
        assert_eq!(a, b);
    }

    #[test]
    fn test_strength_six_always_hits() {
        let roll = DiceRoller::seeded(7).roll(&requests(&[DIE_SIDES; 20]));
        assert_eq!(roll.hits(), 20);
    }

    #[test]
    fn test_strength_zero_never_hits() {
        let roll = DiceRoller::seeded(7).roll(&requests(&[0; 20]));
        assert_eq!(roll.hits(), 0);
    }

    #[test]
    fn test_values_in_range() {
        let roll = DiceRoller::seeded(42).roll(&requests(&[3; 100]));
        assert!(roll.dice.iter().all(|d| (1..=DIE_SIDES).contains(&d.value)));
    }

    #[test]
    fn test_draw_lots_distinct() {
        let mut roller = DiceRoller::seeded(5);
        let drawn = roller.draw_lots(4, 10);
        assert_eq!(drawn.len(), 4);
        let mut sorted = drawn.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), 4);
    }

    #[test]
    fn test_draw_lots_capped_at_pool() {
        let mut roller = DiceRoller::seeded(5);
        assert_eq!(roller.draw_lots(9, 3).len(), 3);
    }
}
