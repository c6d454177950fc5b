//! Unit types and their combat statistics
//!
//! The catalog covers everything the battle rules reference: strengths,
//! hit points, domain, and the special-role flags (anti-air, bombard,
//! submarine, destroyer, carrier capacity).

use serde::{Deserialize, Serialize};

use crate::core::types::{PlayerId, UnitId};

/// Type of military unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitType {
    // Land
    Infantry,   // Cheap line unit
    Artillery,  // Support gun
    Armor,      // Armored division
    AntiAirGun, // Fires only at attacking air
    Factory,    // Infrastructure, never fights

    // Air
    Fighter,
    Bomber,

    // Sea
    Transport,  // Cargo ferry, no combat value under most rulesets
    Submarine,  // Sneak attack, may submerge
    Destroyer,  // Negates enemy sneak attacks
    Cruiser,    // Shore bombardment capable
    Carrier,    // Ferries fighters
    Battleship, // Two hit points, shore bombardment capable
}

/// Where a unit fights and moves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Domain {
    Land,
    Air,
    Sea,
}

/// Combat statistics for a unit type
#[derive(Debug, Clone)]
pub struct UnitStats {
    pub attack: u8,
    pub defense: u8,
    pub cost: u32, // Production cost, used for TUV accounting
    pub hit_points: u8,
    pub domain: Domain,
    pub bombard: Option<u8>, // Shore bombardment strength, if any
    pub anti_air: bool,
    pub infrastructure: bool,
    pub submarine: bool,
    pub destroyer: bool,
    pub transport_capacity: u8,
    pub carrier_capacity: u8,
}

impl UnitType {
    /// Combat statistics for this unit type
    pub fn stats(&self) -> UnitStats {
        let base = UnitStats {
            attack: 0,
            defense: 0,
            cost: 0,
            hit_points: 1,
            domain: Domain::Land,
            bombard: None,
            anti_air: false,
            infrastructure: false,
            submarine: false,
            destroyer: false,
            transport_capacity: 0,
            carrier_capacity: 0,
        };

        match self {
            UnitType::Infantry => UnitStats {
                attack: 1,
                defense: 2,
                cost: 3,
                ..base
            },

            UnitType::Artillery => UnitStats {
                attack: 2,
                defense: 2,
                cost: 4,
                ..base
            },

            UnitType::Armor => UnitStats {
                attack: 3,
                defense: 3,
                cost: 6,
                ..base
            },

            UnitType::AntiAirGun => UnitStats {
                cost: 5,
                anti_air: true,
                ..base
            },

            UnitType::Factory => UnitStats {
                cost: 15,
                infrastructure: true,
                ..base
            },

            UnitType::Fighter => UnitStats {
                attack: 3,
                defense: 4,
                cost: 10,
                domain: Domain::Air,
                ..base
            },

            UnitType::Bomber => UnitStats {
                attack: 4,
                defense: 1,
                cost: 12,
                domain: Domain::Air,
                ..base
            },

            UnitType::Transport => UnitStats {
                cost: 7,
                domain: Domain::Sea,
                transport_capacity: 2,
                ..base
            },

            UnitType::Submarine => UnitStats {
                attack: 2,
                defense: 1,
                cost: 6,
                domain: Domain::Sea,
                submarine: true,
                ..base
            },

            UnitType::Destroyer => UnitStats {
                attack: 2,
                defense: 2,
                cost: 8,
                domain: Domain::Sea,
                destroyer: true,
                ..base
            },

            UnitType::Cruiser => UnitStats {
                attack: 3,
                defense: 3,
                cost: 12,
                domain: Domain::Sea,
                bombard: Some(3),
                ..base
            },

            UnitType::Carrier => UnitStats {
                attack: 1,
                defense: 2,
                cost: 14,
                domain: Domain::Sea,
                carrier_capacity: 2,
                ..base
            },

            UnitType::Battleship => UnitStats {
                attack: 4,
                defense: 4,
                cost: 20,
                hit_points: 2,
                domain: Domain::Sea,
                bombard: Some(4),
                ..base
            },
        }
    }

    pub fn is_air(&self) -> bool {
        matches!(self, UnitType::Fighter | UnitType::Bomber)
    }

    pub fn is_sea(&self) -> bool {
        matches!(
            self,
            UnitType::Transport
                | UnitType::Submarine
                | UnitType::Destroyer
                | UnitType::Cruiser
                | UnitType::Carrier
                | UnitType::Battleship
        )
    }

    pub fn is_land(&self) -> bool {
        !self.is_air() && !self.is_sea()
    }

    pub fn is_submarine(&self) -> bool {
        matches!(self, UnitType::Submarine)
    }

    pub fn is_destroyer(&self) -> bool {
        matches!(self, UnitType::Destroyer)
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, UnitType::Transport)
    }

    pub fn is_anti_air(&self) -> bool {
        matches!(self, UnitType::AntiAirGun)
    }

    pub fn is_infrastructure(&self) -> bool {
        self.stats().infrastructure
    }

    /// Stands aside instead of fighting: infrastructure anywhere, and
    /// land units caught in a sea fight
    pub fn is_noncombatant(&self, water: bool) -> bool {
        self.is_infrastructure() || (water && self.is_land())
    }

    /// Can this unit fire shore bombardment into an amphibious assault?
    pub fn can_bombard(&self) -> bool {
        self.stats().bombard.is_some()
    }
}

/// A single unit committed to (or supporting) a battle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub unit_type: UnitType,
    pub owner: PlayerId,
    /// Hits absorbed so far; the unit dies when this reaches hit_points
    pub hits_taken: u8,
}

impl Unit {
    pub fn new(unit_type: UnitType, owner: PlayerId) -> Self {
        Self {
            id: UnitId::new(),
            unit_type,
            owner,
            hits_taken: 0,
        }
    }

    /// Hits this unit can still absorb before dying
    pub fn remaining_hits(&self) -> u8 {
        self.unit_type.stats().hit_points.saturating_sub(self.hits_taken)
    }

    pub fn is_damaged(&self) -> bool {
        self.hits_taken > 0
    }

    /// One more hit kills this unit
    pub fn next_hit_kills(&self) -> bool {
        self.remaining_hits() <= 1
    }

    /// Attack or defense strength depending on which side is rolling
    pub fn strength(&self, side: crate::core::types::Side) -> u8 {
        let stats = self.unit_type.stats();
        match side {
            crate::core::types::Side::Attacker => stats.attack,
            crate::core::types::Side::Defender => stats.defense,
        }
    }
}

/// Summed production cost of a group of units
pub fn total_unit_value(units: &[Unit]) -> u32 {
    units.iter().map(|u| u.unit_type.stats().cost).sum()
}
