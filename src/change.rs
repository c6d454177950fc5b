//! Replayable change records
//!
//! Every mutation a battle makes to the wider game flows through the
//! change sink as a discrete record: removals, relocations, damage
//! marks, submerges, ownership transfers. A dependent cascade lands in
//! one record so downstream consumers see it atomically.

use serde::{Deserialize, Serialize};

use crate::core::types::{PlayerId, RegionId, Side, UnitId};

/// One committed mutation to game state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Change {
    /// Units destroyed in battle, carriers and their doomed cargo
    /// together in a single record
    UnitsRemoved {
        region: RegionId,
        side: Side,
        units: Vec<UnitId>,
    },

    /// Units relocated (retreats, delivered cargo returning to its
    /// drop point). Equal endpoints mark aircraft standing down in
    /// the battle region itself.
    UnitsMoved {
        from: RegionId,
        to: RegionId,
        units: Vec<UnitId>,
    },

    /// A multi-hit-point unit absorbed a non-lethal hit
    UnitDamaged { unit: UnitId, hits_taken: u8 },

    /// Submarines left the battle but stayed in the region
    UnitsSubmerged { region: RegionId, units: Vec<UnitId> },

    /// A land region changed hands after a clean attacker victory
    ControlTransferred {
        region: RegionId,
        new_owner: PlayerId,
    },

    /// Noncombatant units standing in a captured region switch owners
    UnitsCaptured {
        region: RegionId,
        units: Vec<UnitId>,
        new_owner: PlayerId,
    },
}

/// Receives committed changes in order
pub trait ChangeSink {
    fn apply(&mut self, change: Change);
}

/// The default sink: an ordered, replayable ledger
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangeLedger {
    pub changes: Vec<Change>,
}

impl ChangeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// All removal records, in commit order
    pub fn removals(&self) -> impl Iterator<Item = &Change> {
        self.changes
            .iter()
            .filter(|c| matches!(c, Change::UnitsRemoved { .. }))
    }
}

impl ChangeSink for ChangeLedger {
    fn apply(&mut self, change: Change) {
        self.changes.push(change);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::UnitId;

    #[test]
    fn test_ledger_preserves_order() {
        let mut ledger = ChangeLedger::new();
        let unit = UnitId::new();
        ledger.apply(Change::UnitDamaged {
            unit,
            hits_taken: 1,
        });
        ledger.apply(Change::UnitsRemoved {
            region: RegionId(0),
            side: Side::Defender,
            units: vec![unit],
        });
        assert_eq!(ledger.len(), 2);
        assert!(matches!(ledger.changes[0], Change::UnitDamaged { .. }));
        assert_eq!(ledger.removals().count(), 1);
    }
}
