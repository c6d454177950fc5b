//! Carrier and cargo bookkeeping
//!
//! The relation is an explicit map keyed by carrier id with an owned,
//! ordered cargo list. Nothing here holds references into the pools;
//! cascades work off ids and owned unit data, which keeps the whole
//! battle serializable.

use serde::{Deserialize, Serialize};

use crate::core::types::{RegionId, UnitId};
use crate::unit::Unit;

/// A unit riding on (or delivered by) a carrier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarriedUnit {
    pub unit: Unit,
    /// Set once the cargo was put ashore in an allied region this turn.
    /// Delivered cargo survives its carrier and returns to this drop
    /// point instead of dying with it.
    pub delivered_to: Option<RegionId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependentEntry {
    pub carrier: UnitId,
    pub cargo: Vec<CarriedUnit>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependentTracker {
    entries: Vec<DependentEntry>,
}

impl DependentTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Puts a unit aboard a carrier, keeping load order
    pub fn load(&mut self, carrier: UnitId, unit: Unit) {
        match self.entries.iter_mut().find(|e| e.carrier == carrier) {
            Some(entry) => entry.cargo.push(CarriedUnit {
                unit,
                delivered_to: None,
            }),
            None => self.entries.push(DependentEntry {
                carrier,
                cargo: vec![CarriedUnit {
                    unit,
                    delivered_to: None,
                }],
            }),
        }
    }

    /// Records that a cargo unit was put ashore at `region` this turn
    pub fn mark_delivered(&mut self, carrier: UnitId, unit: UnitId, region: RegionId) -> bool {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.carrier == carrier) {
            if let Some(carried) = entry.cargo.iter_mut().find(|c| c.unit.id == unit) {
                carried.delivered_to = Some(region);
                return true;
            }
        }
        false
    }

    pub fn cargo_of(&self, carrier: UnitId) -> &[CarriedUnit] {
        self.entries
            .iter()
            .find(|e| e.carrier == carrier)
            .map(|e| e.cargo.as_slice())
            .unwrap_or(&[])
    }

    pub fn has_cargo(&self, carrier: UnitId) -> bool {
        !self.cargo_of(carrier).is_empty()
    }

    /// Takes the whole entry for a carrier leaving the battle
    pub fn remove_carrier(&mut self, carrier: UnitId) -> Option<DependentEntry> {
        let idx = self.entries.iter().position(|e| e.carrier == carrier)?;
        Some(self.entries.remove(idx))
    }

    /// Drains every entry, in load order, for battle finalization
    pub fn take_all(&mut self) -> Vec<DependentEntry> {
        std::mem::take(&mut self.entries)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every cargo unit still tracked, aboard or delivered
    pub fn all_cargo(&self) -> impl Iterator<Item = &CarriedUnit> {
        self.entries.iter().flat_map(|e| e.cargo.iter())
    }
}

/// Pending battles elsewhere that count on units from this one.
///
/// When a dependent dies, retreats, or submerges here, the registry is
/// told to drop it from whatever force was waiting on it.
pub trait DependentBattleRegistry {
    fn remove_dependents(&mut self, units: &[UnitId]);
}

/// No-op registry for battles nothing else depends on
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDependentBattles;

impl DependentBattleRegistry for NoDependentBattles {
    fn remove_dependents(&mut self, _units: &[UnitId]) {}
}
