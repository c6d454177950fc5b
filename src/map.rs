//! Region graph consumed by the battle engine
//!
//! Holds only what battle resolution needs: adjacency, water flags,
//! restricted passages, per-region occupants, and region ownership.
//! Movement and turn sequencing live outside this crate; battles drain
//! a region's occupants into their pools and push survivors back.

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};

use crate::core::types::{Alliances, PlayerId, RegionId};
use crate::unit::Unit;

/// A land territory or sea zone
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Region {
    pub id: RegionId,
    pub name: String,
    pub water: bool,
    /// Controlling player; sea zones are never owned
    pub owner: Option<PlayerId>,
}

/// The map as the battle engine sees it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameMap {
    regions: AHashMap<RegionId, Region>,
    adjacency: AHashMap<RegionId, Vec<RegionId>>,
    /// Ordered pairs; a restricted passage is stored in both directions
    restricted: AHashSet<(RegionId, RegionId)>,
    occupants: AHashMap<RegionId, Vec<Unit>>,
    next_id: u32,
}

impl GameMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a land territory, returning its id
    pub fn add_land(&mut self, name: &str, owner: PlayerId) -> RegionId {
        self.add_region(name, false, Some(owner))
    }

    /// Adds a sea zone, returning its id
    pub fn add_sea(&mut self, name: &str) -> RegionId {
        self.add_region(name, true, None)
    }

    fn add_region(&mut self, name: &str, water: bool, owner: Option<PlayerId>) -> RegionId {
        let id = RegionId(self.next_id);
        self.next_id += 1;
        self.regions.insert(
            id,
            Region {
                id,
                name: name.to_string(),
                water,
                owner,
            },
        );
        id
    }

    /// Connects two regions in both directions
    pub fn connect(&mut self, a: RegionId, b: RegionId) {
        self.adjacency.entry(a).or_default().push(b);
        self.adjacency.entry(b).or_default().push(a);
    }

    /// Marks a passage impassable for retreats, in both directions
    pub fn restrict_passage(&mut self, a: RegionId, b: RegionId) {
        self.restricted.insert((a, b));
        self.restricted.insert((b, a));
    }

    pub fn region(&self, id: RegionId) -> Option<&Region> {
        self.regions.get(&id)
    }

    pub fn neighbors(&self, id: RegionId) -> &[RegionId] {
        self.adjacency.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_water(&self, id: RegionId) -> bool {
        self.regions.get(&id).map(|r| r.water).unwrap_or(false)
    }

    pub fn is_passable(&self, from: RegionId, to: RegionId) -> bool {
        !self.restricted.contains(&(from, to))
    }

    pub fn owner(&self, id: RegionId) -> Option<PlayerId> {
        self.regions.get(&id).and_then(|r| r.owner)
    }

    /// Hands a region to a new controller
    pub fn transfer_control(&mut self, id: RegionId, new_owner: PlayerId) {
        if let Some(region) = self.regions.get_mut(&id) {
            region.owner = Some(new_owner);
        }
    }

    pub fn place_units(&mut self, id: RegionId, units: Vec<Unit>) {
        self.occupants.entry(id).or_default().extend(units);
    }

    pub fn occupants(&self, id: RegionId) -> &[Unit] {
        self.occupants.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Removes and returns every unit standing in the region
    pub fn drain_occupants(&mut self, id: RegionId) -> Vec<Unit> {
        self.occupants.remove(&id).unwrap_or_default()
    }

    /// True when units hostile to `player` stand in the region, or the
    /// region is land held by a hostile power
    pub fn has_enemy_presence(
        &self,
        id: RegionId,
        player: PlayerId,
        alliances: &Alliances,
    ) -> bool {
        if self
            .occupants(id)
            .iter()
            .any(|u| alliances.is_enemy(u.owner, player))
        {
            return true;
        }
        match self.regions.get(&id) {
            Some(region) if !region.water => region
                .owner
                .map(|o| alliances.is_enemy(o, player))
                .unwrap_or(false),
            _ => false,
        }
    }

    /// Adjacent regions a force could legally withdraw into: matching
    /// domain, unrestricted passage, no enemy presence
    pub fn retreat_destinations(
        &self,
        from: RegionId,
        player: PlayerId,
        alliances: &Alliances,
        water: bool,
    ) -> Vec<RegionId> {
        self.neighbors(from)
            .iter()
            .copied()
            .filter(|&to| self.is_water(to) == water)
            .filter(|&to| self.is_passable(from, to))
            .filter(|&to| !self.has_enemy_presence(to, player, alliances))
            .collect()
    }
}
