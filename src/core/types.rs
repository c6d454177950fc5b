//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a battle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BattleId(pub Uuid);

impl BattleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BattleId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(pub Uuid);

impl UnitId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UnitId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for a player (a faction in the wider game)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub u32);

impl PlayerId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }
}

/// Identifier for a map region (land territory or sea zone)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionId(pub u32);

impl RegionId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }
}

/// Which side of a battle a unit or participant belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Attacker,
    Defender,
}

impl Side {
    /// Returns the other side of the battle
    pub fn opponent(&self) -> Side {
        match self {
            Side::Attacker => Side::Defender,
            Side::Defender => Side::Attacker,
        }
    }
}

/// Battle round counter (1-based once fighting starts)
pub type Round = u32;

/// Symmetric alliance relation between players.
///
/// Same-player is always allied; everything else is enemy unless a pair
/// was declared.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Alliances {
    pairs: Vec<(PlayerId, PlayerId)>,
}

impl Alliances {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `a` and `b` allied in both directions
    pub fn ally(&mut self, a: PlayerId, b: PlayerId) {
        if !self.is_allied(a, b) {
            self.pairs.push((a, b));
        }
    }

    pub fn is_allied(&self, a: PlayerId, b: PlayerId) -> bool {
        a == b || self.pairs.iter().any(|&(x, y)| (x, y) == (a, b) || (y, x) == (a, b))
    }

    pub fn is_enemy(&self, a: PlayerId, b: PlayerId) -> bool {
        !self.is_allied(a, b)
    }
}
