//! Ruleset toggles with documented effects
//!
//! Different editions of the wider game flip these switches; the engine
//! reads them and never hard-codes an edition. Rulesets load from TOML
//! files or come from the named constructors.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::{EngineError, Result};

/// Edition-dependent combat rules
///
/// Defaults match the revised edition. Unknown keys in a TOML file are
/// rejected so a typoed toggle cannot silently fall back to a default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Ruleset {
    /// Defending submarines get their own first-strike phase
    ///
    /// When false, defending submarines fire with the regular defender
    /// volley instead. Either way an attacking destroyer negates the
    /// first strike.
    pub defender_sneak_attack: bool,

    /// Submarines may submerge in place instead of retreating
    ///
    /// Submerging removes the submarine from the battle but leaves it
    /// in the contested sea zone. Blocked while an enemy destroyer is
    /// in the battle, like every submarine withdrawal.
    pub submersible_subs: bool,

    /// Anti-air casualties are drawn by lot
    ///
    /// When false the owner of the attacking air units chooses which
    /// planes die. When true the shared dice source draws them
    /// uniformly, so both sides can verify the draw.
    pub random_aa_casualties: bool,

    /// Units hit by shore bombardment still fire back that round
    ///
    /// When false, bombardment works like a sneak attack and its
    /// casualties are removed before the defender's volley.
    pub bombard_casualties_return_fire: bool,

    /// Transports have no combat value
    ///
    /// A side reduced to transports alone can neither win the battle
    /// nor be forced to fight on; two such sides stalemate.
    pub transports_noncombat: bool,

    /// The winner of a volley is also asked to confirm enemy casualties
    ///
    /// This acknowledgement is never blocking; a connection failure is
    /// logged and swallowed.
    pub acknowledge_enemy_casualties: bool,

    /// Hard cap on battle rounds; exceeding it is a stalemate
    ///
    /// None means battles run until a side is destroyed, withdraws, or
    /// no fire phase remains.
    pub max_rounds: Option<u32>,
}

impl Default for Ruleset {
    fn default() -> Self {
        Self {
            defender_sneak_attack: false,
            submersible_subs: true,
            random_aa_casualties: false,
            bombard_casualties_return_fire: true,
            transports_noncombat: true,
            acknowledge_enemy_casualties: true,
            max_rounds: None,
        }
    }
}

impl Ruleset {
    /// The revised edition, also the default
    pub fn revised() -> Self {
        Self::default()
    }

    /// The classic edition: mutual sneak attacks, owner-chosen AA
    /// casualties, no submerging, combat-capable bombardment victims
    pub fn classic() -> Self {
        Self {
            defender_sneak_attack: true,
            submersible_subs: false,
            bombard_casualties_return_fire: false,
            transports_noncombat: false,
            ..Self::default()
        }
    }

    /// Parses a ruleset from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let ruleset: Ruleset = toml::from_str(text)?;
        ruleset.validate()?;
        Ok(ruleset)
    }

    /// Loads a ruleset from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(0) = self.max_rounds {
            return Err(EngineError::InvalidRuleset(
                "max_rounds must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }
}
