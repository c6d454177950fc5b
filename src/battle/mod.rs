//! Battle system - multi-phase combat that can suspend and resume
//!
//! One battle resolves the forces contesting a single map region.
//!
//! Key properties:
//! - Rounds run as an ordered list of phases (anti-air, bombardment,
//!   sneak attack, main fire, withdrawals)
//! - Pending work lives on an explicit serializable continuation stack,
//!   never on the native call stack
//! - Blocking participant queries can fail mid-step and be retried
//!   without re-rolling dice or re-selecting casualties
//! - Losing a carrier cascades to its cargo through an explicit relation

pub mod casualties;
pub mod dependents;
pub mod engine;
pub mod fire;
pub mod history;
pub mod phases;
pub mod retreat;
pub mod stack;
pub mod state;

// Re-exports for convenient access
pub use casualties::{auto_select, random_selection, select_all, total_capacity};
pub use dependents::{
    CarriedUnit, DependentBattleRegistry, DependentEntry, DependentTracker, NoDependentBattles,
};
pub use engine::{BattleEngine, FightCtx};
pub use fire::{combat_strength, FireKind, FireSpec};
pub use history::{BattleEvent, BattleHistory, BattleLogEntry};
pub use phases::{phases_for_round, CombatPhase};
pub use retreat::{
    air_retreat_destinations, full_retreat_destinations, sub_withdrawal_destinations,
};
pub use stack::{BattleStep, ExecutionStack};
pub use state::{Battle, BattleOutcome, BattleStatus, PostedDecision};
