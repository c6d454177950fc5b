//! Continuation stack
//!
//! The engine never relies on the native call stack across a blocking
//! interaction. Pending work is an explicit LIFO of serializable step
//! frames; suspending means returning with the stack intact, resuming
//! means draining it again. Frames are plain enum data so a suspended
//! battle can cross a process boundary.

use serde::{Deserialize, Serialize};

use super::fire::FireSpec;
use super::phases::CombatPhase;

/// One executable frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BattleStep {
    /// Run a combat phase; fire phases expand into the three frames
    /// below before any die is cast
    Phase(CombatPhase),
    /// Roll the volley and post the result
    RollDice(FireSpec),
    /// Turn the posted roll into a posted casualty decision, asking the
    /// owning participant when no override applies
    SelectCasualties(FireSpec),
    /// Commit the posted decision to the pools and the change sink,
    /// then collect acknowledgements
    ApplyCasualties(FireSpec),
    /// Terminal-condition evaluation after casualty removal
    CheckEnd,
    /// Advance the round counter and schedule the next round
    FinishRound,
}

/// LIFO of pending frames; empty between rounds and after resolution
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionStack {
    frames: Vec<BattleStep>,
}

impl ExecutionStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: BattleStep) {
        self.frames.push(step);
    }

    /// Schedules steps so that `steps[0]` runs first
    pub fn schedule(&mut self, steps: Vec<BattleStep>) {
        self.frames.extend(steps.into_iter().rev());
    }

    pub fn pop(&mut self) -> Option<BattleStep> {
        self.frames.pop()
    }

    /// Peeks at the frame that would run next
    pub fn peek(&self) -> Option<&BattleStep> {
        self.frames.last()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
