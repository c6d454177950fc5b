//! Cannonade - resumable battle resolution for a turn-based wargame

pub mod battle;
pub mod change;
pub mod core;
pub mod dice;
pub mod map;
pub mod player;
pub mod rules;
pub mod unit;
