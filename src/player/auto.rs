//! Rule-forced default participant
//!
//! Used for unattended resolution: absorbs hits on multi-hit-point
//! units first, then gives up the cheapest units, never withdraws.
//! There is no strategy here; target valuation lives outside this
//! crate.

use crate::battle::casualties::auto_select;
use crate::core::error::Result;
use crate::core::types::RegionId;

use super::{
    BattleReport, CasualtyDecision, CasualtyNotice, CasualtyQuery, Participant, RetreatQuery,
};

#[derive(Debug, Clone)]
pub struct AutoParticipant {
    name: String,
}

impl AutoParticipant {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Participant for AutoParticipant {
    fn name(&self) -> &str {
        &self.name
    }

    fn select_casualties(&mut self, query: &CasualtyQuery) -> Result<CasualtyDecision> {
        Ok(auto_select(&query.candidates, query.hits))
    }

    fn choose_retreat(&mut self, _query: &RetreatQuery) -> Result<Option<RegionId>> {
        Ok(None)
    }

    fn acknowledge_casualties(&mut self, _notice: &CasualtyNotice) -> Result<()> {
        Ok(())
    }

    fn battle_ended(&mut self, _report: &BattleReport) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{BattleId, PlayerId, Side};
    use crate::dice::DiceRoll;
    use crate::unit::{Unit, UnitType};

    #[test]
    fn test_auto_participant_never_retreats() {
        let mut participant = AutoParticipant::new("bot");
        let query = RetreatQuery {
            battle: BattleId::new(),
            region: RegionId(0),
            side: Side::Attacker,
            mode: super::super::RetreatMode::Full,
            destinations: vec![RegionId(1), RegionId(2)],
        };
        assert_eq!(participant.choose_retreat(&query).unwrap(), None);
    }

    #[test]
    fn test_auto_participant_selects_cheapest() {
        let mut participant = AutoParticipant::new("bot");
        let owner = PlayerId(2);
        let infantry = Unit::new(UnitType::Infantry, owner);
        let armor = Unit::new(UnitType::Armor, owner);
        let infantry_id = infantry.id;
        let query = CasualtyQuery {
            battle: BattleId::new(),
            region: RegionId(0),
            side: Side::Defender,
            hits: 1,
            candidates: vec![armor, infantry],
            roll: DiceRoll::default(),
        };
        let decision = participant.select_casualties(&query).unwrap();
        assert_eq!(decision.killed, vec![infantry_id]);
        assert!(decision.damaged.is_empty());
    }
}
