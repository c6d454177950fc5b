//! Suspension and resume integration tests
//!
//! A battle whose participant drops mid-interaction suspends in place,
//! survives a serialization round trip, and resumes on the exact frame
//! that failed. Dice already rolled and casualties already committed
//! must never be repeated.

use cannonade::battle::{
    auto_select, Battle, BattleEngine, BattleHistory, BattleOutcome, BattleStatus, FightCtx,
    NoDependentBattles,
};
use cannonade::change::ChangeLedger;
use cannonade::core::error::{EngineError, Result};
use cannonade::core::types::{Alliances, PlayerId, RegionId, Side};
use cannonade::map::GameMap;
use cannonade::player::{
    AutoParticipant, BattleReport, CasualtyDecision, CasualtyNotice, CasualtyQuery, Participant,
    RetreatQuery,
};
use cannonade::rules::Ruleset;
use cannonade::unit::{Unit, UnitType};

/// Fails its next `fail_remaining` blocking calls, then cooperates.
/// Every casualty query is logged with whether it was answered.
struct Flaky {
    fail_remaining: u32,
    select_log: Vec<(CasualtyQuery, bool)>,
}

impl Flaky {
    fn new(fail_remaining: u32) -> Self {
        Self {
            fail_remaining,
            select_log: Vec::new(),
        }
    }

    fn should_fail(&mut self) -> bool {
        if self.fail_remaining > 0 {
            self.fail_remaining -= 1;
            true
        } else {
            false
        }
    }

    fn lost() -> EngineError {
        EngineError::ConnectionLost {
            player: PlayerId(2),
            reason: "link dropped".into(),
        }
    }
}

impl Participant for Flaky {
    fn name(&self) -> &str {
        "flaky"
    }

    fn select_casualties(&mut self, query: &CasualtyQuery) -> Result<CasualtyDecision> {
        let fail = self.should_fail();
        self.select_log.push((query.clone(), fail));
        if fail {
            Err(Self::lost())
        } else {
            Ok(auto_select(&query.candidates, query.hits))
        }
    }

    fn choose_retreat(&mut self, _query: &RetreatQuery) -> Result<Option<RegionId>> {
        Ok(None)
    }

    fn acknowledge_casualties(&mut self, _notice: &CasualtyNotice) -> Result<()> {
        if self.should_fail() {
            Err(Self::lost())
        } else {
            Ok(())
        }
    }

    fn battle_ended(&mut self, _report: &BattleReport) -> Result<()> {
        Ok(())
    }
}

#[test]
fn test_suspension_survives_serialization_and_never_rerolls() {
    let mut map = GameMap::new();
    let region = map.add_sea("convoy lane");
    let p1 = PlayerId(1);
    let p2 = PlayerId(2);
    let mut battle = Battle::new(region, true, p1, p2);
    battle.add_attacker(Unit::new(UnitType::Submarine, p1));
    battle.add_attacker(Unit::new(UnitType::Submarine, p1));
    battle.add_defender(Unit::new(UnitType::Transport, p2));
    battle.add_defender(Unit::new(UnitType::Transport, p2));

    let rules = Ruleset::default();
    let alliances = Alliances::new();
    let mut att = AutoParticipant::new("att");
    let mut def = Flaky::new(3);
    let mut ledger = ChangeLedger::new();
    let mut registry = NoDependentBattles;
    let mut history = BattleHistory::new();
    let mut engine = BattleEngine::seeded(31);

    let mut suspensions = 0;
    let mut calls = 0;
    loop {
        calls += 1;
        assert!(calls <= 300, "battle did not resolve");
        let result = {
            let mut ctx = FightCtx {
                map: &mut map,
                rules: &rules,
                alliances: &alliances,
                attacker: &mut att,
                defender: &mut def,
                sink: &mut ledger,
                registry: &mut registry,
                history: &mut history,
            };
            engine.fight(&mut battle, &mut ctx)
        };
        match result {
            Ok(()) => break,
            Err(err) => {
                assert!(err.is_connection_lost());
                assert_eq!(battle.status, BattleStatus::InProgress);
                suspensions += 1;
                // the suspended battle crosses a process boundary as
                // plain data and picks up where it left off
                let json = serde_json::to_string(&battle).unwrap();
                battle = serde_json::from_str(&json).unwrap();
            }
        }
    }

    assert!(suspensions >= 1);
    assert_eq!(battle.outcome, Some(BattleOutcome::AttackerVictory));
    assert_eq!(battle.killed(Side::Defender).len(), 2);
    assert_eq!(map.occupants(region).len(), 2);

    // A query re-asked after a failure carries the very same dice
    for pair in def.select_log.windows(2) {
        let (first, failed) = &pair[0];
        if *failed {
            let (second, _) = &pair[1];
            assert_eq!(first.roll, second.roll);
            assert_eq!(first.hits, second.hits);
            assert_eq!(
                first.candidates.iter().map(|u| u.id).collect::<Vec<_>>(),
                second.candidates.iter().map(|u| u.id).collect::<Vec<_>>(),
            );
        }
    }
}

#[test]
fn test_resume_after_lost_acknowledgement_does_not_recommit() {
    let mut map = GameMap::new();
    let region = map.add_sea("patrol zone");
    let p1 = PlayerId(1);
    let p2 = PlayerId(2);
    let mut battle = Battle::new(region, true, p1, p2);
    battle.add_attacker(Unit::new(UnitType::Submarine, p1));
    battle.add_defender(Unit::new(UnitType::Transport, p2));

    let rules = Ruleset::default();
    let alliances = Alliances::new();
    let mut att = AutoParticipant::new("att");
    let mut def = Flaky::new(u32::MAX);
    let mut ledger = ChangeLedger::new();
    let mut registry = NoDependentBattles;
    let mut history = BattleHistory::new();
    let mut engine = BattleEngine::seeded(37);

    // The lone transport dies to the first hit, so the only blocking
    // defender interaction is the loser acknowledgement after the kill
    // was already committed.
    let err = {
        let mut ctx = FightCtx {
            map: &mut map,
            rules: &rules,
            alliances: &alliances,
            attacker: &mut att,
            defender: &mut def,
            sink: &mut ledger,
            registry: &mut registry,
            history: &mut history,
        };
        engine.fight(&mut battle, &mut ctx).unwrap_err()
    };
    assert!(err.is_connection_lost());
    assert!(battle.pending_notice.is_some());
    assert_eq!(battle.killed(Side::Defender).len(), 1);
    let removals_at_suspension = ledger.removals().count();
    assert_eq!(removals_at_suspension, 1);
    let rolls_at_suspension = history.rolls().count();

    let json = serde_json::to_string(&battle).unwrap();
    let mut battle: Battle = serde_json::from_str(&json).unwrap();

    let mut def = AutoParticipant::new("def reconnected");
    {
        let mut ctx = FightCtx {
            map: &mut map,
            rules: &rules,
            alliances: &alliances,
            attacker: &mut att,
            defender: &mut def,
            sink: &mut ledger,
            registry: &mut registry,
            history: &mut history,
        };
        engine.fight(&mut battle, &mut ctx).unwrap();
    }

    assert_eq!(battle.outcome, Some(BattleOutcome::AttackerVictory));
    // resuming redid the notification, not the kill or the roll
    assert_eq!(battle.killed(Side::Defender).len(), 1);
    assert_eq!(ledger.removals().count(), removals_at_suspension);
    assert_eq!(history.rolls().count(), rolls_at_suspension);
    assert_eq!(map.occupants(region).len(), 1);
}

#[test]
fn test_fight_on_a_resolved_battle_is_a_no_op() {
    let mut map = GameMap::new();
    let region = map.add_land("borderland", PlayerId(2));
    let mut battle = Battle::new(region, false, PlayerId(1), PlayerId(2));
    battle.add_attacker(Unit::new(UnitType::Infantry, PlayerId(1)));

    let rules = Ruleset::default();
    let alliances = Alliances::new();
    let mut att = AutoParticipant::new("att");
    let mut def = AutoParticipant::new("def");
    let mut registry = NoDependentBattles;
    let mut engine = BattleEngine::seeded(2);

    let mut ledger = ChangeLedger::new();
    let mut history = BattleHistory::new();
    {
        let mut ctx = FightCtx {
            map: &mut map,
            rules: &rules,
            alliances: &alliances,
            attacker: &mut att,
            defender: &mut def,
            sink: &mut ledger,
            registry: &mut registry,
            history: &mut history,
        };
        engine.fight(&mut battle, &mut ctx).unwrap();
    }
    assert_eq!(battle.status, BattleStatus::Resolved);

    // A second call must not touch the sink or the log again
    let mut ledger2 = ChangeLedger::new();
    let mut history2 = BattleHistory::new();
    {
        let mut ctx = FightCtx {
            map: &mut map,
            rules: &rules,
            alliances: &alliances,
            attacker: &mut att,
            defender: &mut def,
            sink: &mut ledger2,
            registry: &mut registry,
            history: &mut history2,
        };
        engine.fight(&mut battle, &mut ctx).unwrap();
    }
    assert!(ledger2.is_empty());
    assert!(history2.is_empty());
}
