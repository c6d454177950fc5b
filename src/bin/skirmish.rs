//! Headless Skirmish Runner
//!
//! Resolves one canned battle scenario with automated participants and
//! prints the result as JSON or text.

use cannonade::battle::{Battle, BattleEngine, BattleHistory, FightCtx, NoDependentBattles};
use cannonade::change::ChangeLedger;
use cannonade::core::types::{Alliances, PlayerId, RegionId, Side};
use cannonade::map::GameMap;
use cannonade::player::AutoParticipant;
use cannonade::rules::Ruleset;
use cannonade::unit::{total_unit_value, Unit, UnitType};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;

/// Headless Skirmish Runner - canned battles for rule evaluation
#[derive(Parser, Debug)]
#[command(name = "skirmish")]
#[command(about = "Resolve a canned battle scenario and print the result")]
struct Args {
    /// Scenario name: convoy, landing, fleet, or push
    #[arg(long, default_value = "fleet")]
    scenario: String,

    /// Ruleset edition when no file is given: revised or classic
    #[arg(long, default_value = "revised")]
    edition: String,

    /// Path to a TOML ruleset file, overriding --edition
    #[arg(long)]
    ruleset: Option<PathBuf>,

    /// Random seed for deterministic runs
    #[arg(long)]
    seed: Option<u64>,

    /// Output format: json or text
    #[arg(long, default_value = "json")]
    format: String,

    /// Print the battle log to stderr
    #[arg(long, short = 'v')]
    verbose: bool,
}

/// JSON output structure
#[derive(Serialize)]
struct SkirmishResult {
    scenario: String,
    outcome: String,
    rounds: u32,
    attacker_value_lost: u32,
    defender_value_lost: u32,
    attacker_survivors: usize,
    defender_survivors: usize,
    dice_rolls: usize,
    changes_committed: usize,
    seed: u64,
}

fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    // Determine seed
    let seed = args.seed.unwrap_or_else(|| rand::random());

    // Resolve the ruleset
    let rules = match &args.ruleset {
        Some(path) => Ruleset::load(path).unwrap_or_else(|e| {
            eprintln!("Warning: failed to load ruleset '{}': {}", path.display(), e);
            eprintln!("Using the revised edition");
            Ruleset::revised()
        }),
        None => match args.edition.as_str() {
            "classic" => Ruleset::classic(),
            "revised" => Ruleset::revised(),
            other => {
                eprintln!("Unknown edition '{}', using revised", other);
                Ruleset::revised()
            }
        },
    };

    let attacker = PlayerId(1);
    let defender = PlayerId(2);
    let alliances = Alliances::new();
    let mut map = GameMap::new();

    let mut battle = match build_scenario(&args.scenario, &mut map, attacker, defender, &alliances)
    {
        Some(battle) => battle,
        None => {
            eprintln!(
                "Unknown scenario '{}'; expected convoy, landing, fleet, or push",
                args.scenario
            );
            std::process::exit(2);
        }
    };

    let mut engine = BattleEngine::seeded(seed);
    let mut attacker_player = AutoParticipant::new("attacker-bot");
    let mut defender_player = AutoParticipant::new("defender-bot");
    let mut ledger = ChangeLedger::new();
    let mut registry = NoDependentBattles;
    let mut history = BattleHistory::new();

    let region = battle.region;
    let mut ctx = FightCtx {
        map: &mut map,
        rules: &rules,
        alliances: &alliances,
        attacker: &mut attacker_player,
        defender: &mut defender_player,
        sink: &mut ledger,
        registry: &mut registry,
        history: &mut history,
    };

    // Automated participants never drop the connection, so one call
    // resolves the whole battle.
    if let Err(e) = engine.fight(&mut battle, &mut ctx) {
        eprintln!("Battle failed to resolve: {}", e);
        std::process::exit(1);
    }

    if args.verbose {
        eprintln!("=== Battle Log ===");
        for entry in &history.entries {
            eprintln!("  [{}] {}", entry.round, entry.description);
        }
        eprintln!();
    }

    let attacker_survivors = map
        .occupants(region)
        .iter()
        .filter(|u| alliances.is_allied(u.owner, attacker))
        .count();
    let defender_survivors = map
        .occupants(region)
        .iter()
        .filter(|u| alliances.is_allied(u.owner, defender))
        .count();

    let outcome = battle
        .outcome
        .map(|o| format!("{:?}", o))
        .unwrap_or_else(|| "Unresolved".to_string());

    let result = SkirmishResult {
        scenario: args.scenario.clone(),
        outcome,
        rounds: battle.round,
        attacker_value_lost: total_unit_value(battle.killed(Side::Attacker)),
        defender_value_lost: total_unit_value(battle.killed(Side::Defender)),
        attacker_survivors,
        defender_survivors,
        dice_rolls: history.rolls().count(),
        changes_committed: ledger.len(),
        seed,
    };

    match args.format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result).unwrap());
        }
        "text" => {
            println!("Skirmish Result");
            println!("===============");
            println!("Scenario: {}", result.scenario);
            println!("Outcome: {}", result.outcome);
            println!("Rounds: {}", result.rounds);
            println!("Attacker value lost: {}", result.attacker_value_lost);
            println!("Defender value lost: {}", result.defender_value_lost);
            println!(
                "Survivors in region: {} attacking, {} defending",
                result.attacker_survivors, result.defender_survivors
            );
            println!("Dice rolled: {}", result.dice_rolls);
            println!("Seed: {}", result.seed);
        }
        _ => {
            eprintln!("Unknown format '{}', defaulting to json", args.format);
            println!("{}", serde_json::to_string_pretty(&result).unwrap());
        }
    }
}

/// Builds one of the canned scenarios, or None for an unknown name
fn build_scenario(
    name: &str,
    map: &mut GameMap,
    attacker: PlayerId,
    defender: PlayerId,
    alliances: &Alliances,
) -> Option<Battle> {
    match name {
        "convoy" => Some(convoy_raid(map, attacker, defender, alliances)),
        "landing" => Some(beach_landing(map, attacker, defender, alliances)),
        "fleet" => Some(fleet_action(map, attacker, defender, alliances)),
        "push" => Some(land_push(map, attacker, defender, alliances)),
        _ => None,
    }
}

/// Submarines against an escorted convoy; one transport carries troops
fn convoy_raid(
    map: &mut GameMap,
    attacker: PlayerId,
    defender: PlayerId,
    alliances: &Alliances,
) -> Battle {
    let lane = map.add_sea("shipping lane");
    let open = map.add_sea("open water");
    map.connect(lane, open);

    let loaded_transport = Unit::new(UnitType::Transport, defender);
    let cargo_carrier = loaded_transport.id;

    map.place_units(
        lane,
        vec![
            Unit::new(UnitType::Submarine, attacker),
            Unit::new(UnitType::Submarine, attacker),
            Unit::new(UnitType::Destroyer, defender),
            loaded_transport,
            Unit::new(UnitType::Transport, defender),
        ],
    );

    let mut battle = assemble(map, lane, attacker, defender, alliances);
    battle
        .dependents
        .load(cargo_carrier, Unit::new(UnitType::Infantry, defender));
    battle
}

/// Amphibious assault on a held beach with offshore fire support
fn beach_landing(
    map: &mut GameMap,
    attacker: PlayerId,
    defender: PlayerId,
    alliances: &Alliances,
) -> Battle {
    let beach = map.add_land("beachhead", defender);
    let anchorage = map.add_sea("landing zone");
    map.connect(beach, anchorage);

    let ashore: Vec<Unit> = vec![
        Unit::new(UnitType::Infantry, attacker),
        Unit::new(UnitType::Infantry, attacker),
        Unit::new(UnitType::Infantry, attacker),
        Unit::new(UnitType::Armor, attacker),
    ];
    let landed: Vec<_> = ashore.iter().map(|u| u.id).collect();

    let mut units = ashore;
    units.push(Unit::new(UnitType::Fighter, attacker));
    units.push(Unit::new(UnitType::Infantry, defender));
    units.push(Unit::new(UnitType::Infantry, defender));
    units.push(Unit::new(UnitType::AntiAirGun, defender));
    units.push(Unit::new(UnitType::Factory, defender));
    map.place_units(beach, units);

    let mut battle = assemble(map, beach, attacker, defender, alliances);
    battle.mark_amphibious(landed);
    battle.with_bombardment(vec![Unit::new(UnitType::Battleship, attacker)], anchorage);
    battle
}

/// Carrier groups trading blows in open water
fn fleet_action(
    map: &mut GameMap,
    attacker: PlayerId,
    defender: PlayerId,
    alliances: &Alliances,
) -> Battle {
    let zone = map.add_sea("contested water");
    let home = map.add_sea("home water");
    map.connect(zone, home);

    map.place_units(
        zone,
        vec![
            Unit::new(UnitType::Battleship, attacker),
            Unit::new(UnitType::Carrier, attacker),
            Unit::new(UnitType::Fighter, attacker),
            Unit::new(UnitType::Fighter, attacker),
            Unit::new(UnitType::Destroyer, attacker),
            Unit::new(UnitType::Battleship, defender),
            Unit::new(UnitType::Cruiser, defender),
            Unit::new(UnitType::Submarine, defender),
            Unit::new(UnitType::Destroyer, defender),
        ],
    );

    assemble(map, zone, attacker, defender, alliances)
}

/// A plain land offensive with a retreat route open behind the attacker
fn land_push(
    map: &mut GameMap,
    attacker: PlayerId,
    defender: PlayerId,
    alliances: &Alliances,
) -> Battle {
    let front = map.add_land("frontier", defender);
    let staging = map.add_land("staging ground", attacker);
    map.connect(front, staging);

    map.place_units(
        front,
        vec![
            Unit::new(UnitType::Infantry, attacker),
            Unit::new(UnitType::Infantry, attacker),
            Unit::new(UnitType::Infantry, attacker),
            Unit::new(UnitType::Artillery, attacker),
            Unit::new(UnitType::Armor, attacker),
            Unit::new(UnitType::Armor, attacker),
            Unit::new(UnitType::Infantry, defender),
            Unit::new(UnitType::Infantry, defender),
            Unit::new(UnitType::Infantry, defender),
            Unit::new(UnitType::Infantry, defender),
            Unit::new(UnitType::AntiAirGun, defender),
        ],
    );

    assemble(map, front, attacker, defender, alliances)
}

fn assemble(
    map: &mut GameMap,
    region: RegionId,
    attacker: PlayerId,
    defender: PlayerId,
    alliances: &Alliances,
) -> Battle {
    match Battle::assemble(map, region, attacker, defender, alliances) {
        Ok(battle) => battle,
        Err(e) => {
            eprintln!("Scenario setup failed: {}", e);
            std::process::exit(1);
        }
    }
}
