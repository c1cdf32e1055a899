//! Rift Duel headless demo
//!
//! Plays a seeded run with a simple timing bot and prints combat events.
//!
//! Usage: `rift-duel [seed] [tuning.json]`

#[cfg(not(target_arch = "wasm32"))]
mod demo {
    use rand::Rng;

    use rift_duel::consts::SIM_DT;
    use rift_duel::run::Run;
    use rift_duel::sim::{
        CombatEngine, CombatEvent, Enemy, EnemyKind, RelicCatalog, find_segment_at,
    };
    use rift_duel::{CombatTuning, TuningError};

    const DEMO_SEED: u64 = 123_456_789;
    const FLOORS: u32 = 3;
    const FIGHTS_PER_FLOOR: u32 = 3;
    /// Ten simulated minutes per fight before the bot gives up
    const MAX_STEPS: u32 = 60 * 600;

    fn load_tuning(path: Option<String>) -> Result<CombatTuning, TuningError> {
        let Some(path) = path else {
            return Ok(CombatTuning::default());
        };
        let json = std::fs::read_to_string(&path)?;
        CombatTuning::from_json(&json)
    }

    fn describe(event: &CombatEvent) -> String {
        match event {
            CombatEvent::Victory { enemy, reward } => {
                let relics: Vec<&str> = reward.new_relics.iter().map(|r| r.name.as_str()).collect();
                format!(
                    "VICTORY over {} (+{} shards{})",
                    enemy.name,
                    reward.shards_earned,
                    if relics.is_empty() {
                        String::new()
                    } else {
                        format!(", found {}", relics.join(", "))
                    }
                )
            }
            CombatEvent::Defeat => "DEFEAT".to_string(),
            CombatEvent::GuardChargesChanged { charges } => format!("guard charges: {charges}"),
            CombatEvent::Strike {
                kind,
                position,
                damage,
            } => format!("{} at {position:.2} for {damage}", kind.as_str()),
            CombatEvent::SegmentEffect { kind, .. } => kind.as_str().to_string(),
            CombatEvent::Miss { timeout } => {
                if *timeout {
                    "TIMEOUT".to_string()
                } else {
                    "MISS".to_string()
                }
            }
            CombatEvent::EnemyTurn { damage, result } => {
                format!("enemy turn: {} ({damage})", result.as_str())
            }
        }
    }

    fn report(run: &mut Run, events: &[CombatEvent]) {
        run.apply_events(events);
        for event in events {
            println!("    {}  [hp {}/{}]", describe(event), run.player.hp, run.player.max_hp);
        }
    }

    /// Swing only when the cursor sits over a strike zone, slightly late
    fn bot_wants_input(engine: &CombatEngine) -> bool {
        let Some(session) = engine.session() else {
            return false;
        };
        if session.input_processed {
            return false;
        }
        find_segment_at(&session.segments, session.cursor_pos, 0.0).is_some_and(|hit| {
            let seg = hit.segment;
            let depth = (session.cursor_pos - seg.start) / seg.width().max(f32::EPSILON);
            seg.kind.is_strike() && (0.3..=0.7).contains(&depth)
        })
    }

    fn fight(engine: &mut CombatEngine, run: &mut Run, enemy: Enemy) {
        println!(
            "  vs {} (hp {}, dmg {}-{})",
            enemy.name, enemy.hp, enemy.min_dmg, enemy.max_dmg
        );
        let events = run.begin_combat(engine, enemy);
        report(run, &events);

        for _ in 0..MAX_STEPS {
            if !engine.is_active() {
                return;
            }
            if bot_wants_input(engine) {
                let events = engine.process_input(&mut run.context());
                report(run, &events);
            }
            let events = engine.update(&mut run.context(), SIM_DT);
            report(run, &events);
        }
        log::warn!("Fight did not finish, abandoning");
        engine.clear();
    }

    pub fn run() -> Result<(), TuningError> {
        let mut args = std::env::args().skip(1);
        let seed = args
            .next()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEMO_SEED);
        let tuning = load_tuning(args.next())?;
        let catalog = RelicCatalog::default();
        let mut engine = CombatEngine::new(tuning, catalog.clone())?;
        let mut run = Run::new(seed);

        println!("Rift Duel demo, seed {seed}");
        for floor in 1..=FLOORS {
            println!("Floor {floor}");
            for fight_index in 0..FIGHTS_PER_FLOOR {
                let kind = match run.rng.random_range(0..3) {
                    0 => EnemyKind::Grunt,
                    1 => EnemyKind::Archer,
                    _ => EnemyKind::Slime,
                };
                let elite = fight_index + 1 == FIGHTS_PER_FLOOR;
                let enemy = Enemy::spawn(kind, elite, run.floor, engine.tuning());
                fight(&mut engine, &mut run, enemy);
            }

            match run.buy_heal() {
                Ok(healed) => println!("  sanctuary: healed {healed}"),
                Err(e) => println!("  sanctuary: {e}"),
            }
            match run.buy_relic(&catalog) {
                Ok(relic) => println!("  sanctuary: bought {} ({})", relic.name, relic.desc),
                Err(e) => println!("  sanctuary: {e}"),
            }
            println!(
                "  end of floor: hp {}/{}, {} shards, {} relic(s)",
                run.player.hp,
                run.player.max_hp,
                run.shards,
                run.relics.len()
            );
            if floor < FLOORS {
                run.descend();
            }
        }
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Rift Duel (headless) starting...");

    if let Err(e) = demo::run() {
        log::error!("{e}");
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // The engine is a library on the web; hosts drive it directly
}
