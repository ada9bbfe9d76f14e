//! # ARPG Sim
//!
//! Headless driver for the combat engine. Loads a config and a buff catalog,
//! spawns a small encounter, steps it at a fixed frame rate and prints every
//! notification as one JSON line on stdout.
//!
//! ```text
//! arpg-sim [--config PATH] [--buffs PATH] [--seed N] [--seconds S]
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use glam::Vec3;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use arpg_combat::prelude::*;

const FRAME: f32 = 1.0 / 60.0;

/// Headless ARPG combat simulation
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "arpg-sim")]
#[command(about = "Headless ARPG combat simulation")]
#[command(version)]
struct Args {
    /// Game config TOML; defaults are used when omitted
    #[arg(long, value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Buff catalog in RON
    #[arg(long, value_name = "BUFFS_FILE")]
    buffs: Option<PathBuf>,

    /// Seed for combat rolls
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Maximum simulated duration in seconds
    #[arg(long, default_value_t = 30.0)]
    seconds: f32,
}

/// Main entry point.
fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(EnvFilter::from_default_env().add_directive("arpg=info".parse()?))
        .init();

    let args = Args::parse();
    info!("ARPG sim {} starting: {:?}", env!("CARGO_PKG_VERSION"), args);

    let config = match &args.config {
        Some(path) => GameConfig::load_or_default(path),
        None => GameConfig::default(),
    };
    config.validate().context("invalid game config")?;

    let catalog = match &args.buffs {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            BuffCatalog::from_ron_str(&contents)?
        },
        None => BuffCatalog::new(),
    };

    let mut world = CombatWorld::seeded(config, args.seed);
    let encounter = spawn_encounter(&mut world, &catalog);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let frames = (args.seconds / FRAME).ceil() as u64;
    for _ in 0..frames {
        drive(&mut world, &encounter);
        world.tick(FRAME);
        for event in world.drain_events() {
            serde_json::to_writer(&mut out, &event)?;
            out.write_all(b"\n")?;
        }
        if encounter.enemies.iter().all(|id| is_dead(&world, *id)) || is_dead(&world, encounter.hero) {
            break;
        }
    }
    out.flush()?;

    summarize(&world, &encounter);
    Ok(())
}

struct Encounter {
    hero: EntityId,
    enemies: Vec<EntityId>,
}

fn spawn_encounter(world: &mut CombatWorld, catalog: &BuffCatalog) -> Encounter {
    let config = world.config().clone();

    let mut hero = Entity::new("Hero", Attributes::new(30, 25, 25, 15), 3, &config)
        .with_team(Team::Player)
        .with_class(CharacterClass::KNIGHT);
    hero.set_base_combo(ComboProfile::new(3, 1.0, 0.1), &config);
    let gear = [
        (
            EquipmentSlot::RightHand,
            Item::new(ItemId::new(1), "Broadsword", ItemKind::Blade { two_handed: false })
                .with_damage(4, 9)
                .with_combo(ComboProfile::new(3, 1.2, 0.1)),
        ),
        (
            EquipmentSlot::LeftHand,
            Item::new(ItemId::new(2), "Kite Shield", ItemKind::Shield { chance_to_block: 50.0 })
                .with_defense(6),
        ),
    ];
    for (slot, item) in gear {
        if let Err(reason) = hero.equip(slot, item, &config) {
            warn!("Hero could not equip {:?}: {}", slot, reason);
        }
    }
    hero.learn_skill(
        SkillDefinition::new(SkillId::new(1), "Cleave")
            .with_mana_cost(8)
            .with_cooldown(4.0)
            .requiring(WeaponRequirement::Blade)
            .with_damage(3, 6, DamageMode::Regular),
    );

    let hero = world.spawn(hero);

    let mut enemies = Vec::new();
    for (i, x) in [4.0_f32, 7.0].into_iter().enumerate() {
        let mut goblin = Entity::new(format!("Goblin {}", i + 1), Attributes::default(), 2, &config)
            .with_team(Team::Enemy)
            .with_move_speed(3.0)
            .at(Vec3::new(x, 0.0, 0.0));
        goblin.set_difficulty_scaled(true, &config);
        enemies.push(world.spawn(goblin));
    }

    let mut definitions: Vec<&BuffDefinition> = catalog.iter().collect();
    definitions.sort_by_key(|d| d.id);
    for def in definitions {
        let target = if def.is_debuff { enemies[0] } else { hero };
        let outcome = world.apply_buff(target, def);
        info!("Applied {} to {}: {:?}", def.name, target, outcome);
    }

    Encounter { hero, enemies }
}

fn is_dead(world: &CombatWorld, id: EntityId) -> bool {
    world.get(id).map_or(true, Entity::is_dead)
}

/// Minimal AI: the hero fights the nearest living enemy, enemies fight the hero.
fn drive(world: &mut CombatWorld, encounter: &Encounter) {
    let Some(hero_position) = world.get(encounter.hero).map(|h| h.position) else {
        return;
    };

    let nearest = encounter
        .enemies
        .iter()
        .filter_map(|id| world.get(*id))
        .filter(|e| !e.is_dead())
        .min_by(|a, b| {
            a.position
                .distance(hero_position)
                .total_cmp(&b.position.distance(hero_position))
        })
        .map(Entity::id);

    if let Some(target) = nearest {
        let use_skill = world
            .get(encounter.hero)
            .is_some_and(|h| h.skills().cooldown(SkillId::new(1)) <= 0.0);
        if let Some(h) = world.get_mut(encounter.hero) {
            h.set_use_skill(use_skill);
        }
        if world.get(encounter.hero).is_some_and(|h| h.state() == StateKind::Idle) {
            world.move_to_attack(encounter.hero, target);
        }
    }

    for enemy in &encounter.enemies {
        if world.get(*enemy).is_some_and(|e| e.state() == StateKind::Idle) {
            world.move_to_attack(*enemy, encounter.hero);
        }
    }
}

fn summarize(world: &CombatWorld, encounter: &Encounter) {
    info!("Simulated {:.2}s over {} frames", world.clock().now, world.clock().tick);
    for e in world.iter() {
        let stats = e.stats();
        info!(
            "{} ({}): level {}, health {}/{}, mana {}/{}, experience {}/{}, state {}",
            e.name(),
            e.id(),
            stats.level(),
            stats.health(),
            stats.max_health(),
            stats.mana(),
            stats.max_mana(),
            stats.experience(),
            stats.next_level_experience(),
            e.state(),
        );
    }
    let m = world.difficulty().multipliers;
    info!(
        "Difficulty: strength={:.2}, dexterity={:.2}, speed={:.2}",
        m.strength, m.dexterity, m.speed
    );
    if is_dead(world, encounter.hero) {
        info!("The hero fell");
    } else {
        info!("The hero survived");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("arpg-sim").chain(list.iter().copied()))
    }

    #[test]
    fn test_parse_defaults() {
        let parsed = args(&[]).expect("parse");
        assert_eq!(parsed.seed, 42);
        assert!((parsed.seconds - 30.0).abs() < 0.001);
        assert!(parsed.config.is_none());
        assert!(parsed.buffs.is_none());
    }

    #[test]
    fn test_parse_flags() {
        let parsed = args(&["--seed", "7", "--seconds", "2.5", "--config", "game.toml"]).expect("parse");
        assert_eq!(parsed.seed, 7);
        assert!((parsed.seconds - 2.5).abs() < 0.001);
        assert_eq!(parsed.config, Some(PathBuf::from("game.toml")));
        assert!(parsed.buffs.is_none());
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(args(&["--seed"]).is_err());
        assert!(args(&["--seed", "many"]).is_err());
        assert!(args(&["--turbo"]).is_err());
    }

    #[test]
    fn test_encounter_runs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("buffs.ron");
        std::fs::write(
            &path,
            r#"[(id: BuffId(1), name: "Battle Cry", duration: 20.0, modifiers: [(strength, 10.0)])]"#,
        )
        .expect("write");
        let catalog =
            BuffCatalog::from_ron_str(&std::fs::read_to_string(&path).expect("read")).expect("catalog");

        let mut world = CombatWorld::seeded(GameConfig::default(), 1);
        let encounter = spawn_encounter(&mut world, &catalog);
        assert_eq!(world.len(), 3);
        let hero = world.get(encounter.hero).expect("hero");
        assert_eq!(hero.stats().attributes().strength, 40);

        for _ in 0..600 {
            drive(&mut world, &encounter);
            world.tick(FRAME);
        }
        assert!(!world.drain_events().is_empty());
    }
}
