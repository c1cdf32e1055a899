//! Run-level bookkeeping
//!
//! A `Run` owns everything that outlives a single combat: the seeded RNG,
//! player health, relic inventory, shards, floor and stored guard charges.
//! It feeds the engine through `context()` and folds the engine's events back
//! in with `apply_events`.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use crate::consts::{
    HEAL_BASE, HEAL_COST_BASE, HEAL_COST_PER_FLOOR, HEAL_PER_FLOOR, RELIC_COST_BASE,
    RELIC_COST_PER_FLOOR,
};
use crate::error::SanctuaryError;
use crate::sim::relic::{Relic, RelicCatalog};
use crate::sim::state::{CombatEvent, Enemy, Player};
use crate::sim::tick::{CombatContext, CombatEngine};

/// Seed for a floor's RNG stream
pub fn floor_seed(seed: u64, floor: u32) -> u64 {
    seed.wrapping_add(u64::from(floor).wrapping_mul(104_729))
}

#[derive(Debug, Clone)]
pub struct Run {
    pub seed: u64,
    pub rng: Pcg32,
    pub player: Player,
    pub relics: Vec<Relic>,
    pub shards: u32,
    pub floor: u32,
    pub guard_charges: u32,
}

impl Run {
    pub fn new(seed: u64) -> Self {
        log::info!("New run with seed {seed}");
        Self {
            seed,
            rng: Pcg32::seed_from_u64(floor_seed(seed, 1)),
            player: Player::default(),
            relics: Vec::new(),
            shards: 0,
            floor: 1,
            guard_charges: 0,
        }
    }

    pub fn context(&mut self) -> CombatContext<'_, Pcg32> {
        CombatContext::new(&mut self.rng, &mut self.player, &mut self.relics)
    }

    /// Start combat with this run's shards, floor and guard charges
    pub fn begin_combat(&mut self, engine: &mut CombatEngine, enemy: Enemy) -> Vec<CombatEvent> {
        let (shards, floor, guard_charges) = (self.shards, self.floor, self.guard_charges);
        let events = engine.begin_combat(&mut self.context(), enemy, shards, floor, guard_charges);
        self.apply_events(&events);
        events
    }

    /// Fold combat results into the run
    pub fn apply_events(&mut self, events: &[CombatEvent]) {
        for event in events {
            match event {
                CombatEvent::Victory { reward, .. } => {
                    self.shards = self.shards.saturating_add(reward.shards_earned);
                }
                CombatEvent::GuardChargesChanged { charges } => {
                    self.guard_charges = *charges;
                }
                CombatEvent::Defeat => {
                    self.shards /= 2;
                    self.player.hp = self.player.max_hp;
                    log::info!("Run setback: shards halved to {}", self.shards);
                }
                _ => {}
            }
        }
    }

    /// Move to the next floor and reseed
    pub fn descend(&mut self) {
        self.floor += 1;
        self.rng = Pcg32::seed_from_u64(floor_seed(self.seed, self.floor));
        log::info!("Descended to floor {}", self.floor);
    }

    pub fn relic_cost(&self) -> u32 {
        RELIC_COST_BASE + (self.floor.max(1) - 1) * RELIC_COST_PER_FLOOR
    }

    pub fn heal_cost(&self) -> u32 {
        HEAL_COST_BASE + (self.floor.max(1) - 1) * HEAL_COST_PER_FLOOR
    }

    /// Buy a random relic the player does not own yet
    pub fn buy_relic(&mut self, catalog: &RelicCatalog) -> Result<Relic, SanctuaryError> {
        let pool: Vec<&Relic> = catalog
            .relics()
            .iter()
            .filter(|r| !self.relics.iter().any(|owned| owned.id == r.id))
            .collect();
        if pool.is_empty() {
            return Err(SanctuaryError::NoRelicsLeft);
        }
        let cost = self.relic_cost();
        if self.shards < cost {
            return Err(SanctuaryError::NotEnoughShards {
                needed: cost - self.shards,
            });
        }

        let relic = pool[self.rng.random_range(0..pool.len())].clone();
        self.shards -= cost;
        self.relics.push(relic.clone());
        log::info!("Sanctuary relic: {} for {cost} shards", relic.name);
        Ok(relic)
    }

    /// Buy a heal, returns HP restored
    pub fn buy_heal(&mut self) -> Result<i32, SanctuaryError> {
        if self.player.hp >= self.player.max_hp {
            return Err(SanctuaryError::FullHealth);
        }
        let cost = self.heal_cost();
        if self.shards < cost {
            return Err(SanctuaryError::NotEnoughShards {
                needed: cost - self.shards,
            });
        }

        self.shards -= cost;
        let missing = self.player.max_hp - self.player.hp;
        let amount = missing.min(HEAL_BASE + self.floor as i32 * HEAL_PER_FLOOR);
        let healed = self.player.heal(amount);
        log::info!("Sanctuary heal: {healed} HP for {cost} shards");
        Ok(healed)
    }
}
