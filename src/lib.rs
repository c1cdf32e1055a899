//! Rift Duel - timing combat for a dungeon crawler
//!
//! Core modules:
//! - `sim`: Deterministic combat simulation (cursor, segments, relics, rounds)
//! - `tuning`: Data-driven combat balance
//! - `run`: Run-level bookkeeping (shards, floors, sanctuary purchases)
//! - `error`: Error types for configuration and sanctuary purchases

pub mod error;
pub mod run;
pub mod sim;
pub mod tuning;

pub use error::{SanctuaryError, TuningError};
pub use run::Run;
pub use tuning::CombatTuning;

/// Combat configuration constants (defaults for `CombatTuning`)
pub mod consts {
    /// Fixed simulation timestep (60 Hz)
    pub const SIM_DT: f32 = 1.0 / 60.0;

    /// Cursor speed in track lengths per second before any scaling
    pub const CURSOR_BASE_SPEED: f32 = 0.85;
    /// Extra cursor speed per floor past the first
    pub const CURSOR_SPEED_PER_FLOOR: f32 = 0.03;
    /// Elite enemies sweep slightly faster
    pub const ELITE_CURSOR_SCALAR: f32 = 1.08;
    /// Cursor speed can never drop below this
    pub const CURSOR_SPEED_FLOOR: f32 = 0.2;
    /// Per-stack growth applied for each consecutive non-strike round
    pub const CURSOR_SPEED_GROWTH: f32 = 1.06;
    /// Maximum miss streak stacks counted for speed growth
    pub const SPEED_MISS_CAP: u32 = 5;

    /// Seconds before an untouched round times out
    pub const ROUND_TIMEOUT: f32 = 4.0;
    /// Seconds between the round resolving and the enemy striking
    pub const POST_INPUT_DELAY: f32 = 0.45;
    /// Hit-stop length after a strike (real seconds)
    pub const HIT_STOP_DURATION: f32 = 0.08;
    /// Time scale while hit-stop is active
    pub const HIT_STOP_TIME_SCALE: f32 = 0.2;

    /// Grace padding = cursor speed * this, clamped to [GRACE_MIN, GRACE_MAX]
    pub const INPUT_GRACE: f32 = 0.02;
    pub const GRACE_MIN: f32 = 0.015;
    pub const GRACE_MAX: f32 = 0.18;

    /// Player base damage roll (inclusive)
    pub const PLAYER_MIN_DAMAGE: u32 = 6;
    pub const PLAYER_MAX_DAMAGE: u32 = 10;
    /// Damage multiplier added per combo tier (3 combo = 1 tier)
    pub const COMBO_STEP: f32 = 0.1;
    /// Tiers past this contribute at the overflow rate
    pub const COMBO_TIER_CAP: u32 = 5;
    pub const COMBO_OVERFLOW_STEP: f32 = 0.5;
    /// Combo counter ceiling
    pub const COMBO_CEILING: u32 = 999;
    /// Flat multiplier bonus for crit segments
    pub const CRIT_BONUS: f32 = 0.5;

    /// Fraction of enemy damage that still lands through a block
    pub const BLOCK_DAMAGE_REDUCTION: f32 = 0.2;

    /// Shard rewards
    pub const SHARD_PER_WIN: u32 = 12;
    pub const SHARD_PER_ELITE: u32 = 24;

    /// Relic drop chance = base + (floor-1) * per_floor + elite bonus, clamped
    pub const RELIC_DROP_BASE: f32 = 0.05;
    pub const RELIC_DROP_PER_FLOOR: f32 = 0.02;
    pub const RELIC_DROP_ELITE_BONUS: f32 = 0.15;
    pub const RELIC_DROP_CAP: f32 = 0.95;

    /// Segment placement retry budget per round
    pub const MAX_PLACEMENT_ATTEMPTS: u32 = 240;

    /// Cosmetic timers (seconds)
    pub const TRACK_FLASH_TIME: f32 = 0.2;
    pub const SHAKE_TIME: f32 = 0.3;
    pub const ENEMY_BAR_FLASH_TIME: f32 = 0.25;
    pub const PLAYER_BAR_FLASH_TIME: f32 = 0.3;
    pub const COMBO_POP_TIME: f32 = 0.3;
    pub const COMBO_RESET_MISS_TIME: f32 = 0.35;
    pub const COMBO_RESET_BLOCK_TIME: f32 = 0.25;

    /// Enemy stat scaling per floor past the first
    pub const ENEMY_HP_PER_FLOOR: f32 = 0.10;
    pub const ENEMY_DMG_PER_FLOOR: f32 = 0.08;
    pub const ELITE_HP_SCALAR: f32 = 1.5;
    pub const ELITE_DMG_SCALAR: f32 = 1.25;

    /// Player defaults
    pub const PLAYER_MAX_HP: i32 = 100;

    /// Sanctuary prices grow per floor past the first
    pub const RELIC_COST_BASE: u32 = 200;
    pub const RELIC_COST_PER_FLOOR: u32 = 5;
    pub const HEAL_COST_BASE: u32 = 80;
    pub const HEAL_COST_PER_FLOOR: u32 = 3;
    /// Sanctuary heal restores `HEAL_BASE + HEAL_PER_FLOOR * floor`, capped at missing HP
    pub const HEAL_BASE: i32 = 40;
    pub const HEAL_PER_FLOOR: i32 = 5;
}

/// Clamp to [min, max] without panicking on inverted bounds (min wins)
#[inline]
pub fn clampf(value: f32, min: f32, max: f32) -> f32 {
    value.min(max).max(min)
}
