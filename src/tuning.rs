//! Data-driven combat balance
//!
//! Every number the combat engine uses comes from `CombatTuning`. Defaults
//! match `crate::consts`; a JSON document may override any subset of fields.

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::TuningError;
use crate::sim::profile::{DifficultyProfile, ProfileTable, Range};

/// Upper bound for `speed_miss_cap`; growth stacks are an `i32` exponent
const MAX_SPEED_MISS_CAP: u32 = 64;

/// Combat balance knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatTuning {
    // === Cursor ===
    pub cursor_base_speed: f32,
    pub cursor_speed_per_floor: f32,
    pub elite_cursor_scalar: f32,
    pub cursor_speed_floor: f32,
    pub cursor_speed_growth: f32,
    pub speed_miss_cap: u32,

    // === Round timing ===
    pub round_timeout: f32,
    pub post_input_delay: f32,
    pub hit_stop_duration: f32,
    pub hit_stop_time_scale: f32,

    // === Input grace ===
    pub input_grace: f32,
    pub grace_min: f32,
    pub grace_max: f32,

    // === Player damage and combo ===
    pub player_min_damage: u32,
    pub player_max_damage: u32,
    pub combo_step: f32,
    pub combo_tier_cap: u32,
    pub combo_overflow_step: f32,
    pub combo_ceiling: u32,
    pub crit_bonus: f32,

    // === Defense ===
    pub block_damage_reduction: f32,

    // === Rewards ===
    pub shard_per_win: u32,
    pub shard_per_elite: u32,
    pub relic_drop_base: f32,
    pub relic_drop_per_floor: f32,
    pub relic_drop_elite_bonus: f32,
    pub relic_drop_cap: f32,

    // === Segment generation ===
    pub max_placement_attempts: u32,
    /// Guard band for hit and crit widths after relic scaling
    pub strike_width_band: Range,
    pub danger_width_band: Range,
    /// Block widths are sampled from `block_width` then clamped to `block_width_band`
    pub block_width: Range,
    pub block_width_band: Range,
    /// Placed when nothing else fit
    pub fallback_hit: Range,
    /// Last-chance block slot when a required block never fit
    pub fallback_block: Range,
    /// Danger segments are picked only when a roll lands under this
    pub danger_pick_chance: f32,

    // === Cosmetic timers ===
    pub track_flash_time: f32,
    pub shake_time: f32,
    pub enemy_bar_flash_time: f32,
    pub player_bar_flash_time: f32,
    pub combo_pop_time: f32,
    pub combo_reset_miss_time: f32,
    pub combo_reset_block_time: f32,

    // === Enemy scaling ===
    pub enemy_hp_per_floor: f32,
    pub enemy_dmg_per_floor: f32,
    pub elite_hp_scalar: f32,
    pub elite_dmg_scalar: f32,

    pub profiles: ProfileTable,
}

impl Default for CombatTuning {
    fn default() -> Self {
        Self {
            cursor_base_speed: CURSOR_BASE_SPEED,
            cursor_speed_per_floor: CURSOR_SPEED_PER_FLOOR,
            elite_cursor_scalar: ELITE_CURSOR_SCALAR,
            cursor_speed_floor: CURSOR_SPEED_FLOOR,
            cursor_speed_growth: CURSOR_SPEED_GROWTH,
            speed_miss_cap: SPEED_MISS_CAP,

            round_timeout: ROUND_TIMEOUT,
            post_input_delay: POST_INPUT_DELAY,
            hit_stop_duration: HIT_STOP_DURATION,
            hit_stop_time_scale: HIT_STOP_TIME_SCALE,

            input_grace: INPUT_GRACE,
            grace_min: GRACE_MIN,
            grace_max: GRACE_MAX,

            player_min_damage: PLAYER_MIN_DAMAGE,
            player_max_damage: PLAYER_MAX_DAMAGE,
            combo_step: COMBO_STEP,
            combo_tier_cap: COMBO_TIER_CAP,
            combo_overflow_step: COMBO_OVERFLOW_STEP,
            combo_ceiling: COMBO_CEILING,
            crit_bonus: CRIT_BONUS,

            block_damage_reduction: BLOCK_DAMAGE_REDUCTION,

            shard_per_win: SHARD_PER_WIN,
            shard_per_elite: SHARD_PER_ELITE,
            relic_drop_base: RELIC_DROP_BASE,
            relic_drop_per_floor: RELIC_DROP_PER_FLOOR,
            relic_drop_elite_bonus: RELIC_DROP_ELITE_BONUS,
            relic_drop_cap: RELIC_DROP_CAP,

            max_placement_attempts: MAX_PLACEMENT_ATTEMPTS,
            strike_width_band: Range::new(0.04, 0.5),
            danger_width_band: Range::new(0.04, 0.4),
            block_width: Range::new(0.08, 0.13),
            block_width_band: Range::new(0.06, 0.18),
            fallback_hit: Range::new(0.4, 0.6),
            fallback_block: Range::new(0.45, 0.55),
            danger_pick_chance: 0.6,

            track_flash_time: TRACK_FLASH_TIME,
            shake_time: SHAKE_TIME,
            enemy_bar_flash_time: ENEMY_BAR_FLASH_TIME,
            player_bar_flash_time: PLAYER_BAR_FLASH_TIME,
            combo_pop_time: COMBO_POP_TIME,
            combo_reset_miss_time: COMBO_RESET_MISS_TIME,
            combo_reset_block_time: COMBO_RESET_BLOCK_TIME,

            enemy_hp_per_floor: ENEMY_HP_PER_FLOOR,
            enemy_dmg_per_floor: ENEMY_DMG_PER_FLOOR,
            elite_hp_scalar: ELITE_HP_SCALAR,
            elite_dmg_scalar: ELITE_DMG_SCALAR,

            profiles: ProfileTable::default(),
        }
    }
}

impl CombatTuning {
    /// Parse a (possibly partial) JSON document and validate it
    pub fn from_json(json: &str) -> Result<Self, TuningError> {
        let tuning: Self = serde_json::from_str(json)?;
        tuning.validate()?;
        log::info!("Loaded combat tuning");
        Ok(tuning)
    }

    pub fn to_json(&self) -> Result<String, TuningError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<(), TuningError> {
        positive("cursor_base_speed", self.cursor_base_speed)?;
        positive("cursor_speed_floor", self.cursor_speed_floor)?;
        positive("elite_cursor_scalar", self.elite_cursor_scalar)?;
        positive("round_timeout", self.round_timeout)?;
        non_negative("cursor_speed_per_floor", self.cursor_speed_per_floor)?;
        non_negative("post_input_delay", self.post_input_delay)?;
        non_negative("hit_stop_duration", self.hit_stop_duration)?;
        non_negative("input_grace", self.input_grace)?;
        non_negative("combo_step", self.combo_step)?;
        non_negative("combo_overflow_step", self.combo_overflow_step)?;
        non_negative("crit_bonus", self.crit_bonus)?;

        if !self.cursor_speed_growth.is_finite() || self.cursor_speed_growth < 1.0 {
            return Err(TuningError::invalid("cursor_speed_growth", "must be at least 1"));
        }
        unit("hit_stop_time_scale", self.hit_stop_time_scale)?;
        unit("block_damage_reduction", self.block_damage_reduction)?;
        unit("relic_drop_cap", self.relic_drop_cap)?;
        unit("danger_pick_chance", self.danger_pick_chance)?;

        if self.player_min_damage > self.player_max_damage {
            return Err(TuningError::invalid(
                "player_min_damage",
                "must not exceed player_max_damage",
            ));
        }
        if self.grace_min > self.grace_max {
            return Err(TuningError::invalid("grace_min", "must not exceed grace_max"));
        }
        if self.speed_miss_cap > MAX_SPEED_MISS_CAP {
            return Err(TuningError::invalid(
                "speed_miss_cap",
                format!("must not exceed {MAX_SPEED_MISS_CAP}"),
            ));
        }
        if self.max_placement_attempts == 0 {
            return Err(TuningError::invalid("max_placement_attempts", "must be positive"));
        }

        track_range("strike_width_band", self.strike_width_band)?;
        track_range("danger_width_band", self.danger_width_band)?;
        track_range("block_width", self.block_width)?;
        track_range("block_width_band", self.block_width_band)?;
        track_range("fallback_hit", self.fallback_hit)?;
        track_range("fallback_block", self.fallback_block)?;

        for (kind, profile) in self.profiles.iter() {
            validate_profile(&format!("profiles.{kind:?}"), profile)?;
        }
        Ok(())
    }
}

fn positive(field: &str, value: f32) -> Result<(), TuningError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(TuningError::invalid(field, "must be positive"))
    }
}

fn non_negative(field: &str, value: f32) -> Result<(), TuningError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(TuningError::invalid(field, "must not be negative"))
    }
}

fn unit(field: &str, value: f32) -> Result<(), TuningError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(TuningError::invalid(field, "must be within [0, 1]"))
    }
}

fn track_range(field: &str, range: Range) -> Result<(), TuningError> {
    if range.is_valid() && range.min >= 0.0 && range.max <= 1.0 {
        Ok(())
    } else {
        Err(TuningError::invalid(field, "must be an ordered range within [0, 1]"))
    }
}

fn validate_profile(prefix: &str, profile: &DifficultyProfile) -> Result<(), TuningError> {
    if profile.min_segments == 0 || profile.min_segments > profile.max_segments {
        return Err(TuningError::invalid(
            format!("{prefix}.min_segments"),
            "must be positive and not exceed max_segments",
        ));
    }
    positive(&format!("{prefix}.cursor_scalar"), profile.cursor_scalar)?;
    unit(&format!("{prefix}.crit_chance"), profile.crit_chance)?;
    track_range(&format!("{prefix}.danger_coverage"), profile.danger_coverage)?;
    track_range(&format!("{prefix}.hit_width"), profile.hit_width)?;
    track_range(&format!("{prefix}.crit_width"), profile.crit_width)?;
    track_range(&format!("{prefix}.danger_width"), profile.danger_width)?;
    Ok(())
}
