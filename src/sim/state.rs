//! Combat state and core simulation types
//!
//! Everything a live combat session owns lives here, along with the records
//! the engine borrows from the rest of the game (player, enemy) and the
//! events it hands back to the host.

use serde::{Deserialize, Serialize};

use super::relic::Relic;
use crate::tuning::CombatTuning;

/// Behavior tag for a track segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SegmentType {
    /// Normal strike
    Hit,
    /// Strike with a flat multiplier bonus
    Crit,
    /// Counts as a miss
    Danger,
    /// Reduces the enemy's next strike
    Block,
}

impl SegmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentType::Hit => "HIT",
            SegmentType::Crit => "CRIT",
            SegmentType::Danger => "DANGER",
            SegmentType::Block => "BLOCK",
        }
    }

    /// True for segments that damage the enemy
    pub fn is_strike(&self) -> bool {
        matches!(self, SegmentType::Hit | SegmentType::Crit)
    }
}

/// A half-open interval `[start, end)` on the normalized 0..1 track
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CombatSegment {
    pub start: f32,
    pub end: f32,
    pub kind: SegmentType,
}

impl CombatSegment {
    pub fn new(start: f32, end: f32, kind: SegmentType) -> Self {
        Self { start, end, kind }
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.end - self.start
    }

    /// Check if `[start, end)` intersects this segment (touching edges do not)
    #[inline]
    pub fn overlaps(&self, start: f32, end: f32) -> bool {
        !(end <= self.start || start >= self.end)
    }
}

/// Enemy archetypes, each with its own difficulty profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EnemyKind {
    #[default]
    Grunt,
    Archer,
    Slime,
}

impl EnemyKind {
    /// Floor-1 stats: (hp, min damage, max damage)
    pub fn base_stats(&self) -> (i32, i32, i32) {
        match self {
            EnemyKind::Grunt => (38, 5, 9),
            EnemyKind::Archer => (32, 6, 10),
            EnemyKind::Slime => (48, 7, 12),
        }
    }

    pub fn display_name(&self, elite: bool) -> &'static str {
        match (self, elite) {
            (EnemyKind::Grunt, false) => "Shade",
            (EnemyKind::Grunt, true) => "Elite Shade",
            (EnemyKind::Archer, false) => "Watcher",
            (EnemyKind::Archer, true) => "Elite Watcher",
            (EnemyKind::Slime, false) => "Slime",
            (EnemyKind::Slime, true) => "Elder Slime",
        }
    }
}

/// Combat stats of the engaged enemy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enemy {
    pub kind: EnemyKind,
    pub elite: bool,
    pub name: String,
    pub max_hp: i32,
    pub hp: i32,
    pub min_dmg: i32,
    pub max_dmg: i32,
}

impl Enemy {
    /// Spawn an enemy scaled for the given floor
    pub fn spawn(kind: EnemyKind, elite: bool, floor: u32, tuning: &CombatTuning) -> Self {
        let (base_hp, base_min, base_max) = kind.base_stats();
        let floor_index = floor.saturating_sub(1) as f32;
        let hp_scalar = 1.0 + floor_index * tuning.enemy_hp_per_floor;
        let dmg_scalar = 1.0 + floor_index * tuning.enemy_dmg_per_floor;

        let mut hp = (base_hp as f32 * hp_scalar).round() as i32;
        let mut min_dmg = (base_min as f32 * dmg_scalar).round() as i32;
        let mut max_dmg = (base_max as f32 * dmg_scalar).round() as i32;

        if elite {
            hp = (hp as f32 * tuning.elite_hp_scalar).round() as i32;
            min_dmg = (min_dmg as f32 * tuning.elite_dmg_scalar).round() as i32;
            max_dmg = (max_dmg as f32 * tuning.elite_dmg_scalar).round() as i32;
        }

        let max_hp = hp.max(1);
        let min_dmg = min_dmg.max(1);
        Self {
            kind,
            elite,
            name: kind.display_name(elite).to_string(),
            max_hp,
            hp: max_hp,
            min_dmg,
            max_dmg: max_dmg.max(min_dmg),
        }
    }

    pub fn is_dead(&self) -> bool {
        self.hp <= 0
    }
}

/// The player's health, shared with the rest of the game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub hp: i32,
    pub max_hp: i32,
}

impl Player {
    pub fn new(max_hp: i32) -> Self {
        Self { hp: max_hp, max_hp }
    }

    /// Heal up to max HP, returns the amount actually restored
    pub fn heal(&mut self, amount: i32) -> i32 {
        let before = self.hp;
        self.hp = (self.hp + amount.max(0)).min(self.max_hp);
        self.hp - before
    }
}

impl Default for Player {
    fn default() -> Self {
        Self::new(crate::consts::PLAYER_MAX_HP)
    }
}

/// Status shown for the most recent resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RoundResult {
    #[default]
    None,
    Hit,
    Crit,
    Miss,
    Timeout,
    Block,
    EnemyHit,
    Guard,
    Blocked,
    Safe,
}

impl RoundResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoundResult::None => "",
            RoundResult::Hit => "HIT",
            RoundResult::Crit => "CRIT",
            RoundResult::Miss => "MISS",
            RoundResult::Timeout => "TIMEOUT",
            RoundResult::Block => "BLOCK",
            RoundResult::EnemyHit => "ENEMY HIT",
            RoundResult::Guard => "GUARD",
            RoundResult::Blocked => "BLOCKED",
            RoundResult::Safe => "SAFE",
        }
    }
}

/// Cosmetic timers (not gameplay-affecting)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionFx {
    /// Track flash after a strike
    pub flash: f32,
    /// Screen shake after a miss or an enemy hit
    pub shake: f32,
    pub enemy_bar_flash: f32,
    pub player_bar_flash: f32,
    pub combo_pop: f32,
    pub combo_reset: f32,
    /// Enemy wind-up, grows while a strike is scheduled
    pub intent: f32,
}

impl SessionFx {
    /// Linear decay toward zero (intent is handled by the tick)
    pub fn decay(&mut self, dt: f32) {
        for timer in [
            &mut self.flash,
            &mut self.shake,
            &mut self.enemy_bar_flash,
            &mut self.player_bar_flash,
            &mut self.combo_pop,
            &mut self.combo_reset,
        ] {
            if *timer > 0.0 {
                *timer = (*timer - dt).max(0.0);
            }
        }
    }
}

/// Observable lifecycle phase of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombatPhase {
    /// No combat in progress
    Idle,
    /// Cursor sweeping, waiting for input
    RoundActive,
    /// Round decided, enemy turn pending
    AwaitingEnemyTurn,
}

/// A live combat session. Exists only while combat is active.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatSession {
    pub enemy: Enemy,
    /// Shards carried into combat, kept for the host (rewards do not read it)
    pub shards: u32,
    /// Dungeon floor, always >= 1
    pub floor: u32,
    /// Sorted by start, pairwise disjoint
    pub segments: Vec<CombatSegment>,

    pub cursor_pos: f32,
    pub cursor_forward: bool,
    pub cursor_speed: f32,
    pub cursor_base_speed: f32,

    pub combo_count: u32,
    /// Eased combo value for HUD display
    pub combo_visual: f32,
    pub miss_streak: u32,

    pub round_index: u32,
    pub round_elapsed: f32,
    pub round_duration: f32,
    pub post_input_timer: f32,
    pub hit_stop_timer: f32,

    pub input_processed: bool,
    pub awaiting_enemy_turn: bool,
    pub blocked_this_round: bool,
    pub guard_consumed_this_round: bool,
    pub enemy_strike_scheduled: bool,

    pub stored_guard_charges: u32,

    pub fx: SessionFx,
    pub last_result: RoundResult,
    pub last_damage: i32,
    pub last_enemy_damage: i32,
    pub last_strike_type: Option<SegmentType>,
    pub last_resolved_cursor: f32,
    pub last_was_timeout: bool,
}

impl CombatSession {
    pub fn new(enemy: Enemy, shards: u32, floor: u32, guard_charges: u32, round_duration: f32) -> Self {
        Self {
            enemy,
            shards,
            floor: floor.max(1),
            segments: Vec::new(),
            cursor_pos: 0.0,
            cursor_forward: true,
            cursor_speed: 0.0,
            cursor_base_speed: 0.0,
            combo_count: 0,
            combo_visual: 0.0,
            miss_streak: 0,
            round_index: 0,
            round_elapsed: 0.0,
            round_duration,
            post_input_timer: 0.0,
            hit_stop_timer: 0.0,
            input_processed: false,
            awaiting_enemy_turn: false,
            blocked_this_round: false,
            guard_consumed_this_round: false,
            enemy_strike_scheduled: false,
            stored_guard_charges: guard_charges,
            fx: SessionFx::default(),
            last_result: RoundResult::None,
            last_damage: 0,
            last_enemy_damage: 0,
            last_strike_type: None,
            last_resolved_cursor: 0.0,
            last_was_timeout: false,
        }
    }

    /// Advance the ping-pong cursor, bouncing at both ends
    pub fn advance_cursor(&mut self, dt: f32) {
        let delta = self.cursor_speed * dt;
        if self.cursor_forward {
            self.cursor_pos += delta;
            if self.cursor_pos >= 1.0 {
                self.cursor_pos = 1.0;
                self.cursor_forward = false;
            }
        } else {
            self.cursor_pos -= delta;
            if self.cursor_pos <= 0.0 {
                self.cursor_pos = 0.0;
                self.cursor_forward = true;
            }
        }
    }

    pub fn phase(&self) -> CombatPhase {
        if self.awaiting_enemy_turn {
            CombatPhase::AwaitingEnemyTurn
        } else {
            CombatPhase::RoundActive
        }
    }
}

/// Reward emitted once per combat win
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VictoryReward {
    pub shards_earned: u32,
    pub new_relics: Vec<Relic>,
}

/// Events emitted by the engine, in the order they happened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CombatEvent {
    /// Enemy defeated; the session is already gone
    Victory { enemy: Enemy, reward: VictoryReward },
    /// Player defeated; the session is already gone
    Defeat,
    /// Stored guard charges were set or consumed
    GuardChargesChanged { charges: u32 },
    /// Player landed a hit or crit
    Strike {
        kind: SegmentType,
        position: f32,
        damage: i32,
    },
    /// A non-strike segment resolved (block)
    SegmentEffect {
        segment: CombatSegment,
        kind: SegmentType,
    },
    /// Round lost to a miss, a danger segment, or the timer
    Miss { timeout: bool },
    /// Enemy turn resolved
    EnemyTurn { damage: i32, result: RoundResult },
}
