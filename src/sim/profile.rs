//! Per-enemy difficulty profiles
//!
//! A profile controls how the track is laid out each round: how many
//! segments, how much of it is dangerous, how wide each kind is, and how
//! often a block zone shows up.

use serde::{Deserialize, Serialize};

use super::state::EnemyKind;

/// Inclusive `[min, max]` range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f32,
    pub max: f32,
}

impl Range {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Linear interpolation with `t` in [0, 1)
    #[inline]
    pub fn lerp(&self, t: f32) -> f32 {
        self.min + t * (self.max - self.min)
    }

    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min <= self.max
    }
}

/// Segment layout tuning for one enemy kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifficultyProfile {
    pub min_segments: u32,
    pub max_segments: u32,
    /// Target fraction of the track covered by danger segments
    pub danger_coverage: Range,
    /// Chance of the round's single crit segment
    pub crit_chance: f32,
    /// Multiplies cursor base speed
    pub cursor_scalar: f32,
    /// A block segment appears every `block_frequency` rounds (0 = never)
    pub block_frequency: u32,
    pub hit_width: Range,
    pub crit_width: Range,
    pub danger_width: Range,
}

impl DifficultyProfile {
    pub fn grunt() -> Self {
        Self {
            min_segments: 3,
            max_segments: 5,
            danger_coverage: Range::new(0.16, 0.22),
            crit_chance: 0.25,
            cursor_scalar: 1.0,
            block_frequency: 3,
            hit_width: Range::new(0.08, 0.18),
            crit_width: Range::new(0.08, 0.16),
            danger_width: Range::new(0.05, 0.12),
        }
    }

    pub fn archer() -> Self {
        Self {
            min_segments: 4,
            max_segments: 6,
            danger_coverage: Range::new(0.22, 0.30),
            crit_chance: 0.2,
            cursor_scalar: 1.1,
            block_frequency: 2,
            hit_width: Range::new(0.06, 0.12),
            crit_width: Range::new(0.06, 0.10),
            danger_width: Range::new(0.06, 0.14),
        }
    }

    pub fn slime() -> Self {
        Self {
            min_segments: 3,
            max_segments: 4,
            danger_coverage: Range::new(0.12, 0.18),
            crit_chance: 0.3,
            cursor_scalar: 0.9,
            block_frequency: 4,
            hit_width: Range::new(0.12, 0.22),
            crit_width: Range::new(0.14, 0.24),
            danger_width: Range::new(0.05, 0.10),
        }
    }

    /// True when round `round_index` (0-based) must carry a block segment
    pub fn block_due(&self, round_index: u32) -> bool {
        self.block_frequency > 0 && (round_index + 1) % self.block_frequency == 0
    }
}

/// Partial profile from tuning data; missing fields keep the kind's defaults
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ProfileOverride {
    min_segments: Option<u32>,
    max_segments: Option<u32>,
    danger_coverage: Option<Range>,
    crit_chance: Option<f32>,
    cursor_scalar: Option<f32>,
    block_frequency: Option<u32>,
    hit_width: Option<Range>,
    crit_width: Option<Range>,
    danger_width: Option<Range>,
}

impl ProfileOverride {
    fn apply(self, mut base: DifficultyProfile) -> DifficultyProfile {
        base.min_segments = self.min_segments.unwrap_or(base.min_segments);
        base.max_segments = self.max_segments.unwrap_or(base.max_segments);
        base.danger_coverage = self.danger_coverage.unwrap_or(base.danger_coverage);
        base.crit_chance = self.crit_chance.unwrap_or(base.crit_chance);
        base.cursor_scalar = self.cursor_scalar.unwrap_or(base.cursor_scalar);
        base.block_frequency = self.block_frequency.unwrap_or(base.block_frequency);
        base.hit_width = self.hit_width.unwrap_or(base.hit_width);
        base.crit_width = self.crit_width.unwrap_or(base.crit_width);
        base.danger_width = self.danger_width.unwrap_or(base.danger_width);
        base
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProfileTableOverride {
    grunt: ProfileOverride,
    archer: ProfileOverride,
    slime: ProfileOverride,
}

impl From<ProfileTableOverride> for ProfileTable {
    fn from(table: ProfileTableOverride) -> Self {
        Self {
            grunt: table.grunt.apply(DifficultyProfile::grunt()),
            archer: table.archer.apply(DifficultyProfile::archer()),
            slime: table.slime.apply(DifficultyProfile::slime()),
        }
    }
}

/// Profiles keyed by enemy kind
///
/// Deserializes from any subset of kinds and fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ProfileTableOverride")]
pub struct ProfileTable {
    pub grunt: DifficultyProfile,
    pub archer: DifficultyProfile,
    pub slime: DifficultyProfile,
}

impl Default for ProfileTable {
    fn default() -> Self {
        Self {
            grunt: DifficultyProfile::grunt(),
            archer: DifficultyProfile::archer(),
            slime: DifficultyProfile::slime(),
        }
    }
}

impl ProfileTable {
    pub fn for_kind(&self, kind: EnemyKind) -> &DifficultyProfile {
        match kind {
            EnemyKind::Grunt => &self.grunt,
            EnemyKind::Archer => &self.archer,
            EnemyKind::Slime => &self.slime,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (EnemyKind, &DifficultyProfile)> {
        [
            (EnemyKind::Grunt, &self.grunt),
            (EnemyKind::Archer, &self.archer),
            (EnemyKind::Slime, &self.slime),
        ]
        .into_iter()
    }
}
