//! Relics and modifier aggregation
//!
//! A relic is an immutable modifier record. The engine never caches the
//! aggregate: the inventory can grow mid-run, so `RelicModifiers` is folded
//! from the current list every time it is needed.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::TuningError;

/// A passive modifier record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relic {
    pub id: String,
    pub name: String,
    pub desc: String,
    /// Multiplies strike damage
    #[serde(default = "one")]
    pub dmg_mult: f32,
    /// Added to the crit multiplier bonus
    #[serde(default)]
    pub crit_bonus_mult: f32,
    /// Hit width scale is `1 + hit_widen`
    #[serde(default)]
    pub hit_widen: f32,
    /// Crit width scale is `1 + crit_widen`
    #[serde(default)]
    pub crit_widen: f32,
    /// Multiplies cursor base speed
    #[serde(default = "one")]
    pub cursor_speed_mult: f32,
    #[serde(default)]
    pub combo_on_hit: u32,
    #[serde(default)]
    pub combo_on_crit: u32,
    #[serde(default)]
    pub heal_on_win: i32,
    /// Blocks zero out enemy damage instead of reducing it
    #[serde(default)]
    pub block_negates: bool,
}

fn one() -> f32 {
    1.0
}

impl Relic {
    /// A relic with neutral modifiers
    pub fn named(id: &str, name: &str, desc: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            desc: desc.to_string(),
            dmg_mult: 1.0,
            crit_bonus_mult: 0.0,
            hit_widen: 0.0,
            crit_widen: 0.0,
            cursor_speed_mult: 1.0,
            combo_on_hit: 0,
            combo_on_crit: 0,
            heal_on_win: 0,
            block_negates: false,
        }
    }
}

/// Scalar modifiers folded from an inventory
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelicModifiers {
    pub damage_mult: f32,
    pub crit_bonus: f32,
    pub hit_width_mult: f32,
    pub crit_width_mult: f32,
    pub cursor_speed_mult: f32,
    pub combo_on_hit: u32,
    pub combo_on_crit: u32,
    pub heal_on_win: i32,
    pub block_negates: bool,
}

impl Default for RelicModifiers {
    fn default() -> Self {
        Self {
            damage_mult: 1.0,
            crit_bonus: 0.0,
            hit_width_mult: 1.0,
            crit_width_mult: 1.0,
            cursor_speed_mult: 1.0,
            combo_on_hit: 0,
            combo_on_crit: 0,
            heal_on_win: 0,
            block_negates: false,
        }
    }
}

impl RelicModifiers {
    /// Fold an inventory. Multiplicative fields multiply, additive fields sum,
    /// duplicates count once per copy.
    pub fn from_relics(relics: &[Relic]) -> Self {
        relics.iter().fold(Self::default(), |mut acc, relic| {
            acc.damage_mult *= relic.dmg_mult;
            acc.crit_bonus += relic.crit_bonus_mult;
            acc.hit_width_mult *= 1.0 + relic.hit_widen;
            acc.crit_width_mult *= 1.0 + relic.crit_widen;
            acc.cursor_speed_mult *= relic.cursor_speed_mult;
            acc.combo_on_hit = acc.combo_on_hit.saturating_add(relic.combo_on_hit);
            acc.combo_on_crit = acc.combo_on_crit.saturating_add(relic.combo_on_crit);
            acc.heal_on_win = acc.heal_on_win.saturating_add(relic.heal_on_win);
            acc.block_negates |= relic.block_negates;
            acc
        })
    }
}

/// Relics that can drop from combat or be bought at a sanctuary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelicCatalog {
    relics: Vec<Relic>,
}

impl RelicCatalog {
    pub fn new(relics: Vec<Relic>) -> Result<Self, TuningError> {
        if relics.is_empty() {
            return Err(TuningError::EmptyCatalog);
        }
        Ok(Self { relics })
    }

    pub fn relics(&self) -> &[Relic] {
        &self.relics
    }

    /// Draw one relic uniformly
    pub fn random<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Relic> {
        if self.relics.is_empty() {
            return None;
        }
        let index = rng.random_range(0..self.relics.len());
        self.relics.get(index).cloned()
    }
}

impl Default for RelicCatalog {
    fn default() -> Self {
        let relics = vec![
            Relic {
                dmg_mult: 1.12,
                ..Relic::named("sharpened_edge", "Sharpened Edge", "+12% damage to all strikes")
            },
            Relic {
                crit_bonus_mult: 0.6,
                crit_widen: 0.05,
                combo_on_crit: 2,
                ..Relic::named(
                    "perfect_timing",
                    "Perfect Timing",
                    "Criticals deal +60% damage, +5% crit window",
                )
            },
            Relic {
                hit_widen: 0.05,
                crit_widen: 0.05,
                cursor_speed_mult: 0.9,
                ..Relic::named("focus_charm", "Focus Charm", "Cursor slows by 10%")
            },
            Relic {
                heal_on_win: 12,
                ..Relic::named("second_wind", "Second Wind", "Heal 12 HP on victory")
            },
            Relic {
                block_negates: true,
                ..Relic::named("guard_sigil", "Guard Sigil", "Blocks fully negate damage")
            },
        ];
        Self { relics }
    }
}
