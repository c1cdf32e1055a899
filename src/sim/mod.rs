//! Deterministic combat simulation
//!
//! All combat logic lives here. This module must be pure and deterministic:
//! - Caller-driven time steps only
//! - Seeded RNG only, borrowed per call
//! - Events returned in firing order
//! - No rendering or platform dependencies

pub mod profile;
pub mod relic;
pub mod segments;
pub mod state;
pub mod tick;

pub use profile::{DifficultyProfile, ProfileTable, Range};
pub use relic::{Relic, RelicCatalog, RelicModifiers};
pub use segments::{SegmentHit, WidthScale, find_segment_at, generate_segments, grace_window};
pub use state::{
    CombatEvent, CombatPhase, CombatSegment, CombatSession, Enemy, EnemyKind, Player,
    RoundResult, SegmentType, SessionFx, VictoryReward,
};
pub use tick::{CombatContext, CombatEngine, combo_multiplier, strike_damage};
