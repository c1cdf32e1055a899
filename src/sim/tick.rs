//! Combat round lifecycle
//!
//! The host calls `update` once per fixed tick and `process_input` on a player
//! action. Both return the events that fired, in order. An enemy turn can end
//! the session inside `update`, so check `is_active` before touching the
//! session again.

use rand::Rng;

use super::relic::{Relic, RelicCatalog, RelicModifiers};
use super::segments::{WidthScale, find_segment_at, generate_segments, grace_window};
use super::state::{
    CombatEvent, CombatPhase, CombatSegment, CombatSession, Enemy, Player, RoundResult,
    SegmentType, VictoryReward,
};
use crate::clampf;
use crate::error::TuningError;
use crate::tuning::CombatTuning;

/// Collaborators borrowed from the rest of the game for one call
pub struct CombatContext<'a, R: Rng + ?Sized> {
    /// The session-wide RNG stream
    pub rng: &'a mut R,
    pub player: &'a mut Player,
    /// Owned relics in acquisition order; victory drops are appended here
    pub relics: &'a mut Vec<Relic>,
}

impl<'a, R: Rng + ?Sized> CombatContext<'a, R> {
    pub fn new(rng: &'a mut R, player: &'a mut Player, relics: &'a mut Vec<Relic>) -> Self {
        Self {
            rng,
            player,
            relics,
        }
    }

    /// Aggregate of the current inventory (never cached, the list can grow)
    pub fn modifiers(&self) -> RelicModifiers {
        RelicModifiers::from_relics(self.relics.as_slice())
    }
}

/// How a resolution left the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Victory,
    Defeat,
}

/// Timing combat engine. Idle until `begin_combat`, idle again after the
/// session ends.
#[derive(Debug, Clone)]
pub struct CombatEngine {
    tuning: CombatTuning,
    catalog: RelicCatalog,
    session: Option<CombatSession>,
}

impl Default for CombatEngine {
    fn default() -> Self {
        Self {
            tuning: CombatTuning::default(),
            catalog: RelicCatalog::default(),
            session: None,
        }
    }
}

impl CombatEngine {
    pub fn new(tuning: CombatTuning, catalog: RelicCatalog) -> Result<Self, TuningError> {
        tuning.validate()?;
        if catalog.relics().is_empty() {
            return Err(TuningError::EmptyCatalog);
        }
        Ok(Self {
            tuning,
            catalog,
            session: None,
        })
    }

    pub fn tuning(&self) -> &CombatTuning {
        &self.tuning
    }

    pub fn catalog(&self) -> &RelicCatalog {
        &self.catalog
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&CombatSession> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut CombatSession> {
        self.session.as_mut()
    }

    pub fn phase(&self) -> CombatPhase {
        self.session
            .as_ref()
            .map_or(CombatPhase::Idle, CombatSession::phase)
    }

    /// Abandon combat without emitting anything
    pub fn clear(&mut self) {
        if self.session.take().is_some() {
            log::debug!("Combat cleared");
        }
    }

    /// Start a new session against `enemy`, replacing any current one
    pub fn begin_combat<R: Rng + ?Sized>(
        &mut self,
        ctx: &mut CombatContext<'_, R>,
        enemy: Enemy,
        shards: u32,
        floor: u32,
        guard_charges: u32,
    ) -> Vec<CombatEvent> {
        if self.session.is_some() {
            log::warn!("Beginning combat while another session is active");
        }

        let tuning = &self.tuning;
        let mods = ctx.modifiers();
        let profile = tuning.profiles.for_kind(enemy.kind);

        let mut session =
            CombatSession::new(enemy, shards, floor, guard_charges, tuning.round_timeout);
        let floor_scalar = 1.0 + (session.floor - 1) as f32 * tuning.cursor_speed_per_floor;
        let elite_scalar = if session.enemy.elite {
            tuning.elite_cursor_scalar
        } else {
            1.0
        };
        session.cursor_base_speed = tuning.cursor_base_speed
            * profile.cursor_scalar
            * floor_scalar
            * mods.cursor_speed_mult
            * elite_scalar;
        session.cursor_speed = session.cursor_base_speed;

        log::info!(
            "Combat start: {} (hp {}, floor {}, cursor {:.3})",
            session.enemy.name,
            session.enemy.hp,
            session.floor,
            session.cursor_base_speed
        );

        setup_round(&mut session, tuning, ctx, true);
        let charges = session.stored_guard_charges;
        self.session = Some(session);

        vec![CombatEvent::GuardChargesChanged { charges }]
    }

    /// Advance the session by `dt` seconds
    pub fn update<R: Rng + ?Sized>(
        &mut self,
        ctx: &mut CombatContext<'_, R>,
        dt: f32,
    ) -> Vec<CombatEvent> {
        let mut events = Vec::new();
        let tuning = &self.tuning;
        let Some(session) = self.session.as_mut() else {
            return events;
        };
        let dt = dt.max(0.0);

        let time_scale = if session.hit_stop_timer > 0.0 {
            tuning.hit_stop_time_scale
        } else {
            1.0
        };
        let scaled_dt = dt * time_scale;
        session.hit_stop_timer = (session.hit_stop_timer - dt).max(0.0);
        session.round_elapsed += scaled_dt;
        session.advance_cursor(scaled_dt);

        if !session.input_processed && session.round_elapsed >= session.round_duration {
            register_miss(session, tuning, false, &mut events);
        }

        session.fx.decay(dt);
        if session.enemy_strike_scheduled {
            session.fx.intent += scaled_dt;
        } else {
            session.fx.intent = (session.fx.intent - scaled_dt * 0.5).max(0.0);
        }

        if session.awaiting_enemy_turn {
            session.post_input_timer += scaled_dt;
            if session.post_input_timer >= tuning.post_input_delay {
                match resolve_enemy_turn(session, tuning, ctx, &mut events) {
                    Flow::Continue => {}
                    Flow::Victory => {
                        self.finish_victory(ctx, &mut events);
                        return events;
                    }
                    Flow::Defeat => {
                        self.finish_defeat(&mut events);
                        return events;
                    }
                }
            }
        }

        session.combo_visual +=
            (session.combo_count as f32 - session.combo_visual) * (dt * 6.0).min(1.0);

        events
    }

    /// Resolve the player's action against the segment under the cursor
    pub fn process_input<R: Rng + ?Sized>(
        &mut self,
        ctx: &mut CombatContext<'_, R>,
    ) -> Vec<CombatEvent> {
        let mut events = Vec::new();
        let tuning = &self.tuning;
        let Some(session) = self.session.as_mut() else {
            return events;
        };
        if session.input_processed {
            return events;
        }

        let grace = grace_window(session.cursor_speed, tuning);
        let Some(hit) = find_segment_at(&session.segments, session.cursor_pos, grace) else {
            log::trace!("Input at {:.3} hit empty track", session.cursor_pos);
            register_miss(session, tuning, true, &mut events);
            return events;
        };

        log::trace!(
            "Input at {:.3} resolved to {} at {:.3}",
            session.cursor_pos,
            hit.segment.kind.as_str(),
            hit.resolved_position
        );
        session.last_resolved_cursor = hit.resolved_position;
        session.last_was_timeout = false;

        match hit.segment.kind {
            SegmentType::Danger => register_miss(session, tuning, true, &mut events),
            SegmentType::Block => handle_block(session, tuning, hit.segment, &mut events),
            SegmentType::Hit | SegmentType::Crit => {
                let flow = resolve_player_strike(
                    session,
                    tuning,
                    ctx,
                    hit.segment.kind,
                    hit.resolved_position,
                    &mut events,
                );
                if flow == Flow::Victory {
                    self.finish_victory(ctx, &mut events);
                }
            }
        }

        events
    }

    fn finish_victory<R: Rng + ?Sized>(
        &mut self,
        ctx: &mut CombatContext<'_, R>,
        events: &mut Vec<CombatEvent>,
    ) {
        let Some(session) = self.session.take() else {
            return;
        };
        let reward = grant_victory_rewards(&session, &self.tuning, &self.catalog, ctx);
        log::info!(
            "Victory over {}: +{} shards, {} new relic(s)",
            session.enemy.name,
            reward.shards_earned,
            reward.new_relics.len()
        );
        events.push(CombatEvent::Victory {
            enemy: session.enemy,
            reward,
        });
    }

    fn finish_defeat(&mut self, events: &mut Vec<CombatEvent>) {
        if let Some(session) = self.session.take() {
            log::info!(
                "Defeated by {} on round {}",
                session.enemy.name,
                session.round_index
            );
            events.push(CombatEvent::Defeat);
        }
    }
}

/// Damage multiplier from the combo counter (before relics)
///
/// Every 3 combo is one tier; tiers past the cap count at the overflow rate.
pub fn combo_multiplier(combo: u32, tuning: &CombatTuning) -> f32 {
    let tier = combo / 3;
    let capped = tier.min(tuning.combo_tier_cap);
    let overflow = tier.saturating_sub(tuning.combo_tier_cap);
    let effective = capped as f32 + overflow as f32 * tuning.combo_overflow_step;
    1.0 + effective * tuning.combo_step
}

/// Final strike damage, never below 1
pub fn strike_damage(
    base: i32,
    combo: u32,
    kind: SegmentType,
    mods: &RelicModifiers,
    tuning: &CombatTuning,
) -> i32 {
    let mut multiplier = combo_multiplier(combo, tuning) * mods.damage_mult;
    if kind == SegmentType::Crit {
        multiplier += tuning.crit_bonus + mods.crit_bonus;
    }
    ((base as f32 * multiplier).round() as i32).max(1)
}

/// Uniform inclusive roll that tolerates an inverted range
fn roll_between<R: Rng + ?Sized>(rng: &mut R, min: i32, max: i32) -> i32 {
    if max <= min {
        min
    } else {
        rng.random_range(min..=max)
    }
}

/// Reset per-round state and lay out a fresh track
fn setup_round<R: Rng + ?Sized>(
    session: &mut CombatSession,
    tuning: &CombatTuning,
    ctx: &mut CombatContext<'_, R>,
    first_round: bool,
) {
    let stacks = if first_round {
        0
    } else {
        session.miss_streak.min(tuning.speed_miss_cap)
    };
    let growth = tuning.cursor_speed_growth.powi(stacks as i32);
    session.cursor_speed = (session.cursor_base_speed * growth).max(tuning.cursor_speed_floor);
    session.cursor_pos = 0.0;
    session.cursor_forward = true;
    session.round_elapsed = 0.0;
    session.round_duration = tuning.round_timeout;
    session.post_input_timer = 0.0;
    session.input_processed = false;
    session.awaiting_enemy_turn = false;
    session.blocked_this_round = false;
    session.guard_consumed_this_round = false;
    session.enemy_strike_scheduled = false;
    session.last_was_timeout = false;
    session.last_enemy_damage = 0;
    session.fx.flash = 0.0;
    session.fx.shake = 0.0;
    session.fx.intent = 0.0;

    let mods = ctx.modifiers();
    let profile = tuning.profiles.for_kind(session.enemy.kind);
    session.segments = generate_segments(
        &mut *ctx.rng,
        profile,
        session.round_index,
        WidthScale::from(&mods),
        tuning,
    );

    log::debug!(
        "Round {} setup: speed {:.3} (streak {}), {} segments",
        session.round_index,
        session.cursor_speed,
        session.miss_streak,
        session.segments.len()
    );
}

/// Miss, danger segment, or timeout: combo gone, enemy gets a strike
fn register_miss(
    session: &mut CombatSession,
    tuning: &CombatTuning,
    from_input: bool,
    events: &mut Vec<CombatEvent>,
) {
    if session.input_processed {
        return;
    }
    session.combo_count = 0;
    session.last_damage = 0;
    session.last_enemy_damage = 0;
    session.last_strike_type = Some(SegmentType::Danger);
    session.last_result = if from_input {
        RoundResult::Miss
    } else {
        RoundResult::Timeout
    };
    session.last_resolved_cursor = session.cursor_pos;
    session.last_was_timeout = !from_input;
    session.miss_streak = (session.miss_streak + 1).min(tuning.speed_miss_cap);

    session.blocked_this_round = false;
    session.guard_consumed_this_round = false;
    session.enemy_strike_scheduled = true;
    session.input_processed = true;
    session.awaiting_enemy_turn = true;
    session.post_input_timer = 0.0;
    session.round_elapsed = 0.0;
    session.round_duration = tuning.round_timeout;

    session.fx.combo_reset = session.fx.combo_reset.max(tuning.combo_reset_miss_time);
    session.fx.combo_pop = 0.0;
    session.fx.intent = 0.0;
    session.fx.flash = 0.0;
    if from_input {
        session.fx.shake = tuning.shake_time;
    }

    log::debug!(
        "Round {} {} (streak {})",
        session.round_index,
        session.last_result.as_str(),
        session.miss_streak
    );
    events.push(CombatEvent::Miss {
        timeout: !from_input,
    });
}

/// Block segment: the enemy still strikes, at reduced damage
fn handle_block(
    session: &mut CombatSession,
    tuning: &CombatTuning,
    segment: CombatSegment,
    events: &mut Vec<CombatEvent>,
) {
    session.blocked_this_round = true;
    session.guard_consumed_this_round = false;
    session.last_strike_type = Some(SegmentType::Block);
    session.last_damage = 0;
    session.last_enemy_damage = 0;
    session.last_result = RoundResult::Block;
    session.last_resolved_cursor = session.cursor_pos;
    // A block is not an offensive hit, so it still feeds speed growth
    session.miss_streak = (session.miss_streak + 1).min(tuning.speed_miss_cap);

    session.enemy_strike_scheduled = true;
    session.input_processed = true;
    session.awaiting_enemy_turn = true;
    session.post_input_timer = 0.0;
    session.round_elapsed = 0.0;

    session.fx.combo_reset = session.fx.combo_reset.max(tuning.combo_reset_block_time);
    session.fx.combo_pop = 0.0;
    session.fx.intent = 0.0;

    events.push(CombatEvent::SegmentEffect {
        segment,
        kind: SegmentType::Block,
    });
}

/// Hit or crit landed
fn resolve_player_strike<R: Rng + ?Sized>(
    session: &mut CombatSession,
    tuning: &CombatTuning,
    ctx: &mut CombatContext<'_, R>,
    kind: SegmentType,
    resolved_position: f32,
    events: &mut Vec<CombatEvent>,
) -> Flow {
    let mods = ctx.modifiers();
    let base = roll_between(
        &mut *ctx.rng,
        tuning.player_min_damage as i32,
        tuning.player_max_damage as i32,
    );
    let damage = strike_damage(base, session.combo_count, kind, &mods, tuning);
    session.enemy.hp = (session.enemy.hp - damage).max(0);

    let gain = match kind {
        SegmentType::Crit => 2 + mods.combo_on_crit,
        _ => 1 + mods.combo_on_hit,
    };
    session.combo_count = session
        .combo_count
        .saturating_add(gain)
        .min(tuning.combo_ceiling);

    session.last_resolved_cursor = resolved_position;
    session.last_damage = damage;
    session.last_enemy_damage = 0;
    session.last_strike_type = Some(kind);
    session.last_result = if kind == SegmentType::Crit {
        RoundResult::Crit
    } else {
        RoundResult::Hit
    };
    session.last_was_timeout = false;

    session.miss_streak = 0;
    session.enemy_strike_scheduled = false;
    session.blocked_this_round = false;
    session.guard_consumed_this_round = false;
    session.input_processed = true;
    session.round_elapsed = 0.0;
    session.round_duration = tuning.round_timeout;

    session.fx.flash = tuning.track_flash_time;
    session.fx.enemy_bar_flash = tuning.enemy_bar_flash_time;
    session.fx.combo_pop = tuning.combo_pop_time;
    session.fx.combo_reset = 0.0;
    session.hit_stop_timer = session.hit_stop_timer.max(tuning.hit_stop_duration);

    log::debug!(
        "{} for {} (base {}, combo {}), enemy hp {}",
        kind.as_str(),
        damage,
        base,
        session.combo_count,
        session.enemy.hp
    );
    events.push(CombatEvent::Strike {
        kind,
        position: resolved_position,
        damage,
    });

    if session.enemy.is_dead() {
        session.awaiting_enemy_turn = false;
        return Flow::Victory;
    }
    session.awaiting_enemy_turn = true;
    session.post_input_timer = 0.0;
    Flow::Continue
}

/// Enemy strikes (if scheduled), then the next round starts
///
/// Block reduction applies first; a guard charge only negates what is left.
fn resolve_enemy_turn<R: Rng + ?Sized>(
    session: &mut CombatSession,
    tuning: &CombatTuning,
    ctx: &mut CombatContext<'_, R>,
    events: &mut Vec<CombatEvent>,
) -> Flow {
    session.awaiting_enemy_turn = false;
    session.post_input_timer = 0.0;

    if session.enemy.is_dead() {
        return Flow::Victory;
    }

    let mut damage = 0;
    if session.enemy_strike_scheduled {
        damage = roll_between(&mut *ctx.rng, session.enemy.min_dmg, session.enemy.max_dmg);
        if session.blocked_this_round {
            damage = (damage as f32 * tuning.block_damage_reduction).round() as i32;
            if ctx.modifiers().block_negates {
                damage = 0;
            }
        }
        if damage > 0 && session.stored_guard_charges > 0 {
            damage = 0;
            session.stored_guard_charges -= 1;
            session.guard_consumed_this_round = true;
            events.push(CombatEvent::GuardChargesChanged {
                charges: session.stored_guard_charges,
            });
        }
        if damage > 0 {
            ctx.player.hp = (ctx.player.hp - damage).max(0);
            session.fx.shake = session.fx.shake.max(tuning.shake_time * 0.8);
        }
    }
    session.enemy_strike_scheduled = false;

    let shielded = session.blocked_this_round || session.guard_consumed_this_round;
    session.fx.player_bar_flash = if damage > 0 {
        tuning.player_bar_flash_time
    } else if shielded {
        tuning.player_bar_flash_time * 0.6
    } else {
        0.0
    };
    session.last_enemy_damage = damage;

    let result = if damage > 0 {
        RoundResult::EnemyHit
    } else if session.guard_consumed_this_round {
        RoundResult::Guard
    } else if session.blocked_this_round {
        RoundResult::Blocked
    } else {
        RoundResult::Safe
    };
    if result != RoundResult::Safe || session.last_result == RoundResult::None {
        session.last_result = result;
    }
    events.push(CombatEvent::EnemyTurn { damage, result });

    session.blocked_this_round = false;
    session.guard_consumed_this_round = false;

    if ctx.player.hp <= 0 {
        return Flow::Defeat;
    }

    session.round_index += 1;
    setup_round(session, tuning, ctx, false);
    Flow::Continue
}

/// Shards, relic drop, and heal-on-win for a finished session
fn grant_victory_rewards<R: Rng + ?Sized>(
    session: &CombatSession,
    tuning: &CombatTuning,
    catalog: &RelicCatalog,
    ctx: &mut CombatContext<'_, R>,
) -> VictoryReward {
    let elite = session.enemy.elite;
    let shards_earned = if elite {
        tuning.shard_per_elite
    } else {
        tuning.shard_per_win
    };

    let drop_chance = clampf(
        tuning.relic_drop_base
            + (session.floor - 1) as f32 * tuning.relic_drop_per_floor
            + if elite { tuning.relic_drop_elite_bonus } else { 0.0 },
        0.0,
        tuning.relic_drop_cap,
    );

    let mut new_relics = Vec::new();
    if ctx.rng.random::<f32>() < drop_chance {
        if let Some(relic) = catalog.random(&mut *ctx.rng) {
            log::info!("Relic drop: {}", relic.name);
            ctx.relics.push(relic.clone());
            new_relics.push(relic);
        }
    }

    let heal = ctx.modifiers().heal_on_win;
    if heal > 0 {
        ctx.player.heal(heal);
    }

    VictoryReward {
        shards_earned,
        new_relics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::SIM_DT;
    use crate::sim::state::EnemyKind;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    struct Harness {
        engine: CombatEngine,
        rng: Pcg32,
        player: Player,
        relics: Vec<Relic>,
    }

    impl Harness {
        fn new(tuning: CombatTuning) -> Self {
            Self {
                engine: CombatEngine::new(tuning, RelicCatalog::default()).unwrap(),
                rng: Pcg32::seed_from_u64(2024),
                player: Player::default(),
                relics: Vec::new(),
            }
        }

        fn begin(&mut self, enemy: Enemy, guard_charges: u32) -> Vec<CombatEvent> {
            let mut ctx = CombatContext::new(&mut self.rng, &mut self.player, &mut self.relics);
            self.engine.begin_combat(&mut ctx, enemy, 0, 1, guard_charges)
        }

        fn input(&mut self) -> Vec<CombatEvent> {
            let mut ctx = CombatContext::new(&mut self.rng, &mut self.player, &mut self.relics);
            self.engine.process_input(&mut ctx)
        }

        fn update(&mut self, dt: f32) -> Vec<CombatEvent> {
            let mut ctx = CombatContext::new(&mut self.rng, &mut self.player, &mut self.relics);
            self.engine.update(&mut ctx, dt)
        }

        /// Replace the current track with a single segment under the cursor
        fn force_track(&mut self, kind: SegmentType) {
            let session = self.engine.session_mut().unwrap();
            session.segments = vec![CombatSegment::new(0.0, 1.0, kind)];
        }

        fn force_empty_track(&mut self) {
            self.engine.session_mut().unwrap().segments.clear();
        }

        /// Step until the enemy turn has resolved
        fn finish_round(&mut self) -> Vec<CombatEvent> {
            let mut events = Vec::new();
            for _ in 0..600 {
                if self.engine.phase() != CombatPhase::AwaitingEnemyTurn {
                    break;
                }
                events.extend(self.update(SIM_DT));
            }
            events
        }
    }

    fn enemy(hp: i32, dmg: i32) -> Enemy {
        Enemy {
            kind: EnemyKind::Grunt,
            elite: false,
            name: "Dummy".to_string(),
            max_hp: hp,
            hp,
            min_dmg: dmg,
            max_dmg: dmg,
        }
    }

    fn no_drops() -> CombatTuning {
        CombatTuning {
            relic_drop_base: 0.0,
            relic_drop_per_floor: 0.0,
            relic_drop_elite_bonus: 0.0,
            ..Default::default()
        }
    }

    fn count_guard_events(events: &[CombatEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, CombatEvent::GuardChargesChanged { .. }))
            .count()
    }

    #[test]
    fn test_begin_then_clear() {
        let mut h = Harness::new(CombatTuning::default());
        h.begin(enemy(50, 5), 0);
        assert!(h.engine.is_active());
        assert_eq!(h.engine.phase(), CombatPhase::RoundActive);

        h.engine.clear();
        assert!(!h.engine.is_active());
        assert_eq!(h.engine.phase(), CombatPhase::Idle);
        assert!(h.update(SIM_DT).is_empty());
    }

    #[test]
    fn test_begin_sets_up_first_round() {
        let mut h = Harness::new(CombatTuning::default());
        let events = h.begin(enemy(50, 5), 2);
        assert_eq!(events, vec![CombatEvent::GuardChargesChanged { charges: 2 }]);

        let session = h.engine.session().unwrap();
        assert_eq!(session.round_index, 0);
        assert_eq!(session.cursor_speed, session.cursor_base_speed);
        assert!(session.segments.iter().any(|s| s.kind == SegmentType::Hit));
        assert!(!session.input_processed);
    }

    #[test]
    fn test_cursor_speed_scaling() {
        let tuning = CombatTuning::default();
        let mut h = Harness::new(tuning.clone());
        h.relics.push(
            RelicCatalog::default()
                .relics()
                .iter()
                .find(|r| r.id == "focus_charm")
                .cloned()
                .unwrap(),
        );
        let mut elite = Enemy::spawn(EnemyKind::Archer, true, 3, &tuning);
        elite.hp = 500;
        let mut ctx = CombatContext::new(&mut h.rng, &mut h.player, &mut h.relics);
        h.engine.begin_combat(&mut ctx, elite, 0, 3, 0);

        let expected = tuning.cursor_base_speed * 1.1 * (1.0 + 2.0 * 0.03) * 0.9 * 1.08;
        let base = h.engine.session().unwrap().cursor_base_speed;
        assert!((base - expected).abs() < 1e-5, "{base} vs {expected}");
    }

    #[test]
    fn test_input_without_session_is_noop() {
        let mut h = Harness::new(CombatTuning::default());
        assert!(h.input().is_empty());
        assert!(!h.engine.is_active());
    }

    #[test]
    fn test_second_input_ignored() {
        let mut h = Harness::new(CombatTuning::default());
        h.begin(enemy(500, 5), 0);
        h.force_track(SegmentType::Hit);
        assert_eq!(h.input().len(), 1);
        assert!(h.input().is_empty());
        assert_eq!(h.engine.session().unwrap().combo_count, 1);
        assert_eq!(h.engine.phase(), CombatPhase::AwaitingEnemyTurn);
    }

    #[test]
    fn test_crit_kills_without_enemy_turn() {
        let tuning = CombatTuning {
            player_min_damage: 10,
            player_max_damage: 10,
            ..no_drops()
        };
        let mut h = Harness::new(tuning.clone());
        h.begin(enemy(5, 8), 0);
        h.force_track(SegmentType::Crit);
        let hp_before = h.player.hp;

        let events = h.input();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[0],
            CombatEvent::Strike { kind: SegmentType::Crit, damage: 15, .. }
        ));
        match &events[1] {
            CombatEvent::Victory { enemy, reward } => {
                assert_eq!(enemy.hp, 0);
                assert_eq!(reward.shards_earned, tuning.shard_per_win);
                assert!(reward.new_relics.is_empty());
            }
            other => panic!("expected victory, got {other:?}"),
        }
        assert!(!h.engine.is_active());
        assert_eq!(h.player.hp, hp_before);
        assert!(h.update(1.0).is_empty());
    }

    #[test]
    fn test_reward_ignores_carried_shards() {
        let tuning = no_drops();
        let mut h = Harness::new(tuning.clone());
        let mut ctx = CombatContext::new(&mut h.rng, &mut h.player, &mut h.relics);
        h.engine.begin_combat(&mut ctx, enemy(1, 3), 999, 1, 0);
        assert_eq!(h.engine.session().unwrap().shards, 999);
        h.force_track(SegmentType::Hit);

        let events = h.input();
        let Some(CombatEvent::Victory { reward, .. }) = events.last() else {
            panic!("expected victory");
        };
        assert_eq!(reward.shards_earned, tuning.shard_per_win);
    }

    #[test]
    fn test_elite_victory_reward_and_drop() {
        let tuning = CombatTuning {
            relic_drop_base: 1.0,
            relic_drop_cap: 1.0,
            ..Default::default()
        };
        let mut h = Harness::new(tuning.clone());
        let mut boss = enemy(1, 3);
        boss.elite = true;
        h.begin(boss, 0);
        h.force_track(SegmentType::Hit);

        let events = h.input();
        let Some(CombatEvent::Victory { reward, .. }) = events.last() else {
            panic!("expected victory");
        };
        assert_eq!(reward.shards_earned, tuning.shard_per_elite);
        assert_eq!(reward.new_relics.len(), 1);
        assert_eq!(h.relics, reward.new_relics);
    }

    #[test]
    fn test_heal_on_win() {
        let mut h = Harness::new(no_drops());
        h.relics.push(Relic {
            heal_on_win: 12,
            ..Relic::named("second_wind", "Second Wind", "")
        });
        h.player.hp = 50;
        h.begin(enemy(1, 3), 0);
        h.force_track(SegmentType::Hit);
        h.input();
        assert_eq!(h.player.hp, 62);

        h.player.hp = 95;
        h.begin(enemy(1, 3), 0);
        h.force_track(SegmentType::Hit);
        h.input();
        assert_eq!(h.player.hp, 100);
    }

    #[test]
    fn test_block_reduces_enemy_damage() {
        let mut h = Harness::new(CombatTuning::default());
        h.player.hp = 10;
        h.begin(enemy(100, 8), 0);
        h.force_track(SegmentType::Block);

        let events = h.input();
        assert!(matches!(
            events[..],
            [CombatEvent::SegmentEffect { kind: SegmentType::Block, .. }]
        ));
        let session = h.engine.session().unwrap();
        assert!(session.blocked_this_round);
        assert_eq!(session.miss_streak, 1);

        let events = h.finish_round();
        assert_eq!(
            events,
            vec![CombatEvent::EnemyTurn {
                damage: 2,
                result: RoundResult::EnemyHit
            }]
        );
        assert_eq!(h.player.hp, 8);
        assert_eq!(count_guard_events(&events), 0);
        let session = h.engine.session().unwrap();
        assert_eq!(session.round_index, 1);
        assert!(!session.blocked_this_round);
    }

    #[test]
    fn test_block_negate_relic() {
        let mut h = Harness::new(CombatTuning::default());
        h.relics.push(Relic {
            block_negates: true,
            ..Relic::named("guard_sigil", "Guard Sigil", "")
        });
        h.player.hp = 10;
        h.begin(enemy(100, 8), 1);
        h.force_track(SegmentType::Block);
        h.input();

        let events = h.finish_round();
        assert_eq!(
            events,
            vec![CombatEvent::EnemyTurn {
                damage: 0,
                result: RoundResult::Blocked
            }]
        );
        assert_eq!(h.player.hp, 10);
        // Nothing left to negate, so the guard charge is kept
        assert_eq!(h.engine.session().unwrap().stored_guard_charges, 1);
    }

    #[test]
    fn test_guard_charge_negates_hit() {
        let mut h = Harness::new(CombatTuning::default());
        h.begin(enemy(100, 8), 1);
        h.force_empty_track();
        let hp_before = h.player.hp;

        assert_eq!(h.input(), vec![CombatEvent::Miss { timeout: false }]);
        let events = h.finish_round();
        assert_eq!(h.player.hp, hp_before);
        assert_eq!(count_guard_events(&events), 1);
        assert!(events.contains(&CombatEvent::GuardChargesChanged { charges: 0 }));
        assert!(events.contains(&CombatEvent::EnemyTurn {
            damage: 0,
            result: RoundResult::Guard
        }));
        assert_eq!(h.engine.session().unwrap().stored_guard_charges, 0);
    }

    #[test]
    fn test_guard_applies_after_block_reduction() {
        let mut h = Harness::new(CombatTuning::default());
        h.begin(enemy(100, 8), 1);
        h.force_track(SegmentType::Block);
        let hp_before = h.player.hp;
        h.input();

        // 8 * 0.2 rounds to 2, which the guard charge then absorbs
        let events = h.finish_round();
        assert_eq!(h.player.hp, hp_before);
        assert_eq!(count_guard_events(&events), 1);
    }

    #[test]
    fn test_strike_round_enemy_holds() {
        let mut h = Harness::new(CombatTuning::default());
        h.begin(enemy(500, 8), 0);
        h.force_track(SegmentType::Hit);
        let hp_before = h.player.hp;
        h.input();

        let events = h.finish_round();
        assert_eq!(
            events,
            vec![CombatEvent::EnemyTurn {
                damage: 0,
                result: RoundResult::Safe
            }]
        );
        assert_eq!(h.player.hp, hp_before);
        assert_eq!(h.engine.session().unwrap().last_result, RoundResult::Hit);
    }

    #[test]
    fn test_defeat_clears_session() {
        let mut h = Harness::new(CombatTuning::default());
        h.player.hp = 3;
        h.begin(enemy(100, 8), 0);
        h.force_empty_track();
        h.input();

        let events = h.finish_round();
        assert_eq!(events.last(), Some(&CombatEvent::Defeat));
        assert_eq!(h.player.hp, 0);
        assert!(!h.engine.is_active());
        assert!(h.input().is_empty());
    }

    #[test]
    fn test_miss_streak_drives_speed() {
        let tuning = CombatTuning::default();
        let mut h = Harness::new(tuning.clone());
        h.begin(enemy(500, 1), 0);

        for _ in 0..5 {
            h.force_empty_track();
            h.input();
            h.finish_round();
        }

        let session = h.engine.session().unwrap();
        assert_eq!(session.miss_streak, 5);
        let expected = (session.cursor_base_speed * tuning.cursor_speed_growth.powi(5))
            .max(tuning.cursor_speed_floor);
        assert!((session.cursor_speed - expected).abs() < 1e-6);
    }

    #[test]
    fn test_miss_streak_caps_and_resets_on_strike() {
        let tuning = CombatTuning::default();
        let mut h = Harness::new(tuning.clone());
        h.begin(enemy(500, 1), 0);

        for _ in 0..8 {
            h.force_empty_track();
            h.input();
            h.finish_round();
        }
        assert_eq!(h.engine.session().unwrap().miss_streak, tuning.speed_miss_cap);

        h.force_track(SegmentType::Hit);
        h.input();
        assert_eq!(h.engine.session().unwrap().miss_streak, 0);
        h.finish_round();

        let session = h.engine.session().unwrap();
        assert!((session.cursor_speed - session.cursor_base_speed).abs() < 1e-6);
    }

    #[test]
    fn test_combo_gain_and_reset() {
        let mut h = Harness::new(CombatTuning::default());
        h.begin(enemy(5000, 1), 0);

        h.force_track(SegmentType::Hit);
        h.input();
        h.finish_round();
        h.force_track(SegmentType::Crit);
        h.input();
        h.finish_round();
        assert_eq!(h.engine.session().unwrap().combo_count, 3);

        // Blocks keep the combo
        h.force_track(SegmentType::Block);
        h.input();
        h.finish_round();
        assert_eq!(h.engine.session().unwrap().combo_count, 3);

        h.force_track(SegmentType::Danger);
        assert_eq!(h.input(), vec![CombatEvent::Miss { timeout: false }]);
        let session = h.engine.session().unwrap();
        assert_eq!(session.combo_count, 0);
        assert_eq!(session.last_result, RoundResult::Miss);
        assert!(session.fx.shake > 0.0);
    }

    #[test]
    fn test_combo_relic_bonus() {
        let mut h = Harness::new(CombatTuning::default());
        h.relics.push(Relic {
            combo_on_hit: 2,
            combo_on_crit: 1,
            ..Relic::named("x", "X", "")
        });
        h.begin(enemy(5000, 1), 0);
        h.force_track(SegmentType::Hit);
        h.input();
        h.finish_round();
        h.force_track(SegmentType::Crit);
        h.input();
        assert_eq!(h.engine.session().unwrap().combo_count, 3 + 3);
    }

    #[test]
    fn test_timeout_is_a_miss() {
        let tuning = CombatTuning::default();
        let mut h = Harness::new(tuning.clone());
        h.begin(enemy(500, 1), 0);

        let mut elapsed = 0.0;
        let events = loop {
            let events = h.update(SIM_DT);
            elapsed += SIM_DT;
            if !events.is_empty() {
                break events;
            }
            assert!(elapsed < tuning.round_timeout + 1.0, "round never timed out");
        };
        assert_eq!(events, vec![CombatEvent::Miss { timeout: true }]);

        let session = h.engine.session().unwrap();
        assert_eq!(session.last_result, RoundResult::Timeout);
        assert_eq!(session.combo_count, 0);
        assert_eq!(session.miss_streak, 1);
        assert_eq!(session.fx.shake, 0.0);
        assert_eq!(h.engine.phase(), CombatPhase::AwaitingEnemyTurn);
    }

    #[test]
    fn test_hit_stop_slows_cursor() {
        let tuning = CombatTuning::default();
        let mut h = Harness::new(tuning.clone());
        h.begin(enemy(500, 1), 0);
        h.force_track(SegmentType::Hit);
        h.input();

        let session = h.engine.session_mut().unwrap();
        session.cursor_pos = 0.5;
        session.cursor_forward = true;
        let speed = session.cursor_speed;

        let dt = tuning.hit_stop_duration / 4.0;
        h.update(dt);
        let moved = h.engine.session().unwrap().cursor_pos - 0.5;
        let expected = speed * dt * tuning.hit_stop_time_scale;
        assert!((moved - expected).abs() < 1e-6, "{moved} vs {expected}");
    }

    #[test]
    fn test_intent_builds_while_strike_scheduled() {
        let mut h = Harness::new(CombatTuning::default());
        h.begin(enemy(500, 1), 0);
        h.force_empty_track();
        h.input();
        h.update(0.1);
        assert!(h.engine.session().unwrap().fx.intent > 0.0);
    }

    #[test]
    fn test_intent_decays_at_half_rate() {
        let mut h = Harness::new(CombatTuning::default());
        h.begin(enemy(500, 1), 0);
        h.engine.session_mut().unwrap().fx.intent = 1.0;

        h.update(0.1);
        let intent = h.engine.session().unwrap().fx.intent;
        assert!((intent - 0.95).abs() < 1e-6, "{intent}");

        h.engine.session_mut().unwrap().fx.intent = 0.01;
        h.update(0.1);
        assert_eq!(h.engine.session().unwrap().fx.intent, 0.0);
    }

    #[test]
    fn test_long_step_times_out_and_resolves_enemy_turn() {
        let tuning = CombatTuning::default();
        let mut h = Harness::new(tuning.clone());
        h.begin(enemy(500, 7), 0);
        let base = h.engine.session().unwrap().cursor_base_speed;

        let events = h.update(10.0);
        assert_eq!(
            events,
            vec![
                CombatEvent::Miss { timeout: true },
                CombatEvent::EnemyTurn {
                    damage: 7,
                    result: RoundResult::EnemyHit
                },
            ]
        );
        assert_eq!(h.player.hp, 93);

        let session = h.engine.session().unwrap();
        assert_eq!(session.round_index, 1);
        assert_eq!(h.engine.phase(), CombatPhase::RoundActive);
        let expected = base * tuning.cursor_speed_growth;
        assert!((session.cursor_speed - expected).abs() < 1e-6);
    }

    #[test]
    fn test_grace_input_clamps_to_segment_edge() {
        let tuning = CombatTuning::default();
        let mut h = Harness::new(tuning.clone());
        h.begin(enemy(500, 1), 0);

        let session = h.engine.session_mut().unwrap();
        session.segments = vec![CombatSegment::new(0.5, 0.6, SegmentType::Hit)];
        let grace = grace_window(session.cursor_speed, &tuning);
        session.cursor_pos = 0.5 - grace * 0.5;

        let events = h.input();
        assert_eq!(events.len(), 1);
        match events[0] {
            CombatEvent::Strike { kind, position, .. } => {
                assert_eq!(kind, SegmentType::Hit);
                assert_eq!(position, 0.5);
            }
            ref other => panic!("expected strike, got {other:?}"),
        }
        assert_eq!(h.engine.session().unwrap().last_resolved_cursor, 0.5);

        // Just outside the padding is a plain miss
        h.finish_round();
        let session = h.engine.session_mut().unwrap();
        session.segments = vec![CombatSegment::new(0.5, 0.6, SegmentType::Hit)];
        let grace = grace_window(session.cursor_speed, &tuning);
        session.cursor_pos = 0.6 + grace * 2.0;
        assert_eq!(h.input(), vec![CombatEvent::Miss { timeout: false }]);
    }

    #[test]
    fn test_runs_are_reproducible() {
        let play = || {
            let mut h = Harness::new(CombatTuning::default());
            h.begin(enemy(60, 4), 1);
            let mut log = Vec::new();
            for step in 0..2000 {
                if !h.engine.is_active() {
                    break;
                }
                if step % 37 == 0 {
                    log.extend(h.input());
                }
                log.extend(h.update(SIM_DT));
            }
            (log, h.player.hp)
        };
        assert_eq!(play(), play());
    }

    #[test]
    fn test_combo_multiplier_tiers() {
        let tuning = CombatTuning::default();
        assert_eq!(combo_multiplier(0, &tuning), 1.0);
        assert_eq!(combo_multiplier(2, &tuning), 1.0);
        assert!((combo_multiplier(3, &tuning) - 1.1).abs() < 1e-6);
        assert!((combo_multiplier(15, &tuning) - 1.5).abs() < 1e-6);
        // Tier 6 counts 5 full tiers plus half a tier
        assert!((combo_multiplier(18, &tuning) - 1.55).abs() < 1e-6);
    }

    #[test]
    fn test_crit_scenario_damage() {
        let tuning = CombatTuning::default();
        let mods = RelicModifiers::default();
        assert_eq!(strike_damage(10, 0, SegmentType::Crit, &mods, &tuning), 15);
        assert_eq!(strike_damage(10, 0, SegmentType::Hit, &mods, &tuning), 10);
    }

    proptest! {
        #[test]
        fn prop_strike_damage_at_least_one(
            base in 0i32..50,
            combo in 0u32..1000,
            dmg_mult in 0.0f32..3.0,
            crit_bonus in 0.0f32..2.0,
            crit in any::<bool>(),
        ) {
            let tuning = CombatTuning::default();
            let mods = RelicModifiers { damage_mult: dmg_mult, crit_bonus, ..Default::default() };
            let kind = if crit { SegmentType::Crit } else { SegmentType::Hit };
            prop_assert!(strike_damage(base, combo, kind, &mods, &tuning) >= 1);
        }
    }
}
