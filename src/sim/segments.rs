//! Procedural track layout
//!
//! Each round the track is filled with non-overlapping segments by rejection
//! sampling. The placement loop is bounded, so generation always terminates;
//! when it comes up short the layout degrades to fallback segments instead of
//! failing.

use rand::Rng;

use super::profile::DifficultyProfile;
use super::relic::RelicModifiers;
use super::state::{CombatSegment, SegmentType};
use crate::clampf;
use crate::tuning::CombatTuning;

/// Relic-derived width scales for strike segments
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WidthScale {
    pub hit: f32,
    pub crit: f32,
}

impl Default for WidthScale {
    fn default() -> Self {
        Self { hit: 1.0, crit: 1.0 }
    }
}

impl From<&RelicModifiers> for WidthScale {
    fn from(mods: &RelicModifiers) -> Self {
        Self {
            hit: mods.hit_width_mult,
            crit: mods.crit_width_mult,
        }
    }
}

/// True if `[start, end)` is clear of every placed segment
pub fn is_placement_valid(segments: &[CombatSegment], start: f32, end: f32) -> bool {
    segments.iter().all(|s| !s.overlaps(start, end))
}

/// Generate the segment layout for one round
///
/// The result is sorted by start, pairwise disjoint, inside [0, 1] and holds
/// at least one `Hit`. When `profile.block_due(round_index)` a `Block` is
/// placed first; the fixed fallback slot is tried if that ever fails.
pub fn generate_segments<R: Rng + ?Sized>(
    rng: &mut R,
    profile: &DifficultyProfile,
    round_index: u32,
    scale: WidthScale,
    tuning: &CombatTuning,
) -> Vec<CombatSegment> {
    let mut block_pending = profile.block_due(round_index);
    let mut has_hit = false;
    let mut has_crit = false;

    let desired_danger = profile.danger_coverage.lerp(rng.random::<f32>());
    let mut danger_coverage = 0.0;
    let span = (profile.max_segments.saturating_sub(profile.min_segments) + 1).max(1);
    let target = (profile.min_segments + rng.random_range(0..span)) as usize;

    let mut segments: Vec<CombatSegment> = Vec::with_capacity(target + 1);
    let mut attempts = 0;

    while (segments.len() < target || !has_hit || block_pending)
        && attempts < tuning.max_placement_attempts
    {
        attempts += 1;

        let kind = if block_pending {
            SegmentType::Block
        } else if !has_hit {
            SegmentType::Hit
        } else {
            let roll: f32 = rng.random();
            if !has_crit && roll < profile.crit_chance {
                SegmentType::Crit
            } else if danger_coverage < desired_danger && roll < tuning.danger_pick_chance {
                SegmentType::Danger
            } else {
                SegmentType::Hit
            }
        };

        let width = sample_width(rng, kind, profile, scale, tuning);
        let start = rng.random::<f32>() * (1.0 - width).max(0.01);
        let end = (start + width).min(1.0);

        if !is_placement_valid(&segments, start, end) {
            continue;
        }

        match kind {
            SegmentType::Hit => has_hit = true,
            SegmentType::Crit => has_crit = true,
            SegmentType::Danger => danger_coverage += end - start,
            SegmentType::Block => block_pending = false,
        }
        segments.push(CombatSegment::new(start, end, kind));
    }

    log::trace!(
        "round {round_index}: placed {}/{target} segments in {attempts} attempts",
        segments.len()
    );

    if segments.is_empty() {
        log::warn!("Segment placement exhausted, using fallback hit");
        segments.push(CombatSegment::new(
            tuning.fallback_hit.min,
            tuning.fallback_hit.max,
            SegmentType::Hit,
        ));
        has_hit = true;
    }

    if !has_hit {
        ensure_hit(&mut segments, tuning);
    }

    sort_segments(&mut segments);

    if block_pending && !insert_fallback_block(&mut segments, tuning) {
        log::warn!("Round {round_index} requires a block but the fallback slot is occupied");
    }

    segments
}

/// Sample a width for `kind`, clamped to its guard band
fn sample_width<R: Rng + ?Sized>(
    rng: &mut R,
    kind: SegmentType,
    profile: &DifficultyProfile,
    scale: WidthScale,
    tuning: &CombatTuning,
) -> f32 {
    let t: f32 = rng.random();
    let (raw, band) = match kind {
        SegmentType::Hit => (profile.hit_width.lerp(t) * scale.hit, tuning.strike_width_band),
        SegmentType::Crit => (profile.crit_width.lerp(t) * scale.crit, tuning.strike_width_band),
        SegmentType::Danger => (profile.danger_width.lerp(t), tuning.danger_width_band),
        SegmentType::Block => (tuning.block_width.lerp(t), tuning.block_width_band),
    };
    clampf(raw, band.min, band.max)
}

/// Guarantee a `Hit` exists when the placement loop never landed one
///
/// Tries the fallback slot, then the widest free gap, and only as a last
/// resort retypes an existing segment (blocks are retyped last).
fn ensure_hit(segments: &mut Vec<CombatSegment>, tuning: &CombatTuning) {
    let slot = tuning.fallback_hit;
    if is_placement_valid(segments, slot.min, slot.max) {
        log::warn!("No hit segment placed, inserting fallback hit");
        segments.push(CombatSegment::new(slot.min, slot.max, SegmentType::Hit));
        return;
    }

    if let Some((gap_start, gap_end)) = widest_gap(segments) {
        let gap = gap_end - gap_start;
        if gap >= tuning.strike_width_band.min {
            let width = gap.min(slot.max - slot.min);
            let start = gap_start + (gap - width) / 2.0;
            log::warn!("No hit segment placed, inserting hit into free gap at {start:.3}");
            segments.push(CombatSegment::new(start, start + width, SegmentType::Hit));
            return;
        }
    }

    let widest = |segments: &[CombatSegment], skip_block: bool| {
        segments
            .iter()
            .enumerate()
            .filter(|(_, s)| !(skip_block && s.kind == SegmentType::Block))
            .max_by(|(_, a), (_, b)| a.width().total_cmp(&b.width()))
            .map(|(i, _)| i)
    };
    let placed = segments.as_slice();
    if let Some(i) = widest(placed, true).or_else(|| widest(placed, false)) {
        log::warn!(
            "No room for a hit segment, retyping {} at {:.3}",
            segments[i].kind.as_str(),
            segments[i].start
        );
        segments[i].kind = SegmentType::Hit;
    }
}

/// Largest uncovered interval of the track, if any
fn widest_gap(segments: &[CombatSegment]) -> Option<(f32, f32)> {
    let mut sorted = segments.to_vec();
    sort_segments(&mut sorted);

    let mut gaps = Vec::with_capacity(sorted.len() + 1);
    let mut cursor = 0.0f32;
    for s in &sorted {
        if s.start > cursor {
            gaps.push((cursor, s.start));
        }
        cursor = cursor.max(s.end);
    }
    if cursor < 1.0 {
        gaps.push((cursor, 1.0));
    }
    gaps.into_iter().max_by(|a, b| (a.1 - a.0).total_cmp(&(b.1 - b.0)))
}

/// Try the fixed fallback block slot; returns false if it overlaps
pub fn insert_fallback_block(segments: &mut Vec<CombatSegment>, tuning: &CombatTuning) -> bool {
    let slot = tuning.fallback_block;
    if !is_placement_valid(segments, slot.min, slot.max) {
        return false;
    }
    segments.push(CombatSegment::new(slot.min, slot.max, SegmentType::Block));
    sort_segments(segments);
    true
}

/// Stable sort by start position
pub fn sort_segments(segments: &mut [CombatSegment]) {
    segments.sort_by(|a, b| a.start.total_cmp(&b.start));
}

/// Grace padding for the current cursor speed
#[inline]
pub fn grace_window(cursor_speed: f32, tuning: &CombatTuning) -> f32 {
    clampf(cursor_speed * tuning.input_grace, tuning.grace_min, tuning.grace_max)
}

/// A segment resolved under the cursor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentHit {
    pub segment: CombatSegment,
    /// Cursor position clamped into the segment's true bounds
    pub resolved_position: f32,
}

/// Find the first segment whose grace-padded box contains `position`
pub fn find_segment_at(
    segments: &[CombatSegment],
    position: f32,
    grace: f32,
) -> Option<SegmentHit> {
    segments.iter().find_map(|segment| {
        let start = (segment.start - grace).max(0.0);
        let end = (segment.end + grace).min(1.0);
        (position >= start && position <= end).then(|| SegmentHit {
            segment: *segment,
            resolved_position: clampf(position, segment.start, segment.end),
        })
    })
}
