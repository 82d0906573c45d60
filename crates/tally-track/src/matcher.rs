//! Frame-to-frame correspondence.
//!
//! Greedy nearest-neighbor pairing of the previous cycle's profiles (base)
//! with the current detections (compare). Each base profile takes the first
//! compare profile, in order, within the distance threshold that is still
//! free. When too few base profiles find a partner, the base positions are
//! shifted forward along the direction of travel and the pairing is retried,
//! up to `max_attempts` times.
//!
//! The assignment is deterministic for a given input order but not globally
//! optimal.

use log::debug;
use nalgebra::{distance, Vector2};
use tally_core::{MatchParams, Profile, ProfileId};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Outcome of a successful correspondence.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchReport {
    /// Attempts used, including the first one.
    pub attempts: usize,
    /// Number of paired base profiles.
    pub matches: usize,
    /// `matches / |base|`; `1.0` for an empty base set.
    pub ratio: f32,
    /// `(base_index, compare_index)` for every pair, in base order.
    pub pairs: Vec<(usize, usize)>,
}

/// Errors returned by the matcher.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum MatchError {
    #[error("no acceptable correspondence after {attempts} attempts (best ratio {best_ratio:.2})")]
    Exhausted { attempts: usize, best_ratio: f32 },
}

/// Pair `base` against `compare`.
///
/// On success, paired compare profiles carry their partner's id, and those
/// already past `count_line` also carry their partner's weight estimate;
/// paired base profiles are flagged `matched`. On exhaustion both slices are
/// left as they were passed in. Base positions are never modified: the retry
/// shift is applied to a working copy.
#[cfg_attr(
    feature = "tracing",
    instrument(
        level = "debug",
        skip_all,
        fields(base = base.len(), compare = compare.len())
    )
)]
pub fn match_profiles(
    base: &mut [Profile],
    compare: &mut [Profile],
    count_line: f32,
    params: &MatchParams,
) -> Result<MatchReport, MatchError> {
    clear_matched(base);
    if base.is_empty() {
        return Ok(MatchReport {
            attempts: 1,
            matches: 0,
            ratio: 1.0,
            pairs: Vec::new(),
        });
    }

    let initial: Vec<(ProfileId, f32)> = compare
        .iter()
        .map(|c| (c.id, c.estimated_weight))
        .collect();

    let mut best_ratio = 0.0f32;
    for attempt in 0..=params.max_attempts {
        if attempt > 0 {
            restore(base, compare, &initial);
        }

        let shift = params.base_translation * attempt as f32;
        let pairs = pair_once(base, compare, shift, count_line, params.distance_threshold);
        let ratio = pairs.len() as f32 / base.len() as f32;

        if ratio >= params.percent_threshold {
            return Ok(MatchReport {
                attempts: attempt + 1,
                matches: pairs.len(),
                ratio,
                pairs,
            });
        }

        debug!(
            "attempt {} matched {}/{} (ratio {ratio:.2} < {:.2}), shift {shift:.1}",
            attempt + 1,
            pairs.len(),
            base.len(),
            params.percent_threshold
        );
        best_ratio = best_ratio.max(ratio);
    }

    restore(base, compare, &initial);
    Err(MatchError::Exhausted {
        attempts: params.max_attempts + 1,
        best_ratio,
    })
}

/// One greedy pass with base positions shifted by `shift` along `y`.
fn pair_once(
    base: &mut [Profile],
    compare: &mut [Profile],
    shift: f32,
    count_line: f32,
    threshold: f32,
) -> Vec<(usize, usize)> {
    let offset = Vector2::new(0.0, shift);
    let mut used = vec![false; compare.len()];
    let mut pairs = Vec::new();

    for (bi, b) in base.iter_mut().enumerate() {
        let anchor = b.position + offset;
        let Some(ci) = (0..compare.len())
            .find(|&ci| !used[ci] && distance(&anchor, &compare[ci].position) <= threshold)
        else {
            continue;
        };

        used[ci] = true;
        let c = &mut compare[ci];
        c.id = b.id;
        // occlusion at the line degrades the area estimate: keep the last one
        if c.is_past(count_line) {
            c.estimated_weight = b.estimated_weight;
        }
        b.matched = true;
        pairs.push((bi, ci));
    }

    pairs
}

fn clear_matched(profiles: &mut [Profile]) {
    for p in profiles {
        p.matched = false;
    }
}

fn restore(base: &mut [Profile], compare: &mut [Profile], initial: &[(ProfileId, f32)]) {
    clear_matched(base);
    for (c, &(id, weight)) in compare.iter_mut().zip(initial) {
        c.id = id;
        c.estimated_weight = weight;
    }
}
