use crate::error::EngineError;
use crate::fetcher::RankedList;
use core_types::{Directive, EntityId, MetricDiff, RankedEntry};

/// Trims a ranked list down to what `directive` asks for.
///
/// The input is never reordered; every result is a contiguous slice of it.
pub fn select(
    ranked: &RankedList,
    directive: &Directive,
    max_lines: usize,
) -> Result<Vec<RankedEntry>, EngineError> {
    let entries = ranked.entries();
    match *directive {
        Directive::TopN(lines) => {
            check_lines(lines, max_lines)?;
            Ok(entries[..lines.min(entries.len())].to_vec())
        }
        Directive::RankRange { low, high } => {
            let (start, end) = rank_range_bounds(low, high, entries.len())?;
            Ok(entries[start..end].to_vec())
        }
        Directive::CenteredOn { entity_id, lines } => {
            check_lines(lines, max_lines)?;
            let index = ranked
                .position_of(entity_id)
                .ok_or_else(|| EngineError::EntityNotFound(entity_id.to_string()))?;
            let (start, end) = centered_bounds(index, entries.len(), lines);
            let mut window = entries[start..end].to_vec();
            annotate_diffs(&mut window, entity_id, entries[index].metric_value);
            Ok(window)
        }
    }
}

fn check_lines(lines: usize, max_lines: usize) -> Result<(), EngineError> {
    if lines == 0 || lines > max_lines {
        return Err(EngineError::InvalidLineCount {
            requested: lines,
            max: max_lines,
        });
    }
    Ok(())
}

/// `[low-1, high)` clipped to `len`. Only an empty result is an error; a `high`
/// past the end is clipped like a slice would be.
fn rank_range_bounds(
    low: usize,
    high: usize,
    len: usize,
) -> Result<(usize, usize), EngineError> {
    let start = low.saturating_sub(1);
    let end = high.min(len);
    if low == 0 || start >= end {
        return Err(EngineError::RankOutOfBounds {
            low,
            high,
            available: len,
        });
    }
    Ok((start, end))
}

/// A window of about `lines` entries around `index`, pushed back inside the
/// list when it would run off either end.
fn centered_bounds(index: usize, len: usize, lines: usize) -> (usize, usize) {
    let half = half_window(lines);
    let mut low = index.saturating_sub(half);
    let mut high = (index + half + 1).min(len);
    if low == 0 {
        high = lines.min(len);
    }
    if high == len {
        low = len.saturating_sub(lines);
    }
    (low, high)
}

/// `lines / 2` rounded half to even, so 15 lines reach 8 ranks each way and
/// 5 lines reach 2.
fn half_window(lines: usize) -> usize {
    lines / 2 + usize::from(lines % 4 == 3)
}

fn annotate_diffs(window: &mut [RankedEntry], target: EntityId, target_metric: Option<i64>) {
    for entry in window.iter_mut() {
        entry.diff_from_target = Some(if entry.entity_id == target {
            MetricDiff::Exact(0)
        } else {
            MetricDiff::between(target_metric, entry.metric_value)
        });
    }
}
