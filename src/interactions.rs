//! Interaction cleaning: dedup, rating validation, count filtering and capping.
//!
//! Steps run in a fixed order and each one counts on the output of the
//! previous one:
//! 1. sort by timestamp (nulls last, stable) and keep the last row per
//!    (user, item) pair
//! 2. drop ratings outside [1.0, 5.0]
//! 3. keep users with at least `min_user_interactions` rows
//! 4. keep items with at least `min_item_interactions` rows among those users
//! 5. cap to the `max_users` / `max_items` most active of the survivors

use rustc_hash::{FxHashMap, FxHashSet};
use std::cmp::Ordering;

use crate::events::{Event, Reporter};
use crate::models::{ranked_counts, CleaningConfig, Interaction, InteractionCleanReport};

pub const MIN_RATING: f64 = 1.0;
pub const MAX_RATING: f64 = 5.0;

/// Timestamp order with missing timestamps last.
fn timestamp_order(a: &Option<String>, b: &Option<String>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.cmp(y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Keep the most recent row for each (user, item) pair.
///
/// Output is in timestamp order. Among rows with equal (or missing)
/// timestamps, the later input row wins.
pub fn dedup_latest(mut rows: Vec<Interaction>) -> Vec<Interaction> {
    rows.sort_by(|a, b| timestamp_order(&a.timestamp, &b.timestamp));

    let keep: Vec<bool> = {
        let mut last: FxHashMap<(&str, &str), usize> = FxHashMap::default();
        for (idx, row) in rows.iter().enumerate() {
            last.insert((row.user_id.as_str(), row.item_id.as_str()), idx);
        }
        rows.iter()
            .enumerate()
            .map(|(idx, row)| last.get(&(row.user_id.as_str(), row.item_id.as_str())) == Some(&idx))
            .collect()
    };

    rows.into_iter()
        .zip(keep)
        .filter_map(|(row, keep)| keep.then_some(row))
        .collect()
}

pub fn valid_rating(rating: f64) -> bool {
    (MIN_RATING..=MAX_RATING).contains(&rating)
}

/// Ids whose count meets `min`, most frequent first.
fn qualifying(ranked: Vec<(&str, usize)>, min: usize) -> Vec<String> {
    ranked
        .into_iter()
        .filter(|(_, count)| *count >= min)
        .map(|(id, _)| id.to_string())
        .collect()
}

/// Steps 3-5: count filtering then capping.
fn prune(rows: Vec<Interaction>, config: &CleaningConfig) -> Vec<Interaction> {
    let active_users = qualifying(
        ranked_counts(rows.iter().map(|r| r.user_id.as_str())),
        config.min_user_interactions,
    );
    let user_set: FxHashSet<&str> = active_users.iter().map(String::as_str).collect();
    let rows: Vec<Interaction> = rows
        .into_iter()
        .filter(|r| user_set.contains(r.user_id.as_str()))
        .collect();

    let active_items = qualifying(
        ranked_counts(rows.iter().map(|r| r.item_id.as_str())),
        config.min_item_interactions,
    );
    let item_set: FxHashSet<&str> = active_items.iter().map(String::as_str).collect();
    let rows: Vec<Interaction> = rows
        .into_iter()
        .filter(|r| item_set.contains(r.item_id.as_str()))
        .collect();

    // Ranks come from the counts each filter was computed on.
    let top_users: FxHashSet<&str> = active_users
        .iter()
        .take(config.max_users)
        .map(String::as_str)
        .collect();
    let top_items: FxHashSet<&str> = active_items
        .iter()
        .take(config.max_items)
        .map(String::as_str)
        .collect();

    rows.into_iter()
        .filter(|r| top_users.contains(r.user_id.as_str()) && top_items.contains(r.item_id.as_str()))
        .collect()
}

/// `1 - rows / (users × items)`; `None` for an empty table.
pub fn sparsity(rows: usize, users: usize, items: usize) -> Option<f64> {
    let cells = users * items;
    (cells > 0).then(|| 1.0 - rows as f64 / cells as f64)
}

pub fn distinct_counts(rows: &[Interaction]) -> (usize, usize) {
    let users: FxHashSet<&str> = rows.iter().map(|r| r.user_id.as_str()).collect();
    let items: FxHashSet<&str> = rows.iter().map(|r| r.item_id.as_str()).collect();
    (users.len(), items.len())
}

/// Clean raw interactions into a bounded, dense core.
pub fn clean_interactions(
    rows: Vec<Interaction>,
    config: &CleaningConfig,
    reporter: &mut dyn Reporter,
) -> Vec<Interaction> {
    let rows_before = rows.len();

    let rows = dedup_latest(rows);
    let duplicates_removed = rows_before - rows.len();

    let deduped = rows.len();
    let rows: Vec<Interaction> = rows.into_iter().filter(|r| valid_rating(r.rating)).collect();
    let invalid_ratings_removed = deduped - rows.len();

    let mut rows = prune(rows, config);
    let mut refinement_passes = 0;
    if config.strict_core {
        loop {
            let before = rows.len();
            rows = prune(rows, config);
            if rows.len() == before {
                break;
            }
            refinement_passes += 1;
        }
    }

    let (users, items) = distinct_counts(&rows);
    reporter.report(&Event::InteractionsCleaned(InteractionCleanReport {
        rows_before,
        duplicates_removed,
        invalid_ratings_removed,
        rows_after: rows.len(),
        users,
        items,
        sparsity: sparsity(rows.len(), users, items),
        refinement_passes,
    }));
    rows
}
