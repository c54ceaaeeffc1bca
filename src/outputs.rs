//! Derived tables: the hybrid join and the dense user × item matrix.

use rustc_hash::FxHashMap;
use std::collections::BTreeSet;

use crate::events::{Event, Reporter};
use crate::models::{HybridRow, Interaction, InteractionMatrix, Item};

/// Inner join of interactions and items on `item_id`, in interaction order.
pub fn build_hybrid(
    interactions: &[Interaction],
    items: &[Item],
    reporter: &mut dyn Reporter,
) -> Vec<HybridRow> {
    let by_id: FxHashMap<&str, &Item> = items.iter().map(|i| (i.item_id.as_str(), i)).collect();
    let rows: Vec<HybridRow> = interactions
        .iter()
        .filter_map(|r| {
            by_id.get(r.item_id.as_str()).map(|item| HybridRow {
                interaction: r.clone(),
                item: (*item).clone(),
            })
        })
        .collect();

    reporter.report(&Event::HybridBuilt { rows: rows.len() });
    rows
}

/// Pivot interactions into a dense rating matrix.
///
/// Rows and columns are sorted by identifier. A cell holds the mean rating
/// of its (user, item) pair, or `0.0` when the pair never interacted.
/// Memory grows with users × items.
pub fn build_matrix(interactions: &[Interaction], reporter: &mut dyn Reporter) -> InteractionMatrix {
    let users: Vec<String> = interactions
        .iter()
        .map(|r| r.user_id.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(String::from)
        .collect();
    let items: Vec<String> = interactions
        .iter()
        .map(|r| r.item_id.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(String::from)
        .collect();

    reporter.report(&Event::DenseMatrix {
        users: users.len(),
        items: items.len(),
    });

    let user_index: FxHashMap<&str, usize> =
        users.iter().enumerate().map(|(i, u)| (u.as_str(), i)).collect();
    let item_index: FxHashMap<&str, usize> =
        items.iter().enumerate().map(|(i, u)| (u.as_str(), i)).collect();

    let width = items.len();
    let mut sums = vec![0.0_f64; users.len() * width];
    let mut counts = vec![0_u32; users.len() * width];
    for r in interactions {
        let cell = user_index[r.user_id.as_str()] * width + item_index[r.item_id.as_str()];
        sums[cell] += r.rating;
        counts[cell] += 1;
    }
    let values: Vec<f64> = sums
        .into_iter()
        .zip(counts)
        .map(|(sum, count)| if count == 0 { 0.0 } else { sum / count as f64 })
        .collect();

    reporter.report(&Event::MatrixBuilt {
        users: users.len(),
        items: width,
    });
    InteractionMatrix {
        users,
        items,
        values,
    }
}
