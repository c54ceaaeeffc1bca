//! Referential integrity between interactions and items.
//!
//! Every interaction must reference an existing item, and after narrowing
//! every item must be referenced by at least one interaction.

use rustc_hash::FxHashSet;

use crate::events::{Event, Reporter};
use crate::models::{Interaction, Item, JoinReport};

/// Drop interactions whose item has no metadata. Returns the kept rows and
/// the number dropped.
pub fn drop_orphan_interactions(
    interactions: Vec<Interaction>,
    items: &[Item],
) -> (Vec<Interaction>, usize) {
    let known: FxHashSet<&str> = items.iter().map(|i| i.item_id.as_str()).collect();
    let before = interactions.len();
    let kept: Vec<Interaction> = interactions
        .into_iter()
        .filter(|r| known.contains(r.item_id.as_str()))
        .collect();
    let dropped = before - kept.len();
    (kept, dropped)
}

/// Keep only items referenced by some interaction.
pub fn narrow_items(items: Vec<Item>, interactions: &[Interaction]) -> Vec<Item> {
    let referenced: FxHashSet<&str> = interactions.iter().map(|r| r.item_id.as_str()).collect();
    items
        .into_iter()
        .filter(|i| referenced.contains(i.item_id.as_str()))
        .collect()
}

/// Reconcile both cleaned tables so neither carries orphaned rows.
pub fn enforce_join_integrity(
    interactions: Vec<Interaction>,
    items: Vec<Item>,
    reporter: &mut dyn Reporter,
) -> (Vec<Interaction>, Vec<Item>) {
    let (interactions, interactions_dropped) = drop_orphan_interactions(interactions, &items);
    let item_count = items.len();
    let items = narrow_items(items, &interactions);

    reporter.report(&Event::JoinEnforced(JoinReport {
        interactions_dropped,
        items_narrowed: item_count - items.len(),
        interactions: interactions.len(),
        items: items.len(),
    }));
    (interactions, items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingReporter;

    fn interaction(user: &str, item: &str) -> Interaction {
        Interaction {
            user_id: user.into(),
            item_id: item.into(),
            rating: 4.0,
            timestamp: None,
        }
    }

    fn item(id: &str) -> Item {
        Item {
            item_id: id.into(),
            title: String::new(),
            description: String::new(),
            category: "Unknown".into(),
            sub_category: "Unknown".into(),
            brand: "Unknown".into(),
            tags: String::new(),
            price: 0.0,
            avg_rating: 0.0,
            content: "unknown unknown unknown".into(),
        }
    }

    #[test]
    fn test_orphans_dropped_and_counted() {
        let interactions = vec![
            interaction("u1", "i1"),
            interaction("u1", "ghost"),
            interaction("u2", "ghost"),
            interaction("u2", "i2"),
        ];
        let items = vec![item("i1"), item("i2"), item("unused")];

        let mut reporter = CollectingReporter::default();
        let (interactions, items) = enforce_join_integrity(interactions, items, &mut reporter);

        assert_eq!(interactions.len(), 2);
        assert!(interactions.iter().all(|r| r.item_id != "ghost"));
        let ids: Vec<_> = items.iter().map(|i| i.item_id.as_str()).collect();
        assert_eq!(ids, vec!["i1", "i2"]);
        assert_eq!(
            reporter.events,
            vec![Event::JoinEnforced(JoinReport {
                interactions_dropped: 2,
                items_narrowed: 1,
                interactions: 2,
                items: 2,
            })]
        );
    }

    #[test]
    fn test_clean_tables_pass_through() {
        let interactions = vec![interaction("u1", "i1")];
        let (kept, dropped) = drop_orphan_interactions(interactions, &[item("i1")]);
        assert_eq!(kept.len(), 1);
        assert_eq!(dropped, 0);
    }

    #[test]
    fn test_no_items_drops_everything() {
        let mut reporter = CollectingReporter::default();
        let (interactions, items) =
            enforce_join_integrity(vec![interaction("u1", "i1")], Vec::new(), &mut reporter);
        assert!(interactions.is_empty());
        assert!(items.is_empty());
    }
}
