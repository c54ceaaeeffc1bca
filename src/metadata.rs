//! Item metadata records → item table.

use anyhow::Result;
use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::events::{Event, Reporter};
use crate::models::{coerce_f64, stringify, ItemRecord, MetadataParseReport, RawRecord};

pub const UNKNOWN: &str = "Unknown";

/// Separator between joined feature bullets in `tags`.
pub const TAG_SEPARATOR: &str = " | ";

fn string_elements(values: &[Value]) -> impl Iterator<Item = &str> {
    values.iter().filter_map(Value::as_str)
}

/// List → string elements joined by a space; anything else stringified.
pub fn description_text(value: Option<&Value>) -> String {
    let text = match value {
        Some(Value::Array(parts)) => string_elements(parts).collect::<Vec<_>>().join(" "),
        Some(other) => stringify(other),
        None => String::new(),
    };
    text.trim().to_string()
}

/// Feature bullets joined with `TAG_SEPARATOR`.
pub fn tags_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::Array(features)) => string_elements(features)
            .collect::<Vec<_>>()
            .join(TAG_SEPARATOR),
        Some(other) => stringify(other),
        None => String::new(),
    }
}

/// Second category of the (possibly nested) category path, else the first.
///
/// When the first element is itself a list, nested lists are flattened one
/// level before picking: `[["A","B"],["C"]]` → `["A","B","C"]` → `"B"`.
pub fn sub_category(categories: Option<&Vec<Value>>) -> String {
    let Some(categories) = categories else {
        return UNKNOWN.to_string();
    };
    let flattened: Vec<&Value> = if matches!(categories.first(), Some(Value::Array(_))) {
        categories
            .iter()
            .flat_map(|c| match c {
                Value::Array(inner) => inner.iter().collect::<Vec<_>>(),
                scalar => vec![scalar],
            })
            .collect()
    } else {
        categories.iter().collect()
    };

    flattened
        .get(1)
        .or_else(|| flattened.first())
        .map(|v| stringify(v).trim().to_string())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Extract one item; `None` when the item identifier is missing.
pub fn parse_metadata_record(record: &RawRecord) -> Option<ItemRecord> {
    let item_id = record.text("parent_asin")?;

    let title = record
        .get("title")
        .map(|v| stringify(v).trim().to_string())
        .unwrap_or_default();
    let category = record
        .get("main_category")
        .map(|v| stringify(v).trim().to_string())
        .unwrap_or_else(|| UNKNOWN.to_string());
    let brand = record
        .nested_truthy("details", "Brand")
        .or_else(|| record.truthy("store"))
        .map(|v| stringify(v).trim().to_string())
        .unwrap_or_else(|| UNKNOWN.to_string());

    Some(ItemRecord {
        item_id,
        title,
        description: description_text(record.get("description")),
        category,
        sub_category: sub_category(record.list("categories")),
        brand,
        tags: tags_text(record.get("features")),
        price: record.get("price").and_then(coerce_f64),
        avg_rating: record.truthy("average_rating").and_then(coerce_f64),
    })
}

/// Keep the last record per `item_id`, in the order those last records appeared.
pub fn dedup_keep_last(items: Vec<ItemRecord>) -> Vec<ItemRecord> {
    let mut last: FxHashMap<String, usize> = FxHashMap::default();
    for (idx, item) in items.iter().enumerate() {
        last.insert(item.item_id.clone(), idx);
    }
    items
        .into_iter()
        .enumerate()
        .filter(|(idx, item)| last.get(&item.item_id) == Some(idx))
        .map(|(_, item)| item)
        .collect()
}

/// Parse all metadata records into one `ItemRecord` per unique item.
pub fn parse_metadata<I>(records: I, reporter: &mut dyn Reporter) -> Result<Vec<ItemRecord>>
where
    I: IntoIterator<Item = Result<RawRecord>>,
{
    let mut items = Vec::new();
    let mut dropped = 0;
    for record in records {
        match parse_metadata_record(&record?) {
            Some(item) => items.push(item),
            None => dropped += 1,
        }
    }

    let parsed = items.len();
    let items = dedup_keep_last(items);

    reporter.report(&Event::MetadataParsed(MetadataParseReport {
        unique_items: items.len(),
        dropped,
        duplicates: parsed - items.len(),
    }));
    Ok(items)
}
