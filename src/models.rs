//! Core data models for the recommendation data preparation pipeline.
//!
//! This module contains the record types flowing between stages, the
//! cleaning configuration, and the per-stage report structs that are
//! surfaced through events and aggregated into `PipelineStats`.

use rustc_hash::FxHashMap;
use serde::Serialize;
use serde_json::{Map, Value};

// ============================================================================
// Raw Records
// ============================================================================

/// One parsed JSON-lines object.
///
/// Accessors follow the loose truthiness rules of the raw dumps: a field that
/// is absent, `null`, `false`, `0`, an empty string, an empty list or an empty
/// object counts as missing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawRecord {
    fields: Map<String, Value>,
}

impl RawRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Field value, `None` when absent or `null`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key).filter(|v| !v.is_null())
    }

    /// Field value only if it is truthy.
    pub fn truthy(&self, key: &str) -> Option<&Value> {
        self.fields.get(key).filter(|v| is_truthy(v))
    }

    /// First truthy value among `keys`, in order.
    pub fn first_truthy(&self, keys: &[&str]) -> Option<&Value> {
        keys.iter().find_map(|k| self.truthy(k))
    }

    /// Truthy field stringified and trimmed; `None` if the result is empty.
    pub fn text(&self, key: &str) -> Option<String> {
        self.truthy(key)
            .map(|v| stringify(v).trim().to_string())
            .filter(|s| !s.is_empty())
    }

    pub fn list(&self, key: &str) -> Option<&Vec<Value>> {
        self.fields.get(key).and_then(Value::as_array)
    }

    /// Truthy field of a nested object, e.g. `details.Brand`.
    pub fn nested_truthy(&self, outer: &str, inner: &str) -> Option<&Value> {
        self.fields
            .get(outer)
            .and_then(Value::as_object)
            .and_then(|obj| obj.get(inner))
            .filter(|v| is_truthy(v))
    }
}

impl TryFrom<Value> for RawRecord {
    type Error = Value;

    /// Only JSON objects are records; anything else is handed back.
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(fields) => Ok(Self::new(fields)),
            other => Err(other),
        }
    }
}

pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Render a JSON value as plain text (strings unquoted, `null` empty).
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Coerce a JSON number or numeric string to a finite float.
pub fn coerce_f64(value: &Value) -> Option<f64> {
    let f = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    f.is_finite().then_some(f)
}

// ============================================================================
// Interactions
// ============================================================================

/// One user rating an item.
#[derive(Clone, Debug, PartialEq)]
pub struct Interaction {
    pub user_id: String,
    pub item_id: String,
    pub rating: f64,
    /// `YYYY-MM-DD HH:MM:SS` in UTC, `None` when the source had no usable value.
    pub timestamp: Option<String>,
}

/// Thresholds for pruning the interaction set to a dense core.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CleaningConfig {
    pub min_user_interactions: usize,
    pub min_item_interactions: usize,
    pub max_users: usize,
    pub max_items: usize,
    /// Repeat count filtering until every survivor meets its minimum.
    pub strict_core: bool,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            min_user_interactions: 5,
            min_item_interactions: 5,
            max_users: 5000,
            max_items: 2000,
            strict_core: false,
        }
    }
}

// ============================================================================
// Items
// ============================================================================

/// Item metadata as parsed, before imputation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ItemRecord {
    pub item_id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub sub_category: String,
    pub brand: String,
    pub tags: String,
    pub price: Option<f64>,
    pub avg_rating: Option<f64>,
}

/// Cleaned item metadata. Every field is populated.
#[derive(Clone, Debug, PartialEq)]
pub struct Item {
    pub item_id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub sub_category: String,
    pub brand: String,
    pub tags: String,
    pub price: f64,
    pub avg_rating: f64,
    /// Lowercased concatenation of the text fields for text-based models.
    pub content: String,
}

// ============================================================================
// Derived Outputs
// ============================================================================

/// Interaction with its item's metadata appended.
#[derive(Clone, Debug, PartialEq)]
pub struct HybridRow {
    pub interaction: Interaction,
    pub item: Item,
}

/// Dense user × item rating table, row-major. Missing cells are `0.0`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InteractionMatrix {
    pub users: Vec<String>,
    pub items: Vec<String>,
    pub values: Vec<f64>,
}

impl InteractionMatrix {
    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        (self.users.len(), self.items.len())
    }

    pub fn row(&self, index: usize) -> &[f64] {
        let width = self.items.len();
        &self.values[index * width..(index + 1) * width]
    }

    /// Cell lookup by identifiers.
    pub fn get(&self, user_id: &str, item_id: &str) -> Option<f64> {
        let row = self.users.iter().position(|u| u == user_id)?;
        let col = self.items.iter().position(|i| i == item_id)?;
        Some(self.values[row * self.items.len() + col])
    }
}

// ============================================================================
// Stage Reports
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct LoadReport {
    pub source: String,
    pub parsed: usize,
    pub malformed: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ReviewParseReport {
    pub parsed: usize,
    pub dropped: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct MetadataParseReport {
    pub unique_items: usize,
    pub dropped: usize,
    pub duplicates: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct InteractionCleanReport {
    pub rows_before: usize,
    pub duplicates_removed: usize,
    pub invalid_ratings_removed: usize,
    pub rows_after: usize,
    pub users: usize,
    pub items: usize,
    /// `None` when no rows survive.
    pub sparsity: Option<f64>,
    /// Extra filtering passes run in strict core mode.
    pub refinement_passes: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ItemCleanReport {
    pub items: usize,
    pub prices_imputed: usize,
    pub ratings_imputed: usize,
    pub descriptions_backfilled: usize,
    pub median_price: f64,
    pub mean_rating: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct JoinReport {
    pub interactions_dropped: usize,
    pub items_narrowed: usize,
    pub interactions: usize,
    pub items: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SaveReport {
    pub output_dir: String,
    pub interactions: usize,
    pub items: usize,
    pub hybrid_rows: usize,
    pub matrix_users: usize,
    pub matrix_items: usize,
}

// ============================================================================
// Statistics (Instrumentation)
// ============================================================================

/// Whole-run statistics, optionally written as JSON next to the outputs.
#[derive(Clone, Debug, Default, Serialize)]
pub struct PipelineStats {
    pub config: CleaningConfig,
    pub reviews_loaded: LoadReport,
    pub metadata_loaded: LoadReport,
    pub reviews: ReviewParseReport,
    pub metadata: MetadataParseReport,
    pub interactions: InteractionCleanReport,
    pub items: ItemCleanReport,
    pub join: JoinReport,
    pub saved: Option<SaveReport>,
    pub elapsed_seconds: f64,
}

impl PipelineStats {
    /// Write stats to a JSON file
    pub fn write_to_file(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Count occurrences of each key, remembering first-appearance order.
///
/// Returns keys sorted by count descending; ties keep first appearance.
pub fn ranked_counts<'a, I>(keys: I) -> Vec<(&'a str, usize)>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut slots: FxHashMap<&'a str, usize> = FxHashMap::default();
    let mut counts: Vec<(&'a str, usize)> = Vec::new();
    for key in keys {
        let slot = *slots.entry(key).or_insert_with(|| {
            counts.push((key, 0));
            counts.len() - 1
        });
        counts[slot].1 += 1;
    }
    // stable sort keeps first-appearance order among equal counts
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}
