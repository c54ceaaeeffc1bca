//! Item metadata cleaning: imputation and the unified `content` field.

use crate::events::{Event, Reporter};
use crate::metadata::UNKNOWN;
use crate::models::{Item, ItemCleanReport, ItemRecord};

/// Round to 2 decimals, ties to even.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// Median of the values, `None` when empty.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}

pub fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

fn or_unknown(value: String) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        UNKNOWN.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Lowercased text blob used by text-similarity models.
pub fn build_content(item: &Item) -> String {
    [
        item.title.as_str(),
        item.category.as_str(),
        item.sub_category.as_str(),
        item.brand.as_str(),
        item.tags.as_str(),
        item.description.as_str(),
    ]
    .join(" ")
    .to_lowercase()
    .trim()
    .to_string()
}

/// Fill every missing field and derive `content`.
///
/// Missing prices take the median known price, missing ratings the mean
/// known rating. With nothing known the fill value is `0.0`. All prices and
/// ratings are rounded to 2 decimals afterwards.
pub fn clean_metadata(records: Vec<ItemRecord>, reporter: &mut dyn Reporter) -> Vec<Item> {
    let prices: Vec<f64> = records.iter().filter_map(|r| r.price).collect();
    let ratings: Vec<f64> = records.iter().filter_map(|r| r.avg_rating).collect();
    let median_price = median(&prices).unwrap_or(0.0);
    let mean_rating = mean(&ratings).unwrap_or(0.0);

    let mut report = ItemCleanReport {
        items: records.len(),
        prices_imputed: records.len() - prices.len(),
        ratings_imputed: records.len() - ratings.len(),
        descriptions_backfilled: 0,
        median_price: round2(median_price),
        mean_rating: round2(mean_rating),
    };

    let items: Vec<Item> = records
        .into_iter()
        .map(|r| {
            let title = r.title.trim().to_string();
            let tags = r.tags.trim().to_string();
            let mut description = r.description.trim().to_string();
            if description.is_empty() {
                description = format!("{} {}", title, tags).trim().to_string();
                report.descriptions_backfilled += 1;
            }

            let mut item = Item {
                item_id: r.item_id,
                title,
                description,
                category: or_unknown(r.category),
                sub_category: or_unknown(r.sub_category),
                brand: or_unknown(r.brand),
                tags,
                price: round2(r.price.unwrap_or(median_price)),
                avg_rating: round2(r.avg_rating.unwrap_or(mean_rating)),
                content: String::new(),
            };
            item.content = build_content(&item);
            item
        })
        .collect();

    reporter.report(&Event::ItemsCleaned(report));
    items
}
