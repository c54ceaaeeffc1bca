//! Final data summary over the reconciled tables.

use rustc_hash::FxHashSet;
use serde::Serialize;
use std::fmt;

use crate::interactions::{distinct_counts, sparsity};
use crate::models::{Interaction, Item};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Summary {
    pub interactions: usize,
    pub users: usize,
    pub items: usize,
    pub sparsity: Option<f64>,
    pub mean_rating: Option<f64>,
    /// (rating, count), ascending by rating.
    pub rating_distribution: Vec<(f64, usize)>,
    /// Counted after imputation, so it equals `items`; the number of filled
    /// prices is `ItemCleanReport::prices_imputed`.
    pub items_with_price: usize,
    pub items_with_content: usize,
    pub categories: usize,
    pub brands: usize,
}

impl Summary {
    pub fn compute(interactions: &[Interaction], items: &[Item]) -> Self {
        let (users, item_count) = distinct_counts(interactions);

        let mut ratings: Vec<f64> = interactions.iter().map(|r| r.rating).collect();
        ratings.sort_by(f64::total_cmp);
        let rating_distribution: Vec<(f64, usize)> = ratings
            .chunk_by(|a, b| a == b)
            .map(|run| (run[0], run.len()))
            .collect();
        let mean_rating =
            (!ratings.is_empty()).then(|| ratings.iter().sum::<f64>() / ratings.len() as f64);

        let categories: FxHashSet<&str> = items.iter().map(|i| i.category.as_str()).collect();
        let brands: FxHashSet<&str> = items.iter().map(|i| i.brand.as_str()).collect();

        Self {
            interactions: interactions.len(),
            users,
            items: item_count,
            sparsity: sparsity(interactions.len(), users, item_count),
            mean_rating,
            rating_distribution,
            items_with_price: items.iter().filter(|i| i.price.is_finite()).count(),
            items_with_content: items.iter().filter(|i| !i.content.is_empty()).count(),
            categories: categories.len(),
            brands: brands.len(),
        }
    }
}

fn percent(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.2}%", v * 100.0))
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:=<60}", "")?;
        writeln!(f, "Final data summary")?;
        writeln!(f, "{:=<60}", "")?;
        writeln!(f, "  Total interactions : {}", self.interactions)?;
        writeln!(f, "  Unique users       : {}", self.users)?;
        writeln!(f, "  Unique items       : {}", self.items)?;
        writeln!(f, "  Matrix sparsity    : {}", percent(self.sparsity))?;
        match self.mean_rating {
            Some(mean) => writeln!(f, "  Avg rating         : {:.2}", mean)?,
            None => writeln!(f, "  Avg rating         : n/a")?,
        }
        writeln!(f, "  Rating distribution:")?;
        for (rating, count) in &self.rating_distribution {
            writeln!(f, "      {:.1} -> {}", rating, count)?;
        }
        writeln!(f, "  Items with price   : {}", self.items_with_price)?;
        writeln!(f, "  Items with content : {}", self.items_with_content)?;
        writeln!(f, "  Categories         : {}", self.categories)?;
        writeln!(f, "  Brands             : {}", self.brands)?;
        write!(f, "{:=<60}", "")
    }
}
