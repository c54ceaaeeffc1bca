//! CSV persistence for the four output tables.

use anyhow::{Context, Result};
use csv::{Terminator, Writer, WriterBuilder};
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::events::{Event, Reporter};
use crate::models::{HybridRow, Interaction, InteractionMatrix, Item, SaveReport};

pub const INTERACTIONS_FILE: &str = "interactions.csv";
pub const ITEMS_FILE: &str = "items_metadata.csv";
pub const HYBRID_FILE: &str = "hybrid_ready.csv";
pub const MATRIX_FILE: &str = "user_item_matrix.csv";

/// Every artifact a run produces, in write order.
pub const OUTPUT_FILES: [&str; 4] = [INTERACTIONS_FILE, ITEMS_FILE, HYBRID_FILE, MATRIX_FILE];

pub const INTERACTION_COLUMNS: [&str; 4] = ["user_id", "item_id", "rating", "timestamp"];

pub const ITEM_COLUMNS: [&str; 10] = [
    "item_id",
    "title",
    "description",
    "category",
    "sub_category",
    "brand",
    "price",
    "tags",
    "avg_rating",
    "content",
];

/// Shortest round-trip form with at least one decimal: `5.0`, `12.99`.
pub fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

pub fn csv_writer<W: Write>(inner: W) -> Writer<W> {
    WriterBuilder::new()
        .terminator(Terminator::Any(b'\n'))
        .from_writer(inner)
}

fn interaction_fields(r: &Interaction) -> [String; 4] {
    [
        r.user_id.clone(),
        r.item_id.clone(),
        format_float(r.rating),
        r.timestamp.clone().unwrap_or_default(),
    ]
}

/// Item fields after `item_id`, in `ITEM_COLUMNS` order.
fn item_fields(i: &Item) -> [String; 9] {
    [
        i.title.clone(),
        i.description.clone(),
        i.category.clone(),
        i.sub_category.clone(),
        i.brand.clone(),
        format_float(i.price),
        i.tags.clone(),
        format_float(i.avg_rating),
        i.content.clone(),
    ]
}

pub fn write_interactions<W: Write>(wtr: &mut Writer<W>, rows: &[Interaction]) -> Result<()> {
    wtr.write_record(INTERACTION_COLUMNS)?;
    for r in rows {
        wtr.write_record(interaction_fields(r))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_items<W: Write>(wtr: &mut Writer<W>, items: &[Item]) -> Result<()> {
    wtr.write_record(ITEM_COLUMNS)?;
    for i in items {
        wtr.write_field(&i.item_id)?;
        wtr.write_record(item_fields(i))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Interaction columns followed by the item columns other than `item_id`.
pub fn write_hybrid<W: Write>(wtr: &mut Writer<W>, rows: &[HybridRow]) -> Result<()> {
    let header = INTERACTION_COLUMNS
        .iter()
        .chain(ITEM_COLUMNS.iter().skip(1));
    wtr.write_record(header)?;
    for row in rows {
        wtr.write_record(
            interaction_fields(&row.interaction)
                .iter()
                .chain(item_fields(&row.item).iter()),
        )?;
    }
    wtr.flush()?;
    Ok(())
}

/// `user_id` index column, then one column per item.
pub fn write_matrix<W: Write>(wtr: &mut Writer<W>, matrix: &InteractionMatrix) -> Result<()> {
    wtr.write_record(std::iter::once("user_id").chain(matrix.items.iter().map(String::as_str)))?;
    for (idx, user) in matrix.users.iter().enumerate() {
        wtr.write_field(user)?;
        wtr.write_record(matrix.row(idx).iter().map(|v| format_float(*v)))?;
    }
    wtr.flush()?;
    Ok(())
}

fn write_file<F>(dir: &Path, name: &str, write: F) -> Result<()>
where
    F: FnOnce(&mut Writer<File>) -> Result<()>,
{
    let path = dir.join(name);
    let file = File::create(&path)
        .with_context(|| format!("Failed to create output file {}", path.display()))?;
    let mut wtr = csv_writer(file);
    write(&mut wtr).with_context(|| format!("Failed to write {}", path.display()))
}

/// Write all four tables into `output_dir`, creating it if needed.
pub fn save_outputs(
    output_dir: &Path,
    interactions: &[Interaction],
    items: &[Item],
    hybrid: &[HybridRow],
    matrix: &InteractionMatrix,
    reporter: &mut dyn Reporter,
) -> Result<SaveReport> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;

    write_file(output_dir, INTERACTIONS_FILE, |w| write_interactions(w, interactions))?;
    write_file(output_dir, ITEMS_FILE, |w| write_items(w, items))?;
    write_file(output_dir, HYBRID_FILE, |w| write_hybrid(w, hybrid))?;
    write_file(output_dir, MATRIX_FILE, |w| write_matrix(w, matrix))?;

    let (matrix_users, matrix_items) = matrix.shape();
    let report = SaveReport {
        output_dir: output_dir.display().to_string(),
        interactions: interactions.len(),
        items: items.len(),
        hybrid_rows: hybrid.len(),
        matrix_users,
        matrix_items,
    };
    reporter.report(&Event::Saved(report.clone()));
    Ok(report)
}
