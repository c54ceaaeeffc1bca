//! Check the integrity of a processed output directory.
//!
//! Usage: verify-outputs <output_dir>

use anyhow::{bail, Context, Result};
use clap::Parser;
use csv::{Reader, StringRecord};
use rustc_hash::FxHashSet;
use std::path::{Path, PathBuf};

use reco_prep::interactions::valid_rating;
use reco_prep::writer::{HYBRID_FILE, INTERACTIONS_FILE, ITEMS_FILE, MATRIX_FILE};

#[derive(Parser)]
#[command(name = "verify-outputs")]
#[command(about = "Verify rating range, pair uniqueness and join integrity of processed tables")]
struct Args {
    output_dir: PathBuf,
}

struct Table {
    headers: StringRecord,
    rows: Vec<StringRecord>,
}

impl Table {
    fn read(path: &Path) -> Result<Self> {
        let mut rdr = Reader::from_path(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let headers = rdr.headers()?.clone();
        let rows = rdr
            .records()
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(Self { headers, rows })
    }

    fn column(&self, name: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|h| h == name)
            .with_context(|| format!("Missing column '{}'", name))
    }

    fn values(&self, name: &str) -> Result<Vec<&str>> {
        let idx = self.column(name)?;
        Ok(self.rows.iter().map(|r| r.get(idx).unwrap_or("")).collect())
    }
}

/// One named check and the problems it found.
struct Check {
    name: &'static str,
    problems: Vec<String>,
}

impl Check {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            problems: Vec::new(),
        }
    }
}

fn check_interactions(interactions: &Table) -> Result<Vec<Check>> {
    let mut range = Check::new("ratings within [1.0, 5.0]");
    for (line, raw) in interactions.values("rating")?.into_iter().enumerate() {
        match raw.parse::<f64>() {
            Ok(r) if valid_rating(r) => {}
            _ => range.problems.push(format!("row {}: rating '{}'", line + 1, raw)),
        }
    }

    let mut unique = Check::new("unique (user_id, item_id) pairs");
    let users = interactions.values("user_id")?;
    let items = interactions.values("item_id")?;
    let mut seen = FxHashSet::default();
    for (user, item) in users.into_iter().zip(items) {
        if !seen.insert((user, item)) {
            unique.problems.push(format!("duplicate pair ({}, {})", user, item));
        }
    }
    Ok(vec![range, unique])
}

fn check_items(items: &Table) -> Result<Vec<Check>> {
    let mut complete = Check::new("item fields populated");
    for name in ["category", "sub_category", "brand", "price", "avg_rating"] {
        let idx = items.column(name)?;
        for (line, row) in items.rows.iter().enumerate() {
            if row.get(idx).map_or(true, str::is_empty) {
                complete.problems.push(format!("row {}: empty {}", line + 1, name));
            }
        }
    }
    Ok(vec![complete])
}

fn check_join(interactions: &Table, items: &Table, hybrid: &Table) -> Result<Vec<Check>> {
    let referenced: FxHashSet<&str> = interactions.values("item_id")?.into_iter().collect();
    let known: FxHashSet<&str> = items.values("item_id")?.into_iter().collect();

    let mut orphans = Check::new("every interaction item has metadata");
    for id in referenced.difference(&known) {
        orphans.problems.push(format!("unknown item {}", id));
    }
    let mut unused = Check::new("every item is referenced");
    for id in known.difference(&referenced) {
        unused.problems.push(format!("unreferenced item {}", id));
    }

    let mut hybrid_rows = Check::new("hybrid rows match interactions");
    if hybrid.rows.len() != interactions.rows.len() {
        hybrid_rows.problems.push(format!(
            "{} hybrid rows vs {} interactions",
            hybrid.rows.len(),
            interactions.rows.len()
        ));
    }
    Ok(vec![orphans, unused, hybrid_rows])
}

fn check_matrix(interactions: &Table, matrix: &Table) -> Result<Vec<Check>> {
    let users: FxHashSet<&str> = interactions.values("user_id")?.into_iter().collect();
    let items: FxHashSet<&str> = interactions.values("item_id")?.into_iter().collect();

    let mut shape = Check::new("matrix shape matches interactions");
    let columns = matrix.headers.len().saturating_sub(1);
    if matrix.rows.len() != users.len() || columns != items.len() {
        shape.problems.push(format!(
            "matrix is {} x {}, interactions have {} users x {} items",
            matrix.rows.len(),
            columns,
            users.len(),
            items.len()
        ));
    }
    Ok(vec![shape])
}

fn verify(dir: &Path) -> Result<Vec<Check>> {
    let interactions = Table::read(&dir.join(INTERACTIONS_FILE))?;
    let items = Table::read(&dir.join(ITEMS_FILE))?;
    let hybrid = Table::read(&dir.join(HYBRID_FILE))?;
    let matrix = Table::read(&dir.join(MATRIX_FILE))?;

    let mut checks = check_interactions(&interactions)?;
    checks.extend(check_items(&items)?);
    checks.extend(check_join(&interactions, &items, &hybrid)?);
    checks.extend(check_matrix(&interactions, &matrix)?);
    Ok(checks)
}

fn main() -> Result<()> {
    let args = Args::parse();
    println!("Verifying {}", args.output_dir.display());

    let checks = verify(&args.output_dir)?;
    let mut failed = 0;
    for check in &checks {
        if check.problems.is_empty() {
            println!("  [PASS] {}", check.name);
        } else {
            failed += 1;
            println!("  [FAIL] {} ({} problems)", check.name, check.problems.len());
            for problem in check.problems.iter().take(10) {
                println!("         {}", problem);
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} checks failed", failed, checks.len());
    }
    println!("All {} checks passed", checks.len());
    Ok(())
}
