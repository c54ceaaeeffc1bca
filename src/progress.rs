//! Progress rendering and logging utilities.
//!
//! `ConsoleReporter` turns pipeline events into tagged log lines and shows
//! spinners while input files load. In log-only mode the spinners are hidden
//! for tail-friendly output.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::events::{Event, Reporter, Source};

/// Global flag for log-only mode (set from args in main)
pub static LOG_ONLY: AtomicBool = AtomicBool::new(false);

/// Set log-only mode globally
pub fn set_log_only(value: bool) {
    LOG_ONLY.store(value, Ordering::Relaxed);
}

/// Check if log-only mode is enabled
pub fn is_log_only() -> bool {
    LOG_ONLY.load(Ordering::Relaxed)
}

/// Format duration in human-readable format
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        let mins = secs / 60.0;
        format!("{:.1}m", mins)
    }
}

/// Create a spinner for indeterminate progress.
/// In log-only mode, the spinner is hidden.
pub fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if is_log_only() {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    } else {
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{msg} {spinner} [{elapsed_precise}]")
                .unwrap(),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
    }
    pb.set_message(msg.to_string());
    pb
}

/// Matrix cell count above which the dense matrix warning is raised.
pub const DENSE_MATRIX_WARN_CELLS: usize = 10_000_000;

fn percent(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.2}%", v * 100.0))
}

fn source_tag(source: Source) -> &'static str {
    match source {
        Source::Reviews => "reviews",
        Source::Metadata => "metadata",
    }
}

/// Render one event as log lines.
pub fn render(event: &Event) -> Vec<String> {
    match event {
        Event::LoadStarted { source, path } => {
            vec![format!("[LOAD] Reading {} from {}", source_tag(*source), path)]
        }
        Event::Loaded { report, .. } => {
            let mut lines = vec![format!(
                "[LOAD] Loaded {} records from {}",
                report.parsed, report.source
            )];
            if report.malformed > 0 {
                lines.push(format!("       Skipped {} malformed lines", report.malformed));
            }
            lines
        }
        Event::ReviewsParsed(r) => vec![format!(
            "[REVIEWS] Parsed {} raw interactions ({} incomplete reviews dropped)",
            r.parsed, r.dropped
        )],
        Event::MetadataParsed(r) => vec![format!(
            "[METADATA] Parsed {} unique items ({} without id dropped, {} duplicates)",
            r.unique_items, r.dropped, r.duplicates
        )],
        Event::InteractionsCleaned(r) => {
            let mut lines = vec![
                format!("[CLEAN] Interactions: {} -> {}", r.rows_before, r.rows_after),
                format!("        Unique users : {}", r.users),
                format!("        Unique items : {}", r.items),
                format!("        Sparsity     : {}", percent(r.sparsity)),
            ];
            if r.refinement_passes > 0 {
                lines.push(format!("        Strict core  : {} extra passes", r.refinement_passes));
            }
            lines
        }
        Event::ItemsCleaned(r) => vec![
            format!("[CLEAN] Metadata: {} items after cleaning", r.items),
            format!(
                "        Missing prices filled   : {} (median {:.2})",
                r.prices_imputed, r.median_price
            ),
            format!(
                "        Missing ratings filled  : {} (mean {:.2})",
                r.ratings_imputed, r.mean_rating
            ),
            format!("        Descriptions backfilled : {}", r.descriptions_backfilled),
        ],
        Event::JoinEnforced(r) => {
            let mut lines = if r.interactions_dropped > 0 {
                vec![format!(
                    "[JOIN] Dropped {} interactions with no matching metadata",
                    r.interactions_dropped
                )]
            } else {
                vec!["[JOIN] All item_ids in interactions exist in metadata".to_string()]
            };
            lines.push(format!(
                "[JOIN] Kept {} of {} items referenced by interactions",
                r.items,
                r.items + r.items_narrowed
            ));
            lines
        }
        Event::HybridBuilt { rows } => {
            vec![format!("[HYBRID] Built hybrid_ready table: {} rows", rows)]
        }
        Event::DenseMatrix { users, items } => {
            let cells = users.saturating_mul(*items);
            if cells > DENSE_MATRIX_WARN_CELLS {
                vec![format!(
                    "[MATRIX] WARNING: dense matrix of {} x {} = {} cells; memory grows with users x items",
                    users, items, cells
                )]
            } else {
                Vec::new()
            }
        }
        Event::MatrixBuilt { users, items } => {
            vec![format!("[MATRIX] User-Item Matrix shape: ({}, {})", users, items)]
        }
        Event::Saved(r) => vec![
            format!("[SAVE] All files saved to: {}/", r.output_dir),
            format!("       interactions.csv      -> {} rows", r.interactions),
            format!("       items_metadata.csv    -> {} rows", r.items),
            format!("       hybrid_ready.csv      -> {} rows", r.hybrid_rows),
            format!(
                "       user_item_matrix.csv  -> {} users x {} items",
                r.matrix_users, r.matrix_items
            ),
        ],
    }
}

/// Prints events to stderr, with a spinner per loading phase.
#[derive(Default)]
pub struct ConsoleReporter {
    spinner: Option<ProgressBar>,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Reporter for ConsoleReporter {
    fn report(&mut self, event: &Event) {
        match event {
            Event::LoadStarted { source, .. } => {
                self.spinner = Some(create_spinner(&format!("Loading {}", source_tag(*source))));
            }
            Event::Loaded { .. } => {
                if let Some(spinner) = self.spinner.take() {
                    spinner.finish_and_clear();
                }
            }
            _ => {}
        }
        for line in render(event) {
            match &self.spinner {
                Some(spinner) => spinner.suspend(|| eprintln!("{}", line)),
                None => eprintln!("{}", line),
            }
        }
    }
}
