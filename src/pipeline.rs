//! End-to-end driver: load → parse → clean → reconcile → build → save.
//!
//! Each stage fully materializes its table and hands it to the next by
//! value. Nothing is written until every table is built.

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::events::{Event, Reporter, Source};
use crate::integrity::enforce_join_integrity;
use crate::interactions::clean_interactions;
use crate::items::clean_metadata;
use crate::loader::JsonlReader;
use crate::metadata::parse_metadata;
use crate::models::{
    CleaningConfig, HybridRow, Interaction, InteractionMatrix, Item, ItemRecord, LoadReport,
    PipelineStats, RawRecord,
};
use crate::outputs::{build_hybrid, build_matrix};
use crate::reviews::parse_reviews;
use crate::safety::validate_output_dir;
use crate::summary::Summary;
use crate::writer::save_outputs;

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub reviews: PathBuf,
    pub metadata: PathBuf,
    pub output_dir: PathBuf,
    pub cleaning: CleaningConfig,
}

/// Every table the run produced, plus its statistics.
#[derive(Debug)]
pub struct PipelineOutput {
    pub interactions: Vec<Interaction>,
    pub items: Vec<Item>,
    pub hybrid: Vec<HybridRow>,
    pub matrix: InteractionMatrix,
    pub stats: PipelineStats,
    pub summary: Summary,
}

/// Forwards events and keeps each stage report for `PipelineStats`.
struct Recorder<'a> {
    inner: &'a mut dyn Reporter,
    stats: PipelineStats,
}

impl Reporter for Recorder<'_> {
    fn report(&mut self, event: &Event) {
        match event {
            Event::Loaded { source, report } => match source {
                Source::Reviews => self.stats.reviews_loaded = report.clone(),
                Source::Metadata => self.stats.metadata_loaded = report.clone(),
            },
            Event::ReviewsParsed(r) => self.stats.reviews = r.clone(),
            Event::MetadataParsed(r) => self.stats.metadata = r.clone(),
            Event::InteractionsCleaned(r) => self.stats.interactions = r.clone(),
            Event::ItemsCleaned(r) => self.stats.items = r.clone(),
            Event::JoinEnforced(r) => self.stats.join = r.clone(),
            Event::Saved(r) => self.stats.saved = Some(r.clone()),
            _ => {}
        }
        self.inner.report(event);
    }
}

/// Read a whole JSONL file so its load counts are known before parsing.
fn read_all(path: &Path) -> Result<(Vec<RawRecord>, LoadReport)> {
    let mut reader = JsonlReader::open(path)?;
    let records = reader.by_ref().collect::<Result<Vec<_>>>()?;
    Ok((records, reader.report()))
}

fn load_reviews(path: &Path, reporter: &mut dyn Reporter) -> Result<Vec<Interaction>> {
    reporter.report(&Event::LoadStarted {
        source: Source::Reviews,
        path: path.display().to_string(),
    });
    let (records, report) = read_all(path)?;
    reporter.report(&Event::Loaded {
        source: Source::Reviews,
        report,
    });
    parse_reviews(records.into_iter().map(Ok), reporter)
}

fn load_metadata(path: &Path, reporter: &mut dyn Reporter) -> Result<Vec<ItemRecord>> {
    reporter.report(&Event::LoadStarted {
        source: Source::Metadata,
        path: path.display().to_string(),
    });
    let (records, report) = read_all(path)?;
    reporter.report(&Event::Loaded {
        source: Source::Metadata,
        report,
    });
    parse_metadata(records.into_iter().map(Ok), reporter)
}

/// Build the cleaned tables in memory without writing anything.
pub fn process(config: &PipelineConfig, reporter: &mut dyn Reporter) -> Result<PipelineOutput> {
    let start = Instant::now();
    let mut recorder = Recorder {
        inner: reporter,
        stats: PipelineStats {
            config: config.cleaning.clone(),
            ..Default::default()
        },
    };

    let interactions = load_reviews(&config.reviews, &mut recorder)?;
    let records = load_metadata(&config.metadata, &mut recorder)?;

    let interactions = clean_interactions(interactions, &config.cleaning, &mut recorder);
    // Imputed prices and ratings come from every parsed item, before narrowing.
    let items = clean_metadata(records, &mut recorder);

    let (interactions, items) = enforce_join_integrity(interactions, items, &mut recorder);

    let hybrid = build_hybrid(&interactions, &items, &mut recorder);
    let matrix = build_matrix(&interactions, &mut recorder);
    let summary = Summary::compute(&interactions, &items);

    let mut stats = recorder.stats;
    stats.elapsed_seconds = start.elapsed().as_secs_f64();
    Ok(PipelineOutput {
        interactions,
        items,
        hybrid,
        matrix,
        stats,
        summary,
    })
}

/// Run the whole pipeline and write the four tables to `config.output_dir`.
pub fn run(config: &PipelineConfig, reporter: &mut dyn Reporter) -> Result<PipelineOutput> {
    let start = Instant::now();
    validate_output_dir(&config.output_dir, &[&config.reviews, &config.metadata])?;

    let mut output = process(config, reporter)?;
    let saved = save_outputs(
        &config.output_dir,
        &output.interactions,
        &output.items,
        &output.hybrid,
        &output.matrix,
        reporter,
    )?;
    output.stats.saved = Some(saved);
    output.stats.elapsed_seconds = start.elapsed().as_secs_f64();
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{CollectingReporter, NullReporter};
    use crate::writer::OUTPUT_FILES;
    use rustc_hash::FxHashSet;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    const BASE_MS: i64 = 1_600_000_000_000;

    fn write_jsonl(path: &Path, values: &[serde_json::Value]) {
        let body: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        fs::write(path, body.join("\n") + "\n").unwrap();
    }

    /// Three users × three items, all rated, plus noise the cleaners must remove.
    fn fixture(dir: &Path) -> (PathBuf, PathBuf) {
        let mut reviews = Vec::new();
        let mut t = 0;
        for user in ["u1", "u2", "u3"] {
            for item in ["i1", "i2", "i3"] {
                t += 1;
                reviews.push(json!({
                    "user_id": user,
                    "parent_asin": item,
                    "rating": 3,
                    "timestamp": BASE_MS + t * 1000
                }));
            }
        }
        // later duplicate wins
        reviews.push(json!({"user_id": "u1", "parent_asin": "i1", "rating": 5, "sort_timestamp": BASE_MS + 99_000}));
        // out-of-range rating
        reviews.push(json!({"user_id": "u2", "parent_asin": "i4", "rating": 7}));
        // orphan item with enough activity to survive cleaning
        for user in ["u1", "u2", "u3"] {
            reviews.push(json!({"user_id": user, "asin": "ghost", "rating": 4}));
        }
        // below user minimum
        reviews.push(json!({"user_id": "drive-by", "parent_asin": "i1", "rating": 1}));

        let reviews_path = dir.join("reviews.jsonl");
        write_jsonl(&reviews_path, &reviews);
        let mut body = fs::read_to_string(&reviews_path).unwrap();
        body.push_str("{not json\n\n");
        fs::write(&reviews_path, body).unwrap();

        let metadata = vec![
            json!({"parent_asin": "i1", "title": "Rose Oil", "price": 10.0, "average_rating": 4.0,
                   "categories": [["Beauty", "Oils"], ["Skin"]], "main_category": "All Beauty",
                   "details": {"Brand": "Acme"}}),
            json!({"parent_asin": "i2", "title": "Soap", "description": ["Gentle", "bar"],
                   "features": ["Vegan"], "store": "SoapCo"}),
            json!({"parent_asin": "i3", "title": "Old", "price": 1.0}),
            json!({"parent_asin": "i3", "title": "Clay Mask", "price": 30.0, "average_rating": 5.0}),
            // never reviewed, still counts toward imputation
            json!({"parent_asin": "unreviewed", "title": "Brush", "price": 50.0}),
            json!({"title": "no id"}),
        ];
        let metadata_path = dir.join("meta.jsonl");
        write_jsonl(&metadata_path, &metadata);
        (reviews_path, metadata_path)
    }

    fn config(dir: &TempDir, out: &str) -> PipelineConfig {
        let (reviews, metadata) = fixture(dir.path());
        PipelineConfig {
            reviews,
            metadata,
            output_dir: dir.path().join(out),
            cleaning: CleaningConfig {
                min_user_interactions: 3,
                min_item_interactions: 3,
                ..CleaningConfig::default()
            },
        }
    }

    #[test]
    fn test_end_to_end_invariants() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(&dir, "out");
        let out = run(&cfg, &mut NullReporter).unwrap();

        // 9 grid rows survive; ghost rows are dropped by the join
        assert_eq!(out.interactions.len(), 9);
        let pairs: FxHashSet<(&str, &str)> = out
            .interactions
            .iter()
            .map(|r| (r.user_id.as_str(), r.item_id.as_str()))
            .collect();
        assert_eq!(pairs.len(), out.interactions.len());
        assert!(out.interactions.iter().all(|r| (1.0..=5.0).contains(&r.rating)));

        let item_ids: FxHashSet<&str> = out.items.iter().map(|i| i.item_id.as_str()).collect();
        let referenced: FxHashSet<&str> =
            out.interactions.iter().map(|r| r.item_id.as_str()).collect();
        assert_eq!(item_ids, referenced);

        assert_eq!(out.hybrid.len(), out.interactions.len());
        assert_eq!(out.matrix.shape(), (3, 3));
        assert_eq!(out.matrix.get("u1", "i1"), Some(5.0));

        assert_eq!(out.stats.reviews_loaded.malformed, 1);
        assert_eq!(out.stats.metadata.duplicates, 1);
        assert_eq!(out.stats.metadata.dropped, 1);
        assert_eq!(out.stats.join.interactions_dropped, 3);
        assert_eq!(out.stats.join.items_narrowed, 1);
        assert!(out.stats.saved.is_some());

        for name in OUTPUT_FILES {
            assert!(cfg.output_dir.join(name).is_file());
        }
        let interactions_csv = fs::read_to_string(cfg.output_dir.join("interactions.csv")).unwrap();
        assert_eq!(interactions_csv.lines().count(), 10);
    }

    #[test]
    fn test_items_are_fully_populated() {
        let dir = tempfile::tempdir().unwrap();
        let out = run(&config(&dir, "out"), &mut NullReporter).unwrap();

        let by_id = |id: &str| out.items.iter().find(|i| i.item_id == id).unwrap();
        let rose = by_id("i1");
        assert_eq!(rose.sub_category, "Oils");
        assert_eq!(rose.brand, "Acme");
        let soap = by_id("i2");
        assert_eq!(soap.description, "Gentle bar");
        assert_eq!(soap.brand, "SoapCo");
        assert_eq!(soap.category, "Unknown");
        assert_eq!(by_id("i3").title, "Clay Mask");
        for item in &out.items {
            assert!(!item.content.is_empty());
            assert!(item.price.is_finite() && item.avg_rating.is_finite());
        }
    }

    #[test]
    fn test_imputation_uses_items_before_narrowing() {
        let dir = tempfile::tempdir().unwrap();
        let out = run(&config(&dir, "out"), &mut NullReporter).unwrap();

        // known prices 10, 30, 50 (the unreviewed item included) → median 30
        let soap = out.items.iter().find(|i| i.item_id == "i2").unwrap();
        assert_eq!(soap.price, 30.0);
        // known ratings 4.0 and 5.0 → mean 4.5
        assert_eq!(soap.avg_rating, 4.5);
        assert!(out.items.iter().all(|i| i.item_id != "unreviewed"));
    }

    #[test]
    fn test_rerun_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let first = config(&dir, "first");
        let second = PipelineConfig {
            output_dir: dir.path().join("second"),
            ..first.clone()
        };
        run(&first, &mut NullReporter).unwrap();
        run(&second, &mut NullReporter).unwrap();

        for name in OUTPUT_FILES {
            let a = fs::read(first.output_dir.join(name)).unwrap();
            let b = fs::read(second.output_dir.join(name)).unwrap();
            assert_eq!(a, b, "{} differs between runs", name);
        }
    }

    #[test]
    fn test_events_arrive_in_stage_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut reporter = CollectingReporter::default();
        run(&config(&dir, "out"), &mut reporter).unwrap();

        let kinds: Vec<&str> = reporter
            .events
            .iter()
            .map(|e| match e {
                Event::LoadStarted { .. } => "start",
                Event::Loaded { .. } => "loaded",
                Event::ReviewsParsed(_) => "reviews",
                Event::MetadataParsed(_) => "metadata",
                Event::InteractionsCleaned(_) => "clean_interactions",
                Event::ItemsCleaned(_) => "clean_items",
                Event::JoinEnforced(_) => "join",
                Event::HybridBuilt { .. } => "hybrid",
                Event::DenseMatrix { .. } => "dense",
                Event::MatrixBuilt { .. } => "matrix",
                Event::Saved(_) => "saved",
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                "start",
                "loaded",
                "reviews",
                "start",
                "loaded",
                "metadata",
                "clean_interactions",
                "clean_items",
                "join",
                "hybrid",
                "dense",
                "matrix",
                "saved"
            ]
        );
    }

    #[test]
    fn test_missing_input_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = PipelineConfig {
            reviews: dir.path().join("absent.jsonl"),
            metadata: dir.path().join("absent_meta.jsonl"),
            output_dir: dir.path().join("out"),
            cleaning: CleaningConfig::default(),
        };
        let err = run(&cfg, &mut NullReporter).unwrap_err();
        assert!(err.to_string().contains("Failed to open input file"));
        assert!(!cfg.output_dir.exists());
    }

    #[test]
    fn test_output_colliding_with_input_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(&dir, "out");
        let clash = dir.path().join("interactions.csv");
        fs::copy(&cfg.reviews, &clash).unwrap();
        cfg.reviews = clash;
        cfg.output_dir = dir.path().to_path_buf();

        assert!(run(&cfg, &mut NullReporter).is_err());
    }
}
