use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;

use reco_prep::events::{NullReporter, Reporter};
use reco_prep::models::CleaningConfig;
use reco_prep::pipeline::{run, PipelineConfig};
use reco_prep::progress::{format_duration, set_log_only, ConsoleReporter};

#[derive(Parser)]
#[command(name = "reco-prep")]
#[command(about = "Turn JSONL review and metadata dumps into clean, joined tables for recommenders")]
struct Args {
    /// Reviews JSONL file
    #[arg(long)]
    reviews: PathBuf,

    /// Item metadata JSONL file
    #[arg(long)]
    metadata: PathBuf,

    #[arg(long, alias = "output_dir", default_value = "./processed_data")]
    output_dir: PathBuf,

    #[arg(long, alias = "min_user_interactions", default_value = "5",
          value_parser = clap::value_parser!(u64).range(1..))]
    min_user_interactions: u64,

    #[arg(long, alias = "min_item_interactions", default_value = "5",
          value_parser = clap::value_parser!(u64).range(1..))]
    min_item_interactions: u64,

    #[arg(long, alias = "max_users", default_value = "5000",
          value_parser = clap::value_parser!(u64).range(1..))]
    max_users: u64,

    #[arg(long, alias = "max_items", default_value = "2000",
          value_parser = clap::value_parser!(u64).range(1..))]
    max_items: u64,

    /// Repeat count filtering until every user and item meets its minimum
    #[arg(long)]
    strict_core: bool,

    /// Write run statistics as JSON to this path
    #[arg(long)]
    stats: Option<PathBuf>,

    /// Hide spinners, print plain log lines only
    #[arg(long)]
    log_only: bool,

    /// Suppress progress output (the final summary is still printed)
    #[arg(long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    set_log_only(args.log_only);

    let config = PipelineConfig {
        reviews: args.reviews,
        metadata: args.metadata,
        output_dir: args.output_dir,
        cleaning: CleaningConfig {
            min_user_interactions: args.min_user_interactions as usize,
            min_item_interactions: args.min_item_interactions as usize,
            max_users: args.max_users as usize,
            max_items: args.max_items as usize,
            strict_core: args.strict_core,
        },
    };

    let start = Instant::now();
    println!("{:=<60}", "");
    println!("Starting data processing pipeline");
    println!("{:=<60}", "");

    let mut console = ConsoleReporter::new();
    let mut silent = NullReporter;
    let reporter: &mut dyn Reporter = if args.quiet { &mut silent } else { &mut console };

    let output = run(&config, reporter)?;

    if let Some(path) = &args.stats {
        output
            .stats
            .write_to_file(path)
            .with_context(|| format!("Failed to write stats to {}", path.display()))?;
    }

    println!("\n{}", output.summary);
    println!("Data is ready:");
    println!("  Collaborative filtering -> interactions.csv");
    println!("  Content-based           -> items_metadata.csv (use 'content' column)");
    println!("  Hybrid                  -> hybrid_ready.csv");
    println!("  Matrix ops              -> user_item_matrix.csv");
    println!("  Elapsed: {}", format_duration(start.elapsed()));

    Ok(())
}
