// Driver that fills a DiskArray with a synthetic sequence and reports how its backing
// file grew along the way.

use std::mem::size_of;
use std::path::PathBuf;

use anyhow::{ensure, Result};
use clap::Parser;
use kdam::{tqdm, BarExt};
use tracing_subscriber::EnvFilter;

use disk_array::{BackingConfig, DiskArray, DropPolicy, FillStats};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Directory for backing files.
    #[arg(long, default_value = ".")]
    dir: PathBuf,
    #[arg(long, default_value = "file")]
    prefix: String,
    #[arg(long, default_value_t = 1_000_000)]
    n_items: usize,
    /// Shrink the backing file to the final length before reporting.
    #[arg(long, default_value_t = false)]
    trim: bool,
    /// Delete the last backing file on exit instead of leaving it for inspection.
    #[arg(long, default_value_t = false)]
    delete_on_drop: bool,
    #[arg(long)]
    stats_path: Option<PathBuf>,
    #[arg(long)]
    stats_threshold: Option<usize>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    let drop_policy = if args.delete_on_drop {
        DropPolicy::Delete
    } else {
        DropPolicy::Keep
    };
    let config = BackingConfig::new(&args.dir)
        .with_prefix(args.prefix.clone())
        .with_drop_policy(drop_policy);

    println!("sizeof(item): {}B", size_of::<u64>());
    println!("# items: {}", args.n_items);

    let mut array = DiskArray::<u64>::new(config);
    let mut n_remaps = 0;
    let mut pbar = tqdm!(total = args.n_items);
    for idx in 0..args.n_items {
        let capacity = array.capacity();
        array.push_back(idx as u64)?;
        if array.capacity() != capacity {
            n_remaps += 1;
        }
        let _ = pbar.update(1);

        if let Some(stats_threshold) = args.stats_threshold {
            if stats_threshold > 0 && (idx + 1) % stats_threshold == 0 {
                let stats = FillStats::from_array(&array, n_remaps, pbar.elapsed_time());
                pbar.set_description(format!("fill: {:.2}", stats.get_fill_ratio()));
                if let Some(ref stats_path) = args.stats_path {
                    stats.append_to_jsonl(stats_path)?;
                }
            }
        }
    }
    eprintln!();

    println!("Verifying...");
    for (idx, item) in tqdm!(array.iter()).enumerate() {
        ensure!(*item == idx as u64, "item {} holds {}", idx, item);
    }
    eprintln!();

    if args.trim {
        let capacity = array.capacity();
        array.trim()?;
        if array.capacity() != capacity {
            n_remaps += 1;
        }
        tracing::info!(from = capacity, to = array.capacity(), "trimmed DiskArray");
    }

    let stats = FillStats::from_array(&array, n_remaps, pbar.elapsed_time());
    tracing::info!(
        n_items = stats.n_items,
        capacity = stats.capacity,
        n_bytes = stats.n_bytes,
        n_remaps = stats.n_remaps,
        path = ?array.path(),
        "filled DiskArray"
    );
    if let Some(ref stats_path) = args.stats_path {
        stats.append_to_jsonl(stats_path)?;
    }
    Ok(())
}
