//! Entry point for the splitvar command line tool.
//! Parses arguments, configures logging and the thread pool, then either
//! reports dependencies or runs the split.

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use splitvar::dependencies::invert;
use splitvar::metadata::{dependency_report_json, print_dependency_report};
use splitvar::parallel::{get_parallel_info, ParallelConfig};
use splitvar::splitter::{dependency_map, prepare_dataset, split_dataset};
use std::fs;

mod cli;

use cli::Args;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    ParallelConfig::new(args.threads).setup_global_pool()?;
    get_parallel_info().log_info();

    let config = args.to_config();
    let ds = prepare_dataset(&config).context("failed to open input files")?;

    if args.list_deps || args.dump_deps.is_some() {
        let map = dependency_map(&ds, &config)?;
        let inverse = invert(&map);
        if args.list_deps {
            print_dependency_report(&map, &inverse);
        }
        if let Some(path) = &args.dump_deps {
            let report = serde_json::to_string_pretty(&dependency_report_json(&map, &inverse))?;
            fs::write(path, report).with_context(|| format!("failed to write {}", path.display()))?;
            info!("Dependencies written to {}", path.display());
        }
        return Ok(());
    }

    let summary = split_dataset(&ds, &config)?;
    for (name, chunks) in &summary.chunks {
        println!("{name}: {chunks} file(s)");
    }
    println!("✅ Wrote {} file(s) to {}", summary.total_chunks(), config.output_dir.display());

    Ok(())
}
