//! Load command implementation

use anyhow::{bail, Context, Result};
use std::path::Path;

use crate::pipeline::{FileOutcome, Pipeline, PipelineOptions, RunSummary};
use crate::source::SourceKind;
use crate::store::WarehouseStore;

/// Load the catalog directory first, then the log directory.
/// Either may be skipped, but not both.
pub fn run(
    store: &mut WarehouseStore,
    options: PipelineOptions,
    catalog_dir: Option<&Path>,
    log_dir: Option<&Path>,
) -> Result<()> {
    if catalog_dir.is_none() && log_dir.is_none() {
        bail!("Nothing to load: set sources.catalog_dir / sources.log_dir or pass a directory");
    }

    let mut pipeline = Pipeline::new(store, options);
    let mut summaries = vec![];

    // Log events are matched against the catalog, so it must be loaded first
    if let Some(dir) = catalog_dir {
        summaries.push(load_dir(&mut pipeline, dir, SourceKind::Catalog)?);
    }
    if let Some(dir) = log_dir {
        summaries.push(load_dir(&mut pipeline, dir, SourceKind::Log)?);
    }

    println!();
    for summary in &summaries {
        print_summary(summary);
    }

    if summaries.iter().all(|s| s.failures.is_empty()) {
        println!("✅ Load complete!");
    }
    Ok(())
}

fn load_dir(pipeline: &mut Pipeline<'_>, dir: &Path, kind: SourceKind) -> Result<RunSummary> {
    println!("📂 Loading {} files from {}", kind.as_str(), dir.display());

    pipeline
        .process_dir(dir, kind, |progress| {
            if let FileOutcome::Failed { reason } = progress.outcome {
                println!("   ✗ {}: {}", progress.path.display(), reason);
            }
            println!("{}/{} files processed.", progress.processed, progress.total);
        })
        .with_context(|| format!("Failed to load {} directory {}", kind.as_str(), dir.display()))
}

fn print_summary(summary: &RunSummary) {
    println!(
        "{:<8} {} attempted, {} succeeded, {} failed, {} rows written ({})",
        summary.kind.as_str(),
        summary.attempted,
        summary.succeeded,
        summary.failed(),
        summary.rows_loaded,
        summary.root.display()
    );

    for failure in &summary.failures {
        println!("   ✗ {}: {}", failure.path.display(), failure.reason);
    }
}
