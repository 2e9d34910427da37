//! Per-file load loop
//!
//! Files are processed one at a time in discovery order. Each file is parsed,
//! transformed and written inside its own transaction; a file that fails is
//! rolled back, logged and recorded, and the run moves on to the next one.

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::ResolverStrategy;
use crate::error::{EtlError, Result};
use crate::source::{self, log::parse_log_file, CatalogRecord, SourceKind};
use crate::store::WarehouseStore;
use crate::transform::{build_dimensions, playback_events, resolve_facts, CatalogIndex};

/// Pipeline settings
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// File name pattern, e.g. `*.json`
    pub pattern: String,
    pub resolver: ResolverStrategy,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            pattern: source::DEFAULT_PATTERN.to_string(),
            resolver: ResolverStrategy::default(),
        }
    }
}

/// Outcome of one source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Loaded { rows: usize },
    Failed { reason: String },
}

/// Reported after every file
#[derive(Debug)]
pub struct Progress<'a> {
    pub processed: usize,
    pub total: usize,
    pub path: &'a Path,
    pub outcome: &'a FileOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Totals for one directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub root: PathBuf,
    pub kind: SourceKind,
    pub attempted: usize,
    pub succeeded: usize,
    pub rows_loaded: usize,
    pub failures: Vec<FileFailure>,
}

impl RunSummary {
    fn new(root: &Path, kind: SourceKind) -> Self {
        Self {
            root: root.to_path_buf(),
            kind,
            attempted: 0,
            succeeded: 0,
            rows_loaded: 0,
            failures: vec![],
        }
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

pub struct Pipeline<'s> {
    store: &'s mut WarehouseStore,
    options: PipelineOptions,
    index: Option<CatalogIndex>,
}

impl<'s> Pipeline<'s> {
    pub fn new(store: &'s mut WarehouseStore, options: PipelineOptions) -> Self {
        Self {
            store,
            options,
            index: None,
        }
    }

    /// Load every matching file under `root`.
    ///
    /// Only discovery errors are returned; per-file failures end up in the
    /// summary. `on_progress` runs after each file.
    pub fn process_dir<F>(
        &mut self,
        root: &Path,
        kind: SourceKind,
        mut on_progress: F,
    ) -> Result<RunSummary>
    where
        F: FnMut(&Progress<'_>),
    {
        let files = source::locate_files(root, &self.options.pattern)?;
        let total = files.len();
        info!("{} files found in {}", total, root.display());

        let mut summary = RunSummary::new(root, kind);

        for (i, path) in files.iter().enumerate() {
            summary.attempted += 1;

            let outcome = match self.process_file(path, kind) {
                Ok(rows) => {
                    debug!("Loaded {} rows from {}", rows, path.display());
                    summary.succeeded += 1;
                    summary.rows_loaded += rows;
                    FileOutcome::Loaded { rows }
                }
                Err(e) if e.is_per_file() => {
                    warn!("Skipping {}: {}", path.display(), e);
                    summary.failures.push(FileFailure {
                        path: path.clone(),
                        reason: e.to_string(),
                    });
                    FileOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
                Err(e) => return Err(e),
            };

            self.record(path, kind, &outcome);

            on_progress(&Progress {
                processed: i + 1,
                total,
                path: path.as_path(),
                outcome: &outcome,
            });
        }

        info!(
            "{} {} files: {} loaded, {} failed",
            summary.attempted,
            kind.as_str(),
            summary.succeeded,
            summary.failed()
        );

        Ok(summary)
    }

    /// Load one file atomically, returning the number of rows written
    pub fn process_file(&mut self, path: &Path, kind: SourceKind) -> Result<usize> {
        match kind {
            SourceKind::Catalog => self.load_catalog_file(path),
            SourceKind::Log => self.load_log_file(path),
        }
    }

    fn load_catalog_file(&mut self, path: &Path) -> Result<usize> {
        let record = CatalogRecord::from_file(path)?;

        let mut batch = self.store.begin()?;
        batch.upsert_catalog_record(&record)?;
        let rows = batch.commit()?;

        // Catalog changed, rebuild the index before the next log file
        self.index = None;
        Ok(rows)
    }

    fn load_log_file(&mut self, path: &Path) -> Result<usize> {
        let events = parse_log_file(path)?;
        let playbacks = playback_events(&events).map_err(|field| {
            EtlError::parse(path, None, format!("playback event has no valid '{}'", field))
        })?;
        debug!(
            "{}: {} events, {} playbacks",
            path.display(),
            events.len(),
            playbacks.len()
        );

        if self.options.resolver == ResolverStrategy::Index && self.index.is_none() {
            let index = self.store.catalog_index()?;
            debug!("Indexed {} catalog songs", index.len());
            self.index = Some(index);
        }

        let dimensions = build_dimensions(&playbacks);

        let mut batch = self.store.begin()?;
        for time in &dimensions.times {
            batch.upsert_time(time)?;
        }
        for user in &dimensions.users {
            batch.upsert_user(user)?;
        }

        let facts = match &self.index {
            Some(index) => resolve_facts(&playbacks, index)?,
            None => resolve_facts(&playbacks, &batch)?,
        };
        for fact in &facts {
            batch.insert_songplay(fact)?;
        }

        batch.commit()
    }

    fn record(&self, path: &Path, kind: SourceKind, outcome: &FileOutcome) {
        let result = match outcome {
            FileOutcome::Loaded { rows } => self.store.record_load(path, kind, *rows, None),
            FileOutcome::Failed { reason } => {
                self.store
                    .record_load(path, kind, 0, Some(reason.as_str()))
            }
        };

        if let Err(e) = result {
            warn!("Could not record load history for {}: {}", path.display(), e);
        }
    }
}
