//! High-level service running the daily update for every region.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::model::{DateLabel, RegionId, RegionMeta};
use crate::plugin::{PluginRegistry, RegionPlugin};
use crate::ports::PortError;
use crate::store::{self, StoreError};
use crate::table::{self, MergeMode, TableError};

#[derive(thiserror::Error, Debug)]
/// Reasons a region's update was abandoned before writing.
pub enum UpdateError {
    /// The date or the counts could not be fetched.
    #[error("fetch failed: {0}")]
    Fetch(#[from] PortError),
    /// The merged table was not rectangular.
    #[error("data failed to update: {0}")]
    Consistency(#[from] TableError),
    /// The table file could not be read or written.
    #[error("storage failed: {0}")]
    Store(#[from] StoreError),
}

/// Summary of a successful region update.
#[derive(Debug, Clone)]
pub struct RegionUpdate {
    /// Region that was updated.
    pub region: RegionId,
    /// Date the counts were stored under.
    pub date: DateLabel,
    /// Whether a column was appended or replaced.
    pub mode: MergeMode,
    /// Zip code rows in the written table.
    pub rows: usize,
    /// Zip codes seen for the first time.
    pub new_zips: usize,
    /// Known zip codes filled with `NA` for the date.
    pub missing_zips: usize,
    /// File that was written.
    pub path: PathBuf,
}

/// Outcome of a batch over all registered regions.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Regions written successfully, in batch order.
    pub succeeded: Vec<RegionUpdate>,
    /// Regions that failed with the rendered error.
    pub failed: Vec<(RegionId, String)>,
}

impl BatchReport {
    /// Whether every region was updated.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Public entry point for updating region tables.
pub struct ZipcasesService {
    registry: Arc<PluginRegistry>,
    data_dir: PathBuf,
}

impl ZipcasesService {
    /// Create a new service writing tables below `data_dir`.
    #[must_use]
    pub fn new(registry: Arc<PluginRegistry>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            data_dir: data_dir.into(),
        }
    }

    /// Directory holding the region tables.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// List all registered regions.
    #[must_use]
    pub fn regions(&self) -> Vec<RegionMeta> {
        self.registry.regions()
    }

    /// Update a single region by id.
    ///
    /// # Errors
    ///
    /// Returns an [`UpdateError`] if the region is unknown or its update fails.
    pub async fn update(&self, region: &RegionId) -> Result<RegionUpdate, UpdateError> {
        let plugin = self.registry.plugin(region)?;
        self.update_region(plugin).await
    }

    /// Fetch today's counts for a region and rewrite its table.
    ///
    /// Every failure happens before the file is touched.
    ///
    /// # Errors
    ///
    /// Returns an [`UpdateError`] when fetching, merging, or storing fails.
    pub async fn update_region(&self, plugin: &RegionPlugin) -> Result<RegionUpdate, UpdateError> {
        let region = &plugin.meta.name;

        let date = plugin.date_resolver.resolve().await?;
        let observations = plugin.case_fetcher.fetch().await?;

        let path = self.data_dir.join(&plugin.file_name);
        let existing = store::read_table(&path)?;
        if existing.is_none() {
            info!(region = %region, path = %path.display(), "creating csv file");
        }

        let outcome = table::merge(existing.as_ref(), &date, &observations).inspect_err(|err| {
            if let TableError::Inconsistent { zip, .. } = err {
                error!(region = %region, zip = %zip, "inconsistent number of data points");
            }
        })?;

        if outcome.mode == MergeMode::Overwrite {
            warn!(
                region = %region,
                date = %date,
                "data has already been updated for this date, overwriting it with recently fetched data"
            );
        }
        for zip in &outcome.duplicate_zips {
            warn!(region = %region, zip = %zip, "zip code reported more than once, keeping the last value");
        }

        store::write_table(&path, &outcome.table)?;

        let update = RegionUpdate {
            region: plugin.meta.id.clone(),
            date,
            mode: outcome.mode,
            rows: outcome.table.rows().len(),
            new_zips: outcome.new_zips.len(),
            missing_zips: outcome.missing_zips.len(),
            path,
        };
        info!(
            region = %region,
            date = %update.date,
            rows = update.rows,
            new_zips = update.new_zips,
            missing_zips = update.missing_zips,
            "finished scraping data"
        );
        Ok(update)
    }

    /// Update every registered region in order, continuing past failures.
    pub async fn run_batch(&self) -> BatchReport {
        let mut report = BatchReport::default();

        for plugin in self.registry.iter() {
            match self.update_region(plugin).await {
                Ok(update) => report.succeeded.push(update),
                Err(err) => {
                    error!(region = %plugin.meta.name, error = %err, "region update failed");
                    report.failed.push((plugin.meta.id.clone(), err.to_string()));
                }
            }
        }

        report
    }
}
