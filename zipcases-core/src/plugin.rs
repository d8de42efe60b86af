//! Registry for all region plugins and their ports.

use std::sync::Arc;

use crate::model::{RegionId, RegionMeta};
use crate::ports::{CaseCountFetcher, DateResolver, PortError};

/// Collection of ports implementing a provider for a single region.
pub struct RegionPlugin {
    /// Static metadata describing the region.
    pub meta: RegionMeta,
    /// Table file name inside the data directory.
    pub file_name: String,
    /// Implementation for resolving the data date.
    pub date_resolver: Arc<dyn DateResolver>,
    /// Implementation for fetching case counts.
    pub case_fetcher: Arc<dyn CaseCountFetcher>,
}

/// Registry that keeps plugins in batch order.
pub struct PluginRegistry {
    plugins: Vec<RegionPlugin>,
}

impl PluginRegistry {
    /// Build a registry from the provided plugin list.
    #[must_use]
    pub fn new(plugins: Vec<RegionPlugin>) -> Self {
        Self { plugins }
    }

    /// Return metadata for all registered regions.
    #[must_use]
    pub fn regions(&self) -> Vec<RegionMeta> {
        self.plugins
            .iter()
            .map(|plugin| plugin.meta.clone())
            .collect()
    }

    /// Iterator over plugins in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &RegionPlugin> {
        self.plugins.iter()
    }

    /// Whether no region is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Keep only the plugins matching `keep`.
    pub fn retain(&mut self, keep: impl FnMut(&RegionPlugin) -> bool) {
        self.plugins.retain(keep);
    }

    /// Look up a plugin for the given region.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::UnsupportedRegion`] when no plugin is registered.
    pub fn plugin(&self, region: &RegionId) -> Result<&RegionPlugin, PortError> {
        self.plugins
            .iter()
            .find(|plugin| &plugin.meta.id == region)
            .ok_or(PortError::UnsupportedRegion)
    }
}
