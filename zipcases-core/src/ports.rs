//! Traits describing provider capabilities and their error type.

use async_trait::async_trait;
use chrono::ParseError as ChronoParseError;
use reqwest::Error as ReqwestError;

use crate::model::{DateLabel, Observation, RegionMeta};

#[derive(thiserror::Error, Debug)]
/// Errors that can occur while talking to provider backends.
pub enum PortError {
    /// Network layer failed or the body could not be decoded.
    #[error("HTTP error: {0}")]
    Http(#[from] ReqwestError),
    /// Failed to parse a date from the provider response.
    #[error("Parse error: {0}")]
    Parse(#[from] ChronoParseError),
    /// The payload carries no `features` list.
    #[error("could not extract 'features' field from JSON")]
    MissingFeatures,
    /// A feature lacks its `attributes` object.
    #[error("missing attribute: {0}")]
    MissingAttribute(String),
    /// The layer description page has no last edit date.
    #[error("could not find the last edit date")]
    MissingLastEditDate,
    /// The region has no registered plugin.
    #[error("Unsupported region")]
    UnsupportedRegion,
}

#[async_trait]
/// Trait for backends that tell which date fetched counts belong to.
pub trait DateResolver: Send + Sync {
    /// Metadata describing the region handled by this port.
    fn region(&self) -> &RegionMeta;

    /// Date label to stamp today's counts with.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the provider request fails or carries no date.
    async fn resolve(&self) -> Result<DateLabel, PortError>;
}

#[async_trait]
/// Trait for backends returning per-zip case counts.
pub trait CaseCountFetcher: Send + Sync {
    /// Metadata describing the region handled by this port.
    fn region(&self) -> &RegionMeta;

    /// Fetch the current counts in source order.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the provider request fails or the payload
    /// lacks the expected structure.
    async fn fetch(&self) -> Result<Vec<Observation>, PortError>;
}
