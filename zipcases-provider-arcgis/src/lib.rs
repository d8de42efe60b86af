//! Provider implementation for COVID-19 case counts published as Esri ArcGIS
//! feature layers.
//!
//! Each region is described by a [`RegionSource`]: the layer description page
//! carries the last edit date, and a query URL returns one feature per zip code.

mod date;
mod features;

use std::sync::Arc;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

use zipcases_core::{model::RegionSource, plugin::RegionPlugin, ports::PortError};

pub use date::{ArcGisDateResolver, parse_last_edit_date};
pub use features::{ArcGisCaseFetcher, observations_from_payload};

/// Build the plugin bundle for one ArcGIS-backed region.
#[must_use]
pub fn plugin(client: Client, source: &RegionSource) -> RegionPlugin {
    let meta = source.meta();
    let date_resolver = Arc::new(ArcGisDateResolver::new(
        client.clone(),
        meta.clone(),
        source.overview_url.clone(),
    ));
    let case_fetcher = Arc::new(ArcGisCaseFetcher::new(
        client,
        meta.clone(),
        source.data_url.clone(),
        source.zip_field.clone(),
        source.case_field.clone(),
    ));

    RegionPlugin {
        meta,
        file_name: source.file.clone(),
        date_resolver,
        case_fetcher,
    }
}

// Small helper to fetch and decode JSON with status handling.
async fn fetch_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, PortError> {
    req.send()
        .await
        .map_err(PortError::from)?
        .error_for_status()
        .map_err(PortError::from)?
        .json()
        .await
        .map_err(PortError::from)
}

async fn fetch_text(req: RequestBuilder) -> Result<String, PortError> {
    req.send()
        .await
        .map_err(PortError::from)?
        .error_for_status()
        .map_err(PortError::from)?
        .text()
        .await
        .map_err(PortError::from)
}
