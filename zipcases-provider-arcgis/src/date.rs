use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use reqwest::Client;
use tracing::{debug, info};

use zipcases_core::{
    model::{DateLabel, RegionMeta},
    ports::{DateResolver, PortError},
};

use crate::fetch_text;

// The layer page renders e.g. `<b>Last Edit Date:</b> 4/16/2020 10:31:29 PM<br/>`.
static LAST_EDIT_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<b>Last Edit Date:</b>(.*?)<br/>").expect("last edit date pattern is valid")
});

const LAST_EDIT_FORMAT: &str = "%m/%d/%Y %I:%M:%S %p";

/// Resolves the data date from a layer's last edit time, or today's date when
/// the region has no layer page.
pub struct ArcGisDateResolver {
    client: Client,
    meta: RegionMeta,
    overview_url: Option<String>,
}

impl ArcGisDateResolver {
    /// Create a resolver bound to the given HTTP client.
    #[must_use]
    pub fn new(client: Client, meta: RegionMeta, overview_url: Option<String>) -> Self {
        Self {
            client,
            meta,
            overview_url: overview_url.filter(|url| !url.trim().is_empty()),
        }
    }
}

#[async_trait]
impl DateResolver for ArcGisDateResolver {
    fn region(&self) -> &RegionMeta {
        &self.meta
    }

    async fn resolve(&self) -> Result<DateLabel, PortError> {
        let Some(url) = self.overview_url.as_deref() else {
            info!(region = %self.meta.name, "no update date available, using today as the date");
            return Ok(DateLabel::from(Local::now().date_naive()));
        };

        let page = fetch_text(self.client.get(url)).await?;
        let edited = parse_last_edit_date(&page)?;
        debug!(region = %self.meta.name, utc = %edited, "layer last edited");

        let local = Utc.from_utc_datetime(&edited).with_timezone(&Local);
        Ok(DateLabel::from(local.date_naive()))
    }
}

/// Extract the UTC last edit time from a layer description page.
///
/// # Errors
///
/// Returns [`PortError::MissingLastEditDate`] when the page has no such entry,
/// or [`PortError::Parse`] when the timestamp is malformed.
pub fn parse_last_edit_date(page: &str) -> Result<NaiveDateTime, PortError> {
    let raw = LAST_EDIT_DATE
        .captures(page)
        .and_then(|captures| captures.get(1))
        .ok_or(PortError::MissingLastEditDate)?
        .as_str()
        .trim();

    NaiveDateTime::parse_from_str(raw, LAST_EDIT_FORMAT).map_err(PortError::from)
}
