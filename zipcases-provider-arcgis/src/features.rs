use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use zipcases_core::{
    model::{CaseValue, Observation, RegionMeta},
    ports::{CaseCountFetcher, PortError},
};

use crate::fetch_json;

/// Query response; only the feature attributes are of interest.
#[derive(Debug, Deserialize)]
struct FeatureSet {
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    attributes: Option<Map<String, Value>>,
}

/// Fetches per-zip case counts from a feature layer query.
pub struct ArcGisCaseFetcher {
    client: Client,
    meta: RegionMeta,
    data_url: String,
    zip_field: String,
    case_field: String,
}

impl ArcGisCaseFetcher {
    /// Create a fetcher bound to the given HTTP client.
    #[must_use]
    pub fn new(
        client: Client,
        meta: RegionMeta,
        data_url: String,
        zip_field: String,
        case_field: String,
    ) -> Self {
        Self {
            client,
            meta,
            data_url,
            zip_field,
            case_field,
        }
    }
}

#[async_trait]
impl CaseCountFetcher for ArcGisCaseFetcher {
    fn region(&self) -> &RegionMeta {
        &self.meta
    }

    async fn fetch(&self) -> Result<Vec<Observation>, PortError> {
        let payload = fetch_json::<Value>(self.client.get(&self.data_url)).await?;
        let observations = observations_from_payload(payload, &self.zip_field, &self.case_field)?;
        debug!(
            region = %self.meta.name,
            count = observations.len(),
            "fetched zip code counts"
        );
        Ok(observations)
    }
}

/// Map a feature layer query response to observations, in feature order.
///
/// Features whose zip code is null are skipped. Counts go through the usual
/// substitutions: suppressed or negative values become `NA`, and strings that
/// are not integers are kept as text.
///
/// # Errors
///
/// Returns [`PortError::MissingFeatures`] when there is no `features` list and
/// [`PortError::MissingAttribute`] when a feature lacks a configured field.
pub fn observations_from_payload(
    payload: Value,
    zip_field: &str,
    case_field: &str,
) -> Result<Vec<Observation>, PortError> {
    let set: FeatureSet =
        serde_json::from_value(payload).map_err(|_err| PortError::MissingFeatures)?;

    let mut observations = Vec::with_capacity(set.features.len());
    for feature in set.features {
        let attributes = feature
            .attributes
            .ok_or_else(|| PortError::MissingAttribute("attributes".to_owned()))?;
        let zip = attributes
            .get(zip_field)
            .ok_or_else(|| PortError::MissingAttribute(zip_field.to_owned()))?;
        let cases = attributes
            .get(case_field)
            .ok_or_else(|| PortError::MissingAttribute(case_field.to_owned()))?;

        if let Some(zip) = zip_text(zip) {
            observations.push(Observation::new(zip, case_value(cases)));
        }
    }
    Ok(observations)
}

fn zip_text(raw: &Value) -> Option<String> {
    match raw {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(
            number
                .as_i64()
                .map(|int| int.to_string())
                .or_else(|| number.as_u64().map(|int| int.to_string()))
                .unwrap_or_else(|| number.to_string()),
        ),
        other => Some(other.to_string()),
    }
}

#[expect(clippy::cast_possible_truncation, reason = "counts are truncated like an integer cast")]
fn case_value(raw: &Value) -> CaseValue {
    match raw {
        Value::Null => CaseValue::Na,
        Value::String(text) => CaseValue::from_raw_text(text),
        Value::Number(number) => {
            if let Some(count) = number.as_i64() {
                CaseValue::from_count(count)
            } else if let Some(count) = number.as_u64() {
                CaseValue::Count(count)
            } else {
                number
                    .as_f64()
                    .map_or(CaseValue::Na, |count| CaseValue::from_count(count.trunc() as i64))
            }
        }
        other => CaseValue::Text(other.to_string()),
    }
}
