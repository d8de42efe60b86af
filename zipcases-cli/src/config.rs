//! Batch configuration: data directory, HTTP identity, and the region table.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use zipcases_core::model::RegionSource;

/// Global configuration, optionally loaded from a TOML file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct ZipcasesConfig {
    /// Directory the region tables live in.
    pub data_dir: PathBuf,
    /// User agent sent with every request.
    pub user_agent: String,
    /// Regions in batch order.
    pub regions: Vec<RegionSource>,
}

impl Default for ZipcasesConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("processed_data/cases/US"),
            user_agent: String::from("zipcases/0.1"),
            regions: default_regions(),
        }
    }
}

impl ZipcasesConfig {
    /// Load from `path`, or use the built-in defaults when no path is given.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let cfg: Self =
            toml::from_str(&data).with_context(|| format!("parsing config {}", path.display()))?;
        Ok(cfg)
    }
}

fn region(
    file: &str,
    overview_url: &str,
    data_url: &str,
    zip_field: &str,
    case_field: &str,
) -> RegionSource {
    RegionSource {
        name: String::new(),
        file: file.to_owned(),
        overview_url: Some(overview_url.to_owned()).filter(|url| !url.is_empty()),
        data_url: data_url.to_owned(),
        zip_field: zip_field.to_owned(),
        case_field: case_field.to_owned(),
    }
}

/// Regions collected when no configuration file is given.
pub(crate) fn default_regions() -> Vec<RegionSource> {
    vec![
        region(
            "sarpy-nebraska_cases.csv",
            "https://services.arcgis.com/OiG7dbwhQEWoy77N/arcgis/rest/services/SarpyCassCOVID_View/FeatureServer/0",
            "https://services.arcgis.com/OiG7dbwhQEWoy77N/arcgis/rest/services/SarpyCassCOVID_View/FeatureServer/0/query?f=json&where=1%3D1&returnGeometry=false&outFields=ZipCode,Cases&orderByFields=ZipCode",
            "ZipCode",
            "Cases",
        ),
        region(
            "douglas-nebraska_cases.csv",
            "https://services.arcgis.com/pDAi2YK0L0QxVJHj/arcgis/rest/services/COVID19_Cases_by_ZIP_(View)/FeatureServer/0",
            "https://services.arcgis.com/pDAi2YK0L0QxVJHj/arcgis/rest/services/COVID19_Cases_by_ZIP_(View)/FeatureServer/0/query?f=json&where=1%3D1&returnGeometry=false&outFields=*",
            "ZipCode",
            "Cases",
        ),
        region(
            "spokane-washington_cases.csv",
            "https://services7.arcgis.com/Zrf5IrTQfEv8XhMg/arcgis/rest/services/Covid_Cases_by_Zipcode/FeatureServer/0",
            "https://services7.arcgis.com/Zrf5IrTQfEv8XhMg/arcgis/rest/services/Covid_Cases_by_Zipcode/FeatureServer/0/query?f=json&where=ZIP_RATE%3E0&returnGeometry=false&outFields=ZCTA5CE10,N&orderByFields=ZCTA5CE10",
            "ZCTA5CE10",
            "N",
        ),
        // The query drops zip codes outside Washtenaw.
        region(
            "washtenaw-michigan_cases.csv",
            "https://services2.arcgis.com/xRI3cTw3hPVoEJP0/ArcGIS/rest/services/Join_COVID_Data_(View)_to_Washtenaw_County_Zip_Codes_(cut)/FeatureServer/0",
            "https://services2.arcgis.com/xRI3cTw3hPVoEJP0/ArcGIS/rest/services/Join_COVID_Data_(View)_to_Washtenaw_County_Zip_Codes_(cut)/FeatureServer/0/query?f=json&where=ZCTA5CE10%3C%3E48111+AND+ZCTA5CE10%3C%3E48169+AND+ZCTA5CE10%3C49240&returnGeometry=false&outFields=zip,frequency&orderByFields=zip",
            "zip",
            "frequency",
        ),
        region(
            "st.-louis-missouri_cases.csv",
            "",
            "https://maps6.stlouis-mo.gov/arcgis/rest/services/HEALTH/COVID19_CASES_BY_ZIPCODE/MapServer/1/query?f=json&where=1%3D1&returnGeometry=false&outFields=ZCTA5CE10,Cases&orderByFields=ZCTA5CE10",
            "ZCTA5CE10",
            "Cases",
        ),
        region(
            "arizona_cases.csv",
            "https://services1.arcgis.com/mpVYz37anSdrK4d8/ArcGIS/rest/services/CVD_ZIPS_FORWEBMAP/FeatureServer/0",
            "https://services1.arcgis.com/mpVYz37anSdrK4d8/ArcGIS/rest/services/CVD_ZIPS_FORWEBMAP/FeatureServer/0/query?f=json&where=1%3D1&returnGeometry=false&outFields=POSTCODE,ConfirmedCaseCount&orderByFields=POSTCODE",
            "POSTCODE",
            "ConfirmedCaseCount",
        ),
        region(
            "pennsylvania_cases.csv",
            "https://services2.arcgis.com/xtuWQvb2YQnp0z3F/ArcGIS/rest/services/Zip_Code_COVID19_Case_Data/FeatureServer/0",
            "https://services2.arcgis.com/xtuWQvb2YQnp0z3F/ArcGIS/rest/services/Zip_Code_COVID19_Case_Data/FeatureServer/0/query?f=json&where=1%3D1&returnGeometry=false&outFields=ZIP_CODE,Positive&orderByFields=ZIP_CODE",
            "ZIP_CODE",
            "Positive",
        ),
    ]
}
