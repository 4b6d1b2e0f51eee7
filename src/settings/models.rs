use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Yearly provincial targets, keyed by `year`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProvinceSetting {
    pub year: i32,
    #[serde(default)]
    pub expressway: f64,
    #[serde(default)]
    pub national_highway: f64,
    #[serde(default)]
    pub provincial_highway: f64,
    #[serde(default)]
    pub rural_road: f64,
}

/// Ministry targets for a plan period, keyed by `plan`.
///
/// The pavement index fields are named `pqi*`; older clients send `poi*`,
/// which is accepted on input.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct NationalSetting {
    pub plan: String,
    pub mqi_excellent: f64,
    #[serde(alias = "poiExcellent")]
    pub pqi_excellent: f64,
    pub bridge_rate: f64,
    pub recycle_rate: f64,
    pub national_mqi_east: f64,
    pub national_mqi_central: f64,
    pub national_mqi_west: f64,
    #[serde(alias = "nationalPoiEast")]
    pub national_pqi_east: f64,
    #[serde(alias = "nationalPoiCentral")]
    pub national_pqi_central: f64,
    #[serde(alias = "nationalPoiWest")]
    pub national_pqi_west: f64,
    pub provincial_mqi_east: f64,
    pub provincial_mqi_central: f64,
    pub provincial_mqi_west: f64,
    #[serde(alias = "provincialPoiEast")]
    pub provincial_pqi_east: f64,
    #[serde(alias = "provincialPoiCentral")]
    pub provincial_pqi_central: f64,
    #[serde(alias = "provincialPoiWest")]
    pub provincial_pqi_west: f64,
    pub rural_mqi: f64,
    pub maintenance_rate: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct Road {
    pub name: String,
}
