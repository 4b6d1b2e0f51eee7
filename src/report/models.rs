use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::report::export::watermark::WatermarkSpec;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UnzipResponse {
    /// Extracted (or saved) input file paths in upload order.
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CalculateRequest {
    #[serde(default)]
    pub files: Vec<String>,
    #[schema(example = "NATIONAL_PROVINCIAL")]
    pub report_type: String,
    #[serde(default)]
    pub mileage: f64,
    #[serde(default)]
    pub pqi: f64,
    /// Unix seconds; the current time when omitted.
    #[serde(default)]
    pub timestamp: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CalculateResponse {
    pub message: String,
    pub filename: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListQuery {
    /// `md` or `docx`; the configured storage format by default.
    pub format: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct WatermarkQuery {
    pub wm_content: Option<String>,
    pub wm_color: Option<String>,
    /// Percentage, 0-100.
    pub wm_opacity: Option<f32>,
    pub wm_font_size: Option<f32>,
    pub wm_angle: Option<f32>,
}

impl WatermarkQuery {
    pub fn into_spec(self) -> Option<WatermarkSpec> {
        let spec = WatermarkSpec {
            content: self.wm_content.unwrap_or_default(),
            color: self.wm_color.unwrap_or_default(),
            opacity: self.wm_opacity.unwrap_or(0.0),
            font_size: self.wm_font_size.unwrap_or(0.0),
            angle: self.wm_angle.unwrap_or(0.0),
        };
        spec.is_active().then_some(spec)
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct FileQuery {
    /// Path relative to the report store, e.g. `<report id>/images/a.png`.
    pub name: String,
}
