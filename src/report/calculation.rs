//! Calculation Bridge: turns extracted survey files into a [`CalculationResult`].

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use log::{error, info};
use serde_json::Value;

use crate::error::ReportError;
use crate::report::process::run_tool;
use crate::report::report_type::ReportType;

pub const IMAGES_KEY: &str = "IMAGES";
pub const EXTRA_IMAGES_KEY: &str = "EXTRA_IMAGES";

/// Numeric inputs forwarded to the computation program.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CalculationParams {
    pub pqi: f64,
    pub mileage: f64,
}

/// Normalized computation output: placeholder values plus two ordered image lists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalculationResult {
    pub values: BTreeMap<String, String>,
    pub images: Vec<String>,
    pub extra_images: Vec<String>,
}

impl CalculationResult {
    pub fn from_json(value: Value) -> Result<Self, ReportError> {
        let Value::Object(map) = value else {
            return Err(ReportError::MalformedOutput(
                "expected a JSON object".to_string(),
            ));
        };

        let mut result = CalculationResult::default();
        for (key, value) in map {
            match key.as_str() {
                IMAGES_KEY => result.images = image_list(&key, value)?,
                EXTRA_IMAGES_KEY => result.extra_images = image_list(&key, value)?,
                _ => {
                    result.values.insert(key, scalar_to_string(&value));
                }
            }
        }
        Ok(result)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, ReportError> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| ReportError::MalformedOutput(e.to_string()))?;
        Self::from_json(value)
    }
}

fn image_list(key: &str, value: Value) -> Result<Vec<String>, ReportError> {
    match value {
        Value::Array(items) => Ok(items.iter().map(scalar_to_string).collect()),
        Value::Null => Ok(Vec::new()),
        other => Err(ReportError::MalformedOutput(format!(
            "{} must be an array, got {}",
            key, other
        ))),
    }
}

/// String form used for substitution. Whole floats print without a fraction.
pub fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                n.as_f64().map(|f| f.to_string()).unwrap_or_default()
            }
        }
        other => other.to_string(),
    }
}

#[async_trait]
pub trait Calculator: Send + Sync {
    async fn compute(
        &self,
        report_type: ReportType,
        files: &[String],
        params: CalculationParams,
    ) -> Result<CalculationResult, ReportError>;
}

/// Runs `<program dir>/<program id><suffix>` and parses its stdout.
pub struct ProgramCalculator {
    program_dir: PathBuf,
    suffix: String,
    timeout: Duration,
}

impl ProgramCalculator {
    pub fn new(program_dir: impl Into<PathBuf>, suffix: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program_dir: program_dir.into(),
            suffix: suffix.into(),
            timeout,
        }
    }

    pub fn program_path(&self, report_type: ReportType) -> PathBuf {
        self.program_dir
            .join(format!("{}{}", report_type.program_id(), self.suffix))
    }

    pub fn arguments(files: &[String], params: CalculationParams) -> Vec<String> {
        vec![
            "-files".to_string(),
            files.join(" "),
            "-pqi".to_string(),
            format!("{:.2}", params.pqi),
            "-d".to_string(),
            format!("{:.2}", params.mileage),
        ]
    }
}

#[async_trait]
impl Calculator for ProgramCalculator {
    async fn compute(
        &self,
        report_type: ReportType,
        files: &[String],
        params: CalculationParams,
    ) -> Result<CalculationResult, ReportError> {
        let program = self.program_path(report_type);
        info!("Running computation program {:?} on {} files", program, files.len());
        let output = run_tool(
            &program,
            Self::arguments(files, params),
            None,
            self.timeout,
        )
        .await?;

        CalculationResult::from_slice(&output.stdout).map_err(|e| {
            error!(
                "Failed to parse output of {:?}: {}\nraw output: {}",
                program,
                e,
                String::from_utf8_lossy(&output.stdout)
            );
            e
        })
    }
}

/// Offline backend: reads the `result.json` the program left in the type's data dir.
pub struct ResultFileCalculator {
    reports_dir: PathBuf,
}

impl ResultFileCalculator {
    pub fn new(reports_dir: impl Into<PathBuf>) -> Self {
        Self {
            reports_dir: reports_dir.into(),
        }
    }
}

#[async_trait]
impl Calculator for ResultFileCalculator {
    async fn compute(
        &self,
        report_type: ReportType,
        files: &[String],
        _params: CalculationParams,
    ) -> Result<CalculationResult, ReportError> {
        let path = report_type.result_artifact_path(&self.reports_dir);
        info!(
            "Reading static result {:?} for {} ({} input files)",
            path,
            report_type,
            files.len()
        );
        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            error!("Failed to read {:?}: {}", path, e);
            ReportError::MalformedOutput(format!("result artifact {:?} unreadable: {}", path, e))
        })?;
        CalculationResult::from_slice(&bytes).map_err(|e| {
            error!("Failed to parse {:?}: {}", path, e);
            e
        })
    }
}
