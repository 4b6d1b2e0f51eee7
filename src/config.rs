//! Runtime configuration loaded from the environment (and `.env`).

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::report::report_type::ReportFormat;

/// Which backend turns survey files into a calculation result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalculatorMode {
    /// Run the per-type computation program and parse its stdout.
    Program,
    /// Read the `result.json` artifact the program left in the type's data dir.
    ResultFile,
}

impl FromStr for CalculatorMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "program" | "subprocess" => Ok(Self::Program),
            "result_file" | "result-file" | "file" => Ok(Self::ResultFile),
            other => Err(format!("unknown calculator mode '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub reports_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub pdf_tmp_dir: PathBuf,
    pub templates_dir: PathBuf,
    pub database_url: String,
    pub pdf_renderer: PathBuf,
    pub pdf_renderer_args: Vec<String>,
    pub calculator_mode: CalculatorMode,
    pub program_dir: Option<PathBuf>,
    pub program_suffix: String,
    pub calculation_timeout: Duration,
    pub render_timeout: Duration,
    pub public_base_url: String,
    pub watermark_font: String,
    pub max_upload_bytes: usize,
    pub report_format: ReportFormat,
    pub cors_allowed_origins: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 12345,
            reports_dir: PathBuf::from("./reports"),
            upload_dir: PathBuf::from("./tmp/uploads"),
            pdf_tmp_dir: PathBuf::from("./tmp/pdf"),
            templates_dir: PathBuf::from("./templates"),
            database_url: "sqlite://road.db".to_string(),
            pdf_renderer: PathBuf::from("./wkhtmltox/bin/wkhtmltopdf"),
            pdf_renderer_args: vec!["-".to_string(), "-".to_string()],
            calculator_mode: CalculatorMode::ResultFile,
            program_dir: None,
            program_suffix: String::new(),
            calculation_timeout: Duration::from_secs(600),
            render_timeout: Duration::from_secs(120),
            public_base_url: "http://127.0.0.1:12345".to_string(),
            watermark_font: "STSong-Light".to_string(),
            max_upload_bytes: 1024 * 1024 * 1024,
            report_format: ReportFormat::Markdown,
            cors_allowed_origins: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load `.env` (if any) and read the process environment.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = get("SERVER_HOST").unwrap_or(defaults.host);
        let port = parse_or(&get, "SERVER_PORT", defaults.port);
        let reports_dir = get("REPORTS_DIR").map(PathBuf::from).unwrap_or(defaults.reports_dir);
        let upload_dir = get("UPLOAD_DIR").map(PathBuf::from).unwrap_or(defaults.upload_dir);
        let pdf_tmp_dir = get("PDF_TMP_DIR").map(PathBuf::from).unwrap_or(defaults.pdf_tmp_dir);
        let templates_dir = get("TEMPLATES_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.templates_dir);
        let database_url = get("DATABASE_URL").unwrap_or_else(|| {
            log::warn!(
                "DATABASE_URL not set, using default: {}",
                defaults.database_url
            );
            defaults.database_url
        });
        let pdf_renderer = get("PDF_RENDERER").map(PathBuf::from).unwrap_or(defaults.pdf_renderer);
        let pdf_renderer_args = get("PDF_RENDERER_ARGS")
            .map(|v| v.split_whitespace().map(str::to_string).collect())
            .unwrap_or(defaults.pdf_renderer_args);
        let calculator_mode = parse_or(&get, "CALCULATOR_MODE", defaults.calculator_mode);
        let program_dir = get("CALCULATOR_PROGRAM_DIR").map(PathBuf::from);
        let program_suffix = lookup("PROGRAM_SUFFIX").unwrap_or(defaults.program_suffix);
        let calculation_timeout = Duration::from_secs(parse_or(
            &get,
            "CALCULATION_TIMEOUT_SECS",
            defaults.calculation_timeout.as_secs(),
        ));
        let render_timeout = Duration::from_secs(parse_or(
            &get,
            "RENDER_TIMEOUT_SECS",
            defaults.render_timeout.as_secs(),
        ));
        let public_base_url = get("PUBLIC_BASE_URL")
            .map(|v| v.trim_end_matches('/').to_string())
            .unwrap_or(defaults.public_base_url);
        let watermark_font = get("WATERMARK_FONT").unwrap_or(defaults.watermark_font);
        let max_upload_bytes = parse_or(&get, "MAX_UPLOAD_BYTES", defaults.max_upload_bytes);
        let report_format = parse_or(&get, "REPORT_FORMAT", defaults.report_format);
        let cors_allowed_origins = get("CORS_ALLOWED_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            host,
            port,
            reports_dir,
            upload_dir,
            pdf_tmp_dir,
            templates_dir,
            database_url,
            pdf_renderer,
            pdf_renderer_args,
            calculator_mode,
            program_dir,
            program_suffix,
            calculation_timeout,
            render_timeout,
            public_base_url,
            watermark_font,
            max_upload_bytes,
            report_format,
            cors_allowed_origins,
        }
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|e| {
            log::warn!("Ignoring invalid {}='{}': {}", key, raw, e);
            default
        }),
        None => default,
    }
}
