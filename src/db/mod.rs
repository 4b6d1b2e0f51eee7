//! Application state: the explicitly constructed dependency container.
//!
//! - `settings` - SQLite settings store

mod settings;

pub use settings::SqliteSettingsStore;

use std::sync::Arc;

use anyhow::{bail, Context};

use crate::config::{AppConfig, CalculatorMode};
use crate::report::calculation::{Calculator, ProgramCalculator, ResultFileCalculator};
use crate::report::catalog::ReportCatalog;
use crate::report::export::renderer::HtmlRenderer;
use crate::report::export::watermark::Watermarker;
use crate::report::export::PdfExporter;
use crate::report::report_type::ReportType;
use crate::report::template::TemplateMaterializer;
use crate::settings::SettingsStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub settings: Arc<dyn SettingsStore>,
    pub calculator: Arc<dyn Calculator>,
    pub catalog: ReportCatalog,
    pub materializer: TemplateMaterializer,
    pub exporter: PdfExporter,
}

impl AppState {
    /// Connect the settings database, pick the calculator backend and lay out
    /// the working directories.
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        let settings = SqliteSettingsStore::connect(&config.database_url)
            .await
            .with_context(|| format!("failed to open settings database {}", config.database_url))?;

        let calculator: Arc<dyn Calculator> = match config.calculator_mode {
            CalculatorMode::Program => {
                let Some(dir) = config.program_dir.clone() else {
                    bail!("CALCULATOR_PROGRAM_DIR must be set when CALCULATOR_MODE=program");
                };
                Arc::new(ProgramCalculator::new(
                    dir,
                    config.program_suffix.clone(),
                    config.calculation_timeout,
                ))
            }
            CalculatorMode::ResultFile => Arc::new(ResultFileCalculator::new(&config.reports_dir)),
        };

        prepare_directories(&config)?;
        log::info!(
            "Report store at {:?}, calculator mode {:?}",
            config.reports_dir,
            config.calculator_mode
        );

        Ok(Self::with_components(config, Arc::new(settings), calculator))
    }

    /// Assemble state from injected collaborators; pipeline components are
    /// derived from `config`.
    pub fn with_components(
        config: AppConfig,
        settings: Arc<dyn SettingsStore>,
        calculator: Arc<dyn Calculator>,
    ) -> Self {
        let catalog = ReportCatalog::new(&config.reports_dir, config.report_format);
        let materializer = TemplateMaterializer::new(
            &config.templates_dir,
            &config.reports_dir,
            config.public_base_url.clone(),
        );
        let exporter = PdfExporter::new(
            catalog.clone(),
            HtmlRenderer::new(
                &config.pdf_renderer,
                config.pdf_renderer_args.clone(),
                config.render_timeout,
            ),
            Watermarker::new(config.watermark_font.clone(), &config.pdf_tmp_dir),
        );

        AppState {
            config: Arc::new(config),
            settings,
            calculator,
            catalog,
            materializer,
            exporter,
        }
    }
}

/// Create the upload, scratch, report and per-type image directories.
pub fn prepare_directories(config: &AppConfig) -> anyhow::Result<()> {
    let mut dirs = vec![
        config.reports_dir.clone(),
        config.upload_dir.clone(),
        config.pdf_tmp_dir.clone(),
    ];
    dirs.extend(
        ReportType::ALL
            .iter()
            .map(|rt| rt.image_source_dir(&config.reports_dir)),
    );
    for dir in dirs {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create directory {:?}", dir))?;
    }
    Ok(())
}
