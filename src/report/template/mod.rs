//! Template Materializer: binds a [`CalculationResult`] into a report template
//! and stores the result under `<reports>/<title>_<timestamp>/`.

pub mod docx;
pub mod markdown;
pub mod substitution;

use std::fs;
use std::path::{Path, PathBuf};

use log::{error, info, warn};

use crate::error::ReportError;
use crate::report::calculation::CalculationResult;
use crate::report::report_type::{ReportFormat, ReportType};
use docx::DocxPackage;

/// Directory/file stem of a report: `<title>_<timestamp>`.
pub fn report_id(report_type: ReportType, timestamp: i64) -> String {
    format!("{}_{}", report_type.title(), timestamp)
}

pub fn extra_report_stem(report_type: ReportType, timestamp: i64) -> String {
    format!("{}_extra_{}", report_type.title(), timestamp)
}

/// Outcome of a successful materialization.
#[derive(Debug, Clone)]
pub struct MaterializedReport {
    pub id: String,
    pub filename: String,
    pub path: PathBuf,
    pub extra: Option<PathBuf>,
}

enum Variant {
    Primary,
    Extra,
}

#[derive(Debug, Clone)]
pub struct TemplateMaterializer {
    templates_dir: PathBuf,
    reports_dir: PathBuf,
    public_base_url: String,
}

impl TemplateMaterializer {
    pub fn new(
        templates_dir: impl Into<PathBuf>,
        reports_dir: impl Into<PathBuf>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            templates_dir: templates_dir.into(),
            reports_dir: reports_dir.into(),
            public_base_url: public_base_url.into(),
        }
    }

    /// Write the primary document and, for extra-capable types, its companion.
    ///
    /// Only the primary document decides success; a failing extra variant is logged.
    pub fn materialize(
        &self,
        report_type: ReportType,
        format: ReportFormat,
        result: &CalculationResult,
        timestamp: i64,
    ) -> Result<MaterializedReport, ReportError> {
        let id = report_id(report_type, timestamp);
        let report_dir = self.reports_dir.join(&id);
        let images_dir = report_dir.join("images");
        fs::create_dir_all(&images_dir).map_err(|e| {
            error!("Failed to create report directory {:?}: {}", images_dir, e);
            ReportError::io("create directory", &images_dir, e)
        })?;

        let filename = format!("{}.{}", id, format.extension());
        let path = report_dir.join(&filename);
        self.render_variant(report_type, format, result, &id, &path, Variant::Primary)?;
        info!("{} report generated: {:?}", format, path);

        let extra = if report_type.supports_extra() {
            let extra_path = report_dir.join(format!(
                "{}.{}",
                extra_report_stem(report_type, timestamp),
                format.extension()
            ));
            match self.render_variant(report_type, format, result, &id, &extra_path, Variant::Extra) {
                Ok(()) => {
                    info!("Extra {} report generated: {:?}", format, extra_path);
                    Some(extra_path)
                }
                Err(e) => {
                    warn!("Extra report for {} not generated: {}", id, e);
                    None
                }
            }
        } else {
            None
        };

        Ok(MaterializedReport {
            id,
            filename,
            path,
            extra,
        })
    }

    fn render_variant(
        &self,
        report_type: ReportType,
        format: ReportFormat,
        result: &CalculationResult,
        id: &str,
        output: &Path,
        variant: Variant,
    ) -> Result<(), ReportError> {
        let (template, images) = match variant {
            Variant::Primary => (
                report_type.template_path(&self.templates_dir, format),
                &result.images,
            ),
            Variant::Extra => (
                report_type.extra_template_path(&self.templates_dir, format),
                &result.extra_images,
            ),
        };

        let images_dir = output
            .parent()
            .map(|p| p.join("images"))
            .unwrap_or_else(|| PathBuf::from("images"));
        self.copy_images(report_type, images, &images_dir);

        let rendered = match format {
            ReportFormat::Docx => {
                let mut doc = DocxPackage::open(&template)?;
                doc.substitute_text(&result.values)?;
                bind_images(&mut doc, images, &images_dir);
                doc.write_to(output)
            }
            ReportFormat::Markdown => {
                let body = fs::read_to_string(&template).map_err(|source| ReportError::Template {
                    path: template.clone(),
                    source,
                })?;
                let content =
                    markdown::render(&body, &result.values, images, id, &self.public_base_url)
                        .map_err(|e| ReportError::InvalidTemplate {
                            path: template.clone(),
                            reason: e.to_string(),
                        })?;
                fs::write(output, content).map_err(|e| ReportError::io("write", output, e))
            }
        };
        rendered.map_err(|e| {
            error!("Failed to render {:?} from {:?}: {}", output, template, e);
            e
        })
    }

    /// Copy the named images from the type's source directory. Missing images are logged.
    fn copy_images(&self, report_type: ReportType, images: &[String], dest_dir: &Path) {
        let source_dir = report_type.image_source_dir(&self.reports_dir);
        for image in images {
            let Some(name) = Path::new(image).file_name() else {
                warn!("Skipping image with no file name: {:?}", image);
                continue;
            };
            let from = source_dir.join(name);
            let to = dest_dir.join(name);
            if let Err(e) = fs::copy(&from, &to) {
                error!("Failed to copy image {:?} -> {:?}: {}", from, to, e);
            }
        }
    }
}

/// Slot `i` takes the `i`-th listed image. Slots past the template's media count
/// or images that cannot be read are left untouched.
fn bind_images(doc: &mut DocxPackage, images: &[String], images_dir: &Path) {
    let slots = doc.media_count();
    if images.len() > slots {
        warn!(
            "{} images supplied but template has only {} slots",
            images.len(),
            slots
        );
    }
    for (i, image) in images.iter().take(slots).enumerate() {
        let Some(name) = Path::new(image).file_name() else {
            continue;
        };
        let path = images_dir.join(name);
        match fs::read(&path) {
            Ok(bytes) => {
                if !doc.replace_image_slot(i + 1, bytes) {
                    warn!("Template has no image slot {} for {:?}", i + 1, path);
                }
            }
            Err(e) => error!("Failed to bind image {:?} to slot {}: {}", path, i + 1, e),
        }
    }
}
