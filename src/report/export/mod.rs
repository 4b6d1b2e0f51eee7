//! PDF Exporter: stored markdown → HTML → external renderer → optional watermark.

pub mod html;
pub mod renderer;
pub mod watermark;

use log::{error, info};

use crate::error::ReportError;
use crate::report::catalog::{ReportCatalog, ReportId};
use crate::report::report_type::ReportFormat;
use renderer::HtmlRenderer;
use watermark::{WatermarkSpec, Watermarker};

/// A finished export: download name plus PDF bytes.
#[derive(Debug)]
pub struct ExportedPdf {
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct PdfExporter {
    catalog: ReportCatalog,
    renderer: HtmlRenderer,
    watermarker: Watermarker,
}

impl PdfExporter {
    pub fn new(catalog: ReportCatalog, renderer: HtmlRenderer, watermarker: Watermarker) -> Self {
        Self {
            catalog,
            renderer,
            watermarker,
        }
    }

    pub async fn export(
        &self,
        raw_id: &str,
        watermark: Option<WatermarkSpec>,
    ) -> Result<ExportedPdf, ReportError> {
        let id = ReportId::parse(raw_id)?;
        let source = self.catalog.document_path(&id, ReportFormat::Markdown)?;

        let meta = tokio::fs::metadata(&source).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ReportError::NotFound(format!("report file '{}.md'", id.as_str()))
            } else {
                ReportError::io("stat", &source, e)
            }
        })?;
        if !meta.is_file() {
            return Err(ReportError::InvalidIdentifier(format!(
                "{} is not a regular file",
                id.as_str()
            )));
        }

        let markdown = tokio::fs::read_to_string(&source)
            .await
            .map_err(|e| ReportError::io("read", &source, e))?;
        let pdf = self.renderer.render(html::printable_html(&markdown)).await?;

        let bytes = match watermark.filter(WatermarkSpec::is_active) {
            Some(spec) => {
                let watermarker = self.watermarker.clone();
                tokio::task::spawn_blocking(move || watermarker.apply(&pdf, &spec))
                    .await
                    .map_err(|e| {
                        error!("Watermark task for {} failed: {}", id.as_str(), e);
                        ReportError::Task(e.to_string())
                    })??
            }
            None => pdf,
        };

        info!("Exported {} as PDF ({} bytes)", id.as_str(), bytes.len());
        Ok(ExportedPdf {
            filename: format!("{}.pdf", id.as_str()),
            bytes,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    fn exporter(root: &std::path::Path) -> PdfExporter {
        PdfExporter::new(
            ReportCatalog::new(root, ReportFormat::Markdown),
            HtmlRenderer::new("cat", vec!["-".to_string()], Duration::from_secs(5)),
            Watermarker::new("STSong-Light", root.join("tmp")),
        )
    }

    #[tokio::test]
    async fn test_plain_export_returns_renderer_output() {
        let dir = tempfile::tempdir().unwrap();
        let report_dir = dir.path().join("R_1");
        std::fs::create_dir_all(&report_dir).unwrap();
        std::fs::write(report_dir.join("R_1.md"), "# Title").unwrap();

        let out = exporter(dir.path()).export("R_1.md", None).await.unwrap();
        assert_eq!(out.filename, "R_1.pdf");
        assert_eq!(out.bytes, html::printable_html("# Title").into_bytes());
    }

    #[tokio::test]
    async fn test_empty_watermark_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let report_dir = dir.path().join("R_2");
        std::fs::create_dir_all(&report_dir).unwrap();
        std::fs::write(report_dir.join("R_2.md"), "text").unwrap();

        let spec = WatermarkSpec {
            content: "  ".to_string(),
            ..Default::default()
        };
        let out = exporter(dir.path()).export("R_2", Some(spec)).await.unwrap();
        assert_eq!(out.bytes, html::printable_html("text").into_bytes());
    }

    #[tokio::test]
    async fn test_missing_report_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = exporter(dir.path()).export("nope_1", None).await.unwrap_err();
        assert!(matches!(err, ReportError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_traversal_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = exporter(dir.path()).export("../x_1.md", None).await.unwrap_err();
        assert!(matches!(err, ReportError::InvalidIdentifier(_)));
    }
}
