mod common;

use std::path::Path;
use std::sync::Arc;

use common::*;
use road_report_server::report::archive;
use road_report_server::report::calculation::{CalculationParams, Calculator, ResultFileCalculator};
use road_report_server::report::catalog::ReportId;
use road_report_server::report::export::html;
use road_report_server::report::export::watermark::WatermarkSpec;
use road_report_server::report::report_type::{ReportFormat, ReportType};
use road_report_server::ReportError;

const NATIONAL_ID: &str = "普通国省干线抽检路段公路技术状况监管分析报告_1700000000";

fn write_template(config_root: &Path, name: &str, content: &[u8]) {
    let path = config_root.join("templates").join(name);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

#[tokio::test]
async fn test_national_provincial_markdown_with_extra() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let images_dir = ReportType::NationalProvincial.image_source_dir(&config.reports_dir);

    let state = test_state(
        config.clone(),
        Arc::new(StaticCalculator::new(result_json(
            r#"{"MQI": 92.31, "ROAD_COUNT": 14, "IMAGES": ["trend.png"], "EXTRA_IMAGES": ["extra.png"]}"#,
        ))),
    );
    std::fs::write(images_dir.join("trend.png"), b"png-1").unwrap();
    std::fs::write(images_dir.join("extra.png"), b"png-2").unwrap();
    write_template(
        dir.path(),
        "国省干线JSON模板.md",
        "# 报告\n指标: MQI, roads: ROAD_COUNT\n![t](trend.png)\n".as_bytes(),
    );
    write_template(
        dir.path(),
        "国省干线JSON模板_extra.md",
        "extra MQI\n![e](extra.png)\n".as_bytes(),
    );

    let result = state
        .calculator
        .compute(ReportType::NationalProvincial, &[], CalculationParams::default())
        .await
        .unwrap();
    let report = state
        .materializer
        .materialize(ReportType::NationalProvincial, ReportFormat::Markdown, &result, 1_700_000_000)
        .unwrap();

    assert_eq!(report.id, NATIONAL_ID);
    assert_eq!(report.filename, format!("{}.md", NATIONAL_ID));

    let report_dir = config.reports_dir.join(NATIONAL_ID);
    let body = std::fs::read_to_string(report_dir.join(format!("{}.md", NATIONAL_ID))).unwrap();
    assert!(body.contains("指标: 92.31, roads: 14"));
    assert!(body.contains("http://test.local/file?name="));
    assert!(!body.contains("](trend.png)"));
    assert_eq!(std::fs::read(report_dir.join("images/trend.png")).unwrap(), b"png-1");

    let extra_name = "普通国省干线抽检路段公路技术状况监管分析报告_extra_1700000000.md";
    let extra = std::fs::read_to_string(report_dir.join(extra_name)).unwrap();
    assert!(extra.starts_with("extra 92.31"));
    assert_eq!(report.extra.as_deref(), Some(report_dir.join(extra_name).as_path()));

    // Listing shows the primary document only.
    assert_eq!(state.catalog.list(ReportFormat::Markdown).unwrap(), vec![NATIONAL_ID]);

    let resolved = state
        .catalog
        .resolve_extra(&format!("{}.md", NATIONAL_ID))
        .unwrap();
    assert_eq!(resolved.filename, extra_name);

    let pdf = state.exporter.export(NATIONAL_ID, None).await.unwrap();
    assert_eq!(pdf.filename, format!("{}.pdf", NATIONAL_ID));
    assert_eq!(pdf.bytes, html::printable_html(&body).into_bytes());

    state
        .catalog
        .delete(&ReportId::parse(NATIONAL_ID).unwrap())
        .unwrap();
    assert!(!report_dir.exists());
    assert!(state.catalog.list(ReportFormat::Markdown).unwrap().is_empty());
}

#[tokio::test]
async fn test_docx_generation_binds_images_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let state = test_state(
        config.clone(),
        Arc::new(StaticCalculator::new(result_json(
            r#"{"ROAD_NAME": "G6 <京藏>", "IMAGES": ["a.png", "b.png"]}"#,
        ))),
    );
    let images_dir = ReportType::Market.image_source_dir(&config.reports_dir);
    std::fs::write(images_dir.join("a.png"), b"first").unwrap();
    std::fs::write(images_dir.join("b.png"), b"second").unwrap();
    write_template(
        dir.path(),
        "市场化JSON模板.docx",
        &docx_bytes("<w:t>ROAD_NAME</w:t>", &["image1.jpeg", "image2.jpeg"]),
    );

    let result = state
        .calculator
        .compute(ReportType::Market, &[], CalculationParams::default())
        .await
        .unwrap();
    let report = state
        .materializer
        .materialize(ReportType::Market, ReportFormat::Docx, &result, 42)
        .unwrap();
    assert!(report.extra.is_none());

    let bytes = std::fs::read(&report.path).unwrap();
    assert_eq!(
        read_zip_entry(&bytes, "word/document.xml"),
        "<w:t>G6 &lt;京藏&gt;</w:t>".as_bytes()
    );
    assert_eq!(read_zip_entry(&bytes, "word/media/image1.jpeg"), b"first");
    assert_eq!(read_zip_entry(&bytes, "word/media/image2.jpeg"), b"second");
}

#[tokio::test]
async fn test_missing_primary_template_fails_generation() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let state = test_state(
        config,
        Arc::new(StaticCalculator::new(result_json(r#"{"A": 1}"#))),
    );
    let result = result_json(r#"{"A": 1}"#);
    let err = state
        .materializer
        .materialize(ReportType::Rural, ReportFormat::Markdown, &result, 7)
        .unwrap_err();
    assert!(matches!(err, ReportError::Template { .. }));
}

#[tokio::test]
async fn test_result_file_calculator_reads_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    road_report_server::db::prepare_directories(&config).unwrap();
    let artifact = ReportType::PostEvaluation.result_artifact_path(&config.reports_dir);
    std::fs::write(&artifact, r#"{"PQI": 88.5, "IMAGES": null}"#).unwrap();

    let calculator = ResultFileCalculator::new(&config.reports_dir);
    let result = calculator
        .compute(ReportType::PostEvaluation, &[], CalculationParams::default())
        .await
        .unwrap();
    assert_eq!(result.values["PQI"], "88.5");
    assert!(result.images.is_empty());

    let err = calculator
        .compute(ReportType::Construction, &[], CalculationParams::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ReportError::MalformedOutput(_)));
}

#[test]
fn test_archive_extraction_rejects_traversal() {
    let dir = tempfile::tempdir().unwrap();
    let archive_path = dir.path().join("upload.zip");
    std::fs::write(
        &archive_path,
        zip_bytes(&[("ok.xlsx", &b"1"[..]), ("../escape.xlsx", &b"2"[..])]),
    )
    .unwrap();

    let err = archive::extract_file(&archive_path, &dir.path().join("out")).unwrap_err();
    assert!(matches!(err, ReportError::PathTraversal(_)));
    assert!(!dir.path().join("escape.xlsx").exists());
}

#[cfg(unix)]
#[tokio::test]
async fn test_watermarked_export() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    let pdf_path = dir.path().join("fixture.pdf");
    std::fs::write(&pdf_path, pdf_bytes(2)).unwrap();
    config.pdf_renderer = "sh".into();
    config.pdf_renderer_args = vec![
        "-c".to_string(),
        format!("cat > /dev/null; cat '{}'", pdf_path.display()),
    ];
    let state = test_state(
        config.clone(),
        Arc::new(StaticCalculator::new(result_json("{}"))),
    );
    let report_dir = config.reports_dir.join("R_5");
    std::fs::create_dir_all(&report_dir).unwrap();
    std::fs::write(report_dir.join("R_5.md"), "body").unwrap();

    let spec = WatermarkSpec {
        content: "内部资料".to_string(),
        color: "#ff0000".to_string(),
        opacity: 30.0,
        font_size: 20.0,
        angle: 45.0,
    };
    let out = state.exporter.export("R_5", Some(spec)).await.unwrap();
    let original = pdf_bytes(2);
    assert_ne!(out.bytes, original);

    let doc = lopdf::Document::load_mem(&out.bytes).unwrap();
    assert_eq!(doc.get_pages().len(), 2);
}
