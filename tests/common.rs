#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use road_report_server::config::AppConfig;
use road_report_server::report::calculation::{CalculationParams, CalculationResult, Calculator};
use road_report_server::report::report_type::{ReportFormat, ReportType};
use road_report_server::settings::{SettingsKind, SettingsStore};
use road_report_server::{AppState, ReportError};
use serde_json::Value;
use tokio::sync::Mutex;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// In-memory settings store.
#[derive(Default)]
pub struct MemorySettingsStore {
    values: Mutex<HashMap<(SettingsKind, String), Value>>,
    roads: Mutex<Vec<String>>,
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn get(&self, kind: SettingsKind, key: &str) -> Result<Option<Value>, ReportError> {
        Ok(self.values.lock().await.get(&(kind, key.to_string())).cloned())
    }

    async fn save(&self, kind: SettingsKind, key: &str, value: Value) -> Result<(), ReportError> {
        self.values.lock().await.insert((kind, key.to_string()), value);
        Ok(())
    }

    async fn roads(&self) -> Result<Vec<String>, ReportError> {
        Ok(self.roads.lock().await.clone())
    }

    async fn add_road(&self, name: &str) -> Result<bool, ReportError> {
        let mut roads = self.roads.lock().await;
        if roads.iter().any(|r| r == name) {
            return Ok(false);
        }
        roads.push(name.to_string());
        Ok(true)
    }
}

/// Calculator returning a fixed result and recording what it was asked.
pub struct StaticCalculator {
    pub result: CalculationResult,
    pub calls: Mutex<Vec<(ReportType, Vec<String>, CalculationParams)>>,
}

impl StaticCalculator {
    pub fn new(result: CalculationResult) -> Self {
        Self {
            result,
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Calculator for StaticCalculator {
    async fn compute(
        &self,
        report_type: ReportType,
        files: &[String],
        params: CalculationParams,
    ) -> Result<CalculationResult, ReportError> {
        self.calls
            .lock()
            .await
            .push((report_type, files.to_vec(), params));
        Ok(self.result.clone())
    }
}

/// Config rooted in `root` with `cat` standing in for the HTML renderer.
pub fn test_config(root: &Path) -> AppConfig {
    AppConfig {
        reports_dir: root.join("reports"),
        upload_dir: root.join("tmp/uploads"),
        pdf_tmp_dir: root.join("tmp/pdf"),
        templates_dir: root.join("templates"),
        database_url: "sqlite::memory:".to_string(),
        pdf_renderer: "cat".into(),
        pdf_renderer_args: vec!["-".to_string()],
        render_timeout: Duration::from_secs(10),
        public_base_url: "http://test.local".to_string(),
        report_format: ReportFormat::Markdown,
        ..AppConfig::default()
    }
}

pub fn test_state(config: AppConfig, calculator: Arc<dyn Calculator>) -> AppState {
    road_report_server::db::prepare_directories(&config).unwrap();
    std::fs::create_dir_all(&config.templates_dir).unwrap();
    AppState::with_components(config, Arc::new(MemorySettingsStore::default()), calculator)
}

pub fn result_json(json: &str) -> CalculationResult {
    CalculationResult::from_slice(json.as_bytes()).unwrap()
}

pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, data) in entries {
        if name.ends_with('/') {
            writer.add_directory(*name, options).unwrap();
        } else {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
    }
    writer.finish().unwrap().into_inner()
}

/// Minimal rich-text container: a body part plus numbered media placeholders.
pub fn docx_bytes(body: &str, media: &[&str]) -> Vec<u8> {
    let mut entries: Vec<(String, Vec<u8>)> = vec![
        ("[Content_Types].xml".to_string(), b"<Types/>".to_vec()),
        ("word/document.xml".to_string(), body.as_bytes().to_vec()),
    ];
    for name in media {
        entries.push((format!("word/media/{}", name), b"placeholder".to_vec()));
    }
    let borrowed: Vec<(&str, &[u8])> = entries
        .iter()
        .map(|(n, d)| (n.as_str(), d.as_slice()))
        .collect();
    zip_bytes(&borrowed)
}

pub fn read_zip_entry(bytes: &[u8], name: &str) -> Vec<u8> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut entry = archive.by_name(name).unwrap();
    let mut out = Vec::new();
    std::io::copy(&mut entry, &mut out).unwrap();
    out
}

pub fn pdf_bytes(pages: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.4");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::new();
    for _ in 0..pages {
        let content = Content {
            operations: vec![Operation::new("BT", vec![]), Operation::new("ET", vec![])],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

/// Build a multipart/form-data body with one file field per `(field, filename, bytes)`.
pub fn multipart_body(boundary: &str, files: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (field, filename, data) in files {
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                field, filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
    body
}
