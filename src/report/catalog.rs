//! Report Catalog: the on-disk naming convention plus list/delete/resolve.
//!
//! Layout: `<reports>/<title>_<ts>/{<title>_<ts>.<ext>, <title>_extra_<ts>.<ext>, images/}`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use log::{debug, error, info, warn};
use regex::Regex;

use crate::error::ReportError;
use crate::report::paths;
use crate::report::report_type::{ReportFormat, ReportType};

lazy_static! {
    static ref TRAILING_TIMESTAMP: Regex = Regex::new(r"_(\d+)$").unwrap();
}

/// Timestamp from the trailing `_<digits>` of an identifier, 0 when absent.
pub fn extract_timestamp(id: &str) -> i64 {
    TRAILING_TIMESTAMP
        .captures(id)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

/// Validated report identifier (`<title>_<timestamp>`), optionally carrying the
/// document format named by a trailing extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportId {
    stem: String,
    format: Option<ReportFormat>,
}

impl ReportId {
    pub fn parse(raw: &str) -> Result<Self, ReportError> {
        let raw = raw.trim();
        let invalid = || ReportError::InvalidIdentifier(raw.to_string());

        let (stem, format) = match raw.rsplit_once('.') {
            Some((stem, ext)) => match ext.to_ascii_lowercase().as_str() {
                "pdf" => (stem, None),
                other => match ReportFormat::from_extension(other) {
                    Some(format) => (stem, Some(format)),
                    None => return Err(invalid()),
                },
            },
            None => (raw, None),
        };

        if stem.is_empty()
            || stem.contains(['/', '\\', '\0'])
            || stem.contains("..")
            || ReportType::ALL.iter().any(|t| t.data_dir() == stem)
        {
            return Err(invalid());
        }

        Ok(Self {
            stem: stem.to_string(),
            format,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.stem
    }

    pub fn format(&self) -> Option<ReportFormat> {
        self.format
    }

    pub fn timestamp(&self) -> i64 {
        extract_timestamp(&self.stem)
    }
}

/// An extra companion document located on disk.
#[derive(Debug, Clone)]
pub struct ExtraDocument {
    pub report_type: ReportType,
    pub filename: String,
    pub path: PathBuf,
    pub format: ReportFormat,
}

#[derive(Debug, Clone)]
pub struct ReportCatalog {
    root: PathBuf,
    default_format: ReportFormat,
}

impl ReportCatalog {
    pub fn new(root: impl Into<PathBuf>, default_format: ReportFormat) -> Self {
        Self {
            root: root.into(),
            default_format,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn default_format(&self) -> ReportFormat {
        self.default_format
    }

    fn report_dir(&self, id: &ReportId) -> Result<PathBuf, ReportError> {
        paths::join_strictly_inside(&self.root, Path::new(id.as_str()))
            .ok_or_else(|| ReportError::OutsideStore(id.as_str().to_string()))
    }

    /// `<root>/<id>/<id>.<ext>`, checked to stay inside the store.
    pub fn document_path(&self, id: &ReportId, format: ReportFormat) -> Result<PathBuf, ReportError> {
        let dir = self.report_dir(id)?;
        Ok(dir.join(format!("{}.{}", id.as_str(), format.extension())))
    }

    /// Identifiers of stored primary documents, newest first.
    pub fn list(&self, format: ReportFormat) -> Result<Vec<String>, ReportError> {
        let mut ids = Vec::new();
        match collect_documents(&self.root, format, &mut ids) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Report store {:?} does not exist yet", self.root);
            }
            Err(e) => {
                error!("Failed to walk report store {:?}: {}", self.root, e);
                return Err(ReportError::io("list", &self.root, e));
            }
        }
        sort_newest_first(&mut ids);
        Ok(ids)
    }

    /// Remove a report's directory. Missing reports are not an error.
    pub fn delete(&self, id: &ReportId) -> Result<(), ReportError> {
        let dir = self.report_dir(id)?;
        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                info!("Report directory deleted: {:?}", dir);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Report directory {:?} already absent", dir);
                Ok(())
            }
            Err(e) => {
                error!("Failed to delete report directory {:?}: {}", dir, e);
                Err(ReportError::io("delete", &dir, e))
            }
        }
    }

    /// Existing regular file for the primary document of `id`.
    pub fn primary_document(&self, id: &ReportId) -> Result<(PathBuf, ReportFormat), ReportError> {
        let format = id.format().unwrap_or(self.default_format);
        let path = self.document_path(id, format)?;
        ensure_regular_file(&path, id.as_str())?;
        Ok((path, format))
    }

    /// Locate the `<title>_extra_<ts>` companion of a primary document file name.
    pub fn resolve_extra(&self, filename: &str) -> Result<ExtraDocument, ReportError> {
        let id = ReportId::parse(filename)?;
        let format = id.format().unwrap_or(self.default_format);
        let (title, timestamp) = id
            .as_str()
            .rsplit_once('_')
            .filter(|(title, ts)| !title.is_empty() && !ts.is_empty())
            .ok_or_else(|| ReportError::InvalidIdentifier(filename.to_string()))?;

        let report_type = ReportType::from_title(title).ok_or_else(|| {
            warn!("Cannot infer report type from {:?}", filename);
            ReportError::UnknownReportType(title.to_string())
        })?;
        if !report_type.supports_extra() {
            warn!(
                "Extra export requested for unsupported type {} ({})",
                report_type, filename
            );
            return Err(ReportError::ExtraNotSupported(report_type.to_string()));
        }

        let extra_filename = format!("{}_extra_{}.{}", title, timestamp, format.extension());
        let path = self.report_dir(&id)?.join(&extra_filename);
        if !path.is_file() {
            error!("Requested extra document {:?} does not exist", path);
            return Err(ReportError::NotFound(format!("extra document {}", extra_filename)));
        }

        Ok(ExtraDocument {
            report_type,
            filename: extra_filename,
            path,
            format,
        })
    }

    /// Any regular file under the store root (embedded images, report bodies).
    pub fn resolve_file(&self, name: &str) -> Result<PathBuf, ReportError> {
        let path = paths::join_strictly_inside(&self.root, Path::new(name))
            .ok_or_else(|| ReportError::OutsideStore(name.to_string()))?;
        ensure_regular_file(&path, name)?;
        Ok(path)
    }
}

fn ensure_regular_file(path: &Path, label: &str) -> Result<(), ReportError> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() => Ok(()),
        Ok(_) => Err(ReportError::InvalidIdentifier(format!(
            "{} is not a regular file",
            label
        ))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(ReportError::NotFound(format!("report file '{}'", label)))
        }
        Err(e) => Err(ReportError::io("stat", path, e)),
    }
}

fn collect_documents(dir: &Path, format: ReportFormat, out: &mut Vec<String>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            if entry.file_name() == "images" {
                continue;
            }
            collect_documents(&path, format, out)?;
            continue;
        }
        if !file_type.is_file() {
            continue;
        }
        let is_document = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case(format.extension()))
            .unwrap_or(false);
        if !is_document {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            if !stem.contains("_extra") {
                out.push(stem.to_string());
            }
        }
    }
    Ok(())
}

fn sort_newest_first(ids: &mut [String]) {
    ids.sort_by(|a, b| {
        extract_timestamp(b)
            .cmp(&extract_timestamp(a))
            .then_with(|| a.cmp(b))
    });
}
