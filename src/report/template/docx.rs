//! In-memory editing of a `.docx` (Office Open XML) package.

use std::collections::BTreeMap;
use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

use log::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::substitution::{substitute, xml_escape};
use crate::error::ReportError;

const MEDIA_PREFIX: &str = "word/media/";

#[derive(Debug)]
struct Part {
    name: String,
    is_dir: bool,
    data: Vec<u8>,
}

#[derive(Debug)]
pub struct DocxPackage {
    source: PathBuf,
    parts: Vec<Part>,
}

impl DocxPackage {
    pub fn open(path: &Path) -> Result<Self, ReportError> {
        let bytes = fs::read(path).map_err(|source| ReportError::Template {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(path, bytes)
    }

    pub fn from_bytes(source: &Path, bytes: Vec<u8>) -> Result<Self, ReportError> {
        let invalid = |reason: String| ReportError::InvalidTemplate {
            path: source.to_path_buf(),
            reason,
        };

        let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(|e| invalid(e.to_string()))?;
        let mut parts = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let mut entry = archive.by_index(index).map_err(|e| invalid(e.to_string()))?;
            let name = entry.name().to_string();
            let is_dir = entry.is_dir();
            let mut data = Vec::with_capacity(entry.size() as usize);
            if !is_dir {
                entry
                    .read_to_end(&mut data)
                    .map_err(|e| invalid(format!("{}: {}", name, e)))?;
            }
            parts.push(Part { name, is_dir, data });
        }

        if !parts.iter().any(|p| p.name == "word/document.xml") {
            return Err(invalid("missing word/document.xml".to_string()));
        }

        Ok(Self {
            source: source.to_path_buf(),
            parts,
        })
    }

    fn is_text_part(name: &str) -> bool {
        if name == "word/document.xml" {
            return true;
        }
        name.strip_prefix("word/")
            .map(|rest| {
                (rest.starts_with("header") || rest.starts_with("footer"))
                    && rest.ends_with(".xml")
                    && !rest.contains('/')
            })
            .unwrap_or(false)
    }

    /// Substitute placeholder values in the body, headers and footers.
    pub fn substitute_text(&mut self, values: &BTreeMap<String, String>) -> Result<(), ReportError> {
        for part in self.parts.iter_mut().filter(|p| Self::is_text_part(&p.name)) {
            let xml = std::str::from_utf8(&part.data).map_err(|e| ReportError::InvalidTemplate {
                path: self.source.clone(),
                reason: format!("{} is not UTF-8: {}", part.name, e),
            })?;
            part.data = substitute(xml, values, xml_escape)
                .map_err(|e| ReportError::InvalidTemplate {
                    path: self.source.clone(),
                    reason: format!("placeholder keys in {}: {}", part.name, e),
                })?
                .into_bytes();
        }
        Ok(())
    }

    /// Number of embedded media files, i.e. the bindable image slots.
    pub fn media_count(&self) -> usize {
        self.parts
            .iter()
            .filter(|p| !p.is_dir && p.name.starts_with(MEDIA_PREFIX))
            .count()
    }

    /// Replace the bytes of slot `slot` (1-based, `word/media/image<slot>.*`).
    /// Returns `false` when the template has no such slot.
    pub fn replace_image_slot(&mut self, slot: usize, data: Vec<u8>) -> bool {
        let stem = format!("{}image{}.", MEDIA_PREFIX, slot);
        let preferred = format!("{}jpeg", stem);
        let index = self
            .parts
            .iter()
            .position(|p| p.name == preferred)
            .or_else(|| self.parts.iter().position(|p| p.name.starts_with(&stem)));

        match index {
            Some(i) => {
                debug!("Binding image slot {} -> {}", slot, self.parts[i].name);
                self.parts[i].data = data;
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.data.as_slice())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ReportError> {
        let invalid = |reason: String| ReportError::InvalidTemplate {
            path: self.source.clone(),
            reason,
        };
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for part in &self.parts {
            if part.is_dir {
                writer
                    .add_directory(part.name.as_str(), options)
                    .map_err(|e| invalid(e.to_string()))?;
                continue;
            }
            writer
                .start_file(part.name.as_str(), options)
                .map_err(|e| invalid(e.to_string()))?;
            writer
                .write_all(&part.data)
                .map_err(|e| invalid(e.to_string()))?;
        }
        let cursor = writer.finish().map_err(|e| invalid(e.to_string()))?;
        Ok(cursor.into_inner())
    }

    pub fn write_to(&self, path: &Path) -> Result<(), ReportError> {
        let bytes = self.to_bytes()?;
        fs::write(path, bytes).map_err(|e| ReportError::io("write", path, e))
    }
}
