//! Archive Ingestor: extracts an uploaded zip into a per-request root.

use std::borrow::Cow;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek};
use std::path::{Path, PathBuf};

use log::{debug, error, info};
use zip::ZipArchive;

use crate::error::ReportError;
use crate::report::paths;

const DEFAULT_FILE_MODE: u32 = 0o644;
const DIR_MODE: u32 = 0o755;

/// Decode a raw entry name: UTF-8 as-is, then GBK, then GB18030.
/// Returns `None` when no decoder accepts the bytes.
pub fn decode_entry_name(raw: &[u8]) -> Option<Cow<'_, str>> {
    if let Ok(name) = std::str::from_utf8(raw) {
        return Some(Cow::Borrowed(name));
    }
    for encoding in [encoding_rs::GBK, encoding_rs::GB18030] {
        if let Some(decoded) = encoding.decode_without_bom_handling_and_without_replacement(raw) {
            if decoded.as_bytes() != raw {
                return Some(Cow::Owned(decoded.into_owned()));
            }
        }
    }
    None
}

fn entry_relative_path(raw: &[u8]) -> PathBuf {
    match decode_entry_name(raw) {
        Some(name) => paths::entry_to_relative(&name),
        None => {
            error!(
                "Failed to decode archive entry name {:?}, keeping raw bytes",
                String::from_utf8_lossy(raw)
            );
            raw_entry_to_relative(raw)
        }
    }
}

#[cfg(unix)]
fn raw_entry_to_relative(raw: &[u8]) -> PathBuf {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    raw.split(|b| *b == b'/' || *b == b'\\')
        .filter(|s| !s.is_empty())
        .map(OsStr::from_bytes)
        .collect()
}

#[cfg(not(unix))]
fn raw_entry_to_relative(raw: &[u8]) -> PathBuf {
    paths::entry_to_relative(&String::from_utf8_lossy(raw))
}

/// Extract the archive at `archive_path` into `dest`.
pub fn extract_file(archive_path: &Path, dest: &Path) -> Result<Vec<PathBuf>, ReportError> {
    let file = File::open(archive_path).map_err(|e| ReportError::io("open", archive_path, e))?;
    extract(file, dest)
}

/// Extract every entry of `reader` under `dest`, returning the regular files in
/// archive order. Any entry resolving outside `dest` aborts the whole extraction.
pub fn extract<R: Read + Seek>(reader: R, dest: &Path) -> Result<Vec<PathBuf>, ReportError> {
    let mut archive = ZipArchive::new(reader)?;
    fs::create_dir_all(dest).map_err(|e| ReportError::io("create directory", dest, e))?;

    let mut extracted = Vec::new();
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let relative = entry_relative_path(entry.name_raw());
        let target = paths::join_strictly_inside(dest, &relative).ok_or_else(|| {
            error!(
                "Archive entry {:?} escapes extraction root {:?}",
                relative, dest
            );
            ReportError::PathTraversal(relative.display().to_string())
        })?;

        if entry.is_dir() {
            create_dir(&target)?;
            continue;
        }

        if let Some(parent) = target.parent() {
            create_dir(parent)?;
        }

        let mode = entry.unix_mode().map(|m| m & 0o777).unwrap_or(DEFAULT_FILE_MODE);
        let mut out = open_truncating(&target, mode)
            .map_err(|e| ReportError::io("create file", &target, e))?;
        io::copy(&mut entry, &mut out).map_err(|e| ReportError::io("write", &target, e))?;
        debug!("Extracted {:?}", target);
        extracted.push(target);
    }

    info!("Extracted {} files into {:?}", extracted.len(), dest);
    Ok(extracted)
}

fn create_dir(path: &Path) -> Result<(), ReportError> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(DIR_MODE);
    }
    builder
        .create(path)
        .map_err(|e| ReportError::io("create directory", path, e))
}

fn open_truncating(path: &Path, mode: u32) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;
    options.open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn build_zip(entries: &[(&str, Option<&[u8]>)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in entries {
            match content {
                Some(bytes) => {
                    writer.start_file(*name, SimpleFileOptions::default()).unwrap();
                    writer.write_all(bytes).unwrap();
                }
                None => writer
                    .add_directory(*name, SimpleFileOptions::default())
                    .unwrap(),
            }
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_decode_utf8_passthrough() {
        assert_eq!(decode_entry_name("报告.xlsx".as_bytes()).unwrap(), "报告.xlsx");
    }

    #[test]
    fn test_decode_gbk_name() {
        let (encoded, _, _) = encoding_rs::GBK.encode("路面数据.xlsx");
        assert!(std::str::from_utf8(&encoded).is_err());
        assert_eq!(decode_entry_name(&encoded).unwrap(), "路面数据.xlsx");
    }

    #[test]
    fn test_undecodable_name_falls_back() {
        let raw = [0x81u8, 0x20, b'a'];
        assert!(decode_entry_name(&raw).is_none());
        let relative = entry_relative_path(&raw);
        assert_eq!(relative.components().count(), 1);
    }

    #[test]
    fn test_extracts_files_in_archive_order() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = build_zip(&[
            ("data/", None),
            ("data/b.xlsx", Some(b"b")),
            ("a.xlsx", Some(b"a")),
        ]);

        let files = extract(Cursor::new(bytes), dir.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("data/b.xlsx"));
        assert!(files[1].ends_with("a.xlsx"));
        assert_eq!(fs::read(&files[1]).unwrap(), b"a");
    }

    #[test]
    fn test_existing_file_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"a much longer previous content").unwrap();
        let bytes = build_zip(&[("a.txt", Some(b"new"))]);

        extract(Cursor::new(bytes), dir.path()).unwrap();
        assert_eq!(fs::read(dir.path().join("a.txt")).unwrap(), b"new");
    }

    #[test]
    fn test_traversal_aborts_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("dest");
        let bytes = build_zip(&[("ok.txt", Some(b"ok")), ("../evil.txt", Some(b"evil"))]);

        let err = extract(Cursor::new(bytes), &dest).unwrap_err();
        assert!(matches!(err, ReportError::PathTraversal(_)));
        assert!(!dir.path().join("evil.txt").exists());
    }

    #[test]
    fn test_garbage_is_archive_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = extract(Cursor::new(b"not a zip".to_vec()), dir.path()).unwrap_err();
        assert!(matches!(err, ReportError::Archive(_)));
    }

    /// Zip whose single entry carries `name` GBK-encoded, without the UTF-8 flag.
    fn gbk_named_zip(name: &str, content: &[u8]) -> Vec<u8> {
        let (encoded, _, _) = encoding_rs::GBK.encode(name);
        let placeholder = "x".repeat(encoded.len());
        let mut bytes = build_zip(&[(placeholder.as_str(), Some(content))]);

        let mut patched = 0;
        let mut i = 0;
        while i + encoded.len() <= bytes.len() {
            if &bytes[i..i + encoded.len()] == placeholder.as_bytes() {
                bytes[i..i + encoded.len()].copy_from_slice(&encoded);
                patched += 1;
                i += encoded.len();
            } else {
                i += 1;
            }
        }
        // Local header and central directory.
        assert_eq!(patched, 2);
        bytes
    }

    #[test]
    fn test_extracts_gbk_named_entry() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = gbk_named_zip("数据/路面.txt", b"gbk");

        let files = extract(Cursor::new(bytes), dir.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("数据/路面.txt"));
        let expected = dir.path().join("数据").join("路面.txt");
        assert_eq!(fs::read(&expected).unwrap(), b"gbk");
    }
}
