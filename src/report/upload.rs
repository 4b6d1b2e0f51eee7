//! Multipart ingestion for `/api/unzip`: every file field is stored under a
//! fresh request root, zip archives are extracted next to it.

use std::path::{Path, PathBuf};

use actix_multipart::Multipart;
use futures::TryStreamExt;
use log::{debug, error, info, warn};
use sanitize_filename::sanitize;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::ReportError;
use crate::report::archive;

/// Per-request destination: `<upload dir>/req-<uuid>`.
pub fn new_request_root(upload_dir: &Path) -> PathBuf {
    upload_dir.join(format!("req-{}", Uuid::new_v4()))
}

fn is_zip(path: &Path) -> bool {
    path.extension()
        .and_then(std::ffi::OsStr::to_str)
        .map(|e| e.eq_ignore_ascii_case("zip"))
        .unwrap_or(false)
}

fn extracted_dir_name(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "archive".to_string());
    format!("{}_extracted", stem)
}

fn is_taken(root: &Path, name: &str) -> bool {
    root.join(name).exists()
        || (is_zip(Path::new(name)) && root.join(extracted_dir_name(name)).exists())
}

/// First free name under `root`: `name`, then `<stem>-2.<ext>`, `<stem>-3.<ext>` ...
/// An archive also needs its `_extracted` directory to be free.
fn unique_name(root: &Path, name: &str) -> String {
    if !is_taken(root, name) {
        return name.to_string();
    }
    let path = Path::new(name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());
    let ext = path.extension().map(|e| e.to_string_lossy().into_owned());
    (2..)
        .map(|n| match &ext {
            Some(ext) => format!("{}-{}.{}", stem, n, ext),
            None => format!("{}-{}", stem, n),
        })
        .find(|candidate| !is_taken(root, candidate))
        .unwrap_or_else(|| format!("{}-{}", stem, Uuid::new_v4()))
}

/// Store every uploaded file and return the resulting input paths in upload order.
/// A failed upload removes its request root.
pub async fn ingest(
    payload: Multipart,
    upload_dir: &Path,
    max_bytes: usize,
) -> Result<Vec<PathBuf>, ReportError> {
    let root = new_request_root(upload_dir);
    tokio::fs::create_dir_all(&root)
        .await
        .map_err(|e| ReportError::io("create directory", &root, e))?;

    match ingest_into(payload, &root, max_bytes).await {
        Ok(files) => Ok(files),
        Err(e) => {
            error!("Upload into {:?} failed: {}", root, e);
            if let Err(cleanup) = tokio::fs::remove_dir_all(&root).await {
                warn!("Failed to clean up {:?}: {}", root, cleanup);
            }
            Err(e)
        }
    }
}

async fn ingest_into(
    mut payload: Multipart,
    root: &Path,
    max_bytes: usize,
) -> Result<Vec<PathBuf>, ReportError> {
    let mut files = Vec::new();
    let mut received = 0usize;
    let mut file_fields = 0usize;

    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| ReportError::InvalidUpload(e.to_string()))?
    {
        let Some(original) = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string)
        else {
            debug!("Skipping non-file multipart field");
            continue;
        };
        file_fields += 1;

        let mut name = sanitize(&original);
        if name.is_empty() {
            name = format!("upload-{}", file_fields);
        }
        let name = unique_name(root, &name);
        let target = root.join(&name);
        let mut out = tokio::fs::File::create(&target)
            .await
            .map_err(|e| ReportError::io("create file", &target, e))?;

        while let Some(chunk) = field
            .try_next()
            .await
            .map_err(|e| ReportError::InvalidUpload(e.to_string()))?
        {
            received += chunk.len();
            if received > max_bytes {
                return Err(ReportError::InvalidUpload(format!(
                    "upload exceeds {} bytes",
                    max_bytes
                )));
            }
            out.write_all(&chunk)
                .await
                .map_err(|e| ReportError::io("write", &target, e))?;
        }
        out.flush()
            .await
            .map_err(|e| ReportError::io("write", &target, e))?;
        drop(out);
        info!("Received upload {:?} -> {:?}", original, target);

        if is_zip(&target) {
            let dest = root.join(extracted_dir_name(&name));
            let archive_path = target.clone();
            let extracted =
                tokio::task::spawn_blocking(move || archive::extract_file(&archive_path, &dest))
                    .await
                    .map_err(|e| ReportError::Task(e.to_string()))??;
            if let Err(e) = tokio::fs::remove_file(&target).await {
                warn!("Failed to remove archive {:?}: {}", target, e);
            }
            files.extend(extracted);
        } else {
            files.push(target);
        }
    }

    if file_fields == 0 {
        return Err(ReportError::InvalidUpload("no file uploaded".to_string()));
    }
    Ok(files)
}
