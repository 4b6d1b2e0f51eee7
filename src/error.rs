//! Error taxonomy for the report pipeline.
//!
//! Every variant maps onto one [`ErrorKind`], which decides the HTTP status the
//! transport answers with. Partial failures (a missing extra template, a single
//! image that could not be copied, a watermark stamp that could not be built)
//! are never represented here: they are logged where they happen and the
//! operation carries on.

use std::path::PathBuf;

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

use crate::ErrorResponse;

/// Coarse classification used for status mapping and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Input,
    ExternalTool,
    Filesystem,
    NotFound,
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("unsupported report type '{0}'")]
    UnknownReportType(String),

    #[error("unsupported report format '{0}'")]
    UnknownFormat(String),

    #[error("invalid report identifier '{0}'")]
    InvalidIdentifier(String),

    #[error("invalid upload: {0}")]
    InvalidUpload(String),

    #[error("failed to open archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("illegal file path in archive: {0}")]
    PathTraversal(String),

    #[error("path '{0}' is outside the report store")]
    OutsideStore(String),

    #[error("report type '{0}' does not support extra export")]
    ExtraNotSupported(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("failed to launch {tool}: {source}")]
    ToolLaunch {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with status {code}: {stderr}")]
    ToolExit {
        tool: String,
        code: i32,
        stderr: String,
    },

    #[error("{tool} did not finish within {secs}s")]
    ToolTimeout { tool: String, secs: u64 },

    #[error("malformed calculation output: {0}")]
    MalformedOutput(String),

    #[error("failed to process PDF: {0}")]
    Pdf(String),

    #[error("failed to read template {path:?}: {source}")]
    Template {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid template {path:?}: {reason}")]
    InvalidTemplate { path: PathBuf, reason: String },

    #[error("failed to {action} {path:?}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("settings store error: {0}")]
    Store(String),

    #[error("background task failed: {0}")]
    Task(String),
}

impl ReportError {
    pub fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownReportType(_)
            | Self::UnknownFormat(_)
            | Self::InvalidIdentifier(_)
            | Self::InvalidUpload(_)
            | Self::Archive(_)
            | Self::PathTraversal(_)
            | Self::OutsideStore(_)
            | Self::ExtraNotSupported(_) => ErrorKind::Input,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::ToolLaunch { .. }
            | Self::ToolExit { .. }
            | Self::ToolTimeout { .. }
            | Self::MalformedOutput(_)
            | Self::Pdf(_) => ErrorKind::ExternalTool,
            Self::Template { .. }
            | Self::InvalidTemplate { .. }
            | Self::Io { .. }
            | Self::Store(_)
            | Self::Task(_) => ErrorKind::Filesystem,
        }
    }
}

impl ResponseError for ReportError {
    fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Input => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::ExternalTool => StatusCode::BAD_GATEWAY,
            ErrorKind::Filesystem => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self.kind() {
            ErrorKind::Input => ErrorResponse::bad_request(&self.to_string()),
            ErrorKind::NotFound => ErrorResponse::not_found(&self.to_string()),
            ErrorKind::ExternalTool => ErrorResponse::new("ExternalToolFailure", &self.to_string()),
            ErrorKind::Filesystem => ErrorResponse::internal_error(&self.to_string()),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}
