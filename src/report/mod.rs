//! Report generation pipeline: ingest, compute, materialize, catalog, export.

pub mod archive;
pub mod calculation;
pub mod catalog;
pub mod export;
pub mod handlers;
pub mod models;
pub mod paths;
pub mod process;
pub mod report_type;
pub mod template;
pub mod upload;
