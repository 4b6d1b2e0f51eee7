use std::path::PathBuf;
use std::time::Duration;

use log::info;

use crate::error::ReportError;
use crate::report::process::run_tool;

/// External HTML-to-PDF program driven over stdin/stdout (wkhtmltopdf `- -`).
#[derive(Debug, Clone)]
pub struct HtmlRenderer {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl HtmlRenderer {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    pub async fn render(&self, html: String) -> Result<Vec<u8>, ReportError> {
        let output = run_tool(
            &self.program,
            &self.args,
            Some(html.into_bytes()),
            self.timeout,
        )
        .await?;
        info!(
            "Rendered PDF with {:?} ({} bytes)",
            self.program,
            output.stdout.len()
        );
        Ok(output.stdout)
    }
}
