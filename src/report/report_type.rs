use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::ReportError;

/// Closed set of report categories. Every per-type fact (title, templates,
/// computation program, data directory, extra capability) lives on the variant.
/// Parsed from its wire name through `FromStr`; `MAINTENANCE` is accepted for
/// `POST_EVALUATION`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportType {
    Expressway,
    PostEvaluation,
    Construction,
    Rural,
    NationalProvincial,
    Market,
}

impl ReportType {
    pub const ALL: [ReportType; 6] = [
        ReportType::Expressway,
        ReportType::PostEvaluation,
        ReportType::Construction,
        ReportType::Rural,
        ReportType::NationalProvincial,
        ReportType::Market,
    ];

    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Expressway => "EXPRESSWAY",
            Self::PostEvaluation => "POST_EVALUATION",
            Self::Construction => "CONSTRUCTION",
            Self::Rural => "RURAL",
            Self::NationalProvincial => "NATIONAL_PROVINCIAL",
            Self::Market => "MARKET",
        }
    }

    /// Human-readable title, also the prefix of every report identifier.
    pub fn title(self) -> &'static str {
        match self {
            Self::Expressway => "高速公路抽检路段公路技术状况监管分析报告",
            Self::PostEvaluation => "工程后评价技术状况监管分析报告",
            Self::Construction => "建设工程路段技术状况监管分析报告",
            Self::Rural => "农村公路抽检路段公路技术状况监管分析报告",
            Self::NationalProvincial => "普通国省干线抽检路段公路技术状况监管分析报告",
            Self::Market => "市场化路段抽检路段公路技术状况监管分析报告",
        }
    }

    fn template_stem(self) -> &'static str {
        match self {
            Self::Expressway => "高速公路JSON模板",
            Self::PostEvaluation => "养护工程JSON模板",
            Self::Construction => "建设工程JSON模板",
            Self::Rural => "农村公路JSON模板",
            Self::NationalProvincial => "国省干线JSON模板",
            Self::Market => "市场化JSON模板",
        }
    }

    pub fn program_id(self) -> &'static str {
        match self {
            Self::Expressway => "expressway",
            Self::PostEvaluation => "post_evaluation",
            Self::Construction => "construction",
            Self::Rural => "rural",
            Self::NationalProvincial => "national_provincial",
            Self::Market => "market",
        }
    }

    /// Directory under the report store holding the type's images and result artifact.
    pub fn data_dir(self) -> &'static str {
        match self {
            Self::Expressway => "expressway",
            Self::PostEvaluation => "postEvaluation",
            Self::Construction => "construction",
            Self::Rural => "rural",
            Self::NationalProvincial => "nationalProvince",
            Self::Market => "market",
        }
    }

    /// Whether an "extra" companion document is generated and exportable.
    pub fn supports_extra(self) -> bool {
        matches!(
            self,
            Self::Expressway | Self::Rural | Self::NationalProvincial
        )
    }

    pub fn template_path(self, templates_dir: &Path, format: ReportFormat) -> PathBuf {
        templates_dir.join(format!("{}.{}", self.template_stem(), format.extension()))
    }

    pub fn extra_template_path(self, templates_dir: &Path, format: ReportFormat) -> PathBuf {
        templates_dir.join(format!(
            "{}_extra.{}",
            self.template_stem(),
            format.extension()
        ))
    }

    pub fn image_source_dir(self, reports_dir: &Path) -> PathBuf {
        reports_dir.join(self.data_dir()).join("images")
    }

    pub fn result_artifact_path(self, reports_dir: &Path) -> PathBuf {
        reports_dir.join(self.data_dir()).join("result.json")
    }

    /// Resolve a title back to its type: exact match first, then prefix match.
    pub fn from_title(title: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.title() == title)
            .or_else(|| Self::ALL.into_iter().find(|t| title.starts_with(t.title())))
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for ReportType {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "EXPRESSWAY" => Ok(Self::Expressway),
            "POST_EVALUATION" | "MAINTENANCE" => Ok(Self::PostEvaluation),
            "CONSTRUCTION" => Ok(Self::Construction),
            "RURAL" => Ok(Self::Rural),
            "NATIONAL_PROVINCIAL" => Ok(Self::NationalProvincial),
            "MARKET" => Ok(Self::Market),
            other => Err(ReportError::UnknownReportType(other.to_string())),
        }
    }
}

/// Storage format of a materialized report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportFormat {
    Docx,
    Markdown,
}

impl ReportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Docx => "docx",
            Self::Markdown => "md",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Docx => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            Self::Markdown => "text/markdown; charset=utf-8",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "docx" => Some(Self::Docx),
            "md" => Some(Self::Markdown),
            _ => None,
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ReportFormat {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "docx" => Ok(Self::Docx),
            "md" | "markdown" => Ok(Self::Markdown),
            other => Err(ReportError::UnknownFormat(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names_round_trip() {
        for t in ReportType::ALL {
            assert_eq!(t.wire_name().parse::<ReportType>().unwrap(), t);
        }
        assert_eq!(
            "MAINTENANCE".parse::<ReportType>().unwrap(),
            ReportType::PostEvaluation
        );
        assert!("HIGHWAY".parse::<ReportType>().is_err());
    }

    #[test]
    fn test_parse_trims_and_is_case_sensitive() {
        assert_eq!(
            " NATIONAL_PROVINCIAL ".parse::<ReportType>().unwrap(),
            ReportType::NationalProvincial
        );
        let err = "rural".parse::<ReportType>().unwrap_err();
        assert!(matches!(err, ReportError::UnknownReportType(ref t) if t == "rural"));
        assert_eq!("MARKDOWN".parse::<ReportFormat>().unwrap(), ReportFormat::Markdown);
        assert!("pdf".parse::<ReportFormat>().is_err());
    }

    #[test]
    fn test_extra_capability() {
        let extra: Vec<_> = ReportType::ALL
            .into_iter()
            .filter(|t| t.supports_extra())
            .collect();
        assert_eq!(
            extra,
            vec![
                ReportType::Expressway,
                ReportType::Rural,
                ReportType::NationalProvincial
            ]
        );
    }

    #[test]
    fn test_from_title_exact_then_prefix() {
        assert_eq!(
            ReportType::from_title("市场化路段抽检路段公路技术状况监管分析报告"),
            Some(ReportType::Market)
        );
        assert_eq!(
            ReportType::from_title("农村公路抽检路段公路技术状况监管分析报告_extra"),
            Some(ReportType::Rural)
        );
        assert_eq!(ReportType::from_title("未知报告"), None);
    }

    #[test]
    fn test_paths() {
        let templates = Path::new("/t");
        assert_eq!(
            ReportType::Rural.template_path(templates, ReportFormat::Docx),
            PathBuf::from("/t/农村公路JSON模板.docx")
        );
        assert_eq!(
            ReportType::Rural.extra_template_path(templates, ReportFormat::Markdown),
            PathBuf::from("/t/农村公路JSON模板_extra.md")
        );
        assert_eq!(
            ReportType::NationalProvincial.image_source_dir(Path::new("/r")),
            PathBuf::from("/r/nationalProvince/images")
        );
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("md".parse::<ReportFormat>().unwrap(), ReportFormat::Markdown);
        assert_eq!("DOCX".parse::<ReportFormat>().unwrap(), ReportFormat::Docx);
        assert!("pdf".parse::<ReportFormat>().is_err());
        assert_eq!(ReportFormat::from_extension("md"), Some(ReportFormat::Markdown));
    }
}
