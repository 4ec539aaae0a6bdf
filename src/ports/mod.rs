use crate::domain::ast::SourceUnit;
use crate::domain::errors::{IncompatibleVersion, ParseError};
use crate::domain::report::AnalysisReport;

pub mod report_exporter;

/// Turns Solidity source text into the AST model.
pub trait SourceParser: Send + Sync {
    fn parse(&self, source: &str) -> Result<SourceUnit, ParseError>;
}

/// Decides whether a parsed unit targets a supported compiler.
pub trait VersionGate: Send + Sync {
    fn check(&self, unit: &SourceUnit) -> Result<(), IncompatibleVersion>;
}

pub trait ReportExporter {
    fn render(&self, report: &AnalysisReport) -> std::io::Result<String>;

    fn export(&self, report: &AnalysisReport, path: &str) -> std::io::Result<()> {
        std::fs::write(path, self.render(report)?)
    }
}
