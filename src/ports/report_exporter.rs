//! Report Exporters
//!
//! Renders an [`AnalysisReport`] as JSON, CSV or a coloured terminal summary,
//! and writes describe-mode descriptors next to each other in a directory.

use std::fmt::Write;
use std::io;
use std::path::{Path, PathBuf};

use colored::*;

use super::ReportExporter;
use crate::domain::describe::FactSheet;
use crate::domain::report::{AnalysisReport, ContractReport, FileReport};

fn fmt_error(err: std::fmt::Error) -> io::Error {
    io::Error::other(err)
}

/// The whole report, nested files → contracts → verdicts → outcomes.
pub struct JsonExporter;

impl ReportExporter for JsonExporter {
    fn render(&self, report: &AnalysisReport) -> io::Result<String> {
        let mut text = serde_json::to_string_pretty(report).map_err(io::Error::other)?;
        text.push('\n');
        Ok(text)
    }
}

/// One row per contract, one boolean column per descriptor. Failed files
/// have no rows.
pub struct CsvExporter;

impl CsvExporter {
    /// `Emergency Stop` → `emergency_stop`.
    pub fn column_name(descriptor: &str) -> String {
        descriptor.trim().replace(' ', "_").to_lowercase()
    }

    fn field(value: &str) -> String {
        if value.contains([',', '"', '\n']) {
            format!("\"{}\"", value.replace('"', "\"\""))
        } else {
            value.to_string()
        }
    }
}

impl ReportExporter for CsvExporter {
    fn render(&self, report: &AnalysisReport) -> io::Result<String> {
        let mut columns: Vec<(String, &str)> = report
            .descriptor_names()
            .into_iter()
            .map(|name| (Self::column_name(name), name))
            .collect();
        columns.sort();

        let mut out = String::from("src_file,contract_name");
        for (column, _) in &columns {
            out.push(',');
            out.push_str(&Self::field(column));
        }
        out.push('\n');

        for file in report.iter() {
            let path = file.path.display().to_string();
            for contract in &file.contracts {
                out.push_str(&Self::field(&path));
                out.push(',');
                out.push_str(&Self::field(&contract.contract));
                for (_, descriptor) in &columns {
                    let matched = contract.verdict(descriptor).is_some_and(|v| v.matched);
                    out.push(',');
                    out.push_str(if matched { "true" } else { "false" });
                }
                out.push('\n');
            }
        }
        Ok(out)
    }
}

/// Human-readable summary for `--print`.
pub struct TerminalSummary {
    /// Show per-check evidence, not only pass/fail.
    pub evidence: bool,
}

impl TerminalSummary {
    fn write_file(out: &mut String, file: &FileReport, evidence: bool) -> std::fmt::Result {
        let header = match &file.pragma {
            Some(pragma) => format!("{} (pragma solidity {pragma})", file.path.display()),
            None => file.path.display().to_string(),
        };
        writeln!(out, "{}", header.bright_white().bold())?;
        if let Some(error) = &file.error {
            writeln!(out, "  {} {error}", "error".red().bold())?;
        }
        for warning in &file.warnings {
            writeln!(out, "  {} {warning}", "warning".yellow().bold())?;
        }
        for contract in &file.contracts {
            Self::write_contract(out, contract, evidence)?;
        }
        Ok(())
    }

    fn write_contract(
        out: &mut String,
        contract: &ContractReport,
        evidence: bool,
    ) -> std::fmt::Result {
        writeln!(out, "  {}", contract.contract.cyan().bold())?;
        for verdict in &contract.verdicts {
            let flag = if verdict.matched { "MATCH".green().bold() } else { "-----".dimmed() };
            writeln!(
                out,
                "    {flag} {} ({}/{} checks)",
                verdict.descriptor,
                verdict.passed_checks(),
                verdict.outcomes.len()
            )?;
            for outcome in &verdict.outcomes {
                let mark = if outcome.passed { "pass".green() } else { "fail".red() };
                writeln!(out, "          {mark} {}", outcome.check)?;
                if evidence {
                    for item in &outcome.evidence {
                        writeln!(out, "               {}", item.summary().dimmed())?;
                    }
                }
            }
        }
        Ok(())
    }
}

impl ReportExporter for TerminalSummary {
    fn render(&self, report: &AnalysisReport) -> io::Result<String> {
        let mut out = String::new();
        for file in report.iter() {
            Self::write_file(&mut out, file, self.evidence).map_err(fmt_error)?;
        }
        let failed = report.failed().count();
        writeln!(
            out,
            "{} file(s), {} contract(s), {} failed",
            report.files.len(),
            report.contract_count(),
            failed
        )
        .map_err(fmt_error)?;
        Ok(out)
    }
}

/// Writes `<Contract>_descriptor.json` for every fact sheet that yields a
/// descriptor. Returns the written paths.
pub fn write_descriptors(sheets: &[FactSheet], dir: &Path) -> io::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::new();
    for sheet in sheets {
        let Some(descriptor) = sheet.to_descriptor() else {
            continue;
        };
        let path = dir.join(format!("{}_descriptor.json", sheet.contract));
        let text = descriptor.to_json_pretty().map_err(io::Error::other)?;
        std::fs::write(&path, text + "\n")?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ast::ContractKind;
    use crate::domain::descriptor::CheckKind;
    use crate::domain::errors::{FileError, ParseError};
    use crate::domain::report::{CheckOutcome, Evidence, NodeKind, PatternVerdict};
    use pretty_assertions::assert_eq;

    fn report() -> AnalysisReport {
        let verdict = |descriptor: &str, passed: bool| {
            PatternVerdict::new(
                "Vault",
                descriptor,
                vec![CheckOutcome::new(
                    CheckKind::Inheritance,
                    passed,
                    vec![Evidence::found(NodeKind::InheritanceSpecifier, 3, "Ownable")],
                )],
            )
        };
        let vault = ContractReport {
            contract: "Vault".into(),
            kind: ContractKind::Contract,
            verdicts: vec![verdict("Emergency Stop", false), verdict("Ownership", true)],
        };
        [
            FileReport::analyzed(Path::new("a/vault.sol"), Some("^0.8.0".into()), vec![vault]),
            FileReport::failed(
                Path::new("a/broken.sol"),
                FileError::from(ParseError::new(2, 7, "expected `;`")),
            ),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_csv_has_sorted_lowercase_columns_and_skips_failed_files() {
        let csv = CsvExporter.render(&report()).unwrap();
        assert_eq!(
            csv,
            "src_file,contract_name,emergency_stop,ownership\na/vault.sol,Vault,false,true\n"
        );
    }

    #[test]
    fn test_json_keeps_file_errors() {
        let json = JsonExporter.render(&report()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["files"]["a/broken.sol"]["error"]["kind"], "parse");
        assert_eq!(value["files"]["a/vault.sol"]["contracts"][0]["verdicts"][1]["matched"], true);
    }

    #[test]
    fn test_terminal_summary_counts() {
        colored::control::set_override(false);
        let text = TerminalSummary { evidence: true }.render(&report()).unwrap();
        assert!(text.contains("MATCH Ownership (1/1 checks)"), "got:\n{text}");
        assert!(text.contains("line 3: Ownable"), "got:\n{text}");
        assert!(text.ends_with("2 file(s), 1 contract(s), 1 failed\n"), "got:\n{text}");
    }
}
