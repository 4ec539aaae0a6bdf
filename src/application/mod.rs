//! Analysis Orchestrator.
//!
//! Runs every contract of a file against every descriptor and gathers the
//! per-file reports of a batch. A file that cannot be read, parsed or
//! accepted by the version gate becomes a failed entry; it never aborts the
//! batch.

use std::fs;
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::IncompatiblePolicy;
use crate::domain::describe::{describe, FactSheet};
use crate::domain::descriptor::DescriptorSet;
use crate::domain::errors::FileError;
use crate::domain::evaluator;
use crate::domain::report::{AnalysisReport, FileReport};
use crate::ports::{SourceParser, VersionGate};

pub struct AnalyzeUsecase<'a> {
    pub parser: &'a dyn SourceParser,
    pub version_gate: &'a dyn VersionGate,
    pub policy: IncompatiblePolicy,
}

impl<'a> AnalyzeUsecase<'a> {
    /// Analyzes source text already in memory; `path` only labels the report.
    pub fn analyze_source(
        &self,
        path: &Path,
        source: &str,
        descriptors: &DescriptorSet,
    ) -> FileReport {
        let unit = match self.parser.parse(source) {
            Ok(unit) => unit,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping file that does not parse");
                return FileReport::failed(path, err.into());
            }
        };

        let mut warning = None;
        if let Err(err) = self.version_gate.check(&unit) {
            match self.policy {
                IncompatiblePolicy::Skip => {
                    warn!(path = %path.display(), error = %err, "skipping incompatible file");
                    return FileReport::failed(path, err.into());
                }
                IncompatiblePolicy::Warn => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "analyzing incompatible file anyway"
                    );
                    warning = Some(err.to_string());
                }
            }
        }

        let contracts = evaluator::analyze(&unit, descriptors);
        debug!(
            path = %path.display(),
            contracts = contracts.len(),
            matched = contracts.iter().map(|c| c.matched().count()).sum::<usize>(),
            "file analyzed"
        );
        let pragma = unit.solidity_pragma().map(str::to_string);
        let report = FileReport::analyzed(path, pragma, contracts);
        match warning {
            Some(warning) => report.with_warning(warning),
            None => report,
        }
    }

    pub fn analyze_file(&self, path: &Path, descriptors: &DescriptorSet) -> FileReport {
        match fs::read_to_string(path) {
            Ok(source) => self.analyze_source(path, &source, descriptors),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "cannot read source");
                FileReport::failed(path, FileError::Unreadable { message: err.to_string() })
            }
        }
    }

    /// Every file in parallel; the report is keyed by path so the result does
    /// not depend on completion order.
    pub fn analyze_batch(&self, paths: &[PathBuf], descriptors: &DescriptorSet) -> AnalysisReport {
        let results: DashMap<PathBuf, FileReport> = DashMap::new();
        paths.par_iter().for_each(|path| {
            results.insert(path.clone(), self.analyze_file(path, descriptors));
        });

        let report: AnalysisReport = results.into_iter().map(|(_, file)| file).collect();
        info!(
            files = report.files.len(),
            contracts = report.contract_count(),
            failed = report.failed().count(),
            "analysis finished"
        );
        report
    }

    /// Fact sheets for every contract in the source, in declaration order.
    /// The version gate is not consulted.
    pub fn describe_source(&self, source: &str) -> Result<Vec<FactSheet>, FileError> {
        let unit = self.parser.parse(source)?;
        Ok(unit.contracts.iter().map(describe).collect())
    }

    pub fn describe_file(&self, path: &Path) -> Result<Vec<FactSheet>, FileError> {
        let source = fs::read_to_string(path)
            .map_err(|err| FileError::Unreadable { message: err.to_string() })?;
        self.describe_source(&source)
    }
}
