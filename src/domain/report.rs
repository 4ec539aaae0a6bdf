//! Verdicts, evidence and the aggregate analysis report.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::ast::ContractKind;
use super::descriptor::CheckKind;
use super::errors::FileError;

/// The kind of AST node a piece of evidence points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Contract,
    InheritanceSpecifier,
    Function,
    Modifier,
    ModifierInvocation,
    Parameter,
    StateVariable,
    Struct,
    Enum,
    Event,
    Statement,
    Expression,
}

/// Why a check passed or failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Evidence {
    /// A node that satisfies (part of) the check.
    Found {
        node: NodeKind,
        #[serde(skip_serializing_if = "Option::is_none")]
        scope: Option<String>,
        line: usize,
        snippet: String,
    },
    /// Nothing in the contract matched.
    Missing { wanted: String },
    /// A node that was examined and contradicts the check.
    Conflict {
        node: NodeKind,
        #[serde(skip_serializing_if = "Option::is_none")]
        scope: Option<String>,
        line: usize,
        snippet: String,
        reason: String,
    },
}

impl Evidence {
    pub fn found(node: NodeKind, line: usize, snippet: impl Into<String>) -> Self {
        Evidence::Found { node, scope: None, line, snippet: snippet.into() }
    }

    pub fn found_in(node: NodeKind, scope: &str, line: usize, snippet: impl Into<String>) -> Self {
        Evidence::Found { node, scope: Some(scope.to_string()), line, snippet: snippet.into() }
    }

    pub fn missing(wanted: impl Into<String>) -> Self {
        Evidence::Missing { wanted: wanted.into() }
    }

    pub fn conflict(
        node: NodeKind,
        scope: Option<&str>,
        line: usize,
        snippet: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Evidence::Conflict {
            node,
            scope: scope.map(str::to_string),
            line,
            snippet: snippet.into(),
            reason: reason.into(),
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Evidence::Found { .. })
    }

    /// One-line human description, used by the terminal summary.
    pub fn summary(&self) -> String {
        match self {
            Evidence::Found { scope: Some(scope), line, snippet, .. } => {
                format!("line {line} in {scope}: {snippet}")
            }
            Evidence::Found { line, snippet, .. } => format!("line {line}: {snippet}"),
            Evidence::Missing { wanted } => format!("no matching construct found: {wanted}"),
            Evidence::Conflict { line, snippet, reason, .. } => {
                format!("line {line}: {snippet} ({reason})")
            }
        }
    }
}

/// Result of one check against one contract. Evidence is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckOutcome {
    pub check: CheckKind,
    pub passed: bool,
    pub evidence: Vec<Evidence>,
}

impl CheckOutcome {
    pub fn new(check: CheckKind, passed: bool, mut evidence: Vec<Evidence>) -> Self {
        if evidence.is_empty() {
            evidence.push(Evidence::missing(check.as_str()));
        }
        Self { check, passed, evidence }
    }

    pub fn pass(check: CheckKind, evidence: Vec<Evidence>) -> Self {
        Self::new(check, true, evidence)
    }

    pub fn fail(check: CheckKind, evidence: Vec<Evidence>) -> Self {
        Self::new(check, false, evidence)
    }
}

/// One descriptor evaluated against one contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatternVerdict {
    pub contract: String,
    pub descriptor: String,
    pub matched: bool,
    pub outcomes: Vec<CheckOutcome>,
}

impl PatternVerdict {
    pub fn new(contract: &str, descriptor: &str, outcomes: Vec<CheckOutcome>) -> Self {
        Self {
            contract: contract.to_string(),
            descriptor: descriptor.to_string(),
            matched: outcomes.iter().all(|o| o.passed),
            outcomes,
        }
    }

    pub fn passed_checks(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractReport {
    pub contract: String,
    pub kind: ContractKind,
    /// Ordered by descriptor name.
    pub verdicts: Vec<PatternVerdict>,
}

impl ContractReport {
    pub fn verdict(&self, descriptor: &str) -> Option<&PatternVerdict> {
        self.verdicts.iter().find(|v| v.descriptor == descriptor)
    }

    pub fn matched(&self) -> impl Iterator<Item = &str> {
        self.verdicts
            .iter()
            .filter(|v| v.matched)
            .map(|v| v.descriptor.as_str())
    }
}

/// Everything known about one source file after analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pragma: Option<String>,
    /// In declaration order.
    pub contracts: Vec<ContractReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FileError>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl FileReport {
    pub fn analyzed(path: &Path, pragma: Option<String>, contracts: Vec<ContractReport>) -> Self {
        Self {
            path: path.to_path_buf(),
            pragma,
            contracts,
            error: None,
            warnings: Vec::new(),
        }
    }

    pub fn failed(path: &Path, error: FileError) -> Self {
        Self {
            path: path.to_path_buf(),
            pragma: None,
            contracts: Vec::new(),
            error: Some(error),
            warnings: Vec::new(),
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn contract(&self, name: &str) -> Option<&ContractReport> {
        self.contracts.iter().find(|c| c.contract == name)
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Reports keyed by file path. Key order makes output independent of the
/// order in which files were analyzed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisReport {
    pub files: BTreeMap<PathBuf, FileReport>,
}

impl AnalysisReport {
    pub fn insert(&mut self, report: FileReport) {
        self.files.insert(report.path.clone(), report);
    }

    pub fn file(&self, path: &Path) -> Option<&FileReport> {
        self.files.get(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileReport> {
        self.files.values()
    }

    pub fn failed(&self) -> impl Iterator<Item = &FileReport> {
        self.files.values().filter(|f| f.is_failed())
    }

    pub fn contract_count(&self) -> usize {
        self.files.values().map(|f| f.contracts.len()).sum()
    }

    /// Every descriptor name that appears in a verdict, sorted.
    pub fn descriptor_names(&self) -> BTreeSet<&str> {
        self.files
            .values()
            .flat_map(|f| f.contracts.iter())
            .flat_map(|c| c.verdicts.iter())
            .map(|v| v.descriptor.as_str())
            .collect()
    }
}

impl FromIterator<FileReport> for AnalysisReport {
    fn from_iter<I: IntoIterator<Item = FileReport>>(iter: I) -> Self {
        let mut report = AnalysisReport::default();
        for file in iter {
            report.insert(file);
        }
        report
    }
}
