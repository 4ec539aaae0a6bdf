//! Error taxonomy.
//!
//! `DescriptorInvalid` is fatal to descriptor loading. `ParseError` and
//! `IncompatibleVersion` are recorded per file as a [`FileError`] and never
//! abort a batch. A check that finds nothing is not an error; it fails with
//! evidence.

use std::path::PathBuf;

use serde::Serialize;

/// Field-level schema problem found while validating a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Violation {
    #[error("cannot read file: {0}")]
    Unreadable(String),

    #[error("malformed JSON: {0}")]
    MalformedJson(String),

    #[error("{at}: missing required field `{field}`")]
    MissingField { at: String, field: &'static str },

    #[error("{at}: expected {expected}")]
    WrongType { at: String, expected: &'static str },

    #[error("{at}: unknown check_type `{found}`")]
    UnknownCheckType { at: String, found: String },

    #[error("{at}: unknown field `{field}`")]
    UnknownField { at: String, field: String },

    #[error("{at}: must contain at least one item")]
    TooFewItems { at: String },

    #[error("{at}: items must be unique, item {index} repeats an earlier one")]
    DuplicateItem { at: String, index: usize },

    #[error("{at}: unsupported comparison operator `{found}`")]
    InvalidOperator { at: String, found: String },

    #[error("{at}: must not be empty")]
    EmptyString { at: String },

    #[error("descriptor name `{name}` is already defined in {first}")]
    DuplicateName { name: String, first: PathBuf },

    #[error("no descriptor files found")]
    NoDescriptors,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid descriptor {}: {reason}", path.display())]
pub struct DescriptorInvalid {
    pub path: PathBuf,
    pub reason: Violation,
}

impl DescriptorInvalid {
    pub fn new(path: impl Into<PathBuf>, reason: Violation) -> Self {
        Self { path: path.into(), reason }
    }
}

/// Malformed Solidity source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("parse error at {line}:{column}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self { line, column, message: message.into() }
    }
}

/// The file's `pragma solidity` cannot be satisfied by any supported compiler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("pragma solidity `{declared}` is outside the supported range `{supported}`")]
pub struct IncompatibleVersion {
    pub declared: String,
    pub supported: String,
}

/// Why a file in a batch produced no verdicts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FileError {
    #[error("unreadable source: {message}")]
    Unreadable { message: String },

    #[error(transparent)]
    Parse(ParseError),

    #[error(transparent)]
    IncompatibleVersion(IncompatibleVersion),
}

impl From<ParseError> for FileError {
    fn from(err: ParseError) -> Self {
        FileError::Parse(err)
    }
}

impl From<IncompatibleVersion> for FileError {
    fn from(err: IncompatibleVersion) -> Self {
        FileError::IncompatibleVersion(err)
    }
}
