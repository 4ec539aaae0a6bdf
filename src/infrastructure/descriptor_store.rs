//! Descriptor Store: loads the pattern library from a file or a directory.
//!
//! Loading is all-or-nothing. One invalid file fails the whole load so a
//! missing pattern is never mistaken for a pattern that was not found.

use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::domain::descriptor::{Descriptor, DescriptorSet};
use crate::domain::errors::{DescriptorInvalid, Violation};

/// Loads one descriptor file, validating it.
pub fn load_descriptor_file(path: &Path) -> Result<Descriptor, DescriptorInvalid> {
    let text = fs::read_to_string(path)
        .map_err(|e| DescriptorInvalid::new(path, Violation::Unreadable(e.to_string())))?;
    Descriptor::from_json(&text).map_err(|reason| DescriptorInvalid::new(path, reason))
}

/// `*.json` files under `dir`, recursively, in path order.
fn descriptor_files(dir: &Path) -> Result<Vec<PathBuf>, DescriptorInvalid> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry =
            entry.map_err(|e| DescriptorInvalid::new(dir, Violation::Unreadable(e.to_string())))?;
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

/// Loads a single descriptor file or every `*.json` file under a directory.
pub fn load_descriptors(path: &Path) -> Result<DescriptorSet, DescriptorInvalid> {
    let files = if path.is_dir() {
        descriptor_files(path)?
    } else if path.is_file() {
        vec![path.to_path_buf()]
    } else {
        let missing = Violation::Unreadable("no such file or directory".into());
        return Err(DescriptorInvalid::new(path, missing));
    };
    if files.is_empty() {
        return Err(DescriptorInvalid::new(path, Violation::NoDescriptors));
    }

    let results: Vec<Result<(PathBuf, Descriptor), DescriptorInvalid>> = files
        .par_iter()
        .map(|file| load_descriptor_file(file).map(|d| (file.clone(), d)))
        .collect();

    // Report the first failure in path order so the error is deterministic.
    let mut loaded = Vec::with_capacity(results.len());
    for result in results {
        let (file, descriptor) = result?;
        debug!(
            path = %file.display(),
            descriptor = %descriptor.name,
            checks = descriptor.checks.len(),
            "descriptor loaded"
        );
        loaded.push((file, descriptor));
    }

    let set = DescriptorSet::from_loaded(loaded)?;
    info!(count = set.len(), path = %path.display(), "descriptor library ready");
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const OWNERSHIP: &str = r#"{
        "name": "Ownership",
        "checks": [{"check_type": "inheritance", "parent_names": ["Ownable"]}]
    }"#;

    #[test]
    fn test_single_file_and_directory() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("ownership.json");
        fs::write(&file, OWNERSHIP).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        assert_eq!(load_descriptors(&file).unwrap().len(), 1);
        let set = load_descriptors(dir.path()).unwrap();
        assert_eq!(set.names().collect::<Vec<_>>(), vec!["Ownership"]);
    }

    #[test]
    fn test_empty_directory_is_an_error() {
        let dir = tempdir().unwrap();
        let err = load_descriptors(dir.path()).unwrap_err();
        assert_eq!(err.reason, Violation::NoDescriptors);
    }

    #[test]
    fn test_one_bad_file_fails_the_whole_load() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.json"), OWNERSHIP).unwrap();
        fs::write(dir.path().join("b.json"), r#"{"name": "Broken", "checks": []}"#).unwrap();
        let err = load_descriptors(dir.path()).unwrap_err();
        assert!(err.path.ends_with("b.json"));
        assert!(matches!(err.reason, Violation::TooFewItems { .. }));
    }
}
