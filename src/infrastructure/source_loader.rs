use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use walkdir::{DirEntry, WalkDir};

/// Finds the Solidity sources an analysis run covers.
pub struct SourceLoader {
    extensions: Vec<String>,
}

impl SourceLoader {
    pub fn new(extensions: &[String]) -> Self {
        Self {
            extensions: extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    fn is_source(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }

    fn is_skipped_dir(entry: &DirEntry) -> bool {
        entry.depth() > 0
            && entry.file_type().is_dir()
            && matches!(entry.file_name().to_str(), Some(".git" | "node_modules" | "target"))
    }

    /// A file target is taken as is, whatever its extension. A directory is
    /// walked recursively for files with a configured extension. Paths come
    /// back sorted.
    pub fn collect(&self, target: &Path) -> Result<Vec<PathBuf>> {
        if target.is_file() {
            return Ok(vec![target.to_path_buf()]);
        }
        if !target.is_dir() {
            bail!("target {} does not exist", target.display());
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(target).follow_links(true).into_iter();
        for entry in walker.filter_entry(|e| !Self::is_skipped_dir(e)) {
            let entry = entry.with_context(|| format!("Failed to walk {}", target.display()))?;
            if entry.file_type().is_file() && self.is_source(entry.path()) {
                files.push(entry.into_path());
            }
        }
        files.sort();
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_collects_sol_files_recursively_and_skips_vendored_dirs() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("nested")).unwrap();
        fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
        fs::write(dir.path().join("b.sol"), "").unwrap();
        fs::write(dir.path().join("nested/a.SOL"), "").unwrap();
        fs::write(dir.path().join("readme.md"), "").unwrap();
        fs::write(dir.path().join("node_modules/pkg/c.sol"), "").unwrap();

        let loader = SourceLoader::new(&["sol".to_string()]);
        let files = loader.collect(dir.path()).unwrap();
        let names: Vec<_> =
            files.iter().map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf()).collect();
        assert_eq!(names, vec![PathBuf::from("b.sol"), PathBuf::from("nested/a.SOL")]);
    }

    #[test]
    fn test_missing_target_is_an_error() {
        let loader = SourceLoader::new(&["sol".to_string()]);
        assert!(loader.collect(Path::new("/definitely/not/here")).is_err());
    }
}
