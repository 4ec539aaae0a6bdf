use std::fs;
use std::path::{Path, PathBuf};

use indoc::indoc;
use pretty_assertions::assert_eq;
use solpattern::application::AnalyzeUsecase;
use solpattern::config::IncompatiblePolicy;
use solpattern::domain::errors::FileError;
use solpattern::infrastructure::{
    load_descriptors, PragmaVersionGate, SolidityParser, SourceLoader,
};
use solpattern::ports::report_exporter::{CsvExporter, JsonExporter};
use solpattern::ports::ReportExporter;
use tempfile::tempdir;

const VAULT: &str = indoc! {r#"
    pragma solidity ^0.8.0;

    contract Vault {
        address public owner;

        modifier onlyOwner() {
            require(msg.sender == owner);
            _;
        }

        function sweep() external onlyOwner {
            payable(owner).transfer(address(this).balance);
        }
    }
"#};

const ANCIENT: &str = indoc! {r#"
    pragma solidity ^0.3.6;

    contract Old {
        address owner;
    }
"#};

fn descriptors_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("descriptors")
}

fn orchestrator(gate: &PragmaVersionGate, policy: IncompatiblePolicy) -> AnalyzeUsecase<'_> {
    AnalyzeUsecase { parser: &SolidityParser, version_gate: gate, policy }
}

fn write_sources(dir: &Path) -> Vec<PathBuf> {
    fs::write(dir.join("vault.sol"), VAULT).unwrap();
    let broken = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/broken.sol");
    fs::copy(broken, dir.join("broken.sol")).unwrap();
    fs::write(dir.join("old.sol"), ANCIENT).unwrap();
    SourceLoader::new(&["sol".to_string()]).collect(dir).unwrap()
}

#[test]
fn one_bad_file_does_not_abort_the_batch() {
    let dir = tempdir().unwrap();
    let files = write_sources(dir.path());
    assert_eq!(files.len(), 3);

    let descriptors = load_descriptors(&descriptors_dir()).unwrap();
    let gate = PragmaVersionGate::new(">=0.4.0 <0.9.0").unwrap();
    let usecase = orchestrator(&gate, IncompatiblePolicy::Skip);
    let report = usecase.analyze_batch(&files, &descriptors);

    assert_eq!(report.files.len(), 3);
    assert_eq!(report.failed().count(), 2);

    let broken = report.file(&dir.path().join("broken.sol")).unwrap();
    match &broken.error {
        Some(FileError::Parse(err)) => assert_eq!(err.line, 4),
        other => panic!("expected a parse error, got {other:?}"),
    }
    assert!(matches!(
        report.file(&dir.path().join("old.sol")).unwrap().error,
        Some(FileError::IncompatibleVersion(_))
    ));

    let vault = report.file(&dir.path().join("vault.sol")).unwrap();
    let matched: Vec<&str> = vault.contract("Vault").unwrap().matched().collect();
    assert_eq!(matched, vec!["Access Restriction", "Guard Check", "Ownership"]);
}

#[test]
fn warn_policy_analyzes_incompatible_files() {
    let dir = tempdir().unwrap();
    let files = write_sources(dir.path());

    let descriptors = load_descriptors(&descriptors_dir()).unwrap();
    let gate = PragmaVersionGate::new(">=0.4.0 <0.9.0").unwrap();
    let usecase = orchestrator(&gate, IncompatiblePolicy::Warn);
    let report = usecase.analyze_batch(&files, &descriptors);

    let old = report.file(&dir.path().join("old.sol")).unwrap();
    assert!(old.error.is_none());
    assert_eq!(old.warnings.len(), 1);
    assert_eq!(report.failed().count(), 1);
}

#[test]
fn exports_are_keyed_by_path() {
    let dir = tempdir().unwrap();
    let files = write_sources(dir.path());
    let descriptors = load_descriptors(&descriptors_dir()).unwrap();
    let gate = PragmaVersionGate::new(">=0.4.0 <0.9.0").unwrap();
    let usecase = orchestrator(&gate, IncompatiblePolicy::Skip);

    let forward = usecase.analyze_batch(&files, &descriptors);
    let mut reversed_files = files.clone();
    reversed_files.reverse();
    let backward = usecase.analyze_batch(&reversed_files, &descriptors);
    assert_eq!(forward, backward);

    let csv = CsvExporter.render(&forward).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 2, "header plus the one analyzed contract:\n{csv}");
    assert!(lines[0].starts_with("src_file,contract_name,access_restriction,"));
    let flags = ",Vault,true,false,false,false,true,false,true,false,false,false,false,false,false";
    assert!(lines[1].ends_with(flags), "{}", lines[1]);

    let out = dir.path().join("report.json");
    JsonExporter.export(&forward, &out.to_string_lossy()).unwrap();
    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    let files = json["files"].as_object().unwrap();
    assert_eq!(files.len(), 3);
}
