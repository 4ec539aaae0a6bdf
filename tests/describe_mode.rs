use std::fs;
use std::path::{Path, PathBuf};

use solpattern::application::AnalyzeUsecase;
use solpattern::config::IncompatiblePolicy;
use solpattern::domain::descriptor::{Check, CheckKind, Descriptor, DescriptorSet};
use solpattern::domain::evaluator::evaluate;
use solpattern::infrastructure::descriptor_store::load_descriptor_file;
use solpattern::infrastructure::solidity::parse_source;
use solpattern::infrastructure::{PragmaVersionGate, SolidityParser};
use solpattern::ports::report_exporter::write_descriptors;
use tempfile::tempdir;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures").join(name)
}

fn usecase(gate: &PragmaVersionGate) -> AnalyzeUsecase<'_> {
    AnalyzeUsecase { parser: &SolidityParser, version_gate: gate, policy: IncompatiblePolicy::Skip }
}

#[test]
fn fact_sheet_reports_what_the_contract_contains() {
    let gate = PragmaVersionGate::new("*").unwrap();
    let sheets = usecase(&gate).describe_file(&fixture("bank.sol")).unwrap();
    let names: Vec<&str> = sheets.iter().map(|s| s.contract.as_str()).collect();
    assert_eq!(names, vec!["Bank", "LeakyBank"]);

    let bank = &sheets[0];
    assert_eq!(
        bank.observed(CheckKind::StateToggle),
        Some(&Check::StateToggle { state_names: vec!["stopped".into()] })
    );
    let Some(Check::Modifier { modifiers }) = bank.observed(CheckKind::Modifier) else {
        panic!("modifier facts missing");
    };
    assert!(modifiers.contains(&"stopInEmergency".to_string()));

    let rejector = bank.structural.iter().find(|o| o.check == CheckKind::Rejector).unwrap();
    assert!(rejector.passed);
}

#[test]
fn generated_descriptors_match_their_own_contracts() {
    for name in ["bank.sol", "ownership.sol", "proxy.sol", "storage.sol"] {
        let source = fs::read_to_string(fixture(name)).unwrap();
        let unit = parse_source(&source).unwrap();
        let gate = PragmaVersionGate::new("*").unwrap();
        let sheets = usecase(&gate).describe_source(&source).unwrap();
        for (contract, sheet) in unit.contracts.iter().zip(&sheets) {
            let Some(descriptor) = sheet.to_descriptor() else {
                continue;
            };
            let verdict = evaluate(contract, &descriptor);
            assert!(
                verdict.matched,
                "{name}: {} does not match its own descriptor: {verdict:?}",
                contract.name
            );
        }
    }
}

#[test]
fn written_descriptors_load_back() {
    let gate = PragmaVersionGate::new("*").unwrap();
    let sheets = usecase(&gate).describe_file(&fixture("storage.sol")).unwrap();
    let dir = tempdir().unwrap();
    let written = write_descriptors(&sheets, dir.path()).unwrap();
    assert_eq!(written.len(), 3);
    assert!(written[0].ends_with("EternalStorage_descriptor.json"));

    let loaded: Vec<(PathBuf, Descriptor)> = written
        .iter()
        .map(|path| (path.clone(), load_descriptor_file(path).unwrap()))
        .collect();
    let set = DescriptorSet::from_loaded(loaded).unwrap();
    let names: Vec<&str> = set.names().collect();
    assert_eq!(names, vec!["Auction", "EternalStorage", "Registry"]);
}
