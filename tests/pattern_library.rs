use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;
use solpattern::application::AnalyzeUsecase;
use solpattern::config::IncompatiblePolicy;
use solpattern::domain::descriptor::DescriptorSet;
use solpattern::domain::report::FileReport;
use solpattern::infrastructure::{load_descriptors, PragmaVersionGate, SolidityParser};

fn manifest_path(relative: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join(relative)
}

fn library() -> DescriptorSet {
    load_descriptors(&manifest_path("descriptors")).expect("bundled descriptors load")
}

fn analyze_fixture(name: &str) -> FileReport {
    let gate = PragmaVersionGate::new(">=0.4.0 <0.9.0").unwrap();
    let usecase = AnalyzeUsecase {
        parser: &SolidityParser,
        version_gate: &gate,
        policy: IncompatiblePolicy::Skip,
    };
    let report = usecase.analyze_file(&manifest_path(&format!("fixtures/{name}")), &library());
    assert!(report.error.is_none(), "{name} failed: {:?}", report.error);
    report
}

fn matched(report: &FileReport, contract: &str) -> Vec<String> {
    report
        .contract(contract)
        .unwrap_or_else(|| panic!("no contract {contract}"))
        .matched()
        .map(str::to_string)
        .collect()
}

#[test]
fn bundled_library_loads_in_name_order() {
    let set = library();
    let names: Vec<&str> = set.names().collect();
    assert_eq!(
        names,
        vec![
            "Access Restriction",
            "Checks Effects Interactions",
            "Emergency Stop",
            "Eternal Storage",
            "Guard Check",
            "Memory Array Building",
            "Ownership",
            "Proxy Delegate",
            "Rejector",
            "Revert Guard",
            "Secure Ether Transfer",
            "State Machine",
            "Tight Variable Packing",
        ]
    );
}

#[test]
fn ownership_is_not_inherited() {
    let report = analyze_fixture("ownership.sol");
    assert_eq!(matched(&report, "Owned"), vec!["Access Restriction", "Guard Check", "Ownership"]);

    let mortal = report.contract("Mortal").unwrap();
    let ownership = mortal.verdict("Ownership").unwrap();
    assert!(!ownership.matched);
    assert!(!ownership.outcomes[0].passed, "Mortal declares no `owner` of its own");
}

#[test]
fn bank_matches_its_safety_patterns() {
    let report = analyze_fixture("bank.sol");
    assert_eq!(
        matched(&report, "Bank"),
        vec![
            "Access Restriction",
            "Checks Effects Interactions",
            "Emergency Stop",
            "Guard Check",
            "Ownership",
            "Rejector",
            "Revert Guard",
            "Secure Ether Transfer",
        ]
    );
}

#[test]
fn state_written_after_external_call_breaks_cei() {
    let report = analyze_fixture("bank.sol");
    let leaky = report.contract("LeakyBank").unwrap();
    let cei = leaky.verdict("Checks Effects Interactions").unwrap();
    assert!(!cei.matched);
    let summary = cei.outcomes[0].evidence[0].summary();
    assert!(summary.contains("balances"), "got {summary}");

    // The fallback accepts ether, so it is no rejector either.
    assert!(!leaky.verdict("Rejector").unwrap().matched);
}

#[test]
fn proxies_delegate_from_the_fallback() {
    let report = analyze_fixture("proxy.sol");
    assert!(report.contract("Proxy").unwrap().verdict("Proxy Delegate").unwrap().matched);
    assert!(report.contract("AssemblyProxy").unwrap().verdict("Proxy Delegate").unwrap().matched);
    assert!(!report.contract("Forwarder").unwrap().verdict("Proxy Delegate").unwrap().matched);
}

#[test]
fn delegate_target_may_be_copied_into_a_local() {
    let report = analyze_fixture("proxy.sol");
    assert!(report.contract("AliasProxy").unwrap().verdict("Proxy Delegate").unwrap().matched);
    assert!(!report.contract("ReboundProxy").unwrap().verdict("Proxy Delegate").unwrap().matched);
}

#[test]
fn storage_patterns() {
    let report = analyze_fixture("storage.sol");
    assert_eq!(matched(&report, "EternalStorage"), vec!["Eternal Storage"]);
    assert_eq!(
        matched(&report, "Registry"),
        vec!["Memory Array Building", "Tight Variable Packing"]
    );
    assert!(matched(&report, "Auction").contains(&"State Machine".to_string()));
}

#[test]
fn require_and_revert_guards_match_on_their_own() {
    let report = analyze_fixture("guarded.sol");
    assert_eq!(matched(&report, "Registrar"), vec!["Guard Check"]);
    assert_eq!(matched(&report, "CustomErrorRegistrar"), vec!["Revert Guard"]);
}

#[test]
fn legacy_throwing_fallback_is_a_rejector() {
    let report = analyze_fixture("legacy.sol");
    assert_eq!(report.pragma.as_deref(), Some("^0.4.24"));
    assert!(report.contract("Rejecting").unwrap().verdict("Rejector").unwrap().matched);
}

#[test]
fn repeated_analysis_is_identical() {
    assert_eq!(analyze_fixture("bank.sol"), analyze_fixture("bank.sol"));
}
