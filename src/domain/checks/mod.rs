//! The sixteen structural checks.
//!
//! Every check is a pure function of one contract's own declarations and the
//! check parameters. [`run`] is the single dispatch point over [`Check`].

pub mod declarations;
pub mod expressions;
pub mod flow;
pub mod structural;

use super::ast::{Contract, FunctionDef};
use super::descriptor::{Check, CheckKind};
use super::matcher::NamePattern;
use super::report::{CheckOutcome, Evidence};

pub fn run(check: &Check, contract: &Contract) -> CheckOutcome {
    match check {
        Check::Comparison { binary_operations } => {
            expressions::comparison(contract, binary_operations)
        }
        Check::Inheritance { parent_names } => declarations::inheritance(contract, parent_names),
        Check::Modifier { modifiers } => declarations::modifier(contract, modifiers),
        Check::Rejector => structural::rejector(contract),
        Check::TightVariablePacking => structural::tight_variable_packing(contract),
        Check::FnReturnParameters { parameters_list } => {
            declarations::fn_return_parameters(contract, parameters_list)
        }
        Check::MemoryArrayBuilding => flow::memory_array_building(contract),
        Check::FnCall { callable_function } => expressions::fn_call(contract, callable_function),
        Check::FnDefinition { fn_names } => declarations::fn_definition(contract, fn_names),
        Check::VarDefinition { var_names } => declarations::var_definition(contract, var_names),
        Check::EventEmit { event_names } => expressions::event_emit(contract, event_names),
        Check::EnumDefinition { enum_names } => declarations::enum_definition(contract, enum_names),
        Check::CheckEffectsInteraction => flow::check_effects_interaction(contract),
        Check::StateToggle { state_names } => expressions::state_toggle(contract, state_names),
        Check::Relay => structural::relay(contract),
        Check::EternalStorage => structural::eternal_storage(contract),
    }
}

/// Something a name pattern can be matched against. A candidate may answer
/// to several names, e.g. a call to `owner.transfer` is both
/// `owner.transfer` and `transfer`.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub names: Vec<String>,
    pub evidence: Evidence,
}

impl Candidate {
    pub fn named(name: impl Into<String>, evidence: Evidence) -> Self {
        Self { names: vec![name.into()], evidence }
    }

    fn answers(&self, pattern: &NamePattern) -> bool {
        self.names.iter().any(|n| pattern.matches(n))
    }
}

/// AND over `patterns`: each one must be answered by some candidate.
pub(crate) fn match_each(
    kind: CheckKind,
    patterns: &[String],
    compile: fn(&str) -> NamePattern,
    candidates: &[Candidate],
    what: &str,
) -> CheckOutcome {
    let mut passed = true;
    let mut evidence = Vec::with_capacity(patterns.len());
    for raw in patterns {
        let pattern = compile(raw);
        match candidates.iter().find(|c| c.answers(&pattern)) {
            Some(candidate) => evidence.push(candidate.evidence.clone()),
            None => {
                passed = false;
                evidence.push(Evidence::missing(format!("{what} `{raw}`")));
            }
        }
    }
    CheckOutcome::new(kind, passed, evidence)
}

pub(crate) fn signature(function: &FunctionDef) -> String {
    let parameters: Vec<String> = function.parameters.iter().map(|p| p.to_string()).collect();
    format!("{}({})", function.display_name(), parameters.join(", "))
}

/// Guard calls whose arguments do not count as business logic.
pub(crate) fn is_guard(name: &str) -> bool {
    matches!(name, "require" | "assert" | "revert")
}
