//! Describe mode: what every check kind observes in a contract, without a
//! descriptor. Used to author new descriptors from a reference contract.

use serde::Serialize;

use super::ast::Contract;
use super::checks::{self, declarations, expressions, Candidate};
use super::descriptor::{BinaryOperationSpec, Check, CheckKind, Descriptor, ReturnParameterSpec};
use super::report::CheckOutcome;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FactSheet {
    pub contract: String,
    /// Parameters seen for each parameterised kind; lists may be empty.
    pub observed: Vec<Check>,
    /// Outcome of each parameterless kind.
    pub structural: Vec<CheckOutcome>,
}

fn push_unique<T: PartialEq>(items: &mut Vec<T>, item: T) {
    if !items.contains(&item) {
        items.push(item);
    }
}

fn first_names(candidates: Vec<Candidate>) -> Vec<String> {
    let mut names = Vec::new();
    for candidate in candidates {
        if let Some(name) = candidate.names.into_iter().next() {
            push_unique(&mut names, name);
        }
    }
    names
}

fn unique<I: IntoIterator<Item = String>>(items: I) -> Vec<String> {
    let mut out = Vec::new();
    for item in items {
        push_unique(&mut out, item);
    }
    out
}

pub fn describe(contract: &Contract) -> FactSheet {
    let mut comparisons = Vec::new();
    for site in expressions::comparisons(contract) {
        push_unique(
            &mut comparisons,
            BinaryOperationSpec {
                operator: site.operator,
                operand_1: site.left.to_string(),
                operand_2: site.right.to_string(),
            },
        );
    }

    let mut returns = Vec::new();
    if let Some(function) = declarations::richest_returns(contract) {
        for param in &function.returns {
            push_unique(
                &mut returns,
                ReturnParameterSpec {
                    storage_location: param
                        .storage
                        .map(|s| s.as_str().to_string())
                        .unwrap_or_default(),
                    type_name: param.type_name.to_string(),
                },
            );
        }
    }

    let modifiers = unique(
        contract
            .functions
            .iter()
            .flat_map(|f| f.modifiers.iter().map(|m| m.name.clone()))
            .chain(contract.modifiers.iter().map(|m| m.name.clone())),
    );

    let observed = vec![
        Check::Comparison { binary_operations: comparisons },
        Check::Inheritance {
            parent_names: unique(contract.parents.iter().map(|p| p.name.clone())),
        },
        Check::Modifier { modifiers },
        Check::FnReturnParameters { parameters_list: returns },
        Check::FnCall { callable_function: first_names(expressions::call_candidates(contract)) },
        Check::FnDefinition {
            fn_names: unique(contract.functions.iter().map(|f| f.display_name().to_string())),
        },
        Check::VarDefinition {
            var_names: unique(contract.state_variables.iter().map(|v| v.name.clone())),
        },
        Check::EventEmit { event_names: event_paths(contract) },
        Check::EnumDefinition { enum_names: unique(contract.enums.iter().map(|e| e.name.clone())) },
        Check::StateToggle { state_names: first_names(expressions::toggles(contract)) },
    ];

    let structural = CheckKind::ALL
        .into_iter()
        .filter_map(Check::parameterless)
        .map(|check| checks::run(&check, contract))
        .collect();

    FactSheet { contract: contract.name.clone(), observed, structural }
}

/// Emitted events by their written path so qualified events stay exact.
fn event_paths(contract: &Contract) -> Vec<String> {
    let mut names = Vec::new();
    for candidate in expressions::emitted_events(contract) {
        if let Some(path) = candidate.names.last() {
            push_unique(&mut names, path.clone());
        }
    }
    names
}

impl FactSheet {
    /// A descriptor named after the contract that requires everything observed.
    /// `None` when nothing was observed at all.
    pub fn to_descriptor(&self) -> Option<Descriptor> {
        let checks: Vec<Check> = self
            .observed
            .iter()
            .filter(|c| c.parameter_count() > 0)
            .cloned()
            .chain(
                self.structural
                    .iter()
                    .filter(|o| o.passed)
                    .filter_map(|o| Check::parameterless(o.check)),
            )
            .collect();
        if checks.is_empty() {
            return None;
        }
        Some(Descriptor {
            name: self.contract.clone(),
            description: Some(format!("Generated from contract {}", self.contract)),
            checks,
        })
    }

    pub fn observed(&self, kind: CheckKind) -> Option<&Check> {
        self.observed.iter().find(|c| c.kind() == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ast::{
        ContractKind, EnumDef, FunctionDef, FunctionKind, InheritanceSpecifier,
    };
    use crate::domain::evaluator::evaluate;

    fn contract() -> Contract {
        let mut contract = Contract::new("Lifecycle", ContractKind::Contract, 1);
        contract.parents.push(InheritanceSpecifier {
            name: "Ownable".into(),
            arguments: vec![],
            line: 1,
        });
        contract.enums.push(EnumDef {
            name: "Stage".into(),
            members: vec!["Open".into(), "Closed".into()],
            line: 2,
        });
        for name in ["open", "close", "open"] {
            contract.functions.push(FunctionDef {
                name: name.into(),
                kind: FunctionKind::Function,
                visibility: Default::default(),
                mutability: Default::default(),
                parameters: vec![],
                returns: vec![],
                modifiers: vec![],
                body: Some(vec![]),
                line: 3,
            });
        }
        contract
    }

    #[test]
    fn test_fact_sheet_deduplicates_overloads() {
        let sheet = describe(&contract());
        assert_eq!(
            sheet.observed(CheckKind::FnDefinition),
            Some(&Check::FnDefinition { fn_names: vec!["open".into(), "close".into()] })
        );
        assert_eq!(sheet.structural.len(), 6);
    }

    #[test]
    fn test_generated_descriptor_matches_its_contract() {
        let contract = contract();
        let descriptor = describe(&contract).to_descriptor().unwrap();
        assert_eq!(descriptor.name, "Lifecycle");
        let filled = |c: &Check| c.kind().is_parameterless() || c.parameter_count() > 0;
        assert!(descriptor.checks.iter().all(filled));
        assert!(evaluate(&contract, &descriptor).matched);
    }

    #[test]
    fn test_empty_contract_yields_no_descriptor() {
        let empty = Contract::new("Empty", ContractKind::Interface, 1);
        assert_eq!(describe(&empty).to_descriptor(), None);
    }
}
