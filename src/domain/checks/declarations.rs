//! Checks over declarations: parents, modifiers, functions, variables, enums
//! and return parameter lists.

use super::{match_each, signature, Candidate};
use crate::domain::ast::{Contract, FunctionDef, Parameter};
use crate::domain::descriptor::{CheckKind, ReturnParameterSpec};
use crate::domain::matcher::NamePattern;
use crate::domain::render::normalize;
use crate::domain::report::{CheckOutcome, Evidence, NodeKind};

/// Direct parents only; inherited members are never flattened in.
pub fn inheritance(contract: &Contract, parent_names: &[String]) -> CheckOutcome {
    let candidates: Vec<Candidate> = contract
        .parents
        .iter()
        .map(|p| {
            Candidate::named(
                p.name.clone(),
                Evidence::found(
                    NodeKind::InheritanceSpecifier,
                    p.line,
                    format!("{} is {}", contract.name, p.name),
                ),
            )
        })
        .collect();
    match_each(CheckKind::Inheritance, parent_names, NamePattern::new, &candidates, "parent")
}

pub fn modifier(contract: &Contract, modifiers: &[String]) -> CheckOutcome {
    let applied = contract.functions.iter().flat_map(|f| {
        f.modifiers.iter().map(move |m| {
            Candidate::named(
                m.name.clone(),
                Evidence::found_in(
                    NodeKind::ModifierInvocation,
                    f.display_name(),
                    m.line,
                    format!("{} {}", signature(f), m.name),
                ),
            )
        })
    });
    let defined = contract.modifiers.iter().map(|m| {
        let evidence = Evidence::found(NodeKind::Modifier, m.line, format!("modifier {}", m.name));
        Candidate::named(m.name.clone(), evidence)
    });
    let candidates: Vec<Candidate> = applied.chain(defined).collect();
    match_each(CheckKind::Modifier, modifiers, NamePattern::new, &candidates, "modifier")
}

pub fn fn_definition(contract: &Contract, fn_names: &[String]) -> CheckOutcome {
    let candidates: Vec<Candidate> = contract
        .functions
        .iter()
        .map(|f| {
            Candidate::named(
                f.display_name(),
                Evidence::found(NodeKind::Function, f.line, format!("function {}", signature(f))),
            )
        })
        .collect();
    match_each(CheckKind::FnDefinition, fn_names, NamePattern::new, &candidates, "function")
}

pub fn var_definition(contract: &Contract, var_names: &[String]) -> CheckOutcome {
    let candidates: Vec<Candidate> = contract
        .state_variables
        .iter()
        .map(|v| {
            Candidate::named(
                v.name.clone(),
                Evidence::found(
                    NodeKind::StateVariable,
                    v.line,
                    format!("{} {}", v.type_name, v.name),
                ),
            )
        })
        .collect();
    match_each(CheckKind::VarDefinition, var_names, NamePattern::new, &candidates, "state variable")
}

pub fn enum_definition(contract: &Contract, enum_names: &[String]) -> CheckOutcome {
    let candidates: Vec<Candidate> = contract
        .enums
        .iter()
        .map(|e| {
            Candidate::named(
                e.name.clone(),
                Evidence::found(
                    NodeKind::Enum,
                    e.line,
                    format!("enum {} {{ {} }}", e.name, e.members.join(", ")),
                ),
            )
        })
        .collect();
    match_each(CheckKind::EnumDefinition, enum_names, NamePattern::new, &candidates, "enum")
}

/// Some single function must return, for every listed entry, a distinct
/// parameter with that storage location and type.
pub fn fn_return_parameters(contract: &Contract, specs: &[ReturnParameterSpec]) -> CheckOutcome {
    let kind = CheckKind::FnReturnParameters;
    for function in &contract.functions {
        if let Some(assignment) = assign_returns(specs, &function.returns) {
            let evidence = assignment
                .into_iter()
                .map(|index| {
                    let param = &function.returns[index];
                    Evidence::found_in(
                        NodeKind::Parameter,
                        function.display_name(),
                        param.line,
                        format!("returns {param}"),
                    )
                })
                .collect();
            return CheckOutcome::pass(kind, evidence);
        }
    }

    let mut evidence: Vec<Evidence> = specs
        .iter()
        .filter(|spec| {
            !contract
                .functions
                .iter()
                .any(|f| f.returns.iter().any(|p| return_matches(spec, p)))
        })
        .map(|spec| Evidence::missing(format!("return parameter `{spec}`")))
        .collect();
    if evidence.is_empty() {
        let wanted: Vec<String> = specs.iter().map(|s| s.to_string()).collect();
        evidence.push(Evidence::missing(format!(
            "a single function returning all of: {}",
            wanted.join(", ")
        )));
    }
    CheckOutcome::fail(kind, evidence)
}

/// Indices of `returns` matched to each spec, every index used once.
fn assign_returns(specs: &[ReturnParameterSpec], returns: &[Parameter]) -> Option<Vec<usize>> {
    fn search(specs: &[ReturnParameterSpec], returns: &[Parameter], used: &mut Vec<usize>) -> bool {
        let Some((spec, rest)) = specs.split_first() else {
            return true;
        };
        for (index, param) in returns.iter().enumerate() {
            if used.contains(&index) || !return_matches(spec, param) {
                continue;
            }
            used.push(index);
            if search(rest, returns, used) {
                return true;
            }
            used.pop();
        }
        false
    }

    if specs.len() > returns.len() {
        return None;
    }
    let mut used = Vec::with_capacity(specs.len());
    search(specs, returns, &mut used).then_some(used)
}

pub(crate) fn return_matches(spec: &ReturnParameterSpec, param: &Parameter) -> bool {
    let location = spec.storage_location.trim().to_lowercase();
    let location_ok = match location.as_str() {
        "*" => true,
        "" | "none" | "default" => param.storage.is_none(),
        wanted => param.storage.map(|s| s.as_str()) == Some(wanted),
    };
    if !location_ok {
        return false;
    }

    let wanted = normalize(&spec.type_name);
    wanted == "*"
        || wanted == normalize(&param.type_name.to_string())
        || wanted == param.type_name.kind_tag().to_lowercase()
}

/// The function with the longest return list, first one on ties.
pub(crate) fn richest_returns(contract: &Contract) -> Option<&FunctionDef> {
    contract
        .functions
        .iter()
        .filter(|f| !f.returns.is_empty())
        .fold(None, |best: Option<&FunctionDef>, f| match best {
            Some(b) if b.returns.len() >= f.returns.len() => Some(b),
            _ => Some(f),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ast::{
        ContractKind, FunctionKind, InheritanceSpecifier, StorageLocation, TypeName,
    };

    fn spec(location: &str, ty: &str) -> ReturnParameterSpec {
        ReturnParameterSpec { storage_location: location.to_string(), type_name: ty.to_string() }
    }

    fn param(ty: TypeName, storage: Option<StorageLocation>) -> Parameter {
        Parameter { type_name: ty, storage, name: None, line: 4 }
    }

    fn elementary(ty: &str) -> Parameter {
        param(TypeName::Elementary(ty.into()), None)
    }

    fn function(name: &str, returns: Vec<Parameter>) -> FunctionDef {
        FunctionDef {
            name: name.to_string(),
            kind: FunctionKind::Function,
            visibility: Default::default(),
            mutability: Default::default(),
            parameters: vec![],
            returns,
            modifiers: vec![],
            body: Some(vec![]),
            line: 3,
        }
    }

    fn uint_array() -> TypeName {
        TypeName::Array { base: Box::new(TypeName::Elementary("uint256".into())), length: None }
    }

    #[test]
    fn test_inheritance_requires_every_parent() {
        let mut contract = Contract::new("Mortal", ContractKind::Contract, 1);
        let parent = InheritanceSpecifier { name: "Ownable".into(), arguments: vec![], line: 1 };
        contract.parents.push(parent);

        assert!(inheritance(&contract, &["ownable".to_string()]).passed);
        let outcome = inheritance(&contract, &["Ownable".to_string(), "Pausable".to_string()]);
        assert!(!outcome.passed);
        assert_eq!(outcome.evidence.len(), 2);

        let bare = Contract::new("Bare", ContractKind::Contract, 1);
        assert!(!inheritance(&bare, &["Ownable".to_string()]).passed);
    }

    #[test]
    fn test_return_parameters_accept_kind_tags_and_wildcards() {
        let returned = param(uint_array(), Some(StorageLocation::Memory));
        assert!(return_matches(&spec("memory", "uint256[]"), &returned));
        assert!(return_matches(&spec("*", "ArrayTypeName"), &returned));
        assert!(!return_matches(&spec("storage", "uint256[]"), &returned));
        assert!(return_matches(&spec("", "bool"), &elementary("bool")));
    }

    #[test]
    fn test_each_entry_consumes_a_distinct_return_parameter() {
        let mut contract = Contract::new("C", ContractKind::Contract, 1);
        contract.functions.push(function("get", vec![elementary("uint256"), elementary("bool")]));

        let specs = [spec("*", "ElementaryTypeName"), spec("", "uint256")];
        let both = fn_return_parameters(&contract, &specs);
        assert!(both.passed, "{:?}", both.evidence);

        let three = fn_return_parameters(
            &contract,
            &[spec("*", "ElementaryTypeName"), spec("*", "ElementaryTypeName"), spec("", "bool")],
        );
        assert!(!three.passed);
    }

    #[test]
    fn test_richest_returns_prefers_longest_list() {
        let memory_array = || param(uint_array(), Some(StorageLocation::Memory));
        let mut contract = Contract::new("C", ContractKind::Contract, 1);
        contract.functions.push(function("one", vec![memory_array()]));
        contract.functions.push(function("two", vec![memory_array(), elementary("bool")]));
        assert_eq!(richest_returns(&contract).map(|f| f.name.as_str()), Some("two"));
    }
}
