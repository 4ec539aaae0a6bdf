//! Shape checks: fallbacks, struct layout and storage indirection.

use std::collections::{HashMap, HashSet};

use super::is_guard;
use crate::domain::ast::{
    AssignOperator, Contract, Expression, ExpressionKind, FunctionDef, FunctionKind, Parameter,
    Statement, StatementKind, TypeName, Visibility,
};
use crate::domain::descriptor::CheckKind;
use crate::domain::layout::StructPacking;
use crate::domain::report::{CheckOutcome, Evidence, NodeKind};
use crate::domain::visit::{CallSite, Expressions, Statements};

/// Statements that do real work, with nested blocks flattened away.
fn leaf_statements(body: &[Statement]) -> impl Iterator<Item = &Statement> {
    Statements::new(body).filter(|s| {
        !matches!(s.kind, StatementKind::Block { .. } | StatementKind::Unchecked { .. })
    })
}

/// `revert()`, `revert("..")`, `revert Err()`, `require(false, ..)`,
/// `assert(false)` or `throw`.
fn is_unconditional_revert(statement: &Statement) -> bool {
    match &statement.kind {
        StatementKind::Revert { .. } | StatementKind::Throw => true,
        StatementKind::Expression { expression } => {
            let Some(call) = CallSite::from_expression(expression) else {
                return false;
            };
            match call.callee_path().as_str() {
                "revert" => true,
                "require" | "assert" => {
                    call.arguments.first().is_some_and(|a| a.is_bool_literal(false))
                }
                _ => false,
            }
        }
        _ => false,
    }
}

pub fn rejector(contract: &Contract) -> CheckOutcome {
    let kind = CheckKind::Rejector;
    let mut evidence = Vec::new();
    for fallback in contract.fallbacks() {
        let scope = fallback.display_name();
        let leaves: Vec<&Statement> = leaf_statements(fallback.statements()).collect();
        if leaves.is_empty() {
            evidence.push(Evidence::conflict(
                NodeKind::Function,
                Some(scope),
                fallback.line,
                "fallback with empty body",
                "accepts every call",
            ));
            continue;
        }
        match leaves.iter().find(|s| !is_unconditional_revert(s)) {
            None => {
                let found = leaves
                    .iter()
                    .map(|s| Evidence::found_in(NodeKind::Statement, scope, s.line, s.to_string()))
                    .collect();
                return CheckOutcome::pass(kind, found);
            }
            Some(other) => evidence.push(Evidence::conflict(
                NodeKind::Statement,
                Some(scope),
                other.line,
                other.to_string(),
                "fallback does more than revert",
            )),
        }
    }
    if evidence.is_empty() {
        evidence.push(Evidence::missing("fallback function"));
    }
    CheckOutcome::fail(kind, evidence)
}

pub fn tight_variable_packing(contract: &Contract) -> CheckOutcome {
    let kind = CheckKind::TightVariablePacking;
    if contract.structs.is_empty() {
        return CheckOutcome::fail(kind, vec![Evidence::missing("struct declaration")]);
    }

    let packings: Vec<StructPacking> = contract
        .structs
        .iter()
        .map(|s| StructPacking::of(s, &contract.enums))
        .collect();
    let tight: Vec<Evidence> = packings
        .iter()
        .filter(|p| p.is_tight())
        .map(|p| {
            let shared: u32 = p.runs.iter().filter(|r| r.shares_slot()).map(|r| r.bytes).sum();
            Evidence::found(
                NodeKind::Struct,
                p.def.line,
                format!(
                    "struct {}: {} fields share slots ({} bytes packed)",
                    p.def.name,
                    p.def.fields.len(),
                    shared
                ),
            )
        })
        .collect();
    if !tight.is_empty() {
        return CheckOutcome::pass(kind, tight);
    }

    let evidence = packings
        .iter()
        .map(|p| match p.overflowing_run() {
            Some(run) => {
                let fields: Vec<&str> =
                    run.fields.iter().map(|&i| p.def.fields[i].name.as_str()).collect();
                Evidence::conflict(
                    NodeKind::Struct,
                    None,
                    p.def.line,
                    format!("struct {}", p.def.name),
                    format!(
                        "fields {} need {} bytes and cross a slot boundary",
                        fields.join(", "),
                        run.bytes
                    ),
                )
            }
            None => Evidence::conflict(
                NodeKind::Struct,
                None,
                p.def.line,
                format!("struct {}", p.def.name),
                "no two fields share a slot",
            ),
        })
        .collect();
    CheckOutcome::fail(kind, evidence)
}

/// Identifiers inside `require`/`assert`/`revert` arguments.
fn guarded_identifiers(body: &[Statement]) -> HashSet<*const Expression> {
    Expressions::in_body(body)
        .filter_map(CallSite::from_expression)
        .filter(|call| call.callee_name().is_some_and(is_guard))
        .flat_map(|call| call.arguments.iter().flat_map(Expressions::of))
        .map(|e| e as *const Expression)
        .collect()
}

/// State variables read or written by `body`, guards excluded.
fn touched_state<'a>(contract: &'a Contract, body: &[Statement]) -> Vec<&'a str> {
    let guarded = guarded_identifiers(body);
    let mut touched: Vec<&'a str> = Vec::new();
    for expression in Expressions::in_body(body) {
        if guarded.contains(&(expression as *const Expression)) {
            continue;
        }
        let variable = expression.identifier().and_then(|name| contract.state_variable(name));
        if let Some(variable) = variable {
            if !touched.contains(&variable.name.as_str()) {
                touched.push(&variable.name);
            }
        }
    }
    touched
}

fn reads_state_in_assembly(contract: &Contract, code: &str) -> bool {
    code.contains("sload")
        || contract.state_variables.iter().any(|v| {
            code.split(|c: char| !(c.is_alphanumeric() || c == '_'))
                .any(|word| word == v.name)
        })
}

enum RelayShape {
    Delegates(Evidence),
    Missing,
    Rejected(Evidence),
}

/// Locals bound exactly once in `body`, from a state variable.
fn state_aliases<'b>(contract: &Contract, body: &'b [Statement]) -> HashSet<&'b str> {
    let mut bindings: HashMap<&str, Vec<&Expression>> = HashMap::new();
    for statement in Statements::new(body) {
        let StatementKind::VariableDeclaration { declarations, initial_value: Some(value) } =
            &statement.kind
        else {
            continue;
        };
        if let [Some(Parameter { name: Some(name), .. })] = declarations.as_slice() {
            bindings.entry(name.as_str()).or_default().push(value);
        }
    }
    for expression in Expressions::in_body(body) {
        let ExpressionKind::Assignment { operator, left, right } = &expression.kind else {
            continue;
        };
        let ExpressionKind::Identifier(name) = &left.kind else {
            continue;
        };
        if contract.is_state_variable(name) {
            continue;
        }
        let values = bindings.entry(name.as_str()).or_default();
        values.push(right.as_ref());
        if *operator != AssignOperator::Assign {
            values.push(left.as_ref());
        }
    }
    bindings
        .into_iter()
        .filter(|(_, values)| match values.as_slice() {
            [value] => {
                let root = value.unwrap_conversions().root_identifier();
                root.is_some_and(|n| contract.is_state_variable(n))
            }
            _ => false,
        })
        .map(|(name, _)| name)
        .collect()
}

fn relay_shape(contract: &Contract, fallback: &FunctionDef) -> RelayShape {
    let scope = fallback.display_name();
    let body = fallback.statements();
    let aliases = state_aliases(contract, body);

    for statement in leaf_statements(body) {
        if let StatementKind::InlineAssembly { code } = &statement.kind {
            if code.contains("delegatecall(") && reads_state_in_assembly(contract, code) {
                return RelayShape::Delegates(Evidence::found_in(
                    NodeKind::Statement,
                    scope,
                    statement.line,
                    "assembly { delegatecall(..) }",
                ));
            }
        }
    }

    let mut delegate: Option<&Expression> = None;
    for expression in Expressions::in_body(body) {
        let effect = match &expression.kind {
            ExpressionKind::Call { callee, .. }
                if matches!(callee.kind, ExpressionKind::ElementaryType(_)) =>
            {
                None
            }
            ExpressionKind::Call { .. } => {
                let Some(call) = CallSite::from_expression(expression) else {
                    continue;
                };
                match call.callee_name() {
                    Some(name) if is_guard(name) => None,
                    Some("delegatecall") => {
                        let target = call.receiver().map(Expression::unwrap_conversions);
                        let held_in_state = target
                            .and_then(Expression::root_identifier)
                            .is_some_and(|name| {
                                contract.is_state_variable(name) || aliases.contains(name)
                            });
                        if !held_in_state {
                            return RelayShape::Rejected(
                                Evidence::conflict(
                                    NodeKind::Expression,
                                    Some(scope),
                                    expression.line,
                                    expression.to_string(),
                                    "delegatecall target is not a state variable",
                                ),
                            );
                        }
                        delegate.get_or_insert(expression);
                        None
                    }
                    _ => Some("makes another call"),
                }
            }
            ExpressionKind::Assignment { left, .. }
                if left.root_identifier().is_some_and(|n| contract.is_state_variable(n)) =>
            {
                Some("writes state")
            }
            _ => None,
        };
        if let Some(reason) = effect {
            return RelayShape::Rejected(Evidence::conflict(
                NodeKind::Expression,
                Some(scope),
                expression.line,
                expression.to_string(),
                reason,
            ));
        }
    }
    if leaf_statements(body).any(|s| matches!(s.kind, StatementKind::Emit { .. })) {
        return RelayShape::Rejected(Evidence::conflict(
            NodeKind::Function,
            Some(scope),
            fallback.line,
            "fallback",
            "emits events",
        ));
    }

    match delegate {
        Some(expression) => RelayShape::Delegates(Evidence::found_in(
            NodeKind::Expression,
            scope,
            expression.line,
            expression.to_string(),
        )),
        None => RelayShape::Missing,
    }
}

pub fn relay(contract: &Contract) -> CheckOutcome {
    let kind = CheckKind::Relay;
    let mut evidence = Vec::new();
    let mut saw_fallback = false;
    for fallback in contract.fallbacks() {
        saw_fallback = true;
        match relay_shape(contract, fallback) {
            RelayShape::Delegates(found) => return CheckOutcome::pass(kind, vec![found]),
            RelayShape::Rejected(conflict) => evidence.push(conflict),
            RelayShape::Missing => {}
        }
    }
    if evidence.is_empty() {
        evidence.push(Evidence::missing(if saw_fallback {
            "delegatecall to a state-held address in the fallback"
        } else {
            "fallback function"
        }));
    }
    CheckOutcome::fail(kind, evidence)
}

fn is_generic_key(key: &TypeName) -> bool {
    match key {
        TypeName::Elementary(name) => {
            matches!(name.as_str(), "bytes" | "string" | "address")
                || name.strip_prefix("bytes").is_some_and(|n| n.parse::<u32>().is_ok())
        }
        _ => false,
    }
}

/// Assigns `map[param] = ..` where `param` is one of the function's parameters.
fn sets_entry(function: &FunctionDef, map: &str) -> Option<usize> {
    Expressions::in_body(function.statements()).find_map(|expression| {
        let ExpressionKind::Assignment { left, .. } = &expression.kind else {
            return None;
        };
        let ExpressionKind::IndexAccess { base, index: Some(index) } = &left.kind else {
            return None;
        };
        let keyed_by_param = index.identifier().is_some_and(|p| function.is_parameter(p));
        (base.identifier() == Some(map) && keyed_by_param).then_some(expression.line)
    })
}

/// Returns `map[..]` from its body.
fn gets_entry(function: &FunctionDef, map: &str) -> Option<usize> {
    Statements::new(function.statements()).find_map(|statement| {
        let StatementKind::Return { value: Some(value) } = &statement.kind else {
            return None;
        };
        match &value.kind {
            ExpressionKind::IndexAccess { base, .. } if base.identifier() == Some(map) => {
                Some(statement.line)
            }
            _ => None,
        }
    })
}

pub fn eternal_storage(contract: &Contract) -> CheckOutcome {
    let kind = CheckKind::EternalStorage;
    let stores: Vec<_> = contract
        .state_variables
        .iter()
        .filter(|v| matches!(&v.type_name, TypeName::Mapping { key, .. } if is_generic_key(key)))
        .collect();
    if stores.is_empty() {
        return CheckOutcome::fail(
            kind,
            vec![Evidence::missing("mapping keyed by bytes32, bytes, string or address")],
        );
    }

    let accessors: Vec<&FunctionDef> = contract
        .functions
        .iter()
        .filter(|f| f.kind == FunctionKind::Function && f.body.is_some())
        .collect();
    let mut evidence = Vec::new();
    for store in stores {
        let decoupled = |f: &FunctionDef| {
            touched_state(contract, f.statements())
                .iter()
                .all(|name| *name == store.name)
        };
        let setter = accessors
            .iter()
            .filter(|f| decoupled(f))
            .find_map(|f| sets_entry(f, &store.name).map(|line| (*f, line)));
        let getter = accessors
            .iter()
            .filter(|f| decoupled(f))
            .find_map(|f| gets_entry(f, &store.name).map(|line| (*f, line)));
        let public_getter = store.visibility == Visibility::Public;

        let declared = Evidence::found(
            NodeKind::StateVariable,
            store.line,
            format!("{} {}", store.type_name, store.name),
        );
        let accessor = |role: &str, function: &FunctionDef, line: usize| {
            Evidence::found_in(
                NodeKind::Function,
                function.display_name(),
                line,
                format!("{role} {}", super::signature(function)),
            )
        };
        match (setter, getter) {
            (Some((set, set_line)), Some((get, get_line))) => {
                return CheckOutcome::pass(
                    kind,
                    vec![
                        declared,
                        accessor("setter", set, set_line),
                        accessor("getter", get, get_line),
                    ],
                );
            }
            (Some((set, set_line)), None) if public_getter => {
                return CheckOutcome::pass(
                    kind,
                    vec![
                        declared,
                        accessor("setter", set, set_line),
                        Evidence::found(
                            NodeKind::StateVariable,
                            store.line,
                            format!("public getter of {}", store.name),
                        ),
                    ],
                );
            }
            (setter, _) => {
                let wanted = if setter.is_none() {
                    format!("setter `{}[key] = value` decoupled from other state", store.name)
                } else {
                    format!("getter returning `{}[key]` decoupled from other state", store.name)
                };
                evidence.push(Evidence::missing(wanted));
            }
        }
    }
    CheckOutcome::fail(kind, evidence)
}
