//! Checks over expressions in function and modifier bodies.

use std::collections::HashSet;

use super::{match_each, Candidate};
use crate::domain::ast::{
    AssignOperator, BinaryOperator, BodyOwner, Contract, Expression, ExpressionKind, StatementKind,
    UnaryOperator,
};
use crate::domain::descriptor::{BinaryOperationSpec, CheckKind};
use crate::domain::matcher::NamePattern;
use crate::domain::report::{CheckOutcome, Evidence, NodeKind};
use crate::domain::visit::{contract_expressions, contract_statements, CallSite};

/// A comparison found in a body, with both operands normalised.
#[derive(Debug, Clone)]
pub struct ComparisonSite<'a> {
    pub owner: BodyOwner<'a>,
    pub expression: &'a Expression,
    pub operator: BinaryOperator,
    pub left: &'a Expression,
    pub right: &'a Expression,
    left_normalized: String,
    right_normalized: String,
}

impl ComparisonSite<'_> {
    fn satisfies(&self, spec: &BinaryOperationSpec) -> bool {
        let first = NamePattern::operand(&spec.operand_1);
        let second = NamePattern::operand(&spec.operand_2);
        let direct = self.operator == spec.operator
            && first.matches_normalized(&self.left_normalized)
            && second.matches_normalized(&self.right_normalized);
        let swapped = spec.operator.mirrored() == Some(self.operator)
            && first.matches_normalized(&self.right_normalized)
            && second.matches_normalized(&self.left_normalized);
        direct || swapped
    }
}

pub fn comparisons(contract: &Contract) -> Vec<ComparisonSite<'_>> {
    contract_expressions(contract)
        .filter_map(|(owner, expression)| match &expression.kind {
            ExpressionKind::Binary { operator, left, right } if operator.is_comparison() => {
                Some(ComparisonSite {
                    owner,
                    expression,
                    operator: *operator,
                    left,
                    right,
                    left_normalized: left.normalized(),
                    right_normalized: right.normalized(),
                })
            }
            _ => None,
        })
        .collect()
}

pub fn comparison(contract: &Contract, specs: &[BinaryOperationSpec]) -> CheckOutcome {
    let sites = comparisons(contract);
    let mut passed = true;
    let mut evidence = Vec::with_capacity(specs.len());
    for spec in specs {
        match sites.iter().find(|site| site.satisfies(spec)) {
            Some(site) => evidence.push(Evidence::found_in(
                NodeKind::Expression,
                site.owner.name(),
                site.expression.line,
                site.expression.to_string(),
            )),
            None => {
                passed = false;
                evidence.push(Evidence::missing(format!("comparison `{spec}`")));
            }
        }
    }
    CheckOutcome::new(CheckKind::Comparison, passed, evidence)
}

/// Every call in the contract as a candidate answering to its full callee
/// path and its last segment. `emit` targets are events, not calls, and
/// `revert CustomError()` answers to `revert`.
pub fn call_candidates(contract: &Contract) -> Vec<Candidate> {
    let mut excluded: HashSet<*const Expression> = HashSet::new();
    let mut candidates = Vec::new();
    for (owner, statement) in contract_statements(contract) {
        match &statement.kind {
            StatementKind::Emit { event } => {
                excluded.insert(event as *const Expression);
            }
            StatementKind::Revert { error } => {
                excluded.insert(error as *const Expression);
                let evidence = Evidence::found_in(
                    NodeKind::Statement,
                    owner.name(),
                    statement.line,
                    statement.to_string(),
                );
                candidates.push(Candidate::named("revert", evidence));
            }
            _ => {}
        }
    }

    for (owner, expression) in contract_expressions(contract) {
        if excluded.contains(&(expression as *const Expression)) {
            continue;
        }
        let Some(call) = CallSite::from_expression(expression) else {
            continue;
        };
        let Some(name) = call.callee_name() else {
            continue;
        };
        let path = call.callee_path();
        let mut names = vec![name.to_string()];
        if path != name {
            names.push(path);
        }
        candidates.push(Candidate {
            names,
            evidence: Evidence::found_in(
                NodeKind::Expression,
                owner.name(),
                expression.line,
                expression.to_string(),
            ),
        });
    }
    candidates
}

pub fn fn_call(contract: &Contract, callable_function: &[String]) -> CheckOutcome {
    let candidates = call_candidates(contract);
    match_each(CheckKind::FnCall, callable_function, NamePattern::callable, &candidates, "call to")
}

/// `emit` statements, answering to the event's path and name.
pub fn emitted_events(contract: &Contract) -> Vec<Candidate> {
    contract_statements(contract)
        .filter_map(|(owner, statement)| {
            let StatementKind::Emit { event } = &statement.kind else {
                return None;
            };
            let call = CallSite::from_expression(event)?;
            let name = call.callee_name()?;
            let path = call.callee_path();
            let mut names = vec![name.to_string()];
            if path != name {
                names.push(path);
            }
            Some(Candidate {
                names,
                evidence: Evidence::found_in(
                    NodeKind::Statement,
                    owner.name(),
                    statement.line,
                    statement.to_string(),
                ),
            })
        })
        .collect()
}

pub fn event_emit(contract: &Contract, event_names: &[String]) -> CheckOutcome {
    let candidates = emitted_events(contract);
    match_each(CheckKind::EventEmit, event_names, NamePattern::new, &candidates, "emit of")
}

/// Direct toggles `x = !x` of boolean state variables.
pub fn toggles(contract: &Contract) -> Vec<Candidate> {
    contract_expressions(contract)
        .filter_map(|(owner, expression)| {
            let name = toggled_variable(expression)?;
            let variable = contract.state_variable(name)?;
            variable.is_bool().then(|| {
                let evidence = Evidence::found_in(
                    NodeKind::Expression,
                    owner.name(),
                    expression.line,
                    expression.to_string(),
                );
                Candidate::named(name, evidence)
            })
        })
        .collect()
}

fn toggled_variable(expression: &Expression) -> Option<&str> {
    let ExpressionKind::Assignment { operator: AssignOperator::Assign, left, right } =
        &expression.kind
    else {
        return None;
    };
    let ExpressionKind::Unary { operator: UnaryOperator::Not, operand, .. } = &right.kind else {
        return None;
    };
    let target = left.identifier()?;
    (operand.identifier() == Some(target)).then_some(target)
}

pub fn state_toggle(contract: &Contract, state_names: &[String]) -> CheckOutcome {
    let candidates = toggles(contract);
    let mut outcome =
        match_each(CheckKind::StateToggle, state_names, NamePattern::new, &candidates, "toggle of");
    if outcome.passed {
        return outcome;
    }

    // Point at named variables that exist but cannot be toggled.
    for (raw, evidence) in state_names.iter().zip(outcome.evidence.iter_mut()) {
        if evidence.is_found() {
            continue;
        }
        let pattern = NamePattern::new(raw);
        if let Some(variable) = contract
            .state_variables
            .iter()
            .find(|v| pattern.matches(&v.name) && !v.is_bool())
        {
            *evidence = Evidence::conflict(
                NodeKind::StateVariable,
                None,
                variable.line,
                format!("{} {}", variable.type_name, variable.name),
                "not a bool state variable",
            );
        }
    }
    outcome
}
