//! Ordering checks over function bodies.

use super::signature;
use crate::domain::ast::{
    Contract, Expression, ExpressionKind, FunctionDef, StatementKind, StorageLocation,
};
use crate::domain::descriptor::CheckKind;
use crate::domain::report::{CheckOutcome, Evidence, NodeKind};
use crate::domain::visit::{CallSite, Expressions, Statements};

const INTERACTIONS: [&str; 5] = ["transfer", "send", "call", "delegatecall", "staticcall"];

/// A member call that hands control or value to another account.
fn is_interaction(expression: &Expression) -> bool {
    CallSite::from_expression(expression).is_some_and(|call| {
        call.receiver().is_some()
            && call.callee_name().is_some_and(|name| INTERACTIONS.contains(&name))
    })
}

fn state_root<'a>(contract: &Contract, target: &'a Expression) -> Option<&'a str> {
    target
        .root_identifier()
        .filter(|name| contract.is_state_variable(name))
}

/// The state variable this expression writes, if any.
pub(crate) fn mutated_state<'a>(
    contract: &Contract,
    expression: &'a Expression,
) -> Option<&'a str> {
    match &expression.kind {
        ExpressionKind::Assignment { left, .. } => match &left.kind {
            ExpressionKind::Tuple(items) => items
                .iter()
                .flatten()
                .find_map(|item| state_root(contract, item)),
            _ => state_root(contract, left),
        },
        ExpressionKind::Unary { operator, operand, .. } if operator.mutates() => {
            state_root(contract, operand)
        }
        ExpressionKind::Call { .. } => {
            let call = CallSite::from_expression(expression)?;
            match call.callee_name()? {
                "push" | "pop" => state_root(contract, call.receiver()?),
                _ => None,
            }
        }
        _ => None,
    }
}

enum EffectOrder<'a> {
    Unrelated,
    Ordered { last_effect: &'a Expression, interaction: &'a Expression },
    Violated { variable: &'a str, effect: &'a Expression, interaction: &'a Expression },
}

fn effects_before_interactions<'a>(
    contract: &Contract,
    function: &'a FunctionDef,
) -> EffectOrder<'a> {
    let mut first_interaction: Option<&Expression> = None;
    let mut last_effect: Option<&Expression> = None;
    for expression in Expressions::in_body(function.statements()) {
        if let Some(variable) = mutated_state(contract, expression) {
            if let Some(interaction) = first_interaction {
                return EffectOrder::Violated { variable, effect: expression, interaction };
            }
            last_effect = Some(expression);
        }
        if first_interaction.is_none() && is_interaction(expression) {
            first_interaction = Some(expression);
        }
    }
    match (last_effect, first_interaction) {
        (Some(last_effect), Some(interaction)) => EffectOrder::Ordered { last_effect, interaction },
        _ => EffectOrder::Unrelated,
    }
}

/// Every function that both writes state and interacts must finish its
/// writes before the first interaction.
pub fn check_effects_interaction(contract: &Contract) -> CheckOutcome {
    let kind = CheckKind::CheckEffectsInteraction;
    let mut ordered = Vec::new();
    let mut violations = Vec::new();
    for function in contract.functions.iter().filter(|f| f.body.is_some()) {
        let scope = function.display_name();
        match effects_before_interactions(contract, function) {
            EffectOrder::Unrelated => {}
            EffectOrder::Ordered { last_effect, interaction } => ordered.push(Evidence::found_in(
                NodeKind::Function,
                scope,
                function.line,
                format!(
                    "{}: `{}` (line {}) before `{}` (line {})",
                    signature(function),
                    last_effect,
                    last_effect.line,
                    interaction,
                    interaction.line
                ),
            )),
            EffectOrder::Violated { variable, effect, interaction } => {
                violations.push(Evidence::conflict(
                    NodeKind::Expression,
                    Some(scope),
                    effect.line,
                    effect.to_string(),
                    format!(
                        "state `{variable}` written after `{interaction}` at line {}",
                        interaction.line
                    ),
                ))
            }
        }
    }

    if !violations.is_empty() {
        return CheckOutcome::fail(kind, violations);
    }
    if ordered.is_empty() {
        return CheckOutcome::fail(
            kind,
            vec![Evidence::missing("function that both writes state and makes an external call")],
        );
    }
    CheckOutcome::pass(kind, ordered)
}

/// `T[] memory arr = new T[](n);` and the array's name.
fn memory_array_declaration(kind: &StatementKind) -> Option<&str> {
    let StatementKind::VariableDeclaration { declarations, initial_value: Some(value) } = kind
    else {
        return None;
    };
    let [Some(declared)] = declarations.as_slice() else {
        return None;
    };
    if declared.storage != Some(StorageLocation::Memory) || !declared.type_name.is_dynamic_array() {
        return None;
    }
    let ExpressionKind::Call { callee, arguments, .. } = &value.kind else {
        return None;
    };
    if !matches!(callee.kind, ExpressionKind::New(_)) || arguments.is_empty() {
        return None;
    }
    declared.name.as_deref()
}

fn writes_element(expression: &Expression, array: &str) -> bool {
    match &expression.kind {
        ExpressionKind::Assignment { left, .. } => matches!(
            &left.kind,
            ExpressionKind::IndexAccess { base, .. } if base.identifier() == Some(array)
        ),
        _ => false,
    }
}

pub fn memory_array_building(contract: &Contract) -> CheckOutcome {
    let kind = CheckKind::MemoryArrayBuilding;
    let mut evidence = Vec::new();
    for function in contract.functions.iter().filter(|f| f.body.is_some()) {
        let scope = function.display_name();
        let statements: Vec<_> = Statements::new(function.statements()).collect();
        for (position, declaration) in statements.iter().enumerate() {
            let Some(array) = memory_array_declaration(&declaration.kind) else {
                continue;
            };
            let filled_in_loop = statements[position + 1..].iter().find(|statement| {
                let is_loop = matches!(
                    statement.kind,
                    StatementKind::For { .. }
                        | StatementKind::While { .. }
                        | StatementKind::DoWhile { .. }
                );
                if !is_loop {
                    return false;
                }
                let mut writes = false;
                let mut reads_state = false;
                for expression in Expressions::in_statement(statement) {
                    writes |= writes_element(expression, array);
                    reads_state |= expression
                        .identifier()
                        .is_some_and(|name| contract.is_state_variable(name));
                }
                writes && reads_state
            });
            match filled_in_loop {
                Some(found) => {
                    return CheckOutcome::pass(
                        kind,
                        vec![
                            Evidence::found_in(
                                NodeKind::Statement,
                                scope,
                                declaration.line,
                                declaration.to_string(),
                            ),
                            Evidence::found_in(
                                NodeKind::Statement,
                                scope,
                                found.line,
                                found.to_string(),
                            ),
                        ],
                    );
                }
                None => evidence.push(Evidence::missing(format!(
                    "loop over storage filling `{array}` in {scope}"
                ))),
            }
        }
    }
    if evidence.is_empty() {
        evidence.push(Evidence::missing("memory dynamic array allocated with `new`"));
    }
    CheckOutcome::fail(kind, evidence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ast::{
        AssignOperator, ContractKind, FunctionKind, Statement, StateVariable, TypeName, Visibility,
    };

    fn ident(name: &str, line: usize) -> Expression {
        Expression::new(ExpressionKind::Identifier(name.to_string()), line)
    }

    fn member(base: Expression, name: &str) -> Expression {
        let line = base.line;
        let kind =
            ExpressionKind::MemberAccess { expression: Box::new(base), member: name.to_string() };
        Expression::new(kind, line)
    }

    fn statement(expression: Expression) -> Statement {
        let line = expression.line;
        Statement::new(StatementKind::Expression { expression }, line)
    }

    /// `balances[msg.sender] -= amount;`
    fn debit(line: usize) -> Statement {
        let target = Expression::new(
            ExpressionKind::IndexAccess {
                base: Box::new(ident("balances", line)),
                index: Some(Box::new(member(ident("msg", line), "sender"))),
            },
            line,
        );
        statement(Expression::new(
            ExpressionKind::Assignment {
                operator: AssignOperator::SubAssign,
                left: Box::new(target),
                right: Box::new(ident("amount", line)),
            },
            line,
        ))
    }

    /// `payable(msg.sender).transfer(amount);`
    fn payout(line: usize) -> Statement {
        let payable = Expression::new(
            ExpressionKind::Call {
                callee: Box::new(Expression::new(
                    ExpressionKind::ElementaryType(TypeName::Elementary("address payable".into())),
                    line,
                )),
                arguments: vec![member(ident("msg", line), "sender")],
                names: vec![],
            },
            line,
        );
        statement(Expression::new(
            ExpressionKind::Call {
                callee: Box::new(member(payable, "transfer")),
                arguments: vec![ident("amount", line)],
                names: vec![],
            },
            line,
        ))
    }

    fn bank(body: Vec<Statement>) -> Contract {
        let mut contract = Contract::new("Bank", ContractKind::Contract, 1);
        contract.state_variables.push(StateVariable {
            name: "balances".into(),
            type_name: TypeName::Mapping {
                key: Box::new(TypeName::Elementary("address".into())),
                value: Box::new(TypeName::Elementary("uint256".into())),
            },
            visibility: Visibility::Public,
            constant: false,
            immutable: false,
            initial_value: None,
            line: 2,
        });
        contract.functions.push(FunctionDef {
            name: "withdraw".into(),
            kind: FunctionKind::Function,
            visibility: Visibility::Public,
            mutability: Default::default(),
            parameters: vec![],
            returns: vec![],
            modifiers: vec![],
            body: Some(body),
            line: 4,
        });
        contract
    }

    #[test]
    fn test_effects_before_transfer_pass() {
        let outcome = check_effects_interaction(&bank(vec![debit(5), payout(6)]));
        assert!(outcome.passed, "{:?}", outcome.evidence);
    }

    #[test]
    fn test_transfer_before_effects_fails() {
        let outcome = check_effects_interaction(&bank(vec![payout(5), debit(6)]));
        assert!(!outcome.passed);
        assert!(matches!(&outcome.evidence[0], Evidence::Conflict { line: 6, .. }));
    }

    #[test]
    fn test_no_interacting_function_fails_with_missing() {
        let outcome = check_effects_interaction(&bank(vec![debit(5)]));
        assert!(!outcome.passed);
        assert!(matches!(&outcome.evidence[0], Evidence::Missing { .. }));
    }
}
