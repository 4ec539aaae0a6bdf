//! Lazy walks over statement and expression trees.
//!
//! Both iterators keep an explicit stack, so they are finite, allocation-light
//! and restartable (`Clone`, or build a new one from the same slice). Every
//! check reuses them instead of re-walking the tree by hand.

use super::ast::{BodyOwner, Contract, Expression, ExpressionKind, Statement, StatementKind};

/// Pre-order walk over a statement list, descending into nested blocks,
/// branches, loop bodies and try/catch bodies.
#[derive(Debug, Clone)]
pub struct Statements<'a> {
    stack: Vec<&'a Statement>,
}

impl<'a> Statements<'a> {
    pub fn new(body: &'a [Statement]) -> Self {
        Self { stack: body.iter().rev().collect() }
    }
}

impl<'a> Iterator for Statements<'a> {
    type Item = &'a Statement;

    fn next(&mut self) -> Option<Self::Item> {
        let statement = self.stack.pop()?;
        let start = self.stack.len();
        push_child_statements(statement, &mut self.stack);
        self.stack[start..].reverse();
        Some(statement)
    }
}

/// Children in source order; the caller reverses them for the stack.
fn push_child_statements<'a>(statement: &'a Statement, out: &mut Vec<&'a Statement>) {
    match &statement.kind {
        StatementKind::Block { statements } | StatementKind::Unchecked { statements } => {
            out.extend(statements.iter())
        }
        StatementKind::If { then_branch, else_branch, .. } => {
            out.push(then_branch);
            if let Some(else_branch) = else_branch {
                out.push(else_branch);
            }
        }
        StatementKind::For { init, body, .. } => {
            if let Some(init) = init {
                out.push(init);
            }
            out.push(body);
        }
        StatementKind::While { body, .. } | StatementKind::DoWhile { body, .. } => out.push(body),
        StatementKind::Try { body, catches, .. } => {
            out.extend(body.iter());
            for clause in catches {
                out.extend(clause.body.iter());
            }
        }
        _ => {}
    }
}

#[derive(Debug, Clone, Copy)]
enum Frame<'a> {
    Statement(&'a Statement),
    Enter(&'a Expression),
    Yield(&'a Expression),
}

/// Every expression under a statement list, in evaluation order: operands
/// are yielded before the operation that consumes them, statements in source
/// order. Positions in this sequence are what "happens before" means for the
/// ordering checks.
#[derive(Debug, Clone)]
pub struct Expressions<'a> {
    stack: Vec<Frame<'a>>,
}

impl<'a> Expressions<'a> {
    pub fn in_body(body: &'a [Statement]) -> Self {
        Self { stack: body.iter().rev().map(Frame::Statement).collect() }
    }

    pub fn in_statement(statement: &'a Statement) -> Self {
        Self { stack: vec![Frame::Statement(statement)] }
    }

    pub fn of(expression: &'a Expression) -> Self {
        Self { stack: vec![Frame::Enter(expression)] }
    }
}

impl<'a> Iterator for Expressions<'a> {
    type Item = &'a Expression;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let start = self.stack.len();
            match self.stack.pop()? {
                Frame::Yield(expression) => return Some(expression),
                Frame::Enter(expression) => {
                    self.stack.push(Frame::Yield(expression));
                    let children = self.stack.len();
                    push_child_expressions(expression, &mut self.stack);
                    self.stack[children..].reverse();
                }
                Frame::Statement(statement) => {
                    push_statement_frames(statement, &mut self.stack);
                    self.stack[start - 1..].reverse();
                }
            }
        }
    }
}

fn push_child_expressions<'a>(expression: &'a Expression, out: &mut Vec<Frame<'a>>) {
    match &expression.kind {
        ExpressionKind::MemberAccess { expression, .. } => out.push(Frame::Enter(expression)),
        ExpressionKind::IndexAccess { base, index } => {
            out.push(Frame::Enter(base));
            if let Some(index) = index {
                out.push(Frame::Enter(index));
            }
        }
        ExpressionKind::IndexRange { base, start, end } => {
            out.push(Frame::Enter(base));
            out.extend(start.iter().map(|e| Frame::Enter(e.as_ref())));
            out.extend(end.iter().map(|e| Frame::Enter(e.as_ref())));
        }
        ExpressionKind::Call { callee, arguments, .. } => {
            out.push(Frame::Enter(callee));
            out.extend(arguments.iter().map(Frame::Enter));
        }
        ExpressionKind::CallOptions { callee, options } => {
            out.push(Frame::Enter(callee));
            out.extend(options.iter().map(|(_, value)| Frame::Enter(value)));
        }
        ExpressionKind::Binary { left, right, .. }
        | ExpressionKind::Assignment { left, right, .. } => {
            out.push(Frame::Enter(left));
            out.push(Frame::Enter(right));
        }
        ExpressionKind::Unary { operand, .. } => out.push(Frame::Enter(operand)),
        ExpressionKind::Conditional { condition, if_true, if_false } => {
            out.push(Frame::Enter(condition));
            out.push(Frame::Enter(if_true));
            out.push(Frame::Enter(if_false));
        }
        ExpressionKind::Tuple(items) => out.extend(items.iter().flatten().map(Frame::Enter)),
        ExpressionKind::ArrayLiteral(items) => out.extend(items.iter().map(Frame::Enter)),
        ExpressionKind::Identifier(_)
        | ExpressionKind::Literal(_)
        | ExpressionKind::ElementaryType(_)
        | ExpressionKind::New(_) => {}
    }
}

fn push_statement_frames<'a>(statement: &'a Statement, out: &mut Vec<Frame<'a>>) {
    match &statement.kind {
        StatementKind::Block { statements } | StatementKind::Unchecked { statements } => {
            out.extend(statements.iter().map(Frame::Statement))
        }
        StatementKind::Expression { expression } => out.push(Frame::Enter(expression)),
        StatementKind::VariableDeclaration { initial_value, .. } => {
            out.extend(initial_value.iter().map(Frame::Enter))
        }
        StatementKind::If { condition, then_branch, else_branch } => {
            out.push(Frame::Enter(condition));
            out.push(Frame::Statement(then_branch));
            if let Some(else_branch) = else_branch {
                out.push(Frame::Statement(else_branch));
            }
        }
        StatementKind::For { init, condition, update, body } => {
            if let Some(init) = init {
                out.push(Frame::Statement(init));
            }
            out.extend(condition.iter().map(Frame::Enter));
            out.push(Frame::Statement(body));
            out.extend(update.iter().map(Frame::Enter));
        }
        StatementKind::While { condition, body } => {
            out.push(Frame::Enter(condition));
            out.push(Frame::Statement(body));
        }
        StatementKind::DoWhile { body, condition } => {
            out.push(Frame::Statement(body));
            out.push(Frame::Enter(condition));
        }
        StatementKind::Return { value } => out.extend(value.iter().map(Frame::Enter)),
        StatementKind::Emit { event } => out.push(Frame::Enter(event)),
        StatementKind::Revert { error } => out.push(Frame::Enter(error)),
        StatementKind::Try { call, body, catches, .. } => {
            out.push(Frame::Enter(call));
            out.extend(body.iter().map(Frame::Statement));
            for clause in catches {
                out.extend(clause.body.iter().map(Frame::Statement));
            }
        }
        StatementKind::Throw
        | StatementKind::InlineAssembly { .. }
        | StatementKind::Placeholder
        | StatementKind::Break
        | StatementKind::Continue => {}
    }
}

/// A call expression found in a body.
#[derive(Debug, Clone, Copy)]
pub struct CallSite<'a> {
    pub expression: &'a Expression,
    pub callee: &'a Expression,
    pub arguments: &'a [Expression],
}

impl<'a> CallSite<'a> {
    pub fn from_expression(expression: &'a Expression) -> Option<Self> {
        match &expression.kind {
            ExpressionKind::Call { callee, arguments, .. } => Some(Self {
                expression,
                callee,
                arguments,
            }),
            _ => None,
        }
    }

    /// The callee with call options peeled off: `a.call{value: v}` → `a.call`.
    pub fn target(&self) -> &'a Expression {
        let mut target = self.callee;
        while let ExpressionKind::CallOptions { callee, .. } = &target.kind {
            target = callee;
        }
        target
    }

    /// Rendered callee path, e.g. `msg.sender.transfer` or `require`.
    pub fn callee_path(&self) -> String {
        self.target().to_string()
    }

    /// Last path segment of the callee: `transfer` for `owner.transfer`.
    pub fn callee_name(&self) -> Option<&'a str> {
        match &self.target().kind {
            ExpressionKind::Identifier(name) => Some(name),
            ExpressionKind::MemberAccess { member, .. } => Some(member),
            _ => None,
        }
    }

    /// For member calls, the expression the member is looked up on.
    pub fn receiver(&self) -> Option<&'a Expression> {
        match &self.target().kind {
            ExpressionKind::MemberAccess { expression, .. } => Some(expression),
            _ => None,
        }
    }
}

/// All expressions of every function and modifier body of a contract.
pub fn contract_expressions(
    contract: &Contract,
) -> impl Iterator<Item = (BodyOwner<'_>, &Expression)> + '_ {
    contract
        .bodies()
        .flat_map(|(owner, body)| Expressions::in_body(body).map(move |e| (owner, e)))
}

/// All statements of every function and modifier body of a contract.
pub fn contract_statements(
    contract: &Contract,
) -> impl Iterator<Item = (BodyOwner<'_>, &Statement)> + '_ {
    contract
        .bodies()
        .flat_map(|(owner, body)| Statements::new(body).map(move |s| (owner, s)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ast::{AssignOperator, ExpressionKind, Literal};

    fn ident(name: &str, line: usize) -> Expression {
        Expression::new(ExpressionKind::Identifier(name.to_string()), line)
    }

    fn call(name: &str, line: usize) -> Expression {
        Expression::new(
            ExpressionKind::Call {
                callee: Box::new(ident(name, line)),
                arguments: vec![],
                names: vec![],
            },
            line,
        )
    }

    fn expr_statement(expression: Expression) -> Statement {
        let line = expression.line;
        Statement::new(StatementKind::Expression { expression }, line)
    }

    #[test]
    fn test_statements_descend_into_branches_in_order() {
        let body = vec![
            Statement::new(
                StatementKind::If {
                    condition: ident("ok", 1),
                    then_branch: Box::new(Statement::new(
                        StatementKind::Block { statements: vec![expr_statement(call("a", 2))] },
                        1,
                    )),
                    else_branch: Some(Box::new(expr_statement(call("b", 3)))),
                },
                1,
            ),
            expr_statement(call("c", 4)),
        ];

        let lines: Vec<usize> = Statements::new(&body).map(|s| s.line).collect();
        assert_eq!(lines, vec![1, 1, 2, 3, 4]);
    }

    #[test]
    fn test_expressions_yield_operands_before_operation() {
        let assignment = Expression::new(
            ExpressionKind::Assignment {
                operator: AssignOperator::Assign,
                left: Box::new(ident("x", 1)),
                right: Box::new(call("f", 1)),
            },
            1,
        );
        let body = vec![expr_statement(assignment)];

        let rendered: Vec<String> = Expressions::in_body(&body).map(|e| e.to_string()).collect();
        assert_eq!(rendered, vec!["x", "f", "f()", "x = f()"]);
    }

    #[test]
    fn test_expressions_are_restartable() {
        let body = vec![
            expr_statement(call("a", 1)),
            expr_statement(Expression::new(
                ExpressionKind::Literal(Literal::Bool(true)),
                2,
            )),
        ];
        let walk = Expressions::in_body(&body);
        let first: Vec<usize> = walk.clone().map(|e| e.line).collect();
        let second: Vec<usize> = walk.map(|e| e.line).collect();
        assert_eq!(first, second);
        assert_eq!(first, vec![1, 1, 2]);
    }
}
