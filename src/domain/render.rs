//! Source-like rendering of AST nodes.
//!
//! Rendering is canonical: one space around binary operators, parentheses only
//! where precedence needs them. Evidence snippets use the readable form and
//! operand matching uses [`normalize`] on top of it, so formatting differences
//! in the contract never decide a match.

use std::fmt::{self, Display, Formatter, Write};

use super::ast::{
    Expression, ExpressionKind, Literal, Parameter, Statement, StatementKind, TypeName,
};

/// Lowercases, drops all whitespace and strips redundant outer parentheses.
pub fn normalize(text: &str) -> String {
    let mut compact: String = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();
    while wrapped_in_parens(&compact) {
        compact = compact[1..compact.len() - 1].to_string();
    }
    compact
}

/// True when the first `(` closes at the very last character.
fn wrapped_in_parens(text: &str) -> bool {
    if !(text.starts_with('(') && text.ends_with(')')) {
        return false;
    }
    let mut depth = 0usize;
    for (i, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return i == text.len() - 1;
                }
            }
            _ => {}
        }
    }
    false
}

impl Expression {
    /// The normalised rendering used for operand comparison.
    pub fn normalized(&self) -> String {
        normalize(&self.to_string())
    }

    fn precedence(&self) -> u8 {
        match &self.kind {
            ExpressionKind::Assignment { .. } => 1,
            ExpressionKind::Conditional { .. } => 2,
            ExpressionKind::Binary { operator, .. } => 2 + operator.precedence(),
            ExpressionKind::Unary { prefix: true, .. } => 14,
            _ => 15,
        }
    }
}

fn write_operand(f: &mut Formatter<'_>, operand: &Expression, parens: bool) -> fmt::Result {
    if parens {
        write!(f, "({operand})")
    } else {
        write!(f, "{operand}")
    }
}

fn write_list<T: Display>(f: &mut Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl Display for Expression {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExpressionKind::Identifier(name) => f.write_str(name),
            ExpressionKind::Literal(literal) => write!(f, "{literal}"),
            ExpressionKind::ElementaryType(type_name) => write!(f, "{type_name}"),
            ExpressionKind::MemberAccess { expression, member } => {
                write_operand(f, expression, expression.precedence() < 15)?;
                write!(f, ".{member}")
            }
            ExpressionKind::IndexAccess { base, index } => {
                write_operand(f, base, base.precedence() < 15)?;
                match index {
                    Some(index) => write!(f, "[{index}]"),
                    None => f.write_str("[]"),
                }
            }
            ExpressionKind::IndexRange { base, start, end } => {
                write_operand(f, base, base.precedence() < 15)?;
                f.write_char('[')?;
                if let Some(start) = start {
                    write!(f, "{start}")?;
                }
                f.write_char(':')?;
                if let Some(end) = end {
                    write!(f, "{end}")?;
                }
                f.write_char(']')
            }
            ExpressionKind::Call { callee, arguments, names } => {
                write_operand(f, callee, callee.precedence() < 15)?;
                f.write_char('(')?;
                if names.is_empty() {
                    write_list(f, arguments)?;
                } else {
                    f.write_char('{')?;
                    for (i, (name, value)) in names.iter().zip(arguments).enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{name}: {value}")?;
                    }
                    f.write_char('}')?;
                }
                f.write_char(')')
            }
            ExpressionKind::CallOptions { callee, options } => {
                write_operand(f, callee, callee.precedence() < 15)?;
                f.write_char('{')?;
                for (i, (name, value)) in options.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}: {value}")?;
                }
                f.write_char('}')
            }
            ExpressionKind::Binary { operator, left, right } => {
                let own = self.precedence();
                let right_assoc = operator.is_right_associative();
                let left_parens =
                    left.precedence() < own || (right_assoc && left.precedence() == own);
                let right_parens =
                    right.precedence() < own || (!right_assoc && right.precedence() == own);
                write_operand(f, left, left_parens)?;
                write!(f, " {} ", operator.as_str())?;
                write_operand(f, right, right_parens)
            }
            ExpressionKind::Assignment { operator, left, right } => {
                write!(f, "{left} {} {right}", operator.as_str())
            }
            ExpressionKind::Unary { operator, prefix, operand } => {
                let parens = operand.precedence() < 14;
                if *prefix {
                    f.write_str(operator.as_str())?;
                    if operator.as_str() == "delete" {
                        f.write_char(' ')?;
                    }
                    write_operand(f, operand, parens)
                } else {
                    write_operand(f, operand, parens)?;
                    f.write_str(operator.as_str())
                }
            }
            ExpressionKind::Conditional { condition, if_true, if_false } => {
                write_operand(f, condition, condition.precedence() <= 2)?;
                write!(f, " ? {if_true} : {if_false}")
            }
            ExpressionKind::Tuple(items) => {
                f.write_char('(')?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    if let Some(item) = item {
                        write!(f, "{item}")?;
                    }
                }
                f.write_char(')')
            }
            ExpressionKind::ArrayLiteral(items) => {
                f.write_char('[')?;
                write_list(f, items)?;
                f.write_char(']')
            }
            ExpressionKind::New(type_name) => write!(f, "new {type_name}"),
        }
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Number { value, unit: Some(unit) } => write!(f, "{value} {unit}"),
            Literal::Number { value, unit: None } => f.write_str(value),
            Literal::String(text) => write!(f, "\"{text}\""),
            Literal::HexString(text) => write!(f, "hex\"{text}\""),
            Literal::Bool(value) => write!(f, "{value}"),
        }
    }
}

impl Display for TypeName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TypeName::Elementary(name) | TypeName::UserDefined(name) => f.write_str(name),
            TypeName::Mapping { key, value } => write!(f, "mapping({key} => {value})"),
            TypeName::Array { base, length: Some(length) } => write!(f, "{base}[{length}]"),
            TypeName::Array { base, length: None } => write!(f, "{base}[]"),
            TypeName::Function { parameters, returns } => {
                f.write_str("function(")?;
                write_list(f, parameters)?;
                f.write_char(')')?;
                if !returns.is_empty() {
                    f.write_str(" returns (")?;
                    write_list(f, returns)?;
                    f.write_char(')')?;
                }
                Ok(())
            }
        }
    }
}

impl Display for Parameter {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name)?;
        if let Some(storage) = self.storage {
            write!(f, " {}", storage.as_str())?;
        }
        if let Some(name) = &self.name {
            write!(f, " {name}")?;
        }
        Ok(())
    }
}

/// One-line summary of a statement; nested bodies are elided.
impl Display for Statement {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.kind {
            StatementKind::Block { .. } => f.write_str("{ ... }"),
            StatementKind::Unchecked { .. } => f.write_str("unchecked { ... }"),
            StatementKind::Expression { expression } => write!(f, "{expression};"),
            StatementKind::VariableDeclaration { declarations, initial_value } => {
                if let [Some(single)] = declarations.as_slice() {
                    write!(f, "{single}")?;
                } else {
                    f.write_char('(')?;
                    for (i, declaration) in declarations.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        if let Some(declaration) = declaration {
                            write!(f, "{declaration}")?;
                        }
                    }
                    f.write_char(')')?;
                }
                if let Some(value) = initial_value {
                    write!(f, " = {value}")?;
                }
                f.write_char(';')
            }
            StatementKind::If { condition, .. } => write!(f, "if ({condition})"),
            StatementKind::For { init, condition, update, .. } => {
                f.write_str("for (")?;
                if let Some(init) = init {
                    write!(f, "{init}")?;
                } else {
                    f.write_char(';')?;
                }
                if let Some(condition) = condition {
                    write!(f, " {condition}")?;
                }
                f.write_char(';')?;
                if let Some(update) = update {
                    write!(f, " {update}")?;
                }
                f.write_char(')')
            }
            StatementKind::While { condition, .. } => write!(f, "while ({condition})"),
            StatementKind::DoWhile { condition, .. } => write!(f, "do ... while ({condition});"),
            StatementKind::Return { value: Some(value) } => write!(f, "return {value};"),
            StatementKind::Return { value: None } => f.write_str("return;"),
            StatementKind::Emit { event } => write!(f, "emit {event};"),
            StatementKind::Revert { error } => write!(f, "revert {error};"),
            StatementKind::Throw => f.write_str("throw;"),
            StatementKind::Try { call, .. } => write!(f, "try {call}"),
            StatementKind::InlineAssembly { .. } => f.write_str("assembly { ... }"),
            StatementKind::Placeholder => f.write_str("_;"),
            StatementKind::Break => f.write_str("break;"),
            StatementKind::Continue => f.write_str("continue;"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ast::{AssignOperator, BinaryOperator};

    fn ident(name: &str) -> Expression {
        Expression::new(ExpressionKind::Identifier(name.to_string()), 1)
    }

    fn member(base: Expression, name: &str) -> Expression {
        Expression::new(
            ExpressionKind::MemberAccess { expression: Box::new(base), member: name.to_string() },
            1,
        )
    }

    fn binary(operator: BinaryOperator, left: Expression, right: Expression) -> Expression {
        Expression::new(
            ExpressionKind::Binary { operator, left: Box::new(left), right: Box::new(right) },
            1,
        )
    }

    #[test]
    fn test_normalize_strips_whitespace_case_and_outer_parens() {
        assert_eq!(normalize("  (Msg.Sender) "), "msg.sender");
        assert_eq!(normalize("((a + b))"), "a+b");
        assert_eq!(normalize("(a) + (b)"), "(a)+(b)");
    }

    #[test]
    fn test_binary_rendering_adds_only_needed_parens() {
        let sum = binary(BinaryOperator::Add, ident("a"), ident("b"));
        let product = binary(BinaryOperator::Mul, sum, ident("c"));
        assert_eq!(product.to_string(), "(a + b) * c");

        let left_assoc = binary(
            BinaryOperator::Sub,
            ident("a"),
            binary(BinaryOperator::Sub, ident("b"), ident("c")),
        );
        assert_eq!(left_assoc.to_string(), "a - (b - c)");
    }

    #[test]
    fn test_index_and_assignment_rendering() {
        let target = Expression::new(
            ExpressionKind::IndexAccess {
                base: Box::new(ident("balances")),
                index: Some(Box::new(member(ident("msg"), "sender"))),
            },
            1,
        );
        let assignment = Expression::new(
            ExpressionKind::Assignment {
                operator: AssignOperator::SubAssign,
                left: Box::new(target),
                right: Box::new(ident("amount")),
            },
            1,
        );
        assert_eq!(assignment.to_string(), "balances[msg.sender] -= amount");
        assert_eq!(assignment.normalized(), "balances[msg.sender]-=amount");
    }

    #[test]
    fn test_mapping_type_rendering() {
        let mapping = TypeName::Mapping {
            key: Box::new(TypeName::Elementary("bytes32".into())),
            value: Box::new(TypeName::Array {
                base: Box::new(TypeName::Elementary("uint256".into())),
                length: None,
            }),
        };
        assert_eq!(mapping.to_string(), "mapping(bytes32 => uint256[])");
    }
}
