// AST data structures for solpattern.
// These types represent a parsed Solidity source unit in a form suitable for
// structural pattern checks. The tree is read-only once the parser hands it over.

use serde::Serialize;

/// A parsed `.sol` file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceUnit {
    pub pragmas: Vec<Pragma>,
    pub contracts: Vec<Contract>,
}

impl SourceUnit {
    /// The raw constraint of `pragma solidity ...;`, if declared.
    pub fn solidity_pragma(&self) -> Option<&str> {
        self.pragmas
            .iter()
            .find(|p| p.name == "solidity")
            .map(|p| p.value.as_str())
    }

    pub fn contract(&self, name: &str) -> Option<&Contract> {
        self.contracts.iter().find(|c| c.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pragma {
    pub name: String,
    pub value: String,
    pub line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractKind {
    Contract,
    AbstractContract,
    Interface,
    Library,
}

/// A contract, interface or library with its own (non-inherited) declarations.
#[derive(Debug, Clone, PartialEq)]
pub struct Contract {
    pub name: String,
    pub kind: ContractKind,
    /// Direct parents, in `is` clause order.
    pub parents: Vec<InheritanceSpecifier>,
    pub functions: Vec<FunctionDef>,
    pub modifiers: Vec<ModifierDef>,
    pub state_variables: Vec<StateVariable>,
    pub structs: Vec<StructDef>,
    pub enums: Vec<EnumDef>,
    pub events: Vec<EventDef>,
    pub line: usize,
}

impl Contract {
    pub fn new(name: impl Into<String>, kind: ContractKind, line: usize) -> Self {
        Self {
            name: name.into(),
            kind,
            parents: Vec::new(),
            functions: Vec::new(),
            modifiers: Vec::new(),
            state_variables: Vec::new(),
            structs: Vec::new(),
            enums: Vec::new(),
            events: Vec::new(),
            line,
        }
    }

    pub fn state_variable(&self, name: &str) -> Option<&StateVariable> {
        self.state_variables.iter().find(|v| v.name == name)
    }

    pub fn is_state_variable(&self, name: &str) -> bool {
        self.state_variable(name).is_some()
    }

    /// Fallback functions, including the legacy unnamed `function()` form.
    pub fn fallbacks(&self) -> impl Iterator<Item = &FunctionDef> {
        self.functions.iter().filter(|f| f.kind == FunctionKind::Fallback)
    }

    /// Every statement list owned by the contract: function bodies first, then
    /// modifier bodies, each tagged with its owner.
    pub fn bodies(&self) -> impl Iterator<Item = (BodyOwner<'_>, &[Statement])> {
        let functions = self
            .functions
            .iter()
            .filter_map(|f| f.body.as_deref().map(|b| (BodyOwner::Function(f), b)));
        let modifiers = self
            .modifiers
            .iter()
            .map(|m| (BodyOwner::Modifier(m), m.body.as_slice()));
        functions.chain(modifiers)
    }
}

#[derive(Debug, Clone, Copy)]
pub enum BodyOwner<'a> {
    Function(&'a FunctionDef),
    Modifier(&'a ModifierDef),
}

impl BodyOwner<'_> {
    pub fn name(&self) -> &str {
        match self {
            BodyOwner::Function(f) => f.display_name(),
            BodyOwner::Modifier(m) => &m.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InheritanceSpecifier {
    pub name: String,
    pub arguments: Vec<Expression>,
    pub line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Function,
    Constructor,
    Fallback,
    Receive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    Public,
    External,
    Internal,
    Private,
    /// Nothing written; the compiler default depends on the declaration kind.
    #[default]
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mutability {
    Pure,
    View,
    Payable,
    #[default]
    NonPayable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    /// Empty for fallback and receive functions.
    pub name: String,
    pub kind: FunctionKind,
    pub visibility: Visibility,
    pub mutability: Mutability,
    pub parameters: Vec<Parameter>,
    pub returns: Vec<Parameter>,
    pub modifiers: Vec<ModifierInvocation>,
    /// `None` for declarations without a body (interfaces, abstract functions).
    pub body: Option<Vec<Statement>>,
    pub line: usize,
}

impl FunctionDef {
    /// The name used in reports and by `fn_definition`: special functions are
    /// reported by their kind.
    pub fn display_name(&self) -> &str {
        match self.kind {
            FunctionKind::Constructor => "constructor",
            FunctionKind::Fallback if self.name.is_empty() => "fallback",
            FunctionKind::Receive if self.name.is_empty() => "receive",
            _ => &self.name,
        }
    }

    pub fn is_parameter(&self, name: &str) -> bool {
        self.parameters
            .iter()
            .any(|p| p.name.as_deref() == Some(name))
    }

    pub fn statements(&self) -> &[Statement] {
        self.body.as_deref().unwrap_or(&[])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModifierInvocation {
    pub name: String,
    pub arguments: Vec<Expression>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModifierDef {
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub body: Vec<Statement>,
    pub line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageLocation {
    Memory,
    Storage,
    Calldata,
}

impl StorageLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageLocation::Memory => "memory",
            StorageLocation::Storage => "storage",
            StorageLocation::Calldata => "calldata",
        }
    }

    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "memory" => Some(StorageLocation::Memory),
            "storage" => Some(StorageLocation::Storage),
            "calldata" => Some(StorageLocation::Calldata),
            _ => None,
        }
    }
}

/// Function, modifier, return or local-variable parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub type_name: TypeName,
    pub storage: Option<StorageLocation>,
    pub name: Option<String>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateVariable {
    pub name: String,
    pub type_name: TypeName,
    pub visibility: Visibility,
    pub constant: bool,
    pub immutable: bool,
    pub initial_value: Option<Expression>,
    pub line: usize,
}

impl StateVariable {
    pub fn is_bool(&self) -> bool {
        matches!(&self.type_name, TypeName::Elementary(name) if name == "bool")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDef {
    pub name: String,
    pub fields: Vec<StructField>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructField {
    pub name: String,
    pub type_name: TypeName,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDef {
    pub name: String,
    pub members: Vec<String>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventDef {
    pub name: String,
    pub parameters: Vec<EventParameter>,
    pub anonymous: bool,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventParameter {
    pub type_name: TypeName,
    pub indexed: bool,
    pub name: Option<String>,
}

/// Solidity type names as written in declarations.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeName {
    /// `uint256`, `address`, `address payable`, `bytes32`, `string`, ...
    Elementary(String),
    /// Contract, struct, enum or user value type, possibly dotted.
    UserDefined(String),
    Mapping {
        key: Box<TypeName>,
        value: Box<TypeName>,
    },
    Array {
        base: Box<TypeName>,
        length: Option<Box<Expression>>,
    },
    Function {
        parameters: Vec<TypeName>,
        returns: Vec<TypeName>,
    },
}

impl TypeName {
    /// The kind tag descriptors may use instead of a concrete type.
    pub fn kind_tag(&self) -> &'static str {
        match self {
            TypeName::Elementary(_) => "ElementaryTypeName",
            TypeName::UserDefined(_) => "UserDefinedTypeName",
            TypeName::Mapping { .. } => "Mapping",
            TypeName::Array { .. } => "ArrayTypeName",
            TypeName::Function { .. } => "FunctionTypeName",
        }
    }

    pub fn is_dynamic_array(&self) -> bool {
        matches!(self, TypeName::Array { length: None, .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    pub line: usize,
}

impl Statement {
    pub fn new(kind: StatementKind, line: usize) -> Self {
        Self { kind, line }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    Block {
        statements: Vec<Statement>,
    },
    Unchecked {
        statements: Vec<Statement>,
    },
    Expression {
        expression: Expression,
    },
    /// `T a = e;` or `(T a, , U b) = e;`; `None` entries are skipped tuple slots.
    VariableDeclaration {
        declarations: Vec<Option<Parameter>>,
        initial_value: Option<Expression>,
    },
    If {
        condition: Expression,
        then_branch: Box<Statement>,
        else_branch: Option<Box<Statement>>,
    },
    For {
        init: Option<Box<Statement>>,
        condition: Option<Expression>,
        update: Option<Expression>,
        body: Box<Statement>,
    },
    While {
        condition: Expression,
        body: Box<Statement>,
    },
    DoWhile {
        body: Box<Statement>,
        condition: Expression,
    },
    Return {
        value: Option<Expression>,
    },
    Emit {
        event: Expression,
    },
    /// `revert CustomError(...)`; `revert(...)` is an ordinary call expression.
    Revert {
        error: Expression,
    },
    /// Legacy `throw;`.
    Throw,
    Try {
        call: Expression,
        returns: Vec<Parameter>,
        body: Vec<Statement>,
        catches: Vec<CatchClause>,
    },
    /// Raw Yul text between the braces.
    InlineAssembly {
        code: String,
    },
    /// The `_;` inside a modifier.
    Placeholder,
    Break,
    Continue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    pub identifier: Option<String>,
    pub parameters: Vec<Parameter>,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub line: usize,
}

impl Expression {
    pub fn new(kind: ExpressionKind, line: usize) -> Self {
        Self { kind, line }
    }

    pub fn identifier(&self) -> Option<&str> {
        match &self.kind {
            ExpressionKind::Identifier(name) => Some(name),
            _ => None,
        }
    }

    /// The identifier an lvalue-like expression is rooted at:
    /// `balances[msg.sender].amount` → `balances`.
    pub fn root_identifier(&self) -> Option<&str> {
        match &self.kind {
            ExpressionKind::Identifier(name) => Some(name),
            ExpressionKind::IndexAccess { base, .. } => base.root_identifier(),
            ExpressionKind::MemberAccess { expression, .. } => expression.root_identifier(),
            _ => None,
        }
    }

    /// Strips elementary conversions such as `address(x)` or `payable(x)`.
    pub fn unwrap_conversions(&self) -> &Expression {
        if let ExpressionKind::Call { callee, arguments, .. } = &self.kind {
            if matches!(callee.kind, ExpressionKind::ElementaryType(_)) && arguments.len() == 1 {
                return arguments[0].unwrap_conversions();
            }
        }
        self
    }

    pub fn is_bool_literal(&self, value: bool) -> bool {
        matches!(&self.kind, ExpressionKind::Literal(Literal::Bool(b)) if *b == value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionKind {
    Identifier(String),
    Literal(Literal),
    /// A type used in expression position: `address(x)`, `uint256[]`, `payable`.
    ElementaryType(TypeName),
    MemberAccess {
        expression: Box<Expression>,
        member: String,
    },
    IndexAccess {
        base: Box<Expression>,
        index: Option<Box<Expression>>,
    },
    IndexRange {
        base: Box<Expression>,
        start: Option<Box<Expression>>,
        end: Option<Box<Expression>>,
    },
    Call {
        callee: Box<Expression>,
        arguments: Vec<Expression>,
        /// Names of named arguments (`f({a: 1})`), parallel to `arguments`.
        names: Vec<String>,
    },
    /// `target{value: v, gas: g}`.
    CallOptions {
        callee: Box<Expression>,
        options: Vec<(String, Expression)>,
    },
    Binary {
        operator: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Assignment {
        operator: AssignOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Unary {
        operator: UnaryOperator,
        prefix: bool,
        operand: Box<Expression>,
    },
    Conditional {
        condition: Box<Expression>,
        if_true: Box<Expression>,
        if_false: Box<Expression>,
    },
    Tuple(Vec<Option<Expression>>),
    ArrayLiteral(Vec<Expression>),
    New(TypeName),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Digits as written, plus an optional unit (`1 ether`).
    Number { value: String, unit: Option<String> },
    String(String),
    HexString(String),
    Bool(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    BitOr,
    BitXor,
    BitAnd,
    Shl,
    Shr,
    Sar,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

impl BinaryOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOperator::Or => "||",
            BinaryOperator::And => "&&",
            BinaryOperator::Eq => "==",
            BinaryOperator::NotEq => "!=",
            BinaryOperator::Lt => "<",
            BinaryOperator::Gt => ">",
            BinaryOperator::LtEq => "<=",
            BinaryOperator::GtEq => ">=",
            BinaryOperator::BitOr => "|",
            BinaryOperator::BitXor => "^",
            BinaryOperator::BitAnd => "&",
            BinaryOperator::Shl => "<<",
            BinaryOperator::Shr => ">>",
            BinaryOperator::Sar => ">>>",
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Mod => "%",
            BinaryOperator::Pow => "**",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let op = match symbol {
            "||" => BinaryOperator::Or,
            "&&" => BinaryOperator::And,
            "==" => BinaryOperator::Eq,
            "!=" => BinaryOperator::NotEq,
            "<" => BinaryOperator::Lt,
            ">" => BinaryOperator::Gt,
            "<=" => BinaryOperator::LtEq,
            ">=" => BinaryOperator::GtEq,
            "|" => BinaryOperator::BitOr,
            "^" => BinaryOperator::BitXor,
            "&" => BinaryOperator::BitAnd,
            "<<" => BinaryOperator::Shl,
            ">>" => BinaryOperator::Shr,
            ">>>" => BinaryOperator::Sar,
            "+" => BinaryOperator::Add,
            "-" => BinaryOperator::Sub,
            "*" => BinaryOperator::Mul,
            "/" => BinaryOperator::Div,
            "%" => BinaryOperator::Mod,
            "**" => BinaryOperator::Pow,
            _ => return None,
        };
        Some(op)
    }

    /// Binding strength, higher binds tighter.
    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOperator::Or => 1,
            BinaryOperator::And => 2,
            BinaryOperator::Eq | BinaryOperator::NotEq => 3,
            BinaryOperator::Lt
            | BinaryOperator::Gt
            | BinaryOperator::LtEq
            | BinaryOperator::GtEq => 4,
            BinaryOperator::BitOr => 5,
            BinaryOperator::BitXor => 6,
            BinaryOperator::BitAnd => 7,
            BinaryOperator::Shl | BinaryOperator::Shr | BinaryOperator::Sar => 8,
            BinaryOperator::Add | BinaryOperator::Sub => 9,
            BinaryOperator::Mul | BinaryOperator::Div | BinaryOperator::Mod => 10,
            BinaryOperator::Pow => 11,
        }
    }

    pub fn is_right_associative(&self) -> bool {
        matches!(self, BinaryOperator::Pow)
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Eq
                | BinaryOperator::NotEq
                | BinaryOperator::Lt
                | BinaryOperator::Gt
                | BinaryOperator::LtEq
                | BinaryOperator::GtEq
        )
    }

    /// The operator that keeps the meaning when operands are swapped.
    pub fn mirrored(&self) -> Option<Self> {
        match self {
            BinaryOperator::Eq => Some(BinaryOperator::Eq),
            BinaryOperator::NotEq => Some(BinaryOperator::NotEq),
            BinaryOperator::Lt => Some(BinaryOperator::Gt),
            BinaryOperator::Gt => Some(BinaryOperator::Lt),
            BinaryOperator::LtEq => Some(BinaryOperator::GtEq),
            BinaryOperator::GtEq => Some(BinaryOperator::LtEq),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOperator {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    OrAssign,
    AndAssign,
    XorAssign,
    ShlAssign,
    ShrAssign,
}

impl AssignOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignOperator::Assign => "=",
            AssignOperator::AddAssign => "+=",
            AssignOperator::SubAssign => "-=",
            AssignOperator::MulAssign => "*=",
            AssignOperator::DivAssign => "/=",
            AssignOperator::ModAssign => "%=",
            AssignOperator::OrAssign => "|=",
            AssignOperator::AndAssign => "&=",
            AssignOperator::XorAssign => "^=",
            AssignOperator::ShlAssign => "<<=",
            AssignOperator::ShrAssign => ">>=",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let op = match symbol {
            "=" => AssignOperator::Assign,
            "+=" => AssignOperator::AddAssign,
            "-=" => AssignOperator::SubAssign,
            "*=" => AssignOperator::MulAssign,
            "/=" => AssignOperator::DivAssign,
            "%=" => AssignOperator::ModAssign,
            "|=" => AssignOperator::OrAssign,
            "&=" => AssignOperator::AndAssign,
            "^=" => AssignOperator::XorAssign,
            "<<=" => AssignOperator::ShlAssign,
            ">>=" => AssignOperator::ShrAssign,
            _ => return None,
        };
        Some(op)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    BitNot,
    Neg,
    Increment,
    Decrement,
    Delete,
}

impl UnaryOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryOperator::Not => "!",
            UnaryOperator::BitNot => "~",
            UnaryOperator::Neg => "-",
            UnaryOperator::Increment => "++",
            UnaryOperator::Decrement => "--",
            UnaryOperator::Delete => "delete",
        }
    }

    /// `++`, `--` and `delete` write to their operand.
    pub fn mutates(&self) -> bool {
        matches!(
            self,
            UnaryOperator::Increment | UnaryOperator::Decrement | UnaryOperator::Delete
        )
    }
}
