//! Recursive-descent Solidity parser producing the domain AST.
//!
//! Declarations versus expressions are resolved by trying the declaration
//! first and rewinding on failure. Expressions use precedence climbing over
//! [`BinaryOperator::precedence`].

use super::lexer::{tokenize, Token, TokenKind};
use crate::domain::ast::{
    AssignOperator, BinaryOperator, CatchClause, Contract, ContractKind, EnumDef, EventDef,
    EventParameter, Expression, ExpressionKind, FunctionDef, FunctionKind, InheritanceSpecifier,
    Literal, ModifierDef, ModifierInvocation, Mutability, Parameter, Pragma, SourceUnit, Statement,
    StatementKind, StateVariable, StorageLocation, StructDef, StructField, TypeName, UnaryOperator,
    Visibility,
};
use crate::domain::errors::ParseError;

type PResult<T> = Result<T, ParseError>;

const UNITS: [&str; 11] = [
    "wei", "gwei", "ether", "szabo", "finney", "seconds", "minutes", "hours", "days", "weeks",
    "years",
];

pub fn parse_source(src: &str) -> PResult<SourceUnit> {
    let tokens = tokenize(src)?;
    Parser { src, tokens, pos: 0 }.source_unit()
}

/// `uint256`, `bytes4`, `fixed128x18`, `address`, ...
pub fn is_elementary(word: &str) -> bool {
    match word {
        "address" | "bool" | "string" | "bytes" | "byte" | "int" | "uint" | "fixed" | "ufixed"
        | "var" => true,
        _ => {
            let sized = |prefix: &str| {
                word.strip_prefix(prefix)
                    .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
            };
            let fixed = |prefix: &str| {
                word.strip_prefix(prefix).is_some_and(|spec| {
                    let mut parts = spec.split('x');
                    matches!(
                        (parts.next(), parts.next(), parts.next()),
                        (Some(m), Some(n), None)
                            if !m.is_empty() && !n.is_empty()
                                && m.bytes().all(|b| b.is_ascii_digit())
                                && n.bytes().all(|b| b.is_ascii_digit())
                    )
                })
            };
            sized("uint") || sized("int") || sized("bytes") || fixed("ufixed") || fixed("fixed")
        }
    }
}

struct Parser<'a> {
    src: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    // ----- token helpers -----

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.pos + offset).min(last)]
    }

    fn line(&self) -> usize {
        self.peek().line
    }

    /// Steps past the current token; never past end of file.
    fn bump(&mut self) {
        if !self.at_eof() {
            self.pos += 1;
        }
    }

    fn at_eof(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn is_punct_at(&self, offset: usize, symbol: &str) -> bool {
        matches!(&self.peek_at(offset).kind, TokenKind::Punct(p) if *p == symbol)
    }

    fn is_punct(&self, symbol: &str) -> bool {
        self.is_punct_at(0, symbol)
    }

    fn is_word_at(&self, offset: usize, word: &str) -> bool {
        matches!(&self.peek_at(offset).kind, TokenKind::Ident(w) if w == word)
    }

    fn is_word(&self, word: &str) -> bool {
        self.is_word_at(0, word)
    }

    fn peek_word(&self) -> Option<&str> {
        match &self.peek().kind {
            TokenKind::Ident(w) => Some(w.as_str()),
            _ => None,
        }
    }

    fn eat_punct(&mut self, symbol: &str) -> bool {
        let found = self.is_punct(symbol);
        if found {
            self.bump();
        }
        found
    }

    fn eat_word(&mut self, word: &str) -> bool {
        let found = self.is_word(word);
        if found {
            self.bump();
        }
        found
    }

    fn error_here(&self, message: impl Into<String>) -> ParseError {
        let token = self.peek();
        ParseError::new(token.line, token.column, message)
    }

    fn describe(&self) -> String {
        match &self.peek().kind {
            TokenKind::Ident(w) => format!("`{w}`"),
            TokenKind::Number(n) => format!("number `{n}`"),
            TokenKind::Str(_) | TokenKind::HexStr(_) => "string literal".to_string(),
            TokenKind::Punct(p) => format!("`{p}`"),
            TokenKind::Eof => "end of file".to_string(),
        }
    }

    fn expect_punct(&mut self, symbol: &str) -> PResult<()> {
        if self.eat_punct(symbol) {
            Ok(())
        } else {
            Err(self.error_here(format!("expected `{symbol}`, found {}", self.describe())))
        }
    }

    fn expect_word(&mut self, word: &str) -> PResult<()> {
        if self.eat_word(word) {
            Ok(())
        } else {
            Err(self.error_here(format!("expected `{word}`, found {}", self.describe())))
        }
    }

    fn expect_ident(&mut self) -> PResult<String> {
        match &self.peek().kind {
            TokenKind::Ident(w) => {
                let w = w.clone();
                self.bump();
                Ok(w)
            }
            _ => Err(self.error_here(format!("expected identifier, found {}", self.describe()))),
        }
    }

    /// `a.b.c`
    fn path(&mut self) -> PResult<String> {
        let mut path = self.expect_ident()?;
        while self.is_punct(".") && matches!(self.peek_at(1).kind, TokenKind::Ident(_)) {
            self.bump();
            path.push('.');
            path.push_str(&self.expect_ident()?);
        }
        Ok(path)
    }

    /// Skips to the next `;` at the current nesting depth and consumes it.
    fn skip_to_semicolon(&mut self) -> PResult<()> {
        let mut depth = 0usize;
        loop {
            match &self.peek().kind {
                TokenKind::Eof => return Err(self.error_here("expected `;`, found end of file")),
                TokenKind::Punct("(" | "{" | "[") => depth += 1,
                TokenKind::Punct(")" | "}" | "]") => depth = depth.saturating_sub(1),
                TokenKind::Punct(";") if depth == 0 => {
                    self.bump();
                    return Ok(());
                }
                _ => {}
            }
            self.bump();
        }
    }

    /// Index of the token closing the bracket at the current position.
    fn matching_close(&self, open: &str, close: &str) -> PResult<usize> {
        let mut depth = 0usize;
        for index in self.pos..self.tokens.len() {
            match &self.tokens[index].kind {
                TokenKind::Punct(p) if *p == open => depth += 1,
                TokenKind::Punct(p) if *p == close => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(index);
                    }
                }
                TokenKind::Eof => break,
                _ => {}
            }
        }
        Err(self.error_here(format!("unbalanced `{open}`")))
    }

    // ----- source unit -----

    fn source_unit(mut self) -> PResult<SourceUnit> {
        let mut unit = SourceUnit::default();
        while !self.at_eof() {
            let line = self.line();
            match self.peek_word() {
                Some("pragma") => {
                    self.bump();
                    unit.pragmas.push(self.pragma(line)?);
                }
                Some("import") => self.skip_to_semicolon()?,
                Some("contract") => {
                    self.bump();
                    unit.contracts.push(self.contract(ContractKind::Contract, line)?);
                }
                Some("abstract") => {
                    self.bump();
                    self.expect_word("contract")?;
                    unit.contracts.push(self.contract(ContractKind::AbstractContract, line)?);
                }
                Some("interface") => {
                    self.bump();
                    unit.contracts.push(self.contract(ContractKind::Interface, line)?);
                }
                Some("library") => {
                    self.bump();
                    unit.contracts.push(self.contract(ContractKind::Library, line)?);
                }
                // File-level declarations belong to no contract.
                Some("struct") => {
                    self.bump();
                    self.struct_def(line)?;
                }
                Some("enum") => {
                    self.bump();
                    self.enum_def(line)?;
                }
                Some("event") => {
                    self.bump();
                    self.event_def(line)?;
                }
                Some("function") => {
                    self.bump();
                    self.function(FunctionKind::Function, line)?;
                }
                Some("error" | "using" | "type") => self.skip_to_semicolon()?,
                _ if self.is_punct(";") => self.bump(),
                _ => {
                    self.state_variable(line)?;
                }
            }
        }
        Ok(unit)
    }

    fn pragma(&mut self, line: usize) -> PResult<Pragma> {
        let name = self.expect_ident()?;
        let start = self.peek().start;
        while !self.is_punct(";") {
            if self.at_eof() {
                return Err(self.error_here("expected `;` after pragma"));
            }
            self.bump();
        }
        let end = self.peek().start;
        self.bump();
        Ok(Pragma { name, value: self.src[start..end].trim().to_string(), line })
    }

    fn contract(&mut self, kind: ContractKind, line: usize) -> PResult<Contract> {
        let name = self.expect_ident()?;
        let mut contract = Contract::new(name, kind, line);

        if self.eat_word("is") {
            loop {
                let line = self.line();
                let name = self.path()?;
                let arguments =
                    if self.is_punct("(") { self.call_arguments()?.0 } else { Vec::new() };
                contract.parents.push(InheritanceSpecifier { name, arguments, line });
                if !self.eat_punct(",") {
                    break;
                }
            }
        }

        self.expect_punct("{")?;
        while !self.eat_punct("}") {
            if self.at_eof() {
                return Err(self.error_here(format!("unterminated body of `{}`", contract.name)));
            }
            self.contract_member(&mut contract)?;
        }
        Ok(contract)
    }

    fn contract_member(&mut self, contract: &mut Contract) -> PResult<()> {
        let line = self.line();
        match self.peek_word() {
            Some("function") => {
                self.bump();
                let function = self.function(FunctionKind::Function, line)?;
                contract.functions.push(function);
            }
            Some("constructor") => {
                self.bump();
                let function = self.function(FunctionKind::Constructor, line)?;
                contract.functions.push(function);
            }
            Some("fallback") if self.is_punct_at(1, "(") => {
                self.bump();
                let function = self.function(FunctionKind::Fallback, line)?;
                contract.functions.push(function);
            }
            Some("receive") if self.is_punct_at(1, "(") => {
                self.bump();
                let function = self.function(FunctionKind::Receive, line)?;
                contract.functions.push(function);
            }
            Some("modifier") => {
                self.bump();
                let modifier = self.modifier_def(line)?;
                contract.modifiers.push(modifier);
            }
            Some("struct") => {
                self.bump();
                let def = self.struct_def(line)?;
                contract.structs.push(def);
            }
            Some("enum") => {
                self.bump();
                let def = self.enum_def(line)?;
                contract.enums.push(def);
            }
            Some("event") => {
                self.bump();
                let def = self.event_def(line)?;
                contract.events.push(def);
            }
            Some("error" | "using") => self.skip_to_semicolon()?,
            Some("type") if self.is_word_at(2, "is") => self.skip_to_semicolon()?,
            _ if self.is_punct(";") => self.bump(),
            _ => {
                let variable = self.state_variable(line)?;
                contract.state_variables.push(variable);
            }
        }
        Ok(())
    }

    // ----- declarations -----

    fn function(&mut self, kind: FunctionKind, line: usize) -> PResult<FunctionDef> {
        let (kind, name) = match kind {
            FunctionKind::Function if self.is_punct("(") => (FunctionKind::Fallback, String::new()),
            FunctionKind::Function => (kind, self.expect_ident()?),
            _ => (kind, String::new()),
        };
        let parameters = self.parameter_list()?;
        let mut function = FunctionDef {
            name,
            kind,
            visibility: Visibility::Default,
            mutability: Mutability::NonPayable,
            parameters,
            returns: Vec::new(),
            modifiers: Vec::new(),
            body: None,
            line,
        };

        loop {
            if self.is_punct("{") || self.is_punct(";") || self.at_eof() {
                break;
            }
            let attribute_line = self.line();
            let word = self.expect_ident()?;
            match word.as_str() {
                "public" => function.visibility = Visibility::Public,
                "external" => function.visibility = Visibility::External,
                "internal" => function.visibility = Visibility::Internal,
                "private" => function.visibility = Visibility::Private,
                "pure" => function.mutability = Mutability::Pure,
                "view" | "constant" => function.mutability = Mutability::View,
                "payable" => function.mutability = Mutability::Payable,
                "virtual" => {}
                "override" => {
                    if self.is_punct("(") {
                        let close = self.matching_close("(", ")")?;
                        self.pos = close + 1;
                    }
                }
                "returns" => function.returns = self.parameter_list()?,
                _ => {
                    let mut name = word;
                    while self.eat_punct(".") {
                        name.push('.');
                        name.push_str(&self.expect_ident()?);
                    }
                    let arguments =
                        if self.is_punct("(") { self.call_arguments()?.0 } else { Vec::new() };
                    let line = attribute_line;
                    function.modifiers.push(ModifierInvocation { name, arguments, line });
                }
            }
        }

        if self.eat_punct(";") {
            return Ok(function);
        }
        function.body = Some(self.block_statements()?);
        Ok(function)
    }

    fn modifier_def(&mut self, line: usize) -> PResult<ModifierDef> {
        let name = self.expect_ident()?;
        let parameters = if self.is_punct("(") { self.parameter_list()? } else { Vec::new() };
        loop {
            if self.eat_word("virtual") {
                continue;
            }
            if self.eat_word("override") {
                if self.is_punct("(") {
                    let close = self.matching_close("(", ")")?;
                    self.pos = close + 1;
                }
                continue;
            }
            break;
        }
        let body = if self.eat_punct(";") { Vec::new() } else { self.block_statements()? };
        Ok(ModifierDef { name, parameters, body, line })
    }

    fn struct_def(&mut self, line: usize) -> PResult<StructDef> {
        let name = self.expect_ident()?;
        self.expect_punct("{")?;
        let mut fields = Vec::new();
        while !self.eat_punct("}") {
            let line = self.line();
            let type_name = self.type_name()?;
            let name = self.expect_ident()?;
            self.expect_punct(";")?;
            fields.push(StructField { name, type_name, line });
        }
        Ok(StructDef { name, fields, line })
    }

    fn enum_def(&mut self, line: usize) -> PResult<EnumDef> {
        let name = self.expect_ident()?;
        self.expect_punct("{")?;
        let mut members = Vec::new();
        while !self.eat_punct("}") {
            members.push(self.expect_ident()?);
            if !self.eat_punct(",") {
                self.expect_punct("}")?;
                break;
            }
        }
        Ok(EnumDef { name, members, line })
    }

    fn event_def(&mut self, line: usize) -> PResult<EventDef> {
        let name = self.expect_ident()?;
        self.expect_punct("(")?;
        let mut parameters = Vec::new();
        while !self.eat_punct(")") {
            let type_name = self.type_name()?;
            let indexed = self.eat_word("indexed");
            let name = match &self.peek().kind {
                TokenKind::Ident(w) => {
                    let w = w.clone();
                    self.bump();
                    Some(w)
                }
                _ => None,
            };
            parameters.push(EventParameter { type_name, indexed, name });
            if !self.eat_punct(",") {
                self.expect_punct(")")?;
                break;
            }
        }
        let anonymous = self.eat_word("anonymous");
        self.expect_punct(";")?;
        Ok(EventDef { name, parameters, anonymous, line })
    }

    fn state_variable(&mut self, line: usize) -> PResult<StateVariable> {
        let type_name = self.type_name()?;
        let mut variable = StateVariable {
            name: String::new(),
            type_name,
            visibility: Visibility::Default,
            constant: false,
            immutable: false,
            initial_value: None,
            line,
        };
        loop {
            match self.peek_word() {
                Some("public") => variable.visibility = Visibility::Public,
                Some("private") => variable.visibility = Visibility::Private,
                Some("internal") => variable.visibility = Visibility::Internal,
                Some("constant") => variable.constant = true,
                Some("immutable") => variable.immutable = true,
                Some("transient") => {}
                Some("override") => {
                    self.bump();
                    if self.is_punct("(") {
                        let close = self.matching_close("(", ")")?;
                        self.pos = close;
                    } else {
                        continue;
                    }
                }
                _ => break,
            }
            self.bump();
        }
        variable.name = self.expect_ident()?;
        if self.eat_punct("=") {
            variable.initial_value = Some(self.expression()?);
        }
        self.expect_punct(";")?;
        Ok(variable)
    }

    fn parameter_list(&mut self) -> PResult<Vec<Parameter>> {
        self.expect_punct("(")?;
        let mut parameters = Vec::new();
        while !self.eat_punct(")") {
            parameters.push(self.parameter()?);
            if !self.eat_punct(",") {
                self.expect_punct(")")?;
                break;
            }
        }
        Ok(parameters)
    }

    fn parameter(&mut self) -> PResult<Parameter> {
        let line = self.line();
        let type_name = self.type_name()?;
        let storage = self.storage_location();
        let name = match &self.peek().kind {
            TokenKind::Ident(w) => {
                let w = w.clone();
                self.bump();
                Some(w)
            }
            _ => None,
        };
        Ok(Parameter { type_name, storage, name, line })
    }

    fn storage_location(&mut self) -> Option<StorageLocation> {
        let location = self.peek_word().and_then(StorageLocation::from_keyword)?;
        self.bump();
        Some(location)
    }

    fn type_name(&mut self) -> PResult<TypeName> {
        let mut ty = if self.eat_word("mapping") {
            self.expect_punct("(")?;
            let key = self.type_name()?;
            if matches!(self.peek().kind, TokenKind::Ident(_)) {
                self.bump();
            }
            self.expect_punct("=>")?;
            let value = self.type_name()?;
            if matches!(self.peek().kind, TokenKind::Ident(_)) {
                self.bump();
            }
            self.expect_punct(")")?;
            TypeName::Mapping { key: Box::new(key), value: Box::new(value) }
        } else if self.eat_word("function") {
            let parameters = self.parameter_list()?.into_iter().map(|p| p.type_name).collect();
            let mut returns = Vec::new();
            while let Some(word) = self.peek_word() {
                match word {
                    "internal" | "external" | "pure" | "view" | "payable" => self.bump(),
                    "returns" => {
                        self.bump();
                        returns = self.parameter_list()?.into_iter().map(|p| p.type_name).collect();
                    }
                    _ => break,
                }
            }
            TypeName::Function { parameters, returns }
        } else {
            let word = self.path()?;
            if word == "address" && self.eat_word("payable") {
                TypeName::Elementary("address payable".to_string())
            } else if is_elementary(&word) {
                TypeName::Elementary(word)
            } else {
                TypeName::UserDefined(word)
            }
        };

        while self.eat_punct("[") {
            let length = if self.is_punct("]") { None } else { Some(Box::new(self.expression()?)) };
            self.expect_punct("]")?;
            ty = TypeName::Array { base: Box::new(ty), length };
        }
        Ok(ty)
    }

    // ----- statements -----

    fn block_statements(&mut self) -> PResult<Vec<Statement>> {
        self.expect_punct("{")?;
        let mut statements = Vec::new();
        while !self.eat_punct("}") {
            if self.at_eof() {
                return Err(self.error_here("expected `}`, found end of file"));
            }
            statements.push(self.statement()?);
        }
        Ok(statements)
    }

    fn statement(&mut self) -> PResult<Statement> {
        let line = self.line();
        if self.is_punct("{") {
            let statements = self.block_statements()?;
            return Ok(Statement::new(StatementKind::Block { statements }, line));
        }

        let kind = match self.peek_word() {
            Some("if") => {
                self.bump();
                self.expect_punct("(")?;
                let condition = self.expression()?;
                self.expect_punct(")")?;
                let then_branch = Box::new(self.statement()?);
                let else_branch =
                    if self.eat_word("else") { Some(Box::new(self.statement()?)) } else { None };
                StatementKind::If { condition, then_branch, else_branch }
            }
            Some("for") => {
                self.bump();
                self.expect_punct("(")?;
                let init = if self.eat_punct(";") {
                    None
                } else {
                    Some(Box::new(self.simple_statement()?))
                };
                let condition = if self.is_punct(";") { None } else { Some(self.expression()?) };
                self.expect_punct(";")?;
                let update = if self.is_punct(")") { None } else { Some(self.expression()?) };
                self.expect_punct(")")?;
                let body = Box::new(self.statement()?);
                StatementKind::For { init, condition, update, body }
            }
            Some("while") => {
                self.bump();
                self.expect_punct("(")?;
                let condition = self.expression()?;
                self.expect_punct(")")?;
                let body = Box::new(self.statement()?);
                StatementKind::While { condition, body }
            }
            Some("do") => {
                self.bump();
                let body = Box::new(self.statement()?);
                self.expect_word("while")?;
                self.expect_punct("(")?;
                let condition = self.expression()?;
                self.expect_punct(")")?;
                self.expect_punct(";")?;
                StatementKind::DoWhile { body, condition }
            }
            Some("return") => {
                self.bump();
                let value = if self.is_punct(";") { None } else { Some(self.expression()?) };
                self.expect_punct(";")?;
                StatementKind::Return { value }
            }
            Some("emit") => {
                self.bump();
                let event = self.expression()?;
                self.expect_punct(";")?;
                StatementKind::Emit { event }
            }
            Some("revert") if !self.is_punct_at(1, "(") && !self.is_punct_at(1, ";") => {
                self.bump();
                let error = self.expression()?;
                self.expect_punct(";")?;
                StatementKind::Revert { error }
            }
            Some("throw") => {
                self.bump();
                self.expect_punct(";")?;
                StatementKind::Throw
            }
            Some("break") => {
                self.bump();
                self.expect_punct(";")?;
                StatementKind::Break
            }
            Some("continue") => {
                self.bump();
                self.expect_punct(";")?;
                StatementKind::Continue
            }
            Some("_") if self.is_punct_at(1, ";") => {
                self.pos += 2;
                StatementKind::Placeholder
            }
            Some("unchecked") if self.is_punct_at(1, "{") => {
                self.bump();
                StatementKind::Unchecked { statements: self.block_statements()? }
            }
            Some("assembly") => {
                self.bump();
                self.inline_assembly()?
            }
            Some("try") => {
                self.bump();
                self.try_statement()?
            }
            _ => return self.simple_statement(),
        };
        Ok(Statement::new(kind, line))
    }

    fn inline_assembly(&mut self) -> PResult<StatementKind> {
        if matches!(self.peek().kind, TokenKind::Str(_)) {
            self.bump();
        }
        if self.is_punct("(") {
            let close = self.matching_close("(", ")")?;
            self.pos = close + 1;
        }
        if !self.is_punct("{") {
            let found = self.describe();
            return Err(self.error_here(format!("expected `{{` after assembly, found {found}")));
        }
        let open = self.pos;
        let close = self.matching_close("{", "}")?;
        let code = self.src[self.tokens[open].end..self.tokens[close].start].trim().to_string();
        self.pos = close + 1;
        Ok(StatementKind::InlineAssembly { code })
    }

    fn try_statement(&mut self) -> PResult<StatementKind> {
        let call = self.expression()?;
        let returns = if self.eat_word("returns") { self.parameter_list()? } else { Vec::new() };
        let body = self.block_statements()?;
        let mut catches = Vec::new();
        while self.eat_word("catch") {
            let identifier = match &self.peek().kind {
                TokenKind::Ident(w) => {
                    let w = w.clone();
                    self.bump();
                    Some(w)
                }
                _ => None,
            };
            let parameters = if self.is_punct("(") { self.parameter_list()? } else { Vec::new() };
            let body = self.block_statements()?;
            catches.push(CatchClause { identifier, parameters, body });
        }
        if catches.is_empty() {
            return Err(self.error_here("expected `catch` after try block"));
        }
        Ok(StatementKind::Try { call, returns, body, catches })
    }

    /// A declaration or an expression statement, including its `;`.
    fn simple_statement(&mut self) -> PResult<Statement> {
        let line = self.line();
        let mark = self.pos;
        if let Ok(Some(kind)) = self.variable_declaration() {
            self.expect_punct(";")?;
            return Ok(Statement::new(kind, line));
        }
        self.pos = mark;
        let expression = self.expression()?;
        self.expect_punct(";")?;
        Ok(Statement::new(StatementKind::Expression { expression }, line))
    }

    /// `T [location] name [= value]` or `(T a, , U b) = value`. Returns
    /// `Ok(None)` when the tokens do not form a declaration; the caller rewinds.
    fn variable_declaration(&mut self) -> PResult<Option<StatementKind>> {
        if self.eat_punct("(") {
            let mut declarations = Vec::new();
            loop {
                if self.is_punct(",") || self.is_punct(")") {
                    declarations.push(None);
                } else {
                    let parameter = self.parameter()?;
                    if parameter.name.is_none() {
                        return Ok(None);
                    }
                    declarations.push(Some(parameter));
                }
                if self.eat_punct(")") {
                    break;
                }
                if !self.eat_punct(",") {
                    return Ok(None);
                }
            }
            if !declarations.iter().any(Option::is_some) || !self.eat_punct("=") {
                return Ok(None);
            }
            let initial_value = Some(self.expression()?);
            return Ok(Some(StatementKind::VariableDeclaration { declarations, initial_value }));
        }

        if matches!(self.peek_word(), Some("delete" | "new")) {
            return Ok(None);
        }
        let parameter = self.parameter()?;
        if parameter.name.is_none() {
            return Ok(None);
        }
        let initial_value = if self.eat_punct("=") {
            Some(self.expression()?)
        } else if self.is_punct(";") {
            None
        } else {
            return Ok(None);
        };
        Ok(Some(StatementKind::VariableDeclaration {
            declarations: vec![Some(parameter)],
            initial_value,
        }))
    }

    // ----- expressions -----

    fn expression(&mut self) -> PResult<Expression> {
        let left = self.conditional()?;
        let operator = match &self.peek().kind {
            TokenKind::Punct(p) => AssignOperator::from_symbol(p),
            _ => None,
        };
        let Some(operator) = operator else {
            return Ok(left);
        };
        self.bump();
        let right = self.expression()?;
        let line = left.line;
        Ok(Expression::new(
            ExpressionKind::Assignment { operator, left: Box::new(left), right: Box::new(right) },
            line,
        ))
    }

    fn conditional(&mut self) -> PResult<Expression> {
        let condition = self.binary(1)?;
        if !self.eat_punct("?") {
            return Ok(condition);
        }
        let if_true = self.expression()?;
        self.expect_punct(":")?;
        let if_false = self.expression()?;
        let line = condition.line;
        Ok(Expression::new(
            ExpressionKind::Conditional {
                condition: Box::new(condition),
                if_true: Box::new(if_true),
                if_false: Box::new(if_false),
            },
            line,
        ))
    }

    fn binary(&mut self, min_precedence: u8) -> PResult<Expression> {
        let mut left = self.unary()?;
        loop {
            let operator = match &self.peek().kind {
                TokenKind::Punct(p) => BinaryOperator::from_symbol(p),
                _ => None,
            };
            let Some(operator) = operator.filter(|op| op.precedence() >= min_precedence) else {
                return Ok(left);
            };
            self.bump();
            let next = if operator.is_right_associative() {
                operator.precedence()
            } else {
                operator.precedence() + 1
            };
            let right = self.binary(next)?;
            let line = left.line;
            left = Expression::new(
                ExpressionKind::Binary { operator, left: Box::new(left), right: Box::new(right) },
                line,
            );
        }
    }

    fn unary(&mut self) -> PResult<Expression> {
        let line = self.line();
        let operator = match &self.peek().kind {
            TokenKind::Punct("!") => Some(UnaryOperator::Not),
            TokenKind::Punct("~") => Some(UnaryOperator::BitNot),
            TokenKind::Punct("-") => Some(UnaryOperator::Neg),
            TokenKind::Punct("++") => Some(UnaryOperator::Increment),
            TokenKind::Punct("--") => Some(UnaryOperator::Decrement),
            TokenKind::Ident(w) if w == "delete" => Some(UnaryOperator::Delete),
            _ => None,
        };
        match operator {
            Some(operator) => {
                self.bump();
                let operand = self.unary()?;
                Ok(Expression::new(
                    ExpressionKind::Unary { operator, prefix: true, operand: Box::new(operand) },
                    line,
                ))
            }
            None => self.postfix(),
        }
    }

    fn postfix(&mut self) -> PResult<Expression> {
        let mut expression = self.primary()?;
        loop {
            let line = expression.line;
            if self.eat_punct(".") {
                let member = self.expect_ident()?;
                expression = Expression::new(
                    ExpressionKind::MemberAccess { expression: Box::new(expression), member },
                    line,
                );
            } else if self.eat_punct("[") {
                let start = if self.is_punct("]") || self.is_punct(":") {
                    None
                } else {
                    Some(Box::new(self.expression()?))
                };
                if self.eat_punct(":") {
                    let end =
                        if self.is_punct("]") { None } else { Some(Box::new(self.expression()?)) };
                    self.expect_punct("]")?;
                    expression = Expression::new(
                        ExpressionKind::IndexRange { base: Box::new(expression), start, end },
                        line,
                    );
                } else {
                    self.expect_punct("]")?;
                    expression = Expression::new(
                        ExpressionKind::IndexAccess { base: Box::new(expression), index: start },
                        line,
                    );
                }
            } else if self.is_punct("(") {
                let (arguments, names) = self.call_arguments()?;
                expression = Expression::new(
                    ExpressionKind::Call { callee: Box::new(expression), arguments, names },
                    line,
                );
            } else if self.is_punct("{")
                && matches!(self.peek_at(1).kind, TokenKind::Ident(_))
                && self.is_punct_at(2, ":")
            {
                self.bump();
                let mut options = Vec::new();
                while !self.eat_punct("}") {
                    let name = self.expect_ident()?;
                    self.expect_punct(":")?;
                    options.push((name, self.expression()?));
                    if !self.eat_punct(",") {
                        self.expect_punct("}")?;
                        break;
                    }
                }
                expression = Expression::new(
                    ExpressionKind::CallOptions { callee: Box::new(expression), options },
                    line,
                );
            } else if self.is_punct("++") || self.is_punct("--") {
                let operator = if self.is_punct("++") {
                    UnaryOperator::Increment
                } else {
                    UnaryOperator::Decrement
                };
                self.bump();
                let operand = Box::new(expression);
                let kind = ExpressionKind::Unary { operator, prefix: false, operand };
                expression = Expression::new(kind, line);
            } else {
                return Ok(expression);
            }
        }
    }

    /// `(a, b)` or `({x: a, y: b})`.
    fn call_arguments(&mut self) -> PResult<(Vec<Expression>, Vec<String>)> {
        self.expect_punct("(")?;
        let mut arguments = Vec::new();
        let mut names = Vec::new();
        if self.is_punct("{") {
            self.bump();
            while !self.eat_punct("}") {
                names.push(self.expect_ident()?);
                self.expect_punct(":")?;
                arguments.push(self.expression()?);
                if !self.eat_punct(",") {
                    self.expect_punct("}")?;
                    break;
                }
            }
            self.expect_punct(")")?;
            return Ok((arguments, names));
        }
        while !self.eat_punct(")") {
            arguments.push(self.expression()?);
            if !self.eat_punct(",") {
                self.expect_punct(")")?;
                break;
            }
        }
        Ok((arguments, names))
    }

    fn primary(&mut self) -> PResult<Expression> {
        let token = self.peek().clone();
        let line = token.line;
        let kind = match token.kind {
            TokenKind::Number(value) => {
                self.bump();
                let unit = match self.peek_word() {
                    Some(word) if UNITS.contains(&word) => {
                        let unit = word.to_string();
                        self.bump();
                        Some(unit)
                    }
                    _ => None,
                };
                ExpressionKind::Literal(Literal::Number { value, unit })
            }
            TokenKind::Str(mut text) => {
                self.bump();
                while let TokenKind::Str(more) = &self.peek().kind {
                    text.push_str(more);
                    self.bump();
                }
                ExpressionKind::Literal(Literal::String(text))
            }
            TokenKind::HexStr(text) => {
                self.bump();
                ExpressionKind::Literal(Literal::HexString(text))
            }
            TokenKind::Punct("(") => {
                self.bump();
                let mut items = Vec::new();
                loop {
                    if self.is_punct(",") || self.is_punct(")") {
                        items.push(None);
                    } else {
                        items.push(Some(self.expression()?));
                    }
                    if self.eat_punct(")") {
                        break;
                    }
                    self.expect_punct(",")?;
                }
                if items.len() == 1 {
                    match items.pop() {
                        Some(Some(inner)) => return Ok(inner),
                        _ => ExpressionKind::Tuple(Vec::new()),
                    }
                } else {
                    ExpressionKind::Tuple(items)
                }
            }
            TokenKind::Punct("[") => {
                self.bump();
                let mut items = Vec::new();
                while !self.eat_punct("]") {
                    items.push(self.expression()?);
                    if !self.eat_punct(",") {
                        self.expect_punct("]")?;
                        break;
                    }
                }
                ExpressionKind::ArrayLiteral(items)
            }
            TokenKind::Ident(word) => match word.as_str() {
                "true" | "false" => {
                    self.bump();
                    ExpressionKind::Literal(Literal::Bool(word == "true"))
                }
                "new" => {
                    self.bump();
                    ExpressionKind::New(self.type_name()?)
                }
                "payable" => {
                    self.bump();
                    ExpressionKind::ElementaryType(TypeName::Elementary(word))
                }
                "address" if self.is_word_at(1, "payable") => {
                    self.pos += 2;
                    let payable = TypeName::Elementary("address payable".to_string());
                    ExpressionKind::ElementaryType(payable)
                }
                _ if is_elementary(&word) => {
                    self.bump();
                    ExpressionKind::ElementaryType(TypeName::Elementary(word))
                }
                _ => {
                    self.bump();
                    ExpressionKind::Identifier(word)
                }
            },
            _ => {
                let found = self.describe();
                return Err(self.error_here(format!("expected expression, found {found}")));
            }
        };
        Ok(Expression::new(kind, line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn parse(src: &str) -> SourceUnit {
        parse_source(src).unwrap()
    }

    fn first_body(src: &str) -> Vec<Statement> {
        let unit = parse(src);
        unit.contracts[0].functions[0].statements().to_vec()
    }

    #[test]
    fn test_pragma_keeps_raw_constraint() {
        let unit = parse("pragma solidity >=0.4.22 <0.9.0;\ncontract A {}");
        assert_eq!(unit.solidity_pragma(), Some(">=0.4.22 <0.9.0"));
        assert_eq!(unit.contracts[0].name, "A");
    }

    #[test]
    fn test_contract_members() {
        let unit = parse(indoc! {r#"
            pragma solidity ^0.8.0;
            import "./Ownable.sol";

            contract Vault is Ownable, Pausable(true) {
                enum Stage { Open, Closed }
                struct Slot { uint8 a; bytes1 b; }
                event Moved(address indexed from, uint256 amount);
                error Nope();
                using SafeMath for uint256;

                mapping(address => uint256) public balances;
                bool private stopped = false;
                uint256 constant LIMIT = 10 ether;

                modifier onlyOwner() { require(msg.sender == owner); _; }

                constructor() Ownable() {}
                function withdraw(uint256 amount) external onlyOwner returns (bool ok) {}
                fallback() external payable { revert(); }
                receive() external payable {}
            }
        "#});
        let vault = &unit.contracts[0];
        let parents: Vec<&str> = vault.parents.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(parents, vec!["Ownable", "Pausable"]);
        assert_eq!(vault.enums[0].members, vec!["Open", "Closed"]);
        assert_eq!(vault.structs[0].fields.len(), 2);
        assert!(vault.events[0].parameters[0].indexed);
        assert_eq!(vault.state_variables.len(), 3);
        assert_eq!(vault.state_variables[0].visibility, Visibility::Public);
        assert!(vault.state_variables[2].constant);
        assert_eq!(vault.modifiers[0].body.len(), 2);

        let names: Vec<&str> = vault.functions.iter().map(|f| f.display_name()).collect();
        assert_eq!(names, vec!["constructor", "withdraw", "fallback", "receive"]);
        let withdraw = &vault.functions[1];
        assert_eq!(withdraw.visibility, Visibility::External);
        assert_eq!(withdraw.modifiers[0].name, "onlyOwner");
        assert_eq!(withdraw.returns[0].name.as_deref(), Some("ok"));
        assert_eq!(vault.functions[0].modifiers[0].name, "Ownable");
    }

    #[test]
    fn test_legacy_unnamed_fallback_and_throw() {
        let unit = parse("contract Old { function() payable { throw; } }");
        let fallback = &unit.contracts[0].functions[0];
        assert_eq!(fallback.kind, FunctionKind::Fallback);
        assert_eq!(fallback.statements()[0].kind, StatementKind::Throw);
    }

    #[test]
    fn test_declarations_versus_expressions() {
        let body = first_body(indoc! {"
            contract C {
                function f(uint n) public {
                    uint[] memory ids = new uint[](n);
                    ids[0] = 1;
                    (bool ok, ) = owner.call{value: 1 ether}(\"\");
                    Item storage item = items[n];
                    x = y;
                }
            }
        "});
        assert!(matches!(&body[0].kind, StatementKind::VariableDeclaration { declarations, .. }
            if declarations[0].as_ref().map(|p| p.storage) == Some(Some(StorageLocation::Memory))));
        assert!(matches!(body[1].kind, StatementKind::Expression { .. }));
        assert!(matches!(
            &body[2].kind,
            StatementKind::VariableDeclaration { declarations, .. } if declarations.len() == 2
        ));
        assert!(matches!(body[3].kind, StatementKind::VariableDeclaration { .. }));
        assert!(matches!(body[4].kind, StatementKind::Expression { .. }));
        assert_eq!(body[2].to_string(), "(bool ok, ) = owner.call{value: 1 ether}(\"\");");
    }

    #[test]
    fn test_expression_precedence_round_trips_through_rendering() {
        let body = first_body(indoc! {"
            contract C {
                function f() {
                    x = a + b * c ** d ** e;
                    y = (a + b) * c;
                    z = !p && q || r;
                }
            }
        "});
        let rendered: Vec<String> = body.iter().map(|s| s.to_string()).collect();
        assert_eq!(
            rendered,
            vec!["x = a + b * c ** d ** e;", "y = (a + b) * c;", "z = !p && q || r;"]
        );
    }

    #[test]
    fn test_revert_forms() {
        let body = first_body(indoc! {r#"
            contract C {
                function f() { revert(); revert("no"); revert Unauthorized(msg.sender); }
            }
        "#});
        assert!(matches!(body[0].kind, StatementKind::Expression { .. }));
        assert!(matches!(body[1].kind, StatementKind::Expression { .. }));
        assert!(matches!(body[2].kind, StatementKind::Revert { .. }));
    }

    #[test]
    fn test_assembly_is_captured_raw() {
        let code = "let r := delegatecall(gas(), sload(0), 0, 0, 0, 0)";
        let source = format!("contract P {{ function f() {{ assembly {{ {code} }} }} }}");
        let body = first_body(&source);
        assert_eq!(body[0].kind, StatementKind::InlineAssembly { code: code.to_string() });
    }

    #[test]
    fn test_try_catch() {
        let body = first_body(indoc! {"
            contract C {
                function f() {
                    try token.transfer(to, 1) returns (bool ok) { done = ok; }
                    catch Error(string memory reason) { last = reason; }
                    catch { failed = true; }
                }
            }
        "});
        let StatementKind::Try { catches, returns, .. } = &body[0].kind else {
            panic!("expected try statement, got {:?}", body[0].kind);
        };
        assert_eq!(returns.len(), 1);
        assert_eq!(catches.len(), 2);
        assert_eq!(catches[0].identifier.as_deref(), Some("Error"));
    }

    #[test]
    fn test_syntax_error_has_position() {
        let err = parse_source("contract C {\n  function f( {\n}").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.starts_with("expected"), "got {}", err.message);
    }

    #[test]
    fn test_truncated_source_is_an_error() {
        let src = "contract C { uint x; function f(uint a) public { x = a + 1; } }";
        assert!(parse_source(src).is_ok());
        for end in 1..src.len() {
            assert!(parse_source(&src[..end]).is_err(), "prefix {:?} parsed", &src[..end]);
        }
    }
}
