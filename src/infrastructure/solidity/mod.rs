//! Hand-written Solidity front end.

pub mod lexer;
pub mod parser;

use crate::domain::ast::SourceUnit;
use crate::domain::errors::ParseError;
use crate::ports::SourceParser;

pub use parser::parse_source;

pub struct SolidityParser;

impl SourceParser for SolidityParser {
    fn parse(&self, source: &str) -> Result<SourceUnit, ParseError> {
        parse_source(source)
    }
}
