//! Pure analysis core: AST model, descriptors, checks and verdicts.

pub mod ast;
pub mod checks;
pub mod describe;
pub mod descriptor;
pub mod errors;
pub mod evaluator;
pub mod layout;
pub mod matcher;
pub mod render;
pub mod report;
pub mod visit;
