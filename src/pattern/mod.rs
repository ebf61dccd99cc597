//! NodePattern DSL support — lexer and parser.
//!
//! The compiler in `crate::compile` consumes the `PatternAst` produced here;
//! nothing in this module knows about matching or instrumentation.

pub mod lexer;
pub mod parser;

pub use lexer::{Lexer, Spanned, Token};
pub use parser::{ParseError, Parser, PatternAst, PatternKind};

/// Tokenize and parse a pattern source string in one step.
pub fn parse_pattern(source: &str) -> Result<PatternAst, ParseError> {
    let tokens = Lexer::new(source).tokenize();
    Parser::new(tokens).parse()
}
