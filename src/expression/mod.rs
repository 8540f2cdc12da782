//! Embedded filter expression language: tokenizer, validator, parser and the
//! closed function registry

pub mod ast;
pub mod functions;
pub mod parse;
pub mod token;
pub mod validate;

pub use ast::{Expr, Number};
pub use functions::{Function, FunctionCategory};
pub use parse::{parse, ParseError};
pub use token::{tokenize, Token, TokenKind};
pub use validate::{validate, ValidationReport};

use thiserror::Error;

/// Failure of the front half of the pipeline. Validation problems come back
/// aggregated; a parse error after a clean validation is a contract gap and
/// is reported on its own.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpressionError {
	#[error("{0}")]
	Validation(ValidationReport),
	#[error(transparent)]
	Parse(#[from] ParseError),
}

/// Runs tokenize → validate → parse over a raw expression string.
pub fn parse_expression(input: &str) -> Result<Expr<'_>, ExpressionError> {
	let tokens = tokenize(input);
	let report = validate(&tokens);
	if !report.valid {
		return Err(ExpressionError::Validation(report));
	}
	Ok(parse(&tokens)?)
}
