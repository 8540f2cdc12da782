//! Abstract syntax tree for embedded filter expressions

use crate::expression::functions::Function;

/// Numeric literal, classified by the parser on the presence of a decimal
/// point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
	Int(i64),
	Float(f64),
}

/// One node of a parsed filter expression. Trees are finite, built bottom-up
/// by the parser and owned by the compiling call; nothing is shared across
/// conditions.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr<'a> {
	/// Dotted attribute path, e.g. `customer.address.city`.
	FieldPath(&'a str),
	/// Single-quoted string literal, quotes stripped, contents not unescaped.
	StringLit(&'a str),
	NumberLit(Number),
	/// Nested function call. The function is always a registry variant, so an
	/// unregistered name is unrepresentable past the parser.
	Call {
		function: Function,
		args: Vec<Expr<'a>>,
	},
}

impl<'a> Expr<'a> {
	pub fn call(function: Function, args: Vec<Expr<'a>>) -> Self {
		Expr::Call { function, args }
	}

	/// True for leaf literal nodes, used where the compiler requires a
	/// compile-time constant argument.
	pub fn is_literal(&self) -> bool {
		matches!(self, Expr::StringLit(_) | Expr::NumberLit(_))
	}
}
