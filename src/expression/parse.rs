//! Recursive-descent parser turning a validated token stream into an AST

use thiserror::Error;

use crate::expression::{
	ast::{Expr, Number},
	functions::Function,
	token::{Token, TokenKind},
};

/// Raised when the parser meets a token the grammar does not allow. After a
/// successful validation this should be rare; hitting it indicates a gap
/// between the validator's and the parser's view of the grammar, which is why
/// it stays a distinct error rather than folding into the validation report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
	pub position: usize,
	pub message: String,
}

struct Cursor<'t, 'a> {
	tokens: &'t [Token<'a>],
	index: usize,
}

impl<'t, 'a> Cursor<'t, 'a> {
	fn peek(&self) -> Option<Token<'a>> {
		self.tokens.get(self.index).copied()
	}

	fn advance(&mut self) -> Option<Token<'a>> {
		let token = self.peek();
		if token.is_some() {
			self.index += 1;
		}
		token
	}

	/// Position for "ran out of tokens" diagnostics: one past the last token.
	fn end_position(&self) -> usize {
		self.tokens
			.last()
			.map(|t| t.offset + t.text.chars().count())
			.unwrap_or(0)
	}

	fn expect_punct(&mut self, text: &str) -> Result<(), ParseError> {
		match self.advance() {
			Some(token) if token.kind == TokenKind::Punctuation && token.text == text => Ok(()),
			Some(token) => Err(ParseError {
				position: token.offset,
				message: format!("expected '{}', found '{}'", text, token.text),
			}),
			None => Err(ParseError {
				position: self.end_position(),
				message: format!("expected '{}', found end of expression", text),
			}),
		}
	}
}

/// Parses a complete expression. Strictly total: either the whole token
/// stream reduces to one tree or an error comes back; partial trees are never
/// exposed. Leftover tokens after the top-level expression are an error.
pub fn parse<'a>(tokens: &[Token<'a>]) -> Result<Expr<'a>, ParseError> {
	let mut cursor = Cursor { tokens, index: 0 };
	let expr = parse_expression(&mut cursor)?;
	if let Some(extra) = cursor.peek() {
		return Err(ParseError {
			position: extra.offset,
			message: format!("unexpected trailing token '{}'", extra.text),
		});
	}
	Ok(expr)
}

fn parse_expression<'a>(cursor: &mut Cursor<'_, 'a>) -> Result<Expr<'a>, ParseError> {
	parse_function_or_field(cursor)
}

fn parse_function_or_field<'a>(cursor: &mut Cursor<'_, 'a>) -> Result<Expr<'a>, ParseError> {
	let Some(token) = cursor.peek() else {
		return Err(ParseError {
			position: cursor.end_position(),
			message: "unexpected end of expression".to_string(),
		});
	};

	match token.kind {
		TokenKind::FunctionName => parse_call(cursor),
		TokenKind::Identifier => {
			cursor.advance();
			Ok(Expr::FieldPath(token.text))
		}
		TokenKind::StringLiteral => {
			cursor.advance();
			Ok(Expr::StringLit(token.text))
		}
		TokenKind::Number => {
			cursor.advance();
			parse_number(token)
		}
		TokenKind::Punctuation if token.text == "(" => {
			// Grouping only; the parenthesized sub-expression is returned
			// unwrapped.
			cursor.advance();
			let inner = parse_expression(cursor)?;
			cursor.expect_punct(")")?;
			Ok(inner)
		}
		_ => Err(ParseError {
			position: token.offset,
			message: format!("unexpected token '{}'", token.text),
		}),
	}
}

fn parse_number(token: Token<'_>) -> Result<Expr<'static>, ParseError> {
	let number = if token.text.contains('.') {
		token.text.parse::<f64>().ok().map(Number::Float)
	} else {
		token.text.parse::<i64>().ok().map(Number::Int)
	};
	number.map(Expr::NumberLit).ok_or_else(|| ParseError {
		position: token.offset,
		message: format!("numeric literal '{}' is out of range", token.text),
	})
}

fn parse_call<'a>(cursor: &mut Cursor<'_, 'a>) -> Result<Expr<'a>, ParseError> {
	let Some(token) = cursor.advance() else {
		return Err(ParseError {
			position: cursor.end_position(),
			message: "unexpected end of expression".to_string(),
		});
	};
	// A FunctionName token always holds a registry name; a miss here is a
	// lexer/parser contract violation and must fail loudly.
	let Some(function) = Function::lookup(token.text) else {
		return Err(ParseError {
			position: token.offset,
			message: format!("unknown function '{}'", token.text),
		});
	};

	cursor.expect_punct("(")?;

	let mut args = Vec::new();
	let empty = cursor
		.peek()
		.is_some_and(|t| t.kind == TokenKind::Punctuation && t.text == ")");
	if !empty {
		loop {
			args.push(parse_expression(cursor)?);
			match cursor.peek() {
				Some(t) if t.kind == TokenKind::Punctuation && t.text == "," => {
					cursor.advance();
				}
				_ => break,
			}
		}
	}
	cursor.expect_punct(")")?;

	Ok(Expr::call(function, args))
}
