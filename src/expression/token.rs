//! Tokenizer for the embedded filter expression language

use winnow::{
	ascii::digit1,
	combinator::{alt, delimited, opt},
	prelude::*,
	token::{one_of, take_while},
};

use crate::expression::functions::Function;

/// Coarse lexical category. The `FunctionName`/`Identifier` split is decided
/// here against the function registry so that `foo(` with an unlisted name
/// can later be reported as an unsupported function rather than silently
/// treated as a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
	FunctionName,
	Identifier,
	StringLiteral,
	Number,
	Punctuation,
	Operator,
	Keyword,
	Unknown,
}

/// One lexed token. `text` borrows from the original expression (for string
/// literals the surrounding quotes are stripped); `offset` is the zero-based
/// character position of the token's first character, used for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
	pub kind: TokenKind,
	pub text: &'a str,
	pub offset: usize,
}

type Input<'a> = &'a str;
type ParserResult<T> = winnow::Result<T>;

const PUNCTUATION: [char; 4] = ['(', ')', ',', '.'];
const OPERATORS: [char; 8] = ['=', '+', '-', '*', '/', '<', '>', '!'];

/// Lexes a whole expression into a flat token stream. Never fails:
/// unrecognized spans come back as `TokenKind::Unknown` carrying their
/// original text, deferring error reporting to the validator.
pub fn tokenize(expression: &str) -> Vec<Token<'_>> {
	let mut tokens = Vec::new();
	let mut rest = expression;

	loop {
		rest = rest.trim_start();
		if rest.is_empty() {
			break;
		}
		// Offsets are character counts, not byte counts, so positions stay
		// meaningful to users on non-ASCII input.
		let offset = expression[..expression.len() - rest.len()].chars().count();

		let mut cursor = rest;
		match lex_token(&mut cursor) {
			Ok((kind, text)) => {
				tokens.push(Token { kind, text, offset });
				rest = cursor;
			}
			Err(_) => {
				let span = unknown_span(rest);
				tokens.push(Token {
					kind: TokenKind::Unknown,
					text: span,
					offset,
				});
				rest = &rest[span.len()..];
			}
		}
	}

	tokens
}

fn lex_token<'a>(input: &mut Input<'a>) -> ParserResult<(TokenKind, &'a str)> {
	alt((
		lex_string,
		lex_number,
		lex_word,
		lex_punctuation,
		lex_operator,
	))
	.parse_next(input)
}

/// Single-quoted string literal; contents are taken verbatim, no unescaping.
fn lex_string<'a>(input: &mut Input<'a>) -> ParserResult<(TokenKind, &'a str)> {
	delimited('\'', take_while(0.., |c| c != '\''), '\'')
		.map(|s| (TokenKind::StringLiteral, s))
		.parse_next(input)
}

/// Integer or decimal numeric literal.
fn lex_number<'a>(input: &mut Input<'a>) -> ParserResult<(TokenKind, &'a str)> {
	let start_input = *input;
	let _ = (digit1, opt(('.', digit1))).parse_next(input)?;
	let consumed_len = start_input.len() - input.len();
	Ok((TokenKind::Number, &start_input[..consumed_len]))
}

/// Dotted identifier (`a.b.c`, `$`-prefixed segments allowed), keyword, or
/// whitelisted function name.
fn lex_word<'a>(input: &mut Input<'a>) -> ParserResult<(TokenKind, &'a str)> {
	let start_input = *input;
	let _ = one_of(|c: char| c.is_alphabetic() || c == '_' || c == '$').parse_next(input)?;
	let _: &str = take_while(0.., |c: char| {
		c.is_alphanumeric() || c == '_' || c == '$' || c == '.'
	})
	.parse_next(input)?;
	let consumed_len = start_input.len() - input.len();
	let word = &start_input[..consumed_len];
	Ok((classify_word(word), word))
}

fn classify_word(word: &str) -> TokenKind {
	if matches!(word, "true" | "false" | "null") {
		TokenKind::Keyword
	} else if !word.contains('.') && Function::lookup(word).is_some() {
		TokenKind::FunctionName
	} else {
		TokenKind::Identifier
	}
}

fn lex_punctuation<'a>(input: &mut Input<'a>) -> ParserResult<(TokenKind, &'a str)> {
	let start_input = *input;
	let _ = one_of(PUNCTUATION).parse_next(input)?;
	let consumed_len = start_input.len() - input.len();
	Ok((TokenKind::Punctuation, &start_input[..consumed_len]))
}

fn lex_operator<'a>(input: &mut Input<'a>) -> ParserResult<(TokenKind, &'a str)> {
	let start_input = *input;
	let _ = one_of(OPERATORS).parse_next(input)?;
	let consumed_len = start_input.len() - input.len();
	Ok((TokenKind::Operator, &start_input[..consumed_len]))
}

/// Maximal span no token rule recognizes. Always consumes at least one
/// character so the tokenizer makes progress.
fn unknown_span(rest: &str) -> &str {
	let end = rest
		.char_indices()
		.find(|&(i, c)| i > 0 && (c.is_whitespace() || starts_token(c)))
		.map(|(i, _)| i)
		.unwrap_or(rest.len());
	let end = end.max(rest.chars().next().map_or(1, char::len_utf8));
	&rest[..end]
}

fn starts_token(c: char) -> bool {
	c.is_alphanumeric()
		|| c == '_'
		|| c == '$'
		|| c == '\''
		|| PUNCTUATION.contains(&c)
		|| OPERATORS.contains(&c)
}
