//! Structural validation passes over the token stream

use std::fmt;

use crate::expression::{
	functions::Function,
	token::{Token, TokenKind},
};

/// Aggregated validation outcome. All passes run to completion so a caller
/// gets every structural defect in one report instead of fixing them one
/// round-trip at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
	pub valid: bool,
	pub message: String,
	pub errors: Vec<String>,
}

impl ValidationReport {
	fn valid() -> Self {
		ValidationReport {
			valid: true,
			message: "expression is valid".to_string(),
			errors: Vec::new(),
		}
	}

	fn invalid(message: String, errors: Vec<String>) -> Self {
		ValidationReport {
			valid: false,
			message,
			errors,
		}
	}
}

impl fmt::Display for ValidationReport {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.errors.is_empty() {
			f.write_str(&self.message)
		} else {
			write!(f, "{}: {}", self.message, self.errors.join("; "))
		}
	}
}

/// Runs every validation pass, accumulating all errors. An empty token list
/// short-circuits with a dedicated report.
pub fn validate(tokens: &[Token]) -> ValidationReport {
	if tokens.is_empty() {
		return ValidationReport::invalid(
			"empty expression".to_string(),
			vec!["expression contains no tokens".to_string()],
		);
	}

	let mut errors = Vec::new();
	check_parentheses(tokens, &mut errors);
	check_function_shape(tokens, &mut errors);
	check_arities(tokens, &mut errors);
	check_commas(tokens, &mut errors);
	check_identifiers(tokens, &mut errors);
	check_structure(tokens, &mut errors);

	if errors.is_empty() {
		ValidationReport::valid()
	} else {
		let message = format!(
			"expression has {} error{}",
			errors.len(),
			if errors.len() == 1 { "" } else { "s" }
		);
		ValidationReport::invalid(message, errors)
	}
}

fn is_punct(token: &Token, text: &str) -> bool {
	token.kind == TokenKind::Punctuation && token.text == text
}

/// Stack-based balance check. An unmatched close is reported at its own
/// position, an unmatched open at the position still on the stack.
fn check_parentheses(tokens: &[Token], errors: &mut Vec<String>) {
	let mut stack = Vec::new();
	for token in tokens {
		if is_punct(token, "(") {
			stack.push(token.offset);
		} else if is_punct(token, ")") && stack.pop().is_none() {
			errors.push(format!(
				"unmatched closing parenthesis at position {}",
				token.offset
			));
		}
	}
	for offset in stack.into_iter().rev() {
		errors.push(format!("unmatched opening parenthesis at position {}", offset));
	}
}

/// A function name must be immediately followed by an opening parenthesis.
fn check_function_shape(tokens: &[Token], errors: &mut Vec<String>) {
	for (i, token) in tokens.iter().enumerate() {
		if token.kind != TokenKind::FunctionName {
			continue;
		}
		let followed_by_paren = tokens.get(i + 1).is_some_and(|next| is_punct(next, "("));
		if !followed_by_paren {
			errors.push(format!(
				"function '{}' must be followed by '(' at position {}",
				token.text, token.offset
			));
		}
	}
}

/// Counts depth-1 comma-separated argument groups of every call and checks
/// them against the registry's arity table. A call missing its closing
/// parenthesis counts what is present, so the arity defect is reported
/// alongside the unmatched parenthesis from the balance pass.
fn check_arities(tokens: &[Token], errors: &mut Vec<String>) {
	for (i, token) in tokens.iter().enumerate() {
		if token.kind != TokenKind::FunctionName {
			continue;
		}
		let Some(function) = Function::lookup(token.text) else {
			continue;
		};
		if !tokens.get(i + 1).is_some_and(|next| is_punct(next, "(")) {
			continue;
		}

		let mut depth = 1usize;
		let mut commas = 0usize;
		let mut has_content = false;
		for inner in &tokens[i + 2..] {
			if is_punct(inner, "(") {
				depth += 1;
				has_content = true;
			} else if is_punct(inner, ")") {
				depth -= 1;
				if depth == 0 {
					break;
				}
				has_content = true;
			} else if is_punct(inner, ",") && depth == 1 {
				commas += 1;
			} else {
				has_content = true;
			}
		}

		let count = if !has_content && commas == 0 { 0 } else { commas + 1 };
		if !function.accepts_arity(count) {
			errors.push(format!(
				"function '{}' requires {}, found {}",
				function.name(),
				function.arity_description(),
				count
			));
		}
	}
}

/// A comma may not open or close the expression, follow `(`, another comma or
/// an operator, or precede `)` or an operator.
fn check_commas(tokens: &[Token], errors: &mut Vec<String>) {
	for (i, token) in tokens.iter().enumerate() {
		if !is_punct(token, ",") {
			continue;
		}
		let bad_before = match i.checked_sub(1).and_then(|p| tokens.get(p)) {
			None => true,
			Some(prev) => {
				is_punct(prev, "(") || is_punct(prev, ",") || prev.kind == TokenKind::Operator
			}
		};
		let bad_after = match tokens.get(i + 1) {
			None => true,
			Some(next) => is_punct(next, ")") || next.kind == TokenKind::Operator,
		};
		if bad_before || bad_after {
			errors.push(format!("misplaced comma at position {}", token.offset));
		}
	}
}

/// Every component of a dotted identifier must be a nonempty word.
fn check_identifiers(tokens: &[Token], errors: &mut Vec<String>) {
	for token in tokens {
		if token.kind != TokenKind::Identifier {
			continue;
		}
		for component in token.text.split('.') {
			if component.is_empty() {
				errors.push(format!(
					"malformed identifier '{}': empty component at position {}",
					token.text, token.offset
				));
			} else if !is_valid_component(component) {
				errors.push(format!(
					"malformed identifier '{}': invalid component '{}' at position {}",
					token.text, component, token.offset
				));
			}
		}
	}
}

fn is_valid_component(component: &str) -> bool {
	let mut chars = component.chars();
	let Some(first) = chars.next() else {
		return false;
	};
	(first.is_alphabetic() || first == '_' || first == '$')
		&& chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

/// Remaining structural rules: unknown tokens, calls of unregistered names,
/// doubled dots and operator runs outside the allowed two-character
/// comparison combinations.
fn check_structure(tokens: &[Token], errors: &mut Vec<String>) {
	for (i, token) in tokens.iter().enumerate() {
		match token.kind {
			TokenKind::Unknown => {
				errors.push(format!(
					"unrecognized token '{}' at position {}",
					token.text, token.offset
				));
			}
			TokenKind::Identifier | TokenKind::Keyword => {
				if tokens.get(i + 1).is_some_and(|next| is_punct(next, "(")) {
					errors.push(format!(
						"unsupported function '{}' at position {}",
						token.text, token.offset
					));
				}
			}
			TokenKind::Punctuation if token.text == "." => {
				if tokens.get(i + 1).is_some_and(|next| is_punct(next, ".")) {
					errors.push(format!("doubled dot at position {}", token.offset));
				}
			}
			_ => {}
		}
	}

	let mut i = 0;
	while i < tokens.len() {
		if tokens[i].kind != TokenKind::Operator {
			i += 1;
			continue;
		}
		let start = i;
		while i < tokens.len() && tokens[i].kind == TokenKind::Operator {
			i += 1;
		}
		let run = &tokens[start..i];
		match run.len() {
			1 => {
				if run[0].text == "!" {
					errors.push(format!("unexpected operator '!' at position {}", run[0].offset));
				}
			}
			2 => {
				let combined = format!("{}{}", run[0].text, run[1].text);
				if !matches!(combined.as_str(), "!=" | "<=" | ">=" | "==") {
					errors.push(format!(
						"consecutive operators '{}' at position {}",
						combined, run[0].offset
					));
				}
			}
			_ => {
				errors.push(format!(
					"consecutive operators at position {}",
					run[0].offset
				));
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::expression::token::tokenize;

	fn validate_str(expression: &str) -> ValidationReport {
		validate(&tokenize(expression))
	}

	#[test]
	fn test_valid_expressions() {
		for expression in [
			"name",
			"customer.address.city",
			"concat(a,b)",
			"concat(a,b,c)",
			"to_char(a,'FM09')",
			"coalesce(a)",
			"substring(name,1,3)",
			"lower(trim(name))",
			"current_date()",
			"round(price,2)",
			"(name)",
		] {
			let report = validate_str(expression);
			assert!(
				report.valid,
				"expected '{}' to be valid, got: {:?}",
				expression, report.errors
			);
		}
	}

	#[test]
	fn test_empty_expression() {
		let report = validate_str("");
		assert!(!report.valid);
		assert_eq!(report.message, "empty expression");
	}

	#[test]
	fn test_missing_closing_parenthesis() {
		let report = validate_str("lower(name");
		let paren_errors: Vec<_> = report
			.errors
			.iter()
			.filter(|e| e.contains("parenthesis"))
			.collect();
		assert_eq!(paren_errors.len(), 1);
		assert!(paren_errors[0].contains("unmatched opening parenthesis at position 5"));
	}

	#[test]
	fn test_missing_opening_parenthesis() {
		let report = validate_str("lower(name))");
		let paren_errors: Vec<_> = report
			.errors
			.iter()
			.filter(|e| e.contains("parenthesis"))
			.collect();
		assert_eq!(paren_errors.len(), 1);
		assert!(paren_errors[0].contains("unmatched closing parenthesis at position 11"));
	}

	#[test]
	fn test_concat_arity() {
		let report = validate_str("concat(a)");
		assert!(!report.valid);
		assert!(report
			.errors
			.iter()
			.any(|e| e.contains("'concat' requires at least 2 arguments, found 1")));

		assert!(validate_str("concat(a,b,c)").valid);
	}

	#[test]
	fn test_to_char_arity() {
		let report = validate_str("to_char(a)");
		assert!(!report.valid);
		assert!(report
			.errors
			.iter()
			.any(|e| e.contains("'to_char' requires exactly 2 arguments, found 1")));

		assert!(validate_str("to_char(a,'FM09')").valid);
	}

	#[test]
	fn test_coalesce_arity() {
		let report = validate_str("coalesce()");
		assert!(!report.valid);
		assert!(report
			.errors
			.iter()
			.any(|e| e.contains("'coalesce' requires at least 1 argument, found 0")));

		assert!(validate_str("coalesce(a)").valid);
	}

	#[test]
	fn test_unclosed_call_still_reports_its_arity() {
		let report = validate_str("concat(a");
		assert!(report
			.errors
			.iter()
			.any(|e| e.contains("unmatched opening parenthesis")));
		assert!(report
			.errors
			.iter()
			.any(|e| e.contains("'concat' requires at least 2 arguments, found 1")));
	}

	#[test]
	fn test_nested_call_arity_counts_only_top_level_commas() {
		// The inner call's commas must not leak into the outer count.
		assert!(validate_str("concat(substring(a,1,2),b)").valid);
	}

	#[test]
	fn test_function_without_parenthesis() {
		let report = validate_str("lower");
		assert!(!report.valid);
		assert!(report
			.errors
			.iter()
			.any(|e| e.contains("function 'lower' must be followed by '(' at position 0")));
	}

	#[test]
	fn test_unsupported_function() {
		let report = validate_str("foo(a)");
		assert!(!report.valid);
		assert!(report
			.errors
			.iter()
			.any(|e| e.contains("unsupported function 'foo' at position 0")));
	}

	#[test]
	fn test_misplaced_commas() {
		for expression in ["concat(,a)", "concat(a,)", "concat(a,,b)", ",a"] {
			let report = validate_str(expression);
			assert!(
				report.errors.iter().any(|e| e.contains("misplaced comma")),
				"expected misplaced comma for '{}', got {:?}",
				expression,
				report.errors
			);
		}
	}

	#[test]
	fn test_malformed_identifier_components() {
		let report = validate_str("a..b");
		assert!(!report.valid);
		assert!(report
			.errors
			.iter()
			.any(|e| e.contains("malformed identifier 'a..b': empty component")));
	}

	#[test]
	fn test_unknown_token() {
		let report = validate_str("a # b");
		assert!(!report.valid);
		assert!(report
			.errors
			.iter()
			.any(|e| e.contains("unrecognized token '#' at position 2")));
	}

	#[test]
	fn test_allowed_operator_combinations() {
		assert!(validate_str("a != b").valid);
		assert!(validate_str("a <= b").valid);
		assert!(validate_str("a >= b").valid);
		assert!(validate_str("a == b").valid);
	}

	#[test]
	fn test_rejected_operator_runs() {
		let report = validate_str("a =< b");
		assert!(report
			.errors
			.iter()
			.any(|e| e.contains("consecutive operators '=<'")));

		let report = validate_str("a === b");
		assert!(report
			.errors
			.iter()
			.any(|e| e.contains("consecutive operators at position")));

		let report = validate_str("a ! b");
		assert!(report
			.errors
			.iter()
			.any(|e| e.contains("unexpected operator '!'")));
	}

	#[test]
	fn test_all_errors_are_accumulated() {
		// One expression, several independent defects, all reported at once.
		let report = validate_str("concat(a) # foo(");
		assert!(!report.valid);
		assert!(report.errors.len() >= 3, "got {:?}", report.errors);
	}
}
