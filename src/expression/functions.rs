//! Closed registry of functions allowed inside filter expressions

use std::fmt;

/// Coarse grouping used by the predicate compiler to pick a handler family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionCategory {
	String,
	Numeric,
	Date,
	Conversion,
}

/// Every function the expression language supports. The lexer whitelists
/// these names, the validator checks their arity and the compiler dispatches
/// on the variant, so adding a function is a compiler-checked change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
	// String
	Concat,
	Lower,
	Upper,
	Trim,
	Substring,
	Replace,
	Length,
	Lpad,
	Rpad,
	Position,
	Repeat,
	// Numeric
	Abs,
	Floor,
	Ceil,
	Round,
	Mod,
	Sqrt,
	// Date
	CurrentDate,
	CurrentTimestamp,
	Year,
	Month,
	Day,
	DateFormat,
	ToChar,
	// Conversion
	Cast,
	Coalesce,
	Nullif,
}

impl Function {
	pub const ALL: &'static [Function] = &[
		Function::Concat,
		Function::Lower,
		Function::Upper,
		Function::Trim,
		Function::Substring,
		Function::Replace,
		Function::Length,
		Function::Lpad,
		Function::Rpad,
		Function::Position,
		Function::Repeat,
		Function::Abs,
		Function::Floor,
		Function::Ceil,
		Function::Round,
		Function::Mod,
		Function::Sqrt,
		Function::CurrentDate,
		Function::CurrentTimestamp,
		Function::Year,
		Function::Month,
		Function::Day,
		Function::DateFormat,
		Function::ToChar,
		Function::Cast,
		Function::Coalesce,
		Function::Nullif,
	];

	/// Looks a name up in the registry. This is the lexer's whitelist: a word
	/// that resolves here becomes a `FunctionName` token, anything else stays
	/// a plain identifier.
	pub fn lookup(name: &str) -> Option<Function> {
		Function::ALL.iter().copied().find(|f| f.name() == name)
	}

	pub fn name(&self) -> &'static str {
		match self {
			Function::Concat => "concat",
			Function::Lower => "lower",
			Function::Upper => "upper",
			Function::Trim => "trim",
			Function::Substring => "substring",
			Function::Replace => "replace",
			Function::Length => "length",
			Function::Lpad => "lpad",
			Function::Rpad => "rpad",
			Function::Position => "position",
			Function::Repeat => "repeat",
			Function::Abs => "abs",
			Function::Floor => "floor",
			Function::Ceil => "ceil",
			Function::Round => "round",
			Function::Mod => "mod",
			Function::Sqrt => "sqrt",
			Function::CurrentDate => "current_date",
			Function::CurrentTimestamp => "current_timestamp",
			Function::Year => "year",
			Function::Month => "month",
			Function::Day => "day",
			Function::DateFormat => "date_format",
			Function::ToChar => "to_char",
			Function::Cast => "cast",
			Function::Coalesce => "coalesce",
			Function::Nullif => "nullif",
		}
	}

	pub fn category(&self) -> FunctionCategory {
		match self {
			Function::Concat
			| Function::Lower
			| Function::Upper
			| Function::Trim
			| Function::Substring
			| Function::Replace
			| Function::Length
			| Function::Lpad
			| Function::Rpad
			| Function::Position
			| Function::Repeat => FunctionCategory::String,
			Function::Abs
			| Function::Floor
			| Function::Ceil
			| Function::Round
			| Function::Mod
			| Function::Sqrt => FunctionCategory::Numeric,
			Function::CurrentDate
			| Function::CurrentTimestamp
			| Function::Year
			| Function::Month
			| Function::Day
			| Function::DateFormat
			| Function::ToChar => FunctionCategory::Date,
			Function::Cast | Function::Coalesce | Function::Nullif => FunctionCategory::Conversion,
		}
	}

	/// Allowed argument count as `(min, max)`, `max == None` meaning variadic.
	pub fn arity(&self) -> (usize, Option<usize>) {
		match self {
			Function::Concat => (2, None),
			Function::Lower | Function::Upper | Function::Trim | Function::Length => (1, Some(1)),
			Function::Substring => (2, Some(3)),
			Function::Replace => (3, Some(3)),
			Function::Lpad | Function::Rpad => (2, Some(3)),
			Function::Position | Function::Repeat => (2, Some(2)),
			Function::Abs | Function::Floor | Function::Ceil | Function::Sqrt => (1, Some(1)),
			Function::Round => (1, Some(2)),
			Function::Mod => (2, Some(2)),
			Function::CurrentDate | Function::CurrentTimestamp => (0, Some(0)),
			Function::Year | Function::Month | Function::Day => (1, Some(1)),
			Function::DateFormat | Function::ToChar => (2, Some(2)),
			Function::Cast => (2, Some(2)),
			Function::Coalesce => (1, None),
			Function::Nullif => (2, Some(2)),
		}
	}

	/// Human-readable rendering of the arity contract, used in diagnostics.
	pub fn arity_description(&self) -> String {
		match self.arity() {
			(min, None) => format!("at least {} argument{}", min, plural(min)),
			(min, Some(max)) if min == max => {
				format!("exactly {} argument{}", min, plural(min))
			}
			(min, Some(max)) => format!("between {} and {} arguments", min, max),
		}
	}

	/// Checks a concrete argument count against the arity contract.
	pub fn accepts_arity(&self, count: usize) -> bool {
		let (min, max) = self.arity();
		count >= min && max.map_or(true, |m| count <= m)
	}
}

fn plural(n: usize) -> &'static str {
	if n == 1 {
		""
	} else {
		"s"
	}
}

impl fmt::Display for Function {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_lookup_round_trips_every_registered_function() {
		for function in Function::ALL {
			assert_eq!(Function::lookup(function.name()), Some(*function));
		}
	}

	#[test]
	fn test_lookup_rejects_unknown_names() {
		assert_eq!(Function::lookup("foo"), None);
		assert_eq!(Function::lookup("CONCAT"), None);
		assert_eq!(Function::lookup(""), None);
	}

	#[test]
	fn test_arity_contracts() {
		assert!(!Function::Concat.accepts_arity(1));
		assert!(Function::Concat.accepts_arity(2));
		assert!(Function::Concat.accepts_arity(5));

		assert!(!Function::ToChar.accepts_arity(1));
		assert!(Function::ToChar.accepts_arity(2));
		assert!(!Function::ToChar.accepts_arity(3));

		assert!(!Function::Coalesce.accepts_arity(0));
		assert!(Function::Coalesce.accepts_arity(1));

		assert!(Function::Substring.accepts_arity(2));
		assert!(Function::Substring.accepts_arity(3));
		assert!(!Function::Substring.accepts_arity(4));

		assert!(Function::CurrentDate.accepts_arity(0));
		assert!(!Function::CurrentDate.accepts_arity(1));
	}

	#[test]
	fn test_arity_descriptions() {
		assert_eq!(Function::Concat.arity_description(), "at least 2 arguments");
		assert_eq!(Function::ToChar.arity_description(), "exactly 2 arguments");
		assert_eq!(
			Function::Substring.arity_description(),
			"between 2 and 3 arguments"
		);
		assert_eq!(
			Function::Coalesce.arity_description(),
			"at least 1 argument"
		);
	}
}
