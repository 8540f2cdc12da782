//! Filter conditions: operations, sentinels, trailing suffix recognition and
//! the fluent builder

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
	// A plain dotted path followed by one of the four collection suffixes.
	// The prefix deliberately admits no parentheses: anything else goes to
	// the expression pipeline instead.
	static ref RE_TRAILING: Regex = Regex::new(
		r"^([A-Za-z_$][A-Za-z0-9_$]*(?:\.[A-Za-z_$][A-Za-z0-9_$]*)*)\.(size|length|isEmpty|isNotEmpty)\(\)$"
	)
	.expect("trailing suffix regex is valid");
}

/// Closed set of filter operations. Each carries its canonical wire token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperation {
	Equals,
	NotEquals,
	EqualsIgnoreCase,
	Gt,
	Gte,
	Ls,
	Lse,
	Like,
	NotLike,
	Contains,
	NotContains,
	In,
	NotIn,
	Is,
	IsNot,
}

impl FilterOperation {
	pub fn token(&self) -> &'static str {
		match self {
			FilterOperation::Equals => "=",
			FilterOperation::NotEquals => "!=",
			FilterOperation::EqualsIgnoreCase => "=~",
			FilterOperation::Gt => ">",
			FilterOperation::Gte => ">=",
			FilterOperation::Ls => "<",
			FilterOperation::Lse => "<=",
			FilterOperation::Like => "like",
			FilterOperation::NotLike => "not_like",
			FilterOperation::Contains => "contains",
			FilterOperation::NotContains => "not_contains",
			FilterOperation::In => "in",
			FilterOperation::NotIn => "not_in",
			FilterOperation::Is => "is",
			FilterOperation::IsNot => "is_not",
		}
	}

	pub fn from_token(token: &str) -> Option<FilterOperation> {
		[
			FilterOperation::Equals,
			FilterOperation::NotEquals,
			FilterOperation::EqualsIgnoreCase,
			FilterOperation::Gte,
			FilterOperation::Gt,
			FilterOperation::Lse,
			FilterOperation::Ls,
			FilterOperation::Like,
			FilterOperation::NotLike,
			FilterOperation::Contains,
			FilterOperation::NotContains,
			FilterOperation::In,
			FilterOperation::NotIn,
			FilterOperation::Is,
			FilterOperation::IsNot,
		]
		.into_iter()
		.find(|op| op.token() == token)
	}
}

/// Four-valued sentinel used only with IS / IS_NOT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Is {
	True,
	False,
	Null,
	NotNull,
}

impl Is {
	pub fn parse(value: &str) -> Option<Is> {
		match value.to_ascii_lowercase().as_str() {
			"true" => Some(Is::True),
			"false" => Some(Is::False),
			"null" => Some(Is::Null),
			"not_null" => Some(Is::NotNull),
			_ => None,
		}
	}
}

/// Collection-suffix pseudo-functions. Distinct from embedded expression
/// functions: they attach to a plain field path and are resolved by a
/// suffix split before the expression pipeline ever runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrailingFunction {
	Length,
	Size,
	IsEmpty,
	IsNotEmpty,
}

/// Splits `nums.size()` into `("nums", Size)`. Returns `None` when the
/// property has no recognized suffix or its prefix is not a plain dotted
/// path; in the latter case the whole string belongs to the expression
/// pipeline.
pub fn split_trailing(property: &str) -> Option<(&str, TrailingFunction)> {
	let captures = RE_TRAILING.captures(property)?;
	let path = captures.get(1)?;
	let suffix = match captures.get(2)?.as_str() {
		"size" => TrailingFunction::Size,
		"length" => TrailingFunction::Length,
		"isEmpty" => TrailingFunction::IsEmpty,
		"isNotEmpty" => TrailingFunction::IsNotEmpty,
		_ => return None,
	};
	Some((path.as_str(), suffix))
}

/// One (property, operation, value) triple of a filter. Immutable value
/// record; the property may be a plain path, a path with a trailing suffix,
/// or a full embedded expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
	pub property: String,
	pub operation: FilterOperation,
	pub value: serde_json::Value,
}

impl FilterCondition {
	pub fn new(
		property: impl Into<String>,
		operation: FilterOperation,
		value: impl Into<serde_json::Value>,
	) -> Self {
		FilterCondition {
			property: property.into(),
			operation,
			value: value.into(),
		}
	}
}

/// An ordered list of conditions, conjunctively combined by the assembler.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Filter {
	pub conditions: Vec<FilterCondition>,
}

impl Filter {
	pub fn builder() -> FilterBuilder {
		FilterBuilder::default()
	}

	pub fn is_empty(&self) -> bool {
		self.conditions.is_empty()
	}
}

/// Fluent condition source: one condition per call, in insertion order.
#[derive(Debug, Default)]
pub struct FilterBuilder {
	conditions: Vec<FilterCondition>,
}

impl FilterBuilder {
	pub fn condition(
		mut self,
		property: impl Into<String>,
		operation: FilterOperation,
		value: impl Into<serde_json::Value>,
	) -> Self {
		self.conditions
			.push(FilterCondition::new(property, operation, value));
		self
	}

	pub fn eq(self, property: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
		self.condition(property, FilterOperation::Equals, value)
	}

	pub fn ne(self, property: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
		self.condition(property, FilterOperation::NotEquals, value)
	}

	pub fn eq_ignore_case(
		self,
		property: impl Into<String>,
		value: impl Into<serde_json::Value>,
	) -> Self {
		self.condition(property, FilterOperation::EqualsIgnoreCase, value)
	}

	pub fn gt(self, property: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
		self.condition(property, FilterOperation::Gt, value)
	}

	pub fn gte(self, property: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
		self.condition(property, FilterOperation::Gte, value)
	}

	pub fn ls(self, property: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
		self.condition(property, FilterOperation::Ls, value)
	}

	pub fn lse(self, property: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
		self.condition(property, FilterOperation::Lse, value)
	}

	pub fn like(self, property: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
		self.condition(property, FilterOperation::Like, value)
	}

	pub fn not_like(
		self,
		property: impl Into<String>,
		value: impl Into<serde_json::Value>,
	) -> Self {
		self.condition(property, FilterOperation::NotLike, value)
	}

	pub fn contains(
		self,
		property: impl Into<String>,
		value: impl Into<serde_json::Value>,
	) -> Self {
		self.condition(property, FilterOperation::Contains, value)
	}

	pub fn not_contains(
		self,
		property: impl Into<String>,
		value: impl Into<serde_json::Value>,
	) -> Self {
		self.condition(property, FilterOperation::NotContains, value)
	}

	pub fn is_in(self, property: impl Into<String>, values: impl Into<serde_json::Value>) -> Self {
		self.condition(property, FilterOperation::In, values)
	}

	pub fn not_in(
		self,
		property: impl Into<String>,
		values: impl Into<serde_json::Value>,
	) -> Self {
		self.condition(property, FilterOperation::NotIn, values)
	}

	pub fn is(self, property: impl Into<String>, sentinel: Is) -> Self {
		self.condition(property, FilterOperation::Is, sentinel_value(sentinel))
	}

	pub fn is_not(self, property: impl Into<String>, sentinel: Is) -> Self {
		self.condition(property, FilterOperation::IsNot, sentinel_value(sentinel))
	}

	pub fn build(self) -> Filter {
		Filter {
			conditions: self.conditions,
		}
	}
}

fn sentinel_value(sentinel: Is) -> serde_json::Value {
	let text = match sentinel {
		Is::True => "true",
		Is::False => "false",
		Is::Null => "null",
		Is::NotNull => "not_null",
	};
	serde_json::Value::String(text.to_string())
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn test_split_trailing_on_plain_path() {
		assert_eq!(
			split_trailing("nums.size()"),
			Some(("nums", TrailingFunction::Size))
		);
		assert_eq!(
			split_trailing("customer.orders.isEmpty()"),
			Some(("customer.orders", TrailingFunction::IsEmpty))
		);
	}

	#[test]
	fn test_split_trailing_rejects_parenthesized_prefix() {
		// An expression prefix goes to the expression pipeline instead.
		assert_eq!(split_trailing("concat(a,b).size()"), None);
		assert_eq!(split_trailing("lower(name).length()"), None);
	}

	#[test]
	fn test_split_trailing_rejects_plain_paths() {
		assert_eq!(split_trailing("nums"), None);
		assert_eq!(split_trailing("nums.size"), None);
		assert_eq!(split_trailing("size()"), None);
	}

	#[test]
	fn test_builder_keeps_one_condition_per_call_in_order() {
		let filter = Filter::builder()
			.eq("name", "test")
			.gte("nums.size()", 2)
			.is("deleted", Is::False)
			.build();

		assert_eq!(filter.conditions.len(), 3);
		assert_eq!(filter.conditions[0].operation, FilterOperation::Equals);
		assert_eq!(filter.conditions[1].property, "nums.size()");
		assert_eq!(filter.conditions[2].value, json!("false"));
	}

	#[test]
	fn test_operation_tokens_round_trip() {
		for op in [
			FilterOperation::Equals,
			FilterOperation::NotEquals,
			FilterOperation::EqualsIgnoreCase,
			FilterOperation::Gt,
			FilterOperation::Gte,
			FilterOperation::Ls,
			FilterOperation::Lse,
			FilterOperation::Like,
			FilterOperation::NotLike,
			FilterOperation::Contains,
			FilterOperation::NotContains,
			FilterOperation::In,
			FilterOperation::NotIn,
			FilterOperation::Is,
			FilterOperation::IsNot,
		] {
			assert_eq!(FilterOperation::from_token(op.token()), Some(op));
		}
	}

	#[test]
	fn test_is_sentinel_parsing() {
		assert_eq!(Is::parse("true"), Some(Is::True));
		assert_eq!(Is::parse("NOT_NULL"), Some(Is::NotNull));
		assert_eq!(Is::parse("maybe"), None);
	}
}
