//! Request-parameter decoding: `key=value` pairs with an operation prefix
//! folded into the value string

use super::condition::{Filter, FilterCondition, FilterOperation};

// Longest-first so `not_in:` wins over `in:` and `not_like:` over `like:`.
const PREFIXES: &[(&str, FilterOperation)] = &[
	("not_equals:", FilterOperation::NotEquals),
	("not_contains:", FilterOperation::NotContains),
	("not_like:", FilterOperation::NotLike),
	("not_in:", FilterOperation::NotIn),
	("is_not:", FilterOperation::IsNot),
	("eq_ic:", FilterOperation::EqualsIgnoreCase),
	("contains:", FilterOperation::Contains),
	("like:", FilterOperation::Like),
	("gt:", FilterOperation::Gt),
	("ge:", FilterOperation::Gte),
	("lt:", FilterOperation::Ls),
	("le:", FilterOperation::Lse),
	("in:", FilterOperation::In),
	("is:", FilterOperation::Is),
];

/// Decodes one request parameter into a condition. The operation is read
/// off a `prefix:` on the value; a bare value means equality. Membership
/// values are split on `;` into a list.
pub fn decode_param(property: &str, raw: &str) -> FilterCondition {
	for (prefix, operation) in PREFIXES {
		if let Some(rest) = raw.strip_prefix(prefix) {
			let value = match operation {
				FilterOperation::In | FilterOperation::NotIn => split_list(rest),
				_ => serde_json::Value::String(rest.to_string()),
			};
			return FilterCondition::new(property, *operation, value);
		}
	}
	FilterCondition::new(
		property,
		FilterOperation::Equals,
		serde_json::Value::String(raw.to_string()),
	)
}

/// Decodes an ordered set of `(property, value)` parameters into a filter.
/// Repeated properties yield one condition each.
pub fn decode_params<'a, I>(params: I) -> Filter
where
	I: IntoIterator<Item = (&'a str, &'a str)>,
{
	Filter {
		conditions: params
			.into_iter()
			.map(|(property, raw)| decode_param(property, raw))
			.collect(),
	}
}

fn split_list(raw: &str) -> serde_json::Value {
	serde_json::Value::Array(
		raw.split(';')
			.map(|item| serde_json::Value::String(item.to_string()))
			.collect(),
	)
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn test_bare_value_means_equality() {
		let condition = decode_param("name", "test");
		assert_eq!(condition.operation, FilterOperation::Equals);
		assert_eq!(condition.value, json!("test"));
	}

	#[test]
	fn test_prefixed_comparison() {
		let condition = decode_param("age", "ge:21");
		assert_eq!(condition.operation, FilterOperation::Gte);
		assert_eq!(condition.value, json!("21"));
	}

	#[test]
	fn test_negated_prefix_wins_over_shorter_one() {
		let condition = decode_param("name", "not_like:foo%");
		assert_eq!(condition.operation, FilterOperation::NotLike);
		assert_eq!(condition.value, json!("foo%"));

		let condition = decode_param("status", "not_in:open;closed");
		assert_eq!(condition.operation, FilterOperation::NotIn);
		assert_eq!(condition.value, json!(["open", "closed"]));
	}

	#[test]
	fn test_membership_value_splits_on_semicolons() {
		let condition = decode_param("status", "in:open;pending;closed");
		assert_eq!(condition.operation, FilterOperation::In);
		assert_eq!(condition.value, json!(["open", "pending", "closed"]));
	}

	#[test]
	fn test_sentinel_prefixes() {
		let condition = decode_param("deleted", "is:false");
		assert_eq!(condition.operation, FilterOperation::Is);
		assert_eq!(condition.value, json!("false"));

		let condition = decode_param("owner", "is_not:null");
		assert_eq!(condition.operation, FilterOperation::IsNot);
		assert_eq!(condition.value, json!("null"));
	}

	#[test]
	fn test_decode_params_keeps_repeats() {
		let filter = decode_params([("age", "ge:18"), ("age", "lt:65"), ("name", "eq_ic:Bob")]);
		assert_eq!(filter.conditions.len(), 3);
		assert_eq!(filter.conditions[0].property, "age");
		assert_eq!(filter.conditions[1].operation, FilterOperation::Ls);
		assert_eq!(
			filter.conditions[2].operation,
			FilterOperation::EqualsIgnoreCase
		);
	}
}
