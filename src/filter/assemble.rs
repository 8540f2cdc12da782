//! Condition assembly: classify each property, compile it to a query
//! expression, coerce the operand and emit one predicate per condition

use tracing::debug;

use super::condition::{split_trailing, Filter, FilterCondition, FilterOperation, Is, TrailingFunction};
use crate::{
	coerce::{coerce, coerce_elements, coerce_value, CoercionError, Scalar},
	error::CompileError,
	expression::parse_expression,
	predicate::{compile, CompareOp, Predicate, QueryExpr},
	schema::{ResolutionError, ResolvedType, SchemaResolver, ValueType},
};

/// Assembles a filter into one conjunctive predicate. Conditions combine with
/// AND in insertion order; repeated properties each contribute their own
/// predicate. An empty filter assembles to the always-true predicate.
pub fn assemble(
	filter: &Filter,
	entity: &str,
	schema: &impl SchemaResolver,
) -> Result<Predicate, CompileError> {
	let mut predicates = Vec::with_capacity(filter.conditions.len());
	for condition in &filter.conditions {
		predicates.push(assemble_condition(condition, entity, schema)?);
	}
	Ok(Predicate::and_all(predicates))
}

/// Assembles a single condition. The property is classified first: a plain
/// dotted path with a recognized trailing suffix, otherwise an embedded
/// expression if it contains a parenthesis, otherwise a plain field path.
pub fn assemble_condition(
	condition: &FilterCondition,
	entity: &str,
	schema: &impl SchemaResolver,
) -> Result<Predicate, CompileError> {
	debug!(
		property = condition.property.as_str(),
		operation = condition.operation.token(),
		"assembling condition"
	);

	if let Some((path, trailing)) = split_trailing(&condition.property) {
		let expr = resolve_collection(path, entity, schema, trailing)?;
		return match trailing {
			TrailingFunction::Size | TrailingFunction::Length => {
				assemble_size(QueryExpr::Size(Box::new(expr)), condition)
			}
			TrailingFunction::IsEmpty => assemble_emptiness(expr, condition, false),
			TrailingFunction::IsNotEmpty => assemble_emptiness(expr, condition, true),
		};
	}

	if condition.property.contains('(') {
		let parsed = parse_expression(&condition.property)?;
		let expr = compile(&parsed, entity, schema)?;
		return assemble_scalar(expr, condition);
	}

	let ty = schema.resolve(entity, &condition.property)?;
	let expr = QueryExpr::Field {
		path: condition.property.clone(),
		ty: ty.clone(),
	};
	if ty.is_collection() {
		assemble_collection(expr, condition)
	} else {
		assemble_scalar(expr, condition)
	}
}

fn resolve_collection(
	path: &str,
	entity: &str,
	schema: &impl SchemaResolver,
	trailing: TrailingFunction,
) -> Result<QueryExpr, CompileError> {
	let ty = schema.resolve(entity, path)?;
	if !ty.is_collection() {
		let suffix = match trailing {
			TrailingFunction::Size => "size()",
			TrailingFunction::Length => "length()",
			TrailingFunction::IsEmpty => "isEmpty()",
			TrailingFunction::IsNotEmpty => "isNotEmpty()",
		};
		return Err(ResolutionError::NotACollection {
			field: path.to_string(),
			operation: suffix.to_string(),
		}
		.into());
	}
	Ok(QueryExpr::Field {
		path: path.to_string(),
		ty,
	})
}

/// Scalar dispatch: the full operation table over a scalar-valued expression.
fn assemble_scalar(
	expr: QueryExpr,
	condition: &FilterCondition,
) -> Result<Predicate, CompileError> {
	let ty = expr.result_type();
	let field = condition.property.as_str();
	let operation = condition.operation;

	match operation {
		FilterOperation::Equals => {
			let value = coerce(&condition.value, &ty)?;
			Ok(Predicate::Equals { expr, value })
		}
		FilterOperation::NotEquals => {
			let value = coerce(&condition.value, &ty)?;
			Ok(Predicate::Equals { expr, value }.negate())
		}
		FilterOperation::EqualsIgnoreCase => {
			let value = textual_operand(&condition.value, field, &ty, operation)?;
			Ok(Predicate::EqualsIgnoreCase { expr, value })
		}
		FilterOperation::Gt | FilterOperation::Gte | FilterOperation::Ls | FilterOperation::Lse => {
			if !ty.value_type().is_comparable() {
				return Err(ResolutionError::NotComparable {
					field: field.to_string(),
					ty: ty.to_string(),
					operation: operation.token().to_string(),
				}
				.into());
			}
			let value = coerce(&condition.value, &ty)?;
			Ok(Predicate::Compare {
				expr,
				op: compare_op(operation),
				value,
			})
		}
		FilterOperation::Like => {
			let pattern = textual_operand(&condition.value, field, &ty, operation)?;
			Ok(Predicate::Like { expr, pattern })
		}
		FilterOperation::NotLike => {
			let pattern = textual_operand(&condition.value, field, &ty, operation)?;
			Ok(Predicate::Like { expr, pattern }.negate())
		}
		FilterOperation::Contains => {
			let needle = textual_operand(&condition.value, field, &ty, operation)?;
			Ok(Predicate::ContainsText { expr, needle })
		}
		FilterOperation::NotContains => {
			let needle = textual_operand(&condition.value, field, &ty, operation)?;
			Ok(Predicate::ContainsText { expr, needle }.negate())
		}
		FilterOperation::In => {
			let values = coerce_elements(&condition.value, ty.value_type())?;
			Ok(Predicate::InSet { expr, values })
		}
		FilterOperation::NotIn => {
			let values = coerce_elements(&condition.value, ty.value_type())?;
			Ok(Predicate::InSet { expr, values }.negate())
		}
		FilterOperation::Is => assemble_sentinel(expr, condition, false),
		FilterOperation::IsNot => assemble_sentinel(expr, condition, true),
	}
}

/// Collection dispatch for a plain collection-valued path with no trailing
/// suffix. Equality becomes a membership test and IN an intersection test;
/// ordering needs a trailing size() and text matching stays scalar-only, so
/// both are rejected here.
fn assemble_collection(
	expr: QueryExpr,
	condition: &FilterCondition,
) -> Result<Predicate, CompileError> {
	let ty = expr.result_type();
	let field = condition.property.as_str();
	let operation = condition.operation;

	match operation {
		FilterOperation::Equals => {
			let value = coerce(&condition.value, &ty)?;
			Ok(Predicate::MemberOf { expr, value })
		}
		FilterOperation::NotEquals => {
			let value = coerce(&condition.value, &ty)?;
			Ok(Predicate::MemberOf { expr, value }.negate())
		}
		FilterOperation::In => {
			let values = coerce_elements(&condition.value, ty.value_type())?;
			Ok(Predicate::InSet { expr, values })
		}
		FilterOperation::NotIn => {
			let values = coerce_elements(&condition.value, ty.value_type())?;
			Ok(Predicate::InSet { expr, values }.negate())
		}
		FilterOperation::Is | FilterOperation::IsNot => {
			let negated = operation == FilterOperation::IsNot;
			match sentinel(&condition.value)? {
				Is::Null => Ok(negate_if(Predicate::Empty { expr }, negated)),
				Is::NotNull => Ok(negate_if(Predicate::Empty { expr }.negate(), negated)),
				Is::True | Is::False => Err(ResolutionError::IncompatibleOperation {
					field: field.to_string(),
					operation: operation.token().to_string(),
					detail: "boolean sentinels do not apply to collections".to_string(),
				}
				.into()),
			}
		}
		FilterOperation::Gt
		| FilterOperation::Gte
		| FilterOperation::Ls
		| FilterOperation::Lse => Err(ResolutionError::IncompatibleOperation {
			field: field.to_string(),
			operation: operation.token().to_string(),
			detail: "ordering a collection requires a trailing size()".to_string(),
		}
		.into()),
		FilterOperation::EqualsIgnoreCase
		| FilterOperation::Like
		| FilterOperation::NotLike
		| FilterOperation::Contains
		| FilterOperation::NotContains => Err(ResolutionError::IncompatibleOperation {
			field: field.to_string(),
			operation: operation.token().to_string(),
			detail: "text matching does not apply to collections".to_string(),
		}
		.into()),
	}
}

/// Size / length suffix: the expression is already the element count, so the
/// scalar comparison table applies with an integer operand.
fn assemble_size(expr: QueryExpr, condition: &FilterCondition) -> Result<Predicate, CompileError> {
	let operation = condition.operation;
	match operation {
		FilterOperation::Equals
		| FilterOperation::NotEquals
		| FilterOperation::Gt
		| FilterOperation::Gte
		| FilterOperation::Ls
		| FilterOperation::Lse
		| FilterOperation::In
		| FilterOperation::NotIn => assemble_scalar(expr, condition),
		_ => Err(ResolutionError::IncompatibleOperation {
			field: condition.property.clone(),
			operation: operation.token().to_string(),
			detail: "element counts support equality, ordering and membership".to_string(),
		}
		.into()),
	}
}

/// isEmpty / isNotEmpty suffix. The suffix already names the test; the
/// operation may only affirm or invert it, through `= true/false` or
/// `IS TRUE/FALSE`.
fn assemble_emptiness(
	expr: QueryExpr,
	condition: &FilterCondition,
	inverted: bool,
) -> Result<Predicate, CompileError> {
	let affirmed = match condition.operation {
		FilterOperation::Equals | FilterOperation::Is => emptiness_operand(&condition.value)?,
		FilterOperation::NotEquals | FilterOperation::IsNot => !emptiness_operand(&condition.value)?,
		other => {
			return Err(ResolutionError::IncompatibleOperation {
				field: condition.property.clone(),
				operation: other.token().to_string(),
				detail: "emptiness tests combine only with equality or IS".to_string(),
			}
			.into())
		}
	};
	// isEmpty affirmed and isNotEmpty denied both assert emptiness.
	Ok(negate_if(Predicate::Empty { expr }, affirmed == inverted))
}

fn emptiness_operand(value: &serde_json::Value) -> Result<bool, CompileError> {
	match coerce_value(value, &ValueType::Bool)? {
		Scalar::Bool(b) => Ok(b),
		Scalar::Null => Err(CoercionError::MisplacedSentinel {
			value: "null".to_string(),
		}
		.into()),
		other => Err(CoercionError::Unparseable {
			value: other.as_string(),
			target: "bool".to_string(),
		}
		.into()),
	}
}

fn assemble_sentinel(
	expr: QueryExpr,
	condition: &FilterCondition,
	negated: bool,
) -> Result<Predicate, CompileError> {
	let ty = expr.result_type();
	let predicate = match sentinel(&condition.value)? {
		Is::Null => Predicate::IsNull { expr },
		Is::NotNull => Predicate::IsNull { expr }.negate(),
		Is::True | Is::False if !matches!(ty.value_type(), ValueType::Bool) => {
			return Err(ResolutionError::IncompatibleOperation {
				field: condition.property.clone(),
				operation: condition.operation.token().to_string(),
				detail: format!("boolean sentinel on field of type {}", ty),
			}
			.into())
		}
		Is::True => Predicate::Equals {
			expr,
			value: Scalar::Bool(true),
		},
		Is::False => Predicate::Equals {
			expr,
			value: Scalar::Bool(false),
		},
	};
	Ok(negate_if(predicate, negated))
}

/// IS / IS_NOT take only the four sentinel names; anything else is a misuse
/// of the sentinel operand.
fn sentinel(value: &serde_json::Value) -> Result<Is, CoercionError> {
	let text = match value {
		serde_json::Value::String(s) => s.as_str(),
		serde_json::Value::Null => "null",
		serde_json::Value::Bool(true) => "true",
		serde_json::Value::Bool(false) => "false",
		other => {
			return Err(CoercionError::MisplacedSentinel {
				value: other.to_string(),
			})
		}
	};
	Is::parse(text).ok_or_else(|| CoercionError::MisplacedSentinel {
		value: text.to_string(),
	})
}

fn compare_op(operation: FilterOperation) -> CompareOp {
	match operation {
		FilterOperation::Gt => CompareOp::Gt,
		FilterOperation::Gte => CompareOp::Gte,
		FilterOperation::Ls => CompareOp::Ls,
		FilterOperation::Lse => CompareOp::Lse,
		// assemble_scalar routes only ordering operations here
		_ => unreachable!("non-ordering operation: {}", operation.token()),
	}
}

fn negate_if(predicate: Predicate, negated: bool) -> Predicate {
	if negated {
		predicate.negate()
	} else {
		predicate
	}
}

/// Textual operand for text-matching operations; the expression itself must
/// also produce text.
fn textual_operand(
	value: &serde_json::Value,
	field: &str,
	ty: &ResolvedType,
	operation: FilterOperation,
) -> Result<String, CompileError> {
	if !ty.value_type().is_textual() {
		return Err(ResolutionError::IncompatibleOperation {
			field: field.to_string(),
			operation: operation.token().to_string(),
			detail: format!("text matching on field of type {}", ty),
		}
		.into());
	}
	match coerce_value(value, &ValueType::String)? {
		Scalar::Str(s) => Ok(s),
		other => Err(CoercionError::Incompatible {
			value: other.as_string(),
			shape: other.type_name(),
			target: "string".to_string(),
		}
		.into()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::filter::condition::FilterOperation;
	use crate::schema::EntitySchema;
	use serde_json::json;

	fn schema() -> EntitySchema {
		EntitySchema::new()
			.with_field("Order", "name", ResolvedType::Scalar(ValueType::String))
			.with_field("Order", "amount", ResolvedType::Scalar(ValueType::Decimal))
			.with_field("Order", "deleted", ResolvedType::Scalar(ValueType::Bool))
			.with_field("Order", "created", ResolvedType::Scalar(ValueType::Date))
			.with_collection("Order", "nums", ValueType::Int)
			.with_collection("Order", "tags", ValueType::String)
	}

	fn one(
		property: &str,
		operation: FilterOperation,
		value: serde_json::Value,
	) -> Result<Predicate, CompileError> {
		let condition = FilterCondition::new(property, operation, value);
		assemble_condition(&condition, "Order", &schema())
	}

	#[test]
	fn test_equality_coerces_against_field_type() {
		let predicate = one("amount", FilterOperation::Equals, json!("12.5")).unwrap();
		let Predicate::Equals { value, .. } = predicate else {
			panic!("expected equality");
		};
		assert_eq!(value, Scalar::Decimal(12.5));
	}

	#[test]
	fn test_not_equals_negates_equality() {
		let predicate = one("name", FilterOperation::NotEquals, json!("x")).unwrap();
		assert!(matches!(predicate, Predicate::Not(_)));
	}

	#[test]
	fn test_ordering_requires_comparable_type() {
		assert!(one("created", FilterOperation::Gte, json!("2024-01-01")).is_ok());
		let err = one("deleted", FilterOperation::Gt, json!("true")).unwrap_err();
		assert!(matches!(
			err,
			CompileError::Resolution(ResolutionError::NotComparable { .. })
		));
	}

	#[test]
	fn test_text_matching_requires_textual_type() {
		assert!(one("name", FilterOperation::Like, json!("a%")).is_ok());
		let err = one("amount", FilterOperation::Contains, json!("1")).unwrap_err();
		assert!(matches!(
			err,
			CompileError::Resolution(ResolutionError::IncompatibleOperation { .. })
		));
	}

	#[test]
	fn test_membership_coerces_element_wise() {
		let predicate = one("amount", FilterOperation::In, json!(["1", "2.5"])).unwrap();
		let Predicate::InSet { values, .. } = predicate else {
			panic!("expected membership");
		};
		assert_eq!(values, vec![Scalar::Decimal(1.0), Scalar::Decimal(2.5)]);
	}

	#[test]
	fn test_is_sentinels_on_scalar() {
		assert!(matches!(
			one("name", FilterOperation::Is, json!("null")).unwrap(),
			Predicate::IsNull { .. }
		));
		assert!(matches!(
			one("name", FilterOperation::Is, json!("not_null")).unwrap(),
			Predicate::Not(_)
		));
		assert_eq!(
			one("deleted", FilterOperation::Is, json!("true")).unwrap(),
			Predicate::Equals {
				expr: QueryExpr::Field {
					path: "deleted".to_string(),
					ty: ResolvedType::Scalar(ValueType::Bool),
				},
				value: Scalar::Bool(true),
			}
		);
	}

	#[test]
	fn test_boolean_sentinel_needs_boolean_field() {
		let err = one("name", FilterOperation::Is, json!("true")).unwrap_err();
		assert!(matches!(
			err,
			CompileError::Resolution(ResolutionError::IncompatibleOperation { .. })
		));
	}

	#[test]
	fn test_sentinel_outside_is_fails() {
		let err = one("name", FilterOperation::Is, json!("something")).unwrap_err();
		assert!(matches!(
			err,
			CompileError::Coercion(CoercionError::MisplacedSentinel { .. })
		));
	}

	#[test]
	fn test_collection_equality_is_membership() {
		let predicate = one("nums", FilterOperation::Equals, json!("3")).unwrap();
		let Predicate::MemberOf { value, .. } = predicate else {
			panic!("expected membership");
		};
		assert_eq!(value, Scalar::Int(3));
	}

	#[test]
	fn test_text_matching_on_collection_is_rejected() {
		// Membership is expressed through equality or IN; CONTAINS stays a
		// text operation.
		for operation in [FilterOperation::Contains, FilterOperation::NotContains] {
			let err = one("tags", operation, json!("red")).unwrap_err();
			assert!(matches!(
				err,
				CompileError::Resolution(ResolutionError::IncompatibleOperation { .. })
			));
		}
	}

	#[test]
	fn test_collection_ordering_needs_trailing_size() {
		let err = one("nums", FilterOperation::Gte, json!(2)).unwrap_err();
		assert!(matches!(
			err,
			CompileError::Resolution(ResolutionError::IncompatibleOperation { .. })
		));
	}

	#[test]
	fn test_trailing_size_compares_element_count() {
		let predicate = one("nums.size()", FilterOperation::Gte, json!(2)).unwrap();
		let Predicate::Compare { expr, op, value } = predicate else {
			panic!("expected comparison");
		};
		assert!(matches!(expr, QueryExpr::Size(_)));
		assert_eq!(op, CompareOp::Gte);
		assert_eq!(value, Scalar::Int(2));
	}

	#[test]
	fn test_trailing_size_needs_collection_field() {
		let err = one("name.size()", FilterOperation::Gte, json!(2)).unwrap_err();
		assert!(matches!(
			err,
			CompileError::Resolution(ResolutionError::NotACollection { .. })
		));
	}

	#[test]
	fn test_is_empty_affirmed_and_inverted() {
		assert!(matches!(
			one("tags.isEmpty()", FilterOperation::Equals, json!(true)).unwrap(),
			Predicate::Empty { .. }
		));
		assert!(matches!(
			one("tags.isEmpty()", FilterOperation::Equals, json!(false)).unwrap(),
			Predicate::Not(_)
		));
		assert!(matches!(
			one("tags.isNotEmpty()", FilterOperation::Is, json!("true")).unwrap(),
			Predicate::Not(_)
		));
		assert!(matches!(
			one("tags.isNotEmpty()", FilterOperation::Is, json!("false")).unwrap(),
			Predicate::Empty { .. }
		));
	}

	#[test]
	fn test_expression_property_goes_through_the_pipeline() {
		let predicate = one("lower(name)", FilterOperation::Equals, json!("abc")).unwrap();
		let Predicate::Equals { expr, value } = predicate else {
			panic!("expected equality");
		};
		assert!(matches!(expr, QueryExpr::Apply { .. }));
		assert_eq!(value, Scalar::Str("abc".to_string()));
	}

	#[test]
	fn test_assemble_combines_conditions_conjunctively() {
		let filter = Filter::builder()
			.contains("name", "test")
			.gte("nums.size()", 2)
			.build();
		let predicate = assemble(&filter, "Order", &schema()).unwrap();
		let Predicate::And(parts) = predicate else {
			panic!("expected conjunction");
		};
		assert_eq!(parts.len(), 2);
	}

	#[test]
	fn test_empty_filter_is_always_true() {
		let predicate = assemble(&Filter::default(), "Order", &schema()).unwrap();
		assert_eq!(predicate, Predicate::And(vec![]));
	}
}
