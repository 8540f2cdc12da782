//! Coercion of dynamic operands into the statically expected value types

use std::cmp::Ordering;

use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;

use crate::schema::{ResolvedType, ValueType};

/// Primary textual pattern for date operands; the temporal target's natural
/// textual form is tried as a fallback.
const DATE_PATTERN: &str = "%Y-%m-%d";
const TIMESTAMP_PATTERNS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// A typed runtime value, the output of coercion and the operand shape the
/// predicate IR carries.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
	Null,
	Bool(bool),
	Str(String),
	Int(i32),
	Long(i64),
	Short(i16),
	Byte(i8),
	Float(f32),
	Double(f64),
	Decimal(f64),
	BigInt(i128),
	Date(NaiveDate),
	Timestamp(NaiveDateTime),
	Enum(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoercionError {
	#[error("cannot coerce {shape} value '{value}' to type {target}")]
	Incompatible {
		value: String,
		shape: &'static str,
		target: String,
	},
	#[error("value '{value}' cannot be parsed as {target}")]
	Unparseable { value: String, target: String },
	#[error("value '{value}' is out of range for type {target}")]
	OutOfRange { value: String, target: String },
	#[error("'{value}' is not one of the enum constants [{constants}]")]
	UnknownEnumConstant { value: String, constants: String },
	#[error("sentinel '{value}' is only valid with IS / IS_NOT")]
	MisplacedSentinel { value: String },
}

/// Coerces one operand against a resolved field type. For collection fields
/// the operand is coerced against the declared element type, which is what
/// membership tests need.
pub fn coerce(value: &serde_json::Value, target: &ResolvedType) -> Result<Scalar, CoercionError> {
	coerce_value(value, target.value_type())
}

/// Coerces a value-set operand element-wise. A JSON array coerces each
/// element; a single value becomes a one-element set.
pub fn coerce_elements(
	value: &serde_json::Value,
	element: &ValueType,
) -> Result<Vec<Scalar>, CoercionError> {
	match value {
		serde_json::Value::Array(items) => items
			.iter()
			.map(|item| coerce_value(item, element))
			.collect(),
		other => Ok(vec![coerce_value(other, element)?]),
	}
}

/// Coercion rules, in order: identity, numeric by exact target with range
/// checks, string parsing by the target's canonical grammar. Anything whose
/// runtime shape is neither a string nor already the target is a hard
/// failure; there is no silent truncation.
pub fn coerce_value(value: &serde_json::Value, target: &ValueType) -> Result<Scalar, CoercionError> {
	match value {
		serde_json::Value::Null => Ok(Scalar::Null),
		serde_json::Value::Bool(b) => match target {
			ValueType::Bool => Ok(Scalar::Bool(*b)),
			_ => Err(incompatible(value, "boolean", target)),
		},
		serde_json::Value::Number(n) => coerce_number(n, target),
		serde_json::Value::String(s) => coerce_string(s, target),
		serde_json::Value::Array(_) => Err(incompatible(value, "array", target)),
		serde_json::Value::Object(_) => Err(incompatible(value, "object", target)),
	}
}

fn incompatible(value: &serde_json::Value, shape: &'static str, target: &ValueType) -> CoercionError {
	CoercionError::Incompatible {
		value: value.to_string(),
		shape,
		target: target.to_string(),
	}
}

fn coerce_number(n: &serde_json::Number, target: &ValueType) -> Result<Scalar, CoercionError> {
	let out_of_range = || CoercionError::OutOfRange {
		value: n.to_string(),
		target: target.to_string(),
	};

	match target {
		ValueType::Int => integral(n)
			.and_then(|i| i32::try_from(i).ok())
			.map(Scalar::Int)
			.ok_or_else(out_of_range),
		ValueType::Long => integral(n)
			.and_then(|i| i64::try_from(i).ok())
			.map(Scalar::Long)
			.ok_or_else(out_of_range),
		ValueType::Short => integral(n)
			.and_then(|i| i16::try_from(i).ok())
			.map(Scalar::Short)
			.ok_or_else(out_of_range),
		ValueType::Byte => integral(n)
			.and_then(|i| i8::try_from(i).ok())
			.map(Scalar::Byte)
			.ok_or_else(out_of_range),
		ValueType::BigInt => integral(n).map(Scalar::BigInt).ok_or_else(out_of_range),
		ValueType::Float => n
			.as_f64()
			.map(|f| Scalar::Float(f as f32))
			.ok_or_else(out_of_range),
		ValueType::Double => n.as_f64().map(Scalar::Double).ok_or_else(out_of_range),
		ValueType::Decimal => n.as_f64().map(Scalar::Decimal).ok_or_else(out_of_range),
		_ => Err(CoercionError::Incompatible {
			value: n.to_string(),
			shape: "number",
			target: target.to_string(),
		}),
	}
}

/// Integral view of a JSON number; a fractional number never coerces to an
/// integer target.
fn integral(n: &serde_json::Number) -> Option<i128> {
	if let Some(i) = n.as_i64() {
		Some(i128::from(i))
	} else if let Some(u) = n.as_u64() {
		Some(i128::from(u))
	} else {
		None
	}
}

fn coerce_string(s: &str, target: &ValueType) -> Result<Scalar, CoercionError> {
	let unparseable = || CoercionError::Unparseable {
		value: s.to_string(),
		target: target.to_string(),
	};

	match target {
		ValueType::String | ValueType::Text => Ok(Scalar::Str(s.to_string())),
		ValueType::Int => s.parse().map(Scalar::Int).map_err(|_| unparseable()),
		ValueType::Long => s.parse().map(Scalar::Long).map_err(|_| unparseable()),
		ValueType::Short => s.parse().map(Scalar::Short).map_err(|_| unparseable()),
		ValueType::Byte => s.parse().map(Scalar::Byte).map_err(|_| unparseable()),
		ValueType::BigInt => s.parse().map(Scalar::BigInt).map_err(|_| unparseable()),
		ValueType::Float => s.parse().map(Scalar::Float).map_err(|_| unparseable()),
		ValueType::Double => s.parse().map(Scalar::Double).map_err(|_| unparseable()),
		ValueType::Decimal => s.parse().map(Scalar::Decimal).map_err(|_| unparseable()),
		ValueType::Bool => match s {
			"true" => Ok(Scalar::Bool(true)),
			"false" => Ok(Scalar::Bool(false)),
			_ => Err(unparseable()),
		},
		ValueType::Date => NaiveDate::parse_from_str(s, DATE_PATTERN)
			.map(Scalar::Date)
			.map_err(|_| unparseable()),
		ValueType::Timestamp => parse_timestamp(s).ok_or_else(unparseable),
		ValueType::Enum(constants) => {
			if constants.iter().any(|c| c == s) {
				Ok(Scalar::Enum(s.to_string()))
			} else {
				Err(CoercionError::UnknownEnumConstant {
					value: s.to_string(),
					constants: constants.join(", "),
				})
			}
		}
	}
}

fn parse_timestamp(s: &str) -> Option<Scalar> {
	if let Ok(date) = NaiveDate::parse_from_str(s, DATE_PATTERN) {
		return Some(Scalar::Timestamp(date.and_hms_opt(0, 0, 0)?));
	}
	TIMESTAMP_PATTERNS
		.iter()
		.find_map(|pattern| NaiveDateTime::parse_from_str(s, pattern).ok())
		.map(Scalar::Timestamp)
}

impl Scalar {
	pub fn is_null(&self) -> bool {
		matches!(self, Scalar::Null)
	}

	pub fn type_name(&self) -> &'static str {
		match self {
			Scalar::Null => "null",
			Scalar::Bool(_) => "bool",
			Scalar::Str(_) => "string",
			Scalar::Int(_) => "int",
			Scalar::Long(_) => "long",
			Scalar::Short(_) => "short",
			Scalar::Byte(_) => "byte",
			Scalar::Float(_) => "float",
			Scalar::Double(_) => "double",
			Scalar::Decimal(_) => "decimal",
			Scalar::BigInt(_) => "bigint",
			Scalar::Date(_) => "date",
			Scalar::Timestamp(_) => "timestamp",
			Scalar::Enum(_) => "enum",
		}
	}

	/// String representation used when a string function receives a
	/// non-string argument.
	pub fn as_string(&self) -> String {
		match self {
			Scalar::Null => String::new(),
			Scalar::Bool(b) => b.to_string(),
			Scalar::Str(s) | Scalar::Enum(s) => s.clone(),
			Scalar::Int(i) => i.to_string(),
			Scalar::Long(i) => i.to_string(),
			Scalar::Short(i) => i.to_string(),
			Scalar::Byte(i) => i.to_string(),
			Scalar::Float(f) => f.to_string(),
			Scalar::Double(f) => f.to_string(),
			Scalar::Decimal(f) => f.to_string(),
			Scalar::BigInt(i) => i.to_string(),
			Scalar::Date(d) => d.format(DATE_PATTERN).to_string(),
			Scalar::Timestamp(t) => t.format("%Y-%m-%dT%H:%M:%S").to_string(),
		}
	}

	pub fn as_i128(&self) -> Option<i128> {
		match self {
			Scalar::Int(i) => Some(i128::from(*i)),
			Scalar::Long(i) => Some(i128::from(*i)),
			Scalar::Short(i) => Some(i128::from(*i)),
			Scalar::Byte(i) => Some(i128::from(*i)),
			Scalar::BigInt(i) => Some(*i),
			_ => None,
		}
	}

	pub fn as_f64(&self) -> Option<f64> {
		match self {
			Scalar::Int(i) => Some(f64::from(*i)),
			Scalar::Long(i) => Some(*i as f64),
			Scalar::Short(i) => Some(f64::from(*i)),
			Scalar::Byte(i) => Some(f64::from(*i)),
			Scalar::Float(f) => Some(f64::from(*f)),
			Scalar::Double(f) | Scalar::Decimal(f) => Some(*f),
			Scalar::BigInt(i) => Some(*i as f64),
			_ => None,
		}
	}

	pub fn is_numeric(&self) -> bool {
		self.as_f64().is_some()
	}
}

/// Ordering across scalar widths: integral pairs compare exactly, mixed
/// numerics through f64, strings lexically, temporals chronologically (a
/// date promotes to its midnight timestamp). `None` means the two values
/// have no defined order.
pub fn compare_scalars(left: &Scalar, right: &Scalar) -> Option<Ordering> {
	match (left, right) {
		(Scalar::Null, _) | (_, Scalar::Null) => None,
		(Scalar::Str(a), Scalar::Str(b)) | (Scalar::Enum(a), Scalar::Enum(b)) => Some(a.cmp(b)),
		(Scalar::Bool(a), Scalar::Bool(b)) => Some(a.cmp(b)),
		(Scalar::Date(a), Scalar::Date(b)) => Some(a.cmp(b)),
		(Scalar::Timestamp(a), Scalar::Timestamp(b)) => Some(a.cmp(b)),
		(Scalar::Date(a), Scalar::Timestamp(b)) => Some(a.and_hms_opt(0, 0, 0)?.cmp(b)),
		(Scalar::Timestamp(a), Scalar::Date(b)) => Some(a.cmp(&b.and_hms_opt(0, 0, 0)?)),
		_ => match (left.as_i128(), right.as_i128()) {
			(Some(a), Some(b)) => Some(a.cmp(&b)),
			_ => left.as_f64()?.partial_cmp(&right.as_f64()?),
		},
	}
}

/// Equality with null handled explicitly: null equals only null.
pub fn scalars_equal(left: &Scalar, right: &Scalar) -> bool {
	match (left, right) {
		(Scalar::Null, Scalar::Null) => true,
		(Scalar::Enum(a), Scalar::Str(b)) | (Scalar::Str(a), Scalar::Enum(b)) => a == b,
		_ => compare_scalars(left, right) == Some(Ordering::Equal),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn test_string_to_integer() {
		assert_eq!(
			coerce_value(&json!("42"), &ValueType::Int),
			Ok(Scalar::Int(42))
		);
	}

	#[test]
	fn test_unparseable_string_to_integer() {
		let err = coerce_value(&json!("abc"), &ValueType::Int).unwrap_err();
		assert_eq!(
			err,
			CoercionError::Unparseable {
				value: "abc".to_string(),
				target: "int".to_string(),
			}
		);
	}

	#[test]
	fn test_identity_and_widths() {
		assert_eq!(
			coerce_value(&json!(7), &ValueType::Long),
			Ok(Scalar::Long(7))
		);
		assert_eq!(
			coerce_value(&json!(7), &ValueType::Double),
			Ok(Scalar::Double(7.0))
		);
		assert_eq!(
			coerce_value(&json!("3.5"), &ValueType::Decimal),
			Ok(Scalar::Decimal(3.5))
		);
	}

	#[test]
	fn test_narrowing_out_of_range() {
		let err = coerce_value(&json!(70000), &ValueType::Short).unwrap_err();
		assert!(matches!(err, CoercionError::OutOfRange { .. }));
	}

	#[test]
	fn test_fractional_number_never_truncates_to_integer() {
		let err = coerce_value(&json!(1.5), &ValueType::Int).unwrap_err();
		assert!(matches!(err, CoercionError::OutOfRange { .. }));
	}

	#[test]
	fn test_string_to_date_primary_pattern() {
		let scalar = coerce_value(&json!("2024-03-01"), &ValueType::Date).unwrap();
		assert_eq!(
			scalar,
			Scalar::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
		);
	}

	#[test]
	fn test_string_to_timestamp_with_fallbacks() {
		assert!(coerce_value(&json!("2024-03-01"), &ValueType::Timestamp).is_ok());
		assert!(coerce_value(&json!("2024-03-01T10:30:00"), &ValueType::Timestamp).is_ok());
		assert!(coerce_value(&json!("2024-03-01 10:30:00"), &ValueType::Timestamp).is_ok());
		assert!(coerce_value(&json!("March 1st"), &ValueType::Timestamp).is_err());
	}

	#[test]
	fn test_string_to_enum_is_case_sensitive() {
		let status = ValueType::Enum(vec!["NEW".to_string(), "DONE".to_string()]);
		assert_eq!(
			coerce_value(&json!("NEW"), &status),
			Ok(Scalar::Enum("NEW".to_string()))
		);
		let err = coerce_value(&json!("new"), &status).unwrap_err();
		assert!(matches!(err, CoercionError::UnknownEnumConstant { .. }));
	}

	#[test]
	fn test_shape_mismatch_is_hard_failure() {
		assert!(coerce_value(&json!(true), &ValueType::Int).is_err());
		assert!(coerce_value(&json!({"a": 1}), &ValueType::String).is_err());
		assert!(coerce_value(&json!([1, 2]), &ValueType::Int).is_err());
	}

	#[test]
	fn test_collection_operand_coerces_element_wise() {
		let elements = coerce_elements(&json!(["1", "2", "3"]), &ValueType::Int).unwrap();
		assert_eq!(
			elements,
			vec![Scalar::Int(1), Scalar::Int(2), Scalar::Int(3)]
		);
		assert!(coerce_elements(&json!(["1", "x"]), &ValueType::Int).is_err());
	}

	#[test]
	fn test_collection_field_target_uses_element_type() {
		let target = ResolvedType::Collection(ValueType::Int);
		assert_eq!(coerce(&json!("2"), &target), Ok(Scalar::Int(2)));
	}

	#[test]
	fn test_cross_width_comparison() {
		assert_eq!(
			compare_scalars(&Scalar::Int(2), &Scalar::Long(10)),
			Some(Ordering::Less)
		);
		assert_eq!(
			compare_scalars(&Scalar::Double(2.5), &Scalar::Int(2)),
			Some(Ordering::Greater)
		);
		assert!(scalars_equal(&Scalar::Int(3), &Scalar::Double(3.0)));
		assert!(!scalars_equal(&Scalar::Null, &Scalar::Int(3)));
		assert!(scalars_equal(&Scalar::Null, &Scalar::Null));
	}
}
