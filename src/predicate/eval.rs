//! Reference in-memory backend evaluating compiled predicates against
//! `serde_json` entity values

use chrono::Datelike;
use thiserror::Error;
use tracing::trace;

use crate::{
	coerce::{coerce_value, compare_scalars, scalars_equal, CoercionError, Scalar},
	expression::Function,
	predicate::query::{CompareOp, Predicate, QueryExpr},
	schema::ResolvedType,
};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
	#[error("field '{path}': {source}")]
	Field {
		path: String,
		source: CoercionError,
	},
	#[error(transparent)]
	Coercion(#[from] CoercionError),
	#[error("type error: {0}")]
	Type(String),
	#[error("division by zero in mod()")]
	DivisionByZero,
}

/// Runtime value of an evaluated expression: one scalar or a coerced
/// collection.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalValue {
	Scalar(Scalar),
	Collection(Vec<Scalar>),
}

impl EvalValue {
	fn into_scalar(self) -> Result<Scalar, EvalError> {
		match self {
			EvalValue::Scalar(scalar) => Ok(scalar),
			EvalValue::Collection(_) => Err(EvalError::Type(
				"expected a scalar value, found a collection".to_string(),
			)),
		}
	}
}

/// Evaluates a predicate against one entity value. Absent or null fields
/// evaluate as null: equality with null is false, `IsNull` is true, an
/// absent collection is empty.
pub fn eval_predicate(predicate: &Predicate, entity: &serde_json::Value) -> Result<bool, EvalError> {
	match predicate {
		Predicate::And(parts) => {
			for part in parts {
				if !eval_predicate(part, entity)? {
					return Ok(false);
				}
			}
			Ok(true)
		}
		Predicate::Or(parts) => {
			for part in parts {
				if eval_predicate(part, entity)? {
					return Ok(true);
				}
			}
			Ok(false)
		}
		Predicate::Not(inner) => Ok(!eval_predicate(inner, entity)?),
		Predicate::Equals { expr, value } => {
			let left = eval_expr(expr, entity)?.into_scalar()?;
			trace!(?left, ?value, "equality test");
			Ok(scalars_equal(&left, value))
		}
		Predicate::EqualsIgnoreCase { expr, value } => {
			let left = eval_expr(expr, entity)?.into_scalar()?;
			match left {
				Scalar::Null => Ok(false),
				Scalar::Str(s) | Scalar::Enum(s) => Ok(s.to_lowercase() == value.to_lowercase()),
				other => Err(EvalError::Type(format!(
					"case-insensitive equality requires a string, found {}",
					other.type_name()
				))),
			}
		}
		Predicate::Compare { expr, op, value } => {
			let left = eval_expr(expr, entity)?.into_scalar()?;
			let Some(ordering) = compare_scalars(&left, value) else {
				// Null or incomparable on either side never satisfies an
				// ordering comparison.
				return Ok(false);
			};
			Ok(match op {
				CompareOp::Gt => ordering.is_gt(),
				CompareOp::Gte => ordering.is_ge(),
				CompareOp::Ls => ordering.is_lt(),
				CompareOp::Lse => ordering.is_le(),
			})
		}
		Predicate::Like { expr, pattern } => {
			let left = eval_expr(expr, entity)?.into_scalar()?;
			match left {
				Scalar::Null => Ok(false),
				other => Ok(like_match(pattern, &other.as_string())),
			}
		}
		Predicate::ContainsText { expr, needle } => {
			let left = eval_expr(expr, entity)?.into_scalar()?;
			match left {
				Scalar::Null => Ok(false),
				other => Ok(other
					.as_string()
					.to_lowercase()
					.contains(&needle.to_lowercase())),
			}
		}
		Predicate::InSet { expr, values } => match eval_expr(expr, entity)? {
			EvalValue::Scalar(Scalar::Null) => Ok(false),
			EvalValue::Scalar(left) => Ok(values.iter().any(|v| scalars_equal(&left, v))),
			EvalValue::Collection(elements) => Ok(elements
				.iter()
				.any(|e| values.iter().any(|v| scalars_equal(e, v)))),
		},
		Predicate::IsNull { expr } => match eval_expr(expr, entity)? {
			EvalValue::Scalar(scalar) => Ok(scalar.is_null()),
			EvalValue::Collection(_) => Ok(false),
		},
		Predicate::MemberOf { expr, value } => match eval_expr(expr, entity)? {
			EvalValue::Collection(elements) => {
				Ok(elements.iter().any(|e| scalars_equal(e, value)))
			}
			EvalValue::Scalar(Scalar::Null) => Ok(false),
			EvalValue::Scalar(other) => Err(EvalError::Type(format!(
				"membership test requires a collection, found {}",
				other.type_name()
			))),
		},
		Predicate::Empty { expr } => match eval_expr(expr, entity)? {
			EvalValue::Collection(elements) => Ok(elements.is_empty()),
			EvalValue::Scalar(Scalar::Null) => Ok(true),
			EvalValue::Scalar(other) => Err(EvalError::Type(format!(
				"emptiness test requires a collection, found {}",
				other.type_name()
			))),
		},
	}
}

/// Evaluates a value expression against one entity.
pub fn eval_expr(expr: &QueryExpr, entity: &serde_json::Value) -> Result<EvalValue, EvalError> {
	match expr {
		QueryExpr::Field { path, ty } => eval_field(path, ty, entity),
		QueryExpr::Literal(scalar) => Ok(EvalValue::Scalar(scalar.clone())),
		QueryExpr::Size(inner) => match eval_expr(inner, entity)? {
			EvalValue::Collection(elements) => {
				Ok(EvalValue::Scalar(Scalar::Int(elements.len() as i32)))
			}
			EvalValue::Scalar(Scalar::Null) => Ok(EvalValue::Scalar(Scalar::Int(0))),
			EvalValue::Scalar(other) => Err(EvalError::Type(format!(
				"size requires a collection, found {}",
				other.type_name()
			))),
		},
		QueryExpr::Apply { function, args, .. } => {
			let mut scalars = Vec::with_capacity(args.len());
			for arg in args {
				scalars.push(eval_expr(arg, entity)?.into_scalar()?);
			}
			Ok(EvalValue::Scalar(apply_function(*function, &scalars)?))
		}
	}
}

fn eval_field(
	path: &str,
	ty: &ResolvedType,
	entity: &serde_json::Value,
) -> Result<EvalValue, EvalError> {
	let mut current = entity;
	for segment in path.split('.') {
		match current.get(segment) {
			Some(next) => current = next,
			None => return Ok(EvalValue::Scalar(Scalar::Null)),
		}
	}

	let field_error = |source: CoercionError| EvalError::Field {
		path: path.to_string(),
		source,
	};

	match ty {
		ResolvedType::Collection(element) => match current {
			serde_json::Value::Null => Ok(EvalValue::Collection(vec![])),
			serde_json::Value::Array(items) => {
				let elements = items
					.iter()
					.map(|item| coerce_value(item, element))
					.collect::<Result<Vec<_>, _>>()
					.map_err(field_error)?;
				Ok(EvalValue::Collection(elements))
			}
			other => Err(field_error(CoercionError::Incompatible {
				value: other.to_string(),
				shape: "non-array",
				target: format!("list<{}>", element),
			})),
		},
		ResolvedType::Scalar(value_type) => {
			let scalar = coerce_value(current, value_type).map_err(field_error)?;
			Ok(EvalValue::Scalar(scalar))
		}
	}
}

/// Executes one registry function over already-evaluated arguments. The
/// match is exhaustive over `Function`, so a registered function without a
/// runtime handler cannot exist.
fn apply_function(function: Function, args: &[Scalar]) -> Result<Scalar, EvalError> {
	match function {
		Function::Concat => Ok(Scalar::Str(
			args.iter().map(Scalar::as_string).collect::<String>(),
		)),
		Function::Lower => string_unary(&args[0], |s| s.to_lowercase()),
		Function::Upper => string_unary(&args[0], |s| s.to_uppercase()),
		Function::Trim => string_unary(&args[0], |s| s.trim().to_string()),
		Function::Length => match &args[0] {
			Scalar::Null => Ok(Scalar::Null),
			other => Ok(Scalar::Int(other.as_string().chars().count() as i32)),
		},
		Function::Substring => substring(args),
		Function::Replace => {
			string_unary(&args[0], |s| s.replace(&args[1].as_string(), &args[2].as_string()))
		}
		Function::Lpad => pad(args, true),
		Function::Rpad => pad(args, false),
		Function::Position => {
			let needle = args[0].as_string();
			let haystack = args[1].as_string();
			let position = haystack
				.find(&needle)
				.map(|byte| haystack[..byte].chars().count() + 1)
				.unwrap_or(0);
			Ok(Scalar::Int(position as i32))
		}
		Function::Repeat => {
			let count = integer_arg(&args[1], "repeat")?.max(0) as usize;
			string_unary(&args[0], |s| s.repeat(count))
		}
		Function::Abs => numeric_unary(&args[0], |i| i.abs(), f64::abs),
		Function::Floor => numeric_unary(&args[0], |i| i, f64::floor),
		Function::Ceil => numeric_unary(&args[0], |i| i, f64::ceil),
		Function::Sqrt => match args[0].as_f64() {
			Some(f) => Ok(Scalar::Double(f.sqrt())),
			None => Ok(Scalar::Null),
		},
		Function::Round => round(args),
		Function::Mod => modulo(args),
		Function::CurrentDate => Ok(Scalar::Date(chrono::Local::now().date_naive())),
		Function::CurrentTimestamp => Ok(Scalar::Timestamp(chrono::Local::now().naive_local())),
		Function::Year => date_part(&args[0], |d| d.year()),
		Function::Month => date_part(&args[0], |d| d.month() as i32),
		Function::Day => date_part(&args[0], |d| d.day() as i32),
		Function::DateFormat | Function::ToChar => format_value(&args[0], &args[1].as_string()),
		Function::Cast => cast(args),
		Function::Coalesce => Ok(args
			.iter()
			.find(|a| !a.is_null())
			.cloned()
			.unwrap_or(Scalar::Null)),
		Function::Nullif => {
			if scalars_equal(&args[0], &args[1]) {
				Ok(Scalar::Null)
			} else {
				Ok(args[0].clone())
			}
		}
	}
}

fn string_unary(arg: &Scalar, f: impl FnOnce(&str) -> String) -> Result<Scalar, EvalError> {
	match arg {
		Scalar::Null => Ok(Scalar::Null),
		other => Ok(Scalar::Str(f(&other.as_string()))),
	}
}

fn numeric_unary(
	arg: &Scalar,
	f_int: impl FnOnce(i128) -> i128,
	f_float: impl FnOnce(f64) -> f64,
) -> Result<Scalar, EvalError> {
	if arg.is_null() {
		return Ok(Scalar::Null);
	}
	if let Some(i) = arg.as_i128() {
		return Ok(Scalar::BigInt(f_int(i)));
	}
	match arg.as_f64() {
		Some(f) => Ok(Scalar::Double(f_float(f))),
		None => Err(EvalError::Type(format!(
			"numeric function applied to {}",
			arg.type_name()
		))),
	}
}

fn integer_arg(arg: &Scalar, function: &str) -> Result<i64, EvalError> {
	arg.as_i128()
		.and_then(|i| i64::try_from(i).ok())
		.ok_or_else(|| {
			EvalError::Type(format!(
				"{} requires an integer argument, found {}",
				function,
				arg.type_name()
			))
		})
}

/// SQL-style substring: one-based start, optional length, char-based.
fn substring(args: &[Scalar]) -> Result<Scalar, EvalError> {
	if args[0].is_null() {
		return Ok(Scalar::Null);
	}
	let text = args[0].as_string();
	let start = integer_arg(&args[1], "substring")?.max(1) as usize - 1;
	let chars: Vec<char> = text.chars().collect();
	let end = match args.get(2) {
		Some(len) => (start + integer_arg(len, "substring")?.max(0) as usize).min(chars.len()),
		None => chars.len(),
	};
	if start >= chars.len() {
		return Ok(Scalar::Str(String::new()));
	}
	Ok(Scalar::Str(chars[start..end].iter().collect()))
}

fn pad(args: &[Scalar], left: bool) -> Result<Scalar, EvalError> {
	if args[0].is_null() {
		return Ok(Scalar::Null);
	}
	let text = args[0].as_string();
	let width = integer_arg(&args[1], "pad")?.max(0) as usize;
	let fill = args
		.get(2)
		.map(Scalar::as_string)
		.filter(|f| !f.is_empty())
		.unwrap_or_else(|| " ".to_string());

	let length = text.chars().count();
	if length >= width {
		return Ok(Scalar::Str(text.chars().take(width).collect()));
	}
	let padding: String = fill.chars().cycle().take(width - length).collect();
	let padded = if left {
		format!("{}{}", padding, text)
	} else {
		format!("{}{}", text, padding)
	};
	Ok(Scalar::Str(padded))
}

fn round(args: &[Scalar]) -> Result<Scalar, EvalError> {
	if args[0].is_null() {
		return Ok(Scalar::Null);
	}
	let scale = match args.get(1) {
		Some(s) => integer_arg(s, "round")?,
		None => 0,
	};
	let value = args[0].as_f64().ok_or_else(|| {
		EvalError::Type(format!("round applied to {}", args[0].type_name()))
	})?;
	let factor = 10f64.powi(scale as i32);
	Ok(Scalar::Double((value * factor).round() / factor))
}

fn modulo(args: &[Scalar]) -> Result<Scalar, EvalError> {
	if args[0].is_null() || args[1].is_null() {
		return Ok(Scalar::Null);
	}
	if let (Some(a), Some(b)) = (args[0].as_i128(), args[1].as_i128()) {
		if b == 0 {
			return Err(EvalError::DivisionByZero);
		}
		return Ok(Scalar::BigInt(a % b));
	}
	match (args[0].as_f64(), args[1].as_f64()) {
		(Some(a), Some(b)) if b != 0.0 => Ok(Scalar::Double(a % b)),
		(Some(_), Some(_)) => Err(EvalError::DivisionByZero),
		_ => Err(EvalError::Type("mod requires numeric arguments".to_string())),
	}
}

fn date_part(arg: &Scalar, part: impl FnOnce(&chrono::NaiveDate) -> i32) -> Result<Scalar, EvalError> {
	match arg {
		Scalar::Null => Ok(Scalar::Null),
		Scalar::Date(d) => Ok(Scalar::Int(part(d))),
		Scalar::Timestamp(t) => Ok(Scalar::Int(part(&t.date()))),
		other => Err(EvalError::Type(format!(
			"date function applied to {}",
			other.type_name()
		))),
	}
}

/// Formats a temporal value with a strftime mask; non-temporal values fall
/// back to their plain string form.
fn format_value(arg: &Scalar, pattern: &str) -> Result<Scalar, EvalError> {
	use chrono::format::{Item, StrftimeItems};

	let items: Vec<Item<'_>> = StrftimeItems::new(pattern).collect();
	let valid = !items.iter().any(|item| matches!(item, Item::Error));

	match arg {
		Scalar::Null => Ok(Scalar::Null),
		Scalar::Date(d) if valid => Ok(Scalar::Str(
			d.format_with_items(items.into_iter()).to_string(),
		)),
		Scalar::Timestamp(t) if valid => Ok(Scalar::Str(
			t.format_with_items(items.into_iter()).to_string(),
		)),
		other => Ok(Scalar::Str(other.as_string())),
	}
}

fn cast(args: &[Scalar]) -> Result<Scalar, EvalError> {
	use crate::predicate::compile::cast_target;

	let Scalar::Str(target_name) = &args[1] else {
		return Err(EvalError::Type("cast target must be a string".to_string()));
	};
	let Some(target) = cast_target(target_name) else {
		return Err(EvalError::Type(format!(
			"unknown cast target '{}'",
			target_name
		)));
	};
	let json = scalar_to_json(&args[0]);
	Ok(coerce_value(&json, &target)?)
}

fn scalar_to_json(scalar: &Scalar) -> serde_json::Value {
	match scalar {
		Scalar::Null => serde_json::Value::Null,
		Scalar::Bool(b) => serde_json::Value::Bool(*b),
		Scalar::Int(i) => serde_json::json!(i),
		Scalar::Long(i) => serde_json::json!(i),
		Scalar::Short(i) => serde_json::json!(i),
		Scalar::Byte(i) => serde_json::json!(i),
		Scalar::Float(f) => serde_json::json!(f),
		Scalar::Double(f) | Scalar::Decimal(f) => serde_json::json!(f),
		Scalar::BigInt(i) => serde_json::json!(*i as i64),
		other => serde_json::Value::String(other.as_string()),
	}
}

/// `%`-wildcard pattern matching; a pattern without wildcards matches as a
/// substring.
fn like_match(pattern: &str, text: &str) -> bool {
	if !pattern.contains('%') {
		return text.contains(pattern);
	}
	let segments: Vec<&str> = pattern.split('%').collect();
	let last = segments.len() - 1;
	let mut remainder = text;
	for (i, segment) in segments.iter().enumerate() {
		if segment.is_empty() {
			continue;
		}
		if i == 0 {
			let Some(rest) = remainder.strip_prefix(segment) else {
				return false;
			};
			remainder = rest;
		} else if i == last {
			return remainder.ends_with(segment);
		} else {
			let Some(idx) = remainder.find(segment) else {
				return false;
			};
			remainder = &remainder[idx + segment.len()..];
		}
	}
	true
}
