//! Visitor compiling a validated AST into backend-neutral query nodes

use thiserror::Error;
use tracing::debug;

use crate::{
	coerce::Scalar,
	error::CompileError,
	expression::{Expr, Function, FunctionCategory, Number},
	predicate::query::QueryExpr,
	schema::{SchemaResolver, ValueType},
};

/// Function-application defects found while compiling: wrong argument types
/// and missing compile-time constants where the backend requires them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FunctionError {
	#[error("function '{function}' requires a numeric first argument, found {found}")]
	NumericArgumentRequired { function: &'static str, found: String },
	#[error("function '{function}' requires a date or timestamp argument, found {found}")]
	TemporalArgumentRequired { function: &'static str, found: String },
	#[error("argument {argument} of function '{function}' must be a literal constant")]
	ConstantRequired { function: &'static str, argument: usize },
	#[error("cast target must be a string literal naming one of string, text, integer, int, long, double, float")]
	CastTargetNotLiteral,
	#[error("unknown cast target type '{target}'")]
	UnknownCastTarget { target: String },
	#[error("function '{function}' requires {expected}, found {found}")]
	WrongArgumentCount {
		function: &'static str,
		expected: String,
		found: usize,
	},
}

/// Compiles one AST node against an entity's schema. Field paths resolve
/// through the resolver, literals become typed literals, and calls dispatch
/// by registry category. The match over `Function` is exhaustive, so a
/// registered function without a handler cannot compile.
pub fn compile(
	expr: &Expr<'_>,
	entity: &str,
	schema: &impl SchemaResolver,
) -> Result<QueryExpr, CompileError> {
	match expr {
		Expr::FieldPath(path) => {
			let ty = schema.resolve(entity, path)?;
			Ok(QueryExpr::Field {
				path: (*path).to_string(),
				ty,
			})
		}
		Expr::StringLit(s) => Ok(QueryExpr::literal(Scalar::Str((*s).to_string()))),
		Expr::NumberLit(Number::Int(i)) => Ok(QueryExpr::literal(Scalar::Long(*i))),
		Expr::NumberLit(Number::Float(f)) => Ok(QueryExpr::literal(Scalar::Double(*f))),
		Expr::Call { function, args } => compile_call(*function, args, entity, schema),
	}
}

fn compile_call(
	function: Function,
	args: &[Expr<'_>],
	entity: &str,
	schema: &impl SchemaResolver,
) -> Result<QueryExpr, CompileError> {
	debug!(function = function.name(), args = args.len(), "compiling function call");
	// The validator already enforced arity for parsed input; this guards
	// hand-built trees so the handlers below can index positionally.
	if !function.accepts_arity(args.len()) {
		return Err(FunctionError::WrongArgumentCount {
			function: function.name(),
			expected: function.arity_description(),
			found: args.len(),
		}
		.into());
	}
	match function.category() {
		FunctionCategory::String => compile_string_call(function, args, entity, schema),
		FunctionCategory::Numeric => compile_numeric_call(function, args, entity, schema),
		FunctionCategory::Date => compile_date_call(function, args, entity, schema),
		FunctionCategory::Conversion => compile_conversion_call(function, args, entity, schema),
	}
}

/// String functions take string inputs at known positions and numeric
/// positional parameters elsewhere (substring bounds, pad widths, repeat
/// counts). Literal arguments in string positions are coerced to their
/// string representation at compile time; non-literals are left for the
/// backend to convert.
fn compile_string_call(
	function: Function,
	args: &[Expr<'_>],
	entity: &str,
	schema: &impl SchemaResolver,
) -> Result<QueryExpr, CompileError> {
	let mut compiled = Vec::with_capacity(args.len());
	for (index, arg) in args.iter().enumerate() {
		let node = compile(arg, entity, schema)?;
		if is_string_position(function, index) {
			compiled.push(stringify_literal(node));
		} else {
			compiled.push(node);
		}
	}
	let ty = match function {
		Function::Length | Function::Position => ValueType::Int,
		_ => ValueType::String,
	};
	Ok(QueryExpr::Apply {
		function,
		args: compiled,
		ty,
	})
}

fn is_string_position(function: Function, index: usize) -> bool {
	match function {
		Function::Concat
		| Function::Lower
		| Function::Upper
		| Function::Trim
		| Function::Length
		| Function::Replace
		| Function::Position => true,
		Function::Substring | Function::Repeat => index == 0,
		Function::Lpad | Function::Rpad => index != 1,
		_ => false,
	}
}

fn stringify_literal(node: QueryExpr) -> QueryExpr {
	match node {
		QueryExpr::Literal(scalar) if !matches!(scalar, Scalar::Str(_) | Scalar::Null) => {
			QueryExpr::literal(Scalar::Str(scalar.as_string()))
		}
		other => other,
	}
}

/// Numeric functions require a numeric first argument. Fixed-position
/// parameters (round's scale, mod's divisor) must be numeric literals in the
/// AST because the backend needs compile-time constants there.
fn compile_numeric_call(
	function: Function,
	args: &[Expr<'_>],
	entity: &str,
	schema: &impl SchemaResolver,
) -> Result<QueryExpr, CompileError> {
	let first = compile(&args[0], entity, schema)?;
	let first_ty = first.result_type();
	if first_ty.is_collection() || !first_ty.value_type().is_numeric() {
		return Err(FunctionError::NumericArgumentRequired {
			function: function.name(),
			found: first_ty.to_string(),
		}
		.into());
	}

	let result_ty = match function {
		Function::Sqrt => ValueType::Double,
		_ => first_ty.value_type().clone(),
	};

	let mut compiled = vec![first];
	for (index, arg) in args.iter().enumerate().skip(1) {
		let Expr::NumberLit(number) = arg else {
			return Err(FunctionError::ConstantRequired {
				function: function.name(),
				argument: index + 1,
			}
			.into());
		};
		let scalar = match number {
			Number::Int(i) => Scalar::Long(*i),
			Number::Float(f) => Scalar::Double(*f),
		};
		compiled.push(QueryExpr::literal(scalar));
	}

	Ok(QueryExpr::Apply {
		function,
		args: compiled,
		ty: result_ty,
	})
}

fn compile_date_call(
	function: Function,
	args: &[Expr<'_>],
	entity: &str,
	schema: &impl SchemaResolver,
) -> Result<QueryExpr, CompileError> {
	match function {
		Function::CurrentDate => Ok(QueryExpr::Apply {
			function,
			args: vec![],
			ty: ValueType::Date,
		}),
		Function::CurrentTimestamp => Ok(QueryExpr::Apply {
			function,
			args: vec![],
			ty: ValueType::Timestamp,
		}),
		Function::Year | Function::Month | Function::Day => {
			let arg = compile(&args[0], entity, schema)?;
			let arg_ty = arg.result_type();
			if arg_ty.is_collection()
				|| !matches!(arg_ty.value_type(), ValueType::Date | ValueType::Timestamp)
			{
				return Err(FunctionError::TemporalArgumentRequired {
					function: function.name(),
					found: arg_ty.to_string(),
				}
				.into());
			}
			Ok(QueryExpr::Apply {
				function,
				args: vec![arg],
				ty: ValueType::Int,
			})
		}
		Function::DateFormat | Function::ToChar => {
			let value = compile(&args[0], entity, schema)?;
			// The format mask must be a compile-time constant.
			let Expr::StringLit(pattern) = &args[1] else {
				return Err(FunctionError::ConstantRequired {
					function: function.name(),
					argument: 2,
				}
				.into());
			};
			Ok(QueryExpr::Apply {
				function,
				args: vec![value, QueryExpr::literal(Scalar::Str((*pattern).to_string()))],
				ty: ValueType::String,
			})
		}
		// compile_call routes only date-category functions here
		_ => unreachable!("non-date function in date handler: {}", function),
	}
}

fn compile_conversion_call(
	function: Function,
	args: &[Expr<'_>],
	entity: &str,
	schema: &impl SchemaResolver,
) -> Result<QueryExpr, CompileError> {
	match function {
		Function::Cast => {
			let Expr::StringLit(target_name) = &args[1] else {
				return Err(FunctionError::CastTargetNotLiteral.into());
			};
			let ty = cast_target(target_name)
				.ok_or_else(|| FunctionError::UnknownCastTarget {
					target: (*target_name).to_string(),
				})?;
			let inner = compile(&args[0], entity, schema)?;
			Ok(QueryExpr::Apply {
				function,
				args: vec![
					inner,
					QueryExpr::literal(Scalar::Str((*target_name).to_string())),
				],
				ty,
			})
		}
		Function::Coalesce | Function::Nullif => {
			let compiled: Vec<QueryExpr> = args
				.iter()
				.map(|arg| compile(arg, entity, schema))
				.collect::<Result<_, _>>()?;
			let ty = compiled[0].result_type().value_type().clone();
			Ok(QueryExpr::Apply {
				function,
				args: compiled,
				ty,
			})
		}
		_ => unreachable!("non-conversion function in conversion handler: {}", function),
	}
}

/// Allowed cast target names. Anything else is a hard failure before the
/// backend ever sees the node.
pub fn cast_target(name: &str) -> Option<ValueType> {
	match name.to_ascii_lowercase().as_str() {
		"string" => Some(ValueType::String),
		"text" => Some(ValueType::Text),
		"integer" | "int" => Some(ValueType::Int),
		"long" => Some(ValueType::Long),
		"double" => Some(ValueType::Double),
		"float" => Some(ValueType::Float),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		expression::parse_expression,
		schema::{EntitySchema, ResolvedType},
	};

	fn schema() -> EntitySchema {
		EntitySchema::new()
			.with_field("Order", "name", ResolvedType::Scalar(ValueType::String))
			.with_field("Order", "price", ResolvedType::Scalar(ValueType::Decimal))
			.with_field("Order", "created", ResolvedType::Scalar(ValueType::Date))
			.with_collection("Order", "tags", ValueType::String)
	}

	fn compile_str(expression: &str) -> Result<QueryExpr, CompileError> {
		let expr = parse_expression(expression).expect("expression must parse");
		compile(&expr, "Order", &schema())
	}

	#[test]
	fn test_field_path_resolves_through_schema() {
		let node = compile_str("name").unwrap();
		assert_eq!(
			node,
			QueryExpr::Field {
				path: "name".to_string(),
				ty: ResolvedType::Scalar(ValueType::String),
			}
		);
	}

	#[test]
	fn test_unknown_field_is_a_hard_failure() {
		let err = compile_str("missing").unwrap_err();
		assert!(matches!(err, CompileError::Resolution(_)));
	}

	#[test]
	fn test_string_function_stringifies_literal_arguments() {
		let node = compile_str("concat(name,5)").unwrap();
		let QueryExpr::Apply { args, ty, .. } = node else {
			panic!("expected apply");
		};
		assert_eq!(ty, ValueType::String);
		assert_eq!(args[1], QueryExpr::literal(Scalar::Str("5".to_string())));
	}

	#[test]
	fn test_substring_keeps_numeric_positions() {
		let node = compile_str("substring(name,1,3)").unwrap();
		let QueryExpr::Apply { args, .. } = node else {
			panic!("expected apply");
		};
		assert_eq!(args[1], QueryExpr::literal(Scalar::Long(1)));
		assert_eq!(args[2], QueryExpr::literal(Scalar::Long(3)));
	}

	#[test]
	fn test_numeric_function_requires_numeric_argument() {
		let err = compile_str("abs(name)").unwrap_err();
		assert!(matches!(
			err,
			CompileError::Function(FunctionError::NumericArgumentRequired { .. })
		));
	}

	#[test]
	fn test_round_scale_must_be_a_literal() {
		let err = compile_str("round(price,price)").unwrap_err();
		assert!(matches!(
			err,
			CompileError::Function(FunctionError::ConstantRequired {
				function: "round",
				argument: 2,
			})
		));
		assert!(compile_str("round(price,2)").is_ok());
	}

	#[test]
	fn test_cast_target_must_be_string_literal() {
		let err = compile_str("cast(price,name)").unwrap_err();
		assert!(matches!(
			err,
			CompileError::Function(FunctionError::CastTargetNotLiteral)
		));
	}

	#[test]
	fn test_cast_target_must_be_known() {
		let err = compile_str("cast(price,'money')").unwrap_err();
		assert!(matches!(
			err,
			CompileError::Function(FunctionError::UnknownCastTarget { .. })
		));

		let node = compile_str("cast(price,'double')").unwrap();
		assert_eq!(node.result_type(), ResolvedType::Scalar(ValueType::Double));
	}

	#[test]
	fn test_year_requires_temporal_argument() {
		assert!(compile_str("year(created)").is_ok());
		let err = compile_str("year(name)").unwrap_err();
		assert!(matches!(
			err,
			CompileError::Function(FunctionError::TemporalArgumentRequired { .. })
		));
	}

	#[test]
	fn test_coalesce_takes_first_argument_type() {
		let node = compile_str("coalesce(price,0)").unwrap();
		assert_eq!(node.result_type(), ResolvedType::Scalar(ValueType::Decimal));
	}
}
