//! Backend-neutral query expression and predicate nodes

use std::fmt;

use crate::{
	coerce::Scalar,
	expression::Function,
	schema::{ResolvedType, ValueType},
};

/// A compiled value expression: field access, typed literal, function
/// application, or collection size. Nothing here depends on a concrete
/// query-execution technology; any backend can lower these nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryExpr {
	Field {
		path: String,
		ty: ResolvedType,
	},
	Literal(Scalar),
	Apply {
		function: Function,
		args: Vec<QueryExpr>,
		ty: ValueType,
	},
	/// Element count of a collection-valued expression. Produced by the
	/// trailing `.size()`/`.length()` suffix, never by the expression
	/// grammar itself.
	Size(Box<QueryExpr>),
}

impl QueryExpr {
	pub fn literal(scalar: Scalar) -> Self {
		QueryExpr::Literal(scalar)
	}

	/// Static type of the value this expression produces.
	pub fn result_type(&self) -> ResolvedType {
		match self {
			QueryExpr::Field { ty, .. } => ty.clone(),
			QueryExpr::Literal(scalar) => ResolvedType::Scalar(literal_type(scalar)),
			QueryExpr::Apply { ty, .. } => ResolvedType::Scalar(ty.clone()),
			QueryExpr::Size(_) => ResolvedType::Scalar(ValueType::Int),
		}
	}
}

fn literal_type(scalar: &Scalar) -> ValueType {
	match scalar {
		Scalar::Null | Scalar::Str(_) | Scalar::Enum(_) => ValueType::String,
		Scalar::Bool(_) => ValueType::Bool,
		Scalar::Int(_) => ValueType::Int,
		Scalar::Long(_) => ValueType::Long,
		Scalar::Short(_) => ValueType::Short,
		Scalar::Byte(_) => ValueType::Byte,
		Scalar::Float(_) => ValueType::Float,
		Scalar::Double(_) | Scalar::Decimal(_) => ValueType::Double,
		Scalar::BigInt(_) => ValueType::BigInt,
		Scalar::Date(_) => ValueType::Date,
		Scalar::Timestamp(_) => ValueType::Timestamp,
	}
}

/// Ordering comparison carried by a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
	Gt,
	Gte,
	Ls,
	Lse,
}

impl fmt::Display for CompareOp {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let glyph = match self {
			CompareOp::Gt => ">",
			CompareOp::Gte => ">=",
			CompareOp::Ls => "<",
			CompareOp::Lse => "<=",
		};
		f.write_str(glyph)
	}
}

/// A backend-neutral boolean test over one entity. Conditions compile into
/// leaf variants; the assembler combines them with `And`.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
	And(Vec<Predicate>),
	Or(Vec<Predicate>),
	Not(Box<Predicate>),
	Equals { expr: QueryExpr, value: Scalar },
	EqualsIgnoreCase { expr: QueryExpr, value: String },
	Compare { expr: QueryExpr, op: CompareOp, value: Scalar },
	/// Case-sensitive pattern match, `%` as wildcard; a pattern without
	/// wildcards matches as a substring.
	Like { expr: QueryExpr, pattern: String },
	/// Case-insensitive substring match.
	ContainsText { expr: QueryExpr, needle: String },
	InSet { expr: QueryExpr, values: Vec<Scalar> },
	IsNull { expr: QueryExpr },
	/// Membership of a value in a collection-valued expression.
	MemberOf { expr: QueryExpr, value: Scalar },
	/// Emptiness of a collection-valued expression.
	Empty { expr: QueryExpr },
}

impl Predicate {
	/// Conjunction of sub-predicates. A single predicate stays unwrapped; an
	/// empty list is the always-true predicate.
	pub fn and_all(mut predicates: Vec<Predicate>) -> Predicate {
		if predicates.len() == 1 {
			predicates.remove(0)
		} else {
			Predicate::And(predicates)
		}
	}

	pub fn or(self, other: Predicate) -> Predicate {
		Predicate::Or(vec![self, other])
	}

	pub fn negate(self) -> Predicate {
		match self {
			Predicate::Not(inner) => *inner,
			other => Predicate::Not(Box::new(other)),
		}
	}
}
