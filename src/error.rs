//! Crate-level error sum: one variant per failure class of the pipeline

use thiserror::Error;

use crate::{
	coerce::CoercionError,
	expression::{ExpressionError, ParseError, ValidationReport},
	predicate::compile::FunctionError,
	schema::ResolutionError,
};

/// Every way compiling a filter can fail. Each variant carries only the
/// fields relevant to its failure class; all of them are deterministic input
/// errors, never transient faults, so callers should reject the request
/// rather than retry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
	/// Aggregated structural defects from the validator.
	#[error("{0}")]
	Validation(ValidationReport),
	#[error(transparent)]
	Parse(#[from] ParseError),
	#[error(transparent)]
	Resolution(#[from] ResolutionError),
	#[error(transparent)]
	Function(#[from] FunctionError),
	#[error(transparent)]
	Coercion(#[from] CoercionError),
}

impl From<ExpressionError> for CompileError {
	fn from(err: ExpressionError) -> Self {
		match err {
			ExpressionError::Validation(report) => CompileError::Validation(report),
			ExpressionError::Parse(err) => CompileError::Parse(err),
		}
	}
}
