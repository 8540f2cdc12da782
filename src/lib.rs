//! Compiles dynamic filter conditions into typed, backend-neutral
//! predicates.
//!
//! A filter is an ordered list of `(property, operation, value)` conditions.
//! Each property is either a dotted field path, a path with a trailing
//! collection suffix such as `nums.size()`, or an embedded expression like
//! `lower(concat(firstName,' ',lastName))`. The pipeline tokenizes and
//! validates the expression, parses it into an AST, resolves field paths
//! against the entity schema, coerces the operand to the resolved type and
//! emits one predicate per condition; the assembler combines them
//! conjunctively.
//!
//! ```
//! use criteria::{
//!     assemble, eval_predicate, Filter,
//!     schema::{EntitySchema, ResolvedType, ValueType},
//! };
//! use serde_json::json;
//!
//! let schema = EntitySchema::new()
//!     .with_field("Order", "name", ResolvedType::Scalar(ValueType::String))
//!     .with_collection("Order", "nums", ValueType::Int);
//!
//! let filter = Filter::builder()
//!     .contains("name", "test")
//!     .gte("nums.size()", 2)
//!     .build();
//!
//! let predicate = assemble(&filter, "Order", &schema)?;
//! let entity = json!({ "name": "testing", "nums": [1, 2, 3] });
//! assert!(eval_predicate(&predicate, &entity)?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod coerce;
pub mod error;
pub mod expression;
pub mod filter;
pub mod predicate;
pub mod schema;

pub use coerce::{coerce, CoercionError, Scalar};
pub use error::CompileError;
pub use expression::{parse_expression, Expr, ExpressionError, Function};
pub use filter::{
	assemble, assemble_condition, decode_params, Filter, FilterCondition, FilterOperation, Is,
};
pub use predicate::{compile, eval_predicate, Predicate, QueryExpr};
pub use schema::{EntitySchema, MemoResolver, ResolutionError, ResolvedType, SchemaResolver, ValueType};
