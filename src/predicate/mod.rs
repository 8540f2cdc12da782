//! Backend-neutral predicate layer: query-expression IR, the AST compiler
//! and the reference in-memory evaluation backend

pub mod compile;
pub mod eval;
pub mod query;

pub use compile::{compile, FunctionError};
pub use eval::{eval_expr, eval_predicate, EvalError, EvalValue};
pub use query::{CompareOp, Predicate, QueryExpr};
