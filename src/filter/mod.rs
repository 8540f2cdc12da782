//! Filter surface: conditions, request-parameter decoding and assembly into
//! predicates

pub mod assemble;
pub mod condition;
pub mod params;

pub use assemble::{assemble, assemble_condition};
pub use condition::{
	split_trailing, Filter, FilterBuilder, FilterCondition, FilterOperation, Is, TrailingFunction,
};
pub use params::{decode_param, decode_params};
