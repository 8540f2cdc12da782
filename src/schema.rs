//! Entity attribute schema: static field types, dotted-path resolution and
//! the process-wide resolution memo

use std::{
	collections::HashMap,
	fmt,
	sync::{PoisonError, RwLock},
};

use thiserror::Error;

/// Static value type of an attribute or of a compiled expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueType {
	String,
	Text,
	Int,
	Long,
	Short,
	Byte,
	Float,
	Double,
	Decimal,
	BigInt,
	Bool,
	Date,
	Timestamp,
	/// Closed set of constant names; coercion matches them case-sensitively.
	Enum(Vec<String>),
}

impl ValueType {
	pub fn is_numeric(&self) -> bool {
		matches!(
			self,
			ValueType::Int
				| ValueType::Long
				| ValueType::Short
				| ValueType::Byte
				| ValueType::Float
				| ValueType::Double
				| ValueType::Decimal
				| ValueType::BigInt
		)
	}

	pub fn is_textual(&self) -> bool {
		matches!(self, ValueType::String | ValueType::Text)
	}

	/// Types with a total order usable by GT/GTE/LS/LSE.
	pub fn is_comparable(&self) -> bool {
		self.is_numeric() || self.is_textual() || matches!(self, ValueType::Date | ValueType::Timestamp)
	}
}

impl fmt::Display for ValueType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			ValueType::String => "string",
			ValueType::Text => "text",
			ValueType::Int => "int",
			ValueType::Long => "long",
			ValueType::Short => "short",
			ValueType::Byte => "byte",
			ValueType::Float => "float",
			ValueType::Double => "double",
			ValueType::Decimal => "decimal",
			ValueType::BigInt => "bigint",
			ValueType::Bool => "bool",
			ValueType::Date => "date",
			ValueType::Timestamp => "timestamp",
			ValueType::Enum(_) => "enum",
		};
		f.write_str(name)
	}
}

/// Resolved static type of a dotted field path: either a scalar value or a
/// collection with a declared element type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedType {
	Scalar(ValueType),
	Collection(ValueType),
}

impl ResolvedType {
	pub fn is_collection(&self) -> bool {
		matches!(self, ResolvedType::Collection(_))
	}

	/// The scalar type, or the element type for collections.
	pub fn value_type(&self) -> &ValueType {
		match self {
			ResolvedType::Scalar(ty) | ResolvedType::Collection(ty) => ty,
		}
	}
}

impl fmt::Display for ResolvedType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ResolvedType::Scalar(ty) => write!(f, "{}", ty),
			ResolvedType::Collection(ty) => write!(f, "list<{}>", ty),
		}
	}
}

/// Schema-level failures: unknown fields, paths crossing non-relations, and
/// operations incompatible with a field's resolved type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
	#[error("unknown field '{segment}' on entity '{entity}' in path '{path}'")]
	UnknownField {
		entity: String,
		segment: String,
		path: String,
	},
	#[error("field '{segment}' on entity '{entity}' is not a relation in path '{path}'")]
	NotARelation {
		entity: String,
		segment: String,
		path: String,
	},
	#[error("path '{path}' on entity '{entity}' ends at a relation, not a value")]
	NotAValue { entity: String, path: String },
	#[error("field '{field}' of type {ty} is not comparable, required by operation {operation}")]
	NotComparable {
		field: String,
		ty: String,
		operation: String,
	},
	#[error("field '{field}' is not a collection, required by {operation}")]
	NotACollection { field: String, operation: String },
	#[error("operation {operation} is not applicable to field '{field}': {detail}")]
	IncompatibleOperation {
		field: String,
		operation: String,
		detail: String,
	},
}

/// Resolves a dotted field path against an entity's attribute types. This is
/// the only contract the compiler core depends on; concrete entity models
/// (reflective or otherwise) stay behind it.
pub trait SchemaResolver {
	fn resolve(&self, entity: &str, path: &str) -> Result<ResolvedType, ResolutionError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FieldSpec {
	Value(ResolvedType),
	Relation { target: String },
}

/// Map-backed reference schema: entity name → field name → spec. Relations
/// point at another registered entity; dotted paths walk through them.
#[derive(Debug, Clone, Default)]
pub struct EntitySchema {
	entities: HashMap<String, HashMap<String, FieldSpec>>,
}

impl EntitySchema {
	pub fn new() -> Self {
		EntitySchema::default()
	}

	pub fn with_field(mut self, entity: &str, field: &str, ty: ResolvedType) -> Self {
		self.entities
			.entry(entity.to_string())
			.or_default()
			.insert(field.to_string(), FieldSpec::Value(ty));
		self
	}

	pub fn with_relation(mut self, entity: &str, field: &str, target: &str) -> Self {
		self.entities
			.entry(entity.to_string())
			.or_default()
			.insert(
				field.to_string(),
				FieldSpec::Relation {
					target: target.to_string(),
				},
			);
		self
	}

	/// Shorthand for a collection-valued field with the given element type.
	pub fn with_collection(self, entity: &str, field: &str, element: ValueType) -> Self {
		self.with_field(entity, field, ResolvedType::Collection(element))
	}
}

impl SchemaResolver for EntitySchema {
	fn resolve(&self, entity: &str, path: &str) -> Result<ResolvedType, ResolutionError> {
		let mut current = entity;
		let mut segments = path.split('.').peekable();

		while let Some(segment) = segments.next() {
			let spec = self
				.entities
				.get(current)
				.and_then(|fields| fields.get(segment))
				.ok_or_else(|| ResolutionError::UnknownField {
					entity: current.to_string(),
					segment: segment.to_string(),
					path: path.to_string(),
				})?;

			if segments.peek().is_none() {
				return match spec {
					FieldSpec::Value(ty) => Ok(ty.clone()),
					FieldSpec::Relation { .. } => Err(ResolutionError::NotAValue {
						entity: current.to_string(),
						path: path.to_string(),
					}),
				};
			}

			match spec {
				FieldSpec::Relation { target } => current = target,
				FieldSpec::Value(_) => {
					return Err(ResolutionError::NotARelation {
						entity: current.to_string(),
						segment: segment.to_string(),
						path: path.to_string(),
					})
				}
			}
		}

		// split('.') yields at least one segment, so the loop always returns.
		Err(ResolutionError::UnknownField {
			entity: entity.to_string(),
			segment: String::new(),
			path: path.to_string(),
		})
	}
}

/// Memoizing wrapper around any resolver. The cache is written at most once
/// per `(entity, path)` key under a compute-if-absent discipline; races on
/// first write recompute an equivalent value, so the map's own lock is the
/// only synchronization. Failures are never cached.
pub struct MemoResolver<R> {
	inner: R,
	cache: RwLock<HashMap<(String, String), ResolvedType>>,
}

impl<R> MemoResolver<R> {
	pub fn new(inner: R) -> Self {
		MemoResolver {
			inner,
			cache: RwLock::new(HashMap::new()),
		}
	}
}

impl<R: SchemaResolver> SchemaResolver for MemoResolver<R> {
	fn resolve(&self, entity: &str, path: &str) -> Result<ResolvedType, ResolutionError> {
		let key = (entity.to_string(), path.to_string());
		{
			let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
			if let Some(hit) = cache.get(&key) {
				tracing::trace!(entity, path, "field resolution memo hit");
				return Ok(hit.clone());
			}
		}

		let resolved = self.inner.resolve(entity, path)?;
		let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
		cache.entry(key).or_insert_with(|| resolved.clone());
		Ok(resolved)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::cell::Cell;

	fn sample_schema() -> EntitySchema {
		EntitySchema::new()
			.with_field("Order", "number", ResolvedType::Scalar(ValueType::String))
			.with_field("Order", "amount", ResolvedType::Scalar(ValueType::Decimal))
			.with_relation("Order", "customer", "Customer")
			.with_collection("Order", "tags", ValueType::String)
			.with_field("Customer", "name", ResolvedType::Scalar(ValueType::String))
			.with_relation("Customer", "address", "Address")
			.with_field("Address", "city", ResolvedType::Scalar(ValueType::String))
	}

	#[test]
	fn test_resolves_direct_field() {
		let schema = sample_schema();
		assert_eq!(
			schema.resolve("Order", "amount"),
			Ok(ResolvedType::Scalar(ValueType::Decimal))
		);
	}

	#[test]
	fn test_resolves_nested_relation_path() {
		let schema = sample_schema();
		assert_eq!(
			schema.resolve("Order", "customer.address.city"),
			Ok(ResolvedType::Scalar(ValueType::String))
		);
	}

	#[test]
	fn test_resolves_collection_field() {
		let schema = sample_schema();
		let resolved = schema.resolve("Order", "tags").unwrap();
		assert!(resolved.is_collection());
		assert_eq!(resolved.value_type(), &ValueType::String);
	}

	#[test]
	fn test_unknown_segment_names_owning_entity() {
		let schema = sample_schema();
		let err = schema.resolve("Order", "customer.phone").unwrap_err();
		assert_eq!(
			err,
			ResolutionError::UnknownField {
				entity: "Customer".to_string(),
				segment: "phone".to_string(),
				path: "customer.phone".to_string(),
			}
		);
	}

	#[test]
	fn test_path_through_scalar_is_rejected() {
		let schema = sample_schema();
		let err = schema.resolve("Order", "number.foo").unwrap_err();
		assert!(matches!(err, ResolutionError::NotARelation { .. }));
	}

	#[test]
	fn test_path_ending_at_relation_is_rejected() {
		let schema = sample_schema();
		let err = schema.resolve("Order", "customer").unwrap_err();
		assert!(matches!(err, ResolutionError::NotAValue { .. }));
	}

	struct CountingResolver {
		inner: EntitySchema,
		calls: Cell<usize>,
	}

	impl SchemaResolver for CountingResolver {
		fn resolve(&self, entity: &str, path: &str) -> Result<ResolvedType, ResolutionError> {
			self.calls.set(self.calls.get() + 1);
			self.inner.resolve(entity, path)
		}
	}

	#[test]
	fn test_memo_resolver_hits_cache_on_second_lookup() {
		let counting = CountingResolver {
			inner: sample_schema(),
			calls: Cell::new(0),
		};
		let memo = MemoResolver::new(counting);

		let first = memo.resolve("Order", "customer.address.city").unwrap();
		let second = memo.resolve("Order", "customer.address.city").unwrap();
		assert_eq!(first, second);
		assert_eq!(memo.inner.calls.get(), 1);
	}

	#[test]
	fn test_memo_resolver_does_not_cache_failures() {
		let counting = CountingResolver {
			inner: sample_schema(),
			calls: Cell::new(0),
		};
		let memo = MemoResolver::new(counting);

		assert!(memo.resolve("Order", "missing").is_err());
		assert!(memo.resolve("Order", "missing").is_err());
		assert_eq!(memo.inner.calls.get(), 2);
	}
}
