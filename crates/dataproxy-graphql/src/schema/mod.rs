//! Schema synthesis.
//!
//! - `typedefs`: the type system derived from the introspection document
//! - `builder`: binding of type definitions and resolvers into an
//!   executable schema

mod builder;
mod typedefs;

pub use builder::{MUTATION_TYPE, ProxySchemaBuilder, QUERY_TYPE, SchemaBuilderConfig};
pub use typedefs::{
    ANY_SCALAR, BUILTIN_SCALARS, CUSTOM_SCALARS, EnumDef, FieldDef, FieldTypeKind, ObjectDef,
    ScalarDef, TypeDefs,
};
