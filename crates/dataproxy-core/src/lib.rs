//! # dataproxy-core
//!
//! Shared model of the ORM introspection document consumed by the data proxy.
//!
//! - [`document`] - serde model of the document and its invariants
//! - [`provider`] - ways of obtaining the document at startup
//! - [`naming`] - naming conventions shared with the CRUD client

pub mod document;
pub mod error;
pub mod naming;
pub mod provider;

pub use document::{
    ArgumentDescriptor, Datamodel, EnumTypeDescriptor, FieldDescriptor, FieldKind,
    IntrospectionDocument, Mappings, ModelDescriptor, ObjectTypeDescriptor, OperationMapping,
    OtherOperations, OutputFieldDescriptor, OutputTypeRef, PrimaryKey, SchemaCatalog,
    TypeGroups, TypeLocation,
};
pub use error::{CoreError, Result};
pub use naming::lower_first;
pub use provider::{CommandProvider, DynProvider, FileProvider, IntrospectionProvider};
