//! Introspection document model.
//!
//! The ORM toolchain describes a data model as a JSON document with three
//! sections: `datamodel` (models and their fields), `schema` (the output
//! object types and enums the query engine understands) and `mappings`
//! (root field names for every model operation). The types in this module
//! mirror that document; unknown keys are ignored so documents produced by
//! newer toolchains still parse.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{CoreError, Result};

/// Root of the introspection document.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntrospectionDocument {
    pub datamodel: Datamodel,
    pub schema: SchemaCatalog,
    pub mappings: Mappings,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Datamodel {
    #[serde(default)]
    pub models: Vec<ModelDescriptor>,
}

/// A model of the data model (one table or collection).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDescriptor {
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
    #[serde(default)]
    pub primary_key: Option<PrimaryKey>,
}

/// Composite primary key declared with `@@id`.
#[derive(Debug, Clone, Deserialize)]
pub struct PrimaryKey {
    #[serde(default)]
    pub name: Option<String>,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    #[default]
    Scalar,
    Object,
    Enum,
    Unsupported,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(default)]
    pub kind: FieldKind,
    #[serde(rename = "type", default)]
    pub type_name: String,
    #[serde(default)]
    pub is_list: bool,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub is_unique: bool,
    #[serde(default)]
    pub is_id: bool,
    #[serde(default)]
    pub is_updated_at: bool,
    #[serde(default)]
    pub has_default_value: bool,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub relation_name: Option<String>,
    #[serde(default)]
    pub relation_from_fields: Vec<String>,
    #[serde(default)]
    pub relation_to_fields: Vec<String>,
}

impl FieldDescriptor {
    /// Returns `true` if the field points at another model.
    #[must_use]
    pub fn is_relation(&self) -> bool {
        self.relation_name.is_some()
    }

    /// Name of the default-value function (`autoincrement`, `now`, `uuid`, ...), if any.
    #[must_use]
    pub fn default_function(&self) -> Option<&str> {
        self.default
            .as_ref()
            .and_then(|d| d.get("name"))
            .and_then(Value::as_str)
    }
}

impl ModelDescriptor {
    /// Looks up a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns the fields that identify a record of this model.
    ///
    /// With a composite primary key the fields follow the key's declared
    /// order; fields marked `isId` that are not part of it are appended in
    /// field order. Without a composite key this is every `isId` field in
    /// field order. An empty result means records of this model cannot be
    /// looked up again by key.
    #[must_use]
    pub fn identifying_fields(&self) -> Vec<&FieldDescriptor> {
        let mut seen = HashSet::new();
        let mut result = Vec::new();

        if let Some(pk) = &self.primary_key {
            for name in &pk.fields {
                if let Some(field) = self.field(name) {
                    if seen.insert(field.name.as_str()) {
                        result.push(field);
                    }
                }
            }
        }

        for field in self.fields.iter().filter(|f| f.is_id) {
            if seen.insert(field.name.as_str()) {
                result.push(field);
            }
        }

        result
    }

    /// Name of the compound unique input for a multi-field key.
    ///
    /// An explicitly named primary key wins; otherwise the key field names
    /// are joined with `_` (`leaderboardId_userId`).
    #[must_use]
    pub fn compound_key_name(&self, fields: &[&FieldDescriptor]) -> String {
        if let Some(name) = self.primary_key.as_ref().and_then(|pk| pk.name.as_deref()) {
            return name.to_string();
        }
        fields
            .iter()
            .map(|f| f.name.as_str())
            .collect::<Vec<_>>()
            .join("_")
    }

    /// Scalar and enum fields, in declaration order.
    pub fn scalar_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| !f.is_relation())
    }
}

/// Output types and enums known to the query engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaCatalog {
    pub output_object_types: TypeGroups<ObjectTypeDescriptor>,
    #[serde(default)]
    pub enum_types: TypeGroups<EnumTypeDescriptor>,
}

/// Types split by namespace: engine-internal (`prisma`) and user models (`model`).
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct TypeGroups<T> {
    #[serde(default)]
    pub prisma: Vec<T>,
    #[serde(default)]
    pub model: Vec<T>,
}

impl<T> Default for TypeGroups<T> {
    fn default() -> Self {
        Self {
            prisma: Vec::new(),
            model: Vec::new(),
        }
    }
}

impl<T> TypeGroups<T> {
    /// Iterates the engine-internal group first, then the model group.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.prisma.iter().chain(self.model.iter())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.prisma.len() + self.model.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectTypeDescriptor {
    pub name: String,
    pub fields: Vec<OutputFieldDescriptor>,
}

impl ObjectTypeDescriptor {
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&OutputFieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputFieldDescriptor {
    pub name: String,
    #[serde(default)]
    pub args: Vec<ArgumentDescriptor>,
    #[serde(default)]
    pub is_nullable: bool,
    pub output_type: OutputTypeRef,
}

/// Only the name of an argument matters; its input type is not modelled.
#[derive(Debug, Clone, Deserialize)]
pub struct ArgumentDescriptor {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputTypeRef {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub location: TypeLocation,
    #[serde(default)]
    pub is_list: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TypeLocation {
    Scalar,
    InputObjectTypes,
    OutputObjectTypes,
    EnumTypes,
    FieldRefTypes,
    #[default]
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnumTypeDescriptor {
    pub name: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mappings {
    pub model_operations: Vec<OperationMapping>,
    #[serde(default)]
    pub other_operations: OtherOperations,
}

/// Operations that do not belong to a model (raw SQL and friends).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OtherOperations {
    #[serde(default)]
    pub read: Vec<String>,
    #[serde(default)]
    pub write: Vec<String>,
}

impl OtherOperations {
    /// Read operations first, then write operations.
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.read.iter().chain(self.write.iter())
    }
}

/// Root field names for the operations of one model.
///
/// `operations` maps an operation id (`findMany`, `createOne`, ...) to the
/// root field name (`findManyUser`, `createOneUser`, ...), in document order.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "RawOperationMapping")]
pub struct OperationMapping {
    pub model: String,
    pub plural: Option<String>,
    pub operations: IndexMap<String, String>,
}

#[derive(Deserialize)]
struct RawOperationMapping {
    model: String,
    #[serde(default)]
    plural: Option<String>,
    #[serde(flatten)]
    rest: IndexMap<String, Value>,
}

impl From<RawOperationMapping> for OperationMapping {
    fn from(raw: RawOperationMapping) -> Self {
        // Some toolchain versions emit `null` for operations a connector lacks.
        let operations = raw
            .rest
            .into_iter()
            .filter_map(|(op, field)| match field {
                Value::String(field) => Some((op, field)),
                _ => None,
            })
            .collect();

        Self {
            model: raw.model,
            plural: raw.plural,
            operations,
        }
    }
}

impl IntrospectionDocument {
    /// Parses and validates a document from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        let doc: Self = serde_json::from_str(json)?;
        doc.validate()?;
        Ok(doc)
    }

    /// Parses and validates a document from JSON bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let doc: Self = serde_json::from_slice(bytes)?;
        doc.validate()?;
        Ok(doc)
    }

    /// Checks the cross-section invariants of the document.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidDocument` if two models share a name or if
    /// an operation mapping names a model that is not declared.
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for model in &self.datamodel.models {
            if !names.insert(model.name.as_str()) {
                return Err(CoreError::invalid_document(format!(
                    "model `{}` is declared more than once",
                    model.name
                )));
            }
        }

        for mapping in &self.mappings.model_operations {
            if !names.contains(mapping.model.as_str()) {
                return Err(CoreError::invalid_document(format!(
                    "operation mapping references undeclared model `{}`",
                    mapping.model
                )));
            }
        }

        Ok(())
    }

    /// Looks up a model by name.
    #[must_use]
    pub fn model(&self, name: &str) -> Option<&ModelDescriptor> {
        self.datamodel.models.iter().find(|m| m.name == name)
    }

    #[must_use]
    pub fn is_model_type(&self, name: &str) -> bool {
        self.model(name).is_some()
    }

    /// All output object types, engine-internal ones first.
    pub fn object_types(&self) -> impl Iterator<Item = &ObjectTypeDescriptor> {
        self.schema.output_object_types.iter()
    }

    /// Looks up an output object type by name.
    #[must_use]
    pub fn object_type(&self, name: &str) -> Option<&ObjectTypeDescriptor> {
        self.object_types().find(|t| t.name == name)
    }

    /// All enum types, engine-internal ones first.
    pub fn enum_types(&self) -> impl Iterator<Item = &EnumTypeDescriptor> {
        self.schema.enum_types.iter()
    }

    /// Flattens the model operation mappings into
    /// `(model, operation id, root field name)` triples.
    pub fn operations(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.mappings.model_operations.iter().flat_map(|mapping| {
            mapping
                .operations
                .iter()
                .map(move |(op, field)| (mapping.model.as_str(), op.as_str(), field.as_str()))
        })
    }
}
