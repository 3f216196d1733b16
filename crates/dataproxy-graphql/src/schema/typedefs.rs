//! Type definitions derived from the introspection document.
//!
//! [`TypeDefs`] is the complete, executor-independent description of the
//! proxy schema: custom scalars, one enum per enum type and one object per
//! output object type. It renders to IDL text through [`fmt::Display`] and is
//! turned into an executable schema by [`crate::ProxySchemaBuilder`].
//!
//! Every field argument is typed `Any`; input shapes are not reconstructed.
//! Nullability follows the document: a field is non-null iff it is not
//! `isNullable`.

use std::collections::HashSet;
use std::fmt;

use async_graphql::dynamic::TypeRef;
use dataproxy_core::{IntrospectionDocument, OutputFieldDescriptor};

use crate::error::GraphQLError;

/// Name of the permissive scalar used for every argument.
pub const ANY_SCALAR: &str = "Any";

/// Scalars the executor always provides.
pub const BUILTIN_SCALARS: [&str; 5] = ["String", "Int", "Float", "Boolean", "ID"];

/// Scalars declared by the proxy, with their descriptions.
pub const CUSTOM_SCALARS: [(&str, &str); 6] = [
    (ANY_SCALAR, "Untyped argument bag, passed to the client unchanged"),
    ("DateTime", "An ISO-8601 date-time string"),
    ("Json", "Arbitrary JSON value"),
    ("BigInt", "A 64-bit integer"),
    ("Decimal", "An arbitrary precision decimal"),
    ("Bytes", "Base64-encoded binary data"),
];

/// What a field's named type refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldTypeKind {
    Scalar,
    Enum,
    Object,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalarDef {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDef {
    pub name: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    /// Argument names, each typed `Any`.
    pub args: Vec<String>,
    pub type_name: String,
    pub kind: FieldTypeKind,
    pub is_list: bool,
    pub is_nullable: bool,
}

impl FieldDef {
    /// Returns the executor type reference for this field.
    #[must_use]
    pub fn type_ref(&self) -> TypeRef {
        match (self.is_list, self.is_nullable) {
            (false, true) => TypeRef::named(&self.type_name),
            (false, false) => TypeRef::named_nn(&self.type_name),
            (true, true) => TypeRef::named_list(&self.type_name),
            (true, false) => TypeRef::named_list_nn(&self.type_name),
        }
    }
}

impl fmt::Display for FieldDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.args.is_empty() {
            let args: Vec<String> = self
                .args
                .iter()
                .map(|arg| format!("{arg}: {ANY_SCALAR}"))
                .collect();
            write!(f, "({})", args.join(", "))?;
        }
        write!(f, ": {}", self.type_ref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectDef {
    pub name: String,
    pub fields: Vec<FieldDef>,
    /// `true` for types backing a data model (as opposed to engine types).
    pub is_model: bool,
}

impl ObjectDef {
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// The synthesized type system.
#[derive(Debug, Clone)]
pub struct TypeDefs {
    scalars: Vec<ScalarDef>,
    enums: Vec<EnumDef>,
    objects: Vec<ObjectDef>,
}

impl TypeDefs {
    /// Synthesizes the type system of `document`.
    ///
    /// # Errors
    ///
    /// Returns `GraphQLError::SchemaGeneration` when a type is declared twice
    /// or a field references a type that is not declared.
    pub fn from_document(document: &IntrospectionDocument) -> Result<Self, GraphQLError> {
        let scalars: Vec<ScalarDef> = CUSTOM_SCALARS
            .iter()
            .map(|(name, description)| ScalarDef {
                name: (*name).to_string(),
                description: (*description).to_string(),
            })
            .collect();

        let mut declared: HashSet<&str> = BUILTIN_SCALARS.into_iter().collect();
        declared.extend(CUSTOM_SCALARS.iter().map(|(name, _)| *name));

        let mut enum_names = HashSet::new();
        let mut enums = Vec::with_capacity(document.schema.enum_types.len());
        for enum_type in document.enum_types() {
            if !declared.insert(&enum_type.name) {
                return Err(duplicate_type(&enum_type.name));
            }
            enum_names.insert(enum_type.name.as_str());
            enums.push(EnumDef {
                name: enum_type.name.clone(),
                values: enum_type.values.clone(),
            });
        }

        let mut object_names = HashSet::new();
        for object in document.object_types() {
            if !declared.insert(&object.name) {
                return Err(duplicate_type(&object.name));
            }
            object_names.insert(object.name.as_str());
        }

        let mut objects = Vec::with_capacity(document.schema.output_object_types.len());
        for object in document.object_types() {
            let fields = object
                .fields
                .iter()
                .map(|field| {
                    let kind = if object_names.contains(field.output_type.type_name.as_str()) {
                        FieldTypeKind::Object
                    } else if enum_names.contains(field.output_type.type_name.as_str()) {
                        FieldTypeKind::Enum
                    } else if declared.contains(field.output_type.type_name.as_str()) {
                        FieldTypeKind::Scalar
                    } else {
                        return Err(GraphQLError::SchemaGeneration(format!(
                            "field `{}.{}` references undeclared type `{}`",
                            object.name, field.name, field.output_type.type_name
                        )));
                    };
                    Ok(field_def(field, kind))
                })
                .collect::<Result<Vec<_>, _>>()?;

            if fields.is_empty() {
                return Err(GraphQLError::SchemaGeneration(format!(
                    "type `{}` declares no fields",
                    object.name
                )));
            }

            objects.push(ObjectDef {
                name: object.name.clone(),
                fields,
                is_model: document.is_model_type(&object.name),
            });
        }

        Ok(Self {
            scalars,
            enums,
            objects,
        })
    }

    pub fn scalars(&self) -> &[ScalarDef] {
        &self.scalars
    }

    pub fn enums(&self) -> &[EnumDef] {
        &self.enums
    }

    pub fn objects(&self) -> &[ObjectDef] {
        &self.objects
    }

    #[must_use]
    pub fn object(&self, name: &str) -> Option<&ObjectDef> {
        self.objects.iter().find(|o| o.name == name)
    }

    /// Renders the type system as IDL text.
    #[must_use]
    pub fn sdl(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TypeDefs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for scalar in &self.scalars {
            writeln!(f, "scalar {}", scalar.name)?;
        }

        for e in &self.enums {
            writeln!(f)?;
            writeln!(f, "enum {} {{", e.name)?;
            for value in &e.values {
                writeln!(f, "  {value}")?;
            }
            writeln!(f, "}}")?;
        }

        for object in &self.objects {
            writeln!(f)?;
            writeln!(f, "type {} {{", object.name)?;
            for field in &object.fields {
                writeln!(f, "  {field}")?;
            }
            writeln!(f, "}}")?;
        }
        Ok(())
    }
}

fn field_def(field: &OutputFieldDescriptor, kind: FieldTypeKind) -> FieldDef {
    FieldDef {
        name: field.name.clone(),
        args: field.args.iter().map(|a| a.name.clone()).collect(),
        type_name: field.output_type.type_name.clone(),
        kind,
        is_list: field.output_type.is_list,
        is_nullable: field.is_nullable,
    }
}

fn duplicate_type(name: &str) -> GraphQLError {
    GraphQLError::SchemaGeneration(format!("type `{name}` is declared more than once"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document(value: serde_json::Value) -> IntrospectionDocument {
        serde_json::from_value(value).unwrap()
    }

    fn minimal(query_fields: serde_json::Value) -> IntrospectionDocument {
        document(json!({
            "datamodel": { "models": [] },
            "schema": {
                "outputObjectTypes": {
                    "prisma": [ { "name": "Query", "fields": query_fields } ],
                    "model": []
                },
                "enumTypes": {
                    "prisma": [ { "name": "SortOrder", "values": ["asc", "desc"] } ]
                }
            },
            "mappings": { "modelOperations": [] }
        }))
    }

    #[test]
    fn test_field_rendering() {
        let doc = minimal(json!([
            {
                "name": "ping",
                "args": [],
                "isNullable": false,
                "outputType": { "type": "String", "location": "scalar", "isList": false }
            },
            {
                "name": "orders",
                "args": [ { "name": "where" }, { "name": "take" } ],
                "isNullable": true,
                "outputType": { "type": "SortOrder", "location": "enumTypes", "isList": true }
            }
        ]));

        let defs = TypeDefs::from_document(&doc).unwrap();
        let query = defs.object("Query").unwrap();
        assert_eq!(query.fields[0].to_string(), "ping: String!");
        assert_eq!(query.fields[1].to_string(), "orders(where: Any, take: Any): [SortOrder]");
        assert_eq!(query.fields[1].kind, FieldTypeKind::Enum);
        assert!(!query.is_model);
    }

    #[test]
    fn test_sdl_layout() {
        let doc = minimal(json!([
            {
                "name": "ping",
                "args": [],
                "isNullable": true,
                "outputType": { "type": "Json", "location": "scalar", "isList": false }
            }
        ]));

        let sdl = TypeDefs::from_document(&doc).unwrap().sdl();
        assert!(sdl.starts_with("scalar Any\nscalar DateTime\nscalar Json\nscalar BigInt\n"));
        assert!(sdl.contains("enum SortOrder {\n  asc\n  desc\n}\n"));
        assert!(sdl.contains("type Query {\n  ping: Json\n}\n"));
    }

    #[test]
    fn test_undeclared_type_is_rejected() {
        let doc = minimal(json!([
            {
                "name": "broken",
                "args": [],
                "isNullable": true,
                "outputType": { "type": "Missing", "location": "outputObjectTypes", "isList": false }
            }
        ]));

        let err = TypeDefs::from_document(&doc).unwrap_err();
        assert!(matches!(err, GraphQLError::SchemaGeneration(_)));
        assert!(err.to_string().contains("`Query.broken`"));
    }

    #[test]
    fn test_duplicate_type_is_rejected() {
        let doc = document(json!({
            "datamodel": { "models": [] },
            "schema": {
                "outputObjectTypes": {
                    "prisma": [],
                    "model": []
                },
                "enumTypes": {
                    "prisma": [ { "name": "Json", "values": ["a"] } ]
                }
            },
            "mappings": { "modelOperations": [] }
        }));

        let err = TypeDefs::from_document(&doc).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Schema generation failed: type `Json` is declared more than once"
        );
    }
}
