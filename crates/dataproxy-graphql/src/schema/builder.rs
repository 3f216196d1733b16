//! Proxy schema builder.
//!
//! `ProxySchemaBuilder` turns a [`TypeDefs`] and a matching [`Resolvers`]
//! into an executable `async_graphql::dynamic::Schema`. Root fields are
//! bound to the dispatch table, relation fields of model types to the
//! relation resolvers and every other field reads its parent record.

use async_graphql::dynamic::{
    Enum, EnumItem, Field, InputValue, Object, Scalar, Schema, SchemaBuilder, TypeRef,
};
use tracing::{debug, info};

use super::typedefs::{ANY_SCALAR, FieldDef, FieldTypeKind, ObjectDef, TypeDefs};
use crate::error::GraphQLError;
use crate::resolvers::{PassthroughResolver, RelationResolver, Resolvers, RootResolver};

pub const QUERY_TYPE: &str = "Query";
pub const MUTATION_TYPE: &str = "Mutation";

/// Configuration for the schema builder.
#[derive(Debug, Clone)]
pub struct SchemaBuilderConfig {
    /// Maximum query depth allowed.
    pub max_depth: usize,

    /// Maximum query complexity allowed.
    pub max_complexity: usize,

    /// Whether to enable introspection queries.
    pub introspection_enabled: bool,
}

impl Default for SchemaBuilderConfig {
    fn default() -> Self {
        Self {
            max_depth: 20,
            max_complexity: 5000,
            introspection_enabled: true,
        }
    }
}

/// Builds the executable proxy schema.
///
/// # Example
///
/// ```ignore
/// let type_defs = TypeDefs::from_document(&document)?;
/// let resolvers = Resolvers::new(&document, client)?;
/// let schema = ProxySchemaBuilder::new(type_defs, resolvers, SchemaBuilderConfig::default())
///     .build()?;
/// ```
pub struct ProxySchemaBuilder {
    type_defs: TypeDefs,
    resolvers: Resolvers,
    config: SchemaBuilderConfig,
}

impl ProxySchemaBuilder {
    /// Creates a new schema builder.
    #[must_use]
    pub fn new(type_defs: TypeDefs, resolvers: Resolvers, config: SchemaBuilderConfig) -> Self {
        Self {
            type_defs,
            resolvers,
            config,
        }
    }

    /// Builds the GraphQL schema.
    ///
    /// # Errors
    ///
    /// Returns `UnknownOperation` if a Query or Mutation field has no route,
    /// `SchemaGeneration` if the document declares no `Query` type, and
    /// `SchemaBuildFailed` if the executor rejects the schema.
    pub fn build(&self) -> Result<Schema, GraphQLError> {
        debug!("Starting GraphQL schema build");

        if self.type_defs.object(QUERY_TYPE).is_none() {
            return Err(GraphQLError::SchemaGeneration(format!(
                "the document declares no `{QUERY_TYPE}` type"
            )));
        }
        let mutation = self
            .type_defs
            .object(MUTATION_TYPE)
            .map(|_| MUTATION_TYPE);

        let mut builder = Schema::build(QUERY_TYPE, mutation, None);
        builder = self.register_scalars(builder);
        builder = self.register_enums(builder);

        for object in self.type_defs.objects() {
            let object = match object.name.as_str() {
                QUERY_TYPE | MUTATION_TYPE => self.build_root_type(object)?,
                _ => self.build_object_type(object),
            };
            builder = builder.register(object);
        }

        let routes_without_field: Vec<&str> = self
            .resolvers
            .dispatch()
            .iter()
            .map(|(field, _)| field)
            .filter(|field| !self.is_root_field(field))
            .collect();
        if !routes_without_field.is_empty() {
            debug!(fields = ?routes_without_field, "Mapped operations absent from the root types");
        }

        let mut builder = builder
            .limit_depth(self.config.max_depth)
            .limit_complexity(self.config.max_complexity);
        if !self.config.introspection_enabled {
            builder = builder.disable_introspection();
        }

        let schema = builder
            .finish()
            .map_err(|e| GraphQLError::SchemaBuildFailed(e.to_string()))?;

        info!(
            types = self.type_defs.objects().len(),
            enums = self.type_defs.enums().len(),
            root_fields = self.resolvers.dispatch().len(),
            "GraphQL schema built"
        );
        Ok(schema)
    }

    fn register_scalars(&self, mut builder: SchemaBuilder) -> SchemaBuilder {
        for scalar in self.type_defs.scalars() {
            builder = builder.register(Scalar::new(&scalar.name).description(&scalar.description));
        }
        builder
    }

    fn register_enums(&self, mut builder: SchemaBuilder) -> SchemaBuilder {
        for e in self.type_defs.enums() {
            let items = e.values.iter().map(EnumItem::new);
            builder = builder.register(Enum::new(&e.name).items(items));
        }
        builder
    }

    /// Query and Mutation: every field must have a route.
    fn build_root_type(&self, def: &ObjectDef) -> Result<Object, GraphQLError> {
        let mut object = Object::new(&def.name);
        for field in &def.fields {
            let route = self.resolvers.route(&field.name)?;
            let resolver =
                RootResolver::resolve(field.name.clone(), route, self.resolvers.client().clone());
            object = object.field(with_arguments(
                Field::new(&field.name, field.type_ref(), resolver),
                field,
            ));
        }
        Ok(object)
    }

    fn build_object_type(&self, def: &ObjectDef) -> Object {
        let mut object = Object::new(&def.name);
        for field in &def.fields {
            let relation = if def.is_model {
                self.resolvers.relation(&def.name, &field.name)
            } else {
                None
            };

            let built = match relation {
                Some(relations) => Field::new(
                    &field.name,
                    field.type_ref(),
                    RelationResolver::resolve(
                        field.name.clone(),
                        relations,
                        self.resolvers.client().clone(),
                    ),
                ),
                None => Field::new(
                    &field.name,
                    field.type_ref(),
                    PassthroughResolver::resolve(
                        field.name.clone(),
                        field.kind == FieldTypeKind::Enum,
                    ),
                ),
            };
            object = object.field(with_arguments(built, field));
        }
        object
    }

    fn is_root_field(&self, field: &str) -> bool {
        [QUERY_TYPE, MUTATION_TYPE].into_iter().any(|root| {
            self.type_defs
                .object(root)
                .is_some_and(|o| o.field(field).is_some())
        })
    }
}

fn with_arguments(mut field: Field, def: &FieldDef) -> Field {
    for arg in &def.args {
        field = field.argument(InputValue::new(arg, TypeRef::named(ANY_SCALAR)));
    }
    field
}
