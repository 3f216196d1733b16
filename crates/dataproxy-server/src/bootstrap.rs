//! Startup sequence: introspection document, client, schema.
//!
//! Every step is fatal on failure. The proxy has nothing to serve without
//! a schema, so errors are reported with context and the process exits.

use std::sync::Arc;

use anyhow::{Context, bail};
use async_graphql::dynamic::Schema;
use dataproxy_client::DynClient;
use dataproxy_core::{
    CommandProvider, DynProvider, FileProvider, IntrospectionDocument, IntrospectionProvider,
};
use dataproxy_db_memory::InMemoryClient;
use dataproxy_graphql::build_schema;
use tracing::info;

use crate::config::{AppConfig, ClientBackend, ClientConfig, IntrospectionConfig};

/// Picks the provider named by the `[introspection]` section.
pub fn provider(cfg: &IntrospectionConfig) -> anyhow::Result<DynProvider> {
    match (&cfg.path, cfg.command.as_deref()) {
        (Some(path), None) => Ok(Arc::new(FileProvider::new(path))),
        (None, Some([program, args @ ..])) => {
            let mut provider = CommandProvider::new(program).with_args(args.iter().cloned());
            if let Some(dir) = &cfg.current_dir {
                provider = provider.with_current_dir(dir);
            }
            Ok(Arc::new(provider))
        }
        _ => bail!("exactly one of introspection.path and introspection.command must be set"),
    }
}

pub async fn load_document(cfg: &IntrospectionConfig) -> anyhow::Result<IntrospectionDocument> {
    provider(cfg)?
        .load()
        .await
        .context("failed to load the introspection document")
}

/// Builds the configured CRUD client, seeding it when a seed file is set.
pub async fn build_client(
    cfg: &ClientConfig,
    document: &IntrospectionDocument,
) -> anyhow::Result<DynClient> {
    match cfg.backend {
        ClientBackend::Memory => {
            let client = InMemoryClient::new(document);
            if let Some(path) = &cfg.seed_path {
                let text = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("failed to read seed file {}", path.display()))?;
                let data: serde_json::Value = serde_json::from_str(&text)
                    .with_context(|| format!("seed file {} is not valid JSON", path.display()))?;
                let inserted = client.seed(&data).await.context("failed to seed the client")?;
                info!(path = %path.display(), records = inserted, "Seed data loaded");
            }
            Ok(Arc::new(client))
        }
    }
}

/// Runs the whole startup sequence and returns the executable schema.
pub async fn schema(cfg: &AppConfig) -> anyhow::Result<Schema> {
    let document = load_document(&cfg.introspection).await?;
    let client = build_client(&cfg.client, &document).await?;
    let schema = build_schema(&document, client, cfg.graphql.to_schema_builder_config())
        .context("failed to synthesize the GraphQL schema")?;
    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataproxy_client::{ClientOperation, CrudClient};
    use serde_json::json;
    use std::path::PathBuf;

    fn fixture(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("../../fixtures")
            .join(name)
    }

    fn file_source() -> IntrospectionConfig {
        IntrospectionConfig {
            path: Some(fixture("sample_dmmf.json")),
            ..Default::default()
        }
    }

    #[test]
    fn test_provider_requires_one_source() {
        assert!(provider(&file_source()).is_ok());
        assert!(provider(&IntrospectionConfig::default()).is_err());

        let empty_command = IntrospectionConfig {
            command: Some(Vec::new()),
            ..Default::default()
        };
        assert!(provider(&empty_command).is_err());
    }

    #[tokio::test]
    async fn test_missing_document_is_fatal() {
        let cfg = IntrospectionConfig {
            path: Some(fixture("does_not_exist.json")),
            ..Default::default()
        };
        let err = load_document(&cfg).await.unwrap_err();
        assert!(err.to_string().contains("introspection document"));
    }

    #[tokio::test]
    async fn test_seeded_client() {
        let document = load_document(&file_source()).await.unwrap();
        let cfg = ClientConfig {
            seed_path: Some(fixture("seed.json")),
            ..Default::default()
        };
        let client = build_client(&cfg, &document).await.unwrap();

        let users = client
            .execute("user", ClientOperation::Count, json!({}))
            .await
            .unwrap();
        assert_eq!(users, json!(3));
    }
}
