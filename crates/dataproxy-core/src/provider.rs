//! Introspection providers.
//!
//! A provider produces the introspection document once at startup. Any
//! failure here is fatal: the proxy cannot synthesize a schema without it.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::document::IntrospectionDocument;
use crate::error::{CoreError, Result};

/// Source of the introspection document.
#[async_trait]
pub trait IntrospectionProvider: Send + Sync {
    /// Loads and validates the document.
    async fn load(&self) -> Result<IntrospectionDocument>;
}

pub type DynProvider = Arc<dyn IntrospectionProvider>;

/// Reads a JSON dump of the document from disk.
#[derive(Debug, Clone)]
pub struct FileProvider {
    path: PathBuf,
}

impl FileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl IntrospectionProvider for FileProvider {
    async fn load(&self) -> Result<IntrospectionDocument> {
        debug!(path = %self.path.display(), "Reading introspection document");
        let bytes = tokio::fs::read(&self.path).await?;
        let doc = IntrospectionDocument::from_slice(&bytes)?;
        info!(
            path = %self.path.display(),
            models = doc.datamodel.models.len(),
            "Introspection document loaded"
        );
        Ok(doc)
    }
}

/// Runs the ORM toolchain and parses the document from its standard output.
///
/// Typically a small script that feeds the schema file to the toolchain's
/// document generator and prints the result as JSON.
#[derive(Debug, Clone)]
pub struct CommandProvider {
    program: String,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
}

impl CommandProvider {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
        }
    }

    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }
}

#[async_trait]
impl IntrospectionProvider for CommandProvider {
    async fn load(&self) -> Result<IntrospectionDocument> {
        debug!(program = %self.program, args = ?self.args, "Running introspection command");

        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }

        let output = command.output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CoreError::provider(format!(
                "`{}` exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let doc = IntrospectionDocument::from_slice(&output.stdout)?;
        info!(
            program = %self.program,
            models = doc.datamodel.models.len(),
            "Introspection document loaded"
        );
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const DOC: &str = r#"{
        "datamodel": { "models": [
            { "name": "User", "fields": [{ "name": "id", "kind": "scalar", "type": "Int", "isId": true }] }
        ] },
        "schema": { "outputObjectTypes": { "prisma": [], "model": [] } },
        "mappings": { "modelOperations": [{ "model": "User", "findMany": "findManyUser" }] }
    }"#;

    #[tokio::test]
    async fn test_file_provider_loads_document() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(DOC.as_bytes()).unwrap();

        let doc = FileProvider::new(file.path()).load().await.unwrap();
        assert_eq!(doc.datamodel.models[0].name, "User");
    }

    #[tokio::test]
    async fn test_file_provider_missing_file() {
        let result = FileProvider::new("/nonexistent/dmmf.json").load().await;
        assert!(matches!(result, Err(CoreError::Io(_))));
    }

    #[tokio::test]
    async fn test_file_provider_rejects_malformed_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();

        let result = FileProvider::new(file.path()).load().await;
        assert!(matches!(result, Err(CoreError::Parse(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_provider_reads_stdout() {
        let provider = CommandProvider::new("printf").with_args(["%s", DOC]);
        let doc = provider.load().await.unwrap();
        assert_eq!(doc.mappings.model_operations.len(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_provider_failure_is_reported() {
        let provider = CommandProvider::new("false");
        let result = provider.load().await;
        assert!(matches!(result, Err(CoreError::Provider(_))));
    }
}
