//! Entity field schemas served by `get_quickbooks_entity_schema`.
//!
//! The file maps entity names (`Bill`, `Customer`, ...) to their field schema. It is read on
//! every call so edits take effect without a restart.

use serde_json::{Map, Value};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EntitySchemaError {
    #[error("Error: Schema not found for entity '{entity}'. Available entities: {}", python_list(.available))]
    UnknownEntity {
        entity: String,
        available: Vec<String>,
    },

    #[error("Error: The schema definition file `{file}` was not found.")]
    MissingFile { file: String },

    #[error("An error occurred: {0}")]
    Other(String),
}

fn python_list(names: &[String]) -> String {
    let quoted: Vec<String> = names.iter().map(|n| format!("'{n}'")).collect();
    format!("[{}]", quoted.join(", "))
}

#[derive(Debug, Clone)]
pub struct EntitySchemaFile {
    path: PathBuf,
}

impl EntitySchemaFile {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Pretty-printed schema for `entity`.
    ///
    /// # Errors
    ///
    /// See [`EntitySchemaError`]; an entity whose schema is `null` or empty counts as unknown.
    pub async fn lookup(&self, entity: &str) -> Result<String, EntitySchemaError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(EntitySchemaError::MissingFile {
                    file: self.file_name(),
                });
            }
            Err(e) => return Err(EntitySchemaError::Other(e.to_string())),
        };

        let schemas: Map<String, Value> = serde_json::from_str(&content)
            .map_err(|e| EntitySchemaError::Other(e.to_string()))?;

        match schemas.get(entity) {
            Some(schema) if !is_empty_schema(schema) => serde_json::to_string_pretty(schema)
                .map_err(|e| EntitySchemaError::Other(e.to_string())),
            _ => Err(EntitySchemaError::UnknownEntity {
                entity: entity.to_string(),
                available: schemas.keys().cloned().collect(),
            }),
        }
    }

    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map_or_else(|| self.path.display().to_string(), |n| n.to_string_lossy().into_owned())
    }
}

fn is_empty_schema(schema: &Value) -> bool {
    match schema {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write_schemas(dir: &tempfile::TempDir, content: &str) -> EntitySchemaFile {
        let path = dir.path().join("quickbooks_entity_schemas.json");
        std::fs::write(&path, content).expect("write schemas");
        EntitySchemaFile::new(path)
    }

    #[tokio::test]
    async fn known_entity_is_pretty_printed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = write_schemas(
            &dir,
            &json!({ "Bill": { "Id": "string", "TotalAmt": "number" } }).to_string(),
        );

        let text = file.lookup("Bill").await.expect("schema");
        let parsed: Value = serde_json::from_str(&text).expect("json");
        assert_eq!(parsed, json!({ "Id": "string", "TotalAmt": "number" }));
        assert!(text.contains('\n'));
    }

    #[tokio::test]
    async fn unknown_entity_lists_available_names() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = write_schemas(
            &dir,
            r#"{"Bill": {"Id": "string"}, "Customer": {"Id": "string"}, "Empty": {}}"#,
        );

        let err = file.lookup("Invoice").await.expect_err("unknown");
        assert_eq!(
            err.to_string(),
            "Error: Schema not found for entity 'Invoice'. Available entities: ['Bill', 'Customer', 'Empty']"
        );
        assert!(matches!(
            file.lookup("Empty").await,
            Err(EntitySchemaError::UnknownEntity { .. })
        ));
    }

    #[tokio::test]
    async fn missing_file_names_the_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = EntitySchemaFile::new(dir.path().join("quickbooks_entity_schemas.json"));

        let err = file.lookup("Bill").await.expect_err("missing");
        assert_eq!(
            err.to_string(),
            "Error: The schema definition file `quickbooks_entity_schemas.json` was not found."
        );
    }

    #[tokio::test]
    async fn malformed_file_is_reported_generically() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = write_schemas(&dir, "{ not json");

        let err = file.lookup("Bill").await.expect_err("malformed");
        assert!(err.to_string().starts_with("An error occurred: "), "{err}");
    }
}
