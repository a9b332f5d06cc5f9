//! Loading of on-disk fixture files (request bodies and schema documents).

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::error::Error;
use crate::schema::{SchemaSettings, SchemaValidator};

/// Directory the bundled fixtures live in
pub const DEFAULT_FIXTURES_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures");

/// Reads fixtures from a directory, fresh on every call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureLoader {
    root: PathBuf,
}

impl Default for FixtureLoader {
    fn default() -> Self {
        Self::new(DEFAULT_FIXTURES_DIR)
    }
}

impl FixtureLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a fixture; names may not leave the fixture directory
    pub fn path(&self, name: &str) -> Result<PathBuf, Error> {
        let relative = Path::new(name);
        let escapes = relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir));
        if name.is_empty() || escapes {
            return Err(Error::Fixture {
                name: name.to_string(),
                reason: "fixture names must be relative to the fixture directory".to_string(),
            });
        }
        Ok(self.root.join(relative))
    }

    /// Raw text of a fixture
    pub async fn text(&self, name: &str) -> Result<String, Error> {
        let path = self.path(name)?;
        debug!(fixture = name, path = %path.display(), "Loading fixture");
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| Error::Fixture {
                name: name.to_string(),
                reason: format!("cannot read {}: {e}", path.display()),
            })
    }

    /// Fixture parsed as JSON
    pub async fn json(&self, name: &str) -> Result<Value, Error> {
        let text = self.text(name).await?;
        serde_json::from_str(&text).map_err(|e| Error::Fixture {
            name: name.to_string(),
            reason: format!("invalid JSON: {e}"),
        })
    }

    /// Fixture compiled as a JSON schema
    pub async fn schema(
        &self,
        name: &str,
        settings: SchemaSettings,
    ) -> Result<SchemaValidator, Error> {
        let document = self.json(name).await?;
        SchemaValidator::new(name, &document, settings)
    }
}
