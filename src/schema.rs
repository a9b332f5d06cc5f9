//! JSON schema conformance checks for response bodies.

use std::fmt;

use jsonschema::{Draft, Validator};
use serde_json::Value;
use tracing::debug;

use crate::error::{AssertionError, Error, SchemaViolation};

/// Schema draft the validator applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchemaDraft {
    /// Taken from the schema's `$schema` keyword, latest draft otherwise
    #[default]
    Auto,
    Draft4,
    Draft6,
    Draft7,
    Draft201909,
    Draft202012,
}

impl SchemaDraft {
    fn as_draft(self) -> Option<Draft> {
        match self {
            SchemaDraft::Auto => None,
            SchemaDraft::Draft4 => Some(Draft::Draft4),
            SchemaDraft::Draft6 => Some(Draft::Draft6),
            SchemaDraft::Draft7 => Some(Draft::Draft7),
            SchemaDraft::Draft201909 => Some(Draft::Draft201909),
            SchemaDraft::Draft202012 => Some(Draft::Draft202012),
        }
    }

    /// Validate `schema` against the meta-schema of this draft
    ///
    /// `Auto` picks the meta-schema from `$schema`, falling back to the latest draft.
    fn check_meta(self, schema: &Value) -> Result<(), String> {
        let result = match self {
            SchemaDraft::Auto => jsonschema::meta::validate(schema),
            SchemaDraft::Draft4 => jsonschema::draft4::meta::validate(schema),
            SchemaDraft::Draft6 => jsonschema::draft6::meta::validate(schema),
            SchemaDraft::Draft7 => jsonschema::draft7::meta::validate(schema),
            SchemaDraft::Draft201909 => jsonschema::draft201909::meta::validate(schema),
            SchemaDraft::Draft202012 => jsonschema::draft202012::meta::validate(schema),
        };
        result.map_err(|e| e.to_string())
    }
}

impl fmt::Display for SchemaDraft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SchemaDraft::Auto => "auto",
            SchemaDraft::Draft4 => "draft-04",
            SchemaDraft::Draft6 => "draft-06",
            SchemaDraft::Draft7 => "draft-07",
            SchemaDraft::Draft201909 => "2019-09",
            SchemaDraft::Draft202012 => "2020-12",
        };
        f.write_str(name)
    }
}

/// How a schema is compiled and applied
///
/// In checked mode the schema itself is first validated against its
/// meta-schema and `format` keywords are asserted. Lenient mode skips both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaSettings {
    pub draft: SchemaDraft,
    pub checked_validation: bool,
}

impl Default for SchemaSettings {
    fn default() -> Self {
        Self {
            draft: SchemaDraft::Auto,
            checked_validation: true,
        }
    }
}

impl SchemaSettings {
    pub fn with_draft(mut self, draft: SchemaDraft) -> Self {
        self.draft = draft;
        self
    }

    pub fn with_checked_validation(mut self, checked: bool) -> Self {
        self.checked_validation = checked;
        self
    }
}

/// A compiled schema document
pub struct SchemaValidator {
    name: String,
    settings: SchemaSettings,
    validator: Validator,
}

impl fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaValidator")
            .field("name", &self.name)
            .field("settings", &self.settings)
            .finish()
    }
}

impl SchemaValidator {
    /// Compile `schema`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] if the document is not a usable schema.
    pub fn new(
        name: impl Into<String>,
        schema: &Value,
        settings: SchemaSettings,
    ) -> Result<Self, Error> {
        let name = name.into();
        let checked = settings.checked_validation;

        if checked {
            settings.draft.check_meta(schema).map_err(|e| {
                Error::Schema(format!("'{name}' is not a valid JSON schema: {e}"))
            })?;
        }

        let compiled = match settings.draft.as_draft() {
            Some(draft) => jsonschema::options()
                .with_draft(draft)
                .should_validate_formats(checked)
                .build(schema),
            None => jsonschema::options()
                .should_validate_formats(checked)
                .build(schema),
        };
        let validator =
            compiled.map_err(|e| Error::Schema(format!("cannot compile '{name}': {e}")))?;

        debug!(schema = %name, draft = %settings.draft, checked, "Compiled schema");
        Ok(Self {
            name,
            settings,
            validator,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> SchemaSettings {
        self.settings
    }

    /// Every rule `instance` violates, empty when it conforms
    pub fn violations(&self, instance: &Value) -> Vec<SchemaViolation> {
        self.validator
            .iter_errors(instance)
            .map(|error| SchemaViolation {
                instance_path: error.instance_path.to_string(),
                schema_path: error.schema_path.to_string(),
                message: error.to_string(),
            })
            .collect()
    }

    /// Check `instance` against the schema
    pub fn validate(&self, instance: &Value) -> Result<(), AssertionError> {
        let violations = self.violations(instance);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(AssertionError::SchemaViolation {
                schema: self.name.clone(),
                violations,
            })
        }
    }
}
