//! The bundled suites.
//!
//! `articles` and `books` exercise an external CRUD service through the same
//! four scripts, parameterised by a [`Resource`]. `events` runs against a mock
//! server it starts for itself.

pub mod articles;
pub mod books;
pub mod events;

use serde_json::Value;
use tracing::info;

use crate::assertions::{equal_to, not_empty, size_greater_than};
use crate::error::{AssertionError, Error};
use crate::fixtures::FixtureLoader;
use crate::http_client::HttpClient;
use crate::schema::SchemaSettings;

/// A collection exposed by the service under test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resource {
    /// Collection path, e.g. `/articles`
    pub collection: &'static str,
    /// Lower-case entity name used in error messages
    pub entity: &'static str,
    /// Capitalised entity name used in success messages
    pub label: &'static str,
    /// Field carrying the id, in create responses and delete bodies
    pub id_field: &'static str,
    /// Fixture posted on create
    pub fixture: &'static str,
    /// An id the service does not know
    pub missing_id: &'static str,
}

impl Resource {
    /// Path of the created id in a create response
    pub fn created_id_path(&self) -> String {
        format!("post.{}", self.id_field)
    }

    /// Body of a delete request for `id`
    ///
    /// An all-digit id is written verbatim as a number literal, so leading
    /// zeros and ids beyond `u64` reach the service unchanged. Anything else
    /// is sent as a JSON string.
    pub fn delete_body(&self, id: &str) -> String {
        let field = Value::from(self.id_field);
        if !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) {
            format!("{{{field}:{id}}}")
        } else {
            format!("{{{field}:{}}}", Value::from(id))
        }
    }

    /// Message the service answers a successful delete with
    pub fn deleted_message(&self) -> String {
        format!("{} successfully deleted", self.label)
    }

    /// Error the service answers a delete of an unknown id with
    pub fn not_found_error(&self, id: &str) -> String {
        format!("Unable to find {} id: {id}", self.entity)
    }
}

/// Context shared by the cases of a service suite
#[derive(Debug, Clone)]
pub struct ServiceContext {
    pub client: HttpClient,
    pub fixtures: FixtureLoader,
}

impl ServiceContext {
    pub fn new(client: HttpClient, fixtures: FixtureLoader) -> Self {
        Self { client, fixtures }
    }
}

/// `GET` the collection and require at least one title
pub(crate) async fn list_has_titles(ctx: &ServiceContext, resource: &Resource) -> Result<(), Error> {
    ctx.client
        .get(resource.collection)
        .await?
        .then()
        .body("data.title", not_empty())?;
    Ok(())
}

/// `GET` the collection and require more than one title
pub(crate) async fn list_has_several_titles(
    ctx: &ServiceContext,
    resource: &Resource,
) -> Result<(), Error> {
    ctx.client
        .get(resource.collection)
        .await?
        .then()
        .body("data.title", size_greater_than(1))?;
    Ok(())
}

/// `GET` the collection and validate it against a schema fixture
pub(crate) async fn list_matches_schema(
    ctx: &ServiceContext,
    resource: &Resource,
    schema: &str,
) -> Result<(), Error> {
    let validator = ctx.fixtures.schema(schema, SchemaSettings::default()).await?;
    ctx.client
        .get(resource.collection)
        .await?
        .then()
        .matches_schema(&validator)?;
    Ok(())
}

/// Create an entity from its fixture, then delete it again
pub(crate) async fn create_then_delete(
    ctx: &ServiceContext,
    resource: &Resource,
) -> Result<(), Error> {
    let payload = ctx.fixtures.text(resource.fixture).await?;
    let created = ctx.client.post(resource.collection, payload).await?;

    let id_path = resource.created_id_path();
    let id = created.string_at(&id_path)?;
    if id.is_empty() {
        return Err(AssertionError::EmptyField { path: id_path }.into());
    }
    info!(entity = resource.entity, id = %id, "Created");

    ctx.client
        .delete(resource.collection, Some(resource.delete_body(&id)))
        .await?
        .then()
        .status(200)?
        .body("message", equal_to(resource.deleted_message()))?;
    Ok(())
}

/// Delete an id the service does not know and expect its error answer
pub(crate) async fn delete_unknown(ctx: &ServiceContext, resource: &Resource) -> Result<(), Error> {
    let id = resource.missing_id;
    ctx.client
        .delete(resource.collection, Some(resource.delete_body(id)))
        .await?
        .then()
        .status(500)?
        .body("error", equal_to(resource.not_found_error(id)))?;
    Ok(())
}
