//! Conversations: server-side chat histories identified by a service-issued id.

use crate::attributes::{
    normalize_payload, serde_from_payload, serde_to_payload, AttributeContainer, FieldKind,
};
use crate::connection::{BlockingConnection, Connection};
use crate::error::{Error, ErrorContext, ResourceType};
use crate::gateway::{block_on, Params, ReturnType};
use crate::resource::{drop_tolerant, ProcedureCall, ResourceState};
use crate::sql;
use crate::Result;
use async_stream::try_stream;
use futures::executor::block_on_stream;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

pub const DEFAULT_CONVERSATION_TITLE: &str = "New Conversation";
pub const DEFAULT_RETENTION_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationAttributes {
    pub title: Option<String>,
    pub description: Option<String>,
    pub retention_days: Option<i64>,
}

impl Default for ConversationAttributes {
    fn default() -> Self {
        Self {
            title: Some(DEFAULT_CONVERSATION_TITLE.to_string()),
            description: None,
            retention_days: Some(DEFAULT_RETENTION_DAYS),
        }
    }
}

impl ConversationAttributes {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }
}

const CONVERSATION_FIELDS: &[(&str, FieldKind)] = &[
    ("title", FieldKind::Str),
    ("description", FieldKind::Str),
    ("retention_days", FieldKind::Int),
];

impl AttributeContainer for ConversationAttributes {
    fn fields() -> &'static [(&'static str, FieldKind)] {
        CONVERSATION_FIELDS
    }

    fn to_payload(&self, exclude_null: bool) -> Result<Map<String, Value>> {
        serde_to_payload(self, exclude_null)
    }

    fn from_payload(payload: Map<String, Value>) -> Result<Self> {
        serde_from_payload(normalize_payload::<Self>(payload)?)
    }
}

fn id_params(id: &str) -> Params {
    let mut params = Params::new();
    params.insert("conversation_id".into(), id.into());
    params
}

async fn attributes_from_columns(
    columns: Vec<crate::gateway::RemoteValue>,
    chunk: usize,
) -> Result<ConversationAttributes> {
    let mut payload = Map::new();
    for (field, value) in CONVERSATION_FIELDS.iter().zip(columns) {
        payload.insert(field.0.to_string(), value.into_json(chunk).await?);
    }
    ConversationAttributes::from_payload(payload)
}

/// Asynchronous conversation handle.
#[derive(Debug, Clone)]
pub struct AsyncConversation {
    conn: Connection,
    id: Option<String>,
    attributes: ConversationAttributes,
    state: ResourceState,
}

impl AsyncConversation {
    /// A conversation that exists only locally until [`AsyncConversation::create`].
    pub fn new(conn: &Connection, attributes: ConversationAttributes) -> Self {
        Self {
            conn: conn.clone(),
            id: None,
            attributes,
            state: ResourceState::Declared,
        }
    }

    /// Loads an existing conversation by id.
    pub async fn open(conn: &Connection, id: &str) -> Result<Self> {
        let attributes = Self::fetch_attributes(conn, id).await?;
        Ok(Self {
            conn: conn.clone(),
            id: Some(id.to_string()),
            attributes,
            state: ResourceState::Reconciled,
        })
    }

    pub async fn fetch_attributes(conn: &Connection, id: &str) -> Result<ConversationAttributes> {
        crate::resource::validate_name(ResourceType::Conversation, id)?;
        let rows = conn
            .gateway()
            .execute_query(sql::GET_USER_CONVERSATION_ATTRIBUTES, &id_params(id))
            .await?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found(ResourceType::Conversation, id))?;
        attributes_from_columns(row.into_values(), conn.config().lob_chunk_size).await
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn attributes(&self) -> &ConversationAttributes {
        &self.attributes
    }

    pub fn state(&self) -> ResourceState {
        self.state
    }

    fn require_id(&self) -> Result<&str> {
        self.id.as_deref().ok_or_else(|| {
            Error::validation_with_context(
                "conversation has not been created",
                ErrorContext::new().with_field_path("conversation_id"),
            )
        })
    }

    /// Creates a new server-side conversation and records its id.
    pub async fn create(&mut self) -> Result<String> {
        let mut params = Params::new();
        params.insert("attributes".into(), self.attributes.to_json(true)?.into());
        let value = self
            .conn
            .gateway()
            .call_function(sql::CREATE_CONVERSATION, ReturnType::Varchar, &params)
            .await?;
        let id = value
            .into_text(self.conn.config().lob_chunk_size)
            .await?
            .ok_or_else(|| {
                Error::runtime_with_context(
                    "service returned no conversation id",
                    ErrorContext::new().with_source(sql::CREATE_CONVERSATION),
                )
            })?;
        info!(conversation_id = %id, "conversation created");
        self.id = Some(id.clone());
        self.state = ResourceState::Persisted;
        Ok(id)
    }

    pub async fn get_attributes(&self) -> Result<ConversationAttributes> {
        Self::fetch_attributes(&self.conn, self.require_id()?).await
    }

    pub async fn set_attributes(&mut self, attributes: ConversationAttributes) -> Result<()> {
        let mut params = id_params(self.require_id()?);
        params.insert("attributes".into(), attributes.to_json(true)?.into());
        self.conn
            .gateway()
            .call_procedure(sql::UPDATE_CONVERSATION, &params)
            .await?;
        self.attributes = attributes;
        Ok(())
    }

    pub async fn drop(&mut self, force: bool) -> Result<()> {
        let id = self.require_id()?.to_string();
        let mut params = id_params(&id);
        params.insert("force".into(), force.into());
        let call = ProcedureCall::new(sql::DROP_CONVERSATION, params);
        drop_tolerant(&self.conn, ResourceType::Conversation, &id, &call, force).await?;
        info!(conversation_id = %id, "conversation dropped");
        self.state = ResourceState::Deleted;
        Ok(())
    }

    /// Conversations whose title matches `pattern`.
    pub fn list(conn: &Connection, pattern: Option<&str>) -> BoxStream<'static, Result<Self>> {
        let mut params = Params::new();
        params.insert(
            "title_pattern".into(),
            conn.config().list_pattern(pattern).into(),
        );
        list_rows(conn.clone(), params).boxed()
    }
}

fn list_rows(
    conn: Connection,
    params: Params,
) -> impl Stream<Item = Result<AsyncConversation>> + Send + 'static {
    try_stream! {
        let chunk = conn.config().lob_chunk_size;
        let rows = conn
            .gateway()
            .execute_query(sql::LIST_USER_CONVERSATIONS, &params)
            .await?;
        for row in rows {
            let mut columns = row.into_values().into_iter();
            let id = match columns.next() {
                Some(value) => value.into_text(chunk).await?,
                None => None,
            };
            let id = id.ok_or_else(|| {
                Error::runtime_with_context(
                    "listing returned a null conversation id",
                    ErrorContext::new().with_source(sql::LIST_USER_CONVERSATIONS),
                )
            })?;
            let attributes = attributes_from_columns(columns.collect(), chunk).await?;
            yield AsyncConversation {
                conn: conn.clone(),
                id: Some(id),
                attributes,
                state: ResourceState::Persisted,
            };
        }
    }
}

/// Blocking conversation handle.
#[derive(Debug, Clone)]
pub struct Conversation {
    inner: AsyncConversation,
}

impl Conversation {
    pub fn new(conn: &BlockingConnection, attributes: ConversationAttributes) -> Self {
        Self {
            inner: AsyncConversation::new(conn.as_async(), attributes),
        }
    }

    pub fn open(conn: &BlockingConnection, id: &str) -> Result<Self> {
        block_on(AsyncConversation::open(conn.as_async(), id)).map(|inner| Self { inner })
    }

    pub fn fetch_attributes(conn: &BlockingConnection, id: &str) -> Result<ConversationAttributes> {
        block_on(AsyncConversation::fetch_attributes(conn.as_async(), id))
    }

    pub fn id(&self) -> Option<&str> {
        self.inner.id()
    }

    pub fn attributes(&self) -> &ConversationAttributes {
        self.inner.attributes()
    }

    pub fn state(&self) -> ResourceState {
        self.inner.state()
    }

    pub fn create(&mut self) -> Result<String> {
        block_on(self.inner.create())
    }

    pub fn get_attributes(&self) -> Result<ConversationAttributes> {
        block_on(self.inner.get_attributes())
    }

    pub fn set_attributes(&mut self, attributes: ConversationAttributes) -> Result<()> {
        block_on(self.inner.set_attributes(attributes))
    }

    pub fn drop(&mut self, force: bool) -> Result<()> {
        block_on(self.inner.drop(force))
    }

    pub fn list(
        conn: &BlockingConnection,
        pattern: Option<&str>,
    ) -> impl Iterator<Item = Result<Self>> {
        block_on_stream(AsyncConversation::list(conn.as_async(), pattern))
            .map(|item| item.map(|inner| Self { inner }))
    }
}
