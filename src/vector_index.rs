//! Vector indexes backing retrieval-augmented generation.
//!
//! An index belongs to a profile (its `profile_name` attribute) and is
//! reconciled the same way profiles are; see [`crate::resource`].

use crate::attributes::{
    normalize_payload, serde_from_payload, serde_to_payload, AttributeContainer, FieldKind,
};
use crate::connection::{BlockingConnection, Connection};
use crate::error::{Error, ErrorContext, ResourceType};
use crate::gateway::{block_on, Params};
use crate::resource::{NamedResource, ResourceHandle, ResourceOptions, ResourceState};
use crate::sql;
use crate::Result;
use futures::executor::block_on_stream;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

/// Distance function of a vector index. Values the catalogue reports that
/// this crate does not know are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum VectorDistanceMetric {
    Euclidean,
    L2Squared,
    Cosine,
    Dot,
    Manhattan,
    Hamming,
    Other(String),
}

impl VectorDistanceMetric {
    pub fn as_str(&self) -> &str {
        match self {
            VectorDistanceMetric::Euclidean => "EUCLIDEAN",
            VectorDistanceMetric::L2Squared => "L2_SQUARED",
            VectorDistanceMetric::Cosine => "COSINE",
            VectorDistanceMetric::Dot => "DOT",
            VectorDistanceMetric::Manhattan => "MANHATTAN",
            VectorDistanceMetric::Hamming => "HAMMING",
            VectorDistanceMetric::Other(value) => value,
        }
    }
}

impl From<String> for VectorDistanceMetric {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "EUCLIDEAN" => VectorDistanceMetric::Euclidean,
            "L2_SQUARED" => VectorDistanceMetric::L2Squared,
            "COSINE" => VectorDistanceMetric::Cosine,
            "DOT" => VectorDistanceMetric::Dot,
            "MANHATTAN" => VectorDistanceMetric::Manhattan,
            "HAMMING" => VectorDistanceMetric::Hamming,
            _ => VectorDistanceMetric::Other(value),
        }
    }
}

impl From<VectorDistanceMetric> for String {
    fn from(metric: VectorDistanceMetric) -> Self {
        match metric {
            VectorDistanceMetric::Other(value) => value,
            known => known.as_str().to_string(),
        }
    }
}

/// Vector store behind an index; unknown stores are kept in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum VectorDbProvider {
    Chroma,
    Oracle,
    Pinecone,
    Qdrant,
    Other(String),
}

impl VectorDbProvider {
    pub fn as_str(&self) -> &str {
        match self {
            VectorDbProvider::Chroma => "chroma",
            VectorDbProvider::Oracle => "oracle",
            VectorDbProvider::Pinecone => "pinecone",
            VectorDbProvider::Qdrant => "qdrant",
            VectorDbProvider::Other(value) => value,
        }
    }
}

impl From<String> for VectorDbProvider {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "chroma" => VectorDbProvider::Chroma,
            "oracle" => VectorDbProvider::Oracle,
            "pinecone" => VectorDbProvider::Pinecone,
            "qdrant" => VectorDbProvider::Qdrant,
            _ => VectorDbProvider::Other(value),
        }
    }
}

impl From<VectorDbProvider> for String {
    fn from(provider: VectorDbProvider) -> Self {
        match provider {
            VectorDbProvider::Other(value) => value,
            known => known.as_str().to_string(),
        }
    }
}

/// Attributes of a vector index. `pipeline_name` is assigned by the service
/// and never written back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VectorIndexAttributes {
    pub chunk_size: Option<i64>,
    pub chunk_overlap: Option<i64>,
    pub location: Option<String>,
    pub match_limit: Option<i64>,
    pub object_storage_credential_name: Option<String>,
    pub profile_name: Option<String>,
    pub refresh_rate: Option<i64>,
    pub similarity_threshold: Option<f64>,
    pub vector_distance_metric: Option<VectorDistanceMetric>,
    pub vector_db_endpoint: Option<String>,
    pub vector_db_credential_name: Option<String>,
    pub vector_db_provider: Option<VectorDbProvider>,
    pub vector_dimension: Option<i64>,
    pub vector_table_name: Option<String>,
    pub pipeline_name: Option<String>,
}

const VECTOR_INDEX_FIELDS: &[(&str, FieldKind)] = &[
    ("chunk_size", FieldKind::Int),
    ("chunk_overlap", FieldKind::Int),
    ("location", FieldKind::Str),
    ("match_limit", FieldKind::Int),
    ("object_storage_credential_name", FieldKind::Str),
    ("profile_name", FieldKind::Str),
    ("refresh_rate", FieldKind::Int),
    ("similarity_threshold", FieldKind::Float),
    ("vector_distance_metric", FieldKind::Str),
    ("vector_db_endpoint", FieldKind::Str),
    ("vector_db_credential_name", FieldKind::Str),
    ("vector_db_provider", FieldKind::Str),
    ("vector_dimension", FieldKind::Int),
    ("vector_table_name", FieldKind::Str),
    ("pipeline_name", FieldKind::Str),
];

const READ_ONLY_FIELDS: &[&str] = &["pipeline_name"];

impl VectorIndexAttributes {
    /// The service's documented defaults: 1024/128 chunking, 5 matches,
    /// daily refresh, cosine distance, Oracle as vector store.
    pub fn with_service_defaults() -> Self {
        Self {
            chunk_size: Some(1024),
            chunk_overlap: Some(128),
            match_limit: Some(5),
            refresh_rate: Some(1440),
            similarity_threshold: Some(0.0),
            vector_distance_metric: Some(VectorDistanceMetric::Cosine),
            vector_db_provider: Some(VectorDbProvider::Oracle),
            ..Default::default()
        }
    }
}

impl AttributeContainer for VectorIndexAttributes {
    fn fields() -> &'static [(&'static str, FieldKind)] {
        VECTOR_INDEX_FIELDS
    }

    fn to_payload(&self, exclude_null: bool) -> Result<Map<String, Value>> {
        serde_to_payload(self, exclude_null)
    }

    fn from_payload(payload: Map<String, Value>) -> Result<Self> {
        serde_from_payload(normalize_payload::<Self>(payload)?)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct VectorIndexKind;

impl NamedResource for VectorIndexKind {
    type Attributes = VectorIndexAttributes;

    const TYPE: ResourceType = ResourceType::VectorIndex;
    const NAME_PARAM: &'static str = "index_name";
    const CREATE: &'static str = sql::CREATE_VECTOR_INDEX;
    const DROP: &'static str = sql::DROP_VECTOR_INDEX;
    const SET_ATTRIBUTE: &'static str = sql::UPDATE_VECTOR_INDEX;
    const SET_ATTRIBUTES: &'static str = sql::UPDATE_VECTOR_INDEX;
    const ATTRIBUTES_QUERY: &'static str = sql::GET_USER_VECTOR_INDEX_ATTRIBUTES;
    const LIST_QUERY: &'static str = sql::LIST_USER_VECTOR_INDEXES;
    const LIST_PATTERN_PARAM: &'static str = "index_name_pattern";

    fn write_payload(attributes: &VectorIndexAttributes) -> Result<Map<String, Value>> {
        let mut payload = attributes.to_payload(true)?;
        payload.retain(|name, _| !READ_ONLY_FIELDS.contains(&name.as_str()));
        Ok(payload)
    }

    fn check_writable(name: &str) -> Result<()> {
        if READ_ONLY_FIELDS.contains(&name.to_ascii_lowercase().as_str()) {
            return Err(Error::validation_with_context(
                "attribute is managed by the service",
                ErrorContext::new()
                    .with_field_path(name)
                    .with_source("vector_index.set_attribute"),
            ));
        }
        Ok(())
    }

    fn drop_params(name: &str, force: bool) -> Params {
        drop_params(name, force, true)
    }
}

fn drop_params(name: &str, force: bool, include_data: bool) -> Params {
    let mut params = Params::new();
    params.insert("index_name".into(), name.into());
    params.insert("include_data".into(), include_data.into());
    params.insert("force".into(), force.into());
    params
}

pub type VectorIndexOptions = ResourceOptions<VectorIndexAttributes>;

/// Asynchronous vector index handle.
#[derive(Debug, Clone)]
pub struct AsyncVectorIndex {
    handle: ResourceHandle<VectorIndexKind>,
}

impl AsyncVectorIndex {
    pub async fn open(conn: &Connection, options: VectorIndexOptions) -> Result<Self> {
        let handle = ResourceHandle::open(conn, options).await?;
        Ok(Self { handle })
    }

    pub async fn fetch(conn: &Connection, name: &str) -> Result<Self> {
        Self::open(conn, VectorIndexOptions::named(name)).await
    }

    pub async fn fetch_attributes(conn: &Connection, name: &str) -> Result<VectorIndexAttributes> {
        ResourceHandle::<VectorIndexKind>::fetch(conn, name).await
    }

    pub fn name(&self) -> Option<&str> {
        self.handle.name()
    }

    pub fn attributes(&self) -> Option<&VectorIndexAttributes> {
        self.handle.attributes()
    }

    pub fn description(&self) -> Option<&str> {
        self.handle.description()
    }

    pub fn state(&self) -> ResourceState {
        self.handle.state()
    }

    pub async fn get_attributes(&self) -> Result<VectorIndexAttributes> {
        self.handle.get_attributes().await
    }

    pub async fn create(&mut self, replace: bool, description: Option<String>) -> Result<()> {
        self.handle.create(replace, description).await
    }

    /// Drops the index together with its vector data.
    pub async fn drop(&mut self, force: bool) -> Result<()> {
        self.drop_with_data(force, true).await
    }

    pub async fn drop_with_data(&mut self, force: bool, include_data: bool) -> Result<()> {
        let params = drop_params(self.handle.require_name()?, force, include_data);
        self.handle.drop_with(params, force).await
    }

    pub async fn enable(&self) -> Result<()> {
        self.toggle(sql::ENABLE_VECTOR_INDEX).await
    }

    pub async fn disable(&self) -> Result<()> {
        self.toggle(sql::DISABLE_VECTOR_INDEX).await
    }

    async fn toggle(&self, procedure: &'static str) -> Result<()> {
        let name = self.handle.require_name()?;
        let mut params = Params::new();
        params.insert("index_name".into(), name.into());
        self.handle
            .connection()
            .gateway()
            .call_procedure(procedure, &params)
            .await?;
        info!(index = %name, procedure, "vector index toggled");
        Ok(())
    }

    pub async fn set_attribute(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.handle.set_attribute(name, value.into()).await
    }

    pub async fn set_attributes(&mut self, attributes: VectorIndexAttributes) -> Result<()> {
        self.handle.set_attributes(attributes).await
    }

    pub fn list(conn: &Connection, pattern: Option<&str>) -> BoxStream<'static, Result<Self>> {
        ResourceHandle::<VectorIndexKind>::list(conn, pattern)
            .map(|item| item.map(|handle| Self { handle }))
            .boxed()
    }

    /// Indexes whose `profile_name` attribute is `profile_name`.
    pub fn list_by_profile(
        conn: &Connection,
        profile_name: &str,
        pattern: Option<&str>,
    ) -> BoxStream<'static, Result<Self>> {
        let mut params = Params::new();
        params.insert("profile_name".into(), profile_name.into());
        params.insert(
            "index_name_pattern".into(),
            conn.config().list_pattern(pattern).into(),
        );
        ResourceHandle::<VectorIndexKind>::list_query(
            conn,
            sql::LIST_USER_VECTOR_INDEXES_BY_PROFILE,
            params,
        )
        .map(|item| item.map(|handle| Self { handle }))
        .boxed()
    }
}

/// Blocking vector index handle.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    inner: AsyncVectorIndex,
}

impl VectorIndex {
    pub(crate) fn from_async(inner: AsyncVectorIndex) -> Self {
        Self { inner }
    }

    pub fn open(conn: &BlockingConnection, options: VectorIndexOptions) -> Result<Self> {
        block_on(AsyncVectorIndex::open(conn.as_async(), options)).map(Self::from_async)
    }

    pub fn fetch(conn: &BlockingConnection, name: &str) -> Result<Self> {
        Self::open(conn, VectorIndexOptions::named(name))
    }

    pub fn fetch_attributes(conn: &BlockingConnection, name: &str) -> Result<VectorIndexAttributes> {
        block_on(AsyncVectorIndex::fetch_attributes(conn.as_async(), name))
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.name()
    }

    pub fn attributes(&self) -> Option<&VectorIndexAttributes> {
        self.inner.attributes()
    }

    pub fn description(&self) -> Option<&str> {
        self.inner.description()
    }

    pub fn state(&self) -> ResourceState {
        self.inner.state()
    }

    pub fn get_attributes(&self) -> Result<VectorIndexAttributes> {
        block_on(self.inner.get_attributes())
    }

    pub fn create(&mut self, replace: bool, description: Option<String>) -> Result<()> {
        block_on(self.inner.create(replace, description))
    }

    pub fn drop(&mut self, force: bool) -> Result<()> {
        block_on(self.inner.drop(force))
    }

    pub fn drop_with_data(&mut self, force: bool, include_data: bool) -> Result<()> {
        block_on(self.inner.drop_with_data(force, include_data))
    }

    pub fn enable(&self) -> Result<()> {
        block_on(self.inner.enable())
    }

    pub fn disable(&self) -> Result<()> {
        block_on(self.inner.disable())
    }

    pub fn set_attribute(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        block_on(self.inner.set_attribute(name, value))
    }

    pub fn set_attributes(&mut self, attributes: VectorIndexAttributes) -> Result<()> {
        block_on(self.inner.set_attributes(attributes))
    }

    pub fn list(
        conn: &BlockingConnection,
        pattern: Option<&str>,
    ) -> impl Iterator<Item = Result<Self>> {
        block_on_stream(AsyncVectorIndex::list(conn.as_async(), pattern))
            .map(|item| item.map(Self::from_async))
    }

    pub fn list_by_profile(
        conn: &BlockingConnection,
        profile_name: &str,
        pattern: Option<&str>,
    ) -> impl Iterator<Item = Result<Self>> {
        block_on_stream(AsyncVectorIndex::list_by_profile(
            conn.as_async(),
            profile_name,
            pattern,
        ))
        .map(|item| item.map(Self::from_async))
    }
}
