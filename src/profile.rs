//! AI 配置文件：提供方设置、生成动作与派生资源。
//!
//! AI profiles.
//!
//! A profile binds a provider, credentials and generation settings under one
//! name. Everything else in the crate (generation, pipelines, vector indexes,
//! conversations, synthetic data) is issued on behalf of a profile.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`ProfileAttributes`] | Generic profile fields plus the nested [`ProviderAttributes`] |
//! | [`AsyncProfile`] | Asynchronous proxy |
//! | [`Profile`] | Blocking proxy over the same logic |
//!
//! ## Example
//!
//! ```rust,no_run
//! use select_ai_rust::prelude::*;
//!
//! # async fn demo(conn: Connection) -> select_ai_rust::Result<()> {
//! let attributes = ProfileAttributes {
//!     credential_name: Some("OCI_CRED".into()),
//!     provider: Some(ProviderAttributes::new(Provider::Oci)),
//!     ..Default::default()
//! };
//! let profile = AsyncProfile::open(
//!     &conn,
//!     ProfileOptions::named("OCI_AI").with_attributes(attributes).replace(true),
//! )
//! .await?;
//! let sql = profile.show_sql("How many customers are in each region?").await?;
//! # let _ = sql;
//! # Ok(())
//! # }
//! ```

use crate::action::Action;
use crate::attributes::{
    coerce, normalize_payload, serde_from_payload, serde_to_payload, unknown_field,
    AttributeContainer, FieldKind,
};
use crate::batch::{
    generate_params, PipelineExecutor, PipelineExecutorConfig, PipelineRequest, PipelineResults,
};
use crate::connection::{BlockingConnection, Connection};
use crate::conversation::{AsyncConversation, ConversationAttributes};
use crate::error::{Error, ErrorContext, ResourceType};
use crate::gateway::{block_on, Params, ReturnType};
use crate::provider::{is_provider_field, split_fields, ProviderAttributes, ProviderVariant};
use crate::resource::{NamedResource, ResourceHandle, ResourceOptions, ResourceState};
use crate::sql;
use crate::synthetic_data::SyntheticDataAttributes;
use crate::vector_index::{AsyncVectorIndex, VectorIndex, VectorIndexAttributes, VectorIndexOptions};
use crate::Result;
use futures::executor::block_on_stream;
use futures::stream::BoxStream;
use futures::StreamExt;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Instant;
use tracing::{debug, info};

/// Profile settings. Provider fields live in [`ProviderAttributes`] and are
/// flattened into the same payload on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileAttributes {
    pub comments: Option<bool>,
    pub conversation: Option<String>,
    pub credential_name: Option<String>,
    pub max_tokens: Option<i64>,
    pub object_list: Option<Vec<Map<String, Value>>>,
    pub stop_tokens: Option<String>,
    pub temperature: Option<f64>,
    pub vector_index_name: Option<String>,
    pub annotations: Option<String>,
    pub constraints: Option<String>,
    pub case_sensitive_values: Option<bool>,
    pub object_list_mode: Option<String>,
    pub enforce_object_list: Option<bool>,
    pub enable_sources: Option<bool>,
    pub enable_source_offsets: Option<bool>,
    pub seed: Option<String>,
    pub streaming: Option<String>,
    #[serde(skip)]
    pub provider: Option<ProviderAttributes>,
}

const GENERIC_PROFILE_FIELDS: &[(&str, FieldKind)] = &[
    ("comments", FieldKind::Bool),
    ("conversation", FieldKind::Str),
    ("credential_name", FieldKind::Str),
    ("max_tokens", FieldKind::Int),
    ("object_list", FieldKind::JsonList),
    ("stop_tokens", FieldKind::Str),
    ("temperature", FieldKind::Float),
    ("vector_index_name", FieldKind::Str),
    ("annotations", FieldKind::Str),
    ("constraints", FieldKind::Str),
    ("case_sensitive_values", FieldKind::Bool),
    ("object_list_mode", FieldKind::Str),
    ("enforce_object_list", FieldKind::Bool),
    ("enable_sources", FieldKind::Bool),
    ("enable_source_offsets", FieldKind::Bool),
    ("seed", FieldKind::Str),
    ("streaming", FieldKind::Str),
];

static PROFILE_FIELDS: Lazy<Vec<(&'static str, FieldKind)>> = Lazy::new(|| {
    GENERIC_PROFILE_FIELDS
        .iter()
        .copied()
        .chain(ProviderAttributes::fields().iter().copied())
        .collect()
});

impl ProfileAttributes {
    pub fn with_provider(mut self, provider: ProviderAttributes) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Names of the fields that belong to the profile itself.
    pub fn generic_fields() -> impl Iterator<Item = &'static str> {
        GENERIC_PROFILE_FIELDS.iter().map(|(name, _)| *name)
    }
}

impl AttributeContainer for ProfileAttributes {
    fn fields() -> &'static [(&'static str, FieldKind)] {
        PROFILE_FIELDS.as_slice()
    }

    fn to_payload(&self, exclude_null: bool) -> Result<Map<String, Value>> {
        let mut payload = serde_to_payload(self, exclude_null)?;
        if let Some(provider) = &self.provider {
            payload.extend(provider.to_payload(exclude_null)?);
        }
        Ok(payload)
    }

    fn from_payload(payload: Map<String, Value>) -> Result<Self> {
        let (generic, provider) = split_fields(normalize_payload::<Self>(payload)?);
        let mut attrs: Self = serde_from_payload(generic)?;
        if provider.values().any(|v| !v.is_null()) {
            attrs.provider = Some(ProviderAttributes::from_payload(provider)?);
        }
        Ok(attrs)
    }

    fn set_field(&mut self, name: &str, value: Value) -> Result<()> {
        let key = name.to_ascii_lowercase();
        if is_provider_field(&key) {
            return self
                .provider
                .get_or_insert_with(ProviderAttributes::default)
                .set_field(&key, value);
        }
        let kind = GENERIC_PROFILE_FIELDS
            .iter()
            .find(|(field, _)| *field == key)
            .map(|(_, kind)| *kind)
            .ok_or_else(|| unknown_field(&key))?;
        let mut payload = serde_to_payload(self, false)?;
        let coerced = coerce(kind, &key, value)?;
        payload.insert(key, coerced);
        let provider = self.provider.take();
        *self = serde_from_payload(payload)?;
        self.provider = provider;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ProfileKind;

impl NamedResource for ProfileKind {
    type Attributes = ProfileAttributes;

    const TYPE: ResourceType = ResourceType::Profile;
    const NAME_PARAM: &'static str = "profile_name";
    const CREATE: &'static str = sql::CREATE_PROFILE;
    const DROP: &'static str = sql::DROP_PROFILE;
    const SET_ATTRIBUTE: &'static str = sql::SET_ATTRIBUTE;
    const SET_ATTRIBUTES: &'static str = sql::SET_ATTRIBUTES;
    const ATTRIBUTES_QUERY: &'static str = sql::GET_USER_AI_PROFILE_ATTRIBUTES;
    const LIST_QUERY: &'static str = sql::LIST_USER_AI_PROFILES;
    const LIST_PATTERN_PARAM: &'static str = "profile_name_pattern";

    // Generic is a read-side fallback; an unknown discriminator is never written.
    fn check_attributes(attributes: &ProfileAttributes) -> Result<()> {
        match attributes.provider.as_ref().map(|p| &p.variant) {
            Some(ProviderVariant::Generic {
                provider: Some(discriminator),
            }) => Err(Error::invalid_provider(discriminator.clone())),
            _ => Ok(()),
        }
    }
}

pub type ProfileOptions = ResourceOptions<ProfileAttributes>;

/// Asynchronous AI profile proxy.
#[derive(Debug, Clone)]
pub struct AsyncProfile {
    handle: ResourceHandle<ProfileKind>,
}

impl AsyncProfile {
    /// Opens a profile, reconciling `options` with the service.
    pub async fn open(conn: &Connection, options: ProfileOptions) -> Result<Self> {
        let handle = ResourceHandle::open(conn, options).await?;
        Ok(Self { handle })
    }

    /// Opens an existing profile by name.
    pub async fn fetch(conn: &Connection, name: &str) -> Result<Self> {
        Self::open(conn, ProfileOptions::named(name)).await
    }

    pub async fn fetch_attributes(conn: &Connection, name: &str) -> Result<ProfileAttributes> {
        ResourceHandle::<ProfileKind>::fetch(conn, name).await
    }

    pub fn name(&self) -> Option<&str> {
        self.handle.name()
    }

    pub fn attributes(&self) -> Option<&ProfileAttributes> {
        self.handle.attributes()
    }

    pub fn description(&self) -> Option<&str> {
        self.handle.description()
    }

    pub fn state(&self) -> ResourceState {
        self.handle.state()
    }

    pub fn connection(&self) -> &Connection {
        self.handle.connection()
    }

    pub async fn get_attributes(&self) -> Result<ProfileAttributes> {
        self.handle.get_attributes().await
    }

    pub async fn create(&mut self, replace: bool, description: Option<String>) -> Result<()> {
        self.handle.create(replace, description).await
    }

    pub async fn drop(&mut self, force: bool) -> Result<()> {
        self.handle.drop(force).await
    }

    /// Sets one attribute. Provider-owned names (`model`, `azure_resource_name`, ...)
    /// are routed into the provider settings.
    pub async fn set_attribute(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.handle.set_attribute(name, value.into()).await
    }

    pub async fn set_attributes(&mut self, attributes: ProfileAttributes) -> Result<()> {
        self.handle.set_attributes(attributes).await
    }

    /// Replaces the provider settings, keeping every generic field.
    pub async fn set_provider(&mut self, provider: ProviderAttributes) -> Result<()> {
        let attributes = self
            .attributes()
            .cloned()
            .unwrap_or_default()
            .with_provider(provider);
        self.handle.set_attributes(attributes).await
    }

    /// Profiles whose name matches `pattern`; `None` matches all.
    pub fn list(conn: &Connection, pattern: Option<&str>) -> BoxStream<'static, Result<Self>> {
        ResourceHandle::<ProfileKind>::list(conn, pattern)
            .map(|item| item.map(|handle| Self { handle }))
            .boxed()
    }

    /// Runs `GENERATE` for this profile.
    pub async fn generate(
        &self,
        prompt: &str,
        action: Action,
        params: Option<&Params>,
    ) -> Result<Option<String>> {
        let name = self.handle.require_name()?;
        let bind = generate_params(name, prompt, action, params)?;
        let conn = self.connection();
        let start = Instant::now();
        let value = conn
            .gateway()
            .call_function(sql::GENERATE, ReturnType::Clob, &bind)
            .await?;
        let text = value.into_text(conn.config().lob_chunk_size).await?;
        debug!(
            profile = %name,
            action = %action,
            duration_ms = start.elapsed().as_millis() as u64,
            "generated"
        );
        Ok(text)
    }

    pub async fn chat(&self, prompt: &str) -> Result<Option<String>> {
        self.generate(prompt, Action::Chat, None).await
    }

    pub async fn narrate(&self, prompt: &str) -> Result<Option<String>> {
        self.generate(prompt, Action::Narrate, None).await
    }

    pub async fn explain_sql(&self, prompt: &str) -> Result<Option<String>> {
        self.generate(prompt, Action::ExplainSql, None).await
    }

    pub async fn show_sql(&self, prompt: &str) -> Result<Option<String>> {
        self.generate(prompt, Action::ShowSql, None).await
    }

    pub async fn show_prompt(&self, prompt: &str) -> Result<Option<String>> {
        self.generate(prompt, Action::ShowPrompt, None).await
    }

    pub async fn summarize(&self, content: &str, params: Option<&Params>) -> Result<Option<String>> {
        self.generate(content, Action::Summarize, params).await
    }

    /// Runs the generated SQL and returns its rows.
    pub async fn run_sql(&self, prompt: &str) -> Result<Vec<Map<String, Value>>> {
        let text = self.generate(prompt, Action::RunSql, None).await?;
        parse_rows(text.as_deref())
    }

    /// Submits `requests` as one pipeline round trip.
    pub async fn run_pipeline(
        &self,
        requests: Vec<PipelineRequest>,
        continue_on_error: bool,
    ) -> Result<PipelineResults> {
        let name = self.handle.require_name()?;
        PipelineExecutor::new(self.connection(), name)
            .with_config(PipelineExecutorConfig::new().with_continue_on_error(continue_on_error))
            .submit(requests)
            .await
    }

    /// Creates a vector index owned by this profile. `profile_name` defaults
    /// to this profile.
    pub async fn create_vector_index(
        &self,
        index_name: &str,
        mut attributes: VectorIndexAttributes,
        description: Option<String>,
        replace: bool,
    ) -> Result<AsyncVectorIndex> {
        let name = self.handle.require_name()?;
        if attributes.profile_name.is_none() {
            attributes.profile_name = Some(name.to_string());
        }
        let mut options = VectorIndexOptions::named(index_name)
            .with_attributes(attributes)
            .replace(replace);
        options.description = description;
        AsyncVectorIndex::open(self.connection(), options).await
    }

    /// Vector indexes owned by this profile whose name matches `pattern`.
    pub fn list_vector_indexes(
        &self,
        pattern: Option<&str>,
    ) -> Result<BoxStream<'static, Result<AsyncVectorIndex>>> {
        let name = self.handle.require_name()?;
        Ok(AsyncVectorIndex::list_by_profile(
            self.connection(),
            name,
            pattern,
        ))
    }

    /// Creates a conversation and returns its id.
    pub async fn create_conversation(&self, attributes: ConversationAttributes) -> Result<String> {
        AsyncConversation::new(self.connection(), attributes)
            .create()
            .await
    }

    pub async fn generate_synthetic_data(&self, attributes: &SyntheticDataAttributes) -> Result<()> {
        let name = self.handle.require_name()?;
        let params = attributes.prepare(name)?;
        self.connection()
            .gateway()
            .call_procedure(sql::GENERATE_SYNTHETIC_DATA, &params)
            .await?;
        info!(profile = %name, "synthetic data generated");
        Ok(())
    }
}

fn parse_rows(text: Option<&str>) -> Result<Vec<Map<String, Value>>> {
    let Some(text) = text.filter(|t| !t.trim().is_empty()) else {
        return Ok(Vec::new());
    };
    match serde_json::from_str::<Value>(text)? {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(row) => Ok(row),
                other => Err(rows_error(other.to_string())),
            })
            .collect(),
        other => Err(rows_error(other.to_string())),
    }
}

fn rows_error(details: String) -> Error {
    Error::runtime_with_context(
        "runsql result is not a list of rows",
        ErrorContext::new().with_details(details),
    )
}

/// Blocking AI profile proxy. Same semantics as [`AsyncProfile`].
#[derive(Debug, Clone)]
pub struct Profile {
    inner: AsyncProfile,
}

impl Profile {
    pub fn open(conn: &BlockingConnection, options: ProfileOptions) -> Result<Self> {
        block_on(AsyncProfile::open(conn.as_async(), options)).map(|inner| Self { inner })
    }

    pub fn fetch(conn: &BlockingConnection, name: &str) -> Result<Self> {
        Self::open(conn, ProfileOptions::named(name))
    }

    pub fn fetch_attributes(conn: &BlockingConnection, name: &str) -> Result<ProfileAttributes> {
        block_on(AsyncProfile::fetch_attributes(conn.as_async(), name))
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.name()
    }

    pub fn attributes(&self) -> Option<&ProfileAttributes> {
        self.inner.attributes()
    }

    pub fn description(&self) -> Option<&str> {
        self.inner.description()
    }

    pub fn state(&self) -> ResourceState {
        self.inner.state()
    }

    pub fn get_attributes(&self) -> Result<ProfileAttributes> {
        block_on(self.inner.get_attributes())
    }

    pub fn create(&mut self, replace: bool, description: Option<String>) -> Result<()> {
        block_on(self.inner.create(replace, description))
    }

    pub fn drop(&mut self, force: bool) -> Result<()> {
        block_on(self.inner.drop(force))
    }

    pub fn set_attribute(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        block_on(self.inner.set_attribute(name, value))
    }

    pub fn set_attributes(&mut self, attributes: ProfileAttributes) -> Result<()> {
        block_on(self.inner.set_attributes(attributes))
    }

    pub fn set_provider(&mut self, provider: ProviderAttributes) -> Result<()> {
        block_on(self.inner.set_provider(provider))
    }

    pub fn list(
        conn: &BlockingConnection,
        pattern: Option<&str>,
    ) -> impl Iterator<Item = Result<Self>> {
        block_on_stream(AsyncProfile::list(conn.as_async(), pattern))
            .map(|item| item.map(|inner| Self { inner }))
    }

    pub fn generate(
        &self,
        prompt: &str,
        action: Action,
        params: Option<&Params>,
    ) -> Result<Option<String>> {
        block_on(self.inner.generate(prompt, action, params))
    }

    pub fn chat(&self, prompt: &str) -> Result<Option<String>> {
        block_on(self.inner.chat(prompt))
    }

    pub fn narrate(&self, prompt: &str) -> Result<Option<String>> {
        block_on(self.inner.narrate(prompt))
    }

    pub fn explain_sql(&self, prompt: &str) -> Result<Option<String>> {
        block_on(self.inner.explain_sql(prompt))
    }

    pub fn show_sql(&self, prompt: &str) -> Result<Option<String>> {
        block_on(self.inner.show_sql(prompt))
    }

    pub fn show_prompt(&self, prompt: &str) -> Result<Option<String>> {
        block_on(self.inner.show_prompt(prompt))
    }

    pub fn summarize(&self, content: &str, params: Option<&Params>) -> Result<Option<String>> {
        block_on(self.inner.summarize(content, params))
    }

    pub fn run_sql(&self, prompt: &str) -> Result<Vec<Map<String, Value>>> {
        block_on(self.inner.run_sql(prompt))
    }

    pub fn run_pipeline(
        &self,
        requests: Vec<PipelineRequest>,
        continue_on_error: bool,
    ) -> Result<PipelineResults> {
        block_on(self.inner.run_pipeline(requests, continue_on_error))
    }

    pub fn create_vector_index(
        &self,
        index_name: &str,
        attributes: VectorIndexAttributes,
        description: Option<String>,
        replace: bool,
    ) -> Result<VectorIndex> {
        block_on(
            self.inner
                .create_vector_index(index_name, attributes, description, replace),
        )
        .map(VectorIndex::from_async)
    }

    pub fn list_vector_indexes(
        &self,
        pattern: Option<&str>,
    ) -> Result<impl Iterator<Item = Result<VectorIndex>>> {
        let stream = self.inner.list_vector_indexes(pattern)?;
        Ok(block_on_stream(stream).map(|item| item.map(VectorIndex::from_async)))
    }

    pub fn create_conversation(&self, attributes: ConversationAttributes) -> Result<String> {
        block_on(self.inner.create_conversation(attributes))
    }

    pub fn generate_synthetic_data(&self, attributes: &SyntheticDataAttributes) -> Result<()> {
        block_on(self.inner.generate_synthetic_data(attributes))
    }
}
