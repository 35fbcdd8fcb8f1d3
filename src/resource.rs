//! 资源协调引擎：本地声明与远端状态之间的创建、获取、合并与替换。
//!
//! Resource reconciliation.
//!
//! Profiles and vector indexes are named server-side objects. A local handle
//! is opened from a name and/or a set of attributes and brought in line with
//! the service:
//!
//! | Input | Remote effect | Resulting state |
//! |-------|---------------|-----------------|
//! | no name | none | [`ResourceState::Unbound`] |
//! | name only | fetch; miss is [`Error::NotFound`] | [`ResourceState::Reconciled`] |
//! | name + attributes | create (replace per options) | [`ResourceState::Persisted`] |
//! | name + attributes + merge | fetch, merge, create with replace | [`ResourceState::Persisted`] |
//!
//! Creation conflicts trigger at most one drop-and-recreate, and only when
//! replace was requested.

use crate::attributes::{collect_remote_fields, AttributeContainer};
use crate::connection::Connection;
use crate::error::{Error, ErrorContext, ResourceType};
use crate::error_code::RemoteErrorKind;
use crate::gateway::Params;
use crate::Result;
use async_stream::try_stream;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use serde_json::{Map, Value};
use std::fmt;
use std::marker::PhantomData;
use tracing::{debug, info, warn};

/// Lifecycle of a local resource handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceState {
    /// No name; local only
    Unbound,
    /// Named, not yet compared with the service
    Declared,
    /// Attributes read from the service
    Reconciled,
    /// Written by this handle or listed from the service
    Persisted,
    /// Dropped by this handle
    Deleted,
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceState::Unbound => "unbound",
            ResourceState::Declared => "declared",
            ResourceState::Reconciled => "reconciled",
            ResourceState::Persisted => "persisted",
            ResourceState::Deleted => "deleted",
        };
        f.write_str(name)
    }
}

/// How to open a named resource.
#[derive(Debug, Clone)]
pub struct ResourceOptions<A> {
    pub name: Option<String>,
    pub attributes: Option<A>,
    pub description: Option<String>,
    /// Merge `attributes` over the stored ones instead of replacing them wholesale.
    pub merge: bool,
    /// Drop and recreate when the name is already taken.
    pub replace: bool,
}

impl<A> ResourceOptions<A> {
    pub fn new() -> Self {
        Self {
            name: None,
            attributes: None,
            description: None,
            merge: false,
            replace: false,
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::new().with_name(name)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_attributes(mut self, attributes: A) -> Self {
        self.attributes = Some(attributes);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn merge(mut self, merge: bool) -> Self {
        self.merge = merge;
        self
    }

    pub fn replace(mut self, replace: bool) -> Self {
        self.replace = replace;
        self
    }
}

impl<A> Default for ResourceOptions<A> {
    fn default() -> Self {
        Self::new()
    }
}

/// A stored procedure with its bound parameters.
#[derive(Debug, Clone)]
pub(crate) struct ProcedureCall {
    pub name: &'static str,
    pub params: Params,
}

impl ProcedureCall {
    pub fn new(name: &'static str, params: Params) -> Self {
        Self { name, params }
    }

    async fn invoke(&self, conn: &Connection) -> Result<()> {
        conn.gateway().call_procedure(self.name, &self.params).await
    }
}

/// Static description of a named resource family.
pub(crate) trait NamedResource: fmt::Debug + Clone + Send + Sync + 'static {
    type Attributes: AttributeContainer;

    const TYPE: ResourceType;
    const NAME_PARAM: &'static str;
    const CREATE: &'static str;
    const DROP: &'static str;
    const SET_ATTRIBUTE: &'static str;
    const SET_ATTRIBUTES: &'static str;
    const ATTRIBUTES_QUERY: &'static str;
    const LIST_QUERY: &'static str;
    const LIST_PATTERN_PARAM: &'static str;

    /// Attribute payload sent on create and bulk update.
    fn write_payload(attributes: &Self::Attributes) -> Result<Map<String, Value>> {
        attributes.to_payload(true)
    }

    /// Rejects attribute sets the service must never receive.
    fn check_attributes(_attributes: &Self::Attributes) -> Result<()> {
        Ok(())
    }

    /// Rejects attribute names that may not be written directly.
    fn check_writable(_name: &str) -> Result<()> {
        Ok(())
    }

    fn create_params(
        name: &str,
        attributes: &Self::Attributes,
        description: Option<&str>,
    ) -> Result<Params> {
        Self::check_attributes(attributes)?;
        let mut params = Params::new();
        params.insert(Self::NAME_PARAM.into(), name.into());
        params.insert(
            "attributes".into(),
            serde_json::to_string(&Self::write_payload(attributes)?)?.into(),
        );
        if let Some(description) = description {
            params.insert("description".into(), description.into());
        }
        Ok(params)
    }

    fn drop_params(name: &str, force: bool) -> Params {
        let mut params = Params::new();
        params.insert(Self::NAME_PARAM.into(), name.into());
        params.insert("force".into(), force.into());
        params
    }
}

pub(crate) fn validate_name(resource: ResourceType, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::validation_with_context(
            format!("{} name must not be empty", resource),
            ErrorContext::new().with_field_path("name"),
        ));
    }
    Ok(())
}

/// Runs `create`; on an "already exists" conflict either fails with
/// [`Error::AlreadyExists`] or, when `replace` is set, drops and creates once more.
pub(crate) async fn create_or_replace(
    conn: &Connection,
    resource: ResourceType,
    name: &str,
    create: &ProcedureCall,
    drop: &ProcedureCall,
    replace: bool,
) -> Result<()> {
    match create.invoke(conn).await {
        Ok(()) => Ok(()),
        Err(Error::Remote(err)) if err.kind() == RemoteErrorKind::AlreadyExists => {
            if !replace {
                return Err(Error::AlreadyExists {
                    resource,
                    name: name.to_string(),
                    source: err,
                });
            }
            warn!(resource = %resource, name = %name, "already exists, dropping before recreate");
            drop.invoke(conn).await?;
            create.invoke(conn).await
        }
        Err(e) => Err(e),
    }
}

/// Runs a drop; `force` tolerates "does not exist".
pub(crate) async fn drop_tolerant(
    conn: &Connection,
    resource: ResourceType,
    name: &str,
    drop: &ProcedureCall,
    force: bool,
) -> Result<()> {
    match drop.invoke(conn).await {
        Ok(()) => Ok(()),
        Err(Error::Remote(err)) if force && err.kind() == RemoteErrorKind::DoesNotExist => {
            debug!(resource = %resource, name = %name, "drop skipped, does not exist");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Local handle over one named remote resource.
#[derive(Debug, Clone)]
pub(crate) struct ResourceHandle<K: NamedResource> {
    conn: Connection,
    name: Option<String>,
    attributes: Option<K::Attributes>,
    description: Option<String>,
    state: ResourceState,
    _kind: PhantomData<K>,
}

impl<K: NamedResource> ResourceHandle<K> {
    pub async fn open(conn: &Connection, options: ResourceOptions<K::Attributes>) -> Result<Self> {
        let ResourceOptions {
            name,
            attributes,
            description,
            merge,
            replace,
        } = options;

        let Some(name) = name else {
            return Ok(Self {
                conn: conn.clone(),
                name: None,
                attributes,
                description,
                state: ResourceState::Unbound,
                _kind: PhantomData,
            });
        };
        validate_name(K::TYPE, &name)?;
        if let Some(attributes) = &attributes {
            K::check_attributes(attributes)?;
        }

        let mut handle = Self {
            conn: conn.clone(),
            name: Some(name),
            attributes: None,
            description,
            state: ResourceState::Declared,
            _kind: PhantomData,
        };

        match (attributes, merge) {
            (None, _) => {
                let fetched = Self::fetch(conn, handle.require_name()?).await?;
                handle.attributes = Some(fetched);
                handle.state = ResourceState::Reconciled;
            }
            (Some(attributes), false) => {
                handle.attributes = Some(attributes);
                handle.create(replace, None).await?;
            }
            (Some(overrides), true) => {
                match Self::fetch(conn, handle.require_name()?).await {
                    Ok(stored) => {
                        handle.attributes = Some(stored.merge(&overrides)?);
                        handle.state = ResourceState::Reconciled;
                        handle.create(true, None).await?;
                    }
                    Err(Error::NotFound { .. }) => {
                        handle.attributes = Some(overrides);
                        handle.create(false, None).await?;
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(handle)
    }

    pub fn persisted(
        conn: Connection,
        name: String,
        attributes: K::Attributes,
        description: Option<String>,
    ) -> Self {
        Self {
            conn,
            name: Some(name),
            attributes: Some(attributes),
            description,
            state: ResourceState::Persisted,
            _kind: PhantomData,
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn attributes(&self) -> Option<&K::Attributes> {
        self.attributes.as_ref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn state(&self) -> ResourceState {
        self.state
    }

    pub fn require_name(&self) -> Result<&str> {
        self.name.as_deref().ok_or_else(|| {
            Error::validation_with_context(
                format!("{} has no name", K::TYPE),
                ErrorContext::new().with_field_path("name"),
            )
        })
    }

    fn require_attributes(&self) -> Result<&K::Attributes> {
        self.attributes.as_ref().ok_or_else(|| {
            Error::validation_with_context(
                format!("{} has no attributes", K::TYPE),
                ErrorContext::new().with_field_path("attributes"),
            )
        })
    }

    /// Reads the stored attributes of `name`.
    pub async fn fetch(conn: &Connection, name: &str) -> Result<K::Attributes> {
        validate_name(K::TYPE, name)?;
        let mut params = Params::new();
        params.insert(
            K::NAME_PARAM.into(),
            conn.config().normalize_name(name).into(),
        );
        let rows = conn
            .gateway()
            .execute_query(K::ATTRIBUTES_QUERY, &params)
            .await?;
        if rows.is_empty() {
            return Err(Error::not_found(K::TYPE, name));
        }
        debug!(resource = %K::TYPE, name = %name, attributes = rows.len(), "fetched attributes");
        collect_remote_fields(rows, conn.config().lob_chunk_size).await
    }

    pub async fn get_attributes(&self) -> Result<K::Attributes> {
        Self::fetch(&self.conn, self.require_name()?).await
    }

    /// Creates the resource from the local attributes. `description` falls
    /// back to the one recorded on the handle.
    pub async fn create(&mut self, replace: bool, description: Option<String>) -> Result<()> {
        let name = self.require_name()?.to_string();
        let description = description.or_else(|| self.description.clone());
        let create = ProcedureCall::new(
            K::CREATE,
            K::create_params(&name, self.require_attributes()?, description.as_deref())?,
        );
        let drop = ProcedureCall::new(K::DROP, K::drop_params(&name, true));
        create_or_replace(&self.conn, K::TYPE, &name, &create, &drop, replace).await?;
        info!(resource = %K::TYPE, name = %name, replace, "created");
        self.description = description;
        self.state = ResourceState::Persisted;
        Ok(())
    }

    pub async fn drop_with(&mut self, params: Params, force: bool) -> Result<()> {
        let name = self.require_name()?.to_string();
        let drop = ProcedureCall::new(K::DROP, params);
        drop_tolerant(&self.conn, K::TYPE, &name, &drop, force).await?;
        info!(resource = %K::TYPE, name = %name, force, "dropped");
        self.state = ResourceState::Deleted;
        Ok(())
    }

    pub async fn drop(&mut self, force: bool) -> Result<()> {
        let params = K::drop_params(self.require_name()?, force);
        self.drop_with(params, force).await
    }

    /// Writes one attribute. Derived fields that change alongside it (a
    /// recomputed provider endpoint) are written in the same call.
    pub async fn set_attribute(&mut self, attribute: &str, value: Value) -> Result<()> {
        let name = self.require_name()?.to_string();
        K::check_writable(attribute)?;
        let current = self.attributes.clone().unwrap_or_default();
        let mut staged = current.clone();
        staged.set_field(attribute, value)?;

        let before = current.to_payload(false)?;
        let after = staged.to_payload(false)?;
        K::check_attributes(&staged)?;

        // absent and null are the same on the wire
        let mut changed: Map<String, Value> = after
            .iter()
            .filter(|(key, value)| before.get(key.as_str()).unwrap_or(&Value::Null) != *value)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        for (key, value) in &before {
            if !value.is_null() && !after.contains_key(key) {
                changed.insert(key.clone(), Value::Null);
            }
        }
        let attribute = attribute.to_ascii_lowercase();
        if !changed.contains_key(&attribute) {
            changed.insert(
                attribute.clone(),
                after.get(&attribute).cloned().unwrap_or(Value::Null),
            );
        }

        let mut params = Params::new();
        params.insert(K::NAME_PARAM.into(), name.clone().into());
        let procedure = if changed.len() == 1 {
            let value = changed.remove(&attribute).unwrap_or(Value::Null);
            params.insert("attribute_name".into(), attribute.clone().into());
            params.insert(
                "attribute_value".into(),
                crate::attributes::to_param_value(value)?,
            );
            K::SET_ATTRIBUTE
        } else {
            params.insert("attributes".into(), serde_json::to_string(&changed)?.into());
            K::SET_ATTRIBUTES
        };
        self.conn.gateway().call_procedure(procedure, &params).await?;
        debug!(resource = %K::TYPE, name = %name, attribute = %attribute, "attribute updated");
        self.attributes = Some(staged);
        Ok(())
    }

    /// Writes every set field of `attributes`. The service keeps fields left
    /// unset, so the local copy is merged the same way.
    pub async fn set_attributes(&mut self, attributes: K::Attributes) -> Result<()> {
        let name = self.require_name()?.to_string();
        K::check_attributes(&attributes)?;
        let merged = match &self.attributes {
            Some(current) => current.merge(&attributes)?,
            None => attributes.clone(),
        };
        let mut params = Params::new();
        params.insert(K::NAME_PARAM.into(), name.clone().into());
        params.insert(
            "attributes".into(),
            serde_json::to_string(&K::write_payload(&attributes)?)?.into(),
        );
        self.conn
            .gateway()
            .call_procedure(K::SET_ATTRIBUTES, &params)
            .await?;
        debug!(resource = %K::TYPE, name = %name, "attributes updated");
        self.attributes = Some(merged);
        Ok(())
    }

    /// Lazily lists resources whose name matches `pattern` (case-insensitive,
    /// evaluated remotely).
    pub fn list(conn: &Connection, pattern: Option<&str>) -> BoxStream<'static, Result<Self>> {
        let mut params = Params::new();
        params.insert(
            K::LIST_PATTERN_PARAM.into(),
            conn.config().list_pattern(pattern).into(),
        );
        Self::list_query(conn, K::LIST_QUERY, params)
    }

    /// Lists `(name, description)` rows of `sql`, fetching each element's attributes on demand.
    pub fn list_query(
        conn: &Connection,
        sql: &'static str,
        params: Params,
    ) -> BoxStream<'static, Result<Self>> {
        Self::list_rows(conn.clone(), sql, params).boxed()
    }

    fn list_rows(
        conn: Connection,
        sql: &'static str,
        params: Params,
    ) -> impl Stream<Item = Result<Self>> + Send + 'static {
        try_stream! {
            let chunk = conn.config().lob_chunk_size;
            let rows = conn.gateway().execute_query(sql, &params).await?;
            debug!(resource = %K::TYPE, matches = rows.len(), "listing");
            for row in rows {
                let (name, description) = row.into_pair()?;
                let name = name.into_text(chunk).await?.ok_or_else(|| {
                    Error::runtime_with_context(
                        "listing returned a null name",
                        ErrorContext::new().with_source(sql),
                    )
                })?;
                let description = description.into_text(chunk).await?;
                let attributes = Self::fetch(&conn, &name).await?;
                yield Self::persisted(conn.clone(), name, attributes, description);
            }
        }
    }
}
