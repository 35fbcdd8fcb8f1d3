//! In-memory stand-in for the remote procedural service.
//!
//! Emulates the catalogue (profiles, vector indexes, conversations,
//! credentials), the `GENERATE` function and pipeline submission closely
//! enough to exercise reconciliation, listing and batching through both
//! gateway traits. Every call is logged so tests can count round trips.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use regex::Regex;
use select_ai_rust::gateway::{
    BlockingRemoteCall, FunctionCall, LargeObject, Params, PipelineOutcome, RemoteCall,
    RemoteValue, ReturnType, Row,
};
use select_ai_rust::{sql, BlockingConnection, Connection, Error, RemoteError, Result};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// How large objects are handed out: async callers get byte streams,
/// blocking callers get readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LobMode {
    Stream,
    Reader,
}

/// Deliberate breaches of the pipeline contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineFault {
    /// Report the first outcome twice
    DuplicateFirst,
    /// Omit the last outcome
    DropLast,
    /// Report an index past the end
    OutOfRange,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub name: String,
    pub params: Params,
}

#[derive(Debug, Clone, Default)]
struct Stored {
    attributes: Map<String, Value>,
    description: Option<String>,
}

#[derive(Debug, Default)]
struct State {
    profiles: BTreeMap<String, Stored>,
    indexes: BTreeMap<String, Stored>,
    enabled_indexes: BTreeSet<String>,
    conversations: BTreeMap<String, Map<String, Value>>,
    credentials: BTreeMap<String, Params>,
    next_conversation: u64,
    calls: Vec<RecordedCall>,
    pipeline_sizes: Vec<usize>,
    injected: BTreeMap<String, (usize, RemoteError)>,
    evaluated: Vec<String>,
}

#[derive(Debug, Default)]
pub struct MockService {
    state: Mutex<State>,
    reverse_outcomes: AtomicBool,
    reverse_execution: AtomicBool,
    fault: Mutex<Option<PipelineFault>>,
}

fn remote(code: i32, message: impl Into<String>) -> Error {
    Error::Remote(RemoteError::new(Some(code), message))
}

fn text_param(params: &Params, name: &str) -> Result<String> {
    match params.get(name) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) if !other.is_null() => Ok(other.to_string()),
        _ => Err(remote(6550, format!("ORA-06550: missing bind :{}", name))),
    }
}

fn key_param(params: &Params, name: &str) -> Result<String> {
    text_param(params, name).map(|s| s.to_uppercase())
}

fn json_object(params: &Params, name: &str) -> Result<Map<String, Value>> {
    let raw = text_param(params, name)?;
    match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(remote(40441, format!("ORA-40441: JSON syntax error in :{}", name))),
    }
}

fn render(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn pattern(params: &Params, name: &str) -> Result<Regex> {
    let raw = text_param(params, name)?;
    Regex::new(&format!("(?i){}", raw)).map_err(|_| {
        remote(
            12725,
            "ORA-12725: unmatched parentheses in regular expression",
        )
    })
}

fn apply_updates(target: &mut Map<String, Value>, updates: Map<String, Value>) {
    for (name, value) in updates {
        let name = name.to_ascii_lowercase();
        if value.is_null() {
            target.remove(&name);
        } else {
            target.insert(name, value);
        }
    }
}

impl MockService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn connection(self: &Arc<Self>) -> Connection {
        Connection::new(self.clone())
    }

    pub fn blocking_connection(self: &Arc<Self>) -> BlockingConnection {
        BlockingConnection::new(self.clone())
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn round_trips(&self) -> usize {
        self.lock().calls.len()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    pub fn calls_named(&self, name: &str) -> Vec<Params> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.name == name)
            .map(|c| c.params.clone())
            .collect()
    }

    pub fn clear_log(&self) {
        let mut state = self.lock();
        state.calls.clear();
        state.pipeline_sizes.clear();
        state.evaluated.clear();
    }

    pub fn pipeline_sizes(&self) -> Vec<usize> {
        self.lock().pipeline_sizes.clone()
    }

    pub fn set_reverse_outcomes(&self, reverse: bool) {
        self.reverse_outcomes.store(reverse, Ordering::SeqCst);
    }

    /// Runs pipeline requests from the last to the first.
    pub fn set_reverse_execution(&self, reverse: bool) {
        self.reverse_execution.store(reverse, Ordering::SeqCst);
    }

    /// Prompts that reached generation, in execution order.
    pub fn evaluated_prompts(&self) -> Vec<String> {
        self.lock().evaluated.clone()
    }

    pub fn set_pipeline_fault(&self, fault: Option<PipelineFault>) {
        *self.fault.lock().unwrap() = fault;
    }

    /// Makes the next call to `name` fail with `error`.
    pub fn fail_next(&self, name: &str, error: RemoteError) {
        self.fail_nth(name, 0, error);
    }

    /// Lets `skip` calls to `name` through, then fails the one after.
    pub fn fail_nth(&self, name: &str, skip: usize, error: RemoteError) {
        self.lock().injected.insert(name.to_string(), (skip, error));
    }

    pub fn seed_profile(&self, name: &str, attributes: Value, description: Option<&str>) {
        let attributes = attributes.as_object().cloned().unwrap_or_default();
        self.lock().profiles.insert(
            name.to_uppercase(),
            Stored {
                attributes,
                description: description.map(str::to_string),
            },
        );
    }

    pub fn profile_attributes(&self, name: &str) -> Option<Map<String, Value>> {
        self.lock()
            .profiles
            .get(&name.to_uppercase())
            .map(|p| p.attributes.clone())
    }

    pub fn profile_description(&self, name: &str) -> Option<String> {
        self.lock()
            .profiles
            .get(&name.to_uppercase())
            .and_then(|p| p.description.clone())
    }

    pub fn has_profile(&self, name: &str) -> bool {
        self.lock().profiles.contains_key(&name.to_uppercase())
    }

    pub fn index_attributes(&self, name: &str) -> Option<Map<String, Value>> {
        self.lock()
            .indexes
            .get(&name.to_uppercase())
            .map(|i| i.attributes.clone())
    }

    pub fn index_enabled(&self, name: &str) -> bool {
        self.lock().enabled_indexes.contains(&name.to_uppercase())
    }

    pub fn has_conversation(&self, id: &str) -> bool {
        self.lock().conversations.contains_key(id)
    }

    pub fn conversation(&self, id: &str) -> Option<Map<String, Value>> {
        self.lock().conversations.get(id).cloned()
    }

    pub fn credential(&self, name: &str) -> Option<Params> {
        self.lock().credentials.get(&name.to_uppercase()).cloned()
    }

    fn record(&self, name: &str, params: &Params) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(RecordedCall {
            name: name.to_string(),
            params: params.clone(),
        });
        let fire = match state.injected.get_mut(name) {
            Some((skip, _)) if *skip > 0 => {
                *skip -= 1;
                false
            }
            Some(_) => true,
            None => false,
        };
        if !fire {
            return Ok(());
        }
        match state.injected.remove(name) {
            Some((_, error)) => Err(Error::Remote(error)),
            None => Ok(()),
        }
    }

    fn lob(text: String, mode: LobMode) -> RemoteValue {
        let bytes = text.into_bytes();
        let object = match mode {
            LobMode::Reader => LargeObject::from_reader(Cursor::new(bytes)),
            LobMode::Stream => {
                let chunks: Vec<std::io::Result<Bytes>> = bytes
                    .chunks(5)
                    .map(|c| Ok(Bytes::copy_from_slice(c)))
                    .collect();
                LargeObject::from_stream(futures::stream::iter(chunks))
            }
        };
        RemoteValue::Lob(object)
    }

    fn procedure(&self, name: &str, params: &Params) -> Result<()> {
        self.record(name, params)?;
        let mut state = self.lock();
        match name {
            sql::CREATE_PROFILE => {
                let key = key_param(params, "profile_name")?;
                if state.profiles.contains_key(&key) {
                    return Err(remote(
                        20046,
                        format!("ORA-20046: Profile \"{}\" already exists", key),
                    ));
                }
                let stored = Stored {
                    attributes: json_object(params, "attributes")?,
                    description: params.get("description").and_then(render),
                };
                state.profiles.insert(key, stored);
            }
            sql::DROP_PROFILE => {
                let key = key_param(params, "profile_name")?;
                if state.profiles.remove(&key).is_none() {
                    return Err(remote(
                        20047,
                        format!("ORA-20047: Profile \"{}\" does not exist", key),
                    ));
                }
            }
            sql::SET_ATTRIBUTE | sql::SET_ATTRIBUTES => {
                let key = key_param(params, "profile_name")?;
                let updates = if name == sql::SET_ATTRIBUTE {
                    let mut single = Map::new();
                    single.insert(
                        text_param(params, "attribute_name")?,
                        params.get("attribute_value").cloned().unwrap_or(Value::Null),
                    );
                    single
                } else {
                    json_object(params, "attributes")?
                };
                let profile = state.profiles.get_mut(&key).ok_or_else(|| {
                    remote(20047, format!("ORA-20047: Profile \"{}\" does not exist", key))
                })?;
                apply_updates(&mut profile.attributes, updates);
            }
            sql::CREATE_VECTOR_INDEX => {
                let key = key_param(params, "index_name")?;
                if state.indexes.contains_key(&key) {
                    return Err(remote(
                        955,
                        "ORA-00955: name is already used by an existing object",
                    ));
                }
                let mut attributes = json_object(params, "attributes")?;
                attributes.insert("pipeline_name".into(), json!(format!("{}$VECPIPELINE", key)));
                state.indexes.insert(
                    key.clone(),
                    Stored {
                        attributes,
                        description: params.get("description").and_then(render),
                    },
                );
                state.enabled_indexes.insert(key);
            }
            sql::DROP_VECTOR_INDEX => {
                let key = key_param(params, "index_name")?;
                if state.indexes.remove(&key).is_none() {
                    return Err(remote(
                        4043,
                        format!("ORA-04043: object {} does not exist", key),
                    ));
                }
                state.enabled_indexes.remove(&key);
            }
            sql::ENABLE_VECTOR_INDEX | sql::DISABLE_VECTOR_INDEX => {
                let key = key_param(params, "index_name")?;
                if !state.indexes.contains_key(&key) {
                    return Err(remote(
                        4043,
                        format!("ORA-04043: object {} does not exist", key),
                    ));
                }
                if name == sql::ENABLE_VECTOR_INDEX {
                    state.enabled_indexes.insert(key);
                } else {
                    state.enabled_indexes.remove(&key);
                }
            }
            sql::UPDATE_VECTOR_INDEX => {
                let key = key_param(params, "index_name")?;
                let updates = if params.contains_key("attributes") {
                    json_object(params, "attributes")?
                } else {
                    let mut single = Map::new();
                    single.insert(
                        text_param(params, "attribute_name")?,
                        params.get("attribute_value").cloned().unwrap_or(Value::Null),
                    );
                    single
                };
                let index = state.indexes.get_mut(&key).ok_or_else(|| {
                    remote(4043, format!("ORA-04043: object {} does not exist", key))
                })?;
                apply_updates(&mut index.attributes, updates);
            }
            sql::UPDATE_CONVERSATION => {
                let id = text_param(params, "conversation_id")?;
                let updates = json_object(params, "attributes")?;
                let conversation = state.conversations.get_mut(&id).ok_or_else(|| {
                    remote(20050, format!("ORA-20050: Conversation {} does not exist", id))
                })?;
                apply_updates(conversation, updates);
            }
            sql::DROP_CONVERSATION => {
                let id = text_param(params, "conversation_id")?;
                if state.conversations.remove(&id).is_none() {
                    return Err(remote(
                        20050,
                        format!("ORA-20050: Conversation {} does not exist", id),
                    ));
                }
            }
            sql::GENERATE_SYNTHETIC_DATA => {
                let key = key_param(params, "profile_name")?;
                if !state.profiles.contains_key(&key) {
                    return Err(remote(
                        20047,
                        format!("ORA-20047: Profile \"{}\" does not exist", key),
                    ));
                }
            }
            sql::CREATE_CREDENTIAL => {
                let key = key_param(params, "credential_name")?;
                if state.credentials.contains_key(&key) {
                    return Err(remote(
                        20022,
                        format!("ORA-20022: Credential \"{}\" already exists", key),
                    ));
                }
                state.credentials.insert(key, params.clone());
            }
            sql::DROP_CREDENTIAL => {
                let key = key_param(params, "credential_name")?;
                if state.credentials.remove(&key).is_none() {
                    return Err(remote(
                        20004,
                        format!("ORA-20004: Credential \"{}\" does not exist", key),
                    ));
                }
            }
            other => {
                return Err(remote(
                    6550,
                    format!("ORA-06550: identifier '{}' must be declared", other),
                ))
            }
        }
        Ok(())
    }

    fn function(&self, name: &str, params: &Params, mode: LobMode) -> Result<RemoteValue> {
        self.record(name, params)?;
        self.evaluate(name, params, mode)
    }

    fn evaluate(&self, name: &str, params: &Params, mode: LobMode) -> Result<RemoteValue> {
        let mut state = self.lock();
        match name {
            sql::GENERATE => {
                let key = key_param(params, "profile_name")?;
                if !state.profiles.contains_key(&key) {
                    return Err(remote(
                        20047,
                        format!("ORA-20047: Profile \"{}\" does not exist", key),
                    ));
                }
                let prompt = text_param(params, "prompt")?;
                let action = text_param(params, "action")?;
                state.evaluated.push(prompt.clone());
                if prompt.contains("FAIL") {
                    return Err(remote(
                        20000,
                        format!("ORA-20000: generation failed for \"{}\"", prompt),
                    ));
                }
                if prompt.contains("EMPTY") {
                    return Ok(RemoteValue::Null);
                }
                let conversation = match params.get("params").and_then(Value::as_str) {
                    Some(raw) => serde_json::from_str::<Value>(raw)
                        .ok()
                        .and_then(|v| v.get("conversation_id").and_then(render)),
                    None => None,
                };
                let text = match (action.as_str(), conversation) {
                    ("runsql", _) => json!([{ "PROMPT": prompt, "N": 1 }]).to_string(),
                    (_, Some(id)) => format!("{}[{}]:{}", action, id, prompt),
                    (_, None) => format!("{}:{}", action, prompt),
                };
                Ok(Self::lob(text, mode))
            }
            sql::CREATE_CONVERSATION => {
                let attributes = json_object(params, "attributes")?;
                state.next_conversation += 1;
                let id = format!("CONV-{:04}", state.next_conversation);
                state.conversations.insert(id.clone(), attributes);
                Ok(RemoteValue::Text(id))
            }
            other => Err(remote(
                6550,
                format!("ORA-06550: identifier '{}' must be declared", other),
            )),
        }
    }

    fn attribute_rows(stored: &Stored, mode: LobMode) -> Vec<Row> {
        stored
            .attributes
            .iter()
            .map(|(name, value)| {
                let value = match render(value) {
                    // long values come back as CLOBs
                    Some(text) if text.len() > 32 => Self::lob(text, mode),
                    Some(text) => RemoteValue::Text(text),
                    None => RemoteValue::Null,
                };
                Row::new(vec![RemoteValue::Text(name.to_uppercase()), value])
            })
            .collect()
    }

    fn conversation_columns(attributes: &Map<String, Value>) -> Vec<RemoteValue> {
        let text = |name: &str| match attributes.get(name).and_then(render) {
            Some(t) => RemoteValue::Text(t),
            None => RemoteValue::Null,
        };
        let retention = match attributes.get("retention_days").and_then(Value::as_i64) {
            Some(days) => RemoteValue::Int(days),
            None => RemoteValue::Null,
        };
        vec![text("title"), text("description"), retention]
    }

    fn listing(
        entries: &BTreeMap<String, Stored>,
        filter: impl Fn(&String, &Stored) -> bool,
    ) -> Vec<Row> {
        entries
            .iter()
            .filter(|(name, stored)| filter(name, stored))
            .map(|(name, stored)| {
                Row::new(vec![
                    RemoteValue::Text(name.clone()),
                    stored.description.clone().into(),
                ])
            })
            .collect()
    }

    fn query(&self, query: &str, params: &Params, mode: LobMode) -> Result<Vec<Row>> {
        self.record(query, params)?;
        let state = self.lock();
        let rows = match query {
            sql::GET_USER_AI_PROFILE_ATTRIBUTES => {
                let key = key_param(params, "profile_name")?;
                state
                    .profiles
                    .get(&key)
                    .map(|p| Self::attribute_rows(p, mode))
                    .unwrap_or_default()
            }
            sql::GET_USER_VECTOR_INDEX_ATTRIBUTES => {
                let key = key_param(params, "index_name")?;
                state
                    .indexes
                    .get(&key)
                    .map(|i| Self::attribute_rows(i, mode))
                    .unwrap_or_default()
            }
            sql::LIST_USER_AI_PROFILES => {
                let re = pattern(params, "profile_name_pattern")?;
                Self::listing(&state.profiles, |name, _| re.is_match(name))
            }
            sql::LIST_USER_VECTOR_INDEXES => {
                let re = pattern(params, "index_name_pattern")?;
                Self::listing(&state.indexes, |name, _| re.is_match(name))
            }
            sql::LIST_USER_VECTOR_INDEXES_BY_PROFILE => {
                let re = pattern(params, "index_name_pattern")?;
                let profile = text_param(params, "profile_name")?;
                Self::listing(&state.indexes, |name, stored| {
                    re.is_match(name)
                        && stored.attributes.get("profile_name").and_then(render).as_deref()
                            == Some(profile.as_str())
                })
            }
            sql::GET_USER_CONVERSATION_ATTRIBUTES => {
                let id = text_param(params, "conversation_id")?;
                state
                    .conversations
                    .get(&id)
                    .map(|c| vec![Row::new(Self::conversation_columns(c))])
                    .unwrap_or_default()
            }
            sql::LIST_USER_CONVERSATIONS => {
                let re = pattern(params, "title_pattern")?;
                state
                    .conversations
                    .iter()
                    .filter(|(_, c)| {
                        re.is_match(c.get("title").and_then(Value::as_str).unwrap_or_default())
                    })
                    .map(|(id, c)| {
                        let mut columns = vec![RemoteValue::Text(id.clone())];
                        columns.extend(Self::conversation_columns(c));
                        Row::new(columns)
                    })
                    .collect()
            }
            _ => Vec::new(),
        };
        Ok(rows)
    }

    fn pipeline(
        &self,
        calls: Vec<FunctionCall>,
        continue_on_error: bool,
        mode: LobMode,
    ) -> Result<Vec<PipelineOutcome>> {
        let mut marker = Params::new();
        marker.insert("requests".into(), json!(calls.len()));
        self.record("PIPELINE", &marker)?;
        self.lock().pipeline_sizes.push(calls.len());

        let order: Vec<usize> = if self.reverse_execution.load(Ordering::SeqCst) {
            (0..calls.len()).rev().collect()
        } else {
            (0..calls.len()).collect()
        };
        let mut outcomes = Vec::with_capacity(calls.len());
        for index in order {
            let call = &calls[index];
            match self.evaluate(&call.name, &call.params, mode) {
                Ok(value) => outcomes.push(PipelineOutcome::ok(index, value)),
                Err(Error::Remote(err)) => {
                    outcomes.push(PipelineOutcome::err(index, err));
                    if !continue_on_error {
                        break;
                    }
                }
                Err(other) => return Err(other),
            }
        }

        match *self.fault.lock().unwrap() {
            Some(PipelineFault::DuplicateFirst) => {
                outcomes.push(PipelineOutcome::ok(0, "duplicate"));
            }
            Some(PipelineFault::DropLast) => {
                outcomes.pop();
            }
            Some(PipelineFault::OutOfRange) => {
                outcomes.push(PipelineOutcome::ok(calls.len() + 3, "stray"));
            }
            None => {}
        }
        if self.reverse_outcomes.load(Ordering::SeqCst) {
            outcomes.reverse();
        }
        Ok(outcomes)
    }

    fn statement(&self, statement: &str, params: &Params) -> Result<()> {
        self.record(statement, params)
    }
}

#[async_trait]
impl RemoteCall for MockService {
    async fn call_procedure(&self, name: &str, params: &Params) -> Result<()> {
        self.procedure(name, params)
    }

    async fn call_function(
        &self,
        name: &str,
        _return_type: ReturnType,
        params: &Params,
    ) -> Result<RemoteValue> {
        self.function(name, params, LobMode::Stream)
    }

    async fn execute_query(&self, sql: &str, params: &Params) -> Result<Vec<Row>> {
        self.query(sql, params, LobMode::Stream)
    }

    async fn execute(&self, sql: &str, params: &Params) -> Result<()> {
        self.statement(sql, params)
    }

    async fn run_pipeline(
        &self,
        calls: Vec<FunctionCall>,
        continue_on_error: bool,
    ) -> Result<Vec<PipelineOutcome>> {
        self.pipeline(calls, continue_on_error, LobMode::Stream)
    }
}

impl BlockingRemoteCall for MockService {
    fn call_procedure(&self, name: &str, params: &Params) -> Result<()> {
        self.procedure(name, params)
    }

    fn call_function(
        &self,
        name: &str,
        _return_type: ReturnType,
        params: &Params,
    ) -> Result<RemoteValue> {
        self.function(name, params, LobMode::Reader)
    }

    fn execute_query(&self, sql: &str, params: &Params) -> Result<Vec<Row>> {
        self.query(sql, params, LobMode::Reader)
    }

    fn execute(&self, sql: &str, params: &Params) -> Result<()> {
        self.statement(sql, params)
    }

    fn run_pipeline(
        &self,
        calls: Vec<FunctionCall>,
        continue_on_error: bool,
    ) -> Result<Vec<PipelineOutcome>> {
        self.pipeline(calls, continue_on_error, LobMode::Reader)
    }
}
