//! Sessions: request parameters persisted across generation calls.
//!
//! A session pins parameters such as `conversation_id` so every `chat` or
//! `generate` issued through it carries them. Per-call parameters win over
//! the session's on key conflicts.

use crate::action::Action;
use crate::connection::Connection;
use crate::conversation::ConversationAttributes;
use crate::gateway::Params;
use crate::profile::{AsyncProfile, Profile};
use crate::Result;
use serde_json::Value;
use tracing::debug;

const CONVERSATION_ID: &str = "conversation_id";

fn merged(session: &Params, extra: Option<&Params>) -> Params {
    let mut params = session.clone();
    if let Some(extra) = extra {
        params.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    params
}

#[derive(Debug, Clone)]
pub struct AsyncSession {
    profile: AsyncProfile,
    params: Params,
}

impl AsyncSession {
    pub fn new(profile: &AsyncProfile, params: Params) -> Self {
        Self {
            profile: profile.clone(),
            params,
        }
    }

    /// Session bound to an existing conversation.
    pub fn with_conversation(profile: &AsyncProfile, conversation_id: impl Into<String>) -> Self {
        let mut params = Params::new();
        params.insert(CONVERSATION_ID.into(), Value::String(conversation_id.into()));
        Self::new(profile, params)
    }

    /// Creates a conversation and binds a new session to it.
    pub async fn start_conversation(
        profile: &AsyncProfile,
        attributes: ConversationAttributes,
    ) -> Result<Self> {
        let id = profile.create_conversation(attributes).await?;
        debug!(conversation_id = %id, "session bound to new conversation");
        Ok(Self::with_conversation(profile, id))
    }

    pub fn profile(&self) -> &AsyncProfile {
        &self.profile
    }

    pub fn connection(&self) -> &Connection {
        self.profile.connection()
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.params.get(CONVERSATION_ID).and_then(Value::as_str)
    }

    pub fn set_param(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.params.insert(name.into(), value.into());
    }

    pub async fn generate(
        &self,
        prompt: &str,
        action: Action,
        params: Option<&Params>,
    ) -> Result<Option<String>> {
        let params = merged(&self.params, params);
        self.profile.generate(prompt, action, Some(&params)).await
    }

    pub async fn chat(&self, prompt: &str) -> Result<Option<String>> {
        self.generate(prompt, Action::Chat, None).await
    }
}

/// Blocking session over a [`Profile`].
#[derive(Debug, Clone)]
pub struct Session {
    profile: Profile,
    params: Params,
}

impl Session {
    pub fn new(profile: &Profile, params: Params) -> Self {
        Self {
            profile: profile.clone(),
            params,
        }
    }

    pub fn with_conversation(profile: &Profile, conversation_id: impl Into<String>) -> Self {
        let mut params = Params::new();
        params.insert(CONVERSATION_ID.into(), Value::String(conversation_id.into()));
        Self::new(profile, params)
    }

    pub fn start_conversation(profile: &Profile, attributes: ConversationAttributes) -> Result<Self> {
        let id = profile.create_conversation(attributes)?;
        Ok(Self::with_conversation(profile, id))
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.params.get(CONVERSATION_ID).and_then(Value::as_str)
    }

    pub fn set_param(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.params.insert(name.into(), value.into());
    }

    pub fn generate(
        &self,
        prompt: &str,
        action: Action,
        params: Option<&Params>,
    ) -> Result<Option<String>> {
        let params = merged(&self.params, params);
        self.profile.generate(prompt, action, Some(&params))
    }

    pub fn chat(&self, prompt: &str) -> Result<Option<String>> {
        self.generate(prompt, Action::Chat, None)
    }
}
