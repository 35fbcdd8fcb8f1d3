//! Pipeline requests.

use crate::action::Action;
use crate::error::{Error, ErrorContext};
use crate::gateway::{FunctionCall, Params, ReturnType};
use crate::sql;
use crate::Result;

/// One `(prompt, action)` pair of a pipeline submission.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineRequest {
    pub prompt: String,
    pub action: Action,
    /// Per-request generation parameters (sent as JSON).
    pub params: Option<Params>,
}

impl PipelineRequest {
    pub fn new(prompt: impl Into<String>, action: Action) -> Self {
        Self {
            prompt: prompt.into(),
            action,
            params: None,
        }
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = Some(params);
        self
    }

    pub(crate) fn to_call(&self, profile_name: &str) -> Result<FunctionCall> {
        Ok(FunctionCall::new(
            sql::GENERATE,
            ReturnType::Clob,
            generate_params(profile_name, &self.prompt, self.action, self.params.as_ref())?,
        ))
    }
}

impl<S: Into<String>> From<(S, Action)> for PipelineRequest {
    fn from((prompt, action): (S, Action)) -> Self {
        Self::new(prompt, action)
    }
}

/// Bind parameters of a `GENERATE` call.
pub(crate) fn generate_params(
    profile_name: &str,
    prompt: &str,
    action: Action,
    params: Option<&Params>,
) -> Result<Params> {
    if prompt.trim().is_empty() {
        return Err(Error::validation_with_context(
            "prompt must not be empty",
            ErrorContext::new()
                .with_field_path("prompt")
                .with_details(format!("action: {}", action)),
        ));
    }
    let mut bind = Params::new();
    bind.insert("prompt".into(), prompt.into());
    bind.insert("profile_name".into(), profile_name.into());
    bind.insert("action".into(), action.as_str().into());
    if let Some(params) = params.filter(|p| !p.is_empty()) {
        bind.insert("params".into(), serde_json::to_string(params)?.into());
    }
    Ok(bind)
}
