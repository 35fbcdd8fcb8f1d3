//! Synthetic data generation requests.

use crate::attributes::serde_to_payload;
use crate::error::{Error, ErrorContext};
use crate::gateway::Params;
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticDataParams {
    pub sample_rows: Option<i64>,
    pub table_statistics: Option<bool>,
    /// `HIGH`, `MEDIUM` or `LOW`
    pub priority: Option<String>,
    pub comments: Option<bool>,
}

impl Default for SyntheticDataParams {
    fn default() -> Self {
        Self {
            sample_rows: None,
            table_statistics: Some(false),
            priority: Some("HIGH".to_string()),
            comments: Some(false),
        }
    }
}

/// What to generate. Exactly one of `object_name` and `object_list` must be set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyntheticDataAttributes {
    pub object_name: Option<String>,
    pub owner_name: Option<String>,
    pub record_count: Option<i64>,
    pub user_prompt: Option<String>,
    pub params: Option<SyntheticDataParams>,
    pub object_list: Option<Vec<Map<String, Value>>>,
}

impl SyntheticDataAttributes {
    pub fn for_table(object_name: impl Into<String>, record_count: i64) -> Self {
        Self {
            object_name: Some(object_name.into()),
            record_count: Some(record_count),
            ..Default::default()
        }
    }

    pub fn for_objects(object_list: Vec<Map<String, Value>>) -> Self {
        Self {
            object_list: Some(object_list),
            ..Default::default()
        }
    }

    /// Bind parameters for `GENERATE_SYNTHETIC_DATA`; nested values travel as JSON text.
    pub(crate) fn prepare(&self, profile_name: &str) -> Result<Params> {
        let has_name = self.object_name.as_deref().is_some_and(|n| !n.is_empty());
        let has_list = self.object_list.as_ref().is_some_and(|l| !l.is_empty());
        match (has_name, has_list) {
            (true, true) => {
                return Err(Error::validation_with_context(
                    "object_name and object_list are mutually exclusive",
                    ErrorContext::new().with_source("synthetic_data"),
                ))
            }
            (false, false) => {
                return Err(Error::validation_with_context(
                    "one of object_name or object_list is required",
                    ErrorContext::new().with_source("synthetic_data"),
                ))
            }
            _ => {}
        }

        let mut params = Params::new();
        params.insert("profile_name".into(), profile_name.into());
        for (name, value) in serde_to_payload(self, true)? {
            let value = match value {
                Value::Object(mut nested) => {
                    nested.retain(|_, v| !v.is_null());
                    Value::String(serde_json::to_string(&nested)?)
                }
                Value::Array(_) => Value::String(serde_json::to_string(&value)?),
                scalar => scalar,
            };
            params.insert(name, value);
        }
        Ok(params)
    }
}
