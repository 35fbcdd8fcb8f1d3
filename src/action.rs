//! Generation actions understood by the service.

use crate::error::{Error, ErrorContext};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Run the generated SQL and return its rows
    RunSql,
    /// Return the generated SQL
    #[default]
    ShowSql,
    /// Explain the generated SQL in natural language
    ExplainSql,
    /// Describe the query result in natural language
    Narrate,
    /// Free-form chat with the model
    Chat,
    /// Return the prompt that would be sent to the model
    ShowPrompt,
    Embedding,
    Summarize,
    Feedback,
}

impl Action {
    pub const ALL: [Action; 9] = [
        Action::RunSql,
        Action::ShowSql,
        Action::ExplainSql,
        Action::Narrate,
        Action::Chat,
        Action::ShowPrompt,
        Action::Embedding,
        Action::Summarize,
        Action::Feedback,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::RunSql => "runsql",
            Action::ShowSql => "showsql",
            Action::ExplainSql => "explainsql",
            Action::Narrate => "narrate",
            Action::Chat => "chat",
            Action::ShowPrompt => "showprompt",
            Action::Embedding => "embedding",
            Action::Summarize => "summarize",
            Action::Feedback => "feedback",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|a| a.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                Error::validation_with_context(
                    "unknown action",
                    ErrorContext::new().with_details(s.to_string()),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trip() {
        for action in Action::ALL {
            assert_eq!(action.as_str().parse::<Action>().unwrap(), action);
        }
        assert_eq!("RUNSQL".parse::<Action>().unwrap(), Action::RunSql);
        assert!("translate".parse::<Action>().is_err());
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(
            serde_json::to_string(&Action::ExplainSql).unwrap(),
            "\"explainsql\""
        );
    }
}
