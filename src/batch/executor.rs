//! Pipeline executor.

use super::request::PipelineRequest;
use crate::connection::Connection;
use crate::error::{Error, ErrorContext, RemoteError};
use crate::gateway::RemoteValue;
use crate::Result;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use uuid::Uuid;

/// Drained result of one pipeline slot.
pub type PipelineSlot = std::result::Result<Option<String>, RemoteError>;

/// Results of one pipeline submission; `results[i]` answers `requests[i]`.
#[derive(Debug, Clone)]
pub struct PipelineResults {
    pub batch_id: String,
    pub results: Vec<PipelineSlot>,
    pub execution_time: Duration,
}

impl PipelineResults {
    fn empty(batch_id: String) -> Self {
        Self {
            batch_id,
            results: Vec::new(),
            execution_time: Duration::ZERO,
        }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PipelineSlot> {
        self.results.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PipelineSlot> {
        self.results.iter()
    }

    pub fn into_results(self) -> Vec<PipelineSlot> {
        self.results
    }

    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(|r| r.is_ok())
    }

    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_ok()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.results.len() - self.success_count()
    }

    pub fn success_rate(&self) -> f64 {
        if self.results.is_empty() {
            0.0
        } else {
            self.success_count() as f64 / self.results.len() as f64
        }
    }
}

impl IntoIterator for PipelineResults {
    type Item = PipelineSlot;
    type IntoIter = std::vec::IntoIter<PipelineSlot>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}

#[derive(Debug, Clone)]
pub struct PipelineExecutorConfig {
    /// Keep going past failed requests; failures land in their slots.
    pub continue_on_error: bool,
}

impl Default for PipelineExecutorConfig {
    fn default() -> Self {
        Self {
            continue_on_error: true,
        }
    }
}

impl PipelineExecutorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_continue_on_error(mut self, c: bool) -> Self {
        self.continue_on_error = c;
        self
    }
}

/// Submits `GENERATE` requests for one profile as a single pipeline round trip.
#[derive(Debug, Clone)]
pub struct PipelineExecutor {
    conn: Connection,
    profile_name: String,
    config: PipelineExecutorConfig,
}

impl PipelineExecutor {
    pub fn new(conn: &Connection, profile_name: impl Into<String>) -> Self {
        Self {
            conn: conn.clone(),
            profile_name: profile_name.into(),
            config: PipelineExecutorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PipelineExecutorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &PipelineExecutorConfig {
        &self.config
    }

    pub async fn submit(&self, requests: Vec<PipelineRequest>) -> Result<PipelineResults> {
        let batch_id = Uuid::new_v4().to_string();
        let total = requests.len();
        if total == 0 {
            debug!(batch_id = %batch_id, "empty pipeline, nothing to send");
            return Ok(PipelineResults::empty(batch_id));
        }
        if let Some(max) = self.conn.config().max_pipeline_requests {
            if total > max {
                return Err(Error::validation_with_context(
                    "too many pipeline requests",
                    ErrorContext::new()
                        .with_details(format!("{} requests, limit {}", total, max))
                        .with_source("pipeline"),
                ));
            }
        }

        let calls = requests
            .iter()
            .map(|r| r.to_call(&self.profile_name))
            .collect::<Result<Vec<_>>>()?;

        let continue_on_error = self.config.continue_on_error;
        let start = Instant::now();
        let outcomes = self
            .conn
            .gateway()
            .run_pipeline(calls, continue_on_error)
            .await?;

        let mut slots: Vec<Option<std::result::Result<RemoteValue, RemoteError>>> =
            (0..total).map(|_| None).collect();
        for outcome in outcomes {
            let slot = slots.get_mut(outcome.index).ok_or_else(|| {
                contract_violation(
                    &batch_id,
                    format!("outcome index {} out of range for {} requests", outcome.index, total),
                )
            })?;
            if slot.is_some() {
                return Err(contract_violation(
                    &batch_id,
                    format!("duplicate outcome for index {}", outcome.index),
                ));
            }
            *slot = Some(outcome.result);
        }

        // fail-fast runs may leave slots unreported; the lowest failure wins
        if !continue_on_error {
            let first_failure = slots.iter().enumerate().find_map(|(index, slot)| match slot {
                Some(Err(err)) => Some((index, err.clone())),
                _ => None,
            });
            if let Some((index, err)) = first_failure {
                info!(batch_id = %batch_id, index, "pipeline stopped at failed request");
                return Err(Error::Remote(err));
            }
        }

        let chunk = self.conn.config().lob_chunk_size;
        let mut results = Vec::with_capacity(total);
        for (index, slot) in slots.into_iter().enumerate() {
            match slot {
                Some(Ok(value)) => results.push(Ok(value.into_text(chunk).await?)),
                Some(Err(err)) => results.push(Err(err)),
                None => {
                    return Err(contract_violation(
                        &batch_id,
                        format!("no outcome reported for index {}", index),
                    ))
                }
            }
        }

        let result = PipelineResults {
            batch_id,
            results,
            execution_time: start.elapsed(),
        };
        info!(
            batch_id = %result.batch_id,
            profile = %self.profile_name,
            requests = total,
            failures = result.failure_count(),
            duration_ms = result.execution_time.as_millis() as u64,
            "pipeline completed"
        );
        Ok(result)
    }
}

fn contract_violation(batch_id: &str, details: String) -> Error {
    Error::runtime_with_context(
        "pipeline outcomes do not match the submitted requests",
        ErrorContext::new()
            .with_details(details)
            .with_source(format!("pipeline {}", batch_id)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_counters() {
        let results = PipelineResults {
            batch_id: "b".into(),
            results: vec![
                Ok(Some("a".into())),
                Err(RemoteError::new(Some(20000), "boom")),
                Ok(None),
            ],
            execution_time: Duration::ZERO,
        };
        assert_eq!(results.len(), 3);
        assert_eq!(results.success_count(), 2);
        assert_eq!(results.failure_count(), 1);
        assert!(!results.all_succeeded());
        assert!((results.success_rate() - 2.0 / 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_results() {
        let results = PipelineResults::empty("b".into());
        assert!(results.is_empty());
        assert!(results.all_succeeded());
        assert_eq!(results.success_rate(), 0.0);
    }

    #[test]
    fn test_config_builder() {
        let config = PipelineExecutorConfig::new().with_continue_on_error(false);
        assert!(!config.continue_on_error);
        assert!(PipelineExecutorConfig::default().continue_on_error);
    }
}
