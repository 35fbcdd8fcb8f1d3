//! Blocking gateway contract and its async bridge.

use super::{FunctionCall, Params, PipelineOutcome, RemoteCall, RemoteValue, ReturnType, Row};
use crate::Result;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

/// Blocking access to the remote procedural interface.
pub trait BlockingRemoteCall: Send + Sync + std::fmt::Debug {
    fn call_procedure(&self, name: &str, params: &Params) -> Result<()>;

    fn call_function(
        &self,
        name: &str,
        return_type: ReturnType,
        params: &Params,
    ) -> Result<RemoteValue>;

    fn execute_query(&self, sql: &str, params: &Params) -> Result<Vec<Row>>;

    fn execute(&self, sql: &str, params: &Params) -> Result<()> {
        self.execute_query(sql, params).map(|_| ())
    }

    fn run_pipeline(
        &self,
        calls: Vec<FunctionCall>,
        continue_on_error: bool,
    ) -> Result<Vec<PipelineOutcome>>;
}

/// Exposes a [`BlockingRemoteCall`] through the async contract.
///
/// Every future it returns completes on first poll, so the blocking facade can
/// drive the shared async code with [`block_on`] without a runtime.
#[derive(Debug, Clone)]
pub struct BlockingBridge {
    inner: Arc<dyn BlockingRemoteCall>,
}

impl BlockingBridge {
    pub fn new(inner: Arc<dyn BlockingRemoteCall>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl RemoteCall for BlockingBridge {
    async fn call_procedure(&self, name: &str, params: &Params) -> Result<()> {
        self.inner.call_procedure(name, params)
    }

    async fn call_function(
        &self,
        name: &str,
        return_type: ReturnType,
        params: &Params,
    ) -> Result<RemoteValue> {
        self.inner.call_function(name, return_type, params)
    }

    async fn execute_query(&self, sql: &str, params: &Params) -> Result<Vec<Row>> {
        self.inner.execute_query(sql, params)
    }

    async fn execute(&self, sql: &str, params: &Params) -> Result<()> {
        self.inner.execute(sql, params)
    }

    async fn run_pipeline(
        &self,
        calls: Vec<FunctionCall>,
        continue_on_error: bool,
    ) -> Result<Vec<PipelineOutcome>> {
        self.inner.run_pipeline(calls, continue_on_error)
    }
}

pub(crate) fn block_on<F: Future>(future: F) -> F::Output {
    futures::executor::block_on(future)
}
