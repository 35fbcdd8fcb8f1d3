//! 远程调用网关：对服务端存储过程、函数、查询与管道执行的抽象。
//!
//! Remote call gateway.
//!
//! Everything this crate does to the service goes through [`RemoteCall`]
//! (asynchronous) or [`BlockingRemoteCall`] (blocking). Concrete database
//! drivers implement one of the two; the crate ships none.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`RemoteCall`] | Async procedure / function / query / pipeline contract |
//! | [`BlockingRemoteCall`] | Blocking twin of [`RemoteCall`] |
//! | [`BlockingBridge`] | Adapts a blocking gateway to the async contract |
//! | [`RemoteValue`] | Scalar or large object result |
//! | [`LargeObject`] | Reader or byte stream that must be drained |
//! | [`PipelineOutcome`] | Indexed per-call result of a pipeline run |

mod blocking;
mod value;

pub use blocking::{BlockingBridge, BlockingRemoteCall};
pub(crate) use blocking::block_on;
pub use value::{
    FunctionCall, LargeObject, Params, PipelineOutcome, RemoteValue, ReturnType, Row,
};

use crate::Result;
use async_trait::async_trait;

/// Asynchronous access to the remote procedural interface.
///
/// Implementations report service failures as [`crate::Error::Remote`] so the
/// reconciliation logic can classify them.
#[async_trait]
pub trait RemoteCall: Send + Sync + std::fmt::Debug {
    /// Invoke a stored procedure with named parameters.
    async fn call_procedure(&self, name: &str, params: &Params) -> Result<()>;

    /// Invoke a stored function with named parameters.
    async fn call_function(
        &self,
        name: &str,
        return_type: ReturnType,
        params: &Params,
    ) -> Result<RemoteValue>;

    /// Run a query with bind parameters and return every row.
    async fn execute_query(&self, sql: &str, params: &Params) -> Result<Vec<Row>>;

    /// Run a statement that produces no rows (PL/SQL blocks, grants).
    async fn execute(&self, sql: &str, params: &Params) -> Result<()> {
        self.execute_query(sql, params).await.map(|_| ())
    }

    /// Submit `calls` in a single round trip.
    ///
    /// With `continue_on_error = false` the service may stop at the first
    /// failure; the outcomes reported so far are returned, the failing one
    /// included.
    async fn run_pipeline(
        &self,
        calls: Vec<FunctionCall>,
        continue_on_error: bool,
    ) -> Result<Vec<PipelineOutcome>>;
}
