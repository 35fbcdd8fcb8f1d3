//! 管道批处理：一次往返提交多个生成请求，并按原顺序返回结果。
//!
//! # Pipeline Batching Module
//!
//! Submits many `(prompt, action)` generation requests against one profile in a
//! single round trip and hands the results back in request order, whatever
//! order the service reports them in.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`PipelineRequest`] | One prompt, its action and optional parameters |
//! | [`PipelineExecutor`] | Sends a batch and places outcomes by index |
//! | [`PipelineExecutorConfig`] | Fail-fast or continue-on-error |
//! | [`PipelineResults`] | Ordered slots of text or remote error |
//!
//! ## Failure modes
//!
//! - **continue_on_error = false**: the first failing request (in request
//!   order) is returned as the error and no results are produced
//! - **continue_on_error = true**: each slot holds its own text or error
//! - Missing, duplicate or out-of-range outcome indices are a runtime error

mod executor;
mod request;

pub use executor::{PipelineExecutor, PipelineExecutorConfig, PipelineResults, PipelineSlot};
pub use request::PipelineRequest;
pub(crate) use request::generate_params;
