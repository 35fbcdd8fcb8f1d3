//! # select-ai-rust
//!
//! Select AI 客户端库：在远端过程式服务上管理 AI 配置文件、向量索引与会话，并批量提交生成请求。
//!
//! Client library for Select AI. Profiles, vector indexes and conversations
//! are named objects stored and interpreted by a remote procedural service;
//! this crate keeps local handles reconciled with them and issues
//! natural-language requests (`showsql`, `runsql`, `chat`, ...) on their behalf.
//!
//! ## Overview
//!
//! All inference happens remotely. The client side is made of two engines:
//!
//! - **Resource reconciliation**: create, fetch, merge and replace named
//!   resources with at most one drop-and-recreate on conflict
//! - **Pipeline batching**: many `(prompt, action)` requests in one round
//!   trip, results returned in request order
//!
//! Every operation exists twice, once `async` ([`AsyncProfile`],
//! [`AsyncVectorIndex`], [`AsyncConversation`]) and once blocking
//! ([`Profile`], [`VectorIndex`], [`Conversation`]). Both run the same code.
//!
//! The database driver is not part of the crate: implement
//! [`gateway::RemoteCall`] (or [`gateway::BlockingRemoteCall`]) and hand it
//! to [`ConnectionBuilder`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use select_ai_rust::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn demo(driver: Arc<dyn RemoteCall>) -> select_ai_rust::Result<()> {
//! let conn = Connection::builder().from_env().build(driver)?;
//! let profile = AsyncProfile::fetch(&conn, "OCI_AI").await?;
//!
//! let results = profile
//!     .run_pipeline(
//!         vec![
//!             PipelineRequest::new("How many customers?", Action::ShowSql),
//!             PipelineRequest::new("What is a vector index?", Action::Chat),
//!         ],
//!         true,
//!     )
//!     .await?;
//! for slot in results {
//!     println!("{:?}", slot);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`attributes`] | Typed attribute containers, coercion and merge |
//! | [`provider`] | Provider discriminators, variant fields, endpoint derivation |
//! | [`resource`] | Reconciliation engine shared by named resources |
//! | [`profile`] | AI profiles and generation actions |
//! | [`vector_index`] | Vector indexes |
//! | [`conversation`] | Conversations |
//! | [`session`] | Request parameters persisted across calls |
//! | [`batch`] | Pipeline batching |
//! | [`gateway`] | Remote call traits and value types |
//! | [`connection`] | Async and blocking connections |
//! | [`admin`] | Credentials and provider network access |
//! | [`synthetic_data`] | Synthetic data generation requests |
//! | [`config`] | Client configuration (env / YAML) |

pub mod action;
pub mod admin;
pub mod attributes;
pub mod batch;
pub mod config;
pub mod connection;
pub mod conversation;
pub mod error_code;
pub mod facade;
pub mod gateway;
pub mod profile;
pub mod provider;
pub mod resource;
pub mod session;
pub mod sql;
pub mod synthetic_data;
pub mod vector_index;

/// Error type for the library
pub mod error;

pub use action::Action;
pub use attributes::{AttributeContainer, FieldKind};
pub use batch::{PipelineExecutor, PipelineExecutorConfig, PipelineRequest, PipelineResults};
pub use config::SelectAiConfig;
pub use connection::{BlockingConnection, Connection, ConnectionBuilder};
pub use conversation::{AsyncConversation, Conversation, ConversationAttributes};
pub use error::{Error, ErrorContext, RemoteError, ResourceType};
pub use error_code::RemoteErrorKind;
pub use facade::prelude;
pub use profile::{AsyncProfile, Profile, ProfileAttributes, ProfileOptions};
pub use provider::{Provider, ProviderAttributes, ProviderVariant};
pub use resource::{ResourceOptions, ResourceState};
pub use session::{AsyncSession, Session};
pub use synthetic_data::{SyntheticDataAttributes, SyntheticDataParams};
pub use vector_index::{
    AsyncVectorIndex, VectorDbProvider, VectorDistanceMetric, VectorIndex,
    VectorIndexAttributes, VectorIndexOptions,
};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;
