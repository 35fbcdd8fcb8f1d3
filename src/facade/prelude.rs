//! Minimal prelude for application code.
//!
//! Covers both facades; the raw gateway traits are included so test doubles
//! and drivers can be written against the same import.

pub use crate::action::Action;
pub use crate::attributes::AttributeContainer;
pub use crate::batch::{PipelineRequest, PipelineResults};
pub use crate::connection::{BlockingConnection, Connection, ConnectionBuilder};
pub use crate::conversation::{AsyncConversation, Conversation, ConversationAttributes};
pub use crate::error::{Error, RemoteError, ResourceType};
pub use crate::gateway::{BlockingRemoteCall, Params, RemoteCall};
pub use crate::profile::{AsyncProfile, Profile, ProfileAttributes, ProfileOptions};
pub use crate::provider::{Provider, ProviderAttributes};
pub use crate::resource::ResourceState;
pub use crate::session::{AsyncSession, Session};
pub use crate::vector_index::{
    AsyncVectorIndex, VectorIndex, VectorIndexAttributes, VectorIndexOptions,
};
