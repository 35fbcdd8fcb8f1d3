//! Connections: a gateway plus the client settings that travel with it.

use crate::config::SelectAiConfig;
use crate::gateway::{BlockingBridge, BlockingRemoteCall, RemoteCall};
use crate::Result;
use std::sync::Arc;

/// Asynchronous connection. Cheap to clone and shareable across tasks when the
/// underlying gateway supports concurrent calls.
#[derive(Debug, Clone)]
pub struct Connection {
    gateway: Arc<dyn RemoteCall>,
    config: Arc<SelectAiConfig>,
}

impl Connection {
    /// Connection with default settings.
    pub fn new(gateway: Arc<dyn RemoteCall>) -> Self {
        Self {
            gateway,
            config: Arc::new(SelectAiConfig::default()),
        }
    }

    pub fn builder() -> ConnectionBuilder {
        ConnectionBuilder::new()
    }

    pub fn gateway(&self) -> &dyn RemoteCall {
        self.gateway.as_ref()
    }

    pub fn config(&self) -> &SelectAiConfig {
        &self.config
    }
}

/// Blocking connection. Wraps a [`BlockingRemoteCall`]; every operation on
/// objects opened through it blocks the calling thread.
#[derive(Debug, Clone)]
pub struct BlockingConnection {
    inner: Connection,
}

impl BlockingConnection {
    pub fn new(gateway: Arc<dyn BlockingRemoteCall>) -> Self {
        Self {
            inner: Connection::new(Arc::new(BlockingBridge::new(gateway))),
        }
    }

    pub fn builder() -> ConnectionBuilder {
        ConnectionBuilder::new()
    }

    pub fn config(&self) -> &SelectAiConfig {
        self.inner.config()
    }

    pub(crate) fn as_async(&self) -> &Connection {
        &self.inner
    }
}

/// Builder for [`Connection`] and [`BlockingConnection`].
pub struct ConnectionBuilder {
    config: SelectAiConfig,
}

impl ConnectionBuilder {
    pub fn new() -> Self {
        Self {
            config: SelectAiConfig::default(),
        }
    }

    /// Replace all settings.
    pub fn config(mut self, config: SelectAiConfig) -> Self {
        self.config = config;
        self
    }

    /// Overlay `SELECT_AI_*` environment variables on the current settings.
    pub fn from_env(mut self) -> Self {
        self.config = self.config.with_env_overrides();
        self
    }

    pub fn lob_chunk_size(mut self, bytes: usize) -> Self {
        self.config.lob_chunk_size = bytes.max(1);
        self
    }

    pub fn default_list_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.config.default_list_pattern = pattern.into();
        self
    }

    pub fn normalize_names(mut self, enable: bool) -> Self {
        self.config.normalize_names = enable;
        self
    }

    /// Refuse pipeline submissions with more than `n` requests.
    pub fn max_pipeline_requests(mut self, n: usize) -> Self {
        self.config.max_pipeline_requests = Some(n);
        self
    }

    pub fn build(self, gateway: Arc<dyn RemoteCall>) -> Result<Connection> {
        self.config.validate()?;
        Ok(Connection {
            gateway,
            config: Arc::new(self.config),
        })
    }

    pub fn build_blocking(self, gateway: Arc<dyn BlockingRemoteCall>) -> Result<BlockingConnection> {
        let inner = self.build(Arc::new(BlockingBridge::new(gateway)))?;
        Ok(BlockingConnection { inner })
    }
}

impl Default for ConnectionBuilder {
    fn default() -> Self {
        Self::new()
    }
}
