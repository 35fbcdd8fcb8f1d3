use crate::error_code::RemoteErrorKind;
use std::fmt;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or attribute name that caused the error (e.g., "provider.azure_resource_name")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected type, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "profile.set_attribute", "pipeline")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Kind of named remote resource an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Profile,
    VectorIndex,
    Conversation,
    Credential,
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceType::Profile => "Profile",
            ResourceType::VectorIndex => "VectorIndex",
            ResourceType::Conversation => "Conversation",
            ResourceType::Credential => "Credential",
        };
        f.write_str(name)
    }
}

/// An error reported by the remote service, carried verbatim.
///
/// `code` is the structured error number when the gateway has one (for
/// `ORA-00955` that is `955`). A gateway that already knows what the failure
/// means can pin it with [`RemoteError::with_kind`]; otherwise the kind is
/// derived by [`crate::error_code::classify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    pub code: Option<i32>,
    pub message: String,
    kind: Option<RemoteErrorKind>,
}

impl RemoteError {
    pub fn new(code: Option<i32>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            kind: None,
        }
    }

    pub fn with_kind(mut self, kind: RemoteErrorKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn kind(&self) -> RemoteErrorKind {
        self.kind
            .unwrap_or_else(|| crate::error_code::classify(self.code, &self.message))
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) if !self.message.starts_with("ORA-") => {
                write!(f, "ORA-{:05}: {}", code, self.message)
            }
            _ => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for RemoteError {}

/// Unified error type for the Select AI client.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{resource} {name} not found")]
    NotFound { resource: ResourceType, name: String },

    #[error("{resource} {name} already exists")]
    AlreadyExists {
        resource: ResourceType,
        name: String,
        #[source]
        source: RemoteError,
    },

    #[error("Invalid provider: {value}")]
    InvalidProvider { value: String },

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Validation error: {message}{}", format_context(.context))]
    Validation {
        message: String,
        context: ErrorContext,
    },

    #[error("Runtime error: {message}{}", format_context(.context))]
    Runtime {
        message: String,
        context: ErrorContext,
    },

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    /// Create a new runtime error with structured context
    pub fn runtime_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Runtime {
            message: msg.into(),
            context,
        }
    }

    /// Create a new validation error with structured context
    pub fn validation_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Validation {
            message: msg.into(),
            context,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::validation_with_context(msg, ErrorContext::new())
    }

    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    pub fn not_found(resource: ResourceType, name: impl Into<String>) -> Self {
        Error::NotFound {
            resource,
            name: name.into(),
        }
    }

    pub fn invalid_provider(value: impl Into<String>) -> Self {
        Error::InvalidProvider {
            value: value.into(),
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. }
            | Error::Validation { context, .. }
            | Error::Runtime { context, .. } => Some(context),
            _ => None,
        }
    }

    /// The remote error behind this error, if the service produced it.
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            Error::Remote(err) | Error::AlreadyExists { source: err, .. } => Some(err),
            _ => None,
        }
    }

    /// Classified kind of the underlying remote error.
    pub fn remote_kind(&self) -> Option<RemoteErrorKind> {
        self.remote().map(RemoteError::kind)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Error::AlreadyExists { .. })
    }
}
