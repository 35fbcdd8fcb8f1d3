//! AI 服务提供方：判别值、变体字段与端点推导。
//!
//! Provider variant resolver.
//!
//! A profile names exactly one AI provider. Each provider contributes its own
//! fields (Azure deployment names, OCI compartment ids, ...) that travel in the
//! same flat payload as the generic profile fields. This module owns the
//! registry that tells the two apart and turns a discriminator plus a field
//! bag back into a typed [`ProviderAttributes`].
//!
//! | Provider | Variant fields | Endpoint |
//! |----------|----------------|----------|
//! | `oci` | `oci_apiformat`, `oci_compartment_id`, `oci_endpoint_id`, `oci_runtimetype` | none |
//! | `openai` | none | `api.openai.com` |
//! | `cohere` | none | `api.cohere.ai` |
//! | `azure` | `azure_deployment_name`, `azure_embedding_deployment_name`, `azure_resource_name` | `{azure_resource_name}.openai.azure.com` |
//! | `google` | none | `generativelanguage.googleapis.com` |
//! | `anthropic` | none | `api.anthropic.com` |
//! | `huggingface` | none | `api-inference.huggingface.co` |
//! | `aws` | `aws_apiformat` | `bedrock-runtime.{region}.amazonaws.com` |
//!
//! Remote data with a missing or unrecognized discriminator resolves to
//! [`ProviderVariant::Generic`]; a caller naming an unknown provider gets
//! [`Error::InvalidProvider`].

use crate::attributes::{
    coerce, normalize_payload, serde_from_payload, serde_to_payload, unknown_field,
    AttributeContainer, FieldKind,
};
use crate::error::{Error, ErrorContext};
use crate::Result;
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Oci,
    OpenAi,
    Cohere,
    Azure,
    Google,
    Anthropic,
    HuggingFace,
    Aws,
}

struct VariantSpec {
    provider: Provider,
    fields: &'static [&'static str],
    default_endpoint: Option<&'static str>,
}

static REGISTRY: [VariantSpec; 8] = [
    VariantSpec {
        provider: Provider::Oci,
        fields: &[
            "oci_apiformat",
            "oci_compartment_id",
            "oci_endpoint_id",
            "oci_runtimetype",
        ],
        default_endpoint: None,
    },
    VariantSpec {
        provider: Provider::OpenAi,
        fields: &[],
        default_endpoint: Some("api.openai.com"),
    },
    VariantSpec {
        provider: Provider::Cohere,
        fields: &[],
        default_endpoint: Some("api.cohere.ai"),
    },
    VariantSpec {
        provider: Provider::Azure,
        fields: &[
            "azure_deployment_name",
            "azure_embedding_deployment_name",
            "azure_resource_name",
        ],
        default_endpoint: None,
    },
    VariantSpec {
        provider: Provider::Google,
        fields: &[],
        default_endpoint: Some("generativelanguage.googleapis.com"),
    },
    VariantSpec {
        provider: Provider::Anthropic,
        fields: &[],
        default_endpoint: Some("api.anthropic.com"),
    },
    VariantSpec {
        provider: Provider::HuggingFace,
        fields: &[],
        default_endpoint: Some("api-inference.huggingface.co"),
    },
    VariantSpec {
        provider: Provider::Aws,
        fields: &["aws_apiformat"],
        default_endpoint: None,
    },
];

/// Fields shared by every provider variant.
pub const COMMON_PROVIDER_FIELDS: &[&str] = &[
    "provider",
    "model",
    "embedding_model",
    "region",
    "provider_endpoint",
];

static PROVIDER_FIELD_TABLE: Lazy<Vec<(&'static str, FieldKind)>> = Lazy::new(|| {
    COMMON_PROVIDER_FIELDS
        .iter()
        .copied()
        .chain(REGISTRY.iter().flat_map(|spec| spec.fields.iter().copied()))
        .map(|name| (name, FieldKind::Str))
        .collect()
});

static PROVIDER_OWNED: Lazy<HashSet<&'static str>> =
    Lazy::new(|| PROVIDER_FIELD_TABLE.iter().map(|(name, _)| *name).collect());

impl Provider {
    pub const ALL: [Provider; 8] = [
        Provider::Oci,
        Provider::OpenAi,
        Provider::Cohere,
        Provider::Azure,
        Provider::Google,
        Provider::Anthropic,
        Provider::HuggingFace,
        Provider::Aws,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Provider::Oci => "oci",
            Provider::OpenAi => "openai",
            Provider::Cohere => "cohere",
            Provider::Azure => "azure",
            Provider::Google => "google",
            Provider::Anthropic => "anthropic",
            Provider::HuggingFace => "huggingface",
            Provider::Aws => "aws",
        }
    }

    /// Registry lookup; case-insensitive.
    pub fn from_id(id: &str) -> Option<Self> {
        let id = id.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.id().eq_ignore_ascii_case(id))
    }

    fn spec(&self) -> &'static VariantSpec {
        // REGISTRY is declared in ALL order
        let spec = &REGISTRY[*self as usize];
        debug_assert_eq!(spec.provider, *self);
        spec
    }

    /// Field names owned by this variant only.
    pub fn variant_fields(&self) -> &'static [&'static str] {
        self.spec().fields
    }

    /// Static endpoint, for providers that have one.
    pub fn default_endpoint(&self) -> Option<&'static str> {
        self.spec().default_endpoint
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_id(s).ok_or_else(|| Error::invalid_provider(s))
    }
}

/// Whether `name` belongs to the provider namespace rather than the profile.
pub fn is_provider_field(name: &str) -> bool {
    PROVIDER_OWNED.contains(name)
}

/// Partitions a flat payload into `(generic, provider)` halves.
pub fn split_fields(flat: Map<String, Value>) -> (Map<String, Value>, Map<String, Value>) {
    let mut generic = Map::new();
    let mut provider = Map::new();
    for (name, value) in flat {
        if is_provider_field(&name.to_ascii_lowercase()) {
            provider.insert(name, value);
        } else {
            generic.insert(name, value);
        }
    }
    (generic, provider)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OciFields {
    pub oci_apiformat: Option<String>,
    pub oci_compartment_id: Option<String>,
    pub oci_endpoint_id: Option<String>,
    pub oci_runtimetype: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AzureFields {
    pub azure_deployment_name: Option<String>,
    pub azure_embedding_deployment_name: Option<String>,
    pub azure_resource_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwsFields {
    pub aws_apiformat: Option<String>,
}

/// The active provider and the fields only it understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderVariant {
    Oci(OciFields),
    OpenAi,
    Cohere,
    Azure(AzureFields),
    Google,
    Anthropic,
    HuggingFace,
    Aws(AwsFields),
    /// Read from the service with a missing or unrecognized discriminator.
    Generic { provider: Option<String> },
}

impl Default for ProviderVariant {
    fn default() -> Self {
        ProviderVariant::Generic { provider: None }
    }
}

impl ProviderVariant {
    pub fn empty(provider: Provider) -> Self {
        match provider {
            Provider::Oci => ProviderVariant::Oci(OciFields::default()),
            Provider::OpenAi => ProviderVariant::OpenAi,
            Provider::Cohere => ProviderVariant::Cohere,
            Provider::Azure => ProviderVariant::Azure(AzureFields::default()),
            Provider::Google => ProviderVariant::Google,
            Provider::Anthropic => ProviderVariant::Anthropic,
            Provider::HuggingFace => ProviderVariant::HuggingFace,
            Provider::Aws => ProviderVariant::Aws(AwsFields::default()),
        }
    }

    pub fn provider(&self) -> Option<Provider> {
        match self {
            ProviderVariant::Oci(_) => Some(Provider::Oci),
            ProviderVariant::OpenAi => Some(Provider::OpenAi),
            ProviderVariant::Cohere => Some(Provider::Cohere),
            ProviderVariant::Azure(_) => Some(Provider::Azure),
            ProviderVariant::Google => Some(Provider::Google),
            ProviderVariant::Anthropic => Some(Provider::Anthropic),
            ProviderVariant::HuggingFace => Some(Provider::HuggingFace),
            ProviderVariant::Aws(_) => Some(Provider::Aws),
            ProviderVariant::Generic { .. } => None,
        }
    }

    /// Discriminator as it goes on the wire.
    pub fn discriminator(&self) -> Option<&str> {
        match self {
            ProviderVariant::Generic { provider } => provider.as_deref(),
            known => known.provider().map(|p| p.id()),
        }
    }

    fn fields_payload(&self) -> Result<Map<String, Value>> {
        match self {
            ProviderVariant::Oci(fields) => serde_to_payload(fields, false),
            ProviderVariant::Azure(fields) => serde_to_payload(fields, false),
            ProviderVariant::Aws(fields) => serde_to_payload(fields, false),
            _ => Ok(Map::new()),
        }
    }

    fn from_fields(provider: Provider, mut fields: Map<String, Value>) -> Result<Self> {
        fields.retain(|name, _| {
            let owned = provider.variant_fields().contains(&name.as_str());
            if !owned {
                debug!(attribute = %name, provider = %provider, "dropping field of another provider");
            }
            owned
        });
        let variant = match provider {
            Provider::Oci => ProviderVariant::Oci(serde_from_payload(fields)?),
            Provider::Azure => ProviderVariant::Azure(serde_from_payload(fields)?),
            Provider::Aws => ProviderVariant::Aws(serde_from_payload(fields)?),
            other => ProviderVariant::empty(other),
        };
        Ok(variant)
    }

    fn set_field(&mut self, name: &str, value: Option<String>) -> Result<()> {
        let applied = match self {
            ProviderVariant::Oci(fields) => set_struct_field(fields, name, value)?,
            ProviderVariant::Azure(fields) => set_struct_field(fields, name, value)?,
            ProviderVariant::Aws(fields) => set_struct_field(fields, name, value)?,
            _ => false,
        };
        if applied {
            Ok(())
        } else {
            Err(Error::validation_with_context(
                "attribute does not belong to the active provider",
                ErrorContext::new()
                    .with_field_path(name)
                    .with_details(format!(
                        "provider: {}",
                        self.discriminator().unwrap_or("<unset>")
                    )),
            ))
        }
    }
}

fn set_struct_field<T>(fields: &mut T, name: &str, value: Option<String>) -> Result<bool>
where
    T: Serialize + DeserializeOwned,
{
    let mut payload = serde_to_payload(fields, false)?;
    if !payload.contains_key(name) {
        return Ok(false);
    }
    payload.insert(name.to_string(), value.map(Value::String).unwrap_or(Value::Null));
    *fields = serde_from_payload(payload)?;
    Ok(true)
}

/// Provider settings of a profile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderAttributes {
    pub model: Option<String>,
    pub embedding_model: Option<String>,
    pub region: Option<String>,
    pub provider_endpoint: Option<String>,
    pub variant: ProviderVariant,
}

impl ProviderAttributes {
    pub fn new(provider: Provider) -> Self {
        Self::from_variant(ProviderVariant::empty(provider))
    }

    pub fn from_variant(variant: ProviderVariant) -> Self {
        let mut attrs = Self {
            variant,
            ..Default::default()
        };
        attrs.refresh_endpoint();
        attrs
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = Some(model.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self.refresh_endpoint();
        self
    }

    pub fn with_provider_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.provider_endpoint = Some(endpoint.into());
        self.refresh_endpoint();
        self
    }

    /// Sets a variant-specific field by name, e.g. `azure_resource_name`.
    pub fn with_field(mut self, name: &str, value: impl Into<String>) -> Result<Self> {
        self.set_field(name, Value::String(value.into()))?;
        Ok(self)
    }

    pub fn provider(&self) -> Option<Provider> {
        self.variant.provider()
    }

    /// Fills or recomputes `provider_endpoint`. Azure derives it from
    /// `azure_resource_name`, AWS from `region`; other providers only fill a
    /// missing value from their static default. Idempotent.
    pub fn refresh_endpoint(&mut self) {
        if let Some(endpoint) = self.derived_endpoint() {
            self.provider_endpoint = Some(endpoint);
        } else if self.provider_endpoint.is_none() {
            self.provider_endpoint = self
                .provider()
                .and_then(|p| p.default_endpoint())
                .map(str::to_string);
        }
    }

    fn derived_endpoint(&self) -> Option<String> {
        match &self.variant {
            ProviderVariant::Azure(fields) => fields
                .azure_resource_name
                .as_ref()
                .map(|name| format!("{}.openai.azure.com", name)),
            ProviderVariant::Aws(_) => self
                .region
                .as_ref()
                .map(|region| format!("bedrock-runtime.{}.amazonaws.com", region)),
            _ => None,
        }
    }

    fn switch_provider(&mut self, provider: Provider) {
        if self.provider() == Some(provider) {
            return;
        }
        let stale = self.derived_endpoint().or_else(|| {
            self.provider()
                .and_then(|p| p.default_endpoint())
                .map(str::to_string)
        });
        if stale.is_some() && stale == self.provider_endpoint {
            self.provider_endpoint = None;
        }
        self.variant = ProviderVariant::empty(provider);
    }
}

fn take_text(map: &mut Map<String, Value>, name: &str) -> Option<String> {
    match map.remove(name)? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// Builds provider attributes from a discriminator and the provider-owned
/// half of a payload. Fields owned by other variants are dropped.
pub fn resolve(discriminator: Option<&str>, fields: Map<String, Value>) -> Result<ProviderAttributes> {
    let mut fields: Map<String, Value> = fields
        .into_iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value))
        .collect();
    fields.remove("provider");
    let model = take_text(&mut fields, "model");
    let embedding_model = take_text(&mut fields, "embedding_model");
    let region = take_text(&mut fields, "region");
    let provider_endpoint = take_text(&mut fields, "provider_endpoint");

    let variant = match discriminator.and_then(Provider::from_id) {
        Some(provider) => ProviderVariant::from_fields(provider, fields)?,
        None => {
            if let Some(raw) = discriminator {
                debug!(provider = %raw, "unrecognized provider, keeping generic variant");
            }
            ProviderVariant::Generic {
                provider: discriminator.map(str::to_string),
            }
        }
    };

    let mut attrs = ProviderAttributes {
        model,
        embedding_model,
        region,
        provider_endpoint,
        variant,
    };
    attrs.refresh_endpoint();
    Ok(attrs)
}

impl AttributeContainer for ProviderAttributes {
    fn fields() -> &'static [(&'static str, FieldKind)] {
        PROVIDER_FIELD_TABLE.as_slice()
    }

    fn to_payload(&self, exclude_null: bool) -> Result<Map<String, Value>> {
        let text = |v: &Option<String>| v.clone().map(Value::String).unwrap_or(Value::Null);
        let mut payload = Map::new();
        payload.insert(
            "provider".into(),
            self.variant
                .discriminator()
                .map(|d| Value::String(d.to_string()))
                .unwrap_or(Value::Null),
        );
        payload.insert("model".into(), text(&self.model));
        payload.insert("embedding_model".into(), text(&self.embedding_model));
        payload.insert("region".into(), text(&self.region));
        payload.insert("provider_endpoint".into(), text(&self.provider_endpoint));
        payload.extend(self.variant.fields_payload()?);
        if exclude_null {
            payload.retain(|_, v| !v.is_null());
        }
        Ok(payload)
    }

    fn from_payload(payload: Map<String, Value>) -> Result<Self> {
        let mut normalized = normalize_payload::<Self>(payload)?;
        let discriminator = take_text(&mut normalized, "provider");
        resolve(discriminator.as_deref(), normalized)
    }

    fn set_field(&mut self, name: &str, value: Value) -> Result<()> {
        let key = name.to_ascii_lowercase();
        if !is_provider_field(&key) {
            return Err(unknown_field(&key));
        }
        let text = match coerce(FieldKind::Str, &key, value)? {
            Value::String(s) => Some(s),
            _ => None,
        };
        match key.as_str() {
            "provider" => match text {
                Some(id) => self.switch_provider(id.parse()?),
                None => self.variant = ProviderVariant::default(),
            },
            "model" => self.model = text,
            "embedding_model" => self.embedding_model = text,
            "region" => self.region = text,
            "provider_endpoint" => self.provider_endpoint = text,
            _ => self.variant.set_field(&key, text)?,
        }
        self.refresh_endpoint();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_registry_order_matches_enum() {
        for provider in Provider::ALL {
            assert_eq!(provider.spec().provider, provider);
            assert_eq!(Provider::from_id(provider.id()), Some(provider));
        }
        assert_eq!(Provider::from_id("OpenAI"), Some(Provider::OpenAi));
    }

    #[test]
    fn test_unknown_provider_string_is_invalid() {
        let err = "watsonx".parse::<Provider>().unwrap_err();
        assert!(matches!(err, Error::InvalidProvider { ref value } if value == "watsonx"));
    }

    #[test]
    fn test_static_default_endpoints() {
        assert_eq!(
            ProviderAttributes::new(Provider::OpenAi).provider_endpoint.as_deref(),
            Some("api.openai.com")
        );
        assert_eq!(
            ProviderAttributes::new(Provider::HuggingFace).provider_endpoint.as_deref(),
            Some("api-inference.huggingface.co")
        );
        assert_eq!(ProviderAttributes::new(Provider::Oci).provider_endpoint, None);
    }

    #[test]
    fn test_azure_endpoint_tracks_resource_name() {
        let mut attrs = ProviderAttributes::new(Provider::Azure)
            .with_field("azure_resource_name", "contoso")
            .unwrap();
        assert_eq!(
            attrs.provider_endpoint.as_deref(),
            Some("contoso.openai.azure.com")
        );
        attrs
            .set_field("azure_resource_name", json!("fabrikam"))
            .unwrap();
        assert_eq!(
            attrs.provider_endpoint.as_deref(),
            Some("fabrikam.openai.azure.com")
        );
        let before = attrs.clone();
        attrs.refresh_endpoint();
        assert_eq!(attrs, before);
    }

    #[test]
    fn test_aws_endpoint_from_region() {
        let attrs = ProviderAttributes::new(Provider::Aws).with_region("us-east-1");
        assert_eq!(
            attrs.provider_endpoint.as_deref(),
            Some("bedrock-runtime.us-east-1.amazonaws.com")
        );
    }

    #[test]
    fn test_resolve_unknown_discriminator_is_generic() {
        let mut fields = Map::new();
        fields.insert("model".into(), json!("granite"));
        fields.insert("azure_resource_name".into(), json!("ignored"));
        let attrs = resolve(Some("watsonx"), fields).unwrap();
        assert_eq!(
            attrs.variant,
            ProviderVariant::Generic {
                provider: Some("watsonx".into())
            }
        );
        assert_eq!(attrs.model.as_deref(), Some("granite"));
        assert_eq!(attrs.provider_endpoint, None);
    }

    #[test]
    fn test_resolve_routes_only_owned_fields() {
        let mut fields = Map::new();
        fields.insert("oci_compartment_id".into(), json!("ocid1.compartment"));
        fields.insert("azure_resource_name".into(), json!("other"));
        let attrs = resolve(Some("oci"), fields).unwrap();
        match attrs.variant {
            ProviderVariant::Oci(ref oci) => {
                assert_eq!(oci.oci_compartment_id.as_deref(), Some("ocid1.compartment"))
            }
            ref other => panic!("unexpected variant {:?}", other),
        }
    }

    #[test]
    fn test_set_field_rejects_foreign_variant_field() {
        let mut attrs = ProviderAttributes::new(Provider::Oci);
        let err = attrs
            .set_field("azure_resource_name", json!("contoso"))
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
        assert!(matches!(
            attrs.set_field("provider", json!("bard")),
            Err(Error::InvalidProvider { .. })
        ));
    }

    #[test]
    fn test_switching_provider_drops_stale_default_endpoint() {
        let mut attrs = ProviderAttributes::new(Provider::OpenAi);
        attrs.set_field("provider", json!("cohere")).unwrap();
        assert_eq!(attrs.provider_endpoint.as_deref(), Some("api.cohere.ai"));

        let mut custom = ProviderAttributes::new(Provider::OpenAi)
            .with_provider_endpoint("proxy.internal");
        custom.set_field("provider", json!("cohere")).unwrap();
        assert_eq!(custom.provider_endpoint.as_deref(), Some("proxy.internal"));
    }

    #[test]
    fn test_payload_round_trip() {
        let attrs = ProviderAttributes::new(Provider::Azure)
            .with_model("gpt-4o")
            .with_field("azure_deployment_name", "prod")
            .unwrap()
            .with_field("azure_resource_name", "contoso")
            .unwrap();
        let payload = attrs.to_payload(true).unwrap();
        assert_eq!(payload.get("provider"), Some(&json!("azure")));
        assert!(!payload.contains_key("embedding_model"));
        assert_eq!(ProviderAttributes::from_payload(payload).unwrap(), attrs);
    }

    #[test]
    fn test_split_fields_partitions() {
        let flat = json!({
            "provider": "oci",
            "oci_compartment_id": "c1",
            "temperature": 0.2,
            "credential_name": "OCI_CRED"
        });
        let Value::Object(flat) = flat else { unreachable!() };
        let (generic, provider) = split_fields(flat);
        assert_eq!(generic.keys().collect::<Vec<_>>(), vec!["temperature", "credential_name"]);
        assert_eq!(provider.keys().collect::<Vec<_>>(), vec!["provider", "oci_compartment_id"]);
    }
}
