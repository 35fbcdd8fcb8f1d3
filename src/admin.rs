//! 管理操作：凭据与提供方网络访问。
//!
//! Administrative operations.
//!
//! | Operation | Remote effect |
//! |-----------|---------------|
//! | [`create_credential`] | `DBMS_CLOUD.CREATE_CREDENTIAL`, drop-and-recreate on `replace` |
//! | [`drop_credential`] | `DBMS_CLOUD.DROP_CREDENTIAL`, `force` tolerates a missing credential |
//! | [`enable_provider`] | grants the AI packages and appends a host ACE per user |
//! | [`disable_provider`] | revokes the packages and removes the host ACE |
//!
//! The [`blocking`] module mirrors every operation for
//! [`BlockingConnection`](crate::connection::BlockingConnection).

use crate::attributes::serde_to_payload;
use crate::connection::Connection;
use crate::error::{Error, ErrorContext, ResourceType};
use crate::gateway::Params;
use crate::resource::{create_or_replace, drop_tolerant, validate_name, ProcedureCall};
use crate::sql;
use crate::Result;
use keyring::Entry;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// Keyring service under which credential secrets are looked up.
pub const KEYRING_SERVICE: &str = "select-ai";

static USER_NAME: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_$#]{0,127}$").ok());

/// A cloud credential. Either `username`/`password` or the OCI API key
/// fields are expected, as the service requires.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub credential_name: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub user_ocid: Option<String>,
    pub tenancy_ocid: Option<String>,
    pub private_key: Option<String>,
    pub fingerprint: Option<String>,
}

impl Credential {
    pub fn new(credential_name: impl Into<String>) -> Self {
        Self {
            credential_name: credential_name.into(),
            ..Default::default()
        }
    }

    pub fn with_password(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_api_key(
        mut self,
        user_ocid: impl Into<String>,
        tenancy_ocid: impl Into<String>,
        private_key: impl Into<String>,
        fingerprint: impl Into<String>,
    ) -> Self {
        self.user_ocid = Some(user_ocid.into());
        self.tenancy_ocid = Some(tenancy_ocid.into());
        self.private_key = Some(private_key.into());
        self.fingerprint = Some(fingerprint.into());
        self
    }

    /// Reads the password for `username` from the OS keyring
    /// (service [`KEYRING_SERVICE`]).
    pub fn with_keyring_password(mut self, username: impl Into<String>) -> Result<Self> {
        let username = username.into();
        let password = Entry::new(KEYRING_SERVICE, &username)?.get_password()?;
        self.username = Some(username);
        self.password = Some(password);
        Ok(self)
    }

    fn create_params(&self) -> Result<Params> {
        validate_name(ResourceType::Credential, &self.credential_name)?;
        serde_to_payload(self, true)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("Credential")
            .field("credential_name", &self.credential_name)
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("user_ocid", &self.user_ocid)
            .field("tenancy_ocid", &self.tenancy_ocid)
            .field("private_key", &redact(&self.private_key))
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}

// DROP_CREDENTIAL takes no force flag; a missing credential is tolerated client-side.
fn drop_call(name: &str) -> ProcedureCall {
    let mut params = Params::new();
    params.insert("credential_name".into(), name.into());
    ProcedureCall::new(sql::DROP_CREDENTIAL, params)
}

/// Creates `credential`. An existing credential of the same name is an
/// [`Error::AlreadyExists`] unless `replace` is set.
pub async fn create_credential(conn: &Connection, credential: &Credential, replace: bool) -> Result<()> {
    let create = ProcedureCall::new(sql::CREATE_CREDENTIAL, credential.create_params()?);
    let drop = drop_call(&credential.credential_name);
    create_or_replace(
        conn,
        ResourceType::Credential,
        &credential.credential_name,
        &create,
        &drop,
        replace,
    )
    .await?;
    info!(credential = %credential.credential_name, "credential created");
    Ok(())
}

pub async fn drop_credential(conn: &Connection, name: &str, force: bool) -> Result<()> {
    validate_name(ResourceType::Credential, name)?;
    drop_tolerant(
        conn,
        ResourceType::Credential,
        name,
        &drop_call(name),
        force,
    )
    .await
}

fn validate_user(user: &str) -> Result<()> {
    let valid = USER_NAME.as_ref().is_some_and(|re| re.is_match(user));
    if valid {
        Ok(())
    } else {
        Err(Error::validation_with_context(
            "invalid database user name",
            ErrorContext::new()
                .with_field_path("users")
                .with_details(user.to_string()),
        ))
    }
}

fn validate_users<S: AsRef<str>>(users: &[S]) -> Result<()> {
    if users.is_empty() {
        return Err(Error::validation_with_context(
            "at least one user is required",
            ErrorContext::new().with_field_path("users"),
        ));
    }
    users.iter().try_for_each(|u| validate_user(u.as_ref()))
}

fn acl_params(host: &str, user: &str) -> Params {
    let mut params = Params::new();
    params.insert("host".into(), host.into());
    params.insert("user".into(), user.into());
    params
}

/// Grants `users` the AI packages and network access to `provider_endpoint`.
/// Every user name is checked before anything is sent.
pub async fn enable_provider<S: AsRef<str>>(
    conn: &Connection,
    users: &[S],
    provider_endpoint: &str,
) -> Result<()> {
    validate_users(users)?;
    let gateway = conn.gateway();
    for user in users {
        let user = user.as_ref();
        gateway
            .execute(&sql::GRANT_PRIVILEGES_TO_USER.replace("{0}", user), &Params::new())
            .await?;
        gateway
            .execute(
                sql::ENABLE_AI_PROFILE_DOMAIN_FOR_USER,
                &acl_params(provider_endpoint, user),
            )
            .await?;
        info!(user = %user, host = %provider_endpoint, "provider access enabled");
    }
    Ok(())
}

/// Reverses [`enable_provider`].
pub async fn disable_provider<S: AsRef<str>>(
    conn: &Connection,
    users: &[S],
    provider_endpoint: &str,
) -> Result<()> {
    validate_users(users)?;
    let gateway = conn.gateway();
    for user in users {
        let user = user.as_ref();
        gateway
            .execute(&sql::REVOKE_PRIVILEGES_FROM_USER.replace("{0}", user), &Params::new())
            .await?;
        gateway
            .execute(
                sql::DISABLE_AI_PROFILE_DOMAIN_FOR_USER,
                &acl_params(provider_endpoint, user),
            )
            .await?;
        info!(user = %user, host = %provider_endpoint, "provider access disabled");
    }
    Ok(())
}

/// Blocking twins of the administrative operations.
pub mod blocking {
    use super::Credential;
    use crate::connection::BlockingConnection;
    use crate::gateway::block_on;
    use crate::Result;

    pub fn create_credential(
        conn: &BlockingConnection,
        credential: &Credential,
        replace: bool,
    ) -> Result<()> {
        block_on(super::create_credential(conn.as_async(), credential, replace))
    }

    pub fn drop_credential(conn: &BlockingConnection, name: &str, force: bool) -> Result<()> {
        block_on(super::drop_credential(conn.as_async(), name, force))
    }

    pub fn enable_provider<S: AsRef<str>>(
        conn: &BlockingConnection,
        users: &[S],
        provider_endpoint: &str,
    ) -> Result<()> {
        block_on(super::enable_provider(conn.as_async(), users, provider_endpoint))
    }

    pub fn disable_provider<S: AsRef<str>>(
        conn: &BlockingConnection,
        users: &[S],
        provider_endpoint: &str,
    ) -> Result<()> {
        block_on(super::disable_provider(conn.as_async(), users, provider_endpoint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_names_validated() {
        assert!(validate_users(&["SCOTT", "APP_USER1"]).is_ok());
        assert!(validate_users::<&str>(&[]).is_err());
        assert!(validate_users(&["scott; DROP USER admin"]).is_err());
        assert!(validate_users(&["1ABC"]).is_err());
    }

    #[test]
    fn test_credential_params_skip_absent_secrets() {
        let params = Credential::new("OPENAI_CRED")
            .with_password("OPENAI", "sk-test")
            .create_params()
            .unwrap();
        assert_eq!(params.get("credential_name"), Some(&json!("OPENAI_CRED")));
        assert_eq!(params.get("password"), Some(&json!("sk-test")));
        assert!(!params.contains_key("private_key"));
        assert!(Credential::new(" ").create_params().is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let cred = Credential::new("C").with_password("U", "hunter2");
        let text = format!("{:?}", cred);
        assert!(!text.contains("hunter2"));
        assert!(text.contains("<redacted>"));
    }
}
