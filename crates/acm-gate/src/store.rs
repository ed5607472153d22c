//! Secret store collaborators.
//!
//! `Ok(None)` means the store has no such secret, which the gate treats as
//! a denial. `Err` means the store itself failed.

use std::collections::BTreeMap;

use crate::error::SecretStoreError;

/// A protected value. `Debug` never prints it.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretValue(String);

impl SecretValue {
    /// Wrap a value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The plaintext. Call only at the point of release.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretValue([REDACTED])")
    }
}

/// Source of secret values.
pub trait SecretStore: Send + Sync {
    /// Look up `name`.
    fn get_secret(&self, name: &str) -> Result<Option<SecretValue>, SecretStoreError>;
}

/// Reads secrets from environment variables.
///
/// `db-password` with prefix `ACM_SECRET_` reads `ACM_SECRET_DB_PASSWORD`.
#[derive(Debug, Clone)]
pub struct EnvSecretStore {
    prefix: String,
}

impl EnvSecretStore {
    /// Store reading `<prefix><NAME>`.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Environment variable consulted for `name`.
    pub fn var_name(&self, name: &str) -> String {
        let suffix: String = name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("{}{suffix}", self.prefix)
    }
}

impl SecretStore for EnvSecretStore {
    fn get_secret(&self, name: &str) -> Result<Option<SecretValue>, SecretStoreError> {
        let var = self.var_name(name);
        match std::env::var(&var) {
            Ok(v) if v.is_empty() => Ok(None),
            Ok(v) => Ok(Some(SecretValue::new(v))),
            Err(std::env::VarError::NotPresent) => Ok(None),
            Err(std::env::VarError::NotUnicode(_)) => Err(SecretStoreError {
                name: name.to_string(),
                reason: format!("{var} is not valid unicode"),
            }),
        }
    }
}

/// Fixed in-memory secrets.
#[derive(Clone, Default)]
pub struct StaticSecretStore {
    secrets: BTreeMap<String, SecretValue>,
}

impl StaticSecretStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a secret.
    pub fn with_secret(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(name.into(), SecretValue::new(value));
        self
    }
}

impl std::fmt::Debug for StaticSecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticSecretStore")
            .field("names", &self.secrets.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SecretStore for StaticSecretStore {
    fn get_secret(&self, name: &str) -> Result<Option<SecretValue>, SecretStoreError> {
        Ok(self.secrets.get(name).cloned())
    }
}
