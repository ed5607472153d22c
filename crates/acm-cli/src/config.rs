//! # Configuration
//!
//! Resolution order, later wins:
//!
//! 1. Built-in defaults (the repository layout: `policies/`, `audits/`, `artifacts/`).
//! 2. YAML file named by `--config` or `ACM_CONFIG`.
//! 3. Environment overrides: `ACM_POLICY_PATH`, `ACM_LOCK_PATH`,
//!    `ACM_LEDGER_DIR`, `ACM_REQUIRED_ATTESTATION_TYPE`.
//!
//! No secret values live in the configuration; secrets are read from the
//! environment by the secret store at release time.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use acm_gate::{AttestationGate, EnvSecretStore, GatePolicy, RetryPolicy};
use acm_ledger::{AuditLedger, LedgerError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "ACM_CONFIG";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// Config path.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// The config file is not valid YAML for [`AcmConfig`].
    #[error("invalid config {path}: {reason}")]
    Parse {
        /// Config path.
        path: String,
        /// Parser message.
        reason: String,
    },
}

/// Gate settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Attestation type a token must claim.
    pub required_attestation_type: String,
    /// Optional issuer allowlist.
    pub allowed_issuers: Option<Vec<String>>,
    /// Append `secret_denial` entries for denials.
    pub audit_denials: bool,
    /// Prefix of the environment variables holding secrets.
    pub secret_env_prefix: String,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            required_attestation_type: GatePolicy::default().required_attestation_type,
            allowed_issuers: None,
            audit_denials: false,
            secret_env_prefix: "ACM_SECRET_".to_string(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcmConfig {
    /// Policy document.
    pub policy_path: PathBuf,
    /// Policy lock file.
    pub lock_path: PathBuf,
    /// Ledger directory (log, head record, lock file).
    pub ledger_dir: PathBuf,
    /// Ledger log file name inside `ledger_dir`.
    pub ledger_file: String,
    /// Output directory for lineage records.
    pub artifacts_dir: PathBuf,
    /// Gate settings.
    pub gate: GateConfig,
    /// Runbook retry settings.
    pub retry: RetryPolicy,
}

impl Default for AcmConfig {
    fn default() -> Self {
        Self {
            policy_path: PathBuf::from("policies/base.yaml"),
            lock_path: PathBuf::from("policies/policy.lock"),
            ledger_dir: PathBuf::from("audits"),
            ledger_file: "decision_ledger.jsonl".to_string(),
            artifacts_dir: PathBuf::from("artifacts"),
            gate: GateConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl AcmConfig {
    /// Resolve the configuration from defaults, file and process environment.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(explicit, |key| std::env::var(key).ok())
    }

    /// Like [`AcmConfig::load`] with an injectable environment lookup.
    pub fn load_with(
        explicit: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let file = explicit
            .map(Path::to_path_buf)
            .or_else(|| env(CONFIG_ENV).filter(|s| !s.is_empty()).map(PathBuf::from));

        let mut config = match file {
            Some(path) => {
                let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                })?;
                let parsed = Self::from_yaml_str(&text).map_err(|reason| ConfigError::Parse {
                    path: path.display().to_string(),
                    reason,
                })?;
                tracing::debug!(path = %path.display(), "loaded config file");
                parsed
            }
            None => Self::default(),
        };
        config.apply_env(env);
        Ok(config)
    }

    fn from_yaml_str(text: &str) -> Result<Self, String> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).map_err(|e| e.to_string())
    }

    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| env(key).filter(|v| !v.is_empty());
        if let Some(v) = get("ACM_POLICY_PATH") {
            self.policy_path = PathBuf::from(v);
        }
        if let Some(v) = get("ACM_LOCK_PATH") {
            self.lock_path = PathBuf::from(v);
        }
        if let Some(v) = get("ACM_LEDGER_DIR") {
            self.ledger_dir = PathBuf::from(v);
        }
        if let Some(v) = get("ACM_REQUIRED_ATTESTATION_TYPE") {
            self.gate.required_attestation_type = v;
        }
    }

    /// Gate predicate.
    pub fn gate_policy(&self) -> GatePolicy {
        GatePolicy {
            required_attestation_type: self.gate.required_attestation_type.clone(),
            allowed_issuers: self.gate.allowed_issuers.clone(),
        }
    }

    /// Open the configured ledger.
    pub fn open_ledger(&self) -> Result<AuditLedger, LedgerError> {
        AuditLedger::open(&self.ledger_dir, &self.ledger_file)
    }

    /// Gate over the environment secret store and the configured ledger.
    pub fn build_gate(&self) -> Result<AttestationGate, LedgerError> {
        let ledger = Arc::new(self.open_ledger()?);
        let store = Arc::new(EnvSecretStore::new(self.gate.secret_env_prefix.clone()));
        Ok(AttestationGate::new(self.gate_policy(), store, ledger)
            .with_denial_auditing(self.gate.audit_denials))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_match_repository_layout() {
        let cfg = AcmConfig::load_with(None, env_of(&[])).unwrap();
        assert_eq!(cfg.policy_path, PathBuf::from("policies/base.yaml"));
        assert_eq!(cfg.lock_path, PathBuf::from("policies/policy.lock"));
        assert_eq!(cfg.ledger_dir, PathBuf::from("audits"));
        assert_eq!(cfg.gate.required_attestation_type, "sevsnpvm");
        assert!(!cfg.gate.audit_denials);
        assert_eq!(cfg.retry.max_attempts, 5);
    }

    #[test]
    fn file_then_env_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("acm.yaml");
        std::fs::write(
            &path,
            "ledger_dir: /var/acm\ngate:\n  audit_denials: true\n  allowed_issuers: [https://maa.test]\nretry:\n  max_attempts: 2\n",
        )
        .unwrap();

        let cfg = AcmConfig::load_with(
            Some(&path),
            env_of(&[("ACM_REQUIRED_ATTESTATION_TYPE", "tdxvm"), ("ACM_LEDGER_DIR", "")]),
        )
        .unwrap();
        assert_eq!(cfg.ledger_dir, PathBuf::from("/var/acm"));
        assert!(cfg.gate.audit_denials);
        assert_eq!(cfg.gate.required_attestation_type, "tdxvm");
        assert_eq!(cfg.gate_policy().allowed_issuers, Some(vec!["https://maa.test".to_string()]));
        assert_eq!(cfg.retry.max_attempts, 2);
        assert_eq!(cfg.retry.base_delay_ms, 300);
    }

    #[test]
    fn config_env_var_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.yaml");
        std::fs::write(&path, "policy_path: other.yaml\n").unwrap();
        let path_str = path.display().to_string();
        let cfg = AcmConfig::load_with(None, env_of(&[(CONFIG_ENV, path_str.as_str())])).unwrap();
        assert_eq!(cfg.policy_path, PathBuf::from("other.yaml"));
    }

    #[test]
    fn unreadable_or_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            AcmConfig::load_with(Some(&dir.path().join("missing.yaml")), env_of(&[])),
            Err(ConfigError::Read { .. })
        ));
        let bad = dir.path().join("bad.yaml");
        std::fs::write(&bad, "retry: [1, 2]\n").unwrap();
        assert!(matches!(
            AcmConfig::load_with(Some(&bad), env_of(&[])),
            Err(ConfigError::Parse { .. })
        ));
    }
}
