//! # Release Gate
//!
//! One request, one decision. Releases append a `secret_release` ledger
//! entry before the value is handed back; if the append fails nothing is
//! released. Denials are appended only when denial auditing is on.
//!
//! The raw token is never persisted, only [`token_digest`]. The recorded
//! attestation type is the one the token claims (unverified).

use std::sync::Arc;

use acm_ledger::{AuditLedger, EntryType, LedgerEntry};
use serde::{Deserialize, Serialize};

use crate::error::GateError;
use crate::store::{SecretStore, SecretValue};
use crate::token::{token_digest, AttestationToken, ClaimsExtraction, UNKNOWN_CLAIM};

/// Default attestation type a token must claim.
pub const DEFAULT_REQUIRED_ATTESTATION_TYPE: &str = "sevsnpvm";

/// Request lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateState {
    /// Token received, nothing decoded.
    Received,
    /// Claims decoded.
    Parsed,
    /// Policy predicate satisfied.
    Evaluated,
    /// Value returned and recorded.
    Released,
    /// No value returned.
    Denied,
}

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    /// The token's claims could not be decoded.
    AttestationUnparseable,
    /// The claimed attestation type is not the required one.
    AttestationTypeMismatch,
    /// The claimed issuer is not on the allowlist.
    IssuerNotAllowed,
    /// The store has no such secret.
    SecretUnavailable,
}

impl DenialReason {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AttestationUnparseable => "attestation_unparseable",
            Self::AttestationTypeMismatch => "attestation_type_mismatch",
            Self::IssuerNotAllowed => "issuer_not_allowed",
            Self::SecretUnavailable => "secret_unavailable",
        }
    }
}

impl std::fmt::Display for DenialReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Predicate over (unverified) token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatePolicy {
    /// Required `x-ms-attestation-type`.
    pub required_attestation_type: String,
    /// Permitted `iss` values. `None` accepts any issuer.
    #[serde(default)]
    pub allowed_issuers: Option<Vec<String>>,
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            required_attestation_type: DEFAULT_REQUIRED_ATTESTATION_TYPE.to_string(),
            allowed_issuers: None,
        }
    }
}

impl GatePolicy {
    /// Check decoded claims.
    pub fn evaluate(&self, claims: &ClaimsExtraction) -> Result<(), DenialReason> {
        if !claims.parse_ok {
            return Err(DenialReason::AttestationUnparseable);
        }
        if claims.attestation_type() != self.required_attestation_type {
            return Err(DenialReason::AttestationTypeMismatch);
        }
        if let Some(allowed) = &self.allowed_issuers {
            if !allowed.iter().any(|iss| iss == claims.issuer()) {
                return Err(DenialReason::IssuerNotAllowed);
            }
        }
        Ok(())
    }
}

/// Outcome of one release request.
#[derive(Debug)]
pub enum ReleaseDecision {
    /// Predicate satisfied and value available.
    Released {
        /// The released value.
        value: SecretValue,
        /// Attestation type the token claimed.
        attestation_type: String,
        /// The ledger entry recording the release.
        entry: LedgerEntry,
    },
    /// No value returned.
    Denied {
        /// Why.
        reason: DenialReason,
        /// Attestation type the token claimed, or `"unknown"`.
        attestation_type: String,
        /// The denial entry, when denial auditing is on.
        entry: Option<LedgerEntry>,
    },
}

impl ReleaseDecision {
    /// Terminal state reached.
    pub fn state(&self) -> GateState {
        match self {
            Self::Released { .. } => GateState::Released,
            Self::Denied { .. } => GateState::Denied,
        }
    }

    /// Whether a value was released.
    pub fn is_released(&self) -> bool {
        matches!(self, Self::Released { .. })
    }

    /// The released value, if any.
    pub fn value(&self) -> Option<&SecretValue> {
        match self {
            Self::Released { value, .. } => Some(value),
            Self::Denied { .. } => None,
        }
    }
}

#[derive(Serialize)]
struct ReleaseRecord<'a> {
    secret_name: &'a str,
    token_digest: &'a str,
    attestation_type: &'a str,
}

#[derive(Serialize)]
struct DenialRecord<'a> {
    secret_name: &'a str,
    token_digest: &'a str,
    attestation_type: &'a str,
    reason: DenialReason,
}

/// The attestation-gated release point.
pub struct AttestationGate {
    policy: GatePolicy,
    store: Arc<dyn SecretStore>,
    ledger: Arc<AuditLedger>,
    audit_denials: bool,
}

impl std::fmt::Debug for AttestationGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttestationGate")
            .field("policy", &self.policy)
            .field("audit_denials", &self.audit_denials)
            .finish_non_exhaustive()
    }
}

impl AttestationGate {
    /// Gate over `store`, recording into `ledger`.
    pub fn new(policy: GatePolicy, store: Arc<dyn SecretStore>, ledger: Arc<AuditLedger>) -> Self {
        Self {
            policy,
            store,
            ledger,
            audit_denials: false,
        }
    }

    /// Also append a `secret_denial` entry for every denial.
    pub fn with_denial_auditing(mut self, enabled: bool) -> Self {
        self.audit_denials = enabled;
        self
    }

    /// The active policy.
    pub fn policy(&self) -> &GatePolicy {
        &self.policy
    }

    /// Decide one request.
    ///
    /// # Errors
    ///
    /// Only collaborator failures: the secret store erroring, or the ledger
    /// append failing. A denial is `Ok(ReleaseDecision::Denied { .. })`.
    pub fn release(&self, secret_name: &str, token: &str) -> Result<ReleaseDecision, GateError> {
        let digest = token_digest(token);
        tracing::debug!(secret_name, state = ?GateState::Received, "release requested");

        let claims = match AttestationToken::decode_claims(token) {
            Ok(claims) => ClaimsExtraction {
                claims,
                parse_ok: true,
            },
            Err(e) => {
                tracing::info!(secret_name, error = %e, "attestation token unparseable");
                return self.deny(
                    secret_name,
                    &digest,
                    UNKNOWN_CLAIM,
                    DenialReason::AttestationUnparseable,
                );
            }
        };
        let attestation_type = claims.attestation_type().to_string();
        tracing::info!(
            secret_name,
            attestation_type = %attestation_type,
            issuer = claims.issuer(),
            state = ?GateState::Parsed,
            "attestation presented (signature not verified)"
        );

        if let Err(reason) = self.policy.evaluate(&claims) {
            return self.deny(secret_name, &digest, &attestation_type, reason);
        }
        tracing::debug!(secret_name, state = ?GateState::Evaluated, "gate policy satisfied");

        let Some(value) = self.store.get_secret(secret_name)? else {
            return self.deny(
                secret_name,
                &digest,
                &attestation_type,
                DenialReason::SecretUnavailable,
            );
        };

        let entry = self.ledger.append_record(
            EntryType::SecretRelease,
            &ReleaseRecord {
                secret_name,
                token_digest: &digest,
                attestation_type: &attestation_type,
            },
        )?;
        tracing::info!(
            secret_name,
            chain_head = %entry.chain_head,
            state = ?GateState::Released,
            "secret released"
        );
        Ok(ReleaseDecision::Released {
            value,
            attestation_type,
            entry,
        })
    }

    fn deny(
        &self,
        secret_name: &str,
        digest: &str,
        attestation_type: &str,
        reason: DenialReason,
    ) -> Result<ReleaseDecision, GateError> {
        tracing::info!(
            secret_name,
            attestation_type,
            %reason,
            state = ?GateState::Denied,
            "secret release denied"
        );
        let entry = if self.audit_denials {
            Some(self.ledger.append_record(
                EntryType::SecretDenial,
                &DenialRecord {
                    secret_name,
                    token_digest: digest,
                    attestation_type,
                    reason,
                },
            )?)
        } else {
            None
        };
        Ok(ReleaseDecision::Denied {
            reason,
            attestation_type: attestation_type.to_string(),
            entry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SecretStoreError;
    use crate::store::StaticSecretStore;
    use crate::token::tests::mint;

    fn gate(store: impl SecretStore + 'static) -> (AttestationGate, Arc<AuditLedger>) {
        let ledger = Arc::new(AuditLedger::in_memory());
        let gate = AttestationGate::new(GatePolicy::default(), Arc::new(store), Arc::clone(&ledger));
        (gate, ledger)
    }

    fn token(att: &str) -> String {
        mint(&serde_json::json!({"iss": "https://maa.test", "x-ms-attestation-type": att}))
    }

    #[test]
    fn matching_attestation_releases_and_records() {
        let (gate, ledger) = gate(StaticSecretStore::new().with_secret("db", "hunter2"));
        let tok = token("sevsnpvm");
        let decision = gate.release("db", &tok).unwrap();
        assert_eq!(decision.state(), GateState::Released);
        assert_eq!(decision.value().map(SecretValue::expose), Some("hunter2"));

        let entries = ledger.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].entry_type, EntryType::SecretRelease);
        assert_eq!(
            entries[0].payload,
            serde_json::json!({
                "secret_name": "db",
                "token_digest": token_digest(&tok),
                "attestation_type": "sevsnpvm"
            })
        );
        let stored = serde_json::to_string(&entries[0]).unwrap();
        assert!(!stored.contains("hunter2"));
        assert!(!stored.contains(tok.trim_end_matches('.')));
    }

    #[test]
    fn simulated_attestation_is_denied_and_ledger_unchanged() {
        let (gate, ledger) = gate(StaticSecretStore::new().with_secret("db", "hunter2"));
        let decision = gate.release("db", &token("simulated")).unwrap();
        match decision {
            ReleaseDecision::Denied {
                reason,
                attestation_type,
                entry,
            } => {
                assert_eq!(reason, DenialReason::AttestationTypeMismatch);
                assert_eq!(attestation_type, "simulated");
                assert!(entry.is_none());
            }
            other => panic!("expected denial, got {other:?}"),
        }
        assert!(ledger.entries().unwrap().is_empty());
    }

    #[test]
    fn malformed_token_is_denied_not_raised() {
        let (gate, _) = gate(StaticSecretStore::new().with_secret("db", "v"));
        for bad in ["", "one.two", "a..c", "a.%%%.c"] {
            let decision = gate.release("db", bad).unwrap();
            assert!(matches!(
                decision,
                ReleaseDecision::Denied {
                    reason: DenialReason::AttestationUnparseable,
                    ..
                }
            ));
        }
    }

    #[test]
    fn missing_secret_is_a_denial() {
        let (gate, ledger) = gate(StaticSecretStore::new());
        let decision = gate.release("db", &token("sevsnpvm")).unwrap();
        assert!(matches!(
            decision,
            ReleaseDecision::Denied {
                reason: DenialReason::SecretUnavailable,
                ..
            }
        ));
        assert!(ledger.entries().unwrap().is_empty());
    }

    #[test]
    fn issuer_allowlist_is_enforced() {
        let ledger = Arc::new(AuditLedger::in_memory());
        let policy = GatePolicy {
            allowed_issuers: Some(vec!["https://other".into()]),
            ..GatePolicy::default()
        };
        let gate = AttestationGate::new(
            policy,
            Arc::new(StaticSecretStore::new().with_secret("db", "v")),
            ledger,
        );
        let decision = gate.release("db", &token("sevsnpvm")).unwrap();
        assert!(matches!(
            decision,
            ReleaseDecision::Denied {
                reason: DenialReason::IssuerNotAllowed,
                ..
            }
        ));
    }

    #[test]
    fn denial_auditing_records_denials() {
        let ledger = Arc::new(AuditLedger::in_memory());
        let gate = AttestationGate::new(
            GatePolicy::default(),
            Arc::new(StaticSecretStore::new()),
            Arc::clone(&ledger),
        )
        .with_denial_auditing(true);
        let decision = gate.release("db", &token("simulated")).unwrap();
        assert!(!decision.is_released());
        let entries = ledger.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].entry_type, EntryType::SecretDenial);
        assert_eq!(entries[0].payload["reason"], "attestation_type_mismatch");
    }

    struct BrokenStore;

    impl SecretStore for BrokenStore {
        fn get_secret(&self, name: &str) -> Result<Option<SecretValue>, SecretStoreError> {
            Err(SecretStoreError {
                name: name.to_string(),
                reason: "backend offline".into(),
            })
        }
    }

    #[test]
    fn store_failure_is_an_error_not_a_denial() {
        let (gate, _) = gate(BrokenStore);
        let err = gate.release("db", &token("sevsnpvm")).unwrap_err();
        assert!(matches!(err, GateError::SecretStore(_)));
    }

    #[test]
    fn store_is_not_consulted_when_policy_fails() {
        let (gate, _) = gate(BrokenStore);
        let decision = gate.release("db", &token("simulated")).unwrap();
        assert_eq!(decision.state(), GateState::Denied);
    }
}
