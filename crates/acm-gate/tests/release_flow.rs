//! Gate decisions against a file-backed ledger, driven through the retry
//! client the way the runbook does.

use std::sync::Arc;
use std::time::Duration;

use acm_gate::{
    token_digest, AttestationGate, DenialReason, GatePolicy, ReleaseDecision, RetryPolicy,
    RetryingClient, Sleeper, StaticSecretStore,
};
use acm_ledger::{verify_chain, AuditLedger, EntryType};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

struct NoSleep;

impl Sleeper for NoSleep {
    fn sleep(&self, _: Duration) {}
}

fn mint(att: &str) -> String {
    let claims = serde_json::json!({"iss": "https://maa.example", "x-ms-attestation-type": att});
    format!(
        "{}.{}.",
        URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256"}"#),
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap())
    )
}

fn setup(dir: &std::path::Path) -> (AttestationGate, Arc<AuditLedger>) {
    let ledger = Arc::new(AuditLedger::open(dir, "decision_ledger.jsonl").unwrap());
    let store = StaticSecretStore::new().with_secret("payments-db", "pg://secret");
    let gate = AttestationGate::new(GatePolicy::default(), Arc::new(store), Arc::clone(&ledger));
    (gate, ledger)
}

#[test]
fn releases_are_chained_and_denials_leave_no_trace() {
    let dir = tempfile::tempdir().unwrap();
    let (gate, ledger) = setup(dir.path());

    let good = mint("sevsnpvm");
    assert!(gate.release("payments-db", &good).unwrap().is_released());
    let denied = gate.release("payments-db", &mint("simulated")).unwrap();
    assert!(!denied.is_released());
    assert!(gate.release("payments-db", &good).unwrap().is_released());

    let entries = ledger.entries().unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.entry_type == EntryType::SecretRelease));
    assert!(entries.iter().all(|e| e.payload["token_digest"] == token_digest(&good)));
    assert!(verify_chain(&entries).ok);

    let raw = std::fs::read_to_string(dir.path().join("decision_ledger.jsonl")).unwrap();
    assert!(!raw.contains("pg://secret"));
}

#[test]
fn runbook_style_retry_stops_at_first_release() {
    let dir = tempfile::tempdir().unwrap();
    let (gate, ledger) = setup(dir.path());
    let token = mint("sevsnpvm");
    let client = RetryingClient::with_sleeper(RetryPolicy::default(), NoSleep);

    let outcome = client.run(|_| match gate.release("payments-db", &token) {
        Ok(d) if d.is_released() => (true, "released:true".to_string()),
        Ok(_) => (false, "released:false".to_string()),
        Err(e) => (false, format!("gate_error:{e}")),
    });
    assert!(outcome.ok);
    assert_eq!(outcome.attempts, 1);
    assert_eq!(ledger.entries().unwrap().len(), 1);
}

#[test]
fn runbook_style_retry_gives_up_on_persistent_denial() {
    let dir = tempfile::tempdir().unwrap();
    let (gate, ledger) = setup(dir.path());
    let token = mint("simulated");
    let client = RetryingClient::with_sleeper(RetryPolicy::default(), NoSleep);

    let outcome = client.run(|_| match gate.release("payments-db", &token) {
        Ok(ReleaseDecision::Released { .. }) => (true, "released:true".to_string()),
        Ok(ReleaseDecision::Denied { reason, .. }) => {
            assert_eq!(reason, DenialReason::AttestationTypeMismatch);
            (false, "released:false".to_string())
        }
        Err(e) => (false, format!("gate_error:{e}")),
    });
    assert!(!outcome.ok);
    assert_eq!(outcome.attempts, 5);
    assert_eq!(outcome.message, "released:false");
    assert!(ledger.entries().unwrap().is_empty());
}
