//! A tampered audit line breaks the hash chain and verification reports
//! the exact line.

use serde_json::json;
use uuid::Uuid;

use spd_audit::{verify_hash_chain_str, AuditWriter, VerifyResult, TOPIC_FILLS, TOPIC_RULE_CHECKS};

fn write_sample_log(path: &std::path::Path) -> anyhow::Result<()> {
    let mut w = AuditWriter::new(path, true)?;
    let account = Uuid::new_v4();
    w.append(
        account,
        TOPIC_RULE_CHECKS,
        "order_validated",
        json!({"order": "o-1", "passed": true}),
    )?;
    w.append(
        account,
        TOPIC_FILLS,
        "order_filled",
        json!({"order": "o-1", "qty": 2, "price_micros": 5_100_000_000i64}),
    )?;
    w.append(
        account,
        TOPIC_FILLS,
        "order_filled",
        json!({"order": "o-2", "qty": 1, "price_micros": 5_101_000_000i64}),
    )?;
    Ok(())
}

#[test]
fn intact_chain_verifies() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("audit.jsonl");
    write_sample_log(&path)?;

    let result = spd_audit::verify_hash_chain(&path)?;
    assert_eq!(result, VerifyResult::Valid { lines: 3 });
    Ok(())
}

#[test]
fn edited_payload_breaks_the_chain_at_that_line() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("audit.jsonl");
    write_sample_log(&path)?;

    // Flip the fill quantity on line 2.
    let content = std::fs::read_to_string(&path)?;
    let tampered = content.replace("\"qty\":2", "\"qty\":20");
    assert_ne!(content, tampered, "tamper must hit the target line");

    match verify_hash_chain_str(&tampered)? {
        VerifyResult::Broken { line, reason } => {
            assert_eq!(line, 2);
            assert!(reason.contains("hash_self mismatch"));
        }
        other => panic!("expected broken chain, got {other:?}"),
    }
    Ok(())
}

#[test]
fn deleted_line_breaks_the_chain() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("audit.jsonl");
    write_sample_log(&path)?;

    let content = std::fs::read_to_string(&path)?;
    let without_second: String = content
        .lines()
        .enumerate()
        .filter(|(i, _)| *i != 1)
        .map(|(_, l)| format!("{l}\n"))
        .collect();

    match verify_hash_chain_str(&without_second)? {
        VerifyResult::Broken { line, reason } => {
            // The gap shows up where the third event's hash_prev no longer
            // matches.
            assert_eq!(line, 2);
            assert!(reason.contains("hash_prev mismatch"));
        }
        other => panic!("expected broken chain, got {other:?}"),
    }
    Ok(())
}
