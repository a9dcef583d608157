use std::sync::Arc;

use chatdbg_core::interaction_log::{now_rfc3339_utc, InteractionLog, InteractionLogEntry};
use tempfile::tempdir;

fn entry(query: &str) -> InteractionLogEntry {
    InteractionLogEntry {
        timestamp: now_rfc3339_utc().expect("time"),
        original_query: query.to_string(),
        detected_language: "he".to_string(),
        reformulated_queries: vec![],
        successful_query: Some(query.to_string()),
        support_level: "Strong support".to_string(),
        provenance_ids: vec!["BG-1001".to_string()],
        pre_translation_answer: "אני דוד בן גוריון".to_string(),
        final_answer: "אני דוד בן גוריון".to_string(),
    }
}

#[test]
fn append_creates_parent_dirs_and_preserves_non_ascii() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("logs").join("nested").join("interactions.jsonl");
    let log = InteractionLog::open(path.clone());

    log.append(&entry("מי אתה?")).expect("append");

    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(raw.ends_with('\n'));
    assert_eq!(raw.lines().count(), 1);
    // Non-ASCII text is written as-is, not \u-escaped.
    assert!(raw.contains("מי אתה?"));
    assert!(raw.contains("\"support_level\":\"Strong support\""));

    let entries = log.read_all().expect("read");
    assert_eq!(entries, vec![entry_with_ts(&entries[0].timestamp, "מי אתה?")]);
}

fn entry_with_ts(ts: &str, query: &str) -> InteractionLogEntry {
    let mut e = entry(query);
    e.timestamp = ts.to_string();
    e
}

#[test]
fn concurrent_appends_never_interleave() {
    let dir = tempdir().unwrap();
    let log = Arc::new(InteractionLog::open(dir.path().join("interactions.jsonl")));

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let log = Arc::clone(&log);
            std::thread::spawn(move || {
                for i in 0..25 {
                    log.append(&entry(&format!("thread {t} query {i} {}", "x".repeat(512))))
                        .expect("append");
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let entries = log.read_all().expect("every line decodes");
    assert_eq!(entries.len(), 200);
}

#[test]
fn missing_log_reads_as_empty() {
    let dir = tempdir().unwrap();
    let log = InteractionLog::open(dir.path().join("none.jsonl"));
    assert!(log.read_all().unwrap().is_empty());
}
