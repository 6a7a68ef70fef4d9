use std::io;
use std::sync::{Arc, Barrier};
use std::thread;

use confdb::error::StoreError;
use confdb::history::{HistorySink, MemorySink};
use confdb::ConfigStore;

fn store_with_sink() -> (ConfigStore, MemorySink) {
    let sink = MemorySink::new();
    let store = ConfigStore::new(Box::new(sink.clone()));
    (store, sink)
}

#[test]
fn read_missing_id_is_not_found() {
    let (store, _) = store_with_sink();

    assert_eq!(
        store.read("ghost"),
        Err(StoreError::NotFound {
            id: "ghost".to_string()
        })
    );
    assert!(store.history().is_empty());
}

#[test]
fn create_then_read_returns_payload_verbatim() {
    let (store, _) = store_with_sink();
    let payload = r#"{"host": "a", "port": 5432}"#;

    store.create("db", payload).unwrap();
    assert_eq!(store.read("db").unwrap(), payload);
}

// Reads are audited on purpose: the trail doubles as an access log
// for compliance, so a successful read appends its own entry.
#[test]
fn successful_read_appends_exactly_one_entry() {
    let (store, _) = store_with_sink();

    store.create("db", r#"{"host": "a"}"#).unwrap();
    assert_eq!(store.history().len(), 1);

    store.read("db").unwrap();
    let history = store.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].description, "Configuration created: db");
    assert_eq!(history[1].description, "Configuration read: db");
}

#[test]
fn update_replaces_payload_wholesale() {
    let (store, _) = store_with_sink();

    store.create("db", r#"{"host": "a"}"#).unwrap();
    store.update("db", r#"{"host": "b"}"#).unwrap();

    assert_eq!(store.read("db").unwrap(), r#"{"host": "b"}"#);
}

#[test]
fn delete_twice_yields_success_then_not_found() {
    let (store, _) = store_with_sink();

    store.create("db", "{}").unwrap();
    assert_eq!(store.delete("db"), Ok(()));
    assert_eq!(
        store.delete("db"),
        Err(StoreError::NotFound {
            id: "db".to_string()
        })
    );
}

#[test]
fn history_grows_by_one_per_successful_operation() {
    let (store, _) = store_with_sink();

    let mut expected = 0;
    store.create("db", "{}").unwrap();
    expected += 1;
    assert_eq!(store.history().len(), expected);

    store.read("db").unwrap();
    expected += 1;
    assert_eq!(store.history().len(), expected);

    store.update("db", r#"{"v": 2}"#).unwrap();
    expected += 1;
    assert_eq!(store.history().len(), expected);

    store.deploy_changes("db").unwrap();
    expected += 1;
    assert_eq!(store.history().len(), expected);

    store.rollback("db", "{}").unwrap();
    expected += 1;
    assert_eq!(store.history().len(), expected);

    store.delete("db").unwrap();
    expected += 1;

    let history = store.history();
    assert_eq!(history.len(), expected);
    for pair in history.windows(2) {
        assert!(pair[0].timestamp <= pair[1].timestamp);
    }
}

#[test]
fn invalid_json_leaves_store_and_history_untouched() {
    let (store, sink) = store_with_sink();

    assert_eq!(store.create("db", "{not json"), Err(StoreError::InvalidFormat));
    assert_eq!(
        store.read("db"),
        Err(StoreError::NotFound {
            id: "db".to_string()
        })
    );

    store.create("db", r#"{"host": "a"}"#).unwrap();
    assert_eq!(store.update("db", "{not json"), Err(StoreError::InvalidFormat));

    // Neither failed attempt produced a trail entry
    let history = store.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].description, "Configuration created: db");
    assert_eq!(sink.lines().len(), 1);

    // Failed update left the payload alone (audited read follows)
    assert_eq!(store.read("db").unwrap(), r#"{"host": "a"}"#);
}

#[test]
fn rollback_restores_caller_supplied_content() {
    let (store, _) = store_with_sink();

    store.create("db", r#"{"host":"a"}"#).unwrap();
    store.update("db", r#"{"host":"b"}"#).unwrap();
    store.rollback("db", r#"{"host":"a"}"#).unwrap();

    assert_eq!(store.read("db").unwrap(), r#"{"host":"a"}"#);

    let descriptions: Vec<String> = store
        .history()
        .into_iter()
        .map(|e| e.description)
        .collect();
    assert_eq!(
        descriptions,
        vec![
            "Configuration created: db",
            "Configuration updated: db",
            "Configuration rolled back: db",
            "Configuration read: db",
        ]
    );
}

// Rollback runs the same JSON check as update instead of accepting
// arbitrary text; the store must never hold malformed JSON.
#[test]
fn rollback_validates_json_like_update() {
    let (store, _) = store_with_sink();

    store.create("db", r#"{"host":"a"}"#).unwrap();
    assert_eq!(
        store.rollback("db", "{not json"),
        Err(StoreError::InvalidFormat)
    );
    assert_eq!(store.read("db").unwrap(), r#"{"host":"a"}"#);
}

#[test]
fn deploy_is_an_audit_only_checkpoint() {
    let (store, _) = store_with_sink();

    store.create("db", r#"{"host":"a"}"#).unwrap();
    store.deploy_changes("db").unwrap();

    // No data mutation, just the marker entry
    assert_eq!(store.read("db").unwrap(), r#"{"host":"a"}"#);
    assert_eq!(
        store.history()[1].description,
        "Configuration changes deployed: db"
    );
}

#[test]
fn deploy_missing_id_leaves_history_unchanged() {
    let (store, sink) = store_with_sink();

    assert_eq!(
        store.deploy_changes("missing"),
        Err(StoreError::NotFound {
            id: "missing".to_string()
        })
    );
    assert!(store.history().is_empty());
    assert!(sink.lines().is_empty());
}

#[test]
fn concurrent_create_has_exactly_one_winner() {
    let (store, _) = store_with_sink();
    let store = Arc::new(store);
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let store = store.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                store.create("x", r#"{"v": 1}"#)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let wins = results.iter().filter(|r| r.is_ok()).count();
    let losses = results
        .iter()
        .filter(|r| {
            matches!(
                r,
                Err(StoreError::AlreadyExists { id }) if id == "x"
            )
        })
        .count();
    assert_eq!(wins, 1);
    assert_eq!(losses, 1);

    let creations = store
        .history()
        .iter()
        .filter(|e| e.description == "Configuration created: x")
        .count();
    assert_eq!(creations, 1);
}

#[test]
fn sink_receives_the_contracted_line_format() {
    let (store, sink) = store_with_sink();

    store.create("db", "{}").unwrap();
    store.deploy_changes("db").unwrap();

    let lines = sink.lines();
    assert_eq!(lines.len(), 2);
    for line in &lines {
        // [YYYY-MM-DD HH:MM:SS] <description>
        assert_eq!(&line[0..1], "[");
        assert!(
            chrono::NaiveDateTime::parse_from_str(&line[1..20], "%Y-%m-%d %H:%M:%S").is_ok(),
            "bad timestamp in line: {}",
            line
        );
        assert_eq!(&line[20..22], "] ");
    }
    assert!(lines[0].ends_with("Configuration created: db"));
    assert!(lines[1].ends_with("Configuration changes deployed: db"));
}

struct FailingSink;

impl HistorySink for FailingSink {
    fn append_line(&mut self, _line: &str) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::Other, "disk gone"))
    }
}

// A dead sink is a warning, never a failed mutation: the operation
// commits and the in-memory trail still gets its entry.
#[test]
fn sink_failure_does_not_fail_the_operation() {
    let store = ConfigStore::new(Box::new(FailingSink));

    store.create("db", r#"{"host":"a"}"#).unwrap();
    assert_eq!(store.read("db").unwrap(), r#"{"host":"a"}"#);

    let history = store.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].description, "Configuration created: db");
}
