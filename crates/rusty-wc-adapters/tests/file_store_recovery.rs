mod common;

use std::fs;

use rusty_wc_adapters::FileSessionPersistence;
use rusty_wc_core::{
    DappMetadata, Session, SessionNamespace, SessionNamespaces, SessionPersistencePort,
    SessionStore, TimestampMs,
};

use common::{account, NOW_MS, SESSION_TTL_MS};

fn session(topic: &str, expires_at_ms: u64) -> Session {
    Session {
        topic: topic.to_owned(),
        peer: DappMetadata {
            name: "Example".to_owned(),
            url: "https://example.org".to_owned(),
            ..Default::default()
        },
        namespaces: SessionNamespaces::from([(
            "eip155".to_owned(),
            SessionNamespace {
                accounts: vec![account(1)],
                methods: ["personal_sign".to_owned()].into(),
                events: ["accountsChanged".to_owned()].into(),
                extensions: Vec::new(),
            },
        )]),
        required_namespaces: Default::default(),
        expires_at_ms: TimestampMs(expires_at_ms),
    }
}

#[test]
fn sessions_survive_a_restart() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("state").join("sessions.json");
    let live = NOW_MS + SESSION_TTL_MS;

    {
        let (mut store, report) =
            SessionStore::open(FileSessionPersistence::new(&path), TimestampMs(NOW_MS))
                .expect("open empty store");
        assert_eq!(report.loaded, 0);
        store.upsert(session("topic-a", live)).expect("upsert a");
        store.upsert(session("topic-b", live)).expect("upsert b");
        store.remove("topic-b").expect("remove b");
    }

    let (store, report) =
        SessionStore::open(FileSessionPersistence::new(&path), TimestampMs(NOW_MS))
            .expect("reopen store");
    assert_eq!(report.loaded, 1);
    assert_eq!(store.get("topic-a"), Some(session("topic-a", live)));
    assert!(!store.contains("topic-b"));
    assert!(!dir.path().join("state").join("sessions.json.tmp").exists());
}

#[test]
fn corrupt_document_is_treated_as_empty() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("sessions.json");
    fs::write(&path, b"{ not json").expect("write garbage");

    let loaded = FileSessionPersistence::new(&path)
        .load_sessions()
        .expect("load corrupt store");
    assert!(loaded.is_empty());
}

#[test]
fn tampered_entry_is_dropped_and_others_survive() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("sessions.json");
    let persistence = FileSessionPersistence::new(&path);
    let live = NOW_MS + SESSION_TTL_MS;
    persistence
        .save_sessions(&[session("topic-a", live), session("topic-b", live)])
        .expect("save");

    let mut doc: serde_json::Value =
        serde_json::from_slice(&fs::read(&path).expect("read")).expect("parse");
    doc["entries"][1]["session"]["peer"]["url"] = serde_json::json!("https://evil.example");
    fs::write(&path, serde_json::to_vec(&doc).expect("encode")).expect("write tampered");

    let (store, report) =
        SessionStore::open(FileSessionPersistence::new(&path), TimestampMs(NOW_MS))
            .expect("open");
    assert_eq!(report.loaded, 1);
    assert!(store.contains("topic-a"));
    assert!(!store.contains("topic-b"));
}

#[test]
fn expired_sessions_are_dropped_and_rewritten_at_load() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("sessions.json");
    let persistence = FileSessionPersistence::new(&path);
    persistence
        .save_sessions(&[
            session("stale", NOW_MS - 1),
            session("fresh", NOW_MS + SESSION_TTL_MS),
        ])
        .expect("save");

    let (store, report) =
        SessionStore::open(persistence.clone(), TimestampMs(NOW_MS)).expect("open");
    assert_eq!(report.expired, 1);
    assert_eq!(store.len(), 1);
    assert_eq!(persistence.load_sessions().expect("reload").len(), 1);
}
