//! Engine-level properties: round-trip encoding, delete idempotence, and
//! prefix scan ordering, exercised directly against
//! [`databuddy::storage::open_storage`] rather than through a bucket.

use std::time::Duration;

use databuddy::storage::open_storage;
use tempfile::tempdir;

#[test]
fn set_then_get_round_trips_exact_value() {
    let dir = tempdir().unwrap();
    let engine = open_storage(dir.path().join("data.redb")).unwrap();

    engine.set(b"k", b"the value", None, 0).unwrap();
    assert_eq!(engine.get(b"k").unwrap(), Some(b"the value".to_vec()));
}

#[test]
fn delete_of_absent_key_returns_false_not_error() {
    let dir = tempdir().unwrap();
    let engine = open_storage(dir.path().join("data.redb")).unwrap();

    assert!(!engine.delete(b"missing").unwrap());
}

#[test]
fn delete_of_present_key_returns_true_and_removes_it() {
    let dir = tempdir().unwrap();
    let engine = open_storage(dir.path().join("data.redb")).unwrap();

    engine.set(b"k", b"v", None, 0).unwrap();
    assert!(engine.delete(b"k").unwrap());
    assert_eq!(engine.get(b"k").unwrap(), None);
}

#[test]
fn list_returns_matching_prefix_in_ascending_order() {
    let dir = tempdir().unwrap();
    let engine = open_storage(dir.path().join("data.redb")).unwrap();

    for key in ["b", "ab", "aa", "a"] {
        engine.set(key.as_bytes(), b"v", None, 0).unwrap();
    }

    let keys: Vec<String> = engine
        .list(b"a")
        .unwrap()
        .into_iter()
        .map(|k| String::from_utf8(k).unwrap())
        .collect();
    assert_eq!(keys, vec!["a", "aa", "ab"]);

    let all: Vec<String> = engine
        .list(b"")
        .unwrap()
        .into_iter()
        .map(|k| String::from_utf8(k).unwrap())
        .collect();
    assert_eq!(all, vec!["a", "aa", "ab", "b"]);
}

#[test]
fn expired_key_is_treated_as_absent() {
    let dir = tempdir().unwrap();
    let engine = open_storage(dir.path().join("data.redb")).unwrap();

    engine
        .set(b"k", b"v", Some(Duration::from_millis(0)), 0)
        .unwrap();
    std::thread::sleep(Duration::from_millis(5));

    assert_eq!(engine.get(b"k").unwrap(), None);
    assert!(!engine.has(b"k").unwrap());
    assert!(engine.list(b"").unwrap().is_empty());
}

#[test]
fn metadata_persists_across_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("data.redb");

    let created_at = {
        let engine = open_storage(&path).unwrap();
        engine.metadata().created_at
    };
    drop(open_storage(&path).unwrap());

    let engine = open_storage(&path).unwrap();
    assert_eq!(engine.metadata().created_at, created_at);
}
