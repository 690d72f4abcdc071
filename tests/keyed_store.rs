//! Scenario tests for the keyed store: fetches, inserts, removals, moves,
//! sorting and full replacement.

use std::cmp::Ordering;

use keyseq::{Key, KeyedStore, Notification, Recorder, StoreConfig, StoreError};
use serde_json::{Value, json};

// =============================================================================
// Helpers
// =============================================================================

fn abc() -> Vec<Value> {
    vec![
        json!({"key": "a", "v": 3}),
        json!({"key": "b", "v": 1}),
        json!({"key": "c", "v": 2}),
    ]
}

fn store_of(items: Vec<Value>) -> KeyedStore<Value, Recorder> {
    KeyedStore::with_sink(items, StoreConfig::default(), Recorder::new()).unwrap()
}

fn order<S>(store: &KeyedStore<Value, S>) -> Vec<String> {
    store.keys().map(|k| k.to_string()).collect()
}

fn by_v(x: &Value, y: &Value) -> Ordering {
    x["v"].as_i64().cmp(&y["v"].as_i64())
}

// =============================================================================
// Sorting
// =============================================================================

#[test]
fn sort_by_value() {
    let mut store = store_of(abc());
    store.sort(by_v);

    assert_eq!(order(&store), ["b", "c", "a"]);
    assert_eq!(store.get_at_index(0), Some(&json!({"key": "b", "v": 1})));
}

#[test]
fn sort_twice_emits_no_moves() {
    let mut store = store_of(abc());
    assert!(store.sort(by_v) > 0);
    store.sink_mut().drain();

    assert_eq!(store.sort(by_v), 0);
    assert_eq!(store.sink().move_count(), 0);
    assert_eq!(order(&store), ["b", "c", "a"]);
}

#[test]
fn sort_is_stable() {
    let items = vec![
        json!({"key": "x", "v": 1}),
        json!({"key": "y", "v": 0}),
        json!({"key": "z", "v": 1}),
        json!({"key": "w", "v": 0}),
    ];
    let mut store = store_of(items);
    store.sort(by_v);
    assert_eq!(order(&store), ["y", "w", "x", "z"]);
}

#[test]
fn sort_notifications_rebuild_order() {
    let mut store = store_of(abc());
    let mut projection: Vec<Key> = store.keys().cloned().collect();
    store.sort(|x, y| by_v(y, x));

    assert_eq!(store.sink().replay(&mut projection), Some(()));
    assert_eq!(projection, store.keys().cloned().collect::<Vec<_>>());
}

#[test]
fn sort_empty_store() {
    let mut store = store_of(vec![]);
    assert_eq!(store.sort(by_v), 0);
    assert!(store.sink().events.is_empty());
}

// =============================================================================
// Insert, remove, move
// =============================================================================

#[test]
fn insert_then_move_to_start() {
    let mut store = store_of(abc());
    store.sort(by_v);

    let record = store.insert_at_end(Some(Key::from("d")), json!({"v": 0})).unwrap();
    assert_eq!(record.key, Key::from("d"));
    store.move_to_start("d");

    assert_eq!(order(&store), ["d", "b", "c", "a"]);
}

#[test]
fn insert_derives_key_from_payload() {
    let mut store = store_of(abc());
    store.insert_at_end(None, json!({"key": "e", "v": 9})).unwrap();
    store.insert_at_end(Some(Key::from("")), json!({"key": "f"})).unwrap();

    assert_eq!(order(&store), ["a", "b", "c", "e", "f"]);
    assert_eq!(
        store.sink().events,
        vec![
            Notification::Inserted { key: Key::from("e"), index: 3 },
            Notification::Inserted { key: Key::from("f"), index: 4 },
        ]
    );
}

#[test]
fn insert_without_key_fails() {
    let mut store = store_of(abc());
    let err = store.insert_at_end(None, json!({"v": 1})).unwrap_err();
    assert!(matches!(err, StoreError::InvalidInput(_)));
    assert_eq!(store.len(), 3);
}

#[test]
fn insert_duplicate_fails() {
    let mut store = store_of(abc());
    let err = store.insert_at_end(Some(Key::from("b")), json!({})).unwrap_err();
    assert!(matches!(err, StoreError::DuplicateKey { ref key } if key.as_str() == "b"));
    assert_eq!(order(&store), ["a", "b", "c"]);
    assert!(store.sink().events.is_empty());
}

#[test]
fn remove_present_and_absent() {
    let mut store = store_of(abc());

    assert!(store.remove("z").is_none());
    assert_eq!(store.len(), 3);
    assert_eq!(order(&store), ["a", "b", "c"]);

    let removed = store.remove("b").unwrap();
    assert_eq!(removed.payload["v"], 1);
    assert_eq!(order(&store), ["a", "c"]);
    assert_eq!(store.index_of("c"), Some(1));
    assert!(!store.contains_key("b"));
    assert_eq!(
        store.sink().events,
        vec![Notification::Removed { key: Key::from("b"), index: 1 }]
    );
}

#[test]
fn move_to_start_then_fetch() {
    let mut store = store_of(abc());
    store.move_to_start("c");
    let fetch = store.fetch_by_key("c", 0, 0).unwrap();
    assert_eq!(fetch.absolute_index, 0);
    assert_eq!(fetch.offset, 0);
}

#[test]
fn move_to_end_then_fetch() {
    let mut store = store_of(abc());
    store.move_to_end("a");
    let fetch = store.fetch_by_key("a", 0, 0).unwrap();
    assert_eq!(fetch.absolute_index, store.len() - 1);
    assert_eq!(order(&store), ["b", "c", "a"]);
}

// =============================================================================
// Fetching and accessors
// =============================================================================

#[test]
fn fetch_missing_key() {
    let store = store_of(abc());
    let err = store.fetch_by_key("z", 0, 0).unwrap_err();
    assert!(matches!(err, StoreError::KeyNotFound { .. }));
    assert_eq!(err.key(), Some(&Key::from("z")));
}

#[test]
fn fetch_range_returns_everything() {
    let store = store_of(abc());
    let fetch = store.fetch_range(1, 0, 0).unwrap();
    assert_eq!(fetch.items.len(), 3);
    assert_eq!(fetch.offset, 1);
    assert_eq!(fetch.absolute_index, 1);
    assert_eq!(fetch.total_count, 3);
}

#[test]
fn fetch_range_out_of_bounds() {
    let store = store_of(abc());
    assert!(matches!(
        store.fetch_range(3, 0, 0),
        Err(StoreError::IndexNotFound { index: 3, count: 3 })
    ));

    let empty = store_of(vec![]);
    assert!(empty.fetch_range(0, 0, 0).is_err());
}

#[test]
fn accessor_misses_are_empty() {
    let store = store_of(abc());
    assert_eq!(store.get_at_index(3), None);
    assert_eq!(store.get_by_key("z"), None);
    assert!(!store.contains_key("z"));
    assert_eq!(store.index_of("z"), None);
}

// =============================================================================
// Batches and replacement
// =============================================================================

#[test]
fn edit_closes_on_error() {
    let mut store = store_of(abc());
    let result: Result<(), StoreError> = store.edit(|s| {
        s.move_to_end("a");
        s.insert_at_end(Some(Key::from("a")), json!({}))?;
        Ok(())
    });

    assert!(result.is_err());
    assert!(!store.in_edit());
    assert_eq!(
        store.sink().events,
        vec![
            Notification::BeginBatch,
            Notification::Moved { key: Key::from("a"), from: 0, to: 2 },
            Notification::EndBatch,
        ]
    );
}

#[test]
fn nested_begin_edit_collapses() {
    let mut store = store_of(abc());
    store.begin_edit();
    store.begin_edit();
    store.end_edit();
    store.end_edit();
    assert_eq!(
        store.sink().events,
        vec![Notification::BeginBatch, Notification::EndBatch]
    );
}

#[test]
fn replace_all_reloads_once() {
    let mut store = store_of(abc());
    store
        .replace_all(vec![json!({"key": "x"}), json!({"key": "y"})])
        .unwrap();

    assert_eq!(order(&store), ["x", "y"]);
    assert!(!store.contains_key("a"));
    assert_eq!(store.sink().events, vec![Notification::Reload]);
}

#[test]
fn replace_all_failure_keeps_data() {
    let mut store = store_of(abc());
    let err = store.replace_all_json(json!("nope")).unwrap_err();
    assert!(matches!(err, StoreError::InvalidInput(_)));

    let err = store
        .replace_all(vec![json!({"key": "x"}), json!({"key": "x"})])
        .unwrap_err();
    assert!(matches!(err, StoreError::DuplicateKey { .. }));

    assert_eq!(order(&store), ["a", "b", "c"]);
    assert!(store.sink().events.is_empty());
}

#[test]
fn replace_all_rebinds() {
    let config = StoreConfig::from_json(r#"{"useBinding": true}"#).unwrap();
    let mut store = KeyedStore::builder(config)
        .binder(|mut v: Value| {
            v["observable"] = json!(true);
            v
        })
        .sink(Recorder::new())
        .build(abc())
        .unwrap();

    store.replace_all_json(json!([{"key": "n"}])).unwrap();
    assert_eq!(store.get_by_key("n"), Some(&json!({"key": "n", "observable": true})));
}

#[test]
fn insert_skips_binder() {
    let config = StoreConfig::default().with_binding(true);
    let mut store = KeyedStore::builder(config)
        .binder(|mut v: Value| {
            v["observable"] = json!(true);
            v
        })
        .build(abc())
        .unwrap();
    assert_eq!(store.get_by_key("a").unwrap()["observable"], true);

    store.insert_at_end(None, json!({"key": "d", "v": 4})).unwrap();
    assert_eq!(store.get_by_key("d"), Some(&json!({"key": "d", "v": 4})));
}

// =============================================================================
// Misbehaving callers
// =============================================================================

fn assert_consistent<S>(store: &KeyedStore<Value, S>) {
    for (i, key) in store.keys().enumerate() {
        assert_eq!(store.index_of(key), Some(i));
        assert_eq!(store.get_by_key(key), store.get_at_index(i));
    }
}

fn many(count: usize) -> Vec<Value> {
    (0..count).map(|i| json!({"key": format!("k{}", i), "v": i})).collect()
}

#[test]
fn sort_with_random_comparator() {
    let mut store = store_of(many(64));
    let mut projection: Vec<Key> = store.keys().cloned().collect();

    let mut state = 0x2545_f491_u32;
    store.sort(|_, _| {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        match state % 3 {
            0 => Ordering::Less,
            1 => Ordering::Equal,
            _ => Ordering::Greater,
        }
    });

    assert!(!store.in_edit());
    assert_eq!(store.len(), 64);
    assert_consistent(&store);

    let mut keys = order(&store);
    keys.sort();
    let mut expected: Vec<String> = (0..64).map(|i| format!("k{}", i)).collect();
    expected.sort();
    assert_eq!(keys, expected);

    assert_eq!(store.sink().replay(&mut projection), Some(()));
    assert_eq!(projection, store.keys().cloned().collect::<Vec<_>>());
}

#[test]
fn sort_comparator_panic_closes_batch() {
    let mut store = store_of(abc());
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        store.sort(|x, y| {
            if x["v"] == 1 || y["v"] == 1 {
                panic!("comparator gave up");
            }
            by_v(x, y)
        });
    }));

    assert!(result.is_err());
    assert!(!store.in_edit());
    assert_eq!(order(&store), ["a", "b", "c"]);
    assert_consistent(&store);
    assert_eq!(
        store.sink().events,
        vec![Notification::BeginBatch, Notification::EndBatch]
    );

    // Still usable afterwards.
    store.sort(|x, y| by_v(y, x));
    assert_eq!(order(&store), ["a", "c", "b"]);
}

#[test]
fn edit_panic_closes_batch() {
    let mut store = store_of(abc());
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        store.edit(|s| -> usize {
            s.move_to_end("a");
            panic!("caller bailed out");
        })
    }));

    assert!(result.is_err());
    assert!(!store.in_edit());
    assert_consistent(&store);
    assert_eq!(store.sink().events.last(), Some(&Notification::EndBatch));
    assert_eq!(order(&store), ["b", "c", "a"]);
}
