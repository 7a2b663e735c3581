use super::*;
use std::time::Duration;

#[test]
fn turns_serialize_with_lowercase_roles() {
    let json = serde_json::to_value(Turn::user("hi")).expect("turn serializes");
    assert_eq!(json, serde_json::json!({ "role": "user", "content": "hi" }));

    let turn: Turn = serde_json::from_str(r#"{"role":"assistant","content":"hello"}"#)
        .expect("turn deserializes");
    assert_eq!(turn, Turn::assistant("hello"));
}

#[test]
fn unknown_session_has_empty_history() {
    let store = SessionStore::default();
    assert!(store.history("nobody").is_empty());
    assert!(store.is_empty());
}

#[test]
fn history_keeps_insertion_order() {
    let store = SessionStore::default();
    store.append("s1", Turn::user("question"));
    store.append("s1", Turn::assistant("answer"));

    assert_eq!(
        store.history("s1"),
        vec![Turn::user("question"), Turn::assistant("answer")]
    );
}

#[test]
fn history_is_bounded_to_most_recent_turns() {
    let store = SessionStore::default();
    for i in 0..13 {
        store.append("s1", Turn::user(format!("turn {i}")));
    }

    let history = store.history("s1");
    assert_eq!(history.len(), DEFAULT_MAX_TURNS);
    let contents = history.iter().map(|t| t.content.as_str()).collect::<Vec<_>>();
    let expected = (3..13).map(|i| format!("turn {i}")).collect::<Vec<_>>();
    assert_eq!(contents, expected);
}

#[test]
fn custom_limit_is_respected() {
    let store = SessionStore::new(2);
    store.append("s1", Turn::user("a"));
    store.append("s1", Turn::assistant("b"));
    store.append("s1", Turn::user("c"));

    assert_eq!(store.max_turns(), 2);
    assert_eq!(
        store.history("s1"),
        vec![Turn::assistant("b"), Turn::user("c")]
    );
}

#[test]
fn clear_empties_only_that_session() {
    let store = SessionStore::default();
    store.append("s1", Turn::user("one"));
    store.append("s2", Turn::user("two"));

    store.clear("s1");
    store.clear("missing");

    assert!(store.history("s1").is_empty());
    assert_eq!(store.history("s2"), vec![Turn::user("two")]);
}

#[test]
fn sessions_are_independent() {
    let store = SessionStore::default();
    store.append("a", Turn::user("for a"));
    store.append("b", Turn::user("for b"));

    assert_eq!(store.len(), 2);
    assert_eq!(store.history("a"), vec![Turn::user("for a")]);
    assert_eq!(store.history("b"), vec![Turn::user("for b")]);
}

#[tokio::test]
async fn lock_on_one_session_does_not_block_another() {
    let store = SessionStore::default();
    let _held = store.lock("busy").await;

    let other = tokio::time::timeout(Duration::from_millis(200), store.lock("idle")).await;
    assert!(other.is_ok(), "different session should lock immediately");
}

#[tokio::test]
async fn lock_serializes_same_session() {
    let store = Arc::new(SessionStore::default());
    let held = store.lock("shared").await;

    let waiter = tokio::spawn({
        let store = Arc::clone(&store);
        async move {
            let _guard = store.lock("shared").await;
            store.append("shared", Turn::user("second"));
        }
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    store.append("shared", Turn::user("first"));
    drop(held);
    waiter.await.expect("waiter finishes");

    assert_eq!(
        store.history("shared"),
        vec![Turn::user("first"), Turn::user("second")]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_sessions_append_without_interference() {
    let store = Arc::new(SessionStore::default());

    let tasks = (0..8)
        .map(|n| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                let id = format!("session-{n}");
                let _guard = store.lock(&id).await;
                for i in 0..4 {
                    store.append(&id, Turn::user(format!("{n}-{i}")));
                }
            })
        })
        .collect::<Vec<_>>();

    for task in tasks {
        task.await.expect("task finishes");
    }

    assert_eq!(store.len(), 8);
    for n in 0..8 {
        let history = store.history(&format!("session-{n}"));
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].content, format!("{n}-0"));
    }
}
