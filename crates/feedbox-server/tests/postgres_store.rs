//! `PgUserStore` against a live database.
//!
//! Set `TEST_DATABASE_URL` to a disposable Postgres database to run these;
//! without it every test returns early.

use chrono::{Duration, Utc};
use feedbox_server::db::{PgUserStore, UserRecord, UserStore};
use feedbox_shared::Message;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::Mutex;
use uuid::Uuid;

static SCHEMA_READY: Mutex<bool> = Mutex::const_new(false);

async fn store() -> Option<PgUserStore> {
    let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set, skipping Postgres store test");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await
        .expect("connect to TEST_DATABASE_URL");
    let store = PgUserStore::new(pool);

    // Concurrent CREATE ... IF NOT EXISTS can still collide
    let mut ready = SCHEMA_READY.lock().await;
    if !*ready {
        store.ensure_schema().await.expect("create schema");
        *ready = true;
    }

    Some(store)
}

/// Unique per test run so tests never see each other's rows.
fn pending_user(username: &str, code: &str) -> UserRecord {
    let suffix = Uuid::new_v4().simple().to_string();
    UserRecord::new(
        username,
        &format!("{}@example.com", suffix),
        "hash".to_string(),
        code.to_string(),
        Utc::now() + Duration::hours(1),
    )
}

fn unique_name(prefix: &str) -> String {
    format!("{}_{}", prefix, &Uuid::new_v4().simple().to_string()[..12])
}

#[tokio::test]
async fn insert_and_fetch_round_trips_embedded_messages() {
    let Some(store) = store().await else { return };
    let mut user = pending_user(&unique_name("roundtrip"), "123456");
    user.messages = vec![Message::new("stored", Utc::now())];
    store.insert_user(&user).await.unwrap();

    let fetched = store.find_by_id(user.id).await.unwrap().unwrap();
    assert_eq!(fetched.username, user.username);
    assert_eq!(fetched.verify_code.as_deref(), Some("123456"));
    assert!(fetched.is_accepting_messages);
    assert_eq!(fetched.messages.len(), 1);
    assert_eq!(fetched.messages[0].id, user.messages[0].id);

    assert!(store.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn append_is_refused_when_not_accepting() {
    let Some(store) = store().await else { return };
    let user = pending_user(&unique_name("closed"), "123456");
    store.insert_user(&user).await.unwrap();

    assert!(store
        .append_message(user.id, &Message::new("first", Utc::now()))
        .await
        .unwrap());

    let updated = store
        .set_accepting_messages(user.id, false)
        .await
        .unwrap()
        .unwrap();
    assert!(!updated.is_accepting_messages);

    let appended = store
        .append_message(user.id, &Message::new("second", Utc::now()))
        .await
        .unwrap();
    assert!(!appended);

    let stored = store.find_by_id(user.id).await.unwrap().unwrap();
    assert_eq!(stored.messages.len(), 1);
    assert_eq!(stored.messages[0].content, "first");

    assert!(!store
        .append_message(Uuid::new_v4(), &Message::new("nobody", Utc::now()))
        .await
        .unwrap());
}

#[tokio::test]
async fn remove_keeps_the_remaining_order() {
    let Some(store) = store().await else { return };
    let user = pending_user(&unique_name("removal"), "123456");
    store.insert_user(&user).await.unwrap();

    let now = Utc::now();
    let messages: Vec<_> = ["a", "b", "c", "d"]
        .into_iter()
        .map(|content| Message::new(content, now))
        .collect();
    for message in &messages {
        assert!(store.append_message(user.id, message).await.unwrap());
    }

    assert!(store.remove_message(user.id, messages[1].id).await.unwrap());
    assert!(!store.remove_message(user.id, messages[1].id).await.unwrap());
    assert!(!store.remove_message(user.id, Uuid::new_v4()).await.unwrap());

    let stored = store.find_by_id(user.id).await.unwrap().unwrap();
    let contents: Vec<_> = stored.messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, ["a", "c", "d"]);

    // Removing the last message leaves an empty array, not NULL
    for message in [&messages[0], &messages[2], &messages[3]] {
        assert!(store.remove_message(user.id, message.id).await.unwrap());
    }
    let stored = store.find_by_id(user.id).await.unwrap().unwrap();
    assert!(stored.messages.is_empty());
}

#[tokio::test]
async fn remove_only_touches_the_owner() {
    let Some(store) = store().await else { return };
    let owner = pending_user(&unique_name("owner"), "123456");
    let other = pending_user(&unique_name("other"), "123456");
    store.insert_user(&owner).await.unwrap();
    store.insert_user(&other).await.unwrap();

    let message = Message::new("private", Utc::now());
    store.append_message(owner.id, &message).await.unwrap();

    assert!(!store.remove_message(other.id, message.id).await.unwrap());
    let stored = store.find_by_id(owner.id).await.unwrap().unwrap();
    assert_eq!(stored.messages.len(), 1);
}

#[tokio::test]
async fn mark_verified_clears_the_code() {
    let Some(store) = store().await else { return };
    let user = pending_user(&unique_name("verify"), "123456");
    store.insert_user(&user).await.unwrap();

    assert!(store.mark_verified(user.id).await.unwrap());

    let stored = store.find_by_id(user.id).await.unwrap().unwrap();
    assert!(stored.is_verified);
    assert!(stored.verify_code.is_none());
    assert!(stored.verify_code_expiry.is_none());

    assert!(!store.mark_verified(Uuid::new_v4()).await.unwrap());
}

#[tokio::test]
async fn only_one_verified_account_per_username() {
    let Some(store) = store().await else { return };
    let name = unique_name("shared");
    let first = pending_user(&name, "111111");
    let second = pending_user(&name, "222222");

    // Pending duplicates are allowed
    store.insert_user(&first).await.unwrap();
    store.insert_user(&second).await.unwrap();
    assert!(store.find_verified_by_username(&name).await.unwrap().is_none());

    let found = store
        .find_pending_by_username_and_code(&name, "222222")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, second.id);
    assert!(store
        .find_pending_by_username_and_code(&name, "333333")
        .await
        .unwrap()
        .is_none());

    assert!(store.mark_verified(second.id).await.unwrap());
    assert!(store.mark_verified(first.id).await.is_err());

    let owner = store.find_verified_by_username(&name).await.unwrap().unwrap();
    assert_eq!(owner.id, second.id);
    let preferred = store.find_by_username(&name).await.unwrap().unwrap();
    assert_eq!(preferred.id, second.id);

    // A verified account has no pending code to match
    assert!(store
        .find_pending_by_username_and_code(&name, "222222")
        .await
        .unwrap()
        .is_none());
}
