//! SQLite member directory, message store and metrics store

use chat_engagement::models::{
    BehaviorType, EngagementMetrics, MessageRecord, MessageType, MetricsRecord, NewMember,
};
use chat_engagement::repository::{MemberDirectory, MessageStore, MetricsStore};
use chat_engagement::Database;
use chrono::{NaiveDate, NaiveDateTime};
use tempfile::TempDir;

fn open(dir: &TempDir) -> Database {
    let db_url = format!("sqlite://{}", dir.path().join("nested/test.db").display());
    Database::new(&db_url).expect("Failed to create database")
}

fn new_member(id: &str, name: &str, phone: Option<&str>) -> NewMember {
    NewMember {
        id: id.to_string(),
        full_name: name.to_string(),
        phone_number: phone.map(str::to_string),
    }
}

fn at(d: u32, h: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, d)
        .unwrap()
        .and_hms_opt(h, 0, 0)
        .unwrap()
}

fn record(member_id: Option<&str>, sender: &str, timestamp: &str) -> MessageRecord {
    MessageRecord {
        member_id: member_id.map(str::to_string),
        sender_name: sender.to_string(),
        message_content: "hi".to_string(),
        message_type: MessageType::Text,
        timestamp: timestamp.to_string(),
        is_matched: member_id.is_some(),
        raw_line: format!("[1/5/24, 9:00:00 AM] {sender}: hi"),
    }
}

#[test]
fn test_database_creation_and_initialization() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);

    let _conn = db.get_connection().expect("Failed to get database connection");
    assert!(dir.path().join("nested/test.db").exists());

    // Reopening runs the idempotent migration again
    drop(db);
    let db = open(&dir);
    assert_eq!(db.message_count().unwrap(), 0);
}

#[tokio::test]
async fn test_member_management_keeps_directory_order() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);

    db.add_or_update_member(new_member("m2", "Bob Jones", None)).unwrap();
    db.add_or_update_member(new_member("m1", "Alice Smith", Some("+1 555 123 4567")))
        .unwrap();
    // Update keeps the original position
    let updated = db
        .add_or_update_member(new_member("m2", "Robert Jones", Some("  ")))
        .unwrap();
    assert_eq!(updated.phone_number, None);

    let members = db.fetch_members().await.unwrap();
    let ids: Vec<&str> = members.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["m2", "m1"]);
    assert_eq!(members[0].full_name, "Robert Jones");

    let alice = db.get_member("m1").unwrap().unwrap();
    assert_eq!(alice.phone_number.as_deref(), Some("+1 555 123 4567"));
    assert!(db.get_member("nobody").unwrap().is_none());
}

#[test]
fn test_invalid_member_is_rejected() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);

    assert!(db.add_or_update_member(new_member("m1", "", None)).is_err());
    assert!(db
        .add_or_update_member(new_member("m1", "Alice", Some("call me")))
        .is_err());
    assert!(db.list_members().unwrap().is_empty());
}

#[tokio::test]
async fn test_message_batches_and_matched_timestamps() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);

    db.insert_messages(&[
        record(Some("m1"), "Alice", "2024-01-05T09:00:00"),
        record(None, "Stranger", "2024-01-05T09:01:00"),
        record(Some("m2"), "Bob", "2024-01-05T09:02:00"),
    ])
    .await
    .unwrap();

    assert_eq!(db.message_count().unwrap(), 3);

    let matched = db.matched_message_timestamps().await.unwrap();
    assert_eq!(
        matched,
        vec![
            ("m1".to_string(), at(5, 9)),
            ("m2".to_string(), NaiveDate::from_ymd_opt(2024, 1, 5).unwrap().and_hms_opt(9, 2, 0).unwrap()),
        ]
    );

    let alice = db.get_member_messages("m1").unwrap();
    assert_eq!(alice.len(), 1);
    assert!(alice[0].is_matched);
    assert_eq!(alice[0].message_type, MessageType::Text);
}

#[tokio::test]
async fn test_metrics_upsert_is_keyed_by_member() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);

    let metrics = |score: u8, total: u32| MetricsRecord {
        metrics: EngagementMetrics {
            member_id: "m1".to_string(),
            total_messages: total,
            messages_this_month: total,
            messages_last_month: 0,
            engagement_score: score,
            behavior_type: BehaviorType::from_score(score),
            first_message_at: at(1, 8),
            last_message_at: at(5, 9),
        },
        last_calculated_at: at(6, 12),
    };

    db.upsert_metrics(&[metrics(30, 3)]).await.unwrap();
    db.upsert_metrics(&[metrics(85, 12)]).await.unwrap();

    let all = db.list_metrics().unwrap();
    assert_eq!(all.len(), 1);
    let stored = db.get_metrics("m1").unwrap().unwrap();
    assert_eq!(stored, metrics(85, 12));
    assert_eq!(stored.metrics.behavior_type, BehaviorType::Champion);
}

#[tokio::test]
async fn test_same_message_is_stored_once() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);

    let batch = [
        record(None, "Alice", "2024-01-05T09:00:00"),
        record(None, "Bob", "2024-01-05T09:00:00"),
    ];
    assert_eq!(db.insert_messages(&batch).await.unwrap(), 2);
    assert_eq!(db.insert_messages(&batch).await.unwrap(), 0);
    assert_eq!(db.message_count().unwrap(), 2);

    // A later import that resolves the sender refreshes the stored row
    let resolved = [record(Some("m1"), "Alice", "2024-01-05T09:00:00")];
    assert_eq!(db.insert_messages(&resolved).await.unwrap(), 0);
    assert_eq!(db.message_count().unwrap(), 2);
    assert_eq!(
        db.matched_message_timestamps().await.unwrap(),
        vec![("m1".to_string(), at(5, 9))]
    );
}
