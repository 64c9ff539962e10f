//! End-to-end imports against an on-disk SQLite database

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use chat_engagement::models::{MessageType, NewMember};
use chat_engagement::{BehaviorType, Database, IngestPipeline};
use chrono::{NaiveDate, NaiveDateTime};
use tempfile::TempDir;

const TRANSCRIPT: &str = "\
[3/1/24, 8:00:00 AM] Keegan Arthur: \u{200E}Keegan Arthur added Alice Smith
[3/1/24, 8:05:00 AM] Alice Smith: Thanks for adding me!
[3/2/24, 7:30:00 PM] ~ Bob J: Who's in for Saturday?
Meet at 8.
[3/2/24, 7:31:10 PM] Alice Smith: \u{200E}image omitted
[3/3/24, 9:00:00 AM] Keegan Arthur: POLL:
Saturday distance?
\u{200E}OPTION: 5k (2 votes)
\u{200E}OPTION: 10k (1 vote)
[3/4/24, 6:45:00 AM] Random Number: hi all
[3/4/24, 6:46:00 AM] Alice Smith: welcome!
";

fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 5)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

fn seeded_database(dir: &TempDir) -> Database {
    let db = Database::new(dir.path().join("engagement.db").to_str().unwrap()).unwrap();
    for (id, name) in [("m1", "Alice Smith"), ("m2", "Bob Jones"), ("m3", "Keegan Arthur")] {
        db.add_or_update_member(NewMember {
            id: id.to_string(),
            full_name: name.to_string(),
            phone_number: None,
        })
        .unwrap();
    }
    db
}

#[tokio::test]
async fn test_import_stores_messages_and_metrics() {
    let dir = TempDir::new().unwrap();
    let db = seeded_database(&dir);
    let pipeline = IngestPipeline::new(&db, &db, &db).unwrap().with_batch_size(2);

    let summary = pipeline.run(TRANSCRIPT, now()).await.unwrap();

    assert_eq!(summary.total_parsed, 7);
    assert_eq!(summary.unique_senders, 4);
    assert_eq!(summary.matched_senders, 3);
    assert_eq!(summary.unmatched_senders, vec!["Random Number".to_string()]);
    assert_eq!(summary.messages_imported, 7);
    assert_eq!(summary.failed_batches, 0);
    assert_eq!(summary.metrics_updated, 3);
    assert!(!summary.aborted);
    assert_eq!(db.message_count().unwrap(), 7);

    let alice = db.get_metrics("m1").unwrap().unwrap();
    assert_eq!(alice.metrics.total_messages, 3);
    assert_eq!(alice.metrics.messages_this_month, 3);
    assert_eq!(alice.metrics.behavior_type, BehaviorType::Champion);
    assert_eq!(alice.last_calculated_at, now());

    let bob_messages = db.get_member_messages("m2").unwrap();
    assert_eq!(bob_messages.len(), 1);
    assert_eq!(bob_messages[0].sender_name, "~ Bob J");
    assert_eq!(
        bob_messages[0].message_content,
        "Who's in for Saturday?\nMeet at 8."
    );
    assert_eq!(bob_messages[0].timestamp, "2024-03-02T19:30:00");

    let keegan_messages = db.get_member_messages("m3").unwrap();
    let types: Vec<MessageType> = keegan_messages.iter().map(|m| m.message_type).collect();
    assert_eq!(types, vec![MessageType::System, MessageType::Poll]);
}

#[tokio::test]
async fn test_abort_before_first_batch_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let db = seeded_database(&dir);
    let pipeline = IngestPipeline::new(&db, &db, &db)
        .unwrap()
        .with_abort_flag(Arc::new(AtomicBool::new(true)));

    let summary = pipeline.run(TRANSCRIPT, now()).await.unwrap();

    assert!(summary.aborted);
    assert_eq!(summary.messages_imported, 0);
    assert_eq!(db.message_count().unwrap(), 0);
    assert!(db.list_metrics().unwrap().is_empty());
}

#[tokio::test]
async fn test_recalculate_matches_import_metrics() {
    let dir = TempDir::new().unwrap();
    let db = seeded_database(&dir);
    let pipeline = IngestPipeline::new(&db, &db, &db).unwrap();

    let imported = pipeline.run(TRANSCRIPT, now()).await.unwrap();
    let after_import = db.list_metrics().unwrap();

    let recalculated = pipeline.recalculate(now()).await.unwrap();
    let after_recalculate = db.list_metrics().unwrap();

    assert_eq!(recalculated.members_scored, 3);
    assert_eq!(recalculated.messages_considered, 6);
    assert_eq!(recalculated.behavior_distribution, imported.behavior_distribution);
    assert_eq!(after_recalculate, after_import);
}

#[tokio::test]
async fn test_reimport_converges_on_same_state() {
    let dir = TempDir::new().unwrap();
    let db = seeded_database(&dir);
    let pipeline = IngestPipeline::new(&db, &db, &db).unwrap();

    pipeline.run(TRANSCRIPT, now()).await.unwrap();
    let first = db.list_metrics().unwrap();
    assert_eq!(db.message_count().unwrap(), 7);

    let again = pipeline.run(TRANSCRIPT, now()).await.unwrap();
    assert_eq!(again.messages_imported, 0);
    assert_eq!(again.duplicates_skipped, 7);
    assert_eq!(db.message_count().unwrap(), 7);
    assert_eq!(db.list_metrics().unwrap(), first);

    let recalculated = pipeline.recalculate(now()).await.unwrap();
    assert_eq!(recalculated.messages_considered, 6);
    assert_eq!(db.list_metrics().unwrap(), first);
    assert_eq!(db.get_metrics("m1").unwrap().unwrap().metrics.total_messages, 3);
}

#[tokio::test]
async fn test_reimport_picks_up_new_directory_members() {
    let dir = TempDir::new().unwrap();
    let db = seeded_database(&dir);
    let pipeline = IngestPipeline::new(&db, &db, &db).unwrap();

    let first = pipeline.run(TRANSCRIPT, now()).await.unwrap();
    assert_eq!(first.unmatched_senders, vec!["Random Number".to_string()]);

    db.add_or_update_member(NewMember {
        id: "m4".to_string(),
        full_name: "Random Number".to_string(),
        phone_number: None,
    })
    .unwrap();
    let second = pipeline.run(TRANSCRIPT, now()).await.unwrap();

    assert!(second.unmatched_senders.is_empty());
    assert_eq!(db.message_count().unwrap(), 7);
    let stored = db.get_member_messages("m4").unwrap();
    assert_eq!(stored.len(), 1);
    assert!(stored[0].is_matched);
}

#[tokio::test]
async fn test_malformed_transcript_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let db = seeded_database(&dir);
    let pipeline = IngestPipeline::new(&db, &db, &db).unwrap();

    let broken = "[3/1/24, 8:00:00 AM] Alice Smith: ok\n[3/1/24, 13:00:00 PM] Alice Smith: bad\n";
    assert!(pipeline.run(broken, now()).await.is_err());
    assert_eq!(db.message_count().unwrap(), 0);
}
