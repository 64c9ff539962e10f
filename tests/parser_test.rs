//! Transcript parsing against realistic exports

use chat_engagement::models::MessageType;
use chat_engagement::{EngagementError, TranscriptParser};
use chrono::{NaiveDate, NaiveDateTime};
use proptest::prelude::*;

fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, s)
        .unwrap()
}

#[test]
fn test_two_entry_scenario() {
    let transcript = "[1/5/24, 9:00:00 AM] Alice Smith: hello\n\
                      [1/5/24, 9:00:05 AM] Bob Jones: \u{200E}image omitted\n";
    let messages = TranscriptParser::new().unwrap().parse(transcript).unwrap();

    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].sender_name, "Alice Smith");
    assert_eq!(messages[0].message_type, MessageType::Text);
    assert_eq!(messages[0].timestamp, at(2024, 1, 5, 9, 0, 0));
    assert_eq!(messages[1].sender_name, "Bob Jones");
    assert_eq!(messages[1].message_type, MessageType::Image);
    assert_eq!(messages[1].timestamp, at(2024, 1, 5, 9, 0, 5));
}

#[test]
fn test_realistic_export() {
    let transcript = "\
Messages and calls are end-to-end encrypted.
[10/1/24, 5:49:57 PM] Keegan Arthur: \u{200E}Keegan Arthur created group \"Run Club\"
[10/1/24, 5:50:10 PM] Keegan Arthur: Welcome everyone!
Saturday 8am at the park.

Bring water.
[10/1/24, 6:02:00 PM] ~ Dana: \u{200E}sticker omitted
[10/2/24, 7:15:00 AM] Keegan Arthur: POLL:
Which route?
\u{200E}OPTION: River loop (3 votes)
\u{200E}OPTION: Hill climb (1 vote)
[10/2/24, 7:20:00 AM] ~ Dana: River for sure <This message was edited>
[10/2/24, 12:00:00 AM] Sam: midnight run?
";
    let messages = TranscriptParser::new().unwrap().parse(transcript).unwrap();

    assert_eq!(messages.len(), 6);

    assert_eq!(messages[0].message_type, MessageType::System);

    assert_eq!(
        messages[1].message_content,
        "Welcome everyone!\nSaturday 8am at the park.\nBring water."
    );
    assert_eq!(messages[1].message_type, MessageType::Text);

    assert_eq!(messages[2].sender_name, "~ Dana");
    assert_eq!(messages[2].message_type, MessageType::Sticker);

    assert!(messages[3].is_poll);
    assert_eq!(messages[3].message_type, MessageType::Poll);
    assert_eq!(
        messages[3].poll_options.as_deref(),
        Some(&["River loop (3 votes)".to_string(), "Hill climb (1 vote)".to_string()][..])
    );

    assert!(messages[4].is_edited);
    assert!(!messages[4].is_poll);
    assert_eq!(messages[4].poll_options, None);

    // 12 AM is midnight, and the parser keeps transcript order even when
    // the clock goes backwards.
    assert_eq!(messages[5].timestamp, at(2024, 10, 2, 0, 0, 0));
    assert!(messages[5].timestamp < messages[4].timestamp);
}

#[test]
fn test_four_digit_year() {
    let messages = TranscriptParser::new()
        .unwrap()
        .parse("[12/31/2023, 11:59:59 PM] Alice: last one")
        .unwrap();
    assert_eq!(messages[0].timestamp, at(2023, 12, 31, 23, 59, 59));
}

#[test]
fn test_malformed_time_is_fatal() {
    let transcript = "[1/5/24, 9:00:00 AM] Alice: fine\n[1/5/24, 9:0:00 AM] Bob: broken\n";
    let result = TranscriptParser::new().unwrap().parse(transcript);

    match result {
        Err(EngagementError::InvalidTimestamp { line, value }) => {
            assert_eq!(line, 2);
            assert!(value.contains("9:0:00"));
        }
        other => panic!("expected InvalidTimestamp, got {other:?}"),
    }
}

#[test]
fn test_impossible_date_is_fatal() {
    let result = TranscriptParser::new()
        .unwrap()
        .parse("[2/30/24, 9:00:00 AM] Alice: leap?");
    assert!(matches!(result, Err(EngagementError::InvalidTimestamp { line: 1, .. })));
}

#[test]
fn test_empty_and_headerless_input() {
    let parser = TranscriptParser::new().unwrap();
    assert!(parser.parse("").unwrap().is_empty());
    assert!(parser.parse("\n\n   \n").unwrap().is_empty());
    assert!(parser.parse("no entries here\nat all").unwrap().is_empty());
}

fn entry_line(index: usize, sender: &str, body: &str) -> String {
    let minute = index % 60;
    let hour = (index / 60) % 12 + 1;
    format!("[3/{}/24, {hour}:{minute:02}:00 AM] {sender}: {body}", index / 720 + 1)
}

proptest! {
    /// The parser never reorders: the i-th message comes from the i-th entry line
    #[test]
    fn prop_output_follows_input_order(
        entries in prop::collection::vec(("[A-Z][a-z]{1,8}", "[a-z]{1,12}"), 1..40)
    ) {
        let lines: Vec<String> = entries
            .iter()
            .enumerate()
            .map(|(i, (sender, body))| entry_line(i, sender, &format!("{body} #{i}")))
            .collect();
        let messages = TranscriptParser::new().unwrap().parse(&lines.join("\n")).unwrap();

        prop_assert_eq!(messages.len(), entries.len());
        for (i, message) in messages.iter().enumerate() {
            prop_assert_eq!(&message.sender_name, &entries[i].0);
            let suffix = format!("#{i}");
            prop_assert!(message.message_content.ends_with(&suffix));
            prop_assert_eq!(&message.raw_line, &lines[i]);
        }
    }

    /// Continuation lines come back verbatim when the body is split on newlines
    #[test]
    fn prop_continuations_round_trip(
        first in "[a-z]{1,12}",
        continuation in prop::collection::vec("[a-z][a-z ]{0,20}[a-z]", 0..8)
    ) {
        let mut transcript = format!("[1/5/24, 9:00:00 AM] Alice: {first}\n");
        for line in &continuation {
            transcript.push_str(line);
            transcript.push('\n');
        }
        transcript.push_str("[1/5/24, 9:01:00 AM] Bob: next\n");

        let messages = TranscriptParser::new().unwrap().parse(&transcript).unwrap();
        prop_assert_eq!(messages.len(), 2);

        let body_lines: Vec<&str> = messages[0].message_content.split('\n').collect();
        prop_assert_eq!(body_lines[0], first.as_str());
        prop_assert_eq!(body_lines[1..].join("\n"), continuation.join("\n"));
    }
}
