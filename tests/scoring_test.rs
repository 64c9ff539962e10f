//! Engagement score formula, month windows and tiers

use chat_engagement::models::BehaviorType;
use chat_engagement::scoring::{recency_multiplier, MemberTimeline};
use chat_engagement::EngagementScorer;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use proptest::prelude::*;

fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 15)
        .unwrap()
        .and_hms_opt(10, 0, 0)
        .unwrap()
}

#[test]
fn test_ten_of_hundred_three_days_ago_is_champion() {
    let scorer = EngagementScorer::new(now());
    let three_days_ago = now() - Duration::days(3);

    let mut timeline = MemberTimeline::new();
    timeline.insert("m1".to_string(), vec![three_days_ago; 10]);
    timeline.insert("others".to_string(), vec![three_days_ago; 90]);

    let scored = scorer.score(&timeline);
    let metrics = &scored["m1"];
    assert_eq!(metrics.total_messages, 10);
    assert_eq!(metrics.engagement_score, 100);
    assert_eq!(metrics.behavior_type, BehaviorType::Champion);
}

#[test]
fn test_recency_discount() {
    let scorer = EngagementScorer::new(now());
    // 5% share: 50 before discounting
    assert_eq!(scorer.engagement_score(5, 100, now() - Duration::days(1)), 50);
    assert_eq!(scorer.engagement_score(5, 100, now() - Duration::days(20)), 40);
    assert_eq!(scorer.engagement_score(5, 100, now() - Duration::days(60)), 25);
    assert_eq!(scorer.engagement_score(5, 100, now() - Duration::days(200)), 5);
}

#[test]
fn test_multiplier_boundaries() {
    assert!((recency_multiplier(7.0) - 1.0).abs() < f64::EPSILON);
    assert!((recency_multiplier(7.01) - 0.8).abs() < f64::EPSILON);
    assert!((recency_multiplier(30.0) - 0.8).abs() < f64::EPSILON);
    assert!((recency_multiplier(90.0) - 0.5).abs() < f64::EPSILON);
    assert!((recency_multiplier(90.5) - 0.1).abs() < f64::EPSILON);
}

#[test]
fn test_month_windows_across_year_boundary() {
    let now = NaiveDate::from_ymd_opt(2024, 1, 10)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap();
    let scorer = EngagementScorer::new(now);

    let dec_first = NaiveDate::from_ymd_opt(2023, 12, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
    let dec_last = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap().and_hms_opt(23, 30, 0).unwrap();
    let nov = NaiveDate::from_ymd_opt(2023, 11, 30).unwrap().and_hms_opt(23, 59, 59).unwrap();
    let jan = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();

    let mut timeline = MemberTimeline::new();
    timeline.insert("m1".to_string(), vec![nov, dec_first, dec_last, jan]);

    let scored = scorer.score(&timeline);
    let metrics = &scored["m1"];
    assert_eq!(metrics.messages_this_month, 1);
    assert_eq!(metrics.messages_last_month, 2);
    assert_eq!(metrics.first_message_at, nov);
    assert_eq!(metrics.last_message_at, jan);
}

#[test]
fn test_empty_timeline() {
    assert!(EngagementScorer::new(now()).score(&MemberTimeline::new()).is_empty());
}

proptest! {
    #[test]
    fn prop_score_is_bounded(
        member in 0usize..500,
        extra in 0usize..500,
        days_ago in 0i64..400,
    ) {
        let scorer = EngagementScorer::new(now());
        let score = scorer.engagement_score(member, member + extra, now() - Duration::days(days_ago));
        prop_assert!(score <= 100);
    }

    #[test]
    fn prop_more_messages_never_lower_score(
        member in 0usize..300,
        more in 0usize..300,
        total_extra in 0usize..300,
        days_ago in 0i64..400,
    ) {
        let scorer = EngagementScorer::new(now());
        let total = member + more + total_extra;
        let last = now() - Duration::days(days_ago);

        let lower = scorer.engagement_score(member, total, last);
        let higher = scorer.engagement_score(member + more, total, last);
        prop_assert!(higher >= lower);
    }
}
