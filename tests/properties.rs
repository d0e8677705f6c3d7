use campaign_analyzer::analysis::{compute, net_changes, Statistics};
use campaign_analyzer::changes::{ChangeEntry, SessionGrouper};
use campaign_analyzer::llm::{build, parse, AnalysisQuality, PromptInput, PromptLimits};
use campaign_analyzer::request::DateRange;
use campaign_analyzer::AnalysisError;
use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use serde_json::json;

const TABLES: &[&str] = &[
    "sp_campaign_details_v2_changes_log",
    "sp_campaign_geo_targeting_changes_log",
];
const ACTORS: &[&str] = &["alice", "bob", "carol"];
const FIELDS: &[&str] = &["budget", "status", "bid", "country"];

fn entry_strategy() -> impl Strategy<Value = (i64, Option<usize>, usize, usize, u32)> {
    (
        0i64..24 * 60,
        proptest::option::of(0..ACTORS.len()),
        0..FIELDS.len(),
        0..TABLES.len(),
        0u32..10_000,
    )
}

fn entries_strategy() -> impl Strategy<Value = Vec<ChangeEntry>> {
    prop::collection::vec(entry_strategy(), 0..80).prop_map(|raw| {
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        raw.into_iter()
            .enumerate()
            .map(|(sequence, (minute, actor, field, table, value))| ChangeEntry {
                table_origin: TABLES[table].to_string(),
                entity_id: 42,
                field_name: FIELDS[field].to_string(),
                old_value: Some(value.to_string()),
                new_value: Some((value + 1).to_string()),
                update_time: base + Duration::minutes(minute),
                actor: actor.map(|a| ACTORS[a].to_string()),
                sequence,
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn sessions_partition_the_sorted_input(entries in entries_strategy(), gap in 1i64..120) {
        let sessions = SessionGrouper::new(Duration::minutes(gap)).group(&entries);

        let mut sorted = entries.clone();
        sorted.sort_by_key(|e| e.update_time);
        let flattened: Vec<usize> = sessions
            .iter()
            .flat_map(|s| s.entries.iter().map(|e| e.sequence))
            .collect();
        let expected: Vec<usize> = sorted.iter().map(|e| e.sequence).collect();
        prop_assert_eq!(flattened, expected);

        for session in &sessions {
            prop_assert!(!session.entries.is_empty());
            prop_assert_eq!(session.entry_count, session.entries.len());
            prop_assert_eq!(session.start_time, session.entries[0].update_time);
            for pair in session.entries.windows(2) {
                prop_assert!(pair[1].update_time - pair[0].update_time <= Duration::minutes(gap));
            }
        }
        for pair in sessions.windows(2) {
            prop_assert!(pair[0].end_time <= pair[1].start_time);
        }
    }

    #[test]
    fn counts_sum_to_total(entries in entries_strategy()) {
        let sessions = SessionGrouper::new(Duration::minutes(5)).group(&entries);
        let statistics = compute(&entries, &sessions);

        prop_assert_eq!(statistics.total_entries, entries.len());
        prop_assert_eq!(statistics.total_sessions, sessions.len());
        let field_total: usize = statistics.field_counts.iter().map(|c| c.count).sum();
        let actor_total: usize = statistics.actor_counts.iter().map(|c| c.count).sum();
        let table_total: usize = statistics.table_counts.iter().map(|c| c.count).sum();
        prop_assert_eq!(field_total, entries.len());
        prop_assert_eq!(actor_total, entries.len());
        prop_assert_eq!(table_total, entries.len());
        prop_assert_eq!(Statistics::session_entry_total(&sessions), entries.len());
    }

    #[test]
    fn prompt_never_exceeds_ceiling(
        entries in entries_strategy(),
        ceiling in 500usize..20_000,
        max_detail_entries in 0usize..100,
    ) {
        let sessions = SessionGrouper::new(Duration::minutes(5)).group(&entries);
        let statistics = compute(&entries, &sessions);
        let net = net_changes(&entries);
        let date_range = DateRange::parse("2024-03-01", "2024-03-31").unwrap();

        let result = build(&PromptInput {
            campaign_id: 42,
            date_range: &date_range,
            statistics: &statistics,
            net_changes: &net,
            sessions: &sessions,
            limits: PromptLimits {
                max_prompt_bytes: ceiling,
                max_detail_entries,
                value_preview_chars: 100,
            },
        });

        match result {
            Ok(prompt) => {
                prop_assert!(prompt.user.len() <= ceiling);
                prop_assert!(prompt.user.contains("## Summary Statistics"));
                prop_assert!(prompt.truncation.omitted_sessions <= sessions.len());
                prop_assert!(prompt.truncation.omitted_entries <= entries.len());
            }
            Err(AnalysisError::PromptTooLarge { required, ceiling: reported }) => {
                prop_assert_eq!(reported, ceiling);
                prop_assert!(required > ceiling);
            }
            Err(other) => prop_assert!(false, "unexpected error: {other}"),
        }
    }
}

fn items_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(any::<String>(), 0..5)
}

proptest! {
    #[test]
    fn well_formed_response_parses_exactly(
        summary in any::<String>(),
        key_insights in items_strategy(),
        risk_factors in items_strategy(),
        recommendations in items_strategy(),
        pretty in any::<bool>(),
    ) {
        let document = json!({
            "summary": summary,
            "key_insights": key_insights,
            "risk_factors": risk_factors,
            "recommendations": recommendations,
        });
        let text = if pretty {
            serde_json::to_string_pretty(&document).unwrap()
        } else {
            document.to_string()
        };

        let response = parse(&text);

        prop_assert_eq!(response.quality, AnalysisQuality::Complete);
        prop_assert!(response.missing_fields.is_empty());
        prop_assert_eq!(response.summary, summary);
        prop_assert_eq!(response.key_insights, key_insights);
        prop_assert_eq!(response.risk_factors, risk_factors);
        prop_assert_eq!(response.recommendations, recommendations);
    }
}

#[test]
fn one_entry_makes_one_session() {
    let entry = ChangeEntry {
        table_origin: TABLES[0].to_string(),
        entity_id: 42,
        field_name: "budget".to_string(),
        old_value: None,
        new_value: Some("10".to_string()),
        update_time: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
        actor: None,
        sequence: 0,
    };
    let sessions = SessionGrouper::new(Duration::minutes(5)).group(&[entry]);
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].primary_actor, "unknown");
}
