// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use nfa_app::{
    HistoryDomain, HistoryQuery, HistoryStatus, HistoryStore, HistoryWatcher, NewHistoryEntry,
    NfaType,
};
use nfa_db::{Store, validate_db_path};
use nfa_testkit::{NfaFaker, fixture_date, seed_demo_history, temp_db_path};
use time::{Date, Month};

fn entry(subject: &str, description: &str, date: Date) -> NewHistoryEntry {
    NewHistoryEntry {
        domain: HistoryDomain::Nfa,
        subject: subject.to_owned(),
        nfa_type: Some(NfaType::Advance),
        status: HistoryStatus::Pending,
        date,
        total_amount: "₹5,000".to_owned(),
        description: description.to_owned(),
        file_ref: None,
        full_text: Some(format!("Subject: {subject}\n\nBody.")),
        fallback: false,
    }
}

fn day(value: u8) -> Result<Date> {
    Ok(Date::from_calendar_date(2026, Month::March, value)?)
}

#[test]
fn validate_db_path_rejects_uri_forms() {
    assert!(validate_db_path("file:test.db").is_err());
    assert!(validate_db_path("https://example.com/db.sqlite").is_err());
    assert!(validate_db_path("db.sqlite?mode=ro").is_err());
    assert!(validate_db_path("/tmp/nfa-desk.db").is_ok());
}

#[test]
fn bootstrap_is_idempotent_on_disk() -> Result<()> {
    let (_dir, path) = temp_db_path()?;
    {
        let store = Store::open(&path)?;
        store.bootstrap()?;
        store.append(&entry("Robotics Expo", "Annual expo", day(1)?))?;
    }
    let store = Store::open(&path)?;
    store.bootstrap()?;
    assert_eq!(store.list(HistoryDomain::Nfa)?.len(), 1);
    Ok(())
}

#[test]
fn bootstrap_rejects_schema_missing_required_column() -> Result<()> {
    let store = Store::open_memory()?;
    store.raw_connection().execute_batch(
        "
        CREATE TABLE history_entries (id INTEGER PRIMARY KEY, domain TEXT NOT NULL);
        CREATE TABLE settings (key TEXT PRIMARY KEY, value TEXT NOT NULL, updated_at TEXT NOT NULL);
        ",
    )?;

    let err = store
        .bootstrap()
        .expect_err("schema validation should fail");
    let message = err.to_string();
    assert!(message.contains("table `history_entries` is missing required columns"));
    assert!(message.contains("content_sha256"));
    Ok(())
}

#[test]
fn list_is_newest_first_and_scoped_by_domain() -> Result<()> {
    let store = Store::open_memory()?;
    store.bootstrap()?;
    let older = store.append(&entry("Older", "first", day(1)?))?;
    let newer = store.append(&entry("Newer", "second", day(5)?))?;
    let mut job = entry("Asha Rao", "ML project", day(9)?);
    job.domain = HistoryDomain::JobRecommendation;
    job.nfa_type = None;
    store.append(&job)?;

    let listed = store.list(HistoryDomain::Nfa)?;
    assert_eq!(
        listed.iter().map(|entry| entry.id).collect::<Vec<_>>(),
        vec![newer.id, older.id]
    );
    assert_eq!(store.list(HistoryDomain::JobRecommendation)?.len(), 1);
    assert!(store.list(HistoryDomain::MsRecommendation)?.is_empty());
    Ok(())
}

#[test]
fn append_round_trips_fields() -> Result<()> {
    let store = Store::open_memory()?;
    store.bootstrap()?;
    let mut new_entry = entry("Chess Tournament Funding", "Inter-college chess", day(2)?);
    new_entry.file_ref = Some("NFA_advance_Chess_Tournament_Funding.docx".to_owned());
    new_entry.fallback = true;

    let stored = store.append(&new_entry)?;
    let loaded = store.get_entry(stored.id)?;
    assert_eq!(loaded, stored);
    assert_eq!(loaded.nfa_type, Some(NfaType::Advance));
    assert_eq!(loaded.date, day(2)?);
    assert!(loaded.fallback);
    assert_eq!(loaded.file_ref, new_entry.file_ref);
    Ok(())
}

#[test]
fn search_matches_term_or_date() -> Result<()> {
    let store = Store::open_memory()?;
    store.bootstrap()?;
    store.append(&entry("Hackathon Prizes", "coding event", day(1)?))?;
    store.append(&entry("Guest Lecture", "talk on HACKING ethics", day(2)?))?;
    store.append(&entry("Sports Meet", "athletics", day(3)?))?;

    let by_term = store.search(
        HistoryDomain::Nfa,
        &HistoryQuery {
            term: Some("hack".to_owned()),
            date: None,
        },
    )?;
    assert_eq!(by_term.len(), 2);

    let either = store.search(
        HistoryDomain::Nfa,
        &HistoryQuery {
            term: Some("hackathon".to_owned()),
            date: Some(day(3)?),
        },
    )?;
    let subjects: Vec<&str> = either.iter().map(|entry| entry.subject.as_str()).collect();
    assert_eq!(subjects, vec!["Sports Meet", "Hackathon Prizes"]);

    let literal = store.search(
        HistoryDomain::Nfa,
        &HistoryQuery {
            term: Some("100%".to_owned()),
            date: None,
        },
    )?;
    assert!(literal.is_empty());

    assert_eq!(store.search(HistoryDomain::Nfa, &HistoryQuery::default())?.len(), 3);
    Ok(())
}

#[test]
fn status_update_and_delete_report_missing_ids() -> Result<()> {
    let store = Store::open_memory()?;
    store.bootstrap()?;
    let stored = store.append(&entry("Cultural Fest", "stage and sound", day(4)?))?;

    store.update_status(stored.id, HistoryStatus::Approved)?;
    assert_eq!(store.get_entry(stored.id)?.status, HistoryStatus::Approved);
    store.update_status(stored.id, HistoryStatus::Pending)?;
    assert_eq!(store.get_entry(stored.id)?.status, HistoryStatus::Pending);

    store.delete_by_id(stored.id)?;
    let err = store
        .delete_by_id(stored.id)
        .expect_err("second delete should fail");
    assert!(err.to_string().contains("not found"));
    assert!(store.update_status(stored.id, HistoryStatus::Rejected).is_err());
    assert!(store.get_entry(stored.id).is_err());
    Ok(())
}

#[test]
fn revision_tracks_writes_across_handles() -> Result<()> {
    let (_dir, path) = temp_db_path()?;
    let writer = Store::open(&path)?;
    writer.bootstrap()?;
    let reader = Store::open(&path)?;
    let mut watcher = HistoryWatcher::new();

    assert_eq!(reader.revision()?, 0);
    assert!(watcher.poll(&reader)?);
    assert!(!watcher.poll(&reader)?);

    let stored = writer.append(&entry("Photography Walk", "heritage walk", day(6)?))?;
    assert!(watcher.poll(&reader)?);
    writer.update_status(stored.id, HistoryStatus::Rejected)?;
    writer.delete_by_id(stored.id)?;
    assert_eq!(reader.revision()?, 3);
    assert!(watcher.poll(&reader)?);
    assert!(!watcher.poll(&reader)?);
    Ok(())
}

#[test]
fn export_uses_browser_shape() -> Result<()> {
    let store = Store::open_memory()?;
    store.bootstrap()?;
    store.append(&entry("Alumni Panel", "career talk", day(7)?))?;

    let exported: serde_json::Value = serde_json::from_str(&store.export_json(HistoryDomain::Nfa)?)?;
    let first = &exported[0];
    assert_eq!(first["subject"], "Alumni Panel");
    assert_eq!(first["type"], "advance");
    assert_eq!(first["status"], "pending");
    assert_eq!(first["date"], "2026-03-07");
    assert_eq!(first["amount"], "₹5,000");
    assert!(first["nfaText"].as_str().is_some_and(|text| text.starts_with("Subject:")));
    assert!(first.get("domain").is_none());
    Ok(())
}

#[test]
fn import_fills_defaults_and_skips_duplicates() -> Result<()> {
    let store = Store::open_memory()?;
    store.bootstrap()?;
    let browser_export = r#"[
        {
            "id": 1735712345678,
            "subject": "Debate Championship",
            "type": "reimbursement",
            "date": "2025-01-01",
            "amount": "₹12,000",
            "createdBy": "Current User",
            "description": "Inter-college debate",
            "filePath": null,
            "nfaText": "Subject: Debate Championship\n\nBody.",
            "createdAt": "2025-01-01T10:00:00.000Z"
        },
        {
            "subject": "Music Night",
            "description": "Open mic"
        }
    ]"#;

    let first = store.import_json(HistoryDomain::Nfa, browser_export)?;
    assert_eq!(first.imported, 2);
    assert_eq!(first.skipped, 0);
    let again = store.import_json(HistoryDomain::Nfa, browser_export)?;
    assert_eq!(again.imported, 0);
    assert_eq!(again.skipped, 2);

    let listed = store.list(HistoryDomain::Nfa)?;
    let debate = listed
        .iter()
        .find(|entry| entry.subject == "Debate Championship")
        .expect("debate imported");
    assert_eq!(debate.status, HistoryStatus::Pending);
    assert_eq!(debate.nfa_type, Some(NfaType::Reimbursement));
    assert_eq!(debate.total_amount, "₹12,000");
    let music = listed
        .iter()
        .find(|entry| entry.subject == "Music Night")
        .expect("music imported");
    assert_eq!(music.total_amount, "₹0");

    let exported: serde_json::Value = serde_json::from_str(&store.export_json(HistoryDomain::Nfa)?)?;
    let items = exported.as_array().cloned().unwrap_or_default();
    let debate_json = items
        .iter()
        .find(|item| item["subject"] == "Debate Championship")
        .expect("debate exported");
    assert_eq!(debate_json["createdBy"], "Current User");
    assert_eq!(debate_json["importedId"], 1735712345678_i64);
    Ok(())
}

#[test]
fn recommendation_domains_keep_their_fields() -> Result<()> {
    let store = Store::open_memory()?;
    store.bootstrap()?;
    let jobs = r#"{"jobRecommendationHistory": [{
        "candidateName": "Asha Rao",
        "projectTitle": "Crop Yield Prediction",
        "projectSummary": "Built a model for yield prediction.",
        "filename": "Asha_Rao_Recommendation.docx",
        "content": "To whom it may concern",
        "date": "2025-02-10"
    }]}"#;
    store.import_json(HistoryDomain::JobRecommendation, jobs)?;
    let listed = store.list(HistoryDomain::JobRecommendation)?;
    assert_eq!(listed[0].status, HistoryStatus::Completed);
    assert_eq!(listed[0].subject, "Asha Rao");
    assert_eq!(listed[0].nfa_type, None);

    let exported: serde_json::Value =
        serde_json::from_str(&store.export_json(HistoryDomain::JobRecommendation)?)?;
    assert_eq!(exported[0]["candidateName"], "Asha Rao");
    assert_eq!(exported[0]["projectTitle"], "Crop Yield Prediction");
    assert_eq!(exported[0]["filename"], "Asha_Rao_Recommendation.docx");

    let ms = r#"[{"id": 7, "date": "2025-02-11", "content": "Recommendation for MS admission\nBody"}]"#;
    store.import_json(HistoryDomain::MsRecommendation, ms)?;
    let ms_entries = store.list(HistoryDomain::MsRecommendation)?;
    assert_eq!(ms_entries[0].subject, "Recommendation for MS admission");
    Ok(())
}

#[test]
fn import_rejects_non_array_payloads() -> Result<()> {
    let store = Store::open_memory()?;
    store.bootstrap()?;
    assert!(store.import_json(HistoryDomain::Nfa, "{\"other\": []}").is_err());
    assert!(store.import_json(HistoryDomain::Nfa, "42").is_err());
    assert!(
        store
            .import_json(HistoryDomain::Nfa, r#"[{"subject": "X", "status": "lost"}]"#)
            .is_err()
    );
    assert!(store.list(HistoryDomain::Nfa)?.is_empty());
    Ok(())
}

#[test]
fn demo_seed_populates_store() -> Result<()> {
    let store = Store::open_memory()?;
    store.bootstrap()?;
    let seeded = seed_demo_history(&store, 11, 5, fixture_date())?;
    assert_eq!(seeded.len(), 5);
    assert_eq!(store.list(HistoryDomain::Nfa)?.len(), 5);

    let mut faker = NfaFaker::new(11);
    let expected = faker.history_entry(fixture_date());
    assert_eq!(seeded[0].subject, expected.subject);
    Ok(())
}
