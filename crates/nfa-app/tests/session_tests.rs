// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use nfa_app::{
    Collaborators, Connectivity, ContentGenerator, DocumentRenderer, Field, HistoryDomain,
    HistoryStatus, HistoryStore, NfaError, NfaSession, NfaType, PreviewView, SessionCommand, Step,
    TextOrigin,
};
use nfa_testkit::{
    AppendingGenerator, FailingRenderer, MemoryHistory, ScriptedGenerator, TextRenderer,
    UnavailableGenerator, chess_tournament, long_document,
};

fn collaborators<'a>(
    generator: &'a dyn ContentGenerator,
    renderer: &'a dyn DocumentRenderer,
    history: Option<&'a dyn HistoryStore>,
) -> Collaborators<'a> {
    Collaborators {
        generator,
        renderer,
        history,
    }
}

fn session_at_table() -> NfaSession {
    let (form, table) = chess_tournament();
    let mut session = NfaSession::new();
    session.form = form;
    session.table = table;
    session.dispatch(SessionCommand::Next);
    session
}

#[test]
fn chess_tournament_outage_falls_back_to_template() -> Result<()> {
    let mut session = session_at_table();
    let history = MemoryHistory::new();

    let origin = session
        .generate(collaborators(
            &UnavailableGenerator,
            &TextRenderer,
            Some(&history),
        ))?;

    assert_eq!(origin, TextOrigin::Fallback);
    assert_eq!(session.step(), Step::Preview);
    let text = session.current_text().unwrap_or_default();
    assert!(text.lines().any(|line| line == "Subject: Chess Tournament Funding"));
    assert_eq!(text.lines().filter(|line| line.starts_with('•')).count(), 3);
    assert!(text.ends_with(NfaType::Advance.closing_sentence()));
    assert!(text.trim_end().lines().last().is_some_and(|line| line.contains("released")));

    let stored = history.entries();
    assert_eq!(stored.len(), 1);
    assert!(stored[0].fallback);
    assert_eq!(stored[0].status, HistoryStatus::Pending);
    assert_eq!(stored[0].total_amount, "₹5,000");
    Ok(())
}

#[test]
fn successful_generation_sets_both_texts() -> Result<()> {
    let mut session = session_at_table();
    let generator = ScriptedGenerator::new().with_generate(Ok("Subject: Chess Tournament Funding\n\nBody."));

    let origin = session.generate(collaborators(&generator, &TextRenderer, None))?;

    assert_eq!(origin, TextOrigin::Generated);
    assert_eq!(session.generated_text(), session.edited_text());
    let requests = generator.generate_requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].bullets_required);
    assert_eq!(requests[0].table.headers(), ["Item", "Qty", "Cost"]);
    Ok(())
}

#[test]
fn generate_rejected_outside_table_step() {
    let mut session = NfaSession::new();
    let result = session.generate(collaborators(&UnavailableGenerator, &TextRenderer, None));
    assert!(matches!(result, Err(NfaError::InvalidStep { .. })));
    assert_eq!(session.step(), Step::Details);
}

#[test]
fn generation_in_flight_blocks_a_second_submission() -> Result<()> {
    let mut session = session_at_table();
    let _request = session.begin_generate()?;
    assert_eq!(session.step(), Step::Generating);
    assert!(matches!(
        session.begin_generate(),
        Err(NfaError::InvalidStep { .. })
    ));

    session.cancel_generate();
    assert_eq!(session.step(), Step::Table);
    assert_eq!(session.current_text(), None);
    Ok(())
}

#[test]
fn edits_compose_linearly() -> Result<()> {
    let mut session = session_at_table();
    let generator = AppendingGenerator::new();
    let collab = collaborators(&generator, &TextRenderer, None);
    session.generate(collab)?;
    let initial = session.current_text().unwrap_or_default().to_owned();

    let prompts = ["add a venue line", "mention the judges", "make the tone formal"];
    for prompt in prompts {
        session.apply_edit(prompt, collab)?;
    }

    let folded = prompts
        .iter()
        .fold(initial.clone(), |text, prompt| AppendingGenerator::apply(&text, prompt));
    assert_eq!(session.edited_text(), Some(folded.as_str()));
    assert_eq!(session.generated_text(), Some(initial.as_str()));

    let turns = session.turns();
    assert_eq!(turns.len(), 3);
    for pair in turns.windows(2) {
        assert_eq!(
            pair[1].result_text,
            AppendingGenerator::apply(&pair[0].result_text, &pair[1].prompt)
        );
    }
    assert_eq!(generator.edit_calls(), 3);
    Ok(())
}

#[test]
fn failed_edit_keeps_text_and_records_errored_turn() -> Result<()> {
    let mut session = NfaSession::new();
    let history = MemoryHistory::new();
    let mut faker_entry = nfa_testkit::NfaFaker::new(9).history_entry(nfa_testkit::fixture_date());
    faker_entry.full_text = Some(long_document(500));
    let stored = history.append(&faker_entry)?;
    session.load_history_entry(&stored)?;
    let before = session.edited_text().map(str::to_owned);

    let result = session.apply_edit(
        "make it shorter",
        collaborators(&UnavailableGenerator, &TextRenderer, None),
    );

    assert!(matches!(result, Err(NfaError::EditFailed(_))));
    assert_eq!(session.edited_text().map(str::to_owned), before);
    assert_eq!(session.turns().len(), 1);
    assert!(session.turns()[0].is_error());
    assert_eq!(session.turns()[0].prompt, "make it shorter");
    assert_eq!(session.step(), Step::Preview);
    Ok(())
}

#[test]
fn blank_edit_prompt_is_a_field_error() -> Result<()> {
    let mut session = session_at_table();
    let generator = AppendingGenerator::new();
    session.generate(collaborators(&generator, &TextRenderer, None))?;

    let result = session.apply_edit("   ", collaborators(&generator, &TextRenderer, None));
    let Err(NfaError::Validation(errors)) = result else {
        panic!("expected validation error");
    };
    assert!(errors.for_field(Field::Prompt).is_some());
    assert!(session.turns().is_empty());
    Ok(())
}

#[test]
fn edit_that_changes_subject_line_updates_form() -> Result<()> {
    let mut session = session_at_table();
    let generator = ScriptedGenerator::new()
        .with_generate(Ok("Subject: Chess Tournament Funding\n\nBody."))
        .with_edit(Ok("Subject: State Chess Championship\n\nBody."));
    let collab = collaborators(&generator, &TextRenderer, None);
    session.generate(collab)?;
    session.apply_edit("rename the event", collab)?;

    assert_eq!(session.form.subject, "State Chess Championship");
    let edits = generator.edit_requests();
    assert_eq!(edits[0].text, "Subject: Chess Tournament Funding\n\nBody.");
    Ok(())
}

#[test]
fn download_renders_current_text_and_records_history() -> Result<()> {
    let mut session = session_at_table();
    let generator = AppendingGenerator::new();
    let history = MemoryHistory::new();
    let collab = collaborators(&generator, &TextRenderer, Some(&history));
    session.generate(collab)?;
    session.apply_edit("add a closing remark", collab)?;
    let text_before = session.edited_text().map(str::to_owned);

    let document = session.download(collab)?;

    assert_eq!(document.file_name, "NFA_advance_Chess_Tournament_Funding.docx");
    let rendered = String::from_utf8(document.bytes)?;
    assert!(rendered.contains("add a closing remark"));
    assert!(rendered.ends_with("advance"));
    assert_eq!(session.edited_text().map(str::to_owned), text_before);
    assert_eq!(history.len(), 2);
    assert!(document.history_id.is_some());
    let listed = history.list(HistoryDomain::Nfa)?;
    assert!(listed.iter().any(|entry| entry.file_ref.as_deref() == Some(document.file_name.as_str())));
    Ok(())
}

#[test]
fn render_failure_is_retryable() -> Result<()> {
    let mut session = session_at_table();
    let generator = AppendingGenerator::new();
    session.generate(collaborators(&generator, &TextRenderer, None))?;
    let text = session.current_text().map(str::to_owned);

    let failed = session.download(collaborators(&generator, &FailingRenderer, None));
    assert!(matches!(failed, Err(NfaError::Render(_))));
    assert_eq!(session.current_text().map(str::to_owned), text);

    let retried = session.download(collaborators(&generator, &TextRenderer, None))?;
    assert!(!retried.bytes.is_empty());
    Ok(())
}

#[test]
fn history_failure_does_not_roll_back_transition() -> Result<()> {
    let mut session = session_at_table();
    let history = MemoryHistory::failing();
    let origin = session.generate(collaborators(
        &AppendingGenerator::new(),
        &TextRenderer,
        Some(&history),
    ))?;
    assert_eq!(origin, TextOrigin::Generated);
    assert_eq!(session.step(), Step::Preview);
    Ok(())
}

#[test]
fn unreachable_backend_gates_actions_until_healthy() -> Result<()> {
    let mut session = session_at_table();
    let generator = AppendingGenerator::new();
    generator.set_reachable(false);

    let result = session.generate(collaborators(&generator, &TextRenderer, None));
    assert!(matches!(result, Err(NfaError::Transport(_))));
    assert_eq!(session.step(), Step::Table);
    assert_eq!(session.connectivity(), Connectivity::Offline);
    assert_eq!(session.current_text(), None);

    generator.set_reachable(true);
    assert!(matches!(
        session.generate(collaborators(&generator, &TextRenderer, None)),
        Err(NfaError::Transport(_))
    ));
    session.check_health(&generator)?;
    assert_eq!(session.connectivity(), Connectivity::Online);
    session.generate(collaborators(&generator, &TextRenderer, None))?;
    assert_eq!(session.step(), Step::Preview);
    Ok(())
}

#[test]
fn unhealthy_generator_leaves_session_online() -> Result<()> {
    let mut session = session_at_table();
    let error = session
        .check_health(&UnavailableGenerator)
        .expect_err("failing health check should be reported");
    assert!(matches!(error, NfaError::GenerationUnavailable(_)));
    assert_eq!(session.connectivity(), Connectivity::Online);

    let origin = session.generate(collaborators(&UnavailableGenerator, &TextRenderer, None))?;
    assert_eq!(origin, TextOrigin::Fallback);
    session.download(collaborators(&UnavailableGenerator, &TextRenderer, None))?;
    Ok(())
}

#[test]
fn viewed_history_entry_downloads_without_new_entry() -> Result<()> {
    let history = MemoryHistory::new();
    let mut entry = nfa_testkit::NfaFaker::new(5).history_entry(nfa_testkit::fixture_date());
    entry.subject = "Guest Lecture Series".to_owned();
    let stored = history.append(&entry)?;

    let mut session = NfaSession::new();
    session.load_history_entry(&stored)?;
    assert_eq!(session.step(), Step::Preview);
    assert_eq!(session.origin(), Some(TextOrigin::History));
    assert_eq!(session.viewing(), Some(stored.id));

    let document = session.download(collaborators(
        &AppendingGenerator::new(),
        &TextRenderer,
        Some(&history),
    ))?;
    assert!(document.history_id.is_none());
    assert_eq!(history.len(), 1);
    Ok(())
}

#[test]
fn back_navigation_preserves_generated_text() -> Result<()> {
    let mut session = session_at_table();
    session.generate(collaborators(&AppendingGenerator::new(), &TextRenderer, None))?;
    let text = session.current_text().map(str::to_owned);

    session.dispatch(SessionCommand::OpenEditor);
    assert_eq!(session.view(), PreviewView::Editor);
    session.dispatch(SessionCommand::BackToPreview);
    assert_eq!(session.view(), PreviewView::Document);

    session.dispatch(SessionCommand::Back);
    assert_eq!(session.step(), Step::Table);
    session.dispatch(SessionCommand::Next);
    assert_eq!(session.step(), Step::Preview);
    assert_eq!(session.current_text().map(str::to_owned), text);

    session.dispatch(SessionCommand::Reset);
    assert_eq!(session.step(), Step::Details);
    assert_eq!(session.current_text(), None);
    assert!(session.turns().is_empty());
    assert!(session.form.subject.is_empty());
    Ok(())
}
