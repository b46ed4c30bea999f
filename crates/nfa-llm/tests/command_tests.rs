// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

#![cfg(unix)]

use anyhow::Result;
use nfa_app::{ContentGenerator, EditRequest, GenerateRequest, NfaType};
use nfa_llm::CommandGenerator;
use nfa_testkit::{chess_tournament, long_document};
use std::fs;
use std::path::Path;
use std::time::Duration;

fn script(dir: &Path, body: &str) -> Result<String> {
    let path = dir.join("generator.sh");
    fs::write(&path, format!("#!/bin/sh\n{body}\n"))?;
    Ok(path.display().to_string())
}

fn generator(script: String, timeout: Duration) -> Result<CommandGenerator> {
    CommandGenerator::new("sh", vec![script], timeout)
}

fn generate_request() -> GenerateRequest {
    let (form, table) = chess_tournament();
    GenerateRequest::from_form(&form, &table)
}

#[test]
fn generate_reads_request_from_stdin_and_normalizes_reply() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let input = dir.path().join("input.json");
    let body = format!(
        r#"cat > "{}"
echo "mode=$1" >&2
echo '{{"success": true, "nfa_text": "Request for approval regarding the chess tournament."}}'"#,
        input.display()
    );
    let generator = generator(script(dir.path(), &body)?, Duration::from_secs(5))?;

    let text = generator.generate(&generate_request())?;
    assert!(text.starts_with("Subject: Chess Tournament Funding\n\n"));
    assert!(text.ends_with(NfaType::Advance.closing_sentence()));

    let sent: serde_json::Value = serde_json::from_str(&fs::read_to_string(input)?)?;
    assert_eq!(sent["subject"], "Chess Tournament Funding");
    assert_eq!(sent["nfaType"], "advance");
    assert_eq!(sent["bulletsRequired"], true);
    Ok(())
}

#[test]
fn edit_passes_mode_argument() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let body = r#"cat > /dev/null
if [ "$1" = "edit" ]; then
  printf '%s\n' '{"success": true, "editedText": "Subject: Chess Tournament Funding\n\nEdited."}'
else
  exit 9
fi"#;
    let generator = generator(script(dir.path(), body)?, Duration::from_secs(5))?;
    let (form, table) = chess_tournament();
    let request = EditRequest {
        text: "Subject: Chess Tournament Funding\n\nOriginal.".to_owned(),
        prompt: "rewrite".to_owned(),
        subject: form.subject,
        summary: form.summary,
        nfa_type: form.nfa_type,
        table,
    };

    let text = generator.edit(&request)?;
    assert!(text.contains("Edited."));
    Ok(())
}

#[test]
fn reported_failure_is_an_error() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let body = r#"cat > /dev/null
echo '{"success": false, "error": "quota exhausted"}'"#;
    let generator = generator(script(dir.path(), body)?, Duration::from_secs(5))?;

    let error = generator
        .generate(&generate_request())
        .expect_err("success:false should fail");
    assert!(format!("{error:#}").contains("quota exhausted"));
    Ok(())
}

#[test]
fn nonzero_exit_includes_stderr() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let body = r#"cat > /dev/null
echo 'ModuleNotFoundError: openai' >&2
exit 1"#;
    let generator = generator(script(dir.path(), body)?, Duration::from_secs(5))?;

    let error = generator
        .generate(&generate_request())
        .expect_err("nonzero exit should fail");
    assert!(format!("{error:#}").contains("ModuleNotFoundError: openai"));
    Ok(())
}

#[test]
fn slow_generator_is_killed_at_timeout() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let generator = generator(
        script(dir.path(), "sleep 5")?,
        Duration::from_millis(200),
    )?;

    let started = std::time::Instant::now();
    let error = generator
        .generate(&generate_request())
        .expect_err("timeout should fail");
    assert!(format!("{error:#}").contains("timed out"));
    assert!(started.elapsed() < Duration::from_secs(4));
    Ok(())
}

#[test]
fn timeout_holds_when_child_ignores_large_input() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let generator = generator(
        script(dir.path(), "exec sleep 5")?,
        Duration::from_millis(200),
    )?;
    let (form, table) = chess_tournament();
    let request = EditRequest {
        text: long_document(40_000),
        prompt: "make it shorter".to_owned(),
        subject: form.subject.clone(),
        summary: form.summary.clone(),
        nfa_type: form.nfa_type,
        table,
    };
    assert!(request.text.len() > 128 * 1024);

    let started = std::time::Instant::now();
    let error = generator
        .edit(&request)
        .expect_err("timeout should fail");
    assert!(format!("{error:#}").contains("timed out"));
    assert!(started.elapsed() < Duration::from_secs(4));
    Ok(())
}

#[test]
fn health_check_resolves_program() -> Result<()> {
    let present = CommandGenerator::new("sh", Vec::new(), Duration::from_secs(1))?;
    present.health_check()?;

    let missing =
        CommandGenerator::new("nfa-desk-missing-generator", Vec::new(), Duration::from_secs(1))?;
    let error = missing.health_check().expect_err("missing program");
    assert!(error.to_string().contains("[generator].command"));
    Ok(())
}
