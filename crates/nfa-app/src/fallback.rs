// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Deterministic body text used when the content generator is unavailable.

use crate::NfaFormInput;

pub const DEFAULT_SUBJECT: &str = "NFA Request";
pub const DEFAULT_SUMMARY: &str = "NFA Request Summary";

pub const FALLBACK_BULLETS: [&str; 3] = [
    "The event will promote community engagement and collaboration among participants",
    "Proper administrative procedures will be followed for event coordination",
    "All necessary approvals and permissions will be obtained before proceeding",
];

pub fn fallback_text(form: &NfaFormInput) -> String {
    let subject = non_blank(&form.subject).unwrap_or(DEFAULT_SUBJECT);
    let summary = non_blank(&form.summary)
        .map(|summary| summary.trim_end_matches('.'))
        .unwrap_or(DEFAULT_SUMMARY);

    let mut paragraphs = vec![
        format!("Subject: {subject}"),
        format!(
            "Request for approval regarding {summary}. This proposal requires administrative approval and proper coordination for successful execution."
        ),
    ];
    if form.bullets_required {
        paragraphs.push(
            FALLBACK_BULLETS
                .iter()
                .map(|bullet| format!("• {bullet}"))
                .collect::<Vec<_>>()
                .join("\n"),
        );
    }
    paragraphs.push(form.nfa_type.closing_sentence().to_owned());
    paragraphs.join("\n\n")
}

fn non_blank(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}
