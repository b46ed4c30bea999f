// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use nfa_app::{
    DocumentSection, EditRequest, FinancialTable, GenerateRequest, NfaType,
};

pub const GENERATE_SYSTEM_PROMPT: &str = "You write formal Notes For Approval (NFA) for a university administration office. Plain text only.";
pub const EDIT_SYSTEM_PROMPT: &str = "You revise Notes For Approval (NFA). Apply exactly the change requested and nothing else.";

pub fn build_generate_prompt(request: &GenerateRequest) -> String {
    let mut out = String::new();
    out.push_str("Write the body of a Note For Approval.\n\n");
    out.push_str("## Details\n\n");
    out.push_str(&format!("Subject: {}\n", request.subject));
    out.push_str(&format!("Summary: {}\n", request.summary));
    out.push_str(&format!("Type: {}\n", request.nfa_type.label()));
    out.push_str(&format!(
        "Need bullets: {}\n",
        if request.bullets_required { "yes" } else { "no" }
    ));

    if !request.table.is_empty() {
        out.push_str("\n## Financial table\n\n");
        out.push_str(&format_table(&request.table));
        out.push_str(&format!("Total: {}\n", request.table.total_amount()));
    }

    out.push_str("\n## Sections\n\n");
    for section in DocumentSection::ALL {
        let setting = request.sections.get(section);
        out.push_str(&format!(
            "- {}: at most {} words{}\n",
            section.label(),
            setting.word_limit,
            if setting.add_header {
                ", with a heading"
            } else {
                ""
            }
        ));
    }

    out.push_str("\n## Format\n\n");
    out.push_str(&format!(
        "1. First line: Subject: {}\n2. Then an empty line.\n",
        request.subject
    ));
    out.push_str(
        "3. Then one request paragraph of at most 3 sentences starting with \"Request for approval regarding\".\n",
    );
    if request.bullets_required {
        out.push_str("4. Then exactly 3 bullet points, each on its own line starting with •.\n");
    } else {
        out.push_str("4. Do not write bullet points.\n");
    }
    out.push_str(
        "5. Do not write a closing or conclusion sentence; it is added after the financial table.\n",
    );
    out.push_str("6. No markdown, no headings marked with #, no bold markers.\n");
    out
}

pub fn build_edit_prompt(request: &EditRequest) -> String {
    let mut out = String::new();
    out.push_str("## Current document\n\n");
    out.push_str(request.text.trim());
    out.push_str("\n\n## Requested change\n\n");
    out.push_str(request.prompt.trim());
    out.push_str("\n\n## Context\n\n");
    out.push_str(&format!("Subject: {}\n", request.subject));
    out.push_str(&format!("Type: {}\n", request.nfa_type.label()));
    if !request.table.is_empty() {
        out.push_str(&format!("Total: {}\n", request.table.total_amount()));
    }
    out.push_str("\n## Rules\n\n");
    out.push_str("- Apply only the requested change.\n");
    out.push_str("- Keep the Subject line and the paragraph structure.\n");
    out.push_str("- Return the complete modified document, not a description of the change.\n");
    out.push_str("- No markdown.\n");
    out
}

fn format_table(table: &FinancialTable) -> String {
    let mut out = String::new();
    out.push_str(&table.headers().join(" | "));
    out.push('\n');
    for row in table.rows() {
        out.push_str(&row.join(" | "));
        out.push('\n');
    }
    out
}

enum Block {
    Line(String),
    Bullets(Vec<String>),
}

/// Turns raw model output into the document text the session stores.
///
/// Every non-blank line becomes its own paragraph, consecutive bullets stay
/// together, the first paragraph carries a `Subject:` label, and the document
/// ends with the closing sentence for `nfa_type`, replacing one the model wrote.
pub fn normalize_document(raw: &str, subject: &str, nfa_type: NfaType) -> String {
    let cleaned = clean_text(raw);
    let mut blocks: Vec<Block> = Vec::new();

    for line in cleaned.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("```") {
            continue;
        }
        let line = line.trim_start_matches('#').trim();
        if let Some(bullet) = bullet_text(line) {
            match blocks.last_mut() {
                Some(Block::Bullets(items)) => items.push(format!("• {bullet}")),
                _ => blocks.push(Block::Bullets(vec![format!("• {bullet}")])),
            }
        } else if !line.is_empty() {
            blocks.push(Block::Line(line.to_owned()));
        }
    }

    let subject = subject.trim();
    match blocks.first_mut() {
        Some(Block::Line(first)) if has_subject_label(first) => {}
        Some(Block::Line(first)) if !subject.is_empty() && first.eq_ignore_ascii_case(subject) => {
            *first = format!("Subject: {first}");
        }
        _ if !subject.is_empty() => blocks.insert(0, Block::Line(format!("Subject: {subject}"))),
        _ => {}
    }

    let closing = nfa_type.closing_sentence().to_owned();
    match blocks.last_mut() {
        Some(Block::Line(last)) if is_model_closing(last) => *last = closing,
        _ => blocks.push(Block::Line(closing)),
    }

    blocks
        .into_iter()
        .map(|block| match block {
            Block::Line(line) => line,
            Block::Bullets(items) => items.join("\n"),
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Phrases a model uses when it writes its own closing sentence anyway.
const MODEL_CLOSING_MARKERS: [&str; 3] = [
    "proposal is submitted",
    "kindly be released",
    "kindly be reimbursed",
];

fn is_model_closing(line: &str) -> bool {
    let lowered = line.to_lowercase();
    MODEL_CLOSING_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
}

/// Drops NUL, carriage returns and other control characters, plus markdown
/// bold markers.
pub fn clean_text(raw: &str) -> String {
    raw.replace("**", "")
        .chars()
        .filter(|ch| *ch == '\n' || *ch == '\t' || !ch.is_control())
        .collect::<String>()
        .replace('\t', " ")
}

fn bullet_text(line: &str) -> Option<&str> {
    ["•", "- ", "* ", "– "]
        .iter()
        .find_map(|marker| line.strip_prefix(marker))
        .map(str::trim)
        .filter(|rest| !rest.is_empty())
}

fn has_subject_label(line: &str) -> bool {
    line.get(..8)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("subject:"))
}
