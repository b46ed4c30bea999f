// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use nfa_app::{FinancialTable, NfaType, is_closing_sentence};
use time::Date;
use time::macros::format_description;

use crate::Signatory;

pub const TITLE: &str = "Note For Approval (NFA)";
pub const TABLE_TITLE: &str = "Financial/Resource Implications";
pub const SIGNATURE_LINE: &str = "_________________";

/// Rendered size of the letterhead image in EMU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageExtent {
    pub width: u64,
    pub height: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Letterhead {
    Image(ImageExtent),
    Lines(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLayout {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub bold_last_row: bool,
}

/// One visual element of the page, top to bottom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Image(ImageExtent),
    LetterheadLine(String),
    DateLine(String),
    Title,
    Subject(String),
    Bullet(String),
    Paragraph(String),
    TableTitle,
    Table(TableLayout),
    Closing(String),
    Signatures(Vec<[Signatory; 2]>),
}

pub fn format_date_line(date: Date) -> String {
    let formatted = date
        .format(&format_description!("[day]/[month]/[year]"))
        .unwrap_or_else(|_| date.to_string());
    format!("Date: {formatted}")
}

/// Body blocks for `text`. The standard closing sentence and a repeated title
/// or date line are dropped; the renderer appends its own.
pub fn body_blocks(text: &str) -> Vec<Block> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| *line != TITLE && !is_date_line(line))
        .filter(|line| !is_closing_sentence(line))
        .map(|line| {
            if let Some(rest) = strip_subject(line) {
                Block::Subject(rest.to_owned())
            } else if let Some(rest) = line.strip_prefix('•') {
                Block::Bullet(rest.trim().to_owned())
            } else {
                Block::Paragraph(line.to_owned())
            }
        })
        .collect()
}

/// Matches the line `format_date_line` writes, for any date.
fn is_date_line(line: &str) -> bool {
    line.strip_prefix("Date:").is_some_and(|rest| {
        Date::parse(rest.trim(), format_description!("[day]/[month]/[year]")).is_ok()
    })
}

pub fn layout(
    text: &str,
    table: &FinancialTable,
    nfa_type: NfaType,
    date: Date,
    letterhead: &Letterhead,
    signatories: &[Signatory; 4],
) -> Vec<Block> {
    let mut blocks = Vec::new();
    match letterhead {
        Letterhead::Image(extent) => blocks.push(Block::Image(*extent)),
        Letterhead::Lines(lines) => blocks.extend(
            lines
                .iter()
                .filter(|line| !line.trim().is_empty())
                .map(|line| Block::LetterheadLine(line.trim().to_owned())),
        ),
    }
    blocks.push(Block::DateLine(format_date_line(date)));
    blocks.push(Block::Title);
    blocks.extend(body_blocks(text));

    if !table.headers().is_empty() {
        blocks.push(Block::TableTitle);
        blocks.push(Block::Table(TableLayout {
            headers: table.headers().iter().map(|cell| clean_cell(cell)).collect(),
            rows: table
                .rows()
                .iter()
                .map(|row| row.iter().map(|cell| clean_cell(cell)).collect())
                .collect(),
            bold_last_row: table.has_total_row(),
        }));
    }

    blocks.push(Block::Closing(nfa_type.closing_sentence().to_owned()));
    let [top_left, top_right, bottom_left, bottom_right] = signatories.clone();
    blocks.push(Block::Signatures(vec![
        [top_left, top_right],
        [bottom_left, bottom_right],
    ]));
    blocks
}

fn strip_subject(line: &str) -> Option<&str> {
    let prefix = line.get(..8)?;
    prefix
        .eq_ignore_ascii_case("subject:")
        .then(|| line[8..].trim())
}

fn clean_cell(cell: &str) -> String {
    cell.replace(['\r', '\n'], " ").trim().to_owned()
}
