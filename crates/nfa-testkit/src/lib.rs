// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use nfa_app::{
    ContentGenerator, DocumentRenderer, EditRequest, FinancialTable, GenerateRequest,
    HistoryDomain, HistoryEntry, HistoryEntryId, HistoryStatus, HistoryStore, NewHistoryEntry,
    NfaFormInput, NfaType, Unreachable, summarize_description,
};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::path::PathBuf;
use time::{Date, Duration, Month, OffsetDateTime};

const EVENT_KINDS: [&str; 10] = [
    "Hackathon",
    "Chess Tournament",
    "Robotics Workshop",
    "Cultural Fest",
    "Debate Championship",
    "Guest Lecture",
    "Startup Bootcamp",
    "Photography Walk",
    "Sports Meet",
    "Alumni Panel",
];

const CLUBS: [&str; 8] = [
    "Coding Club",
    "Chess Society",
    "Robotics Lab",
    "Music Collective",
    "Literary Circle",
    "Entrepreneurship Cell",
    "Photography Club",
    "Student Council",
];

const LINE_ITEMS: [(&str, u32, u32); 10] = [
    ("Venue booking", 1, 15_000),
    ("Refreshments", 120, 80),
    ("Printing and banners", 10, 450),
    ("Trophies", 6, 1_200),
    ("Certificates", 150, 20),
    ("Speaker honorarium", 2, 5_000),
    ("Sound system rental", 1, 8_000),
    ("Chess sets", 10, 500),
    ("Travel reimbursement", 4, 2_500),
    ("Volunteer kits", 30, 150),
];

const SUMMARY_WORDS: [&str; 24] = [
    "students",
    "faculty",
    "campus",
    "participation",
    "teams",
    "mentors",
    "registration",
    "sessions",
    "prizes",
    "logistics",
    "outreach",
    "schedule",
    "engagement",
    "industry",
    "learning",
    "collaboration",
    "venue",
    "volunteers",
    "budget",
    "coordination",
    "workshop",
    "judges",
    "audience",
    "event",
];

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }

    fn bool(&mut self) -> bool {
        (self.next_u64() & 1) == 1
    }
}

/// Seeded generator of plausible drafts and history rows.
#[derive(Debug, Clone)]
pub struct NfaFaker {
    rng: DeterministicRng,
}

impl NfaFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
        }
    }

    pub fn subject(&mut self) -> String {
        format!(
            "{} by {} Funding",
            self.pick(&EVENT_KINDS),
            self.pick(&CLUBS)
        )
    }

    pub fn summary(&mut self) -> String {
        let event = self.pick(&EVENT_KINDS).to_lowercase();
        let mut words = Vec::with_capacity(14);
        for _ in 0..14 {
            words.push(self.pick(&SUMMARY_WORDS));
        }
        format!(
            "Proposal to conduct a {event} on campus covering {}.",
            words.join(" ")
        )
    }

    pub fn form(&mut self) -> NfaFormInput {
        NfaFormInput {
            subject: self.subject(),
            summary: self.summary(),
            nfa_type: if self.rng.bool() {
                NfaType::Advance
            } else {
                NfaType::Reimbursement
            },
            bullets_required: self.rng.bool(),
            ..NfaFormInput::default()
        }
    }

    pub fn table(&mut self) -> FinancialTable {
        let mut table = FinancialTable::with_default_headers();
        let count = 2 + self.rng.int_n(3);
        for _ in 0..count {
            let (item, quantity, unit) = LINE_ITEMS[self.rng.int_n(LINE_ITEMS.len())];
            let _ = table.push_row([
                item.to_owned(),
                quantity.to_string(),
                unit.to_string(),
                (quantity * unit).to_string(),
            ]);
        }
        table
    }

    pub fn history_entry(&mut self, date: Date) -> NewHistoryEntry {
        let form = self.form();
        let table = self.table();
        let status = match self.rng.int_n(3) {
            0 => HistoryStatus::Pending,
            1 => HistoryStatus::Approved,
            _ => HistoryStatus::Rejected,
        };
        NewHistoryEntry {
            domain: HistoryDomain::Nfa,
            subject: form.subject.clone(),
            nfa_type: Some(form.nfa_type),
            status,
            date,
            total_amount: table.total_amount(),
            description: summarize_description(&form.summary),
            file_ref: None,
            full_text: Some(nfa_app::fallback_text(&form)),
            fallback: true,
        }
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }
}

/// Printable filler of exactly `chars` characters.
pub fn lorem_summary(chars: usize) -> String {
    const LOREM: &str = "Lorem ipsum dolor sit amet consectetur adipiscing elit sed do eiusmod tempor ";
    LOREM.chars().cycle().take(chars).collect()
}

/// Draft used by the outage scenario: advance, bullets, one line item.
pub fn chess_tournament() -> (NfaFormInput, FinancialTable) {
    let form = NfaFormInput {
        subject: "Chess Tournament Funding".to_owned(),
        summary: lorem_summary(60),
        nfa_type: NfaType::Advance,
        bullets_required: true,
        ..NfaFormInput::default()
    };
    let table = FinancialTable::from_grid(vec![
        vec!["Item".to_owned(), "Qty".to_owned(), "Cost".to_owned()],
        vec!["Chess sets".to_owned(), "10".to_owned(), "5000".to_owned()],
    ]);
    (form, table)
}

/// `words` whitespace-separated words of body text under a subject line.
pub fn long_document(words: usize) -> String {
    let body: Vec<&str> = SUMMARY_WORDS.iter().copied().cycle().take(words).collect();
    format!("Subject: Annual Sports Meet\n\n{}", body.join(" "))
}

pub fn fixture_date() -> Date {
    Date::from_calendar_date(2026, Month::February, 19).unwrap_or(Date::MIN)
}

pub fn temp_db_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let db_path = dir.path().join("nfa-desk.db");
    Ok((dir, db_path))
}

/// Appends `count` deterministic entries dated back from `today`.
pub fn seed_demo_history(
    store: &dyn HistoryStore,
    seed: u64,
    count: usize,
    today: Date,
) -> Result<Vec<HistoryEntry>> {
    let mut faker = NfaFaker::new(seed);
    let mut entries = Vec::with_capacity(count);
    for offset in 0..count {
        let date = today - Duration::days(offset as i64 * 3);
        let entry = store
            .append(&faker.history_entry(date))
            .with_context(|| format!("seed demo history entry {}", offset + 1))?;
        entries.push(entry);
    }
    Ok(entries)
}

/// Answers from queues; an exhausted queue is an error.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    generate_replies: RefCell<VecDeque<Result<String, String>>>,
    edit_replies: RefCell<VecDeque<Result<String, String>>>,
    generate_requests: RefCell<Vec<GenerateRequest>>,
    edit_requests: RefCell<Vec<EditRequest>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_generate(self, reply: Result<&str, &str>) -> Self {
        self.generate_replies
            .borrow_mut()
            .push_back(reply.map(str::to_owned).map_err(str::to_owned));
        self
    }

    pub fn with_edit(self, reply: Result<&str, &str>) -> Self {
        self.edit_replies
            .borrow_mut()
            .push_back(reply.map(str::to_owned).map_err(str::to_owned));
        self
    }

    pub fn generate_requests(&self) -> Vec<GenerateRequest> {
        self.generate_requests.borrow().clone()
    }

    pub fn edit_requests(&self) -> Vec<EditRequest> {
        self.edit_requests.borrow().clone()
    }
}

impl ContentGenerator for ScriptedGenerator {
    fn generate(&self, request: &GenerateRequest) -> Result<String> {
        self.generate_requests.borrow_mut().push(request.clone());
        match self.generate_replies.borrow_mut().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(anyhow!(message)),
            None => bail!("no scripted generate reply left"),
        }
    }

    fn edit(&self, request: &EditRequest) -> Result<String> {
        self.edit_requests.borrow_mut().push(request.clone());
        match self.edit_replies.borrow_mut().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(anyhow!(message)),
            None => bail!("no scripted edit reply left"),
        }
    }
}

/// Every call fails the way a crashed generator process does.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableGenerator;

impl ContentGenerator for UnavailableGenerator {
    fn generate(&self, _request: &GenerateRequest) -> Result<String> {
        bail!("generator process exited with status 1")
    }

    fn edit(&self, _request: &EditRequest) -> Result<String> {
        bail!("generator process exited with status 1")
    }

    fn health_check(&self) -> Result<()> {
        bail!("generator process exited with status 1")
    }
}

/// Deterministic generator: the body is built from the request, and an
/// edit appends the instruction as a new paragraph.
#[derive(Debug, Default)]
pub struct AppendingGenerator {
    reachable: Cell<bool>,
    edits: Cell<usize>,
}

impl AppendingGenerator {
    pub fn new() -> Self {
        Self {
            reachable: Cell::new(true),
            edits: Cell::new(0),
        }
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.set(reachable);
    }

    pub fn edit_calls(&self) -> usize {
        self.edits.get()
    }

    pub fn apply(text: &str, prompt: &str) -> String {
        format!("{text}\n\n{prompt}")
    }

    fn check(&self) -> Result<()> {
        if self.reachable.get() {
            Ok(())
        } else {
            Err(anyhow::Error::new(Unreachable::new("appending-generator")))
        }
    }
}

impl ContentGenerator for AppendingGenerator {
    fn generate(&self, request: &GenerateRequest) -> Result<String> {
        self.check()?;
        Ok(format!(
            "Subject: {}\n\nThe {} proposal: {}",
            request.subject,
            request.nfa_type.as_str(),
            request.summary
        ))
    }

    fn edit(&self, request: &EditRequest) -> Result<String> {
        self.check()?;
        self.edits.set(self.edits.get() + 1);
        Ok(Self::apply(&request.text, &request.prompt))
    }

    fn health_check(&self) -> Result<()> {
        self.check()
    }
}

/// Renders a plain-text stand-in so tests can inspect what was sent.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextRenderer;

impl DocumentRenderer for TextRenderer {
    fn render(&self, text: &str, table: &FinancialTable, nfa_type: NfaType) -> Result<Vec<u8>> {
        let grid: Vec<String> = table.to_grid().iter().map(|row| row.join("|")).collect();
        Ok(format!("{}\n--\n{}\n--\n{}", text, grid.join("\n"), nfa_type.as_str()).into_bytes())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FailingRenderer;

impl DocumentRenderer for FailingRenderer {
    fn render(&self, _text: &str, _table: &FinancialTable, _nfa_type: NfaType) -> Result<Vec<u8>> {
        bail!("document library failed to write the package")
    }
}

/// History kept in memory; can be switched to fail every write.
#[derive(Debug, Default)]
pub struct MemoryHistory {
    entries: RefCell<Vec<HistoryEntry>>,
    next_id: Cell<i64>,
    revision: Cell<i64>,
    failing: Cell<bool>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let history = Self::default();
        history.failing.set(true);
        history
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.entries.borrow().clone()
    }

    fn check_writable(&self) -> Result<()> {
        if self.failing.get() {
            bail!("history storage is read-only");
        }
        Ok(())
    }

    fn bump(&self) {
        self.revision.set(self.revision.get() + 1);
    }
}

impl HistoryStore for MemoryHistory {
    fn append(&self, entry: &NewHistoryEntry) -> Result<HistoryEntry> {
        self.check_writable()?;
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        let stored = HistoryEntry {
            id: HistoryEntryId::new(id),
            domain: entry.domain,
            subject: entry.subject.clone(),
            nfa_type: entry.nfa_type,
            status: entry.status,
            date: entry.date,
            total_amount: entry.total_amount.clone(),
            description: entry.description.clone(),
            file_ref: entry.file_ref.clone(),
            full_text: entry.full_text.clone(),
            fallback: entry.fallback,
            created_at: OffsetDateTime::now_utc(),
        };
        self.entries.borrow_mut().push(stored.clone());
        self.bump();
        Ok(stored)
    }

    fn list(&self, domain: HistoryDomain) -> Result<Vec<HistoryEntry>> {
        let mut entries: Vec<HistoryEntry> = self
            .entries
            .borrow()
            .iter()
            .filter(|entry| entry.domain == domain)
            .cloned()
            .collect();
        entries.sort_by(|left, right| right.date.cmp(&left.date).then(right.id.cmp(&left.id)));
        Ok(entries)
    }

    fn delete_by_id(&self, id: HistoryEntryId) -> Result<()> {
        self.check_writable()?;
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        if entries.len() == before {
            bail!("history entry {id} not found");
        }
        drop(entries);
        self.bump();
        Ok(())
    }

    fn update_status(&self, id: HistoryEntryId, status: HistoryStatus) -> Result<()> {
        self.check_writable()?;
        let mut entries = self.entries.borrow_mut();
        let Some(entry) = entries.iter_mut().find(|entry| entry.id == id) else {
            bail!("history entry {id} not found");
        };
        entry.status = status;
        drop(entries);
        self.bump();
        Ok(())
    }

    fn revision(&self) -> Result<i64> {
        Ok(self.revision.get())
    }
}
