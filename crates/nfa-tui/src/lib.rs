// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use nfa_app::{
    BULLET_COUNT_RANGE, Collaborators, DocumentSection, FinancialTable, GenerateRequest,
    HistoryDomain, HistoryEntry, HistoryQuery, HistoryWatcher, MIN_SUMMARY_CHARS, NfaError,
    NfaSession, PreviewView, RenderedDocument, SessionCommand, SessionEvent, Step, TextOrigin,
    WORD_LIMIT_RANGE,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Tabs, Wrap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;
use time::Date;
use time::macros::format_description;
use tracing::{debug, info, warn};

const STATUS_CLEAR_AFTER: Duration = Duration::from_secs(4);
const SECTION_WORD_STEP: u32 = 10;
const PAGE_SCROLL: u16 = 10;
const STEPS: [Step; 4] = [Step::Details, Step::Table, Step::Generating, Step::Preview];

/// What the terminal front end needs from the process hosting it.
pub trait NfaRuntime {
    fn collaborators(&self) -> Collaborators<'_>;

    /// Writes a rendered document where the user can open it.
    fn save_document(&mut self, document: &RenderedDocument) -> Result<PathBuf>;

    fn import_table(&mut self, path: &Path) -> Result<FinancialTable> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("read table file {}", path.display()))?;
        FinancialTable::from_csv(&text)
            .with_context(|| format!("import table from {}", path.display()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Screen {
    #[default]
    Session,
    History,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum DetailsField {
    #[default]
    Subject,
    Summary,
    NfaType,
    Bullets,
    Section(DocumentSection),
}

impl DetailsField {
    const ORDER: [Self; 7] = [
        Self::Subject,
        Self::Summary,
        Self::NfaType,
        Self::Bullets,
        Self::Section(DocumentSection::Proposal),
        Self::Section(DocumentSection::Background),
        Self::Section(DocumentSection::Recommendation),
    ];

    fn position(self) -> usize {
        Self::ORDER
            .iter()
            .position(|field| *field == self)
            .unwrap_or(0)
    }

    fn next(self) -> Self {
        Self::ORDER[(self.position() + 1) % Self::ORDER.len()]
    }

    fn prev(self) -> Self {
        Self::ORDER[(self.position() + Self::ORDER.len() - 1) % Self::ORDER.len()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputTarget {
    Header(usize),
    Cell { row: usize, column: usize },
    ImportPath,
    HistorySearch,
}

impl InputTarget {
    fn title(self) -> String {
        match self {
            Self::Header(column) => format!("column {} header", column + 1),
            Self::Cell { row, column } => format!("row {} column {}", row + 1, column + 1),
            Self::ImportPath => "import CSV file".to_owned(),
            Self::HistorySearch => "search (text or YYYY-MM-DD)".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct InputState {
    target: InputTarget,
    buffer: String,
}

/// Work queued by a key press and run after the next frame, so the
/// triggering step is visible and further presses are ignored meanwhile.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PendingAction {
    Generate(GenerateRequest),
    Edit(String),
    Download,
}

#[derive(Debug, Clone, PartialEq, Default)]
struct HistoryUiState {
    entries: Vec<HistoryEntry>,
    cursor: usize,
    query: HistoryQuery,
    query_text: String,
    watcher: HistoryWatcher,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternalEvent {
    ClearStatus { token: u64 },
}

#[derive(Debug, Clone, PartialEq, Default)]
struct ViewData {
    screen: Screen,
    details_focus: DetailsField,
    /// Zero is the header row.
    table_row: usize,
    table_column: usize,
    input: Option<InputState>,
    prompt: String,
    preview_scroll: u16,
    pending: Option<PendingAction>,
    history: HistoryUiState,
    help_visible: bool,
    notice: Option<String>,
    status_token: u64,
    last_saved: Option<PathBuf>,
}

pub fn run_app<R: NfaRuntime>(session: &mut NfaSession, runtime: &mut R) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::default();
    let (internal_tx, internal_rx) = mpsc::channel();

    let mut result = Ok(());
    loop {
        process_internal_events(session, &mut view_data, &internal_rx);
        if let Err(error) = refresh_history_if_changed(runtime, &mut view_data) {
            emit_status(&mut view_data, &internal_tx, format!("history reload failed: {error:#}"));
        }

        if let Err(error) = terminal.draw(|frame| render(frame, session, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        if view_data.pending.is_some() {
            run_pending(session, runtime, &mut view_data, &internal_tx);
            continue;
        }

        let has_event = match event::poll(Duration::from_millis(120)).context("poll event") {
            Ok(has_event) => has_event,
            Err(error) => {
                result = Err(error);
                break;
            }
        };
        if has_event {
            match event::read().context("read event") {
                Ok(Event::Key(key)) => {
                    if handle_key_event(session, runtime, &mut view_data, &internal_tx, key) {
                        break;
                    }
                }
                Ok(_) => {}
                Err(error) => {
                    result = Err(error);
                    break;
                }
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn process_internal_events(
    session: &mut NfaSession,
    view_data: &mut ViewData,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                view_data.notice = None;
                session.dispatch(SessionCommand::ClearStatus);
            }
            InternalEvent::ClearStatus { .. } => {}
        }
    }
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(STATUS_CLEAR_AFTER);
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

/// Restarts the clear timer for whatever status is showing now.
fn touch_status(view_data: &mut ViewData, internal_tx: &Sender<InternalEvent>) {
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view_data.status_token);
}

fn emit_status(
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    view_data.notice = Some(message.into());
    touch_status(view_data, internal_tx);
}

fn report_error(view_data: &mut ViewData, internal_tx: &Sender<InternalEvent>, error: &NfaError) {
    let message = match error {
        NfaError::Validation(errors) => format!("fix the form: {errors}"),
        other => other.to_string(),
    };
    emit_status(view_data, internal_tx, message);
}

fn apply_command(
    session: &mut NfaSession,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    command: SessionCommand,
) {
    view_data.notice = None;
    for event in session.dispatch(command) {
        match event {
            SessionEvent::StepChanged(step) => {
                debug!(step = step.label(), "step changed");
                view_data.preview_scroll = 0;
                clamp_table_cursor(session, view_data);
            }
            SessionEvent::ValidationFailed(errors) => {
                emit_status(view_data, internal_tx, format!("fix the form: {errors}"));
            }
            SessionEvent::StatusUpdated(_) => touch_status(view_data, internal_tx),
            SessionEvent::DraftReset => {
                view_data.prompt.clear();
                view_data.details_focus = DetailsField::default();
                view_data.table_row = 0;
                view_data.table_column = 0;
                view_data.last_saved = None;
            }
            SessionEvent::ViewChanged(_) | SessionEvent::StatusCleared => {}
        }
    }
}

fn handle_key_event<R: NfaRuntime>(
    session: &mut NfaSession,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.code == KeyCode::Char('q') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    if view_data.pending.is_some() {
        return false;
    }

    if view_data.help_visible {
        if matches!(key.code, KeyCode::Esc | KeyCode::F(1)) {
            view_data.help_visible = false;
        }
        return false;
    }

    match key.code {
        KeyCode::F(1) => {
            view_data.help_visible = true;
            return false;
        }
        KeyCode::F(2) => {
            toggle_history(runtime, view_data, internal_tx);
            return false;
        }
        KeyCode::F(5) => {
            check_backend(session, runtime, view_data, internal_tx);
            return false;
        }
        _ => {}
    }

    if view_data.input.is_some() {
        handle_input_key(session, runtime, view_data, internal_tx, key);
        return false;
    }

    match view_data.screen {
        Screen::History => handle_history_key(session, runtime, view_data, internal_tx, key),
        Screen::Session => match session.step() {
            Step::Details => handle_details_key(session, view_data, internal_tx, key),
            Step::Table => handle_table_key(session, view_data, internal_tx, key),
            Step::Generating => {}
            Step::Preview => match session.view() {
                PreviewView::Document => {
                    handle_preview_key(session, view_data, internal_tx, key);
                }
                PreviewView::Editor => handle_editor_key(session, view_data, internal_tx, key),
            },
        },
    }
    false
}

fn typed_char(key: KeyEvent) -> Option<char> {
    match key.code {
        KeyCode::Char(ch)
            if !key
                .modifiers
                .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
        {
            Some(ch)
        }
        _ => None,
    }
}

fn handle_details_key(
    session: &mut NfaSession,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let focus = view_data.details_focus;
    match key.code {
        KeyCode::Tab | KeyCode::Down => view_data.details_focus = focus.next(),
        KeyCode::BackTab | KeyCode::Up => view_data.details_focus = focus.prev(),
        KeyCode::Enter => apply_command(session, view_data, internal_tx, SessionCommand::Next),
        KeyCode::Backspace => match focus {
            DetailsField::Subject => {
                session.form.subject.pop();
            }
            DetailsField::Summary => {
                session.form.summary.pop();
            }
            _ => {}
        },
        KeyCode::Left | KeyCode::Right => {
            let forward = key.code == KeyCode::Right;
            match focus {
                DetailsField::NfaType => session.set_nfa_type(session.form.nfa_type.toggled()),
                DetailsField::Bullets => {
                    session.form.bullets_required = !session.form.bullets_required;
                }
                DetailsField::Section(section) => {
                    let setting = session.form.sections.get_mut(section);
                    let stepped = if forward {
                        setting.word_limit.saturating_add(SECTION_WORD_STEP)
                    } else {
                        setting.word_limit.saturating_sub(SECTION_WORD_STEP)
                    };
                    setting.word_limit =
                        stepped.clamp(*WORD_LIMIT_RANGE.start(), *WORD_LIMIT_RANGE.end());
                }
                DetailsField::Subject | DetailsField::Summary => {}
            }
        }
        _ => {
            let Some(ch) = typed_char(key) else {
                return;
            };
            match focus {
                DetailsField::Subject => session.form.subject.push(ch),
                DetailsField::Summary => session.form.summary.push(ch),
                DetailsField::NfaType if ch == ' ' => {
                    session.set_nfa_type(session.form.nfa_type.toggled());
                }
                DetailsField::Bullets if ch == ' ' => {
                    session.form.bullets_required = !session.form.bullets_required;
                }
                DetailsField::Section(section) => {
                    let setting = session.form.sections.get_mut(section);
                    match ch {
                        '+' => {
                            setting.bullet_count =
                                (setting.bullet_count + 1).min(*BULLET_COUNT_RANGE.end());
                        }
                        '-' => setting.bullet_count = setting.bullet_count.saturating_sub(1),
                        ' ' => setting.add_header = !setting.add_header,
                        _ => {}
                    }
                }
                DetailsField::NfaType | DetailsField::Bullets => {}
            }
        }
    }
}

fn clamp_table_cursor(session: &NfaSession, view_data: &mut ViewData) {
    view_data.table_row = view_data.table_row.min(session.table.rows().len());
    view_data.table_column = view_data
        .table_column
        .min(session.table.headers().len().saturating_sub(1));
}

fn handle_table_key(
    session: &mut NfaSession,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Up => view_data.table_row = view_data.table_row.saturating_sub(1),
        KeyCode::Down => view_data.table_row += 1,
        KeyCode::Left => view_data.table_column = view_data.table_column.saturating_sub(1),
        KeyCode::Right => view_data.table_column += 1,
        KeyCode::Enter => {
            if session.table.headers().is_empty() {
                emit_status(view_data, internal_tx, "no columns yet -- press t or A first");
                return;
            }
            let target = match view_data.table_row {
                0 => InputTarget::Header(view_data.table_column),
                row => InputTarget::Cell {
                    row: row - 1,
                    column: view_data.table_column,
                },
            };
            let buffer = match target {
                InputTarget::Header(column) => session
                    .table
                    .headers()
                    .get(column)
                    .cloned()
                    .unwrap_or_default(),
                InputTarget::Cell { row, column } => session
                    .table
                    .cell(row, column)
                    .unwrap_or_default()
                    .to_owned(),
                _ => String::new(),
            };
            view_data.input = Some(InputState { target, buffer });
        }
        KeyCode::Esc => apply_command(session, view_data, internal_tx, SessionCommand::Back),
        _ => match typed_char(key) {
            Some('k') => view_data.table_row = view_data.table_row.saturating_sub(1),
            Some('j') => view_data.table_row += 1,
            Some('h') => view_data.table_column = view_data.table_column.saturating_sub(1),
            Some('l') => view_data.table_column += 1,
            Some('a') => {
                if session.table.headers().is_empty() {
                    emit_status(view_data, internal_tx, "no columns yet -- press t or A first");
                    return;
                }
                view_data.table_row = session.table.add_row() + 1;
            }
            Some('A') => view_data.table_column = session.table.add_column(None),
            Some('x') => match view_data.table_row {
                0 => emit_status(view_data, internal_tx, "select a data row to remove"),
                row => {
                    if let Err(error) = session.table.remove_row(row - 1) {
                        emit_status(view_data, internal_tx, format!("{error:#}"));
                    }
                }
            },
            Some('X') => {
                if let Err(error) = session.table.remove_column(view_data.table_column) {
                    emit_status(view_data, internal_tx, format!("{error:#}"));
                }
            }
            Some('t') => {
                if session.table.is_empty() {
                    session.table = FinancialTable::with_default_headers();
                } else {
                    emit_status(view_data, internal_tx, "table already has columns");
                }
            }
            Some('i') => {
                view_data.input = Some(InputState {
                    target: InputTarget::ImportPath,
                    buffer: String::new(),
                });
            }
            Some('g') => start_generate(session, view_data, internal_tx),
            Some('n') => apply_command(session, view_data, internal_tx, SessionCommand::Next),
            Some('b') => apply_command(session, view_data, internal_tx, SessionCommand::Back),
            _ => {}
        },
    }
    clamp_table_cursor(session, view_data);
}

fn start_generate(
    session: &mut NfaSession,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    match session.begin_generate() {
        Ok(request) => {
            view_data.notice = Some("generating...".to_owned());
            view_data.pending = Some(PendingAction::Generate(request));
        }
        Err(error) => report_error(view_data, internal_tx, &error),
    }
}

fn handle_preview_key(
    session: &mut NfaSession,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Up => view_data.preview_scroll = view_data.preview_scroll.saturating_sub(1),
        KeyCode::Down => view_data.preview_scroll = view_data.preview_scroll.saturating_add(1),
        KeyCode::PageUp => {
            view_data.preview_scroll = view_data.preview_scroll.saturating_sub(PAGE_SCROLL);
        }
        KeyCode::PageDown => {
            view_data.preview_scroll = view_data.preview_scroll.saturating_add(PAGE_SCROLL);
        }
        KeyCode::Esc => apply_command(session, view_data, internal_tx, SessionCommand::Back),
        _ => match typed_char(key) {
            Some('k') => view_data.preview_scroll = view_data.preview_scroll.saturating_sub(1),
            Some('j') => view_data.preview_scroll = view_data.preview_scroll.saturating_add(1),
            Some('e') => {
                apply_command(session, view_data, internal_tx, SessionCommand::OpenEditor);
            }
            Some('d') => {
                view_data.notice = Some("rendering document...".to_owned());
                view_data.pending = Some(PendingAction::Download);
            }
            Some('b') => apply_command(session, view_data, internal_tx, SessionCommand::Back),
            Some('n') => apply_command(session, view_data, internal_tx, SessionCommand::Reset),
            _ => {}
        },
    }
}

fn handle_editor_key(
    session: &mut NfaSession,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Esc => {
            apply_command(session, view_data, internal_tx, SessionCommand::BackToPreview);
        }
        KeyCode::Enter => {
            view_data.notice = Some("applying edit...".to_owned());
            view_data.pending = Some(PendingAction::Edit(view_data.prompt.clone()));
        }
        KeyCode::Backspace => {
            view_data.prompt.pop();
        }
        KeyCode::Up => view_data.preview_scroll = view_data.preview_scroll.saturating_sub(1),
        KeyCode::Down => view_data.preview_scroll = view_data.preview_scroll.saturating_add(1),
        _ => {
            if let Some(ch) = typed_char(key) {
                view_data.prompt.push(ch);
            }
        }
    }
}

fn run_pending<R: NfaRuntime>(
    session: &mut NfaSession,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(action) = view_data.pending.take() else {
        return;
    };
    view_data.notice = None;
    match action {
        PendingAction::Generate(request) => {
            let collaborators = runtime.collaborators();
            let result = collaborators.generator.generate(&request);
            match session.finish_generate(result, collaborators.history) {
                Ok(origin) => {
                    if origin == TextOrigin::Fallback {
                        warn!("draft produced in fallback mode");
                    }
                    view_data.preview_scroll = 0;
                    touch_status(view_data, internal_tx);
                }
                Err(error) => report_error(view_data, internal_tx, &error),
            }
        }
        PendingAction::Edit(prompt) => match session.apply_edit(&prompt, runtime.collaborators()) {
            Ok(_) => {
                view_data.prompt.clear();
                touch_status(view_data, internal_tx);
            }
            Err(error) => report_error(view_data, internal_tx, &error),
        },
        PendingAction::Download => match session.download(runtime.collaborators()) {
            Ok(document) => match runtime.save_document(&document) {
                Ok(path) => {
                    info!(path = %path.display(), "document saved");
                    emit_status(view_data, internal_tx, format!("saved {}", path.display()));
                    view_data.last_saved = Some(path);
                }
                Err(error) => {
                    emit_status(view_data, internal_tx, format!("save failed: {error:#}"));
                }
            },
            Err(error) => report_error(view_data, internal_tx, &error),
        },
    }
}

fn check_backend<R: NfaRuntime>(
    session: &mut NfaSession,
    runtime: &R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    match session.check_health(runtime.collaborators().generator) {
        Ok(()) => emit_status(view_data, internal_tx, "backend reachable"),
        Err(error) => report_error(view_data, internal_tx, &error),
    }
}

fn handle_input_key<R: NfaRuntime>(
    session: &mut NfaSession,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Esc => view_data.input = None,
        KeyCode::Enter => {
            if let Some(input) = view_data.input.take() {
                commit_input(session, runtime, view_data, internal_tx, input);
            }
        }
        KeyCode::Backspace => {
            if let Some(input) = view_data.input.as_mut() {
                input.buffer.pop();
            }
        }
        _ => {
            if let (Some(ch), Some(input)) = (typed_char(key), view_data.input.as_mut()) {
                input.buffer.push(ch);
            }
        }
    }
}

fn commit_input<R: NfaRuntime>(
    session: &mut NfaSession,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    input: InputState,
) {
    let outcome = match input.target {
        InputTarget::Header(column) => session.table.rename_header(column, input.buffer.trim()),
        InputTarget::Cell { row, column } => {
            session.table.set_cell(row, column, input.buffer.trim())
        }
        InputTarget::ImportPath => match runtime.import_table(Path::new(input.buffer.trim())) {
            Ok(table) => {
                let rows = table.rows().len();
                session.table = table;
                view_data.table_row = 0;
                view_data.table_column = 0;
                emit_status(view_data, internal_tx, format!("imported {rows} rows"));
                Ok(())
            }
            Err(error) => Err(error),
        },
        InputTarget::HistorySearch => {
            view_data.history.query = parse_history_query(&input.buffer);
            view_data.history.query_text = input.buffer.trim().to_owned();
            view_data.history.cursor = 0;
            reload_history(runtime, view_data)
        }
    };
    if let Err(error) = outcome {
        emit_status(view_data, internal_tx, format!("{error:#}"));
    }
}

/// A lone date filters by day; anything else is a subject/description term.
fn parse_history_query(text: &str) -> HistoryQuery {
    let text = text.trim();
    if text.is_empty() {
        return HistoryQuery::default();
    }
    let date = Date::parse(text, format_description!("[year]-[month]-[day]"))
        .or_else(|_| Date::parse(text, format_description!("[day]/[month]/[year]")));
    match date {
        Ok(date) => HistoryQuery {
            term: None,
            date: Some(date),
        },
        Err(_) => HistoryQuery {
            term: Some(text.to_owned()),
            date: None,
        },
    }
}

fn toggle_history<R: NfaRuntime>(
    runtime: &R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    view_data.input = None;
    view_data.screen = match view_data.screen {
        Screen::Session => Screen::History,
        Screen::History => Screen::Session,
    };
    if view_data.screen == Screen::History
        && let Err(error) = reload_history(runtime, view_data)
    {
        emit_status(view_data, internal_tx, format!("history load failed: {error:#}"));
    }
}

fn reload_history<R: NfaRuntime>(runtime: &R, view_data: &mut ViewData) -> Result<()> {
    let Some(history) = runtime.collaborators().history else {
        view_data.history.entries.clear();
        return Ok(());
    };
    view_data.history.entries = history.search(HistoryDomain::Nfa, &view_data.history.query)?;
    view_data.history.cursor = view_data
        .history
        .cursor
        .min(view_data.history.entries.len().saturating_sub(1));
    Ok(())
}

fn refresh_history_if_changed<R: NfaRuntime>(runtime: &R, view_data: &mut ViewData) -> Result<()> {
    if view_data.screen != Screen::History {
        return Ok(());
    }
    let Some(history) = runtime.collaborators().history else {
        return Ok(());
    };
    if view_data.history.watcher.poll(history)? {
        reload_history(runtime, view_data)?;
    }
    Ok(())
}

fn handle_history_key<R: NfaRuntime>(
    session: &mut NfaSession,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let selected = view_data
        .history
        .entries
        .get(view_data.history.cursor)
        .cloned();
    match (key.code, typed_char(key)) {
        (KeyCode::Up, _) | (_, Some('k')) => {
            view_data.history.cursor = view_data.history.cursor.saturating_sub(1);
        }
        (KeyCode::Down, _) | (_, Some('j')) => {
            let last = view_data.history.entries.len().saturating_sub(1);
            view_data.history.cursor = (view_data.history.cursor + 1).min(last);
        }
        (KeyCode::Esc, _) => view_data.screen = Screen::Session,
        (KeyCode::Enter, _) => {
            let Some(entry) = selected else {
                return;
            };
            match session.load_history_entry(&entry) {
                Ok(()) => {
                    view_data.screen = Screen::Session;
                    view_data.preview_scroll = 0;
                    view_data.prompt.clear();
                    touch_status(view_data, internal_tx);
                }
                Err(error) => emit_status(view_data, internal_tx, format!("{error:#}")),
            }
        }
        (_, Some('/')) => {
            view_data.input = Some(InputState {
                target: InputTarget::HistorySearch,
                buffer: view_data.history.query_text.clone(),
            });
        }
        (_, Some('c')) => {
            view_data.history.query = HistoryQuery::default();
            view_data.history.query_text.clear();
            if let Err(error) = reload_history(runtime, view_data) {
                emit_status(view_data, internal_tx, format!("{error:#}"));
            }
        }
        (_, Some('s')) => {
            let Some(entry) = selected else {
                return;
            };
            let outcome = match runtime.collaborators().history {
                Some(history) => history.update_status(entry.id, entry.status.next()),
                None => Ok(()),
            };
            let outcome = outcome.and_then(|()| reload_history(runtime, view_data));
            match outcome {
                Ok(()) => emit_status(
                    view_data,
                    internal_tx,
                    format!("entry {} marked {}", entry.id, entry.status.next().as_str()),
                ),
                Err(error) => emit_status(view_data, internal_tx, format!("{error:#}")),
            }
        }
        (_, Some('D')) => {
            let Some(entry) = selected else {
                return;
            };
            let outcome = match runtime.collaborators().history {
                Some(history) => history.delete_by_id(entry.id),
                None => Ok(()),
            };
            let outcome = outcome.and_then(|()| reload_history(runtime, view_data));
            match outcome {
                Ok(()) => emit_status(view_data, internal_tx, format!("entry {} deleted", entry.id)),
                Err(error) => emit_status(view_data, internal_tx, format!("{error:#}")),
            }
        }
        _ => {}
    }
}

fn render(frame: &mut ratatui::Frame<'_>, session: &NfaSession, view_data: &ViewData) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let title = if session.is_offline() {
        "nfa-desk [offline]"
    } else {
        "nfa-desk"
    };
    match view_data.screen {
        Screen::Session => {
            let selected = STEPS
                .iter()
                .position(|step| *step == session.step())
                .unwrap_or(0);
            let titles = STEPS
                .iter()
                .enumerate()
                .map(|(index, step)| format!("{} {}", index + 1, step.label()))
                .collect::<Vec<String>>();
            let tabs = Tabs::new(titles)
                .block(Block::default().title(title).borders(Borders::ALL))
                .style(Style::default().fg(Color::White))
                .highlight_style(
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                )
                .select(selected);
            frame.render_widget(tabs, layout[0]);
            render_session_body(frame, layout[1], session, view_data);
        }
        Screen::History => {
            let header = Paragraph::new("history")
                .block(Block::default().title(title).borders(Borders::ALL));
            frame.render_widget(header, layout[0]);
            let body = Paragraph::new(history_text(&view_data.history))
                .block(Block::default().borders(Borders::ALL).title("nfa history"));
            frame.render_widget(body, layout[1]);
        }
    }

    let status_color = if session.is_offline() {
        Color::Red
    } else {
        Color::Yellow
    };
    let status = Paragraph::new(status_text(session, view_data))
        .style(Style::default().fg(status_color))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status, layout[2]);

    if let Some(input) = &view_data.input {
        let area = centered_rect(60, 20, frame.area());
        frame.render_widget(Clear, area);
        let widget = Paragraph::new(format!("{}_", input.buffer))
            .block(
                Block::default()
                    .title(input.target.title())
                    .borders(Borders::ALL),
            )
            .style(Style::default().fg(Color::White));
        frame.render_widget(widget, area);
    }

    if view_data.help_visible {
        let area = centered_rect(70, 70, frame.area());
        frame.render_widget(Clear, area);
        let help = Paragraph::new(help_text())
            .block(Block::default().title("help").borders(Borders::ALL))
            .style(Style::default().fg(Color::White));
        frame.render_widget(help, area);
    }
}

fn render_session_body(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    session: &NfaSession,
    view_data: &ViewData,
) {
    match session.step() {
        Step::Details => {
            let body = Paragraph::new(details_text(session, view_data.details_focus))
                .wrap(Wrap { trim: false })
                .block(Block::default().borders(Borders::ALL).title("details"));
            frame.render_widget(body, area);
        }
        Step::Table => render_table_step(frame, area, session, view_data),
        Step::Generating => {
            let body = Paragraph::new(format!(
                "Generating the note for {:?}...\n\nThe fallback template is used if the generator fails.",
                session.form.subject.trim()
            ))
            .block(Block::default().borders(Borders::ALL).title("generating"));
            frame.render_widget(body, area);
        }
        Step::Preview => {
            let document = Paragraph::new(preview_text(session))
                .wrap(Wrap { trim: false })
                .scroll((view_data.preview_scroll, 0))
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .title(preview_title(session)),
                );
            if session.view() == PreviewView::Document {
                frame.render_widget(document, area);
                return;
            }
            let halves = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
                .split(area);
            frame.render_widget(document, halves[0]);
            let editor = Paragraph::new(editor_text(session, &view_data.prompt))
                .wrap(Wrap { trim: false })
                .block(Block::default().borders(Borders::ALL).title("ai edit"));
            frame.render_widget(editor, halves[1]);
        }
    }
}

fn render_table_step(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    session: &NfaSession,
    view_data: &ViewData,
) {
    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(area);
    let headers = session.table.headers();
    let block = Block::default()
        .borders(Borders::ALL)
        .title("financial/resource implications");

    if headers.is_empty() {
        let empty = Paragraph::new(
            "No columns yet. Press t for Item | Quantity | Unit Cost | Total Cost, A to add a column, or i to import CSV.\nAn empty table is allowed: press g to generate.",
        )
        .wrap(Wrap { trim: false })
        .block(block);
        frame.render_widget(empty, parts[0]);
    } else {
        let selected = Style::default().add_modifier(Modifier::REVERSED);
        let cell = |text: &str, row: usize, column: usize| {
            let cell = Cell::from(text.to_owned());
            if row == view_data.table_row && column == view_data.table_column {
                cell.style(selected)
            } else {
                cell
            }
        };
        let header = Row::new(
            headers
                .iter()
                .enumerate()
                .map(|(column, name)| cell(name, 0, column))
                .collect::<Vec<Cell>>(),
        )
        .style(Style::default().add_modifier(Modifier::BOLD));
        let rows = session
            .table
            .rows()
            .iter()
            .enumerate()
            .map(|(index, values)| {
                Row::new(
                    values
                        .iter()
                        .enumerate()
                        .map(|(column, value)| cell(value, index + 1, column))
                        .collect::<Vec<Cell>>(),
                )
            })
            .collect::<Vec<Row>>();
        let widths = vec![Constraint::Ratio(1, headers.len() as u32); headers.len()];
        let table = Table::new(rows, widths).header(header).block(block);
        frame.render_widget(table, parts[0]);
    }

    let total = Paragraph::new(format!(" Total: {}", session.table.total_amount()))
        .style(Style::default().fg(Color::Cyan));
    frame.render_widget(total, parts[1]);
}

fn details_text(session: &NfaSession, focus: DetailsField) -> String {
    let form = &session.form;
    let errors = session.field_errors();
    let marker = |field: DetailsField| if field == focus { ">" } else { " " };
    let summary_chars = form.summary.trim().chars().count();

    let mut lines = vec![
        format!("{} Subject: {}", marker(DetailsField::Subject), form.subject),
        format!(
            "{} Summary ({summary_chars}/{MIN_SUMMARY_CHARS}): {}",
            marker(DetailsField::Summary),
            form.summary
        ),
        format!("{} Type: [{}]", marker(DetailsField::NfaType), form.nfa_type.label()),
        format!(
            "{} Bullet points: {}",
            marker(DetailsField::Bullets),
            if form.bullets_required { "yes" } else { "no" }
        ),
        String::new(),
        "  AI section settings".to_owned(),
    ];
    for section in DocumentSection::ALL {
        let setting = form.sections.get(section);
        lines.push(format!(
            "{}   {}: {} words, {} bullets, header {}",
            marker(DetailsField::Section(section)),
            section.label(),
            setting.word_limit,
            setting.bullet_count,
            if setting.add_header { "on" } else { "off" }
        ));
    }
    if !errors.is_empty() {
        lines.push(String::new());
        lines.extend(
            errors
                .iter()
                .map(|error| format!("  ! {}: {}", error.field.as_str(), error.message)),
        );
    }
    lines.join("\n")
}

fn preview_title(session: &NfaSession) -> String {
    let origin = match session.origin() {
        Some(TextOrigin::Fallback) => " (fallback mode)",
        Some(TextOrigin::History) => " (history)",
        Some(TextOrigin::Generated) | None => "",
    };
    format!("preview{origin}")
}

fn preview_text(session: &NfaSession) -> String {
    let mut text = session.current_text().unwrap_or_default().to_owned();
    if !session.table.is_empty() {
        text.push_str("\n\nFinancial/Resource Implications\n");
        for row in session.table.to_grid() {
            text.push_str(&row.join(" | "));
            text.push('\n');
        }
    }
    text
}

fn editor_text(session: &NfaSession, prompt: &str) -> String {
    let mut lines = Vec::new();
    for turn in session.turns() {
        lines.push(format!("you: {}", turn.prompt));
        match &turn.error {
            Some(error) => lines.push(format!("  x failed, text kept: {error}")),
            None => lines.push("  ok, document updated".to_owned()),
        }
    }
    if lines.is_empty() {
        lines.push("Describe a change, e.g. \"make it shorter\".".to_owned());
    }
    lines.push(String::new());
    lines.push(format!("> {prompt}_"));
    lines.join("\n")
}

fn history_text(history: &HistoryUiState) -> String {
    let mut lines = Vec::new();
    if !history.query_text.is_empty() {
        lines.push(format!("filter: {}", history.query_text));
        lines.push(String::new());
    }
    if history.entries.is_empty() {
        lines.push("no entries".to_owned());
    }
    for (index, entry) in history.entries.iter().enumerate() {
        let marker = if index == history.cursor { ">" } else { " " };
        let mode = if entry.fallback { " [fallback]" } else { "" };
        lines.push(format!(
            "{marker} {:>4}  {}  {:<8}  {:>12}  {}{mode}",
            entry.id,
            entry.date,
            entry.status.as_str(),
            entry.total_amount,
            entry.subject
        ));
    }
    lines.join("\n")
}

fn status_text(session: &NfaSession, view_data: &ViewData) -> String {
    let mode = if view_data.pending.is_some() {
        "BUSY".to_owned()
    } else if session.is_offline() {
        "OFFLINE".to_owned()
    } else if view_data.screen == Screen::History {
        "HISTORY".to_owned()
    } else {
        session.step().label().to_uppercase()
    };
    let hints = match (view_data.screen, session.step(), session.view()) {
        (Screen::History, _, _) => "j/k enter open / search c clear s status D delete esc",
        (_, Step::Details, _) => "tab field type | space/←→ toggle +/- bullets enter next",
        (_, Step::Table, _) => "hjkl enter edit a/A add x/X remove t template i import g generate",
        (_, Step::Generating, _) => "please wait",
        (_, Step::Preview, PreviewView::Document) => "j/k scroll e edit d download b back n new",
        (_, Step::Preview, PreviewView::Editor) => "type instruction enter apply esc preview",
    };
    let hints = format!("{hints} | F1 help F2 history F5 backend ctrl+q");
    match view_data.notice.as_deref().or(session.status_line()) {
        Some(message) => format!("{mode} | {message} | {hints}"),
        None => format!("{mode} | {hints}"),
    }
}

fn help_text() -> String {
    [
        "Details   type into subject and summary; tab moves between fields",
        "          space or arrows toggle type and bullets; on a section,",
        "          ←/→ change the word limit, +/- bullets, space the header",
        "Table     arrows or hjkl move, enter edits a header or cell",
        "          a row, A column, x/X remove, t default columns, i import CSV",
        "          g generates the note (fallback text if the generator fails)",
        "Preview   e opens the AI editor, d downloads the .docx, n starts over",
        "Editor    type an instruction, enter applies it, esc returns",
        "History   F2 toggles; / search, s cycle status, D delete, enter view",
        "Backend   F5 re-checks the generator after a connection failure",
        "",
        "esc or F1 closes this help",
    ]
    .join("\n")
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
