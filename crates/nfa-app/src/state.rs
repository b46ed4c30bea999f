// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::{
    ContentGenerator, DocumentRenderer, EditRequest, EditTurn, EditTurnId, FinancialTable,
    GenerateRequest, HistoryDomain, HistoryEntry, HistoryEntryId, HistoryStatus, HistoryStore,
    NewHistoryEntry, NfaError, NfaFormInput, NfaType, TextOrigin, ValidationErrors,
    document_file_name, fallback_text, is_unreachable, summarize_description, validate_prompt,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Step {
    Details,
    Table,
    Generating,
    Preview,
}

impl Step {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Details => "details",
            Self::Table => "table",
            Self::Generating => "generating",
            Self::Preview => "preview",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewView {
    Document,
    Editor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    Online,
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    Next,
    Back,
    OpenEditor,
    BackToPreview,
    Reset,
    ClearStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    StepChanged(Step),
    ViewChanged(PreviewView),
    ValidationFailed(ValidationErrors),
    DraftReset,
    StatusUpdated(String),
    StatusCleared,
}

/// The external services one session call may touch.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub generator: &'a dyn ContentGenerator,
    pub renderer: &'a dyn DocumentRenderer,
    pub history: Option<&'a dyn HistoryStore>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub history_id: Option<HistoryEntryId>,
}

/// One in-progress note for approval, from form entry to download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NfaSession {
    pub form: NfaFormInput,
    pub table: FinancialTable,
    step: Step,
    view: PreviewView,
    generated_text: Option<String>,
    edited_text: Option<String>,
    origin: Option<TextOrigin>,
    turns: Vec<EditTurn>,
    connectivity: Connectivity,
    viewing: Option<HistoryEntryId>,
    field_errors: ValidationErrors,
    status_line: Option<String>,
}

impl Default for NfaSession {
    fn default() -> Self {
        Self {
            form: NfaFormInput::default(),
            table: FinancialTable::default(),
            step: Step::Details,
            view: PreviewView::Document,
            generated_text: None,
            edited_text: None,
            origin: None,
            turns: Vec::new(),
            connectivity: Connectivity::Online,
            viewing: None,
            field_errors: ValidationErrors::default(),
            status_line: None,
        }
    }
}

impl NfaSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn view(&self) -> PreviewView {
        self.view
    }

    pub fn generated_text(&self) -> Option<&str> {
        self.generated_text.as_deref()
    }

    pub fn edited_text(&self) -> Option<&str> {
        self.edited_text.as_deref()
    }

    /// Text a download would render: edited first, then generated.
    pub fn current_text(&self) -> Option<&str> {
        self.edited_text.as_deref().or(self.generated_text.as_deref())
    }

    pub fn origin(&self) -> Option<TextOrigin> {
        self.origin
    }

    pub fn turns(&self) -> &[EditTurn] {
        &self.turns
    }

    pub fn connectivity(&self) -> Connectivity {
        self.connectivity
    }

    pub fn is_offline(&self) -> bool {
        self.connectivity == Connectivity::Offline
    }

    pub fn viewing(&self) -> Option<HistoryEntryId> {
        self.viewing
    }

    pub fn field_errors(&self) -> &ValidationErrors {
        &self.field_errors
    }

    pub fn status_line(&self) -> Option<&str> {
        self.status_line.as_deref()
    }

    pub fn dispatch(&mut self, command: SessionCommand) -> Vec<SessionEvent> {
        match command {
            SessionCommand::Next => self.next(),
            SessionCommand::Back => self.back(),
            SessionCommand::OpenEditor => {
                if self.step != Step::Preview {
                    return vec![self.set_status("generate a draft before editing")];
                }
                self.view = PreviewView::Editor;
                vec![SessionEvent::ViewChanged(self.view)]
            }
            SessionCommand::BackToPreview => {
                if self.step != Step::Preview {
                    return Vec::new();
                }
                self.view = PreviewView::Document;
                vec![SessionEvent::ViewChanged(self.view)]
            }
            SessionCommand::Reset => {
                let connectivity = self.connectivity;
                *self = Self {
                    connectivity,
                    ..Self::default()
                };
                vec![SessionEvent::DraftReset, SessionEvent::StepChanged(self.step)]
            }
            SessionCommand::ClearStatus => {
                self.status_line = None;
                vec![SessionEvent::StatusCleared]
            }
        }
    }

    fn next(&mut self) -> Vec<SessionEvent> {
        match self.step {
            Step::Details => match self.form.validate_details() {
                Ok(()) => {
                    self.field_errors = ValidationErrors::default();
                    self.step = Step::Table;
                    vec![SessionEvent::StepChanged(self.step)]
                }
                Err(errors) => {
                    self.field_errors = errors.clone();
                    vec![SessionEvent::ValidationFailed(errors)]
                }
            },
            Step::Table if self.current_text().is_some() => {
                self.step = Step::Preview;
                self.view = PreviewView::Document;
                vec![SessionEvent::StepChanged(self.step)]
            }
            Step::Table => vec![self.set_status("generate the note to continue")],
            Step::Generating | Step::Preview => Vec::new(),
        }
    }

    fn back(&mut self) -> Vec<SessionEvent> {
        match self.step {
            Step::Details | Step::Generating => Vec::new(),
            Step::Table => {
                self.step = Step::Details;
                vec![SessionEvent::StepChanged(self.step)]
            }
            Step::Preview if self.view == PreviewView::Editor => {
                self.view = PreviewView::Document;
                vec![SessionEvent::ViewChanged(self.view)]
            }
            Step::Preview if self.viewing.is_some() => Vec::new(),
            Step::Preview => {
                self.step = Step::Table;
                vec![SessionEvent::StepChanged(self.step)]
            }
        }
    }

    /// Validates the draft and moves to `Generating`; pair with [`Self::finish_generate`].
    pub fn begin_generate(&mut self) -> Result<GenerateRequest, NfaError> {
        if self.step != Step::Table {
            return Err(NfaError::InvalidStep {
                action: "generate",
                step: self.step.label(),
            });
        }
        self.ensure_online()?;
        if let Err(errors) = self.form.validate_for_generation(&self.table) {
            self.field_errors = errors.clone();
            return Err(NfaError::Validation(errors));
        }
        self.field_errors = ValidationErrors::default();
        self.step = Step::Generating;
        Ok(GenerateRequest::from_form(&self.form, &self.table))
    }

    /// Applies a generator result; any failure other than an unreachable
    /// backend is replaced by the fallback template.
    pub fn finish_generate(
        &mut self,
        result: Result<String>,
        history: Option<&dyn HistoryStore>,
    ) -> Result<TextOrigin, NfaError> {
        if self.step != Step::Generating {
            return Err(NfaError::InvalidStep {
                action: "finish generation",
                step: self.step.label(),
            });
        }
        let (text, origin) = match result {
            Ok(text) if !text.trim().is_empty() => (text, TextOrigin::Generated),
            Ok(_) => {
                warn!("content generator returned empty text, using fallback");
                (fallback_text(&self.form), TextOrigin::Fallback)
            }
            Err(error) if is_unreachable(&error) => {
                self.step = Step::Table;
                return Err(self.go_offline(&error));
            }
            Err(error) => {
                warn!(error = %format!("{error:#}"), "content generator failed, using fallback");
                (fallback_text(&self.form), TextOrigin::Fallback)
            }
        };

        self.generated_text = Some(text.clone());
        self.edited_text = Some(text.clone());
        self.origin = Some(origin);
        self.turns.clear();
        self.viewing = None;
        self.step = Step::Preview;
        self.view = PreviewView::Document;
        let message = match origin {
            TextOrigin::Fallback => "generated in fallback mode -- AI generator unavailable",
            _ => "note generated",
        };
        self.set_status(message);
        info!(subject = %self.form.subject, origin = ?origin, "draft generated");

        if let Some(history) = history {
            self.record_history(history, text, None, origin == TextOrigin::Fallback);
        }
        Ok(origin)
    }

    /// Returns to the pre-call state after an abandoned generation.
    pub fn cancel_generate(&mut self) {
        if self.step == Step::Generating {
            self.step = Step::Table;
            self.set_status("generation cancelled");
        }
    }

    pub fn generate(&mut self, collaborators: Collaborators<'_>) -> Result<TextOrigin, NfaError> {
        let request = self.begin_generate()?;
        debug!(subject = %request.subject, "calling content generator");
        let result = collaborators.generator.generate(&request);
        self.finish_generate(result, collaborators.history)
    }

    /// Runs one AI edit turn against the current text.
    pub fn apply_edit(
        &mut self,
        prompt: &str,
        collaborators: Collaborators<'_>,
    ) -> Result<&str, NfaError> {
        if self.step != Step::Preview {
            return Err(NfaError::InvalidStep {
                action: "edit",
                step: self.step.label(),
            });
        }
        self.ensure_online()?;
        validate_prompt(prompt)?;
        let current = self.current_text().unwrap_or_default().to_owned();
        let request = EditRequest {
            text: current.clone(),
            prompt: prompt.trim().to_owned(),
            subject: self.form.subject.clone(),
            summary: self.form.summary.clone(),
            nfa_type: self.form.nfa_type,
            table: self.table.clone(),
        };

        let outcome = collaborators
            .generator
            .edit(&request)
            .and_then(|text| match text.trim() {
                "" => bail!("content generator returned an empty document"),
                _ => Ok(text),
            });
        let id = EditTurnId::new(self.turns.len() as i64 + 1);
        match outcome {
            Ok(text) => {
                self.turns.push(EditTurn {
                    id,
                    prompt: request.prompt,
                    result_text: text.clone(),
                    created_at: OffsetDateTime::now_utc(),
                    error: None,
                });
                self.sync_subject(&text);
                self.edited_text = Some(text);
                self.set_status("edit applied");
                info!(turn = %id, "edit applied");
                Ok(self.current_text().unwrap_or_default())
            }
            Err(error) => {
                let message = format!("{error:#}");
                self.turns.push(EditTurn {
                    id,
                    prompt: request.prompt,
                    result_text: current,
                    created_at: OffsetDateTime::now_utc(),
                    error: Some(message.clone()),
                });
                if is_unreachable(&error) {
                    return Err(self.go_offline(&error));
                }
                warn!(turn = %id, error = %message, "edit failed, text unchanged");
                self.set_status("edit failed -- previous text kept");
                Err(NfaError::EditFailed(message))
            }
        }
    }

    /// Renders the current text; the draft is never changed by this call.
    pub fn download(
        &mut self,
        collaborators: Collaborators<'_>,
    ) -> Result<RenderedDocument, NfaError> {
        if self.step != Step::Preview {
            return Err(NfaError::InvalidStep {
                action: "download",
                step: self.step.label(),
            });
        }
        self.ensure_online()?;
        let text = self.current_text().unwrap_or_default().to_owned();
        let bytes = match collaborators
            .renderer
            .render(&text, &self.table, self.form.nfa_type)
        {
            Ok(bytes) => bytes,
            Err(error) if is_unreachable(&error) => return Err(self.go_offline(&error)),
            Err(error) => {
                let message = format!("{error:#}");
                warn!(error = %message, "document rendering failed");
                self.set_status("download failed -- retry");
                return Err(NfaError::Render(message));
            }
        };
        let file_name = document_file_name(&self.form.subject, self.form.nfa_type);
        info!(file = %file_name, bytes = bytes.len(), "document rendered");
        self.set_status(&format!("saved {file_name}"));

        let fallback = self.origin == Some(TextOrigin::Fallback);
        let history_id = match (collaborators.history, self.viewing) {
            (Some(history), None) => {
                self.record_history(history, text, Some(file_name.clone()), fallback)
            }
            _ => None,
        };
        Ok(RenderedDocument {
            file_name,
            bytes,
            history_id,
        })
    }

    /// Replaces the draft with a read-only view of a stored note.
    pub fn load_history_entry(&mut self, entry: &HistoryEntry) -> Result<()> {
        if entry.domain != HistoryDomain::Nfa {
            bail!(
                "history entry {} belongs to {} -- only NFA entries open in the editor",
                entry.id,
                entry.domain.as_str()
            );
        }
        let Some(text) = entry.full_text.as_deref().filter(|text| !text.trim().is_empty())
        else {
            bail!(
                "history entry {} has no stored text -- regenerate it from the form",
                entry.id
            );
        };
        let connectivity = self.connectivity;
        *self = Self {
            form: NfaFormInput {
                subject: entry.subject.clone(),
                summary: entry.description.clone(),
                nfa_type: entry.nfa_type.unwrap_or_default(),
                ..NfaFormInput::default()
            },
            step: Step::Preview,
            generated_text: Some(text.to_owned()),
            edited_text: Some(text.to_owned()),
            origin: Some(TextOrigin::History),
            viewing: Some(entry.id),
            connectivity,
            ..Self::default()
        };
        self.set_status(&format!("viewing history entry {}", entry.id));
        Ok(())
    }

    /// Clears the offline gate once the generator answers again.
    pub fn check_health(&mut self, generator: &dyn ContentGenerator) -> Result<(), NfaError> {
        match generator.health_check() {
            Ok(()) => {
                if self.is_offline() {
                    info!("backend reachable again");
                    self.set_status("back online");
                }
                self.connectivity = Connectivity::Online;
                Ok(())
            }
            Err(error) if is_unreachable(&error) => Err(self.go_offline(&error)),
            Err(error) => {
                let message = format!("{error:#}");
                warn!(error = %message, "content generator unhealthy");
                self.set_status("generator unavailable -- drafts will use the template");
                Err(NfaError::GenerationUnavailable(message))
            }
        }
    }

    pub fn set_nfa_type(&mut self, nfa_type: NfaType) {
        self.form.nfa_type = nfa_type;
    }

    fn ensure_online(&self) -> Result<(), NfaError> {
        match self.connectivity {
            Connectivity::Online => Ok(()),
            Connectivity::Offline => Err(NfaError::Transport(
                "backend offline -- run a health check first".to_owned(),
            )),
        }
    }

    fn go_offline(&mut self, error: &anyhow::Error) -> NfaError {
        let message = format!("{error:#}");
        warn!(error = %message, "backend unreachable, session offline");
        self.connectivity = Connectivity::Offline;
        self.set_status("backend unreachable -- actions disabled until it responds");
        NfaError::Transport(message)
    }

    fn sync_subject(&mut self, text: &str) {
        if let Some(subject) = subject_from_text(text)
            && subject != self.form.subject.trim()
        {
            debug!(from = %self.form.subject, to = %subject, "subject updated by edit");
            self.form.subject = subject.to_owned();
        }
    }

    fn record_history(
        &mut self,
        history: &dyn HistoryStore,
        text: String,
        file_ref: Option<String>,
        fallback: bool,
    ) -> Option<HistoryEntryId> {
        let entry = NewHistoryEntry {
            domain: HistoryDomain::Nfa,
            subject: self.form.subject.trim().to_owned(),
            nfa_type: Some(self.form.nfa_type),
            status: HistoryStatus::Pending,
            date: OffsetDateTime::now_utc().date(),
            total_amount: self.table.total_amount(),
            description: summarize_description(&self.form.summary),
            file_ref,
            full_text: Some(text),
            fallback,
        };
        match history.append(&entry) {
            Ok(stored) => Some(stored.id),
            Err(error) => {
                warn!(error = %format!("{error:#}"), "history append failed");
                None
            }
        }
    }

    fn set_status(&mut self, message: &str) -> SessionEvent {
        self.status_line = Some(message.to_owned());
        SessionEvent::StatusUpdated(message.to_owned())
    }
}

/// Value of the first `Subject:` line, if any.
pub fn subject_from_text(text: &str) -> Option<&str> {
    text.lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("Subject:"))
        .map(str::trim)
        .filter(|subject| !subject.is_empty())
}

#[cfg(test)]
mod tests {
    use super::{NfaSession, PreviewView, SessionCommand, SessionEvent, Step, subject_from_text};
    use crate::Field;

    fn filled() -> NfaSession {
        let mut session = NfaSession::new();
        session.form.subject = "Inter-college Debate".to_owned();
        session.form.summary =
            "Hosting the annual inter-college debate with twelve visiting teams.".to_owned();
        session
    }

    #[test]
    fn next_moves_to_table_when_details_are_valid() {
        let mut session = filled();
        let events = session.dispatch(SessionCommand::Next);
        assert_eq!(session.step(), Step::Table);
        assert_eq!(events, vec![SessionEvent::StepChanged(Step::Table)]);
    }

    #[test]
    fn next_stays_on_details_with_field_errors() {
        let mut session = filled();
        session.form.summary = "short".to_owned();
        let events = session.dispatch(SessionCommand::Next);
        assert_eq!(session.step(), Step::Details);
        assert!(matches!(events.as_slice(), [SessionEvent::ValidationFailed(_)]));
        assert!(session.field_errors().for_field(Field::Summary).is_some());
    }

    #[test]
    fn back_from_table_keeps_fields() {
        let mut session = filled();
        session.dispatch(SessionCommand::Next);
        session.dispatch(SessionCommand::Back);
        assert_eq!(session.step(), Step::Details);
        assert_eq!(session.form.subject, "Inter-college Debate");
    }

    #[test]
    fn editor_requires_preview() {
        let mut session = filled();
        session.dispatch(SessionCommand::OpenEditor);
        assert_eq!(session.view(), PreviewView::Document);
        assert_eq!(session.status_line(), Some("generate a draft before editing"));
    }

    #[test]
    fn reset_clears_everything() {
        let mut session = filled();
        session.dispatch(SessionCommand::Next);
        let events = session.dispatch(SessionCommand::Reset);
        assert_eq!(session, NfaSession::new());
        assert_eq!(
            events,
            vec![SessionEvent::DraftReset, SessionEvent::StepChanged(Step::Details)]
        );
    }

    #[test]
    fn subject_line_is_extracted() {
        assert_eq!(
            subject_from_text("Subject: Chess Finals\n\nBody"),
            Some("Chess Finals")
        );
        assert_eq!(subject_from_text("No subject here"), None);
        assert_eq!(subject_from_text("Subject:   \nBody"), None);
    }
}
