// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    FinancialTable, HistoryDomain, HistoryEntry, HistoryEntryId, HistoryStatus, NewHistoryEntry,
    NfaFormInput, NfaType, SectionSettings,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub subject: String,
    pub summary: String,
    pub nfa_type: NfaType,
    pub bullets_required: bool,
    pub table: FinancialTable,
    pub sections: SectionSettings,
}

impl GenerateRequest {
    pub fn from_form(form: &NfaFormInput, table: &FinancialTable) -> Self {
        Self {
            subject: form.subject.trim().to_owned(),
            summary: form.summary.trim().to_owned(),
            nfa_type: form.nfa_type,
            bullets_required: form.bullets_required,
            table: table.clone(),
            sections: form.sections,
        }
    }

    pub fn to_form(&self) -> NfaFormInput {
        NfaFormInput {
            subject: self.subject.clone(),
            summary: self.summary.clone(),
            nfa_type: self.nfa_type,
            bullets_required: self.bullets_required,
            sections: self.sections,
        }
    }
}

/// Whole document in, whole document out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditRequest {
    pub text: String,
    pub prompt: String,
    pub subject: String,
    pub summary: String,
    pub nfa_type: NfaType,
    pub table: FinancialTable,
}

pub trait ContentGenerator {
    fn generate(&self, request: &GenerateRequest) -> Result<String>;

    fn edit(&self, request: &EditRequest) -> Result<String>;

    fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

pub trait DocumentRenderer {
    fn render(&self, text: &str, table: &FinancialTable, nfa_type: NfaType) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryQuery {
    pub term: Option<String>,
    pub date: Option<Date>,
}

impl HistoryQuery {
    pub fn is_empty(&self) -> bool {
        self.term.as_deref().is_none_or(|term| term.trim().is_empty()) && self.date.is_none()
    }

    /// Term matches subject or description; with both filters either may match.
    pub fn matches(&self, entry: &HistoryEntry) -> bool {
        if self.is_empty() {
            return true;
        }
        let term_hit = self
            .term
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .is_some_and(|term| {
                let term = term.to_lowercase();
                entry.subject.to_lowercase().contains(&term)
                    || entry.description.to_lowercase().contains(&term)
            });
        let date_hit = self.date.is_some_and(|date| entry.date == date);
        term_hit || date_hit
    }
}

pub trait HistoryStore {
    fn append(&self, entry: &NewHistoryEntry) -> Result<HistoryEntry>;

    /// Newest first.
    fn list(&self, domain: HistoryDomain) -> Result<Vec<HistoryEntry>>;

    fn search(&self, domain: HistoryDomain, query: &HistoryQuery) -> Result<Vec<HistoryEntry>> {
        Ok(self
            .list(domain)?
            .into_iter()
            .filter(|entry| query.matches(entry))
            .collect())
    }

    fn delete_by_id(&self, id: HistoryEntryId) -> Result<()>;

    fn update_status(&self, id: HistoryEntryId, status: HistoryStatus) -> Result<()>;

    /// Bumped by every write; pollers compare it to spot changes.
    fn revision(&self) -> Result<i64>;
}

/// Polls a store's revision counter on behalf of one view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryWatcher {
    seen: Option<i64>,
}

impl HistoryWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when the store changed since the previous poll (or on first poll).
    pub fn poll(&mut self, store: &dyn HistoryStore) -> Result<bool> {
        let current = store.revision()?;
        let changed = self.seen != Some(current);
        self.seen = Some(current);
        Ok(changed)
    }
}
