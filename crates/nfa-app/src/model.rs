// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::ids::*;

pub const DESCRIPTION_MAX_CHARS: usize = 100;

const ADVANCE_CLOSING: &str = "The above proposal is submitted for approval, and the advance amount may kindly be released to the organizing committee to conduct the event smoothly.";
const REIMBURSEMENT_CLOSING: &str = "The above proposal is submitted for approval, and the amount may kindly be reimbursed to the organizing committee after the event upon submission of the online report, receipts, and GST bills.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NfaType {
    #[default]
    Reimbursement,
    Advance,
}

impl NfaType {
    pub const ALL: [Self; 2] = [Self::Reimbursement, Self::Advance];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reimbursement => "reimbursement",
            Self::Advance => "advance",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "reimbursement" => Some(Self::Reimbursement),
            "advance" => Some(Self::Advance),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Reimbursement => "Reimbursement",
            Self::Advance => "Advance",
        }
    }

    pub const fn closing_sentence(self) -> &'static str {
        match self {
            Self::Reimbursement => REIMBURSEMENT_CLOSING,
            Self::Advance => ADVANCE_CLOSING,
        }
    }

    pub const fn toggled(self) -> Self {
        match self {
            Self::Reimbursement => Self::Advance,
            Self::Advance => Self::Reimbursement,
        }
    }
}

/// True only for one of the standard closing sentences, verbatim.
pub fn is_closing_sentence(line: &str) -> bool {
    let line = line.trim();
    NfaType::ALL
        .iter()
        .any(|nfa_type| nfa_type.closing_sentence() == line)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Completed,
}

impl HistoryStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    pub const fn next(self) -> Self {
        match self {
            Self::Pending => Self::Approved,
            Self::Approved => Self::Rejected,
            Self::Rejected | Self::Completed => Self::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryDomain {
    Nfa,
    JobRecommendation,
    MsRecommendation,
}

impl HistoryDomain {
    pub const ALL: [Self; 3] = [Self::Nfa, Self::JobRecommendation, Self::MsRecommendation];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Nfa => "nfa",
            Self::JobRecommendation => "job_recommendation",
            Self::MsRecommendation => "ms_recommendation",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "nfa" | "nfaHistory" => Some(Self::Nfa),
            "job_recommendation" | "jobRecommendationHistory" => Some(Self::JobRecommendation),
            "ms_recommendation" | "msRecommendationHistory" => Some(Self::MsRecommendation),
            _ => None,
        }
    }

    /// Fixed storage name used by browser exports of this domain.
    pub const fn storage_key(self) -> &'static str {
        match self {
            Self::Nfa => "nfaHistory",
            Self::JobRecommendation => "jobRecommendationHistory",
            Self::MsRecommendation => "msRecommendationHistory",
        }
    }

    pub const fn default_status(self) -> HistoryStatus {
        match self {
            Self::Nfa => HistoryStatus::Pending,
            Self::JobRecommendation | Self::MsRecommendation => HistoryStatus::Completed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentSection {
    Proposal,
    Background,
    Recommendation,
}

impl DocumentSection {
    pub const ALL: [Self; 3] = [Self::Proposal, Self::Background, Self::Recommendation];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Proposal => "proposal",
            Self::Background => "background",
            Self::Recommendation => "recommendation",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionSetting {
    pub word_limit: u32,
    pub bullet_count: u32,
    pub add_header: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionSettings {
    pub proposal: SectionSetting,
    pub background: SectionSetting,
    pub recommendation: SectionSetting,
}

impl Default for SectionSettings {
    fn default() -> Self {
        Self {
            proposal: SectionSetting {
                word_limit: 150,
                bullet_count: 2,
                add_header: true,
            },
            background: SectionSetting {
                word_limit: 150,
                bullet_count: 2,
                add_header: true,
            },
            recommendation: SectionSetting {
                word_limit: 100,
                bullet_count: 1,
                add_header: true,
            },
        }
    }
}

impl SectionSettings {
    pub fn get(&self, section: DocumentSection) -> &SectionSetting {
        match section {
            DocumentSection::Proposal => &self.proposal,
            DocumentSection::Background => &self.background,
            DocumentSection::Recommendation => &self.recommendation,
        }
    }

    pub fn get_mut(&mut self, section: DocumentSection) -> &mut SectionSetting {
        match section {
            DocumentSection::Proposal => &mut self.proposal,
            DocumentSection::Background => &mut self.background,
            DocumentSection::Recommendation => &mut self.recommendation,
        }
    }
}

/// Where the current draft text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextOrigin {
    Generated,
    Fallback,
    History,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditTurn {
    pub id: EditTurnId,
    pub prompt: String,
    pub result_text: String,
    pub created_at: OffsetDateTime,
    pub error: Option<String>,
}

impl EditTurn {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: HistoryEntryId,
    pub domain: HistoryDomain,
    pub subject: String,
    #[serde(rename = "type")]
    pub nfa_type: Option<NfaType>,
    pub status: HistoryStatus,
    #[serde(with = "iso_date")]
    pub date: Date,
    #[serde(rename = "amount")]
    pub total_amount: String,
    pub description: String,
    #[serde(rename = "filePath")]
    pub file_ref: Option<String>,
    #[serde(rename = "nfaText")]
    pub full_text: Option<String>,
    #[serde(rename = "fallbackMode")]
    pub fallback: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewHistoryEntry {
    pub domain: HistoryDomain,
    pub subject: String,
    pub nfa_type: Option<NfaType>,
    pub status: HistoryStatus,
    pub date: Date,
    pub total_amount: String,
    pub description: String,
    pub file_ref: Option<String>,
    pub full_text: Option<String>,
    pub fallback: bool,
}

/// Cuts a summary down to the history description length.
pub fn summarize_description(summary: &str) -> String {
    let trimmed = summary.trim();
    if trimmed.chars().count() <= DESCRIPTION_MAX_CHARS {
        return trimmed.to_owned();
    }
    let mut out: String = trimmed.chars().take(DESCRIPTION_MAX_CHARS).collect();
    out.push_str("...");
    out
}

/// `NFA_<type>_<subject>.docx` with path-hostile characters replaced.
pub fn document_file_name(subject: &str, nfa_type: NfaType) -> String {
    let subject = if subject.trim().is_empty() {
        "NFA_Request"
    } else {
        subject.trim()
    };
    let sanitized: String = subject
        .chars()
        .map(|ch| match ch {
            ' ' | '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            ch if ch.is_control() => '_',
            ch => ch,
        })
        .take(60)
        .collect();
    format!("NFA_{}_{}.docx", nfa_type.as_str(), sanitized)
}

#[cfg(test)]
mod tests {
    use super::{
        HistoryDomain, HistoryStatus, NfaType, SectionSettings, document_file_name,
        is_closing_sentence, summarize_description,
    };

    #[test]
    fn nfa_type_round_trips_through_wire_names() {
        for nfa_type in NfaType::ALL {
            assert_eq!(NfaType::parse(nfa_type.as_str()), Some(nfa_type));
        }
        assert_eq!(NfaType::parse(" Advance "), Some(NfaType::Advance));
        assert_eq!(NfaType::parse("grant"), None);
    }

    #[test]
    fn closing_sentences_differ_by_type() {
        assert!(NfaType::Advance.closing_sentence().contains("released"));
        assert!(NfaType::Reimbursement.closing_sentence().contains("reimbursed"));
        assert!(is_closing_sentence(NfaType::Advance.closing_sentence()));
        assert!(is_closing_sentence(&format!(
            "  {}",
            NfaType::Reimbursement.closing_sentence()
        )));
        assert!(!is_closing_sentence(
            "We request your approval to sanction the amount for chess sets."
        ));
        assert!(!is_closing_sentence("The above proposal is submitted for approval."));
    }

    #[test]
    fn status_cycle_covers_review_states() {
        assert_eq!(HistoryStatus::Pending.next(), HistoryStatus::Approved);
        assert_eq!(HistoryStatus::Approved.next(), HistoryStatus::Rejected);
        assert_eq!(HistoryStatus::Rejected.next(), HistoryStatus::Pending);
    }

    #[test]
    fn domains_accept_storage_keys() {
        for domain in HistoryDomain::ALL {
            assert_eq!(HistoryDomain::parse(domain.storage_key()), Some(domain));
            assert_eq!(HistoryDomain::parse(domain.as_str()), Some(domain));
        }
    }

    #[test]
    fn section_defaults_match_form_defaults() {
        let settings = SectionSettings::default();
        assert_eq!(settings.proposal.word_limit, 150);
        assert_eq!(settings.recommendation.word_limit, 100);
        assert_eq!(settings.recommendation.bullet_count, 1);
        assert!(settings.background.add_header);
    }

    #[test]
    fn description_is_cut_with_ellipsis() {
        let long = "x".repeat(140);
        let description = summarize_description(&long);
        assert_eq!(description.chars().count(), 103);
        assert!(description.ends_with("..."));
        assert_eq!(summarize_description("  short  "), "short");
    }

    #[test]
    fn file_name_replaces_hostile_characters() {
        assert_eq!(
            document_file_name("Chess Tournament: Funding?", NfaType::Advance),
            "NFA_advance_Chess_Tournament__Funding_.docx"
        );
        assert_eq!(
            document_file_name("", NfaType::Reimbursement),
            "NFA_reimbursement_NFA_Request.docx"
        );
    }
}
