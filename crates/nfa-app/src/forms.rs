// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{
    DocumentSection, Field, FinancialTable, NfaType, SectionSettings, ValidationErrors,
};

pub const MIN_SUMMARY_CHARS: usize = 50;
pub const WORD_LIMIT_RANGE: std::ops::RangeInclusive<u32> = 1..=1000;
pub const BULLET_COUNT_RANGE: std::ops::RangeInclusive<u32> = 0..=10;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NfaFormInput {
    pub subject: String,
    pub summary: String,
    pub nfa_type: NfaType,
    pub bullets_required: bool,
    pub sections: SectionSettings,
}

impl NfaFormInput {
    /// Checks the fields gating the Details step.
    pub fn validate_details(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if self.subject.trim().is_empty() {
            errors.push(Field::Subject, "subject is required -- enter a subject and retry");
        }
        let summary_chars = self.summary.trim().chars().count();
        if summary_chars == 0 {
            errors.push(Field::Summary, "summary is required -- describe the request and retry");
        } else if summary_chars < MIN_SUMMARY_CHARS {
            errors.push(
                Field::Summary,
                format!(
                    "summary must be at least {MIN_SUMMARY_CHARS} characters (currently {summary_chars})"
                ),
            );
        }
        errors.into_result()
    }

    pub fn validate_sections(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        for section in DocumentSection::ALL {
            let setting = self.sections.get(section);
            if !WORD_LIMIT_RANGE.contains(&setting.word_limit) {
                errors.push(
                    Field::Section,
                    format!(
                        "{} word limit must be between {} and {}",
                        section.label(),
                        WORD_LIMIT_RANGE.start(),
                        WORD_LIMIT_RANGE.end()
                    ),
                );
            }
            if !BULLET_COUNT_RANGE.contains(&setting.bullet_count) {
                errors.push(
                    Field::Section,
                    format!(
                        "{} bullet count must be at most {}",
                        section.label(),
                        BULLET_COUNT_RANGE.end()
                    ),
                );
            }
        }
        errors.into_result()
    }

    /// Everything required before the generator is called.
    pub fn validate_for_generation(&self, table: &FinancialTable) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        for result in [
            self.validate_details(),
            self.validate_sections(),
            validate_table(table),
        ] {
            if let Err(found) = result {
                for error in found.iter() {
                    errors.push(error.field, error.message.clone());
                }
            }
        }
        errors.into_result()
    }
}

pub fn validate_table(table: &FinancialTable) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    if table.headers().is_empty() && !table.rows().is_empty() {
        errors.push(Field::Table, "table rows need at least one column header");
    }
    if table.headers().iter().any(|header| header.trim().is_empty()) {
        errors.push(Field::Table, "column headers cannot be blank -- name every column");
    }
    errors.into_result()
}

pub fn validate_prompt(prompt: &str) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    if prompt.trim().is_empty() {
        errors.push(Field::Prompt, "edit instruction is required -- describe the change");
    }
    errors.into_result()
}

#[cfg(test)]
mod tests {
    use super::{NfaFormInput, validate_prompt, validate_table};
    use crate::{Field, FinancialTable};

    fn valid_form() -> NfaFormInput {
        NfaFormInput {
            subject: "Robotics Workshop".to_owned(),
            summary: "A two day robotics workshop for second year engineering students."
                .to_owned(),
            ..NfaFormInput::default()
        }
    }

    #[test]
    fn details_accept_valid_form() {
        assert!(valid_form().validate_details().is_ok());
    }

    #[test]
    fn short_summary_is_flagged_on_summary_field() {
        let form = NfaFormInput {
            summary: "too short".to_owned(),
            ..valid_form()
        };
        let errors = form.validate_details().expect_err("short summary rejected");
        assert_eq!(errors.len(), 1);
        assert!(
            errors
                .for_field(Field::Summary)
                .is_some_and(|message| message.contains("at least 50"))
        );
    }

    #[test]
    fn summary_length_ignores_surrounding_whitespace() {
        let form = NfaFormInput {
            summary: format!("   {}   ", "a".repeat(49)),
            ..valid_form()
        };
        assert!(form.validate_details().is_err());
    }

    #[test]
    fn empty_form_reports_both_fields() {
        let errors = NfaFormInput::default()
            .validate_details()
            .expect_err("empty form rejected");
        assert!(errors.for_field(Field::Subject).is_some());
        assert!(errors.for_field(Field::Summary).is_some());
    }

    #[test]
    fn section_limits_are_bounded() {
        let mut form = valid_form();
        form.sections.proposal.word_limit = 0;
        form.sections.background.bullet_count = 11;
        let errors = form.validate_sections().expect_err("bad sections");
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn blank_headers_are_rejected() {
        let mut table = FinancialTable::new(["Item", "Cost"]);
        table.rename_header(1, "  ").expect("rename");
        assert!(validate_table(&table).is_err());
        assert!(validate_table(&FinancialTable::default()).is_ok());
    }

    #[test]
    fn prompt_must_not_be_blank() {
        assert!(validate_prompt("  ").is_err());
        assert!(validate_prompt("make it shorter").is_ok());
    }
}
