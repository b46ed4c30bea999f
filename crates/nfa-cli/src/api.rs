// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Request and response bodies of the HTTP facade.

use nfa_app::{
    EditRequest, Field, FinancialTable, GenerateRequest, HistoryDomain, HistoryEntry,
    HistoryStatus, NewHistoryEntry, NfaFormInput, NfaType, SectionSettings, ValidationErrors,
    summarize_description, validate_prompt,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerateBody {
    pub subject: String,
    pub summary: String,
    pub nfa_type: Option<String>,
    #[serde(alias = "needBullets")]
    pub bullets_required: bool,
    pub table_data: Option<Value>,
    pub sections: Option<SectionSettings>,
}

impl GenerateBody {
    pub fn form(&self) -> NfaFormInput {
        NfaFormInput {
            subject: self.subject.clone(),
            summary: self.summary.clone(),
            nfa_type: parse_nfa_type(self.nfa_type.as_deref()),
            bullets_required: self.bullets_required,
            sections: self.sections.unwrap_or_default(),
        }
    }

    pub fn to_request(&self) -> Result<GenerateRequest, ValidationErrors> {
        let table = table_from_value(self.table_data.as_ref())?;
        let form = self.form();
        form.validate_for_generation(&table)?;
        Ok(GenerateRequest::from_form(&form, &table))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditBody {
    pub text: String,
    pub prompt: String,
    pub subject: String,
    pub summary: String,
    pub nfa_type: Option<String>,
    pub table_data: Option<Value>,
}

impl EditBody {
    pub fn to_request(&self) -> Result<EditRequest, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if self.text.trim().is_empty() {
            errors.push(Field::Prompt, "there is no document text to edit -- generate a note first");
        }
        if let Err(prompt_errors) = validate_prompt(&self.prompt) {
            for error in prompt_errors.iter() {
                errors.push(error.field, error.message.clone());
            }
        }
        let table = match table_from_value(self.table_data.as_ref()) {
            Ok(table) => table,
            Err(table_errors) => {
                for error in table_errors.iter() {
                    errors.push(error.field, error.message.clone());
                }
                FinancialTable::default()
            }
        };
        errors.into_result()?;
        Ok(EditRequest {
            text: self.text.clone(),
            prompt: self.prompt.trim().to_owned(),
            subject: self.subject.trim().to_owned(),
            summary: self.summary.trim().to_owned(),
            nfa_type: parse_nfa_type(self.nfa_type.as_deref()),
            table,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DownloadBody {
    #[serde(alias = "text")]
    pub edited_text: String,
    pub subject: String,
    pub summary: String,
    pub nfa_type: Option<String>,
    pub table_data: Option<Value>,
}

impl DownloadBody {
    pub fn nfa_type(&self) -> NfaType {
        parse_nfa_type(self.nfa_type.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusBody {
    pub status: String,
}

/// An entry posted by a client after generate or download.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewHistoryBody {
    pub domain: Option<String>,
    pub subject: String,
    #[serde(rename = "type")]
    pub nfa_type: Option<String>,
    pub status: Option<String>,
    pub date: Option<String>,
    pub amount: Option<String>,
    pub description: String,
    pub file_path: Option<String>,
    pub nfa_text: Option<String>,
    pub fallback_mode: bool,
}

impl NewHistoryBody {
    pub fn into_entry(self, today: Date) -> Result<NewHistoryEntry, String> {
        let domain = match self.domain.as_deref() {
            None => HistoryDomain::Nfa,
            Some(raw) => HistoryDomain::parse(raw)
                .ok_or_else(|| format!("unknown history domain {raw:?}"))?,
        };
        let status = match self.status.as_deref() {
            None => domain.default_status(),
            Some(raw) => HistoryStatus::parse(raw)
                .ok_or_else(|| format!("unknown history status {raw:?}"))?,
        };
        let date = match self.date.as_deref() {
            None => today,
            Some(raw) => parse_iso_date(raw)
                .ok_or_else(|| format!("history date {raw:?} must be YYYY-MM-DD"))?,
        };
        let nfa_type = match self.nfa_type.as_deref() {
            None => None,
            Some(raw) => Some(NfaType::parse(raw).ok_or_else(|| format!("unknown NFA type {raw:?}"))?),
        };
        if self.subject.trim().is_empty() {
            return Err("history entries need a subject".to_owned());
        }
        Ok(NewHistoryEntry {
            domain,
            subject: self.subject.trim().to_owned(),
            nfa_type,
            status,
            date,
            total_amount: self.amount.unwrap_or_else(|| "0".to_owned()),
            description: summarize_description(&self.description),
            file_ref: self.file_path.filter(|path| !path.trim().is_empty()),
            full_text: self.nfa_text.filter(|text| !text.trim().is_empty()),
            fallback: self.fallback_mode,
        })
    }
}

impl From<&NewHistoryEntry> for NewHistoryBody {
    fn from(entry: &NewHistoryEntry) -> Self {
        Self {
            domain: Some(entry.domain.as_str().to_owned()),
            subject: entry.subject.clone(),
            nfa_type: entry.nfa_type.map(|nfa_type| nfa_type.as_str().to_owned()),
            status: Some(entry.status.as_str().to_owned()),
            date: Some(format_iso_date(entry.date)),
            amount: Some(entry.total_amount.clone()),
            description: entry.description.clone(),
            file_path: entry.file_ref.clone(),
            nfa_text: entry.full_text.clone(),
            fallback_mode: entry.fallback,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub success: bool,
    pub nfa_text: String,
    pub file: Option<String>,
    pub fallback: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditResponse {
    pub success: bool,
    pub edited_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResponse {
    pub success: bool,
    pub file_path: Option<String>,
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryListResponse {
    pub success: bool,
    pub entries: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntryResponse {
    pub success: bool,
    pub entry: HistoryEntry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionResponse {
    pub success: bool,
    pub revision: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMessage {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FieldMessage>>,
    /// Set on edit failures: the text the client should keep showing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_text: Option<String>,
}

impl ErrorResponse {
    pub fn new(code: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            code: code.to_owned(),
            fields: None,
            edited_text: None,
        }
    }

    pub fn validation(errors: &ValidationErrors) -> Self {
        Self {
            fields: Some(
                errors
                    .iter()
                    .map(|error| FieldMessage {
                        field: error.field.as_str().to_owned(),
                        message: error.message.clone(),
                    })
                    .collect(),
            ),
            ..Self::new("validation_error", errors.to_string())
        }
    }
}

/// Unknown or missing types read as reimbursement.
pub fn parse_nfa_type(raw: Option<&str>) -> NfaType {
    raw.and_then(NfaType::parse).unwrap_or_default()
}

pub fn parse_iso_date(raw: &str) -> Option<Date> {
    Date::parse(raw.trim(), format_description!("[year]-[month]-[day]")).ok()
}

pub fn format_iso_date(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

pub fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

/// Reads `tableData` as a `[[headers..], [row..]]` grid or a `{headers, rows}` object.
pub fn table_from_value(value: Option<&Value>) -> Result<FinancialTable, ValidationErrors> {
    let invalid = |message: &str| {
        let mut errors = ValidationErrors::default();
        errors.push(Field::Table, message);
        errors
    };
    let table = match value {
        None | Some(Value::Null) => FinancialTable::default(),
        Some(Value::Array(records)) => {
            let grid = records
                .iter()
                .map(row_cells)
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| invalid("tableData rows must be arrays of text or numbers"))?;
            FinancialTable::from_grid(grid)
        }
        Some(Value::Object(object)) => {
            let headers = match object.get("headers") {
                Some(headers) => row_cells(headers)
                    .ok_or_else(|| invalid("tableData.headers must be an array of text"))?,
                None => Vec::new(),
            };
            let rows = match object.get("rows") {
                Some(Value::Array(rows)) => rows
                    .iter()
                    .map(row_cells)
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| invalid("tableData.rows must be arrays of text or numbers"))?,
                Some(Value::Null) | None => Vec::new(),
                Some(_) => return Err(invalid("tableData.rows must be an array")),
            };
            FinancialTable::from_parts(headers, rows)
        }
        Some(_) => return Err(invalid("tableData must be a grid or an object with headers and rows")),
    };
    nfa_app::validate_table(&table)?;
    Ok(table)
}

fn row_cells(value: &Value) -> Option<Vec<String>> {
    let Value::Array(cells) = value else {
        return None;
    };
    cells
        .iter()
        .map(|cell| match cell {
            Value::String(text) => Some(text.clone()),
            Value::Number(number) => Some(number.to_string()),
            Value::Bool(flag) => Some(flag.to_string()),
            Value::Null => Some(String::new()),
            Value::Array(_) | Value::Object(_) => None,
        })
        .collect()
}
