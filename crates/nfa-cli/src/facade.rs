// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::api::{
    DownloadBody, DownloadResponse, EditBody, EditResponse, ErrorResponse, GenerateBody,
    GenerateResponse, HistoryEntryResponse, HistoryListResponse, NewHistoryBody,
    RevisionResponse, StatusBody, parse_iso_date, table_from_value, today,
};
use anyhow::{Context, Result};
use nfa_app::{
    ContentGenerator, DocumentRenderer, HistoryDomain, HistoryEntryId, HistoryQuery,
    HistoryStatus, HistoryStore, document_file_name, fallback_text,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};

pub const FALLBACK_MESSAGE: &str = "Generated in fallback mode -- AI generator unavailable";
pub const GENERATED_MESSAGE: &str = "NFA generated";
pub const DOCUMENTS_ROUTE: &str = "/generated_letters/nfa";
pub const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
    Options,
    Other,
}

impl Method {
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "GET" => Self::Get,
            "POST" => Self::Post,
            "DELETE" => Self::Delete,
            "OPTIONS" => Self::Options,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl ApiRequest {
    /// Splits a request target such as `/api/history?q=chess` into path and query.
    pub fn new(method: Method, target: &str, body: Vec<u8>) -> Result<Self> {
        let parsed = url::Url::parse("http://facade.local")
            .and_then(|base| base.join(target))
            .with_context(|| format!("parse request target {target:?}"))?;
        Ok(Self {
            method,
            path: parsed.path().to_owned(),
            query: parsed
                .query_pairs()
                .map(|(key, value)| (key.into_owned(), value.into_owned()))
                .collect(),
            body,
        })
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
            .filter(|value| !value.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
    /// File name offered to the browser for downloads.
    pub attachment: Option<String>,
}

impl ApiResponse {
    pub fn json<T: Serialize>(status: u16, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self {
                status,
                content_type: JSON_CONTENT_TYPE,
                body,
                attachment: None,
            },
            Err(error) => Self::error(
                500,
                ErrorResponse::new("internal_error", format!("encode response: {error}")),
            ),
        }
    }

    pub fn error(status: u16, body: ErrorResponse) -> Self {
        let body = serde_json::to_vec(&body).unwrap_or_else(|_| {
            br#"{"success":false,"error":"internal error","code":"internal_error"}"#.to_vec()
        });
        Self {
            status,
            content_type: JSON_CONTENT_TYPE,
            body,
            attachment: None,
        }
    }

    fn no_content() -> Self {
        Self {
            status: 204,
            content_type: JSON_CONTENT_TYPE,
            body: Vec::new(),
            attachment: None,
        }
    }

    fn not_found(what: &str) -> Self {
        Self::error(404, ErrorResponse::new("not_found", format!("{what} not found")))
    }

    fn method_not_allowed(path: &str) -> Self {
        Self::error(
            405,
            ErrorResponse::new("method_not_allowed", format!("method not allowed on {path}")),
        )
    }

    fn bad_request(error: impl Into<String>) -> Self {
        Self::error(400, ErrorResponse::new("bad_request", error))
    }

    fn storage_error(error: &anyhow::Error) -> Self {
        warn!(error = %format!("{error:#}"), "history store failed");
        Self::error(500, ErrorResponse::new("storage_error", format!("{error:#}")))
    }
}

/// Maps facade routes onto the collaborators. Holds no draft state.
pub struct Facade<'a> {
    generator: &'a dyn ContentGenerator,
    renderer: Option<&'a dyn DocumentRenderer>,
    history: &'a dyn HistoryStore,
    output_dir: PathBuf,
}

impl<'a> Facade<'a> {
    pub fn new(
        generator: &'a dyn ContentGenerator,
        renderer: Option<&'a dyn DocumentRenderer>,
        history: &'a dyn HistoryStore,
        output_dir: PathBuf,
    ) -> Self {
        Self {
            generator,
            renderer,
            history,
            output_dir,
        }
    }

    pub fn handle(&self, request: &ApiRequest) -> ApiResponse {
        let segments: Vec<&str> = request
            .path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect();
        let method = request.method;
        if method == Method::Options {
            return ApiResponse::no_content();
        }

        match segments.as_slice() {
            ["api", "generate-nfa"] => match method {
                Method::Post => self.generate(request),
                _ => ApiResponse::method_not_allowed(&request.path),
            },
            ["api", "edit-nfa"] => match method {
                Method::Post => self.edit(request),
                _ => ApiResponse::method_not_allowed(&request.path),
            },
            ["api", "download-edited-nfa"] => match method {
                Method::Post => self.download(request),
                _ => ApiResponse::method_not_allowed(&request.path),
            },
            ["api", "health"] => match method {
                Method::Get => self.health(),
                _ => ApiResponse::method_not_allowed(&request.path),
            },
            ["api", "history"] => match method {
                Method::Get => self.list_history(request),
                Method::Post => self.add_history(request),
                _ => ApiResponse::method_not_allowed(&request.path),
            },
            ["api", "history", "revision"] => match method {
                Method::Get => self.revision(),
                _ => ApiResponse::method_not_allowed(&request.path),
            },
            ["api", "history", id] => match method {
                Method::Delete => self.delete_history(id),
                _ => ApiResponse::method_not_allowed(&request.path),
            },
            ["api", "history", id, "status"] => match method {
                Method::Post => self.update_status(id, request),
                _ => ApiResponse::method_not_allowed(&request.path),
            },
            ["generated_letters", "nfa", file] => match method {
                Method::Get => self.serve_document(file),
                _ => ApiResponse::method_not_allowed(&request.path),
            },
            _ => ApiResponse::not_found(&format!("route {}", request.path)),
        }
    }

    fn generate(&self, request: &ApiRequest) -> ApiResponse {
        let body: GenerateBody = match parse_body(request) {
            Ok(body) => body,
            Err(response) => return response,
        };
        let generate = match body.to_request() {
            Ok(generate) => generate,
            Err(errors) => return ApiResponse::error(400, ErrorResponse::validation(&errors)),
        };

        let generated = match self.generator.generate(&generate) {
            Ok(text) if !text.trim().is_empty() => Some(text),
            Ok(_) => {
                warn!(subject = %generate.subject, "content generator returned empty text, using fallback");
                None
            }
            Err(error) => {
                warn!(
                    subject = %generate.subject,
                    error = %format!("{error:#}"),
                    "content generator failed, using fallback"
                );
                None
            }
        };

        let response = match generated {
            Some(text) => {
                let file = self.render_to_disk(&text, &generate.table, generate.nfa_type, &generate.subject);
                GenerateResponse {
                    success: true,
                    nfa_text: text,
                    file,
                    fallback: false,
                    message: GENERATED_MESSAGE.to_owned(),
                }
            }
            None => GenerateResponse {
                success: true,
                nfa_text: fallback_text(&generate.to_form()),
                file: None,
                fallback: true,
                message: FALLBACK_MESSAGE.to_owned(),
            },
        };
        info!(subject = %generate.subject, fallback = response.fallback, "generate handled");
        ApiResponse::json(200, &response)
    }

    /// Best effort: a generated note is still returned when its document cannot be written.
    fn render_to_disk(
        &self,
        text: &str,
        table: &nfa_app::FinancialTable,
        nfa_type: nfa_app::NfaType,
        subject: &str,
    ) -> Option<String> {
        let renderer = self.renderer?;
        let file_name = document_file_name(subject, nfa_type);
        let written = renderer
            .render(text, table, nfa_type)
            .and_then(|bytes| self.write_document(&file_name, &bytes));
        match written {
            Ok(()) => Some(format!("{DOCUMENTS_ROUTE}/{file_name}")),
            Err(error) => {
                warn!(file = %file_name, error = %format!("{error:#}"), "could not write generated document");
                None
            }
        }
    }

    fn edit(&self, request: &ApiRequest) -> ApiResponse {
        let body: EditBody = match parse_body(request) {
            Ok(body) => body,
            Err(response) => return response,
        };
        let edit = match body.to_request() {
            Ok(edit) => edit,
            Err(errors) => return ApiResponse::error(400, ErrorResponse::validation(&errors)),
        };

        let outcome = self.generator.edit(&edit).and_then(|text| match text.trim() {
            "" => anyhow::bail!("content generator returned an empty document"),
            _ => Ok(text),
        });
        match outcome {
            Ok(text) => {
                info!(prompt_chars = edit.prompt.chars().count(), "edit applied");
                ApiResponse::json(
                    200,
                    &EditResponse {
                        success: true,
                        edited_text: text,
                    },
                )
            }
            Err(error) => {
                let message = format!("{error:#}");
                warn!(error = %message, "edit failed, returning original text");
                ApiResponse::error(
                    502,
                    ErrorResponse {
                        edited_text: Some(edit.text),
                        ..ErrorResponse::new("edit_failed", format!("edit failed: {message}"))
                    },
                )
            }
        }
    }

    fn download(&self, request: &ApiRequest) -> ApiResponse {
        let body: DownloadBody = match parse_body(request) {
            Ok(body) => body,
            Err(response) => return response,
        };
        if body.edited_text.trim().is_empty() {
            return ApiResponse::error(
                400,
                ErrorResponse::new(
                    "validation_error",
                    "editedText is required -- generate a note before downloading",
                ),
            );
        }
        let table = match table_from_value(body.table_data.as_ref()) {
            Ok(table) => table,
            Err(errors) => return ApiResponse::error(400, ErrorResponse::validation(&errors)),
        };
        let Some(renderer) = self.renderer else {
            debug!("rendering disabled, download answered in fallback mode");
            return ApiResponse::json(
                200,
                &DownloadResponse {
                    success: true,
                    file_path: None,
                    file_name: None,
                    note: Some(
                        "document rendering is disabled on this server -- copy the text instead"
                            .to_owned(),
                    ),
                },
            );
        };

        let nfa_type = body.nfa_type();
        let file_name = document_file_name(&body.subject, nfa_type);
        let written = renderer
            .render(&body.edited_text, &table, nfa_type)
            .and_then(|bytes| self.write_document(&file_name, &bytes));
        match written {
            Ok(()) => {
                info!(file = %file_name, "document rendered");
                ApiResponse::json(
                    200,
                    &DownloadResponse {
                        success: true,
                        file_path: Some(format!("{DOCUMENTS_ROUTE}/{file_name}")),
                        file_name: Some(file_name),
                        note: None,
                    },
                )
            }
            Err(error) => {
                let message = format!("{error:#}");
                warn!(file = %file_name, error = %message, "document rendering failed");
                ApiResponse::error(
                    500,
                    ErrorResponse::new("render_error", format!("document rendering failed: {message}")),
                )
            }
        }
    }

    fn write_document(&self, file_name: &str, bytes: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("create output directory {}", self.output_dir.display()))?;
        let path = self.output_dir.join(file_name);
        fs::write(&path, bytes).with_context(|| format!("write document {}", path.display()))
    }

    fn health(&self) -> ApiResponse {
        let generator = match self.generator.health_check() {
            Ok(()) => "ok",
            Err(error) => {
                debug!(error = %format!("{error:#}"), "generator health check failed");
                "unavailable"
            }
        };
        ApiResponse::json(200, &json!({ "success": true, "generator": generator }))
    }

    fn list_history(&self, request: &ApiRequest) -> ApiResponse {
        let domain = match request.query_value("domain") {
            None => HistoryDomain::Nfa,
            Some(raw) => match HistoryDomain::parse(raw) {
                Some(domain) => domain,
                None => return ApiResponse::bad_request(format!("unknown history domain {raw:?}")),
            },
        };
        let date = match request.query_value("date") {
            None => None,
            Some(raw) => match parse_iso_date(raw) {
                Some(date) => Some(date),
                None => return ApiResponse::bad_request(format!("date {raw:?} must be YYYY-MM-DD")),
            },
        };
        let query = HistoryQuery {
            term: request.query_value("q").map(str::to_owned),
            date,
        };
        match self.history.search(domain, &query) {
            Ok(entries) => ApiResponse::json(
                200,
                &HistoryListResponse {
                    success: true,
                    entries,
                },
            ),
            Err(error) => ApiResponse::storage_error(&error),
        }
    }

    fn add_history(&self, request: &ApiRequest) -> ApiResponse {
        let body: NewHistoryBody = match parse_body(request) {
            Ok(body) => body,
            Err(response) => return response,
        };
        let entry = match body.into_entry(today()) {
            Ok(entry) => entry,
            Err(message) => return ApiResponse::bad_request(message),
        };
        match self.history.append(&entry) {
            Ok(entry) => {
                info!(id = %entry.id, domain = entry.domain.as_str(), "history entry added");
                ApiResponse::json(
                    201,
                    &HistoryEntryResponse {
                        success: true,
                        entry,
                    },
                )
            }
            Err(error) => ApiResponse::storage_error(&error),
        }
    }

    fn delete_history(&self, raw_id: &str) -> ApiResponse {
        let id = match self.existing_id(raw_id) {
            Ok(id) => id,
            Err(response) => return response,
        };
        match self.history.delete_by_id(id) {
            Ok(()) => {
                info!(id = %id, "history entry deleted");
                ApiResponse::json(200, &json!({ "success": true }))
            }
            Err(error) => ApiResponse::storage_error(&error),
        }
    }

    fn update_status(&self, raw_id: &str, request: &ApiRequest) -> ApiResponse {
        let id = match self.existing_id(raw_id) {
            Ok(id) => id,
            Err(response) => return response,
        };
        let body: StatusBody = match parse_body(request) {
            Ok(body) => body,
            Err(response) => return response,
        };
        let Some(status) = HistoryStatus::parse(&body.status) else {
            return ApiResponse::bad_request(format!(
                "unknown status {:?} -- use pending, approved, rejected or completed",
                body.status
            ));
        };
        match self.history.update_status(id, status) {
            Ok(()) => {
                info!(id = %id, status = status.as_str(), "history status updated");
                ApiResponse::json(200, &json!({ "success": true, "status": status.as_str() }))
            }
            Err(error) => ApiResponse::storage_error(&error),
        }
    }

    fn existing_id(&self, raw_id: &str) -> Result<HistoryEntryId, ApiResponse> {
        let id = raw_id
            .parse::<i64>()
            .map(HistoryEntryId::new)
            .map_err(|_| ApiResponse::bad_request(format!("history id {raw_id:?} is not a number")))?;
        for domain in HistoryDomain::ALL {
            let entries = self
                .history
                .list(domain)
                .map_err(|error| ApiResponse::storage_error(&error))?;
            if entries.iter().any(|entry| entry.id == id) {
                return Ok(id);
            }
        }
        Err(ApiResponse::not_found(&format!("history entry {id}")))
    }

    fn revision(&self) -> ApiResponse {
        match self.history.revision() {
            Ok(revision) => ApiResponse::json(
                200,
                &RevisionResponse {
                    success: true,
                    revision,
                },
            ),
            Err(error) => ApiResponse::storage_error(&error),
        }
    }

    fn serve_document(&self, file_name: &str) -> ApiResponse {
        if file_name.is_empty()
            || file_name.starts_with('.')
            || file_name.contains(['/', '\\'])
            || file_name.contains("..")
        {
            return ApiResponse::bad_request(format!("invalid document name {file_name:?}"));
        }
        let path = self.output_dir.join(file_name);
        match fs::read(&path) {
            Ok(body) => ApiResponse {
                status: 200,
                content_type: DOCX_CONTENT_TYPE,
                body,
                attachment: Some(file_name.to_owned()),
            },
            Err(error) => {
                debug!(path = %path.display(), error = %error, "document not served");
                ApiResponse::not_found(&format!("document {file_name}"))
            }
        }
    }
}

fn parse_body<T: DeserializeOwned>(request: &ApiRequest) -> Result<T, ApiResponse> {
    let raw: &[u8] = if request.body.iter().all(u8::is_ascii_whitespace) {
        b"{}"
    } else {
        &request.body
    };
    serde_json::from_slice(raw).map_err(|error| {
        ApiResponse::error(
            400,
            ErrorResponse::new("invalid_json", format!("request body is not valid JSON: {error}")),
        )
    })
}
