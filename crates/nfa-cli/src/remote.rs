// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Collaborators backed by a running HTTP facade, for `--remote`.

use crate::api::{
    DownloadResponse, EditResponse, ErrorResponse, GenerateResponse, HistoryEntryResponse,
    HistoryListResponse, NewHistoryBody, RevisionResponse, format_iso_date,
};
use anyhow::{Context, Result, anyhow, bail};
use nfa_app::{
    ContentGenerator, DocumentRenderer, EditRequest, FinancialTable, GenerateRequest,
    HistoryDomain, HistoryEntry, HistoryEntryId, HistoryQuery, HistoryStatus, HistoryStore,
    NewHistoryEntry, NfaType, Unreachable, subject_from_text,
};
use reqwest::blocking::{Client as HttpClient, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct FacadeClient {
    base_url: String,
    http: HttpClient,
}

impl FacadeClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_owned();
        let parsed = url::Url::parse(&base_url)
            .with_context(|| format!("--remote {base_url:?} is not a valid URL"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!("--remote {base_url:?} must be an http:// or https:// URL");
        }
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;
        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn send<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T> {
        let response = request
            .send()
            .map_err(|error| unreachable_error(&self.base_url, error))?;
        let status = response.status();
        let body = response
            .bytes()
            .with_context(|| format!("read {what} response"))?;
        if !status.is_success() {
            if let Ok(error) = serde_json::from_slice::<ErrorResponse>(&body) {
                bail!("{what} failed: {} ({})", error.error, error.code);
            }
            bail!("{what} failed: facade returned {}", status.as_u16());
        }
        serde_json::from_slice(&body).with_context(|| format!("decode {what} response"))
    }

    fn fetch_bytes(&self, path: &str) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(self.url(path))
            .send()
            .map_err(|error| unreachable_error(&self.base_url, error))?;
        let status = response.status();
        if !status.is_success() {
            bail!("download {path} failed: facade returned {}", status.as_u16());
        }
        let bytes = response
            .bytes()
            .with_context(|| format!("read document {path}"))?;
        Ok(bytes.to_vec())
    }
}

fn unreachable_error(base_url: &str, error: reqwest::Error) -> anyhow::Error {
    anyhow::Error::new(Unreachable::new(base_url)).context(format!(
        "cannot reach {base_url} -- check --remote and that `nfa-desk --serve` is running ({error})"
    ))
}

impl ContentGenerator for FacadeClient {
    /// Fallback answers are returned as errors so the session applies the
    /// same template locally and marks the draft accordingly.
    fn generate(&self, request: &GenerateRequest) -> Result<String> {
        let body = json!({
            "subject": request.subject,
            "summary": request.summary,
            "nfaType": request.nfa_type,
            "bulletsRequired": request.bullets_required,
            "tableData": request.table.to_grid(),
            "sections": request.sections,
        });
        let response: GenerateResponse = self.send(
            self.http.post(self.url("/api/generate-nfa")).json(&body),
            "generate",
        )?;
        if response.fallback {
            bail!("facade answered in fallback mode: {}", response.message);
        }
        debug!(chars = response.nfa_text.len(), "remote generate answered");
        Ok(response.nfa_text)
    }

    fn edit(&self, request: &EditRequest) -> Result<String> {
        let body = json!({
            "text": request.text,
            "prompt": request.prompt,
            "subject": request.subject,
            "summary": request.summary,
            "nfaType": request.nfa_type,
            "tableData": request.table.to_grid(),
        });
        let response: EditResponse =
            self.send(self.http.post(self.url("/api/edit-nfa")).json(&body), "edit")?;
        Ok(response.edited_text)
    }

    fn health_check(&self) -> Result<()> {
        let response: serde_json::Value =
            self.send(self.http.get(self.url("/api/health")), "health check")?;
        match response.get("success").and_then(serde_json::Value::as_bool) {
            Some(true) => Ok(()),
            _ => Err(anyhow!("health check failed: facade did not report success")),
        }
    }
}

impl DocumentRenderer for FacadeClient {
    fn render(&self, text: &str, table: &FinancialTable, nfa_type: NfaType) -> Result<Vec<u8>> {
        let body = json!({
            "editedText": text,
            "subject": subject_from_text(text).unwrap_or_default(),
            "nfaType": nfa_type,
            "tableData": table.to_grid(),
        });
        let response: DownloadResponse = self.send(
            self.http
                .post(self.url("/api/download-edited-nfa"))
                .json(&body),
            "download",
        )?;
        let Some(path) = response.file_path else {
            bail!(
                "facade did not render a document: {}",
                response.note.unwrap_or_else(|| "no reason given".to_owned())
            );
        };
        self.fetch_bytes(&path)
    }
}

impl HistoryStore for FacadeClient {
    fn append(&self, entry: &NewHistoryEntry) -> Result<HistoryEntry> {
        let response: HistoryEntryResponse = self.send(
            self.http
                .post(self.url("/api/history"))
                .json(&NewHistoryBody::from(entry)),
            "add history entry",
        )?;
        Ok(response.entry)
    }

    fn list(&self, domain: HistoryDomain) -> Result<Vec<HistoryEntry>> {
        self.search(domain, &HistoryQuery::default())
    }

    fn search(&self, domain: HistoryDomain, query: &HistoryQuery) -> Result<Vec<HistoryEntry>> {
        let mut params = vec![("domain", domain.as_str().to_owned())];
        if let Some(term) = query.term.as_deref().filter(|term| !term.trim().is_empty()) {
            params.push(("q", term.trim().to_owned()));
        }
        if let Some(date) = query.date {
            params.push(("date", format_iso_date(date)));
        }
        let response: HistoryListResponse = self.send(
            self.http.get(self.url("/api/history")).query(&params),
            "list history",
        )?;
        Ok(response.entries)
    }

    fn delete_by_id(&self, id: HistoryEntryId) -> Result<()> {
        let _: serde_json::Value = self.send(
            self.http.delete(self.url(&format!("/api/history/{id}"))),
            "delete history entry",
        )?;
        Ok(())
    }

    fn update_status(&self, id: HistoryEntryId, status: HistoryStatus) -> Result<()> {
        let _: serde_json::Value = self.send(
            self.http
                .post(self.url(&format!("/api/history/{id}/status")))
                .json(&json!({ "status": status.as_str() })),
            "update history status",
        )?;
        Ok(())
    }

    fn revision(&self) -> Result<i64> {
        let response: RevisionResponse = self.send(
            self.http.get(self.url("/api/history/revision")),
            "read history revision",
        )?;
        Ok(response.revision)
    }
}
