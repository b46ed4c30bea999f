// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod command;
mod prompt;

pub use command::*;
pub use prompt::*;

use anyhow::{Context, Result, anyhow, bail};
use nfa_app::{ContentGenerator, EditRequest, GenerateRequest};
use reqwest::StatusCode;
use reqwest::blocking::Client as HttpClient;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_TEMPERATURE: f32 = 0.5;
pub const DEFAULT_MAX_TOKENS: u32 = 300;
pub const EDIT_TEMPERATURE: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Per-call sampling knobs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sampling {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for Sampling {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

/// OpenAI-compatible chat completions client.
#[derive(Debug, Clone)]
pub struct Client {
    base_url: String,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            bail!("llm.base_url must not be empty");
        }
        url::Url::parse(&base_url)
            .with_context(|| format!("llm.base_url {base_url:?} is not a valid URL"))?;
        if model.trim().is_empty() {
            bail!("llm.model must not be empty");
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            model: model.trim().to_owned(),
            api_key: None,
            timeout,
            http,
        })
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|key| !key.trim().is_empty());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn list_models(&self) -> Result<Vec<String>> {
        let response = self
            .authorize(self.http.get(format!("{}/models", self.base_url)))
            .send()
            .map_err(|error| connection_error(&self.base_url, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }

        let parsed: ModelsResponse = response.json().context("decode model list")?;
        Ok(parsed.data.into_iter().map(|model| model.id).collect())
    }

    pub fn ping(&self) -> Result<()> {
        let models = self.list_models()?;
        let exists = models
            .iter()
            .any(|name| name == &self.model || name.starts_with(&format!("{}:", self.model)));
        if !exists {
            bail!(
                "model {:?} not offered by {} -- set [llm].model to one of: {}",
                self.model,
                self.base_url,
                models.join(", ")
            );
        }
        Ok(())
    }

    pub fn chat_complete(&self, messages: &[Message], sampling: Sampling) -> Result<String> {
        let request = ChatRequest::new(&self.model, messages, sampling);
        debug!(model = %self.model, messages = messages.len(), "chat completion request");
        let response = self
            .authorize(self.http.post(format!("{}/chat/completions", self.base_url)))
            .json(&request)
            .send()
            .map_err(|error| connection_error(&self.base_url, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }

        let parsed: ChatCompletionResponse = response.json().context("decode chat response")?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("no choices in chat response"))?;
        Ok(content)
    }

    fn authorize(
        &self,
        request: reqwest::blocking::RequestBuilder,
    ) -> reqwest::blocking::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

/// `ContentGenerator` backed by a chat completions endpoint.
#[derive(Debug, Clone)]
pub struct LlmGenerator {
    client: Client,
    sampling: Sampling,
}

impl LlmGenerator {
    pub fn new(client: Client, sampling: Sampling) -> Self {
        Self { client, sampling }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

impl ContentGenerator for LlmGenerator {
    fn generate(&self, request: &GenerateRequest) -> Result<String> {
        let messages = [
            Message::system(GENERATE_SYSTEM_PROMPT),
            Message::user(build_generate_prompt(request)),
        ];
        let raw = self
            .client
            .chat_complete(&messages, self.sampling)
            .context("generate NFA text")?;
        if raw.trim().is_empty() {
            bail!("model returned an empty document");
        }
        info!(subject = %request.subject, chars = raw.len(), "generated NFA text");
        Ok(normalize_document(&raw, &request.subject, request.nfa_type))
    }

    fn edit(&self, request: &EditRequest) -> Result<String> {
        let messages = [
            Message::system(EDIT_SYSTEM_PROMPT),
            Message::user(build_edit_prompt(request)),
        ];
        let sampling = Sampling {
            temperature: EDIT_TEMPERATURE,
            max_tokens: self.sampling.max_tokens.max(edit_token_budget(&request.text)),
        };
        let raw = self
            .client
            .chat_complete(&messages, sampling)
            .context("apply edit")?;
        if raw.trim().is_empty() {
            bail!("model returned an empty document");
        }
        Ok(normalize_document(&raw, &request.subject, request.nfa_type))
    }

    fn health_check(&self) -> Result<()> {
        self.client.ping()
    }
}

/// Room for the whole document to come back, with some headroom.
fn edit_token_budget(text: &str) -> u32 {
    let words = u32::try_from(text.split_whitespace().count()).unwrap_or(u32::MAX);
    words.saturating_mul(2).saturating_add(64)
}

/// Plain errors: a model server outage is a generation failure, not a lost session.
fn connection_error(base_url: &str, error: reqwest::Error) -> anyhow::Error {
    if error.is_timeout() {
        return anyhow!(
            "model server at {base_url} timed out -- raise [llm].timeout or check the server load ({error})"
        );
    }
    anyhow!(
        "cannot reach {base_url} -- check [llm].base_url and that the server is running ({error})"
    )
}

fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    if let Ok(parsed) = serde_json::from_str::<OpenAIErrorEnvelope>(body)
        && let Some(error) = parsed.error
        && !error.message.is_empty()
    {
        return anyhow!("server error ({}): {}", status.as_u16(), error.message);
    }

    if let Ok(parsed) = serde_json::from_str::<OllamaErrorEnvelope>(body)
        && let Some(error) = parsed.error
        && !error.is_empty()
    {
        return anyhow!("server error ({}): {}", status.as_u16(), error);
    }

    if body.len() < 100 && !body.contains('{') && !body.trim().is_empty() {
        return anyhow!("server error ({}): {}", status.as_u16(), body.trim());
    }

    anyhow!("server returned {}", status.as_u16())
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    temperature: f32,
    max_tokens: u32,
}

impl<'a> ChatRequest<'a> {
    fn new(model: &'a str, messages: &'a [Message], sampling: Sampling) -> Self {
        Self {
            model,
            messages: messages
                .iter()
                .map(|message| ChatMessage {
                    role: message.role.as_str(),
                    content: &message.content,
                })
                .collect(),
            stream: false,
            temperature: sampling.temperature,
            max_tokens: sampling.max_tokens,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    data: Vec<ModelRow>,
}

#[derive(Debug, Deserialize)]
struct ModelRow {
    id: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorEnvelope {
    error: Option<OpenAIErrorBody>,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct OllamaErrorEnvelope {
    error: Option<String>,
}
