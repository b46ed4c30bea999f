// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use nfa_docx::{RenderOptions, Signatory, default_letterhead, default_signatories};
use nfa_llm::{DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE, Sampling};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_VERSION: i64 = 1;
pub const CONFIG_PATH_ENV: &str = "NFA_DESK_CONFIG_PATH";
const DEFAULT_BIND: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_LLM_BASE_URL: &str = "http://localhost:11434/v1";
const DEFAULT_LLM_MODEL: &str = "qwen3";
const DEFAULT_LLM_TIMEOUT: &str = "60s";
const DEFAULT_GENERATOR_TIMEOUT: &str = "60s";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorBackend {
    Llm,
    Command,
    None,
}

impl GeneratorBackend {
    fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "llm" => Some(Self::Llm),
            "command" => Some(Self::Command),
            "none" => Some(Self::None),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub server: Server,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub generator: Generator,
    #[serde(default)]
    pub llm: Llm,
    #[serde(default)]
    pub render: Render,
    #[serde(default)]
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            server: Server::default(),
            storage: Storage::default(),
            generator: Generator::default(),
            llm: Llm::default(),
            render: Render::default(),
            log: Log::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Server {
    pub bind: Option<String>,
    pub port: Option<u16>,
    pub output_dir: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Storage {
    pub db_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Generator {
    pub backend: Option<String>,
    pub command: Option<String>,
    pub args: Option<Vec<String>>,
    pub timeout: Option<String>,
}

impl Default for Generator {
    fn default() -> Self {
        Self {
            backend: Some("llm".to_owned()),
            command: None,
            args: None,
            timeout: Some(DEFAULT_GENERATOR_TIMEOUT.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Llm {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key_env: Option<String>,
    pub timeout: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Default for Llm {
    fn default() -> Self {
        Self {
            base_url: Some(DEFAULT_LLM_BASE_URL.to_owned()),
            model: Some(DEFAULT_LLM_MODEL.to_owned()),
            api_key_env: None,
            timeout: Some(DEFAULT_LLM_TIMEOUT.to_owned()),
            temperature: Some(DEFAULT_TEMPERATURE),
            max_tokens: Some(DEFAULT_MAX_TOKENS),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Render {
    pub enabled: Option<bool>,
    pub header_image: Option<String>,
    pub letterhead: Option<Vec<String>>,
    pub signatories: Option<Vec<Signatory>>,
}

impl Default for Render {
    fn default() -> Self {
        Self {
            enabled: Some(true),
            header_image: None,
            letterhead: None,
            signatories: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Log {
    pub filter: Option<String>,
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set {CONFIG_PATH_ENV} to the config file")
        })?;

        let app_dir = config_root.join(nfa_db::APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} is not versioned. Add `version = 1` and keep values under [server], [storage], [generator], [llm], [render], and [log]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if let Some(db_path) = &self.storage.db_path {
            nfa_db::validate_db_path(db_path)?;
        }

        if self.server.port == Some(0) {
            bail!("server.port in {} must be between 1 and 65535", path.display());
        }

        if let Some(backend) = &self.generator.backend
            && GeneratorBackend::parse(backend).is_none()
        {
            bail!(
                "generator.backend in {} must be one of llm, command, none; got {backend:?}",
                path.display()
            );
        }

        if self.generator_backend() == GeneratorBackend::Command
            && self
                .generator
                .command
                .as_deref()
                .is_none_or(|command| command.trim().is_empty())
        {
            bail!(
                "generator.backend = \"command\" in {} needs generator.command -- name the program to run",
                path.display()
            );
        }

        for (key, value) in [
            ("generator.timeout", &self.generator.timeout),
            ("llm.timeout", &self.llm.timeout),
        ] {
            if let Some(timeout) = value {
                let parsed = parse_duration(timeout)
                    .with_context(|| format!("{key} in {}", path.display()))?;
                if parsed <= Duration::ZERO {
                    bail!(
                        "{key} in {} must be positive, got {}",
                        path.display(),
                        timeout
                    );
                }
            }
        }

        if let Some(temperature) = self.llm.temperature
            && !(0.0..=2.0).contains(&temperature)
        {
            bail!(
                "llm.temperature in {} must be between 0 and 2, got {temperature}",
                path.display()
            );
        }

        if self.llm.max_tokens == Some(0) {
            bail!("llm.max_tokens in {} must be positive", path.display());
        }

        if let Some(signatories) = &self.render.signatories
            && signatories.len() != 4
        {
            bail!(
                "render.signatories in {} must list exactly 4 entries (top-left, top-right, bottom-left, bottom-right), got {}",
                path.display(),
                signatories.len()
            );
        }

        Ok(())
    }

    pub fn db_path(&self) -> Result<PathBuf> {
        match &self.storage.db_path {
            Some(path) => Ok(PathBuf::from(path)),
            None => nfa_db::default_db_path(),
        }
    }

    pub fn bind_address(&self) -> String {
        format!(
            "{}:{}",
            self.server.bind.as_deref().unwrap_or(DEFAULT_BIND),
            self.server.port.unwrap_or(DEFAULT_PORT)
        )
    }

    /// Where rendered documents are written; created on first use.
    pub fn output_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.server.output_dir {
            return Ok(PathBuf::from(dir));
        }
        let data_root = dirs::data_local_dir().ok_or_else(|| {
            anyhow!("cannot resolve data directory; set [server].output_dir to a writable directory")
        })?;
        Ok(data_root
            .join(nfa_db::APP_NAME)
            .join("generated_letters")
            .join("nfa"))
    }

    pub fn generator_backend(&self) -> GeneratorBackend {
        self.generator
            .backend
            .as_deref()
            .and_then(GeneratorBackend::parse)
            .unwrap_or(GeneratorBackend::Llm)
    }

    pub fn generator_command(&self) -> &str {
        self.generator.command.as_deref().unwrap_or("").trim()
    }

    pub fn generator_args(&self) -> Vec<String> {
        self.generator.args.clone().unwrap_or_default()
    }

    pub fn generator_timeout(&self) -> Result<Duration> {
        parse_duration(
            self.generator
                .timeout
                .as_deref()
                .unwrap_or(DEFAULT_GENERATOR_TIMEOUT),
        )
    }

    pub fn llm_base_url(&self) -> &str {
        self.llm
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_LLM_BASE_URL)
            .trim_end_matches('/')
    }

    pub fn llm_model(&self) -> &str {
        self.llm.model.as_deref().unwrap_or(DEFAULT_LLM_MODEL)
    }

    pub fn llm_timeout(&self) -> Result<Duration> {
        parse_duration(self.llm.timeout.as_deref().unwrap_or(DEFAULT_LLM_TIMEOUT))
    }

    /// The key itself lives in the environment variable `[llm].api_key_env` names.
    pub fn llm_api_key(&self) -> Option<String> {
        let name = self.llm.api_key_env.as_deref()?.trim();
        if name.is_empty() {
            return None;
        }
        env::var(name).ok().filter(|key| !key.trim().is_empty())
    }

    pub fn sampling(&self) -> Sampling {
        Sampling {
            temperature: self.llm.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            max_tokens: self.llm.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        }
    }

    pub fn render_enabled(&self) -> bool {
        self.render.enabled.unwrap_or(true)
    }

    pub fn render_options(&self) -> RenderOptions {
        let signatories = match self.render.signatories.as_deref() {
            Some([top_left, top_right, bottom_left, bottom_right]) => [
                top_left.clone(),
                top_right.clone(),
                bottom_left.clone(),
                bottom_right.clone(),
            ],
            _ => default_signatories(),
        };
        RenderOptions {
            header_image: self.render.header_image.as_ref().map(PathBuf::from),
            letterhead: self
                .render
                .letterhead
                .clone()
                .unwrap_or_else(default_letterhead),
            signatories,
            date: None,
        }
    }

    pub fn log_filter(&self) -> Option<&str> {
        self.log
            .filter
            .as_deref()
            .map(str::trim)
            .filter(|filter| !filter.is_empty())
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            r#"# nfa-desk config
# Place this file at: {}

version = 1

[server]
bind = "{DEFAULT_BIND}"
port = {DEFAULT_PORT}
# Optional. Default is the platform data dir (for example
# ~/.local/share/nfa-desk/generated_letters/nfa)
# output_dir = "/absolute/path/to/generated_letters/nfa"

[storage]
# Optional. Default is the platform data dir (for example ~/.local/share/nfa-desk/nfa-desk.db)
# db_path = "/absolute/path/to/nfa-desk.db"

[generator]
# llm: OpenAI-compatible chat API, command: external program, none: template only
backend = "llm"
# command = "/usr/local/bin/generate-nfa"
# args = ["--model", "fast"]
timeout = "{DEFAULT_GENERATOR_TIMEOUT}"

[llm]
base_url = "{DEFAULT_LLM_BASE_URL}"
model = "{DEFAULT_LLM_MODEL}"
# Name of the environment variable holding the API key, if the server needs one.
# api_key_env = "OPENAI_API_KEY"
timeout = "{DEFAULT_LLM_TIMEOUT}"
temperature = {DEFAULT_TEMPERATURE}
max_tokens = {DEFAULT_MAX_TOKENS}

[render]
enabled = true
# PNG letterhead scaled to the page width; the text lines below are used without it.
# header_image = "/absolute/path/to/header.png"
# letterhead = ["RV UNIVERSITY", "Go, change the world"]
# Exactly four, in order: top-left, top-right, bottom-left, bottom-right.
# signatories = [
#   {{ name = "Dr Phani Kumar Pullela", designation = "Dean, Student Affairs" }},
#   {{ name = "Mr Chandrasekhar KN", designation = "Head Finance" }},
#   {{ name = "Dr Sahana D Gowda", designation = "Registrar - RV University" }},
#   {{ name = "Prof (Dr) Dwarika Prasad Uniyal", designation = "Vice Chancellor (i/c)" }},
# ]

[log]
# RUST_LOG overrides this when set.
# filter = "nfa_desk=debug,nfa_llm=debug"
"#,
            path.display(),
        )
    }
}

pub fn parse_duration(raw: &str) -> Result<Duration> {
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(mins * 60));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 30s)")
}

#[cfg(test)]
mod tests {
    use super::{CONFIG_PATH_ENV, Config, GeneratorBackend, parse_duration};
    use anyhow::Result;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};
    use std::time::Duration;

    fn write_config(content: &str) -> Result<(tempfile::TempDir, PathBuf)> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        std::fs::write(&path, content)?;
        Ok((temp, path))
    }

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        match ENV_LOCK.get_or_init(|| Mutex::new(())).lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    #[test]
    fn missing_config_uses_defaults() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let config = Config::load(&temp.path().join("missing.toml"))?;
        assert_eq!(config.version, 1);
        assert_eq!(config.generator_backend(), GeneratorBackend::Llm);
        assert_eq!(config.bind_address(), "127.0.0.1:5000");
        assert!(config.render_enabled());
        assert_eq!(config.render_options().signatories[1].designation, "Head Finance");
        Ok(())
    }

    #[test]
    fn unversioned_config_is_rejected_with_actionable_message() -> Result<()> {
        let (_temp, path) = write_config("[llm]\nmodel=\"qwen3\"\n")?;
        let error = Config::load(&path).expect_err("unversioned config should fail");
        let message = error.to_string();
        assert!(message.contains("version = 1"));
        assert!(message.contains("[generator]"));
        Ok(())
    }

    #[test]
    fn full_config_parses() -> Result<()> {
        let (_temp, path) = write_config(
            r#"version = 1
[server]
bind = "0.0.0.0"
port = 8080
output_dir = "/srv/letters"
[generator]
backend = "command"
command = "generate-nfa"
args = ["--fast"]
timeout = "90s"
[llm]
temperature = 0.2
max_tokens = 800
[render]
enabled = false
letterhead = ["ACME INSTITUTE"]
signatories = [
  { name = "A", designation = "Dean" },
  { name = "B", designation = "Finance" },
  { name = "C", designation = "Registrar" },
  { name = "D", designation = "Chancellor" },
]
[log]
filter = " nfa_desk=debug "
"#,
        )?;

        let config = Config::load(&path)?;
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.output_dir()?, PathBuf::from("/srv/letters"));
        assert_eq!(config.generator_backend(), GeneratorBackend::Command);
        assert_eq!(config.generator_command(), "generate-nfa");
        assert_eq!(config.generator_args(), vec!["--fast".to_owned()]);
        assert_eq!(config.generator_timeout()?, Duration::from_secs(90));
        assert_eq!(config.sampling().max_tokens, 800);
        assert!(!config.render_enabled());
        let options = config.render_options();
        assert_eq!(options.letterhead, vec!["ACME INSTITUTE".to_owned()]);
        assert_eq!(options.signatories[3].name, "D");
        assert_eq!(config.log_filter(), Some("nfa_desk=debug"));
        Ok(())
    }

    #[test]
    fn malformed_config_returns_parse_error() -> Result<()> {
        let (_temp, path) = write_config("{{not toml")?;
        let error = Config::load(&path).expect_err("malformed config should fail");
        assert!(error.to_string().contains("parse TOML config"));
        Ok(())
    }

    #[test]
    fn unsupported_config_version_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 2\n")?;
        let error = Config::load(&path).expect_err("v2 config should fail");
        assert!(error.to_string().contains("unsupported config version 2"));
        Ok(())
    }

    #[test]
    fn unknown_backend_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[generator]\nbackend = \"python\"\n")?;
        let error = Config::load(&path).expect_err("unknown backend should fail");
        assert!(error.to_string().contains("llm, command, none"));
        Ok(())
    }

    #[test]
    fn command_backend_requires_a_program() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[generator]\nbackend = \"command\"\n")?;
        let error = Config::load(&path).expect_err("missing command should fail");
        assert!(error.to_string().contains("generator.command"));
        Ok(())
    }

    #[test]
    fn signatories_must_fill_the_grid() -> Result<()> {
        let (_temp, path) = write_config(
            "version = 1\n[render]\nsignatories = [{ name = \"A\", designation = \"Dean\" }]\n",
        )?;
        let error = Config::load(&path).expect_err("one signatory should fail");
        assert!(error.to_string().contains("exactly 4"));
        Ok(())
    }

    #[test]
    fn zero_timeouts_are_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[llm]\ntimeout = \"0s\"\n")?;
        let error = Config::load(&path).expect_err("zero timeout should fail");
        assert!(error.to_string().contains("must be positive"));

        let (_temp, path) = write_config("version = 1\n[generator]\ntimeout = \"soon\"\n")?;
        let error = Config::load(&path).expect_err("bad timeout should fail");
        assert!(format!("{error:#}").contains("invalid duration"));
        Ok(())
    }

    #[test]
    fn default_path_honors_env_override() -> Result<()> {
        let _guard = env_lock();
        let temp = tempfile::tempdir()?;
        let override_path = temp.path().join("custom-config.toml");
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var(CONFIG_PATH_ENV, &override_path);
        }
        let resolved = Config::default_path()?;
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var(CONFIG_PATH_ENV);
        }
        assert_eq!(resolved, override_path);
        Ok(())
    }

    #[test]
    fn db_path_prefers_storage_config_over_env_override() -> Result<()> {
        let _guard = env_lock();
        let (_temp, path) =
            write_config("version = 1\n[storage]\ndb_path = \"/explicit/from-config.db\"\n")?;
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var(nfa_db::DB_PATH_ENV, "/from/env.db");
        }
        let config = Config::load(&path)?;
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var(nfa_db::DB_PATH_ENV);
        }
        assert_eq!(config.db_path()?, PathBuf::from("/explicit/from-config.db"));
        Ok(())
    }

    #[test]
    fn db_path_rejects_uri_style_storage_value() -> Result<()> {
        let (_temp, path) = write_config(
            "version = 1\n[storage]\ndb_path = \"https://evil.example/nfa-desk.db\"\n",
        )?;
        let error = Config::load(&path).expect_err("URI db_path should fail validation");
        assert!(error.to_string().contains("looks like a URI"));
        Ok(())
    }

    #[test]
    fn api_key_is_read_from_the_named_variable() -> Result<()> {
        let _guard = env_lock();
        let (_temp, path) =
            write_config("version = 1\n[llm]\napi_key_env = \"NFA_DESK_TEST_API_KEY\"\n")?;
        let config = Config::load(&path)?;
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("NFA_DESK_TEST_API_KEY", "sk-local");
        }
        let key = config.llm_api_key();
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("NFA_DESK_TEST_API_KEY");
        }
        assert_eq!(key.as_deref(), Some("sk-local"));
        assert_eq!(config.llm_api_key(), None);
        assert_eq!(Config::default().llm_api_key(), None);
        Ok(())
    }

    #[test]
    fn llm_base_url_trims_trailing_slashes() -> Result<()> {
        let (_temp, path) = write_config(
            "version = 1\n[llm]\nbase_url = \"http://localhost:11434/v1///\"\nmodel = \"qwen3\"\n",
        )?;
        let config = Config::load(&path)?;
        assert_eq!(config.llm_base_url(), "http://localhost:11434/v1");
        Ok(())
    }

    #[test]
    fn durations_parse_ms_seconds_and_minutes() -> Result<()> {
        assert_eq!(parse_duration("500ms")?, Duration::from_millis(500));
        assert_eq!(parse_duration("5s")?, Duration::from_secs(5));
        assert_eq!(parse_duration("2m")?, Duration::from_secs(120));
        assert!(parse_duration("oops").is_err());
        Ok(())
    }

    #[test]
    fn example_config_loads_and_names_every_section() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        let example = Config::example_config(&path);
        for section in ["[server]", "[storage]", "[generator]", "[llm]", "[render]", "[log]"] {
            assert!(example.contains(section), "missing {section}");
        }
        std::fs::write(&path, &example)?;
        let config = Config::load(&path)?;
        assert_eq!(config.llm_model(), "qwen3");
        Ok(())
    }
}
