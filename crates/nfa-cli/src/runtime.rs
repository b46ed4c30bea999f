// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::config::{Config, GeneratorBackend};
use anyhow::{Context, Result, bail};
use nfa_app::{
    Collaborators, ContentGenerator, DocumentRenderer, EditRequest, FinancialTable,
    GenerateRequest, HistoryStore, NfaType, RenderedDocument,
};
use nfa_docx::DocxRenderer;
use nfa_llm::{Client, CommandGenerator, LlmGenerator};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Collaborators for the terminal UI; documents are saved under `output_dir`.
pub struct DeskRuntime<'a> {
    generator: Box<dyn ContentGenerator + 'a>,
    renderer: Box<dyn DocumentRenderer + 'a>,
    history: Option<&'a dyn HistoryStore>,
    output_dir: PathBuf,
}

impl<'a> DeskRuntime<'a> {
    pub fn new(
        generator: Box<dyn ContentGenerator + 'a>,
        renderer: Box<dyn DocumentRenderer + 'a>,
        history: Option<&'a dyn HistoryStore>,
        output_dir: PathBuf,
    ) -> Self {
        Self {
            generator,
            renderer,
            history,
            output_dir,
        }
    }
}

impl nfa_tui::NfaRuntime for DeskRuntime<'_> {
    fn collaborators(&self) -> Collaborators<'_> {
        Collaborators {
            generator: self.generator.as_ref(),
            renderer: self.renderer.as_ref(),
            history: self.history,
        }
    }

    fn save_document(&mut self, document: &RenderedDocument) -> Result<PathBuf> {
        save_document(&self.output_dir, document)
    }
}

pub fn save_document(output_dir: &Path, document: &RenderedDocument) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("create output directory {}", output_dir.display()))?;
    let path = output_dir.join(&document.file_name);
    fs::write(&path, &document.bytes)
        .with_context(|| format!("write document {} -- check [server].output_dir", path.display()))?;
    info!(path = %path.display(), bytes = document.bytes.len(), "document saved");
    Ok(path)
}

pub fn build_generator(config: &Config, config_path: &Path) -> Result<Box<dyn ContentGenerator>> {
    match config.generator_backend() {
        GeneratorBackend::Llm => {
            let client = Client::new(
                config.llm_base_url(),
                config.llm_model(),
                config.llm_timeout()?,
            )
            .with_context(|| {
                format!(
                    "invalid [llm] config in {}; fix base_url/model/timeout values",
                    config_path.display()
                )
            })?
            .with_api_key(config.llm_api_key());
            Ok(Box::new(LlmGenerator::new(client, config.sampling())))
        }
        GeneratorBackend::Command => {
            let generator = CommandGenerator::new(
                config.generator_command(),
                config.generator_args(),
                config.generator_timeout()?,
            )
            .with_context(|| {
                format!(
                    "invalid [generator] config in {}; fix command/args/timeout values",
                    config_path.display()
                )
            })?;
            Ok(Box::new(generator))
        }
        GeneratorBackend::None => Ok(Box::new(TemplateOnly)),
    }
}

pub fn build_renderer(config: &Config) -> Option<DocxRenderer> {
    config
        .render_enabled()
        .then(|| DocxRenderer::new(config.render_options()))
}

/// `[generator].backend = "none"`: every note comes from the fallback template.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateOnly;

impl ContentGenerator for TemplateOnly {
    fn generate(&self, _request: &GenerateRequest) -> Result<String> {
        bail!("content generator disabled ([generator].backend = \"none\")")
    }

    fn edit(&self, _request: &EditRequest) -> Result<String> {
        bail!("AI edits need a generator -- set [generator].backend to llm or command")
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledRenderer;

impl DocumentRenderer for DisabledRenderer {
    fn render(&self, _text: &str, _table: &FinancialTable, _nfa_type: NfaType) -> Result<Vec<u8>> {
        bail!("document rendering is disabled -- set [render].enabled = true")
    }
}

#[cfg(test)]
mod tests {
    use super::{DeskRuntime, DisabledRenderer, TemplateOnly, build_generator, build_renderer};
    use crate::config::Config;
    use anyhow::{Result, anyhow};
    use nfa_app::{
        ContentGenerator, HistoryDomain, NfaError, NfaSession, SessionCommand, TextOrigin,
    };
    use nfa_db::Store;
    use nfa_testkit::{TextRenderer, chess_tournament};
    use nfa_tui::NfaRuntime;
    use std::path::Path;

    fn write_config(content: &str) -> Result<(tempfile::TempDir, std::path::PathBuf)> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        std::fs::write(&path, content)?;
        Ok((temp, path))
    }

    fn session_on_table_step() -> NfaSession {
        let (form, table) = chess_tournament();
        let mut session = NfaSession::new();
        session.form = form;
        session.table = table;
        session.dispatch(SessionCommand::Next);
        session
    }

    #[test]
    fn template_only_backend_drafts_in_fallback_mode_and_records_history() -> Result<()> {
        let store = Store::open_memory()?;
        store.bootstrap()?;
        let temp = tempfile::tempdir()?;
        let mut runtime = DeskRuntime::new(
            Box::new(TemplateOnly),
            Box::new(TextRenderer),
            Some(&store),
            temp.path().join("letters"),
        );

        let mut session = session_on_table_step();
        let origin = session
            .generate(runtime.collaborators())
            .map_err(|error| anyhow!("{error}"))?;
        assert_eq!(origin, TextOrigin::Fallback);

        let document = session
            .download(runtime.collaborators())
            .map_err(|error| anyhow!("{error}"))?;
        let path = runtime.save_document(&document)?;
        assert_eq!(path, temp.path().join("letters").join(&document.file_name));
        assert!(path.exists());

        let entries = store.list_entries(HistoryDomain::Nfa)?;
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|entry| entry.fallback));
        Ok(())
    }

    #[test]
    fn template_only_backend_cannot_edit() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let runtime = DeskRuntime::new(
            Box::new(TemplateOnly),
            Box::new(DisabledRenderer),
            None,
            temp.path().to_path_buf(),
        );
        let mut session = session_on_table_step();
        session
            .generate(runtime.collaborators())
            .map_err(|error| anyhow!("{error}"))?;
        let before = session.current_text().map(str::to_owned);

        let error = session
            .apply_edit("make it shorter", runtime.collaborators())
            .expect_err("template-only edit should fail");
        assert!(matches!(error, NfaError::EditFailed(_)));
        assert_eq!(session.current_text().map(str::to_owned), before);
        assert!(session.turns().last().is_some_and(|turn| turn.is_error()));

        let error = session
            .download(runtime.collaborators())
            .expect_err("disabled renderer should fail");
        assert!(error.to_string().contains("[render].enabled"));
        assert!(TemplateOnly.health_check().is_ok());
        Ok(())
    }

    #[test]
    fn generator_follows_configured_backend() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[generator]\nbackend = \"none\"\n")?;
        let config = Config::load(&path)?;
        let generator = build_generator(&config, &path)?;
        assert!(generator.health_check().is_ok());

        let (_temp, path) = write_config(
            "version = 1\n[generator]\nbackend = \"command\"\ncommand = \"cat\"\ntimeout = \"5s\"\n",
        )?;
        let config = Config::load(&path)?;
        assert!(build_generator(&config, &path).is_ok());

        let config = Config::default();
        assert!(build_generator(&config, Path::new("/tmp/config.toml")).is_ok());
        Ok(())
    }

    #[test]
    fn renderer_can_be_switched_off() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[render]\nenabled = false\n")?;
        assert!(build_renderer(&Config::load(&path)?).is_none());
        assert!(build_renderer(&Config::default()).is_some());
        Ok(())
    }
}
