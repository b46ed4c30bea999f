// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str =
    "nfa_desk=info,nfa_app=info,nfa_db=info,nfa_llm=info,nfa_docx=info,nfa_tui=info";

pub enum LogTarget {
    Stderr,
    /// Used while the terminal UI owns the screen.
    File(PathBuf),
}

/// `RUST_LOG` beats the configured filter, which beats the default.
pub fn filter_directives(env_filter: Option<&str>, configured: Option<&str>) -> String {
    [env_filter, configured]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|value| !value.is_empty())
        .unwrap_or(DEFAULT_FILTER)
        .to_owned()
}

pub fn default_log_path() -> Result<PathBuf> {
    let data_root = dirs::data_local_dir()
        .ok_or_else(|| anyhow!("cannot resolve data directory for the log file"))?;
    Ok(data_root.join(nfa_db::APP_NAME).join("nfa-desk.log"))
}

pub fn init(configured: Option<&str>, target: LogTarget) -> Result<()> {
    let env_value = std::env::var("RUST_LOG").ok();
    let directives = filter_directives(env_value.as_deref(), configured);
    let filter = EnvFilter::try_new(&directives)
        .with_context(|| format!("invalid log filter {directives:?} -- fix [log].filter or RUST_LOG"))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = match target {
        LogTarget::Stderr => builder.with_writer(std::io::stderr).try_init(),
        LogTarget::File(path) => {
            let file = open_log_file(&path)?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
    };
    installed.map_err(|error| anyhow!("install log subscriber: {error}"))
}

fn open_log_file(path: &Path) -> Result<fs::File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create log directory {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open log file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_FILTER, filter_directives, open_log_file};
    use anyhow::Result;

    #[test]
    fn env_filter_wins_over_config() {
        assert_eq!(
            filter_directives(Some("nfa_llm=trace"), Some("nfa_desk=debug")),
            "nfa_llm=trace"
        );
    }

    #[test]
    fn blank_values_fall_through_to_default() {
        assert_eq!(filter_directives(Some("  "), Some("nfa_desk=debug")), "nfa_desk=debug");
        assert_eq!(filter_directives(None, Some("")), DEFAULT_FILTER);
        assert_eq!(filter_directives(None, None), DEFAULT_FILTER);
    }

    #[test]
    fn log_file_parent_is_created() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("nested").join("nfa-desk.log");
        open_log_file(&path)?;
        assert!(path.exists());
        Ok(())
    }
}
