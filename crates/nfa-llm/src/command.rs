// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Generator that shells out to an external program, one process per call.
//!
//! The program is invoked as `<program> <args..> generate|edit`, receives the
//! request as JSON on stdin and answers with a single JSON object on stdout.

use anyhow::{Context, Result, anyhow, bail};
use nfa_app::{ContentGenerator, EditRequest, GenerateRequest};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::normalize_document;

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const STDERR_EXCERPT_CHARS: usize = 300;

#[derive(Debug, Clone)]
pub struct CommandGenerator {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct CommandResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default, alias = "nfa_text", alias = "nfaText", alias = "editedText")]
    text: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

struct ProcessOutput {
    status: ExitStatus,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl CommandGenerator {
    pub fn new(program: &str, args: Vec<String>, timeout: Duration) -> Result<Self> {
        let program = program.trim();
        if program.is_empty() {
            bail!("generator.command must not be empty");
        }
        if timeout.is_zero() {
            bail!("generator.timeout must be positive");
        }
        Ok(Self {
            program: program.to_owned(),
            args,
            timeout,
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn run<T: Serialize>(&self, mode: &str, payload: &T) -> Result<String> {
        let input = serde_json::to_vec(payload).context("encode generator request")?;
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(mode)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("start generator {:?}", self.program))?;

        let stdout = drain(child.stdout.take(), "stdout")?;
        let stderr = drain(child.stderr.take(), "stderr")?;
        let stdin = feed(child.stdin.take(), input)?;

        let status = wait_with_timeout(&mut child, self.timeout)
            .with_context(|| format!("run generator {:?} {mode}", self.program))?;
        if stdin.join().is_err() {
            warn!("generator input writer panicked");
        }
        let output = ProcessOutput {
            status,
            stdout: join_reader(stdout)?,
            stderr: join_reader(stderr)?,
        };
        parse_output(&output, mode)
    }
}

impl ContentGenerator for CommandGenerator {
    fn generate(&self, request: &GenerateRequest) -> Result<String> {
        let raw = self.run("generate", request)?;
        Ok(normalize_document(&raw, &request.subject, request.nfa_type))
    }

    fn edit(&self, request: &EditRequest) -> Result<String> {
        let raw = self.run("edit", request)?;
        Ok(normalize_document(&raw, &request.subject, request.nfa_type))
    }

    fn health_check(&self) -> Result<()> {
        resolve_program(&self.program)
            .map(|path| debug!(path = %path.display(), "generator program resolved"))
            .ok_or_else(|| {
                anyhow!(
                    "generator program {:?} not found -- set [generator].command to an installed program",
                    self.program
                )
            })
    }
}

fn drain<R>(pipe: Option<R>, name: &'static str) -> Result<JoinHandle<std::io::Result<Vec<u8>>>>
where
    R: Read + Send + 'static,
{
    let mut pipe = pipe.ok_or_else(|| anyhow!("missing generator {name} pipe"))?;
    Ok(thread::spawn(move || {
        let mut buf = Vec::new();
        pipe.read_to_end(&mut buf)?;
        Ok(buf)
    }))
}

/// Writes the request on its own thread so a child that never reads its
/// input cannot stall the timeout; killing the child ends the write.
fn feed<W>(pipe: Option<W>, input: Vec<u8>) -> Result<JoinHandle<()>>
where
    W: Write + Send + 'static,
{
    let mut pipe = pipe.ok_or_else(|| anyhow!("missing generator stdin pipe"))?;
    Ok(thread::spawn(move || {
        // A child that exits without reading its input closes the pipe.
        if let Err(error) = pipe.write_all(&input).and_then(|()| pipe.flush()) {
            debug!(%error, "generator closed stdin early");
        }
    }))
}

fn join_reader(handle: JoinHandle<std::io::Result<Vec<u8>>>) -> Result<Vec<u8>> {
    handle
        .join()
        .map_err(|_| anyhow!("generator output reader panicked"))?
        .context("read generator output")
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<ExitStatus> {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().context("poll generator process")? {
            return Ok(status);
        }
        if start.elapsed() >= timeout {
            let _ = child.kill();
            let _ = child.wait();
            warn!(timeout_ms = timeout.as_millis() as u64, "generator timed out");
            bail!("generator timed out after {}ms", timeout.as_millis());
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn parse_output(output: &ProcessOutput, mode: &str) -> Result<String> {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let excerpt: String = stderr.trim().chars().take(STDERR_EXCERPT_CHARS).collect();
        bail!(
            "generator {mode} exited with {}{}",
            output.status,
            if excerpt.is_empty() {
                String::new()
            } else {
                format!(": {excerpt}")
            }
        );
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let response = parse_response(&stdout)
        .with_context(|| format!("decode generator {mode} response"))?;
    if response.success == Some(false) {
        bail!(
            "generator {mode} failed: {}",
            response
                .error
                .as_deref()
                .unwrap_or("no error message provided")
        );
    }
    match response.text {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => bail!("generator {mode} returned no text"),
    }
}

/// Whole stdout as JSON, else the last line that looks like an object.
fn parse_response(stdout: &str) -> Result<CommandResponse> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        bail!("generator printed nothing");
    }
    if let Ok(response) = serde_json::from_str(trimmed) {
        return Ok(response);
    }
    let line = trimmed
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| line.starts_with('{'))
        .ok_or_else(|| anyhow!("no JSON object in generator output"))?;
    serde_json::from_str(line).context("parse generator JSON")
}

fn resolve_program(program: &str) -> Option<PathBuf> {
    let path = Path::new(program);
    if path.components().count() > 1 {
        return path.is_file().then(|| path.to_path_buf());
    }
    let search = std::env::var_os("PATH")?;
    std::env::split_paths(&search)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::{parse_response, resolve_program};

    #[test]
    fn response_accepts_every_text_alias() -> anyhow::Result<()> {
        for body in [
            r#"{"success":true,"text":"a"}"#,
            r#"{"success":true,"nfa_text":"a"}"#,
            r#"{"success":true,"nfaText":"a"}"#,
            r#"{"success":true,"editedText":"a"}"#,
        ] {
            assert_eq!(parse_response(body)?.text.as_deref(), Some("a"));
        }
        Ok(())
    }

    #[test]
    fn response_skips_log_lines_before_json() -> anyhow::Result<()> {
        let stdout = "loading model\nwarming up\n{\"success\":true,\"text\":\"done\"}\n";
        assert_eq!(parse_response(stdout)?.text.as_deref(), Some("done"));
        assert!(parse_response("just logs\n").is_err());
        assert!(parse_response("   ").is_err());
        Ok(())
    }

    #[test]
    fn missing_program_does_not_resolve() {
        assert!(resolve_program("nfa-desk-no-such-program-xyz").is_none());
        assert!(resolve_program("/definitely/not/here/generator").is_none());
    }
}
