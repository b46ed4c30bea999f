// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Subject,
    Summary,
    Table,
    Prompt,
    Section,
}

impl Field {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Subject => "subject",
            Self::Summary => "summary",
            Self::Table => "table",
            Self::Prompt => "prompt",
            Self::Section => "section",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: Field,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn push(&mut self, field: Field, message: impl Into<String>) {
        self.0.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    pub fn for_field(&self, field: Field) -> Option<&str> {
        self.0
            .iter()
            .find(|error| error.field == field)
            .map(|error| error.message.as_str())
    }

    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|error| format!("{}: {}", error.field.as_str(), error.message))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

/// Failures surfaced by the session to its caller.
#[derive(Debug, Error)]
pub enum NfaError {
    #[error("invalid input: {0}")]
    Validation(ValidationErrors),
    #[error("content generator unavailable: {0}")]
    GenerationUnavailable(String),
    #[error("edit failed: {0}")]
    EditFailed(String),
    #[error("document rendering failed: {0}")]
    Render(String),
    #[error("backend unreachable: {0} -- check the connection and retry")]
    Transport(String),
    #[error("{action} is not available in the {step} step")]
    InvalidStep {
        action: &'static str,
        step: &'static str,
    },
}

impl NfaError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::GenerationUnavailable(_) => "generation_unavailable",
            Self::EditFailed(_) => "edit_failed",
            Self::Render(_) => "render_error",
            Self::Transport(_) => "transport_error",
            Self::InvalidStep { .. } => "invalid_step",
        }
    }

    pub fn field_errors(&self) -> Option<&ValidationErrors> {
        match self {
            Self::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

impl From<ValidationErrors> for NfaError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

/// Root cause attached by collaborators when the backend cannot be reached.
#[derive(Debug, Error)]
#[error("backend unreachable at {target}")]
pub struct Unreachable {
    pub target: String,
}

impl Unreachable {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }
}

pub fn is_unreachable(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| cause.is::<Unreachable>())
}

#[cfg(test)]
mod tests {
    use anyhow::Context;

    use super::{Field, NfaError, Unreachable, ValidationErrors, is_unreachable};

    #[test]
    fn validation_errors_render_per_field() {
        let mut errors = ValidationErrors::default();
        errors.push(Field::Subject, "subject is required");
        errors.push(Field::Summary, "summary is too short");

        assert_eq!(errors.for_field(Field::Summary), Some("summary is too short"));
        assert_eq!(errors.for_field(Field::Table), None);
        assert_eq!(
            errors.to_string(),
            "subject: subject is required; summary: summary is too short"
        );
        assert_eq!(NfaError::from(errors).code(), "validation_error");
    }

    #[test]
    fn unreachable_is_found_through_context() {
        let error = anyhow::Error::new(Unreachable::new("http://127.0.0.1:9"))
            .context("generate request failed");
        assert!(is_unreachable(&error));

        let plain: anyhow::Result<()> = Err(anyhow::anyhow!("bad json")).context("parse");
        assert!(!is_unreachable(&plain.unwrap_err()));
    }
}
