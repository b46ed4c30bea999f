// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod layout;
mod package;
mod xml;

pub use layout::*;
pub use package::{png_dimensions, write_package};

use anyhow::{Context, Result};
use nfa_app::{DocumentRenderer, FinancialTable, NfaType};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use time::{Date, OffsetDateTime};
use tracing::{debug, warn};

/// EMU across the 7.5" text block.
pub const TEXT_WIDTH_EMU: u64 = 6_858_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signatory {
    pub name: String,
    pub designation: String,
}

impl Signatory {
    pub fn new(name: &str, designation: &str) -> Self {
        Self {
            name: name.to_owned(),
            designation: designation.to_owned(),
        }
    }
}

/// Top-left, top-right, bottom-left, bottom-right.
pub fn default_signatories() -> [Signatory; 4] {
    [
        Signatory::new("Dr Phani Kumar Pullela", "Dean, Student Affairs"),
        Signatory::new("Mr Chandrasekhar KN", "Head Finance"),
        Signatory::new("Dr Sahana D Gowda", "Registrar - RV University"),
        Signatory::new("Prof (Dr) Dwarika Prasad Uniyal", "Vice Chancellor (i/c)"),
    ]
}

pub fn default_letterhead() -> Vec<String> {
    [
        "RV UNIVERSITY",
        "Go, change the world",
        "An initiative of RV Educational Institutions",
        "RV Vidyaniketan, 8th Mile, Mysuru Road, Bengaluru, 560059 India",
        "+91 80 68199900 | www.rvu.edu.in",
    ]
    .into_iter()
    .map(str::to_owned)
    .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    /// PNG placed across the top of the page; text lines are used when it
    /// cannot be read.
    pub header_image: Option<PathBuf>,
    pub letterhead: Vec<String>,
    pub signatories: [Signatory; 4],
    /// Pinned date for the date line; today (UTC) when unset.
    pub date: Option<Date>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            header_image: None,
            letterhead: default_letterhead(),
            signatories: default_signatories(),
            date: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DocxRenderer {
    options: RenderOptions,
}

impl DocxRenderer {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    pub fn render_on(
        &self,
        text: &str,
        table: &FinancialTable,
        nfa_type: NfaType,
        date: Date,
    ) -> Result<Vec<u8>> {
        let header = self
            .options
            .header_image
            .as_deref()
            .and_then(load_header_image);
        let letterhead = match &header {
            Some((_, extent)) => Letterhead::Image(*extent),
            None => Letterhead::Lines(self.options.letterhead.clone()),
        };

        let blocks = layout(
            text,
            table,
            nfa_type,
            date,
            &letterhead,
            &self.options.signatories,
        );
        debug!(blocks = blocks.len(), nfa_type = nfa_type.as_str(), "laid out document");
        let document = xml::document_xml(&blocks);
        write_package(&document, header.as_ref().map(|(bytes, _)| bytes.as_slice()))
            .context("assemble docx package")
    }
}

impl DocumentRenderer for DocxRenderer {
    fn render(&self, text: &str, table: &FinancialTable, nfa_type: NfaType) -> Result<Vec<u8>> {
        let date = self
            .options
            .date
            .unwrap_or_else(|| OffsetDateTime::now_utc().date());
        self.render_on(text, table, nfa_type, date)
    }
}

fn load_header_image(path: &Path) -> Option<(Vec<u8>, ImageExtent)> {
    let loaded = fs::read(path)
        .with_context(|| format!("read header image {}", path.display()))
        .and_then(|bytes| {
            let (width, height) = png_dimensions(&bytes)
                .with_context(|| format!("inspect header image {}", path.display()))?;
            let extent = ImageExtent {
                width: TEXT_WIDTH_EMU,
                height: TEXT_WIDTH_EMU * u64::from(height) / u64::from(width),
            };
            Ok((bytes, extent))
        });
    match loaded {
        Ok(loaded) => Some(loaded),
        Err(error) => {
            warn!(error = %format!("{error:#}"), "header image unavailable, using text letterhead");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{TEXT_WIDTH_EMU, load_header_image};
    use crate::package::tiny_png;
    use anyhow::Result;

    #[test]
    fn header_image_scales_to_text_width() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("header.png");
        std::fs::write(&path, tiny_png(1500, 300))?;

        let (bytes, extent) = load_header_image(&path).ok_or_else(|| anyhow::anyhow!("load"))?;
        assert_eq!(bytes.len(), 33);
        assert_eq!(extent.width, TEXT_WIDTH_EMU);
        assert_eq!(extent.height, TEXT_WIDTH_EMU / 5);
        Ok(())
    }

    #[test]
    fn unreadable_header_image_is_skipped() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("header.png");
        std::fs::write(&path, b"not an image")?;
        assert!(load_header_image(&path).is_none());
        assert!(load_header_image(&dir.path().join("missing.png")).is_none());
        Ok(())
    }
}
