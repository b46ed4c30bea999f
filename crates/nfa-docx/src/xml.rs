// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! WordprocessingML for the page blocks. Sizes are half-points, widths twips.

use crate::Signatory;
use crate::layout::{Block, ImageExtent, SIGNATURE_LINE, TABLE_TITLE, TITLE, TableLayout};

pub const IMAGE_REL_ID: &str = "rIdHeader";

const BODY_SIZE: u32 = 22;
const TITLE_SIZE: u32 = 24;
const TABLE_SIZE: u32 = 20;
const LETTERHEAD_SIZE: u32 = 16;

const PAGE_WIDTH: u32 = 12_240;
const PAGE_HEIGHT: u32 = 15_840;
const MARGIN_TOP_BOTTOM: u32 = 432;
const MARGIN_SIDES: u32 = 720;
const TEXT_WIDTH: u32 = PAGE_WIDTH - 2 * MARGIN_SIDES;
const SIGNATURE_COLUMNS: [u32; 3] = [3_168, 2_304, 3_168];

const NAMESPACES: &str = concat!(
    r#"xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" "#,
    r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" "#,
    r#"xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing" "#,
    r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" "#,
    r#"xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture""#,
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Center,
    Right,
    Both,
}

impl Align {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Center => "center",
            Self::Right => "right",
            Self::Both => "both",
        }
    }
}

struct Run<'a> {
    text: &'a str,
    bold: bool,
    size: u32,
}

impl<'a> Run<'a> {
    fn plain(text: &'a str, size: u32) -> Self {
        Self {
            text,
            bold: false,
            size,
        }
    }

    fn bold(text: &'a str, size: u32) -> Self {
        Self {
            text,
            bold: true,
            size,
        }
    }
}

pub fn document_xml(blocks: &[Block]) -> String {
    let mut out = String::new();
    out.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    out.push_str(&format!("<w:document {NAMESPACES}><w:body>"));
    for block in blocks {
        write_block(&mut out, block);
    }
    out.push_str(&format!(
        r#"<w:sectPr><w:pgSz w:w="{PAGE_WIDTH}" w:h="{PAGE_HEIGHT}"/><w:pgMar w:top="{MARGIN_TOP_BOTTOM}" w:right="{MARGIN_SIDES}" w:bottom="{MARGIN_TOP_BOTTOM}" w:left="{MARGIN_SIDES}" w:header="0" w:footer="0" w:gutter="0"/></w:sectPr>"#
    ));
    out.push_str("</w:body></w:document>");
    out
}

fn write_block(out: &mut String, block: &Block) {
    match block {
        Block::Image(extent) => write_image(out, *extent),
        Block::LetterheadLine(line) => {
            paragraph(out, Align::Center, None, &[Run::plain(line, LETTERHEAD_SIZE)]);
        }
        Block::DateLine(line) => paragraph(out, Align::Right, None, &[Run::plain(line, BODY_SIZE)]),
        Block::Title => paragraph(out, Align::Center, None, &[Run::bold(TITLE, TITLE_SIZE)]),
        Block::Subject(subject) => paragraph(
            out,
            Align::Left,
            None,
            &[
                Run::bold("Subject: ", BODY_SIZE),
                Run::plain(subject, BODY_SIZE),
            ],
        ),
        Block::Bullet(text) => {
            let bulleted = format!("•\t{text}");
            paragraph(
                out,
                Align::Both,
                Some(r#"<w:ind w:left="360" w:hanging="360"/>"#),
                &[Run::plain(&bulleted, BODY_SIZE)],
            );
        }
        Block::Paragraph(text) | Block::Closing(text) => {
            paragraph(out, Align::Both, None, &[Run::plain(text, BODY_SIZE)]);
        }
        Block::TableTitle => {
            paragraph(out, Align::Left, None, &[Run::bold(TABLE_TITLE, BODY_SIZE)]);
        }
        Block::Table(table) => write_table(out, table),
        Block::Signatures(pairs) => {
            for pair in pairs {
                paragraph(out, Align::Left, None, &[]);
                write_signature_pair(out, pair);
            }
            // a body may not end on a table
            paragraph(out, Align::Left, None, &[]);
        }
    }
}

fn paragraph(out: &mut String, align: Align, extra_props: Option<&str>, runs: &[Run<'_>]) {
    out.push_str("<w:p><w:pPr>");
    out.push_str(r#"<w:spacing w:before="0" w:after="0"/>"#);
    if let Some(props) = extra_props {
        out.push_str(props);
    }
    out.push_str(&format!(r#"<w:jc w:val="{}"/>"#, align.as_str()));
    out.push_str("</w:pPr>");
    for run in runs {
        write_run(out, run);
    }
    out.push_str("</w:p>");
}

fn write_run(out: &mut String, run: &Run<'_>) {
    out.push_str("<w:r><w:rPr>");
    if run.bold {
        out.push_str("<w:b/>");
    }
    out.push_str(&format!(
        r#"<w:sz w:val="{0}"/><w:szCs w:val="{0}"/></w:rPr>"#,
        run.size
    ));
    for (index, piece) in run.text.split('\t').enumerate() {
        if index > 0 {
            out.push_str("<w:tab/>");
        }
        if !piece.is_empty() {
            out.push_str(&format!(
                r#"<w:t xml:space="preserve">{}</w:t>"#,
                escape(piece)
            ));
        }
    }
    out.push_str("</w:r>");
}

fn write_table(out: &mut String, table: &TableLayout) {
    let columns = table.headers.len().max(1);
    let width = TEXT_WIDTH / u32::try_from(columns).unwrap_or(1);
    out.push_str("<w:tbl><w:tblPr>");
    out.push_str(r#"<w:tblW w:w="0" w:type="auto"/><w:jc w:val="center"/>"#);
    out.push_str("<w:tblBorders>");
    for edge in ["top", "left", "bottom", "right", "insideH", "insideV"] {
        out.push_str(&format!(
            r#"<w:{edge} w:val="single" w:sz="4" w:space="0" w:color="000000"/>"#
        ));
    }
    out.push_str("</w:tblBorders></w:tblPr><w:tblGrid>");
    for _ in 0..columns {
        out.push_str(&format!(r#"<w:gridCol w:w="{width}"/>"#));
    }
    out.push_str("</w:tblGrid>");

    write_row(out, &table.headers, width, true, BODY_SIZE);
    let last = table.rows.len().saturating_sub(1);
    for (index, row) in table.rows.iter().enumerate() {
        let bold = table.bold_last_row && index == last;
        write_row(out, row, width, bold, TABLE_SIZE);
    }
    out.push_str("</w:tbl>");
}

fn write_row(out: &mut String, cells: &[String], width: u32, bold: bool, size: u32) {
    out.push_str("<w:tr>");
    for cell in cells {
        out.push_str(&format!(
            r#"<w:tc><w:tcPr><w:tcW w:w="{width}" w:type="dxa"/></w:tcPr>"#
        ));
        let run = Run {
            text: cell,
            bold,
            size,
        };
        paragraph(out, Align::Center, None, &[run]);
        out.push_str("</w:tc>");
    }
    out.push_str("</w:tr>");
}

fn write_signature_pair(out: &mut String, pair: &[Signatory; 2]) {
    out.push_str("<w:tbl><w:tblPr>");
    out.push_str(r#"<w:tblW w:w="0" w:type="auto"/>"#);
    out.push_str(r#"<w:tblBorders><w:top w:val="nil"/><w:left w:val="nil"/><w:bottom w:val="nil"/><w:right w:val="nil"/><w:insideH w:val="nil"/><w:insideV w:val="nil"/></w:tblBorders>"#);
    out.push_str("</w:tblPr><w:tblGrid>");
    for width in SIGNATURE_COLUMNS {
        out.push_str(&format!(r#"<w:gridCol w:w="{width}"/>"#));
    }
    out.push_str("</w:tblGrid>");

    let [left, right] = pair;
    let rows: [(&str, &str); 3] = [
        (SIGNATURE_LINE, SIGNATURE_LINE),
        (left.name.as_str(), right.name.as_str()),
        (left.designation.as_str(), right.designation.as_str()),
    ];
    for (left_text, right_text) in rows {
        out.push_str("<w:tr>");
        for (width, text) in SIGNATURE_COLUMNS.iter().zip([left_text, "", right_text]) {
            out.push_str(&format!(
                r#"<w:tc><w:tcPr><w:tcW w:w="{width}" w:type="dxa"/></w:tcPr>"#
            ));
            paragraph(out, Align::Left, None, &[Run::plain(text, TABLE_SIZE)]);
            out.push_str("</w:tc>");
        }
        out.push_str("</w:tr>");
    }
    out.push_str("</w:tbl>");
}

fn write_image(out: &mut String, extent: ImageExtent) {
    let ImageExtent { width, height } = extent;
    out.push_str(r#"<w:p><w:pPr><w:spacing w:before="0" w:after="0"/><w:jc w:val="center"/></w:pPr><w:r><w:drawing>"#);
    out.push_str(&format!(
        r#"<wp:inline distT="0" distB="0" distL="0" distR="0"><wp:extent cx="{width}" cy="{height}"/><wp:docPr id="1" name="Letterhead"/>"#
    ));
    out.push_str(r#"<a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture"><pic:pic>"#);
    out.push_str(r#"<pic:nvPicPr><pic:cNvPr id="0" name="header.png"/><pic:cNvPicPr/></pic:nvPicPr>"#);
    out.push_str(&format!(
        r#"<pic:blipFill><a:blip r:embed="{IMAGE_REL_ID}"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill>"#
    ));
    out.push_str(&format!(
        r#"<pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{width}" cy="{height}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr>"#
    ));
    out.push_str("</pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing></w:r></w:p>");
}

/// XML text escaping; characters XML 1.0 cannot carry are dropped.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            ch if ch.is_control() && ch != '\t' && ch != '\n' => {}
            ch => out.push(ch),
        }
    }
    out
}
