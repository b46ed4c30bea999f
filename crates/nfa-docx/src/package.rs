// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use std::io::{Cursor, Write};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::xml::IMAGE_REL_ID;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Default Extension="png" ContentType="image/png"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

fn document_rels(with_image: bool) -> String {
    let mut out = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    if with_image {
        out.push_str(&format!(
            r#"<Relationship Id="{IMAGE_REL_ID}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="media/header.png"/>"#
        ));
    }
    out.push_str("</Relationships>");
    out
}

/// Zips the parts. Entry order and timestamps are fixed, so equal inputs
/// give equal bytes.
pub fn write_package(document_xml: &str, header_png: Option<&[u8]>) -> Result<Vec<u8>> {
    let mut archive = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut archive));
        let epoch = zip::DateTime::from_date_and_time(1980, 1, 1, 0, 0, 0)
            .map_err(|error| anyhow!("build zip timestamp: {error}"))?;
        let options = SimpleFileOptions::default()
            .last_modified_time(epoch)
            .compression_method(zip::CompressionMethod::Deflated);

        let rels = document_rels(header_png.is_some());
        let mut parts: Vec<(&str, &[u8])> = vec![
            ("[Content_Types].xml", CONTENT_TYPES.as_bytes()),
            ("_rels/.rels", PACKAGE_RELS.as_bytes()),
            ("word/document.xml", document_xml.as_bytes()),
            ("word/_rels/document.xml.rels", rels.as_bytes()),
        ];
        if let Some(png) = header_png {
            parts.push(("word/media/header.png", png));
        }

        for (name, content) in parts {
            zip.start_file(name, options)
                .with_context(|| format!("add {name} to document package"))?;
            zip.write_all(content)
                .with_context(|| format!("write {name} to document package"))?;
        }
        zip.finish().context("finalize document package")?;
    }
    Ok(archive)
}

/// Pixel size read from the IHDR chunk.
pub fn png_dimensions(bytes: &[u8]) -> Result<(u32, u32)> {
    if bytes.len() < 24 || bytes[..8] != PNG_SIGNATURE {
        bail!("not a PNG image");
    }
    if &bytes[12..16] != b"IHDR" {
        bail!("PNG is missing its IHDR header");
    }
    let width = u32::from_be_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]);
    let height = u32::from_be_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]);
    if width == 0 || height == 0 {
        bail!("PNG has zero size");
    }
    Ok((width, height))
}

#[cfg(test)]
pub(crate) fn tiny_png(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = PNG_SIGNATURE.to_vec();
    bytes.extend_from_slice(&13_u32.to_be_bytes());
    bytes.extend_from_slice(b"IHDR");
    bytes.extend_from_slice(&width.to_be_bytes());
    bytes.extend_from_slice(&height.to_be_bytes());
    bytes.extend_from_slice(&[8, 6, 0, 0, 0, 0, 0, 0, 0]);
    bytes
}
