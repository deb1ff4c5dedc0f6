//! Text extraction for binary document formats.
//!
//! PDF text comes from `lopdf`, one `--- Page N ---` marker per page. DOCX is
//! a zip archive; paragraphs of `word/document.xml` become lines.

use std::io::{Cursor, Read};

use lopdf::Document as PdfDocument;

/// Plain text of a document plus format-specific counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub text: String,
    pub pages: Option<usize>,
    pub paragraphs: Option<usize>,
}

pub fn pdf_text(bytes: &[u8]) -> Result<Extracted, String> {
    let doc = PdfDocument::load_mem(bytes).map_err(|e| format!("failed to load PDF: {}", e))?;
    let pages = doc.get_pages();
    let mut text = String::new();
    for (n, page) in pages.keys().enumerate() {
        let page_text = doc.extract_text(&[*page]).unwrap_or_default();
        if n > 0 { text.push('\n'); }
        text.push_str(&format!("--- Page {} ---\n{}", n + 1, page_text.trim()));
    }
    Ok(Extracted { text, pages: Some(pages.len()), paragraphs: None })
}

pub fn docx_text(bytes: &[u8]) -> Result<Extracted, String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| format!("not a DOCX archive: {}", e))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| format!("missing word/document.xml: {}", e))?
        .read_to_string(&mut xml)
        .map_err(|e| format!("failed to read word/document.xml: {}", e))?;

    let paragraphs: Vec<String> = xml
        .split("</w:p>")
        .filter(|segment| opens_paragraph(segment))
        .map(paragraph_text)
        .collect();
    Ok(Extracted { text: paragraphs.join("\n"), pages: None, paragraphs: Some(paragraphs.len()) })
}

fn opens_paragraph(segment: &str) -> bool {
    segment.match_indices("<w:p").any(|(i, _)| matches!(segment.as_bytes().get(i + 4), Some(b'>') | Some(b' ')))
}

/// Concatenated `<w:t>` runs of one paragraph.
fn paragraph_text(segment: &str) -> String {
    let mut out = String::new();
    let mut rest = segment;
    while let Some(i) = rest.find("<w:t") {
        let after = &rest[i + 4..];
        // skip <w:tab>, <w:tbl> and friends
        if !(after.starts_with('>') || after.starts_with(' ')) {
            rest = after;
            continue;
        }
        let Some(gt) = after.find('>') else { break };
        if after[..gt].ends_with('/') {
            rest = &after[gt + 1..];
            continue;
        }
        let body = &after[gt + 1..];
        let Some(end) = body.find("</w:t>") else { break };
        out.push_str(&unescape(&body[..end]));
        rest = &body[end + "</w:t>".len()..];
    }
    out
}

fn unescape(s: &str) -> String {
    s.replace("&lt;", "<").replace("&gt;", ">").replace("&quot;", "\"").replace("&apos;", "'").replace("&amp;", "&")
}
