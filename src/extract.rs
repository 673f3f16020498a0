//! Per-format text extraction.
//!
//! Converts raw document bytes into a single normalized text blob.
//! Dispatch is keyed on an enumerated [`FileKind`] resolved from the file
//! extension once, at scan time. Extraction failures are returned as
//! [`ExtractError`] and the pipeline skips that document; one bad file
//! never aborts the rest of a folder.

use std::io::Read;
use std::path::Path;

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Supported document formats, keyed by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Docx,
    Csv,
    Markdown,
    Html,
    Text,
}

impl FileKind {
    /// Resolve the format tag from a path's extension. `None` means the
    /// file is unsupported and should be skipped with a log note.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "pdf" => Some(FileKind::Pdf),
            "docx" => Some(FileKind::Docx),
            "csv" => Some(FileKind::Csv),
            "md" | "markdown" => Some(FileKind::Markdown),
            "html" | "htm" => Some(FileKind::Html),
            "txt" => Some(FileKind::Text),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Pdf => "pdf",
            FileKind::Docx => "docx",
            FileKind::Csv => "csv",
            FileKind::Markdown => "md",
            FileKind::Html => "html",
            FileKind::Text => "txt",
        }
    }
}

/// Extraction error. Never panics; the pipeline records it and moves on.
#[derive(Debug)]
pub enum ExtractError {
    Pdf(String),
    Docx(String),
    Html(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
            ExtractError::Docx(e) => write!(f, "DOCX extraction failed: {}", e),
            ExtractError::Html(e) => write!(f, "HTML extraction failed: {}", e),
        }
    }
}

impl std::error::Error for ExtractError {}

/// Extracts normalized plain text from document bytes.
pub fn extract_text(bytes: &[u8], kind: FileKind) -> Result<String, ExtractError> {
    match kind {
        FileKind::Pdf => extract_pdf(bytes),
        FileKind::Docx => extract_docx(bytes),
        FileKind::Csv => Ok(render_csv_table(&String::from_utf8_lossy(bytes))),
        FileKind::Markdown => Ok(strip_markdown(&String::from_utf8_lossy(bytes))),
        FileKind::Html => extract_html(bytes),
        FileKind::Text => Ok(String::from_utf8_lossy(bytes).into_owned()),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    let mut doc_xml = Vec::new();
    let mut found = false;
    for i in 0..archive.len() {
        let entry = archive
            .by_index(i)
            .map_err(|e| ExtractError::Docx(e.to_string()))?;
        if entry.name() == "word/document.xml" {
            entry
                .take(MAX_XML_ENTRY_BYTES)
                .read_to_end(&mut doc_xml)
                .map_err(|e| ExtractError::Docx(e.to_string()))?;
            if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
                return Err(ExtractError::Docx(
                    "word/document.xml exceeds size limit".to_string(),
                ));
            }
            found = true;
            break;
        }
    }
    if !found {
        return Err(ExtractError::Docx(
            "word/document.xml not found".to_string(),
        ));
    }
    extract_docx_paragraphs(&doc_xml)
}

/// Walk `w:t` text runs, emitting a newline at each `w:p` paragraph end.
fn extract_docx_paragraphs(xml: &[u8]) -> Result<String, ExtractError> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    if let Ok(quick_xml::events::Event::Text(te)) = reader.read_event_into(&mut buf)
                    {
                        out.push_str(te.unescape().unwrap_or_default().as_ref());
                    }
                }
            }
            Ok(quick_xml::events::Event::End(e)) => {
                if e.local_name().as_ref() == b"p" && !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Docx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out.trim().to_string())
}

/// Strip markup from an HTML document, skipping `script`/`style` content.
fn extract_html(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut reader = quick_xml::Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);
    reader.config_mut().check_end_names = false;

    let mut fragments: Vec<String> = Vec::new();
    let mut skip_depth = 0usize;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if is_non_content_tag(e.local_name().as_ref()) {
                    skip_depth += 1;
                }
            }
            Ok(quick_xml::events::Event::End(e)) => {
                if is_non_content_tag(e.local_name().as_ref()) {
                    skip_depth = skip_depth.saturating_sub(1);
                }
            }
            Ok(quick_xml::events::Event::Text(te)) if skip_depth == 0 => {
                let text = match te.unescape() {
                    Ok(cow) => cow.into_owned(),
                    // Unknown entities are kept verbatim rather than dropped.
                    Err(_) => String::from_utf8_lossy(te.as_ref()).into_owned(),
                };
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    fragments.push(trimmed.to_string());
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Html(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(fragments.join("\n"))
}

fn is_non_content_tag(name: &[u8]) -> bool {
    name == b"script" || name == b"style"
}

/// Render CSV content as a flat, space-aligned text table.
fn render_csv_table(raw: &str) -> String {
    let rows = parse_csv_rows(raw);
    if rows.is_empty() {
        return String::new();
    }

    let columns = rows.iter().map(|r| r.len()).max().unwrap_or(0);
    let mut widths = vec![0usize; columns];
    for row in &rows {
        for (i, field) in row.iter().enumerate() {
            widths[i] = widths[i].max(field.chars().count());
        }
    }

    let mut lines = Vec::with_capacity(rows.len());
    for row in &rows {
        let mut cells = Vec::with_capacity(row.len());
        for (i, field) in row.iter().enumerate() {
            let pad = widths[i] - field.chars().count();
            cells.push(format!("{}{}", field, " ".repeat(pad)));
        }
        lines.push(cells.join("  ").trim_end().to_string());
    }
    lines.join("\n")
}

/// Minimal CSV reader: comma-separated fields, double-quoted fields with
/// `""` escapes, rows on newlines. Tolerant of trailing newlines.
fn parse_csv_rows(raw: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' => {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        field.push('"');
                    } else {
                        in_quotes = false;
                    }
                }
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' => in_quotes = true,
            ',' => {
                row.push(std::mem::take(&mut field));
            }
            '\r' => {}
            '\n' => {
                row.push(std::mem::take(&mut field));
                if row.iter().any(|f| !f.is_empty()) {
                    rows.push(std::mem::take(&mut row));
                } else {
                    row.clear();
                }
            }
            _ => field.push(c),
        }
    }
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        if row.iter().any(|f| !f.is_empty()) {
            rows.push(row);
        }
    }
    rows
}

/// Strip Markdown markup down to plain text: headings, blockquotes, list
/// markers, emphasis, inline code, fences, links, and images.
fn strip_markdown(raw: &str) -> String {
    let mut out = String::new();
    let mut in_fence = false;

    for line in raw.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            out.push_str(line);
            out.push('\n');
            continue;
        }

        let mut rest = trimmed;
        while let Some(stripped) = rest.strip_prefix('#') {
            rest = stripped;
        }
        while let Some(stripped) = rest.strip_prefix('>') {
            rest = stripped.trim_start();
        }
        for marker in ["- ", "* ", "+ "] {
            if let Some(stripped) = rest.strip_prefix(marker) {
                rest = stripped;
                break;
            }
        }
        rest = strip_ordered_list_marker(rest);

        out.push_str(&strip_inline_markup(rest.trim_start()));
        out.push('\n');
    }
    out.trim().to_string()
}

fn strip_ordered_list_marker(line: &str) -> &str {
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        if let Some(rest) = line[digits..].strip_prefix(". ") {
            return rest;
        }
    }
    line
}

/// Resolve `![alt](url)` and `[text](url)` to their labels, then drop
/// emphasis and inline-code characters.
fn strip_inline_markup(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '!' if chars.peek() == Some(&'[') => {}
            '[' => {
                let mut label = String::new();
                for inner in chars.by_ref() {
                    if inner == ']' {
                        break;
                    }
                    label.push(inner);
                }
                if chars.peek() == Some(&'(') {
                    chars.next();
                    for inner in chars.by_ref() {
                        if inner == ')' {
                            break;
                        }
                    }
                }
                out.push_str(&label);
            }
            '*' | '`' => {}
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn docx_bytes(xml_body: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut archive = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            archive
                .start_file("word/document.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            archive.write_all(xml_body.as_bytes()).unwrap();
            archive.finish().unwrap();
        }
        buf
    }

    #[test]
    fn test_file_kind_from_extension() {
        assert_eq!(FileKind::from_path(Path::new("a/b/guide.PDF")), Some(FileKind::Pdf));
        assert_eq!(FileKind::from_path(Path::new("notes.md")), Some(FileKind::Markdown));
        assert_eq!(FileKind::from_path(Path::new("page.htm")), Some(FileKind::Html));
        assert_eq!(FileKind::from_path(Path::new("data.csv")), Some(FileKind::Csv));
        assert_eq!(FileKind::from_path(Path::new("report.docx")), Some(FileKind::Docx));
        assert_eq!(FileKind::from_path(Path::new("archive.tar.gz")), None);
        assert_eq!(FileKind::from_path(Path::new("no_extension")), None);
    }

    #[test]
    fn test_invalid_pdf_returns_error() {
        let err = extract_text(b"not a pdf", FileKind::Pdf).unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }

    #[test]
    fn test_invalid_zip_returns_error_for_docx() {
        let err = extract_text(b"not a zip", FileKind::Docx).unwrap_err();
        assert!(matches!(err, ExtractError::Docx(_)));
    }

    #[test]
    fn test_docx_without_document_xml_returns_error() {
        let mut buf = Vec::new();
        {
            let mut archive = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            archive
                .start_file("other.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            archive.write_all(b"<x/>").unwrap();
            archive.finish().unwrap();
        }
        let err = extract_text(&buf, FileKind::Docx).unwrap_err();
        assert!(matches!(err, ExtractError::Docx(_)));
    }

    #[test]
    fn test_docx_paragraphs_joined_by_newline() {
        let bytes = docx_bytes(
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>\
             <w:p><w:r><w:t>First paragraph.</w:t></w:r></w:p>\
             <w:p><w:r><w:t>Second paragraph.</w:t></w:r></w:p>\
             </w:body></w:document>",
        );
        let text = extract_text(&bytes, FileKind::Docx).unwrap();
        assert_eq!(text, "First paragraph.\nSecond paragraph.");
    }

    #[test]
    fn test_plain_text_read_as_is() {
        let text = extract_text("hello support\n".as_bytes(), FileKind::Text).unwrap();
        assert_eq!(text, "hello support\n");
    }

    #[test]
    fn test_csv_rendered_as_flat_table() {
        let text =
            extract_text(b"name,plan\nalice,premium\nbob,free\n", FileKind::Csv).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "name   plan");
        assert_eq!(lines[1], "alice  premium");
        assert_eq!(lines[2], "bob    free");
    }

    #[test]
    fn test_csv_quoted_fields() {
        let text = extract_text(b"q,a\n\"reset, please\",\"say \"\"ok\"\"\"\n", FileKind::Csv)
            .unwrap();
        assert!(text.contains("reset, please"));
        assert!(text.contains("say \"ok\""));
    }

    #[test]
    fn test_markdown_markup_stripped() {
        let md = "# Title\n\nSome **bold** and *italic* and `code`.\n\n- item one\n- item two\n\n[docs](https://example.com) and ![logo](img.png)\n";
        let text = extract_text(md.as_bytes(), FileKind::Markdown).unwrap();
        assert!(text.contains("Title"));
        assert!(text.contains("Some bold and italic and code."));
        assert!(text.contains("item one"));
        assert!(text.contains("docs and logo"));
        assert!(!text.contains('#'));
        assert!(!text.contains('*'));
        assert!(!text.contains("]("));
    }

    #[test]
    fn test_markdown_fences_keep_code_text() {
        let md = "before\n```\nlet x = 1;\n```\nafter\n";
        let text = extract_text(md.as_bytes(), FileKind::Markdown).unwrap();
        assert!(text.contains("let x = 1;"));
        assert!(!text.contains("```"));
    }

    #[test]
    fn test_html_markup_stripped() {
        let html = b"<html><body><h1>Refunds</h1><p>Allow <b>5</b> days.</p></body></html>";
        let text = extract_text(html, FileKind::Html).unwrap();
        assert!(text.contains("Refunds"));
        assert!(text.contains("Allow"));
        assert!(text.contains("days."));
        assert!(!text.contains('<'));
    }

    #[test]
    fn test_html_script_and_style_skipped() {
        let html =
            b"<html><head><style>p { color: red }</style></head><body><script>var x = 1;</script><p>visible</p></body></html>";
        let text = extract_text(html, FileKind::Html).unwrap();
        assert!(text.contains("visible"));
        assert!(!text.contains("color"));
        assert!(!text.contains("var x"));
    }
}
