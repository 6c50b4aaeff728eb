//! Plain text extraction from study documents.
//!
//! Word and EPUB files are zip archives of XML, so both go through the same
//! tag stripper after picking the right entries.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;
use zip::ZipArchive;

use crate::error::{Result, StudyError};

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());
static BLOCK_END: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</(p|div|h[1-6]|li|blockquote|tr)\s*>|<br\s*/?>").unwrap()
});
static BLANK_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\s*\n\s*").unwrap());

pub trait TextExtractor {
    fn extract(&self, path: &Path) -> Result<String>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FileExtractor;

impl TextExtractor for FileExtractor {
    fn extract(&self, path: &Path) -> Result<String> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let text = match ext.as_str() {
            "txt" | "md" => std::fs::read_to_string(path)
                .map_err(|e| StudyError::extraction(path, e))?,
            "docx" => extract_docx(path)?,
            "epub" => extract_epub(path)?,
            "" => return Err(StudyError::UnsupportedFormat("file has no extension".into())),
            other => return Err(StudyError::UnsupportedFormat(format!(".{}", other))),
        };

        debug!(path = %path.display(), chars = text.len(), "extracted text");
        Ok(text)
    }
}

fn open_archive(path: &Path) -> Result<ZipArchive<File>> {
    let file = File::open(path).map_err(|e| StudyError::extraction(path, e))?;
    ZipArchive::new(file).map_err(|e| StudyError::extraction(path, e))
}

fn read_entry(archive: &mut ZipArchive<File>, name: &str, path: &Path) -> Result<String> {
    let mut entry = archive
        .by_name(name)
        .map_err(|e| StudyError::extraction(path, format!("{}: {}", name, e)))?;
    let mut xml = String::new();
    entry
        .read_to_string(&mut xml)
        .map_err(|e| StudyError::extraction(path, e))?;
    Ok(xml)
}

fn extract_docx(path: &Path) -> Result<String> {
    let mut archive = open_archive(path)?;
    let xml = read_entry(&mut archive, "word/document.xml", path)?;
    Ok(markup_to_text(&xml.replace("</w:p>", "\n\n")))
}

fn extract_epub(path: &Path) -> Result<String> {
    let mut archive = open_archive(path)?;
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|n| {
            let lower = n.to_ascii_lowercase();
            lower.ends_with(".xhtml") || lower.ends_with(".html")
        })
        .map(String::from)
        .collect();
    names.sort();

    if names.is_empty() {
        return Err(StudyError::extraction(path, "no content documents in archive"));
    }

    let mut sections = Vec::with_capacity(names.len());
    for name in &names {
        let html = read_entry(&mut archive, name, path)?;
        let html = BLOCK_END.replace_all(&html, "\n\n");
        let text = markup_to_text(&body_of(&html));
        if !text.is_empty() {
            sections.push(text);
        }
    }
    Ok(sections.join("\n\n"))
}

/// Everything inside `<body>`, or the whole document when there is none.
fn body_of(html: &str) -> String {
    let lower = html.to_ascii_lowercase();
    let start = lower
        .find("<body")
        .and_then(|i| lower[i..].find('>').map(|j| i + j + 1));
    let end = lower.rfind("</body>");
    match (start, end) {
        (Some(s), Some(e)) if s <= e => html[s..e].to_string(),
        _ => html.to_string(),
    }
}

/// Strip tags, decode the common entities and collapse blank-line runs to
/// single paragraph breaks.
pub fn markup_to_text(markup: &str) -> String {
    let stripped = TAG.replace_all(markup, "");
    let decoded = stripped
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&");

    let lines: Vec<&str> = decoded.lines().map(str::trim).collect();
    let joined = lines.join("\n");
    BLANK_RUNS.replace_all(joined.trim(), "\n\n").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        for (name, body) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn plain_text_and_markdown() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.MD");
        std::fs::write(&path, "# Title\n\nBody text.").unwrap();
        assert_eq!(FileExtractor.extract(&path).unwrap(), "# Title\n\nBody text.");
    }

    #[test]
    fn docx_paragraphs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("essay.docx");
        write_zip(
            &path,
            &[(
                "word/document.xml",
                "<w:document><w:body><w:p><w:r><w:t>First paragraph.</w:t></w:r></w:p>\
                 <w:p><w:r><w:t>Salt &amp; pepper.</w:t></w:r></w:p></w:body></w:document>",
            )],
        );
        assert_eq!(
            FileExtractor.extract(&path).unwrap(),
            "First paragraph.\n\nSalt & pepper."
        );
    }

    #[test]
    fn epub_chapters_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.epub");
        write_zip(
            &path,
            &[
                ("mimetype", "application/epub+zip"),
                ("OEBPS/ch2.xhtml", "<html><head><title>x</title></head><body><p>Two.</p></body></html>"),
                ("OEBPS/ch1.xhtml", "<html><body><h1>One</h1><p>Start here.</p></body></html>"),
            ],
        );
        assert_eq!(FileExtractor.extract(&path).unwrap(), "One\n\nStart here.\n\nTwo.");
    }

    #[test]
    fn unsupported_and_broken_files() {
        let dir = tempfile::tempdir().unwrap();

        let pdf = dir.path().join("paper.pdf");
        std::fs::write(&pdf, "%PDF").unwrap();
        assert!(matches!(
            FileExtractor.extract(&pdf),
            Err(StudyError::UnsupportedFormat(_))
        ));

        let docx = dir.path().join("broken.docx");
        std::fs::write(&docx, "not a zip").unwrap();
        assert!(matches!(
            FileExtractor.extract(&docx),
            Err(StudyError::Extraction { .. })
        ));

        assert!(matches!(
            FileExtractor.extract(&dir.path().join("missing.txt")),
            Err(StudyError::Extraction { .. })
        ));
    }
}
