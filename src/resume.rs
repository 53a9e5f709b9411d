use anyhow::{Context, Result};
use log::{debug, error};
use std::path::Path;
use std::sync::Arc;

use crate::db::{Database, RESUME_KEY};
use crate::document;

/// Durable copy of the resume text. Each save supersedes the previous one.
#[derive(Clone)]
pub struct ResumeStore {
    db: Arc<Database>,
}

impl ResumeStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn load(&self) -> String {
        match self.db.get(RESUME_KEY) {
            Ok(text) => text.unwrap_or_default(),
            Err(e) => {
                error!("failed to load saved resume: {:#}", e);
                String::new()
            }
        }
    }

    pub fn save(&self, text: &str) -> Result<()> {
        debug!("saving resume ({} chars)", text.len());
        self.db.set(RESUME_KEY, text)
    }

    pub fn saved_at(&self) -> Option<String> {
        self.db.updated_at(RESUME_KEY).ok().flatten()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeKind {
    Pdf,
    Text,
}

impl ResumeKind {
    pub fn classify(path: &Path, bytes: &[u8]) -> Self {
        let has_pdf_extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if has_pdf_extension || bytes.starts_with(b"%PDF-") {
            ResumeKind::Pdf
        } else {
            ResumeKind::Text
        }
    }
}

/// Reads a resume file: PDFs go through the text extractor, anything else is
/// taken as plain text.
pub fn read_resume_file(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read resume file: {}", path.display()))?;
    match ResumeKind::classify(path, &bytes) {
        ResumeKind::Pdf => Ok(document::extract_text(&bytes)?),
        ResumeKind::Text => String::from_utf8(bytes)
            .with_context(|| format!("Resume file is not valid UTF-8: {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_is_empty_when_nothing_saved() {
        let store = ResumeStore::new(Arc::new(Database::open_in_memory().unwrap()));
        assert_eq!(store.load(), "");
    }

    #[test]
    fn test_save_supersedes_previous_text() {
        let store = ResumeStore::new(Arc::new(Database::open_in_memory().unwrap()));
        store.save("Rust engineer, 5 years").unwrap();
        store.save("Go engineer").unwrap();
        assert_eq!(store.load(), "Go engineer");
    }

    #[test]
    fn test_classify_by_extension_or_magic() {
        assert_eq!(ResumeKind::classify(Path::new("cv.PDF"), b""), ResumeKind::Pdf);
        assert_eq!(
            ResumeKind::classify(Path::new("cv.bin"), b"%PDF-1.7\n..."),
            ResumeKind::Pdf
        );
        assert_eq!(ResumeKind::classify(Path::new("cv.txt"), b"Jane Doe"), ResumeKind::Text);
    }

    #[test]
    fn test_read_resume_file_plain_text() {
        let mut file = tempfile::NamedTempFile::with_suffix(".md").unwrap();
        write!(file, "# Jane Doe\nRust, SQL").unwrap();
        assert_eq!(read_resume_file(file.path()).unwrap(), "# Jane Doe\nRust, SQL");
    }

    #[test]
    fn test_read_resume_file_broken_pdf_fails() {
        let mut file = tempfile::NamedTempFile::with_suffix(".pdf").unwrap();
        file.write_all(b"not really a pdf").unwrap();
        assert!(read_resume_file(file.path()).is_err());
    }
}
