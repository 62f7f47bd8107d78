use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::model::PropertyCategory;

/// Multipart field name every attached file is sent under.
pub const DOCUMENTS_FIELD: &str = "Documents";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("{field} is required")]
    MissingField { field: &'static str },
    #[error("{field} is not a valid email address")]
    InvalidEmail { field: &'static str },
    #[error("no attachment at position {index} ({len} attached)")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("a submission is already in progress")]
    AlreadySubmitting,
    #[error("no submission is in progress")]
    NotSubmitting,
}

/// A file chosen for upload; forwarded as opaque bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct PendingFile {
    pub name: String,
    pub size: u64,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for PendingFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingFile")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("content_type", &self.content_type)
            .finish()
    }
}

impl PendingFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let content_type = guess_content_type(&name).map(str::to_string);
        Self {
            size: bytes.len() as u64,
            name,
            content_type,
            bytes,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes =
            fs::read(path).with_context(|| format!("reading attachment {}", path.display()))?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .with_context(|| format!("attachment {} has no file name", path.display()))?;
        Ok(Self::new(name, bytes))
    }

    /// Two attachments are the same file when name and size agree.
    pub fn same_file(&self, other: &PendingFile) -> bool {
        self.name == other.name && self.size == other.size
    }
}

fn guess_content_type(name: &str) -> Option<&'static str> {
    let extension = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
    let content_type = match extension.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "txt" => "text/plain",
        _ => return None,
    };
    Some(content_type)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub field: &'static str,
    pub file: PendingFile,
}

/// Multipart payload: scalar text parts followed by file parts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Submission {
    pub fields: Vec<(String, String)>,
    pub files: Vec<FilePart>,
}

impl Submission {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Typed scalar fields of a form.
pub trait FormFields: Default + Clone + fmt::Debug {
    /// Wire name and value of every scalar field, in submission order.
    fn parts(&self) -> Vec<(&'static str, String)>;

    fn validate(&self) -> Result<(), FormError>;
}

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email pattern")
});

fn require(field: &'static str, value: &str) -> Result<(), FormError> {
    if value.trim().is_empty() {
        Err(FormError::MissingField { field })
    } else {
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TitleSearchFields {
    pub property_address: String,
    pub property_city: String,
    pub property_state: String,
    pub property_type: Option<PropertyCategory>,
    pub registration_number: String,
    pub contact_full_name: String,
    pub contact_email: String,
    pub contact_phone: String,
    pub contact_notes: String,
}

impl FormFields for TitleSearchFields {
    fn parts(&self) -> Vec<(&'static str, String)> {
        vec![
            ("propertyAddress", self.property_address.clone()),
            ("PropertyCity", self.property_city.clone()),
            ("PropertyState", self.property_state.clone()),
            (
                "propertyType",
                self.property_type
                    .map(|category| category.to_string())
                    .unwrap_or_default(),
            ),
            ("PropertyRegistrationNumber", self.registration_number.clone()),
            ("ContactFullName", self.contact_full_name.clone()),
            ("ContactEmail", self.contact_email.clone()),
            ("ContactPhone", self.contact_phone.clone()),
            ("ContactNotes", self.contact_notes.clone()),
        ]
    }

    fn validate(&self) -> Result<(), FormError> {
        require("propertyAddress", &self.property_address)?;
        require("PropertyCity", &self.property_city)?;
        require("PropertyState", &self.property_state)?;
        if self.property_type.is_none() {
            return Err(FormError::MissingField {
                field: "propertyType",
            });
        }
        require("ContactFullName", &self.contact_full_name)?;
        require("ContactEmail", &self.contact_email)?;
        if !EMAIL.is_match(self.contact_email.trim()) {
            return Err(FormError::InvalidEmail {
                field: "ContactEmail",
            });
        }
        require("ContactPhone", &self.contact_phone)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmitPhase {
    #[default]
    Idle,
    Submitting,
}

/// Pending input for one submission: typed fields plus attachments.
#[derive(Debug, Clone, Default)]
pub struct FormSession<F: FormFields> {
    pub fields: F,
    files: Vec<PendingFile>,
    phase: SubmitPhase,
}

impl<F: FormFields> FormSession<F> {
    pub fn new(fields: F) -> Self {
        Self {
            fields,
            files: Vec::new(),
            phase: SubmitPhase::Idle,
        }
    }

    pub fn files(&self) -> &[PendingFile] {
        &self.files
    }

    pub fn phase(&self) -> SubmitPhase {
        self.phase
    }

    pub fn is_submitting(&self) -> bool {
        self.phase == SubmitPhase::Submitting
    }

    /// Appends files not already attached (by name and size), returning how
    /// many were added.
    pub fn add_files<I>(&mut self, files: I) -> usize
    where
        I: IntoIterator<Item = PendingFile>,
    {
        let mut added = 0;
        for file in files {
            if self.files.iter().any(|existing| existing.same_file(&file)) {
                tracing::debug!(name = %file.name, size = file.size, "skipping duplicate attachment");
                continue;
            }
            self.files.push(file);
            added += 1;
        }
        added
    }

    pub fn remove_file(&mut self, index: usize) -> Result<PendingFile, FormError> {
        if index >= self.files.len() {
            return Err(FormError::IndexOutOfRange {
                index,
                len: self.files.len(),
            });
        }
        Ok(self.files.remove(index))
    }

    pub fn to_submission(&self) -> Submission {
        let fields = self
            .fields
            .parts()
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect();
        let files = self
            .files
            .iter()
            .cloned()
            .map(|file| FilePart {
                field: DOCUMENTS_FIELD,
                file,
            })
            .collect();
        Submission { fields, files }
    }

    pub fn reset(&mut self) {
        self.fields = F::default();
        self.files.clear();
    }

    /// Validates and moves to `Submitting`, handing back the payload to send.
    pub fn begin_submit(&mut self) -> Result<Submission, FormError> {
        if self.is_submitting() {
            return Err(FormError::AlreadySubmitting);
        }
        self.fields.validate()?;
        self.phase = SubmitPhase::Submitting;
        Ok(self.to_submission())
    }

    /// Returns to `Idle`; input is cleared only when the server confirmed.
    pub fn finish_submit(&mut self, confirmed: bool) -> Result<(), FormError> {
        if !self.is_submitting() {
            return Err(FormError::NotSubmitting);
        }
        self.phase = SubmitPhase::Idle;
        if confirmed {
            self.reset();
        }
        Ok(())
    }
}

pub type TitleSearchSession = FormSession<TitleSearchFields>;

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn file(name: &str, size: usize) -> PendingFile {
        PendingFile::new(name, vec![0u8; size])
    }

    fn filled() -> TitleSearchFields {
        TitleSearchFields {
            property_address: "12 MG Road".into(),
            property_city: "Pune".into(),
            property_state: "MH".into(),
            property_type: Some(PropertyCategory::Residential),
            registration_number: String::new(),
            contact_full_name: "Asha Rao".into(),
            contact_email: "asha@example.com".into(),
            contact_phone: "9999912345".into(),
            contact_notes: "call after 5".into(),
        }
    }

    #[test]
    fn duplicate_name_and_size_is_not_attached_twice() {
        let mut session = TitleSearchSession::default();
        assert_eq!(session.add_files([file("doc.pdf", 100)]), 1);
        assert_eq!(session.add_files([file("doc.pdf", 100)]), 0);
        assert_eq!(session.files().len(), 1);
    }

    #[test]
    fn same_name_different_size_is_a_new_file() {
        let mut session = TitleSearchSession::default();
        session.add_files([file("doc.pdf", 100), file("plan.png", 5)]);
        session.add_files([file("doc.pdf", 101), file("plan.png", 5)]);
        let names: Vec<_> = session
            .files()
            .iter()
            .map(|f| (f.name.as_str(), f.size))
            .collect();
        assert_eq!(names, vec![("doc.pdf", 100), ("plan.png", 5), ("doc.pdf", 101)]);
    }

    #[test]
    fn remove_file_is_bounds_checked() {
        let mut session = TitleSearchSession::default();
        session.add_files([file("a.pdf", 1), file("b.pdf", 2)]);
        let removed = session.remove_file(0).expect("in range");
        assert_eq!(removed.name, "a.pdf");
        assert_eq!(
            session.remove_file(5),
            Err(FormError::IndexOutOfRange { index: 5, len: 1 })
        );
        assert_eq!(session.files().len(), 1);
    }

    #[test]
    fn submission_repeats_documents_part() {
        let mut session = TitleSearchSession::new(filled());
        session.add_files([file("a.pdf", 3), file("b.jpg", 4)]);
        let submission = session.to_submission();
        assert_eq!(submission.field("PropertyCity"), Some("Pune"));
        assert_eq!(submission.field("propertyType"), Some("Residential"));
        assert_eq!(submission.fields.len(), 9);
        assert_eq!(submission.files.len(), 2);
        assert!(submission.files.iter().all(|part| part.field == "Documents"));
        assert_eq!(
            submission.files[1].file.content_type.as_deref(),
            Some("image/jpeg")
        );
    }

    #[test]
    fn confirmed_submit_resets_session() {
        let mut session = TitleSearchSession::new(filled());
        session.add_files([file("a.pdf", 3)]);
        session.begin_submit().expect("valid");
        assert!(session.is_submitting());
        session.finish_submit(true).expect("in flight");
        assert_eq!(session.phase(), SubmitPhase::Idle);
        assert_eq!(session.fields, TitleSearchFields::default());
        assert!(session.files().is_empty());
    }

    #[test]
    fn failed_submit_keeps_input() {
        let mut session = TitleSearchSession::new(filled());
        session.add_files([file("a.pdf", 3)]);
        session.begin_submit().expect("valid");
        session.finish_submit(false).expect("in flight");
        assert_eq!(session.fields, filled());
        assert_eq!(session.files().len(), 1);
    }

    #[test]
    fn reentrant_submit_is_rejected() {
        let mut session = TitleSearchSession::new(filled());
        session.begin_submit().expect("valid");
        assert_matches!(session.begin_submit(), Err(FormError::AlreadySubmitting));
        assert_matches!(
            TitleSearchSession::default().finish_submit(true),
            Err(FormError::NotSubmitting)
        );
    }

    #[test]
    fn validation_names_the_first_missing_field() {
        let mut fields = filled();
        fields.property_city = "  ".into();
        assert_eq!(
            fields.validate(),
            Err(FormError::MissingField {
                field: "PropertyCity"
            })
        );

        let mut fields = filled();
        fields.contact_email = "asha.example.com".into();
        assert_matches!(fields.validate(), Err(FormError::InvalidEmail { .. }));

        let mut session = TitleSearchSession::new(TitleSearchFields::default());
        assert_matches!(session.begin_submit(), Err(FormError::MissingField { .. }));
        assert!(!session.is_submitting());
    }

    #[test]
    fn pending_file_reads_from_disk() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("deed.PDF");
        std::fs::write(&path, b"%PDF-1.4")?;
        let file = PendingFile::from_path(&path)?;
        assert_eq!(file.name, "deed.PDF");
        assert_eq!(file.size, 8);
        assert_eq!(file.content_type.as_deref(), Some("application/pdf"));
        Ok(())
    }
}
