use crate::api::UploadPart;
use crate::api::error::ClientError;
use crate::config::UploadLimits;
use crate::models::{Category, CategoryScheme};
use crate::services::preview::{PreviewHandle, PreviewRegistry};
use crate::utils::hash::{content_fingerprint, short_fingerprint};
use crate::utils::validation::{ValidationError, detect_mime, validate_image};
use bytes::Bytes;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use uuid::Uuid;

/// A file picked or dropped by the user, not yet checked.
#[derive(Debug, Clone)]
pub struct LocalFile {
    pub name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl LocalFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content_type: None,
            bytes: bytes.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Reads a file from disk, sniffing its type from content and extension.
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();
        let content_type = detect_mime(&bytes, &name);
        Ok(Self {
            name,
            content_type: Some(content_type),
            bytes: Bytes::from(bytes),
        })
    }

    pub fn tagged(self, category: Category) -> Selection {
        Selection {
            file: self,
            category: Some(category),
        }
    }
}

/// A file offered to the queue, optionally with the category the user chose.
#[derive(Debug, Clone)]
pub struct Selection {
    pub file: LocalFile,
    pub category: Option<Category>,
}

impl From<LocalFile> for Selection {
    fn from(file: LocalFile) -> Self {
        Self {
            file,
            category: None,
        }
    }
}

/// A photo accepted into the queue.
#[derive(Debug)]
pub struct StagedFile {
    local_id: Uuid,
    bytes: Bytes,
    display_name: String,
    mime_type: String,
    category: Category,
    fingerprint: String,
    preview: PreviewHandle,
}

impl StagedFile {
    pub fn local_id(&self) -> Uuid {
        self.local_id
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn byte_size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn preview(&self) -> &PreviewHandle {
        &self.preview
    }

    pub fn to_part(&self) -> UploadPart {
        UploadPart {
            file_name: self.display_name.clone(),
            mime_type: self.mime_type.clone(),
            bytes: self.bytes.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    TooManyFiles { limit: usize },
    Invalid(ValidationError),
    CategoryNotAllowed(Category),
    Duplicate { existing: Uuid },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::TooManyFiles { limit } => {
                write!(f, "At most {} photos can be attached", limit)
            }
            RejectReason::Invalid(e) => f.write_str(&e.message),
            RejectReason::CategoryNotAllowed(c) => {
                write!(f, "'{}' is not a category for this form", c.label())
            }
            RejectReason::Duplicate { .. } => f.write_str("This photo is already attached"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub name: String,
    pub reason: RejectReason,
}

/// Outcome of one `add` call. Rejected files are reported, never queued.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddReport {
    pub accepted: Vec<Uuid>,
    pub rejected: Vec<Rejection>,
}

impl AddReport {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// Photos staged for a claim, each filed under one category of a fixed
/// scheme.
///
/// Every staged file owns a preview; removing the file, clearing the queue or
/// dropping the queue releases it.
#[derive(Debug)]
pub struct UploadQueue {
    scheme: CategoryScheme,
    limits: UploadLimits,
    previews: PreviewRegistry,
    files: Vec<StagedFile>,
}

impl UploadQueue {
    pub fn new(scheme: CategoryScheme, limits: UploadLimits, previews: PreviewRegistry) -> Self {
        Self {
            scheme,
            limits,
            previews,
            files: Vec::new(),
        }
    }

    pub fn scheme(&self) -> CategoryScheme {
        self.scheme
    }

    pub fn previews(&self) -> &PreviewRegistry {
        &self.previews
    }

    pub fn add<I, S>(&mut self, selections: I) -> AddReport
    where
        I: IntoIterator<Item = S>,
        S: Into<Selection>,
    {
        let mut report = AddReport::default();

        for selection in selections {
            let Selection { file, category } = selection.into();
            match self.stage(file.clone(), category) {
                Ok(id) => report.accepted.push(id),
                Err(reason) => {
                    tracing::warn!("Rejected '{}': {}", file.name, reason);
                    report.rejected.push(Rejection {
                        name: file.name,
                        reason,
                    });
                }
            }
        }

        report
    }

    fn stage(&mut self, file: LocalFile, category: Option<Category>) -> Result<Uuid, RejectReason> {
        if self.files.len() >= self.limits.max_files {
            return Err(RejectReason::TooManyFiles {
                limit: self.limits.max_files,
            });
        }

        let checked = validate_image(
            &file.name,
            file.content_type.as_deref(),
            &file.bytes,
            self.limits.max_file_size,
        )
        .map_err(RejectReason::Invalid)?;

        let category = match category {
            Some(c) if !self.scheme.allows(c) => return Err(RejectReason::CategoryNotAllowed(c)),
            Some(c) => c,
            None => self.next_category(),
        };

        let fingerprint = content_fingerprint(&file.bytes);
        if let Some(existing) = self.files.iter().find(|f| f.fingerprint == fingerprint) {
            return Err(RejectReason::Duplicate {
                existing: existing.local_id,
            });
        }

        let local_id = Uuid::new_v4();
        tracing::debug!(
            "Staged '{}' as {} ({} bytes, {})",
            checked.file_name,
            category,
            file.bytes.len(),
            short_fingerprint(&fingerprint)
        );

        self.files.push(StagedFile {
            local_id,
            preview: self.previews.allocate(file.bytes.clone()),
            bytes: file.bytes,
            display_name: checked.file_name,
            mime_type: checked.mime_type,
            category,
            fingerprint,
        });

        Ok(local_id)
    }

    /// First required category with nothing staged yet.
    fn next_category(&self) -> Category {
        let required = self.scheme.required();
        required
            .iter()
            .copied()
            .find(|c| !self.files.iter().any(|f| f.category == *c))
            .unwrap_or(required[0])
    }

    pub fn remove(&mut self, local_id: Uuid) -> bool {
        let before = self.files.len();
        self.files.retain(|f| f.local_id != local_id);
        before != self.files.len()
    }

    pub fn set_category(&mut self, local_id: Uuid, category: Category) -> Result<(), ClientError> {
        if !self.scheme.allows(category) {
            return Err(ClientError::CategoryNotAllowed {
                category,
                scheme: self.scheme,
            });
        }

        let file = self
            .files
            .iter_mut()
            .find(|f| f.local_id == local_id)
            .ok_or(ClientError::UnknownFile(local_id))?;
        file.category = category;
        Ok(())
    }

    /// Staged count per category; categories with no files are absent.
    pub fn coverage(&self) -> BTreeMap<Category, usize> {
        let mut coverage = BTreeMap::new();
        for file in &self.files {
            *coverage.entry(file.category).or_insert(0) += 1;
        }
        coverage
    }

    pub fn missing_categories(&self) -> Vec<Category> {
        let coverage = self.coverage();
        self.scheme
            .required()
            .iter()
            .copied()
            .filter(|c| !coverage.contains_key(c))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_categories().is_empty()
    }

    pub fn get(&self, local_id: Uuid) -> Option<&StagedFile> {
        self.files.iter().find(|f| f.local_id == local_id)
    }

    pub fn files(&self) -> &[StagedFile] {
        &self.files
    }

    pub fn parts(&self) -> Vec<UploadPart> {
        self.files.iter().map(StagedFile::to_part).collect()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(StagedFile::byte_size).sum()
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }
}
