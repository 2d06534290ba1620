//! File selection and media type validation

use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Validation errors raised before anything reaches the network
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("Please choose an image file (got {media_type})")]
    InvalidFile { media_type: String },

    #[error("Please choose a photo before analyzing")]
    NoFileSelected,
}

/// A file the user picked, before validation
#[derive(Debug, Clone)]
pub struct FileCandidate {
    pub name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl FileCandidate {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes,
        }
    }

    /// Read a candidate from disk, declaring its media type from the extension
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        Ok(Self {
            name,
            media_type: media_type_for_path(path).to_string(),
            bytes,
        })
    }
}

/// Declared media type for a path, judged by extension only
pub fn media_type_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "tif" | "tiff" => "image/tiff",
        _ => "application/octet-stream",
    }
}

/// An accepted image, ready for upload
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedFile {
    name: String,
    media_type: String,
    data: Arc<[u8]>,
}

impl SelectedFile {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

fn is_image_type(media_type: &str) -> bool {
    let essence = media_type.split(';').next().unwrap_or_default().trim();
    essence
        .get(..6)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("image/"))
        && essence.len() > 6
}

/// Holds the user's current file choice
#[derive(Debug, Default)]
pub struct FileSelection {
    current: Option<SelectedFile>,
}

impl FileSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept a candidate if it declares an image media type.
    ///
    /// A rejected candidate leaves the previous selection untouched. File
    /// contents are never inspected.
    pub fn choose(&mut self, candidate: FileCandidate) -> Result<&SelectedFile, SelectionError> {
        if !is_image_type(&candidate.media_type) {
            return Err(SelectionError::InvalidFile {
                media_type: candidate.media_type,
            });
        }

        let selected = SelectedFile {
            name: candidate.name,
            media_type: candidate.media_type.trim().to_string(),
            data: Arc::from(candidate.bytes),
        };
        Ok(self.current.insert(selected))
    }

    pub fn current(&self) -> Option<&SelectedFile> {
        self.current.as_ref()
    }
}
