//! Upload selections and their server-side results.
//!
//! An upload is either a single archive or a folder: an ordered set of
//! files, each tagged with its path relative to the selected folder root.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ── Constants ────────────────────────────────────────────────────────

/// Media type browsers report for `.zip` files.
pub const MEDIA_TYPE_ZIP: &str = "application/zip";

/// Media type some Windows browsers report for `.zip` files.
pub const MEDIA_TYPE_ZIP_COMPRESSED: &str = "application/x-zip-compressed";

/// Fallback media type for anything that is not an archive.
pub const MEDIA_TYPE_OCTET_STREAM: &str = "application/octet-stream";

/// Media types that identify an archive upload.
pub const ARCHIVE_MEDIA_TYPES: &[&str] = &[MEDIA_TYPE_ZIP, MEDIA_TYPE_ZIP_COMPRESSED];

// ── Types ────────────────────────────────────────────────────────────

/// A single file picked or dropped by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    /// Path relative to the selected folder root, or the bare file name
    /// for an archive (e.g. "shop/shop_interface/views.py").
    pub relative_path: String,
    /// Media type as reported by the picker (e.g. "application/zip").
    pub media_type: String,
    /// Raw file contents.
    pub contents: Vec<u8>,
}

impl UploadFile {
    pub fn new(
        relative_path: impl Into<String>,
        media_type: impl Into<String>,
        contents: Vec<u8>,
    ) -> Self {
        Self {
            relative_path: relative_path.into(),
            media_type: media_type.into(),
            contents,
        }
    }

    /// Returns `true` if the media type identifies an archive.
    pub fn is_archive(&self) -> bool {
        is_archive_media_type(&self.media_type)
    }

    /// The last path component (e.g. "views.py").
    pub fn file_name(&self) -> &str {
        self.relative_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.relative_path)
    }
}

/// What the user asked to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadSelection {
    /// One compressed file containing the project tree.
    Archive(UploadFile),
    /// Individually selected files sharing a common root.
    Folder(Vec<UploadFile>),
}

impl UploadSelection {
    /// Classify a raw picker result.
    ///
    /// Returns `None` for an empty selection. When the first file is an
    /// archive only that file is kept; otherwise every file is treated as
    /// part of a folder upload.
    pub fn from_files(mut files: Vec<UploadFile>) -> Option<Self> {
        if files.is_empty() {
            return None;
        }
        if files[0].is_archive() {
            files.truncate(1);
            return files.pop().map(Self::Archive);
        }
        Some(Self::Folder(files))
    }

    /// Build an archive selection, validating the media type.
    pub fn archive(file: UploadFile) -> Result<Self, CoreError> {
        if !file.is_archive() {
            return Err(CoreError::Validation(format!(
                "'{}' has media type '{}', expected one of: {}",
                file.relative_path,
                file.media_type,
                ARCHIVE_MEDIA_TYPES.join(", ")
            )));
        }
        Ok(Self::Archive(file))
    }

    /// Build a folder selection. Rejects empty sets and blank paths.
    pub fn folder(files: Vec<UploadFile>) -> Result<Self, CoreError> {
        if files.is_empty() {
            return Err(CoreError::Validation(
                "Folder upload requires at least one file".to_string(),
            ));
        }
        if let Some(blank) = files.iter().position(|f| f.relative_path.trim().is_empty()) {
            return Err(CoreError::Validation(format!(
                "File {blank} in folder upload has an empty relative path"
            )));
        }
        Ok(Self::Folder(files))
    }

    pub fn is_archive(&self) -> bool {
        matches!(self, Self::Archive(_))
    }

    /// Number of files in the selection (always at least one).
    pub fn len(&self) -> usize {
        match self {
            Self::Archive(_) => 1,
            Self::Folder(files) => files.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over the files in upload order.
    pub fn files(&self) -> impl Iterator<Item = &UploadFile> {
        let slice: &[UploadFile] = match self {
            Self::Archive(file) => std::slice::from_ref(file),
            Self::Folder(files) => files,
        };
        slice.iter()
    }

    /// Sum of all file sizes in bytes.
    pub fn total_bytes(&self) -> u64 {
        self.files().map(|f| f.contents.len() as u64).sum()
    }
}

/// Outcome of one upload attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    pub success: bool,
    /// Server-side directory the upload was unpacked into.
    pub extract_path: Option<String>,
    pub message: Option<String>,
}

impl UploadResult {
    /// The extraction path, if the upload succeeded and reported one.
    pub fn usable_extract_path(&self) -> Option<&str> {
        if !self.success {
            return None;
        }
        self.extract_path.as_deref().filter(|p| !p.trim().is_empty())
    }
}

/// Options forwarded verbatim to the extraction service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionOptions {
    pub include_method_dependencies: bool,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            include_method_dependencies: true,
        }
    }
}

// ── Pure Functions ───────────────────────────────────────────────────

/// Returns `true` for media types that identify an archive upload.
pub fn is_archive_media_type(media_type: &str) -> bool {
    let normalized = media_type.trim().to_ascii_lowercase();
    ARCHIVE_MEDIA_TYPES.contains(&normalized.as_str())
}

/// Guess a media type from a file path (case-insensitive extension).
pub fn media_type_for_path(path: &str) -> &'static str {
    let is_zip = path
        .rsplit_once('.')
        .is_some_and(|(_, ext)| ext.eq_ignore_ascii_case("zip"));
    if is_zip {
        MEDIA_TYPE_ZIP
    } else {
        MEDIA_TYPE_OCTET_STREAM
    }
}

/// Returns `true` if the file name represents a hidden or system file.
pub fn is_hidden_or_system(file_name: &str) -> bool {
    file_name.starts_with('.') || file_name == "Thumbs.db" || file_name == "desktop.ini"
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn zip(name: &str) -> UploadFile {
        UploadFile::new(name, MEDIA_TYPE_ZIP, b"PK\x03\x04".to_vec())
    }

    fn source(path: &str) -> UploadFile {
        UploadFile::new(path, "text/x-python", b"print()".to_vec())
    }

    // -- from_files --

    #[test]
    fn empty_selection_is_none() {
        assert!(UploadSelection::from_files(vec![]).is_none());
    }

    #[test]
    fn first_archive_wins() {
        let selection =
            UploadSelection::from_files(vec![zip("proj.zip"), source("extra.py")]).unwrap();
        assert_matches!(&selection, UploadSelection::Archive(f) if f.relative_path == "proj.zip");
        assert_eq!(selection.len(), 1);
    }

    #[test]
    fn non_archive_files_become_folder() {
        let selection = UploadSelection::from_files(vec![
            source("shop/models.py"),
            source("shop/views.py"),
        ])
        .unwrap();
        assert!(!selection.is_archive());
        assert_eq!(selection.len(), 2);
    }

    #[test]
    fn archive_after_first_file_is_part_of_folder() {
        let selection =
            UploadSelection::from_files(vec![source("shop/models.py"), zip("shop/vendor.zip")])
                .unwrap();
        assert_matches!(selection, UploadSelection::Folder(files) if files.len() == 2);
    }

    // -- constructors --

    #[test]
    fn archive_rejects_non_archive_media_type() {
        assert_matches!(
            UploadSelection::archive(source("proj.py")),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn archive_accepts_windows_media_type() {
        let file = UploadFile::new("proj.zip", MEDIA_TYPE_ZIP_COMPRESSED, vec![1]);
        assert!(UploadSelection::archive(file).is_ok());
    }

    #[test]
    fn folder_rejects_empty_and_blank_paths() {
        assert!(UploadSelection::folder(vec![]).is_err());
        assert!(UploadSelection::folder(vec![source("  ")]).is_err());
    }

    #[test]
    fn total_bytes_sums_files() {
        let selection =
            UploadSelection::folder(vec![source("a/x.py"), source("a/y.py")]).unwrap();
        assert_eq!(selection.total_bytes(), 14);
    }

    // -- UploadResult --

    #[test]
    fn usable_extract_path_requires_success() {
        let failed = UploadResult {
            success: false,
            extract_path: Some("/tmp/x1".into()),
            message: None,
        };
        assert!(failed.usable_extract_path().is_none());

        let ok = UploadResult {
            success: true,
            extract_path: Some("/tmp/x1".into()),
            message: None,
        };
        assert_eq!(ok.usable_extract_path(), Some("/tmp/x1"));

        let blank = UploadResult {
            success: true,
            extract_path: Some(String::new()),
            message: None,
        };
        assert!(blank.usable_extract_path().is_none());
    }

    // -- helpers --

    #[test]
    fn media_type_guess() {
        assert_eq!(media_type_for_path("proj.ZIP"), MEDIA_TYPE_ZIP);
        assert_eq!(media_type_for_path("proj.tar.gz"), MEDIA_TYPE_OCTET_STREAM);
        assert_eq!(media_type_for_path("Makefile"), MEDIA_TYPE_OCTET_STREAM);
    }

    #[test]
    fn hidden_files() {
        assert!(is_hidden_or_system(".git"));
        assert!(is_hidden_or_system("Thumbs.db"));
        assert!(!is_hidden_or_system("manage.py"));
    }

    #[test]
    fn file_name_is_last_component() {
        assert_eq!(source("shop/admin/views.py").file_name(), "views.py");
        assert_eq!(zip("proj.zip").file_name(), "proj.zip");
    }
}
