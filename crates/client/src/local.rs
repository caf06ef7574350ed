//! Build upload selections from the local filesystem.
//!
//! Folder uploads mirror what a browser directory picker produces: every
//! file's relative path starts with the selected folder's own name.

use std::path::{Path, PathBuf};

use mde_core::error::CoreError;
use mde_core::upload::{
    is_hidden_or_system, media_type_for_path, UploadFile, UploadSelection, MEDIA_TYPE_ZIP,
};

/// Maximum folder nesting depth before the walker stops recursing.
pub const MAX_FOLDER_DEPTH: usize = 32;

/// Errors from reading an upload off disk.
#[derive(Debug, thiserror::Error)]
pub enum LocalUploadError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Invalid(#[from] CoreError),
}

/// Read a single archive file into an archive selection.
///
/// The media type is always `application/zip`; non-zip paths are
/// rejected.
pub async fn load_archive(path: &Path) -> Result<UploadSelection, LocalUploadError> {
    let name = file_name_of(path);
    if media_type_for_path(&name) != MEDIA_TYPE_ZIP {
        return Err(CoreError::Validation(format!("'{name}' is not a .zip archive")).into());
    }

    let contents = tokio::fs::read(path).await.map_err(|source| LocalUploadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(UploadSelection::archive(UploadFile::new(
        name,
        MEDIA_TYPE_ZIP,
        contents,
    ))?)
}

/// Read every file under `root` into a folder selection.
///
/// Hidden and system files (and directories) are skipped. Paths use `/`
/// separators and are sorted for deterministic upload order.
pub async fn load_folder(root: &Path) -> Result<UploadSelection, LocalUploadError> {
    let prefix = file_name_of(root);
    let mut files = Vec::new();
    walk(root, &prefix, &mut files, 0).await?;

    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    tracing::debug!(root = %root.display(), files = files.len(), "Loaded folder for upload");

    Ok(UploadSelection::folder(files)?)
}

async fn walk(
    current: &Path,
    relative: &str,
    files: &mut Vec<UploadFile>,
    depth: usize,
) -> Result<(), LocalUploadError> {
    if depth > MAX_FOLDER_DEPTH {
        return Ok(());
    }

    let io_err = |source| LocalUploadError::Io {
        path: current.to_path_buf(),
        source,
    };

    let mut entries = tokio::fs::read_dir(current).await.map_err(io_err)?;

    while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
        let name = entry.file_name().to_string_lossy().to_string();
        if is_hidden_or_system(&name) {
            continue;
        }

        let path = entry.path();
        let child = format!("{relative}/{name}");
        let file_type = entry.file_type().await.map_err(io_err)?;

        if file_type.is_dir() {
            Box::pin(walk(&path, &child, files, depth + 1)).await?;
        } else if file_type.is_file() {
            let contents = tokio::fs::read(&path)
                .await
                .map_err(|source| LocalUploadError::Io {
                    path: path.clone(),
                    source,
                })?;
            let media_type = media_type_for_path(&name);
            files.push(UploadFile::new(child, media_type, contents));
        }
    }

    Ok(())
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[tokio::test]
    async fn folder_paths_are_relative_to_root_name() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("shop");
        std::fs::create_dir_all(root.join("shop_interface")).unwrap();
        std::fs::create_dir_all(root.join(".git")).unwrap();
        std::fs::write(root.join("manage.py"), b"import django").unwrap();
        std::fs::write(root.join("shop_interface/views.py"), b"def index(): pass").unwrap();
        std::fs::write(root.join(".git/HEAD"), b"ref").unwrap();
        std::fs::write(root.join(".env"), b"SECRET=1").unwrap();

        let selection = load_folder(&root).await.unwrap();
        let paths: Vec<&str> = selection.files().map(|f| f.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["shop/manage.py", "shop/shop_interface/views.py"]);
        assert!(!selection.is_archive());
    }

    #[tokio::test]
    async fn empty_folder_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert_matches!(
            load_folder(dir.path()).await,
            Err(LocalUploadError::Invalid(CoreError::Validation(_)))
        );
    }

    #[tokio::test]
    async fn archive_is_loaded_with_zip_media_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proj.zip");
        std::fs::write(&path, b"PK\x03\x04rest").unwrap();

        let selection = load_archive(&path).await.unwrap();
        assert_matches!(
            selection,
            UploadSelection::Archive(f) if f.relative_path == "proj.zip"
                && f.media_type == MEDIA_TYPE_ZIP
                && f.contents.len() == 8
        );
    }

    #[tokio::test]
    async fn non_zip_archive_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proj.tar");
        std::fs::write(&path, b"tar").unwrap();
        assert!(load_archive(&path).await.is_err());
    }

    #[tokio::test]
    async fn missing_archive_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert_matches!(
            load_archive(&dir.path().join("missing.zip")).await,
            Err(LocalUploadError::Io { .. })
        );
    }
}
