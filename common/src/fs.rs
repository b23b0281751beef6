use std::fs::Metadata;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::error::Error;
use crate::types::{Directory, DirectoryEntry};

impl Directory {
    /// Snapshot the immediate children of `path` on the local filesystem.
    ///
    /// The path is made absolute and lexically normalized first. A path that
    /// does not resolve to a directory yields [`Error::NotFound`]; anything
    /// else that goes wrong while enumerating yields [`Error::Io`].
    pub async fn from_filesystem(path: impl AsRef<Path>) -> Result<Directory, Error> {
        let full_path = normalize_path(path.as_ref())?;
        let entries = list_children(&full_path).await?;
        Ok(Directory::new(full_path.to_string_lossy().into_owned(), entries))
    }
}

/// Enumerate the children of `dir`, classifying each as file or directory.
pub async fn list_children(dir: &Path) -> Result<Vec<DirectoryEntry>, Error> {
    debug!("Listing children of {}", dir.display());
    let metadata = fs::metadata(dir).await.map_err(|e| classify(dir, e))?;
    if !metadata.is_dir() {
        return Err(Error::NotFound {
            path: dir.to_path_buf(),
        });
    }

    let mut entries = Vec::new();
    let mut reader = fs::read_dir(dir).await.map_err(|e| classify(dir, e))?;
    while let Some(entry) = reader
        .next_entry()
        .await
        .map_err(|e| Error::io(dir.display(), e))?
    {
        let Some(metadata) = stat_child(&entry.path()).await? else {
            debug!("{} vanished while listing, skipping", entry.path().display());
            continue;
        };
        let name = entry.file_name().to_string_lossy().into_owned();
        let hidden = name.starts_with('.');

        entries.push(if metadata.is_dir() {
            DirectoryEntry::directory(name, hidden)
        } else {
            DirectoryEntry::file(name, metadata.len(), hidden)
        });
    }
    debug!("Found {} entries in {}", entries.len(), dir.display());
    Ok(entries)
}

/// Stat a child, following symlinks; a dangling link is described by the
/// link itself. `None` when the child no longer exists.
async fn stat_child(path: &Path) -> Result<Option<Metadata>, Error> {
    if let Ok(metadata) = fs::metadata(path).await {
        return Ok(Some(metadata));
    }
    match fs::symlink_metadata(path).await {
        Ok(metadata) => Ok(Some(metadata)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::io(path.display(), e)),
    }
}

/// Make `path` absolute against the working directory and drop `.` and `..`
/// segments without touching the filesystem.
pub fn normalize_path(path: &Path) -> Result<PathBuf, Error> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| Error::io("current directory", e))?
            .join(path)
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    Ok(normalized)
}

fn classify(path: &Path, err: std::io::Error) -> Error {
    match err.kind() {
        ErrorKind::NotFound | ErrorKind::NotADirectory => Error::NotFound {
            path: path.to_path_buf(),
        },
        _ => Error::io(path.display(), err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as stdfs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn lists_files_and_directories() {
        let dir = tempdir().unwrap();
        stdfs::write(dir.path().join("a.txt"), "hello").unwrap();
        stdfs::write(dir.path().join(".secret"), "").unwrap();
        stdfs::create_dir(dir.path().join("sub")).unwrap();

        let listing = Directory::from_filesystem(dir.path()).await.unwrap();
        assert_eq!(listing.entries().len(), 3);

        let a = listing.entries().iter().find(|e| e.name == "a.txt").unwrap();
        assert!(a.is_file());
        assert_eq!(a.size(), 5);
        assert!(!a.hidden);

        let secret = listing.entries().iter().find(|e| e.name == ".secret").unwrap();
        assert!(secret.hidden);

        let sub = listing.entries().iter().find(|e| e.name == "sub").unwrap();
        assert!(sub.is_directory());
        assert_eq!(sub.size(), 0);
    }

    #[tokio::test]
    async fn normalizes_the_listed_path() {
        let dir = tempdir().unwrap();
        stdfs::create_dir(dir.path().join("sub")).unwrap();
        let dotted = dir.path().join("sub").join("..").join(".");

        let listing = Directory::from_filesystem(&dotted).await.unwrap();
        assert_eq!(listing.path(), dir.path().to_string_lossy());
    }

    #[tokio::test]
    async fn missing_directory_is_not_found() {
        let dir = tempdir().unwrap();
        let err = Directory::from_filesystem(dir.path().join("nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
        assert!(err.to_string().starts_with("No such directory: "));
    }

    #[tokio::test]
    async fn regular_file_is_not_found() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("plain");
        stdfs::write(&file, "x").unwrap();
        let err = Directory::from_filesystem(&file).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn path_through_a_file_is_not_found() {
        let dir = tempdir().unwrap();
        stdfs::write(dir.path().join("plain"), "x").unwrap();
        let err = Directory::from_filesystem(dir.path().join("plain").join("sub"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn other_io_failures_are_not_not_found() {
        let path = Path::new("/x");
        let denied = classify(path, std::io::Error::from(ErrorKind::PermissionDenied));
        assert!(matches!(denied, Error::Io { .. }));
        assert!(denied.to_string().starts_with("I/O error on /x"));

        let missing = classify(path, std::io::Error::from(ErrorKind::NotFound));
        assert!(matches!(missing, Error::NotFound { .. }));
        let through_file = classify(path, std::io::Error::from(ErrorKind::NotADirectory));
        assert!(matches!(through_file, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn vanished_child_is_skipped() {
        let dir = tempdir().unwrap();
        assert!(stat_child(&dir.path().join("gone")).await.unwrap().is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn dangling_symlink_is_listed_as_file() {
        let dir = tempdir().unwrap();
        std::os::unix::fs::symlink(dir.path().join("nowhere"), dir.path().join("link")).unwrap();
        let listing = Directory::from_filesystem(dir.path()).await.unwrap();
        assert_eq!(listing.entries().len(), 1);
        assert!(listing.entries()[0].is_file());
    }

    #[test]
    fn normalize_drops_dot_segments() {
        let path = normalize_path(Path::new("/a/./b/../c")).unwrap();
        assert_eq!(path, PathBuf::from("/a/c"));
        assert!(normalize_path(Path::new("rel")).unwrap().is_absolute());
    }
}
