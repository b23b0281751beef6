use serde::{Deserialize, Deserializer, Serialize};

/// File or directory classification of an entry. Only files carry a size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EntryKind {
    File { size: u64 },
    Directory,
}

/// One immediate child of a listed directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    #[serde(deserialize_with = "non_empty_name")]
    pub name: String,
    pub hidden: bool,
    #[serde(flatten)]
    pub kind: EntryKind,
}

impl DirectoryEntry {
    pub fn file(name: impl Into<String>, size: u64, hidden: bool) -> Self {
        DirectoryEntry {
            name: name.into(),
            hidden,
            kind: EntryKind::File { size },
        }
    }

    pub fn directory(name: impl Into<String>, hidden: bool) -> Self {
        DirectoryEntry {
            name: name.into(),
            hidden,
            kind: EntryKind::Directory,
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.kind, EntryKind::Directory)
    }

    pub fn is_file(&self) -> bool {
        !self.is_directory()
    }

    /// Size in bytes; always 0 for directories.
    pub fn size(&self) -> u64 {
        match self.kind {
            EntryKind::File { size } => size,
            EntryKind::Directory => 0,
        }
    }
}

fn non_empty_name<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let name = String::deserialize(deserializer)?;
    if name.is_empty() {
        return Err(serde::de::Error::custom("entry name must not be empty"));
    }
    Ok(name)
}

/// A one-time snapshot of a directory's immediate children.
///
/// Entries keep the order they were enumerated or decoded in. The path is
/// fixed at construction; there is no way to refresh a snapshot in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directory {
    #[serde(rename = "dir")]
    path: String,
    #[serde(rename = "files")]
    entries: Vec<DirectoryEntry>,
}

impl Directory {
    pub fn new(path: impl Into<String>, entries: Vec<DirectoryEntry>) -> Self {
        Directory {
            path: path.into(),
            entries,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn entries(&self) -> &[DirectoryEntry] {
        &self.entries
    }
}
