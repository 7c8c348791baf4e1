//! Containers: ZIP archives (or single files) flattened into named members

use crate::error::{MergeError, MergeResult};
use crate::types::{extension, file_name};
use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;
use zip::ZipArchive;

/// Upper bound on the buffer reserved up front for one entry; the declared
/// size comes from the archive itself and may be wrong
const RESERVE_LIMIT: u64 = 1 << 20;

/// Member extensions the grid reader can decode
pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["csv", "xls", "xlsx"];

/// True if the member name carries a supported extension (any case)
pub fn is_supported(name: &str) -> bool {
    let ext = extension(name);
    SUPPORTED_EXTENSIONS.contains(&ext.as_str())
}

/// One tabular file and its raw bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberBlob {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl MemberBlob {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

/// A named group of members processed together
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContainerInput {
    pub name: String,
    pub members: Vec<MemberBlob>,
}

impl ContainerInput {
    pub fn new(name: impl Into<String>, members: Vec<MemberBlob>) -> Self {
        Self {
            name: name.into(),
            members,
        }
    }

    /// A file uploaded on its own: a container of one, named after the file
    pub fn standalone(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let name = name.into();
        Self {
            members: vec![MemberBlob::new(name.clone(), bytes)],
            name,
        }
    }

    /// Group flat `(container, member, bytes)` triples by container,
    /// keeping first-seen container order and member order
    pub fn from_triples<I, C, M>(triples: I) -> Vec<ContainerInput>
    where
        I: IntoIterator<Item = (C, M, Vec<u8>)>,
        C: Into<String>,
        M: Into<String>,
    {
        let mut containers: Vec<ContainerInput> = Vec::new();
        for (container, member, bytes) in triples {
            let container = container.into();
            let blob = MemberBlob::new(member, bytes);
            match containers.iter_mut().find(|c| c.name == container) {
                Some(existing) => existing.members.push(blob),
                None => containers.push(ContainerInput::new(container, vec![blob])),
            }
        }
        containers
    }
}

/// Unpack the supported members of a ZIP archive, in archive order
///
/// Directories, unsupported extensions, and macOS resource-fork entries
/// (`__MACOSX/`) are skipped. A corrupt archive is `ContainerUnreadable`.
pub fn unpack_zip(name: &str, bytes: &[u8]) -> MergeResult<ContainerInput> {
    let unreadable = |message: String| MergeError::ContainerUnreadable {
        container: name.to_string(),
        message,
    };

    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(|e| unreadable(e.to_string()))?;
    let mut members = Vec::new();

    for idx in 0..archive.len() {
        let mut entry = archive.by_index(idx).map_err(|e| unreadable(e.to_string()))?;
        let member = entry.name().to_string();
        if entry.is_dir() || member.starts_with("__MACOSX/") || !is_supported(&member) {
            tracing::debug!(container = name, member = %member, "skipping archive entry");
            continue;
        }
        let mut buf = Vec::with_capacity(entry.size().min(RESERVE_LIMIT) as usize);
        entry
            .read_to_end(&mut buf)
            .map_err(|e| unreadable(format!("{}: {}", member, e)))?;
        members.push(MemberBlob::new(member, buf));
    }

    tracing::debug!(container = name, members = members.len(), "unpacked archive");
    Ok(ContainerInput::new(name, members))
}

/// Read a path from disk: `.zip` files are unpacked, anything else becomes
/// a standalone container
pub fn open_path(path: &Path) -> MergeResult<ContainerInput> {
    let bytes = fs::read(path)?;
    let name = file_name(&path.to_string_lossy()).to_string();
    if extension(&name) == "zip" {
        unpack_zip(&name, &bytes)
    } else {
        Ok(ContainerInput::standalone(name, bytes))
    }
}
