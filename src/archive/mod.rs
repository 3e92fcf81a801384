//! Page archive handling.
//!
//! An uploaded chapter arrives as a ZIP of page images. This module turns the
//! in-memory buffer into a list of entries, decides which entries are pages,
//! and orders them the way readers expect (`2.jpg` before `10.jpg`).

mod dimensions;
mod filter;
mod sort;

use std::io::{Cursor, Read};

use bytes::Bytes;
use thiserror::Error;
use zip::ZipArchive;

pub use dimensions::probe_dimensions;
pub use filter::{file_extension, is_valid_page};
pub use sort::sort_numerically;

/// Cap on the buffer reserved up front; entry headers can lie about size.
const MAX_PREALLOC: u64 = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The buffer is not a readable ZIP container
    #[error("{0}")]
    Format(#[source] zip::result::ZipError),

    /// An entry listed in the directory could not be decompressed
    #[error("failed to read archive entry {name}: {source}")]
    Read {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// An entry decompresses to more than the per-entry limit
    #[error("archive entry {name} is larger than {limit} bytes")]
    EntryTooLarge { name: String, limit: u64 },
}

/// One file record inside the archive
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Position in the archive's central directory
    pub index: usize,
    /// Path within the archive, may contain `/`
    pub name: String,
    /// Uncompressed size in bytes
    pub size: u64,
}

impl ArchiveEntry {
    /// Final path component of the entry name.
    pub fn file_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

/// A decoded ZIP held in memory.
///
/// Entry contents are read one at a time through `&mut self`, so two entry
/// streams can never be open together. No entry is decompressed past
/// `max_entry_bytes`, whatever its header claims.
pub struct PageArchive {
    archive: ZipArchive<Cursor<Bytes>>,
    entries: Vec<ArchiveEntry>,
    max_entry_bytes: u64,
}

impl PageArchive {
    /// Parse the archive directory. Directory records are skipped.
    pub fn read(data: Bytes, max_entry_bytes: u64) -> Result<Self, ArchiveError> {
        let mut archive = ZipArchive::new(Cursor::new(data)).map_err(ArchiveError::Format)?;

        let mut entries = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let file = archive.by_index_raw(index).map_err(ArchiveError::Format)?;
            if file.is_dir() {
                continue;
            }
            entries.push(ArchiveEntry {
                index,
                name: file.name().to_string(),
                size: file.size(),
            });
        }

        Ok(Self {
            archive,
            entries,
            max_entry_bytes,
        })
    }

    /// Entries in directory order
    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    pub fn max_entry_bytes(&self) -> u64 {
        self.max_entry_bytes
    }

    /// Decompress one entry fully into memory.
    pub fn read_entry(&mut self, entry: &ArchiveEntry) -> Result<Vec<u8>, ArchiveError> {
        let limit = self.max_entry_bytes;
        let read_err = |source| ArchiveError::Read {
            name: entry.name.clone(),
            source,
        };

        let file = self
            .archive
            .by_index(entry.index)
            .map_err(|e| read_err(e.into()))?;

        let capacity = entry.size.min(limit).min(MAX_PREALLOC) as usize;
        let mut data = Vec::with_capacity(capacity);
        file.take(limit.saturating_add(1))
            .read_to_end(&mut data)
            .map_err(read_err)?;

        if data.len() as u64 > limit {
            return Err(ArchiveError::EntryTooLarge {
                name: entry.name.clone(),
                limit,
            });
        }
        Ok(data)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{zip_named, zip_of};
    use super::*;

    const NO_LIMIT: u64 = u64::MAX;

    #[test]
    fn test_read_lists_entries_in_directory_order() {
        let data = zip_named(&["2.jpg", "1.jpg", "notes.txt"]);
        let archive = PageArchive::read(data, NO_LIMIT).unwrap();

        let names: Vec<_> = archive.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["2.jpg", "1.jpg", "notes.txt"]);
        assert_eq!(archive.entries()[2].size, 9);
    }

    #[test]
    fn test_read_entry_returns_content() {
        let data = zip_of(&[("a/1.png", b"first".as_slice()), ("a/2.png", b"second".as_slice())]);
        let mut archive = PageArchive::read(data, NO_LIMIT).unwrap();
        let entries = archive.entries().to_vec();

        assert_eq!(archive.read_entry(&entries[1]).unwrap(), b"second");
        assert_eq!(archive.read_entry(&entries[0]).unwrap(), b"first");
    }

    #[test]
    fn test_garbage_is_a_format_error() {
        let result = PageArchive::read(Bytes::from_static(b"definitely not a zip"), NO_LIMIT);
        assert!(matches!(result, Err(ArchiveError::Format(_))));
    }

    #[test]
    fn test_empty_buffer_is_a_format_error() {
        assert!(matches!(
            PageArchive::read(Bytes::new(), NO_LIMIT),
            Err(ArchiveError::Format(_))
        ));
    }

    #[test]
    fn test_entry_over_limit_is_not_decompressed() {
        // Zeros deflate to a few hundred bytes
        let big = vec![0u8; 256 * 1024];
        let data = zip_of(&[("1.jpg", big.as_slice()), ("2.jpg", b"small".as_slice())]);
        assert!(data.len() < 16 * 1024);

        let mut archive = PageArchive::read(data, 1024).unwrap();
        let entries = archive.entries().to_vec();

        match archive.read_entry(&entries[0]) {
            Err(ArchiveError::EntryTooLarge { name, limit }) => {
                assert_eq!(name, "1.jpg");
                assert_eq!(limit, 1024);
            }
            other => panic!("expected size rejection, got {other:?}"),
        }
        assert_eq!(archive.read_entry(&entries[1]).unwrap(), b"small");
    }

    #[test]
    fn test_entry_exactly_at_limit_is_read() {
        let page = vec![7u8; 1024];
        let mut archive = PageArchive::read(zip_of(&[("1.png", page.as_slice())]), 1024).unwrap();
        let entries = archive.entries().to_vec();
        assert_eq!(archive.read_entry(&entries[0]).unwrap().len(), 1024);
    }

    #[test]
    fn test_file_name_strips_directories() {
        let entry = ArchiveEntry {
            index: 0,
            name: "chapter/../../etc/7.png".to_string(),
            size: 0,
        };
        assert_eq!(entry.file_name(), "7.png");
    }
}
