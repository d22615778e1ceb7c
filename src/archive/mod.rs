use std::collections::BTreeMap;
use std::io::{self, Cursor, Read, Write};
use thiserror::Error;
use tracing::debug;
use ::zip::result::ZipError;
use ::zip::write::SimpleFileOptions;
use ::zip::{ZipArchive, ZipWriter};

/// Entry name to entry content, ordered by name.
pub type Entries = BTreeMap<String, Vec<u8>>;

/// Errors raised while packing or unpacking an in-memory zip archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to create file {name} in zip archive: {source}")]
    Create {
        name: String,
        #[source]
        source: ZipError,
    },
    #[error("failed to write data to file {name}: {source}")]
    Write {
        name: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to close zip writer: {0}")]
    Finish(#[source] ZipError),
    #[error("failed to open zip reader: {0}")]
    Open(#[source] ZipError),
    #[error("failed to open file at index {index}: {source}")]
    Entry {
        index: usize,
        #[source]
        source: ZipError,
    },
    #[error("failed to read file {name}: {source}")]
    Read {
        name: String,
        #[source]
        source: io::Error,
    },
}

/// Packs `entries` into a zip archive held in memory.
///
/// Entries are written in name order with the zip crate's default
/// compression. On error nothing is returned; the partially written buffer
/// is dropped.
///
/// # Errors
///
/// Returns `ArchiveError` if an entry cannot be created or written, or if the
/// archive cannot be finalized.
///
/// # Returns
///
/// The bytes of the finished archive.
pub fn zip(entries: &Entries) -> Result<Vec<u8>, ArchiveError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    for (name, data) in entries {
        writer
            .start_file(name.as_str(), options)
            .map_err(|source| ArchiveError::Create {
                name: name.clone(),
                source,
            })?;
        writer.write_all(data).map_err(|source| ArchiveError::Write {
            name: name.clone(),
            source,
        })?;
    }

    let buffer = writer.finish().map_err(ArchiveError::Finish)?.into_inner();
    debug!(entries = entries.len(), bytes = buffer.len(), "packed zip archive");
    Ok(buffer)
}

/// Unpacks every entry of an in-memory zip archive.
///
/// Directory entries are returned like any other entry, with empty content.
/// Content is fully decompressed into memory with no size limit.
///
/// # Errors
///
/// Returns `ArchiveError` if `data` is not a zip archive or if any entry
/// cannot be opened or read. No partial result is returned.
pub fn unzip(data: &[u8]) -> Result<Entries, ArchiveError> {
    let mut archive = ZipArchive::new(Cursor::new(data)).map_err(ArchiveError::Open)?;
    let mut entries = Entries::new();

    for index in 0..archive.len() {
        let mut file = archive
            .by_index(index)
            .map_err(|source| ArchiveError::Entry { index, source })?;
        let name = file.name().to_string();

        // the declared size comes from the archive headers and is not trusted
        let mut content = Vec::new();
        file.read_to_end(&mut content).map_err(|source| ArchiveError::Read {
            name: name.clone(),
            source,
        })?;
        entries.insert(name, content);
    }

    debug!(entries = entries.len(), bytes = data.len(), "unpacked zip archive");
    Ok(entries)
}
