use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, trace};

/// Permission bits applied to every file this module creates (`rw-r--r--`).
pub const FILE_MODE: u32 = 0o644;

/// Suffix appended to the names generated by [`create_temp`].
pub const TEMP_SUFFIX: &str = ".tmp";

/// Represents errors that can occur during filesystem operations.
#[derive(Debug, Error)]
pub enum FilesystemError {
    /// An IO operation on a single path failed.
    #[error("failed to {op} {}: {source}", path.display())]
    Io {
        /// Short name of the operation that failed, e.g. `read`.
        op: &'static str,
        /// The path the operation was applied to.
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Renaming `from` to `to` failed.
    #[error("failed to rename file from {} to {}: {source}", from.display(), to.display())]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FilesystemError {
    fn io(op: &'static str, path: &Path, source: io::Error) -> Self {
        FilesystemError::Io {
            op,
            path: path.to_path_buf(),
            source,
        }
    }

    /// Returns the kind of the underlying IO error.
    pub fn kind(&self) -> io::ErrorKind {
        match self {
            FilesystemError::Io { source, .. } | FilesystemError::Rename { source, .. } => source.kind(),
        }
    }
}

/// How a write opens its target file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum WriteMode {
    /// Create the file, or truncate it if it already exists.
    #[default]
    Truncate,
    /// Create the file if needed and write at its end.
    Append,
}

fn open_for_write(path: &Path, mode: WriteMode) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true);
    match mode {
        WriteMode::Truncate => options.truncate(true),
        WriteMode::Append => options.append(true),
    };

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(FILE_MODE);
    }

    options.open(path)
}

fn write_with_mode(path: &Path, data: &[u8], mode: WriteMode) -> Result<(), FilesystemError> {
    let op = match mode {
        WriteMode::Truncate => "write",
        WriteMode::Append => "append to",
    };
    let mut file = open_for_write(path, mode).map_err(|e| FilesystemError::io(op, path, e))?;
    file.write_all(data).map_err(|e| FilesystemError::io(op, path, e))?;
    debug!(path = %path.display(), bytes = data.len(), ?mode, "wrote file");
    Ok(())
}

/// Creates an empty, uniquely named file in the system temp directory.
///
/// The file name is `<prefix>-<random><TEMP_SUFFIX>`. The handle is closed
/// before returning and the file is left on disk; removing it is up to the
/// caller.
///
/// # Errors
///
/// Returns `FilesystemError` if the file cannot be created.
///
/// # Returns
///
/// The full path of the new file.
pub fn create_temp(prefix: &str) -> Result<PathBuf, FilesystemError> {
    let dir = std::env::temp_dir();
    let named = tempfile::Builder::new()
        .prefix(&format!("{prefix}-"))
        .suffix(TEMP_SUFFIX)
        .tempfile_in(&dir)
        .map_err(|e| FilesystemError::io("create temp file in", &dir, e))?;

    let (handle, path) = named
        .keep()
        .map_err(|e| FilesystemError::io("keep temp file in", &dir, io::Error::from(e)))?;
    drop(handle);

    debug!(path = %path.display(), "created temp file");
    Ok(path)
}

/// Removes the file at `path`.
///
/// A missing file is an error, not a no-op.
///
/// # Errors
///
/// Returns `FilesystemError` if the file cannot be removed.
pub fn delete<P: AsRef<Path>>(path: P) -> Result<(), FilesystemError> {
    let path = path.as_ref();
    fs::remove_file(path).map_err(|e| FilesystemError::io("delete", path, e))?;
    debug!(path = %path.display(), "deleted file");
    Ok(())
}

/// Checks if a regular file exists at the given path.
///
/// Directories count as absent, and so does any path whose metadata cannot
/// be read.
pub fn exists<P: AsRef<Path>>(path: P) -> bool {
    let path = path.as_ref();
    match fs::metadata(path) {
        Ok(meta) => meta.is_file(),
        Err(e) => {
            if e.kind() != io::ErrorKind::NotFound {
                trace!(path = %path.display(), error = %e, "stat failed, treating as absent");
            }
            false
        }
    }
}

/// Renames `from` to `to`, replacing `to` if it exists.
///
/// # Errors
///
/// Returns `FilesystemError::Rename` with both paths if the rename fails.
pub fn rename<P: AsRef<Path>, Q: AsRef<Path>>(from: P, to: Q) -> Result<(), FilesystemError> {
    let (from, to) = (from.as_ref(), to.as_ref());
    fs::rename(from, to).map_err(|source| FilesystemError::Rename {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    })?;
    debug!(from = %from.display(), to = %to.display(), "renamed file");
    Ok(())
}

/// Writes `text` to a file, replacing any previous content.
///
/// # Arguments
///
/// * `path` - Path to the file.
/// * `text` - Content to write.
///
/// # Errors
///
/// Returns `FilesystemError` if the file cannot be opened or written.
pub fn write_all_text<P: AsRef<Path>>(path: P, text: &str) -> Result<(), FilesystemError> {
    write_with_mode(path.as_ref(), text.as_bytes(), WriteMode::Truncate)
}

/// Writes `data` to a file, replacing any previous content.
///
/// # Errors
///
/// Returns `FilesystemError` if the file cannot be opened or written.
pub fn write_bytes<P: AsRef<Path>>(path: P, data: &[u8]) -> Result<(), FilesystemError> {
    write_with_mode(path.as_ref(), data, WriteMode::Truncate)
}

/// Appends `text` to a file, creating it if it does not exist.
///
/// # Errors
///
/// Returns `FilesystemError` if the file cannot be opened or written.
pub fn append_text<P: AsRef<Path>>(path: P, text: &str) -> Result<(), FilesystemError> {
    write_with_mode(path.as_ref(), text.as_bytes(), WriteMode::Append)
}

/// Reads the contents of a file into a string.
///
/// # Errors
///
/// Returns `FilesystemError` if the file cannot be read or is not valid UTF-8.
pub fn read_all_text<P: AsRef<Path>>(path: P) -> Result<String, FilesystemError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| FilesystemError::io("read", path, e))?;
    debug!(path = %path.display(), bytes = text.len(), "read file");
    Ok(text)
}

/// Reads the contents of a file into a byte vector.
///
/// # Errors
///
/// Returns `FilesystemError` if the file cannot be read.
pub fn read_all_bytes<P: AsRef<Path>>(path: P) -> Result<Vec<u8>, FilesystemError> {
    let path = path.as_ref();
    let data = fs::read(path).map_err(|e| FilesystemError::io("read", path, e))?;
    debug!(path = %path.display(), bytes = data.len(), "read file");
    Ok(data)
}

/// Reads a file and splits it into lines.
///
/// Both `\n` and `\r\n` terminators are stripped. An empty file yields no
/// lines, and a trailing newline does not add an empty last line.
///
/// # Errors
///
/// Returns `FilesystemError` if the file cannot be opened, read, or is not
/// valid UTF-8.
pub fn read_all_lines<P: AsRef<Path>>(path: P) -> Result<Vec<String>, FilesystemError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| FilesystemError::io("open", path, e))?;
    let lines = BufReader::new(file)
        .lines()
        .collect::<io::Result<Vec<String>>>()
        .map_err(|e| FilesystemError::io("read lines from", path, e))?;
    debug!(path = %path.display(), lines = lines.len(), "read lines");
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_then_read_text() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.txt");
        write_all_text(&path, "abc").unwrap();
        assert_eq!(read_all_text(&path).unwrap(), "abc");
    }

    #[test]
    fn write_truncates_previous_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.txt");
        write_all_text(&path, "a much longer line").unwrap();
        write_all_text(&path, "short").unwrap();
        assert_eq!(read_all_text(&path).unwrap(), "short");
    }

    #[test]
    fn write_then_read_bytes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blob.bin");
        let data = [0u8, 159, 146, 150, 255];
        write_bytes(&path, &data).unwrap();
        assert_eq!(read_all_bytes(&path).unwrap(), data);
    }

    #[test]
    fn read_text_rejects_invalid_utf8() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blob.bin");
        write_bytes(&path, &[0xff, 0xfe]).unwrap();
        let err = read_all_text(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn append_creates_then_extends() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.txt");
        append_text(&path, "first\n").unwrap();
        append_text(&path, "second\n").unwrap();
        assert_eq!(read_all_text(&path).unwrap(), "first\nsecond\n");
    }

    #[cfg(unix)]
    #[test]
    fn written_files_are_not_group_writable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("mode.txt");
        write_all_text(&path, "x").unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        // umask may clear bits but never adds them
        assert_eq!(mode & !FILE_MODE, 0);
        assert_ne!(mode & 0o600, 0);
    }

    #[test]
    fn exists_tracks_write_and_delete() {
        let dir = tempdir().unwrap();
        let text_path = dir.path().join("t.txt");
        let bytes_path = dir.path().join("b.bin");

        assert!(!exists(&text_path));
        write_all_text(&text_path, "abc").unwrap();
        assert!(exists(&text_path));
        delete(&text_path).unwrap();
        assert!(!exists(&text_path));

        assert!(!exists(&bytes_path));
        write_bytes(&bytes_path, b"abc").unwrap();
        assert!(exists(&bytes_path));
    }

    #[test]
    fn exists_is_false_for_directories() {
        let dir = tempdir().unwrap();
        assert!(!exists(dir.path()));
    }

    #[test]
    fn delete_missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        let err = delete(dir.path().join("gone.txt")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(err.to_string().contains("gone.txt"));
    }

    #[test]
    fn rename_moves_content() {
        let dir = tempdir().unwrap();
        let from = dir.path().join("old.txt");
        let to = dir.path().join("new.txt");
        write_all_text(&from, "moved").unwrap();

        rename(&from, &to).unwrap();
        assert!(!exists(&from));
        assert_eq!(read_all_text(&to).unwrap(), "moved");
    }

    #[test]
    fn rename_error_names_both_paths() {
        let dir = tempdir().unwrap();
        let err = rename(dir.path().join("missing.txt"), dir.path().join("target.txt")).unwrap_err();
        assert!(matches!(err, FilesystemError::Rename { .. }));
        let message = err.to_string();
        assert!(message.contains("missing.txt"));
        assert!(message.contains("target.txt"));
    }

    #[test]
    fn read_missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nothing.txt");
        assert_eq!(read_all_text(&path).unwrap_err().kind(), io::ErrorKind::NotFound);
        assert_eq!(read_all_bytes(&path).unwrap_err().kind(), io::ErrorKind::NotFound);
        assert_eq!(read_all_lines(&path).unwrap_err().kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn read_lines_splits_on_newlines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lines.txt");
        write_all_text(&path, "a\nb\nc").unwrap();
        assert_eq!(read_all_lines(&path).unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn read_lines_strips_crlf_and_trailing_newline() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lines.txt");
        write_all_text(&path, "one\r\ntwo\n\nfour\n").unwrap();
        assert_eq!(read_all_lines(&path).unwrap(), vec!["one", "two", "", "four"]);
    }

    #[test]
    fn read_lines_of_empty_file_is_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.txt");
        write_all_text(&path, "").unwrap();
        assert!(read_all_lines(&path).unwrap().is_empty());
    }

    #[test]
    fn create_temp_leaves_file_on_disk() {
        let path = create_temp("tool-utils-test").unwrap();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("tool-utils-test-"));
        assert!(name.ends_with(TEMP_SUFFIX));
        assert!(exists(&path));
        assert_eq!(read_all_bytes(&path).unwrap(), Vec::<u8>::new());

        let other = create_temp("tool-utils-test").unwrap();
        assert_ne!(path, other);

        delete(&path).unwrap();
        delete(&other).unwrap();
    }
}
