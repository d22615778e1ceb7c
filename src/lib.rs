/// The `http` module fetches a URL with query parameters and returns the
/// response body as raw bytes, UTF-8 text, or a value decoded from JSON.
///
/// Every call is a single blocking GET; only a `200 OK` answer counts as
/// success.
#[cfg(feature = "http")]
pub mod http;

/// The `filesystem` module wraps whole-file operations: temp-file creation,
/// existence checks, rename, delete, and reading or writing entire files as
/// text, bytes, or lines.
pub mod filesystem;

/// The `archive` module packs a name to content mapping into an in-memory
/// zip archive and unpacks such an archive back into a mapping.
#[cfg(feature = "archive")]
pub mod archive;
