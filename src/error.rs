use std::path::PathBuf;

/// Represents errors that can occur while building, opening, or validating
/// a trie-spline index.
#[derive(Debug)]
pub enum Error {
    /// An I/O operation (directory/file creation, open, stat, `set_len`, mmap,
    /// read, write) failed. `context` names the operation and path involved.
    Io {
        /// The underlying I/O error.
        source: std::io::Error,
        /// What we were trying to do, e.g. `"mmap data at /foo/bar"`.
        context: String,
    },

    /// The on-disk format was malformed: truncated metadata, a length
    /// mismatch between metadata and file size, or an inconsistent CHT
    /// table shape.
    Format(String),

    /// A precondition of the build API was violated: unsorted keys, an
    /// empty input, a non-power-of-two `num_bins`, or a zero max error.
    Contract(String),

    /// `open()` was called on a directory that is missing or does not
    /// contain the required `data`/`spline_points`/`meta` files.
    NotFound(PathBuf),
}

impl Error {
    pub(crate) fn io(source: std::io::Error, context: impl Into<String>) -> Self {
        Self::Io {
            source,
            context: context.into(),
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { source, context } => write!(f, "I/O error during {context}: {source}"),
            Self::Format(msg) => write!(f, "malformed index data: {msg}"),
            Self::Contract(msg) => write!(f, "contract violation: {msg}"),
            Self::NotFound(path) => write!(f, "index not found at {}", path.display()),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Index result type.
pub type Result<T> = std::result::Result<T, Error>;
