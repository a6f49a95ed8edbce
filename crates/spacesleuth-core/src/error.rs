/// Error taxonomy for the engine.
///
/// Nothing in here is fatal. Listing and subtree failures degrade to an
/// empty listing or the sentinel size plus the permission flag; stat
/// failures on single descendants are recovered where they happen and only
/// reported as [`ScanFault`]s.
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// A directory could not be opened for listing.
#[derive(Debug, Error)]
pub enum ListError {
    #[error("permission denied: {}", path.display())]
    PermissionDenied { path: PathBuf },

    #[error("not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("cannot list {}: {source}", path.display())]
    Other {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ListError {
    /// Classify an I/O error raised while opening `path`.
    pub fn from_io(path: PathBuf, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => ListError::PermissionDenied { path },
            io::ErrorKind::NotFound => ListError::NotFound { path },
            _ => ListError::Other { path, source: err },
        }
    }

    /// The directory that failed to open.
    pub fn path(&self) -> &PathBuf {
        match self {
            ListError::PermissionDenied { path }
            | ListError::NotFound { path }
            | ListError::Other { path, .. } => path,
        }
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, ListError::PermissionDenied { .. })
    }
}

/// A non-fatal failure observed while measuring.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScanFault {
    /// A single node's metadata could not be read. It contributes 0 bytes.
    #[error("cannot stat {}: {message}", path.display())]
    Stat { path: PathBuf, message: String },

    /// A whole subtree could not be enumerated.
    #[error("cannot enumerate {}: {message}", path.display())]
    SubtreeAccess { path: PathBuf, message: String },

    /// A directory listing failed (root scan or lazy expansion).
    #[error("cannot list {}: {message}", path.display())]
    Listing { path: PathBuf, message: String },
}

impl ScanFault {
    pub fn path(&self) -> &PathBuf {
        match self {
            ScanFault::Stat { path, .. }
            | ScanFault::SubtreeAccess { path, .. }
            | ScanFault::Listing { path, .. } => path,
        }
    }
}

impl From<&ListError> for ScanFault {
    fn from(err: &ListError) -> Self {
        let message = match err {
            ListError::PermissionDenied { .. } => "permission denied".to_string(),
            ListError::NotFound { .. } => "not found".to_string(),
            ListError::Other { source, .. } => source.to_string(),
        };
        ScanFault::Listing {
            path: err.path().clone(),
            message,
        }
    }
}

/// An `expand` request the session refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("no entry with id {0}")]
    UnknownEntry(u32),

    #[error("no entry for {}", .0.display())]
    UnknownPath(PathBuf),

    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("{} is already expanded", .0.display())]
    AlreadyExpanded(PathBuf),

    #[error("{} is already being expanded", .0.display())]
    ExpansionPending(PathBuf),
}

/// A session could not be built.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("cannot start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

/// Configuration could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
