/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while talking to a store backend
#[derive(Debug)]
pub enum StoreError {
    /// Path (file or directory) does not exist
    NotFound(String),
    /// Path is malformed or outside the public/private partitions
    InvalidPath(String),
    IoError(std::io::Error),
    DatabaseError(rusqlite::Error),
    WebDavError(String),
    Other(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound(path) => write!(f, "Not found: {}", path),
            StoreError::InvalidPath(msg) => write!(f, "Invalid path: {}", msg),
            StoreError::IoError(e) => write!(f, "IO error: {}", e),
            StoreError::DatabaseError(e) => write!(f, "Database error: {}", e),
            StoreError::WebDavError(e) => write!(f, "WebDAV error: {}", e),
            StoreError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::IoError(e) => Some(e),
            StoreError::DatabaseError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::IoError(err)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::DatabaseError(err)
    }
}
