use crate::image_processing::CodecError;
use gallery_store::StoreError;
use std::fmt;

/// Central error type for gallery operations
#[derive(Debug)]
pub enum GalleryError {
    /// Upload rejected before any store call
    SizeLimitExceeded { size_bytes: u64, limit_mib: u64 },
    /// Upload target already exists in the area
    DuplicateName(String),
    /// Delete target does not exist in the area
    NotFound(String),
    /// File name that cannot live inside a gallery directory
    InvalidName(String),
    /// Any list/read/write/remove/publish failure
    StoreIo(StoreError),
    /// Missing or malformed file content or metadata
    Codec(CodecError),
    /// Configuration could not be read or parsed
    Config(String),
    /// General error
    Other(String),
}

impl fmt::Display for GalleryError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GalleryError::SizeLimitExceeded {
                size_bytes,
                limit_mib,
            } => write!(
                f,
                "File of {} bytes exceeds the {} MiB upload limit",
                size_bytes, limit_mib
            ),
            GalleryError::DuplicateName(name) => write!(f, "Duplicate name: {}", name),
            GalleryError::NotFound(name) => write!(f, "Not found: {}", name),
            GalleryError::InvalidName(msg) => write!(f, "Invalid file name: {}", msg),
            GalleryError::StoreIo(e) => write!(f, "Store error: {}", e),
            GalleryError::Codec(e) => write!(f, "Codec error: {}", e),
            GalleryError::Config(msg) => write!(f, "Configuration error: {}", msg),
            GalleryError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for GalleryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GalleryError::StoreIo(e) => Some(e),
            GalleryError::Codec(e) => Some(e),
            _ => None,
        }
    }
}

// Conversions from other error types
impl From<StoreError> for GalleryError {
    fn from(e: StoreError) -> Self {
        GalleryError::StoreIo(e)
    }
}

impl From<CodecError> for GalleryError {
    fn from(e: CodecError) -> Self {
        GalleryError::Codec(e)
    }
}

/// User-friendly error messages for UI
impl GalleryError {
    pub fn user_message(&self) -> String {
        match self {
            GalleryError::SizeLimitExceeded { limit_mib, .. } => {
                format!("The image is larger than {} MB.", limit_mib)
            }
            GalleryError::DuplicateName(name) => {
                format!("An image named {} already exists.", name)
            }
            GalleryError::NotFound(name) => format!("{} was not found.", name),
            GalleryError::InvalidName(_) => "This file name cannot be used.".to_string(),
            GalleryError::StoreIo(_) => {
                "The gallery storage could not be reached. Please try again.".to_string()
            }
            GalleryError::Codec(_) => "An image could not be read.".to_string(),
            GalleryError::Config(msg) => msg.clone(),
            GalleryError::Other(msg) => msg.clone(),
        }
    }
}
