use base64::Engine;
use chrono::{DateTime, Utc};
use gallery_store::{DirEntry, StoreFile};

/// MIME type used for every inline image, whatever the real format
pub const INLINE_MIME: &str = "image/jpeg";

/// Error type for converting store files into displayable images
#[derive(Debug, Clone, PartialEq)]
pub enum CodecError {
    /// File body absent or empty
    MissingContent,
    Malformed(String),
    /// A required metadata field was not reported by the store
    MissingMetadata(&'static str),
}

impl std::fmt::Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodecError::MissingContent => write!(f, "file content is missing"),
            CodecError::Malformed(msg) => write!(f, "malformed image data: {}", msg),
            CodecError::MissingMetadata(field) => write!(f, "metadata field '{}' is missing", field),
        }
    }
}

impl std::error::Error for CodecError {}

/// Store-reported metadata of one file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageMetadata {
    pub mtime: DateTime<Utc>,
    pub size: u64,
}

/// Builds the data URL (Base64) the UI renders directly
pub fn decode(raw: &[u8]) -> Result<String, CodecError> {
    if raw.is_empty() {
        return Err(CodecError::MissingContent);
    }
    let b64 = base64::engine::general_purpose::STANDARD.encode(raw);
    Ok(format!("data:{};base64,{}", INLINE_MIME, b64))
}

/// Recovers the original bytes from a data URL produced by [`decode`]
pub fn encode(src: &str) -> Result<Vec<u8>, CodecError> {
    let rest = src
        .strip_prefix("data:")
        .ok_or_else(|| CodecError::Malformed("not a data URL".to_string()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| CodecError::Malformed("data URL without payload".to_string()))?;
    if !header.ends_with(";base64") {
        return Err(CodecError::Malformed(format!(
            "unsupported data URL encoding '{}'",
            header
        )));
    }

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| CodecError::Malformed(e.to_string()))?;
    if bytes.is_empty() {
        return Err(CodecError::MissingContent);
    }
    Ok(bytes)
}

/// Size comes from the directory listing, mtime from the file read
pub fn extract_metadata(file: &StoreFile, entry: &DirEntry) -> Result<ImageMetadata, CodecError> {
    let mtime = file
        .metadata
        .mtime
        .ok_or(CodecError::MissingMetadata("mtime"))?;
    Ok(ImageMetadata {
        mtime,
        size: entry.size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use gallery_store::FileMetadata;

    #[test]
    fn test_decode_builds_jpeg_data_url() {
        let src = decode(&[0xff, 0xd8, 0xff]).unwrap();
        assert_eq!(src, "data:image/jpeg;base64,/9j/");
    }

    #[test]
    fn test_decode_is_lossless() {
        let raw: Vec<u8> = (0..=255).collect();
        let src = decode(&raw).unwrap();
        assert_eq!(encode(&src).unwrap(), raw);
    }

    #[test]
    fn test_empty_content_is_missing() {
        assert_eq!(decode(&[]), Err(CodecError::MissingContent));
    }

    #[test]
    fn test_encode_rejects_malformed() {
        assert!(matches!(encode("/9j/"), Err(CodecError::Malformed(_))));
        assert!(matches!(
            encode("data:image/jpeg,plain"),
            Err(CodecError::Malformed(_))
        ));
        assert!(matches!(
            encode("data:image/jpeg;base64,@@@"),
            Err(CodecError::Malformed(_))
        ));
    }

    #[test]
    fn test_extract_metadata() {
        let mtime = Utc.timestamp_opt(20, 0).unwrap();
        let entry = DirEntry {
            name: "b.jpg".to_string(),
            size: 50,
        };
        let file = StoreFile {
            content: Some(vec![1]),
            metadata: FileMetadata { mtime: Some(mtime) },
        };
        assert_eq!(
            extract_metadata(&file, &entry).unwrap(),
            ImageMetadata { mtime, size: 50 }
        );

        let file = StoreFile {
            content: Some(vec![1]),
            metadata: FileMetadata { mtime: None },
        };
        assert_eq!(
            extract_metadata(&file, &entry),
            Err(CodecError::MissingMetadata("mtime"))
        );
    }
}
