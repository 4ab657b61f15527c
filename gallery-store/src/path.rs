use crate::error::{StoreError, StoreResult};

/// Top-level partition of a store. The two trees never share a namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Partition {
    Public,
    Private,
}

impl Partition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::Public => "public",
            Partition::Private => "private",
        }
    }

    fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "public" => Some(Partition::Public),
            "private" => Some(Partition::Private),
            _ => None,
        }
    }
}

/// A path inside the store, kept as segments
///
/// `public/gallery/cat.jpg` is `["public", "gallery", "cat.jpg"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorePath {
    segments: Vec<String>,
}

impl StorePath {
    /// Build a path from segments, validating each one
    pub fn from_segments<I, S>(segments: I) -> StoreResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(StoreError::InvalidPath("empty path".to_string()));
        }
        for segment in &segments {
            validate_segment(segment)?;
        }
        Ok(Self { segments })
    }

    /// Build a path from constant segments that are valid by construction
    ///
    /// Invalid segments are a programming error and trip a debug assertion.
    pub fn from_static(segments: &[&'static str]) -> Self {
        debug_assert!(
            !segments.is_empty() && segments.iter().all(|s| validate_segment(s).is_ok()),
            "invalid static path {:?}",
            segments
        );
        Self {
            segments: segments.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Parse a `/`-separated path. Leading and trailing slashes are ignored.
    pub fn parse(path: &str) -> StoreResult<Self> {
        Self::from_segments(path.trim_matches('/').split('/'))
    }

    /// Returns a new path with `name` appended as the last segment
    pub fn join(&self, name: &str) -> StoreResult<Self> {
        validate_segment(name)?;
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Last segment (file or directory name)
    pub fn name(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }

    /// Path without its last segment, `None` for a single-segment path
    pub fn parent(&self) -> Option<StorePath> {
        if self.segments.len() < 2 {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// The partition this path lives in, rejecting anything outside public/private
    pub fn partition(&self) -> StoreResult<Partition> {
        Partition::from_segment(&self.segments[0]).ok_or_else(|| {
            StoreError::InvalidPath(format!(
                "'{}' is outside the public and private partitions",
                self
            ))
        })
    }

    /// The path below the partition segment, e.g. `gallery/cat.jpg`
    pub fn within_partition(&self) -> String {
        self.segments[1..].join("/")
    }

    /// True if `self` is the direct parent directory of `other`
    pub fn is_parent_of(&self, other: &StorePath) -> bool {
        other.segments.len() == self.segments.len() + 1
            && other.segments.starts_with(&self.segments)
    }
}

impl std::fmt::Display for StorePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

fn validate_segment(segment: &str) -> StoreResult<()> {
    if segment.is_empty() || segment == "." || segment == ".." || segment.contains('/') {
        return Err(StoreError::InvalidPath(format!(
            "invalid path segment '{}'",
            segment
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let path = StorePath::parse("/public/gallery/cat.jpg").unwrap();
        assert_eq!(path.segments(), &["public", "gallery", "cat.jpg"]);
        assert_eq!(path.to_string(), "public/gallery/cat.jpg");
        assert_eq!(path.name(), "cat.jpg");
    }

    #[test]
    fn test_from_static_matches_parse() {
        assert_eq!(
            StorePath::from_static(&["private", "gallery"]),
            StorePath::parse("private/gallery").unwrap()
        );
    }

    #[test]
    fn test_rejects_traversal() {
        assert!(StorePath::parse("public/../private/gallery").is_err());
        assert!(StorePath::parse("public//gallery").is_err());
        let dir = StorePath::parse("public/gallery").unwrap();
        assert!(dir.join("a/b.jpg").is_err());
        assert!(dir.join("").is_err());
    }

    #[test]
    fn test_partition() {
        let public = StorePath::parse("public/gallery").unwrap();
        let private = StorePath::parse("private/gallery").unwrap();
        let other = StorePath::parse("shared/gallery").unwrap();
        assert_eq!(public.partition().unwrap(), Partition::Public);
        assert_eq!(private.partition().unwrap(), Partition::Private);
        assert!(other.partition().is_err());
        assert_eq!(public.within_partition(), "gallery");
    }

    #[test]
    fn test_parent_relationship() {
        let dir = StorePath::parse("public/gallery").unwrap();
        let file = dir.join("cat.jpg").unwrap();
        assert!(dir.is_parent_of(&file));
        assert!(!file.is_parent_of(&dir));
        assert_eq!(file.parent(), Some(dir));
    }
}
