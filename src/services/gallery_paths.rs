//! Gallery path layout inside the store
//!
//! Directory structure:
//! ```text
//! <store root>
//! ├── public/
//! │   └── gallery/          # images visible to everyone
//! │       └── <name>
//! └── private/
//!     └── gallery/          # images in the private partition
//!         └── <name>
//! ```

use crate::error::GalleryError;
use crate::models::Area;
use gallery_store::StorePath;

/// Gallery directory of the public area
pub const PUBLIC_GALLERY: [&str; 2] = ["public", "gallery"];

/// Gallery directory of the private area
pub const PRIVATE_GALLERY: [&str; 2] = ["private", "gallery"];

/// Directory segments for an area
pub fn gallery_segments(area: Area) -> [&'static str; 2] {
    match area {
        Area::Public => PUBLIC_GALLERY,
        Area::Private => PRIVATE_GALLERY,
    }
}

/// Build the gallery directory path for an area
pub fn gallery_dir(area: Area) -> StorePath {
    StorePath::from_static(&gallery_segments(area))
}

/// Build the path of one image inside an area's gallery directory
pub fn gallery_file(area: Area, name: &str) -> Result<StorePath, GalleryError> {
    gallery_dir(area)
        .join(name)
        .map_err(|_| GalleryError::InvalidName(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gallery_dir() {
        assert_eq!(gallery_dir(Area::Public).to_string(), "public/gallery");
        assert_eq!(gallery_dir(Area::Private).to_string(), "private/gallery");
    }

    #[test]
    fn test_gallery_file() {
        let path = gallery_file(Area::Private, "cat.jpg").unwrap();
        assert_eq!(path.to_string(), "private/gallery/cat.jpg");
        assert_eq!(path.partition().unwrap(), Area::Private.partition());
    }

    #[test]
    fn test_areas_never_share_a_prefix() {
        for name in ["a.jpg", "public", "private", "gallery"] {
            let public = gallery_file(Area::Public, name).unwrap();
            let private = gallery_file(Area::Private, name).unwrap();
            assert_ne!(public, private);
            assert_eq!(public.segments()[0], "public");
            assert_eq!(private.segments()[0], "private");
        }
    }

    #[test]
    fn test_names_cannot_escape_the_gallery() {
        for name in ["", ".", "..", "../private/x.jpg", "a/b.jpg"] {
            assert!(matches!(
                gallery_file(Area::Public, name),
                Err(GalleryError::InvalidName(_))
            ));
        }
    }
}
