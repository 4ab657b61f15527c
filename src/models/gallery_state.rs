use crate::models::{Area, Image};

/// Image list of one area
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ImageList {
    #[default]
    NotLoaded,
    Loaded(Vec<Image>),
}

impl ImageList {
    pub fn is_loaded(&self) -> bool {
        matches!(self, ImageList::Loaded(_))
    }

    /// Loaded images, empty if not loaded yet
    pub fn as_slice(&self) -> &[Image] {
        match self {
            ImageList::NotLoaded => &[],
            ImageList::Loaded(images) => images,
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.as_slice().iter().map(|i| i.name.as_str()).collect()
    }
}

/// Everything the gallery UI renders from
///
/// Replaced as a whole on every change; the two image lists are loaded
/// independently and a load of one never touches the other.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GalleryState {
    pub selected_area: Area,
    pub public_images: ImageList,
    pub private_images: ImageList,
    /// True while a listing of the selected area is in flight
    pub loading: bool,
}

impl GalleryState {
    pub fn images(&self, area: Area) -> &ImageList {
        match area {
            Area::Public => &self.public_images,
            Area::Private => &self.private_images,
        }
    }

    /// Images of the currently selected area
    pub fn current_images(&self) -> &ImageList {
        self.images(self.selected_area)
    }

    pub fn with_images(mut self, area: Area, images: Vec<Image>) -> Self {
        match area {
            Area::Public => self.public_images = ImageList::Loaded(images),
            Area::Private => self.private_images = ImageList::Loaded(images),
        }
        self
    }

    pub fn with_loading(mut self, loading: bool) -> Self {
        self.loading = loading;
        self
    }

    pub fn with_selected_area(mut self, area: Area) -> Self {
        self.selected_area = area;
        self
    }
}
