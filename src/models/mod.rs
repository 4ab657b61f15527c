pub mod area;
pub mod gallery_state;
pub mod image;

pub use area::Area;
pub use gallery_state::{GalleryState, ImageList};
pub use image::Image;
