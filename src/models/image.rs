use crate::models::Area;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One gallery entry, rebuilt from the store on every listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Image {
    /// Fresh per listing, not derived from content
    pub id: Uuid,
    /// File name inside the area's gallery directory
    pub name: String,
    pub mtime: DateTime<Utc>,
    pub size: u64,
    pub private: bool,
    /// Inline data URL with the full image bytes
    pub src: String,
}

impl Image {
    pub fn area(&self) -> Area {
        if self.private {
            Area::Private
        } else {
            Area::Public
        }
    }
}
