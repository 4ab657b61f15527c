use gallery_store::Partition;
use serde::{Deserialize, Serialize};

/// Top-level gallery partition the user can switch between
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Area {
    #[default]
    Public,
    Private,
}

impl Area {
    pub fn as_str(&self) -> &'static str {
        match self {
            Area::Public => "public",
            Area::Private => "private",
        }
    }

    pub fn is_private(&self) -> bool {
        matches!(self, Area::Private)
    }

    /// Store partition holding this area's files
    pub fn partition(&self) -> Partition {
        match self {
            Area::Public => Partition::Public,
            Area::Private => Partition::Private,
        }
    }

    pub fn all() -> &'static [Area] {
        &[Area::Public, Area::Private]
    }
}

impl std::fmt::Display for Area {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Area {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "public" => Ok(Area::Public),
            "private" => Ok(Area::Private),
            other => Err(format!("unknown area '{}', expected public or private", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_area() {
        assert_eq!("Public".parse::<Area>().unwrap(), Area::Public);
        assert_eq!("private".parse::<Area>().unwrap(), Area::Private);
        assert!("shared".parse::<Area>().is_err());
    }

    #[test]
    fn test_area_partition() {
        assert_eq!(Area::Public.partition(), Partition::Public);
        assert_eq!(Area::Private.partition(), Partition::Private);
        assert!(Area::Private.is_private());
        assert!(!Area::Public.is_private());
    }
}
