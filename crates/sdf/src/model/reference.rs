use std::fmt;

use crate::path::Path;

/// A reference to a prim in another layer, or in the same layer when
/// `asset_path` is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reference {
    pub asset_path: String,
    pub prim_path: Path,
}

impl Reference {
    pub fn new(asset_path: impl Into<String>, prim_path: Path) -> Self {
        Self {
            asset_path: asset_path.into(),
            prim_path,
        }
    }

    /// A reference to `prim_path` in the referencing layer itself.
    pub fn internal(prim_path: Path) -> Self {
        Self::new(String::new(), prim_path)
    }

    pub fn is_internal(&self) -> bool {
        self.asset_path.is_empty()
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.asset_path.is_empty() {
            write!(f, "@{}@", self.asset_path)?;
        }
        if !self.prim_path.is_empty() {
            write!(f, "<{}>", self.prim_path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let r = Reference::new("model.usd", Path::parse("/Model").unwrap());
        assert_eq!(r.to_string(), "@model.usd@</Model>");
        let r = Reference::internal(Path::parse("/Local").unwrap());
        assert!(r.is_internal());
        assert_eq!(r.to_string(), "</Local>");
        assert_eq!(Reference::new("a.usd", Path::empty()).to_string(), "@a.usd@");
    }
}
