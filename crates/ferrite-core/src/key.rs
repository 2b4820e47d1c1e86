//! Cache key type.

use std::fmt;
use std::path::PathBuf;

use crate::{Error, Result};

/// Identifies one remote object: bucket name plus object name. Doubles as
/// the on-disk subpath `<cache_dir>/<bucket>/<object>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    bucket: String,
    object: String,
}

impl ObjectKey {
    /// Build a key, rejecting names that would escape the cache directory.
    pub fn new(bucket: impl Into<String>, object: impl Into<String>) -> Result<Self> {
        let bucket = bucket.into();
        let object = object.into();

        if bucket.is_empty() || object.is_empty() {
            return Err(Error::InvalidKey("empty bucket or object name".into()));
        }
        if bucket.contains('/') || bucket == ".." {
            return Err(Error::InvalidKey(format!("invalid bucket name: {bucket}")));
        }
        if object.split('/').any(|seg| seg.is_empty() || seg == "..") {
            return Err(Error::InvalidKey(format!("invalid object name: {object}")));
        }

        Ok(Self { bucket, object })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn object(&self) -> &str {
        &self.object
    }

    /// Path of the finalized cache file relative to the cache directory.
    pub fn relative_path(&self) -> PathBuf {
        PathBuf::from(&self.bucket).join(&self.object)
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_path_nests_bucket_and_object() {
        let key = ObjectKey::new("models", "weights/v1.bin").unwrap();
        assert_eq!(key.relative_path(), PathBuf::from("models/weights/v1.bin"));
        assert_eq!(key.to_string(), "models/weights/v1.bin");
    }

    #[test]
    fn rejects_traversal_and_empty_names() {
        assert!(ObjectKey::new("", "a").is_err());
        assert!(ObjectKey::new("b", "").is_err());
        assert!(ObjectKey::new("b", "../etc/passwd").is_err());
        assert!(ObjectKey::new("b", "a//b").is_err());
        assert!(ObjectKey::new("b/c", "a").is_err());
        assert!(ObjectKey::new("..", "a").is_err());
    }

    #[test]
    fn dots_inside_names_are_legitimate() {
        assert!(ObjectKey::new("a..b", "x").is_ok());
        assert!(ObjectKey::new("b", "v1..v2.diff").is_ok());
    }
}
