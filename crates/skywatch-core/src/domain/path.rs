//! Remote path parsing
//!
//! A watched resource is addressed by a backslash-delimited path such as
//! `folder\subfolder\file.txt`. [`RemotePath::parse`] splits it into the
//! chain of containers that must be walked from the drive root and the
//! leaf file name, and exposes the listing endpoints the walk needs.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use super::errors::DomainError;

/// Segment delimiter used in watched paths
pub const PATH_DELIMITER: char = '\\';

/// Identifier of the fixed root container every path is relative to
pub const ROOT_CONTAINER_ID: &str = "root";

/// Listing endpoint of the root container
pub const ROOT_LISTING_ENDPOINT: &str = "/me/drive/root/children";

/// Parsed representation of a delimited remote path
///
/// Invariants (checked by [`RemotePath::parse`]):
/// - `file_name` is non-empty
/// - no entry of `segments` is empty
/// - `segments` is empty iff the file lives directly in the root container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePath {
    raw_file_path: String,
    segments: Vec<String>,
    file_name: String,
}

impl RemotePath {
    /// Parses a delimited path string
    ///
    /// The last token is the file name; all preceding tokens, top-level
    /// container first, are the container segments.
    ///
    /// # Errors
    /// Returns [`DomainError::InvalidArgument`] if `path` is empty or
    /// contains an empty segment or an empty file name
    pub fn parse(path: &str) -> Result<Self, DomainError> {
        if path.is_empty() {
            return Err(DomainError::InvalidArgument(
                "path must not be empty".to_string(),
            ));
        }

        let mut tokens: Vec<String> = path.split(PATH_DELIMITER).map(str::to_string).collect();
        // split() on a non-empty string always yields at least one token
        let file_name = tokens.pop().unwrap_or_default();

        if file_name.is_empty() {
            return Err(DomainError::InvalidArgument(format!(
                "path '{path}' has no file name"
            )));
        }
        if tokens.iter().any(String::is_empty) {
            return Err(DomainError::InvalidArgument(format!(
                "path '{path}' contains an empty segment"
            )));
        }

        let raw_file_path = tokens.join(&PATH_DELIMITER.to_string());

        Ok(Self {
            raw_file_path,
            segments: tokens,
            file_name,
        })
    }

    /// Container part of the path, segments rejoined with the delimiter
    ///
    /// Empty for files that live directly in the root container.
    pub fn raw_file_path(&self) -> &str {
        &self.raw_file_path
    }

    /// Container segments, top-level container first
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Leaf file name
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Returns true if the file lives directly in the root container
    pub fn is_root_level(&self) -> bool {
        self.segments.is_empty()
    }

    /// Identifier of the root container the walk starts from
    pub fn root_container_id(&self) -> &'static str {
        ROOT_CONTAINER_ID
    }

    /// Listing endpoint of the root container
    pub fn root_listing_endpoint(&self) -> &'static str {
        ROOT_LISTING_ENDPOINT
    }

    /// Listing endpoint of an arbitrary container
    pub fn container_listing_endpoint(container_id: &str) -> String {
        format!("/me/drive/items/{container_id}/children")
    }
}

impl Display for RemotePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.raw_file_path.is_empty() {
            write!(f, "{}", self.file_name)
        } else {
            write!(f, "{}{}{}", self.raw_file_path, PATH_DELIMITER, self.file_name)
        }
    }
}

impl FromStr for RemotePath {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_fails() {
        let err = RemotePath::parse("").unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument(_)));
    }

    #[test]
    fn test_parse_without_delimiter_is_root_level() {
        for p in ["file.txt", "a", "name with spaces.md", "x/y.txt"] {
            let path = RemotePath::parse(p).unwrap();
            assert!(path.segments().is_empty(), "segments for {p}");
            assert!(path.is_root_level());
            assert_eq!(path.file_name(), p);
            assert_eq!(path.raw_file_path(), "");
        }
    }

    #[test]
    fn test_parse_nested() {
        let path = RemotePath::parse(r"a\b\c").unwrap();
        assert_eq!(path.segments(), &["a".to_string(), "b".to_string()]);
        assert_eq!(path.file_name(), "c");
        assert_eq!(path.raw_file_path(), r"a\b");
        assert!(!path.is_root_level());
    }

    #[test]
    fn test_parse_single_folder() {
        let path = RemotePath::parse(r"folder\file.txt").unwrap();
        assert_eq!(path.segments(), &["folder".to_string()]);
        assert_eq!(path.file_name(), "file.txt");
        assert_eq!(path.raw_file_path(), "folder");
    }

    #[test]
    fn test_parse_rejects_trailing_delimiter() {
        assert!(RemotePath::parse(r"folder\").is_err());
        assert!(RemotePath::parse(r"\").is_err());
    }

    #[test]
    fn test_parse_rejects_empty_segment() {
        assert!(RemotePath::parse(r"a\\b").is_err());
        assert!(RemotePath::parse(r"\file.txt").is_err());
    }

    #[test]
    fn test_endpoints() {
        let path = RemotePath::parse(r"folder\file.txt").unwrap();
        assert_eq!(path.root_container_id(), "root");
        assert_eq!(path.root_listing_endpoint(), "/me/drive/root/children");
        assert_eq!(
            RemotePath::container_listing_endpoint("ABC!123"),
            "/me/drive/items/ABC!123/children"
        );
    }

    #[test]
    fn test_root_endpoint_independent_of_input() {
        let a = RemotePath::parse("x.txt").unwrap();
        let b = RemotePath::parse(r"deep\nested\tree\x.txt").unwrap();
        assert_eq!(a.root_listing_endpoint(), b.root_listing_endpoint());
    }

    #[test]
    fn test_display_round_trips() {
        for p in ["file.txt", r"folder\subfolder\file.txt"] {
            let path: RemotePath = p.parse().unwrap();
            assert_eq!(path.to_string(), p);
        }
    }
}
