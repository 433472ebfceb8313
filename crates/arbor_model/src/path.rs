//! Hierarchical entity addressing.
//!
//! A [`ModelPath`] is an immutable, non-empty sequence of name segments such
//! as `app.main.cpp`. Paths order segment-lexicographically, which is the
//! same order as a depth-first, pre-order walk of the hierarchy: a parent
//! always sorts immediately before its descendants.
//!
//! # Example
//!
//! ```
//! use arbor_model::path::ModelPath;
//!
//! let app = ModelPath::root("app").unwrap();
//! let sources = app.child("sources").unwrap();
//!
//! assert_eq!(sources.to_string(), "app.sources");
//! assert!(sources.is_descendant_of(&app));
//! assert_eq!(sources.parent(), Some(app));
//! ```

use core::fmt;
use core::str::FromStr;
use std::sync::Arc;

/// Separator used when displaying or parsing paths.
pub const SEPARATOR: char = '.';

/// Errors produced when building a path from invalid segments.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// A path must contain at least one segment.
    #[error("path must contain at least one segment")]
    Empty,

    /// A segment was the empty string.
    #[error("path segment at position {position} is empty")]
    EmptySegment {
        /// Zero-based index of the offending segment.
        position: usize,
    },

    /// A segment contained the path separator.
    #[error("path segment '{segment}' must not contain '.'")]
    InvalidSegment {
        /// The offending segment.
        segment: String,
    },
}

/// Immutable hierarchical identifier of a model entity.
///
/// Cloning is cheap: segments are shared behind an [`Arc`].
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModelPath {
    segments: Arc<[Arc<str>]>,
}

impl ModelPath {
    /// Creates a single-segment path.
    ///
    /// # Errors
    ///
    /// Returns [`PathError`] if `name` is empty or contains the separator.
    pub fn root(name: impl AsRef<str>) -> Result<Self, PathError> {
        let name = validate_segment(name.as_ref(), 0)?;
        Ok(Self {
            segments: Arc::from(vec![name]),
        })
    }

    /// Creates a path from a sequence of segments.
    ///
    /// # Errors
    ///
    /// Returns [`PathError::Empty`] for an empty sequence, or a segment error
    /// for the first invalid segment.
    pub fn from_segments<I, S>(segments: I) -> Result<Self, PathError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let segments = segments
            .into_iter()
            .enumerate()
            .map(|(position, segment)| validate_segment(segment.as_ref(), position))
            .collect::<Result<Vec<_>, _>>()?;

        if segments.is_empty() {
            return Err(PathError::Empty);
        }

        Ok(Self {
            segments: Arc::from(segments),
        })
    }

    /// Parses a dotted path such as `"app.sources"`.
    ///
    /// # Errors
    ///
    /// Returns [`PathError`] if the string is empty or has an empty segment.
    pub fn parse(path: &str) -> Result<Self, PathError> {
        if path.is_empty() {
            return Err(PathError::Empty);
        }
        Self::from_segments(path.split(SEPARATOR))
    }

    /// Returns a new path with `name` appended.
    ///
    /// # Errors
    ///
    /// Returns [`PathError`] if `name` is not a valid segment.
    pub fn child(&self, name: impl AsRef<str>) -> Result<Self, PathError> {
        let name = validate_segment(name.as_ref(), self.segments.len())?;
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.extend(self.segments.iter().cloned());
        segments.push(name);
        Ok(Self {
            segments: Arc::from(segments),
        })
    }

    /// Returns the parent path, or `None` for a root path.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        match self.segments.len() {
            0 | 1 => None,
            len => Some(Self {
                segments: Arc::from(&self.segments[..len - 1]),
            }),
        }
    }

    /// Returns the last segment.
    #[must_use]
    pub fn name(&self) -> &str {
        self.segments.last().map_or("", |segment| &**segment)
    }

    /// Returns the number of segments.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Returns `true` if this path has no parent.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.len() == 1
    }

    /// Iterates over the segments, root first.
    pub fn segments(&self) -> impl DoubleEndedIterator<Item = &str> + ExactSizeIterator {
        self.segments.iter().map(|segment| &**segment)
    }

    /// Iterates over the strict ancestors, nearest first.
    pub fn ancestors(&self) -> impl Iterator<Item = ModelPath> + '_ {
        (1..self.segments.len()).rev().map(|len| Self {
            segments: Arc::from(&self.segments[..len]),
        })
    }

    /// Returns `true` if `self` lies strictly below `ancestor`.
    #[must_use]
    pub fn is_descendant_of(&self, ancestor: &ModelPath) -> bool {
        self.segments.len() > ancestor.segments.len()
            && self.segments[..ancestor.segments.len()] == ancestor.segments[..]
    }

    /// Returns `true` if `self` lies strictly above `descendant`.
    #[must_use]
    pub fn is_ancestor_of(&self, descendant: &ModelPath) -> bool {
        descendant.is_descendant_of(self)
    }

    /// Returns `true` if `self` is an immediate child of `parent`.
    #[must_use]
    pub fn is_direct_descendant_of(&self, parent: &ModelPath) -> bool {
        self.segments.len() == parent.segments.len() + 1 && self.is_descendant_of(parent)
    }

    /// Returns `true` if `self` equals `other` or lies below it.
    #[must_use]
    pub fn starts_with(&self, other: &ModelPath) -> bool {
        self == other || self.is_descendant_of(other)
    }
}

fn validate_segment(segment: &str, position: usize) -> Result<Arc<str>, PathError> {
    if segment.is_empty() {
        return Err(PathError::EmptySegment { position });
    }
    if segment.contains(SEPARATOR) {
        return Err(PathError::InvalidSegment {
            segment: segment.to_string(),
        });
    }
    Ok(Arc::from(segment))
}

impl fmt::Display for ModelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, "{SEPARATOR}")?;
            }
            f.write_str(segment)?;
        }
        Ok(())
    }
}

impl fmt::Debug for ModelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModelPath({self})")
    }
}

impl FromStr for ModelPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for ModelPath {
    type Error = PathError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> ModelPath {
        ModelPath::parse(s).unwrap()
    }

    #[test]
    fn child_appends_segment() {
        let app = path("app");
        let child = app.child("sources").unwrap();
        assert_eq!(child, path("app.sources"));
        assert_eq!(child.depth(), 2);
        assert_eq!(child.name(), "sources");
    }

    #[test]
    fn parent_of_root_is_none() {
        assert_eq!(path("app").parent(), None);
        assert_eq!(path("app.a.b").parent(), Some(path("app.a")));
    }

    #[test]
    fn rejects_invalid_segments() {
        assert_eq!(ModelPath::parse(""), Err(PathError::Empty));
        assert_eq!(
            ModelPath::parse("app..x"),
            Err(PathError::EmptySegment { position: 1 })
        );
        assert!(matches!(
            path("app").child("a.b"),
            Err(PathError::InvalidSegment { .. })
        ));
        assert_eq!(
            ModelPath::from_segments(Vec::<&str>::new()),
            Err(PathError::Empty)
        );
    }

    #[test]
    fn descendant_relations_are_strict() {
        let app = path("app");
        let deep = path("app.main.cpp");

        assert!(deep.is_descendant_of(&app));
        assert!(app.is_ancestor_of(&deep));
        assert!(!app.is_descendant_of(&app));
        assert!(!deep.is_direct_descendant_of(&app));
        assert!(path("app.main").is_direct_descendant_of(&app));
        assert!(!path("application").is_descendant_of(&app));
    }

    #[test]
    fn ancestors_are_nearest_first() {
        let ancestors: Vec<_> = path("a.b.c").ancestors().collect();
        assert_eq!(ancestors, vec![path("a.b"), path("a")]);
    }

    #[test]
    fn ordering_is_depth_first() {
        let mut paths = vec![
            path("app0"),
            path("app.z"),
            path("app"),
            path("app.a.deep"),
            path("app.a"),
        ];
        paths.sort();
        assert_eq!(
            paths,
            vec![
                path("app"),
                path("app.a"),
                path("app.a.deep"),
                path("app.z"),
                path("app0"),
            ]
        );
    }

    #[test]
    fn display_round_trips_through_parse() {
        let original = path("lib.test.objects");
        assert_eq!(original.to_string().parse::<ModelPath>(), Ok(original));
    }
}
