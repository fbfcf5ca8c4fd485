//! Distributed filesystem paths
//!
//! A [`Path`] names a file or directory in the shared namespace as an
//! immutable sequence of components. The string form is the components
//! joined with forward slashes behind a leading slash; the root directory is
//! a single `/`. The slash is the delimiter and the colon is reserved, so
//! neither may appear inside a component.
//!
//! Paths are plain values: cheap to clone, comparable component-wise, and
//! safe to share across threads.

use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from path construction and local-tree enumeration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("invalid path {0:?}: {1}")]
    InvalidPath(String, &'static str),

    #[error("invalid component {0:?}: {1}")]
    InvalidComponent(String, &'static str),

    #[error("the root path has no {0}")]
    Root(&'static str),

    #[error("directory not found: {0}")]
    NotFound(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("i/o failure: {0}")]
    Io(String),
}

/// An immutable hierarchical path in the shared namespace.
///
/// Equality, ordering, and hashing are all component-wise; two paths that
/// print the same compare equal. On the wire a path carries both its string
/// form and its component list, so a decoded path compares equal to the one
/// that was sent.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "PathWire", try_from = "PathWire")]
pub struct Path {
    components: Vec<String>,
}

impl Path {
    /// The root directory (zero components).
    pub fn root() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    /// Parses a path string.
    ///
    /// The string must begin with `/` and contain no `:`. Runs of
    /// consecutive slashes collapse, so `/a/b//c` and `/a/b/c` are the same
    /// path.
    pub fn parse(input: &str) -> Result<Self, PathError> {
        if input.is_empty() {
            return Err(PathError::InvalidPath(input.into(), "empty string"));
        }
        if !input.starts_with('/') {
            return Err(PathError::InvalidPath(
                input.into(),
                "must begin with a forward slash",
            ));
        }
        if input.contains(':') {
            return Err(PathError::InvalidPath(
                input.into(),
                "colons are reserved",
            ));
        }

        let components = input
            .split('/')
            .filter(|c| !c.is_empty())
            .map(str::to_owned)
            .collect();
        Ok(Self { components })
    }

    /// Returns a new path with `component` appended.
    pub fn join(&self, component: &str) -> Result<Self, PathError> {
        if component.is_empty() {
            return Err(PathError::InvalidComponent(
                component.into(),
                "empty string",
            ));
        }
        if component.contains('/') || component.contains(':') {
            return Err(PathError::InvalidComponent(
                component.into(),
                "must not contain the delimiter or a colon",
            ));
        }

        let mut components = self.components.clone();
        components.push(component.to_owned());
        Ok(Self { components })
    }

    /// Iterates over the components in path order.
    ///
    /// Every call starts a fresh iterator; the path itself never changes.
    pub fn components(&self) -> impl Iterator<Item = &str> + '_ {
        self.components.iter().map(String::as_str)
    }

    /// Number of components; the root has zero.
    pub fn depth(&self) -> usize {
        self.components.len()
    }

    /// `true` iff this is the root directory.
    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// The path with the last component removed.
    pub fn parent(&self) -> Result<Self, PathError> {
        match self.components.split_last() {
            Some((_, rest)) => Ok(Self {
                components: rest.to_vec(),
            }),
            None => Err(PathError::Root("parent")),
        }
    }

    /// The last component.
    pub fn last(&self) -> Result<&str, PathError> {
        self.components
            .last()
            .map(String::as_str)
            .ok_or(PathError::Root("last component"))
    }

    /// Component-wise prefix test: `true` iff `prefix`'s components are a
    /// (not necessarily proper) prefix of this path's components.
    ///
    /// Matching is per component, not per character: `/a/b` starts with
    /// `/a`, but `/ab` does not.
    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.components.starts_with(&prefix.components)
    }

    /// Enumerates all regular files under a local directory tree, as paths
    /// relative to `root`.
    ///
    /// Fails with [`PathError::NotFound`] if `root` does not exist and
    /// [`PathError::NotADirectory`] if it is not a directory.
    pub fn list_files(root: &std::path::Path) -> Result<Vec<Path>, PathError> {
        let metadata = fs::metadata(root)
            .map_err(|_| PathError::NotFound(root.display().to_string()))?;
        if !metadata.is_dir() {
            return Err(PathError::NotADirectory(root.display().to_string()));
        }

        let mut found = Vec::new();
        walk(root, &Path::root(), &mut found)?;
        Ok(found)
    }

    /// Resolves this path under a local root directory.
    pub fn to_local(&self, root: &std::path::Path) -> PathBuf {
        let mut resolved = root.to_path_buf();
        for component in &self.components {
            resolved.push(component);
        }
        resolved
    }
}

fn walk(dir: &std::path::Path, relative: &Path, out: &mut Vec<Path>) -> Result<(), PathError> {
    let entries = fs::read_dir(dir).map_err(|e| PathError::Io(e.to_string()))?;
    for entry in entries {
        let entry = entry.map_err(|e| PathError::Io(e.to_string()))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let child = relative.join(&name)?;
        let file_type = entry.file_type().map_err(|e| PathError::Io(e.to_string()))?;
        if file_type.is_dir() {
            walk(&entry.path(), &child, out)?;
        } else if file_type.is_file() {
            out.push(child);
        }
    }
    Ok(())
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return f.write_str("/");
        }
        for component in &self.components {
            write!(f, "/{component}")?;
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Path::parse(s)
    }
}

/// Wire form of a path: the string rendering plus the component list.
#[derive(Serialize, Deserialize)]
struct PathWire {
    text: String,
    components: Vec<String>,
}

impl From<Path> for PathWire {
    fn from(path: Path) -> Self {
        Self {
            text: path.to_string(),
            components: path.components,
        }
    }
}

impl TryFrom<PathWire> for Path {
    type Error = String;

    fn try_from(wire: PathWire) -> Result<Self, Self::Error> {
        for component in &wire.components {
            if component.is_empty() || component.contains('/') || component.contains(':') {
                return Err(format!("invalid path component {component:?}"));
            }
        }
        let path = Path {
            components: wire.components,
        };
        if path.to_string() != wire.text {
            return Err(format!(
                "path text {:?} does not match its components",
                wire.text
            ));
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_root() {
        let root = Path::root();
        assert!(root.is_root());
        assert_eq!(root.depth(), 0);
        assert_eq!(root.to_string(), "/");
        assert_eq!(Path::parse("/").unwrap(), root);
    }

    #[test]
    fn test_parse_collapses_slashes() {
        let path = Path::parse("/a/b//c").unwrap();
        assert_eq!(path.to_string(), "/a/b/c");
        let components: Vec<_> = path.components().collect();
        assert_eq!(components, ["a", "b", "c"]);

        assert_eq!(Path::parse("///").unwrap(), Path::root());
        assert_eq!(Path::parse("/a/").unwrap(), Path::parse("/a").unwrap());
    }

    #[test]
    fn test_parse_rejects() {
        assert!(Path::parse("").is_err());
        assert!(Path::parse("a/b").is_err());
        assert!(Path::parse("relative").is_err());
        assert!(Path::parse("/a:b").is_err());
        assert!(Path::parse(":").is_err());
    }

    #[test]
    fn test_round_trip() {
        for text in ["/", "/a", "/a/b/c", "/with space/x"] {
            let path = Path::parse(text).unwrap();
            assert_eq!(Path::parse(&path.to_string()).unwrap(), path);
        }
    }

    #[test]
    fn test_join() {
        let path = Path::root().join("a").unwrap().join("b").unwrap();
        assert_eq!(path.to_string(), "/a/b");

        assert!(Path::root().join("").is_err());
        assert!(Path::root().join("a/b").is_err());
        assert!(Path::root().join("a:b").is_err());
    }

    #[test]
    fn test_parent_and_last() {
        let path = Path::parse("/a/b/c").unwrap();
        assert_eq!(path.last().unwrap(), "c");
        assert_eq!(path.parent().unwrap(), Path::parse("/a/b").unwrap());
        assert_eq!(
            Path::parse("/a").unwrap().parent().unwrap(),
            Path::root()
        );

        assert!(Path::root().parent().is_err());
        assert!(Path::root().last().is_err());
    }

    #[test]
    fn test_starts_with_is_component_wise() {
        let a = Path::parse("/a").unwrap();
        let ab = Path::parse("/a/b").unwrap();
        let glued = Path::parse("/ab").unwrap();

        assert!(a.starts_with(&a));
        assert!(ab.starts_with(&a));
        assert!(ab.starts_with(&Path::root()));
        assert!(!a.starts_with(&ab));
        assert!(!glued.starts_with(&a));
    }

    #[test]
    fn test_iterator_is_restartable() {
        let path = Path::parse("/x/y").unwrap();
        let first: Vec<_> = path.components().collect();
        let second: Vec<_> = path.components().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_equality_and_hash() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(Path::parse("/a/b").unwrap());
        assert!(set.contains(&Path::parse("/a//b").unwrap()));
        assert!(!set.contains(&Path::parse("/a").unwrap()));
    }

    #[test]
    fn test_wire_round_trip() {
        for text in ["/", "/a", "/deep/nested/file.txt"] {
            let path = Path::parse(text).unwrap();
            let bytes = bincode::serialize(&path).unwrap();
            let decoded: Path = bincode::deserialize(&bytes).unwrap();
            assert_eq!(decoded, path);
        }
    }

    #[test]
    fn test_wire_rejects_tampered_components() {
        let wire = PathWire {
            text: "/a/b".into(),
            components: vec!["a".into(), "b:c".into()],
        };
        assert!(Path::try_from(wire).is_err());

        let mismatched = PathWire {
            text: "/a".into(),
            components: vec!["b".into()],
        };
        assert!(Path::try_from(mismatched).is_err());
    }

    #[test]
    fn test_to_local() {
        let path = Path::parse("/a/b").unwrap();
        let local = path.to_local(std::path::Path::new("/srv/data"));
        assert_eq!(local, PathBuf::from("/srv/data/a/b"));
    }

    #[test]
    fn test_list_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub/inner")).unwrap();
        fs::write(dir.path().join("top.txt"), b"x").unwrap();
        fs::write(dir.path().join("sub/mid.txt"), b"y").unwrap();
        fs::write(dir.path().join("sub/inner/leaf.txt"), b"z").unwrap();

        let mut files = Path::list_files(dir.path()).unwrap();
        files.sort();
        assert_eq!(
            files,
            vec![
                Path::parse("/sub/inner/leaf.txt").unwrap(),
                Path::parse("/sub/mid.txt").unwrap(),
                Path::parse("/top.txt").unwrap(),
            ]
        );
    }

    #[test]
    fn test_list_files_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            Path::list_files(&missing),
            Err(PathError::NotFound(_))
        ));

        let file = dir.path().join("plain.txt");
        fs::write(&file, b"x").unwrap();
        assert!(matches!(
            Path::list_files(&file),
            Err(PathError::NotADirectory(_))
        ));
    }
}
