//! Unit resolution
//!
//! Maps a unit name (an import path) to the source files it consists of.

use arguard_contracts::FrontendError;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Source file extension
pub const SOURCE_EXTENSION: &str = "ag";

/// One source file of a unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Name used in positions
    pub name: SmolStr,
    pub source: String,
}

impl SourceFile {
    pub fn new(name: impl Into<SmolStr>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }
}

/// Errors that can occur while resolving a unit
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("cannot find unit `{unit}`")]
    NotFound { unit: SmolStr },

    #[error("unit `{unit}` has no .ag files in {}", .dir.display())]
    EmptyUnit { unit: SmolStr, dir: PathBuf },

    #[error("read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<ResolveError> for FrontendError {
    fn from(error: ResolveError) -> Self {
        match error {
            ResolveError::NotFound { unit } => FrontendError::UnitNotFound { unit },
            ResolveError::EmptyUnit { unit, .. } => FrontendError::UnitNotFound { unit },
            ResolveError::Io { path, source } => FrontendError::Io {
                path: path.display().to_string(),
                message: source.to_string(),
            },
        }
    }
}

/// Trait for finding the files of a unit
pub trait UnitResolver {
    /// Files of `unit`, in a stable order
    fn resolve(&self, unit: &str) -> Result<Vec<SourceFile>, ResolveError>;
}

impl<R: UnitResolver + ?Sized> UnitResolver for &R {
    fn resolve(&self, unit: &str) -> Result<Vec<SourceFile>, ResolveError> {
        (**self).resolve(unit)
    }
}

/// File system resolver
///
/// A unit `a/b` is either the file `<search path>/a/b.ag` or every `.ag`
/// file directly inside `<search path>/a/b/`. Search paths are tried in
/// order; the first match wins.
#[derive(Debug, Clone, Default)]
pub struct FileSystemResolver {
    search_paths: Vec<PathBuf>,
}

impl FileSystemResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            search_paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    pub fn add_search_path(&mut self, path: impl Into<PathBuf>) {
        self.search_paths.push(path.into());
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    fn read(path: &Path) -> Result<SourceFile, ResolveError> {
        let source = fs::read_to_string(path).map_err(|source| ResolveError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(SourceFile::new(path.display().to_string(), source))
    }

    fn read_dir(unit: &str, dir: &Path) -> Result<Vec<SourceFile>, ResolveError> {
        let io_error = |source| ResolveError::Io {
            path: dir.to_path_buf(),
            source,
        };

        let mut paths = Vec::new();
        for entry in fs::read_dir(dir).map_err(io_error)? {
            let path = entry.map_err(io_error)?.path();
            if path.is_file() && path.extension().map_or(false, |ext| ext == SOURCE_EXTENSION) {
                paths.push(path);
            }
        }
        paths.sort();

        if paths.is_empty() {
            return Err(ResolveError::EmptyUnit {
                unit: unit.into(),
                dir: dir.to_path_buf(),
            });
        }
        paths.iter().map(|path| Self::read(path)).collect()
    }
}

impl UnitResolver for FileSystemResolver {
    fn resolve(&self, unit: &str) -> Result<Vec<SourceFile>, ResolveError> {
        for search_path in &self.search_paths {
            let file = search_path.join(format!("{}.{}", unit, SOURCE_EXTENSION));
            if file.is_file() {
                return Ok(vec![Self::read(&file)?]);
            }

            let dir = search_path.join(unit);
            if dir.is_dir() {
                return Self::read_dir(unit, &dir);
            }
        }

        Err(ResolveError::NotFound { unit: unit.into() })
    }
}

/// In-memory resolver, mostly for tests
#[derive(Debug, Clone, Default)]
pub struct MemoryResolver {
    units: FxHashMap<SmolStr, Vec<SourceFile>>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file to `unit`, creating the unit if needed
    pub fn add_file(&mut self, unit: &str, name: &str, source: &str) -> &mut Self {
        self.units
            .entry(SmolStr::new(unit))
            .or_default()
            .push(SourceFile::new(name, source));
        self
    }

    /// Builder form of [`add_file`](Self::add_file)
    pub fn with_file(mut self, unit: &str, name: &str, source: &str) -> Self {
        self.add_file(unit, name, source);
        self
    }
}

impl UnitResolver for MemoryResolver {
    fn resolve(&self, unit: &str) -> Result<Vec<SourceFile>, ResolveError> {
        self.units
            .get(unit)
            .cloned()
            .ok_or_else(|| ResolveError::NotFound { unit: unit.into() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_memory_resolver() {
        let resolver = MemoryResolver::new()
            .with_file("lib", "lib/a.ag", "package lib\n")
            .with_file("lib", "lib/b.ag", "package lib\n");

        let files = resolver.resolve("lib").unwrap();
        let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["lib/a.ag", "lib/b.ag"]);
        assert!(matches!(
            resolver.resolve("missing"),
            Err(ResolveError::NotFound { .. })
        ));
    }

    #[test]
    fn test_error_conversion() {
        let error: FrontendError = ResolveError::NotFound { unit: "x".into() }.into();
        assert_eq!(error, FrontendError::UnitNotFound { unit: "x".into() });
    }

    #[test]
    fn test_empty_search_paths() {
        let resolver = FileSystemResolver::new();
        assert!(resolver.search_paths().is_empty());
        assert!(matches!(
            resolver.resolve("p"),
            Err(ResolveError::NotFound { .. })
        ));
    }
}
