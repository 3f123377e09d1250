//! Reference front-end for arguard
//!
//! Resolves `.ag` source units, parses them, and lowers them into the
//! engine's [`UnitSyntax`]. Units named `errors` and `fmt` are built in.
//!
//! ```ignore
//! let frontend = SourceFrontend::new(FileSystemResolver::with_search_paths(["src"]));
//! let registry = FactRegistry::new();
//! let analyzer = Analyzer::new(&frontend, &registry, AnalyzerConfig::default());
//! analyzer.analyze("app", &mut diagnostics)?;
//! ```

pub mod intrinsics;
pub mod lower;
pub mod resolver;
pub mod scope;

pub use resolver::{FileSystemResolver, MemoryResolver, ResolveError, SourceFile, UnitResolver};
pub use scope::{PackageScope, Signature, TypeInfo};

use arguard_ast::File;
use arguard_contracts::{Frontend, FrontendError, UnitSyntax};
use arguard_diagnostics::LineIndex;
use arguard_parser::ParseError;
use lower::Dependencies;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use std::sync::Arc;
use tracing::{debug, trace};

/// A parsed source file
#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub name: SmolStr,
    pub source: String,
    pub ast: File,
    pub lines: LineIndex,
}

/// Every file of a unit plus its package-level declarations
#[derive(Debug)]
pub struct ParsedUnit {
    pub name: SmolStr,
    pub files: Vec<ParsedFile>,
    pub scope: Arc<PackageScope>,
}

/// A syntax error together with the file it occurred in
#[derive(Debug)]
pub struct SyntaxError {
    pub file: SmolStr,
    pub source: String,
    pub error: ParseError,
}

impl SyntaxError {
    /// `file:line:col: message`
    pub fn describe(&self) -> String {
        match self.error.span() {
            Some(span) => {
                let (line, column) = LineIndex::new(&self.source).line_col(span.start);
                format!("{}:{}:{}: {}", self.file, line, column, self.error)
            }
            None => format!("{}: {}", self.file, self.error),
        }
    }
}

/// Front-end over a [`UnitResolver`]
///
/// Parsed units are cached, so a unit imported by many others is read and
/// parsed once.
pub struct SourceFrontend<R> {
    resolver: R,
    units: Mutex<FxHashMap<SmolStr, Arc<ParsedUnit>>>,
}

impl<R: UnitResolver> SourceFrontend<R> {
    pub fn new(resolver: R) -> Self {
        Self {
            resolver,
            units: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Resolve and parse `name`, or return the cached parse.
    pub fn parse_unit(&self, name: &str) -> Result<Arc<ParsedUnit>, FrontendError> {
        if let Some(unit) = self.units.lock().get(name) {
            return Ok(Arc::clone(unit));
        }

        let mut files = Vec::new();
        for source in self.resolver.resolve(name)? {
            let (ast, errors) = arguard_parser::parse(&source.source);
            if let Some(error) = errors.into_iter().next() {
                let error = SyntaxError {
                    file: source.name,
                    source: source.source,
                    error,
                };
                return Err(FrontendError::Syntax {
                    unit: name.into(),
                    message: error.describe(),
                });
            }
            files.push(ParsedFile {
                lines: LineIndex::new(&source.source),
                name: source.name,
                source: source.source,
                ast,
            });
        }
        check_package_names(name, &files)?;

        let scope = Arc::new(PackageScope::from_files(name, files.iter().map(|f| &f.ast)));
        debug!(unit = name, files = files.len(), "parsed unit");

        let unit = Arc::new(ParsedUnit {
            name: name.into(),
            files,
            scope,
        });
        Ok(Arc::clone(
            self.units.lock().entry(SmolStr::new(name)).or_insert(unit),
        ))
    }

    /// Every syntax error in `name`, for detailed reporting.
    pub fn syntax_errors(&self, name: &str) -> Result<Vec<SyntaxError>, FrontendError> {
        let mut found = Vec::new();
        for source in self.resolver.resolve(name)? {
            let (_, errors) = arguard_parser::parse(&source.source);
            found.extend(errors.into_iter().map(|error| SyntaxError {
                file: source.name.clone(),
                source: source.source.clone(),
                error,
            }));
        }
        Ok(found)
    }

    /// Scopes of the direct imports of `unit`. Imports that fail to load
    /// are left out; calls into them stay unresolved.
    fn dependencies(&self, unit: &ParsedUnit) -> Dependencies {
        let mut deps = Dependencies::default();
        let paths = unit
            .files
            .iter()
            .flat_map(|file| &file.ast.imports)
            .map(|import| &import.path.node);

        for path in paths {
            if deps.contains_key(path) {
                continue;
            }
            let scope = match intrinsics::scope(path) {
                Some(scope) => Arc::new(scope),
                None => match self.parse_unit(path) {
                    Ok(parsed) => Arc::clone(&parsed.scope),
                    Err(error) => {
                        trace!(unit = %unit.name, import = %path, %error, "import scope unavailable");
                        continue;
                    }
                },
            };
            deps.insert(path.clone(), scope);
        }
        deps
    }
}

impl<R: UnitResolver> Frontend for SourceFrontend<R> {
    fn load_unit(&self, name: &str) -> Result<UnitSyntax, FrontendError> {
        if let Some(unit) = intrinsics::unit(name) {
            return Ok(unit);
        }

        let parsed = self.parse_unit(name)?;
        let deps = self.dependencies(&parsed);
        let syntax = lower::lower_unit(name, &parsed.files, &parsed.scope, &deps);
        debug!(
            unit = name,
            functions = syntax.functions.len(),
            calls = syntax.calls.len(),
            "lowered unit"
        );
        Ok(syntax)
    }
}

fn check_package_names(unit: &str, files: &[ParsedFile]) -> Result<(), FrontendError> {
    let Some((first, rest)) = files.split_first() else {
        return Ok(());
    };
    for file in rest {
        if file.ast.package.node != first.ast.package.node {
            return Err(FrontendError::Syntax {
                unit: unit.into(),
                message: format!(
                    "found packages {} ({}) and {} ({})",
                    first.ast.package.node, first.name, file.ast.package.node, file.name
                ),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_is_cached() {
        let frontend = SourceFrontend::new(MemoryResolver::new().with_file("p", "p.ag", "package p\n"));
        let first = frontend.parse_unit("p").unwrap();
        let second = frontend.parse_unit("p").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_syntax_error_is_positioned() {
        let frontend = SourceFrontend::new(
            MemoryResolver::new().with_file("p", "p.ag", "package p\nfunc F( {\n}\n"),
        );
        let Err(FrontendError::Syntax { unit, message }) = frontend.load_unit("p") else {
            panic!("expected a syntax error");
        };
        assert_eq!(unit, "p");
        assert!(message.starts_with("p.ag:2:"), "{}", message);
        assert!(!frontend.syntax_errors("p").unwrap().is_empty());
    }

    #[test]
    fn test_mixed_package_names() {
        let frontend = SourceFrontend::new(
            MemoryResolver::new()
                .with_file("p", "a.ag", "package p\n")
                .with_file("p", "b.ag", "package q\n"),
        );
        assert_eq!(
            frontend.load_unit("p"),
            Err(FrontendError::Syntax {
                unit: "p".into(),
                message: "found packages p (a.ag) and q (b.ag)".to_string(),
            })
        );
    }

    #[test]
    fn test_intrinsic_units_load_without_files() {
        let frontend = SourceFrontend::new(MemoryResolver::new());
        let unit = frontend.load_unit("errors").unwrap();
        assert_eq!(unit.name, "errors");
        assert_eq!(
            frontend.load_unit("missing"),
            Err(FrontendError::UnitNotFound {
                unit: "missing".into()
            })
        );
    }
}
