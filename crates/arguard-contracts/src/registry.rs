//! Fact registry: extracted facts per unit, for the lifetime of one run.

use crate::contract::PackageFacts;
use crate::error::DependencyLoadError;
use crate::extract::extract_unit;
use crate::source::{FrontendError, UnitSyntax};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

/// Outcome of loading one unit, shared by every reader.
pub type LoadResult = Result<Arc<PackageFacts>, DependencyLoadError>;

type Slot = Arc<OnceLock<LoadResult>>;

/// Append-only map from unit name to its facts.
///
/// Each name owns a slot that is filled exactly once, successful or not.
/// Filling is serialized per name; readers of other names never wait on it.
#[derive(Debug, Default)]
pub struct FactRegistry {
    units: RwLock<FxHashMap<SmolStr, Slot>>,
    extractions: AtomicUsize,
}

impl FactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, name: &str) -> Slot {
        if let Some(slot) = self.units.read().get(name) {
            return Arc::clone(slot);
        }
        let mut units = self.units.write();
        Arc::clone(units.entry(SmolStr::new(name)).or_default())
    }

    fn extract(&self, unit: &UnitSyntax) -> PackageFacts {
        self.extractions.fetch_add(1, Ordering::Relaxed);
        extract_unit(unit)
    }

    /// Facts of `name`, loading and extracting them on first request.
    ///
    /// A failed load is remembered: `load` is never called twice for the
    /// same name.
    pub fn get_or_load<L>(&self, name: &str, load: L) -> LoadResult
    where
        L: FnOnce() -> Result<UnitSyntax, FrontendError>,
    {
        let slot = self.slot(name);
        if let Some(result) = slot.get() {
            tracing::debug!(unit = name, "package facts cached");
            return result.clone();
        }

        slot.get_or_init(|| {
            tracing::debug!(unit = name, "loading package facts");
            match load() {
                Ok(unit) => Ok(Arc::new(self.extract(&unit))),
                Err(source) => Err(DependencyLoadError::new(name, source)),
            }
        })
        .clone()
    }

    /// Facts of an already loaded unit.
    ///
    /// If an earlier load of the same name failed, the facts are extracted
    /// again and returned without being stored.
    pub fn get_or_extract(&self, unit: &UnitSyntax) -> Arc<PackageFacts> {
        let slot = self.slot(&unit.name);
        match slot.get_or_init(|| Ok(Arc::new(self.extract(unit)))) {
            Ok(facts) => Arc::clone(facts),
            Err(_) => Arc::new(self.extract(unit)),
        }
    }

    /// Facts of a successfully loaded unit.
    pub fn get(&self, name: &str) -> Option<Arc<PackageFacts>> {
        let slot = self.units.read().get(name).cloned()?;
        match slot.get()? {
            Ok(facts) => Some(Arc::clone(facts)),
            Err(_) => None,
        }
    }

    /// True once a load of `name` has completed, successful or not.
    pub fn contains(&self, name: &str) -> bool {
        self.units
            .read()
            .get(name)
            .map_or(false, |slot| slot.get().is_some())
    }

    /// Number of units with a completed load.
    pub fn len(&self) -> usize {
        self.units
            .read()
            .values()
            .filter(|slot| slot.get().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How many times a unit has been run through extraction.
    pub fn extraction_count(&self) -> usize {
        self.extractions.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn unit(name: &str) -> UnitSyntax {
        UnitSyntax {
            name: name.into(),
            ..UnitSyntax::default()
        }
    }

    #[test]
    fn test_unit_is_extracted_once() {
        let registry = FactRegistry::new();
        let loads = AtomicUsize::new(0);
        for _ in 0..3 {
            let facts = registry
                .get_or_load("lib", || {
                    loads.fetch_add(1, Ordering::Relaxed);
                    Ok(unit("lib"))
                })
                .unwrap();
            assert_eq!(facts.unit_name, "lib");
        }
        assert_eq!(loads.load(Ordering::Relaxed), 1);
        assert_eq!(registry.extraction_count(), 1);
        assert_eq!(registry.len(), 1);
        assert!(registry.contains("lib"));
        assert!(registry.get("lib").is_some());
    }

    #[test]
    fn test_failure_is_cached() {
        let registry = FactRegistry::new();
        let missing = || Err(FrontendError::UnitNotFound { unit: "gone".into() });
        let first = registry.get_or_load("gone", missing).unwrap_err();
        let second = registry
            .get_or_load("gone", || panic!("load attempted twice"))
            .unwrap_err();
        assert_eq!(first, second);
        assert!(registry.contains("gone"));
        assert!(registry.get("gone").is_none());
        assert_eq!(registry.extraction_count(), 0);
    }

    #[test]
    fn test_root_seen_as_dependency_is_not_extracted_again() {
        let registry = FactRegistry::new();
        registry.get_or_load("lib", || Ok(unit("lib"))).unwrap();
        let facts = registry.get_or_extract(&unit("lib"));
        assert_eq!(facts.unit_name, "lib");
        assert_eq!(registry.extraction_count(), 1);
    }

    #[test]
    fn test_root_extracted_after_failed_dependency_load() {
        let registry = FactRegistry::new();
        let _ = registry.get_or_load("lib", || Err(FrontendError::UnitNotFound { unit: "lib".into() }));
        let facts = registry.get_or_extract(&unit("lib"));
        assert_eq!(facts.unit_name, "lib");
        assert!(registry.get("lib").is_none());
    }

    #[test]
    fn test_concurrent_loads_extract_once() {
        let registry = FactRegistry::new();
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    registry.get_or_load("shared", || Ok(unit("shared"))).unwrap();
                });
            }
        });
        assert_eq!(registry.extraction_count(), 1);
        assert!(!registry.is_empty());
    }
}
