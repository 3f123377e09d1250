//! Per-unit analysis driver.

use crate::bind::bind;
use crate::config::AnalyzerConfig;
use crate::contract::PackageFacts;
use crate::registry::FactRegistry;
use crate::source::{Frontend, FrontendError, FunctionId, UnitSyntax};
use crate::validate::{validate, Verdict};
use arguard_diagnostics::{Diagnostic, DiagnosticSink, Position};
use indexmap::IndexMap;
use smol_str::SmolStr;
use std::sync::Arc;

/// Counters for one analyzed unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalysisStats {
    /// Calls whose callee has contracts
    pub calls_checked: usize,
    pub violations: usize,
    pub evaluation_failures: usize,
    pub dependency_failures: usize,
    pub contracts_reported: usize,
}

/// Analyzes units against the facts collected in a shared registry.
pub struct Analyzer<'a, F: Frontend + ?Sized> {
    frontend: &'a F,
    registry: &'a FactRegistry,
    config: AnalyzerConfig,
}

impl<'a, F: Frontend + ?Sized> Analyzer<'a, F> {
    pub fn new(frontend: &'a F, registry: &'a FactRegistry, config: AnalyzerConfig) -> Self {
        Self {
            frontend,
            registry,
            config,
        }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn registry(&self) -> &FactRegistry {
        self.registry
    }

    /// Analyze one unit, reporting into `sink`.
    ///
    /// Only a failure to load the unit itself is an error; everything else
    /// becomes a diagnostic or is dropped.
    pub fn analyze(
        &self,
        unit_name: &str,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<AnalysisStats, FrontendError> {
        let unit = self.frontend.load_unit(unit_name)?;
        let facts = self.registry.get_or_extract(&unit);
        let mut stats = AnalysisStats::default();

        if self.config.follow_imports {
            self.load_dependencies(&unit, sink, &mut stats);
        }

        if self.config.report_contracts {
            for contract in facts.contracts() {
                sink.report(Diagnostic::contract(contract.position.clone(), &contract.message));
                stats.contracts_reported += 1;
            }
        }

        self.check_calls(&unit, &facts, sink, &mut stats);

        tracing::debug!(
            unit = %unit.name,
            calls = stats.calls_checked,
            violations = stats.violations,
            "analyzed unit"
        );
        Ok(stats)
    }

    fn load_dependencies(
        &self,
        unit: &UnitSyntax,
        sink: &mut dyn DiagnosticSink,
        stats: &mut AnalysisStats,
    ) {
        let mut imports: IndexMap<&SmolStr, &Position> = IndexMap::new();
        for import in &unit.imports {
            imports.entry(&import.name).or_insert(&import.position);
        }

        for (name, position) in imports {
            if name == &unit.name {
                continue;
            }
            let result = self
                .registry
                .get_or_load(name, || self.frontend.load_unit(name));
            if let Err(error) = result {
                tracing::warn!(unit = %unit.name, import = %name, %error, "dependency failed to load");
                sink.report(Diagnostic::dependency_load(position.clone(), &error));
                stats.dependency_failures += 1;
            }
        }
    }

    fn facts_for(&self, callee: &FunctionId, own: &Arc<PackageFacts>) -> Option<Arc<PackageFacts>> {
        if callee.unit() == own.unit_name.as_str() {
            Some(Arc::clone(own))
        } else if self.config.follow_imports {
            self.registry.get(callee.unit())
        } else {
            None
        }
    }

    fn check_calls(
        &self,
        unit: &UnitSyntax,
        own: &Arc<PackageFacts>,
        sink: &mut dyn DiagnosticSink,
        stats: &mut AnalysisStats,
    ) {
        for call in &unit.calls {
            let Some(callee) = call.callee else {
                continue;
            };
            let Some(facts) = self.facts_for(&callee, own) else {
                continue;
            };
            let Some(function) = facts.get(&callee) else {
                continue;
            };

            stats.calls_checked += 1;
            let binding = bind(&call.arguments, function);
            tracing::trace!(%callee, bound = binding.len(), "validating call");

            match validate(function, &binding) {
                Verdict::Violated(contract) => {
                    sink.report(Diagnostic::violation(
                        call.position.clone(),
                        &contract.condition,
                        &contract.message,
                    ));
                    stats.violations += 1;
                }
                Verdict::Failed(failure) => {
                    stats.evaluation_failures += 1;
                    if self.config.report_errors {
                        sink.report(Diagnostic::internal_error(call.position.clone(), &failure));
                    }
                }
                Verdict::NoViolation => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::BinaryOp;
    use crate::source::{CallSite, FunctionDecl, Import, SourceExpr, Statement};
    use pretty_assertions::assert_eq;
    use rustc_hash::FxHashMap;

    #[derive(Default)]
    struct Units(FxHashMap<&'static str, UnitSyntax>);

    impl Frontend for Units {
        fn load_unit(&self, name: &str) -> Result<UnitSyntax, FrontendError> {
            self.0
                .get(name)
                .cloned()
                .ok_or_else(|| FrontendError::UnitNotFound { unit: name.into() })
        }
    }

    fn pos(line: u32) -> Position {
        Position::new("p.ag", line, 1)
    }

    fn guarded(unit: &str, name: &str) -> FunctionDecl {
        FunctionDecl {
            id: FunctionId::function(unit, name),
            name: name.into(),
            position: pos(1),
            parameter_names: vec!["in".into()],
            body: Some(vec![Statement::If {
                position: pos(2),
                condition: SourceExpr::binary(
                    BinaryOp::Eq,
                    SourceExpr::variable("in"),
                    SourceExpr::int("0"),
                ),
                body: vec![Statement::Abort {
                    position: pos(3),
                    arguments: vec![SourceExpr::string(r#""must not be zero""#)],
                }],
                has_else: false,
            }]),
        }
    }

    fn call(line: u32, unit: &str, name: &str, argument: SourceExpr) -> CallSite {
        CallSite {
            position: pos(line),
            callee: Some(FunctionId::function(unit, name)),
            arguments: vec![argument],
        }
    }

    #[test]
    fn test_violation_in_own_unit() {
        let mut units = Units::default();
        units.0.insert(
            "p",
            UnitSyntax {
                name: "p".into(),
                functions: vec![guarded("p", "F")],
                imports: vec![],
                calls: vec![
                    call(10, "p", "F", SourceExpr::int("0")),
                    call(11, "p", "F", SourceExpr::int("1")),
                    call(12, "p", "F", SourceExpr::variable("x")),
                ],
            },
        );

        let registry = FactRegistry::new();
        let analyzer = Analyzer::new(&units, &registry, AnalyzerConfig::default());
        let mut diagnostics: Vec<Diagnostic> = Vec::new();
        let stats = analyzer.analyze("p", &mut diagnostics).unwrap();

        assert_eq!(stats.calls_checked, 3);
        assert_eq!(stats.violations, 1);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].to_string(),
            "p.ag:10:1: contract violated (in == 0): must not be zero"
        );
    }

    #[test]
    fn test_missing_unit_is_fatal() {
        let units = Units::default();
        let registry = FactRegistry::new();
        let analyzer = Analyzer::new(&units, &registry, AnalyzerConfig::default());
        let mut diagnostics: Vec<Diagnostic> = Vec::new();
        assert_eq!(
            analyzer.analyze("nowhere", &mut diagnostics),
            Err(FrontendError::UnitNotFound { unit: "nowhere".into() })
        );
    }

    #[test]
    fn test_imports_are_ignored_without_follow_imports() {
        let mut units = Units::default();
        units.0.insert(
            "lib",
            UnitSyntax {
                name: "lib".into(),
                functions: vec![guarded("lib", "F")],
                ..UnitSyntax::default()
            },
        );
        units.0.insert(
            "main",
            UnitSyntax {
                name: "main".into(),
                imports: vec![Import {
                    name: "lib".into(),
                    position: pos(3),
                }],
                calls: vec![call(10, "lib", "F", SourceExpr::int("0"))],
                ..UnitSyntax::default()
            },
        );

        let registry = FactRegistry::new();
        let config = AnalyzerConfig {
            follow_imports: false,
            ..AnalyzerConfig::default()
        };
        let mut diagnostics: Vec<Diagnostic> = Vec::new();
        let stats = Analyzer::new(&units, &registry, config)
            .analyze("main", &mut diagnostics)
            .unwrap();
        assert!(diagnostics.is_empty());
        assert_eq!(stats.calls_checked, 0);
        assert!(!registry.contains("lib"));
    }
}
