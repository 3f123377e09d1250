//! arguard Contracts
//!
//! Infers preconditions from guard statements and reports call sites whose
//! constant arguments are known to violate them.
//!
//! # Pipeline
//!
//! | Stage | Module | Input | Output |
//! |-------|--------|-------|--------|
//! | Extraction | `extract` | function body | [`FunctionContract`] |
//! | Registry | [`registry`] | unit name | shared [`PackageFacts`] |
//! | Binding | `bind` | call arguments | [`BoundArguments`] |
//! | Evaluation | [`eval`] | condition + binding | `bool` |
//! | Validation | `validate` | contracts + binding | [`Verdict`] |
//!
//! The [`Analyzer`] drives the stages for one unit and writes
//! [`Diagnostic`](arguard_diagnostics::Diagnostic)s into a sink.
//!
//! # Guard Shapes
//!
//! A contract is the condition of a leading `if` without `else` whose body
//! is a single `panic(msg)` or a `return` of an error value:
//!
//! ```text
//! func Div(a, b int) (int, error) {
//!     if b == 0 {
//!         return 0, errors.New("division by zero")
//!     }
//!     ...
//! }
//! ```
//!
//! A call `Div(1, 0)` binds `b` to `0`, the condition holds, and the call is
//! reported. A call `Div(1, n)` binds nothing for `b` and is inconclusive.

pub mod analyzer;
pub mod bind;
pub mod config;
pub mod contract;
pub mod error;
pub mod eval;
pub mod expr;
pub mod extract;
pub mod registry;
pub mod source;
pub mod validate;

pub use analyzer::{AnalysisStats, Analyzer};
pub use bind::{bind, BoundArguments};
pub use config::AnalyzerConfig;
pub use contract::{Contract, FunctionContract, PackageFacts};
pub use error::DependencyLoadError;
pub use eval::{evaluate, EvaluationError, Value};
pub use expr::{BinaryOp, Expression};
pub use extract::{extract, extract_function, extract_unit, render_expression};
pub use registry::FactRegistry;
pub use source::{
    CallSite, Frontend, FrontendError, FunctionDecl, FunctionId, Import, LiteralKind, ResultType,
    SourceExpr, Statement, UnitSyntax,
};
pub use validate::{validate, EvaluationFailure, Verdict};
