//! ARL Core - Access Rule Language compiler for AAS registries.
//!
//! This crate compiles declarative, JSON/YAML-encoded access rules over
//! Asset Administration Shell entities into PostgreSQL boolean expressions
//! evaluated against a normalized relational schema.
//!
//! # Architecture
//!
//! The compilation pipeline:
//!
//! 1. **Rule Model** (`model`) - Decode and validate the rule document
//! 2. **Path Resolution** (`path`) - Tokenize field patterns and resolve
//!    them to columns and array bindings
//! 3. **Planning** (`plan`) - Join graphs, EXISTS embedding, CTE collector
//! 4. **SQL Lowering** (`query`) - Operation builder and the top-level
//!    evaluator
//! 5. **In-memory Evaluation** (`eval`) - The same semantics without a
//!    database, for tests and DB-free policy decisions
//!
//! # Example
//!
//! ```
//! use arl_core::model::LogicalExpression;
//! use arl_core::path::Root;
//! use arl_core::query::Compiler;
//!
//! let expr = LogicalExpression::from_json(
//!     r#"{"$eq":[{"$field":"$sm#idShort"},{"$strVal":"MySubmodel"}]}"#,
//! ).unwrap();
//!
//! let compiled = Compiler::new(Root::Submodel).compile(&expr).unwrap();
//! assert_eq!(
//!     compiled.expression.to_inline_sql(),
//!     "submodel.id_short = 'MySubmodel'",
//! );
//! ```

pub mod config;
pub mod error;
pub mod eval;
pub mod model;
pub mod path;
pub mod plan;
pub mod query;

pub use config::CompilerOptions;
pub use error::{DecodeError, Error, LoweringError, PlanningError, ResolveError, Result};
pub use model::{AccessRuleModel, LogicalExpression, Value};
pub use path::{resolve_fragment, resolve_scalar, ResolvedFieldPath, Root};
pub use query::{CompiledExpression, Compiler};

/// Prelude for common imports.
pub mod prelude {
    pub use super::config::CompilerOptions;
    pub use super::error::{Error, Result};
    pub use super::eval::{evaluate, EvalContext, EvalTarget};
    pub use super::model::{AccessRuleModel, LogicalExpression};
    pub use super::path::Root;
    pub use super::query::{CompiledExpression, Compiler};
}
