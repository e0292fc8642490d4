//! Parameterized SQL builder for the ARL compiler.
//!
//! Provides a safe way to construct PostgreSQL predicates and CTE datasets
//! without string concatenation, using parameterized fragments to prevent
//! SQL injection. The `(sql, params)` pair of a fragment is also the
//! prepared form the compiler serializes for CTE deduplication.

mod builder;
mod cast;
mod expr;
pub mod identifier;
mod param;
mod select;

pub use builder::SqlFragment;
pub use cast::{safe_cast, SqlCastType};
pub use expr::Expr;
pub use identifier::{escape_ident, qualify, quote_literal};
pub use param::SqlParam;
pub use select::SelectBuilder;

/// Prelude for common imports.
pub mod prelude {
    pub use super::{
        escape_ident, qualify, quote_literal, safe_cast, Expr, SelectBuilder, SqlCastType,
        SqlFragment, SqlParam,
    };
}
