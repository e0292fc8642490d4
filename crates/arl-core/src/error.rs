//! Error types for the ARL compiler.
//!
//! Each compilation phase has its own error enum; the crate-level
//! [`Error`] wraps them for callers that only care about success. The
//! compiler never retries and never returns partial results: any error
//! rejects the whole rule.

use thiserror::Error;

/// Result type for ARL operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the ARL compiler.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Lowering(#[from] LoweringError),

    #[error(transparent)]
    Planning(#[from] PlanningError),

    /// Signature marshaling or dataset materialization failures.
    /// Non-recoverable; indicates a bug rather than bad input.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Errors produced while decoding a rule document.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("field {field} in {container}: required")]
    MissingField {
        field: &'static str,
        container: &'static str,
    },

    #[error("fields {first} and {second} in {container} are mutually exclusive")]
    MutuallyExclusive {
        first: &'static str,
        second: &'static str,
        container: &'static str,
    },

    #[error("{op} expects {expected} operands, found {found}")]
    InvalidArity {
        op: &'static str,
        expected: &'static str,
        found: usize,
    },

    #[error("value `{value}` does not match pattern `{pattern}`")]
    PatternMismatch { value: String, pattern: &'static str },

    #[error("invalid {kind} literal `{value}`")]
    InvalidLiteral { kind: &'static str, value: String },

    #[error("duplicate definition `{name}` in {section}")]
    DuplicateDefinition { section: &'static str, name: String },

    #[error("unknown definition `{name}` in {section}")]
    UnknownDefinition { section: &'static str, name: String },
}

/// Errors produced by the field-identifier resolver.
#[derive(Error, Debug, PartialEq)]
pub enum ResolveError {
    #[error("field pattern `{0}` has no `#` separator")]
    MissingSeparator(String),

    #[error("field pattern `{0}` has an empty path")]
    EmptyPath(String),

    #[error("unsupported root `{0}`")]
    UnsupportedRoot(String),

    #[error("unsupported segment `{0}`")]
    UnsupportedSegment(String),

    #[error("segment `{segment}` is not valid for {context}")]
    SegmentInvalidInContext {
        segment: String,
        context: &'static str,
    },

    #[error("segment `{0}` requires a parent segment")]
    MissingParentForSegment(String),

    #[error("scalar field pattern `{0}` must not end in an array segment")]
    TrailingArrayInScalar(String),

    #[error("fragment pattern `{0}` must end in an array segment")]
    MissingArrayInFragment(String),

    #[error("malformed path in `{0}`")]
    MalformedPath(String),
}

/// Errors produced while lowering a comparison or string operation.
#[derive(Error, Debug, PartialEq)]
pub enum LoweringError {
    #[error("comparing two field identifiers is not supported")]
    FieldToFieldForbidden,

    #[error("unsupported operation `{0}`")]
    UnsupportedOperation(String),

    #[error("attribute `{0}` cannot be lowered to SQL")]
    UnsupportedAttribute(String),

    #[error("incompatible literal types: {left} vs {right}")]
    IncompatibleLiteralTypes {
        left: &'static str,
        right: &'static str,
    },
}

/// Errors produced by the join-graph planner.
#[derive(Error, Debug, PartialEq)]
pub enum PlanningError {
    #[error("no correlatable base alias for root `{0}`")]
    NoCorrelatableBase(&'static str),

    #[error("unknown join alias `{0}`")]
    UnknownAlias(String),

    #[error("cyclic join dependency at alias `{0}`")]
    CyclicJoinDependency(String),
}
