//! Field-identifier resolver.
//!
//! Resolves a path DSL string to a table-qualified column plus the ordered
//! array-position bindings the walk produced. Pure: both lookups go
//! against the static tables in [`crate::path::mappings`].

use serde::{Deserialize, Serialize};

use crate::error::ResolveError;
use crate::model::patterns::{FragmentStringPattern, ModelStringPattern};
use crate::path::mappings::{field_column, segment_mapping, Root};
use crate::path::tokenizer::{split_pattern, tokenize, ArrayIndexToken, PathToken};

/// A concrete array position or an idShort-path label.
///
/// Positions serialize as JSON numbers, labels as JSON strings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArrayIndex {
    Position(i64),
    Label(String),
}

/// A required equality between a position (or label) column and a
/// constant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArrayIndexBinding {
    /// Table-qualified column, e.g. `specific_asset_id.position`.
    pub alias: String,
    pub index: ArrayIndex,
}

/// The output of scalar resolution: terminal column plus the bindings in
/// outermost→innermost order. Fragment resolutions carry an empty column.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedFieldPath {
    pub column: String,
    pub array_bindings: Vec<ArrayIndexBinding>,
}

impl ResolvedFieldPath {
    /// The alias qualifying a plain `alias.column` reference. Expression
    /// columns (e.g. the COALESCE projection for `$sme#value`) yield None.
    pub fn column_alias(&self) -> Option<&str> {
        let (alias, rest) = self.column.split_once('.')?;
        if rest.contains('.') || rest.contains('(') || alias.contains('(') {
            return None;
        }
        Some(alias)
    }
}

/// The root a pattern resolves under.
pub fn pattern_root(pattern: &str) -> Result<Root, ResolveError> {
    let split = split_pattern(pattern)?;
    Root::from_tag(split.root)
        .ok_or_else(|| ResolveError::UnsupportedRoot(split.root.to_string()))
}

#[derive(Clone, Copy, PartialEq)]
enum Shape {
    Scalar,
    Fragment,
}

/// Resolve a scalar field identifier to its column and bindings.
pub fn resolve_scalar(
    pattern: &ModelStringPattern,
) -> Result<(Root, ResolvedFieldPath), ResolveError> {
    resolve(pattern.as_str(), Shape::Scalar)
}

/// Resolve a fragment identifier to its bindings alone.
pub fn resolve_fragment(
    pattern: &FragmentStringPattern,
) -> Result<(Root, Vec<ArrayIndexBinding>), ResolveError> {
    let (root, resolved) = resolve(pattern.as_str(), Shape::Fragment)?;
    Ok((root, resolved.array_bindings))
}

fn resolve(pattern: &str, shape: Shape) -> Result<(Root, ResolvedFieldPath), ResolveError> {
    let split = split_pattern(pattern)?;
    let root = Root::from_tag(split.root)
        .ok_or_else(|| ResolveError::UnsupportedRoot(split.root.to_string()))?;

    let mut bindings = Vec::new();

    if let Some(id_short_path) = split.id_short_path {
        // Only submodel elements are addressed by idShort path; the path is
        // a value of the idshort_path column, not a segment walk.
        if root != Root::SubmodelElement {
            return Err(ResolveError::MalformedPath(pattern.to_string()));
        }
        bindings.push(ArrayIndexBinding {
            alias: "submodel_element.idshort_path".to_string(),
            index: ArrayIndex::Label(id_short_path.to_string()),
        });
    }

    let tokens = tokenize(split.path, pattern)?;

    let mut context = root.context();
    let mut trailing: Vec<&str> = Vec::new();
    let mut ended_in_array = false;

    for token in &tokens {
        match token {
            PathToken::Simple(name) => {
                trailing.push(name);
                ended_in_array = false;
            }
            PathToken::Array { name, index } => {
                let parent = trailing.last().copied();
                let mapping = segment_mapping(name, context, parent)?;

                // The walk consumes at most the parent segment; any other
                // simple segment left before the array is unsupported.
                let consumed = usize::from(mapping.parent.is_some());
                if trailing.len() > consumed {
                    return Err(ResolveError::UnsupportedSegment(
                        trailing[trailing.len() - consumed - 1].to_string(),
                    ));
                }

                if let ArrayIndexToken::Concrete(position) = index {
                    bindings.push(ArrayIndexBinding {
                        alias: mapping.position_alias.to_string(),
                        index: ArrayIndex::Position(*position),
                    });
                }

                context = mapping.next;
                trailing.clear();
                ended_in_array = true;
            }
        }
    }

    let column = match shape {
        Shape::Scalar => {
            if ended_in_array {
                return Err(ResolveError::TrailingArrayInScalar(pattern.to_string()));
            }
            field_column(context, &trailing.join("."))?.to_string()
        }
        Shape::Fragment => {
            if !ended_in_array {
                return Err(ResolveError::MissingArrayInFragment(pattern.to_string()));
            }
            String::new()
        }
    };

    Ok((
        root,
        ResolvedFieldPath {
            column,
            array_bindings: bindings,
        },
    ))
}
