//! Lowering of comparison and string operations to SQL.
//!
//! One operand may be a field identifier (direct or cast-wrapped); the
//! other is a literal. Field-to-field comparisons are rejected, literal
//! pairs are checked for category compatibility, and every runtime cast is
//! guarded so an uncastable row yields NULL instead of an error.

use arl_sql::{safe_cast, SqlCastType, SqlFragment, SqlParam};

use crate::config::CompilerOptions;
use crate::error::{DecodeError, Error, LoweringError, Result};
use crate::model::expression::{BinaryOperation, CastKind, Value, ValueCategory};
use crate::model::patterns::ModelStringPattern;
use crate::path::mappings::Root;
use crate::path::resolver::{resolve_scalar, ResolvedFieldPath};

/// A lowered comparison: the predicate (bindings not included) plus the
/// resolved paths it referenced.
#[derive(Debug)]
pub struct LoweredLeaf {
    pub expression: SqlFragment,
    pub resolved: Vec<ResolvedFieldPath>,
    pub root: Option<Root>,
}

impl CastKind {
    fn sql_cast(&self) -> SqlCastType {
        match self {
            Self::Str => SqlCastType::Text,
            Self::Hex => SqlCastType::Hex,
            Self::Num => SqlCastType::Numeric,
            Self::Bool => SqlCastType::Boolean,
            Self::Time => SqlCastType::Time,
            Self::DateTime => SqlCastType::Timestamp,
        }
    }
}

impl ValueCategory {
    fn sql_cast(&self) -> Option<SqlCastType> {
        match self {
            Self::String => None,
            Self::Number => Some(SqlCastType::Numeric),
            Self::Boolean => Some(SqlCastType::Boolean),
            Self::Time => Some(SqlCastType::Time),
            Self::DateTime => Some(SqlCastType::Timestamp),
        }
    }
}

/// Rewrite a trailing `.semanticId` / `.externalSubjectId` reference
/// shorthand to its first key's value. Must run before resolution; the
/// rewrite is idempotent because the expanded path ends in `value`.
pub fn expand_shorthand(value: &Value, options: &CompilerOptions) -> Result<Value> {
    let Some(pattern) = value.as_field() else {
        return Ok(value.clone());
    };

    let text = pattern.as_str();
    let Some((prefix, path)) = text.split_once('#') else {
        return Ok(value.clone());
    };

    let last_segment = path.rsplit('.').next().unwrap_or(path);
    let rewrite = if options.general_suffix_rewrite {
        matches!(last_segment, "semanticId" | "externalSubjectId")
    } else {
        path == "semanticId"
    };
    if !rewrite {
        return Ok(value.clone());
    }

    let expanded = format!("{prefix}#{path}.keys[0].value");
    let expanded = ModelStringPattern::new(expanded).map_err(Error::Decode)?;
    Ok(value.with_rewritten_field(expanded))
}

enum Operand<'a> {
    Field {
        pattern: &'a ModelStringPattern,
        cast: Option<CastKind>,
    },
    Literal {
        value: &'a Value,
        cast: Option<CastKind>,
        category: ValueCategory,
    },
}

fn classify(value: &Value) -> Result<Operand<'_>> {
    let (inner, cast) = value.extract_field_and_outer_cast();
    match inner {
        Value::Field(pattern) => Ok(Operand::Field { pattern, cast }),
        Value::Attribute(attr) => Err(LoweringError::UnsupportedAttribute(format!(
            "{}:{}",
            attr.kind(),
            attr.name()
        ))
        .into()),
        literal => {
            // The outermost cast decides the category when present.
            let category = value.category().ok_or_else(|| {
                Error::Internal(format!("literal operand without category: {literal:?}"))
            })?;
            Ok(Operand::Literal {
                value: literal,
                cast,
                category,
            })
        }
    }
}

/// Lower a literal to its parameter fragment. Temporal literals carry a
/// direct type suffix; their format was validated at decode.
fn literal_fragment(value: &Value) -> SqlFragment {
    let mut fragment = SqlFragment::new();
    match value {
        Value::Str(s) => {
            fragment.push_param(SqlParam::text(s.as_str()));
        }
        Value::Hex(h) => {
            fragment.push_param(SqlParam::text(h.as_str()));
        }
        Value::Num(n) => {
            if let Some(i) = n.as_i64() {
                fragment.push_param(i);
            } else {
                fragment.push_param(n.as_f64().unwrap_or(f64::NAN));
            }
        }
        Value::Bool(b) => {
            fragment.push_param(*b);
        }
        Value::Time(t) => {
            fragment.push_param(SqlParam::Time(t.value()));
            fragment.push("::time");
        }
        Value::DateTime(ts) => {
            fragment.push_param(SqlParam::Timestamp(ts.value()));
            fragment.push("::timestamptz");
        }
        // Fields, attributes, and casts never reach literal lowering.
        other => unreachable!("not a literal: {other:?}"),
    }
    fragment
}

fn template(op: BinaryOperation, left: SqlFragment, right: SqlFragment) -> SqlFragment {
    let mut fragment = SqlFragment::new();
    match op {
        BinaryOperation::Eq
        | BinaryOperation::Ne
        | BinaryOperation::Gt
        | BinaryOperation::Ge
        | BinaryOperation::Lt
        | BinaryOperation::Le => {
            let symbol = match op {
                BinaryOperation::Eq => " = ",
                BinaryOperation::Ne => " != ",
                BinaryOperation::Gt => " > ",
                BinaryOperation::Ge => " >= ",
                BinaryOperation::Lt => " < ",
                BinaryOperation::Le => " <= ",
                _ => unreachable!(),
            };
            fragment.append(left);
            fragment.push(symbol);
            fragment.append(right);
        }
        BinaryOperation::Contains => {
            fragment.append(left);
            fragment.push(" LIKE '%' || ");
            fragment.append(right);
            fragment.push(" || '%'");
        }
        BinaryOperation::StartsWith => {
            fragment.append(left);
            fragment.push(" LIKE ");
            fragment.append(right);
            fragment.push(" || '%'");
        }
        BinaryOperation::EndsWith => {
            fragment.append(left);
            fragment.push(" LIKE '%' || ");
            fragment.append(right);
        }
        BinaryOperation::Regex => {
            fragment.append(left);
            fragment.push(" ~ ");
            fragment.append(right);
        }
    }
    fragment
}

/// Lower a comparison or string operation over two operands.
pub fn lower_binary(
    op: BinaryOperation,
    operands: &[Value],
    options: &CompilerOptions,
) -> Result<LoweredLeaf> {
    if operands.len() != 2 {
        return Err(DecodeError::InvalidArity {
            op: op.tag(),
            expected: "exactly 2",
            found: operands.len(),
        }
        .into());
    }

    let left = expand_shorthand(&operands[0], options)?;
    let right = expand_shorthand(&operands[1], options)?;
    let left = classify(&left)?;
    let right = classify(&right)?;

    match (&left, &right) {
        (Operand::Field { .. }, Operand::Field { .. }) => {
            Err(LoweringError::FieldToFieldForbidden.into())
        }

        // Fast path: two literals fold into a constant comparison.
        (
            Operand::Literal {
                value: lv,
                cast: lc,
                category: lcat,
            },
            Operand::Literal {
                value: rv,
                cast: rc,
                category: rcat,
            },
        ) => {
            if !lcat.is_comparable_to(rcat) {
                return Err(LoweringError::IncompatibleLiteralTypes {
                    left: lcat.name(),
                    right: rcat.name(),
                }
                .into());
            }
            check_string_op(op, *lcat)?;

            let lhs = apply_cast(literal_fragment(lv), *lc);
            let rhs = apply_cast(literal_fragment(rv), *rc);
            Ok(LoweredLeaf {
                expression: template(op, lhs, rhs),
                resolved: Vec::new(),
                root: None,
            })
        }

        (Operand::Field { .. }, Operand::Literal { .. })
        | (Operand::Literal { .. }, Operand::Field { .. }) => {
            let (field, literal, field_left) = match (&left, &right) {
                (Operand::Field { pattern, cast }, Operand::Literal { value, cast: lc, category }) => {
                    ((pattern, cast), (value, lc, category), true)
                }
                (Operand::Literal { value, cast: lc, category }, Operand::Field { pattern, cast }) => {
                    ((pattern, cast), (value, lc, category), false)
                }
                _ => unreachable!(),
            };
            let ((pattern, field_cast), (lit_value, lit_cast, lit_category)) = (field, literal);

            check_string_op(op, *lit_category)?;

            let (root, resolved) = resolve_scalar(pattern)?;

            let mut column = SqlFragment::raw(resolved.column.clone());
            column = match field_cast {
                // An explicit wrapper wins; otherwise a typed literal on
                // the other side forces a guarded cast on the column.
                Some(cast) => safe_cast(column, cast.sql_cast()),
                None => match lit_category.sql_cast() {
                    Some(cast) => safe_cast(column, cast),
                    None => column,
                },
            };

            let literal_sql = apply_cast(literal_fragment(lit_value), *lit_cast);

            let (lhs, rhs) = if field_left {
                (column, literal_sql)
            } else {
                (literal_sql, column)
            };

            Ok(LoweredLeaf {
                expression: template(op, lhs, rhs),
                resolved: vec![resolved],
                root: Some(root),
            })
        }
    }
}

fn apply_cast(fragment: SqlFragment, cast: Option<CastKind>) -> SqlFragment {
    match cast {
        Some(kind) => safe_cast(fragment, kind.sql_cast()),
        None => fragment,
    }
}

fn check_string_op(op: BinaryOperation, category: ValueCategory) -> Result<()> {
    if op.is_string_op() && category != ValueCategory::String {
        return Err(
            LoweringError::UnsupportedOperation(format!("{op} on {}", category.name())).into(),
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> CompilerOptions {
        CompilerOptions::default()
    }

    fn field(pattern: &str) -> Value {
        serde_json::from_str(&format!(r#"{{"$field":"{pattern}"}}"#)).unwrap()
    }

    fn str_val(s: &str) -> Value {
        serde_json::from_str(&format!(r#"{{"$strVal":"{s}"}}"#)).unwrap()
    }

    fn num_val(n: i64) -> Value {
        serde_json::from_str(&format!(r#"{{"$numVal":{n}}}"#)).unwrap()
    }

    #[test]
    fn test_simple_field_eq() {
        let leaf = lower_binary(
            BinaryOperation::Eq,
            &[field("$sm#idShort"), str_val("MySubmodel")],
            &opts(),
        )
        .unwrap();
        assert_eq!(
            leaf.expression.to_inline_sql(),
            "submodel.id_short = 'MySubmodel'"
        );
        assert_eq!(leaf.root, Some(Root::Submodel));
        assert_eq!(leaf.resolved.len(), 1);
    }

    #[test]
    fn test_field_to_field_forbidden() {
        let err = lower_binary(
            BinaryOperation::Eq,
            &[field("$sm#idShort"), field("$sm#id")],
            &opts(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Lowering(LoweringError::FieldToFieldForbidden)
        ));
    }

    #[test]
    fn test_attribute_rejected() {
        let attr: Value = serde_json::from_str(r#"{"$attribute":{"CLAIM":"role"}}"#).unwrap();
        let err = lower_binary(BinaryOperation::Eq, &[field("$sm#idShort"), attr], &opts())
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Lowering(LoweringError::UnsupportedAttribute(_))
        ));
    }

    #[test]
    fn test_numeric_literal_guards_column() {
        let leaf = lower_binary(
            BinaryOperation::Gt,
            &[field("$sme.Motor#value"), num_val(5)],
            &opts(),
        )
        .unwrap();
        let sql = leaf.expression.to_inline_sql();
        assert!(sql.starts_with("CASE WHEN "), "{sql}");
        assert!(sql.contains("::double precision) END > 5"), "{sql}");
    }

    #[test]
    fn test_string_literal_leaves_column_bare() {
        let leaf = lower_binary(
            BinaryOperation::Eq,
            &[field("$aasdesc#idShort"), str_val("shell-short")],
            &opts(),
        )
        .unwrap();
        assert_eq!(
            leaf.expression.to_inline_sql(),
            "aas_descriptor.id_short = 'shell-short'"
        );
    }

    #[test]
    fn test_explicit_cast_wins() {
        let cast_field: Value = serde_json::from_str(
            r#"{"$numCast":{"$field":"$aasdesc#idShort"}}"#,
        )
        .unwrap();
        let leaf = lower_binary(BinaryOperation::Eq, &[cast_field, num_val(7)], &opts()).unwrap();
        let sql = leaf.expression.to_inline_sql();
        assert!(sql.contains("::double precision) END = 7"), "{sql}");
    }

    #[test]
    fn test_operand_order_preserved() {
        let leaf = lower_binary(
            BinaryOperation::Lt,
            &[num_val(5), field("$sme.Motor#value")],
            &opts(),
        )
        .unwrap();
        let sql = leaf.expression.to_inline_sql();
        assert!(sql.starts_with("5 < "), "{sql}");
    }

    #[test]
    fn test_contains_template() {
        let leaf = lower_binary(
            BinaryOperation::Contains,
            &[field("$aasdesc#assetType"), str_val("blocked")],
            &opts(),
        )
        .unwrap();
        assert_eq!(
            leaf.expression.to_inline_sql(),
            "aas_descriptor.asset_type LIKE '%' || 'blocked' || '%'"
        );
    }

    #[test]
    fn test_regex_template() {
        let leaf = lower_binary(
            BinaryOperation::Regex,
            &[field("$sm#idShort"), str_val("^ABC")],
            &opts(),
        )
        .unwrap();
        assert_eq!(leaf.expression.to_inline_sql(), "submodel.id_short ~ '^ABC'");
    }

    #[test]
    fn test_string_op_on_number_rejected() {
        let err = lower_binary(
            BinaryOperation::Contains,
            &[field("$sm#idShort"), num_val(5)],
            &opts(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Lowering(LoweringError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn test_literal_fold_category_check() {
        let err = lower_binary(
            BinaryOperation::Eq,
            &[str_val("a"), num_val(1)],
            &opts(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Lowering(LoweringError::IncompatibleLiteralTypes { .. })
        ));

        let ok = lower_binary(BinaryOperation::Eq, &[str_val("a"), str_val("b")], &opts())
            .unwrap();
        assert_eq!(ok.expression.to_inline_sql(), "'a' = 'b'");
        assert!(ok.resolved.is_empty());
    }

    #[test]
    fn test_shorthand_expansion() {
        let leaf = lower_binary(
            BinaryOperation::Eq,
            &[field("$sm#semanticId"), str_val("urn:sm")],
            &opts(),
        )
        .unwrap();
        assert_eq!(
            leaf.expression.to_inline_sql(),
            "semantic_id_reference_key.value = 'urn:sm'"
        );
        assert_eq!(leaf.resolved[0].array_bindings.len(), 1);
    }

    #[test]
    fn test_shorthand_idempotent() {
        let value = field("$sm#semanticId");
        let once = expand_shorthand(&value, &opts()).unwrap();
        let twice = expand_shorthand(&once, &opts()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_embedded_shorthand_respects_option() {
        let value = field("$aasdesc#submodelDescriptors[0].semanticId");
        let general = expand_shorthand(&value, &opts()).unwrap();
        assert_eq!(
            general.as_field().unwrap().as_str(),
            "$aasdesc#submodelDescriptors[0].semanticId.keys[0].value"
        );

        let root_only = CompilerOptions {
            general_suffix_rewrite: false,
        };
        let unchanged = expand_shorthand(&value, &root_only).unwrap();
        assert_eq!(unchanged, value);
    }

    #[test]
    fn test_time_literal_cast() {
        let time: Value = serde_json::from_str(r#"{"$timeVal":"12:30:00"}"#).unwrap();
        let leaf = lower_binary(
            BinaryOperation::Lt,
            &[field("$sme.Motor#value"), time],
            &opts(),
        )
        .unwrap();
        let sql = leaf.expression.to_inline_sql();
        assert!(sql.contains("::time) END < '12:30:00'::time"), "{sql}");
    }

    #[test]
    fn test_wrong_arity() {
        let err = lower_binary(BinaryOperation::Eq, &[str_val("a")], &opts()).unwrap_err();
        assert!(err.to_string().contains("exactly 2"));
    }
}
