//! In-memory rule evaluation.
//!
//! Mirrors the SQL semantics of every logical, comparison, and string
//! operator: a missing field or failed conversion never errors, the
//! candidate simply fails to match (the NULL of the SQL side). Wildcard
//! array segments evaluate existentially, like the EXISTS embedding.

use chrono::{DateTime, FixedOffset, NaiveTime};
use regex::Regex;

use crate::config::CompilerOptions;
use crate::error::{DecodeError, LoweringError, Result};
use crate::eval::context::EvalContext;
use crate::eval::descriptors::EvalTarget;
use crate::model::expression::{
    AttributeValue, BinaryOperation, CastKind, LogicalExpression, Value,
};
use crate::path::tokenizer::{split_pattern, tokenize, ArrayIndexToken, PathToken};
use crate::query::operations::expand_shorthand;

/// A scalar produced while walking the target object.
#[derive(Clone, Debug, PartialEq)]
enum EvalValue {
    Str(String),
    Num(f64),
    Bool(bool),
    Time(NaiveTime),
    DateTime(DateTime<FixedOffset>),
}

impl EvalValue {
    fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) => Some(Self::Str(s.clone())),
            serde_json::Value::Number(n) => n.as_f64().map(Self::Num),
            serde_json::Value::Bool(b) => Some(Self::Bool(*b)),
            _ => None,
        }
    }

    /// Convert toward a cast target; None mirrors the guarded SQL cast
    /// yielding NULL.
    fn cast_to(&self, kind: CastKind) -> Option<Self> {
        match kind {
            CastKind::Str | CastKind::Hex => Some(Self::Str(match self {
                Self::Str(s) => s.clone(),
                Self::Num(n) => n.to_string(),
                Self::Bool(b) => b.to_string(),
                Self::Time(t) => t.format("%H:%M:%S").to_string(),
                Self::DateTime(ts) => ts.to_rfc3339(),
            })),
            CastKind::Num => match self {
                Self::Num(n) => Some(Self::Num(*n)),
                Self::Str(s) => s.trim().parse().ok().map(Self::Num),
                _ => None,
            },
            CastKind::Bool => match self {
                Self::Bool(b) => Some(Self::Bool(*b)),
                Self::Str(s) => match s.to_lowercase().as_str() {
                    "true" | "1" | "yes" => Some(Self::Bool(true)),
                    "false" | "0" | "no" => Some(Self::Bool(false)),
                    _ => None,
                },
                Self::Num(n) if *n == 1.0 => Some(Self::Bool(true)),
                Self::Num(n) if *n == 0.0 => Some(Self::Bool(false)),
                _ => None,
            },
            CastKind::Time => match self {
                Self::Time(t) => Some(Self::Time(*t)),
                Self::Str(s) => NaiveTime::parse_from_str(s, "%H:%M:%S")
                    .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
                    .ok()
                    .map(Self::Time),
                _ => None,
            },
            CastKind::DateTime => match self {
                Self::DateTime(ts) => Some(Self::DateTime(*ts)),
                Self::Str(s) => DateTime::parse_from_rfc3339(s).ok().map(Self::DateTime),
                _ => None,
            },
        }
    }

    fn kind(&self) -> CastKind {
        match self {
            Self::Str(_) => CastKind::Str,
            Self::Num(_) => CastKind::Num,
            Self::Bool(_) => CastKind::Bool,
            Self::Time(_) => CastKind::Time,
            Self::DateTime(_) => CastKind::DateTime,
        }
    }
}

/// Bring two candidates into one category: a string side converts toward
/// a typed side, as the SQL builder casts the column toward a typed
/// literal.
fn unify(left: &EvalValue, right: &EvalValue) -> Option<(EvalValue, EvalValue)> {
    if left.kind() == right.kind() {
        return Some((left.clone(), right.clone()));
    }
    match (left, right) {
        (EvalValue::Str(_), typed) => {
            left.cast_to(typed.kind()).map(|l| (l, typed.clone()))
        }
        (typed, EvalValue::Str(_)) => {
            right.cast_to(typed.kind()).map(|r| (typed.clone(), r))
        }
        _ => None,
    }
}

fn compare(op: BinaryOperation, left: &EvalValue, right: &EvalValue) -> Result<bool> {
    if op.is_string_op() {
        let (EvalValue::Str(l), EvalValue::Str(r)) = (left, right) else {
            return Ok(false);
        };
        return Ok(match op {
            BinaryOperation::Contains => l.contains(r.as_str()),
            BinaryOperation::StartsWith => l.starts_with(r.as_str()),
            BinaryOperation::EndsWith => l.ends_with(r.as_str()),
            BinaryOperation::Regex => Regex::new(r)
                .map_err(|_| DecodeError::InvalidLiteral {
                    kind: "regex",
                    value: r.clone(),
                })?
                .is_match(l),
            _ => unreachable!(),
        });
    }

    let Some((left, right)) = unify(left, right) else {
        return Ok(false);
    };

    let ordering = match (&left, &right) {
        (EvalValue::Str(l), EvalValue::Str(r)) => l.partial_cmp(r),
        (EvalValue::Num(l), EvalValue::Num(r)) => l.partial_cmp(r),
        (EvalValue::Bool(l), EvalValue::Bool(r)) => l.partial_cmp(r),
        (EvalValue::Time(l), EvalValue::Time(r)) => l.partial_cmp(r),
        (EvalValue::DateTime(l), EvalValue::DateTime(r)) => l.partial_cmp(r),
        _ => None,
    };
    let Some(ordering) = ordering else {
        return Ok(false);
    };

    Ok(match op {
        BinaryOperation::Eq => ordering.is_eq(),
        BinaryOperation::Ne => !ordering.is_eq(),
        BinaryOperation::Gt => ordering.is_gt(),
        BinaryOperation::Ge => ordering.is_ge(),
        BinaryOperation::Lt => ordering.is_lt(),
        BinaryOperation::Le => ordering.is_le(),
        _ => unreachable!(),
    })
}

/// All scalar candidates a field pattern addresses on the target.
fn field_candidates(ctx: &EvalContext, pattern: &str) -> Result<Vec<EvalValue>> {
    let split = split_pattern(pattern)?;

    if split.root != ctx.target.root_tag() {
        return Err(LoweringError::UnsupportedOperation(format!(
            "{} field evaluated against a {} target",
            split.root,
            ctx.target.root_tag()
        ))
        .into());
    }

    // The idShort path prefix is a binding on the element under test.
    if let Some(id_short_path) = split.id_short_path {
        match &ctx.target {
            EvalTarget::SubmodelElement(element) if element.id_short_path == id_short_path => {}
            _ => return Ok(Vec::new()),
        }
    }

    let json = match &ctx.target {
        EvalTarget::AasDescriptor(d) => serde_json::to_value(d),
        EvalTarget::SubmodelDescriptor(d) => serde_json::to_value(d),
        EvalTarget::Submodel(s) => serde_json::to_value(s),
        EvalTarget::SubmodelElement(e) => serde_json::to_value(e),
    }
    .map_err(|e| crate::error::Error::Internal(format!("target serialization failed: {e}")))?;

    let tokens = tokenize(split.path, pattern)?;

    let mut current = vec![&json];
    for token in &tokens {
        let mut next = Vec::new();
        for value in current {
            match token {
                PathToken::Simple(name) => {
                    if let Some(child) = value.get(name) {
                        next.push(child);
                    }
                }
                PathToken::Array { name, index } => {
                    let Some(serde_json::Value::Array(items)) = value.get(name) else {
                        continue;
                    };
                    match index {
                        ArrayIndexToken::Concrete(n) => {
                            if let Some(item) = usize::try_from(*n).ok().and_then(|n| items.get(n))
                            {
                                next.push(item);
                            }
                        }
                        ArrayIndexToken::Wildcard => next.extend(items.iter()),
                    }
                }
            }
        }
        current = next;
    }

    Ok(current.into_iter().filter_map(EvalValue::from_json).collect())
}

fn attribute_candidate(ctx: &EvalContext, attribute: &AttributeValue) -> Result<Vec<EvalValue>> {
    let value = match attribute {
        AttributeValue::Claim(name) => ctx.attributes.claim(name.as_str()),
        AttributeValue::Global(name) => ctx.attributes.global(name.as_str()),
        AttributeValue::Reference(name) => {
            return Err(LoweringError::UnsupportedAttribute(format!(
                "REFERENCE:{}",
                name.as_str()
            ))
            .into())
        }
    };
    Ok(value.and_then(EvalValue::from_json).into_iter().collect())
}

fn literal_candidate(value: &Value) -> Vec<EvalValue> {
    match value {
        Value::Str(s) => vec![EvalValue::Str(s.as_str().to_string())],
        Value::Hex(h) => vec![EvalValue::Str(h.as_str().to_string())],
        Value::Num(n) => n.as_f64().map(EvalValue::Num).into_iter().collect(),
        Value::Bool(b) => vec![EvalValue::Bool(*b)],
        Value::Time(t) => vec![EvalValue::Time(t.value())],
        Value::DateTime(ts) => vec![EvalValue::DateTime(ts.value())],
        _ => Vec::new(),
    }
}

/// Candidates of one operand, cast wrappers applied outermost-last.
fn operand_candidates(
    ctx: &EvalContext,
    operand: &Value,
    options: &CompilerOptions,
) -> Result<Vec<EvalValue>> {
    let operand = expand_shorthand(operand, options)?;
    let (inner, cast) = operand.extract_field_and_outer_cast();

    let candidates = match inner {
        Value::Field(pattern) => field_candidates(ctx, pattern.as_str())?,
        Value::Attribute(attribute) => attribute_candidate(ctx, attribute)?,
        literal => literal_candidate(literal),
    };

    Ok(match cast {
        Some(kind) => candidates
            .iter()
            .filter_map(|candidate| candidate.cast_to(kind))
            .collect(),
        None => candidates,
    })
}

fn evaluate_binary(
    ctx: &EvalContext,
    op: BinaryOperation,
    operands: &[Value],
    options: &CompilerOptions,
) -> Result<bool> {
    if operands.len() != 2 {
        return Err(DecodeError::InvalidArity {
            op: op.tag(),
            expected: "exactly 2",
            found: operands.len(),
        }
        .into());
    }

    if operands[0].as_field().is_some() && operands[1].as_field().is_some() {
        return Err(LoweringError::FieldToFieldForbidden.into());
    }

    let left = operand_candidates(ctx, &operands[0], options)?;
    let right = operand_candidates(ctx, &operands[1], options)?;

    for l in &left {
        for r in &right {
            if compare(op, l, r)? {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

/// Evaluate a logical expression against a context with default options.
pub fn evaluate(expr: &LogicalExpression, ctx: &EvalContext) -> Result<bool> {
    evaluate_with_options(expr, ctx, &CompilerOptions::default())
}

/// Evaluate a logical expression against a context.
pub fn evaluate_with_options(
    expr: &LogicalExpression,
    ctx: &EvalContext,
    options: &CompilerOptions,
) -> Result<bool> {
    if let Some((op, operands)) = expr.as_binary() {
        return evaluate_binary(ctx, op, operands, options);
    }

    match expr {
        LogicalExpression::And(children) => {
            for child in children {
                if !evaluate_with_options(child, ctx, options)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        LogicalExpression::Or(children) => {
            for child in children {
                if evaluate_with_options(child, ctx, options)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        LogicalExpression::Not(child) => Ok(!evaluate_with_options(child, ctx, options)?),
        LogicalExpression::Boolean(value) => Ok(*value),
        LogicalExpression::Match(members) => {
            for member in members {
                if !evaluate_with_options(&member.to_logical(), ctx, options)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        _ => unreachable!("binary nodes are handled above"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::context::AttributeSource;
    use crate::eval::descriptors::{
        AasDescriptor, Reference, SpecificAssetId, Submodel, SubmodelElement,
    };

    fn submodel_ctx() -> EvalContext {
        EvalContext::new(EvalTarget::Submodel(Submodel {
            id: "urn:submodel:1".into(),
            id_short: Some("MySubmodel".into()),
            kind: Some("Instance".into()),
            semantic_id: Some(Reference::external("urn:sm")),
            ..Default::default()
        }))
    }

    fn expr(json: &str) -> LogicalExpression {
        LogicalExpression::from_json(json).unwrap()
    }

    #[test]
    fn test_simple_eq() {
        let ctx = submodel_ctx();
        assert!(evaluate(
            &expr(r#"{"$eq":[{"$field":"$sm#idShort"},{"$strVal":"MySubmodel"}]}"#),
            &ctx
        )
        .unwrap());
        assert!(!evaluate(
            &expr(r#"{"$eq":[{"$field":"$sm#idShort"},{"$strVal":"Other"}]}"#),
            &ctx
        )
        .unwrap());
    }

    #[test]
    fn test_missing_field_never_matches() {
        let ctx = EvalContext::new(EvalTarget::Submodel(Submodel::default()));
        assert!(!evaluate(
            &expr(r#"{"$eq":[{"$field":"$sm#idShort"},{"$strVal":"x"}]}"#),
            &ctx
        )
        .unwrap());
        // The negation of a non-match holds, as for SQL NOT(NULL = x)
        // wrapped rows filtered by boolean logic.
        assert!(evaluate(
            &expr(r#"{"$not":{"$eq":[{"$field":"$sm#idShort"},{"$strVal":"x"}]}}"#),
            &ctx
        )
        .unwrap());
    }

    #[test]
    fn test_semantic_id_shorthand() {
        let ctx = submodel_ctx();
        assert!(evaluate(
            &expr(r#"{"$eq":[{"$field":"$sm#semanticId"},{"$strVal":"urn:sm"}]}"#),
            &ctx
        )
        .unwrap());
    }

    #[test]
    fn test_and_or_not() {
        let ctx = submodel_ctx();
        assert!(evaluate(
            &expr(
                r#"{"$and":[
                    {"$eq":[{"$field":"$sm#idShort"},{"$strVal":"MySubmodel"}]},
                    {"$not":{"$contains":[{"$field":"$sm#idShort"},{"$strVal":"blocked"}]}}
                ]}"#
            ),
            &ctx
        )
        .unwrap());
    }

    #[test]
    fn test_wildcard_is_existential() {
        let ctx = EvalContext::new(EvalTarget::AasDescriptor(AasDescriptor {
            specific_asset_ids: vec![
                SpecificAssetId {
                    name: "serial".into(),
                    value: "A1".into(),
                    ..Default::default()
                },
                SpecificAssetId {
                    name: "batch".into(),
                    value: "B2".into(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        }));

        assert!(evaluate(
            &expr(r#"{"$eq":[{"$field":"$aasdesc#specificAssetIds[].name"},{"$strVal":"batch"}]}"#),
            &ctx
        )
        .unwrap());
        assert!(!evaluate(
            &expr(r#"{"$eq":[{"$field":"$aasdesc#specificAssetIds[0].name"},{"$strVal":"batch"}]}"#),
            &ctx
        )
        .unwrap());
    }

    #[test]
    fn test_numeric_coercion() {
        let ctx = EvalContext::new(EvalTarget::SubmodelElement(SubmodelElement {
            id_short_path: "Motor.Rpm".into(),
            value: Some("1500".into()),
            ..Default::default()
        }));

        assert!(evaluate(
            &expr(r#"{"$gt":[{"$field":"$sme.Motor.Rpm#value"},{"$numVal":1000}]}"#),
            &ctx
        )
        .unwrap());
    }

    #[test]
    fn test_idshort_path_binding() {
        let ctx = EvalContext::new(EvalTarget::SubmodelElement(SubmodelElement {
            id_short_path: "Motor.Rpm".into(),
            value: Some("1500".into()),
            ..Default::default()
        }));

        // Different path prefix: the binding fails, so nothing matches.
        assert!(!evaluate(
            &expr(r#"{"$gt":[{"$field":"$sme.Other.Path#value"},{"$numVal":1000}]}"#),
            &ctx
        )
        .unwrap());
    }

    #[test]
    fn test_claim_attribute() {
        let mut attributes = AttributeSource::new();
        attributes.set_claim("role", serde_json::json!("admin"));
        let ctx = EvalContext::with_attributes(
            EvalTarget::Submodel(Submodel::default()),
            attributes,
        );

        assert!(evaluate(
            &expr(r#"{"$eq":[{"$attribute":{"CLAIM":"role"}},{"$strVal":"admin"}]}"#),
            &ctx
        )
        .unwrap());
    }

    #[test]
    fn test_reference_attribute_rejected() {
        let ctx = submodel_ctx();
        let err = evaluate(
            &expr(r#"{"$eq":[{"$attribute":{"REFERENCE":"x"}},{"$strVal":"y"}]}"#),
            &ctx,
        )
        .unwrap_err();
        assert!(err.to_string().contains("REFERENCE"), "{err}");
    }

    #[test]
    fn test_field_to_field_rejected() {
        let ctx = submodel_ctx();
        assert!(evaluate(
            &expr(r#"{"$eq":[{"$field":"$sm#idShort"},{"$field":"$sm#id"}]}"#),
            &ctx
        )
        .is_err());
    }

    #[test]
    fn test_regex_and_string_ops() {
        let ctx = submodel_ctx();
        assert!(evaluate(
            &expr(r#"{"$regex":[{"$field":"$sm#idShort"},{"$strVal":"^My"}]}"#),
            &ctx
        )
        .unwrap());
        assert!(evaluate(
            &expr(r#"{"$starts-with":[{"$field":"$sm#idShort"},{"$strVal":"My"}]}"#),
            &ctx
        )
        .unwrap());
        assert!(evaluate(
            &expr(r#"{"$ends-with":[{"$field":"$sm#idShort"},{"$strVal":"Submodel"}]}"#),
            &ctx
        )
        .unwrap());
    }

    #[test]
    fn test_cast_failure_is_non_match() {
        let ctx = submodel_ctx();
        // idShort is not numeric: the cast drops the candidate.
        assert!(!evaluate(
            &expr(r#"{"$eq":[{"$numCast":{"$field":"$sm#idShort"}},{"$numVal":1}]}"#),
            &ctx
        )
        .unwrap());
    }
}
