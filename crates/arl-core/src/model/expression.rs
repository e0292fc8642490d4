//! Logical expressions and value operands.
//!
//! The JSON grammar is an open "one-of" object per node (`{"$eq": [...]}`);
//! serde's externally tagged enum representation decodes it directly and
//! quotes the allowed tags when an unknown one appears.

use chrono::{DateTime, FixedOffset, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DecodeError;
use crate::model::patterns::{HexLiteralPattern, ModelStringPattern, StandardString};

/// A node of a rule formula.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum LogicalExpression {
    #[serde(rename = "$and")]
    And(Vec<LogicalExpression>),
    #[serde(rename = "$or")]
    Or(Vec<LogicalExpression>),
    #[serde(rename = "$not")]
    Not(Box<LogicalExpression>),
    #[serde(rename = "$match")]
    Match(Vec<MatchExpression>),
    #[serde(rename = "$boolean")]
    Boolean(bool),
    #[serde(rename = "$eq")]
    Eq(Vec<Value>),
    #[serde(rename = "$ne")]
    Ne(Vec<Value>),
    #[serde(rename = "$gt")]
    Gt(Vec<Value>),
    #[serde(rename = "$ge")]
    Ge(Vec<Value>),
    #[serde(rename = "$lt")]
    Lt(Vec<Value>),
    #[serde(rename = "$le")]
    Le(Vec<Value>),
    #[serde(rename = "$contains")]
    Contains(Vec<Value>),
    #[serde(rename = "$starts-with")]
    StartsWith(Vec<Value>),
    #[serde(rename = "$ends-with")]
    EndsWith(Vec<Value>),
    #[serde(rename = "$regex")]
    Regex(Vec<Value>),
}

/// A `$match` member: the comparison/string-op/boolean subset of
/// [`LogicalExpression`]. `$match` cannot nest and carries no `$and` /
/// `$or` / `$not`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MatchExpression {
    #[serde(rename = "$boolean")]
    Boolean(bool),
    #[serde(rename = "$eq")]
    Eq(Vec<Value>),
    #[serde(rename = "$ne")]
    Ne(Vec<Value>),
    #[serde(rename = "$gt")]
    Gt(Vec<Value>),
    #[serde(rename = "$ge")]
    Ge(Vec<Value>),
    #[serde(rename = "$lt")]
    Lt(Vec<Value>),
    #[serde(rename = "$le")]
    Le(Vec<Value>),
    #[serde(rename = "$contains")]
    Contains(Vec<Value>),
    #[serde(rename = "$starts-with")]
    StartsWith(Vec<Value>),
    #[serde(rename = "$ends-with")]
    EndsWith(Vec<Value>),
    #[serde(rename = "$regex")]
    Regex(Vec<Value>),
}

impl MatchExpression {
    /// View this member as a plain logical expression.
    pub fn to_logical(&self) -> LogicalExpression {
        match self {
            Self::Boolean(b) => LogicalExpression::Boolean(*b),
            Self::Eq(v) => LogicalExpression::Eq(v.clone()),
            Self::Ne(v) => LogicalExpression::Ne(v.clone()),
            Self::Gt(v) => LogicalExpression::Gt(v.clone()),
            Self::Ge(v) => LogicalExpression::Ge(v.clone()),
            Self::Lt(v) => LogicalExpression::Lt(v.clone()),
            Self::Le(v) => LogicalExpression::Le(v.clone()),
            Self::Contains(v) => LogicalExpression::Contains(v.clone()),
            Self::StartsWith(v) => LogicalExpression::StartsWith(v.clone()),
            Self::EndsWith(v) => LogicalExpression::EndsWith(v.clone()),
            Self::Regex(v) => LogicalExpression::Regex(v.clone()),
        }
    }
}

/// The operation of a comparison or string-op node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOperation {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Contains,
    StartsWith,
    EndsWith,
    Regex,
}

impl BinaryOperation {
    /// The JSON tag of this operation.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Eq => "$eq",
            Self::Ne => "$ne",
            Self::Gt => "$gt",
            Self::Ge => "$ge",
            Self::Lt => "$lt",
            Self::Le => "$le",
            Self::Contains => "$contains",
            Self::StartsWith => "$starts-with",
            Self::EndsWith => "$ends-with",
            Self::Regex => "$regex",
        }
    }

    /// String operations compose LIKE / regex templates instead of a plain
    /// binary operator.
    pub fn is_string_op(&self) -> bool {
        matches!(
            self,
            Self::Contains | Self::StartsWith | Self::EndsWith | Self::Regex
        )
    }
}

impl fmt::Display for BinaryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl LogicalExpression {
    /// View a comparison/string-op node as its operation and operand list.
    pub fn as_binary(&self) -> Option<(BinaryOperation, &[Value])> {
        match self {
            Self::Eq(v) => Some((BinaryOperation::Eq, v)),
            Self::Ne(v) => Some((BinaryOperation::Ne, v)),
            Self::Gt(v) => Some((BinaryOperation::Gt, v)),
            Self::Ge(v) => Some((BinaryOperation::Ge, v)),
            Self::Lt(v) => Some((BinaryOperation::Lt, v)),
            Self::Le(v) => Some((BinaryOperation::Le, v)),
            Self::Contains(v) => Some((BinaryOperation::Contains, v)),
            Self::StartsWith(v) => Some((BinaryOperation::StartsWith, v)),
            Self::EndsWith(v) => Some((BinaryOperation::EndsWith, v)),
            Self::Regex(v) => Some((BinaryOperation::Regex, v)),
            _ => None,
        }
    }

    /// Enforce the decoder-side arity invariants on the whole tree:
    /// `$and`/`$or` need at least two members, `$match` at least one.
    pub fn validate(&self) -> Result<(), DecodeError> {
        match self {
            Self::And(children) | Self::Or(children) => {
                if children.len() < 2 {
                    return Err(DecodeError::InvalidArity {
                        op: if matches!(self, Self::And(_)) { "$and" } else { "$or" },
                        expected: "at least 2",
                        found: children.len(),
                    });
                }
                children.iter().try_for_each(|c| c.validate())
            }
            Self::Not(child) => child.validate(),
            Self::Match(members) => {
                if members.is_empty() {
                    return Err(DecodeError::InvalidArity {
                        op: "$match",
                        expected: "at least 1",
                        found: 0,
                    });
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Decode a standalone expression from JSON and validate arities.
    pub fn from_json(input: &str) -> Result<Self, DecodeError> {
        let expr: Self = serde_json::from_str(input)?;
        expr.validate()?;
        Ok(expr)
    }
}

/// Time-of-day literal (`$timeVal`), validated on decode.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct TimeLiteral(NaiveTime);

impl TimeLiteral {
    pub fn value(&self) -> NaiveTime {
        self.0
    }
}

impl TryFrom<String> for TimeLiteral {
    type Error = DecodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        NaiveTime::parse_from_str(&value, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(&value, "%H:%M"))
            .map(Self)
            .map_err(|_| DecodeError::InvalidLiteral {
                kind: "time",
                value,
            })
    }
}

/// Timestamp literal (`$dateTimeVal`), RFC 3339, validated on decode.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct DateTimeLiteral(DateTime<FixedOffset>);

impl DateTimeLiteral {
    pub fn value(&self) -> DateTime<FixedOffset> {
        self.0
    }
}

impl TryFrom<String> for DateTimeLiteral {
    type Error = DecodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        DateTime::parse_from_rfc3339(&value)
            .map(Self)
            .map_err(|_| DecodeError::InvalidLiteral {
                kind: "dateTime",
                value,
            })
    }
}

/// A typed named variable resolved outside the rule document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    /// A claim from the caller's access token.
    #[serde(rename = "CLAIM")]
    Claim(StandardString),
    /// A global variable (e.g. `UTCNOW`).
    #[serde(rename = "GLOBAL")]
    Global(StandardString),
    /// A reference attribute; never resolvable by this compiler.
    #[serde(rename = "REFERENCE")]
    Reference(StandardString),
}

impl AttributeValue {
    /// The attribute's name.
    pub fn name(&self) -> &str {
        match self {
            Self::Claim(s) | Self::Global(s) | Self::Reference(s) => s.as_str(),
        }
    }

    /// The attribute's kind tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Claim(_) => "CLAIM",
            Self::Global(_) => "GLOBAL",
            Self::Reference(_) => "REFERENCE",
        }
    }
}

/// Target of a `$*Cast` wrapper.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CastKind {
    Str,
    Num,
    Bool,
    Time,
    DateTime,
    Hex,
}

/// Semantic category of a literal; only values of the same category are
/// comparable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueCategory {
    String,
    Number,
    Boolean,
    Time,
    DateTime,
}

impl ValueCategory {
    pub fn name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Time => "time",
            Self::DateTime => "datetime",
        }
    }

    pub fn is_comparable_to(&self, other: &ValueCategory) -> bool {
        self == other
    }
}

impl CastKind {
    /// The category a cast of this kind produces.
    pub fn category(&self) -> ValueCategory {
        match self {
            Self::Str | Self::Hex => ValueCategory::String,
            Self::Num => ValueCategory::Number,
            Self::Bool => ValueCategory::Boolean,
            Self::Time => ValueCategory::Time,
            Self::DateTime => ValueCategory::DateTime,
        }
    }
}

/// A comparison operand.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    #[serde(rename = "$field")]
    Field(ModelStringPattern),
    #[serde(rename = "$strVal")]
    Str(StandardString),
    #[serde(rename = "$numVal")]
    Num(serde_json::Number),
    #[serde(rename = "$boolean")]
    Bool(bool),
    #[serde(rename = "$timeVal")]
    Time(TimeLiteral),
    #[serde(rename = "$dateTimeVal")]
    DateTime(DateTimeLiteral),
    #[serde(rename = "$hexVal")]
    Hex(HexLiteralPattern),
    #[serde(rename = "$attribute")]
    Attribute(AttributeValue),
    #[serde(rename = "$strCast")]
    StrCast(Box<Value>),
    #[serde(rename = "$numCast")]
    NumCast(Box<Value>),
    #[serde(rename = "$boolCast")]
    BoolCast(Box<Value>),
    #[serde(rename = "$timeCast")]
    TimeCast(Box<Value>),
    #[serde(rename = "$dateTimeCast")]
    DateTimeCast(Box<Value>),
    #[serde(rename = "$hexCast")]
    HexCast(Box<Value>),
}

impl Value {
    fn as_cast(&self) -> Option<(CastKind, &Value)> {
        match self {
            Self::StrCast(inner) => Some((CastKind::Str, inner)),
            Self::NumCast(inner) => Some((CastKind::Num, inner)),
            Self::BoolCast(inner) => Some((CastKind::Bool, inner)),
            Self::TimeCast(inner) => Some((CastKind::Time, inner)),
            Self::DateTimeCast(inner) => Some((CastKind::DateTime, inner)),
            Self::HexCast(inner) => Some((CastKind::Hex, inner)),
            _ => None,
        }
    }

    /// Strip cast wrappers iteratively, returning the underlying value and
    /// the **outermost** cast kind. Nested casts may exist but only the
    /// outer one governs SQL lowering.
    pub fn extract_field_and_outer_cast(&self) -> (&Value, Option<CastKind>) {
        let mut outer_cast = None;
        let mut current = self;
        while let Some((kind, inner)) = current.as_cast() {
            if outer_cast.is_none() {
                outer_cast = Some(kind);
            }
            current = inner;
        }
        (current, outer_cast)
    }

    /// The underlying field pattern, if this operand (possibly cast-wrapped)
    /// is a field identifier.
    pub fn as_field(&self) -> Option<&ModelStringPattern> {
        match self.extract_field_and_outer_cast().0 {
            Value::Field(pattern) => Some(pattern),
            _ => None,
        }
    }

    /// Clone this operand with its underlying field pattern replaced,
    /// preserving the cast structure. Returns the value unchanged when no
    /// field is present.
    pub fn with_rewritten_field(&self, pattern: ModelStringPattern) -> Value {
        match self {
            Self::Field(_) => Self::Field(pattern),
            Self::StrCast(inner) => Self::StrCast(Box::new(inner.with_rewritten_field(pattern))),
            Self::NumCast(inner) => Self::NumCast(Box::new(inner.with_rewritten_field(pattern))),
            Self::BoolCast(inner) => Self::BoolCast(Box::new(inner.with_rewritten_field(pattern))),
            Self::TimeCast(inner) => Self::TimeCast(Box::new(inner.with_rewritten_field(pattern))),
            Self::DateTimeCast(inner) => {
                Self::DateTimeCast(Box::new(inner.with_rewritten_field(pattern)))
            }
            Self::HexCast(inner) => Self::HexCast(Box::new(inner.with_rewritten_field(pattern))),
            other => other.clone(),
        }
    }

    /// The semantic category of this operand, when statically known.
    ///
    /// A cast wrapper imposes its target category; fields and attributes
    /// have no static category.
    pub fn category(&self) -> Option<ValueCategory> {
        if let Some((kind, _)) = self.as_cast() {
            return Some(kind.category());
        }
        match self {
            Self::Str(_) | Self::Hex(_) => Some(ValueCategory::String),
            Self::Num(_) => Some(ValueCategory::Number),
            Self::Bool(_) => Some(ValueCategory::Boolean),
            Self::Time(_) => Some(ValueCategory::Time),
            Self::DateTime(_) => Some(ValueCategory::DateTime),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(pattern: &str) -> Value {
        Value::Field(ModelStringPattern::new(pattern).unwrap())
    }

    #[test]
    fn test_decode_comparison() {
        let expr = LogicalExpression::from_json(
            r#"{"$eq":[{"$field":"$sm#idShort"},{"$strVal":"MySubmodel"}]}"#,
        )
        .unwrap();
        let (op, operands) = expr.as_binary().unwrap();
        assert_eq!(op, BinaryOperation::Eq);
        assert_eq!(operands.len(), 2);
    }

    #[test]
    fn test_unknown_tag_quotes_variants() {
        let err = LogicalExpression::from_json(r#"{"$xor":[]}"#).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("$and"), "{msg}");
    }

    #[test]
    fn test_and_arity() {
        assert!(LogicalExpression::from_json(r#"{"$and":[{"$boolean":true}]}"#).is_err());
        assert!(LogicalExpression::from_json(
            r#"{"$and":[{"$boolean":true},{"$boolean":false}]}"#
        )
        .is_ok());
    }

    #[test]
    fn test_match_arity() {
        assert!(LogicalExpression::from_json(r#"{"$match":[]}"#).is_err());
        assert!(LogicalExpression::from_json(
            r#"{"$match":[{"$eq":[{"$field":"$sm#idShort"},{"$strVal":"x"}]}]}"#
        )
        .is_ok());
    }

    #[test]
    fn test_match_rejects_nested_logic() {
        let err = LogicalExpression::from_json(r#"{"$match":[{"$not":{"$boolean":true}}]}"#);
        assert!(err.is_err());
    }

    #[test]
    fn test_outer_cast_extraction() {
        let value = Value::NumCast(Box::new(Value::StrCast(Box::new(field("$sm#idShort")))));
        let (inner, cast) = value.extract_field_and_outer_cast();
        assert_eq!(cast, Some(CastKind::Num));
        assert!(matches!(inner, Value::Field(_)));
    }

    #[test]
    fn test_rewritten_field_preserves_casts() {
        let value = Value::NumCast(Box::new(field("$sm#semanticId")));
        let rewritten = value
            .with_rewritten_field(ModelStringPattern::new("$sm#semanticId.keys[0].value").unwrap());
        assert_eq!(
            rewritten.as_field().unwrap().as_str(),
            "$sm#semanticId.keys[0].value"
        );
        assert!(matches!(rewritten, Value::NumCast(_)));
    }

    #[test]
    fn test_literal_categories() {
        let time: Value =
            serde_json::from_str(r#"{"$timeVal":"12:30:00"}"#).unwrap();
        assert_eq!(time.category(), Some(ValueCategory::Time));

        let hex: Value = serde_json::from_str(r#"{"$hexVal":"0xFF"}"#).unwrap();
        assert_eq!(hex.category(), Some(ValueCategory::String));

        assert_eq!(field("$sm#idShort").category(), None);
    }

    #[test]
    fn test_bad_time_literal() {
        let err = serde_json::from_str::<Value>(r#"{"$timeVal":"25:99"}"#);
        assert!(err.is_err());
    }

    #[test]
    fn test_attribute_decode() {
        let value: Value = serde_json::from_str(r#"{"$attribute":{"CLAIM":"role"}}"#).unwrap();
        match value {
            Value::Attribute(attr) => {
                assert_eq!(attr.kind(), "CLAIM");
                assert_eq!(attr.name(), "role");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
