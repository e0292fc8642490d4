//! Rule document model: AST, decoder, and named-definition expansion.

pub mod definitions;
pub mod expression;
pub mod patterns;
pub mod rules;

pub use definitions::{ResolvedFilter, ResolvedRule};
pub use expression::{
    AttributeValue, BinaryOperation, CastKind, DateTimeLiteral, LogicalExpression,
    MatchExpression, TimeLiteral, Value, ValueCategory,
};
pub use patterns::{
    FragmentStringPattern, HexLiteralPattern, ModelStringPattern, StandardString,
};
pub use rules::{
    AccessPermissionRule, AccessRuleModel, Acl, AclAccess, AclSpec, AttributeSpec, FormulaSpec,
    ObjectItem, Right, RuleFilter,
};
