//! The access rule model: rules, ACLs, objects, and named definitions.
//!
//! Decoding is strict: unknown fields are rejected, required fields are
//! reported as `field <name> in <type>: required`, and mutually exclusive
//! pairs are checked before shape validation. Raw serde mirrors convert
//! into the clean model via `TryFrom`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::model::expression::{AttributeValue, LogicalExpression};
use crate::model::patterns::{FragmentStringPattern, StandardString};

/// Access decision of an ACL.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AclAccess {
    #[serde(rename = "ALLOW")]
    Allow,
    #[serde(rename = "DISABLED")]
    Disabled,
}

/// A right granted by an ACL.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Right {
    #[serde(rename = "CREATE")]
    Create,
    #[serde(rename = "READ")]
    Read,
    #[serde(rename = "UPDATE")]
    Update,
    #[serde(rename = "DELETE")]
    Delete,
    #[serde(rename = "EXECUTE")]
    Execute,
    #[serde(rename = "VIEW")]
    View,
    #[serde(rename = "ALL")]
    All,
    #[serde(rename = "TREE")]
    Tree,
}

/// The attribute set of an ACL: inline values or a named definition.
#[derive(Clone, Debug, PartialEq)]
pub enum AttributeSpec {
    Inline(Vec<AttributeValue>),
    Named(String),
}

/// An Access Control List entry.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(try_from = "RawAcl")]
pub struct Acl {
    pub access: AclAccess,
    pub rights: Vec<Right>,
    pub attributes: Option<AttributeSpec>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAcl {
    #[serde(rename = "ACCESS")]
    access: Option<AclAccess>,
    #[serde(rename = "RIGHTS")]
    rights: Option<Vec<Right>>,
    #[serde(rename = "ATTRIBUTES")]
    attributes: Option<Vec<AttributeValue>>,
    #[serde(rename = "USEATTRIBUTES")]
    use_attributes: Option<String>,
}

impl TryFrom<RawAcl> for Acl {
    type Error = DecodeError;

    fn try_from(raw: RawAcl) -> Result<Self, Self::Error> {
        let access = raw.access.ok_or(DecodeError::MissingField {
            field: "ACCESS",
            container: "ACL",
        })?;
        let rights = raw.rights.ok_or(DecodeError::MissingField {
            field: "RIGHTS",
            container: "ACL",
        })?;

        let use_attributes = non_blank(raw.use_attributes.as_deref());
        let attributes = match (raw.attributes, use_attributes) {
            (Some(_), Some(_)) => {
                return Err(DecodeError::MutuallyExclusive {
                    first: "ATTRIBUTES",
                    second: "USEATTRIBUTES",
                    container: "ACL",
                })
            }
            (Some(inline), None) => Some(AttributeSpec::Inline(inline)),
            (None, Some(name)) => Some(AttributeSpec::Named(name.to_string())),
            (None, None) => None,
        };

        Ok(Self {
            access,
            rights,
            attributes,
        })
    }
}

/// A protected object entry of a rule.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub enum ObjectItem {
    #[serde(rename = "ROUTE")]
    Route(StandardString),
    #[serde(rename = "IDENTIFIABLE")]
    Identifiable(StandardString),
    #[serde(rename = "REFERABLE")]
    Referable(StandardString),
    #[serde(rename = "FRAGMENT")]
    Fragment(FragmentStringPattern),
    #[serde(rename = "DESCRIPTOR")]
    Descriptor(StandardString),
}

/// The ACL of a rule: inline or named.
#[derive(Clone, Debug, PartialEq)]
pub enum AclSpec {
    Inline(Acl),
    Named(String),
}

/// The formula of a rule: inline or named.
#[derive(Clone, Debug, PartialEq)]
pub enum FormulaSpec {
    Inline(LogicalExpression),
    Named(String),
}

/// Row filter attached to a rule.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(try_from = "RawRuleFilter")]
pub struct RuleFilter {
    pub condition: Option<FormulaSpec>,
    pub fragment: Option<FragmentStringPattern>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRuleFilter {
    #[serde(rename = "CONDITION")]
    condition: Option<LogicalExpression>,
    #[serde(rename = "USEFORMULA")]
    use_formula: Option<String>,
    #[serde(rename = "FRAGMENT")]
    fragment: Option<FragmentStringPattern>,
}

impl TryFrom<RawRuleFilter> for RuleFilter {
    type Error = DecodeError;

    fn try_from(raw: RawRuleFilter) -> Result<Self, Self::Error> {
        let use_formula = non_blank(raw.use_formula.as_deref());
        let condition = match (raw.condition, use_formula) {
            (Some(_), Some(_)) => {
                return Err(DecodeError::MutuallyExclusive {
                    first: "CONDITION",
                    second: "USEFORMULA",
                    container: "FILTER",
                })
            }
            (Some(inline), None) => Some(FormulaSpec::Inline(inline)),
            (None, Some(name)) => Some(FormulaSpec::Named(name.to_string())),
            (None, None) => None,
        };

        Ok(Self {
            condition,
            fragment: raw.fragment,
        })
    }
}

/// A single access permission rule.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(try_from = "RawAccessPermissionRule")]
pub struct AccessPermissionRule {
    pub acl: AclSpec,
    pub formula: FormulaSpec,
    pub objects: Vec<ObjectItem>,
    pub use_objects: Vec<String>,
    pub filter: Option<RuleFilter>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAccessPermissionRule {
    #[serde(rename = "ACL")]
    acl: Option<Acl>,
    #[serde(rename = "USEACL")]
    use_acl: Option<String>,
    #[serde(rename = "FORMULA")]
    formula: Option<LogicalExpression>,
    #[serde(rename = "USEFORMULA")]
    use_formula: Option<String>,
    #[serde(rename = "OBJECTS")]
    objects: Option<Vec<ObjectItem>>,
    #[serde(rename = "USEOBJECTS")]
    use_objects: Option<Vec<StandardString>>,
    #[serde(rename = "FILTER")]
    filter: Option<RuleFilter>,
}

impl TryFrom<RawAccessPermissionRule> for AccessPermissionRule {
    type Error = DecodeError;

    fn try_from(raw: RawAccessPermissionRule) -> Result<Self, Self::Error> {
        let acl = match (raw.acl, non_blank(raw.use_acl.as_deref())) {
            (Some(_), Some(_)) => {
                return Err(DecodeError::MutuallyExclusive {
                    first: "ACL",
                    second: "USEACL",
                    container: "AccessPermissionRule",
                })
            }
            (Some(inline), None) => AclSpec::Inline(inline),
            (None, Some(name)) => AclSpec::Named(name.to_string()),
            (None, None) => {
                return Err(DecodeError::MissingField {
                    field: "ACL",
                    container: "AccessPermissionRule",
                })
            }
        };

        let formula = match (raw.formula, non_blank(raw.use_formula.as_deref())) {
            (Some(_), Some(_)) => {
                return Err(DecodeError::MutuallyExclusive {
                    first: "FORMULA",
                    second: "USEFORMULA",
                    container: "AccessPermissionRule",
                })
            }
            (Some(inline), None) => {
                inline.validate()?;
                FormulaSpec::Inline(inline)
            }
            (None, Some(name)) => FormulaSpec::Named(name.to_string()),
            (None, None) => {
                return Err(DecodeError::MissingField {
                    field: "FORMULA",
                    container: "AccessPermissionRule",
                })
            }
        };

        Ok(Self {
            acl,
            formula,
            objects: raw.objects.unwrap_or_default(),
            use_objects: raw
                .use_objects
                .unwrap_or_default()
                .into_iter()
                .map(|s| s.as_str().to_string())
                .collect(),
            filter: raw.filter,
        })
    }
}

/// A whitespace-only string counts as absent.
fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// The root rule document: rules plus named-definition sections.
#[derive(Clone, Debug, Deserialize)]
#[serde(try_from = "RawAccessRuleModel")]
pub struct AccessRuleModel {
    pub rules: Vec<AccessPermissionRule>,
    pub def_acls: IndexMap<String, Acl>,
    pub def_attributes: IndexMap<String, Vec<AttributeValue>>,
    pub def_formulas: IndexMap<String, LogicalExpression>,
    pub def_objects: IndexMap<String, Vec<ObjectItem>>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAccessRuleModel {
    rules: Vec<AccessPermissionRule>,
    #[serde(rename = "DEFACLS", default)]
    def_acls: Vec<NamedAcl>,
    #[serde(rename = "DEFATTRIBUTES", default)]
    def_attributes: Vec<NamedAttributes>,
    #[serde(rename = "DEFFORMULAS", default)]
    def_formulas: Vec<NamedFormula>,
    #[serde(rename = "DEFOBJECTS", default)]
    def_objects: Vec<NamedObjects>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct NamedAcl {
    name: StandardString,
    #[serde(rename = "ACL")]
    acl: Acl,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct NamedAttributes {
    name: StandardString,
    #[serde(rename = "ATTRIBUTES")]
    attributes: Vec<AttributeValue>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct NamedFormula {
    name: StandardString,
    #[serde(rename = "FORMULA")]
    formula: LogicalExpression,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct NamedObjects {
    name: StandardString,
    #[serde(rename = "OBJECTS")]
    objects: Vec<ObjectItem>,
}

fn into_unique<T>(
    section: &'static str,
    entries: impl IntoIterator<Item = (StandardString, T)>,
) -> Result<IndexMap<String, T>, DecodeError> {
    let mut map = IndexMap::new();
    for (name, payload) in entries {
        let name = name.as_str().to_string();
        if map.contains_key(&name) {
            return Err(DecodeError::DuplicateDefinition { section, name });
        }
        map.insert(name, payload);
    }
    Ok(map)
}

impl TryFrom<RawAccessRuleModel> for AccessRuleModel {
    type Error = DecodeError;

    fn try_from(raw: RawAccessRuleModel) -> Result<Self, Self::Error> {
        let def_formulas = into_unique(
            "DEFFORMULAS",
            raw.def_formulas.into_iter().map(|d| (d.name, d.formula)),
        )?;
        for formula in def_formulas.values() {
            formula.validate()?;
        }

        Ok(Self {
            rules: raw.rules,
            def_acls: into_unique("DEFACLS", raw.def_acls.into_iter().map(|d| (d.name, d.acl)))?,
            def_attributes: into_unique(
                "DEFATTRIBUTES",
                raw.def_attributes
                    .into_iter()
                    .map(|d| (d.name, d.attributes)),
            )?,
            def_formulas,
            def_objects: into_unique(
                "DEFOBJECTS",
                raw.def_objects.into_iter().map(|d| (d.name, d.objects)),
            )?,
        })
    }
}

impl AccessRuleModel {
    /// Decode a rule document from JSON.
    pub fn from_json(input: &str) -> Result<Self, DecodeError> {
        Ok(serde_json::from_str(input)?)
    }

    /// Decode a rule document from YAML.
    pub fn from_yaml(input: &str) -> Result<Self, DecodeError> {
        Ok(serde_yaml::from_str(input)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_RULE: &str = r#"{
        "ACL": {"ACCESS": "ALLOW", "RIGHTS": ["READ"]},
        "FORMULA": {"$boolean": true}
    }"#;

    #[test]
    fn test_minimal_rule() {
        let rule: AccessPermissionRule = serde_json::from_str(MINIMAL_RULE).unwrap();
        assert!(matches!(rule.acl, AclSpec::Inline(_)));
        assert!(matches!(rule.formula, FormulaSpec::Inline(_)));
        assert!(rule.objects.is_empty());
    }

    #[test]
    fn test_acl_requires_access() {
        let err = serde_json::from_str::<Acl>(r#"{"RIGHTS": ["READ"]}"#)
            .unwrap_err()
            .to_string();
        assert!(err.contains("field ACCESS in ACL: required"), "{err}");
    }

    #[test]
    fn test_acl_rejects_unknown_rights() {
        let err = serde_json::from_str::<Acl>(r#"{"ACCESS": "ALLOW", "RIGHTS": ["WRONG"]}"#)
            .unwrap_err()
            .to_string();
        assert!(err.contains("READ"), "allowed set should be quoted: {err}");
    }

    #[test]
    fn test_acl_rejects_unknown_access() {
        assert!(serde_json::from_str::<Acl>(r#"{"ACCESS": "MAYBE", "RIGHTS": []}"#).is_err());
    }

    #[test]
    fn test_acl_and_useacl_are_exclusive() {
        let err = serde_json::from_str::<AccessPermissionRule>(
            r#"{
                "ACL": {"ACCESS": "ALLOW", "RIGHTS": ["READ"]},
                "USEACL": "acl1",
                "FORMULA": {"$boolean": true}
            }"#,
        )
        .unwrap_err()
        .to_string();
        assert!(err.contains("mutually exclusive"), "{err}");
    }

    #[test]
    fn test_blank_useacl_counts_as_absent() {
        let rule: AccessPermissionRule = serde_json::from_str(
            r#"{
                "ACL": {"ACCESS": "ALLOW", "RIGHTS": ["READ"]},
                "USEACL": "   ",
                "FORMULA": {"$boolean": true}
            }"#,
        )
        .unwrap();
        assert!(matches!(rule.acl, AclSpec::Inline(_)));
    }

    #[test]
    fn test_rule_requires_formula() {
        let err = serde_json::from_str::<AccessPermissionRule>(
            r#"{"ACL": {"ACCESS": "ALLOW", "RIGHTS": ["READ"]}}"#,
        )
        .unwrap_err()
        .to_string();
        assert!(
            err.contains("field FORMULA in AccessPermissionRule: required"),
            "{err}"
        );
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = serde_json::from_str::<AccessPermissionRule>(
            r#"{
                "ACL": {"ACCESS": "ALLOW", "RIGHTS": ["READ"]},
                "FORMULA": {"$boolean": true},
                "EXTRA": 1
            }"#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_objects_and_useobjects_coexist() {
        let rule: AccessPermissionRule = serde_json::from_str(
            r#"{
                "ACL": {"ACCESS": "ALLOW", "RIGHTS": ["READ"]},
                "FORMULA": {"$boolean": true},
                "OBJECTS": [{"ROUTE": "/submodels"}],
                "USEOBJECTS": ["group1"]
            }"#,
        )
        .unwrap();
        assert_eq!(rule.objects.len(), 1);
        assert_eq!(rule.use_objects, vec!["group1"]);
    }

    #[test]
    fn test_model_duplicate_definition() {
        let err = AccessRuleModel::from_json(
            r#"{
                "rules": [],
                "DEFFORMULAS": [
                    {"name": "f1", "FORMULA": {"$boolean": true}},
                    {"name": "f1", "FORMULA": {"$boolean": false}}
                ]
            }"#,
        )
        .unwrap_err()
        .to_string();
        assert!(err.contains("duplicate definition `f1`"), "{err}");
    }

    #[test]
    fn test_model_from_yaml() {
        let model = AccessRuleModel::from_yaml(
            "rules:\n  - ACL:\n      ACCESS: ALLOW\n      RIGHTS: [READ]\n    FORMULA:\n      $boolean: true\n",
        )
        .unwrap();
        assert_eq!(model.rules.len(), 1);
    }

    #[test]
    fn test_filter_condition_exclusive_with_useformula() {
        let err = serde_json::from_str::<RuleFilter>(
            r#"{"CONDITION": {"$boolean": true}, "USEFORMULA": "f1"}"#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_def_formula_arity_checked() {
        let err = AccessRuleModel::from_json(
            r#"{
                "rules": [],
                "DEFFORMULAS": [{"name": "f1", "FORMULA": {"$and": [{"$boolean": true}]}}]
            }"#,
        );
        assert!(err.is_err());
    }
}
