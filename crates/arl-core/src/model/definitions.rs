//! Expansion of `USE*` references against the named-definition sections.

use crate::error::DecodeError;
use crate::model::expression::{AttributeValue, LogicalExpression};
use crate::model::patterns::FragmentStringPattern;
use crate::model::rules::{
    AccessPermissionRule, AccessRuleModel, Acl, AclSpec, AttributeSpec, FormulaSpec, ObjectItem,
};

/// A rule with every named reference replaced by its definition.
#[derive(Clone, Debug)]
pub struct ResolvedRule {
    pub acl: Acl,
    pub attributes: Vec<AttributeValue>,
    pub formula: LogicalExpression,
    pub objects: Vec<ObjectItem>,
    pub filter: Option<ResolvedFilter>,
}

/// A rule filter with its condition formula expanded.
#[derive(Clone, Debug)]
pub struct ResolvedFilter {
    pub condition: Option<LogicalExpression>,
    pub fragment: Option<FragmentStringPattern>,
}

impl AccessRuleModel {
    fn named_formula(&self, name: &str) -> Result<LogicalExpression, DecodeError> {
        self.def_formulas
            .get(name)
            .cloned()
            .ok_or_else(|| DecodeError::UnknownDefinition {
                section: "DEFFORMULAS",
                name: name.to_string(),
            })
    }

    /// Expand a rule's `USEACL` / `USEFORMULA` / `USEOBJECTS` /
    /// `USEATTRIBUTES` references. Inline `OBJECTS` and referenced groups
    /// concatenate, inline first.
    pub fn resolve_rule(&self, rule: &AccessPermissionRule) -> Result<ResolvedRule, DecodeError> {
        let acl = match &rule.acl {
            AclSpec::Inline(acl) => acl.clone(),
            AclSpec::Named(name) => {
                self.def_acls
                    .get(name)
                    .cloned()
                    .ok_or_else(|| DecodeError::UnknownDefinition {
                        section: "DEFACLS",
                        name: name.clone(),
                    })?
            }
        };

        let attributes = match &acl.attributes {
            None => Vec::new(),
            Some(AttributeSpec::Inline(values)) => values.clone(),
            Some(AttributeSpec::Named(name)) => self
                .def_attributes
                .get(name)
                .cloned()
                .ok_or_else(|| DecodeError::UnknownDefinition {
                    section: "DEFATTRIBUTES",
                    name: name.clone(),
                })?,
        };

        let formula = match &rule.formula {
            FormulaSpec::Inline(expr) => expr.clone(),
            FormulaSpec::Named(name) => self.named_formula(name)?,
        };

        let mut objects = rule.objects.clone();
        for name in &rule.use_objects {
            let group =
                self.def_objects
                    .get(name)
                    .cloned()
                    .ok_or_else(|| DecodeError::UnknownDefinition {
                        section: "DEFOBJECTS",
                        name: name.clone(),
                    })?;
            objects.extend(group);
        }

        let filter = match &rule.filter {
            None => None,
            Some(filter) => {
                let condition = match &filter.condition {
                    None => None,
                    Some(FormulaSpec::Inline(expr)) => Some(expr.clone()),
                    Some(FormulaSpec::Named(name)) => Some(self.named_formula(name)?),
                };
                Some(ResolvedFilter {
                    condition,
                    fragment: filter.fragment.clone(),
                })
            }
        };

        Ok(ResolvedRule {
            acl,
            attributes,
            formula,
            objects,
            filter,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(doc: &str) -> AccessRuleModel {
        AccessRuleModel::from_json(doc).unwrap()
    }

    #[test]
    fn test_resolve_named_formula() {
        let model = model(
            r#"{
                "rules": [{
                    "ACL": {"ACCESS": "ALLOW", "RIGHTS": ["READ"]},
                    "USEFORMULA": "f1"
                }],
                "DEFFORMULAS": [{"name": "f1", "FORMULA": {"$boolean": true}}]
            }"#,
        );
        let resolved = model.resolve_rule(&model.rules[0]).unwrap();
        assert_eq!(resolved.formula, LogicalExpression::Boolean(true));
    }

    #[test]
    fn test_unknown_formula_name() {
        let model = model(
            r#"{
                "rules": [{
                    "ACL": {"ACCESS": "ALLOW", "RIGHTS": ["READ"]},
                    "USEFORMULA": "missing"
                }]
            }"#,
        );
        let err = model.resolve_rule(&model.rules[0]).unwrap_err().to_string();
        assert!(err.contains("unknown definition `missing`"), "{err}");
    }

    #[test]
    fn test_objects_concatenate() {
        let model = model(
            r#"{
                "rules": [{
                    "ACL": {"ACCESS": "ALLOW", "RIGHTS": ["READ"]},
                    "FORMULA": {"$boolean": true},
                    "OBJECTS": [{"ROUTE": "/shells"}],
                    "USEOBJECTS": ["g1"]
                }],
                "DEFOBJECTS": [{"name": "g1", "OBJECTS": [{"ROUTE": "/submodels"}]}]
            }"#,
        );
        let resolved = model.resolve_rule(&model.rules[0]).unwrap();
        assert_eq!(resolved.objects.len(), 2);
    }

    #[test]
    fn test_named_acl_and_attributes() {
        let model = model(
            r#"{
                "rules": [{
                    "USEACL": "acl1",
                    "FORMULA": {"$boolean": true}
                }],
                "DEFACLS": [{"name": "acl1", "ACL": {
                    "ACCESS": "ALLOW", "RIGHTS": ["READ"], "USEATTRIBUTES": "attrs1"
                }}],
                "DEFATTRIBUTES": [{"name": "attrs1", "ATTRIBUTES": [{"CLAIM": "role"}]}]
            }"#,
        );
        let resolved = model.resolve_rule(&model.rules[0]).unwrap();
        assert_eq!(resolved.acl.access, crate::model::rules::AclAccess::Allow);
        assert_eq!(resolved.attributes.len(), 1);
    }
}
