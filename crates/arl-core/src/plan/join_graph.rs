//! Join-graph planner.
//!
//! A static registry per root describes how each table alias joins into
//! the root's relational neighborhood. Given the aliases a predicate
//! needs, the planner closes over dependencies, picks a correlatable base,
//! orders the joins topologically, and materializes either a correlated
//! `EXISTS` subquery or a grouping CTE dataset.

use std::collections::BTreeSet;

use tracing::debug;

use arl_sql::{SelectBuilder, SqlFragment, SqlParam};

use crate::error::PlanningError;
use crate::path::mappings::Root;
use crate::path::resolver::{ArrayIndex, ArrayIndexBinding, ResolvedFieldPath};

/// One alias of a root's relational neighborhood.
///
/// `join_on` joins the alias to its dependencies with a fixed condition;
/// aliases without one are children of the root row and join dynamically
/// through their `root_key`. `root_key` is the column carrying the outer
/// row's key; only aliases that have one can correlate or anchor a CTE.
pub struct JoinRule {
    pub alias: &'static str,
    pub table: &'static str,
    pub dependencies: &'static [&'static str],
    pub join_on: Option<&'static str>,
    pub root_key: Option<&'static str>,
}

static AAS_DESCRIPTOR_RULES: &[JoinRule] = &[
    JoinRule {
        alias: "aas_descriptor",
        table: "aas_descriptor",
        dependencies: &[],
        join_on: None,
        root_key: Some("aas_descriptor.descriptor_id"),
    },
    JoinRule {
        alias: "specific_asset_id",
        table: "specific_asset_id",
        dependencies: &[],
        join_on: None,
        root_key: Some("specific_asset_id.descriptor_id"),
    },
    JoinRule {
        alias: "external_subject_reference",
        table: "reference",
        dependencies: &["specific_asset_id"],
        join_on: Some("external_subject_reference.id = specific_asset_id.external_subject_id"),
        root_key: None,
    },
    JoinRule {
        alias: "external_subject_reference_key",
        table: "reference_key",
        dependencies: &["external_subject_reference"],
        join_on: Some("external_subject_reference_key.reference_id = external_subject_reference.id"),
        root_key: None,
    },
    JoinRule {
        alias: "aas_descriptor_endpoint",
        table: "aas_descriptor_endpoint",
        dependencies: &[],
        join_on: None,
        root_key: Some("aas_descriptor_endpoint.descriptor_id"),
    },
    JoinRule {
        alias: "submodel_descriptor",
        table: "submodel_descriptor",
        dependencies: &[],
        join_on: None,
        root_key: Some("submodel_descriptor.aas_descriptor_id"),
    },
    JoinRule {
        alias: "sm_semantic_id_reference",
        table: "reference",
        dependencies: &["submodel_descriptor"],
        join_on: Some("sm_semantic_id_reference.id = submodel_descriptor.semantic_id"),
        root_key: None,
    },
    JoinRule {
        alias: "sm_semantic_id_reference_key",
        table: "reference_key",
        dependencies: &["sm_semantic_id_reference"],
        join_on: Some("sm_semantic_id_reference_key.reference_id = sm_semantic_id_reference.id"),
        root_key: None,
    },
    JoinRule {
        alias: "submodel_descriptor_endpoint",
        table: "submodel_descriptor_endpoint",
        dependencies: &["submodel_descriptor"],
        join_on: Some("submodel_descriptor_endpoint.descriptor_id = submodel_descriptor.descriptor_id"),
        root_key: None,
    },
];

static SM_DESCRIPTOR_RULES: &[JoinRule] = &[
    JoinRule {
        alias: "submodel_descriptor",
        table: "submodel_descriptor",
        dependencies: &[],
        join_on: None,
        root_key: Some("submodel_descriptor.descriptor_id"),
    },
    JoinRule {
        alias: "sm_semantic_id_reference",
        table: "reference",
        dependencies: &["submodel_descriptor"],
        join_on: Some("sm_semantic_id_reference.id = submodel_descriptor.semantic_id"),
        root_key: None,
    },
    JoinRule {
        alias: "sm_semantic_id_reference_key",
        table: "reference_key",
        dependencies: &["sm_semantic_id_reference"],
        join_on: Some("sm_semantic_id_reference_key.reference_id = sm_semantic_id_reference.id"),
        root_key: None,
    },
    JoinRule {
        alias: "submodel_descriptor_endpoint",
        table: "submodel_descriptor_endpoint",
        dependencies: &[],
        join_on: None,
        root_key: Some("submodel_descriptor_endpoint.descriptor_id"),
    },
];

static SUBMODEL_RULES: &[JoinRule] = &[
    JoinRule {
        alias: "submodel",
        table: "submodel",
        dependencies: &[],
        join_on: None,
        root_key: Some("submodel.id"),
    },
    JoinRule {
        alias: "semantic_id_reference",
        table: "reference",
        dependencies: &["submodel"],
        join_on: Some("semantic_id_reference.id = submodel.semantic_id"),
        root_key: None,
    },
    JoinRule {
        alias: "semantic_id_reference_key",
        table: "reference_key",
        dependencies: &["semantic_id_reference"],
        join_on: Some("semantic_id_reference_key.reference_id = semantic_id_reference.id"),
        root_key: None,
    },
    JoinRule {
        alias: "submodel_element",
        table: "submodel_element",
        dependencies: &["submodel"],
        join_on: Some("submodel_element.submodel_id = submodel.id"),
        root_key: None,
    },
    JoinRule {
        alias: "property_element",
        table: "property_element",
        dependencies: &["submodel_element"],
        join_on: Some("property_element.id = submodel_element.id"),
        root_key: None,
    },
    JoinRule {
        alias: "sme_semantic_id_reference",
        table: "reference",
        dependencies: &["submodel_element"],
        join_on: Some("sme_semantic_id_reference.id = submodel_element.semantic_id"),
        root_key: None,
    },
    JoinRule {
        alias: "sme_semantic_id_reference_key",
        table: "reference_key",
        dependencies: &["sme_semantic_id_reference"],
        join_on: Some("sme_semantic_id_reference_key.reference_id = sme_semantic_id_reference.id"),
        root_key: None,
    },
];

static SUBMODEL_ELEMENT_RULES: &[JoinRule] = &[
    JoinRule {
        alias: "submodel_element",
        table: "submodel_element",
        dependencies: &[],
        join_on: None,
        root_key: Some("submodel_element.id"),
    },
    JoinRule {
        alias: "property_element",
        table: "property_element",
        dependencies: &["submodel_element"],
        join_on: Some("property_element.id = submodel_element.id"),
        root_key: None,
    },
    JoinRule {
        alias: "sme_semantic_id_reference",
        table: "reference",
        dependencies: &["submodel_element"],
        join_on: Some("sme_semantic_id_reference.id = submodel_element.semantic_id"),
        root_key: None,
    },
    JoinRule {
        alias: "sme_semantic_id_reference_key",
        table: "reference_key",
        dependencies: &["sme_semantic_id_reference"],
        join_on: Some("sme_semantic_id_reference_key.reference_id = sme_semantic_id_reference.id"),
        root_key: None,
    },
];

static SHELL_RULES: &[JoinRule] = &[
    JoinRule {
        alias: "aas_identifier",
        table: "aas_identifier",
        dependencies: &[],
        join_on: None,
        root_key: Some("aas_identifier.id"),
    },
    JoinRule {
        alias: "specific_asset_id",
        table: "specific_asset_id",
        dependencies: &["aas_identifier"],
        join_on: Some("specific_asset_id.aas_id = aas_identifier.id"),
        root_key: None,
    },
    JoinRule {
        alias: "external_subject_reference",
        table: "reference",
        dependencies: &["specific_asset_id"],
        join_on: Some("external_subject_reference.id = specific_asset_id.external_subject_id"),
        root_key: None,
    },
    JoinRule {
        alias: "external_subject_reference_key",
        table: "reference_key",
        dependencies: &["external_subject_reference"],
        join_on: Some("external_subject_reference_key.reference_id = external_subject_reference.id"),
        root_key: None,
    },
];

static CONCEPT_DESCRIPTION_RULES: &[JoinRule] = &[JoinRule {
    alias: "concept_description",
    table: "concept_description",
    dependencies: &[],
    join_on: None,
    root_key: Some("concept_description.id"),
}];

/// The join rules of a root's neighborhood.
pub fn join_rules(root: Root) -> &'static [JoinRule] {
    match root {
        Root::AasDescriptor => AAS_DESCRIPTOR_RULES,
        Root::SmDescriptor => SM_DESCRIPTOR_RULES,
        Root::Submodel => SUBMODEL_RULES,
        Root::SubmodelElement => SUBMODEL_ELEMENT_RULES,
        Root::Shell | Root::Discovery => SHELL_RULES,
        Root::ConceptDescription => CONCEPT_DESCRIPTION_RULES,
    }
}

/// Base-alias preference per root. The first priority present in the
/// expanded alias set wins.
fn base_priority(root: Root) -> &'static [&'static str] {
    match root {
        Root::AasDescriptor => &[
            "aas_descriptor",
            "specific_asset_id",
            "aas_descriptor_endpoint",
            "submodel_descriptor",
        ],
        Root::SmDescriptor => &["submodel_descriptor", "submodel_descriptor_endpoint"],
        Root::Submodel => &["submodel"],
        Root::SubmodelElement => &["submodel_element"],
        Root::Shell | Root::Discovery => &["aas_identifier"],
        Root::ConceptDescription => &["concept_description"],
    }
}

fn rule(root: Root, alias: &str) -> Result<&'static JoinRule, PlanningError> {
    join_rules(root)
        .iter()
        .find(|r| r.alias == alias)
        .ok_or_else(|| PlanningError::UnknownAlias(alias.to_string()))
}

/// Transitively close an alias set over its dependencies.
fn closure(root: Root, aliases: &BTreeSet<String>) -> Result<BTreeSet<&'static str>, PlanningError> {
    let mut expanded = BTreeSet::new();
    let mut pending: Vec<&str> = aliases.iter().map(String::as_str).collect();

    while let Some(alias) = pending.pop() {
        let rule = rule(root, alias)?;
        if expanded.insert(rule.alias) {
            pending.extend(rule.dependencies.iter().copied());
        }
    }

    Ok(expanded)
}

/// Order aliases so every dependency precedes its dependents. A cycle in
/// the static registry is a programming error, not a user error.
fn topo_order(
    root: Root,
    aliases: &BTreeSet<&'static str>,
) -> Result<Vec<&'static str>, PlanningError> {
    let mut ordered = Vec::new();
    let mut done: BTreeSet<&str> = BTreeSet::new();
    let mut visiting: BTreeSet<&str> = BTreeSet::new();

    fn visit(
        root: Root,
        alias: &'static str,
        aliases: &BTreeSet<&'static str>,
        done: &mut BTreeSet<&'static str>,
        visiting: &mut BTreeSet<&'static str>,
        ordered: &mut Vec<&'static str>,
    ) -> Result<(), PlanningError> {
        if done.contains(alias) {
            return Ok(());
        }
        if !visiting.insert(alias) {
            return Err(PlanningError::CyclicJoinDependency(alias.to_string()));
        }
        for dep in rule(root, alias)?.dependencies {
            if aliases.contains(dep) {
                visit(root, dep, aliases, done, visiting, ordered)?;
            }
        }
        visiting.remove(alias);
        done.insert(alias);
        ordered.push(alias);
        Ok(())
    }

    for alias in aliases {
        visit(root, alias, aliases, &mut done, &mut visiting, &mut ordered)?;
    }

    Ok(ordered)
}

/// A planned join graph anchored at a base alias.
pub struct JoinPlan {
    pub root: Root,
    pub base: &'static JoinRule,
    /// The base's root-key column; defines the CTE `root_id`.
    pub root_key: &'static str,
    /// Joins in dependency order, base excluded.
    pub joins: Vec<&'static JoinRule>,
    /// The expanded alias set plus base, identifying CTE groups.
    pub signature: String,
}

/// Plan the join graph for a grouping CTE: the base must carry a root key
/// because it defines the CTE's `root_id` column.
pub fn plan_cte(root: Root, aliases: &BTreeSet<String>) -> Result<JoinPlan, PlanningError> {
    let expanded = closure(root, aliases)?;

    let base_alias = base_priority(root)
        .iter()
        .find(|candidate| expanded.contains(*candidate))
        .copied()
        .ok_or(PlanningError::NoCorrelatableBase(root.describe()))?;
    let base = rule(root, base_alias)?;
    let root_key = base
        .root_key
        .ok_or(PlanningError::NoCorrelatableBase(root.describe()))?;

    let ordered = topo_order(root, &expanded)?;
    let joins: Vec<_> = ordered
        .into_iter()
        .filter(|alias| *alias != base_alias)
        .map(|alias| rule(root, alias))
        .collect::<Result<_, _>>()?;

    let mut alias_list: Vec<&str> = expanded.iter().copied().collect();
    alias_list.sort_unstable();
    let signature = format!("{}|{}", alias_list.join(","), base_alias);

    debug!(
        root = root.describe(),
        base = base_alias,
        signature = signature.as_str(),
        "planned CTE join graph"
    );

    Ok(JoinPlan {
        root,
        base,
        root_key,
        joins,
        signature,
    })
}

impl JoinPlan {
    fn join_condition(&self, rule: &JoinRule) -> String {
        match (rule.join_on, rule.root_key) {
            (Some(on), _) => on.to_string(),
            // Siblings of the base under the same root row.
            (None, Some(key)) => format!("{} = {}", key, self.root_key),
            (None, None) => format!("{}.id = {}", rule.alias, self.root_key),
        }
    }

    /// Materialize this plan as a grouping CTE dataset: one row per root
    /// key, one `COALESCE(BOOL_OR(..), false)` flag column per predicate.
    pub fn cte_dataset(
        &self,
        flags: &[(String, SqlFragment)],
        outer_where: Option<SqlFragment>,
    ) -> SqlFragment {
        let mut builder = SelectBuilder::new()
            .column_as(self.root_key, "root_id")
            .from_table_as(self.base.table, self.base.alias);

        for (flag_alias, condition) in flags {
            let mut column = SqlFragment::raw("COALESCE(BOOL_OR(");
            column.append(condition.clone());
            column.push("), false) AS ");
            column.push(flag_alias);
            builder = builder.column_raw(column);
        }

        for join in &self.joins {
            builder = builder.join(join.table, join.alias, &self.join_condition(join));
        }

        if let Some(outer_where) = outer_where {
            builder = builder.where_raw(outer_where);
        }

        builder.group_by(self.root_key).build()
    }
}

/// Materialize a predicate as a correlated `EXISTS` subquery (the
/// stateless path, used when no collector is available).
///
/// The root's natural alias is never joined inside the subquery: its
/// columns refer to the outer row, so a join condition mentioning it
/// correlates the subquery instead.
pub fn exists_subquery(
    root: Root,
    aliases: &BTreeSet<String>,
    predicate: SqlFragment,
) -> Result<SqlFragment, PlanningError> {
    let mut expanded = closure(root, aliases)?;
    expanded.remove(root.natural_alias());

    let base_alias = base_priority(root)
        .iter()
        .find(|candidate| expanded.contains(*candidate))
        .copied()
        .or_else(|| {
            // Fall back to an alias anchored directly on the outer row.
            expanded
                .iter()
                .find(|alias| {
                    rule(root, alias).is_ok_and(|r| {
                        r.root_key.is_some()
                            || r.dependencies.iter().all(|dep| !expanded.contains(dep))
                    })
                })
                .copied()
        })
        .ok_or(PlanningError::NoCorrelatableBase(root.describe()))?;
    let base = rule(root, base_alias)?;

    let ordered = topo_order(root, &expanded)?;

    let mut builder = SelectBuilder::new()
        .column_raw(SqlFragment::raw("1"))
        .from_table_as(base.table, base_alias);

    for alias in ordered {
        if alias == base_alias {
            continue;
        }
        let join = rule(root, alias)?;
        let condition = match join.join_on {
            Some(on) => on.to_string(),
            None => format!(
                "{} = {}",
                join.root_key.ok_or(PlanningError::NoCorrelatableBase(root.describe()))?,
                root.outer_key(),
            ),
        };
        builder = builder.join(join.table, join.alias, &condition);
    }

    builder = builder.where_raw(predicate);

    // Correlation back to the outer row.
    let correlation = match (base.root_key, base.join_on) {
        (Some(root_key), _) => format!("{} = {}", root_key, root.outer_key()),
        (None, Some(join_on)) => join_on.to_string(),
        (None, None) => return Err(PlanningError::NoCorrelatableBase(root.describe())),
    };
    builder = builder.where_raw(SqlFragment::raw(correlation));

    debug!(root = root.describe(), base = base_alias, "materialized EXISTS subquery");

    let mut exists = SqlFragment::raw("EXISTS (");
    exists.append(builder.build());
    exists.push(")");
    Ok(exists)
}

/// The binding equalities of a resolution, as a conjunction fragment.
/// Returns None when there is nothing to bind.
pub fn binding_equalities(bindings: &[ArrayIndexBinding]) -> Option<SqlFragment> {
    if bindings.is_empty() {
        return None;
    }

    let mut fragment = SqlFragment::new();
    for (i, binding) in bindings.iter().enumerate() {
        if i > 0 {
            fragment.push(" AND ");
        }
        fragment.push(&binding.alias);
        fragment.push(" = ");
        match &binding.index {
            ArrayIndex::Position(n) => fragment.push_param(*n),
            ArrayIndex::Label(s) => fragment.push_param(SqlParam::text(s.clone())),
        };
    }
    Some(fragment)
}

/// The table aliases a set of resolved paths requires: the qualifier of
/// every plain column, every registry alias appearing inside an expression
/// column, and the qualifier of every binding.
pub fn required_aliases(root: Root, paths: &[ResolvedFieldPath]) -> BTreeSet<String> {
    let mut aliases = BTreeSet::new();

    for path in paths {
        if let Some(alias) = path.column_alias() {
            aliases.insert(alias.to_string());
        } else if !path.column.is_empty() {
            for rule in join_rules(root) {
                if path.column.contains(&format!("{}.", rule.alias)) {
                    aliases.insert(rule.alias.to_string());
                }
            }
        }

        for binding in &path.array_bindings {
            if let Some((alias, _)) = binding.alias.split_once('.') {
                aliases.insert(alias.to_string());
            }
        }
    }

    aliases
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(aliases: &[&str]) -> BTreeSet<String> {
        aliases.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_closure_pulls_dependencies() {
        let expanded = closure(
            Root::AasDescriptor,
            &set(&["external_subject_reference_key"]),
        )
        .unwrap();
        assert!(expanded.contains("external_subject_reference"));
        assert!(expanded.contains("specific_asset_id"));
        assert!(!expanded.contains("aas_descriptor"));
    }

    #[test]
    fn test_unknown_alias() {
        let err = closure(Root::Submodel, &set(&["nope"])).unwrap_err();
        assert_eq!(err, PlanningError::UnknownAlias("nope".into()));
    }

    #[test]
    fn test_cte_plan_base_priority() {
        let plan = plan_cte(Root::Submodel, &set(&["semantic_id_reference_key"])).unwrap();
        assert_eq!(plan.base.alias, "submodel");
        assert_eq!(plan.joins.len(), 2);
        assert_eq!(plan.joins[0].alias, "semantic_id_reference");
    }

    #[test]
    fn test_cte_plan_fallback_base() {
        let plan = plan_cte(
            Root::AasDescriptor,
            &set(&["external_subject_reference_key"]),
        )
        .unwrap();
        assert_eq!(plan.base.alias, "specific_asset_id");
    }

    #[test]
    fn test_cte_dataset_shape() {
        let plan = plan_cte(Root::Submodel, &set(&["semantic_id_reference_key"])).unwrap();
        let mut condition = SqlFragment::new();
        condition.push("semantic_id_reference_key.value = ");
        condition.push_param("urn:sm");

        let dataset = plan.cte_dataset(&[("rfp_0".to_string(), condition)], None);
        let sql = dataset.to_inline_sql();
        assert_eq!(
            sql,
            "SELECT submodel.id AS root_id, \
             COALESCE(BOOL_OR(semantic_id_reference_key.value = 'urn:sm'), false) AS rfp_0 \
             FROM submodel \
             JOIN reference AS semantic_id_reference ON semantic_id_reference.id = submodel.semantic_id \
             JOIN reference_key AS semantic_id_reference_key ON semantic_id_reference_key.reference_id = semantic_id_reference.id \
             GROUP BY submodel.id"
        );
    }

    #[test]
    fn test_exists_subquery_correlation() {
        let mut predicate = SqlFragment::new();
        predicate.push("external_subject_reference_key.value = ");
        predicate.push_param("WRITTEN_BY_X");

        let exists = exists_subquery(
            Root::AasDescriptor,
            &set(&["external_subject_reference_key", "specific_asset_id"]),
            predicate,
        )
        .unwrap();
        let sql = exists.to_inline_sql();

        assert!(sql.starts_with("EXISTS (SELECT 1 FROM specific_asset_id"));
        assert!(sql.contains("JOIN reference AS external_subject_reference"));
        assert!(sql.contains("JOIN reference_key AS external_subject_reference_key"));
        assert!(sql.contains("specific_asset_id.descriptor_id = descriptor.id"));
    }

    #[test]
    fn test_exists_skips_natural_alias() {
        let mut predicate = SqlFragment::new();
        predicate.push("sme_semantic_id_reference_key.value = ");
        predicate.push_param("urn:x");

        let exists = exists_subquery(
            Root::SubmodelElement,
            &set(&["sme_semantic_id_reference_key"]),
            predicate,
        )
        .unwrap();
        let sql = exists.to_inline_sql();

        // submodel_element is the outer row; the reference join correlates
        // through it instead of re-scanning the table.
        assert!(!sql.contains("FROM submodel_element"));
        assert!(sql.contains("sme_semantic_id_reference.id = submodel_element.semantic_id"));
    }

    #[test]
    fn test_binding_equalities() {
        let bindings = vec![
            ArrayIndexBinding {
                alias: "specific_asset_id.position".into(),
                index: ArrayIndex::Position(0),
            },
            ArrayIndexBinding {
                alias: "submodel_element.idshort_path".into(),
                index: ArrayIndex::Label("a.b".into()),
            },
        ];
        let fragment = binding_equalities(&bindings).unwrap();
        assert_eq!(
            fragment.to_inline_sql(),
            "specific_asset_id.position = 0 AND submodel_element.idshort_path = 'a.b'"
        );

        assert!(binding_equalities(&[]).is_none());
    }

    #[test]
    fn test_required_aliases() {
        let paths = vec![ResolvedFieldPath {
            column: "external_subject_reference_key.value".into(),
            array_bindings: vec![ArrayIndexBinding {
                alias: "specific_asset_id.position".into(),
                index: ArrayIndex::Position(0),
            }],
        }];
        let aliases = required_aliases(Root::AasDescriptor, &paths);
        assert!(aliases.contains("external_subject_reference_key"));
        assert!(aliases.contains("specific_asset_id"));
    }

    #[test]
    fn test_required_aliases_from_expression_column() {
        let paths = vec![ResolvedFieldPath {
            column: crate::path::mappings::SME_VALUE_EXPR.into(),
            array_bindings: vec![],
        }];
        let aliases = required_aliases(Root::SubmodelElement, &paths);
        assert!(aliases.contains("property_element"));
    }
}
