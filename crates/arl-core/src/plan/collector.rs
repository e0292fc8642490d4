//! Resolved-field-path collector.
//!
//! A mutable builder owned by one compilation. Leaf predicates that need a
//! join graph are registered here; structurally identical predicates share
//! a flag alias, and predicates sharing a join signature share one CTE.

use indexmap::IndexMap;
use std::collections::HashMap;

use tracing::{debug, trace};

use arl_sql::{SelectBuilder, SqlFragment};

use crate::error::{Error, Result};
use crate::path::mappings::Root;
use crate::path::resolver::ResolvedFieldPath;
use crate::plan::join_graph::{binding_equalities, plan_cte, required_aliases, JoinPlan};

/// A registered predicate and the flag column it became.
pub struct ResolvedFieldPathFlag {
    pub flag_alias: String,
    pub group_alias: String,
    pub resolved: Vec<ResolvedFieldPath>,
    /// None for fragments: the CTE builder applies binding constraints
    /// unconditionally, so a fragment carries no predicate of its own.
    pub predicate: Option<SqlFragment>,
}

/// A materialized CTE ready for the caller's `WITH` clause.
#[derive(Debug)]
pub struct CompiledCte {
    pub alias: String,
    pub dataset: SqlFragment,
    pub flags: Vec<String>,
}

struct Group {
    alias: String,
    plan: JoinPlan,
}

/// Collects predicates over resolved field paths during one compilation.
pub struct ResolvedFieldPathCollector {
    root: Root,
    flag_counter: usize,
    dedup: HashMap<String, String>,
    groups: IndexMap<String, Group>,
    entries: Vec<ResolvedFieldPathFlag>,
}

/// True iff lowering the paths requires a join graph: some binding exists,
/// or some column lives outside the root's natural alias.
pub fn resolved_needs_cte(root: Root, paths: &[ResolvedFieldPath]) -> bool {
    let natural = format!("{}.", root.natural_alias());
    paths.iter().any(|path| {
        !path.array_bindings.is_empty()
            || (!path.column.is_empty() && !path.column.starts_with(&natural))
    })
}

/// Canonical prepared form of a predicate: the `(sql, params)` pair of the
/// predicate materialized in a sentinel select.
fn prepared_signature(predicate: &SqlFragment) -> Result<String> {
    let (sql, params) = SelectBuilder::new()
        .column_raw(SqlFragment::raw("1"))
        .from_table("descriptor")
        .where_raw(predicate.clone())
        .build()
        .build();

    serde_json::to_string(&(sql, params))
        .map_err(|e| Error::Internal(format!("signature marshaling failed: {e}")))
}

impl ResolvedFieldPathCollector {
    pub fn new(root: Root) -> Self {
        Self {
            root,
            flag_counter: 0,
            dedup: HashMap::new(),
            groups: IndexMap::new(),
            entries: Vec::new(),
        }
    }

    pub fn root(&self) -> Root {
        self.root
    }

    /// Register a predicate over resolved paths; returns its flag alias.
    /// Registering a structurally identical predicate again returns the
    /// existing alias.
    pub fn register(
        &mut self,
        resolved: Vec<ResolvedFieldPath>,
        predicate: Option<SqlFragment>,
    ) -> Result<String> {
        let resolved_part = serde_json::to_string(&resolved)
            .map_err(|e| Error::Internal(format!("signature marshaling failed: {e}")))?;
        let predicate_part = match &predicate {
            Some(predicate) => prepared_signature(predicate)?,
            None => "null".to_string(),
        };
        let signature = format!("{resolved_part}|{predicate_part}");

        if let Some(existing) = self.dedup.get(&signature) {
            trace!(flag = existing.as_str(), "deduplicated predicate");
            return Ok(existing.clone());
        }

        let aliases = required_aliases(self.root, &resolved);
        let plan = plan_cte(self.root, &aliases)?;

        let group_index = self.groups.len();
        let group = self
            .groups
            .entry(plan.signature.clone())
            .or_insert_with(|| Group {
                alias: format!("{}_{}", plan.base.alias, group_index),
                plan,
            });

        let flag_alias = format!("rfp_{}", self.flag_counter);
        self.flag_counter += 1;

        debug!(
            flag = flag_alias.as_str(),
            group = group.alias.as_str(),
            "registered resolved field path"
        );

        self.dedup.insert(signature, flag_alias.clone());
        self.entries.push(ResolvedFieldPathFlag {
            flag_alias: flag_alias.clone(),
            group_alias: group.alias.clone(),
            resolved,
            predicate,
        });

        Ok(flag_alias)
    }

    /// Snapshot of the registered flags.
    pub fn entries(&self) -> &[ResolvedFieldPathFlag] {
        &self.entries
    }

    /// The `group.flag` reference to use in the outer WHERE clause.
    pub fn qualified_alias(&self, flag_alias: &str) -> Option<String> {
        self.entries
            .iter()
            .find(|entry| entry.flag_alias == flag_alias)
            .map(|entry| format!("{}.{}", entry.group_alias, entry.flag_alias))
    }

    /// Flag condition of an entry: predicate AND bindings. The bindings are
    /// always applied here, which is why fragments register with
    /// `predicate = None`.
    fn flag_condition(entry: &ResolvedFieldPathFlag) -> SqlFragment {
        let bindings: Vec<_> = entry
            .resolved
            .iter()
            .flat_map(|path| path.array_bindings.iter().cloned())
            .collect();

        match (entry.predicate.clone(), binding_equalities(&bindings)) {
            (Some(mut predicate), Some(bindings)) => {
                predicate.push(" AND ");
                predicate.append(bindings);
                predicate
            }
            (Some(predicate), None) => predicate,
            (None, Some(bindings)) => bindings,
            (None, None) => SqlFragment::raw("true"),
        }
    }

    /// Emit one CTE per join-signature group, each carrying the flag
    /// columns of its members. `outer_where` restricts the rows a CTE
    /// aggregates over.
    pub fn build_ctes(&self, outer_where: Option<SqlFragment>) -> Vec<CompiledCte> {
        self.groups
            .values()
            .map(|group| {
                let flags: Vec<(String, SqlFragment)> = self
                    .entries
                    .iter()
                    .filter(|entry| entry.group_alias == group.alias)
                    .map(|entry| (entry.flag_alias.clone(), Self::flag_condition(entry)))
                    .collect();

                CompiledCte {
                    alias: group.alias.clone(),
                    dataset: group.plan.cte_dataset(&flags, outer_where.clone()),
                    flags: flags.into_iter().map(|(alias, _)| alias).collect(),
                }
            })
            .collect()
    }
}
