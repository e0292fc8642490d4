//! SQL planning: join graphs, EXISTS embedding, and the CTE collector.

pub mod collector;
pub mod join_graph;

pub use collector::{
    resolved_needs_cte, CompiledCte, ResolvedFieldPathCollector, ResolvedFieldPathFlag,
};
pub use join_graph::{
    binding_equalities, exists_subquery, join_rules, plan_cte, required_aliases, JoinPlan,
    JoinRule,
};
