//! Top-level compilation of logical expressions to SQL.
//!
//! Recursive descent over the expression tree with a single mutable
//! collector. Leaves that need a join graph are registered as CTE flags
//! (collector path) or embedded as correlated EXISTS subqueries
//! (stateless path); everything else lowers inline.

use tracing::debug;

use arl_sql::{Expr, SelectBuilder, SqlFragment};

use crate::config::CompilerOptions;
use crate::error::{Error, LoweringError, Result};
use crate::model::definitions::ResolvedRule;
use crate::model::expression::LogicalExpression;
use crate::model::patterns::FragmentStringPattern;
use crate::path::mappings::Root;
use crate::path::resolver::{resolve_fragment, ArrayIndexBinding, ResolvedFieldPath};
use crate::plan::collector::{resolved_needs_cte, CompiledCte, ResolvedFieldPathCollector};
use crate::plan::join_graph::{binding_equalities, exists_subquery, required_aliases};
use crate::query::operations::lower_binary;

/// The output of a compilation: the outer boolean expression and the CTEs
/// it references. The caller assembles `WITH … SELECT … WHERE <expr>` (or
/// uses [`CompiledExpression::to_statement`]).
#[derive(Debug)]
pub struct CompiledExpression {
    pub expression: SqlFragment,
    pub ctes: Vec<CompiledCte>,
}

impl CompiledExpression {
    /// Assemble a full statement: CTEs in the `WITH` clause, each
    /// LEFT-JOINed to the outer row by its `root_id`.
    pub fn to_statement(&self, root: Root, select: &str) -> SqlFragment {
        let outer_key = root.outer_key();
        let outer_table = outer_key.split_once('.').map(|(t, _)| t).unwrap_or(outer_key);

        let mut builder = SelectBuilder::new()
            .column_raw(SqlFragment::raw(select))
            .from_table(outer_table);

        for cte in &self.ctes {
            builder = builder.with_cte(&cte.alias, cte.dataset.clone());
            builder = builder.left_join(
                &cte.alias,
                &format!("{}.root_id = {}", cte.alias, outer_key),
            );
        }

        builder.where_raw(self.expression.clone()).build()
    }
}

/// One compilation pass over a formula. Owns the options and (optionally)
/// borrows the collector for the duration of the walk.
struct Evaluator<'a> {
    root: Root,
    options: &'a CompilerOptions,
    collector: Option<&'a mut ResolvedFieldPathCollector>,
}

impl Evaluator<'_> {
    fn evaluate(&mut self, expr: &LogicalExpression) -> Result<Expr> {
        if let Some((op, operands)) = expr.as_binary() {
            let leaf = lower_binary(op, operands, self.options)?;
            return match leaf.root {
                None => Ok(Expr::from_fragment(leaf.expression)),
                Some(field_root) => {
                    self.check_root(field_root)?;
                    self.place_leaf(leaf.expression, leaf.resolved)
                }
            };
        }

        match expr {
            LogicalExpression::And(children) => {
                let children: Vec<_> = children
                    .iter()
                    .map(|child| self.evaluate(child))
                    .collect::<Result<_>>()?;
                Ok(Expr::and_all(children))
            }
            LogicalExpression::Or(children) => {
                let children: Vec<_> = children
                    .iter()
                    .map(|child| self.evaluate(child))
                    .collect::<Result<_>>()?;
                Ok(Expr::or_all(children))
            }
            LogicalExpression::Not(child) => Ok(self.evaluate(child)?.not()),
            LogicalExpression::Boolean(value) => Ok(Expr::literal(*value)),
            LogicalExpression::Match(members) => {
                let members: Vec<_> = members
                    .iter()
                    .map(|member| self.evaluate(&member.to_logical()))
                    .collect::<Result<_>>()?;
                Ok(Expr::and_all(members))
            }
            _ => unreachable!("binary nodes are handled above"),
        }
    }

    fn check_root(&self, field_root: Root) -> Result<()> {
        if field_root != self.root {
            return Err(LoweringError::UnsupportedOperation(format!(
                "{} field in a {} compilation",
                field_root.describe(),
                self.root.describe()
            ))
            .into());
        }
        Ok(())
    }

    /// Place a lowered leaf into the output: inline when the predicate
    /// stays on the root table, a CTE flag when a collector is present,
    /// an inline conjunction or EXISTS subquery otherwise.
    fn place_leaf(&mut self, predicate: SqlFragment, resolved: Vec<ResolvedFieldPath>) -> Result<Expr> {
        if !resolved_needs_cte(self.root, &resolved) {
            return Ok(Expr::from_fragment(predicate));
        }

        if let Some(collector) = self.collector.as_deref_mut() {
            let flag = collector.register(resolved, Some(predicate))?;
            let qualified = collector
                .qualified_alias(&flag)
                .ok_or_else(|| Error::Internal(format!("unknown flag alias {flag}")))?;
            return Ok(Expr::from_fragment(SqlFragment::raw(qualified)));
        }

        let aliases = required_aliases(self.root, &resolved);
        let bindings: Vec<ArrayIndexBinding> = resolved
            .iter()
            .flat_map(|path| path.array_bindings.iter().cloned())
            .collect();

        let mut predicate = predicate;
        if let Some(equalities) = binding_equalities(&bindings) {
            predicate.push(" AND ");
            predicate.append(equalities);
        }

        // Columns and bindings confined to the root table need no subquery;
        // they constrain the outer row directly.
        let natural = self.root.natural_alias();
        if aliases.iter().all(|alias| alias == natural) {
            return Ok(Expr::from_fragment(predicate));
        }

        debug!(root = self.root.describe(), "embedding stateless EXISTS predicate");
        Ok(Expr::from_fragment(exists_subquery(
            self.root, &aliases, predicate,
        )?))
    }

    /// Lower a fragment identifier: the conjunction of its binding
    /// equalities, `1=1` for a pure wildcard.
    ///
    /// A registered fragment carries `predicate = None`: the CTE builder
    /// applies binding constraints unconditionally, and duplicating them
    /// would contradict the flag semantics.
    fn evaluate_fragment(&mut self, pattern: &FragmentStringPattern) -> Result<Expr> {
        let (root, bindings) = resolve_fragment(pattern)?;
        self.check_root(root)?;

        let Some(equalities) = binding_equalities(&bindings) else {
            return Ok(Expr::tautology());
        };

        if let Some(collector) = self.collector.as_deref_mut() {
            let flag = collector.register(
                vec![ResolvedFieldPath {
                    column: String::new(),
                    array_bindings: bindings,
                }],
                None,
            )?;
            let qualified = collector
                .qualified_alias(&flag)
                .ok_or_else(|| Error::Internal(format!("unknown flag alias {flag}")))?;
            return Ok(Expr::from_fragment(SqlFragment::raw(qualified)));
        }

        Ok(Expr::from_fragment(equalities))
    }

    /// `main OR (OR_i NOT(fragment_i))`: the formula constrains rows inside
    /// the fragments; any row outside all of them passes. Wildcard
    /// fragments are skipped; their negation is vacuously false.
    fn evaluate_with_negated_fragments(
        &mut self,
        expr: &LogicalExpression,
        fragments: &[FragmentStringPattern],
    ) -> Result<Expr> {
        let main = self.evaluate(expr)?;

        let mut negated = Vec::new();
        for pattern in fragments {
            let (root, bindings) = resolve_fragment(pattern)?;
            self.check_root(root)?;
            if bindings.is_empty() {
                continue;
            }
            negated.push(self.evaluate_fragment(pattern)?.not());
        }

        if negated.is_empty() {
            return Ok(main);
        }
        Ok(main.or(Expr::or_all(negated)))
    }
}

/// Compiles formulas of one root into SQL predicates.
pub struct Compiler {
    root: Root,
    options: CompilerOptions,
}

impl Compiler {
    pub fn new(root: Root) -> Self {
        Self::with_options(root, CompilerOptions::default())
    }

    pub fn with_options(root: Root, options: CompilerOptions) -> Self {
        Self { root, options }
    }

    pub fn root(&self) -> Root {
        self.root
    }

    /// Compile with a collector: join-graph leaves become CTE flag columns.
    pub fn compile(&self, expr: &LogicalExpression) -> Result<CompiledExpression> {
        self.compile_guarded(expr, &[])
    }

    /// Compile with a collector and fragment guards.
    pub fn compile_guarded(
        &self,
        expr: &LogicalExpression,
        fragments: &[FragmentStringPattern],
    ) -> Result<CompiledExpression> {
        let mut collector = ResolvedFieldPathCollector::new(self.root);
        let mut evaluator = Evaluator {
            root: self.root,
            options: &self.options,
            collector: Some(&mut collector),
        };
        let expression = evaluator.evaluate_with_negated_fragments(expr, fragments)?;

        Ok(CompiledExpression {
            expression: expression.into_fragment(),
            ctes: collector.build_ctes(None),
        })
    }

    /// Compile without a collector: join-graph leaves become correlated
    /// EXISTS subqueries and no CTEs are produced.
    pub fn compile_stateless(&self, expr: &LogicalExpression) -> Result<SqlFragment> {
        let mut evaluator = Evaluator {
            root: self.root,
            options: &self.options,
            collector: None,
        };
        Ok(evaluator.evaluate(expr)?.into_fragment())
    }

    /// Compile a stateless fragment guard expression.
    pub fn compile_fragments_stateless(
        &self,
        expr: &LogicalExpression,
        fragments: &[FragmentStringPattern],
    ) -> Result<SqlFragment> {
        let mut evaluator = Evaluator {
            root: self.root,
            options: &self.options,
            collector: None,
        };
        Ok(evaluator
            .evaluate_with_negated_fragments(expr, fragments)?
            .into_fragment())
    }

    /// Compile a fully resolved rule: the formula, guarded by the filter's
    /// fragment and condition when present.
    pub fn compile_rule(&self, rule: &ResolvedRule) -> Result<CompiledExpression> {
        let mut collector = ResolvedFieldPathCollector::new(self.root);
        let mut evaluator = Evaluator {
            root: self.root,
            options: &self.options,
            collector: Some(&mut collector),
        };

        let fragments: Vec<FragmentStringPattern> = rule
            .filter
            .iter()
            .filter_map(|filter| filter.fragment.clone())
            .collect();
        let mut expression = evaluator.evaluate_with_negated_fragments(&rule.formula, &fragments)?;

        // A filter condition scopes the rule like a fragment does: rows
        // outside the condition pass unguarded.
        if let Some(condition) = rule.filter.as_ref().and_then(|f| f.condition.as_ref()) {
            let condition = evaluator.evaluate(condition)?;
            expression = expression.or(condition.not());
        }

        Ok(CompiledExpression {
            expression: expression.into_fragment(),
            ctes: collector.build_ctes(None),
        })
    }
}
