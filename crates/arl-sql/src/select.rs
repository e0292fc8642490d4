//! SELECT statement builder.
//!
//! Used for the three SELECT shapes the compiler emits: correlated
//! `EXISTS` subqueries, grouping CTE datasets, and the assembled
//! `WITH … SELECT … WHERE` statement.

use crate::builder::SqlFragment;

/// Builder for SELECT statements.
#[derive(Clone, Debug, Default)]
pub struct SelectBuilder {
    ctes: Vec<(String, SqlFragment)>,
    columns: Vec<SqlFragment>,
    from: Option<SqlFragment>,
    joins: Vec<SqlFragment>,
    where_clauses: Vec<SqlFragment>,
    group_by: Vec<String>,
}

impl SelectBuilder {
    /// Create a new SELECT builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a CTE (WITH clause).
    pub fn with_cte(mut self, alias: &str, query: SqlFragment) -> Self {
        self.ctes.push((alias.to_string(), query));
        self
    }

    /// Add a raw SQL column expression.
    pub fn column_raw(mut self, sql: SqlFragment) -> Self {
        self.columns.push(sql);
        self
    }

    /// Add a column expression with an alias.
    pub fn column_as(mut self, expr: &str, alias: &str) -> Self {
        self.columns
            .push(SqlFragment::raw(format!("{} AS {}", expr, alias)));
        self
    }

    /// Set the FROM table (trusted identifier from the static registry).
    pub fn from_table(mut self, table: &str) -> Self {
        self.from = Some(SqlFragment::raw(table));
        self
    }

    /// Set FROM with an alias, omitting `AS` when the alias matches the
    /// table name.
    pub fn from_table_as(mut self, table: &str, alias: &str) -> Self {
        let sql = if table == alias {
            table.to_string()
        } else {
            format!("{} AS {}", table, alias)
        };
        self.from = Some(SqlFragment::raw(sql));
        self
    }

    /// Add an INNER JOIN with a fixed ON condition.
    pub fn join(mut self, table: &str, alias: &str, on: &str) -> Self {
        let target = if table == alias {
            table.to_string()
        } else {
            format!("{} AS {}", table, alias)
        };
        self.joins
            .push(SqlFragment::raw(format!(" JOIN {} ON {}", target, on)));
        self
    }

    /// Add a LEFT JOIN with a fixed ON condition.
    pub fn left_join(mut self, target: &str, on: &str) -> Self {
        self.joins
            .push(SqlFragment::raw(format!(" LEFT JOIN {} ON {}", target, on)));
        self
    }

    /// Add a WHERE clause; multiple clauses combine with AND.
    pub fn where_raw(mut self, sql: SqlFragment) -> Self {
        self.where_clauses.push(sql);
        self
    }

    /// Add a GROUP BY expression (trusted identifier).
    pub fn group_by(mut self, expr: &str) -> Self {
        self.group_by.push(expr.to_string());
        self
    }

    /// Build the SELECT statement.
    pub fn build(self) -> SqlFragment {
        let mut result = SqlFragment::new();

        if !self.ctes.is_empty() {
            result.push("WITH ");
            for (i, (alias, query)) in self.ctes.into_iter().enumerate() {
                if i > 0 {
                    result.push(", ");
                }
                result.push(&alias);
                result.push(" AS (");
                result.append(query);
                result.push(")");
            }
            result.push(" ");
        }

        result.push("SELECT ");
        if self.columns.is_empty() {
            result.push("*");
        } else {
            for (i, col) in self.columns.into_iter().enumerate() {
                if i > 0 {
                    result.push(", ");
                }
                result.append(col);
            }
        }

        if let Some(from) = self.from {
            result.push(" FROM ");
            result.append(from);
        }

        for join in self.joins {
            result.append(join);
        }

        if !self.where_clauses.is_empty() {
            result.push(" WHERE ");
            for (i, clause) in self.where_clauses.into_iter().enumerate() {
                if i > 0 {
                    result.push(" AND ");
                }
                result.append(clause);
            }
        }

        if !self.group_by.is_empty() {
            result.push(" GROUP BY ");
            result.push(&self.group_by.join(", "));
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_simple_select() {
        let sql = SelectBuilder::new()
            .column_raw(SqlFragment::raw("1"))
            .from_table("specific_asset_id")
            .build();

        assert_eq!(sql.sql(), "SELECT 1 FROM specific_asset_id");
    }

    #[test]
    fn test_select_with_joins_and_where() {
        let mut pred = SqlFragment::new();
        pred.push("external_subject_reference_key.value = ");
        pred.push_param("X");

        let sql = SelectBuilder::new()
            .column_raw(SqlFragment::raw("1"))
            .from_table("specific_asset_id")
            .join(
                "reference",
                "external_subject_reference",
                "external_subject_reference.id = specific_asset_id.external_subject_id",
            )
            .where_raw(pred)
            .build();

        assert_eq!(
            sql.sql(),
            "SELECT 1 FROM specific_asset_id \
             JOIN reference AS external_subject_reference \
             ON external_subject_reference.id = specific_asset_id.external_subject_id \
             WHERE external_subject_reference_key.value = $1"
        );
    }

    #[test]
    fn test_alias_equal_to_table_omits_as() {
        let sql = SelectBuilder::new()
            .column_raw(SqlFragment::raw("1"))
            .from_table_as("submodel", "submodel")
            .join("reference_key", "reference_key", "reference_key.reference_id = r.id")
            .build();

        assert!(!sql.sql().contains(" AS "));
    }

    #[test]
    fn test_cte_and_group_by() {
        let inner = SelectBuilder::new()
            .column_as("submodel.id", "root_id")
            .from_table("submodel")
            .group_by("submodel.id")
            .build();

        let sql = SelectBuilder::new()
            .with_cte("submodel_0", inner)
            .column_raw(SqlFragment::raw("submodel.id"))
            .from_table("submodel")
            .left_join("submodel_0", "submodel_0.root_id = submodel.id")
            .build();

        assert_eq!(
            sql.sql(),
            "WITH submodel_0 AS (SELECT submodel.id AS root_id FROM submodel GROUP BY submodel.id) \
             SELECT submodel.id FROM submodel \
             LEFT JOIN submodel_0 ON submodel_0.root_id = submodel.id"
        );
    }
}
