//! Core SQL builder types.

use crate::param::SqlParam;
use std::fmt::Write;

/// A SQL fragment with its associated parameters.
///
/// This is the core type for building SQL safely. It maintains a SQL
/// string with parameter placeholders ($1, $2, etc.) and a vector of
/// parameter values. The `(sql, params)` pair doubles as the prepared
/// form the compiler serializes when computing canonical predicate
/// signatures.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SqlFragment {
    sql: String,
    params: Vec<SqlParam>,
}

impl SqlFragment {
    /// Create a new empty SQL fragment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a SQL fragment from raw SQL (no parameters).
    ///
    /// # Warning
    ///
    /// Only use this for known-safe SQL strings (keywords, operators,
    /// column references from the static tables). Never use this with
    /// rule-document input.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Create a SQL fragment with a single parameter placeholder.
    pub fn param(value: impl Into<SqlParam>) -> Self {
        let mut frag = Self::new();
        frag.push_param(value);
        frag
    }

    /// Get the SQL string.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Get the parameters.
    pub fn params(&self) -> &[SqlParam] {
        &self.params
    }

    /// Check if the fragment is empty.
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }

    /// Push raw SQL (no parameters).
    pub fn push(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    /// Push a parameter and its placeholder.
    pub fn push_param(&mut self, value: impl Into<SqlParam>) -> &mut Self {
        let param_num = self.params.len() + 1;
        write!(self.sql, "${}", param_num).unwrap();
        self.params.push(value.into());
        self
    }

    /// Append another SQL fragment.
    ///
    /// This renumbers the parameters in the appended fragment to continue
    /// from the current count.
    pub fn append(&mut self, other: SqlFragment) -> &mut Self {
        let offset = self.params.len();

        let renumbered_sql = renumber_params(&other.sql, offset);
        self.sql.push_str(&renumbered_sql);
        self.params.extend(other.params);
        self
    }

    /// Join multiple fragments with a separator.
    pub fn join(sep: &str, fragments: impl IntoIterator<Item = SqlFragment>) -> Self {
        let mut result = Self::new();
        let mut first = true;

        for frag in fragments {
            if frag.is_empty() {
                continue;
            }
            if !first {
                result.push(sep);
            }
            result.append(frag);
            first = false;
        }

        result
    }

    /// Wrap in parentheses.
    pub fn parens(mut self) -> Self {
        self.sql = format!("({})", self.sql);
        self
    }

    /// Render the fragment as standalone SQL with inline literals.
    ///
    /// Every `$n` placeholder is replaced by the quoted rendering of its
    /// parameter. Used by callers that assemble a plain expression and by
    /// tests asserting on readable SQL.
    pub fn to_inline_sql(&self) -> String {
        let mut result = String::with_capacity(self.sql.len());
        let mut chars = self.sql.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '$' {
                let mut num_str = String::new();
                while let Some(&next) = chars.peek() {
                    if next.is_ascii_digit() {
                        num_str.push(chars.next().unwrap());
                    } else {
                        break;
                    }
                }

                match num_str
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|i| self.params.get(i))
                {
                    Some(param) => result.push_str(&param.to_inline_sql()),
                    None => {
                        result.push('$');
                        result.push_str(&num_str);
                    }
                }
            } else {
                result.push(c);
            }
        }

        result
    }

    /// Build the final SQL and parameters.
    pub fn build(self) -> (String, Vec<SqlParam>) {
        (self.sql, self.params)
    }
}

/// Renumber parameter placeholders in a SQL string.
fn renumber_params(sql: &str, offset: usize) -> String {
    let mut result = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' {
            let mut num_str = String::new();
            while let Some(&next) = chars.peek() {
                if next.is_ascii_digit() {
                    num_str.push(chars.next().unwrap());
                } else {
                    break;
                }
            }

            if let Ok(num) = num_str.parse::<usize>() {
                write!(result, "${}", num + offset).unwrap();
            } else {
                result.push('$');
                result.push_str(&num_str);
            }
        } else {
            result.push(c);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_fragment_raw() {
        let frag = SqlFragment::raw("SELECT 1 FROM descriptor");
        assert_eq!(frag.sql(), "SELECT 1 FROM descriptor");
        assert!(frag.params().is_empty());
    }

    #[test]
    fn test_sql_fragment_param() {
        let mut frag = SqlFragment::new();
        frag.push("submodel.id_short = ");
        frag.push_param("MySubmodel");

        assert_eq!(frag.sql(), "submodel.id_short = $1");
        assert_eq!(frag.params().len(), 1);
    }

    #[test]
    fn test_sql_fragment_append_renumbers() {
        let mut frag1 = SqlFragment::new();
        frag1.push("a = ");
        frag1.push_param(1i64);

        let mut frag2 = SqlFragment::new();
        frag2.push(" AND b = ");
        frag2.push_param(2i64);

        frag1.append(frag2);

        assert_eq!(frag1.sql(), "a = $1 AND b = $2");
        assert_eq!(frag1.params().len(), 2);
    }

    #[test]
    fn test_renumber_params() {
        assert_eq!(renumber_params("$1", 2), "$3");
        assert_eq!(renumber_params("$1 AND $2", 5), "$6 AND $7");
        assert_eq!(renumber_params("no params", 5), "no params");
    }

    #[test]
    fn test_sql_fragment_parens() {
        let frag = SqlFragment::raw("a OR b").parens();
        assert_eq!(frag.sql(), "(a OR b)");
    }

    #[test]
    fn test_inline_rendering() {
        let mut frag = SqlFragment::new();
        frag.push("submodel.id_short = ");
        frag.push_param("it's");
        frag.push(" AND submodel_element.position = ");
        frag.push_param(3i64);

        assert_eq!(
            frag.to_inline_sql(),
            "submodel.id_short = 'it''s' AND submodel_element.position = 3"
        );
    }

    #[test]
    fn test_inline_duplicated_placeholder() {
        // Safe casts reference the same operand twice.
        let mut frag = SqlFragment::new();
        frag.push("CASE WHEN ");
        frag.push_param("9");
        frag.push("::text ~ '^[0-9]+$' THEN (");
        frag.push_param("9");
        frag.push("::double precision) END");

        let inline = frag.to_inline_sql();
        assert_eq!(inline.matches("'9'").count(), 2);
    }
}
