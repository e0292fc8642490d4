//! Safe SQL identifier handling.
//!
//! Provides functions for safely escaping and quoting SQL identifiers
//! and literals to prevent SQL injection. Column references produced by
//! the compiler's static tables are trusted and used verbatim; everything
//! that originates in a rule document goes through these helpers.

/// Escape a SQL identifier (table name, column name, alias).
///
/// Wraps the identifier in double quotes and escapes any embedded double
/// quotes by doubling them.
///
/// # Examples
///
/// ```
/// use arl_sql::escape_ident;
///
/// assert_eq!(escape_ident("submodel"), "\"submodel\"");
/// assert_eq!(escape_ident("odd\"name"), "\"odd\"\"name\"");
/// ```
pub fn escape_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a SQL literal string.
///
/// Wraps the string in single quotes and escapes any embedded single
/// quotes by doubling them. Used by the inline rendering of fragments;
/// prepared statements carry the value as a parameter instead.
///
/// # Examples
///
/// ```
/// use arl_sql::quote_literal;
///
/// assert_eq!(quote_literal("hello"), "'hello'");
/// assert_eq!(quote_literal("it's"), "'it''s'");
/// ```
pub fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Join a table alias and column name into a qualified reference.
pub fn qualify(alias: &str, column: &str) -> String {
    format!("{}.{}", alias, column)
}

/// Check if a string is a valid unquoted identifier.
///
/// PostgreSQL unquoted identifiers must start with a letter or underscore,
/// and can contain letters, digits, underscores, and dollar signs.
pub fn is_valid_identifier(s: &str) -> bool {
    if s.is_empty() {
        return false;
    }

    let mut chars = s.chars();
    let first = chars.next().unwrap();

    if !first.is_ascii_alphabetic() && first != '_' {
        return false;
    }

    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_ident() {
        assert_eq!(escape_ident("submodel"), "\"submodel\"");
        assert_eq!(escape_ident("id_short"), "\"id_short\"");
        assert_eq!(escape_ident("odd\"name"), "\"odd\"\"name\"");
        assert_eq!(escape_ident(""), "\"\"");
    }

    #[test]
    fn test_quote_literal() {
        assert_eq!(quote_literal("hello"), "'hello'");
        assert_eq!(quote_literal("it's"), "'it''s'");
        assert_eq!(quote_literal(""), "''");
    }

    #[test]
    fn test_qualify() {
        assert_eq!(qualify("aas_descriptor", "id_short"), "aas_descriptor.id_short");
    }

    #[test]
    fn test_is_valid_identifier() {
        assert!(is_valid_identifier("submodel"));
        assert!(is_valid_identifier("_private"));
        assert!(is_valid_identifier("rfp_0"));

        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("0abc"));
        assert!(!is_valid_identifier("my-table"));
    }
}
