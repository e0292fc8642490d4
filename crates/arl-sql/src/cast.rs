//! Guarded SQL casts.
//!
//! A cast inside a generated predicate must never abort query evaluation:
//! an uncastable row yields NULL and therefore fails to match. Every cast
//! except text is wrapped in a `CASE WHEN <guard> THEN <cast> END` where
//! the guard is a regex (or value-set) test on the textual form.

use crate::builder::SqlFragment;

/// Target type of a guarded SQL cast.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SqlCastType {
    /// `::text`; always safe, no guard.
    Text,
    /// Hex literals travel as text.
    Hex,
    /// `::double precision`, guarded by a numeric-shape regex.
    Numeric,
    /// `::boolean`, guarded by the accepted boolean spellings.
    Boolean,
    /// `::time`, guarded by an `HH:MM[:SS]` regex.
    Time,
    /// `::timestamptz`, guarded by an ISO-8601 date prefix regex.
    Timestamp,
}

impl SqlCastType {
    /// PostgreSQL type name this cast targets.
    pub fn pg_type(&self) -> &'static str {
        match self {
            Self::Text | Self::Hex => "text",
            Self::Numeric => "double precision",
            Self::Boolean => "boolean",
            Self::Time => "time",
            Self::Timestamp => "timestamptz",
        }
    }
}

/// Wrap `operand` in a cast to `to` that yields NULL instead of erroring.
///
/// The operand fragment is duplicated into both the guard and the cast
/// position; parameter renumbering in [`SqlFragment::append`] keeps the
/// prepared form consistent.
pub fn safe_cast(operand: SqlFragment, to: SqlCastType) -> SqlFragment {
    match to {
        SqlCastType::Text | SqlCastType::Hex => {
            let mut frag = operand;
            frag.push("::text");
            frag
        }
        SqlCastType::Timestamp => guarded(
            operand,
            "::text ~ '^[0-9]{4}-[0-9]{2}-[0-9]{2}T'",
            "timestamptz",
        ),
        SqlCastType::Time => guarded(
            operand,
            "::text ~ '^[0-9]{2}:[0-9]{2}(:[0-9]{2})?$'",
            "time",
        ),
        SqlCastType::Numeric => guarded(
            operand,
            r"::text ~ '^\s*-?[0-9]+(\.[0-9]+)?\s*$'",
            "double precision",
        ),
        SqlCastType::Boolean => {
            let mut frag = SqlFragment::raw("CASE WHEN lower(");
            frag.append(operand.clone());
            frag.push("::text) IN ('true','false','1','0','yes','no') THEN (");
            frag.append(operand);
            frag.push("::boolean) END");
            frag
        }
    }
}

fn guarded(operand: SqlFragment, guard_suffix: &str, pg_type: &str) -> SqlFragment {
    let mut frag = SqlFragment::raw("CASE WHEN ");
    frag.append(operand.clone());
    frag.push(guard_suffix);
    frag.push(" THEN (");
    frag.append(operand);
    frag.push("::");
    frag.push(pg_type);
    frag.push(") END");
    frag
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_cast_is_direct() {
        let frag = safe_cast(SqlFragment::raw("submodel.id_short"), SqlCastType::Text);
        assert_eq!(frag.sql(), "submodel.id_short::text");
    }

    #[test]
    fn test_numeric_cast_is_guarded() {
        let frag = safe_cast(SqlFragment::raw("property_element.value_text"), SqlCastType::Numeric);
        assert!(frag.sql().starts_with("CASE WHEN "));
        assert!(frag.sql().contains("~ '^"));
        assert!(frag.sql().contains("::double precision) END"));
    }

    #[test]
    fn test_timestamp_cast_guard_shape() {
        let frag = safe_cast(SqlFragment::raw("c"), SqlCastType::Timestamp);
        assert_eq!(
            frag.sql(),
            "CASE WHEN c::text ~ '^[0-9]{4}-[0-9]{2}-[0-9]{2}T' THEN (c::timestamptz) END"
        );
    }

    #[test]
    fn test_boolean_cast_value_set() {
        let frag = safe_cast(SqlFragment::raw("c"), SqlCastType::Boolean);
        assert_eq!(
            frag.sql(),
            "CASE WHEN lower(c::text) IN ('true','false','1','0','yes','no') THEN (c::boolean) END"
        );
    }

    #[test]
    fn test_param_operand_renumbers() {
        let frag = safe_cast(SqlFragment::param("12:30"), SqlCastType::Time);
        assert_eq!(frag.params().len(), 2);
        assert!(frag.sql().contains("$1"));
        assert!(frag.sql().contains("$2"));
    }
}
