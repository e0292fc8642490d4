//! Regex-constrained string types of the rule grammar.
//!
//! Each type rejects non-matching input at decode time, quoting the
//! expected pattern in the error.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DecodeError;

const MODEL_STRING_PATTERN: &str = r"^\$(aas|sm|sme|cd|aasdesc|smdesc|bd)(\.[a-zA-Z_][a-zA-Z0-9_]*(\[[0-9]+\])?(\.[a-zA-Z_][a-zA-Z0-9_]*(\[[0-9]+\])?)*)?#([a-zA-Z_][a-zA-Z0-9_]*(\[[0-9]*\])?\.)*[a-zA-Z_][a-zA-Z0-9_]*$";

const FRAGMENT_STRING_PATTERN: &str = r"^\$(aas|sm|sme|cd|aasdesc|smdesc|bd)(\.[a-zA-Z_][a-zA-Z0-9_]*(\[[0-9]+\])?(\.[a-zA-Z_][a-zA-Z0-9_]*(\[[0-9]+\])?)*)?#([a-zA-Z_][a-zA-Z0-9_]*(\[[0-9]*\])?\.)*[a-zA-Z_][a-zA-Z0-9_]*\[[0-9]*\]$";

const HEX_LITERAL_PATTERN: &str = r"^0[xX][0-9A-Fa-f]+$";

const STANDARD_STRING_PATTERN: &str = r"^[^\x00-\x08\x0B\x0C\x0E-\x1F]*$";

lazy_static! {
    static ref MODEL_STRING_RE: Regex = Regex::new(MODEL_STRING_PATTERN).unwrap();
    static ref FRAGMENT_STRING_RE: Regex = Regex::new(FRAGMENT_STRING_PATTERN).unwrap();
    static ref HEX_LITERAL_RE: Regex = Regex::new(HEX_LITERAL_PATTERN).unwrap();
    static ref STANDARD_STRING_RE: Regex = Regex::new(STANDARD_STRING_PATTERN).unwrap();
}

macro_rules! pattern_string {
    ($(#[$doc:meta])* $name:ident, $re:ident, $pattern:ident) => {
        $(#[$doc])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String")]
        pub struct $name(String);

        impl $name {
            /// Validate and wrap a string.
            pub fn new(value: impl Into<String>) -> Result<Self, DecodeError> {
                let value = value.into();
                if $re.is_match(&value) {
                    Ok(Self(value))
                } else {
                    Err(DecodeError::PatternMismatch {
                        value,
                        pattern: $pattern,
                    })
                }
            }

            /// The validated string.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// The regex this type validates against.
            pub fn pattern() -> &'static str {
                $pattern
            }
        }

        impl TryFrom<String> for $name {
            type Error = DecodeError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

pattern_string!(
    /// A scalar field identifier: `$<root>[.idShortPath]#<path>` ending in
    /// a plain (non-array) segment.
    ModelStringPattern,
    MODEL_STRING_RE,
    MODEL_STRING_PATTERN
);

pattern_string!(
    /// A fragment identifier: same prefix as [`ModelStringPattern`] but the
    /// path ends in an array segment (`[]` or `[n]`).
    FragmentStringPattern,
    FRAGMENT_STRING_RE,
    FRAGMENT_STRING_PATTERN
);

pattern_string!(
    /// A hexadecimal literal (`0x...`), compared as text.
    HexLiteralPattern,
    HEX_LITERAL_RE,
    HEX_LITERAL_PATTERN
);

pattern_string!(
    /// A plain text value with control characters rejected.
    StandardString,
    STANDARD_STRING_RE,
    STANDARD_STRING_PATTERN
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_string_accepts_scalars() {
        for ok in [
            "$sm#idShort",
            "$sm#semanticId.keys[0].value",
            "$aasdesc#specificAssetIds[0].externalSubjectId.keys[1].value",
            "$aasdesc#specificAssetIds[].value",
            "$sme.Nameplate.Address#value",
            "$sme.Sensors[2].Reading#idShort",
            "$bd#assetLinks[0].name",
        ] {
            assert!(ModelStringPattern::new(ok).is_ok(), "rejected {ok}");
        }
    }

    #[test]
    fn test_model_string_rejects_fragments_and_junk() {
        for bad in [
            "$sm#endpoints[0]",
            "$sm#",
            "sm#idShort",
            "$unknown#idShort",
            "$sm.idShort",
            "$sm#idShort.",
        ] {
            assert!(ModelStringPattern::new(bad).is_err(), "accepted {bad}");
        }
    }

    #[test]
    fn test_fragment_string_shape() {
        assert!(FragmentStringPattern::new("$aasdesc#endpoints[2]").is_ok());
        assert!(FragmentStringPattern::new("$aasdesc#endpoints[]").is_ok());
        assert!(FragmentStringPattern::new("$aasdesc#idShort").is_err());
    }

    #[test]
    fn test_hex_literal() {
        assert!(HexLiteralPattern::new("0xDEADbeef").is_ok());
        assert!(HexLiteralPattern::new("0x").is_err());
        assert!(HexLiteralPattern::new("DEAD").is_err());
    }

    #[test]
    fn test_error_quotes_pattern() {
        let err = ModelStringPattern::new("junk").unwrap_err();
        assert!(err.to_string().contains(MODEL_STRING_PATTERN));
    }

    #[test]
    fn test_decode_through_serde() {
        let ok: ModelStringPattern = serde_json::from_str("\"$sm#idShort\"").unwrap();
        assert_eq!(ok.as_str(), "$sm#idShort");

        let err = serde_json::from_str::<ModelStringPattern>("\"$sm#\"");
        assert!(err.is_err());
    }
}
