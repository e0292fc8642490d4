//! Path DSL tokenizer.
//!
//! Field identifiers have the shape
//! `$<root>[.<idShortPath>]#<segment>(.<segment>)*` where each segment is a
//! plain name optionally followed by `[]` (wildcard) or `[n]` (concrete
//! index). The part before `#` is split off by [`split_pattern`]; the part
//! after is tokenized with nom.

use nom::{
    bytes::complete::take_while1,
    character::complete::{char, digit1},
    combinator::opt,
    multi::separated_list1,
    sequence::delimited,
    IResult,
};

use crate::error::ResolveError;

/// Index suffix of an array segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArrayIndexToken {
    /// `[]`: matches every element, produces no binding.
    Wildcard,
    /// `[n]`: matches the element at a 0-based position.
    Concrete(i64),
}

/// One `.`-separated segment of a field path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathToken {
    Simple(String),
    Array {
        name: String,
        index: ArrayIndexToken,
    },
}

impl PathToken {
    pub fn name(&self) -> &str {
        match self {
            Self::Simple(name) => name,
            Self::Array { name, .. } => name,
        }
    }
}

/// A field pattern split at its `#` separator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SplitPattern<'a> {
    /// The root tag including the `$` (e.g. `$aasdesc`).
    pub root: &'a str,
    /// The verbatim idShortPath between root and `#`, if any. Only
    /// meaningful for `$sme`; it is not re-tokenized because it denotes a
    /// value of the `submodel_element.idshort_path` column.
    pub id_short_path: Option<&'a str>,
    /// The path after the `#`.
    pub path: &'a str,
}

/// Split a pattern into root tag, optional idShortPath, and path.
pub fn split_pattern(pattern: &str) -> Result<SplitPattern<'_>, ResolveError> {
    let (prefix, path) = pattern
        .split_once('#')
        .ok_or_else(|| ResolveError::MissingSeparator(pattern.to_string()))?;

    if path.is_empty() {
        return Err(ResolveError::EmptyPath(pattern.to_string()));
    }

    let (root, id_short_path) = match prefix.split_once('.') {
        Some((root, rest)) if !rest.is_empty() => (root, Some(rest)),
        Some((root, _)) => (root, None),
        None => (prefix, None),
    };

    if !root.starts_with('$') || root.len() < 2 {
        return Err(ResolveError::UnsupportedRoot(root.to_string()));
    }

    Ok(SplitPattern {
        root,
        id_short_path,
        path,
    })
}

fn parse_name(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_')(input)
}

fn parse_index(input: &str) -> IResult<&str, ArrayIndexToken> {
    let (rest, digits) = delimited(char('['), opt(digit1), char(']'))(input)?;
    let index = match digits {
        Some(d) => match d.parse() {
            Ok(n) => ArrayIndexToken::Concrete(n),
            Err(_) => {
                return Err(nom::Err::Error(nom::error::Error::new(
                    input,
                    nom::error::ErrorKind::Digit,
                )))
            }
        },
        None => ArrayIndexToken::Wildcard,
    };
    Ok((rest, index))
}

fn parse_segment(input: &str) -> IResult<&str, PathToken> {
    let (input, name) = parse_name(input)?;
    match parse_index(input) {
        Ok((input, index)) => Ok((
            input,
            PathToken::Array {
                name: name.to_string(),
                index,
            },
        )),
        Err(_) => Ok((input, PathToken::Simple(name.to_string()))),
    }
}

fn parse_segments(input: &str) -> IResult<&str, Vec<PathToken>> {
    separated_list1(char('.'), parse_segment)(input)
}

/// Tokenize the path part of a field pattern. `pattern` is only used for
/// error context.
pub fn tokenize(path: &str, pattern: &str) -> Result<Vec<PathToken>, ResolveError> {
    match parse_segments(path) {
        Ok(("", tokens)) => Ok(tokens),
        _ => Err(ResolveError::MalformedPath(pattern.to_string())),
    }
}
