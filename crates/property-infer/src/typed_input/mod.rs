//! Typed input parsing (C3): turns a generated string into a shaped value a
//! function-under-test argument converter can consume, without involving
//! the grammar that produced it (spec §4.3 — parsing is a pure function of
//! the string and a [`ParserMode`]).

mod scalar;

use std::cmp::Ordering;
use std::fmt;

use indexmap::IndexSet;
use itertools::Itertools;
use thiserror::Error;

pub use scalar::Scalar;

/// A shaped value recovered from a generated string.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedInput {
    Scalar(Scalar),
    List(Vec<TypedInput>),
    /// Parsed from `{...}`; duplicate elements are folded per set semantics.
    Set(Vec<TypedInput>),
    Tuple(Vec<TypedInput>),
}

impl Eq for TypedInput {}

impl PartialOrd for TypedInput {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Scalars order by [`Scalar`]'s total order; collections order by their
/// rendered form. Used to give `{...}` sets the "stable min-first ordering"
/// spec §4.3 requires after dedup.
impl Ord for TypedInput {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (TypedInput::Scalar(a), TypedInput::Scalar(b)) => a.cmp(b),
            _ => self.to_string().cmp(&other.to_string()),
        }
    }
}

impl TypedInput {
    /// Renders this value as the `serde_json::Value` a FUT call would
    /// return for the identical payload — lets a property template feed a
    /// FUT's numeric/boolean result back in as an argument to a second FUT
    /// call (e.g. homomorphism and distributivity templates composing two
    /// calls), without the FUT itself knowing about `TypedInput`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            TypedInput::Scalar(Scalar::Int(n)) => serde_json::json!(n),
            TypedInput::Scalar(Scalar::Float(x)) => serde_json::json!(x),
            TypedInput::Scalar(Scalar::Bool(b)) => serde_json::json!(b),
            TypedInput::Scalar(Scalar::Str(s)) => serde_json::json!(s),
            TypedInput::List(items) | TypedInput::Set(items) => {
                serde_json::Value::Array(items.iter().map(TypedInput::to_json).collect())
            }
            TypedInput::Tuple(items) => {
                serde_json::Value::Array(items.iter().map(TypedInput::to_json).collect())
            }
        }
    }

    /// The inverse of [`TypedInput::to_json`] for the scalar case only —
    /// used directly where a call's result is known to be a scalar.
    pub fn from_json_scalar(value: &serde_json::Value) -> Option<TypedInput> {
        if let Some(b) = value.as_bool() {
            return Some(TypedInput::Scalar(Scalar::Bool(b)));
        }
        if let Some(n) = value.as_i64() {
            return Some(TypedInput::Scalar(Scalar::Int(n)));
        }
        if let Some(x) = value.as_f64() {
            return Some(TypedInput::Scalar(Scalar::Float(x)));
        }
        if let Some(s) = value.as_str() {
            return Some(TypedInput::Scalar(Scalar::Str(s.to_owned())));
        }
        None
    }

    /// The general inverse of [`TypedInput::to_json`]: a JSON array
    /// reconstructs as a [`TypedInput::List`] (element-wise, recursively),
    /// everything else falls back to [`TypedInput::from_json_scalar`]. Lets
    /// a collection-valued FUT result (e.g. `union`'s merged list) be fed
    /// back in as another call's argument — spec §4.5's derived calls
    /// (associativity, idempotence, homomorphism) aren't restricted to
    /// scalar-returning FUTs.
    pub fn from_json(value: &serde_json::Value) -> Option<TypedInput> {
        if let Some(items) = value.as_array() {
            return items.iter().map(TypedInput::from_json).collect::<Option<Vec<_>>>().map(TypedInput::List);
        }
        TypedInput::from_json_scalar(value)
    }
}

impl fmt::Display for TypedInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedInput::Scalar(s) => write!(f, "{s}"),
            TypedInput::List(items) => write!(f, "[{}]", items.iter().format(", ")),
            TypedInput::Set(items) => write!(f, "{{{}}}", items.iter().format(", ")),
            TypedInput::Tuple(items) => write!(f, "({})", items.iter().format(", ")),
        }
    }
}

/// Controls how an unbracketed top-level string is shaped. Bracketed shapes
/// (`[..]`, `{..}`, `(..)`) are always recognized regardless of mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParserMode {
    /// Whitespace/comma-separated scalars become a flat list (the default
    /// mode every canonical grammar's FUT expects).
    #[default]
    Numbers,
    /// The entire string is a single scalar; no splitting.
    SingleScalar,
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unbalanced bracket in `{0}`")]
    UnbalancedBracket(String),
    #[error("empty input cannot be parsed as a scalar")]
    EmptyScalar,
    #[error("`{0}` is not a recognized scalar (expected an integer, float, or bool)")]
    NotAScalar(String),
}

/// Parses `text` into a [`TypedInput`] under `mode`.
pub fn parse(text: &str, mode: ParserMode) -> Result<TypedInput, ParseError> {
    let trimmed = text.trim();
    if let Some(inner) = strip_matching(trimmed, '[', ']') {
        return Ok(TypedInput::List(parse_elements(inner)?));
    }
    if let Some(inner) = strip_matching(trimmed, '{', '}') {
        let mut items = parse_elements(inner)?;
        dedup_set(&mut items);
        return Ok(TypedInput::Set(items));
    }
    if let Some(inner) = strip_matching(trimmed, '(', ')') {
        return Ok(TypedInput::Tuple(parse_elements(inner)?));
    }
    match mode {
        ParserMode::SingleScalar => Ok(TypedInput::Scalar(scalar::parse(trimmed)?)),
        ParserMode::Numbers => {
            let tokens = split_top_level(trimmed, ',')
                .into_iter()
                .flat_map(|chunk| split_top_level(chunk.trim(), ' '))
                .map(|t| t.trim())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>();
            if tokens.len() == 1 {
                Ok(TypedInput::Scalar(scalar::parse(tokens[0])?))
            } else {
                let scalars = tokens
                    .into_iter()
                    .map(|t| scalar::parse(t).map(TypedInput::Scalar))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(TypedInput::List(scalars))
            }
        }
    }
}

fn strip_matching(text: &str, open: char, close: char) -> Option<&str> {
    let inner = text.strip_prefix(open)?.strip_suffix(close)?;
    Some(inner)
}

fn parse_elements(inner: &str) -> Result<Vec<TypedInput>, ParseError> {
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    split_top_level(inner, ',')
        .into_iter()
        .map(|chunk| parse(chunk.trim(), ParserMode::Numbers))
        .collect()
}

/// Splits `text` on `sep` while tracking bracket nesting depth, so a nested
/// `[1, 2]` inside a list-of-lists isn't split on its inner comma.
fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    for (idx, ch) in text.char_indices() {
        match ch {
            '[' | '{' | '(' => depth += 1,
            ']' | '}' | ')' => depth -= 1,
            c if c == sep && depth == 0 => {
                parts.push(&text[start..idx]);
                start = idx + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Removes duplicates by value-equality and sorts min-first (spec §4.3:
/// "duplicate removal by value-equality, stable min-first ordering for
/// determinism") so two sets built from the same elements in different
/// generation order compare equal once serialized.
fn dedup_set(items: &mut Vec<TypedInput>) {
    let mut seen: IndexSet<String> = IndexSet::new();
    items.retain(|item| seen.insert(item.to_string()));
    items.sort();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_number_parses_as_scalar() {
        assert_eq!(parse("42", ParserMode::Numbers).unwrap(), TypedInput::Scalar(Scalar::Int(42)));
    }

    #[test]
    fn comma_separated_numbers_parse_as_list() {
        let parsed = parse("1, 2, 3", ParserMode::Numbers).unwrap();
        assert_eq!(
            parsed,
            TypedInput::List(vec![
                TypedInput::Scalar(Scalar::Int(1)),
                TypedInput::Scalar(Scalar::Int(2)),
                TypedInput::Scalar(Scalar::Int(3)),
            ])
        );
    }

    #[test]
    fn bracketed_list_is_recognized_regardless_of_mode() {
        let parsed = parse("[1, 2, 2, 3]", ParserMode::Numbers).unwrap();
        assert_eq!(parsed, TypedInput::List(vec![
            TypedInput::Scalar(Scalar::Int(1)),
            TypedInput::Scalar(Scalar::Int(2)),
            TypedInput::Scalar(Scalar::Int(2)),
            TypedInput::Scalar(Scalar::Int(3)),
        ]));
    }

    #[test]
    fn braced_set_deduplicates_elements() {
        let parsed = parse("{1, 2, 2, 3}", ParserMode::Numbers).unwrap();
        assert_eq!(parsed, TypedInput::Set(vec![
            TypedInput::Scalar(Scalar::Int(1)),
            TypedInput::Scalar(Scalar::Int(2)),
            TypedInput::Scalar(Scalar::Int(3)),
        ]));
    }

    #[test]
    fn braced_set_is_ordered_min_first_regardless_of_input_order() {
        let parsed = parse("{3, 1, 2, 1}", ParserMode::Numbers).unwrap();
        assert_eq!(parsed, TypedInput::Set(vec![
            TypedInput::Scalar(Scalar::Int(1)),
            TypedInput::Scalar(Scalar::Int(2)),
            TypedInput::Scalar(Scalar::Int(3)),
        ]));
    }

    #[test]
    fn json_roundtrip_for_scalars() {
        let scalar = TypedInput::Scalar(Scalar::Int(-5));
        let json = scalar.to_json();
        assert_eq!(TypedInput::from_json_scalar(&json), Some(scalar));
    }

    #[test]
    fn from_json_reconstructs_a_list_from_a_json_array() {
        let list = TypedInput::List(vec![TypedInput::Scalar(Scalar::Int(1)), TypedInput::Scalar(Scalar::Int(2))]);
        let json = list.to_json();
        assert_eq!(TypedInput::from_json(&json), Some(list));
    }

    #[test]
    fn nested_tuple_of_lists() {
        let parsed = parse("([1, 2], [3])", ParserMode::Numbers).unwrap();
        assert_eq!(parsed, TypedInput::Tuple(vec![
            TypedInput::List(vec![TypedInput::Scalar(Scalar::Int(1)), TypedInput::Scalar(Scalar::Int(2))]),
            TypedInput::List(vec![TypedInput::Scalar(Scalar::Int(3))]),
        ]));
    }
}
