use std::cmp::Ordering;
use std::fmt;

use super::ParseError;

/// A leaf numeric/boolean/string value. `Float` uses `total_cmp` for
/// ordering so a `Scalar` is usable as a map key or sort key even with NaN
/// payloads (which generators never produce, but comparators shouldn't
/// panic if they ever did). `Str` is the spec's final fallback shape (spec
/// §4.3: "integer, then float, then boolean, then string-fallback") and is
/// how non-numeric content (e.g. the `binary2.fan` packet payload) reaches
/// a FUT.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(n) => write!(f, "{n}"),
            Scalar::Float(x) => write!(f, "{x}"),
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Str(s) => write!(f, "{s}"),
        }
    }
}

impl Eq for Scalar {}

impl PartialOrd for Scalar {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scalar {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Scalar::Str(a), Scalar::Str(b)) => a.cmp(b),
            // A string never numerically compares with anything, including
            // another string's fallback form; order it after every numeric
            // value deterministically rather than panicking or comparing by
            // accident.
            (Scalar::Str(_), _) => Ordering::Greater,
            (_, Scalar::Str(_)) => Ordering::Less,
            (Scalar::Int(a), Scalar::Int(b)) => a.cmp(b),
            (Scalar::Float(a), Scalar::Float(b)) => a.total_cmp(b),
            (Scalar::Bool(a), Scalar::Bool(b)) => a.cmp(b),
            (Scalar::Int(a), Scalar::Float(b)) => (*a as f64).total_cmp(b),
            (Scalar::Float(a), Scalar::Int(b)) => a.total_cmp(&(*b as f64)),
            (Scalar::Bool(a), _) => (*a as i64 as f64).total_cmp(&other.as_f64()),
            (_, Scalar::Bool(b)) => self.as_f64().total_cmp(&(*b as i64 as f64)),
        }
    }
}

impl Scalar {
    fn as_f64(&self) -> f64 {
        match self {
            Scalar::Int(n) => *n as f64,
            Scalar::Float(x) => *x,
            Scalar::Bool(b) => *b as i64 as f64,
            Scalar::Str(_) => f64::NAN,
        }
    }
}

pub fn parse(token: &str) -> Result<Scalar, ParseError> {
    if token.is_empty() {
        return Err(ParseError::EmptyScalar);
    }
    match token {
        "true" => return Ok(Scalar::Bool(true)),
        "false" => return Ok(Scalar::Bool(false)),
        _ => {}
    }
    if let Ok(n) = token.parse::<i64>() {
        return Ok(Scalar::Int(n));
    }
    if let Ok(x) = token.parse::<f64>() {
        return Ok(Scalar::Float(x));
    }
    Ok(Scalar::Str(token.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_integers_floats_and_bools() {
        assert_eq!(parse("42").unwrap(), Scalar::Int(42));
        assert_eq!(parse("-7").unwrap(), Scalar::Int(-7));
        assert_eq!(parse("3.5").unwrap(), Scalar::Float(3.5));
        assert_eq!(parse("true").unwrap(), Scalar::Bool(true));
    }

    #[test]
    fn falls_back_to_string_for_non_numeric_non_bool_tokens() {
        assert_eq!(parse("abc").unwrap(), Scalar::Str("abc".to_owned()));
    }

    #[test]
    fn rejects_only_the_empty_token() {
        assert!(parse("").is_err());
    }

    #[test]
    fn ordering_treats_nan_safely() {
        let a = Scalar::Float(f64::NAN);
        let b = Scalar::Float(1.0);
        // Must not panic; total_cmp gives a consistent (if arbitrary) order.
        let _ = a.cmp(&b);
    }
}
