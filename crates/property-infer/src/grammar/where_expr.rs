//! The built-in `expr` predicate: a tiny comparison language evaluated over
//! the rendered string form of the siblings in one alternation. Covers the
//! canonical grammars' two uses from spec §4.1/§8: relational comparisons
//! between scalar siblings (`b != 0`) and length-prefix checks
//! (`length == uint16(len(content))`).
//!
//! Grammar: `expr := term (cmp term)` where `cmp` is one of `== != < <= > >=`
//! and `term` is an integer literal, a bare identifier (a sibling
//! non-terminal name, resolved to its rendered value), or a call
//! `ident(term)` — only `len` and `uint16` are recognized calls.

use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cmp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Evaluates `raw` against `siblings` (non-terminal name -> rendered
/// string). Returns `false` on any parse or type error: a malformed
/// constraint narrows the language to nothing, matching the "reject
/// silently" posture the splicer (C7) needs for invalid constraints.
pub fn eval(raw: &str, siblings: &IndexMap<String, String>) -> bool {
    try_eval(raw, siblings).unwrap_or(false)
}

fn try_eval(raw: &str, siblings: &IndexMap<String, String>) -> Option<bool> {
    let (cmp, lhs, rhs) = split_comparison(raw)?;
    let lhs = eval_term(lhs.trim(), siblings)?;
    let rhs = eval_term(rhs.trim(), siblings)?;
    Some(match cmp {
        Cmp::Eq => lhs == rhs,
        Cmp::Ne => lhs != rhs,
        Cmp::Lt => lhs < rhs,
        Cmp::Le => lhs <= rhs,
        Cmp::Gt => lhs > rhs,
        Cmp::Ge => lhs >= rhs,
    })
}

fn split_comparison(raw: &str) -> Option<(Cmp, &str, &str)> {
    const OPS: [(&str, Cmp); 6] = [
        ("==", Cmp::Eq),
        ("!=", Cmp::Ne),
        ("<=", Cmp::Le),
        (">=", Cmp::Ge),
        ("<", Cmp::Lt),
        (">", Cmp::Gt),
    ];
    for (token, cmp) in OPS {
        if let Some(pos) = raw.find(token) {
            return Some((cmp, &raw[..pos], &raw[pos + token.len()..]));
        }
    }
    None
}

/// Evaluates a single term: a call, an identifier, or an integer literal.
fn eval_term(term: &str, siblings: &IndexMap<String, String>) -> Option<i64> {
    if let Some(inner) = term.strip_prefix("len(").and_then(|s| s.strip_suffix(')')) {
        let value = resolve_ident(inner.trim(), siblings)?;
        return Some(value.len() as i64);
    }
    if let Some(inner) = term.strip_prefix("uint16(").and_then(|s| s.strip_suffix(')')) {
        let value = eval_term(inner.trim(), siblings)?;
        return Some(value.rem_euclid(1 << 16));
    }
    if let Ok(n) = term.parse::<i64>() {
        return Some(n);
    }
    resolve_ident(term, siblings)?.parse::<i64>().ok()
}

fn resolve_ident<'a>(name: &str, siblings: &'a IndexMap<String, String>) -> Option<&'a str> {
    siblings.get(name).map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn siblings(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn scalar_inequality() {
        let s = siblings(&[("b", "0")]);
        assert!(!eval("b != 0", &s));
        let s = siblings(&[("b", "5")]);
        assert!(eval("b != 0", &s));
    }

    #[test]
    fn length_prefix_check() {
        let s = siblings(&[("length", "3"), ("content", "abc")]);
        assert!(eval("length == uint16(len(content))", &s));
        let s = siblings(&[("length", "4"), ("content", "abc")]);
        assert!(!eval("length == uint16(len(content))", &s));
    }

    #[test]
    fn malformed_expression_rejects_rather_than_holds() {
        let s = siblings(&[("a", "1")]);
        assert!(!eval("a ~~ 1", &s));
        assert!(!eval("unknown_ident == 1", &s));
    }
}
