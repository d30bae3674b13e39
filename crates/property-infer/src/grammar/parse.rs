//! Parser for the `.fan`-style grammar text format (spec §6):
//!
//! ```text
//! <name> ::= <body>            # comment to end of line
//! where <expr>                 # attaches to the rule just defined
//! ```
//!
//! `<body>` is whitespace-separated elements (quoted literals, `<nt>`
//! references, postfix `?`/`*`/`+`), alternations separated by `|`, and an
//! optional trailing `:= name(args)` semantic-generator binding. Execution
//! of `:=` snippets and `where` expressions never happens here — the
//! parser only extracts names and argument text (design note, spec §9).

use indexmap::IndexMap;
use thiserror::Error;

use super::{
    Alternation, Element, GeneratorTable, Grammar, Literal, PredicateTable, Quantifier, Rule,
    SemanticGenerator, Symbol, WherePredicate,
};

#[derive(Debug, Error)]
#[error("line {line}: {reason}")]
pub struct GrammarSyntaxError {
    pub line: usize,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum GrammarSemanticError {
    #[error("non-terminal <{0}> is referenced but never defined")]
    DanglingReference(String),
    #[error("non-terminal <{0}> has no alternation that terminates")]
    NonTerminatingCycle(String),
    #[error("grammar has no rules")]
    Empty,
    #[error("start symbol <{0}> is not defined")]
    MissingStartSymbol(String),
}

/// Parses `text` against the default built-in generator/predicate tables
/// (spec §9: Gaussian draws and length-prefix checks).
pub fn parse(text: &str) -> Result<Grammar, GrammarSyntaxError> {
    parse_with_tables(text, GeneratorTable::with_builtins(), PredicateTable::with_builtins())
}

pub fn parse_with_tables(
    text: &str,
    generators: GeneratorTable,
    predicates: PredicateTable,
) -> Result<Grammar, GrammarSyntaxError> {
    let mut rules: IndexMap<String, Rule> = IndexMap::new();
    let mut start_symbol: Option<String> = None;
    let mut last_rule: Option<String> = None;

    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = strip_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }
        if let Some(expr) = line.strip_prefix("where ") {
            let Some(name) = &last_rule else {
                return Err(err(line_no, "`where` clause with no preceding rule"));
            };
            let rule = rules.get_mut(name).expect("last_rule always tracks an inserted rule");
            let predicate = WherePredicate {
                name: "expr".to_owned(),
                raw: expr.trim().to_owned(),
            };
            for alt in &mut rule.alternations {
                alt.where_clauses.push(predicate.clone());
            }
            continue;
        }
        let rule = parse_rule_line(line, line_no)?;
        if start_symbol.is_none() {
            start_symbol = Some(rule.name.clone());
        }
        last_rule = Some(rule.name.clone());
        rules.insert(rule.name.clone(), rule);
    }

    let start_symbol = start_symbol.ok_or_else(|| err(0, "grammar defines no rules"))?;
    Ok(Grammar::new(start_symbol, rules, generators, predicates))
}

/// Parses a single alternation body in isolation (no rule name, no `::=`) —
/// used by the constraint splicer (C7) to validate an oracle-proposed
/// replacement alternation before installing it in place of a rule's
/// existing alternations.
pub fn parse_alternation_text(text: &str) -> Result<Alternation, GrammarSyntaxError> {
    parse_alternation(text.trim(), 0)
}

fn err(line: usize, reason: impl Into<String>) -> GrammarSyntaxError {
    GrammarSyntaxError {
        line,
        reason: reason.into(),
    }
}

/// Strips a `#` comment, ignoring `#` characters that occur inside a quoted
/// literal.
fn strip_comment(line: &str) -> &str {
    let mut in_quotes = false;
    let mut escaped = false;
    for (byte_idx, ch) in line.char_indices() {
        match ch {
            '\\' if in_quotes && !escaped => escaped = true,
            '"' if !escaped => in_quotes = !in_quotes,
            '#' if !in_quotes => return &line[..byte_idx],
            _ => escaped = false,
        }
    }
    line
}

fn parse_rule_line(line: &str, line_no: usize) -> Result<Rule, GrammarSyntaxError> {
    let (head, body) = line
        .split_once("::=")
        .ok_or_else(|| err(line_no, "expected `<name> ::= <body>`"))?;
    let name = parse_nonterminal_name(head.trim())
        .ok_or_else(|| err(line_no, format!("invalid rule name `{}`", head.trim())))?;

    let (body, semantic_generator) = split_semantic_generator(body, line_no)?;
    let alternations = if semantic_generator.is_some() && body.trim().is_empty() {
        vec![Alternation::new(Vec::new(), Vec::new())]
    } else {
        body.split('|')
            .map(|alt| parse_alternation(alt.trim(), line_no))
            .collect::<Result<Vec<_>, _>>()?
    };

    Ok(Rule {
        name,
        alternations,
        semantic_generator,
    })
}

fn parse_nonterminal_name(token: &str) -> Option<String> {
    token.strip_prefix('<')?.strip_suffix('>').map(str::to_owned)
}

fn split_semantic_generator(
    body: &str,
    line_no: usize,
) -> Result<(&str, Option<SemanticGenerator>), GrammarSyntaxError> {
    let Some(pos) = find_top_level(body, ":=") else {
        return Ok((body, None));
    };
    let (before, after) = (&body[..pos], body[pos + 2..].trim());
    let (name, args) = after
        .split_once('(')
        .and_then(|(n, rest)| rest.strip_suffix(')').map(|args| (n.trim(), args.trim())))
        .ok_or_else(|| err(line_no, format!("expected `name(args)` after `:=`, got `{after}`")))?;
    Ok((
        before,
        Some(SemanticGenerator {
            name: name.to_owned(),
            args: args.to_owned(),
        }),
    ))
}

/// Finds the first occurrence of `needle` outside of a quoted literal.
fn find_top_level(haystack: &str, needle: &str) -> Option<usize> {
    let mut in_quotes = false;
    let mut escaped = false;
    let bytes = haystack.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let ch = bytes[i] as char;
        if in_quotes {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_quotes = false;
            }
        } else if ch == '"' {
            in_quotes = true;
        } else if haystack[i..].starts_with(needle) {
            return Some(i);
        }
        i += 1;
    }
    None
}

fn parse_alternation(text: &str, line_no: usize) -> Result<Alternation, GrammarSyntaxError> {
    let elements = tokenize(text, line_no)?
        .into_iter()
        .map(|tok| parse_element(&tok, line_no))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Alternation::new(elements, Vec::new()))
}

/// Splits an alternation body into whitespace-separated tokens, keeping
/// quoted literals (which may themselves contain whitespace) intact.
fn tokenize(text: &str, line_no: usize) -> Result<Vec<String>, GrammarSyntaxError> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(&ch) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
            continue;
        }
        let mut token = String::new();
        if ch == '"' {
            token.push(chars.next().expect("peeked"));
            let mut escaped = false;
            loop {
                match chars.next() {
                    None => return Err(err(line_no, "unterminated quoted literal")),
                    Some('\\') if !escaped => {
                        token.push('\\');
                        escaped = true;
                    }
                    Some(c) if escaped => {
                        token.push(c);
                        escaped = false;
                    }
                    Some('"') => {
                        token.push('"');
                        break;
                    }
                    Some(c) => token.push(c),
                }
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                token.push(c);
                chars.next();
            }
        }
        // Postfix quantifier immediately following the token, if any.
        if let Some(&q) = chars.peek()
            && matches!(q, '?' | '*' | '+')
        {
            token.push(q);
            chars.next();
        }
        tokens.push(token);
    }
    if tokens.is_empty() && !text.is_empty() {
        return Err(err(line_no, "empty alternation body"));
    }
    Ok(tokens)
}

fn parse_element(token: &str, line_no: usize) -> Result<Element, GrammarSyntaxError> {
    let (body, quantifier) = match token.chars().last() {
        Some('?') => (&token[..token.len() - 1], Quantifier::Optional),
        Some('*') => (&token[..token.len() - 1], Quantifier::ZeroOrMore),
        Some('+') => (&token[..token.len() - 1], Quantifier::OneOrMore),
        _ => (token, Quantifier::One),
    };
    let symbol = if let Some(name) = parse_nonterminal_name(body) {
        Symbol::NonTerminal(name)
    } else if let Some(literal) = body.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        Symbol::Terminal(Literal(unescape(literal)))
    } else {
        return Err(err(line_no, format!("invalid grammar element `{token}`")));
    };
    Ok(Element { symbol, quantifier })
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_alternation_grammar() {
        let text = r#"
            # a trivial grammar
            <start> ::= <digit> "," <digit>
            <digit> ::= "0" | "1" | "2"
        "#;
        let grammar = parse(text).expect("should parse");
        assert_eq!(grammar.start_symbol(), "start");
        assert_eq!(grammar.rule("digit").unwrap().alternations.len(), 3);
        grammar.validate().expect("should validate");
    }

    #[test]
    fn parses_semantic_generator_and_where_clause() {
        let text = r#"
            <packet> ::= <length> <content>
            where length == uint16(len(content))
            <length> ::= := int_range(0, 65535)
            <content> ::= "a" | "ab" | "abc"
        "#;
        let grammar = parse(text).expect("should parse");
        let packet = grammar.rule("packet").unwrap();
        assert_eq!(packet.alternations[0].where_clauses.len(), 1);
        let length = grammar.rule("length").unwrap();
        assert_eq!(length.semantic_generator.as_ref().unwrap().name, "int_range");
    }

    #[test]
    fn rejects_dangling_reference() {
        let text = "<start> ::= <missing>\n";
        let grammar = parse(text).unwrap();
        assert!(matches!(
            grammar.validate(),
            Err(GrammarSemanticError::DanglingReference(ref n)) if n == "missing"
        ));
    }

    #[test]
    fn rejects_non_terminating_cycle() {
        let text = "<a> ::= <b>\n<b> ::= <a>\n";
        let grammar = parse(text).unwrap();
        assert!(matches!(
            grammar.validate(),
            Err(GrammarSemanticError::NonTerminatingCycle(_))
        ));
    }

    #[test]
    fn quoted_literal_escapes() {
        let text = r#"<start> ::= "line\nbreak" "quote\"" "#;
        let grammar = parse(text).unwrap();
        let rule = grammar.rule("start").unwrap();
        let elements = &rule.alternations[0].elements;
        assert_eq!(elements.len(), 2);
    }
}
