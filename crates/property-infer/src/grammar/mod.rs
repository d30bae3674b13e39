//! Grammar AST (C1): production rules, terminals, non-terminal references,
//! repetition/alternation, semantic-value hooks and `where` constraints.
//!
//! The `.fan`-style textual surface is parsed by [`parse`]; execution of
//! semantic generators and `where` predicates is deferred to generation
//! time (C2) through a [`GeneratorTable`]/[`PredicateTable`] supplied at
//! load time, per the language-neutral model in the design notes: a
//! grammar never executes a host-language snippet while parsing.

mod parse;
mod tables;
pub mod where_expr;

use std::fmt::{self, Display, Formatter};

use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;

pub use parse::{GrammarSemanticError, GrammarSyntaxError, parse_alternation_text};
pub use tables::{GeneratedValue, GeneratorTable, PredicateTable};

/// A terminal symbol: always a literal string in the `.fan` surface syntax.
#[derive(Debug, Clone, Hash, PartialEq, Eq, derive_more::Display)]
#[display("\"{}\"", _0.escape_default())]
pub struct Literal(pub String);

/// A single grammar element: a terminal or non-terminal reference, with an
/// optional postfix repetition modifier.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum Symbol {
    Terminal(Literal),
    NonTerminal(String),
}

impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Terminal(lit) => write!(f, "{lit}"),
            Symbol::NonTerminal(name) => write!(f, "<{name}>"),
        }
    }
}

/// Postfix quantifier attached to an [`Element`]: `?`, `*`, `+`, or none.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum Quantifier {
    One,
    Optional,
    ZeroOrMore,
    OneOrMore,
}

impl Display for Quantifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            Quantifier::One => "",
            Quantifier::Optional => "?",
            Quantifier::ZeroOrMore => "*",
            Quantifier::OneOrMore => "+",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct Element {
    pub symbol: Symbol,
    pub quantifier: Quantifier,
}

impl Display for Element {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.symbol, self.quantifier)
    }
}

/// A named reference to a `where`-predicate registered in a [`PredicateTable`],
/// together with the raw textual expression it was parsed from (kept for
/// witness rendering and for C7's splicing history).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WherePredicate {
    pub name: String,
    pub raw: String,
}

/// One alternation (right-hand side) of a production rule: a concatenation
/// of elements plus the `where` clauses that constrain it.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Constructor)]
pub struct Alternation {
    pub elements: Vec<Element>,
    pub where_clauses: Vec<WherePredicate>,
}

impl Display for Alternation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.elements.is_empty() {
            write!(f, "ε")
        } else {
            write!(f, "{}", self.elements.iter().format(" "))
        }
    }
}

/// A named semantic-value generator binding: `<nt> ::= ... := name(args)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemanticGenerator {
    pub name: String,
    pub args: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub name: String,
    pub alternations: Vec<Alternation>,
    pub semantic_generator: Option<SemanticGenerator>,
}

/// An ordered mapping from non-terminal names to their alternation lists,
/// plus the tables resolving semantic generators and `where` predicates by
/// name. Immutable after [`validate`](Grammar::validate) except through the
/// C7 splicer, which always produces a new `Grammar` value.
#[derive(Debug, Clone)]
pub struct Grammar {
    start_symbol: String,
    rules: IndexMap<String, Rule>,
    generators: GeneratorTable,
    predicates: PredicateTable,
    /// Bumped by the C7 splicer; used to key the per-version input cache.
    version: u64,
}

impl Display for Grammar {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "Start symbol: <{}>", self.start_symbol)?;
        for rule in self.rules.values() {
            writeln!(f, "<{}> ::= {}", rule.name, rule.alternations.iter().format(" | "))?;
            for alt in &rule.alternations {
                for w in &alt.where_clauses {
                    writeln!(f, "  where {}", w.raw)?;
                }
            }
        }
        Ok(())
    }
}

impl Grammar {
    pub fn new(
        start_symbol: String,
        rules: IndexMap<String, Rule>,
        generators: GeneratorTable,
        predicates: PredicateTable,
    ) -> Self {
        Self {
            start_symbol,
            rules,
            generators,
            predicates,
            version: 0,
        }
    }

    pub fn start_symbol(&self) -> &str {
        &self.start_symbol
    }

    pub fn rules(&self) -> &IndexMap<String, Rule> {
        &self.rules
    }

    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.rules.get(name)
    }

    pub fn generators(&self) -> &GeneratorTable {
        &self.generators
    }

    pub fn predicates(&self) -> &PredicateTable {
        &self.predicates
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Produces a structurally-equal grammar bumped to the next version;
    /// used by C7 so grammars are never mutated in place (spec §5).
    pub fn with_next_version(mut self) -> Self {
        self.version += 1;
        self
    }

    pub fn with_rules(mut self, rules: IndexMap<String, Rule>) -> Self {
        self.rules = rules;
        self
    }

    /// Fails with [`GrammarSemanticError`] if a referenced non-terminal is
    /// undefined, or if a non-terminal's every reachable alternation
    /// recurses without ever reaching a terminating (non-recursive)
    /// alternation.
    pub fn validate(&self) -> Result<(), GrammarSemanticError> {
        if self.rules.is_empty() {
            return Err(GrammarSemanticError::Empty);
        }
        if !self.rules.contains_key(&self.start_symbol) {
            return Err(GrammarSemanticError::MissingStartSymbol(self.start_symbol.clone()));
        }
        for rule in self.rules.values() {
            for alt in &rule.alternations {
                for element in &alt.elements {
                    if let Symbol::NonTerminal(name) = &element.symbol
                        && !self.rules.contains_key(name)
                    {
                        return Err(GrammarSemanticError::DanglingReference(name.clone()));
                    }
                }
            }
        }
        for name in self.rules.keys() {
            if !self.terminates(name, &mut IndexSet::new()) {
                return Err(GrammarSemanticError::NonTerminatingCycle(name.clone()));
            }
        }
        Ok(())
    }

    /// True if `name` has some alternation whose non-terminal references
    /// all terminate without revisiting a non-terminal already on the
    /// current expansion path.
    fn terminates(&self, name: &str, visiting: &mut IndexSet<String>) -> bool {
        let Some(rule) = self.rules.get(name) else {
            return true;
        };
        if !visiting.insert(name.to_owned()) {
            return false;
        }
        let result = rule.alternations.iter().any(|alt| {
            alt.elements.iter().all(|el| match &el.symbol {
                Symbol::Terminal(_) => true,
                Symbol::NonTerminal(n) => self.terminates(n, visiting),
            })
        });
        visiting.shift_remove(name);
        result
    }
}

pub use parse::parse;
