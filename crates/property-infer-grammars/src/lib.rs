//! Canonical `.fan` grammar assets bundled with this workspace, resolved to
//! a [`property_infer::engine::GrammarSource`] the same way the teacher's
//! grammars crate resolves a `Language` to its tree-sitter assets: a plain
//! enum, `include_str!`-loaded resources, and per-variant match methods —
//! no filesystem access at runtime.

use derive_more::{Display, FromStr};
use property_infer::engine::GrammarSource;
use property_infer::grammar::{self, Grammar, GrammarSyntaxError};
use property_infer::typed_input::ParserMode;

macro_rules! include_grammar {
    ($name:literal) => {
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/res/grammars/", $name, ".fan"))
    };
}

/// One of the canonical demo grammars this workspace ships, each sized to
/// exercise a scenario from spec §7.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Display, FromStr)]
pub enum CanonicalGrammar {
    /// Two independent signed integers (S1 commutativity, S2 falsification).
    IntPairs,
    /// A single signed integer (function-analysis and cryptographic templates).
    UnaryInts,
    /// Two independent booleans (logical operators).
    BoolPairs,
    /// Two small integer sets wrapped in a tuple (S4 union properties).
    SetPairs,
    /// A numerator/denominator pair that may land on zero (S5 feedback loop).
    SafeDivPairs,
    /// A length-prefixed packet whose length must equal its payload's
    /// length (S6's wire-format invariant; exercised directly by the
    /// generator's own where-clause tests).
    Binary2,
    /// Printable content fragments, the sampling domain for an
    /// encode/decode round-trip's `a` in `g(f(a)) = a` (S6 composition).
    ContentStrings,
}

impl CanonicalGrammar {
    /// The raw `.fan` source text for this grammar.
    pub const fn source(&self) -> &'static str {
        match self {
            Self::IntPairs => include_grammar!("int_pairs"),
            Self::UnaryInts => include_grammar!("unary_ints"),
            Self::BoolPairs => include_grammar!("bool_pairs"),
            Self::SetPairs => include_grammar!("set_pairs"),
            Self::SafeDivPairs => include_grammar!("safe_div_pairs"),
            Self::Binary2 => include_grammar!("binary2"),
            Self::ContentStrings => include_grammar!("content_strings"),
        }
    }

    /// How the generated string should be shaped into a [`TypedInput`]
    /// (spec §4.3). Every canonical grammar but `Binary2` only ever
    /// generates whitespace/comma-separated scalars or bracketed shapes, so
    /// `ParserMode::Numbers` covers them; `Binary2`'s content fragment
    /// round-trips through the same mode since its payload is bracket-free.
    ///
    /// [`TypedInput`]: property_infer::typed_input::TypedInput
    pub const fn parser_mode(&self) -> ParserMode {
        ParserMode::Numbers
    }

    /// Parses [`Self::source`]. Bundled grammars are checked into this
    /// workspace and covered by [`all`]'s test, so a parse failure here
    /// means the asset itself is broken, not a user input — panicking with
    /// the syntax error is the right failure mode.
    pub fn load(&self) -> Grammar {
        grammar::parse(self.source())
            .unwrap_or_else(|err| panic!("bundled grammar `{self}` failed to parse: {err}"))
    }

    /// Convenience: [`Self::load`] wrapped in the [`GrammarSource`] the
    /// engine's `with_fut` expects.
    pub fn grammar_source(&self) -> GrammarSource {
        GrammarSource::new(self.load(), self.parser_mode())
    }

    pub const fn all() -> [CanonicalGrammar; 7] {
        [
            Self::IntPairs,
            Self::UnaryInts,
            Self::BoolPairs,
            Self::SetPairs,
            Self::SafeDivPairs,
            Self::Binary2,
            Self::ContentStrings,
        ]
    }
}

/// Parses every bundled `.fan` source with the caller's own
/// [`property_infer::grammar::parse`], surfacing the first syntax error
/// instead of panicking — used by the CLI's `list-grammars` diagnostics and
/// by this crate's own tests.
pub fn try_load_all() -> Result<Vec<(CanonicalGrammar, Grammar)>, GrammarSyntaxError> {
    CanonicalGrammar::all()
        .into_iter()
        .map(|g| grammar::parse(g.source()).map(|parsed| (g, parsed)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_canonical_grammar_parses_and_validates() {
        for grammar in CanonicalGrammar::all() {
            let parsed = grammar.load();
            assert!(parsed.validate().is_ok(), "{grammar} failed validation");
        }
    }

    #[test]
    fn name_round_trips_through_display_and_from_str() {
        for grammar in CanonicalGrammar::all() {
            let rendered = grammar.to_string();
            let parsed: CanonicalGrammar = rendered.parse().expect("parses back");
            assert_eq!(parsed, grammar);
        }
    }
}
