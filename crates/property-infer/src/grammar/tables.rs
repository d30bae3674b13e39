//! Name-indexed tables resolving the opaque host-language snippets a
//! grammar refers to (`:= name(args)` semantic generators, `where expr`
//! predicates) to actual Rust closures, per the design note in spec §9:
//! "Host-language snippets in grammars ... are opaque strings bound to
//! named entries in a generator table / predicate table supplied at
//! grammar-load time."

use std::sync::Arc;

use indexmap::IndexMap;
use rand::Rng;
use rand_distr::Distribution;

use super::where_expr;

/// A value produced by a semantic generator: carries both the typed value
/// and its canonical string rendering (the production trace needs both).
#[derive(Debug, Clone, PartialEq)]
pub enum GeneratedValue {
    Int(i64),
    Bool(bool),
    Str(String),
}

impl GeneratedValue {
    pub fn render(&self) -> String {
        match self {
            GeneratedValue::Int(n) => n.to_string(),
            GeneratedValue::Bool(b) => b.to_string(),
            GeneratedValue::Str(s) => s.clone(),
        }
    }
}

type GeneratorFn = dyn Fn(&str, &mut dyn rand::RngCore) -> GeneratedValue + Send + Sync;
/// `raw` is the full `where` expression text; `siblings` maps each
/// non-terminal name appearing in the current alternation to its rendered
/// string form, so a predicate can relate e.g. `length` to `len(content)`.
type PredicateFn = dyn Fn(&str, &IndexMap<String, String>) -> bool + Send + Sync;

#[derive(Clone, Default)]
pub struct GeneratorTable {
    entries: IndexMap<String, Arc<GeneratorFn>>,
}

impl std::fmt::Debug for GeneratorTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratorTable")
            .field("names", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl GeneratorTable {
    pub fn register(
        &mut self,
        name: impl Into<String>,
        f: impl Fn(&str, &mut dyn rand::RngCore) -> GeneratedValue + Send + Sync + 'static,
    ) {
        self.entries.insert(name.into(), Arc::new(f));
    }

    pub fn invoke(&self, name: &str, args: &str, rng: &mut dyn rand::RngCore) -> Option<GeneratedValue> {
        self.entries.get(name).map(|f| f(args, rng))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// The generators every canonical grammar in the bundled pack relies on
    /// (spec §9): a Gaussian-integer draw parameterized by `"mean, stddev"`,
    /// plus small scalar/bool helpers the `.fan` files use directly as `:=`
    /// bindings.
    pub fn with_builtins() -> Self {
        let mut table = Self::default();
        table.register("gaussian", |args, rng| {
            let (mean, stddev) = parse_two_f64(args).unwrap_or((0.0, 1.0));
            let normal = rand_distr::Normal::new(mean, stddev.max(1e-9))
                .unwrap_or_else(|_| rand_distr::Normal::new(0.0, 1.0).expect("fixed params"));
            GeneratedValue::Int(normal.sample(rng).round() as i64)
        });
        table.register("int_range", |args, rng| {
            let (lo, hi) = parse_two_f64(args).unwrap_or((0.0, 100.0));
            let (lo, hi) = (lo as i64, hi as i64);
            GeneratedValue::Int(rng.random_range(lo..=hi.max(lo)))
        });
        table.register("bool", |_args, rng| GeneratedValue::Bool(rng.random_bool(0.5)));
        table
    }
}

fn parse_two_f64(args: &str) -> Option<(f64, f64)> {
    let mut parts = args.split(',').map(str::trim);
    let a = parts.next()?.parse().ok()?;
    let b = parts.next()?.parse().ok()?;
    Some((a, b))
}

/// A `where` predicate evaluator, keyed by name. The grammar surface only
/// ever emits the `expr` mini-language (see [`super::where_expr`]), but the
/// table is kept name-indexed so a host embedding property-infer as a
/// library can register additional predicate forms.
#[derive(Clone, Default)]
pub struct PredicateTable {
    entries: IndexMap<String, Arc<PredicateFn>>,
}

impl std::fmt::Debug for PredicateTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredicateTable")
            .field("names", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl PredicateTable {
    pub fn register(
        &mut self,
        name: impl Into<String>,
        f: impl Fn(&str, &IndexMap<String, String>) -> bool + Send + Sync + 'static,
    ) {
        self.entries.insert(name.into(), Arc::new(f));
    }

    /// Unknown predicate names are treated as unsatisfiable, so a typo in a
    /// spliced constraint narrows the language to nothing rather than
    /// silently always holding.
    pub fn invoke(&self, name: &str, raw: &str, siblings: &IndexMap<String, String>) -> bool {
        self.entries
            .get(name)
            .map(|f| f(raw, siblings))
            .unwrap_or(false)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registers the `expr` mini-language every `.fan` `where` clause in
    /// this workspace compiles down to (see [`where_expr`]).
    pub fn with_builtins() -> Self {
        let mut table = Self::default();
        table.register("expr", |raw, siblings| where_expr::eval(raw, siblings));
        table
    }
}
