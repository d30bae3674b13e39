//! Property template library & registry (C5): named, arity-typed algebraic
//! and behavioral templates a FUT (or pair of FUTs, for the composition
//! category) can be checked against, grouped by [`PropertyCategory`] and
//! indexed by [`Registry`].

mod templates;

use std::fmt;

use indexmap::IndexMap;

use crate::fut::{Arity, ComparisonStrategy, ResultComparator};
use crate::typed_input::TypedInput;

pub use templates::{arithmetic, cryptographic, data_structure, logical};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyCategory {
    Symmetry,
    Algebraic,
    IdentityOrAbsorbing,
    FunctionAnalysis,
    Composition,
    DomainSpecific,
}

impl fmt::Display for PropertyCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PropertyCategory::Symmetry => "symmetry",
            PropertyCategory::Algebraic => "algebraic",
            PropertyCategory::IdentityOrAbsorbing => "identity-or-absorbing",
            PropertyCategory::FunctionAnalysis => "function-analysis",
            PropertyCategory::Composition => "composition",
            PropertyCategory::DomainSpecific => "domain-specific",
        };
        write!(f, "{s}")
    }
}

/// One generated point's positional arguments, already spread to match a
/// FUT's arity (spec §4.4: "the typed input is spread positionally").
pub type Sample = Vec<TypedInput>;

/// A human-readable justification for a verdict on one point: the rendered
/// input plus what was observed (spec §3 "witness").
#[derive(Debug, Clone)]
pub struct Witness {
    pub input: String,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub total_count: usize,
    pub success_count: usize,
}

/// Spec §3 "Evaluation outcome", produced once per `(fut, template)` pair.
#[derive(Debug, Clone)]
pub struct EvaluationOutcome {
    pub holds: bool,
    pub successes: Vec<Witness>,
    pub counterexamples: Vec<Witness>,
    pub stats: Stats,
}

impl EvaluationOutcome {
    /// `total_count = 0` is reported separately by the engine as "no
    /// applicable inputs" (spec §4.6); this just recognizes the case.
    pub fn has_applicable_inputs(&self) -> bool {
        self.stats.total_count > 0
    }

    pub fn confidence(&self) -> f64 {
        if self.stats.total_count == 0 {
            0.0
        } else {
            self.stats.success_count as f64 / self.stats.total_count as f64
        }
    }
}

/// A type-erased FUT invocation used by template evaluators: `None` stands
/// for an invocation error (spec §7 `InvocationError`), which most
/// templates treat as non-equality / falsification.
pub type CallFn<'a> = dyn Fn(&[TypedInput]) -> Option<serde_json::Value> + 'a;

/// How many distinct FUTs one evaluation of this template calls. `1` for
/// every category except Composition, which relates a pair (spec §4.5
/// "inverse relationships across FUT pairs").
pub type RequiredFuts = usize;

/// A named, reusable property check, registered by [`Registry`] and
/// dispatched over by the engine (C6). `compatibility` sees the declared
/// arity of each involved FUT, in the same order `evaluate` receives their
/// call closures.
pub struct PropertyTemplate {
    pub name: &'static str,
    pub category: PropertyCategory,
    pub required_futs: RequiredFuts,
    /// How many positional values one point needs (spec §4.5: "the
    /// template decides how many derived calls it needs per sample
    /// point"). The engine pads/regroups generated values to this width
    /// regardless of the involved FUTs' own arity — e.g. associativity
    /// needs 3 values to test a binary FUT.
    pub sample_arity: usize,
    pub description: &'static str,
    pub compatibility: fn(&[Arity]) -> bool,
    pub evaluate: fn(
        calls: &[&CallFn],
        points: &[Sample],
        comparators: &[Box<dyn ResultComparator>],
        strategy: ComparisonStrategy,
        max_counterexamples: usize,
    ) -> EvaluationOutcome,
}

impl fmt::Debug for PropertyTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyTemplate")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("required_futs", &self.required_futs)
            .finish()
    }
}

/// An ordered, name-indexed collection of templates. `union` merges two
/// registries; later entries win on a name collision, which makes
/// `union(R, R) ≡ R` (spec §8 invariant 3).
#[derive(Default)]
pub struct Registry {
    entries: IndexMap<&'static str, PropertyTemplate>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, template: PropertyTemplate) {
        self.entries.insert(template.name, template);
    }

    pub fn by_name(&self, name: &str) -> Option<&PropertyTemplate> {
        self.entries.get(name)
    }

    pub fn by_category(&self, category: PropertyCategory) -> Vec<&PropertyTemplate> {
        self.entries.values().filter(|t| t.category == category).collect()
    }

    pub fn get_all(&self) -> Vec<&PropertyTemplate> {
        self.entries.values().collect()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.entries.keys().copied().collect()
    }

    pub fn union(mut self, other: Registry) -> Self {
        for (name, template) in other.entries {
            self.entries.insert(name, template);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Every built-in template across every domain registry (spec §4.5: the
/// union of the domain registries is the default registry an engine run
/// uses when none is specified).
pub fn full() -> Registry {
    Registry::new()
        .union(arithmetic())
        .union(logical())
        .union(cryptographic())
        .union(data_structure())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_is_idempotent() {
        let once = full();
        let twice = full().union(full());
        assert_eq!(once.names().len(), twice.names().len());
        for name in once.names() {
            assert!(twice.by_name(name).is_some());
        }
    }

    #[test]
    fn by_category_only_returns_matching_templates() {
        let registry = full();
        for template in registry.by_category(PropertyCategory::Algebraic) {
            assert_eq!(template.category, PropertyCategory::Algebraic);
        }
    }
}
