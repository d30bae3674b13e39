//! Result comparison: deciding whether two FUT invocation results count as
//! "the same" for the purpose of evaluating a property (spec §4.4/Open
//! Question (b)).

use serde_json::Value;

/// Judges whether two JSON-encoded results are equivalent. `accepts` lets a
/// comparator opt out of pairs it doesn't understand (e.g. a numeric
/// comparator opting out of two arrays), so several comparators with
/// different specialties can be registered together.
pub trait ResultComparator: Send + Sync {
    fn accepts(&self, a: &Value, b: &Value) -> bool;
    fn equivalent(&self, a: &Value, b: &Value) -> bool;
}

/// Exact structural equality on the JSON value tree. Always accepts, so it
/// is the fallback of last resort when nothing else in a comparator set
/// applies (Open Question (b): "fall back to structural equality on
/// serialized form").
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralEquality;

impl ResultComparator for StructuralEquality {
    fn accepts(&self, _a: &Value, _b: &Value) -> bool {
        true
    }

    fn equivalent(&self, a: &Value, b: &Value) -> bool {
        a == b
    }
}

/// Accepts only when both sides are JSON numbers, comparing within a fixed
/// absolute tolerance — floating-point arithmetic properties (e.g.
/// associativity of addition) would otherwise fail on rounding noise.
#[derive(Debug, Clone, Copy)]
pub struct NumericTolerance {
    pub epsilon: f64,
}

impl Default for NumericTolerance {
    fn default() -> Self {
        Self { epsilon: 1e-9 }
    }
}

impl ResultComparator for NumericTolerance {
    fn accepts(&self, a: &Value, b: &Value) -> bool {
        a.is_number() && b.is_number()
    }

    fn equivalent(&self, a: &Value, b: &Value) -> bool {
        match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => (a - b).abs() <= self.epsilon,
            _ => false,
        }
    }
}

/// How several applicable [`ResultComparator`]s are combined into one
/// verdict for a given pair of results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonStrategy {
    /// Use the first registered comparator that accepts the pair.
    FirstCompatible,
    /// Require a strict majority of accepting comparators to agree.
    Consensus,
    /// Require every accepting comparator to agree (the strictest verdict).
    MostRestrictive,
}

/// Combines `comparators` under `strategy` to judge `a` and `b`. Falls back
/// to [`StructuralEquality`] when no comparator in the set accepts the
/// pair.
pub fn compare_all(
    comparators: &[Box<dyn ResultComparator>],
    strategy: ComparisonStrategy,
    a: &Value,
    b: &Value,
) -> bool {
    let applicable: Vec<&Box<dyn ResultComparator>> =
        comparators.iter().filter(|c| c.accepts(a, b)).collect();
    if applicable.is_empty() {
        return StructuralEquality.equivalent(a, b);
    }
    match strategy {
        ComparisonStrategy::FirstCompatible => applicable[0].equivalent(a, b),
        // Spec §4.4: "all comparators that accept must agree; disagreement
        // ⇒ unequal" — any dissenting accepting comparator makes the pair
        // unequal, not merely a minority.
        ComparisonStrategy::Consensus => applicable.iter().all(|c| c.equivalent(a, b)),
        ComparisonStrategy::MostRestrictive => applicable.iter().all(|c| c.equivalent(a, b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_structural_equality_with_no_comparators() {
        assert!(compare_all(&[], ComparisonStrategy::FirstCompatible, &serde_json::json!(1), &serde_json::json!(1)));
        assert!(!compare_all(&[], ComparisonStrategy::FirstCompatible, &serde_json::json!(1), &serde_json::json!(2)));
    }

    #[test]
    fn numeric_tolerance_accepts_near_equal_floats() {
        let comparators: Vec<Box<dyn ResultComparator>> = vec![Box::new(NumericTolerance { epsilon: 1e-6 })];
        let a = serde_json::json!(0.1 + 0.2);
        let b = serde_json::json!(0.3);
        assert!(compare_all(&comparators, ComparisonStrategy::FirstCompatible, &a, &b));
    }

    #[test]
    fn most_restrictive_requires_unanimous_agreement() {
        struct AlwaysDisagree;
        impl ResultComparator for AlwaysDisagree {
            fn accepts(&self, _a: &Value, _b: &Value) -> bool {
                true
            }
            fn equivalent(&self, _a: &Value, _b: &Value) -> bool {
                false
            }
        }
        let comparators: Vec<Box<dyn ResultComparator>> =
            vec![Box::new(StructuralEquality), Box::new(StructuralEquality), Box::new(AlwaysDisagree)];
        let a = serde_json::json!(5);
        assert!(!compare_all(&comparators, ComparisonStrategy::MostRestrictive, &a, &a));
    }

    #[test]
    fn consensus_treats_any_dissent_as_unequal() {
        // Spec §4.4: "all comparators that accept must agree; disagreement
        // ⇒ unequal" — a 2-out-of-3 majority must not be treated as equal.
        struct AlwaysDisagree;
        impl ResultComparator for AlwaysDisagree {
            fn accepts(&self, _a: &Value, _b: &Value) -> bool {
                true
            }
            fn equivalent(&self, _a: &Value, _b: &Value) -> bool {
                false
            }
        }
        let comparators: Vec<Box<dyn ResultComparator>> =
            vec![Box::new(StructuralEquality), Box::new(StructuralEquality), Box::new(AlwaysDisagree)];
        let a = serde_json::json!(5);
        assert!(!compare_all(&comparators, ComparisonStrategy::Consensus, &a, &a));

        let unanimous: Vec<Box<dyn ResultComparator>> = vec![Box::new(StructuralEquality), Box::new(StructuralEquality)];
        assert!(compare_all(&unanimous, ComparisonStrategy::Consensus, &a, &a));
    }
}
