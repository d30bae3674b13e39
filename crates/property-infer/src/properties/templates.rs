//! Built-in property templates (spec §4.5) and the domain registries that
//! bundle them (`arithmetic`, `logical`, `cryptographic`, `data_structure`).

use itertools::Itertools;

use crate::fut::{Arity, ComparisonStrategy, ResultComparator, compare_all};
use crate::typed_input::{Scalar, TypedInput};

use super::{CallFn, EvaluationOutcome, PropertyCategory, PropertyTemplate, Registry, Sample, Stats, Witness};

fn render_sample(sample: &Sample) -> String {
    sample.iter().map(ToString::to_string).join(", ")
}

fn equal(
    comparators: &[Box<dyn ResultComparator>],
    strategy: ComparisonStrategy,
    a: &serde_json::Value,
    b: &serde_json::Value,
) -> bool {
    compare_all(comparators, strategy, a, b)
}

/// The per-point outcome of checking one sample against a universal
/// property (one that should hold for every generated point).
enum PointCheck {
    Success,
    Failure(String),
}

/// Runs `check` over every point and folds the per-point verdicts into the
/// spec §3 [`EvaluationOutcome`] shape: holds iff every point succeeded
/// (and at least one point was applicable), with up to
/// `max_counterexamples` witnesses retained on each side (spec §4.5:
/// "statistics count points, not derived calls").
fn aggregate_universal(
    points: &[Sample],
    max_counterexamples: usize,
    mut check: impl FnMut(&Sample) -> PointCheck,
) -> EvaluationOutcome {
    let mut successes = Vec::new();
    let mut counterexamples = Vec::new();
    let mut success_count = 0usize;
    for point in points {
        match check(point) {
            PointCheck::Success => {
                success_count += 1;
                if successes.len() < max_counterexamples {
                    successes.push(Witness {
                        input: render_sample(point),
                        detail: "holds".to_owned(),
                    });
                }
            }
            PointCheck::Failure(detail) => {
                if counterexamples.len() < max_counterexamples {
                    counterexamples.push(Witness {
                        input: render_sample(point),
                        detail,
                    });
                }
            }
        }
    }
    EvaluationOutcome {
        holds: !points.is_empty() && counterexamples.is_empty(),
        successes,
        counterexamples,
        stats: Stats {
            total_count: points.len(),
            success_count,
        },
    }
}

/// Folds an *existential* property (true if some witnessing point exists,
/// e.g. a fixed point or an identity element) into the same outcome shape.
fn existential_outcome(points_checked: usize, witnesses: Vec<Witness>, max_counterexamples: usize) -> EvaluationOutcome {
    let holds = !witnesses.is_empty();
    let mut successes = witnesses;
    successes.truncate(max_counterexamples);
    let success_count = successes.len();
    let counterexamples = if holds {
        Vec::new()
    } else {
        vec![Witness {
            input: "\u{2205}".to_owned(),
            detail: "no witnessing input found in the sample".to_owned(),
        }]
    };
    EvaluationOutcome {
        holds,
        successes,
        counterexamples,
        stats: Stats {
            total_count: points_checked,
            success_count,
        },
    }
}

fn compat_unary(arities: &[Arity]) -> bool {
    arities.len() == 1 && arities[0].accepts(1)
}

fn compat_binary(arities: &[Arity]) -> bool {
    arities.len() == 1 && arities[0].accepts(2)
}

fn compat_unary_then_binary(arities: &[Arity]) -> bool {
    arities.len() == 2 && arities[0].accepts(1) && arities[1].accepts(2)
}

fn compat_binary_pair(arities: &[Arity]) -> bool {
    arities.len() == 2 && arities[0].accepts(2) && arities[1].accepts(2)
}

fn compat_unary_pair(arities: &[Arity]) -> bool {
    arities.len() == 2 && arities[0].accepts(1) && arities[1].accepts(1)
}

// ---------------------------------------------------------------------
// Symmetry
// ---------------------------------------------------------------------

fn commutativity_eval(
    calls: &[&CallFn],
    points: &[Sample],
    comparators: &[Box<dyn ResultComparator>],
    strategy: ComparisonStrategy,
    max_counterexamples: usize,
) -> EvaluationOutcome {
    let f = calls[0];
    aggregate_universal(points, max_counterexamples, |point| {
        if point.len() != 2 {
            return PointCheck::Failure("sample did not have exactly two arguments".to_owned());
        }
        let swapped = vec![point[1].clone(), point[0].clone()];
        match (f(point), f(&swapped)) {
            (Some(a), Some(b)) if equal(comparators, strategy, &a, &b) => PointCheck::Success,
            (Some(a), Some(b)) => PointCheck::Failure(format!("f(a,b) = {a}, f(b,a) = {b}")),
            _ => PointCheck::Failure("invocation error on one side".to_owned()),
        }
    })
}

fn commutativity() -> PropertyTemplate {
    PropertyTemplate {
        name: "commutativity",
        category: PropertyCategory::Symmetry,
        required_futs: 1,
        sample_arity: 2,
        description: "f(a, b) = f(b, a) for every sampled pair",
        compatibility: compat_binary,
        evaluate: commutativity_eval,
    }
}

fn anti_commutativity_eval(
    calls: &[&CallFn],
    points: &[Sample],
    comparators: &[Box<dyn ResultComparator>],
    strategy: ComparisonStrategy,
    max_counterexamples: usize,
) -> EvaluationOutcome {
    let f = calls[0];
    aggregate_universal(points, max_counterexamples, |point| {
        if point.len() != 2 {
            return PointCheck::Failure("sample did not have exactly two arguments".to_owned());
        }
        let swapped = vec![point[1].clone(), point[0].clone()];
        match (f(point), f(&swapped)) {
            (Some(a), Some(b)) => match negate(&b) {
                Some(neg_b) if equal(comparators, strategy, &a, &neg_b) => PointCheck::Success,
                Some(_) => PointCheck::Failure(format!("f(a,b) = {a}, f(b,a) = {b}, not negatives")),
                None => PointCheck::Failure("f(b,a) is not numeric".to_owned()),
            },
            _ => PointCheck::Failure("invocation error on one side".to_owned()),
        }
    })
}

fn anti_commutativity() -> PropertyTemplate {
    PropertyTemplate {
        name: "anti_commutativity",
        category: PropertyCategory::Symmetry,
        required_futs: 1,
        sample_arity: 2,
        description: "f(a, b) = -f(b, a) for every sampled pair",
        compatibility: compat_binary,
        evaluate: anti_commutativity_eval,
    }
}

fn argument_position_dependence_eval(
    calls: &[&CallFn],
    points: &[Sample],
    comparators: &[Box<dyn ResultComparator>],
    strategy: ComparisonStrategy,
    max_counterexamples: usize,
) -> EvaluationOutcome {
    let f = calls[0];
    aggregate_universal(points, max_counterexamples, |point| {
        if point.len() != 2 {
            return PointCheck::Failure("sample did not have exactly two arguments".to_owned());
        }
        let swapped = vec![point[1].clone(), point[0].clone()];
        match (f(point), f(&swapped)) {
            (Some(a), Some(b)) if !equal(comparators, strategy, &a, &b) => PointCheck::Success,
            (Some(a), Some(b)) => PointCheck::Failure(format!("f(a,b) = f(b,a) = {a} = {b}; argument order doesn't matter here")),
            _ => PointCheck::Failure("invocation error on one side".to_owned()),
        }
    })
}

fn argument_position_dependence() -> PropertyTemplate {
    PropertyTemplate {
        name: "argument_position_dependence",
        category: PropertyCategory::Symmetry,
        required_futs: 1,
        sample_arity: 2,
        description: "f(a, b) != f(b, a) for every sampled pair (the function is position-sensitive)",
        compatibility: compat_binary,
        evaluate: argument_position_dependence_eval,
    }
}

fn negate(value: &serde_json::Value) -> Option<serde_json::Value> {
    if let Some(n) = value.as_i64() {
        return Some(serde_json::json!(-n));
    }
    if let Some(x) = value.as_f64() {
        return Some(serde_json::json!(-x));
    }
    None
}

// ---------------------------------------------------------------------
// Algebraic
// ---------------------------------------------------------------------

fn associativity_eval(
    calls: &[&CallFn],
    points: &[Sample],
    comparators: &[Box<dyn ResultComparator>],
    strategy: ComparisonStrategy,
    max_counterexamples: usize,
) -> EvaluationOutcome {
    let f = calls[0];
    aggregate_universal(points, max_counterexamples, |point| {
        if point.len() != 3 {
            return PointCheck::Failure("sample did not have exactly three arguments".to_owned());
        }
        let (a, b, c) = (point[0].clone(), point[1].clone(), point[2].clone());
        let Some(ab) = f(&[a.clone(), b.clone()]) else {
            return PointCheck::Failure("f(a,b) errored".to_owned());
        };
        let Some(bc) = f(&[b.clone(), c.clone()]) else {
            return PointCheck::Failure("f(b,c) errored".to_owned());
        };
        let (Some(ab_typed), Some(bc_typed)) = (TypedInput::from_json(&ab), TypedInput::from_json(&bc)) else {
            return PointCheck::Failure("f's result can't be fed back in as an argument".to_owned());
        };
        match (f(&[ab_typed, c]), f(&[a, bc_typed])) {
            (Some(lhs), Some(rhs)) if equal(comparators, strategy, &lhs, &rhs) => PointCheck::Success,
            (Some(lhs), Some(rhs)) => PointCheck::Failure(format!("f(f(a,b),c) = {lhs}, f(a,f(b,c)) = {rhs}")),
            _ => PointCheck::Failure("invocation error while regrouping".to_owned()),
        }
    })
}

fn associativity() -> PropertyTemplate {
    PropertyTemplate {
        name: "associativity",
        category: PropertyCategory::Algebraic,
        required_futs: 1,
        sample_arity: 3,
        description: "f(f(a,b),c) = f(a,f(b,c)) for every sampled triple",
        compatibility: compat_binary,
        evaluate: associativity_eval,
    }
}

fn distributivity_eval(
    calls: &[&CallFn],
    points: &[Sample],
    comparators: &[Box<dyn ResultComparator>],
    strategy: ComparisonStrategy,
    max_counterexamples: usize,
) -> EvaluationOutcome {
    let (f, g) = (calls[0], calls[1]);
    aggregate_universal(points, max_counterexamples, |point| {
        if point.len() != 3 {
            return PointCheck::Failure("sample did not have exactly three arguments".to_owned());
        }
        let (a, b, c) = (point[0].clone(), point[1].clone(), point[2].clone());
        let Some(g_bc) = g(&[b.clone(), c.clone()]) else {
            return PointCheck::Failure("g(b,c) errored".to_owned());
        };
        let Some(g_bc_typed) = TypedInput::from_json(&g_bc) else {
            return PointCheck::Failure("g's result can't be fed back in as an argument".to_owned());
        };
        let Some(lhs) = f(&[a.clone(), g_bc_typed]) else {
            return PointCheck::Failure("f(a, g(b,c)) errored".to_owned());
        };
        let (Some(f_ab), Some(f_ac)) = (f(&[a.clone(), b]), f(&[a, c])) else {
            return PointCheck::Failure("f(a,b) or f(a,c) errored".to_owned());
        };
        let (Some(f_ab_typed), Some(f_ac_typed)) = (TypedInput::from_json(&f_ab), TypedInput::from_json(&f_ac)) else {
            return PointCheck::Failure("f's result can't be fed back in as an argument".to_owned());
        };
        match g(&[f_ab_typed, f_ac_typed]) {
            Some(rhs) if equal(comparators, strategy, &lhs, &rhs) => PointCheck::Success,
            Some(rhs) => PointCheck::Failure(format!("f(a,g(b,c)) = {lhs}, g(f(a,b),f(a,c)) = {rhs}")),
            None => PointCheck::Failure("g(f(a,b),f(a,c)) errored".to_owned()),
        }
    })
}

fn distributivity() -> PropertyTemplate {
    PropertyTemplate {
        name: "distributivity",
        category: PropertyCategory::Algebraic,
        required_futs: 2,
        sample_arity: 3,
        description: "f(a, g(b,c)) = g(f(a,b), f(a,c)) — f distributes over g",
        compatibility: compat_binary_pair,
        evaluate: distributivity_eval,
    }
}

fn idempotence_unary_eval(
    calls: &[&CallFn],
    points: &[Sample],
    comparators: &[Box<dyn ResultComparator>],
    strategy: ComparisonStrategy,
    max_counterexamples: usize,
) -> EvaluationOutcome {
    let f = calls[0];
    aggregate_universal(points, max_counterexamples, |point| {
        if point.len() != 1 {
            return PointCheck::Failure("sample did not have exactly one argument".to_owned());
        }
        let Some(fa) = f(point) else {
            return PointCheck::Failure("f(a) errored".to_owned());
        };
        let Some(fa_typed) = TypedInput::from_json(&fa) else {
            return PointCheck::Failure("f's result can't be fed back in as an argument".to_owned());
        };
        match f(&[fa_typed]) {
            Some(ffa) if equal(comparators, strategy, &fa, &ffa) => PointCheck::Success,
            Some(ffa) => PointCheck::Failure(format!("f(a) = {fa}, f(f(a)) = {ffa}")),
            None => PointCheck::Failure("f(f(a)) errored".to_owned()),
        }
    })
}

fn idempotence_unary() -> PropertyTemplate {
    PropertyTemplate {
        name: "idempotence_unary",
        category: PropertyCategory::Algebraic,
        required_futs: 1,
        sample_arity: 1,
        description: "f(f(a)) = f(a) for every sampled input",
        compatibility: compat_unary,
        evaluate: idempotence_unary_eval,
    }
}

fn idempotence_binary_eval(
    calls: &[&CallFn],
    points: &[Sample],
    comparators: &[Box<dyn ResultComparator>],
    strategy: ComparisonStrategy,
    max_counterexamples: usize,
) -> EvaluationOutcome {
    let f = calls[0];
    aggregate_universal(points, max_counterexamples, |point| {
        let Some(a) = point.first() else {
            return PointCheck::Failure("sample had no arguments".to_owned());
        };
        let args = vec![a.clone(), a.clone()];
        match f(&args) {
            Some(faa) if equal(comparators, strategy, &faa, &a.to_json()) => PointCheck::Success,
            Some(faa) => PointCheck::Failure(format!("f(a,a) = {faa}, expected a = {a}")),
            None => PointCheck::Failure("f(a,a) errored".to_owned()),
        }
    })
}

fn idempotence_binary() -> PropertyTemplate {
    PropertyTemplate {
        name: "idempotence_binary",
        category: PropertyCategory::Algebraic,
        required_futs: 1,
        sample_arity: 1,
        description: "f(a, a) = a for every sampled input (e.g. set union with itself)",
        compatibility: compat_binary,
        evaluate: idempotence_binary_eval,
    }
}

// ---------------------------------------------------------------------
// Identity / absorbing elements — existential over a fixed candidate set
// drawn from the sample plus the small built-ins named in spec §4.5.
// ---------------------------------------------------------------------

fn candidate_elements(points: &[Sample], position: usize) -> Vec<TypedInput> {
    let mut candidates = vec![
        TypedInput::Scalar(Scalar::Int(0)),
        TypedInput::Scalar(Scalar::Int(1)),
        TypedInput::List(Vec::new()),
        TypedInput::Set(Vec::new()),
    ];
    for point in points {
        if let Some(value) = point.get(position)
            && !candidates.iter().any(|c| c.to_string() == value.to_string())
        {
            candidates.push(value.clone());
        }
    }
    candidates
}

fn identity_element_eval(
    calls: &[&CallFn],
    points: &[Sample],
    comparators: &[Box<dyn ResultComparator>],
    strategy: ComparisonStrategy,
    max_counterexamples: usize,
) -> EvaluationOutcome {
    let f = calls[0];
    for candidate in candidate_elements(points, 1) {
        let mut count = 0usize;
        let mut all_hold = true;
        for point in points {
            let Some(a) = point.first() else { continue };
            count += 1;
            let args = vec![a.clone(), candidate.clone()];
            match f(&args) {
                Some(result) if equal(comparators, strategy, &result, &a.to_json()) => {}
                _ => {
                    all_hold = false;
                    break;
                }
            }
        }
        if all_hold && count > 0 {
            return existential_outcome(
                count,
                vec![Witness {
                    input: candidate.to_string(),
                    detail: format!("identity element e = {candidate}: f(a, e) = a for every sampled a"),
                }],
                max_counterexamples,
            );
        }
    }
    existential_outcome(points.len(), Vec::new(), max_counterexamples)
}

fn identity_element() -> PropertyTemplate {
    PropertyTemplate {
        name: "identity_element",
        category: PropertyCategory::IdentityOrAbsorbing,
        required_futs: 1,
        sample_arity: 2,
        description: "there exists e such that f(a, e) = a for every sampled a",
        compatibility: compat_binary,
        evaluate: identity_element_eval,
    }
}

fn absorbing_element_eval(
    calls: &[&CallFn],
    points: &[Sample],
    comparators: &[Box<dyn ResultComparator>],
    strategy: ComparisonStrategy,
    max_counterexamples: usize,
) -> EvaluationOutcome {
    let f = calls[0];
    for candidate in candidate_elements(points, 1) {
        let mut count = 0usize;
        let mut all_hold = true;
        for point in points {
            let Some(a) = point.first() else { continue };
            count += 1;
            let args = vec![a.clone(), candidate.clone()];
            match f(&args) {
                Some(result) if equal(comparators, strategy, &result, &candidate.to_json()) => {}
                _ => {
                    all_hold = false;
                    break;
                }
            }
        }
        if all_hold && count > 0 {
            return existential_outcome(
                count,
                vec![Witness {
                    input: candidate.to_string(),
                    detail: format!("absorbing element z = {candidate}: f(a, z) = z for every sampled a"),
                }],
                max_counterexamples,
            );
        }
    }
    existential_outcome(points.len(), Vec::new(), max_counterexamples)
}

fn absorbing_element() -> PropertyTemplate {
    PropertyTemplate {
        name: "absorbing_element",
        category: PropertyCategory::IdentityOrAbsorbing,
        required_futs: 1,
        sample_arity: 2,
        description: "there exists z such that f(a, z) = z for every sampled a",
        compatibility: compat_binary,
        evaluate: absorbing_element_eval,
    }
}

// ---------------------------------------------------------------------
// Function analysis
// ---------------------------------------------------------------------

fn injectivity_eval(
    calls: &[&CallFn],
    points: &[Sample],
    comparators: &[Box<dyn ResultComparator>],
    strategy: ComparisonStrategy,
    max_counterexamples: usize,
) -> EvaluationOutcome {
    let f = calls[0];
    let outputs: Vec<Option<serde_json::Value>> = points.iter().map(|p| f(p)).collect();
    let mut counterexamples = Vec::new();
    let mut collisions = 0usize;
    for (i, j) in (0..points.len()).tuple_combinations() {
        if render_sample(&points[i]) == render_sample(&points[j]) {
            continue;
        }
        if let (Some(a), Some(b)) = (&outputs[i], &outputs[j])
            && equal(comparators, strategy, a, b)
        {
            collisions += 1;
            if counterexamples.len() < max_counterexamples {
                counterexamples.push(Witness {
                    input: format!("{} vs {}", render_sample(&points[i]), render_sample(&points[j])),
                    detail: format!("both map to {a}"),
                });
            }
        }
    }
    let holds = !points.is_empty() && collisions == 0;
    EvaluationOutcome {
        holds,
        successes: if holds {
            vec![Witness {
                input: "all sampled inputs".to_owned(),
                detail: "every pair of distinct inputs produced distinct outputs".to_owned(),
            }]
        } else {
            Vec::new()
        },
        counterexamples,
        stats: Stats {
            total_count: points.len(),
            success_count: if holds { points.len() } else { 0 },
        },
    }
}

fn injectivity() -> PropertyTemplate {
    PropertyTemplate {
        name: "injectivity",
        category: PropertyCategory::FunctionAnalysis,
        required_futs: 1,
        sample_arity: 1,
        description: "distinct sampled inputs map to distinct outputs",
        compatibility: |arities| arities.len() == 1,
        evaluate: injectivity_eval,
    }
}

fn fixed_point_eval(
    calls: &[&CallFn],
    points: &[Sample],
    comparators: &[Box<dyn ResultComparator>],
    strategy: ComparisonStrategy,
    max_counterexamples: usize,
) -> EvaluationOutcome {
    let f = calls[0];
    let mut witnesses = Vec::new();
    for point in points {
        let Some(a) = point.first() else { continue };
        if let Some(result) = f(point)
            && equal(comparators, strategy, &result, &a.to_json())
        {
            witnesses.push(Witness {
                input: render_sample(point),
                detail: format!("f(a) = a = {a}"),
            });
        }
    }
    existential_outcome(points.len(), witnesses, max_counterexamples)
}

fn fixed_point() -> PropertyTemplate {
    PropertyTemplate {
        name: "fixed_point",
        category: PropertyCategory::FunctionAnalysis,
        required_futs: 1,
        sample_arity: 1,
        description: "there exists a sampled a such that f(a) = a",
        compatibility: compat_unary,
        evaluate: fixed_point_eval,
    }
}

fn monotonicity_eval(
    calls: &[&CallFn],
    points: &[Sample],
    _comparators: &[Box<dyn ResultComparator>],
    _strategy: ComparisonStrategy,
    max_counterexamples: usize,
) -> EvaluationOutcome {
    let f = calls[0];
    let mut ordered: Vec<(Scalar, serde_json::Value)> = Vec::new();
    for point in points {
        let Some(TypedInput::Scalar(s)) = point.first() else {
            continue;
        };
        if let Some(output) = f(point)
            && output.is_number()
        {
            ordered.push((s.clone(), output));
        }
    }
    ordered.sort_by(|a, b| a.0.cmp(&b.0));
    let mut non_decreasing = true;
    let mut non_increasing = true;
    let mut counterexamples = Vec::new();
    for window in ordered.windows(2) {
        let (prev, curr) = (&window[0], &window[1]);
        let (pv, cv) = (prev.1.as_f64().unwrap_or(0.0), curr.1.as_f64().unwrap_or(0.0));
        if cv < pv {
            non_decreasing = false;
        }
        if cv > pv {
            non_increasing = false;
        }
    }
    let holds = !ordered.is_empty() && (non_decreasing || non_increasing);
    if !holds {
        for window in ordered.windows(2) {
            let (prev, curr) = (&window[0], &window[1]);
            if counterexamples.len() >= max_counterexamples {
                break;
            }
            counterexamples.push(Witness {
                input: format!("{} -> {}", prev.0, curr.0),
                detail: format!("f({}) = {}, f({}) = {} is neither non-decreasing nor non-increasing relative to neighbors", prev.0, prev.1, curr.0, curr.1),
            });
        }
    }
    EvaluationOutcome {
        holds,
        successes: if holds {
            vec![Witness {
                input: "sorted sample".to_owned(),
                detail: if non_decreasing { "non-decreasing" } else { "non-increasing" }.to_owned(),
            }]
        } else {
            Vec::new()
        },
        counterexamples,
        stats: Stats {
            total_count: ordered.len(),
            success_count: if holds { ordered.len() } else { 0 },
        },
    }
}

fn monotonicity() -> PropertyTemplate {
    PropertyTemplate {
        name: "monotonicity",
        category: PropertyCategory::FunctionAnalysis,
        required_futs: 1,
        sample_arity: 1,
        description: "f is non-decreasing or non-increasing over the sampled (ordered) domain",
        compatibility: compat_unary,
        evaluate: monotonicity_eval,
    }
}

// ---------------------------------------------------------------------
// Composition
// ---------------------------------------------------------------------

fn inverse_composition_eval(
    calls: &[&CallFn],
    points: &[Sample],
    comparators: &[Box<dyn ResultComparator>],
    strategy: ComparisonStrategy,
    max_counterexamples: usize,
) -> EvaluationOutcome {
    let (f, g) = (calls[0], calls[1]);
    aggregate_universal(points, max_counterexamples, |point| {
        let Some(a) = point.first() else {
            return PointCheck::Failure("sample had no arguments".to_owned());
        };
        let Some(fa) = f(point) else {
            return PointCheck::Failure("f(a) errored".to_owned());
        };
        let Some(fa_typed) = TypedInput::from_json(&fa) else {
            return PointCheck::Failure("f's result can't be fed into g as an argument".to_owned());
        };
        match g(&[fa_typed]) {
            Some(gfa) if equal(comparators, strategy, &gfa, &a.to_json()) => PointCheck::Success,
            Some(gfa) => PointCheck::Failure(format!("g(f(a)) = {gfa}, expected a = {a}")),
            None => PointCheck::Failure("g(f(a)) errored".to_owned()),
        }
    })
}

fn inverse_composition() -> PropertyTemplate {
    PropertyTemplate {
        name: "inverse_composition",
        category: PropertyCategory::Composition,
        required_futs: 2,
        sample_arity: 1,
        description: "g(f(a)) = a for every sampled a — g is a left inverse of f",
        compatibility: compat_unary_pair,
        evaluate: inverse_composition_eval,
    }
}

fn homomorphism_eval(
    calls: &[&CallFn],
    points: &[Sample],
    comparators: &[Box<dyn ResultComparator>],
    strategy: ComparisonStrategy,
    max_counterexamples: usize,
) -> EvaluationOutcome {
    let (f, op) = (calls[0], calls[1]);
    aggregate_universal(points, max_counterexamples, |point| {
        if point.len() != 2 {
            return PointCheck::Failure("sample did not have exactly two arguments".to_owned());
        }
        let (a, b) = (point[0].clone(), point[1].clone());
        let Some(op_ab) = op(&[a.clone(), b.clone()]) else {
            return PointCheck::Failure("op(a,b) errored".to_owned());
        };
        let Some(op_ab_typed) = TypedInput::from_json(&op_ab) else {
            return PointCheck::Failure("op's result can't be fed into f as an argument".to_owned());
        };
        let Some(f_op_ab) = f(&[op_ab_typed]) else {
            return PointCheck::Failure("f(op(a,b)) errored".to_owned());
        };
        let (Some(fa), Some(fb)) = (f(&[a]), f(&[b])) else {
            return PointCheck::Failure("f(a) or f(b) errored".to_owned());
        };
        let (Some(fa_typed), Some(fb_typed)) = (TypedInput::from_json(&fa), TypedInput::from_json(&fb)) else {
            return PointCheck::Failure("f's result can't be fed into op as an argument".to_owned());
        };
        match op(&[fa_typed, fb_typed]) {
            Some(op_fa_fb) if equal(comparators, strategy, &f_op_ab, &op_fa_fb) => PointCheck::Success,
            Some(op_fa_fb) => PointCheck::Failure(format!("f(op(a,b)) = {f_op_ab}, op(f(a),f(b)) = {op_fa_fb}")),
            None => PointCheck::Failure("op(f(a),f(b)) errored".to_owned()),
        }
    })
}

fn homomorphism() -> PropertyTemplate {
    PropertyTemplate {
        name: "homomorphism",
        category: PropertyCategory::Composition,
        required_futs: 2,
        sample_arity: 2,
        description: "f(op(a,b)) = op(f(a), f(b)) — f is a homomorphism with respect to op",
        compatibility: compat_unary_then_binary,
        evaluate: homomorphism_eval,
    }
}

// ---------------------------------------------------------------------
// Domain-specific: cryptographic
// ---------------------------------------------------------------------

fn determinism_eval(
    calls: &[&CallFn],
    points: &[Sample],
    comparators: &[Box<dyn ResultComparator>],
    strategy: ComparisonStrategy,
    max_counterexamples: usize,
) -> EvaluationOutcome {
    let f = calls[0];
    aggregate_universal(points, max_counterexamples, |point| match (f(point), f(point)) {
        (Some(a), Some(b)) if equal(comparators, strategy, &a, &b) => PointCheck::Success,
        (Some(a), Some(b)) => PointCheck::Failure(format!("repeated calls disagreed: {a} vs {b}")),
        _ => PointCheck::Failure("invocation errored on a repeat call".to_owned()),
    })
}

fn determinism() -> PropertyTemplate {
    PropertyTemplate {
        name: "determinism",
        category: PropertyCategory::DomainSpecific,
        required_futs: 1,
        sample_arity: 1,
        description: "calling f twice with the same input yields the same output",
        compatibility: |arities| arities.len() == 1,
        evaluate: determinism_eval,
    }
}

fn non_identity_eval(
    calls: &[&CallFn],
    points: &[Sample],
    comparators: &[Box<dyn ResultComparator>],
    strategy: ComparisonStrategy,
    max_counterexamples: usize,
) -> EvaluationOutcome {
    let f = calls[0];
    aggregate_universal(points, max_counterexamples, |point| {
        let Some(a) = point.first() else {
            return PointCheck::Failure("sample had no arguments".to_owned());
        };
        match f(point) {
            Some(result) if !equal(comparators, strategy, &result, &a.to_json()) => PointCheck::Success,
            Some(result) => PointCheck::Failure(format!("f(a) = a = {result}")),
            None => PointCheck::Failure("invocation errored".to_owned()),
        }
    })
}

fn non_identity() -> PropertyTemplate {
    PropertyTemplate {
        name: "non_identity",
        category: PropertyCategory::DomainSpecific,
        required_futs: 1,
        sample_arity: 1,
        description: "f(a) != a for every sampled input (f is not the identity function)",
        compatibility: compat_unary,
        evaluate: non_identity_eval,
    }
}

fn avalanche_eval(
    calls: &[&CallFn],
    points: &[Sample],
    comparators: &[Box<dyn ResultComparator>],
    strategy: ComparisonStrategy,
    max_counterexamples: usize,
) -> EvaluationOutcome {
    let f = calls[0];
    aggregate_universal(points, max_counterexamples, |point| {
        let Some(TypedInput::Scalar(Scalar::Int(n))) = point.first() else {
            return PointCheck::Failure("sample's input isn't an integer scalar".to_owned());
        };
        let perturbed = vec![TypedInput::Scalar(Scalar::Int(n.wrapping_add(1)))];
        match (f(point), f(&perturbed)) {
            (Some(a), Some(b)) if !equal(comparators, strategy, &a, &b) => PointCheck::Success,
            (Some(a), Some(b)) => PointCheck::Failure(format!("a one-bit-ish perturbation left the output unchanged: {a} = {b}")),
            _ => PointCheck::Failure("invocation errored".to_owned()),
        }
    })
}

fn avalanche() -> PropertyTemplate {
    PropertyTemplate {
        name: "avalanche",
        category: PropertyCategory::DomainSpecific,
        required_futs: 1,
        sample_arity: 1,
        description: "a small perturbation of the input changes the output (hash-like avalanche behavior)",
        compatibility: compat_unary,
        evaluate: avalanche_eval,
    }
}

// ---------------------------------------------------------------------
// Domain registries
// ---------------------------------------------------------------------

/// Arithmetic operators over numeric scalars: `add`, `sub`, `mul`, and the
/// like (spec §8 S1–S3, S5).
pub fn arithmetic() -> Registry {
    let mut registry = Registry::new();
    for template in [
        commutativity(),
        anti_commutativity(),
        argument_position_dependence(),
        associativity(),
        distributivity(),
        identity_element(),
        absorbing_element(),
        injectivity(),
        fixed_point(),
        monotonicity(),
        inverse_composition(),
        homomorphism(),
    ] {
        registry.insert(template);
    }
    registry
}

/// Boolean operators (`and`, `or`, `xor`): the same algebraic shapes as
/// arithmetic, restricted to the templates meaningful over a two-element
/// domain.
pub fn logical() -> Registry {
    let mut registry = Registry::new();
    for template in [
        commutativity(),
        associativity(),
        idempotence_binary(),
        identity_element(),
        absorbing_element(),
    ] {
        registry.insert(template);
    }
    registry
}

/// Hash/digest-style functions: determinism, non-identity, and avalanche
/// sensitivity (spec §4.5 "cryptographic (avalanche, determinism,
/// non-identity)").
pub fn cryptographic() -> Registry {
    let mut registry = Registry::new();
    for template in [determinism(), non_identity(), avalanche()] {
        registry.insert(template);
    }
    registry
}

/// Set/collection operators (`union`, `merge`): the same commutativity,
/// associativity, and idempotence templates apply unchanged since they are
/// defined generically over any equality-comparable result (spec §8 S4).
pub fn data_structure() -> Registry {
    let mut registry = Registry::new();
    for template in [commutativity(), associativity(), idempotence_binary(), identity_element()] {
        registry.insert(template);
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fut::{ComparisonStrategy, StructuralEquality};
    use crate::typed_input::Scalar;

    fn scalar(n: i64) -> TypedInput {
        TypedInput::Scalar(Scalar::Int(n))
    }

    fn comparators() -> Vec<Box<dyn ResultComparator>> {
        vec![Box::new(StructuralEquality)]
    }

    fn add(args: &[TypedInput]) -> Option<serde_json::Value> {
        match (&args[0], &args[1]) {
            (TypedInput::Scalar(Scalar::Int(a)), TypedInput::Scalar(Scalar::Int(b))) => Some(serde_json::json!(a + b)),
            _ => None,
        }
    }

    fn sub(args: &[TypedInput]) -> Option<serde_json::Value> {
        match (&args[0], &args[1]) {
            (TypedInput::Scalar(Scalar::Int(a)), TypedInput::Scalar(Scalar::Int(b))) => Some(serde_json::json!(a - b)),
            _ => None,
        }
    }

    fn mul(args: &[TypedInput]) -> Option<serde_json::Value> {
        match (&args[0], &args[1]) {
            (TypedInput::Scalar(Scalar::Int(a)), TypedInput::Scalar(Scalar::Int(b))) => Some(serde_json::json!(a * b)),
            _ => None,
        }
    }

    #[test]
    fn commutativity_holds_for_addition() {
        let template = commutativity();
        let calls: Vec<&CallFn> = vec![&add];
        let points = vec![vec![scalar(3), scalar(-7)], vec![scalar(1), scalar(1)]];
        let outcome = (template.evaluate)(&calls, &points, &comparators(), ComparisonStrategy::FirstCompatible, 5);
        assert!(outcome.holds);
        assert_eq!(outcome.stats.total_count, 2);
    }

    #[test]
    fn commutativity_fails_for_subtraction() {
        let template = commutativity();
        let calls: Vec<&CallFn> = vec![&sub];
        let points = vec![vec![scalar(5), scalar(3)]];
        let outcome = (template.evaluate)(&calls, &points, &comparators(), ComparisonStrategy::FirstCompatible, 5);
        assert!(!outcome.holds);
        assert_eq!(outcome.counterexamples.len(), 1);
    }

    #[test]
    fn associativity_holds_for_addition() {
        let template = associativity();
        let calls: Vec<&CallFn> = vec![&add];
        let points = vec![vec![scalar(1), scalar(2), scalar(3)]];
        let outcome = (template.evaluate)(&calls, &points, &comparators(), ComparisonStrategy::FirstCompatible, 5);
        assert!(outcome.holds);
    }

    #[test]
    fn identity_element_finds_one_for_multiplication() {
        let template = identity_element();
        let calls: Vec<&CallFn> = vec![&mul];
        let points = vec![vec![scalar(4), scalar(1)], vec![scalar(7), scalar(1)], vec![scalar(-3), scalar(1)]];
        let outcome = (template.evaluate)(&calls, &points, &comparators(), ComparisonStrategy::FirstCompatible, 5);
        assert!(outcome.holds);
        assert_eq!(outcome.successes[0].input, "1");
    }

    #[test]
    fn injectivity_detects_collisions() {
        let template = injectivity();
        let calls: Vec<&CallFn> = vec![&|_args: &[TypedInput]| Some(serde_json::json!(0))];
        let points = vec![vec![scalar(1)], vec![scalar(2)]];
        let outcome = (template.evaluate)(&calls, &points, &comparators(), ComparisonStrategy::FirstCompatible, 5);
        assert!(!outcome.holds);
    }

    #[test]
    fn compatibility_gate_rejects_wrong_arity() {
        let template = commutativity();
        assert!(!(template.compatibility)(&[Arity::Fixed(1)]));
        assert!((template.compatibility)(&[Arity::Fixed(2)]));
    }
}
