//! Property inference engine (C6): orchestrates `(fut, template)` pairs —
//! sampling inputs through C2/C3, invoking the FUT through C4, evaluating
//! through C5 — and drives the C7 feedback loop on failure.

use indexmap::IndexMap;
use rayon::prelude::*;

use crate::feedback::{ConstraintOracle, NullOracle, OracleRequest, splice};
use crate::fut::{ComparisonStrategy, FutSpec, ResultComparator};
use crate::generator::{self, DepthLimits, InputCache};
use crate::grammar::Grammar;
use crate::properties::{CallFn, EvaluationOutcome, PropertyTemplate, Registry, Sample};
use crate::typed_input::{self, ParserMode, TypedInput};

/// Where one FUT's sample inputs come from: a grammar plus how the
/// generated string is shaped into a typed input (spec §4.6 "grammar_path,
/// parser").
#[derive(Debug, Clone)]
pub struct GrammarSource {
    pub grammar: Grammar,
    pub parser_mode: ParserMode,
}

impl GrammarSource {
    pub fn new(grammar: Grammar, parser_mode: ParserMode) -> Self {
        Self { grammar, parser_mode }
    }
}

/// A single `(fut, template)` or `(fut_pair, template)` verdict. Generation
/// or parse failures past the per-FUT budget (spec §7) produce
/// `Inconclusive` instead of an [`EvaluationOutcome`].
#[derive(Debug, Clone)]
pub enum Verdict {
    Evaluated(EvaluationOutcome),
    Inconclusive { reason: String },
}

impl Verdict {
    pub fn holds(&self) -> bool {
        matches!(self, Verdict::Evaluated(outcome) if outcome.holds)
    }
}

/// Per-FUT results, matching spec §6's Results schema: `outcomes` keyed by
/// property name (composition properties key as `"name[other_fut]"` since
/// they relate a pair — see DESIGN.md), `constraints_history` the accepted
/// constraint sets applied across feedback iterations.
#[derive(Debug, Clone, Default)]
pub struct FutResults {
    pub outcomes: IndexMap<String, Verdict>,
    pub constraints_history: IndexMap<String, Vec<Vec<String>>>,
}

/// `{ fut_name → FutResults }`, the top-level shape the CLI serializes.
pub type RunResults = IndexMap<String, FutResults>;

const DEFAULT_CACHE_CAPACITY: usize = 10_000;

/// Engine configuration (spec §4.6 `configure(...)`). Built with the
/// teacher's fluent `with_*` method-chaining style (see [`FutSpec`]).
pub struct PropertyInferenceConfig {
    registry: Registry,
    futs: IndexMap<String, (FutSpec, GrammarSource)>,
    example_count: usize,
    max_counterexamples: usize,
    comparators: Vec<Box<dyn ResultComparator>>,
    comparison_strategy: ComparisonStrategy,
    use_input_cache: bool,
    feedback_enabled: bool,
    max_feedback_attempts: usize,
    parallel: bool,
    depth_limits: DepthLimits,
    seed: u64,
    property_filter: Option<Vec<String>>,
    oracle: Box<dyn ConstraintOracle>,
}

impl std::fmt::Debug for PropertyInferenceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyInferenceConfig")
            .field("futs", &self.futs.keys().collect::<Vec<_>>())
            .field("example_count", &self.example_count)
            .field("feedback_enabled", &self.feedback_enabled)
            .field("parallel", &self.parallel)
            .finish()
    }
}

impl PropertyInferenceConfig {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            futs: IndexMap::new(),
            example_count: 100,
            max_counterexamples: 5,
            comparators: Vec::new(),
            comparison_strategy: ComparisonStrategy::FirstCompatible,
            use_input_cache: true,
            feedback_enabled: false,
            max_feedback_attempts: 3,
            parallel: false,
            depth_limits: DepthLimits::default(),
            seed: 0,
            property_filter: None,
            oracle: Box::new(NullOracle),
        }
    }

    pub fn with_fut(mut self, name: impl Into<String>, fut: FutSpec, grammar: GrammarSource) -> Self {
        self.futs.insert(name.into(), (fut, grammar));
        self
    }

    pub fn with_example_count(mut self, count: usize) -> Self {
        self.example_count = count;
        self
    }

    pub fn with_max_counterexamples(mut self, max: usize) -> Self {
        self.max_counterexamples = max;
        self
    }

    pub fn with_comparator(mut self, comparator: Box<dyn ResultComparator>) -> Self {
        self.comparators.push(comparator);
        self
    }

    pub fn with_comparison_strategy(mut self, strategy: ComparisonStrategy) -> Self {
        self.comparison_strategy = strategy;
        self
    }

    pub fn with_input_cache(mut self, enabled: bool) -> Self {
        self.use_input_cache = enabled;
        self
    }

    pub fn with_feedback(mut self, enabled: bool, oracle: Box<dyn ConstraintOracle>, max_attempts: usize) -> Self {
        self.feedback_enabled = enabled;
        self.oracle = oracle;
        self.max_feedback_attempts = max_attempts;
        self
    }

    pub fn with_parallel(mut self, enabled: bool) -> Self {
        self.parallel = enabled;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_property_filter(mut self, names: Vec<String>) -> Self {
        self.property_filter = Some(names);
        self
    }

    fn is_selected(&self, name: &str) -> bool {
        self.property_filter.as_ref().is_none_or(|names| names.iter().any(|n| n == name))
    }

    fn failure_budget(&self) -> usize {
        self.example_count / 4
    }

    /// Orchestrates every applicable `(fut, template)` pair (spec §4.6
    /// steps 1-4). Single-FUT templates run against each registered FUT;
    /// Composition templates (`required_futs == 2`) run against every
    /// ordered pair of distinct FUTs whose arities the template accepts.
    /// Runs sequentially unless `parallel` is set (spec §5: "gated by a
    /// flag disabled by default").
    pub fn run(&self) -> RunResults {
        let jobs = self.applicable_jobs();
        let outcomes: Vec<(String, String, Verdict, Vec<Vec<String>>)> = if self.parallel {
            jobs.into_par_iter().map(|job| self.run_job(job)).collect()
        } else {
            jobs.into_iter().map(|job| self.run_job(job)).collect()
        };

        let mut results: RunResults = IndexMap::new();
        for name in self.futs.keys() {
            results.insert(name.clone(), FutResults::default());
        }
        for (fut_name, property_key, verdict, history) in outcomes {
            let entry = results.entry(fut_name).or_default();
            if !history.is_empty() {
                entry.constraints_history.insert(property_key.clone(), history);
            }
            entry.outcomes.insert(property_key, verdict);
        }
        results
    }

    fn applicable_jobs(&self) -> Vec<Job<'_>> {
        let mut jobs = Vec::new();
        for template in self.registry.get_all() {
            if !self.is_selected(template.name) {
                continue;
            }
            if template.required_futs == 1 {
                for (fut_name, (fut, grammar)) in &self.futs {
                    if (template.compatibility)(&[fut.arity]) {
                        jobs.push(Job::Single { template, fut_name, fut, grammar });
                    }
                }
            } else if template.required_futs == 2 {
                for (primary_name, (primary, grammar)) in &self.futs {
                    for (other_name, (other, _)) in &self.futs {
                        if primary_name == other_name {
                            continue;
                        }
                        if (template.compatibility)(&[primary.arity, other.arity]) {
                            jobs.push(Job::Pair {
                                template,
                                primary_name,
                                primary,
                                other_name,
                                other,
                                grammar,
                            });
                        }
                    }
                }
            }
        }
        jobs
    }

    fn run_job(&self, job: Job<'_>) -> (String, String, Verdict, Vec<Vec<String>>) {
        match job {
            Job::Single { template, fut_name, fut, grammar } => {
                let call = call_closure(fut);
                let calls: [&CallFn; 1] = [&call];
                let (verdict, history) = self.evaluate_with_feedback(template, &calls, grammar);
                (fut_name.clone(), template.name.to_owned(), verdict, history)
            }
            Job::Pair { template, primary_name, primary, other_name, other, grammar } => {
                let primary_call = call_closure(primary);
                let other_call = call_closure(other);
                let calls: [&CallFn; 2] = [&primary_call, &other_call];
                let (verdict, history) = self.evaluate_with_feedback(template, &calls, grammar);
                (primary_name.clone(), format!("{}[{}]", template.name, other_name), verdict, history)
            }
        }
    }

    /// Evaluates `template` against `calls`, re-sampling against a freshly
    /// spliced grammar up to `max_feedback_attempts` times while the
    /// property does not hold and feedback is enabled (spec §4.6 step 3,
    /// §4.7). Feedback always targets the grammar's start rule (see
    /// DESIGN.md for why this simplification is sound for the canonical
    /// grammars this workspace ships).
    fn evaluate_with_feedback(
        &self,
        template: &PropertyTemplate,
        calls: &[&CallFn],
        grammar_source: &GrammarSource,
    ) -> (Verdict, Vec<Vec<String>>) {
        let mut grammar = grammar_source.grammar.clone();
        let mut history = Vec::new();
        let mut cache = self.use_input_cache.then(|| InputCache::new(DEFAULT_CACHE_CAPACITY));

        for attempt in 0..=self.max_feedback_attempts {
            let (points, failures) =
                self.generate_points(&grammar, grammar_source.parser_mode, template.sample_arity, cache.as_mut());
            if failures > self.failure_budget() {
                return (
                    Verdict::Inconclusive {
                        reason: format!(
                            "generation/parse failures ({failures}) exceeded the per-FUT budget ({})",
                            self.failure_budget()
                        ),
                    },
                    history,
                );
            }

            let outcome = (template.evaluate)(calls, &points, &self.comparators, self.comparison_strategy, self.max_counterexamples);
            let holds = outcome.holds;
            if holds || !self.feedback_enabled || attempt == self.max_feedback_attempts {
                return (Verdict::Evaluated(outcome), history);
            }

            let request = OracleRequest {
                grammar_text: grammar.to_string(),
                property_name: template.name.to_owned(),
                property_description: template.description.to_owned(),
                counterexamples: outcome.counterexamples.iter().map(|w| w.input.clone()).collect(),
            };
            let response = self.oracle.infer_constraints(&request);
            if response.constraints.is_empty() {
                return (Verdict::Evaluated(outcome), history);
            }

            let (spliced, rejected) = splice(&grammar, grammar.start_symbol(), &response.constraints);
            for r in &rejected {
                tracing::debug!(constraint = %r.text, reason = %r.reason, "rejected oracle constraint");
            }
            let applied: Vec<String> = response
                .constraints
                .iter()
                .filter(|c| !rejected.iter().any(|r| &r.text == *c))
                .cloned()
                .collect();
            if applied.is_empty() {
                return (Verdict::Evaluated(outcome), history);
            }
            history.push(applied);
            grammar = spliced;
        }
        unreachable!("the loop always returns by the `attempt == max_feedback_attempts` branch")
    }

    /// Draws `example_count` strings from `grammar`, parses each into a
    /// [`TypedInput`], flattens every parse's positional values into one
    /// pool, and re-chunks the pool into `sample_arity`-wide points
    /// (dropping a trailing incomplete chunk). A grammar whose rule already
    /// yields one value per FUT argument (the canonical case, e.g.
    /// `int_pairs.fan` emitting `"3, -7"` for a binary FUT) produces points
    /// that line up 1:1 with generated strings; a template that needs more
    /// values per point than the FUT's own arity (associativity needs 3 for
    /// a binary FUT) draws across generated-string boundaries instead — see
    /// DESIGN.md for the reasoning behind this policy.
    fn generate_points(
        &self,
        grammar: &Grammar,
        parser_mode: ParserMode,
        sample_arity: usize,
        cache: Option<&mut InputCache>,
    ) -> (Vec<Sample>, usize) {
        let run = generator::generate(grammar, self.example_count, self.seed, self.depth_limits, cache);
        let mut pool: Vec<TypedInput> = Vec::new();
        let mut parse_failures = 0usize;
        for sample in &run.samples {
            match typed_input::parse(&sample.input, parser_mode) {
                Ok(value) => pool.extend(positional_values(value)),
                Err(_) => parse_failures += 1,
            }
        }
        let points: Vec<Sample> = if sample_arity == 0 {
            Vec::new()
        } else {
            pool.chunks_exact(sample_arity).map(<[TypedInput]>::to_vec).collect()
        };
        (points, run.failures + parse_failures)
    }
}

enum Job<'a> {
    Single {
        template: &'a PropertyTemplate,
        fut_name: &'a String,
        fut: &'a FutSpec,
        grammar: &'a GrammarSource,
    },
    Pair {
        template: &'a PropertyTemplate,
        primary_name: &'a String,
        primary: &'a FutSpec,
        other_name: &'a String,
        other: &'a FutSpec,
        grammar: &'a GrammarSource,
    },
}

fn positional_values(value: TypedInput) -> Vec<TypedInput> {
    match value {
        TypedInput::List(items) | TypedInput::Set(items) | TypedInput::Tuple(items) => items,
        scalar @ TypedInput::Scalar(_) => vec![scalar],
    }
}

fn call_closure(fut: &FutSpec) -> impl Fn(&[TypedInput]) -> Option<serde_json::Value> + '_ {
    move |args: &[TypedInput]| fut.invoke(args).outcome.ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fut::{Arity, FromTypedInput, FutSpec, InvocationError};
    use crate::grammar::parse;
    use crate::properties;
    use crate::typed_input::TypedInput;

    fn int_pairs_grammar() -> GrammarSource {
        let grammar = parse("<start> ::= <a> \", \" <b>\n<a> ::= := int_range(-10, 10)\n<b> ::= := int_range(-10, 10)\n").unwrap();
        GrammarSource::new(grammar, ParserMode::Numbers)
    }

    fn add_fut() -> FutSpec {
        FutSpec::new("add", Arity::Fixed(2), |args: &[TypedInput]| -> Result<serde_json::Value, InvocationError> {
            let a = i64::from_typed(&args[0], "add", 0)?;
            let b = i64::from_typed(&args[1], "add", 1)?;
            Ok(serde_json::json!(a + b))
        })
    }

    fn sub_fut() -> FutSpec {
        FutSpec::new("sub", Arity::Fixed(2), |args: &[TypedInput]| -> Result<serde_json::Value, InvocationError> {
            let a = i64::from_typed(&args[0], "sub", 0)?;
            let b = i64::from_typed(&args[1], "sub", 1)?;
            Ok(serde_json::json!(a - b))
        })
    }

    fn set_pairs_grammar() -> GrammarSource {
        let grammar = parse(
            "<start> ::= \"(\" <set> \", \" <set> \")\"\n<set> ::= \"{\" <elems> \"}\"\n<elems> ::= <digit> | <digit> \",\" <digit> | <digit> \",\" <digit> \",\" <digit>\n<digit> ::= \"1\" | \"2\" | \"3\" | \"4\" | \"5\"\n",
        )
        .unwrap();
        GrammarSource::new(grammar, ParserMode::Numbers)
    }

    fn union_fut() -> FutSpec {
        FutSpec::new("union", Arity::Fixed(2), |args: &[TypedInput]| -> Result<serde_json::Value, InvocationError> {
            let a = Vec::<i64>::from_typed(&args[0], "union", 0)?;
            let b = Vec::<i64>::from_typed(&args[1], "union", 1)?;
            let mut merged: Vec<i64> = a.into_iter().chain(b).collect();
            merged.sort_unstable();
            merged.dedup();
            Ok(serde_json::json!(merged))
        })
    }

    #[test]
    fn set_union_associativity_and_idempotence_hold_end_to_end() {
        // Regression for a collection-valued FUT (returns a JSON array, not
        // a scalar): `associativity`/`idempotence_binary` must be able to
        // feed `union`'s own result back in as an argument to a second
        // call, not just a bare scalar (spec §8 S4).
        let config = PropertyInferenceConfig::new(properties::data_structure())
            .with_fut("union", union_fut(), set_pairs_grammar())
            .with_example_count(60)
            .with_property_filter(vec!["associativity".to_owned(), "idempotence_binary".to_owned()]);
        let results = config.run();
        let associativity = results["union"].outcomes.get("associativity").expect("evaluated");
        assert!(associativity.holds(), "union associativity should hold once collection results regroup");
        let idempotence = results["union"].outcomes.get("idempotence_binary").expect("evaluated");
        assert!(idempotence.holds(), "union(a,a) = a should hold once set equality ignores ordering");
    }

    #[test]
    fn commutative_addition_holds_with_full_confidence() {
        let config = PropertyInferenceConfig::new(properties::arithmetic())
            .with_fut("add", add_fut(), int_pairs_grammar())
            .with_example_count(50)
            .with_feedback(false, Box::new(crate::feedback::NullOracle), 0)
            .with_property_filter(vec!["commutativity".to_owned()]);
        let results = config.run();
        let verdict = results["add"].outcomes.get("commutativity").expect("evaluated");
        assert!(verdict.holds());
    }

    #[test]
    fn non_commutative_subtraction_is_falsified_with_a_witness() {
        let config = PropertyInferenceConfig::new(properties::arithmetic())
            .with_fut("sub", sub_fut(), int_pairs_grammar())
            .with_example_count(50)
            .with_property_filter(vec!["commutativity".to_owned()]);
        let results = config.run();
        let Verdict::Evaluated(outcome) = results["sub"].outcomes.get("commutativity").expect("evaluated") else {
            panic!("expected an evaluated outcome");
        };
        assert!(!outcome.holds);
        assert!(!outcome.counterexamples.is_empty());
    }

    #[test]
    fn incompatible_arity_produces_no_entry() {
        let unary = FutSpec::new("neg", Arity::Fixed(1), |args: &[TypedInput]| -> Result<serde_json::Value, InvocationError> {
            let a = i64::from_typed(&args[0], "neg", 0)?;
            Ok(serde_json::json!(-a))
        });
        let grammar = parse("<start> ::= := int_range(-10, 10)\n").unwrap();
        let config = PropertyInferenceConfig::new(properties::arithmetic())
            .with_fut("neg", unary, GrammarSource::new(grammar, ParserMode::Numbers))
            .with_property_filter(vec!["commutativity".to_owned()]);
        let results = config.run();
        assert!(results["neg"].outcomes.get("commutativity").is_none());
    }

    #[test]
    fn feedback_loop_records_applied_constraints_when_property_initially_fails() {
        struct DivideByZeroIsSuggested;
        impl ConstraintOracle for DivideByZeroIsSuggested {
            fn infer_constraints(&self, _req: &OracleRequest) -> crate::feedback::OracleResponse {
                crate::feedback::OracleResponse {
                    constraints: vec!["where b != 0".to_owned()],
                }
            }
        }
        let safe_div = FutSpec::new("safe_div", Arity::Fixed(2), |args: &[TypedInput]| -> Result<serde_json::Value, InvocationError> {
            let a = i64::from_typed(&args[0], "safe_div", 0)?;
            let b = i64::from_typed(&args[1], "safe_div", 1)?;
            if b == 0 {
                return Err(InvocationError::BadArgument {
                    fut: "safe_div".to_owned(),
                    index: 1,
                    reason: "division by zero".to_owned(),
                });
            }
            Ok(serde_json::json!(a / b))
        });
        let grammar = parse("<start> ::= <a> \", \" <b>\n<a> ::= := int_range(1, 5)\n<b> ::= := int_range(0, 3)\n").unwrap();
        let config = PropertyInferenceConfig::new(properties::arithmetic())
            .with_fut("safe_div", safe_div, GrammarSource::new(grammar, ParserMode::Numbers))
            .with_example_count(60)
            .with_feedback(true, Box::new(DivideByZeroIsSuggested), 2)
            .with_property_filter(vec!["associativity".to_owned()]);
        let results = config.run();
        let history = results["safe_div"].constraints_history.get("associativity");
        assert!(history.is_some_and(|h| !h.is_empty()));
    }
}
