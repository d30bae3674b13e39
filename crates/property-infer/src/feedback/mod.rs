//! Constraint-refinement feedback loop (C7): mines failing counterexamples,
//! asks an external oracle for new grammar constraints, splices them into
//! the grammar, and retries (spec §4.7).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::generator::{self, DepthLimits};
use crate::grammar::{Grammar, Rule, WherePredicate, parse_alternation_text};

const SPLICE_TRIAL_COUNT: usize = 16;
const SPLICE_TRIAL_SEED: u64 = 0;

/// The oracle request contract (spec §6): the current grammar text, which
/// property is failing and why, and the counterexample renderings that
/// justify asking for a narrower grammar.
#[derive(Debug, Clone, Serialize)]
pub struct OracleRequest {
    pub grammar_text: String,
    pub property_name: String,
    pub property_description: String,
    pub counterexamples: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct OracleResponse {
    #[serde(default)]
    pub constraints: Vec<String>,
}

/// The external constraint-inference collaborator (spec §1: "a pure oracle
/// with a defined request/response contract").
pub trait ConstraintOracle: Send + Sync {
    fn infer_constraints(&self, request: &OracleRequest) -> OracleResponse;
}

/// Always returns no constraints. Used when `feedback_enabled = false` and
/// in tests, so the six end-to-end scenarios of spec §8 stay deterministic
/// without a live network dependency.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullOracle;

impl ConstraintOracle for NullOracle {
    fn infer_constraints(&self, _request: &OracleRequest) -> OracleResponse {
        OracleResponse::default()
    }
}

/// The real oracle: a blocking POST of [`OracleRequest`], expecting
/// [`OracleResponse`] back. Non-200 responses, transport failures, and
/// malformed bodies are all folded into an empty constraint list (spec §7
/// `OracleError` — "equivalent to empty-constraints response").
pub struct HttpOracle {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl std::fmt::Debug for HttpOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpOracle").field("endpoint", &self.endpoint).finish()
    }
}

impl HttpOracle {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_timeout(endpoint, Duration::from_secs(30))
    }

    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .expect("a blocking client with a fixed timeout always builds");
        Self { client, endpoint: endpoint.into() }
    }
}

impl ConstraintOracle for HttpOracle {
    fn infer_constraints(&self, request: &OracleRequest) -> OracleResponse {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .and_then(|resp| resp.json::<OracleResponse>());
        match response {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!(%error, endpoint = %self.endpoint, "oracle call failed; treating as empty constraints");
                OracleResponse::default()
            }
        }
    }
}

/// A constraint the splicer refused to apply, kept for `constraints_history`
/// reporting rather than silently dropped.
#[derive(Debug, Clone)]
pub struct RejectedConstraint {
    pub text: String,
    pub reason: String,
}

/// Applies `constraints` to `target_rule` in `grammar`, producing a new
/// grammar version (spec §5: grammars are never mutated in place). Each
/// constraint is tried first as a `where`-clause (`"where <expr>"`) appended
/// to every alternation of `target_rule`, then as a full replacement of the
/// rule's alternations (spec §4.7 "replacement alternation narrowing a
/// leaf"). A constraint is rejected, and recorded rather than applied, when
/// it parses as neither, or when applying it leaves the grammar failing
/// [`Grammar::validate`] or admitting no string within a bounded trial
/// budget (spec §8 invariant 5, "splice validity").
pub fn splice(grammar: &Grammar, target_rule: &str, constraints: &[String]) -> (Grammar, Vec<RejectedConstraint>) {
    let mut rules = grammar.rules().clone();
    let mut rejected = Vec::new();
    let mut applied_any = false;

    for constraint in constraints {
        let trimmed = constraint.trim();
        if trimmed.is_empty() {
            rejected.push(reject(constraint, "empty constraint"));
            continue;
        }
        let Some(rule) = rules.get(target_rule).cloned() else {
            rejected.push(reject(constraint, format!("unknown non-terminal <{target_rule}>")));
            continue;
        };

        let candidate = if let Some(expr) = trimmed.strip_prefix("where ") {
            with_where_clause(&rule, expr.trim())
        } else {
            match parse_alternation_text(trimmed) {
                Ok(alt) => Rule {
                    alternations: vec![alt],
                    ..rule
                },
                Err(error) => {
                    rejected.push(reject(constraint, error.to_string()));
                    continue;
                }
            }
        };

        let mut trial_rules = rules.clone();
        trial_rules.insert(target_rule.to_owned(), candidate);
        let trial = grammar.clone().with_rules(trial_rules.clone());
        if trial.validate().is_err() || !admits_at_least_one_string(&trial) {
            rejected.push(reject(constraint, "spliced grammar failed to validate or admits no string"));
            continue;
        }
        rules = trial_rules;
        applied_any = true;
    }

    let spliced = if applied_any {
        grammar.clone().with_rules(rules).with_next_version()
    } else {
        grammar.clone()
    };
    (spliced, rejected)
}

fn reject(constraint: &str, reason: impl Into<String>) -> RejectedConstraint {
    RejectedConstraint {
        text: constraint.to_owned(),
        reason: reason.into(),
    }
}

fn with_where_clause(rule: &Rule, expr: &str) -> Rule {
    let predicate = WherePredicate {
        name: "expr".to_owned(),
        raw: expr.to_owned(),
    };
    let mut rule = rule.clone();
    for alt in &mut rule.alternations {
        alt.where_clauses.push(predicate.clone());
    }
    rule
}

fn admits_at_least_one_string(grammar: &Grammar) -> bool {
    let run = generator::generate(grammar, SPLICE_TRIAL_COUNT, SPLICE_TRIAL_SEED, DepthLimits::default(), None);
    !run.samples.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::parse;

    #[test]
    fn null_oracle_always_returns_empty_constraints() {
        let request = OracleRequest {
            grammar_text: "<start> ::= \"a\"".to_owned(),
            property_name: "commutativity".to_owned(),
            property_description: "f(a,b) = f(b,a)".to_owned(),
            counterexamples: vec!["1, 2".to_owned()],
        };
        assert!(NullOracle.infer_constraints(&request).constraints.is_empty());
    }

    #[test]
    fn where_constraint_is_spliced_onto_the_target_rule() {
        let grammar = parse(
            "<start> ::= <a> \",\" <b>\n<a> ::= := int_range(-5, 5)\n<b> ::= := int_range(-5, 5)\n",
        )
        .unwrap();
        let (spliced, rejected) = splice(&grammar, "start", &["where b != 0".to_owned()]);
        assert!(rejected.is_empty());
        assert_eq!(spliced.version(), grammar.version() + 1);
        let run = generator::generate(&spliced, 40, 1, DepthLimits::default(), None);
        assert!(run.samples.iter().all(|s| !s.input.ends_with(", 0")));
    }

    #[test]
    fn replacement_alternation_narrows_a_leaf() {
        let grammar = parse("<start> ::= <digit>\n<digit> ::= \"0\" | \"1\" | \"2\"\n").unwrap();
        let (spliced, rejected) = splice(&grammar, "digit", &["\"1\"".to_owned()]);
        assert!(rejected.is_empty());
        let run = generator::generate(&spliced, 10, 2, DepthLimits::default(), None);
        assert!(run.samples.iter().all(|s| s.input == "1"));
    }

    #[test]
    fn invalid_constraint_is_rejected_not_applied() {
        let grammar = parse("<start> ::= \"a\" | \"b\"\n").unwrap();
        let (spliced, rejected) = splice(&grammar, "start", &["<nonsense".to_owned()]);
        assert_eq!(rejected.len(), 1);
        assert_eq!(spliced.version(), grammar.version());
    }

    #[test]
    fn unsatisfiable_replacement_is_rejected() {
        let grammar = parse("<start> ::= <digit>\n<digit> ::= \"0\"\n").unwrap();
        let (_spliced, rejected) = splice(&grammar, "digit", &["<digit>".to_owned()]);
        assert_eq!(rejected.len(), 1);
    }
}
