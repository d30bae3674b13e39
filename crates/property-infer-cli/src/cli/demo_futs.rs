//! The dynamic user-module loader and LM oracle service are opaque
//! collaborators this demo stands in for: rather than a real plugin
//! loader, `run` wires an in-process [`property_infer::properties::Registry`]
//! of example functions-under-test, each paired with the canonical grammar
//! that samples its domain.

use property_infer::engine::GrammarSource;
use property_infer::fut::{Arity, FromTypedInput, FutSpec, InvocationError};
use property_infer::typed_input::TypedInput;
use property_infer_grammars::CanonicalGrammar;

/// One bundled function-under-test plus the grammar that samples its input
/// domain, ready to be fed to `PropertyInferenceConfig::with_fut`.
pub struct DemoFut {
    pub name: &'static str,
    pub spec: FutSpec,
    pub grammar: GrammarSource,
}

fn bad_argument(fut: &str, index: usize, reason: impl Into<String>) -> InvocationError {
    InvocationError::BadArgument { fut: fut.to_owned(), index, reason: reason.into() }
}

/// Every demo FUT this binary ships, named to match `spec §8`'s S1–S6
/// scenarios: `add`/`sub`/`mul` (arithmetic), `and`/`or`/`xor` (logical),
/// `union` (data-structure), `toy_hash` (cryptographic), `safe_div`
/// (feedback), `encode`/`decode` (composition).
pub fn all() -> Vec<DemoFut> {
    vec![
        DemoFut {
            name: "add",
            spec: FutSpec::new("add", Arity::Fixed(2), |args: &[TypedInput]| -> Result<serde_json::Value, InvocationError> {
                let a = i64::from_typed(&args[0], "add", 0)?;
                let b = i64::from_typed(&args[1], "add", 1)?;
                Ok(serde_json::json!(a + b))
            }),
            grammar: CanonicalGrammar::IntPairs.grammar_source(),
        },
        DemoFut {
            name: "sub",
            spec: FutSpec::new("sub", Arity::Fixed(2), |args: &[TypedInput]| -> Result<serde_json::Value, InvocationError> {
                let a = i64::from_typed(&args[0], "sub", 0)?;
                let b = i64::from_typed(&args[1], "sub", 1)?;
                Ok(serde_json::json!(a - b))
            }),
            grammar: CanonicalGrammar::IntPairs.grammar_source(),
        },
        DemoFut {
            name: "mul",
            spec: FutSpec::new("mul", Arity::Fixed(2), |args: &[TypedInput]| -> Result<serde_json::Value, InvocationError> {
                let a = i64::from_typed(&args[0], "mul", 0)?;
                let b = i64::from_typed(&args[1], "mul", 1)?;
                Ok(serde_json::json!(a * b))
            }),
            grammar: CanonicalGrammar::IntPairs.grammar_source(),
        },
        DemoFut {
            name: "safe_div",
            spec: FutSpec::new("safe_div", Arity::Fixed(2), |args: &[TypedInput]| -> Result<serde_json::Value, InvocationError> {
                let a = i64::from_typed(&args[0], "safe_div", 0)?;
                let b = i64::from_typed(&args[1], "safe_div", 1)?;
                if b == 0 {
                    return Err(bad_argument("safe_div", 1, "division by zero"));
                }
                Ok(serde_json::json!(a / b))
            }),
            grammar: CanonicalGrammar::SafeDivPairs.grammar_source(),
        },
        DemoFut {
            name: "and",
            spec: FutSpec::new("and", Arity::Fixed(2), |args: &[TypedInput]| -> Result<serde_json::Value, InvocationError> {
                let a = bool::from_typed(&args[0], "and", 0)?;
                let b = bool::from_typed(&args[1], "and", 1)?;
                Ok(serde_json::json!(a && b))
            }),
            grammar: CanonicalGrammar::BoolPairs.grammar_source(),
        },
        DemoFut {
            name: "or",
            spec: FutSpec::new("or", Arity::Fixed(2), |args: &[TypedInput]| -> Result<serde_json::Value, InvocationError> {
                let a = bool::from_typed(&args[0], "or", 0)?;
                let b = bool::from_typed(&args[1], "or", 1)?;
                Ok(serde_json::json!(a || b))
            }),
            grammar: CanonicalGrammar::BoolPairs.grammar_source(),
        },
        DemoFut {
            name: "xor",
            spec: FutSpec::new("xor", Arity::Fixed(2), |args: &[TypedInput]| -> Result<serde_json::Value, InvocationError> {
                let a = bool::from_typed(&args[0], "xor", 0)?;
                let b = bool::from_typed(&args[1], "xor", 1)?;
                Ok(serde_json::json!(a ^ b))
            }),
            grammar: CanonicalGrammar::BoolPairs.grammar_source(),
        },
        DemoFut {
            name: "union",
            spec: FutSpec::new("union", Arity::Fixed(2), |args: &[TypedInput]| -> Result<serde_json::Value, InvocationError> {
                let a = Vec::<i64>::from_typed(&args[0], "union", 0)?;
                let b = Vec::<i64>::from_typed(&args[1], "union", 1)?;
                let mut merged: Vec<i64> = a.into_iter().chain(b).collect();
                merged.sort_unstable();
                merged.dedup();
                Ok(serde_json::json!(merged))
            }),
            grammar: CanonicalGrammar::SetPairs.grammar_source(),
        },
        DemoFut {
            name: "toy_hash",
            spec: FutSpec::new("toy_hash", Arity::Fixed(1), |args: &[TypedInput]| -> Result<serde_json::Value, InvocationError> {
                let a = i64::from_typed(&args[0], "toy_hash", 0)?;
                Ok(serde_json::json!(toy_hash(a)))
            }),
            grammar: CanonicalGrammar::UnaryInts.grammar_source(),
        },
        DemoFut {
            name: "encode",
            spec: FutSpec::new("encode", Arity::Fixed(1), |args: &[TypedInput]| -> Result<serde_json::Value, InvocationError> {
                let content = String::from_typed(&args[0], "encode", 0)?;
                Ok(serde_json::json!(format!("{},{}", content.len(), content)))
            }),
            grammar: CanonicalGrammar::ContentStrings.grammar_source(),
        },
        DemoFut {
            name: "decode",
            spec: FutSpec::new("decode", Arity::Fixed(1), |args: &[TypedInput]| -> Result<serde_json::Value, InvocationError> {
                let packet = String::from_typed(&args[0], "decode", 0)?;
                let (len_part, content) = packet
                    .split_once(',')
                    .ok_or_else(|| bad_argument("decode", 0, "missing length prefix"))?;
                let expected_len: usize = len_part
                    .parse()
                    .map_err(|_| bad_argument("decode", 0, "length prefix is not a number"))?;
                if expected_len != content.len() {
                    return Err(bad_argument("decode", 0, "length prefix does not match payload"));
                }
                Ok(serde_json::json!(content))
            }),
            grammar: CanonicalGrammar::ContentStrings.grammar_source(),
        },
    ]
}

/// A deliberately simple non-cryptographic mixing function — just enough
/// non-linearity for the avalanche/determinism/non-identity templates to
/// have something to check, not a real digest.
fn toy_hash(x: i64) -> i64 {
    let mut h = x as u64;
    h ^= h >> 17;
    h = h.wrapping_mul(0xed5a_d4bb);
    h ^= h >> 11;
    h = h.wrapping_mul(0xac4c_1b51);
    h ^= h >> 15;
    (h & 0x7fff_ffff) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_demo_fut_has_a_distinct_name() {
        let futs = all();
        let mut names: Vec<&str> = futs.iter().map(|f| f.name).collect();
        names.sort_unstable();
        let mut deduped = names.clone();
        deduped.dedup();
        assert_eq!(names, deduped);
    }

    #[test]
    fn toy_hash_is_deterministic_and_not_the_identity() {
        assert_eq!(toy_hash(42), toy_hash(42));
        assert_ne!(toy_hash(42), 42);
    }
}
