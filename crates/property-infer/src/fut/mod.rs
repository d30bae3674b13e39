//! Function-under-test wrapping (C4): lets the engine invoke an arbitrary
//! in-process Rust callable uniformly over [`TypedInput`] arguments,
//! recovering panics and enforcing an optional per-call timeout, then
//! comparing results across several FUTs via a [`ResultComparator`].

mod compare;
mod convert;

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

pub use compare::{ComparisonStrategy, ResultComparator, StructuralEquality, compare_all};
pub use convert::FromTypedInput;

use crate::typed_input::TypedInput;

/// How many positional arguments a FUT accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Fixed(usize),
    /// Accepts any number of arguments at or above the given minimum.
    AtLeast(usize),
}

impl Arity {
    /// Whether a call with `given` positional arguments satisfies this
    /// arity — used both by [`FutSpec::invoke`] and by property templates
    /// deciding compatibility (spec §4.5 `compatibility(fut)`).
    pub fn accepts(self, given: usize) -> bool {
        match self {
            Arity::Fixed(n) => given == n,
            Arity::AtLeast(n) => given >= n,
        }
    }
}

#[derive(Debug, Error)]
pub enum ArityError {
    #[error("`{name}` expects {expected:?} argument(s), got {given}")]
    Mismatch {
        name: String,
        expected: Arity,
        given: usize,
    },
}

#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("argument {index} could not be converted for `{fut}`: {reason}")]
    BadArgument { fut: String, index: usize, reason: String },
    #[error("`{0}` panicked during invocation")]
    Panicked(String),
    #[error("`{0}` did not return within its timeout")]
    TimedOut(String),
    #[error(transparent)]
    Arity(#[from] ArityError),
}

/// A function-under-test, type-erased to a uniform `&[TypedInput] ->
/// serde_json::Value` signature so the engine can invoke many unrelated
/// Rust functions through one interface.
pub trait Callable: Send + Sync {
    fn call(&self, args: &[TypedInput]) -> Result<serde_json::Value, InvocationError>;
}

impl<F> Callable for F
where
    F: Fn(&[TypedInput]) -> Result<serde_json::Value, InvocationError> + Send + Sync,
{
    fn call(&self, args: &[TypedInput]) -> Result<serde_json::Value, InvocationError> {
        self(args)
    }
}

/// One invocation's outcome, kept for witness reporting when a property
/// evaluation fails.
#[derive(Debug, Clone)]
pub struct InvocationRecord {
    pub fut_name: String,
    pub args: Vec<TypedInput>,
    pub outcome: Result<serde_json::Value, String>,
    pub elapsed: Duration,
}

/// A named, arity-checked, optionally timed-out function-under-test.
#[derive(Clone)]
pub struct FutSpec {
    pub name: String,
    pub arity: Arity,
    timeout: Option<Duration>,
    callable: Arc<dyn Callable>,
}

impl FutSpec {
    pub fn new(name: impl Into<String>, arity: Arity, callable: impl Callable + 'static) -> Self {
        Self {
            name: name.into(),
            arity,
            timeout: None,
            callable: Arc::new(callable),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Invokes the wrapped callable, checking arity first and, if a timeout
    /// is configured, running the call on a scoped worker thread so a
    /// hanging FUT doesn't block the engine forever (spec §5: FUT calls run
    /// in-process but under an optional deadline).
    pub fn invoke(&self, args: &[TypedInput]) -> InvocationRecord {
        let start = Instant::now();
        let outcome = self.invoke_checked(args);
        InvocationRecord {
            fut_name: self.name.clone(),
            args: args.to_vec(),
            outcome: outcome.map_err(|e| e.to_string()),
            elapsed: start.elapsed(),
        }
    }

    fn invoke_checked(&self, args: &[TypedInput]) -> Result<serde_json::Value, InvocationError> {
        if !self.arity.accepts(args.len()) {
            return Err(InvocationError::Arity(ArityError::Mismatch {
                name: self.name.clone(),
                expected: self.arity,
                given: args.len(),
            }));
        }
        match self.timeout {
            None => call_catching_panics(&self.name, &self.callable, args),
            Some(timeout) => self.invoke_with_timeout(args, timeout),
        }
    }

    fn invoke_with_timeout(
        &self,
        args: &[TypedInput],
        timeout: Duration,
    ) -> Result<serde_json::Value, InvocationError> {
        let callable = Arc::clone(&self.callable);
        let args = args.to_vec();
        let name = self.name.clone();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let result = call_catching_panics(&name, &callable, &args);
            let _ = tx.send(result);
        });
        rx.recv_timeout(timeout)
            .unwrap_or_else(|_| Err(InvocationError::TimedOut(self.name.clone())))
    }
}

fn call_catching_panics(
    name: &str,
    callable: &Arc<dyn Callable>,
    args: &[TypedInput],
) -> Result<serde_json::Value, InvocationError> {
    panic::catch_unwind(AssertUnwindSafe(|| callable.call(args)))
        .unwrap_or_else(|payload| Err(InvocationError::Panicked(panic_message(name, payload))))
}

fn panic_message(name: &str, payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("{name}: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("{name}: {s}")
    } else {
        format!("{name}: non-string panic payload")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add_fut() -> FutSpec {
        FutSpec::new(
            "add",
            Arity::Fixed(2),
            |args: &[TypedInput]| -> Result<serde_json::Value, InvocationError> {
                let a = i64::from_typed(&args[0], "add", 0)?;
                let b = i64::from_typed(&args[1], "add", 1)?;
                Ok(serde_json::json!(a + b))
            },
        )
    }

    #[test]
    fn invokes_a_wrapped_closure() {
        let fut = add_fut();
        let args = vec![TypedInput::Scalar(crate::typed_input::Scalar::Int(2)), TypedInput::Scalar(crate::typed_input::Scalar::Int(3))];
        let record = fut.invoke(&args);
        assert_eq!(record.outcome.unwrap(), serde_json::json!(5));
    }

    #[test]
    fn rejects_wrong_arity() {
        let fut = add_fut();
        let args = vec![TypedInput::Scalar(crate::typed_input::Scalar::Int(2))];
        let record = fut.invoke(&args);
        assert!(record.outcome.is_err());
    }

    #[test]
    fn recovers_from_panics() {
        let fut = FutSpec::new("boom", Arity::Fixed(0), |_: &[TypedInput]| -> Result<serde_json::Value, InvocationError> {
            panic!("deliberate failure");
        });
        let record = fut.invoke(&[]);
        assert!(record.outcome.is_err());
    }
}
