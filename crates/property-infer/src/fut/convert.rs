//! Argument converters: recover a concrete Rust type from a [`TypedInput`]
//! so a FUT closure can work with `i64`/`f64`/`bool`/`Vec<i64>` instead of
//! matching on the shaped enum by hand.

use super::InvocationError;
use crate::typed_input::{Scalar, TypedInput};

pub trait FromTypedInput: Sized {
    fn from_typed(input: &TypedInput, fut: &str, index: usize) -> Result<Self, InvocationError>;
}

fn bad_argument(fut: &str, index: usize, reason: impl Into<String>) -> InvocationError {
    InvocationError::BadArgument {
        fut: fut.to_owned(),
        index,
        reason: reason.into(),
    }
}

impl FromTypedInput for i64 {
    fn from_typed(input: &TypedInput, fut: &str, index: usize) -> Result<Self, InvocationError> {
        match input {
            TypedInput::Scalar(Scalar::Int(n)) => Ok(*n),
            TypedInput::Scalar(Scalar::Float(x)) => Ok(*x as i64),
            other => Err(bad_argument(fut, index, format!("expected an integer, got `{other}`"))),
        }
    }
}

impl FromTypedInput for f64 {
    fn from_typed(input: &TypedInput, fut: &str, index: usize) -> Result<Self, InvocationError> {
        match input {
            TypedInput::Scalar(Scalar::Float(x)) => Ok(*x),
            TypedInput::Scalar(Scalar::Int(n)) => Ok(*n as f64),
            other => Err(bad_argument(fut, index, format!("expected a float, got `{other}`"))),
        }
    }
}

impl FromTypedInput for bool {
    fn from_typed(input: &TypedInput, fut: &str, index: usize) -> Result<Self, InvocationError> {
        match input {
            TypedInput::Scalar(Scalar::Bool(b)) => Ok(*b),
            other => Err(bad_argument(fut, index, format!("expected a bool, got `{other}`"))),
        }
    }
}

impl FromTypedInput for String {
    fn from_typed(input: &TypedInput, fut: &str, index: usize) -> Result<Self, InvocationError> {
        match input {
            TypedInput::Scalar(Scalar::Str(s)) => Ok(s.clone()),
            other => Err(bad_argument(fut, index, format!("expected a string, got `{other}`"))),
        }
    }
}

impl FromTypedInput for Vec<i64> {
    fn from_typed(input: &TypedInput, fut: &str, index: usize) -> Result<Self, InvocationError> {
        match input {
            TypedInput::List(items) | TypedInput::Set(items) => items
                .iter()
                .map(|item| i64::from_typed(item, fut, index))
                .collect(),
            other => Err(bad_argument(fut, index, format!("expected a list of integers, got `{other}`"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_scalar_and_list_shapes() {
        let scalar = TypedInput::Scalar(Scalar::Int(7));
        assert_eq!(i64::from_typed(&scalar, "f", 0).unwrap(), 7);

        let list = TypedInput::List(vec![TypedInput::Scalar(Scalar::Int(1)), TypedInput::Scalar(Scalar::Int(2))]);
        assert_eq!(Vec::<i64>::from_typed(&list, "f", 0).unwrap(), vec![1, 2]);
    }

    #[test]
    fn rejects_shape_mismatch() {
        let b = TypedInput::Scalar(Scalar::Bool(true));
        assert!(i64::from_typed(&b, "f", 0).is_err());
    }
}
