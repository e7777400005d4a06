//! Helper functions every formula exposes as its own members

use crate::error::{FormulaError, FormulaResult};
use crate::value::Value;

/// ifElse(predicate, if_true, if_false)
///
/// Both branches arrive already evaluated; there is no short-circuit.
pub fn fn_if_else(args: &[Value]) -> FormulaResult<Value> {
    let [predicate, if_true, if_false] = args else {
        return Err(FormulaError::Argument(
            "ifElse requires 3 arguments".into(),
        ));
    };

    if predicate.is_truthy() {
        Ok(if_true.clone())
    } else {
        Ok(if_false.clone())
    }
}

/// first(value, ...) - Returns the first truthy argument
///
/// Array arguments are searched recursively. When nothing is truthy the last
/// argument (or the fallback found inside it) is returned.
pub fn fn_first(args: &[Value]) -> FormulaResult<Value> {
    if args.is_empty() {
        return Err(FormulaError::Argument(
            "first requires at least 1 argument".into(),
        ));
    }

    let mut fallback = None;
    for arg in args {
        let candidate = match arg {
            Value::Array(items) => fn_first(items)?,
            other => other.clone(),
        };
        if candidate.is_truthy() {
            return Ok(candidate);
        }
        fallback = Some(candidate);
    }

    fallback.ok_or_else(|| FormulaError::Argument("first requires at least 1 argument".into()))
}
