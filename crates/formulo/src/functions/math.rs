//! Math functions and constants
//!
//! Arity and numeric argument types are checked by the registry before any of
//! these run, so the implementations index `args` directly through [`number`].

use crate::error::FormulaResult;
use crate::value::Value;
use std::f64::consts;

/// Constants available to every formula unless a binding shadows them
pub const MATH_CONSTANTS: &[(&str, f64)] = &[
    ("PI", consts::PI),
    ("E", consts::E),
    ("LN2", consts::LN_2),
    ("LN10", consts::LN_10),
    ("LOG2E", consts::LOG2_E),
    ("LOG10E", consts::LOG10_E),
    ("SQRT1_2", consts::FRAC_1_SQRT_2),
    ("SQRT2", consts::SQRT_2),
];

/// Look up a math constant
pub fn constant(name: &str) -> Option<f64> {
    MATH_CONSTANTS
        .iter()
        .find(|(constant, _)| *constant == name)
        .map(|(_, value)| *value)
}

fn number(args: &[Value], index: usize) -> f64 {
    args.get(index).and_then(Value::as_number).unwrap_or(f64::NAN)
}

fn numbers(args: &[Value]) -> impl Iterator<Item = f64> + '_ {
    args.iter().map(|arg| arg.as_number().unwrap_or(f64::NAN))
}

macro_rules! unary_fn {
    ($($(#[$doc:meta])* $name:ident => $method:ident;)*) => {
        $(
            $(#[$doc])*
            pub fn $name(args: &[Value]) -> FormulaResult<Value> {
                Ok(Value::Number(number(args, 0).$method()))
            }
        )*
    };
}

unary_fn! {
    fn_abs => abs;
    fn_acos => acos;
    fn_acosh => acosh;
    fn_asin => asin;
    fn_asinh => asinh;
    fn_atan => atan;
    fn_atanh => atanh;
    fn_cbrt => cbrt;
    fn_ceil => ceil;
    fn_cos => cos;
    fn_cosh => cosh;
    fn_exp => exp;
    fn_expm1 => exp_m1;
    fn_floor => floor;
    /// Natural logarithm
    fn_log => ln;
    fn_log10 => log10;
    fn_log1p => ln_1p;
    fn_log2 => log2;
    fn_sin => sin;
    fn_sinh => sinh;
    fn_sqrt => sqrt;
    fn_tan => tan;
    fn_tanh => tanh;
    fn_trunc => trunc;
}

/// ATAN2(y, x)
pub fn fn_atan2(args: &[Value]) -> FormulaResult<Value> {
    Ok(Value::Number(number(args, 0).atan2(number(args, 1))))
}

/// POW(base, exponent)
pub fn fn_pow(args: &[Value]) -> FormulaResult<Value> {
    Ok(Value::Number(number(args, 0).powf(number(args, 1))))
}

/// Nearest single-precision value
pub fn fn_fround(args: &[Value]) -> FormulaResult<Value> {
    Ok(Value::Number(f64::from(number(args, 0) as f32)))
}

/// Round to the nearest integer, halves toward positive infinity
/// (`round(2.5) = 3`, `round(-2.5) = -2`, `round(-0.4) = -0`)
pub fn fn_round(args: &[Value]) -> FormulaResult<Value> {
    let n = number(args, 0);
    // `f64::round` is exact but sends negative halves away from zero
    let mut rounded = n.round();
    if n - rounded == 0.5 {
        rounded += 1.0;
    }
    if rounded == 0.0 {
        rounded = rounded.copysign(n);
    }
    Ok(Value::Number(rounded))
}

/// -1, 0 or 1 (NaN and signed zeros pass through)
pub fn fn_sign(args: &[Value]) -> FormulaResult<Value> {
    let n = number(args, 0);
    let sign = if n > 0.0 {
        1.0
    } else if n < 0.0 {
        -1.0
    } else {
        n
    };
    Ok(Value::Number(sign))
}

/// Uniform in [0, 1)
pub fn fn_random(_args: &[Value]) -> FormulaResult<Value> {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    Ok(Value::Number(rng.gen::<f64>()))
}

/// Square root of the sum of squares, without intermediate overflow
///
/// Any infinite argument wins over NaN.
pub fn fn_hypot(args: &[Value]) -> FormulaResult<Value> {
    if numbers(args).any(f64::is_infinite) {
        return Ok(Value::Number(f64::INFINITY));
    }
    Ok(Value::Number(numbers(args).fold(0.0, f64::hypot)))
}

/// Largest argument, `-Infinity` without arguments; NaN wins
pub fn fn_max(args: &[Value]) -> FormulaResult<Value> {
    let mut max = f64::NEG_INFINITY;
    for n in numbers(args) {
        if n.is_nan() {
            return Ok(Value::Number(f64::NAN));
        }
        max = max.max(n);
    }
    Ok(Value::Number(max))
}

/// Smallest argument, `Infinity` without arguments; NaN wins
pub fn fn_min(args: &[Value]) -> FormulaResult<Value> {
    let mut min = f64::INFINITY;
    for n in numbers(args) {
        if n.is_nan() {
            return Ok(Value::Number(f64::NAN));
        }
        min = min.min(n);
    }
    Ok(Value::Number(min))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(f: fn(&[Value]) -> FormulaResult<Value>, args: &[f64]) -> f64 {
        let args: Vec<Value> = args.iter().map(|n| Value::Number(*n)).collect();
        f(&args).unwrap().as_number().unwrap()
    }

    #[test]
    fn test_constants() {
        assert_eq!(constant("PI"), Some(consts::PI));
        assert_eq!(constant("SQRT1_2"), Some(consts::FRAC_1_SQRT_2));
        assert_eq!(constant("pi"), None);
        assert_eq!(MATH_CONSTANTS.len(), 8);
    }

    #[test]
    fn test_unary_functions() {
        assert_eq!(call(fn_abs, &[-3.0]), 3.0);
        assert_eq!(call(fn_sqrt, &[16.0]), 4.0);
        assert_eq!(call(fn_floor, &[-1.5]), -2.0);
        assert_eq!(call(fn_trunc, &[-1.5]), -1.0);
        assert_eq!(call(fn_log, &[1.0]), 0.0);
        assert!(call(fn_sqrt, &[-1.0]).is_nan());
    }

    #[test]
    fn test_round() {
        assert_eq!(call(fn_round, &[2.5]), 3.0);
        assert_eq!(call(fn_round, &[2.4]), 2.0);
        assert_eq!(call(fn_round, &[-2.5]), -2.0);
        assert_eq!(call(fn_round, &[-2.6]), -3.0);
        assert_eq!(call(fn_round, &[0.49999999999999994]), 0.0);
        assert_eq!(call(fn_round, &[-0.5]), 0.0);
        assert!(call(fn_round, &[-0.5]).is_sign_negative());
        assert!(call(fn_round, &[-0.4]).is_sign_negative());
        assert!(call(fn_round, &[0.4]).is_sign_positive());
        assert_eq!(call(fn_round, &[4503599627370497.0]), 4503599627370497.0);
        assert_eq!(call(fn_round, &[f64::NEG_INFINITY]), f64::NEG_INFINITY);
        assert!(call(fn_round, &[f64::NAN]).is_nan());
    }

    #[test]
    fn test_sign() {
        assert_eq!(call(fn_sign, &[-7.0]), -1.0);
        assert_eq!(call(fn_sign, &[0.0]), 0.0);
        assert_eq!(call(fn_sign, &[3.0]), 1.0);
    }

    #[test]
    fn test_variadic() {
        assert_eq!(call(fn_max, &[1.0, 5.0, 3.0]), 5.0);
        assert_eq!(call(fn_min, &[1.0, 5.0, -3.0]), -3.0);
        assert_eq!(call(fn_max, &[]), f64::NEG_INFINITY);
        assert_eq!(call(fn_min, &[]), f64::INFINITY);
        assert!(call(fn_max, &[1.0, f64::NAN]).is_nan());
        assert_eq!(call(fn_hypot, &[3.0, 4.0]), 5.0);
    }

    #[test]
    fn test_hypot_edge_cases() {
        assert_eq!(call(fn_hypot, &[]), 0.0);
        assert_eq!(call(fn_hypot, &[-3.0]), 3.0);
        assert_eq!(call(fn_hypot, &[1e200, 1e200]), 1e200_f64.hypot(1e200));
        assert!(call(fn_hypot, &[1e200, 1e200]).is_finite());
        assert_eq!(call(fn_hypot, &[f64::INFINITY, f64::NAN]), f64::INFINITY);
        assert_eq!(call(fn_hypot, &[f64::NAN, f64::NEG_INFINITY]), f64::INFINITY);
        assert!(call(fn_hypot, &[1.0, f64::NAN]).is_nan());
    }

    #[test]
    fn test_random_range() {
        for _ in 0..100 {
            let n = call(fn_random, &[]);
            assert!((0.0..1.0).contains(&n));
        }
    }
}
