//! Built-in functions
//!
//! Two registries: the numeric library (tier 3) and the helpers every formula
//! exposes as its own members (tier 2).

pub mod helpers;
pub mod math;

use crate::error::{FormulaError, FormulaResult};
use crate::value::Value;
use ahash::AHashMap;
use once_cell::sync::Lazy;

/// Function implementation signature
pub type FunctionImpl = fn(&[Value]) -> FormulaResult<Value>;

/// Function definition
pub struct FunctionDef {
    /// Function name (case-sensitive)
    pub name: &'static str,
    /// Minimum arguments
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    /// Reject non-numeric arguments before calling
    pub numeric_only: bool,
    /// Implementation
    pub implementation: FunctionImpl,
}

impl FunctionDef {
    /// Check arity (and argument types for numeric functions), then call
    pub fn call(&self, args: &[Value]) -> FormulaResult<Value> {
        if args.len() < self.min_args {
            return Err(FormulaError::ArgumentCount {
                function: self.name.to_string(),
                expected: match self.max_args {
                    Some(max) if max == self.min_args => format!("{}", max),
                    _ => format!("at least {}", self.min_args),
                },
                actual: args.len(),
            });
        }

        if let Some(max) = self.max_args {
            if args.len() > max {
                return Err(FormulaError::ArgumentCount {
                    function: self.name.to_string(),
                    expected: if max == self.min_args {
                        format!("{}", max)
                    } else {
                        format!("at most {}", max)
                    },
                    actual: args.len(),
                });
            }
        }

        if self.numeric_only {
            if let Some(bad) = args.iter().find(|arg| !arg.is_number()) {
                return Err(FormulaError::NonNumericArgument {
                    function: self.name.to_string(),
                    value: bad.describe(),
                });
            }
        }

        (self.implementation)(args)
    }
}

/// Function registry
pub struct FunctionRegistry {
    functions: AHashMap<&'static str, FunctionDef>,
}

impl FunctionRegistry {
    fn empty() -> Self {
        Self {
            functions: AHashMap::new(),
        }
    }

    /// The numeric library
    pub fn math() -> Self {
        let mut registry = Self::empty();
        registry.register_math_functions();
        registry
    }

    /// `ifElse` and `first`
    pub fn helpers() -> Self {
        let mut registry = Self::empty();
        registry.register_helper_functions();
        registry
    }

    /// Look up a function by name
    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.functions.keys().copied()
    }

    /// Register a function
    pub fn register(&mut self, def: FunctionDef) {
        self.functions.insert(def.name, def);
    }

    fn numeric(&mut self, name: &'static str, args: usize, implementation: FunctionImpl) {
        self.register(FunctionDef {
            name,
            min_args: args,
            max_args: Some(args),
            numeric_only: true,
            implementation,
        });
    }

    fn register_math_functions(&mut self) {
        use math::*;

        self.numeric("abs", 1, fn_abs);
        self.numeric("acos", 1, fn_acos);
        self.numeric("acosh", 1, fn_acosh);
        self.numeric("asin", 1, fn_asin);
        self.numeric("asinh", 1, fn_asinh);
        self.numeric("atan", 1, fn_atan);
        self.numeric("atan2", 2, fn_atan2);
        self.numeric("atanh", 1, fn_atanh);
        self.numeric("cbrt", 1, fn_cbrt);
        self.numeric("ceil", 1, fn_ceil);
        self.numeric("cos", 1, fn_cos);
        self.numeric("cosh", 1, fn_cosh);
        self.numeric("exp", 1, fn_exp);
        self.numeric("expm1", 1, fn_expm1);
        self.numeric("floor", 1, fn_floor);
        self.numeric("fround", 1, fn_fround);
        self.numeric("log", 1, fn_log);
        self.numeric("log10", 1, fn_log10);
        self.numeric("log1p", 1, fn_log1p);
        self.numeric("log2", 1, fn_log2);
        self.numeric("pow", 2, fn_pow);
        self.numeric("random", 0, fn_random);
        self.numeric("round", 1, fn_round);
        self.numeric("sign", 1, fn_sign);
        self.numeric("sin", 1, fn_sin);
        self.numeric("sinh", 1, fn_sinh);
        self.numeric("sqrt", 1, fn_sqrt);
        self.numeric("tan", 1, fn_tan);
        self.numeric("tanh", 1, fn_tanh);
        self.numeric("trunc", 1, fn_trunc);

        // Variadic
        let variadic: [(&'static str, FunctionImpl); 3] =
            [("hypot", fn_hypot), ("max", fn_max), ("min", fn_min)];
        for (name, implementation) in variadic {
            self.register(FunctionDef {
                name,
                min_args: 0,
                max_args: None,
                numeric_only: true,
                implementation,
            });
        }
    }

    fn register_helper_functions(&mut self) {
        // IFELSE
        self.register(FunctionDef {
            name: "ifElse",
            min_args: 3,
            max_args: Some(3),
            numeric_only: false,
            implementation: helpers::fn_if_else,
        });

        // FIRST
        self.register(FunctionDef {
            name: "first",
            min_args: 1,
            max_args: None,
            numeric_only: false,
            implementation: helpers::fn_first,
        });
    }
}

static MATH_REGISTRY: Lazy<FunctionRegistry> = Lazy::new(FunctionRegistry::math);
static HELPER_REGISTRY: Lazy<FunctionRegistry> = Lazy::new(FunctionRegistry::helpers);

/// The tier-3 numeric library
pub fn math_registry() -> &'static FunctionRegistry {
    &MATH_REGISTRY
}

/// The helpers exposed as formula members
pub fn helper_registry() -> &'static FunctionRegistry {
    &HELPER_REGISTRY
}
