//! # formulo
//!
//! Formula parser and evaluator for arithmetic expressions over named variables.
//!
//! This crate provides:
//! - Tokenizing and parsing (text → AST)
//! - Evaluation with three-tier name resolution (bindings → formula members → math library)
//! - Canonical re-rendering of parsed formulas
//! - Optional memoization of results by bindings
//!
//! ## Example
//!
//! ```rust
//! use formulo::{Bindings, Formula, Value};
//!
//! let formula = Formula::new("x ^ 2 + sin(PI / 2)")?;
//! let results = formula.evaluate_all(&[
//!     Bindings::new().with("x", 1.0),
//!     Bindings::new().with("x", 2.0),
//! ])?;
//! assert_eq!(results, vec![Value::Number(2.0), Value::Number(5.0)]);
//! # Ok::<(), formulo::FormulaError>(())
//! ```

pub mod ast;
pub mod blacklist;
pub mod error;
pub mod evaluator;
pub mod formula;
pub mod functions;
pub mod parser;
pub mod tokenizer;
pub mod value;

pub use ast::{
    ArithmeticOperator, BinaryOperator, Expression, FunctionCall, LogicalOperator, NamePath,
};
pub use blacklist::{blacklist_function, is_blacklisted};
pub use error::{ErrorKind, FormulaError, FormulaResult};
pub use evaluator::{evaluate, EvaluationContext};
pub use formula::{Formula, FormulaOptions};
pub use parser::{parse_formula, ParsedFormula};
pub use value::{Binding, Bindings, NativeFunction, Value};
