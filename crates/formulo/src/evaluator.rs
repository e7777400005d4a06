//! Formula evaluator
//!
//! Walks a parsed [`Expression`] against an [`EvaluationContext`]. Names are
//! resolved in three tiers: the per-call bindings, the owning formula's members
//! (plus the exposed helpers), and finally the built-in math library.

use crate::ast::{Expression, FunctionCall, LogicalOperator, NamePath};
use crate::error::{FormulaError, FormulaResult};
use crate::functions::{helper_registry, math, math_registry, FunctionDef};
use crate::value::{Binding, Bindings, NativeFunction, Value};
use once_cell::sync::Lazy;

static NO_BINDINGS: Lazy<Bindings> = Lazy::new(Bindings::new);

/// Names visible to one evaluation
///
/// Borrows both scopes for the duration of the walk; the tree itself holds no
/// reference to its owner.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    /// Tier 1: supplied with each call
    pub bindings: &'a Bindings,
    /// Tier 2: members attached to the owning formula
    pub members: &'a Bindings,
}

impl<'a> EvaluationContext<'a> {
    /// Create a new evaluation context
    pub fn new(bindings: &'a Bindings, members: &'a Bindings) -> Self {
        Self { bindings, members }
    }

    /// Create a context with only per-call bindings
    pub fn with_bindings(bindings: &'a Bindings) -> Self {
        Self::new(bindings, &NO_BINDINGS)
    }

    /// Create a context with nothing bound (for testing)
    pub fn simple() -> EvaluationContext<'static> {
        EvaluationContext::new(&NO_BINDINGS, &NO_BINDINGS)
    }
}

/// Something a function-call node can invoke
enum Callee<'a> {
    Native(&'a NativeFunction),
    Builtin(&'static FunctionDef),
}

impl Callee<'_> {
    fn call(&self, args: &[Value]) -> FormulaResult<Value> {
        match self {
            Callee::Native(f) => f.call(args),
            Callee::Builtin(def) => def.call(args),
        }
    }
}

/// Evaluate an expression
pub fn evaluate(expr: &Expression, ctx: &EvaluationContext) -> FormulaResult<Value> {
    match expr {
        Expression::Value(value) => Ok(value.clone()),

        Expression::Bracket(inner) => evaluate(inner, ctx),

        Expression::Arithmetic { op, left, right } => {
            let (l, r) = evaluate_operands(op.symbol(), left, right, ctx)?;
            Ok(Value::Number(op.apply(l, r)))
        }

        Expression::Power { base, exponent } => {
            let (b, e) = evaluate_operands("^", base, exponent, ctx)?;
            Ok(Value::Number(b.powf(e)))
        }

        Expression::Logical { op, left, right } => evaluate_logical(*op, left, right, ctx),

        Expression::FunctionCall(call) => evaluate_function(call, ctx),

        Expression::Variable(path) => resolve_variable(path, ctx),
    }
}

/// Evaluate both sides (left first) and require numbers
fn evaluate_operands(
    operator: &'static str,
    left: &Expression,
    right: &Expression,
    ctx: &EvaluationContext,
) -> FormulaResult<(f64, f64)> {
    let left_val = evaluate(left, ctx)?;
    let right_val = evaluate(right, ctx)?;
    Ok((
        require_number(operator, &left_val)?,
        require_number(operator, &right_val)?,
    ))
}

fn require_number(operator: &'static str, value: &Value) -> FormulaResult<f64> {
    value
        .as_number()
        .ok_or_else(|| FormulaError::NonNumericOperand {
            operator,
            value: value.describe(),
        })
}

fn evaluate_logical(
    op: LogicalOperator,
    left: &Expression,
    right: &Expression,
    ctx: &EvaluationContext,
) -> FormulaResult<Value> {
    let result = if op.is_ordering() {
        let (l, r) = evaluate_operands(op.symbol(), left, right, ctx)?;
        match op {
            LogicalOperator::Less => l < r,
            LogicalOperator::Greater => l > r,
            LogicalOperator::LessEqual => l <= r,
            _ => l >= r,
        }
    } else {
        // Equality compares structurally; a number never equals a string
        let l = evaluate(left, ctx)?;
        let r = evaluate(right, ctx)?;
        (l == r) == (op == LogicalOperator::Equal)
    };

    Ok(Value::Number(if result { 1.0 } else { 0.0 }))
}

fn resolve_variable(path: &NamePath, ctx: &EvaluationContext) -> FormulaResult<Value> {
    let segments = path.segments();

    if let Some(binding) = ctx.bindings.resolve(segments) {
        return binding_value(path, binding);
    }

    if path.is_simple() {
        if let Some(n) = math::constant(&segments[0]) {
            return Ok(Value::Number(n));
        }
    }

    match ctx.members.resolve(segments) {
        Some(binding) => binding_value(path, binding),
        None => Err(FormulaError::VariableNotFound(path.name())),
    }
}

fn binding_value(path: &NamePath, binding: &Binding) -> FormulaResult<Value> {
    match binding {
        Binding::Value(value) => Ok(value.clone()),
        other => Err(FormulaError::NotAValue {
            path: path.name(),
            found: other.kind_name(),
        }),
    }
}

/// Evaluate a function call: arguments first, then three-tier resolution
fn evaluate_function(call: &FunctionCall, ctx: &EvaluationContext) -> FormulaResult<Value> {
    let args = call
        .args
        .iter()
        .map(|arg| evaluate(arg, ctx))
        .collect::<FormulaResult<Vec<_>>>()?;

    resolve_function(call, ctx)?.call(&args)
}

fn resolve_function<'a>(
    call: &FunctionCall,
    ctx: &EvaluationContext<'a>,
) -> FormulaResult<Callee<'a>> {
    let segments = call.path.segments();
    // Set when some tier binds the name to something that cannot be called
    let mut non_callable = false;

    // Tier 1: per-call bindings
    match ctx.bindings.resolve(segments) {
        Some(Binding::Function(f)) => {
            tracing::trace!(function = %call.path, tier = 1, "resolved function");
            return Ok(Callee::Native(f));
        }
        Some(_) => non_callable = true,
        None => {}
    }

    // Tier 2: the formula's own members, guarded by the blacklist
    if call.is_blacklisted() {
        return Err(FormulaError::Blacklisted(call.name()));
    }
    match ctx.members.resolve(segments) {
        Some(Binding::Function(f)) => {
            tracing::trace!(function = %call.path, tier = 2, "resolved function");
            return Ok(Callee::Native(f));
        }
        Some(_) => non_callable = true,
        None => {}
    }
    if call.path.is_simple() {
        if let Some(def) = helper_registry().get(&segments[0]) {
            tracing::trace!(function = %call.path, tier = 2, "resolved helper");
            return Ok(Callee::Builtin(def));
        }
    }

    // Tier 3: the math library
    if call.path.is_simple() {
        if let Some(def) = math_registry().get(&segments[0]) {
            tracing::trace!(function = %call.path, tier = 3, "resolved function");
            return Ok(Callee::Builtin(def));
        }
    }

    if non_callable {
        Err(FormulaError::NotCallable(call.name()))
    } else {
        Err(FormulaError::FunctionNotFound(call.name()))
    }
}
