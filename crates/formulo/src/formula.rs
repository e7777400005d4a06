//! The formula facade
//!
//! A [`Formula`] owns the parsed tree, the free-variable list, an optional
//! memoization cache and a scope of attached members consulted as the second
//! resolution tier.

use crate::ast::Expression;
use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::{evaluate, EvaluationContext};
use crate::parser::parse_formula;
use crate::value::{Binding, Bindings, Value};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Options recognized by [`Formula::with_options`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormulaOptions {
    /// Cache results by the serialized bindings
    pub memoization: bool,
}

/// A parsed formula ready for evaluation
///
/// # Example
/// ```rust
/// use formulo::{Bindings, Formula, Value};
///
/// let formula = Formula::new("10 - x * 2 + y").unwrap();
/// assert_eq!(formula.variables(), ["x", "y"]);
///
/// let bindings = Bindings::new().with("x", 3.0).with("y", 5.0);
/// assert_eq!(formula.evaluate(&bindings).unwrap(), Value::Number(9.0));
/// ```
#[derive(Debug)]
pub struct Formula {
    source: String,
    expression: Option<Expression>,
    variables: Vec<String>,
    options: FormulaOptions,
    members: Bindings,
    cache: Mutex<AHashMap<String, Value>>,
}

impl Formula {
    /// Parse a formula with default options
    ///
    /// An empty string yields a formula without an expression; evaluating it
    /// fails until [`set_formula`](Self::set_formula) is called.
    pub fn new(source: &str) -> FormulaResult<Self> {
        Self::with_options(source, FormulaOptions::default())
    }

    /// Parse a formula with explicit options
    pub fn with_options(source: &str, options: FormulaOptions) -> FormulaResult<Self> {
        let mut formula = Self {
            source: String::new(),
            expression: None,
            variables: Vec::new(),
            options,
            members: Bindings::new(),
            cache: Mutex::new(AHashMap::new()),
        };
        formula.set_formula(source)?;
        Ok(formula)
    }

    /// Parse and evaluate in one step
    pub fn calc(source: &str, bindings: &Bindings) -> FormulaResult<Value> {
        Self::calc_with_options(source, bindings, FormulaOptions::default())
    }

    pub fn calc_with_options(
        source: &str,
        bindings: &Bindings,
        options: FormulaOptions,
    ) -> FormulaResult<Value> {
        Self::with_options(source, options)?.evaluate(bindings)
    }

    /// Replace the formula
    ///
    /// Resets the tree, the variable list and the cache. An empty string leaves
    /// the formula unchanged. On a parse error the previous formula is kept.
    pub fn set_formula(&mut self, source: &str) -> FormulaResult<&mut Self> {
        if source.is_empty() {
            return Ok(self);
        }

        let parsed = parse_formula(source)?;
        tracing::debug!(
            formula = source,
            variables = parsed.variables.len(),
            "parsed formula"
        );

        self.source = source.to_string();
        self.expression = Some(parsed.expression);
        self.variables = parsed.variables;
        self.cache_mut().clear();
        Ok(self)
    }

    /// Evaluate against one set of bindings
    pub fn evaluate(&self, bindings: &Bindings) -> FormulaResult<Value> {
        let expression = self.expression.as_ref().ok_or(FormulaError::NoExpression)?;

        if !self.options.memoization {
            return self.evaluate_expression(expression, bindings);
        }

        let key = bindings.cache_key()?;
        if let Some(cached) = self.lock_cache().get(&key) {
            tracing::trace!(%key, "memoization cache hit");
            return Ok(cached.clone());
        }

        tracing::trace!(%key, "memoization cache miss");
        // The lock is released while evaluating; concurrent misses may both compute.
        let result = self.evaluate_expression(expression, bindings)?;
        self.lock_cache().insert(key, result.clone());
        Ok(result)
    }

    /// Evaluate against each set of bindings in order
    ///
    /// The first failure aborts the whole batch.
    pub fn evaluate_all(&self, bindings: &[Bindings]) -> FormulaResult<Vec<Value>> {
        bindings.iter().map(|b| self.evaluate(b)).collect()
    }

    fn evaluate_expression(
        &self,
        expression: &Expression,
        bindings: &Bindings,
    ) -> FormulaResult<Value> {
        evaluate(expression, &EvaluationContext::new(bindings, &self.members))
    }

    /// Free variables in first-occurrence order
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn expression(&self) -> Option<&Expression> {
        self.expression.as_ref()
    }

    /// Canonical rendering of the parsed formula (empty without one)
    pub fn expression_string(&self) -> String {
        self.expression
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default()
    }

    /// The string the current formula was parsed from
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn options(&self) -> FormulaOptions {
        self.options
    }

    pub fn enable_memoization(&mut self) {
        self.options.memoization = true;
    }

    /// Turn memoization off and drop every cached result
    pub fn disable_memoization(&mut self) {
        self.options.memoization = false;
        self.cache_mut().clear();
    }

    pub fn is_memoization_enabled(&self) -> bool {
        self.options.memoization
    }

    /// Number of memoized results
    pub fn cache_len(&self) -> usize {
        self.lock_cache().len()
    }

    /// Attach a member, visible to formulas as a tier-2 variable or function
    ///
    /// Cached results are dropped since they may depend on the old member.
    pub fn set_member(
        &mut self,
        name: impl Into<String>,
        binding: impl Into<Binding>,
    ) -> Option<Binding> {
        self.cache_mut().clear();
        self.members.set(name, binding)
    }

    pub fn member(&self, name: &str) -> Option<&Binding> {
        self.members.get(name)
    }

    pub fn remove_member(&mut self, name: &str) -> Option<Binding> {
        self.cache_mut().clear();
        self.members.remove(name)
    }

    fn lock_cache(&self) -> MutexGuard<'_, AHashMap<String, Value>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cache_mut(&mut self) -> &mut AHashMap<String, Value> {
        self.cache.get_mut().unwrap_or_else(PoisonError::into_inner)
    }
}
