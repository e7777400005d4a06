//! Names formulas may not call through the formula's own members
//!
//! The reserved set is built once from the [`Formula`](crate::Formula) facade's
//! method names, minus the helpers it deliberately exposes. Hosts can extend it
//! at runtime with [`blacklist_function`].

use ahash::AHashSet;
use once_cell::sync::Lazy;
use std::sync::{PoisonError, RwLock};

/// Every method of the formula facade, in both snake_case and camelCase spelling
const FACADE_METHODS: &[&str] = &[
    "new",
    "with_options",
    "calc",
    "calc_with_options",
    "evaluate",
    "evaluate_all",
    "set_formula",
    "setFormula",
    "source",
    "variables",
    "getVariables",
    "expression",
    "getExpression",
    "expression_string",
    "getExpressionString",
    "enable_memoization",
    "enableMemoization",
    "disable_memoization",
    "disableMemoization",
    "is_memoization_enabled",
    "cache_len",
    "options",
    "set_member",
    "member",
    "remove_member",
    "ifElse",
    "first",
];

/// Facade methods formulas are allowed to call
pub const EXPOSED_HELPERS: &[&str] = &["ifElse", "first"];

static RESERVED: Lazy<AHashSet<&'static str>> = Lazy::new(|| {
    FACADE_METHODS
        .iter()
        .copied()
        .filter(|name| !EXPOSED_HELPERS.contains(name))
        .collect()
});

static EXTENSIONS: Lazy<RwLock<AHashSet<String>>> = Lazy::new(|| RwLock::new(AHashSet::new()));

/// Is this function name forbidden from tier-2 resolution
pub fn is_blacklisted(name: &str) -> bool {
    RESERVED.contains(name)
        || EXTENSIONS
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(name)
}

/// Forbid another name, process-wide
///
/// Call sites that already checked a name keep their earlier verdict.
pub fn blacklist_function(name: impl Into<String>) {
    let name = name.into();
    tracing::debug!(%name, "blacklisting function");
    EXTENSIONS
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(name);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_names() {
        assert!(is_blacklisted("evaluate"));
        assert!(is_blacklisted("setFormula"));
        assert!(is_blacklisted("set_formula"));
        assert!(!is_blacklisted("ifElse"));
        assert!(!is_blacklisted("first"));
        assert!(!is_blacklisted("sin"));
    }

    #[test]
    fn test_blacklist_extension() {
        assert!(!is_blacklisted("test_blacklist_extension_fn"));
        blacklist_function("test_blacklist_extension_fn");
        assert!(is_blacklisted("test_blacklist_extension_fn"));
    }
}
