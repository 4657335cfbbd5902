//! XPath extension: `matches(value, pattern)`.
//!
//! The only function the link query may call beyond XPath 1.0 core. `value`
//! is a string or a node-set (first node's string value); `pattern` is a
//! regular expression tested with unanchored search semantics. Compiled
//! patterns are cached for the lifetime of the evaluator and shared by every
//! clone of it.

use crate::error::{PriceError, Result};
use regex::Regex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use sxd_xpath::context::Evaluation;
use sxd_xpath::function::{Error as FunctionError, Function};
use sxd_xpath::{Context, Value};
use tracing::trace;

pub const MATCHES_FUNCTION: &str = "matches";

// ── Regex cache ───────────────────────────────────────────────────────────────

/// Insert-if-absent cache. Entries are never removed.
#[derive(Debug, Default)]
pub struct RegexCache {
    compiled: RwLock<HashMap<String, Arc<Regex>>>,
    compile_count: AtomicUsize,
}

impl RegexCache {
    pub fn get_or_compile(&self, pattern: &str) -> Result<Arc<Regex>> {
        if let Some(regex) = self
            .compiled
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(pattern)
        {
            return Ok(Arc::clone(regex));
        }

        let mut compiled = self.compiled.write().unwrap_or_else(PoisonError::into_inner);
        // another caller may have won the race while we waited for the lock
        if let Some(regex) = compiled.get(pattern) {
            return Ok(Arc::clone(regex));
        }

        let regex = Regex::new(pattern)
            .map_err(|e| PriceError::InvalidQuery(format!("bad pattern '{pattern}': {e}")))?;
        self.compile_count.fetch_add(1, Ordering::Relaxed);
        trace!("Compiled pattern {:?}", pattern);

        let regex = Arc::new(regex);
        compiled.insert(pattern.to_string(), Arc::clone(&regex));
        Ok(regex)
    }

    /// How many patterns have been compiled so far.
    pub fn compile_count(&self) -> usize {
        self.compile_count.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.compiled.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── Evaluator ─────────────────────────────────────────────────────────────────

/// XPath evaluation context carrying the `matches` extension.
#[derive(Debug, Clone, Default)]
pub struct PatternEvaluator {
    cache: Arc<RegexCache>,
}

impl PatternEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache(&self) -> &RegexCache {
        &self.cache
    }

    /// `matches` semantics on plain strings. Blank input never matches.
    pub fn matches(&self, value: &str, pattern: &str) -> Result<bool> {
        if value.trim().is_empty() || pattern.trim().is_empty() {
            return Ok(false);
        }
        let regex = self.cache.get_or_compile(pattern)?;
        Ok(regex.is_match(value))
    }

    /// Looks up an extension function by name.
    pub fn resolve_function(&self, name: &str) -> Result<MatchesFunction> {
        match name {
            MATCHES_FUNCTION => Ok(MatchesFunction { evaluator: self.clone() }),
            other => Err(PriceError::UnsupportedFunction { name: other.to_string() }),
        }
    }

    /// A fresh XPath context with the XPath 1.0 core library plus `matches`.
    pub fn context<'d>(&self) -> Context<'d> {
        let mut context = Context::new();
        context.set_function(MATCHES_FUNCTION, MatchesFunction { evaluator: self.clone() });
        context
    }
}

pub struct MatchesFunction {
    evaluator: PatternEvaluator,
}

impl Function for MatchesFunction {
    fn evaluate<'c, 'd>(
        &self,
        _context: &Evaluation<'c, 'd>,
        args: Vec<Value<'d>>,
    ) -> std::result::Result<Value<'d>, FunctionError> {
        let [value, pattern] = <[Value<'d>; 2]>::try_from(args).map_err(|args| {
            FunctionError::Other(format!("matches() takes 2 arguments, got {}", args.len()))
        })?;

        // node-sets contribute their first node's string value
        let value = value.string();
        let pattern = pattern.string();

        self.evaluator
            .matches(&value, &pattern)
            .map(Value::Boolean)
            .map_err(|e| FunctionError::Other(e.to_string()))
    }
}
