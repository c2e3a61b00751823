// Payload Value Evaluation
//
// Turns a payload expression into the concrete string injected into a part:
//
// - expressions: `{{...}}` template resolution (leaf)
// - interactions: out-of-band callback URL substitution (leaf)
//
// Pipeline per part:
//   scope = runtime variables < option variables < {value} < dynamic values
//   first pass  = expressions(payload, scope)
//   replaced    = interactions(first pass, known urls)
//   final       = expressions(replaced, scope)
//
// Resolution failures never abort: the pass falls back to its input text.

pub mod expressions;
pub mod interactions;

pub use expressions::*;
pub use interactions::*;

use std::sync::Arc;
use tracing::debug;

/// Shared, read-only options a rule is compiled with
#[derive(Clone)]
pub struct RuleOptions {
    /// Global option-level variables
    pub vars: Scope,
    /// Named runtime variables
    pub variables: Scope,
    /// Interaction correlation client, if out-of-band testing is enabled
    pub interactions: Option<Arc<dyn InteractionReplacer>>,
    pub evaluator: Arc<dyn ExpressionEvaluator>,
}

impl Default for RuleOptions {
    fn default() -> Self {
        Self {
            vars: Scope::new(),
            variables: Scope::new(),
            interactions: None,
            evaluator: Arc::new(TemplateEvaluator),
        }
    }
}

impl std::fmt::Debug for RuleOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleOptions")
            .field("vars", &self.vars)
            .field("variables", &self.variables)
            .field("interactions", &self.interactions.is_some())
            .finish()
    }
}

/// Result of evaluating one payload for one part
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluated {
    pub value: String,
    pub interact_urls: Vec<String>,
    /// Set when any resolution pass failed and fell back to its input
    pub degraded: bool,
}

/// Build the resolution scope; on key collisions the more specific source wins.
pub fn merge_scope(dynamic_values: &Scope, current_value: &str, options: &RuleOptions) -> Scope {
    let mut scope = Scope::with_capacity(
        dynamic_values.len() + options.vars.len() + options.variables.len() + 1,
    );
    scope.extend(options.variables.iter().map(|(k, v)| (k.clone(), v.clone())));
    scope.extend(options.vars.iter().map(|(k, v)| (k.clone(), v.clone())));
    scope.insert("value".to_string(), serde_json::Value::String(current_value.to_string()));
    scope.extend(dynamic_values.iter().map(|(k, v)| (k.clone(), v.clone())));
    scope
}

/// Resolve `payload` for the part `key` whose current value is `current_value`.
pub fn evaluate_value(
    options: &RuleOptions,
    dynamic_values: &Scope,
    key: &str,
    current_value: &str,
    payload: &str,
    known_urls: Vec<String>,
) -> Evaluated {
    let scope = merge_scope(dynamic_values, current_value, options);
    let mut degraded = false;

    let first_pass = resolve_pass(options, payload, &scope, key, &mut degraded);

    let (replaced, interact_urls) = match &options.interactions {
        Some(interactions) => interactions.replace(&first_pass, known_urls),
        None => (first_pass, known_urls),
    };

    let value = resolve_pass(options, &replaced, &scope, key, &mut degraded);

    Evaluated {
        value,
        interact_urls,
        degraded,
    }
}

fn resolve_pass(options: &RuleOptions, text: &str, scope: &Scope, key: &str, degraded: &mut bool) -> String {
    match options.evaluator.evaluate(text, scope) {
        Ok(resolved) => resolved,
        Err(err) => {
            debug!("[Fuzz] Expression for key '{}' failed, using literal: {}", key, err);
            *degraded = true;
            text.to_string()
        }
    }
}
