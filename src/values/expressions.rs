// Template Expression Evaluation
//
// Resolves `{{...}}` placeholders inside payload templates against a
// binding scope. Supported forms:
//
//   {{name}}                 variable lookup
//   {{func(name)}}           helper applied to a variable
//   {{func("literal")}}      helper applied to a quoted literal
//
// Helpers: base64, base64_decode, to_upper, to_lower.
//
// Unknown variables are left verbatim so a later pass (interaction URL
// substitution, second resolution) can still pick them up.

use base64::{engine::general_purpose, Engine as _};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;

use crate::error::FuzzError;

/// Binding scope used for template resolution
pub type Scope = HashMap<String, Value>;

lazy_static! {
    static ref PLACEHOLDER: Regex = Regex::new(r"\{\{\s*([^{}]+?)\s*\}\}").unwrap();
    static ref CALL: Regex = Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\((.*)\)$").unwrap();
}

/// Evaluates a payload template against a binding scope
pub trait ExpressionEvaluator: Send + Sync {
    fn evaluate(&self, template: &str, scope: &Scope) -> Result<String, FuzzError>;
}

/// Default `{{placeholder}}` evaluator
#[derive(Debug, Default, Clone)]
pub struct TemplateEvaluator;

impl ExpressionEvaluator for TemplateEvaluator {
    fn evaluate(&self, template: &str, scope: &Scope) -> Result<String, FuzzError> {
        let mut output = String::with_capacity(template.len());
        let mut last = 0;

        for caps in PLACEHOLDER.captures_iter(template) {
            let whole = caps.get(0).unwrap();
            output.push_str(&template[last..whole.start()]);
            match resolve(&caps[1], scope)? {
                Some(resolved) => output.push_str(&resolved),
                None => output.push_str(whole.as_str()),
            }
            last = whole.end();
        }
        output.push_str(&template[last..]);

        Ok(output)
    }
}

/// Render a scope value as the string that gets injected
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn resolve(expression: &str, scope: &Scope) -> Result<Option<String>, FuzzError> {
    let Some(call) = CALL.captures(expression) else {
        return Ok(scope.get(expression).map(value_to_string));
    };

    let Some(argument) = resolve_argument(call[2].trim(), scope) else {
        return Ok(None);
    };

    let result = match &call[1] {
        "base64" => general_purpose::STANDARD.encode(argument.as_bytes()),
        "base64_decode" => {
            let decoded = general_purpose::STANDARD
                .decode(argument.as_bytes())
                .map_err(|e| FuzzError::Expression(format!("base64_decode({}): {}", argument, e)))?;
            String::from_utf8_lossy(&decoded).into_owned()
        }
        "to_upper" => argument.to_uppercase(),
        "to_lower" => argument.to_lowercase(),
        other => {
            return Err(FuzzError::Expression(format!("unknown helper '{}'", other)));
        }
    };

    Ok(Some(result))
}

fn resolve_argument(argument: &str, scope: &Scope) -> Option<String> {
    let quoted = argument.len() >= 2
        && ((argument.starts_with('"') && argument.ends_with('"'))
            || (argument.starts_with('\'') && argument.ends_with('\'')));

    if quoted {
        Some(argument[1..argument.len() - 1].to_string())
    } else {
        scope.get(argument).map(value_to_string)
    }
}
