// Rule engine for partfuzz
// Walks a component's parts, evaluates and places payloads, rebuilds
// requests and hands them to the sink.

use std::ops::ControlFlow;
use tracing::debug;

use crate::components::Component;
use crate::error::FuzzError;
use crate::models::{FuzzRequest, PartKind};
use crate::placement::place;
use crate::rule::{ModeType, Rule};
use crate::sink::{AnalyzerInput, ExecuteRuleInput, GeneratedRequest};
use crate::values::evaluate_value;

/// How a rule invocation ended when it did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOutcome {
    /// Every eligible part was processed
    Completed,
    /// The sink asked for no more requests
    Halted,
}

/// A part set to a mutated value for as long as the guard lives.
/// The original value is written back on drop, on every exit path.
struct ScopedValue<'c> {
    component: &'c mut dyn Component,
    position: usize,
    key: String,
    original: String,
}

impl<'c> ScopedValue<'c> {
    fn apply(
        component: &'c mut dyn Component,
        position: usize,
        key: &str,
        original: &str,
        value: &str,
    ) -> Result<Self, FuzzError> {
        component.set_value_at(position, key, value)?;
        Ok(Self {
            component,
            position,
            key: key.to_string(),
            original: original.to_string(),
        })
    }

    fn rebuild(&self) -> Result<FuzzRequest, FuzzError> {
        self.component.rebuild()
    }
}

impl Drop for ScopedValue<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.component.set_value_at(self.position, &self.key, &self.original) {
            debug!("[Fuzz] Could not restore key '{}': {}", self.key, err);
        }
    }
}

/// Key, mutated value and original value of a single-mode mutation
struct Mutation<'a> {
    key: &'a str,
    value: &'a str,
    original: &'a str,
}

impl Rule {
    /// Apply one payload to every eligible part of `component`.
    ///
    /// Single mode dispatches one request per part and restores the part
    /// afterwards. Multiple mode leaves every mutation applied and dispatches
    /// one aggregate request at the end. Per-part failures are counted in
    /// `input.stats` and skipped.
    pub fn execute_part_rule(
        &self,
        input: &mut ExecuteRuleInput<'_>,
        payload: &str,
        component: &mut dyn Component,
    ) -> Result<RuleOutcome, FuzzError> {
        if self.mode_type == ModeType::Multiple && input.has_analyzers {
            return Err(FuzzError::UnsupportedCombination);
        }

        let kind = component.kind();

        for (position, (key, original)) in component.iterate().into_iter().enumerate() {
            if !self.matches(&key, &original) {
                continue;
            }

            let known = std::mem::take(&mut input.interact_urls);
            let evaluated = evaluate_value(&self.options, &input.values, &key, &original, payload, known);
            input.interact_urls = evaluated.interact_urls;
            if evaluated.degraded {
                input.stats.expression_failed += 1;
            }
            let value = place(self.rule_type, &original, &evaluated.value);

            if self.mode_type == ModeType::Multiple {
                if let Err(err) = component.set_value_at(position, &key, &value) {
                    debug!("[Fuzz] Skipping {} key '{}': {}", kind, key, err);
                    input.stats.invalid_key += 1;
                }
                continue;
            }

            let mutation = Mutation {
                key: &key,
                value: &value,
                original: &original,
            };

            let flow = if input.has_analyzers {
                // Analyzers compare against the untouched request
                match component.rebuild() {
                    Ok(request) => self.build_input(input, request, kind, Some(mutation)),
                    Err(err) => {
                        debug!("[Fuzz] Skipping {} key '{}', rebuild failed: {}", kind, key, err);
                        input.stats.rebuild_failed += 1;
                        continue;
                    }
                }
            } else {
                let scoped = match ScopedValue::apply(&mut *component, position, &key, &original, &value) {
                    Ok(scoped) => scoped,
                    Err(err) => {
                        debug!("[Fuzz] Skipping {} key '{}': {}", kind, key, err);
                        input.stats.invalid_key += 1;
                        continue;
                    }
                };
                match scoped.rebuild() {
                    Ok(request) => self.build_input(input, request, kind, Some(mutation)),
                    Err(err) => {
                        debug!("[Fuzz] Skipping {} key '{}', rebuild failed: {}", kind, key, err);
                        input.stats.rebuild_failed += 1;
                        continue;
                    }
                }
            };

            if flow.is_break() {
                return Ok(RuleOutcome::Halted);
            }
        }

        if self.mode_type == ModeType::Multiple {
            let request = component.rebuild()?;
            if self.build_input(input, request, kind, None).is_break() {
                return Ok(RuleOutcome::Halted);
            }
        }

        Ok(RuleOutcome::Completed)
    }

    fn build_input(
        &self,
        input: &mut ExecuteRuleInput<'_>,
        request: FuzzRequest,
        component: PartKind,
        mutation: Option<Mutation<'_>>,
    ) -> ControlFlow<()> {
        let analyzer_input = match (&mutation, input.has_analyzers) {
            (Some(m), true) => Some(AnalyzerInput {
                request: request.clone(),
                component,
                final_args: input.values.clone(),
                key: m.key.to_string(),
                value: m.value.to_string(),
                original_value: m.original.to_string(),
            }),
            _ => None,
        };

        let generated = GeneratedRequest {
            request,
            interact_urls: input.interact_urls.clone(),
            dynamic_values: input.values.clone(),
            component,
            key: mutation.as_ref().map(|m| m.key.to_string()),
            value: mutation.as_ref().map(|m| m.value.to_string()),
            analyzer_input,
        };

        input.sink.dispatch(generated)
    }
}
