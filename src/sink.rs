// Dispatch contract for partfuzz
// Generated requests are handed to a caller-supplied sink, which decides
// whether generation continues.

use serde::Serialize;
use std::ops::ControlFlow;

use crate::models::{FuzzRequest, PartKind};
use crate::values::Scope;

/// Record handed to an external response analyzer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyzerInput {
    pub request: FuzzRequest,
    pub component: PartKind,
    pub final_args: Scope,
    pub key: String,
    pub value: String,
    pub original_value: String,
}

/// One concrete request produced by a rule
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedRequest {
    pub request: FuzzRequest,
    pub interact_urls: Vec<String>,
    pub dynamic_values: Scope,
    pub component: PartKind,
    /// Part that was mutated; `None` for multiple-mode aggregates
    pub key: Option<String>,
    pub value: Option<String>,
    pub analyzer_input: Option<AnalyzerInput>,
}

/// Consumer of generated requests. `ControlFlow::Break` stops the whole rule invocation.
pub trait RequestSink {
    fn dispatch(&mut self, request: GeneratedRequest) -> ControlFlow<()>;
}

impl<F> RequestSink for F
where
    F: FnMut(GeneratedRequest) -> ControlFlow<()>,
{
    fn dispatch(&mut self, request: GeneratedRequest) -> ControlFlow<()> {
        self(request)
    }
}

/// Sink that keeps every request, optionally stopping after `limit`
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub requests: Vec<GeneratedRequest>,
    pub limit: Option<usize>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            requests: Vec::new(),
            limit: Some(limit),
        }
    }
}

impl RequestSink for CollectingSink {
    fn dispatch(&mut self, request: GeneratedRequest) -> ControlFlow<()> {
        self.requests.push(request);
        match self.limit {
            Some(limit) if self.requests.len() >= limit => ControlFlow::Break(()),
            _ => ControlFlow::Continue(()),
        }
    }
}

/// Counters for parts that were skipped without an error reaching the caller
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SkipStats {
    pub invalid_key: usize,
    pub rebuild_failed: usize,
    pub expression_failed: usize,
}

impl SkipStats {
    pub fn total(&self) -> usize {
        self.invalid_key + self.rebuild_failed + self.expression_failed
    }
}

/// Per-invocation context of a rule
pub struct ExecuteRuleInput<'a> {
    /// Dynamic values, highest priority in the evaluation scope
    pub values: Scope,
    /// Interaction URLs accumulated so far
    pub interact_urls: Vec<String>,
    pub has_analyzers: bool,
    pub sink: &'a mut dyn RequestSink,
    pub stats: SkipStats,
}

impl<'a> ExecuteRuleInput<'a> {
    pub fn new(sink: &'a mut dyn RequestSink) -> Self {
        Self {
            values: Scope::new(),
            interact_urls: Vec::new(),
            has_analyzers: false,
            sink,
            stats: SkipStats::default(),
        }
    }

    pub fn with_values(mut self, values: Scope) -> Self {
        self.values = values;
        self
    }

    pub fn with_analyzers(mut self, has_analyzers: bool) -> Self {
        self.has_analyzers = has_analyzers;
        self
    }
}
