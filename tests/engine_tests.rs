/// Rule engine tests for partfuzz
/// Covers single/multiple mode dispatch, restoration, analyzer mode,
/// sink-requested halts and per-key skip behavior
use partfuzz::components::{component_for, Component, HeaderComponent, QueryComponent};
use partfuzz::engine::RuleOutcome;
use partfuzz::error::FuzzError;
use partfuzz::models::{FuzzRequest, Method, PartKind};
use partfuzz::placement::RuleType;
use partfuzz::rule::{ModeType, Rule, RuleDefinition};
use partfuzz::sink::{CollectingSink, ExecuteRuleInput, GeneratedRequest};
use partfuzz::values::{OobUrlProvider, RuleOptions};
use serde_json::json;
use std::ops::ControlFlow;
use std::sync::Arc;

fn base_request() -> FuzzRequest {
    FuzzRequest::new(Method::GET, "http://api.test/search?a=1&b=2")
}

fn query_rule(rule_type: RuleType, mode: ModeType) -> Rule {
    Rule::new(rule_type, mode, PartKind::Query, Arc::new(RuleOptions::default()))
}

fn query_pairs(request: &FuzzRequest) -> Vec<(String, String)> {
    request.parsed_url().unwrap().query_pairs().into_owned().collect()
}

#[test]
fn test_single_mode_dispatches_matching_key_and_restores() {
    let rule = query_rule(RuleType::Postfix, ModeType::Single).with_keys(&["a"]);
    let mut component = QueryComponent::parse(&base_request()).unwrap();
    let mut sink = CollectingSink::new();
    let mut input = ExecuteRuleInput::new(&mut sink);

    let outcome = rule.execute_part_rule(&mut input, "X", &mut component).unwrap();
    assert_eq!(outcome, RuleOutcome::Completed);

    assert_eq!(sink.requests.len(), 1, "only key 'a' matches");
    assert_eq!(
        query_pairs(&sink.requests[0].request),
        vec![("a".to_string(), "1X".to_string()), ("b".to_string(), "2".to_string())]
    );
    assert_eq!(component.value("a").as_deref(), Some("1"), "value restored after dispatch");
}

#[test]
fn test_multiple_mode_aggregates_all_mutations() {
    let rule = query_rule(RuleType::Postfix, ModeType::Multiple);
    let mut component = QueryComponent::parse(&base_request()).unwrap();
    let mut sink = CollectingSink::new();
    let mut input = ExecuteRuleInput::new(&mut sink);

    rule.execute_part_rule(&mut input, "X", &mut component).unwrap();

    assert_eq!(sink.requests.len(), 1);
    assert_eq!(
        query_pairs(&sink.requests[0].request),
        vec![("a".to_string(), "1X".to_string()), ("b".to_string(), "2X".to_string())]
    );
    assert_eq!(sink.requests[0].key, None);
    assert_eq!(sink.requests[0].value, None);
}

#[test]
fn test_analyzers_with_multiple_mode_is_rejected() {
    let rule = query_rule(RuleType::Postfix, ModeType::Multiple);
    let mut component = QueryComponent::parse(&base_request()).unwrap();
    let mut sink = CollectingSink::new();
    let mut input = ExecuteRuleInput::new(&mut sink).with_analyzers(true);

    let result = rule.execute_part_rule(&mut input, "X", &mut component);
    assert!(matches!(result, Err(FuzzError::UnsupportedCombination)));
    assert!(sink.requests.is_empty(), "sink must not be invoked");
}

#[test]
fn test_sink_stop_halts_after_first_dispatch() {
    let rule = query_rule(RuleType::Replace, ModeType::Single);
    let mut component = QueryComponent::parse(&base_request()).unwrap();
    let mut calls = 0;
    let mut sink = |_: GeneratedRequest| {
        calls += 1;
        ControlFlow::Break(())
    };
    let mut input = ExecuteRuleInput::new(&mut sink);

    let outcome = rule.execute_part_rule(&mut input, "X", &mut component).unwrap();
    drop(input);

    assert_eq!(outcome, RuleOutcome::Halted);
    assert_eq!(calls, 1);
    assert_eq!(component.value("a").as_deref(), Some("1"), "restored on halt path too");
}

#[test]
fn test_multiple_mode_halt_is_reported() {
    let rule = query_rule(RuleType::Replace, ModeType::Multiple);
    let mut component = QueryComponent::parse(&base_request()).unwrap();
    let mut sink = CollectingSink::with_limit(1);
    let mut input = ExecuteRuleInput::new(&mut sink);

    let outcome = rule.execute_part_rule(&mut input, "X", &mut component).unwrap();
    assert_eq!(outcome, RuleOutcome::Halted);
    assert_eq!(sink.requests.len(), 1);
}

#[test]
fn test_analyzer_mode_observes_original_values() {
    let rule = query_rule(RuleType::Prefix, ModeType::Single).with_keys(&["b"]);
    let mut component = QueryComponent::parse(&base_request()).unwrap();
    let mut sink = CollectingSink::new();
    let mut values = partfuzz::values::Scope::new();
    values.insert("session".to_string(), json!("s1"));
    let mut input = ExecuteRuleInput::new(&mut sink)
        .with_analyzers(true)
        .with_values(values);

    rule.execute_part_rule(&mut input, "X", &mut component).unwrap();

    assert_eq!(sink.requests.len(), 1);
    let generated = &sink.requests[0];
    assert_eq!(query_pairs(&generated.request)[1], ("b".to_string(), "2".to_string()));

    let analyzer = generated.analyzer_input.as_ref().expect("analyzer input attached");
    assert_eq!(analyzer.key, "b");
    assert_eq!(analyzer.value, "X2");
    assert_eq!(analyzer.original_value, "2");
    assert_eq!(analyzer.component, PartKind::Query);
    assert_eq!(analyzer.final_args["session"], json!("s1"));
    assert_eq!(generated.dynamic_values["session"], json!("s1"));
}

#[test]
fn test_rebuild_failure_skips_key_only() {
    let request = FuzzRequest::new(Method::GET, "http://api.test/")
        .with_header("X-One", "1")
        .with_header("X-Two", "2");
    let rule = Rule::new(RuleType::Postfix, ModeType::Single, PartKind::Header, Arc::new(RuleOptions::default()));
    let mut component = HeaderComponent::parse(&request);
    let mut sink = CollectingSink::new();
    let mut input = ExecuteRuleInput::new(&mut sink);

    // CR/LF makes every header unbuildable
    let outcome = rule.execute_part_rule(&mut input, "\r\nEvil: 1", &mut component).unwrap();
    assert_eq!(outcome, RuleOutcome::Completed);
    assert_eq!(input.stats.rebuild_failed, 2);
    drop(input);

    assert!(sink.requests.is_empty());
    assert_eq!(component.rebuild().unwrap(), request, "headers restored after failed rebuilds");
}

/// Component whose keys vanish when written, to exercise the InvalidKey skip
struct VanishingComponent {
    parts: Vec<(String, String)>,
}

impl Component for VanishingComponent {
    fn kind(&self) -> PartKind {
        PartKind::Body
    }

    fn iterate(&self) -> Vec<(String, String)> {
        self.parts.clone()
    }

    fn set_value(&mut self, key: &str, value: &str) -> Result<(), FuzzError> {
        if key == "gone" {
            return Err(FuzzError::InvalidKey(key.to_string()));
        }
        for (k, v) in self.parts.iter_mut() {
            if k == key {
                *v = value.to_string();
            }
        }
        Ok(())
    }

    fn rebuild(&self) -> Result<FuzzRequest, FuzzError> {
        let body = self
            .parts
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(";");
        Ok(FuzzRequest::new(Method::POST, "http://api.test/").with_body(&body))
    }
}

#[test]
fn test_invalid_key_is_skipped() {
    let rule = Rule::new(RuleType::Replace, ModeType::Single, PartKind::Body, Arc::new(RuleOptions::default()));
    let mut component = VanishingComponent {
        parts: vec![
            ("gone".to_string(), "1".to_string()),
            ("kept".to_string(), "2".to_string()),
        ],
    };
    let mut sink = CollectingSink::new();
    let mut input = ExecuteRuleInput::new(&mut sink);

    let outcome = rule.execute_part_rule(&mut input, "X", &mut component).unwrap();
    assert_eq!(outcome, RuleOutcome::Completed);
    assert_eq!(input.stats.invalid_key, 1);
    drop(input);

    assert_eq!(sink.requests.len(), 1);
    assert_eq!(sink.requests[0].request.body.as_deref(), Some("gone=1;kept=X"));
}

#[test]
fn test_identical_runs_yield_identical_requests() {
    let rule = query_rule(RuleType::Infix, ModeType::Single);

    let run = || {
        let mut component = QueryComponent::parse(&FuzzRequest::new(Method::GET, "http://api.test/?id=1234&q=ab")).unwrap();
        let mut sink = CollectingSink::new();
        let mut input = ExecuteRuleInput::new(&mut sink);
        rule.execute_part_rule(&mut input, "{{value}}'", &mut component).unwrap();
        drop(input);
        sink.requests
    };

    let first = run();
    let second = run();
    assert_eq!(first, second);
    assert_eq!(first[0].value.as_deref(), Some("121234'34"));
}

#[test]
fn test_interaction_urls_accumulate_across_parts() {
    let options = RuleOptions {
        interactions: Some(Arc::new(OobUrlProvider::with_session("oob.test", "t"))),
        ..RuleOptions::default()
    };
    let rule = Rule::new(RuleType::Replace, ModeType::Single, PartKind::Query, Arc::new(options));
    let mut component = QueryComponent::parse(&base_request()).unwrap();
    let mut sink = CollectingSink::new();
    let mut input = ExecuteRuleInput::new(&mut sink);

    rule.execute_part_rule(&mut input, "http://{{interactsh-url}}", &mut component).unwrap();
    assert_eq!(input.interact_urls, vec!["t0.oob.test", "t1.oob.test"]);
    drop(input);

    assert_eq!(sink.requests[0].interact_urls, vec!["t0.oob.test"]);
    assert_eq!(sink.requests[1].interact_urls, vec!["t0.oob.test", "t1.oob.test"]);
    assert_eq!(sink.requests[1].value.as_deref(), Some("http://t1.oob.test"));
}

#[test]
fn test_degraded_expression_counts_but_still_dispatches() {
    let rule = query_rule(RuleType::Replace, ModeType::Single).with_keys(&["a"]);
    let mut component = QueryComponent::parse(&base_request()).unwrap();
    let mut sink = CollectingSink::new();
    let mut input = ExecuteRuleInput::new(&mut sink);

    rule.execute_part_rule(&mut input, "{{bogus(value)}}", &mut component).unwrap();
    assert_eq!(input.stats.expression_failed, 1);
    drop(input);

    assert_eq!(sink.requests.len(), 1);
    assert_eq!(sink.requests[0].value.as_deref(), Some("{{bogus(value)}}"));
}

#[test]
fn test_execute_runs_every_payload_on_fresh_component() {
    let definition: RuleDefinition = serde_json::from_value(json!({
        "type": "postfix",
        "mode": "multiple",
        "part": "query",
        "fuzz": ["'", "\""]
    }))
    .unwrap();
    let rule = Rule::compile(&definition, Arc::new(RuleOptions::default())).unwrap();
    let mut sink = CollectingSink::new();
    let mut input = ExecuteRuleInput::new(&mut sink);

    let outcome = rule.execute(&mut input, &base_request()).unwrap();
    assert_eq!(outcome, RuleOutcome::Completed);
    drop(input);

    assert_eq!(sink.requests.len(), 2);
    assert_eq!(query_pairs(&sink.requests[1].request)[0], ("a".to_string(), "1\"".to_string()));
}

#[test]
fn test_execute_stops_remaining_payloads_on_halt() {
    let definition: RuleDefinition = serde_json::from_value(json!({
        "type": "replace",
        "part": "path",
        "fuzz": ["..", "%00", "~"]
    }))
    .unwrap();
    let rule = Rule::compile(&definition, Arc::new(RuleOptions::default())).unwrap();
    let request = FuzzRequest::new(Method::GET, "http://api.test/api/users/7");
    let mut sink = CollectingSink::with_limit(4);
    let mut input = ExecuteRuleInput::new(&mut sink);

    let outcome = rule.execute(&mut input, &request).unwrap();
    assert_eq!(outcome, RuleOutcome::Halted);
    drop(input);

    assert_eq!(sink.requests.len(), 4);
    assert_eq!(sink.requests[3].key.as_deref(), Some("1"));
    assert_eq!(sink.requests[3].value.as_deref(), Some("%00"));
}

#[test]
fn test_body_rule_over_json() {
    let request = FuzzRequest::new(Method::POST, "http://api.test/users")
        .with_header("Content-Type", "application/json")
        .with_body(&json!({ "user": { "id": 7, "role": "user" } }).to_string());
    let rule = Rule::new(RuleType::Replace, ModeType::Single, PartKind::Body, Arc::new(RuleOptions::default()))
        .with_keys(&["user.role"]);
    let mut component = component_for(PartKind::Body, &request).unwrap();
    let mut sink = CollectingSink::new();
    let mut input = ExecuteRuleInput::new(&mut sink);

    rule.execute_part_rule(&mut input, "admin", component.as_mut()).unwrap();
    drop(input);

    assert_eq!(sink.requests.len(), 1);
    let body: serde_json::Value = serde_json::from_str(sink.requests[0].request.body.as_deref().unwrap()).unwrap();
    assert_eq!(body["user"]["role"], json!("admin"));
    assert_eq!(body["user"]["id"], json!(7));
    assert_eq!(component.value("user.role").as_deref(), Some("user"));
}

fn repeated_request() -> FuzzRequest {
    FuzzRequest::new(Method::GET, "http://api.test/?a=1&a=2")
}

#[test]
fn test_single_mode_repeated_keys_are_fuzzed_and_restored_separately() {
    let rule = query_rule(RuleType::Postfix, ModeType::Single);
    let mut component = QueryComponent::parse(&repeated_request()).unwrap();
    let mut sink = CollectingSink::new();
    let mut input = ExecuteRuleInput::new(&mut sink);

    rule.execute_part_rule(&mut input, "X", &mut component).unwrap();
    drop(input);

    assert_eq!(sink.requests.len(), 2);
    assert_eq!(sink.requests[0].request.url, "http://api.test/?a=1X&a=2");
    assert_eq!(sink.requests[1].request.url, "http://api.test/?a=1&a=2X");
    assert_eq!(component.rebuild().unwrap(), repeated_request(), "every occurrence restored");
}

#[test]
fn test_multiple_mode_repeated_keys_all_mutated() {
    let rule = query_rule(RuleType::Postfix, ModeType::Multiple);
    let mut component = QueryComponent::parse(&repeated_request()).unwrap();
    let mut sink = CollectingSink::new();
    let mut input = ExecuteRuleInput::new(&mut sink);

    rule.execute_part_rule(&mut input, "X", &mut component).unwrap();
    drop(input);

    assert_eq!(sink.requests.len(), 1);
    assert_eq!(sink.requests[0].request.url, "http://api.test/?a=1X&a=2X");
}

#[test]
fn test_multiple_mode_rebuild_failure_is_reported() {
    let request = FuzzRequest::new(Method::GET, "http://api.test/")
        .with_header("X-One", "1")
        .with_header("X-Two", "2");
    let rule = Rule::new(RuleType::Postfix, ModeType::Multiple, PartKind::Header, Arc::new(RuleOptions::default()));
    let mut component = HeaderComponent::parse(&request);
    let mut sink = CollectingSink::new();
    let mut input = ExecuteRuleInput::new(&mut sink);

    let result = rule.execute_part_rule(&mut input, "\r\nEvil: 1", &mut component);
    assert!(matches!(result, Err(FuzzError::Build(_))));
    drop(input);

    assert!(sink.requests.is_empty());
}

#[test]
fn test_body_field_with_dot_in_name() {
    let request = FuzzRequest::new(Method::POST, "http://api.test/")
        .with_header("Content-Type", "application/json")
        .with_body(&json!({ "a.b": "x", "c": "y" }).to_string());
    let rule = Rule::new(RuleType::Replace, ModeType::Single, PartKind::Body, Arc::new(RuleOptions::default()));
    let mut component = component_for(PartKind::Body, &request).unwrap();
    let mut sink = CollectingSink::new();
    let mut input = ExecuteRuleInput::new(&mut sink);

    rule.execute_part_rule(&mut input, "X", component.as_mut()).unwrap();
    assert_eq!(input.stats.total(), 0);
    drop(input);

    let bodies: Vec<serde_json::Value> = sink
        .requests
        .iter()
        .map(|g| serde_json::from_str(g.request.body.as_deref().unwrap()).unwrap())
        .collect();
    assert!(bodies.contains(&json!({ "a.b": "X", "c": "y" })));
    assert!(bodies.contains(&json!({ "a.b": "x", "c": "X" })));
}
