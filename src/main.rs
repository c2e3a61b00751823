// Main CLI entry point for partfuzz
// Uses clap for argument parsing. Dry run only: generated requests are
// printed and optionally exported, never sent.

use clap::{Arg, ArgAction, Command};
use partfuzz::reporting::{export_csv, export_jsonl};
use partfuzz::rule::{Rule, RuleDefinition};
use partfuzz::sink::{ExecuteRuleInput, GeneratedRequest};
use partfuzz::values::{InteractionReplacer, OobUrlProvider, RuleOptions, Scope};
use partfuzz::{FuzzRequest, RuleOutcome};
use serde_json::Value;
use std::ops::ControlFlow;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Parse `key=value`; values that are valid JSON keep their JSON type
fn parse_var(raw: &str) -> Option<(String, Value)> {
    let (key, value) = raw.split_once('=')?;
    if key.is_empty() {
        return None;
    }
    let value = serde_json::from_str::<Value>(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Some((key.to_string(), value))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, String> {
    let data = std::fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {}", path, e))?;
    serde_json::from_str(&data).map_err(|e| format!("Failed to parse {}: {}", path, e))
}


fn main() {
    let matches = Command::new("partfuzz")
        .version("1.0.0")
        .author("Jake Abendroth")
        .about("Generates fuzzed requests by injecting payloads into request parts")
        .after_help("EXAMPLES:\n  partfuzz --request req.json --rule sqli.json\n  partfuzz -r req.json -R rule.json -p \"'\" --var token=abc --limit 10 --csv-report")
        .arg(Arg::new("request")
            .short('r')
            .long("request")
            .required(true)
            .num_args(1)
            .help("JSON file describing the base request (method, url, headers, body)"))
        .arg(Arg::new("rule")
            .short('R')
            .long("rule")
            .required(true)
            .num_args(1)
            .help("JSON rule definition (type, mode, part, keys, keys-regex, values-regex, fuzz)"))
        .arg(Arg::new("payload")
            .short('p')
            .long("payload")
            .action(ArgAction::Append)
            .help("Additional payload expression, repeatable"))
        .arg(Arg::new("var")
            .long("var")
            .action(ArgAction::Append)
            .help("Template variable as key=value, repeatable"))
        .arg(Arg::new("oob_domain")
            .long("oob-domain")
            .num_args(1)
            .help("Callback domain used for {{interactsh-url}} placeholders"))
        .arg(Arg::new("analyzers")
            .long("analyzers")
            .action(ArgAction::SetTrue)
            .help("Attach analyzer metadata instead of mutating parts"))
        .arg(Arg::new("limit")
            .long("limit")
            .num_args(1)
            .value_parser(clap::value_parser!(usize))
            .help("Stop after this many generated requests"))
        .arg(Arg::new("csv_report")
            .long("csv-report")
            .action(ArgAction::SetTrue)
            .help("Write a CSV summary of generated requests"))
        .arg(Arg::new("jsonl_report")
            .long("jsonl-report")
            .action(ArgAction::SetTrue)
            .help("Write generated requests as JSON Lines"))
        .arg(Arg::new("verbose")
            .short('v')
            .long("verbose")
            .action(ArgAction::SetTrue)
            .help("Debug logging (overridden by RUST_LOG)"))
        .get_matches();

    let default_level = if matches.get_flag("verbose") { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    let request_path = matches.get_one::<String>("request").expect("request is required");
    let rule_path = matches.get_one::<String>("rule").expect("rule is required");

    let request: FuzzRequest = read_json(request_path).unwrap_or_else(|e| {
        error!("{}", e);
        std::process::exit(2);
    });
    let mut definition: RuleDefinition = read_json(rule_path).unwrap_or_else(|e| {
        error!("{}", e);
        std::process::exit(2);
    });
    if let Some(payloads) = matches.get_many::<String>("payload") {
        definition.fuzz.extend(payloads.cloned());
    }

    let mut vars = Scope::new();
    for raw in matches.get_many::<String>("var").into_iter().flatten() {
        match parse_var(raw) {
            Some((key, value)) => {
                vars.insert(key, value);
            }
            None => warn!("Ignoring malformed --var '{}', expected key=value", raw),
        }
    }

    let options = RuleOptions {
        vars,
        interactions: matches
            .get_one::<String>("oob_domain")
            .map(|domain| Arc::new(OobUrlProvider::new(domain)) as Arc<dyn InteractionReplacer>),
        ..RuleOptions::default()
    };

    let rule = Rule::compile(&definition, Arc::new(options)).unwrap_or_else(|e| {
        error!("Failed to compile rule: {}", e);
        std::process::exit(2);
    });

    let limit = matches.get_one::<usize>("limit").copied();
    let mut generated: Vec<GeneratedRequest> = Vec::new();
    let mut sink = |request: GeneratedRequest| {
        match serde_json::to_string(&request) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!("Could not serialize generated request: {}", e),
        }
        generated.push(request);
        match limit {
            Some(limit) if generated.len() >= limit => ControlFlow::Break(()),
            _ => ControlFlow::Continue(()),
        }
    };

    let mut input = ExecuteRuleInput::new(&mut sink).with_analyzers(matches.get_flag("analyzers"));
    let outcome = rule.execute(&mut input, &request).unwrap_or_else(|e| {
        error!("Rule execution failed: {}", e);
        std::process::exit(1);
    });
    let stats = input.stats.clone();
    let interact_urls = input.interact_urls.clone();
    drop(input);

    match outcome {
        RuleOutcome::Completed => info!("Generated {} requests.", generated.len()),
        RuleOutcome::Halted => info!("Stopped after {} requests (limit reached).", generated.len()),
    }
    if stats.total() > 0 {
        info!(
            "Skipped parts: {} invalid keys, {} failed rebuilds, {} degraded expressions",
            stats.invalid_key, stats.rebuild_failed, stats.expression_failed
        );
    }
    if !interact_urls.is_empty() {
        info!("Interaction URLs issued: {}", interact_urls.len());
    }

    if matches.get_flag("csv_report") {
        match export_csv(&generated) {
            Ok(filename) => info!("CSV report written to {}", filename),
            Err(e) => error!("CSV export failed: {}", e),
        }
    }
    if matches.get_flag("jsonl_report") {
        match export_jsonl(&generated) {
            Ok(filename) => info!("JSONL report written to {}", filename),
            Err(e) => error!("JSONL export failed: {}", e),
        }
    }
}
