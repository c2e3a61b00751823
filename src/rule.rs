// Fuzzing rules for partfuzz
//
// A rule says which parts of a request to touch (part + key/value filters),
// how to place the payload (rule type), whether each mutation is sent on
// its own or all together (mode), and which payload expressions to inject.
//
// Rules are declared as a serializable RuleDefinition and compiled once into
// an immutable Rule; compilation validates every string field and caches
// the parsed form.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use crate::components::component_for;
use crate::engine::RuleOutcome;
use crate::error::FuzzError;
use crate::models::{FuzzRequest, PartKind};
use crate::placement::RuleType;
use crate::sink::ExecuteRuleInput;
use crate::values::RuleOptions;

/// How mutated parts are grouped into requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeType {
    /// One request per mutated part
    Single,
    /// One request carrying every mutation
    Multiple,
}

impl fmt::Display for ModeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModeType::Single => write!(f, "single"),
            ModeType::Multiple => write!(f, "multiple"),
        }
    }
}

impl FromStr for ModeType {
    type Err = FuzzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single" => Ok(ModeType::Single),
            "multiple" => Ok(ModeType::Multiple),
            other => Err(FuzzError::InvalidRule(format!(
                "wrong mode '{}', must be single/multiple",
                other
            ))),
        }
    }
}

/// Rule as written by users
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RuleDefinition {
    #[serde(rename = "type")]
    pub rule_type: String,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub part: Option<String>,
    /// Exact key names, compared case-insensitively
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub keys_regex: Vec<String>,
    #[serde(default)]
    pub values_regex: Vec<String>,
    /// Payload expressions
    #[serde(default)]
    pub fuzz: Vec<String>,
}

/// Compiled, read-only rule
#[derive(Debug, Clone)]
pub struct Rule {
    pub(crate) rule_type: RuleType,
    pub(crate) mode_type: ModeType,
    pub(crate) part: PartKind,
    keys: HashSet<String>,
    keys_regex: Vec<Regex>,
    values_regex: Vec<Regex>,
    payloads: Vec<String>,
    pub(crate) options: Arc<RuleOptions>,
}

impl Rule {
    /// Rule matching every key of `part`, without payloads
    pub fn new(rule_type: RuleType, mode_type: ModeType, part: PartKind, options: Arc<RuleOptions>) -> Self {
        Self {
            rule_type,
            mode_type,
            part,
            keys: HashSet::new(),
            keys_regex: Vec::new(),
            values_regex: Vec::new(),
            payloads: Vec::new(),
            options,
        }
    }

    pub fn compile(definition: &RuleDefinition, options: Arc<RuleOptions>) -> Result<Self, FuzzError> {
        let rule_type = definition.rule_type.parse::<RuleType>()?;
        let mode_type = match &definition.mode {
            Some(mode) => mode.parse::<ModeType>()?,
            None => ModeType::Single,
        };
        let part = match &definition.part {
            Some(part) => part.parse::<PartKind>()?,
            None => PartKind::Query,
        };

        if definition.fuzz.is_empty() {
            return Err(FuzzError::InvalidRule("rule has no fuzz payloads".to_string()));
        }

        let mut rule = Self::new(rule_type, mode_type, part, options)
            .with_keys(&definition.keys)
            .with_payloads(&definition.fuzz);
        for pattern in &definition.keys_regex {
            rule.keys_regex.push(Regex::new(pattern)?);
        }
        for pattern in &definition.values_regex {
            rule.values_regex.push(Regex::new(pattern)?);
        }

        debug!(
            "[Fuzz] Compiled {} rule: mode={} part={} payloads={}",
            rule.rule_type,
            rule.mode_type,
            rule.part,
            rule.payloads.len()
        );

        Ok(rule)
    }

    pub fn with_keys<S: AsRef<str>>(mut self, keys: &[S]) -> Self {
        self.keys
            .extend(keys.iter().map(|k| k.as_ref().to_lowercase()));
        self
    }

    pub fn with_keys_regex(mut self, pattern: &str) -> Result<Self, FuzzError> {
        self.keys_regex.push(Regex::new(pattern)?);
        Ok(self)
    }

    pub fn with_values_regex(mut self, pattern: &str) -> Result<Self, FuzzError> {
        self.values_regex.push(Regex::new(pattern)?);
        Ok(self)
    }

    pub fn with_payloads<S: AsRef<str>>(mut self, payloads: &[S]) -> Self {
        self.payloads
            .extend(payloads.iter().map(|p| p.as_ref().to_string()));
        self
    }

    pub fn rule_type(&self) -> RuleType {
        self.rule_type
    }

    pub fn mode_type(&self) -> ModeType {
        self.mode_type
    }

    pub fn part(&self) -> PartKind {
        self.part
    }

    pub fn payloads(&self) -> &[String] {
        &self.payloads
    }

    /// Whether the part `key` = `value` is eligible for mutation.
    ///
    /// No filters at all means every part matches. Otherwise a part matches
    /// when a value regex matches its (non-empty) value, its lowercased key
    /// is listed, or a key regex matches the key.
    pub fn matches(&self, key: &str, value: &str) -> bool {
        if self.keys.is_empty() && self.keys_regex.is_empty() && self.values_regex.is_empty() {
            return true;
        }

        if !value.is_empty() && self.values_regex.iter().any(|re| re.is_match(value)) {
            return true;
        }

        if key.is_empty() {
            return false;
        }

        self.keys.contains(&key.to_lowercase()) || self.keys_regex.iter().any(|re| re.is_match(key))
    }

    /// Run every payload of the rule against the rule's part of `request`.
    ///
    /// Each payload starts from a freshly parsed component. Stops at the
    /// first halt requested by the sink.
    pub fn execute(&self, input: &mut ExecuteRuleInput<'_>, request: &FuzzRequest) -> Result<RuleOutcome, FuzzError> {
        for payload in &self.payloads {
            let mut component = component_for(self.part, request)?;
            if self.execute_part_rule(input, payload, component.as_mut())? == RuleOutcome::Halted {
                debug!("[Fuzz] Sink requested stop, skipping remaining payloads");
                return Ok(RuleOutcome::Halted);
            }
        }
        Ok(RuleOutcome::Completed)
    }
}
