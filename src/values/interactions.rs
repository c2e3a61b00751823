// Out-of-band interaction URLs
//
// Replaces interaction placeholders in evaluated payloads with unique
// callback hosts and keeps track of every URL handed out, so blind
// findings can later be correlated with the request that carried them.

use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// Placeholder substituted with a fresh callback URL
pub const INTERACTSH_URL: &str = "{{interactsh-url}}";

/// Default public callback domain
pub const DEFAULT_OOB_DOMAIN: &str = "oast.fun";

/// Correlation client contract
pub trait InteractionReplacer: Send + Sync {
    /// Substitute interaction placeholders in `text`, returning the new text and
    /// `known` extended with every URL generated for it.
    fn replace(&self, text: &str, known: Vec<String>) -> (String, Vec<String>);
}

/// Generates `<session><n>.<domain>` callback hosts
#[derive(Debug)]
pub struct OobUrlProvider {
    session_id: String,
    domain: String,
    counter: AtomicUsize,
}

impl OobUrlProvider {
    pub fn new(domain: &str) -> Self {
        Self::with_session(domain, &Self::generate_session_id())
    }

    pub fn with_session(domain: &str, session_id: &str) -> Self {
        debug!("[OOB] Interaction provider session={} domain={}", session_id, domain);
        Self {
            session_id: session_id.to_string(),
            domain: domain.trim_start_matches('.').to_string(),
            counter: AtomicUsize::new(0),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    fn generate_session_id() -> String {
        let mut rng = rand::rng();
        format!("{:016x}", rng.random::<u64>())
    }

    fn next_url(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{}{}.{}", self.session_id, n, self.domain)
    }
}

impl Default for OobUrlProvider {
    fn default() -> Self {
        Self::new(DEFAULT_OOB_DOMAIN)
    }
}

impl InteractionReplacer for OobUrlProvider {
    fn replace(&self, text: &str, mut known: Vec<String>) -> (String, Vec<String>) {
        if !text.contains(INTERACTSH_URL) {
            return (text.to_string(), known);
        }

        let mut output = String::with_capacity(text.len() + 32);
        let mut rest = text;
        while let Some(pos) = rest.find(INTERACTSH_URL) {
            let url = self.next_url();
            output.push_str(&rest[..pos]);
            output.push_str(&url);
            known.push(url);
            rest = &rest[pos + INTERACTSH_URL.len()..];
        }
        output.push_str(rest);

        (output, known)
    }
}
