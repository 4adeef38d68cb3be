//! Deterministic cache key derivation.
//!
//! Keys have the shape `{prefix}{32 hex chars}`, where the hex part is a
//! truncated SHA-256 over the request fields joined by the ASCII unit
//! separator. No clock or randomness goes into a key, so identical requests
//! map to identical keys across restarts.

use sha2::{Digest, Sha256};

/// Namespace tag for AI response keys
pub const DEFAULT_KEY_PREFIX: &str = "ai:resp:";

/// Number of hex characters kept from the digest
pub const KEY_HASH_LENGTH: usize = 32;

/// ASCII unit separator; never produced by ordinary prompt or model text
const FIELD_DELIMITER: char = '\u{1f}';

/// Derives response cache keys under a fixed prefix
#[derive(Debug, Clone)]
pub struct CacheKeyBuilder {
    prefix: String,
}

impl Default for CacheKeyBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_PREFIX)
    }
}

impl CacheKeyBuilder {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Key for a `(prompt, model, temperature)` request
    pub fn response_key(&self, prompt: &str, model: &str, temperature: f64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(prompt.as_bytes());
        hasher.update(FIELD_DELIMITER.to_string().as_bytes());
        hasher.update(model.as_bytes());
        hasher.update(FIELD_DELIMITER.to_string().as_bytes());
        hasher.update(format_temperature(temperature).as_bytes());

        let digest = format!("{:x}", hasher.finalize());
        format!("{}{}", self.prefix, &digest[..KEY_HASH_LENGTH])
    }

    /// Glob pattern matching every key this builder produces
    pub fn scan_pattern(&self) -> String {
        format!("{}*", self.prefix)
    }
}

/// Key for a request under the default `ai:resp:` prefix
pub fn response_cache_key(prompt: &str, model: &str, temperature: f64) -> String {
    CacheKeyBuilder::default().response_key(prompt, model, temperature)
}

// Shortest round-trip rendering: 0.7 and 0.70 are the same f64. Negative zero
// is folded into zero.
fn format_temperature(temperature: f64) -> String {
    if temperature == 0.0 {
        return "0".to_string();
    }
    format!("{temperature}")
}

/// Minimal glob match supporting `*` (any run) and `?` (one char), matching
/// the subset of Redis `MATCH` syntax used for scoped clears.
pub(crate) fn glob_matches(pattern: &str, candidate: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let candidate: Vec<char> = candidate.chars().collect();

    let (mut p, mut c) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut star_match = 0usize;

    while c < candidate.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == candidate[c]) {
            p += 1;
            c += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some(p);
            star_match = c;
            p += 1;
        } else if let Some(star_pos) = star {
            p = star_pos + 1;
            star_match += 1;
            c = star_match;
        } else {
            return false;
        }
    }

    while p < pattern.len() && pattern[p] == '*' {
        p += 1;
    }
    p == pattern.len()
}
