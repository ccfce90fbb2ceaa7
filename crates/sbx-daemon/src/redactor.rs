// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Secret scrubbing for log lines, event messages, and error payloads
//! (spec section 4.8).
//!
//! Two independent defenses: a case-insensitive set of sensitive *keys*
//! (so `"token":"..."` gets redacted regardless of the value) and a set
//! of exact sensitive *values* registered at issue time (so a plaintext
//! bootstrap token that leaks into an unrelated log line still gets
//! caught). Both are checked on every [`Redactor::redact`] call.

use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;

const REDACTED: &str = "[REDACTED]";

/// Minimum length for a registered sensitive value — short strings would
/// cause false-positive redaction of unrelated text.
const MIN_VALUE_LEN: usize = 6;

const DEFAULT_SENSITIVE_KEYS: &[&str] = &[
    "token",
    "access_token",
    "refresh_token",
    "bootstrap_token",
    "artifact_token",
    "openai_api_key",
    "anthropic_api_key",
    "claude_api_key",
    "github_token",
    "gitlab_token",
    "bitbucket_token",
    "gitea_token",
    "git_token",
    "ssh_private_key",
    "private_key",
];

#[derive(Default)]
struct RedactorState {
    keys: HashSet<String>,
    values: HashSet<String>,
}

/// Thread-safe for concurrent add/redact, per spec.
#[derive(Clone)]
pub struct Redactor {
    state: Arc<RwLock<RedactorState>>,
}

impl Default for Redactor {
    fn default() -> Self {
        let mut state = RedactorState::default();
        state.keys.extend(DEFAULT_SENSITIVE_KEYS.iter().map(|k| k.to_ascii_lowercase()));
        Self { state: Arc::new(RwLock::new(state)) }
    }
}

impl Redactor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an additional sensitive key (case-insensitive).
    pub fn add_sensitive_key(&self, key: impl Into<String>) {
        self.state.write().keys.insert(key.into().to_ascii_lowercase());
    }

    /// Register a plaintext value that must never appear in logs/events —
    /// e.g. a bootstrap token, right at issue time. Values shorter than
    /// [`MIN_VALUE_LEN`] are ignored to avoid redacting common substrings.
    pub fn add_sensitive_value(&self, value: impl Into<String>) {
        let value = value.into();
        if value.len() >= MIN_VALUE_LEN {
            self.state.write().values.insert(value);
        }
    }

    /// Redact `text` in place: exact sensitive-value hits, then
    /// key-value pairs in JSON/shell/YAML shapes whose key matches a
    /// sensitive key, case-insensitively. Idempotent — running it twice
    /// produces the same output as running it once.
    pub fn redact(&self, text: &str) -> String {
        let state = self.state.read();
        let mut out = text.to_string();
        for value in &state.values {
            if !value.is_empty() {
                out = out.replace(value.as_str(), REDACTED);
            }
        }
        out = redact_key_value_pairs(&out, &state.keys);
        out
    }
}

/// Scan for `"k":"v"`, `k="v"`, `k='v'`, `k=v`, and `k: v` shapes whose key
/// (case-insensitively) is in `keys`, replacing the value with `[REDACTED]`.
fn redact_key_value_pairs(text: &str, keys: &HashSet<String>) -> String {
    let mut out = String::with_capacity(text.len());
    let bytes = text.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if let Some((matched_len, replacement)) = try_match_pair(text, i, keys) {
            out.push_str(&replacement);
            i += matched_len;
        } else {
            // Advance by one char (not byte) to stay UTF-8 safe.
            let ch = text[i..].chars().next().unwrap_or('\0');
            out.push(ch);
            i += ch.len_utf8();
        }
    }
    out
}

/// Attempt to match a key-value pair starting at byte offset `start`.
/// Returns the number of source bytes consumed and the replacement text.
fn try_match_pair(text: &str, start: usize, keys: &HashSet<String>) -> Option<(usize, String)> {
    let rest = &text[start..];
    let key_end = rest.find(|c: char| !(c.is_alphanumeric() || c == '_'))?;
    if key_end == 0 {
        return None;
    }
    let candidate_key = &rest[..key_end];
    if !keys.contains(candidate_key.to_ascii_lowercase().as_str()) {
        return None;
    }

    let mut cursor = key_end;
    let remainder = &rest[cursor..];

    // `"key":"value"` — only valid directly after an opening quote before the key.
    if start > 0 && text.as_bytes()[start - 1] == b'"' {
        let after_quote = &rest[cursor..];
        if let Some(stripped) = after_quote.strip_prefix("\":\"") {
            if let Some(end) = stripped.find('"') {
                let total = cursor + 3 + end + 1;
                return Some((total, format!("\"{candidate_key}\":\"{REDACTED}\"")));
            }
        }
        return None;
    }

    // shell: key="value" / key='value' / key=value
    if let Some(stripped) = remainder.strip_prefix('=') {
        cursor += 1;
        if let Some(quote) = stripped.chars().next().filter(|c| *c == '"' || *c == '\'') {
            let body = &stripped[1..];
            if let Some(end) = body.find(quote) {
                let total = cursor + 1 + end + 1;
                return Some((total, format!("{candidate_key}={quote}{REDACTED}{quote}")));
            }
            return None;
        }
        let value_len = stripped.find(|c: char| c.is_whitespace()).unwrap_or(stripped.len());
        if value_len == 0 {
            return None;
        }
        let total = cursor + value_len;
        return Some((total, format!("{candidate_key}={REDACTED}")));
    }

    // yaml: `key: value` (space required after colon, per common YAML style)
    if let Some(stripped) = remainder.strip_prefix(": ") {
        let value_len = stripped.find(['\n', ',']).unwrap_or(stripped.len());
        if value_len == 0 {
            return None;
        }
        let total = cursor + 2 + value_len;
        return Some((total, format!("{candidate_key}: {REDACTED}")));
    }

    None
}
