//! Environment Expander.
//!
//! Resolves `${NAME}` placeholders in a server's environment map. Unset
//! variables expand to the empty string. The ambient environment is read,
//! never modified.

use std::collections::BTreeMap;

/// Trait for reading environment variables (injectable for testing).
pub trait EnvProvider {
    /// Get an environment variable, `None` when unset or not valid UTF-8.
    fn get(&self, key: &str) -> Option<String>;
}

/// Production provider that reads the process environment.
pub struct SystemEnv;

impl EnvProvider for SystemEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Test provider with predefined variables.
#[cfg(test)]
#[derive(Default)]
pub struct MockEnv {
    vars: std::collections::HashMap<String, String>,
}

#[cfg(test)]
impl MockEnv {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
impl EnvProvider for MockEnv {
    fn get(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

/// Expand every `${NAME}` in each value against the process environment.
pub fn expand_env(raw: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    expand_env_with(raw, &SystemEnv)
}

/// Expand with an injected provider.
pub fn expand_env_with(
    raw: &BTreeMap<String, String>,
    env: &dyn EnvProvider,
) -> BTreeMap<String, String> {
    raw.iter()
        .map(|(key, value)| (key.clone(), expand_placeholders(value, env)))
        .collect()
}

/// Replace `${NAME}` occurrences in `raw`.
///
/// An unterminated `${` is copied through unchanged.
pub fn expand_placeholders(raw: &str, env: &dyn EnvProvider) -> String {
    let mut expanded = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(start) = rest.find("${") {
        expanded.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            expanded.push_str(&rest[start..]);
            return expanded;
        };
        if let Some(value) = env.get(&after[..end]) {
            expanded.push_str(&value);
        }
        rest = &after[end + 1..];
    }

    expanded.push_str(rest);
    expanded
}
