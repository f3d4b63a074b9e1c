//! Environment-variable access behind an injectable collaborator.
//!
//! The resolver never touches `std::env` directly: reads for dependency
//! detection and the linker-flag workaround both go through [`Environment`].
use std::collections::BTreeMap;

/// Read and write access to environment variables.
pub trait Environment {
    /// Value of `key`, or `None` when unset or not valid UTF-8.
    fn var(&self, key: &str) -> Option<String>;

    /// Set `key` to `value`, replacing any previous value.
    fn set_var(&mut self, key: &str, value: &str);
}

/// The real process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }

    fn set_var(&mut self, key: &str, value: &str) {
        std::env::set_var(key, value);
    }
}

/// Reads fall through to a base environment; writes are recorded instead of
/// applied, so a caller can hand them to whoever launches the build.
#[derive(Debug, Default, Clone)]
pub struct EnvOverlay<E> {
    base: E,
    writes: BTreeMap<String, String>,
}

impl<E: Environment> EnvOverlay<E> {
    /// Overlay with no recorded writes on top of `base`.
    pub fn new(base: E) -> Self {
        Self {
            base,
            writes: BTreeMap::new(),
        }
    }

    /// Variables set through the overlay, in key order.
    pub fn writes(&self) -> &BTreeMap<String, String> {
        &self.writes
    }
}

impl<E: Environment> Environment for EnvOverlay<E> {
    fn var(&self, key: &str) -> Option<String> {
        self.writes
            .get(key)
            .cloned()
            .or_else(|| self.base.var(key))
    }

    fn set_var(&mut self, key: &str, value: &str) {
        self.writes.insert(key.to_string(), value.to_string());
    }
}

/// Plain in-memory environment, mostly for tests and dry runs.
#[derive(Debug, Default, Clone)]
pub struct MapEnvironment {
    vars: BTreeMap<String, String>,
}

impl MapEnvironment {
    /// Environment holding exactly `vars`.
    pub fn new<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

impl Environment for MapEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }

    fn set_var(&mut self, key: &str, value: &str) {
        self.vars.insert(key.to_string(), value.to_string());
    }
}

/// Name of the variable the build framework sets to a dependency's install root.
pub fn software_root_var(name: &str) -> String {
    let mut normalized = String::with_capacity(name.len());
    for ch in name.chars() {
        match ch {
            '-' => normalized.push_str("MIN"),
            '+' => normalized.push_str("PLUS"),
            ch if ch.is_ascii_alphanumeric() => normalized.push(ch.to_ascii_uppercase()),
            _ => normalized.push('_'),
        }
    }
    format!("EBROOT{normalized}")
}
