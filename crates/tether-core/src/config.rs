#![forbid(unsafe_code)]

//! Session configuration.
//!
//! Values come from [`SessionConfig::default`], the environment
//! ([`SessionConfig::from_env`]) or, with the `config` feature, a TOML
//! document ([`SessionConfig::from_toml_str`]).
//!
//! | Variable | Field |
//! |----------|-------|
//! | `TETHER_ID_PREFIX` | `id_prefix` |
//! | `TETHER_FLUSH_BUDGET` | `flush_budget` |
//! | `TETHER_IDLE_TICK_LIMIT` | `idle_tick_limit` |
//!
//! Malformed numeric variables are reported and the default is kept.

use std::env;

use tracing::warn;

use crate::logging::targets;

/// Tunables of one [`Session`](crate::Session).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(serde::Deserialize))]
#[cfg_attr(feature = "config", serde(default, deny_unknown_fields))]
pub struct SessionConfig {
    /// Prefix of generated object ids.
    pub id_prefix: String,
    /// Maximum flush iterations of a coalesced notification batch before it
    /// is treated as observer recursion and dropped.
    pub flush_budget: usize,
    /// Maximum number of ticks run by `Session::run_until_idle`.
    pub idle_tick_limit: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            id_prefix: "$".to_owned(),
            flush_budget: 100,
            idle_tick_limit: 1000,
        }
    }
}

impl SessionConfig {
    /// Defaults overridden by `TETHER_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(prefix) = lookup("TETHER_ID_PREFIX") {
            let prefix = prefix.trim();
            if !prefix.is_empty() {
                config.id_prefix = prefix.to_owned();
            }
        }
        if let Some(budget) = parse_count(&lookup, "TETHER_FLUSH_BUDGET") {
            config.flush_budget = budget;
        }
        if let Some(limit) = parse_count(&lookup, "TETHER_IDLE_TICK_LIMIT") {
            config.idle_tick_limit = limit;
        }
        config
    }

    /// Parse a TOML document; missing keys keep their defaults.
    #[cfg(feature = "config")]
    pub fn from_toml_str(source: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(source)
    }

    #[must_use]
    pub fn with_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.id_prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn with_flush_budget(mut self, budget: usize) -> Self {
        self.flush_budget = budget;
        self
    }
}

fn parse_count(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<usize> {
    let raw = lookup(key)?;
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => Some(n),
        _ => {
            warn!(target: targets::CONFIG, key, value = %raw, "ignoring invalid count");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v).to_owned())
        }
    }

    #[test]
    fn defaults_without_variables() {
        assert_eq!(SessionConfig::from_lookup(|_| None), SessionConfig::default());
    }

    #[test]
    fn variables_override_defaults() {
        let config = SessionConfig::from_lookup(lookup(&[
            ("TETHER_ID_PREFIX", "o"),
            ("TETHER_FLUSH_BUDGET", " 12 "),
        ]));
        assert_eq!(config.id_prefix, "o");
        assert_eq!(config.flush_budget, 12);
        assert_eq!(config.idle_tick_limit, 1000);
    }

    #[test]
    #[tracing_test::traced_test]
    fn malformed_counts_keep_defaults() {
        let config = SessionConfig::from_lookup(lookup(&[
            ("TETHER_FLUSH_BUDGET", "lots"),
            ("TETHER_IDLE_TICK_LIMIT", "0"),
        ]));
        assert_eq!(config.flush_budget, 100);
        assert_eq!(config.idle_tick_limit, 1000);
        assert!(logs_contain("tether::config"));
        assert!(logs_contain("ignoring invalid count"));
    }

    #[cfg(feature = "config")]
    #[test]
    fn toml_partial_document() {
        let config = SessionConfig::from_toml_str("flush_budget = 7\n").unwrap();
        assert_eq!(config.flush_budget, 7);
        assert_eq!(config.id_prefix, "$");
        assert!(SessionConfig::from_toml_str("unknown = 1\n").is_err());
    }
}
