use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Flat view of everything the operator supplied on the command line.
///
/// Values are kept as the raw strings the operator typed; typed access goes through
/// [`CliArgumentSet::get_bool`] and [`CliArgumentSet::get_parsed`] so a bad value is
/// reported with the key it came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliArgumentSet {
    values: BTreeMap<String, String>,
    overrides: Vec<(String, String)>,
    pub force_start: bool,
    pub loopback_only: bool,
    pub loopback_force: bool,
    pub start: bool,
    pub perf: bool,
}

impl CliArgumentSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    #[cfg(test)]
    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.set(key, value);
        self
    }

    /// Raw `key=value` override for the profile parameters; later ones win.
    pub fn add_override(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.overrides.push((key.into(), value.into()));
    }

    pub fn overrides(&self) -> impl Iterator<Item = (&str, &str)> {
        self.overrides.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.values.keys().any(|k| k.starts_with(prefix))
    }

    pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        self.get(key).map(|v| parse_bool(key, v)).transpose()
    }

    pub fn get_parsed<T: FromStr>(&self, key: &str) -> Result<Option<T>> {
        self.get(key)
            .map(|v| {
                v.trim()
                    .parse::<T>()
                    .map_err(|_| Error::invalid(key, v, "not a valid number"))
            })
            .transpose()
    }
}

pub fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(Error::invalid(key, raw, "expected true or false")),
    }
}
