//! Validated environment configuration

use crate::error::{EnvironError, Result};
use serde_json::Value;
use std::collections::BTreeMap;

pub const DEFAULT_STATE_PORT: u16 = 37017;
pub const DEFAULT_API_PORT: u16 = 17070;
pub const DEFAULT_SERIES: &str = "noble";

/// Attributes this core interprets. Everything else is backend-specific
/// and preserved opaquely for the provider to validate.
const KNOWN_ATTRS: &[&str] = &[
    "name",
    "type",
    "admin-secret",
    "ca-cert",
    "ca-private-key",
    "authorized-keys",
    "state-port",
    "api-port",
    "default-series",
    "development",
];

/// Immutable, validated key/value configuration for one environment.
///
/// Construction validates the core attributes and merges defaults;
/// backend-specific attributes pass through untouched and are validated
/// by the provider's `validate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironConfig {
    attrs: BTreeMap<String, Value>,
}

impl EnvironConfig {
    pub fn new(attrs: BTreeMap<String, Value>) -> Result<Self> {
        let mut config = Self { attrs };
        if config.opt_str("name")?.unwrap_or_default().is_empty() {
            return Err(EnvironError::Missing("name"));
        }
        if config.opt_str("type")?.unwrap_or_default().is_empty() {
            return Err(EnvironError::Missing("type"));
        }
        for key in ["admin-secret", "ca-cert", "ca-private-key", "authorized-keys"] {
            config.opt_str(key)?;
        }
        config.opt_port("state-port")?;
        config.opt_port("api-port")?;

        let defaults: [(&str, Value); 4] = [
            ("state-port", Value::from(DEFAULT_STATE_PORT)),
            ("api-port", Value::from(DEFAULT_API_PORT)),
            ("default-series", Value::from(DEFAULT_SERIES)),
            ("development", Value::from(false)),
        ];
        for (key, value) in defaults {
            config.attrs.entry(key.to_string()).or_insert(value);
        }
        Ok(config)
    }

    pub fn name(&self) -> &str {
        self.expect_str("name")
    }

    /// The provider type this environment is backed by.
    pub fn provider_type(&self) -> &str {
        self.expect_str("type")
    }

    pub fn admin_secret(&self) -> Option<String> {
        self.non_empty_str("admin-secret")
    }

    /// CA certificate in PEM form.
    pub fn ca_cert(&self) -> Option<String> {
        self.non_empty_str("ca-cert")
    }

    pub fn ca_private_key(&self) -> Option<String> {
        self.non_empty_str("ca-private-key")
    }

    pub fn authorized_keys(&self) -> String {
        self.non_empty_str("authorized-keys").unwrap_or_default()
    }

    pub fn state_port(&self) -> u16 {
        self.expect_port("state-port")
    }

    pub fn api_port(&self) -> u16 {
        self.expect_port("api-port")
    }

    pub fn default_series(&self) -> &str {
        self.expect_str("default-series")
    }

    pub fn development(&self) -> bool {
        self.attrs
            .get("development")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// The complete attribute map, defaults included.
    pub fn attrs(&self) -> &BTreeMap<String, Value> {
        &self.attrs
    }

    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attrs.get(key)
    }

    /// Backend-specific attributes this core does not interpret.
    pub fn unknown_attrs(&self) -> BTreeMap<String, Value> {
        self.attrs
            .iter()
            .filter(|(key, _)| !KNOWN_ATTRS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// A new config with `updates` applied, re-validated. Used by
    /// providers to persist backend-generated attributes during
    /// `prepare` so a later `open` is equivalent.
    pub fn with_updates(&self, updates: BTreeMap<String, Value>) -> Result<EnvironConfig> {
        let mut attrs = self.attrs.clone();
        attrs.extend(updates);
        EnvironConfig::new(attrs)
    }

    fn opt_str(&self, key: &'static str) -> Result<Option<&str>> {
        match self.attrs.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(_) => Err(EnvironError::InvalidConfig(format!(
                "{key} must be a string"
            ))),
        }
    }

    fn non_empty_str(&self, key: &str) -> Option<String> {
        match self.attrs.get(key) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            _ => None,
        }
    }

    fn opt_port(&self, key: &'static str) -> Result<Option<u16>> {
        match self.attrs.get(key) {
            None => Ok(None),
            Some(value) => match value.as_u64().and_then(|n| u16::try_from(n).ok()) {
                Some(port) => Ok(Some(port)),
                None => Err(EnvironError::InvalidConfig(format!(
                    "{key} must be a port number"
                ))),
            },
        }
    }

    // Validated at construction, so these cannot fail afterwards.
    fn expect_str(&self, key: &str) -> &str {
        match self.attrs.get(key) {
            Some(Value::String(s)) => s,
            _ => unreachable!("{key} validated at construction"),
        }
    }

    fn expect_port(&self, key: &'static str) -> u16 {
        match self.attrs.get(key).and_then(Value::as_u64) {
            Some(port) => port as u16,
            None => unreachable!("{key} validated at construction"),
        }
    }
}
