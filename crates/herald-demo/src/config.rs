//! Demo configuration read from environment variables.

use thiserror::Error;

/// Number of orders placed when `HERALD_DEMO_ORDERS` is unset.
pub const DEFAULT_ORDERS: u32 = 3;

/// Units in stock when `HERALD_DEMO_STOCK` is unset.
pub const DEFAULT_STOCK: u32 = 10;

/// A configuration value that could not be used.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The variable is set but is not a valid number.
    #[error("{name} must be a non-negative integer, got {value:?}")]
    InvalidNumber {
        /// The variable name.
        name: &'static str,
        /// The rejected value.
        value: String,
    },
}

/// Settings for one demo run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemoConfig {
    /// Orders to place.
    pub orders: u32,
    /// Initial stock of the order book.
    pub stock: u32,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            orders: DEFAULT_ORDERS,
            stock: DEFAULT_STOCK,
        }
    }
}

impl DemoConfig {
    /// Reads `HERALD_DEMO_ORDERS` and `HERALD_DEMO_STOCK` from the process
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidNumber` for a value that does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the settings through `lookup`, which returns a variable's
    /// value if it is set.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidNumber` for a value that does not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            orders: read_number(&lookup, "HERALD_DEMO_ORDERS", DEFAULT_ORDERS)?,
            stock: read_number(&lookup, "HERALD_DEMO_STOCK", DEFAULT_STOCK)?,
        })
    }
}

fn read_number(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: u32,
) -> Result<u32, ConfigError> {
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { name, value }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = DemoConfig::from_lookup(lookup_from(&[])).unwrap();

        assert_eq!(config, DemoConfig::default());
        assert_eq!(config.orders, 3);
    }

    #[test]
    fn test_reads_both_variables() {
        let config = DemoConfig::from_lookup(lookup_from(&[
            ("HERALD_DEMO_ORDERS", "5"),
            ("HERALD_DEMO_STOCK", " 40 "),
        ]))
        .unwrap();

        assert_eq!(config, DemoConfig { orders: 5, stock: 40 });
    }

    #[test]
    fn test_rejects_non_numeric_values() {
        let err = DemoConfig::from_lookup(lookup_from(&[("HERALD_DEMO_ORDERS", "many")]))
            .unwrap_err();

        assert_eq!(
            err,
            ConfigError::InvalidNumber {
                name: "HERALD_DEMO_ORDERS",
                value: "many".to_owned(),
            }
        );
        assert_eq!(
            err.to_string(),
            "HERALD_DEMO_ORDERS must be a non-negative integer, got \"many\""
        );
    }
}
