use std::env;
use std::fmt;
use std::time::Duration;

use thiserror::Error;
use zeroize::Zeroizing;

/// Environment variable holding the key derivation passphrase.
pub const PASSPHRASE_VAR: &str = "SEALED_ID_PASSPHRASE";
/// Environment variable holding the key derivation salt.
pub const SALT_VAR: &str = "SEALED_ID_SALT";
/// Environment variable overriding the PBKDF2 iteration count.
pub const ITERATIONS_VAR: &str = "SEALED_ID_ITERATIONS";
/// Environment variable enabling token expiry, in seconds.
pub const TOKEN_TTL_VAR: &str = "SEALED_ID_TOKEN_TTL_SECS";

/// Lowest accepted PBKDF2 iteration count.
pub const MIN_ITERATIONS: u32 = 100_000;
/// PBKDF2 iteration count used unless configured otherwise.
pub const DEFAULT_ITERATIONS: u32 = 600_000;

/// Errors in key material configuration. These are startup failures: a service that
/// gets one should refuse to accept traffic.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("key derivation passphrase is missing or empty")]
    MissingPassphrase,

    #[error("key derivation salt is missing or empty")]
    MissingSalt,

    #[error("iteration count {got} is below the minimum of {minimum}")]
    InsufficientIterations { got: u32, minimum: u32 },

    #[error("invalid value for {name}: {value:?}")]
    InvalidValue { name: String, value: String },

    #[error("invalid codec name {0:?}, expected [A-Za-z0-9-]")]
    InvalidName(String),

    #[error("key derivation failed")]
    KeyDerivation,

    #[error("key material is already installed")]
    AlreadyInstalled,
}

/// Inputs for deriving key material.
///
/// The passphrase and salt are required and must not be empty. Everything else has a
/// default:
/// - `iterations` defaults to [`DEFAULT_ITERATIONS`] and may not go below
///   [`MIN_ITERATIONS`].
/// - `max_age` defaults to `None`, meaning tokens never expire.
#[derive(Clone)]
pub struct Config {
    pub(crate) passphrase: Zeroizing<String>,
    pub(crate) salt: String,
    pub(crate) iterations: u32,
    pub(crate) max_age: Option<Duration>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Config")
            .field("passphrase", &"<redacted>")
            .field("salt", &"<redacted>")
            .field("iterations", &self.iterations)
            .field("max_age", &self.max_age)
            .finish()
    }
}

impl Config {
    /// Creates a new configuration from a passphrase and a salt, with the other
    /// settings at their defaults.
    pub fn new(passphrase: impl Into<String>, salt: impl Into<String>) -> Result<Self, ConfigError> {
        let passphrase = Zeroizing::new(passphrase.into());
        let salt = salt.into();
        if passphrase.is_empty() {
            return Err(ConfigError::MissingPassphrase);
        }
        if salt.is_empty() {
            return Err(ConfigError::MissingSalt);
        }
        Ok(Config {
            passphrase,
            salt,
            iterations: DEFAULT_ITERATIONS,
            max_age: None,
        })
    }

    /// Sets the PBKDF2 iteration count. Must be at least [`MIN_ITERATIONS`].
    pub fn iterations(mut self, iterations: u32) -> Result<Self, ConfigError> {
        if iterations < MIN_ITERATIONS {
            Err(ConfigError::InsufficientIterations {
                got: iterations,
                minimum: MIN_ITERATIONS,
            })
        } else {
            self.iterations = iterations;
            Ok(self)
        }
    }

    /// Makes tokens expire `max_age` after they were issued.
    pub fn max_age(mut self, max_age: Duration) -> Result<Self, ConfigError> {
        if max_age.is_zero() {
            Err(ConfigError::InvalidValue {
                name: "max_age".to_string(),
                value: "0".to_string(),
            })
        } else {
            self.max_age = Some(max_age);
            Ok(self)
        }
    }

    /// Reads the configuration from the process environment.
    ///
    /// See [`PASSPHRASE_VAR`], [`SALT_VAR`], [`ITERATIONS_VAR`] and [`TOKEN_TTL_VAR`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Reads the configuration through `lookup`, which maps a variable name to its value.
    ///
    /// ```
    /// use std::collections::HashMap;
    /// use sealed_id::Config;
    ///
    /// let vars = HashMap::from([
    ///     ("SEALED_ID_PASSPHRASE", "correct-horse-battery-staple"),
    ///     ("SEALED_ID_SALT", "deployment-salt-001"),
    /// ]);
    /// let config = Config::from_lookup(|name| vars.get(name).map(|v| v.to_string())).unwrap();
    /// assert_eq!(config.get_iterations(), sealed_id::DEFAULT_ITERATIONS);
    /// ```
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let passphrase = lookup(PASSPHRASE_VAR).ok_or(ConfigError::MissingPassphrase)?;
        let salt = lookup(SALT_VAR).ok_or(ConfigError::MissingSalt)?;
        let mut config = Config::new(passphrase, salt)?;

        if let Some(raw) = lookup(ITERATIONS_VAR) {
            config = config.iterations(parse_number(ITERATIONS_VAR, &raw)?)?;
        }
        if let Some(raw) = lookup(TOKEN_TTL_VAR) {
            let secs: u64 = parse_number(TOKEN_TTL_VAR, &raw)?;
            config = config.max_age(Duration::from_secs(secs))?;
        }
        Ok(config)
    }

    pub fn get_iterations(&self) -> u32 {
        self.iterations
    }

    pub fn get_max_age(&self) -> Option<Duration> {
        self.max_age
    }
}

fn parse_number<N: std::str::FromStr>(name: &str, raw: &str) -> Result<N, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        name: name.to_string(),
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::new("passphrase", "salt").unwrap();
        assert_eq!(config.get_iterations(), DEFAULT_ITERATIONS);
        assert_eq!(config.get_max_age(), None);
    }

    #[test]
    fn test_empty_secrets_rejected() {
        assert_eq!(
            Config::new("", "salt").unwrap_err(),
            ConfigError::MissingPassphrase
        );
        assert_eq!(
            Config::new("passphrase", "").unwrap_err(),
            ConfigError::MissingSalt
        );
    }

    #[test]
    fn test_iteration_floor() {
        let config = Config::new("passphrase", "salt").unwrap();
        assert_eq!(
            config.clone().iterations(99_999).unwrap_err(),
            ConfigError::InsufficientIterations {
                got: 99_999,
                minimum: MIN_ITERATIONS
            }
        );
        assert_eq!(
            config.iterations(MIN_ITERATIONS).unwrap().get_iterations(),
            MIN_ITERATIONS
        );
    }

    #[test]
    fn test_from_lookup() {
        let config = Config::from_lookup(lookup_from(&[
            (PASSPHRASE_VAR, "passphrase"),
            (SALT_VAR, "salt"),
            (ITERATIONS_VAR, "250000"),
            (TOKEN_TTL_VAR, "3600"),
        ]))
        .unwrap();
        assert_eq!(config.get_iterations(), 250_000);
        assert_eq!(config.get_max_age(), Some(Duration::from_secs(3600)));
    }

    #[test]
    fn test_from_lookup_missing() {
        assert_eq!(
            Config::from_lookup(lookup_from(&[(SALT_VAR, "salt")])).unwrap_err(),
            ConfigError::MissingPassphrase
        );
        assert_eq!(
            Config::from_lookup(lookup_from(&[(PASSPHRASE_VAR, "passphrase")])).unwrap_err(),
            ConfigError::MissingSalt
        );
        assert_eq!(
            Config::from_lookup(lookup_from(&[(PASSPHRASE_VAR, ""), (SALT_VAR, "salt")]))
                .unwrap_err(),
            ConfigError::MissingPassphrase
        );
    }

    #[test]
    fn test_from_lookup_invalid_numbers() {
        let result = Config::from_lookup(lookup_from(&[
            (PASSPHRASE_VAR, "passphrase"),
            (SALT_VAR, "salt"),
            (ITERATIONS_VAR, "lots"),
        ]));
        assert_eq!(
            result.unwrap_err(),
            ConfigError::InvalidValue {
                name: ITERATIONS_VAR.to_string(),
                value: "lots".to_string()
            }
        );

        let result = Config::from_lookup(lookup_from(&[
            (PASSPHRASE_VAR, "passphrase"),
            (SALT_VAR, "salt"),
            (TOKEN_TTL_VAR, "0"),
        ]));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = Config::new("hunter2-passphrase", "my-salt").unwrap();
        let shown = format!("{:?}", config);
        assert!(!shown.contains("hunter2"));
        assert!(!shown.contains("my-salt"));
    }
}
