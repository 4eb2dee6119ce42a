use std::fmt;
use std::time::{Duration, Instant};

use hkdf::Hkdf;
use hmac::Hmac;
use once_cell::sync::OnceCell;
use sha2::Sha256;
use tracing::{info, warn};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::{Config, ConfigError};

/// Length of the derived key in bytes.
pub const KEY_LENGTH: usize = 32;

static GLOBAL_KEY: OnceCell<KeyMaterial> = OnceCell::new();

/// Symmetric key material for a deployment, plus the token lifetime policy bound to it.
///
/// Derive it once at startup and share it by reference. Changing the key invalidates
/// every token issued under the old one. The key bytes are wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial {
    key: [u8; KEY_LENGTH],
    #[zeroize(skip)]
    max_age: Option<Duration>,
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("key", &"<redacted>")
            .field("max_age", &self.max_age)
            .finish()
    }
}

impl KeyMaterial {
    /// Derives key material from the passphrase and salt in `config` with
    /// PBKDF2-HMAC-SHA256.
    ///
    /// This is deliberately slow. Call it once per process and keep the result.
    pub fn derive(config: &Config) -> Result<KeyMaterial, ConfigError> {
        let started = Instant::now();
        let mut key = [0u8; KEY_LENGTH];
        pbkdf2::pbkdf2::<Hmac<Sha256>>(
            config.passphrase.as_bytes(),
            config.salt.as_bytes(),
            config.iterations,
            &mut key,
        )
        .map_err(|_| ConfigError::KeyDerivation)?;

        info!(
            iterations = config.iterations,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "derived token key material"
        );
        Ok(KeyMaterial {
            key,
            max_age: config.max_age,
        })
    }

    /// Wraps an already derived key. Tokens issued under it never expire unless
    /// [`KeyMaterial::with_max_age`] is used.
    pub fn from_key(key: [u8; KEY_LENGTH]) -> KeyMaterial {
        KeyMaterial { key, max_age: None }
    }

    /// Returns a copy of this key material with a different token lifetime policy.
    pub fn with_max_age(&self, max_age: Option<Duration>) -> KeyMaterial {
        KeyMaterial {
            key: self.key,
            max_age,
        }
    }

    pub fn max_age(&self) -> Option<Duration> {
        self.max_age
    }

    /// Expands a 32 byte subkey for `info` with HKDF-SHA256.
    pub(crate) fn subkey(&self, info: &str) -> Result<Zeroizing<[u8; KEY_LENGTH]>, ConfigError> {
        let hkdf = Hkdf::<Sha256>::new(None, &self.key);
        let mut out = Zeroizing::new([0u8; KEY_LENGTH]);
        hkdf.expand(info.as_bytes(), &mut *out)
            .map_err(|_| ConfigError::KeyDerivation)?;
        Ok(out)
    }

    /// Installs `key` as the process-wide key material used by [`crate::Field`].
    /// Only the first installation succeeds.
    pub fn install(key: KeyMaterial) -> Result<&'static KeyMaterial, ConfigError> {
        match GLOBAL_KEY.try_insert(key) {
            Ok(installed) => {
                info!("installed process-wide key material");
                Ok(installed)
            }
            Err(_) => {
                warn!("process-wide key material is already installed");
                Err(ConfigError::AlreadyInstalled)
            }
        }
    }

    /// Accesses the process-wide key material, if installed.
    pub fn global() -> Option<&'static KeyMaterial> {
        GLOBAL_KEY.get()
    }

    /// Returns the process-wide key material, deriving and installing it from the
    /// environment on first use. Concurrent first callers wait for a single derivation.
    pub fn global_from_env() -> Result<&'static KeyMaterial, ConfigError> {
        GLOBAL_KEY.get_or_try_init(|| KeyMaterial::derive(&Config::from_env()?))
    }

    #[cfg(test)]
    pub(crate) fn bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MIN_ITERATIONS;

    fn config(passphrase: &str, salt: &str) -> Config {
        Config::new(passphrase, salt)
            .unwrap()
            .iterations(MIN_ITERATIONS)
            .unwrap()
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let config = config("correct-horse-battery-staple", "deployment-salt-001");
        let first = KeyMaterial::derive(&config).unwrap();
        let second = KeyMaterial::derive(&config).unwrap();
        assert_eq!(first.bytes(), second.bytes());
    }

    #[test]
    fn test_derivation_depends_on_salt() {
        let first = KeyMaterial::derive(&config("passphrase", "salt-one")).unwrap();
        let second = KeyMaterial::derive(&config("passphrase", "salt-two")).unwrap();
        assert_ne!(first.bytes(), second.bytes());
    }

    #[test]
    fn test_derivation_carries_max_age() {
        let config = config("passphrase", "salt")
            .max_age(Duration::from_secs(60))
            .unwrap();
        let key = KeyMaterial::derive(&config).unwrap();
        assert_eq!(key.max_age(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_subkeys_are_domain_separated() {
        let key = KeyMaterial::from_key([7u8; KEY_LENGTH]);
        let user = key.subkey("user/aead").unwrap();
        let order = key.subkey("order/aead").unwrap();
        assert_ne!(*user, *order);
        assert_eq!(*user, *key.subkey("user/aead").unwrap());
    }

    #[test]
    fn test_debug_redacts_key() {
        let key = KeyMaterial::from_key([0xAB; KEY_LENGTH]);
        let shown = format!("{:?}", key);
        assert!(shown.contains("<redacted>"));
        assert!(!shown.contains("171"));
    }
}
