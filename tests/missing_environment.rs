use std::env;

use sealed_id::{
    Config, ConfigError, Error, Field, KeyMaterial, TypeMarker, PASSPHRASE_VAR, SALT_VAR,
};

struct AccountMarker;
impl TypeMarker for AccountMarker {
    fn name() -> &'static str {
        "account"
    }
}

#[test]
fn missing_secrets_fail_before_any_token_is_issued() {
    env::remove_var(PASSPHRASE_VAR);
    env::set_var(SALT_VAR, "deployment-salt-001");

    assert_eq!(Config::from_env().unwrap_err(), ConfigError::MissingPassphrase);
    assert_eq!(
        KeyMaterial::global_from_env().unwrap_err(),
        ConfigError::MissingPassphrase
    );
    assert!(KeyMaterial::global().is_none());

    let account = Field::<AccountMarker>::from(5u64);
    assert_eq!(account.to_token(), Err(Error::KeyUnavailable));
    assert!(serde_json::to_string(&account).is_err());

    env::set_var(PASSPHRASE_VAR, "correct-horse-battery-staple");
    env::set_var(SALT_VAR, "");
    assert_eq!(Config::from_env().unwrap_err(), ConfigError::MissingSalt);
}
