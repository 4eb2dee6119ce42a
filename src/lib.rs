//! `sealed_id` turns internal identifiers into opaque, tamper-evident, URL-safe tokens and
//! back, and offers a generic field type that does this automatically with Serde.
//!
//! This library is primarily designed to hide raw database IDs in your API. A token
//! reveals nothing about the identifier inside it, and any token that was altered, made
//! up, or made with another key is refused. This makes object enumeration impractical
//! while you keep using plain integers (or any other handle) as keys internally.
//!
//! Tokens can carry a per-type prefix, inspired by Stripe's API (`user_...`). The prefix
//! also selects a type-specific key, so identifiers of different object types can't be
//! mixed up.
//!
//! The key is derived from a passphrase and a salt with PBKDF2-HMAC-SHA256 (at least
//! 100,000 rounds), and each token is sealed with XChaCha20-Poly1305 under a random nonce.
//! Encoding the same identifier twice gives two different tokens that both decode.
//!
//! Please note that leaking the passphrase means you lose all the security benefits.
//! You also cannot change the key, unless it's OK that all exposed tokens stop working.
//!
//! # Usage
//!
//! ## Key material
//!
//! Derive the key once at startup, from the environment (`SEALED_ID_PASSPHRASE`,
//! `SEALED_ID_SALT`, optionally `SEALED_ID_ITERATIONS` and `SEALED_ID_TOKEN_TTL_SECS`)
//! or from an explicit [`Config`]. Missing secrets are a [`ConfigError`]; don't start
//! serving requests without key material.
//!
//! ```
//! use sealed_id::{Codec, Config, Error, KeyMaterial};
//!
//! let config = Config::new("correct-horse-battery-staple", "deployment-salt-001")
//!     .unwrap()
//!     .iterations(100_000)
//!     .unwrap();
//! let key = KeyMaterial::derive(&config).unwrap();
//!
//! let codec = Codec::new("", &key).unwrap();
//! let token = codec.encode_str("42").unwrap();
//! assert_eq!(codec.decode::<String>(&token), Ok("42".to_string()));
//! assert_eq!(codec.decode::<String>("not a token!"), Err(Error::Malformed));
//! ```
//!
//! ## Generic `Field` API
//!
//! Use the generic [`Field`] type to define a type for each kind of object you expose.
//! It encodes on serialization and decodes on deserialization, using the process-wide
//! key material installed with [`KeyMaterial::install`] or
//! [`KeyMaterial::global_from_env`].
//!
//! ## Routing
//!
//! [`PathBinding`] decodes path segments before a handler runs and builds outbound
//! links. It turns every decode failure into the same [`Rejection`].

mod binding;
mod codec;
mod config;
mod field;
mod identifier;
mod key;

pub use binding::{is_token_segment, PathBinding, Rejection, RejectionPolicy, SEGMENT_PATTERN};
pub use codec::{Codec, Error, MAX_IDENTIFIER_LENGTH};
pub use config::{
    Config, ConfigError, DEFAULT_ITERATIONS, ITERATIONS_VAR, MIN_ITERATIONS, PASSPHRASE_VAR,
    SALT_VAR, TOKEN_TTL_VAR,
};
pub use field::{Field, TypeMarker};
pub use identifier::Identifier;
pub use key::{KeyMaterial, KEY_LENGTH};
