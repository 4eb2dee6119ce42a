use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;

use crate::{ConfigError, Identifier, KeyMaterial};

/// Error returned for encode/decode failures.
///
/// Callers facing end users should not tell these apart in responses; see
/// [`crate::binding::Rejection`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    /// The token has the wrong characters, prefix, length or encoding.
    #[error("malformed token")]
    Malformed,
    /// The token was not produced by this codec under this key, or was altered.
    #[error("token authentication failed")]
    AuthenticationFailed,
    /// The token is authentic but outside its allowed age.
    #[error("token expired")]
    Expired,
    /// The token is authentic but does not hold a value of the requested type.
    #[error("token does not hold an identifier of the requested type")]
    IdentifierMismatch,
    #[error("identifier is {length} bytes, at most {maximum} are supported")]
    IdentifierTooLong { length: usize, maximum: usize },
    #[error("token encryption failed")]
    EncryptionFailed,
    /// No process-wide key material has been installed.
    #[error("key material is not available")]
    KeyUnavailable,
    /// A codec could not be built, e.g. from a type marker with an invalid name.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Current token frame version.
const VERSION: u8 = 1;

// The header (version byte and issue time) is authenticated as associated data.
const HEADER_LENGTH: usize = 1 + 8;
const NONCE_LENGTH: usize = 24;
const TAG_LENGTH: usize = 16;
const OVERHEAD: usize = HEADER_LENGTH + NONCE_LENGTH + TAG_LENGTH;

/// Longest identifier, in canonical bytes, that can be encoded.
pub const MAX_IDENTIFIER_LENGTH: usize = 1024;

// Body lengths in base64 characters. Frames are always a multiple of 3 bytes.
const MIN_BODY_LENGTH: usize = (OVERHEAD + 3) / 3 * 4;
const MAX_BODY_LENGTH: usize = (OVERHEAD + MAX_IDENTIFIER_LENGTH + 3) / 3 * 4;

// Tolerated clock difference between issuers when checking token age.
const MAX_CLOCK_SKEW_SECS: u64 = 60;

/// Core encoder/decoder.
#[derive(Clone)]
pub struct Codec {
    cipher: XChaCha20Poly1305,
    max_age_secs: Option<u64>,
    prefix: String,
}

impl fmt::Debug for Codec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Codec")
            .field("prefix", &self.prefix)
            .field("max_age_secs", &self.max_age_secs)
            .finish_non_exhaustive()
    }
}

impl Codec {
    /// Creates a new `Codec` instance with the given name and key material.
    ///
    /// A non-empty `name` becomes the token prefix (`name_...`). The name is also used to
    /// derive a name-specific key from `key`, so codecs with different names never accept
    /// each other's tokens. An empty name gives tokens without a prefix.
    ///
    /// # Arguments
    ///
    /// * `name` - The codec name, made of ASCII letters, digits and `-`.
    /// * `key` - Key material, usually derived once at startup.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidName`] if the name has other characters.
    ///
    /// # Examples
    ///
    /// ```
    /// use sealed_id::{Codec, KeyMaterial};
    ///
    /// let key = KeyMaterial::from_key([7u8; 32]);
    /// let codec = Codec::new("example", &key).unwrap();
    /// ```
    pub fn new(name: &str, key: &KeyMaterial) -> Result<Codec, ConfigError> {
        if !name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-')
        {
            return Err(ConfigError::InvalidName(name.to_string()));
        }
        let aead_key = key.subkey(&format!("{}/aead", name))?;
        let prefix = if name.is_empty() {
            String::new()
        } else {
            format!("{}_", name)
        };
        Ok(Codec {
            cipher: XChaCha20Poly1305::new(Key::from_slice(&*aead_key)),
            max_age_secs: key.max_age().map(|age| age.as_secs()),
            prefix,
        })
    }

    /// Returns the prefix put in front of every token, including the trailing `_`.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Encrypts an identifier into a URL safe token.
    ///
    /// The identifier's canonical bytes are sealed with XChaCha20-Poly1305 under a fresh
    /// random nonce, so encoding the same identifier twice gives different tokens. The
    /// token only contains `A-Z`, `a-z`, `0-9`, `-` and `_`.
    ///
    /// # Examples
    ///
    /// ```
    /// use sealed_id::{Codec, KeyMaterial};
    ///
    /// let codec = Codec::new("example", &KeyMaterial::from_key([7u8; 32])).unwrap();
    /// let token = codec.encode(&12345u64).unwrap();
    ///
    /// assert!(token.starts_with("example_"));
    /// assert_eq!(codec.decode::<u64>(&token), Ok(12345));
    /// ```
    pub fn encode<I: Identifier>(&self, identifier: &I) -> Result<String, Error> {
        self.encode_at(identifier, now_secs())
    }

    /// Like [`Codec::encode`], with an explicit issue time in seconds since the Unix epoch.
    pub fn encode_at<I: Identifier>(&self, identifier: &I, issued_at: u64) -> Result<String, Error> {
        self.seal(&identifier.to_canonical_bytes(), issued_at)
    }

    /// Encrypts a string identifier into a token. Same as [`Codec::encode`] on the
    /// equivalent `String`.
    ///
    /// ```
    /// use sealed_id::{Codec, KeyMaterial};
    ///
    /// let codec = Codec::new("", &KeyMaterial::from_key([7u8; 32])).unwrap();
    /// let token = codec.encode_str("42").unwrap();
    /// assert_eq!(codec.decode::<String>(&token), Ok("42".to_string()));
    /// ```
    pub fn encode_str(&self, identifier: &str) -> Result<String, Error> {
        self.seal(identifier.as_bytes(), now_secs())
    }

    /// Encrypts raw identifier bytes into a token.
    pub fn encode_bytes(&self, identifier: &[u8]) -> Result<String, Error> {
        self.seal(identifier, now_secs())
    }

    /// Decodes a token back into the identifier it was made from.
    ///
    /// Malformed input is rejected before any cryptography runs. Every failed
    /// verification, whatever its cause, is [`Error::AuthenticationFailed`].
    ///
    /// # Examples
    ///
    /// ```
    /// use sealed_id::{Codec, Error, KeyMaterial};
    ///
    /// let codec = Codec::new("example", &KeyMaterial::from_key([7u8; 32])).unwrap();
    ///
    /// assert_eq!(codec.decode::<u64>("not a token!"), Err(Error::Malformed));
    /// ```
    pub fn decode<I: Identifier>(&self, token: &str) -> Result<I, Error> {
        self.decode_at(token, now_secs())
    }

    /// Like [`Codec::decode`], checking the token age against `now` (seconds since the
    /// Unix epoch).
    pub fn decode_at<I: Identifier>(&self, token: &str, now: u64) -> Result<I, Error> {
        let bytes = self.open(token, now)?;
        I::from_canonical_bytes(bytes).ok_or(Error::IdentifierMismatch)
    }

    /// Decodes a token into raw identifier bytes.
    pub fn decode_bytes(&self, token: &str) -> Result<Vec<u8>, Error> {
        self.open(token, now_secs())
    }

    fn seal(&self, identifier: &[u8], issued_at: u64) -> Result<String, Error> {
        if identifier.len() > MAX_IDENTIFIER_LENGTH {
            return Err(Error::IdentifierTooLong {
                length: identifier.len(),
                maximum: MAX_IDENTIFIER_LENGTH,
            });
        }

        let mut header = [0u8; HEADER_LENGTH];
        header[0] = VERSION;
        header[1..].copy_from_slice(&issued_at.to_be_bytes());

        let mut nonce = [0u8; NONCE_LENGTH];
        OsRng.fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher
            .encrypt(
                XNonce::from_slice(&nonce),
                Payload {
                    msg: &pad(identifier),
                    aad: &header,
                },
            )
            .map_err(|_| Error::EncryptionFailed)?;

        let mut frame = Vec::with_capacity(HEADER_LENGTH + NONCE_LENGTH + ciphertext.len());
        frame.extend_from_slice(&header);
        frame.extend_from_slice(&nonce);
        frame.extend_from_slice(&ciphertext);

        Ok(format!("{}{}", self.prefix, URL_SAFE_NO_PAD.encode(frame)))
    }

    fn open(&self, token: &str, now: u64) -> Result<Vec<u8>, Error> {
        // Structural checks first, without touching the cipher.
        if !is_token_charset(token) {
            return Err(Error::Malformed);
        }
        let body = token.strip_prefix(&self.prefix).ok_or(Error::Malformed)?;
        if body.len() % 4 != 0 || body.len() < MIN_BODY_LENGTH || body.len() > MAX_BODY_LENGTH {
            return Err(Error::Malformed);
        }
        let frame = URL_SAFE_NO_PAD
            .decode(body)
            .map_err(|_| Error::Malformed)?;

        let (header, rest) = frame.split_at(HEADER_LENGTH);
        if header[0] != VERSION {
            return Err(Error::AuthenticationFailed);
        }
        let (nonce, ciphertext) = rest.split_at(NONCE_LENGTH);

        let plaintext = self
            .cipher
            .decrypt(
                XNonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad: header,
                },
            )
            .map_err(|_| Error::AuthenticationFailed)?;
        let identifier = unpad(plaintext).ok_or(Error::AuthenticationFailed)?;

        if let Some(max_age) = self.max_age_secs {
            let mut issued_at = [0u8; 8];
            issued_at.copy_from_slice(&header[1..]);
            let issued_at = u64::from_be_bytes(issued_at);
            if issued_at > now.saturating_add(MAX_CLOCK_SKEW_SECS)
                || now.saturating_sub(issued_at) > max_age
            {
                return Err(Error::Expired);
            }
        }

        Ok(identifier)
    }
}

/// Checks that `s` is a non-empty string over `[A-Za-z0-9_=-]`.
pub(crate) fn is_token_charset(s: &str) -> bool {
    !s.is_empty()
        && s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'='))
}

// Appends 1 to 3 copies of the pad length so that the whole frame is a multiple of 3
// bytes. The base64 body then has no padding and no unused bits.
fn pad(identifier: &[u8]) -> Vec<u8> {
    let pad_length = match (OVERHEAD + identifier.len()) % 3 {
        0 => 3,
        r => 3 - r,
    };
    let mut plaintext = Vec::with_capacity(identifier.len() + pad_length);
    plaintext.extend_from_slice(identifier);
    plaintext.resize(identifier.len() + pad_length, pad_length as u8);
    plaintext
}

fn unpad(mut plaintext: Vec<u8>) -> Option<Vec<u8>> {
    let pad_length = *plaintext.last()? as usize;
    if !(1..=3).contains(&pad_length) || pad_length > plaintext.len() {
        return None;
    }
    let start = plaintext.len() - pad_length;
    if plaintext[start..].iter().any(|&b| b as usize != pad_length) {
        return None;
    }
    plaintext.truncate(start);
    Some(plaintext)
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
