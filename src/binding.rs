//! Glue between the codec and a routing layer.
//!
//! A router extracts the path segment holding an encoded identifier and hands it to
//! [`PathBinding::extract`] before dispatching, and builds outbound links with
//! [`PathBinding::link`]. Decode failures collapse into a single [`Rejection`] so
//! responses never reveal why a token was refused.

use std::fmt;

use tracing::debug;

use crate::codec::is_token_charset;
use crate::{Codec, Error, Identifier};

/// Pattern a path segment holding an encoded identifier must match.
pub const SEGMENT_PATTERN: &str = "[A-Za-z0-9_=-]+";

/// Returns whether `segment` could be a token, i.e. matches [`SEGMENT_PATTERN`].
pub fn is_token_segment(segment: &str) -> bool {
    is_token_charset(segment)
}

/// How a refused token is reported to the client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RejectionPolicy {
    /// Respond as if the resource does not exist.
    #[default]
    NotFound,
    BadRequest,
}

/// A refused token. Carries no detail about the cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejection {
    policy: RejectionPolicy,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.reason())
    }
}

impl std::error::Error for Rejection {}

impl Rejection {
    /// HTTP status code for the response.
    pub fn status_code(&self) -> u16 {
        match self.policy {
            RejectionPolicy::NotFound => 404,
            RejectionPolicy::BadRequest => 400,
        }
    }

    pub fn reason(&self) -> &'static str {
        match self.policy {
            RejectionPolicy::NotFound => "not found",
            RejectionPolicy::BadRequest => "bad request",
        }
    }
}

/// Binds tokens in request paths to identifiers. Holds no state beyond a borrowed codec.
#[derive(Clone, Copy)]
pub struct PathBinding<'a> {
    codec: &'a Codec,
    policy: RejectionPolicy,
}

impl fmt::Debug for PathBinding<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PathBinding")
            .field("prefix", &self.codec.prefix())
            .field("policy", &self.policy)
            .finish()
    }
}

impl<'a> PathBinding<'a> {
    pub fn new(codec: &'a Codec) -> Self {
        PathBinding {
            codec,
            policy: RejectionPolicy::default(),
        }
    }

    pub fn policy(mut self, policy: RejectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Decodes a path segment into an identifier.
    ///
    /// # Examples
    ///
    /// ```
    /// use sealed_id::{Codec, KeyMaterial, PathBinding};
    ///
    /// let codec = Codec::new("user", &KeyMaterial::from_key([7u8; 32])).unwrap();
    /// let binding = PathBinding::new(&codec);
    ///
    /// let link = binding.link("/users", &42u64).unwrap();
    /// let segment = link.rsplit('/').next().unwrap();
    /// assert_eq!(binding.extract::<u64>(segment), Ok(42));
    /// assert_eq!(binding.extract::<u64>("42").unwrap_err().status_code(), 404);
    /// ```
    pub fn extract<I: Identifier>(&self, segment: &str) -> Result<I, Rejection> {
        self.codec.decode(segment).map_err(|err| self.reject(&err))
    }

    /// Decodes the `index`-th non-empty segment of `path` (query string excluded).
    pub fn extract_at<I: Identifier>(&self, path: &str, index: usize) -> Result<I, Rejection> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        match path.split('/').filter(|s| !s.is_empty()).nth(index) {
            Some(segment) => self.extract(segment),
            None => Err(self.reject(&Error::Malformed)),
        }
    }

    /// Builds an outbound link by appending the token for `id` to `base`.
    pub fn link<I: Identifier>(&self, base: &str, id: &I) -> Result<String, Error> {
        let token = self.codec.encode(id)?;
        Ok(format!("{}/{}", base.trim_end_matches('/'), token))
    }

    fn reject(&self, err: &Error) -> Rejection {
        debug!(prefix = self.codec.prefix(), error = %err, "rejected path token");
        Rejection {
            policy: self.policy,
        }
    }
}
