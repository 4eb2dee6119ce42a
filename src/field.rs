use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Codec, Error, Identifier, KeyMaterial};

thread_local! {
    static CODEC_CACHE: RefCell<HashMap<&'static str, Arc<Codec>>> = RefCell::new(HashMap::new());
}

fn get_or_create_codec(name: &'static str) -> Result<Arc<Codec>, Error> {
    CODEC_CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();
        if let Some(codec) = cache.get(name) {
            return Ok(codec.clone());
        }
        let key = KeyMaterial::global().ok_or(Error::KeyUnavailable)?;
        let codec = Arc::new(Codec::new(name, key)?);
        cache.insert(name, codec.clone());
        Ok(codec)
    })
}

pub trait TypeMarker {
    fn name() -> &'static str;
}

/// A generic type-safe identifier field.
///
/// When serialized with Serde, the identifier is encrypted into a URL safe token.
/// Deserialization decodes and verifies the token back into the identifier. The token
/// has an object type specific prefix defined in the type marker's `fn name()`, so a
/// `Field<UserMarker>` never accepts a token made for a `Field<OrderMarker>`.
///
/// Because any Serde-driven path or query extractor deserializes straight into this
/// type, handlers receive verified identifiers without calling the codec themselves.
///
/// The process-wide key material must be installed with [`KeyMaterial::install`] or
/// [`KeyMaterial::global_from_env`] before fields are serialized or deserialized.
///
/// # Examples
///
/// ```
/// use sealed_id::{Field, KeyMaterial, TypeMarker};
///
/// pub struct ExampleIdMarker;
/// impl TypeMarker for ExampleIdMarker {
///     fn name() -> &'static str { "example" }
/// }
///
/// type ExampleId = Field<ExampleIdMarker>;
///
/// #[derive(serde::Serialize, serde::Deserialize)]
/// struct Example {
///     pub id: ExampleId,
/// }
///
/// let _ = KeyMaterial::install(KeyMaterial::from_key([7u8; 32]));
/// let obj = Example { id: ExampleId::from(12345u64) };
/// let obj_str = serde_json::to_string(&obj).unwrap();
/// assert!(obj_str.starts_with("{\"id\":\"example_"));
///
/// let back: Example = serde_json::from_str(&obj_str).unwrap();
/// assert_eq!(back.id.into_inner(), 12345);
/// ```
pub struct Field<T: TypeMarker, I: Identifier = u64> {
    id: I,
    _marker: PhantomData<fn() -> T>,
}

impl<T: TypeMarker, I: Identifier> From<I> for Field<T, I> {
    fn from(id: I) -> Self {
        Field {
            id,
            _marker: PhantomData,
        }
    }
}

impl<T: TypeMarker, I: Identifier> Field<T, I> {
    /// Returns a reference to the raw identifier.
    pub fn id(&self) -> &I {
        &self.id
    }

    /// Returns the raw identifier.
    pub fn into_inner(self) -> I {
        self.id
    }

    /// Encrypts the identifier into its token.
    pub fn to_token(&self) -> Result<String, Error> {
        get_or_create_codec(T::name())?.encode(&self.id)
    }

    /// Decodes a token made for this field type.
    pub fn from_token(token: &str) -> Result<Self, Error> {
        let id = get_or_create_codec(T::name())?.decode::<I>(token)?;
        Ok(Field::<T, I>::from(id))
    }
}

impl<T: TypeMarker, I: Identifier + Clone> Clone for Field<T, I> {
    fn clone(&self) -> Self {
        Field::from(self.id.clone())
    }
}

impl<T: TypeMarker, I: Identifier + Copy> Copy for Field<T, I> {}

impl<T: TypeMarker, I: Identifier + PartialEq> PartialEq for Field<T, I> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T: TypeMarker, I: Identifier + Eq> Eq for Field<T, I> {}

impl<T: TypeMarker, I: Identifier + Hash> Hash for Field<T, I> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T: TypeMarker, I: Identifier + fmt::Debug> fmt::Debug for Field<T, I> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Field")
            .field("id", &self.id)
            .field("marker", &T::name())
            .finish()
    }
}

impl<T: TypeMarker, I: Identifier> FromStr for Field<T, I> {
    type Err = Error;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        Field::from_token(token)
    }
}

impl<T: TypeMarker, I: Identifier> Serialize for Field<T, I> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let token = self.to_token().map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&token)
    }
}

impl<'de, T: TypeMarker, I: Identifier> Deserialize<'de> for Field<T, I> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        Field::from_token(&encoded).map_err(serde::de::Error::custom)
    }
}
