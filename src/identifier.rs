use std::borrow::Cow;

/// A value that can be hidden inside a token.
///
/// The codec only ever sees the canonical byte form. Integers use their decimal
/// string, so `42u64` and `"42"` encode the same plaintext and either type can
/// decode the other's tokens.
pub trait Identifier: Sized {
    /// Returns the canonical byte form of the identifier.
    fn to_canonical_bytes(&self) -> Cow<'_, [u8]>;

    /// Rebuilds the identifier from its canonical byte form, or `None` if the bytes
    /// don't describe a value of this type.
    fn from_canonical_bytes(bytes: Vec<u8>) -> Option<Self>;
}

impl Identifier for Vec<u8> {
    fn to_canonical_bytes(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self)
    }

    fn from_canonical_bytes(bytes: Vec<u8>) -> Option<Self> {
        Some(bytes)
    }
}

impl Identifier for String {
    fn to_canonical_bytes(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self.as_bytes())
    }

    fn from_canonical_bytes(bytes: Vec<u8>) -> Option<Self> {
        String::from_utf8(bytes).ok()
    }
}

macro_rules! decimal_identifier {
    ($($ty:ty),*) => {
        $(
            impl Identifier for $ty {
                fn to_canonical_bytes(&self) -> Cow<'_, [u8]> {
                    Cow::Owned(self.to_string().into_bytes())
                }

                fn from_canonical_bytes(bytes: Vec<u8>) -> Option<Self> {
                    let text = std::str::from_utf8(&bytes).ok()?;
                    let value: $ty = text.parse().ok()?;
                    // Only the form produced by `to_string` is accepted ("042" and "+42" are not).
                    (value.to_string() == text).then_some(value)
                }
            }
        )*
    };
}

decimal_identifier!(u32, u64, u128, i32, i64);
