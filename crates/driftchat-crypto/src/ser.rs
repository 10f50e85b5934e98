//! Serde helpers for fixed-length byte arrays.
//!
//! Serde derives `[u8; N]` as a sequence of integers; the wire format
//! wants compact byte strings. Used via `#[serde(with = "ser::fixed_bytes")]`.

pub(crate) mod fixed_bytes {
    use std::fmt;

    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer, const N: usize>(
        bytes: &[u8; N],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(bytes)
    }

    pub fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
        deserializer: D,
    ) -> Result<[u8; N], D::Error> {
        struct FixedVisitor<const N: usize>;

        impl<'de, const N: usize> Visitor<'de> for FixedVisitor<N> {
            type Value = [u8; N];

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{} bytes", N)
            }

            fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<[u8; N], E> {
                if v.len() != N {
                    return Err(E::invalid_length(v.len(), &self));
                }
                let mut arr = [0u8; N];
                arr.copy_from_slice(v);
                Ok(arr)
            }

            fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<[u8; N], A::Error> {
                let mut arr = [0u8; N];
                for (i, byte) in arr.iter_mut().enumerate() {
                    *byte = seq
                        .next_element()?
                        .ok_or_else(|| de::Error::invalid_length(i, &self))?;
                }
                Ok(arr)
            }
        }

        deserializer.deserialize_bytes(FixedVisitor::<N>)
    }
}
