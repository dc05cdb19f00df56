use super::codec::BinaryMnemonic;
use crate::errors::KeyringError;
use serde::ser::{Serialize, SerializeMap as _, SerializeStruct as _, Serializer};
use serde_json::Value;
use std::fmt;
use zeroize::Zeroizing;

/// Which plaintext layout an encrypted mnemonic was sealed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeVersion {
    /// Phrase sealed as a plain string. Read-only; never written.
    Legacy = 1,
    /// Phrase sealed as packed wordlist indices.
    Current = 2,
}

impl EnvelopeVersion {
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Legacy => 1,
            Self::Current => 2,
        }
    }

    pub const fn is_legacy(self) -> bool {
        matches!(self, Self::Legacy)
    }
}

impl fmt::Display for EnvelopeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

impl Serialize for EnvelopeVersion {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u8(self.as_u8())
    }
}

/// The version 2 plaintext: `{"version": 2, "mnemonic": {"0": b0, "1": b1, ...}}`.
///
/// Bytes go out as a key-indexed object, the same shape other writers of this
/// format produce for a byte array.
pub struct CurrentEnvelope<'a> {
    mnemonic: &'a BinaryMnemonic,
}

impl<'a> CurrentEnvelope<'a> {
    pub const fn new(mnemonic: &'a BinaryMnemonic) -> Self {
        Self { mnemonic }
    }
}

impl Serialize for CurrentEnvelope<'_> {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let mut st = s.serialize_struct("CurrentEnvelope", 2)?;
        st.serialize_field("version", &EnvelopeVersion::Current)?;
        st.serialize_field("mnemonic", &IndexedBytes(self.mnemonic.as_bytes()))?;
        st.end()
    }
}

struct IndexedBytes<'a>(&'a [u8]);

impl Serialize for IndexedBytes<'_> {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let mut map = s.serialize_map(Some(self.0.len()))?;
        for (i, b) in self.0.iter().enumerate() {
            map.serialize_entry(&i, b)?;
        }
        map.end()
    }
}

/// A decrypted plaintext whose version and payload shape have been checked.
pub enum Envelope {
    Legacy(Zeroizing<String>),
    Current(BinaryMnemonic),
}

impl Envelope {
    /// Validate a decoded payload of unknown shape.
    ///
    /// `version` must be exactly 1 or 2, and the mnemonic must be a string for
    /// version 1 and an object (or array) of bytes for version 2.
    pub fn from_payload(mut payload: Value) -> Result<Self, KeyringError> {
        let Value::Object(map) = &mut payload else {
            return Err(KeyringError::InvalidEnvelope("payload is not an object"));
        };
        let version = match map.get("version").and_then(Value::as_u64) {
            Some(1) => EnvelopeVersion::Legacy,
            Some(2) => EnvelopeVersion::Current,
            _ => {
                return Err(KeyringError::InvalidEnvelope(
                    "missing or unsupported version",
                ))
            }
        };

        match (version, map.remove("mnemonic")) {
            (EnvelopeVersion::Legacy, Some(Value::String(phrase))) => {
                Ok(Self::Legacy(Zeroizing::new(phrase)))
            }
            (EnvelopeVersion::Legacy, _) => Err(KeyringError::InvalidEnvelope(
                "version 1 mnemonic must be a string",
            )),
            (EnvelopeVersion::Current, Some(v @ (Value::Object(_) | Value::Array(_)))) => {
                Ok(Self::Current(coerce_to_binary(&v)?))
            }
            (EnvelopeVersion::Current, _) => Err(KeyringError::InvalidEnvelope(
                "version 2 mnemonic must be an object of bytes",
            )),
        }
    }

    pub const fn version(&self) -> EnvelopeVersion {
        match self {
            Self::Legacy(_) => EnvelopeVersion::Legacy,
            Self::Current(_) => EnvelopeVersion::Current,
        }
    }
}

/// Rebuild a byte buffer from its generic serialized form.
///
/// Objects are read in ascending index order (the order a serialized byte
/// array enumerates in), whatever order the map stores its keys. Keys must be
/// canonical indices `0..len` and values integers in `0..=255`.
pub fn coerce_to_binary(value: &Value) -> Result<BinaryMnemonic, KeyringError> {
    let out = match value {
        Value::Array(items) => {
            let mut bytes = Vec::with_capacity(items.len());
            for v in items {
                bytes.push(as_byte(v)?);
            }
            BinaryMnemonic::from_bytes(bytes)
        }
        Value::Object(map) => {
            let mut out = BinaryMnemonic::from_bytes(vec![0_u8; map.len()]);
            let slots = out.as_mut_bytes();
            for (key, v) in map {
                let slot = parse_index(key)
                    .and_then(|i| slots.get_mut(i))
                    .ok_or(KeyringError::MalformedBinary("byte keys are not 0..len"))?;
                *slot = as_byte(v)?;
            }
            out
        }
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {
            return Err(KeyringError::MalformedBinary("expected an object of bytes"));
        }
    };

    if out.len() % 2 != 0 {
        return Err(KeyringError::MalformedBinary(
            "odd number of bytes, not a whole number of 16-bit indices",
        ));
    }
    Ok(out)
}

fn parse_index(key: &str) -> Option<usize> {
    let canonical = !key.is_empty()
        && key.bytes().all(|b| b.is_ascii_digit())
        && (key == "0" || !key.starts_with('0'));
    if !canonical {
        return None;
    }
    key.parse().ok()
}

fn as_byte(v: &Value) -> Result<u8, KeyringError> {
    v.as_u64()
        .and_then(|n| u8::try_from(n).ok())
        .ok_or(KeyringError::MalformedBinary("byte value is not an integer in 0..=255"))
}
