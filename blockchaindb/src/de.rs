//! Lenient field decoders.
//!
//! Heights, sizes and indexes arrive as JSON numbers from some deployments
//! and as decimal strings from others. Raw transaction bytes are base64.

use base64::Engine;
use serde::{Deserialize, Deserializer, Serializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    String(String),
}

fn to_u64<E: serde::de::Error>(v: NumberOrString) -> Result<u64, E> {
    match v {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) => s.trim().parse().map_err(E::custom),
    }
}

pub(crate) fn u64_lenient<'de, D>(d: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    to_u64(NumberOrString::deserialize(d)?)
}

pub(crate) fn opt_u64_lenient<'de, D>(d: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NumberOrString>::deserialize(d)? {
        None => Ok(None),
        Some(v) => to_u64(v).map(Some),
    }
}

pub(crate) fn opt_base64<'de, D>(d: D) -> Result<Option<Vec<u8>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(d)? {
        None => Ok(None),
        Some(s) => base64::engine::general_purpose::STANDARD
            .decode(s.as_bytes())
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

pub(crate) fn ser_opt_base64<S>(v: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match v {
        Some(bytes) => s.serialize_some(&base64::engine::general_purpose::STANDARD.encode(bytes)),
        None => s.serialize_none(),
    }
}
