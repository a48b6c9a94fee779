//! Lenient deserializers for data service payloads.
//!
//! The data service is not consistent about scalar encodings: timestamps come
//! back as ISO strings or epoch milliseconds, booleans and numbers are
//! sometimes quoted. Everything is normalized on the way in and written back
//! in canonical form.

use serde::de::{self, Deserializer};
use serde::Deserialize;

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// Timestamps as Unix milliseconds, accepting RFC 3339 strings or integers.
pub mod timestamp_ms {
    use super::{de, Deserialize, Deserializer, Scalar};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<i64, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Scalar>::deserialize(deserializer)? {
            None => Ok(0),
            Some(Scalar::Int(value)) => Ok(value),
            #[allow(clippy::cast_possible_truncation)]
            Some(Scalar::Float(value)) => Ok(value as i64),
            Some(Scalar::Text(text)) => parse_timestamp(&text).map_err(de::Error::custom),
            Some(Scalar::Bool(_)) => Err(de::Error::custom("timestamp cannot be a boolean")),
        }
    }

    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S>(value: &i64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_i64(*value)
    }

    pub(crate) fn parse_timestamp(text: &str) -> Result<i64, String> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(0);
        }
        if let Ok(millis) = text.parse::<i64>() {
            return Ok(millis);
        }
        chrono::DateTime::parse_from_rfc3339(text)
            .map(|date_time| date_time.timestamp_millis())
            .map_err(|error| format!("invalid timestamp '{text}': {error}"))
    }
}

/// Booleans that may arrive as `"true"`/`"false"` strings.
pub mod flexible_bool {
    use super::{Deserialize, Deserializer, Scalar};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<Scalar>::deserialize(deserializer)? {
            Some(Scalar::Bool(value)) => value,
            Some(Scalar::Text(text)) => text.trim().eq_ignore_ascii_case("true"),
            Some(Scalar::Int(value)) => value != 0,
            Some(Scalar::Float(_)) | None => false,
        })
    }
}

/// Integers that may arrive quoted.
pub mod flexible_int {
    use super::{de, Deserialize, Deserializer, Scalar};

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: TryFrom<i64>,
    {
        let value = match Scalar::deserialize(deserializer)? {
            Scalar::Int(value) => value,
            Scalar::Text(text) => text
                .trim()
                .parse::<i64>()
                .map_err(|error| de::Error::custom(format!("invalid integer '{text}': {error}")))?,
            Scalar::Float(value) if value.fract() == 0.0 => {
                #[allow(clippy::cast_possible_truncation)]
                let truncated = value as i64;
                truncated
            }
            Scalar::Float(value) => {
                return Err(de::Error::custom(format!("expected integer, got {value}")))
            }
            Scalar::Bool(_) => return Err(de::Error::custom("expected integer, got boolean")),
        };
        T::try_from(value).map_err(|_| de::Error::custom(format!("integer {value} out of range")))
    }
}
