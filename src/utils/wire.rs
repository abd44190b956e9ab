//! Serde helpers for the Authorization Server's JSON encoding
//!
//! The server is written in Go and encodes empty slices and maps as `null`.

use serde::{Deserialize, Deserializer};

/// Deserialize `null` as `T::default()`
///
/// # Errors
///
/// Propagates the inner deserializer's error for non-null values.
pub fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Sample {
        #[serde(default, deserialize_with = "null_default")]
        scopes: Vec<String>,
    }

    #[test]
    fn test_null_missing_and_present() {
        let null: Sample = serde_json::from_str(r#"{"scopes":null}"#).unwrap();
        assert!(null.scopes.is_empty());
        let missing: Sample = serde_json::from_str("{}").unwrap();
        assert!(missing.scopes.is_empty());
        let present: Sample = serde_json::from_str(r#"{"scopes":["openid"]}"#).unwrap();
        assert_eq!(present.scopes, vec!["openid"]);
    }
}
