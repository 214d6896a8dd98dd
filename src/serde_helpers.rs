//! Serde helpers for turning normalized JSON into typed resources.
//!
//! When the `tracing` feature is enabled, unknown fields are logged as warnings and
//! failures report the JSON path that broke, which helps spot panel API changes.

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Deserialize a JSON value, logging fields the target type does not capture.
///
/// Unknown fields never cause a failure.
#[cfg(feature = "tracing")]
pub fn deserialize_with_warnings<T: DeserializeOwned>(value: Value) -> crate::Result<T> {
    use std::any::type_name;

    tracing::trace!(type_name = %type_name::<T>(), json = %value, "deserializing JSON");

    let mut unknown_paths: Vec<String> = Vec::new();
    let result: T = serde_ignored::deserialize(value.clone(), |path| {
        unknown_paths.push(path.to_string());
    })
    .inspect_err(|_| {
        if let Err(path_err) = serde_path_to_error::deserialize::<_, T>(value.clone()) {
            tracing::error!(
                type_name = %type_name::<T>(),
                path = %path_err.path(),
                error = %path_err.inner(),
                "deserialization failed"
            );
        }
    })?;

    for path in unknown_paths {
        tracing::warn!(
            type_name = %type_name::<T>(),
            field = %path,
            "unknown field in API response"
        );
    }

    Ok(result)
}

/// Pass-through deserialization when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub fn deserialize_with_warnings<T: DeserializeOwned>(value: Value) -> crate::Result<T> {
    Ok(serde_json::from_value(value)?)
}
