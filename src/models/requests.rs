//! Request DTOs for the management API
//!
//! Defines the structure of incoming HTTP request bodies. Parameter
//! changes arrive as [`ParameterUpdate`](crate::cache::ParameterUpdate).

use serde::Deserialize;

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Maximum allowed value size in bytes
pub const MAX_VALUE_SIZE: usize = 1024 * 1024; // 1 MB

/// Request body for `PUT /caches/:name/entries`
#[derive(Debug, Clone, Deserialize)]
pub struct PutEntryRequest {
    /// The cache key
    pub key: String,
    /// The value to store
    pub value: String,
    /// Only store if the key is absent
    #[serde(default)]
    pub if_absent: bool,
}

impl PutEntryRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.key.is_empty() {
            return Some("Key cannot be empty".to_string());
        }
        if self.key.len() > MAX_KEY_LENGTH {
            return Some(format!(
                "Key exceeds maximum length of {MAX_KEY_LENGTH} bytes"
            ));
        }
        if self.value.len() > MAX_VALUE_SIZE {
            return Some(format!(
                "Value exceeds maximum size of {MAX_VALUE_SIZE} bytes"
            ));
        }
        None
    }
}
