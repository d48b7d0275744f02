//! Registered push-notification device tokens.
//!
//! Shared between request handlers (register/unregister) and the storm
//! watcher (snapshot for fan-out, removal on delivery failure). Membership
//! is best effort: a token removed while a fan-out is in flight may still
//! receive that one alert.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::{DaypackError, Result};

#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    tokens: Arc<RwLock<HashSet<String>>>,
}

impl DeviceRegistry {
    // ---
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a token. Re-registering is a no-op. Returns the registry size.
    pub fn register(&self, token: &str) -> Result<usize> {
        // ---
        if token.trim().is_empty() {
            return Err(DaypackError::InvalidToken);
        }
        let mut tokens = self.tokens.write().unwrap_or_else(PoisonError::into_inner);
        tokens.insert(token.to_string());
        Ok(tokens.len())
    }

    /// Remove a token if present. Returns the registry size.
    pub fn unregister(&self, token: &str) -> usize {
        let mut tokens = self.tokens.write().unwrap_or_else(PoisonError::into_inner);
        tokens.remove(token);
        tokens.len()
    }

    /// Copy of the current membership, in no particular order.
    pub fn snapshot(&self) -> Vec<String> {
        let tokens = self.tokens.read().unwrap_or_else(PoisonError::into_inner);
        tokens.iter().cloned().collect()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(token)
    }

    pub fn len(&self) -> usize {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
