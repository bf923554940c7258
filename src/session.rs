use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::{Result, StudioError};

pub const BRAND_VALUES_KEY: &str = "brand_values";
pub const ICP_KEY: &str = "icp";
pub const WEBSITE_ANALYSIS_KEY: &str = "website_analysis";

/// Per-user session state. Every entry lives under `{user_id}:{key}`, so a
/// user can only reach its own prefix.
#[derive(Default)]
pub struct SessionStore {
    entries: RwLock<HashMap<String, Value>>,
}

fn scoped_key(user_id: &str, key: &str) -> Result<String> {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        return Err(StudioError::Validation("user_id is required".to_string()));
    }
    if user_id.contains(':') {
        return Err(StudioError::Validation(
            "user_id must not contain ':'".to_string(),
        ));
    }
    Ok(format!("{user_id}:{key}"))
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put<T: Serialize>(&self, user_id: &str, key: &str, value: &T) -> Result<()> {
        let scoped = scoped_key(user_id, key)?;
        let value = serde_json::to_value(value)?;
        self.entries.write().await.insert(scoped, value);
        Ok(())
    }

    pub async fn get<T: DeserializeOwned>(&self, user_id: &str, key: &str) -> Result<Option<T>> {
        let scoped = scoped_key(user_id, key)?;
        let guard = self.entries.read().await;
        match guard.get(&scoped) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    pub async fn keys(&self, user_id: &str) -> Result<Vec<String>> {
        let prefix = scoped_key(user_id, "")?;
        let guard = self.entries.read().await;
        let mut keys: Vec<String> = guard
            .keys()
            .filter_map(|key| key.strip_prefix(&prefix).map(str::to_string))
            .collect();
        keys.sort();
        Ok(keys)
    }

    pub async fn remove(&self, user_id: &str, key: &str) -> Result<bool> {
        let scoped = scoped_key(user_id, key)?;
        Ok(self.entries.write().await.remove(&scoped).is_some())
    }

    pub async fn clear_user(&self, user_id: &str) -> Result<usize> {
        let prefix = scoped_key(user_id, "")?;
        let mut guard = self.entries.write().await;
        let before = guard.len();
        guard.retain(|key, _| !key.starts_with(&prefix));
        Ok(before - guard.len())
    }
}
