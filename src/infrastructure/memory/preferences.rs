//! In-Memory Preference Store

use dashmap::DashMap;
use std::sync::Arc;

use crate::application::ports::{PreferenceError, PreferenceStorePort, PreferenceValue};

/// 内存偏好设置（进程退出即丢失，用于测试和无盘环境）
pub struct InMemoryPreferenceStore {
    values: DashMap<String, PreferenceValue>,
}

impl InMemoryPreferenceStore {
    pub fn new() -> Self {
        Self {
            values: DashMap::new(),
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl Default for InMemoryPreferenceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PreferenceStorePort for InMemoryPreferenceStore {
    fn get(&self, key: &str) -> Result<Option<PreferenceValue>, PreferenceError> {
        Ok(self.values.get(key).map(|v| v.clone()))
    }

    fn set(&self, key: &str, value: PreferenceValue) -> Result<(), PreferenceError> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), PreferenceError> {
        self.values.remove(key);
        Ok(())
    }
}
