//! Sled-based Preference Store Implementation

use sled::Db;
use std::path::Path;
use std::sync::Arc;

use crate::application::ports::{PreferenceError, PreferenceStorePort, PreferenceValue};

/// Sled 偏好设置配置
#[derive(Debug, Clone)]
pub struct SledPreferenceConfig {
    /// 数据库路径
    pub db_path: String,
}

impl Default for SledPreferenceConfig {
    fn default() -> Self {
        Self {
            db_path: "data/preferences.sled".to_string(),
        }
    }
}

/// Sled 偏好设置存储
///
/// 键统一加 `pref:` 前缀，值用 bincode 编码
pub struct SledPreferenceStore {
    db: Db,
}

impl SledPreferenceStore {
    pub fn new(config: &SledPreferenceConfig) -> Result<Self, PreferenceError> {
        let db = sled::open(&config.db_path)
            .map_err(|e| PreferenceError::DatabaseError(e.to_string()))?;

        tracing::info!(
            db_path = %config.db_path,
            entries = db.len(),
            "SledPreferenceStore initialized"
        );

        Ok(Self { db })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PreferenceError> {
        let config = SledPreferenceConfig {
            db_path: path.as_ref().to_string_lossy().to_string(),
        };
        Self::new(&config)
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 刷新数据库
    pub fn flush(&self) -> Result<(), PreferenceError> {
        self.db
            .flush()
            .map_err(|e| PreferenceError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    fn key(key: &str) -> String {
        format!("pref:{}", key)
    }
}

impl PreferenceStorePort for SledPreferenceStore {
    fn get(&self, key: &str) -> Result<Option<PreferenceValue>, PreferenceError> {
        let Some(bytes) = self
            .db
            .get(Self::key(key))
            .map_err(|e| PreferenceError::DatabaseError(e.to_string()))?
        else {
            return Ok(None);
        };

        match bincode::deserialize::<PreferenceValue>(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                // 偏好设置不是权威数据，损坏的条目当作不存在
                tracing::warn!(key = %key, error = %e, "Discarding unreadable preference");
                Ok(None)
            }
        }
    }

    fn set(&self, key: &str, value: PreferenceValue) -> Result<(), PreferenceError> {
        let bytes = bincode::serialize(&value)
            .map_err(|e| PreferenceError::SerializationError(e.to_string()))?;
        self.db
            .insert(Self::key(key), bytes)
            .map_err(|e| PreferenceError::DatabaseError(e.to_string()))?;
        tracing::debug!(key = %key, "Preference stored");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), PreferenceError> {
        self.db
            .remove(Self::key(key))
            .map_err(|e| PreferenceError::DatabaseError(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::preference_keys;
    use tempfile::tempdir;

    #[test]
    fn test_preferences_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prefs.sled");

        {
            let store = SledPreferenceStore::open(&path).unwrap();
            store
                .set(preference_keys::PANEL_WIDTH, PreferenceValue::Int(320))
                .unwrap();
            store
                .set(preference_keys::AUTOSAVE_INTERVAL_MS, PreferenceValue::Int(20_000))
                .unwrap();
            store.flush().unwrap();
        }

        let store = SledPreferenceStore::open(&path).unwrap();
        let width = store.get(preference_keys::PANEL_WIDTH).unwrap();
        assert_eq!(width.and_then(|v| v.as_i64()), Some(320));

        store.remove(preference_keys::PANEL_WIDTH).unwrap();
        assert!(store.get(preference_keys::PANEL_WIDTH).unwrap().is_none());
        assert!(store
            .get(preference_keys::AUTOSAVE_INTERVAL_MS)
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_unreadable_entry_reads_as_missing() {
        let dir = tempdir().unwrap();
        let store = SledPreferenceStore::open(dir.path().join("prefs.sled")).unwrap();

        store.db.insert("pref:broken", vec![0xff; 3]).unwrap();
        assert!(store.get("broken").unwrap().is_none());
    }
}
