// heed backed durable KV store, plus an in-memory variant for ephemeral sessions

use std::{collections::HashMap, marker::PhantomData, path::Path};

use anyhow::Result;
use async_trait::async_trait;
use heed::{
    Database, Env, EnvOpenOptions,
    types::{Bytes, Str},
};
use serde::{Serialize, de::DeserializeOwned};
use tokio::{fs::create_dir_all, sync::RwLock};

/// Raw string key-value contract the settings layer is written against.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get_raw(&self, key: &str) -> Result<Option<String>>;
    async fn set_raw(&self, key: &str, value: String) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
}

/// A store key that remembers the type of the value stored under it.
pub struct Key<D>(String, PhantomData<D>);

impl<D> Key<D> {
    pub fn new(collection: impl AsRef<str>, name: impl AsRef<str>) -> Self {
        Key(
            format!("{}/{}", collection.as_ref(), name.as_ref()),
            PhantomData,
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl dyn KvStore {
    pub async fn get<D: DeserializeOwned>(&self, key: &Key<D>) -> Result<Option<D>> {
        let Some(raw) = self.get_raw(key.as_str()).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    pub async fn put<D: Serialize>(&self, key: &Key<D>, value: &D) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.set_raw(key.as_str(), raw).await
    }

    pub async fn remove<D>(&self, key: &Key<D>) -> Result<()> {
        self.delete(key.as_str()).await
    }
}

pub struct Store {
    db: Database<Str, Bytes>,
    env: Env,
}

impl Store {
    pub async fn new(dir_path: impl AsRef<Path>) -> Result<Self> {
        let dir_path = dir_path.as_ref();
        if !dir_path.exists() {
            create_dir_all(dir_path).await?;
        }

        let env = unsafe { EnvOpenOptions::new().open(dir_path)? };

        let db = {
            let mut wtxn = env.write_txn()?;
            let db: Database<Str, Bytes> = env.create_database(&mut wtxn, None)?;
            wtxn.commit()?;

            db
        };

        Ok(Self { db, env })
    }
}

#[async_trait]
impl KvStore for Store {
    async fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let rtxn = self.env.read_txn()?;
        let value = self.db.get(&rtxn, key)?;
        Ok(value.map(|v| String::from_utf8_lossy(v).into_owned()))
    }

    async fn set_raw(&self, key: &str, value: String) -> Result<()> {
        let mut wtxn = self.env.write_txn()?;
        self.db.put(&mut wtxn, key, value.as_bytes())?;
        wtxn.commit()?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut wtxn = self.env.write_txn()?;
        self.db.delete(&mut wtxn, key)?;
        wtxn.commit()?;

        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get_raw(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set_raw(&self, key: &str, value: String) -> Result<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn test_store() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");

        let store: Arc<dyn KvStore> = Arc::new(
            Store::new(dir.path())
                .await
                .expect("failed to create store"),
        );

        let key = Key::<String>::new("settings", "base_url");

        store
            .put(&key, &"http://10.0.0.2:5000".to_string())
            .await
            .expect("failed to put value");

        let raw = store
            .get_raw("settings/base_url")
            .await
            .expect("failed to get raw value");
        assert_eq!(raw, Some("\"http://10.0.0.2:5000\"".to_string()));

        let value = store.get(&key).await.expect("failed to get value");
        assert_eq!(value, Some("http://10.0.0.2:5000".to_string()));

        store.remove(&key).await.expect("failed to delete value");

        let value = store.get(&key).await.expect("failed to get value");
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_store_survives_reopen() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let key = Key::<u32>::new("settings", "refresh_interval_seconds");

        {
            let store: Arc<dyn KvStore> = Arc::new(Store::new(dir.path()).await.unwrap());
            store.put(&key, &15).await.unwrap();
        }

        let store: Arc<dyn KvStore> = Arc::new(Store::new(dir.path()).await.unwrap());
        assert_eq!(store.get(&key).await.unwrap(), Some(15));
    }

    #[tokio::test]
    async fn test_memory_store_type_mismatch_is_an_error() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        store
            .set_raw("settings/auto_refresh_enabled", "not json".to_string())
            .await
            .unwrap();

        let key = Key::<bool>::new("settings", "auto_refresh_enabled");
        assert!(store.get(&key).await.is_err());
    }
}
