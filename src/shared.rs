//! A store that can be shared between async tasks.

use crate::error::Result;
use crate::models::{Bootstrap, Outcome};
use crate::options::OptionsStore;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Cloneable handle that serialises every operation on one [`OptionsStore`].
///
/// Each call holds the lock for the whole lookup-then-write sequence, so two
/// tasks writing the same new name cannot both insert it.
#[derive(Clone)]
pub struct SharedStore {
    store: Arc<Mutex<OptionsStore>>,
}

impl SharedStore {
    pub fn new(store: OptionsStore) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
        }
    }

    pub async fn create_options_table(&self) -> Result<Bootstrap> {
        self.store.lock().await.create_options_table()
    }

    pub async fn get(&self, name: &str, default: Option<&str>) -> Result<Option<String>> {
        self.store.lock().await.get_async(name, default).await
    }

    pub async fn update(&self, name: &str, value: &str) -> Result<Outcome> {
        self.store.lock().await.update(name, value)
    }

    pub async fn delete(&self, name: &str) -> Result<Outcome> {
        self.store.lock().await.delete(name)
    }

    pub async fn get_encrypted(&self, name: &str, default: Option<&str>) -> Result<Option<String>> {
        self.store.lock().await.get_encrypted(name, default)
    }

    pub async fn update_encrypted(&self, name: &str, value: &str) -> Result<Outcome> {
        self.store.lock().await.update_encrypted(name, value)
    }

    pub async fn delete_encrypted(&self, name: &str) -> Result<Outcome> {
        self.store.lock().await.delete_encrypted(name)
    }

    pub async fn close(&self) -> Result<()> {
        self.store.lock().await.close()
    }
}
