//! Remembered API keys, one per publishing server
//!
//! Keys are stored in a JSON object keyed by the server's address hash, so
//! the front end can look a key up again from the address alone.

use std::collections::BTreeMap;

use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Mutex;
use tracing::debug;

use crate::errors::PublishError;
use crate::filesys::file::File;
use crate::http::verify::address_hash;

pub struct KeyStore {
    file: File,
    /// Serializes read-modify-write cycles on the file
    lock: Mutex<()>,
}

impl KeyStore {
    pub fn new(file: File) -> Self {
        Self {
            file,
            lock: Mutex::new(()),
        }
    }

    /// Key stored for `server_address`, if any
    pub async fn get(&self, server_address: &str) -> Result<Option<SecretString>, PublishError> {
        let _guard = self.lock.lock().await;
        let keys = self.load().await?;
        Ok(keys
            .get(&address_hash(server_address))
            .map(|key| SecretString::from(key.clone())))
    }

    /// Store `api_key` for `server_address`, replacing any previous key
    pub async fn set(&self, server_address: &str, api_key: &SecretString) -> Result<(), PublishError> {
        let _guard = self.lock.lock().await;
        let mut keys = self.load().await?;
        keys.insert(
            address_hash(server_address),
            api_key.expose_secret().to_string(),
        );

        self.file.write_json(&keys).await?;
        self.file.set_permissions_600().await?;
        debug!("Stored API key for {}", server_address);
        Ok(())
    }

    async fn load(&self) -> Result<BTreeMap<String, String>, PublishError> {
        if !self.file.exists().await {
            return Ok(BTreeMap::new());
        }
        self.file.read_json().await.map_err(|e| {
            PublishError::Config(format!(
                "Invalid key file {}: {}",
                self.file.path().display(),
                e
            ))
        })
    }
}
