//! Key-value store access
//!
//! [`EtcdStore`] talks to etcd's v3 gRPC-JSON gateway. Keys and values
//! travel base64-encoded, and int64 fields (like the delete count) arrive
//! as JSON strings per the protobuf JSON mapping.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::RegistryError;

/// Every registry/control-plane round trip is bounded; a hung store
/// surfaces as `Unavailable` instead of stalling an operation.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Key-value store with prefix scans
///
/// `get` returns `None` for an absent key; only a store-level failure is
/// an error. `delete` reports whether a value was actually removed, which
/// callers use to tell "nothing to clean up" from a failed store call.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, RegistryError>;

    /// Upsert: overwrites any prior value at `key`.
    async fn put(&self, key: &str, value: &str) -> Result<(), RegistryError>;

    async fn delete(&self, key: &str) -> Result<bool, RegistryError>;

    /// All `(key, value)` pairs whose key starts with `prefix`.
    async fn list_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>, RegistryError>;
}

/// etcd v3 client over the gRPC-JSON gateway
pub struct EtcdStore {
    base_url: String,
    client: reqwest::Client,
}

impl EtcdStore {
    pub fn new(host: &str, port: u16) -> Self {
        Self::with_url(format!("http://{}:{}", host, port))
    }

    pub fn with_url(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    async fn call(&self, path: &str, body: Value) -> Result<Value, RegistryError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| RegistryError::Unavailable(format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(RegistryError::Unavailable(format!(
                "{} returned {}: {}",
                path, status, detail
            )));
        }

        debug!("etcd {} ok", path);
        response
            .json()
            .await
            .map_err(|e| RegistryError::Unavailable(format!("{}: invalid reply: {}", path, e)))
    }
}

#[async_trait]
impl KvStore for EtcdStore {
    async fn get(&self, key: &str) -> Result<Option<String>, RegistryError> {
        let reply = self
            .call("/v3/kv/range", json!({ "key": BASE64.encode(key) }))
            .await?;

        match reply.get("kvs").and_then(Value::as_array).and_then(|kvs| kvs.first()) {
            Some(kv) => Ok(Some(decode_field(kv, "value")?)),
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), RegistryError> {
        self.call(
            "/v3/kv/put",
            json!({ "key": BASE64.encode(key), "value": BASE64.encode(value) }),
        )
        .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, RegistryError> {
        let reply = self
            .call("/v3/kv/deleterange", json!({ "key": BASE64.encode(key) }))
            .await?;
        Ok(int64_field(&reply, "deleted") > 0)
    }

    async fn list_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>, RegistryError> {
        let reply = self
            .call(
                "/v3/kv/range",
                json!({
                    "key": BASE64.encode(prefix),
                    "range_end": BASE64.encode(prefix_range_end(prefix)),
                }),
            )
            .await?;

        let mut entries = Vec::new();
        if let Some(kvs) = reply.get("kvs").and_then(Value::as_array) {
            for kv in kvs {
                entries.push((decode_field(kv, "key")?, decode_field(kv, "value")?));
            }
        }
        Ok(entries)
    }
}

/// The exclusive upper bound for a prefix scan: the prefix with its last
/// byte incremented (dropping trailing 0xff bytes), or `\0` meaning "end
/// of keyspace" when the whole prefix is 0xff.
fn prefix_range_end(prefix: &str) -> Vec<u8> {
    let mut end = prefix.as_bytes().to_vec();
    while let Some(last) = end.last_mut() {
        if *last < 0xff {
            *last += 1;
            return end;
        }
        end.pop();
    }
    vec![0]
}

fn decode_field(kv: &Value, field: &str) -> Result<String, RegistryError> {
    let encoded = kv.get(field).and_then(Value::as_str).unwrap_or_default();
    let bytes = BASE64
        .decode(encoded)
        .map_err(|e| RegistryError::Unavailable(format!("undecodable {}: {}", field, e)))?;
    String::from_utf8(bytes)
        .map_err(|e| RegistryError::Unavailable(format!("non-utf8 {}: {}", field, e)))
}

/// The JSON gateway encodes int64 as a string; tolerate a bare number too.
fn int64_field(reply: &Value, field: &str) -> u64 {
    match reply.get(field) {
        Some(Value::String(s)) => s.parse().unwrap_or(0),
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        _ => 0,
    }
}

/// In-memory store for tests and local development
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, RegistryError> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), RegistryError> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, RegistryError> {
        Ok(self.entries.lock().unwrap().remove(key).is_some())
    }

    async fn list_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>, RegistryError> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_get_put_delete() {
        let store = MemoryStore::new();

        assert!(store.get("/a/one").await.unwrap().is_none());

        store.put("/a/one", "1").await.unwrap();
        assert_eq!(store.get("/a/one").await.unwrap().as_deref(), Some("1"));

        // Upsert overwrites
        store.put("/a/one", "2").await.unwrap();
        assert_eq!(store.get("/a/one").await.unwrap().as_deref(), Some("2"));

        assert!(store.delete("/a/one").await.unwrap());
        assert!(!store.delete("/a/one").await.unwrap());
    }

    #[tokio::test]
    async fn memory_store_prefix_scan_is_bounded() {
        let store = MemoryStore::new();
        store.put("/a/one", "1").await.unwrap();
        store.put("/a/two", "2").await.unwrap();
        store.put("/b/one", "3").await.unwrap();

        let entries = store.list_prefix("/a/").await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|(k, _)| k.starts_with("/a/")));
    }

    #[test]
    fn range_end_increments_last_byte() {
        assert_eq!(prefix_range_end("/services/"), b"/services0".to_vec());
        assert_eq!(prefix_range_end("a"), b"b".to_vec());
    }

    #[test]
    fn int64_fields_decode_from_string_or_number() {
        assert_eq!(int64_field(&json!({ "deleted": "2" }), "deleted"), 2);
        assert_eq!(int64_field(&json!({ "deleted": 2 }), "deleted"), 2);
        assert_eq!(int64_field(&json!({}), "deleted"), 0);
    }
}
