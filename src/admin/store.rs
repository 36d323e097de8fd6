//! Mapping and archived-request storage with optional JSON persistence.
//!
//! A mapping ties a client IP address to the app (`package`, `platform`) that
//! produced its traffic. The archiver files every captured request under the
//! mapping of its client address.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::har::Entry;

/// Document class of archived requests.
pub const REQUEST_CLASS: &str = "request";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("store file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown mapping {0}")]
    UnknownMapping(Uuid),
}

/// Client address → app association.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mapping {
    pub id: Uuid,
    pub ip_address: String,
    pub package: String,
    pub platform: String,
    pub created_at: DateTime<Utc>,
}

/// The identifying triple of a mapping, as submitted by operators.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingKey {
    pub ip_address: String,
    pub package: String,
    pub platform: String,
}

impl MappingKey {
    /// All three fields are required.
    pub fn is_complete(&self) -> bool {
        !self.ip_address.is_empty() && !self.package.is_empty() && !self.platform.is_empty()
    }

    fn matches(&self, mapping: &Mapping) -> bool {
        mapping.ip_address == self.ip_address
            && mapping.package == self.package
            && mapping.platform == self.platform
    }
}

/// One captured request filed under a mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub id: Uuid,
    pub mapping_id: Uuid,
    pub context_id: String,
    pub url: String,
    pub host: String,
    pub method: String,
    pub content_length: i64,
    pub user_agent: String,
    pub origin_ip: String,
    pub package: String,
    pub platform: String,
    pub details: Entry,
    pub class: String,
    pub created_at: DateTime<Utc>,
}

impl RequestRecord {
    /// File `entry` under `mapping`.
    pub fn new(mapping: &Mapping, origin_ip: impl Into<String>, entry: Entry) -> Self {
        let user_agent = entry
            .request
            .headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case("user-agent"))
            .map(|h| h.value.clone())
            .unwrap_or_default();
        Self {
            id: Uuid::new_v4(),
            mapping_id: mapping.id,
            context_id: entry.id.clone(),
            url: entry.request.url.clone(),
            host: entry.host.clone(),
            method: entry.request.method.clone(),
            content_length: entry.request.body_size,
            user_agent,
            origin_ip: origin_ip.into(),
            package: mapping.package.clone(),
            platform: mapping.platform.clone(),
            details: entry,
            class: REQUEST_CLASS.to_string(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Default, Serialize, Deserialize)]
struct Snapshot {
    mappings: Vec<Mapping>,
    requests: Vec<RequestRecord>,
}

/// Thread-safe store for mappings and their archived requests.
#[derive(Default)]
pub struct CaptureStore {
    mappings: DashMap<Uuid, Mapping>,
    requests: DashMap<Uuid, Vec<RequestRecord>>,
    persistence_path: Option<PathBuf>,
}

impl CaptureStore {
    /// Create an empty store; `persistence_path` is where [`save`](Self::save) writes.
    pub fn new(persistence_path: Option<PathBuf>) -> Self {
        Self {
            persistence_path,
            ..Self::default()
        }
    }

    /// Load from `path` if it exists, otherwise start empty.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let store = Self::new(Some(path.to_path_buf()));
        if path.exists() {
            let reader = BufReader::new(File::open(path)?);
            let snapshot: Snapshot = serde_json::from_reader(reader)?;
            for mapping in snapshot.mappings {
                store.mappings.insert(mapping.id, mapping);
            }
            for record in snapshot.requests {
                store.requests.entry(record.mapping_id).or_default().push(record);
            }
            tracing::info!(
                mappings = store.mappings.len(),
                path = %path.display(),
                "Loaded capture store"
            );
        }
        Ok(store)
    }

    /// Write the whole store to the persistence file, if one is configured.
    pub fn save(&self) -> Result<(), StoreError> {
        let Some(path) = &self.persistence_path else {
            return Ok(());
        };
        let snapshot = Snapshot {
            mappings: self.mappings(),
            requests: self
                .requests
                .iter()
                .flat_map(|r| r.value().clone())
                .collect(),
        };
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, &snapshot)?;
        tracing::debug!(
            mappings = snapshot.mappings.len(),
            requests = snapshot.requests.len(),
            "Saved capture store"
        );
        Ok(())
    }

    /// Persist a new mapping for `key`.
    pub fn create_mapping(&self, key: MappingKey) -> Result<Mapping, StoreError> {
        let mapping = Mapping {
            id: Uuid::new_v4(),
            ip_address: key.ip_address,
            package: key.package,
            platform: key.platform,
            created_at: Utc::now(),
        };
        self.mappings.insert(mapping.id, mapping.clone());
        self.save()?;
        Ok(mapping)
    }

    /// Delete every mapping matching `key` together with its archived
    /// requests. Returns how many mappings were removed; zero is not an error.
    pub fn delete_matching(&self, key: &MappingKey) -> Result<usize, StoreError> {
        let ids: Vec<Uuid> = self
            .mappings
            .iter()
            .filter(|r| key.matches(r.value()))
            .map(|r| *r.key())
            .collect();
        for id in &ids {
            self.mappings.remove(id);
            self.requests.remove(id);
        }
        if !ids.is_empty() {
            self.save()?;
        }
        Ok(ids.len())
    }

    pub fn mapping(&self, id: &Uuid) -> Option<Mapping> {
        self.mappings.get(id).map(|r| r.value().clone())
    }

    /// All mappings, oldest first.
    pub fn mappings(&self) -> Vec<Mapping> {
        let mut all: Vec<Mapping> = self.mappings.iter().map(|r| r.value().clone()).collect();
        all.sort_by_key(|m| m.created_at);
        all
    }

    /// Newest mapping registered for `ip_address`.
    pub fn find_by_ip(&self, ip_address: &str) -> Option<Mapping> {
        self.mappings
            .iter()
            .filter(|r| r.value().ip_address == ip_address)
            .max_by_key(|r| r.value().created_at)
            .map(|r| r.value().clone())
    }

    /// Append a record to its mapping. Not persisted until the next
    /// [`save`](Self::save).
    pub fn append_request(&self, record: RequestRecord) -> Result<(), StoreError> {
        if !self.mappings.contains_key(&record.mapping_id) {
            return Err(StoreError::UnknownMapping(record.mapping_id));
        }
        self.requests.entry(record.mapping_id).or_default().push(record);
        Ok(())
    }

    /// Records filed under `mapping_id`, in arrival order.
    pub fn requests_for(&self, mapping_id: &Uuid) -> Vec<RequestRecord> {
        self.requests
            .get(mapping_id)
            .map(|r| r.value().clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::har;

    fn key(ip: &str) -> MappingKey {
        MappingKey {
            ip_address: ip.into(),
            package: "com.example.app".into(),
            platform: "android".into(),
        }
    }

    fn entry(id: &str) -> Entry {
        let request = har::Request {
            method: "GET".into(),
            url: "http://example.com/a".into(),
            http_version: "HTTP/1.1".into(),
            cookies: vec![],
            headers: vec![har::Header {
                name: "User-Agent".into(),
                value: "okhttp/4".into(),
            }],
            query_string: vec![],
            post_data: None,
            headers_size: -1,
            body_size: -1,
        };
        Entry::new(id, "example.com", request)
    }

    #[test]
    fn test_key_completeness() {
        assert!(key("10.0.0.1").is_complete());
        assert!(!MappingKey::default().is_complete());
    }

    #[test]
    fn test_delete_is_idempotent() {
        let store = CaptureStore::new(None);
        store.create_mapping(key("10.0.0.1")).unwrap();
        store.create_mapping(key("10.0.0.1")).unwrap();
        store.create_mapping(key("10.0.0.2")).unwrap();

        assert_eq!(store.delete_matching(&key("10.0.0.1")).unwrap(), 2);
        assert_eq!(store.delete_matching(&key("10.0.0.1")).unwrap(), 0);
        assert_eq!(store.mappings().len(), 1);
    }

    #[test]
    fn test_requests_filed_in_order() {
        let store = CaptureStore::new(None);
        let mapping = store.create_mapping(key("10.0.0.1")).unwrap();

        for id in ["c1", "c2", "c3"] {
            let record = RequestRecord::new(&mapping, "10.0.0.1", entry(id));
            store.append_request(record).unwrap();
        }

        let records = store.requests_for(&mapping.id);
        let ids: Vec<_> = records.iter().map(|r| r.context_id.as_str()).collect();
        assert_eq!(ids, ["c1", "c2", "c3"]);
        assert_eq!(records[0].user_agent, "okhttp/4");
        assert_eq!(records[0].class, REQUEST_CLASS);
        assert_eq!(records[0].package, "com.example.app");
    }

    #[test]
    fn test_unknown_mapping_rejected() {
        let store = CaptureStore::new(None);
        let mapping = Mapping {
            id: Uuid::new_v4(),
            ip_address: "10.0.0.1".into(),
            package: "p".into(),
            platform: "ios".into(),
            created_at: Utc::now(),
        };
        let record = RequestRecord::new(&mapping, "10.0.0.1", entry("x"));
        assert!(matches!(
            store.append_request(record),
            Err(StoreError::UnknownMapping(id)) if id == mapping.id
        ));
    }

    #[test]
    fn test_find_by_ip_prefers_newest() {
        let store = CaptureStore::new(None);
        store.create_mapping(key("10.0.0.1")).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let newer = store
            .create_mapping(MappingKey {
                platform: "ios".into(),
                ..key("10.0.0.1")
            })
            .unwrap();

        assert_eq!(store.find_by_ip("10.0.0.1").unwrap().id, newer.id);
        assert!(store.find_by_ip("10.9.9.9").is_none());
    }

    #[test]
    fn test_persistence_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = CaptureStore::load(&path).unwrap();
        let mapping = store.create_mapping(key("10.0.0.1")).unwrap();
        store
            .append_request(RequestRecord::new(&mapping, "10.0.0.1", entry("c1")))
            .unwrap();
        store.save().unwrap();

        let reloaded = CaptureStore::load(&path).unwrap();
        assert_eq!(reloaded.mapping(&mapping.id), Some(mapping.clone()));
        assert_eq!(reloaded.requests_for(&mapping.id).len(), 1);
    }
}
