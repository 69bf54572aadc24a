//! Transport layer abstraction.

use crate::error::{ServiceError, ServiceResult};
use crate::filter::Filter;
use async_trait::async_trait;
use entigraph_core::{payload_from_value, EntityId, PayloadExt, RawPayload};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;

/// Moves raw records between an upstream and the entity services.
///
/// This trait abstracts the network layer, allowing for different
/// implementations (HTTP, in-memory fixtures for testing, etc.).
/// Timeouts and retries are the implementation's concern.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Reads one record.
    async fn read(&self, resource: &str, id: &EntityId) -> ServiceResult<RawPayload>;

    /// Reads every record matching `filter`.
    async fn list(&self, resource: &str, filter: &Filter) -> ServiceResult<Vec<RawPayload>>;

    /// Writes `payload` to one record and returns the stored record.
    async fn write(
        &self,
        resource: &str,
        id: &EntityId,
        payload: &RawPayload,
    ) -> ServiceResult<RawPayload>;
}

/// A write received by a [`MemoryTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedWrite {
    /// Target resource.
    pub resource: String,
    /// Target id.
    pub id: EntityId,
    /// Payload as sent.
    pub payload: RawPayload,
}

/// An in-memory upstream for tests and fixtures.
///
/// Records are kept per resource in id order. Reads can be delayed to
/// simulate latency, counted, and made to fail.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    records: RwLock<HashMap<String, BTreeMap<EntityId, RawPayload>>>,
    latency: Option<Duration>,
    reads: Mutex<HashMap<String, usize>>,
    lists: AtomicUsize,
    writes: Mutex<Vec<RecordedWrite>>,
    failures: Mutex<HashMap<(String, Option<EntityId>), ServiceError>>,
}

impl MemoryTransport {
    /// Creates an empty transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads records from a document shaped `{ "<resource>": [records…] }`.
    pub fn from_json(document: &Value) -> ServiceResult<Self> {
        let Value::Object(resources) = document else {
            return Err(ServiceError::Protocol(
                "fixture document must be an object of resources".into(),
            ));
        };

        let transport = Self::new();
        for (resource, records) in resources {
            let Value::Array(records) = records else {
                return Err(ServiceError::Protocol(format!(
                    "resource `{resource}` must hold an array of records"
                )));
            };
            transport.records.write().entry(resource.clone()).or_default();
            for record in records {
                transport.insert(resource, record.clone())?;
            }
        }
        Ok(transport)
    }

    /// Parses and loads a JSON fixture document.
    pub fn from_json_str(document: &str) -> ServiceResult<Self> {
        let value: Value = serde_json::from_str(document)
            .map_err(|e| ServiceError::Protocol(format!("invalid fixture document: {e}")))?;
        Self::from_json(&value)
    }

    /// Delays every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Stores a record, replacing any record with the same id.
    pub fn insert(&self, resource: &str, record: Value) -> ServiceResult<EntityId> {
        let record = payload_from_value(record)?;
        let id = record.id_at("id")?;
        self.records
            .write()
            .entry(resource.to_string())
            .or_default()
            .insert(id.clone(), record);
        Ok(id)
    }

    /// Returns the stored record.
    pub fn record(&self, resource: &str, id: &EntityId) -> Option<RawPayload> {
        self.records.read().get(resource)?.get(id).cloned()
    }

    /// Returns the resource names, sorted.
    pub fn resources(&self) -> Vec<String> {
        let mut names: Vec<_> = self.records.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Makes reads of `resource` fail with `error`: for one id, or for the
    /// whole resource (including lists) when `id` is `None`.
    pub fn inject_failure(&self, resource: &str, id: Option<EntityId>, error: ServiceError) {
        self.failures.lock().insert((resource.to_string(), id), error);
    }

    /// Removes every injected failure.
    pub fn clear_failures(&self) {
        self.failures.lock().clear();
    }

    /// Returns how many single-record reads hit `resource`.
    pub fn read_count(&self, resource: &str) -> usize {
        self.reads.lock().get(resource).copied().unwrap_or(0)
    }

    /// Returns how many list reads were served.
    pub fn list_count(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }

    /// Returns the writes received so far.
    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.writes.lock().clone()
    }

    fn injected(&self, resource: &str, id: Option<&EntityId>) -> Option<ServiceError> {
        let failures = self.failures.lock();
        id.and_then(|id| failures.get(&(resource.to_string(), Some(id.clone()))))
            .or_else(|| failures.get(&(resource.to_string(), None)))
            .cloned()
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn read(&self, resource: &str, id: &EntityId) -> ServiceResult<RawPayload> {
        *self.reads.lock().entry(resource.to_string()).or_default() += 1;
        debug!(resource, %id, "memory read");
        self.delay().await;

        if let Some(error) = self.injected(resource, Some(id)) {
            return Err(error);
        }
        self.record(resource, id)
            .ok_or_else(|| ServiceError::not_found(resource, id.clone()))
    }

    async fn list(&self, resource: &str, filter: &Filter) -> ServiceResult<Vec<RawPayload>> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        debug!(resource, %filter, "memory list");
        self.delay().await;

        if let Some(error) = self.injected(resource, None) {
            return Err(error);
        }
        let records = self.records.read();
        Ok(records
            .get(resource)
            .map(|by_id| {
                by_id
                    .values()
                    .filter(|record| filter.matches(record))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn write(
        &self,
        resource: &str,
        id: &EntityId,
        payload: &RawPayload,
    ) -> ServiceResult<RawPayload> {
        debug!(resource, %id, keys = payload.len(), "memory write");
        self.delay().await;

        self.writes.lock().push(RecordedWrite {
            resource: resource.to_string(),
            id: id.clone(),
            payload: payload.clone(),
        });

        let mut records = self.records.write();
        let stored = records
            .entry(resource.to_string())
            .or_default()
            .entry(id.clone())
            .or_insert_with(|| entigraph_core::stub_payload(id));
        for (key, value) in payload {
            stored.insert(key.clone(), value.clone());
        }
        Ok(stored.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixture() -> MemoryTransport {
        MemoryTransport::from_json(&json!({
            "units": [{"id": 7, "code": "COS10001"}],
            "students": [
                {"id": 1, "unit_id": 7},
                {"id": 2, "unit_id": 8},
                {"id": 3, "unit_id": 7}
            ]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn reads_and_counts() {
        let transport = fixture();
        let unit = transport.read("units", &EntityId::from(7)).await.unwrap();
        assert_eq!(unit["code"], json!("COS10001"));
        assert_eq!(transport.read_count("units"), 1);
        assert_eq!(transport.read_count("students"), 0);
    }

    #[tokio::test]
    async fn missing_record_is_not_found() {
        let transport = fixture();
        let err = transport.read("units", &EntityId::from(99)).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn list_filters_by_equality() {
        let transport = fixture();
        let filter = Filter::new().eq("unit_id", 7).param("all", true);
        let records = transport.list("students", &filter).await.unwrap();
        let ids: Vec<_> = records.iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, vec![json!(1), json!(3)]);
        assert_eq!(transport.list_count(), 1);

        let none = transport.list("tutorials", &Filter::new()).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn injected_failures() {
        let transport = fixture();
        transport.inject_failure(
            "units",
            Some(EntityId::from(7)),
            ServiceError::transport_retryable("connection reset"),
        );
        let err = transport.read("units", &EntityId::from(7)).await.unwrap_err();
        assert!(err.is_retryable());

        transport.clear_failures();
        assert!(transport.read("units", &EntityId::from(7)).await.is_ok());
    }

    #[tokio::test]
    async fn write_merges_into_record() {
        let transport = fixture();
        let payload = payload_from_value(json!({"code": "COS20007"})).unwrap();
        let stored = transport
            .write("units", &EntityId::from(7), &payload)
            .await
            .unwrap();

        assert_eq!(stored["id"], json!(7));
        assert_eq!(stored["code"], json!("COS20007"));
        assert_eq!(transport.writes().len(), 1);
        assert_eq!(transport.writes()[0].payload, payload);
    }

    #[test]
    fn rejects_malformed_documents() {
        assert!(MemoryTransport::from_json(&json!([1, 2])).is_err());
        assert!(MemoryTransport::from_json(&json!({"units": {"id": 1}})).is_err());
        assert!(MemoryTransport::from_json(&json!({"units": [{"code": "x"}]})).is_err());
        assert!(MemoryTransport::from_json_str("{not json").is_err());
        assert_eq!(
            MemoryTransport::from_json_str(r#"{"b": [], "a": [{"id": "x"}]}"#)
                .unwrap()
                .resources(),
            vec!["a".to_string(), "b".to_string()]
        );
    }
}
