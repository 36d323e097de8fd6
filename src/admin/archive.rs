//! Queue consumer that files published entries under mappings.
//!
//! # Responsibilities
//! - Decode every delivery from the in-process queue back into an [`Entry`]
//! - Resolve the mapping from the client address the entry was captured with
//! - Append a [`RequestRecord`] to the store
//!
//! # Design Decisions
//! - Runs as a single background task owned by the host
//! - Undecodable or unmapped deliveries are counted and dropped
//! - On shutdown the queue is drained before the store is saved

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::admin::store::{CaptureStore, RequestRecord};
use crate::har::{self, Entry};
use crate::observability::logging::X_FORWARDED_FOR;
use crate::observability::metrics;
use crate::sink::channel::Delivery;

/// What happened to one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveOutcome {
    Filed(Uuid),
    /// No mapping exists for the client address.
    Unmapped,
    /// The payload was not a valid entry, or the store refused the record.
    Rejected,
}

impl ArchiveOutcome {
    fn label(&self) -> &'static str {
        match self {
            ArchiveOutcome::Filed(_) => "filed",
            ArchiveOutcome::Unmapped => "unmapped",
            ArchiveOutcome::Rejected => "rejected",
        }
    }
}

pub struct Archiver {
    store: Arc<CaptureStore>,
    receiver: mpsc::Receiver<Delivery>,
}

impl Archiver {
    pub fn new(store: Arc<CaptureStore>, receiver: mpsc::Receiver<Delivery>) -> Self {
        Self { store, receiver }
    }

    /// File a single delivery.
    pub fn archive(&self, delivery: &Delivery) -> ArchiveOutcome {
        let outcome = self.file(delivery);
        metrics::record_archived(outcome.label());
        outcome
    }

    fn file(&self, delivery: &Delivery) -> ArchiveOutcome {
        let entry = match har::deserialize_entry(&delivery.publishing.body) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(
                    routing_key = %delivery.routing_key,
                    error = %e,
                    "Dropping undecodable delivery"
                );
                return ArchiveOutcome::Rejected;
            }
        };

        let origin_ip = origin_ip(&entry);
        let Some(mapping) = self.store.find_by_ip(&origin_ip) else {
            tracing::debug!(
                context_id = %entry.id,
                origin_ip = %origin_ip,
                "No mapping for client address"
            );
            return ArchiveOutcome::Unmapped;
        };

        let context_id = entry.id.clone();
        let record = RequestRecord::new(&mapping, origin_ip, entry);
        match self.store.append_request(record) {
            Ok(()) => {
                tracing::debug!(context_id = %context_id, mapping_id = %mapping.id, "Request archived");
                ArchiveOutcome::Filed(mapping.id)
            }
            // The mapping was deleted between lookup and append.
            Err(e) => {
                tracing::warn!(context_id = %context_id, error = %e, "Failed to archive request");
                ArchiveOutcome::Rejected
            }
        }
    }

    /// Consume deliveries until the queue closes or shutdown fires.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!("Archiver started");
        loop {
            tokio::select! {
                delivery = self.receiver.recv() => match delivery {
                    Some(delivery) => {
                        self.archive(&delivery);
                    }
                    None => break,
                },
                _ = shutdown.recv() => break,
            }
        }

        self.receiver.close();
        while let Some(delivery) = self.receiver.recv().await {
            self.archive(&delivery);
        }

        if let Err(e) = self.store.save() {
            tracing::error!(error = %e, "Failed to save capture store");
        }
        tracing::info!("Archiver stopped");
    }
}

/// First address of the captured `X-Forwarded-For` header.
fn origin_ip(entry: &Entry) -> String {
    entry
        .request
        .headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(X_FORWARDED_FOR))
        .and_then(|h| h.value.split(',').next())
        .map(|ip| ip.trim().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::store::MappingKey;
    use crate::sink::Publishing;

    fn delivery(context_id: &str, xff: Option<&str>) -> Delivery {
        let mut headers = vec![har::Header {
            name: "Host".into(),
            value: "api.example.com".into(),
        }];
        if let Some(xff) = xff {
            headers.push(har::Header {
                name: "X-Forwarded-For".into(),
                value: xff.into(),
            });
        }
        let request = har::Request {
            method: "POST".into(),
            url: "http://api.example.com/v1".into(),
            http_version: "HTTP/1.1".into(),
            cookies: vec![],
            headers,
            query_string: vec![],
            post_data: None,
            headers_size: -1,
            body_size: 12,
        };
        let entry = Entry::new(context_id, "api.example.com", request);
        Delivery {
            exchange: String::new(),
            routing_key: "har".into(),
            publishing: Publishing::json(har::serialize_entry(&entry).unwrap()),
        }
    }

    fn mapped_store() -> (Arc<CaptureStore>, Uuid) {
        let store = Arc::new(CaptureStore::new(None));
        let mapping = store
            .create_mapping(MappingKey {
                ip_address: "10.1.1.1".into(),
                package: "com.example".into(),
                platform: "ios".into(),
            })
            .unwrap();
        (store, mapping.id)
    }

    #[test]
    fn test_files_under_first_forwarded_address() {
        let (store, mapping_id) = mapped_store();
        let (_tx, rx) = mpsc::channel(1);
        let archiver = Archiver::new(store.clone(), rx);

        let outcome = archiver.archive(&delivery("c1", Some("10.1.1.1, 172.16.0.1")));
        assert_eq!(outcome, ArchiveOutcome::Filed(mapping_id));

        let records = store.requests_for(&mapping_id);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].origin_ip, "10.1.1.1");
        assert_eq!(records[0].method, "POST");
        assert_eq!(records[0].content_length, 12);
        assert_eq!(records[0].details.id, "c1");
    }

    #[test]
    fn test_unmapped_and_undecodable() {
        let (store, mapping_id) = mapped_store();
        let (_tx, rx) = mpsc::channel(1);
        let archiver = Archiver::new(store.clone(), rx);

        assert_eq!(archiver.archive(&delivery("c1", None)), ArchiveOutcome::Unmapped);
        assert_eq!(
            archiver.archive(&delivery("c2", Some("10.9.9.9"))),
            ArchiveOutcome::Unmapped
        );

        let garbage = Delivery {
            exchange: String::new(),
            routing_key: "har".into(),
            publishing: Publishing::json(&b"{not json"[..]),
        };
        assert_eq!(archiver.archive(&garbage), ArchiveOutcome::Rejected);
        assert!(store.requests_for(&mapping_id).is_empty());
    }

    #[tokio::test]
    async fn test_run_drains_queue_on_shutdown() {
        let (store, mapping_id) = mapped_store();
        let (tx, rx) = mpsc::channel(8);
        let (stop_tx, stop_rx) = broadcast::channel(1);

        for id in ["c1", "c2", "c3"] {
            tx.send(delivery(id, Some("10.1.1.1"))).await.unwrap();
        }
        stop_tx.send(()).unwrap();

        Archiver::new(store.clone(), rx).run(stop_rx).await;

        let ids: Vec<_> = store
            .requests_for(&mapping_id)
            .into_iter()
            .map(|r| r.context_id)
            .collect();
        assert_eq!(ids, ["c1", "c2", "c3"]);
    }
}
