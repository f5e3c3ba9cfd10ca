//! In-memory delivery store backed by DashMap.
//!
//! The default backend for development and tests. Per-record transition
//! writes are serialized by the map's entry lock, which gives the same
//! compare-and-set guarantee as the status-guarded UPDATE in the
//! PostgreSQL backend.

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use super::record::{DeliveryRecord, StatusChange};
use super::store::{DeliveryStore, PageRequest, StoreError};

#[derive(Default)]
pub struct MemoryDeliveryStore {
    records: DashMap<Uuid, DeliveryRecord>,
}

impl MemoryDeliveryStore {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    /// Number of records held, across all tenants.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl DeliveryStore for MemoryDeliveryStore {
    async fn insert(&self, record: &DeliveryRecord) -> Result<(), StoreError> {
        self.records.insert(record.id, record.clone());
        Ok(())
    }

    async fn find(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<DeliveryRecord>, StoreError> {
        Ok(self
            .records
            .get(&id)
            .filter(|r| r.tenant_id == tenant_id)
            .map(|r| r.clone()))
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        page: PageRequest,
    ) -> Result<Vec<DeliveryRecord>, StoreError> {
        let mut records: Vec<DeliveryRecord> = self
            .records
            .iter()
            .filter(|r| r.tenant_id == tenant_id)
            .map(|r| r.clone())
            .collect();

        // Newest first; id as tie-breaker for a stable order
        records.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        Ok(records
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.page_size as usize)
            .collect())
    }

    async fn transition(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        change: StatusChange,
    ) -> Result<DeliveryRecord, StoreError> {
        // get_mut holds the shard lock, serializing transitions per record
        let mut entry = self
            .records
            .get_mut(&id)
            .filter(|r| r.tenant_id == tenant_id)
            .ok_or(StoreError::NotFound)?;

        let expected = change.expected_status();
        if entry.status != expected {
            return Err(StoreError::Conflict {
                expected,
                actual: entry.status,
            });
        }

        change.apply(&mut entry);
        Ok(entry.clone())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::delivery::record::{Channel, DeliveryStatus};

    fn record_for(tenant_id: Uuid) -> DeliveryRecord {
        DeliveryRecord::new(tenant_id, "user@x.com", Channel::Email, "Hi", "there")
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = MemoryDeliveryStore::new();
        let tenant = Uuid::new_v4();
        let record = record_for(tenant);

        store.insert(&record).await.unwrap();

        let found = store.find(tenant, record.id).await.unwrap().unwrap();
        assert_eq!(found.id, record.id);
        assert_eq!(found.status, DeliveryStatus::Pending);
    }

    #[tokio::test]
    async fn test_find_is_tenant_scoped() {
        let store = MemoryDeliveryStore::new();
        let tenant = Uuid::new_v4();
        let record = record_for(tenant);
        store.insert(&record).await.unwrap();

        let other_tenant = Uuid::new_v4();
        assert!(store.find(other_tenant, record.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_transition_compare_and_set() {
        let store = MemoryDeliveryStore::new();
        let tenant = Uuid::new_v4();
        let record = record_for(tenant);
        store.insert(&record).await.unwrap();

        let updated = store
            .transition(tenant, record.id, StatusChange::Sent { at: Utc::now() })
            .await
            .unwrap();
        assert_eq!(updated.status, DeliveryStatus::Sent);
        assert!(updated.sent_at.is_some());

        // Sent is terminal: a second transition out of Pending must conflict
        let err = store
            .transition(
                tenant,
                record.id,
                StatusChange::Failed {
                    reason: "late".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Conflict {
                expected: DeliveryStatus::Pending,
                actual: DeliveryStatus::Sent,
            }
        ));
    }

    #[tokio::test]
    async fn test_transition_unknown_id() {
        let store = MemoryDeliveryStore::new();
        let err = store
            .transition(Uuid::new_v4(), Uuid::new_v4(), StatusChange::PendingRetry)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn test_list_orders_newest_first_and_paginates() {
        let store = MemoryDeliveryStore::new();
        let tenant = Uuid::new_v4();

        let mut ids = Vec::new();
        for i in 0..5 {
            let mut record = record_for(tenant);
            // Spread created_at so the ordering is unambiguous
            record.created_at = Utc::now() - chrono::Duration::seconds(10 - i);
            ids.push(record.id);
            store.insert(&record).await.unwrap();
        }

        let first_page = store
            .list(
                tenant,
                PageRequest {
                    page: 1,
                    page_size: 2,
                },
            )
            .await
            .unwrap();
        assert_eq!(first_page.len(), 2);
        // The two most recently created records, newest first
        assert_eq!(first_page[0].id, ids[4]);
        assert_eq!(first_page[1].id, ids[3]);

        let last_page = store
            .list(
                tenant,
                PageRequest {
                    page: 3,
                    page_size: 2,
                },
            )
            .await
            .unwrap();
        assert_eq!(last_page.len(), 1);
        assert_eq!(last_page[0].id, ids[0]);
    }

    #[tokio::test]
    async fn test_list_excludes_other_tenants() {
        let store = MemoryDeliveryStore::new();
        let tenant_a = Uuid::new_v4();
        let tenant_b = Uuid::new_v4();

        store.insert(&record_for(tenant_a)).await.unwrap();
        store.insert(&record_for(tenant_b)).await.unwrap();

        let listed = store
            .list(
                tenant_a,
                PageRequest {
                    page: 1,
                    page_size: 10,
                },
            )
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].tenant_id, tenant_a);
    }
}
