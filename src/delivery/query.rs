//! Read-side lookups over delivery records.
//!
//! Reads go straight to the store, so they always reflect the latest
//! committed transition; there is no caching layer.

use std::sync::Arc;

use uuid::Uuid;

use super::dispatcher::DispatchError;
use super::record::DeliveryRecord;
use super::store::{DeliveryStore, PageRequest};

/// Upper bound on page size to prevent unbounded reads
pub const MAX_PAGE_SIZE: u32 = 100;

pub struct StatusQuery {
    store: Arc<dyn DeliveryStore>,
}

impl StatusQuery {
    pub fn new(store: Arc<dyn DeliveryStore>) -> Self {
        Self { store }
    }

    /// Fetch one record by id, scoped to the tenant.
    pub async fn get(&self, tenant_id: Uuid, id: Uuid) -> Result<DeliveryRecord, DispatchError> {
        self.store
            .find(tenant_id, id)
            .await?
            .ok_or(DispatchError::NotFound)
    }

    /// List a tenant's records, newest created_at first.
    ///
    /// Page and page size are 1-based positive integers; a page size above
    /// [`MAX_PAGE_SIZE`] is clamped to it.
    pub async fn list(
        &self,
        tenant_id: Uuid,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<DeliveryRecord>, DispatchError> {
        if page == 0 {
            return Err(DispatchError::Validation(
                "page must be a positive integer".to_string(),
            ));
        }
        if page_size == 0 {
            return Err(DispatchError::Validation(
                "page_size must be a positive integer".to_string(),
            ));
        }

        let request = PageRequest {
            page,
            page_size: page_size.min(MAX_PAGE_SIZE),
        };
        Ok(self.store.list(tenant_id, request).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::memory_store::MemoryDeliveryStore;
    use crate::delivery::record::Channel;

    fn query_with_store() -> (StatusQuery, Arc<MemoryDeliveryStore>) {
        let store = Arc::new(MemoryDeliveryStore::new());
        (StatusQuery::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_get_unknown_id_is_not_found() {
        let (query, _) = query_with_store();
        let err = query
            .get(Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::NotFound));
    }

    #[tokio::test]
    async fn test_list_rejects_zero_page_inputs() {
        let (query, _) = query_with_store();
        let tenant = Uuid::new_v4();

        assert!(matches!(
            query.list(tenant, 0, 10).await.unwrap_err(),
            DispatchError::Validation(_)
        ));
        assert!(matches!(
            query.list(tenant, 1, 0).await.unwrap_err(),
            DispatchError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn test_list_clamps_page_size() {
        let (query, store) = query_with_store();
        let tenant = Uuid::new_v4();

        for _ in 0..3 {
            let record =
                DeliveryRecord::new(tenant, "user@x.com", Channel::Email, "Hi", "there");
            store.insert(&record).await.unwrap();
        }

        // An oversized page size is clamped, not rejected
        let listed = query.list(tenant, 1, 10_000).await.unwrap();
        assert_eq!(listed.len(), 3);
    }
}
