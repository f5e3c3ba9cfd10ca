//! Backend trait for delivery record storage.
//!
//! The dispatcher and query service speak to storage only through
//! [`DeliveryStore`], so the in-memory and PostgreSQL implementations are
//! interchangeable. Every operation is scoped by tenant: a record is
//! invisible to any tenant other than its owner.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use super::record::{DeliveryRecord, DeliveryStatus, StatusChange};

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record with this id visible to the tenant
    #[error("delivery record not found")]
    NotFound,

    /// Compare-and-set failed: the record was not in the expected status
    #[error("status conflict: expected {expected}, found {actual}")]
    Conflict {
        expected: DeliveryStatus,
        actual: DeliveryStatus,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Backend is temporarily unavailable
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Whether the operation may succeed if repeated (store hiccup rather
    /// than a logical refusal).
    ///
    /// Data exceptions and constraint violations (SQLSTATE classes 22 and
    /// 23) fail identically on every attempt, so retrying them only delays
    /// the error report.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Database(sqlx::Error::Database(e)) => !matches!(
                e.code().as_deref(),
                Some(code) if code.starts_with("22") || code.starts_with("23")
            ),
            StoreError::Database(_) | StoreError::Unavailable(_) => true,
            _ => false,
        }
    }
}

/// A page of results, 1-based.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.page_size as u64
    }
}

/// Durable storage for delivery records.
#[async_trait]
pub trait DeliveryStore: Send + Sync {
    /// Persist a newly created record. The record id must be unused.
    async fn insert(&self, record: &DeliveryRecord) -> Result<(), StoreError>;

    /// Fetch a record by id, scoped to the owning tenant.
    async fn find(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<DeliveryRecord>, StoreError>;

    /// List a tenant's records ordered by created_at descending.
    async fn list(
        &self,
        tenant_id: Uuid,
        page: PageRequest,
    ) -> Result<Vec<DeliveryRecord>, StoreError>;

    /// Apply a status change under compare-and-set on the current status.
    ///
    /// Returns the updated record. Fails with [`StoreError::Conflict`] if
    /// the record is not in the status the change expects, so no two
    /// concurrent transitions can both apply to the same record.
    async fn transition(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        change: StatusChange,
    ) -> Result<DeliveryRecord, StoreError>;
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use super::*;

    #[derive(Debug)]
    struct StubDbError(&'static str);

    impl std::fmt::Display for StubDbError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "sqlstate {}", self.0)
        }
    }

    impl std::error::Error for StubDbError {}

    impl sqlx::error::DatabaseError for StubDbError {
        fn message(&self) -> &str {
            "stub database error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(self.0.into())
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            sqlx::error::ErrorKind::Other
        }
    }

    fn db_error(code: &'static str) -> StoreError {
        StoreError::Database(sqlx::Error::Database(Box::new(StubDbError(code))))
    }

    #[test]
    fn test_data_and_constraint_errors_are_not_transient() {
        // 22001: string data right truncation
        assert!(!db_error("22001").is_transient());
        // 23505: unique violation
        assert!(!db_error("23505").is_transient());
    }

    #[test]
    fn test_connection_level_errors_are_transient() {
        assert!(StoreError::Database(sqlx::Error::PoolTimedOut).is_transient());
        // 57014: query canceled, a server-side condition worth retrying
        assert!(db_error("57014").is_transient());
        assert!(StoreError::Unavailable("maintenance".to_string()).is_transient());
    }

    #[test]
    fn test_logical_refusals_are_not_transient() {
        assert!(!StoreError::NotFound.is_transient());
        assert!(!StoreError::Conflict {
            expected: DeliveryStatus::Pending,
            actual: DeliveryStatus::Sent,
        }
        .is_transient());
    }
}
