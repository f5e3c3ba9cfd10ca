//! Delivery records, storage backends, dispatch and read-side queries.
//!
//! # Store Backend Architecture
//!
//! Delivery records are persisted behind the [`DeliveryStore`] trait so
//! storage implementations are interchangeable:
//!
//! - `MemoryDeliveryStore`: in-memory storage using DashMap (default)
//! - `PostgresDeliveryStore`: durable storage using PostgreSQL
//!
//! Use `create_delivery_store()` to create the appropriate backend based on
//! configuration.

mod dispatcher;
mod memory_store;
mod postgres_store;
mod query;
mod record;
mod store;

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::DatabaseConfig;

pub use dispatcher::{
    DispatchError, Dispatcher, DispatcherStats, DispatcherStatsSnapshot, NewDelivery,
};
pub use memory_store::MemoryDeliveryStore;
pub use postgres_store::PostgresDeliveryStore;
pub use query::{StatusQuery, MAX_PAGE_SIZE};
pub use record::{Channel, DeliveryRecord, DeliveryStatus, StatusChange};
pub use store::{DeliveryStore, PageRequest, StoreError};

/// Create a delivery store backend based on configuration.
///
/// Returns the appropriate backend implementation based on the `backend`
/// setting:
/// - `"postgres"`: returns a `PostgresDeliveryStore` if a pool is provided
/// - `"memory"` (default): returns a `MemoryDeliveryStore`
pub fn create_delivery_store(
    config: &DatabaseConfig,
    pool: Option<PgPool>,
) -> Arc<dyn DeliveryStore> {
    match config.backend.as_str() {
        "postgres" => {
            if let Some(pool) = pool {
                tracing::info!(backend = "postgres", "Creating PostgreSQL delivery store");
                Arc::new(PostgresDeliveryStore::new(pool))
            } else {
                tracing::warn!(
                    "PostgreSQL delivery store requested but no pool provided, falling back to memory"
                );
                Arc::new(MemoryDeliveryStore::new())
            }
        }
        _ => {
            tracing::info!(backend = "memory", "Creating memory delivery store");
            Arc::new(MemoryDeliveryStore::new())
        }
    }
}
